//! Constraint-based generic parameter inference.
//!
//! For a call whose type arguments are omitted, each parameter type is
//! unified against its argument's computed type; every free type
//! parameter collects candidate types from every unification site, then
//! candidates are combined (union in covariant position) and checked
//! against the parameter's constraint.

use std::collections::HashMap;

use crate::types::Type;

#[derive(Default)]
pub struct InferenceContext {
    candidates: HashMap<u32, Vec<Type>>,
}

impl InferenceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unify `param` (possibly containing type parameters) against the
    /// concrete `arg` type, recording a candidate for every type
    /// parameter encountered.
    pub fn unify(&mut self, param: &Type, arg: &Type) {
        match (param, arg) {
            (Type::TypeParameter(p), _) => {
                self.candidates
                    .entry(p.id)
                    .or_default()
                    .push(arg.widen());
            }
            (Type::Array(p_el), Type::Array(a_el)) => self.unify(p_el, a_el),
            (Type::Array(p_el), Type::Tuple { elements, .. }) => {
                for e in elements {
                    self.unify(p_el, e);
                }
            }
            (
                Type::Tuple {
                    elements: p_els, ..
                },
                Type::Tuple {
                    elements: a_els, ..
                },
            ) => {
                for (p, a) in p_els.iter().zip(a_els.iter()) {
                    self.unify(p, a);
                }
            }
            (Type::Function(p_fn), Type::Function(a_fn)) => {
                for (p, a) in p_fn.params.iter().zip(a_fn.params.iter()) {
                    // parameters are contravariant; candidates are still
                    // collected the same way for this simplified pass.
                    self.unify(p, a);
                }
                self.unify(&p_fn.return_type, &a_fn.return_type);
            }
            (Type::Object(p_obj), Type::Object(a_obj)) => {
                for p_prop in &p_obj.properties {
                    if let Some(a_prop) = a_obj.properties.iter().find(|ap| ap.name == p_prop.name)
                    {
                        self.unify(&p_prop.ty, &a_prop.ty);
                    }
                }
            }
            (Type::Promise(p_inner), Type::Promise(a_inner)) => self.unify(p_inner, a_inner),
            (Type::Union(p_members), _) => {
                for m in p_members.iter() {
                    self.unify(m, arg);
                }
            }
            _ => {}
        }
    }

    /// Resolve the best candidate for a type parameter by unioning every
    /// site's contribution; falls back to `fallback` (usually the
    /// parameter's constraint, or `any`) if no site constrained it.
    pub fn resolve(&self, id: u32, fallback: Type) -> Type {
        match self.candidates.get(&id) {
            Some(candidates) if !candidates.is_empty() => Type::union(candidates.clone()),
            _ => fallback,
        }
    }
}
