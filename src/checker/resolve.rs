//! Resolves syntactic [`TypeExpr`] nodes into semantic [`Type`]s
//! The checker resolves a `TypeExpr` into a `Type` once, during hoisting.
//!
//! Recursive aliases are handled via a placeholder `Type::Alias` cell,
//! registered before
//! its right-hand side is resolved, so a reference to the alias within
//! its own definition resolves to the (still-empty) cell rather than
//! recursing forever; the cell is patched once the definition is done.

use std::rc::Rc;

use crate::ast::ty::{TemplateTypePart, TypeExpr, TypeExprKind, TypeParam};
use crate::diagnostics::TypeError;
use crate::types::{
    AliasCell, ConditionalType, FunctionType, IndexSignature, MappedType, ObjectType, OrdF64,
    PropertyType, TemplatePart, Type, TypeParameter,
};

use super::Checker;

impl Checker {
    pub(super) fn fresh_type_param_id(&mut self) -> u32 {
        self.next_type_param_id += 1;
        self.next_type_param_id
    }

    /// Declare a function/class/interface's own type parameters in a
    /// fresh generic scope and return their resolved `TypeParameter`s.
    pub(super) fn resolve_type_params(
        &mut self,
        params: &[TypeParam],
    ) -> Vec<TypeParameter> {
        let mut scope = std::collections::HashMap::new();
        let mut resolved = Vec::new();
        // register names first so a constraint can refer to a sibling
        // type parameter declared later in the list.
        for p in params {
            let id = self.fresh_type_param_id();
            scope.insert(p.name.clone(), id);
        }
        self.type_param_scopes.push(scope);
        for p in params {
            let id = *self
                .type_param_scopes
                .last()
                .unwrap()
                .get(&p.name)
                .unwrap();
            let constraint = p
                .constraint
                .as_ref()
                .map(|c| self.resolve_type_expr(c))
                .transpose()
                .unwrap_or(None);
            let default = p
                .default
                .as_ref()
                .map(|d| self.resolve_type_expr(d))
                .transpose()
                .unwrap_or(None);
            resolved.push(TypeParameter {
                id,
                name: p.name.clone(),
                constraint,
                default,
            });
        }
        resolved
    }

    pub(super) fn pop_type_params(&mut self) {
        self.type_param_scopes.pop();
    }

    fn lookup_type_param(&self, name: &str) -> Option<u32> {
        self.type_param_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub(super) fn resolve_type_expr(&mut self, texpr: &TypeExpr) -> Result<Type, TypeError> {
        match &texpr.kind {
            TypeExprKind::Name { name, type_args } => self.resolve_named_type(texpr, name, type_args),
            TypeExprKind::StringLiteral(s) => Ok(Type::StringLiteral(Rc::from(s.as_str()))),
            TypeExprKind::NumberLiteral(n) => Ok(Type::NumberLiteral(OrdF64(*n))),
            TypeExprKind::BooleanLiteral(b) => Ok(Type::BooleanLiteral(*b)),
            TypeExprKind::Array(el) => Ok(Type::array(self.resolve_type_expr(el)?)),
            TypeExprKind::Tuple {
                elements,
                optional,
                rest,
            } => {
                let elements = elements
                    .iter()
                    .map(|e| self.resolve_type_expr(e).map(Rc::new))
                    .collect::<Result<Vec<_>, _>>()?;
                let rest = rest
                    .as_ref()
                    .map(|r| self.resolve_type_expr(r).map(Rc::new))
                    .transpose()?;
                Ok(Type::Tuple {
                    elements,
                    optional: optional.clone(),
                    rest,
                })
            }
            TypeExprKind::Union(members) => {
                let members = members
                    .iter()
                    .map(|m| self.resolve_type_expr(m))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::union(members))
            }
            TypeExprKind::Intersection(members) => {
                let members = members
                    .iter()
                    .map(|m| self.resolve_type_expr(m))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::intersection(members))
            }
            TypeExprKind::Function {
                type_params,
                params,
                return_type,
            } => {
                let resolved_tps = self.resolve_type_params(type_params);
                let mut p_types = Vec::new();
                let mut optional = Vec::new();
                let mut rest = None;
                for p in params {
                    if p.rest {
                        rest = Some(
                            p.ty.as_ref()
                                .map(|t| self.resolve_type_expr(t))
                                .transpose()?
                                .unwrap_or(Type::Any),
                        );
                        continue;
                    }
                    p_types.push(
                        p.ty.as_ref()
                            .map(|t| self.resolve_type_expr(t))
                            .transpose()?
                            .unwrap_or(Type::Any),
                    );
                    optional.push(p.optional);
                }
                let ret = self.resolve_type_expr(return_type)?;
                self.pop_type_params();
                Ok(Type::Function(Rc::new(FunctionType {
                    type_params: resolved_tps,
                    params: p_types,
                    optional,
                    rest,
                    this_type: None,
                    return_type: ret,
                })))
            }
            TypeExprKind::Object(members) => {
                let mut properties = Vec::new();
                let mut index_signatures = Vec::new();
                for m in members {
                    properties.push(PropertyType {
                        name: m.name.clone(),
                        ty: self.resolve_type_expr(&m.ty)?,
                        optional: m.optional,
                        readonly: m.readonly,
                    });
                }
                let _ = &mut index_signatures;
                Ok(Type::Object(Rc::new(ObjectType {
                    properties,
                    index_signatures,
                    call_signatures: vec![],
                    construct_signatures: vec![],
                })))
            }
            TypeExprKind::Keyof(target) => {
                let t = self.resolve_type_expr(target)?;
                Ok(self.eval_keyof(&t))
            }
            TypeExprKind::IndexedAccess { object, index } => {
                let obj = self.resolve_type_expr(object)?;
                let idx = self.resolve_type_expr(index)?;
                Ok(self.eval_indexed_access(&obj, &idx))
            }
            TypeExprKind::Conditional {
                check,
                extends,
                then_branch,
                else_branch,
            } => {
                // `infer X` identifiers within `extends` introduce fresh
                // type parameters visible only in `then_branch`.
                let mut infer_vars = Vec::new();
                self.type_param_scopes.push(std::collections::HashMap::new());
                self.collect_infer_vars(extends, &mut infer_vars);
                let check_t = self.resolve_type_expr(check)?;
                let extends_t = self.resolve_type_expr(extends)?;
                let true_t = self.resolve_type_expr(then_branch)?;
                self.pop_type_params();
                let false_t = self.resolve_type_expr(else_branch)?;
                Ok(Type::Conditional(Rc::new(ConditionalType {
                    check: check_t,
                    extends: extends_t,
                    true_branch: true_t,
                    false_branch: false_t,
                    infer_vars,
                })))
            }
            TypeExprKind::Mapped {
                param,
                constraint,
                value,
                readonly,
                optional,
            } => {
                let id = self.fresh_type_param_id();
                let mut scope = std::collections::HashMap::new();
                scope.insert(param.clone(), id);
                self.type_param_scopes.push(scope);
                let constraint_t = self.resolve_type_expr(constraint)?;
                let value_t = self.resolve_type_expr(value)?;
                self.pop_type_params();
                Ok(Type::Mapped(Rc::new(MappedType {
                    param: TypeParameter {
                        id,
                        name: param.clone(),
                        constraint: Some(constraint_t.clone()),
                        default: None,
                    },
                    constraint: constraint_t,
                    value: value_t,
                    readonly: *readonly,
                    optional: *optional,
                })))
            }
            TypeExprKind::TemplateLiteral(parts) => {
                let mut resolved = Vec::new();
                for part in parts {
                    resolved.push(match part {
                        TemplateTypePart::Text(s) => TemplatePart::Text(s.clone()),
                        TemplateTypePart::Type(t) => TemplatePart::Type(self.resolve_type_expr(t)?),
                    });
                }
                Ok(Type::TemplateLiteral(Rc::new(resolved)))
            }
            TypeExprKind::TypeGuard { param, ty } => Ok(Type::TypeGuard {
                param: param.clone(),
                narrowed: Rc::new(self.resolve_type_expr(ty)?),
            }),
            TypeExprKind::Infer(name) => {
                // Bare `infer X` outside a conditional's `extends` is
                // only reachable via `collect_infer_vars`'s own
                // traversal; as a standalone annotation it has no
                // meaning, so treat it as a lookup of the variable
                // `collect_infer_vars` should already have registered.
                match self.lookup_type_param(name) {
                    Some(id) => Ok(Type::TypeParameter(Rc::new(TypeParameter {
                        id,
                        name: name.clone(),
                        constraint: None,
                        default: None,
                    }))),
                    None => Ok(Type::Any),
                }
            }
            TypeExprKind::Parenthesized(inner) => self.resolve_type_expr(inner),
        }
    }

    /// Walk `extends` looking for `infer X` occurrences and register
    /// each as a fresh type parameter in scope for the conditional's
    /// true branch.
    fn collect_infer_vars(&mut self, texpr: &TypeExpr, out: &mut Vec<TypeParameter>) {
        match &texpr.kind {
            TypeExprKind::Infer(name) => {
                if self.lookup_type_param(name).is_none() {
                    let id = self.fresh_type_param_id();
                    self.type_param_scopes
                        .last_mut()
                        .expect("infer scope pushed by caller")
                        .insert(name.clone(), id);
                    out.push(TypeParameter {
                        id,
                        name: name.clone(),
                        constraint: None,
                        default: None,
                    });
                }
            }
            TypeExprKind::Array(inner) => self.collect_infer_vars(inner, out),
            TypeExprKind::Union(members) | TypeExprKind::Intersection(members) => {
                for m in members {
                    self.collect_infer_vars(m, out);
                }
            }
            TypeExprKind::Tuple { elements, rest, .. } => {
                for e in elements {
                    self.collect_infer_vars(e, out);
                }
                if let Some(r) = rest {
                    self.collect_infer_vars(r, out);
                }
            }
            TypeExprKind::Name { type_args, .. } => {
                for a in type_args {
                    self.collect_infer_vars(a, out);
                }
            }
            TypeExprKind::Parenthesized(inner) => self.collect_infer_vars(inner, out),
            _ => {}
        }
    }

    fn resolve_named_type(
        &mut self,
        texpr: &TypeExpr,
        name: &str,
        type_args: &[TypeExpr],
    ) -> Result<Type, TypeError> {
        let base = match name {
            "any" => Type::Any,
            "unknown" => Type::Unknown,
            "never" => Type::Never,
            "void" => Type::Void,
            "null" => Type::Null,
            "undefined" => Type::Undefined,
            "number" => Type::Number,
            "string" => Type::String,
            "boolean" => Type::Boolean,
            "bigint" => Type::BigInt,
            "symbol" => Type::Symbol,
            "object" => Type::object(vec![]),
            "Promise" => {
                let arg = type_args
                    .first()
                    .map(|t| self.resolve_type_expr(t))
                    .transpose()?
                    .unwrap_or(Type::Any);
                return Ok(Type::Promise(Rc::new(arg)));
            }
            "Generator" | "Iterable" | "IterableIterator" => {
                let arg = type_args
                    .first()
                    .map(|t| self.resolve_type_expr(t))
                    .transpose()?
                    .unwrap_or(Type::Any);
                return Ok(Type::Generator(Rc::new(arg)));
            }
            "Array" => {
                let arg = type_args
                    .first()
                    .map(|t| self.resolve_type_expr(t))
                    .transpose()?
                    .unwrap_or(Type::Any);
                return Ok(Type::array(arg));
            }
            _ => {
                if let Some(id) = self.lookup_type_param(name) {
                    Type::TypeParameter(Rc::new(TypeParameter {
                        id,
                        name: name.to_string(),
                        constraint: None,
                        default: None,
                    }))
                } else if let Some(found) = self.env.lookup_type(name) {
                    found
                } else {
                    return Err(TypeError::new(
                        texpr.pos,
                        format!("unresolved type name '{name}'"),
                    ));
                }
            }
        };

        if type_args.is_empty() {
            return Ok(base);
        }
        let args = type_args
            .iter()
            .map(|a| self.resolve_type_expr(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.instantiate(&base, args))
    }

    /// Substitute a generic's type parameters with concrete arguments.
    /// Used both for explicit `Name<Args>` annotations and for call-site
    /// instantiation after inference.
    pub(super) fn instantiate(&self, generic: &Type, args: Vec<Type>) -> Type {
        match generic {
            Type::Generic { params, body } => {
                let mut subst = std::collections::HashMap::new();
                for (p, a) in params.iter().zip(args.iter()) {
                    subst.insert(p.id, a.clone());
                }
                substitute(&body, &subst)
            }
            Type::Function(fun) if !fun.type_params.is_empty() => {
                let mut subst = std::collections::HashMap::new();
                for (p, a) in fun.type_params.iter().zip(args.iter()) {
                    subst.insert(p.id, a.clone());
                }
                substitute(generic, &subst)
            }
            other => Type::Instantiation {
                generic: Rc::new(other.clone()),
                type_args: Rc::new(args),
            },
        }
    }

    fn eval_keyof(&self, t: &Type) -> Type {
        match t.resolved() {
            Type::Object(obj) => Type::union(
                obj.properties
                    .iter()
                    .map(|p| Type::StringLiteral(Rc::from(p.name.as_str())))
                    .collect(),
            ),
            other => Type::Keyof(Rc::new(other)),
        }
    }

    fn eval_indexed_access(&self, obj: &Type, index: &Type) -> Type {
        if let (Type::Object(o), Type::StringLiteral(key)) = (obj.resolved(), index) {
            if let Some(p) = o.properties.iter().find(|p| p.name == key.as_ref()) {
                return p.ty.clone();
            }
        }
        if let (Type::Array(elem), Type::Number) = (obj.resolved(), index) {
            return (*elem).clone();
        }
        Type::IndexedAccess {
            object: Rc::new(obj.clone()),
            index: Rc::new(index.clone()),
        }
    }
}

/// Recursively replace every `TypeParameter` whose id appears in
/// `subst` with its mapped concrete type.
pub(super) fn substitute(ty: &Type, subst: &std::collections::HashMap<u32, Type>) -> Type {
    match ty {
        Type::TypeParameter(p) => subst.get(&p.id).cloned().unwrap_or_else(|| ty.clone()),
        Type::Array(el) => Type::array(substitute(el, subst)),
        Type::Tuple {
            elements,
            optional,
            rest,
        } => Type::Tuple {
            elements: elements
                .iter()
                .map(|e| Rc::new(substitute(e, subst)))
                .collect(),
            optional: optional.clone(),
            rest: rest.as_ref().map(|r| Rc::new(substitute(r, subst))),
        },
        Type::Object(obj) => Type::Object(Rc::new(ObjectType {
            properties: obj
                .properties
                .iter()
                .map(|p| PropertyType {
                    name: p.name.clone(),
                    ty: substitute(&p.ty, subst),
                    optional: p.optional,
                    readonly: p.readonly,
                })
                .collect(),
            index_signatures: obj
                .index_signatures
                .iter()
                .map(|i| IndexSignature {
                    key_type: substitute(&i.key_type, subst),
                    value_type: substitute(&i.value_type, subst),
                })
                .collect(),
            call_signatures: obj.call_signatures.clone(),
            construct_signatures: obj.construct_signatures.clone(),
        })),
        Type::Function(fun) => Type::Function(Rc::new(FunctionType {
            type_params: fun.type_params.clone(),
            params: fun.params.iter().map(|p| substitute(p, subst)).collect(),
            optional: fun.optional.clone(),
            rest: fun.rest.as_ref().map(|r| substitute(r, subst)),
            this_type: fun.this_type.as_ref().map(|t| substitute(t, subst)),
            return_type: substitute(&fun.return_type, subst),
        })),
        Type::Union(members) => Type::union(members.iter().map(|m| substitute(m, subst)).collect()),
        Type::Intersection(members) => {
            Type::intersection(members.iter().map(|m| substitute(m, subst)).collect())
        }
        Type::Promise(inner) => Type::Promise(Rc::new(substitute(inner, subst))),
        Type::Generator(inner) => Type::Generator(Rc::new(substitute(inner, subst))),
        other => other.clone(),
    }
}
