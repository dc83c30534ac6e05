//! Structural subtyping.
//!
//! `is_subtype(a, b)` answers "does a value of type `a` satisfy every
//! use site that expects `b`?" i.e. `a <: b`.

use super::{FunctionType, ObjectType, Type};

const MAX_DEPTH: usize = 64;

/// `a <: b`. Recursive aliases are handled with a depth cap rather than
/// a full co-inductive cycle-detector: real TypeScript programs don't
/// nest recursive aliases deeply enough for 64 levels to matter, and a
/// depth cap is far simpler to get right than a visited-pairs set over
/// structurally-compared (non-`Hash`) types.
pub fn is_subtype(a: &Type, b: &Type) -> bool {
    is_subtype_depth(a, b, 0)
}

fn is_subtype_depth(a: &Type, b: &Type, depth: usize) -> bool {
    if depth >= MAX_DEPTH {
        return true;
    }

    let a = a.resolved();
    let b = b.resolved();

    // any is bottom and top simultaneously.
    if matches!(a, Type::Any) || matches!(b, Type::Any) {
        return true;
    }
    // never is bottom: never <: anything.
    if matches!(a, Type::Never) {
        return true;
    }
    // unknown is top: anything <: unknown.
    if matches!(b, Type::Unknown) {
        return true;
    }
    if matches!(a, Type::Unknown) {
        return matches!(b, Type::Unknown);
    }
    if matches!(b, Type::Never) {
        return false;
    }

    if a == b {
        return true;
    }

    match (&a, &b) {
        // unions distribute: A <: B|C iff A <: B or A <: C.
        (_, Type::Union(members)) => members.iter().any(|m| is_subtype_depth(&a, m, depth + 1)),
        // A|B <: C iff both A <: C and B <: C.
        (Type::Union(members), _) => members.iter().all(|m| is_subtype_depth(m, &b, depth + 1)),

        // dual for intersections.
        (Type::Intersection(members), _) => {
            members.iter().any(|m| is_subtype_depth(m, &b, depth + 1))
        }
        (_, Type::Intersection(members)) => {
            members.iter().all(|m| is_subtype_depth(&a, m, depth + 1))
        }

        // literal types are subtypes of their base primitive.
        (Type::NumberLiteral(_), Type::Number) => true,
        (Type::StringLiteral(_), Type::String) => true,
        (Type::BooleanLiteral(_), Type::Boolean) => true,

        (Type::Array(a_elem), Type::Array(b_elem)) => {
            is_subtype_depth(a_elem, b_elem, depth + 1)
        }

        (
            Type::Tuple {
                elements: a_els,
                optional: a_opt,
                rest: a_rest,
            },
            Type::Tuple {
                elements: b_els,
                optional: b_opt,
                rest: b_rest,
            },
        ) => tuple_subtype(a_els, a_opt, a_rest, b_els, b_opt, b_rest, depth),

        // an array is a valid source for a tuple type only if the tuple
        // is effectively `T[]` (a bare rest with no fixed elements);
        // the reverse (tuple <: array) always holds for fixed-length
        // tuples once their common element type is unified.
        (Type::Tuple { elements, rest, .. }, Type::Array(b_elem)) => {
            elements
                .iter()
                .all(|e| is_subtype_depth(e, b_elem, depth + 1))
                && rest
                    .as_ref()
                    .is_none_or(|r| is_subtype_depth(r, b_elem, depth + 1))
        }

        (Type::Object(a_obj), Type::Object(b_obj)) => object_subtype(a_obj, b_obj, depth),

        (Type::Function(a_fn), Type::Function(b_fn)) => function_subtype(a_fn, b_fn, depth),

        (Type::TypeParameter(a_param), Type::TypeParameter(b_param)) => a_param.id == b_param.id,
        (Type::TypeParameter(a_param), _) => a_param
            .constraint
            .as_ref()
            .is_some_and(|c| is_subtype_depth(c, &b, depth + 1)),

        (Type::Promise(a_inner), Type::Promise(b_inner)) => {
            is_subtype_depth(a_inner, b_inner, depth + 1)
        }
        (Type::Generator(a_inner), Type::Generator(b_inner)) => {
            is_subtype_depth(a_inner, b_inner, depth + 1)
        }

        _ => false,
    }
}

#[allow(clippy::too_many_arguments)]
fn tuple_subtype(
    a_els: &[std::rc::Rc<Type>],
    a_opt: &[bool],
    a_rest: &Option<std::rc::Rc<Type>>,
    b_els: &[std::rc::Rc<Type>],
    b_opt: &[bool],
    b_rest: &Option<std::rc::Rc<Type>>,
    depth: usize,
) -> bool {
    // every required position in b must be satisfiable by a.
    for i in 0..b_els.len() {
        let b_required = !b_opt.get(i).copied().unwrap_or(false);
        match a_els.get(i) {
            Some(a_el) => {
                if !is_subtype_depth(a_el, &b_els[i], depth + 1) {
                    return false;
                }
            }
            None => {
                if let Some(rest) = a_rest {
                    if !is_subtype_depth(rest, &b_els[i], depth + 1) {
                        return false;
                    }
                } else if b_required {
                    return false;
                }
            }
        }
    }
    if a_els.len() > b_els.len() && b_rest.is_none() {
        // extra required source elements with nowhere to go
        for i in b_els.len()..a_els.len() {
            if !a_opt.get(i).copied().unwrap_or(false) {
                return false;
            }
        }
    }
    match (a_rest, b_rest) {
        (Some(a_r), Some(b_r)) => is_subtype_depth(a_r, b_r, depth + 1),
        (None, Some(_)) | (None, None) => true,
        (Some(_), None) => false,
    }
}

fn object_subtype(a: &ObjectType, b: &ObjectType, depth: usize) -> bool {
    for b_prop in &b.properties {
        match a.properties.iter().find(|p| p.name == b_prop.name) {
            Some(a_prop) => {
                if b_prop.readonly != a_prop.readonly && !b_prop.readonly {
                    // b demands mutability a doesn't offer
                    return false;
                }
                if !is_subtype_depth(&a_prop.ty, &b_prop.ty, depth + 1) {
                    return false;
                }
                if a_prop.optional && !b_prop.optional {
                    return false;
                }
            }
            None => {
                if !b_prop.optional {
                    return false;
                }
            }
        }
    }
    for b_sig in &b.call_signatures {
        if !a
            .call_signatures
            .iter()
            .any(|a_sig| function_subtype(a_sig, b_sig, depth + 1))
        {
            return false;
        }
    }
    for b_idx in &b.index_signatures {
        if !a.index_signatures.iter().any(|a_idx| {
            a_idx.key_type == b_idx.key_type
                && is_subtype_depth(&a_idx.value_type, &b_idx.value_type, depth + 1)
        }) {
            return false;
        }
    }
    true
}

/// Functions are contravariant in parameters, covariant in returns.
fn function_subtype(a: &FunctionType, b: &FunctionType, depth: usize) -> bool {
    if !is_subtype_depth(&a.return_type, &b.return_type, depth + 1) {
        return false;
    }
    // b may be called with fewer args than a declares only if a's
    // extra params are optional or rest.
    for i in 0..b.params.len() {
        match a.params.get(i) {
            Some(a_param) => {
                if !is_subtype_depth(&b.params[i], a_param, depth + 1) {
                    return false;
                }
            }
            None => {
                if a.rest.is_none() {
                    return false;
                }
                if !is_subtype_depth(&b.params[i], a.rest.as_ref().unwrap(), depth + 1) {
                    return false;
                }
            }
        }
    }
    for i in b.params.len()..a.params.len() {
        if !a.optional.get(i).copied().unwrap_or(false) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyType;

    #[test]
    fn reflexivity() {
        assert!(is_subtype(&Type::Number, &Type::Number));
        assert!(is_subtype(&Type::String, &Type::String));
    }

    #[test]
    fn any_is_bottom_and_top() {
        assert!(is_subtype(&Type::Any, &Type::Number));
        assert!(is_subtype(&Type::Number, &Type::Any));
    }

    #[test]
    fn never_is_bottom_unknown_is_top() {
        assert!(is_subtype(&Type::Never, &Type::String));
        assert!(is_subtype(&Type::String, &Type::Unknown));
        assert!(!is_subtype(&Type::Unknown, &Type::String));
    }

    #[test]
    fn literal_subtype_of_primitive() {
        assert!(is_subtype(
            &Type::NumberLiteral(crate::types::OrdF64(1.0)),
            &Type::Number
        ));
    }

    #[test]
    fn union_distributes() {
        let union = Type::union(vec![Type::Number, Type::String]);
        assert!(is_subtype(&Type::Number, &union));
        assert!(!is_subtype(&union, &Type::Number));
    }

    #[test]
    fn function_contravariant_params_covariant_return() {
        let wide = Type::function(vec![Type::Any], Type::Number);
        let narrow = Type::function(vec![Type::String], Type::Number);
        // accepts-anything fn is usable wherever accepts-a-string is expected
        assert!(is_subtype(&wide, &narrow));
    }

    #[test]
    fn object_width_subtyping() {
        let wide = Type::object(vec![
            PropertyType {
                name: "x".into(),
                ty: Type::Number,
                optional: false,
                readonly: false,
            },
            PropertyType {
                name: "y".into(),
                ty: Type::Number,
                optional: false,
                readonly: false,
            },
        ]);
        let narrow = Type::object(vec![PropertyType {
            name: "x".into(),
            ty: Type::Number,
            optional: false,
            readonly: false,
        }]);
        assert!(is_subtype(&wide, &narrow));
        assert!(!is_subtype(&narrow, &wide));
    }

    #[test]
    fn transitivity_sample() {
        let lit = Type::NumberLiteral(crate::types::OrdF64(1.0));
        assert!(is_subtype(&lit, &Type::Number));
        assert!(is_subtype(&Type::Number, &Type::Unknown));
        assert!(is_subtype(&lit, &Type::Unknown));
    }
}
