//! Union/intersection canonicalization. Union members are
//! order-insensitive for equality but preserve insertion order for
//! display; `Union` never contains another `Union` after
//! canonicalization; `Intersection` of objects is computed by property
//! merge.

use std::rc::Rc;

use super::{ObjectType, PropertyType, Type};

/// Flatten nested unions, drop duplicate members (by structural
/// equality), and drop `never` (the identity element for union).
pub fn canonicalize_union(members: Vec<Type>) -> Type {
    let mut flat = Vec::new();
    flatten_union(members, &mut flat);

    flat.retain(|t| !t.is_never());

    let mut deduped: Vec<Type> = Vec::new();
    for member in flat {
        if !deduped.iter().any(|existing| existing == &member) {
            deduped.push(member);
        }
    }

    if deduped.iter().any(Type::is_any) {
        return Type::Any;
    }

    match deduped.len() {
        0 => Type::Never,
        1 => deduped.into_iter().next().unwrap(),
        _ => Type::Union(Rc::new(deduped)),
    }
}

fn flatten_union(members: Vec<Type>, out: &mut Vec<Type>) {
    for member in members {
        match member {
            Type::Union(inner) => flatten_union((*inner).clone(), out),
            other => out.push(other),
        }
    }
}

/// Intersections flatten the same way; `unknown` is the identity
/// element and `never` absorbs everything. Object members merge their
/// properties.
pub fn canonicalize_intersection(members: Vec<Type>) -> Type {
    let mut flat = Vec::new();
    flatten_intersection(members, &mut flat);

    if flat.iter().any(Type::is_never) {
        return Type::Never;
    }
    flat.retain(|t| !matches!(t, Type::Unknown));

    let mut deduped: Vec<Type> = Vec::new();
    for member in flat {
        if !deduped.iter().any(|existing| existing == &member) {
            deduped.push(member);
        }
    }

    if deduped.iter().any(Type::is_any) {
        return Type::Any;
    }

    if deduped.iter().all(|t| matches!(t, Type::Object(_))) && deduped.len() > 1 {
        return merge_objects(&deduped);
    }

    match deduped.len() {
        0 => Type::Unknown,
        1 => deduped.into_iter().next().unwrap(),
        _ => Type::Intersection(Rc::new(deduped)),
    }
}

fn flatten_intersection(members: Vec<Type>, out: &mut Vec<Type>) {
    for member in members {
        match member {
            Type::Intersection(inner) => flatten_intersection((*inner).clone(), out),
            other => out.push(other),
        }
    }
}

fn merge_objects(members: &[Type]) -> Type {
    let mut merged = ObjectType::default();
    for member in members {
        let Type::Object(obj) = member else { unreachable!() };
        for prop in &obj.properties {
            if let Some(existing) = merged
                .properties
                .iter_mut()
                .find(|p: &&mut PropertyType| p.name == prop.name)
            {
                // last writer wins for the merged value type, but a
                // member stays required if any contributor requires it
                existing.optional &= prop.optional;
                existing.ty = prop.ty.clone();
            } else {
                merged.properties.push(prop.clone());
            }
        }
        merged.index_signatures.extend(obj.index_signatures.clone());
        merged.call_signatures.extend(obj.call_signatures.clone());
        merged
            .construct_signatures
            .extend(obj.construct_signatures.clone());
    }
    Type::Object(Rc::new(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_union_dedupes_and_flattens() {
        let a = Type::Number;
        let b = Type::String;
        let nested = canonicalize_union(vec![a.clone(), b.clone()]);
        let flattened = canonicalize_union(vec![a.clone(), b.clone(), a.clone(), nested]);
        let expected = canonicalize_union(vec![a, b]);
        assert_eq!(flattened, expected);
    }

    #[test]
    fn single_member_union_collapses() {
        assert_eq!(canonicalize_union(vec![Type::Number]), Type::Number);
    }

    #[test]
    fn union_absorbs_never() {
        assert_eq!(
            canonicalize_union(vec![Type::Number, Type::Never]),
            Type::Number
        );
    }
}
