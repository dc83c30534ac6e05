//! Overload resolution.
//!
//! Given N overload signatures, a call is resolved to the first whose
//! parameter types each accept the argument types, in source order. The
//! implementation signature (if present) is checked once, at
//! definition time, to be a supertype of every overload — not
//! considered a candidate for call resolution itself.

use crate::types::{is_subtype, FunctionType};

/// Pick the first overload every one of whose (non-rest) parameters
/// accepts the corresponding argument type. Returns the overload's
/// index, so the caller can report which signature actually matched.
pub fn resolve_overload<'a>(
    overloads: &'a [FunctionType],
    arg_types: &[crate::types::Type],
) -> Option<(usize, &'a FunctionType)> {
    overloads.iter().enumerate().find(|(_, sig)| {
        if arg_types.len() > sig.params.len() && sig.rest.is_none() {
            return false;
        }
        for (i, arg) in arg_types.iter().enumerate() {
            let accepted = match sig.params.get(i) {
                Some(p) => is_subtype(arg, p),
                None => match &sig.rest {
                    Some(r) => is_subtype(arg, r),
                    None => false,
                },
            };
            if !accepted {
                return false;
            }
        }
        for i in arg_types.len()..sig.params.len() {
            if !sig.optional.get(i).copied().unwrap_or(false) {
                return false;
            }
        }
        true
    })
}

/// The implementation signature must be a supertype of every overload,
/// checked once at definition.
pub fn implementation_covers_overloads(
    implementation: &FunctionType,
    overloads: &[FunctionType],
) -> bool {
    overloads
        .iter()
        .all(|sig| is_subtype(&crate::types::Type::Function(std::rc::Rc::new(sig.clone())),
             &crate::types::Type::Function(std::rc::Rc::new(implementation.clone()))))
}
