//! Structural invariants that aren't naturally an "end-to-end
//! scenario": register-frame sizing, jump legality, and
//! the type-algebra properties (canonical union, subtyping
//! reflexivity/transitivity) the checker depends on.

use std::rc::Rc;

use paserati::compiler::opcode::Op;
use paserati::diagnostics::Config;
use paserati::types::{canonicalize_union, is_subtype};
use paserati::types::{ObjectType, PropertyType, Type};

fn compile(source: &str) -> paserati::compiler::chunk::FunctionProto {
    paserati::compile_source(source, &Config::default())
        .unwrap_or_else(|e| panic!("expected compilation to succeed, got:\n{e}"))
}

/// The register-discipline invariant ("the reported register-frame
/// size equals max(register-id-used)+1") is checked
/// behaviorally rather than by re-deriving the byte layout of every
/// opcode here: a function whose `frame_size` under-counts its live
/// registers corrupts an unrelated local on every temporary it
/// allocates past that bound, so a program that keeps many locals
/// alive simultaneously and checks each one's value independently
/// would fail if registers were being aliased. `frame_size` itself is
/// a `u8`, so the "≤ 255" half of the invariant holds structurally by
/// the type system and needs no separate check.
#[test]
fn register_frame_size_is_large_enough_for_many_live_locals() {
    let v = paserati::run_source(
        "function many(): number {
           let a = 1; let b = 2; let c = 3; let d = 4; let e = 5;
           let f = 6; let g = 7; let h = 8; let i = 9; let j = 10;
           return a + b + c + d + e + f + g + h + i + j;
         }
         many()",
        &Config::default(),
    )
    .unwrap();
    assert_eq!(v.display_string(), "55");
}

#[test]
fn register_frame_size_is_large_enough_across_nested_closures() {
    let v = paserati::run_source(
        "function mk() {
           let a = 1; let b = 2; let c = 3;
           return () => a + b + c;
         }
         mk()()",
        &Config::default(),
    )
    .unwrap();
    assert_eq!(v.display_string(), "6");
}

#[test]
fn frame_size_never_exceeds_a_byte() {
    let proto = compile(
        "function many(): number {
           let a = 1; let b = 2; let c = 3; let d = 4; let e = 5;
           return a + b + c + d + e;
         }
         many()",
    );
    assert!(proto.frame_size as usize <= u8::MAX as usize);
}

/// Every `Jump`/`JumpIfFalse`/`JumpIfTrue` target must land inside the
/// chunk that contains it.
fn assert_jump_legality(proto: &paserati::compiler::chunk::FunctionProto) {
    let code = &proto.chunk.code;
    let mut offset = 0;
    while offset < code.len() {
        let op = Op::from_byte(code[offset]).expect("valid opcode");
        match op {
            Op::Jump => {
                let target = u16::from_be_bytes([code[offset + 1], code[offset + 2]]) as usize;
                assert!(target <= code.len(), "jump target {target} out of bounds");
            }
            Op::JumpIfFalse | Op::JumpIfTrue => {
                let target = u16::from_be_bytes([code[offset + 2], code[offset + 3]]) as usize;
                assert!(target <= code.len(), "jump target {target} out of bounds");
            }
            _ => {}
        }
        offset += 1
            + if op == Op::Closure {
                4 + (code[offset + 4] as usize) * 2
            } else {
                op.operand_len()
            };
    }
    for constant in &proto.chunk.constants {
        if let paserati::compiler::chunk::Constant::Function(nested) = constant {
            assert_jump_legality(nested);
        }
    }
}

#[test]
fn every_jump_target_is_in_bounds() {
    let proto = compile(
        "function classify(n: number): string {
           if (n < 0) { return \"negative\"; }
           else if (n === 0) { return \"zero\"; }
           else { return \"positive\"; }
         }
         classify(-5)",
    );
    assert_jump_legality(&proto);
}

#[test]
fn every_jump_target_is_in_bounds_for_loops() {
    let proto = compile(
        "function sum_to(n: number): number {
           let total = 0;
           let i = 0;
           while (i < n) { total = total + i; i = i + 1; }
           return total;
         }
         sum_to(10)",
    );
    assert_jump_legality(&proto);
}

#[test]
fn canonical_union_dedupes_and_flattens() {
    let a = Type::Union(Rc::new(vec![Type::Number, Type::String]));
    let flattened = canonicalize_union(vec![
        Type::Number,
        Type::String,
        a,
        Type::String,
    ]);
    let expected = canonicalize_union(vec![Type::Number, Type::String]);
    assert_eq!(flattened, expected);
}

#[test]
fn canonical_union_of_one_member_collapses_to_that_member() {
    assert_eq!(canonicalize_union(vec![Type::Boolean]), Type::Boolean);
}

#[test]
fn canonical_union_absorbs_any() {
    assert_eq!(canonicalize_union(vec![Type::Number, Type::Any]), Type::Any);
}

#[test]
fn subtyping_is_reflexive() {
    let object = Type::Object(Rc::new(ObjectType {
        properties: vec![PropertyType {
            name: "x".to_string(),
            ty: Type::Number,
            optional: false,
            readonly: false,
        }],
        ..Default::default()
    }));
    assert!(is_subtype(&Type::Number, &Type::Number));
    assert!(is_subtype(&object, &object));
}

#[test]
fn subtyping_is_transitive() {
    let wide = Type::Union(Rc::new(vec![Type::Number, Type::String, Type::Boolean]));
    let narrow = Type::Union(Rc::new(vec![Type::Number, Type::String]));
    assert!(is_subtype(&Type::Number, &narrow));
    assert!(is_subtype(&narrow, &wide));
    assert!(is_subtype(&Type::Number, &wide));
}

#[test]
fn any_is_both_top_and_bottom_for_subtyping() {
    assert!(is_subtype(&Type::Any, &Type::String));
    assert!(is_subtype(&Type::String, &Type::Any));
}
