//! Round-trip properties, exercised at the crate's public boundary:
//! print-then-reparse for the AST, and compile-determinism as the
//! proxy for "assemble -> disassemble -> re-assemble" since this crate
//! has no textual bytecode assembler to round-trip through (only a
//! disassembler) — see `DESIGN.md`.

use paserati::diagnostics::Config;
use paserati::printer::JSEmitter;

fn parse(src: &str) -> paserati::ast::Ast {
    paserati::parse_source(src).unwrap_or_else(|e| panic!("parse failed:\n{e}"))
}

#[test]
fn printing_and_reparsing_a_program_yields_an_equivalent_ast() {
    let src = "function fib(n: number): number {
                 if (n < 2) { return n; }
                 return fib(n - 1) + fib(n - 2);
               }
               let results = [fib(0), fib(1), fib(2), fib(3)];";
    let ast = parse(src);
    let printed = JSEmitter::new().emit(&ast);
    let reparsed = parse(&printed);
    // Re-printing the reparsed tree should be stable: printing isn't
    // required to be idempotent on raw source (trivia differs) but it
    // must be idempotent on its own output, since by the second pass
    // every shorthand/implicit form the printer could have introduced
    // is already explicit.
    let reprinted = JSEmitter::new().emit(&reparsed);
    assert_eq!(printed, reprinted);
}

#[test]
fn compiling_the_same_source_twice_produces_identical_bytecode() {
    let src = "function add(a: number, b: number): number { return a + b; } add(1, 2)";
    let config = Config::default();
    let first = paserati::compile_source(src, &config).unwrap();
    let second = paserati::compile_source(src, &config).unwrap();
    assert_eq!(first.chunk.code, second.chunk.code);
    assert_eq!(first.chunk.disassemble("<script>"), second.chunk.disassemble("<script>"));
}
