//! End-to-end program scenarios: source text in, observable VM result
//! out, driven through the public pipeline entry points exactly like
//! an embedder would use this crate. Placed at the top level rather
//! than in a `#[cfg(test)]` module since these exercise the full
//! lex-parse-check-desugar-compile-run pipeline, not one stage.

use paserati::diagnostics::Config;
use paserati::vm::Value;

fn run(source: &str) -> Value {
    paserati::run_source(source, &Config::default())
        .unwrap_or_else(|e| panic!("expected program to run, got error:\n{e}"))
}

#[test]
fn arithmetic_on_locals() {
    let v = run("let x = 1; let y = x + 2; y");
    assert_eq!(v.display_string(), "3");
}

#[test]
fn function_call_returns_sum() {
    let v = run("function add(a: number, b: number) { return a + b; } add(40, 2)");
    assert_eq!(v.display_string(), "42");
}

#[test]
fn closures_share_mutable_state() {
    let v = run(
        "function mk() { let n = 0; return { inc: () => ++n, get: () => n }; }
         let c = mk(); c.inc(); c.inc(); c.get()",
    );
    assert_eq!(v.display_string(), "2");
}

#[test]
fn object_shorthand_properties_share_the_enclosing_closures_upvalue() {
    let v = run(
        "function mk() {
           let n = 0;
           let inc = () => { n = n + 1; };
           let get = () => n;
           return { inc, get };
         }
         let c = mk();
         c.inc();
         c.inc();
         c.get()",
    );
    assert_eq!(v.display_string(), "2");
}

#[test]
fn typeof_narrowing_picks_the_right_branch() {
    let src = "function f(x: string|number) { if (typeof x === \"string\") { return x.length; } else { return x + 1; } }";
    let a = run(&format!("{src} f(\"abc\")"));
    assert_eq!(a.display_string(), "3");
    let b = run(&format!("{src} f(10)"));
    assert_eq!(b.display_string(), "11");
}

#[test]
fn generic_identity_widens_a_literal_argument() {
    let v = run("function id<T>(x: T): T { return x; } id(7)");
    assert_eq!(v.display_string(), "7");
}

#[test]
fn overload_resolution_picks_matching_signature_and_rejects_mismatches() {
    let config = Config::default();
    let overloads = "function g(x: number): number;
                      function g(x: string): string;
                      function g(x: any): any { return x; }";

    let ok_number = paserati::run_source(&format!("{overloads} g(1)"), &config);
    assert!(ok_number.is_ok(), "{:?}", ok_number.err());
    assert_eq!(ok_number.unwrap().display_string(), "1");

    let ok_string = paserati::run_source(&format!("{overloads} g(\"a\")"), &config);
    assert!(ok_string.is_ok(), "{:?}", ok_string.err());
    assert_eq!(ok_string.unwrap().display_string(), "a");

    let rejected = paserati::run_source(&format!("{overloads} g(true)"), &config);
    assert!(
        matches!(rejected, Err(paserati::PipelineError::Type(_))),
        "expected a type error for g(true), got {rejected:?}"
    );
}

#[test]
fn step_budget_aborts_an_infinite_loop() {
    let config = Config {
        step_budget: Some(1_000),
        ..Config::default()
    };
    let result = paserati::run_source("let i = 0; while (true) { i = i + 1; }", &config);
    assert!(matches!(result, Err(paserati::PipelineError::Runtime(_))));
}

#[test]
fn labeled_break_exits_the_outer_loop() {
    let v = run(
        "let total = 0;
         outer: for (let i = 0; i < 3; i = i + 1) {
           for (let j = 0; j < 3; j = j + 1) {
             if (j === 1) { break outer; }
             total = total + 1;
           }
         }
         total",
    );
    assert_eq!(v.display_string(), "1");
}

#[test]
fn labeled_continue_skips_to_the_outer_loops_next_iteration() {
    let v = run(
        "let total = 0;
         outer: for (let i = 0; i < 3; i = i + 1) {
           for (let j = 0; j < 3; j = j + 1) {
             if (j === 1) { continue outer; }
             total = total + 1;
           }
         }
         total",
    );
    assert_eq!(v.display_string(), "3");
}

#[test]
fn array_rest_pattern_collects_remaining_elements() {
    let v = run("let [a, ...rest] = [1, 2, 3, 4]; rest.length");
    assert_eq!(v.display_string(), "3");
    let first = run("let [a, ...rest] = [1, 2, 3, 4]; rest[0]");
    assert_eq!(first.display_string(), "2");
}

#[test]
fn object_rest_pattern_excludes_destructured_keys() {
    let v = run("let {a, ...rest} = {a: 1, b: 2, c: 3}; rest.b");
    assert_eq!(v.display_string(), "2");
    let missing = run("let {a, ...rest} = {a: 1, b: 2, c: 3}; rest.a");
    assert_eq!(missing.display_string(), "undefined");
}

#[test]
fn function_param_rest_pattern_collects_extra_arguments() {
    let v = run(
        "function f([a, ...rest]: number[]) { return rest[1]; }
         f([1, 2, 3, 4])",
    );
    assert_eq!(v.display_string(), "3");
}

#[test]
fn protected_member_rejects_access_from_an_unrelated_class() {
    let config = Config::default();
    let result = paserati::run_source(
        "class A { protected x: number = 1; }
         class B { getX(a: A): number { return a.x; } }
         new B().getX(new A())",
        &config,
    );
    assert!(
        matches!(result, Err(paserati::PipelineError::Type(_))),
        "expected a type error reading a protected member from an unrelated class, got {result:?}"
    );
}

#[test]
fn protected_member_is_readable_through_a_subclass_typed_reference() {
    let v = run(
        "class A { protected x: number = 1; }
         class C extends A { getX(other: A): number { return other.x; } }
         new C().getX(new C())",
    );
    assert_eq!(v.display_string(), "1");
}

#[test]
fn max_call_depth_reports_stack_overflow_instead_of_aborting_the_process() {
    let config = Config {
        max_call_depth: 64,
        ..Config::default()
    };
    let result = paserati::run_source(
        "function recurse(n: number): number { return recurse(n + 1); } recurse(0)",
        &config,
    );
    assert!(matches!(result, Err(paserati::PipelineError::Runtime(_))));
}
