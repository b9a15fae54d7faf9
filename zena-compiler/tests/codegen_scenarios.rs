//! End-to-end driver scenarios: parse -> check -> lower to WasmGC bytes.
//! Mirrors the accepted-program cases from the compiler's testable-
//! properties suite (spec §8). Since no WasmGC runtime is available in
//! this workspace, these assert on successful compilation, a well-formed
//! module header, and determinism rather than on executed results.

use zena_compiler::driver::{compile, CompileInput};

fn compile_ok(source: &str) -> Vec<u8> {
    match compile(CompileInput::Source(source)) {
        Ok(bytes) => bytes,
        Err(err) => panic!("expected successful compile, got {err:?}"),
    }
}

fn has_wasm_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && bytes[0..4] == [0x00, 0x61, 0x73, 0x6d]
}

#[test]
fn s1_fixed_array_length_compiles() {
    let bytes = compile_ok(
        r#"
        export fn main(): i32 {
            let arr = [10, 20, 30];
            return arr.length;
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));
}

#[test]
fn s2_index_mutation_compiles() {
    let bytes = compile_ok(
        r#"
        export fn main(): i32 {
            let arr = [10, 20, 30];
            arr[1] = 50;
            return arr[1];
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));
}

#[test]
fn s5_mixin_composition_compiles() {
    let bytes = compile_ok(
        r#"
        class A {}
        mixin M on A {
            fn greet(): i32 { return 7; }
        }
        class B extends A with M {}
        export fn main(): i32 {
            return new B().greet();
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));
}

#[test]
fn s6_distinct_alias_cast_compiles_but_bare_literal_is_rejected() {
    let bytes = compile_ok(
        r#"
        type UserId = distinct i32;
        export fn main(): UserId {
            let u: UserId = 5 as UserId;
            return u;
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));

    let err = compile(CompileInput::Source(
        r#"
        type UserId = distinct i32;
        export fn main(): void {
            let u: UserId = 5;
        }
        "#,
    ))
    .expect_err("assigning a bare i32 literal to a distinct alias must be a checker error");
    match err {
        zena_compiler::CompileError::CheckFailed { diagnostics } => {
            assert!(diagnostics.iter().any(|d| d.code == "TypeMismatch"));
        }
        other => panic!("expected CheckFailed, got {other:?}"),
    }
}

#[test]
fn determinism_two_compiles_of_the_same_source_are_byte_identical() {
    let source = r#"
        class Counter {
            value: i32;
            new(value: i32) { this.value = value; }
            fn bump(): i32 { return this.value + 1; }
        }
        export fn main(): i32 {
            let c = new Counter(41);
            return c.bump();
        }
        "#;
    let first = compile_ok(source);
    let second = compile_ok(source);
    assert_eq!(first, second, "compile(S) must be deterministic across runs");
}

#[test]
fn s3_out_of_bounds_array_access_compiles() {
    // An out-of-bounds index traps at runtime via WasmGC's `array.get`
    // bounds check, not at compile time — there's no WasmGC runtime in
    // this workspace to observe the trap, so this only confirms the
    // access itself still lowers to a valid module.
    let bytes = compile_ok(
        r#"
        export fn main(): i32 {
            let arr = [10, 20, 30];
            return arr[5];
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));
}

#[test]
fn s4_virtual_dispatch_across_derived_iterable_compiles() {
    let bytes = compile_ok(
        r#"
        class RangeIter implements Iterator<i32> {
            values: i32[];
            mut pos: i32;
            new(values: i32[]) {
                this.values = values;
                this.pos = 0;
            }
            fn next(): (bool, i32) {
                if (this.pos < this.values.length) {
                    let v = this.values[this.pos];
                    this.pos = this.pos + 1;
                    return (true, v);
                }
                return (false, 0);
            }
        }
        class BaseIterable {
            fn iterator(): Iterator<i32> {
                return new RangeIter([0, 1, 2]);
            }
        }
        class DerivedIterable extends BaseIterable {
            fn iterator(): Iterator<i32> {
                return new RangeIter([10, 11, 12]);
            }
        }
        export fn main(): i32 {
            let x: BaseIterable = new DerivedIterable();
            let mut sum = 0;
            for n in x {
                sum = sum + n;
            }
            return sum;
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));
}

#[test]
fn closure_capture_by_value_compiles() {
    // S-closures: a closure capturing a local by value, called after
    // the local's lexical scope ends, lowers cleanly end to end.
    let bytes = compile_ok(
        r#"
        fn makeAdder(x: i32): (i32) -> i32 {
            return (y: i32) => x + y;
        }
        export fn main(): i32 {
            let add5 = makeAdder(5);
            return add5(10);
        }
        "#,
    );
    assert!(has_wasm_magic(&bytes));
}
