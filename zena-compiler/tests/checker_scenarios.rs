//! End-to-end checker scenarios mirroring the accepted-program cases
//! from the compiler's testable-properties suite: parse real source
//! text through `zena_parser`, run it through `check_program`, and
//! assert on the resulting diagnostics and `ProgramTypes` shape.

use zena_compiler::checker::check_program;
use zena_diagnostics::SpanMap;

fn check(source: &str) -> zena_compiler::checker::CheckResult {
    let mut parser = zena_parser::Parser::new(source).expect("lexes");
    let program = parser.parse_file().expect("parses");
    check_program(&program, "test.zena", SpanMap::new())
}

#[test]
fn mixin_composition_checks_clean() {
    // S5: class A {} + mixin M on A { greet(): i32 { return 7; } } +
    // class B extends A with M {}.
    let result = check(
        r#"
        class A {}
        mixin M on A {
            fn greet(): i32 { return 7; }
        }
        class B extends A with M {}
        "#,
    );
    assert!(!result.ctx.diagnostics.has_errors(), "{:?}", result.ctx.diagnostics.diagnostics());
    assert!(result.program_types.classes.contains_key("B"));
    // Linearisation intercalates an intermediate `A_M` class between
    // `B` and `A` in the super chain.
    let b = &result.program_types.classes["B"];
    let super_name = match &*b.super_type.borrow() {
        Some(zena_compiler::types::Type::Class(c)) => c.name.clone(),
        other => panic!("expected a linearised intermediate superclass, got {other:?}"),
    };
    assert!(super_name.contains("A") && super_name.contains("M"));
}

#[test]
fn distinct_alias_rejects_unconverted_literal() {
    // S6: `type UserId = distinct i32;` then `let u: UserId = 5;` must
    // raise TypeMismatch, independent of the `as UserId` cast form.
    let result = check(
        r#"
        type UserId = distinct i32;
        fn useIt(): void {
            let u: UserId = 5;
        }
        "#,
    );
    assert!(result.ctx.diagnostics.has_errors());
    assert!(result
        .ctx
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "TypeMismatch"));
}

#[test]
fn constructor_inside_mixin_is_rejected() {
    let result = check(
        r#"
        class A {}
        mixin M on A {
            new() {}
        }
        "#,
    );
    assert!(result
        .ctx
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "ConstructorInMixin"));
}

#[test]
fn abstract_method_in_concrete_class_is_rejected() {
    let result = check(
        r#"
        class Shape {
            abstract fn area(): i32;
        }
        "#,
    );
    assert!(result
        .ctx
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "AbstractMethodInConcreteClass"));
}

#[test]
fn bare_return_inside_constructor_is_not_return_outside_function() {
    // Constructor bodies are allowed a bare `return;` for early exit;
    // ReturnOutsideFunction must not misfire on this well-formed shape.
    let result = check(
        r#"
        class Empty {
            new() {
                return;
            }
        }
        "#,
    );
    assert!(!result
        .ctx
        .diagnostics
        .diagnostics()
        .iter()
        .any(|d| d.code == "ReturnOutsideFunction"));
}

#[test]
fn super_call_initializes_this_before_use() {
    let result = check(
        r#"
        class Base {
            x: i32;
            new(x: i32) { this.x = x; }
        }
        class Derived extends Base {
            y: i32;
            new(x: i32, y: i32) {
                super(x);
                this.y = y;
            }
        }
        "#,
    );
    assert!(!result.ctx.diagnostics.has_errors(), "{:?}", result.ctx.diagnostics.diagnostics());
}

#[test]
fn well_known_iterable_interface_is_registered() {
    let result = check("class Nothing {}");
    assert!(result.ctx.well_known.iterable.is_some());
    assert!(result.ctx.well_known.iterator.is_some());
    assert!(result.ctx.well_known.string.is_some());
}
