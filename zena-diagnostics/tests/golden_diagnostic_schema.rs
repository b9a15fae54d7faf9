use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;
use zena_diagnostics::{Diagnostic, DiagnosticEngine, Span};

#[test]
fn test_diagnostics_json_against_schema() {
    let mut engine = DiagnosticEngine::new();

    let span = Span::new("main.zena".to_string(), 2, 5, 12, 15);
    let suggestion_span = span.clone();
    let related_span = Span::new("lib.zena".to_string(), 4, 2, 30, 34);

    let diag = Diagnostic::error(
        "SymbolNotFound",
        "cannot find `foo` in this scope".to_string(),
        span,
    )
    .with_help("did you mean `foo_bar`?".to_string())
    .with_primary_label("undefined variable".to_string())
    .with_suggestion(
        "rename to foo_bar".to_string(),
        "foo_bar".to_string(),
        suggestion_span,
    )
    .with_related(related_span, "declared here".to_string());

    engine.emit(diag);

    let json = engine.to_json();
    let v: Value = serde_json::from_str(&json).expect("valid json");

    let schema_str =
        fs::read_to_string("schemas/diagnostic.schema.json").expect("schema exists");
    let schema_json: Value = serde_json::from_str(&schema_str).expect("valid schema");
    let compiled = JSONSchema::compile(&schema_json).expect("valid schema compiles");

    let result = compiled.validate(&v);
    if let Err(errors) = result {
        for err in errors {
            panic!("schema validation error: {}", err);
        }
    }
}
