pub mod assign;
pub mod checker;
pub mod codegen;
pub mod context;
pub mod driver;
pub mod module_resolver;
pub mod resolver;
pub mod types;
pub mod utils;
pub mod wasm;

// Re-export diagnostics from zena-diagnostics crate
pub use zena_diagnostics as diagnostics;

pub use checker::check_program;
pub use context::CheckerContext;
pub use diagnostics::{Diagnostic, DiagnosticEngine, ErrorLevel, Span};
pub use driver::{compile, CompileError, CompileInput, FsModuleHost, ModuleHost};
pub use module_resolver::ModuleResolver;
pub use types::Type;
pub use utils::safe_arithmetic::{
    safe_array_size, safe_field_index, safe_param_index, CheckedArithmetic, SafeCast,
};
