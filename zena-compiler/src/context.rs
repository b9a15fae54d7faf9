//! Checker-wide state: lexical/type scopes, the well-known type registry,
//! the generic-instantiation interner and the diagnostics sink.

use std::collections::HashMap;
use std::rc::Rc;

use zena_ast::NodeId;
use zena_diagnostics::{Diagnostic, DiagnosticEngine, Span, SpanMap};

use crate::types::intern::TypeInterner;
use crate::types::{InterfaceType, Type};

/// One lexical block's bindings. Scopes nest; lookups walk outward.
#[derive(Default)]
struct Scope {
    variables: HashMap<String, Type>,
    mutable: HashMap<String, bool>,
}

/// Well-known, always-in-scope interface types a resolver consults when
/// it needs to check e.g. "is this type iterable" without re-deriving
/// the interface from source on every call (SPEC_FULL §4.12: `String`,
/// `FixedArray<T>`, `Iterator<T>`, `Iterable<T>`, `Comparable<T>`,
/// `Equatable`).
#[derive(Default)]
pub struct WellKnownTypes {
    pub string: Option<Type>,
    pub fixed_array: Option<Rc<InterfaceType>>,
    pub iterator: Option<Rc<InterfaceType>>,
    pub iterable: Option<Rc<InterfaceType>>,
    pub comparable: Option<Rc<InterfaceType>>,
    pub equatable: Option<Rc<InterfaceType>>,
}

/// Everything the checker threads through a single compilation: scope
/// stacks, the generic interner, diagnostics, and a handful of
/// transient flags that only make sense while checking one declaration
/// at a time.
pub struct CheckerContext {
    scopes: Vec<Scope>,
    type_scopes: Vec<HashMap<String, Type>>,
    pub interner: TypeInterner,
    pub well_known: WellKnownTypes,
    pub diagnostics: DiagnosticEngine,
    /// Tracks whether `this` is safe to reference yet inside a
    /// constructor body that has a `super(...)` call pending.
    pub is_this_initialized: bool,
    pub current_return_type: Option<Type>,
    pub current_this_type: Option<Type>,
    pub file: String,
    pub span_map: SpanMap,
    /// Every expression's inferred static type, keyed by its `NodeId`,
    /// mirroring `span_map`. Threaded into codegen so dispatch/field
    /// lowering can pick an exact vtable slot or struct field index
    /// instead of a name-based best-effort lookup.
    pub node_types: HashMap<NodeId, Type>,
}

impl CheckerContext {
    pub fn new(file: impl Into<String>, span_map: SpanMap) -> Self {
        Self {
            scopes: vec![Scope::default()],
            type_scopes: vec![HashMap::new()],
            interner: TypeInterner::new(),
            well_known: WellKnownTypes::default(),
            diagnostics: DiagnosticEngine::new(),
            is_this_initialized: true,
            current_return_type: None,
            current_this_type: None,
            file: file.into(),
            span_map,
            node_types: HashMap::new(),
        }
    }

    pub fn span_for(&self, id: NodeId) -> Span {
        self.span_map.get_or_unknown(id)
    }

    /// Records `expr`'s inferred static type, overwriting any prior
    /// entry (a node is only ever inferred once per checker run, but
    /// re-checking after a recovered error should not leave a stale
    /// type behind).
    pub fn record_type(&mut self, id: NodeId, ty: Type) {
        self.node_types.insert(id, ty);
    }

    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.node_types.get(&id)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn declare_variable(&mut self, name: &str, ty: Type, mutable: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.variables.insert(name.to_string(), ty);
            scope.mutable.insert(name.to_string(), mutable);
        }
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name))
    }

    pub fn is_variable_mutable(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.mutable.get(name))
            .copied()
            .unwrap_or(false)
    }

    /// True when `name` is not bound in the current function's own
    /// scopes at all, i.e. it must come from an enclosing closure's
    /// environment and therefore needs to be captured.
    pub fn is_free_variable(&self, name: &str) -> bool {
        self.lookup_variable(name).is_none()
    }

    pub fn push_type_scope(&mut self) {
        self.type_scopes.push(HashMap::new());
    }

    pub fn pop_type_scope(&mut self) {
        self.type_scopes.pop();
    }

    pub fn declare_type(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.type_scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.type_scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn emit_error(&mut self, code: &str, message: String, span: Span) {
        self.diagnostics.emit(Diagnostic::error(code, message, span));
    }
}
