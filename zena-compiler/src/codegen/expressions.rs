//! Expression and statement lowering: walks a checked function/method
//! body and emits `wasm_encoder` instructions into its `Function`.
//!
//! Locals are allocated in declaration order (params first, then two
//! compiler-introduced scratch slots every body gets, then every `let`
//! the body introduces, scanned ahead of time so nested blocks can
//! still reference a local declared in an enclosing scope by index).

use std::collections::HashMap;
use std::rc::Rc;

use wasm_encoder::{BlockType, Function, HeapType, Instruction, RefType, StorageType, ValType};

use zena_ast::{BinaryOp, Block, ClosureBody, Expression, NodeId, Program, Statement, UnaryOp};

use crate::checker::expressions::expression_id;
use crate::checker::ProgramTypes;
use crate::codegen::{closures, codegen_bug, dispatch, helpers, interfaces, layout, CodegenState};
use crate::types::{ClassType, Type};
use crate::wasm::ModuleBuilder;

/// Describes one binding's (local or capture) representation: its
/// logical, unboxed value type, and — when some nested closure
/// mutably captures it — the cell struct type its physical slot/field
/// actually holds instead (see the `closures` module doc comment).
#[derive(Clone, Copy)]
struct IdentSlot {
    val_ty: ValType,
    cell: Option<u32>,
}

struct FnLowerCtx<'a> {
    locals: HashMap<String, (u32, IdentSlot)>,
    next_local: u32,
    extra_locals: Vec<ValType>,
    node_types: &'a HashMap<NodeId, Type>,
    types: &'a ProgramTypes,
    this_class: Option<Rc<ClassType>>,
    /// Free identifiers this function body is itself a closure over:
    /// name → (field index in `capture_ctx`'s struct, its slot). Empty
    /// for top-level functions, methods and constructors.
    captures: HashMap<String, (u32, IdentSlot)>,
    /// `(local index of the `__ctx` parameter, its concrete struct
    /// type)`, set whenever `captures` is non-empty.
    capture_ctx: Option<(u32, u32)>,
}

impl<'a> FnLowerCtx<'a> {
    /// Pre-scan phase: locals must be known before `Function` is built,
    /// since `wasm_encoder` declares a function's locals up front. Only
    /// used while walking the body for `let`/`for`/`for..in` bindings
    /// and the handful of compiler-introduced scratch slots.
    fn declare_local(&mut self, name: &str, ty: ValType) -> u32 {
        self.declare_slot(name, ty, None)
    }

    /// Like `declare_local`, but the local's physical slot holds a
    /// `(ref $cell_type)` instead of `val_ty` directly (a mutably
    /// captured binding, boxed so writes from either side are shared).
    fn declare_boxed_local(&mut self, name: &str, val_ty: ValType, cell_type: u32) -> u32 {
        self.declare_slot(name, val_ty, Some(cell_type))
    }

    fn declare_slot(&mut self, name: &str, val_ty: ValType, cell: Option<u32>) -> u32 {
        if let Some(&(index, _)) = self.locals.get(name) {
            return index;
        }
        let index = self.next_local;
        let physical_ty = match cell {
            Some(cell_type) => ModuleBuilder::struct_ref(cell_type, true),
            None => val_ty,
        };
        self.locals.insert(name.to_string(), (index, IdentSlot { val_ty, cell }));
        self.extra_locals.push(physical_ty);
        self.next_local += 1;
        index
    }

    fn local(&self, name: &str) -> Option<(u32, IdentSlot)> {
        self.locals.get(name).copied()
    }

    fn type_of(&self, expr: &Expression) -> Type {
        self.node_types.get(&expression_id(expr)).cloned().unwrap_or(Type::Unknown)
    }

    /// The `IdentSlot` backing identifier `name`, whether it's an
    /// ordinary local or a closure capture; a plain unboxed `anyref`
    /// slot if unknown.
    fn ident_slot(&self, name: &str) -> IdentSlot {
        if let Some((_, slot)) = self.local(name) {
            return slot;
        }
        if let Some((_, slot)) = self.captures.get(name).copied() {
            return slot;
        }
        IdentSlot { val_ty: helpers::any_ref(), cell: None }
    }
}

/// Pushes identifier `name`'s *storage representation*: an ordinary
/// `local.get` if it's bound in this function, or a cast-and-`struct.get`
/// off the closure context parameter if it's a capture, or `ref.null
/// any` if it's neither (a checker-rejected program reaching codegen
/// anyway). For a boxed binding this pushes the shared cell reference
/// itself, not its unboxed value — used both by `emit_ident_load` (which
/// unboxes one more step) and when forwarding a binding into a nested
/// closure's own capture struct, where a boxed binding must stay a live
/// shared cell rather than be unboxed and re-copied by value. Returns
/// the binding's `IdentSlot` so callers building a new capture entry can
/// reuse the same boxed-or-not classification.
fn emit_ident_repr(func: &mut Function, ctx: &FnLowerCtx, name: &str) -> IdentSlot {
    if let Some((index, slot)) = ctx.local(name) {
        func.instruction(&Instruction::LocalGet(index));
        return slot;
    }
    if let Some((field_index, slot)) = ctx.captures.get(name).copied() {
        let Some((ctx_local, struct_type)) = ctx.capture_ctx else {
            codegen_bug("capture reference without a context local");
        };
        func.instruction(&Instruction::LocalGet(ctx_local));
        func.instruction(&Instruction::RefCast(RefType {
            nullable: false,
            heap_type: HeapType::Concrete(struct_type),
        }));
        func.instruction(&Instruction::StructGet {
            struct_type_index: struct_type,
            field_index,
        });
        return slot;
    }
    func.instruction(&Instruction::RefNull(HeapType::ANY));
    IdentSlot { val_ty: helpers::any_ref(), cell: None }
}

/// Emits a load of identifier `name`'s current logical value, unboxing
/// it if it's a mutably captured binding stored behind a cell.
fn emit_ident_load(func: &mut Function, ctx: &FnLowerCtx, name: &str) {
    let slot = emit_ident_repr(func, ctx, name);
    if let Some(cell_type) = slot.cell {
        func.instruction(&Instruction::StructGet { struct_type_index: cell_type, field_index: 0 });
    }
}

fn cast_to_struct(func: &mut Function, struct_type: u32) {
    func.instruction(&Instruction::RefCast(RefType {
        nullable: false,
        heap_type: HeapType::Concrete(struct_type),
    }));
}

/// Converts a value of `from` width already on top of the stack to
/// `to`, per spec §4.5's numeric-promotion rule (narrower int/float
/// operand widens to the wider one before the operator runs). A no-op
/// when the widths already match.
fn convert_numeric(func: &mut Function, from: ValType, to: ValType) {
    if from == to {
        return;
    }
    match (from, to) {
        (ValType::I32, ValType::I64) => func.instruction(&Instruction::I64ExtendI32S),
        (ValType::I32, ValType::F32) => func.instruction(&Instruction::F32ConvertI32S),
        (ValType::I32, ValType::F64) => func.instruction(&Instruction::F64ConvertI32S),
        (ValType::I64, ValType::F32) => func.instruction(&Instruction::F32ConvertI64S),
        (ValType::I64, ValType::F64) => func.instruction(&Instruction::F64ConvertI64S),
        (ValType::F32, ValType::F64) => func.instruction(&Instruction::F64PromoteF32),
        _ => func.instruction(&Instruction::Unreachable),
    };
}

fn ensure_array_type(builder: &mut ModuleBuilder, state: &mut CodegenState, elem_val: ValType) -> u32 {
    let key = format!("{elem_val:?}");
    if let Some(&index) = state.array_types.get(&key) {
        return index;
    }
    let index = builder.add_array_type(StorageType::Val(elem_val), true);
    state.array_types.insert(key, index);
    index
}

/// Returns (and lazily allocates) the anonymous struct type backing a
/// tuple literal with these element value types, in positional order
/// (spec §4.5: "a tuple literal uses a struct type interned by element
/// types"). Shared across every tuple literal of the same shape.
fn ensure_tuple_struct_type(builder: &mut ModuleBuilder, state: &mut CodegenState, elem_vals: &[ValType]) -> u32 {
    let key = format!("tuple{elem_vals:?}");
    if let Some(&index) = state.compound_struct_types.get(&key) {
        return index;
    }
    let fields = elem_vals.iter().map(|v| (StorageType::Val(*v), false)).collect();
    let index = builder.add_struct_type(fields, None);
    state.compound_struct_types.insert(key, index);
    index
}

/// Returns (and lazily allocates) the anonymous struct type backing a
/// record literal, one field per `(name, value type)` pair in
/// declaration order. Shared across every record literal with the same
/// field names and value types in the same order.
fn ensure_record_struct_type(builder: &mut ModuleBuilder, state: &mut CodegenState, fields: &[(String, ValType)]) -> u32 {
    let key = format!("record{fields:?}");
    if let Some(&index) = state.compound_struct_types.get(&key) {
        return index;
    }
    let field_types = fields.iter().map(|(_, v)| (StorageType::Val(*v), false)).collect();
    let index = builder.add_struct_type(field_types, None);
    state.compound_struct_types.insert(key, index);
    index
}

/// The WasmGC value type backing `object`'s elements, from its
/// checker-inferred `Type::Array` (falling back to `anyref` for an
/// unresolved or non-array static type, which the checker would
/// already have rejected before codegen).
fn array_elem_val(ctx: &FnLowerCtx, object: &Expression) -> ValType {
    match ctx.type_of(object) {
        Type::Array(elem) => helpers::val_type(elem.as_ref()),
        _ => helpers::any_ref(),
    }
}

/// Each declared local becomes its own run of length 1; `wasm_encoder`
/// accepts (and re-compresses) runs of any length.
fn new_function(locals: &[ValType]) -> Function {
    Function::new(locals.iter().map(|ty| (1, *ty)))
}

fn find_ast_class<'a>(program: &'a Program, name: &str) -> Option<&'a zena_ast::Class> {
    program.items.iter().find_map(|item| match item {
        zena_ast::Item::Class(c) if c.name == name => Some(c),
        _ => None,
    })
}

fn collect_locals_block(ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, boxed_names: &std::collections::BTreeSet<String>, block: &Block) {
    for statement in &block.statements {
        collect_locals_statement(ctx, builder, state, boxed_names, statement);
    }
}

fn collect_locals_statement(
    ctx: &mut FnLowerCtx,
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    boxed_names: &std::collections::BTreeSet<String>,
    statement: &Statement,
) {
    match statement {
        Statement::Let { name, value, span, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, value);
            let val_ty = ctx.node_types.get(span).map(helpers::val_type).unwrap_or_else(helpers::any_ref);
            if boxed_names.contains(name) {
                let cell_type = closures::ensure_cell_type(builder, state, val_ty);
                ctx.declare_boxed_local(name, val_ty, cell_type);
            } else {
                ctx.declare_local(name, val_ty);
            }
        }
        Statement::If { condition, then_block, elif_branches, else_block, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, condition);
            collect_locals_block(ctx, builder, state, boxed_names, then_block);
            for (cond, block) in elif_branches {
                collect_locals_expr(ctx, builder, state, boxed_names, cond);
                collect_locals_block(ctx, builder, state, boxed_names, block);
            }
            if let Some(block) = else_block {
                collect_locals_block(ctx, builder, state, boxed_names, block);
            }
        }
        Statement::While { condition, body, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, condition);
            collect_locals_block(ctx, builder, state, boxed_names, body);
        }
        Statement::For { init, condition, post, body, .. } => {
            if let Some(init) = init {
                collect_locals_statement(ctx, builder, state, boxed_names, init);
            }
            if let Some(condition) = condition {
                collect_locals_expr(ctx, builder, state, boxed_names, condition);
            }
            if let Some(post) = post {
                collect_locals_statement(ctx, builder, state, boxed_names, post);
            }
            collect_locals_block(ctx, builder, state, boxed_names, body);
        }
        Statement::ForIn { binding, iterable, body, .. } => {
            // The per-iteration loop binding is never boxed (see
            // DESIGN.md): lowering writes it with a direct `local.tee`
            // each iteration, which would need a fresh cell allocated
            // per iteration to behave like a true per-iteration
            // rebinding — not attempted this pass.
            collect_locals_expr(ctx, builder, state, boxed_names, iterable);
            ctx.declare_local("__iter", helpers::any_ref());
            ctx.declare_local(binding, helpers::any_ref());
            collect_locals_block(ctx, builder, state, boxed_names, body);
        }
        Statement::Assign { target, value, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, target);
            collect_locals_expr(ctx, builder, state, boxed_names, value);
        }
        Statement::Return(value, _) => {
            if let Some(value) = value {
                collect_locals_expr(ctx, builder, state, boxed_names, value);
            }
        }
        Statement::Expression(expr, _) => collect_locals_expr(ctx, builder, state, boxed_names, expr),
        Statement::Break(_) | Statement::Continue(_) => {}
    }
}

/// Declares a local for every name a match-arm pattern binds (always
/// `anyref`: a destructured field's concrete type isn't tracked
/// per-binding — see `checker::patterns` — and every use site already
/// `ref.cast`s the way any other erased-to-`anyref` value does).
fn collect_locals_pattern(ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, boxed_names: &std::collections::BTreeSet<String>, pattern: &zena_ast::Pattern) {
    use zena_ast::Pattern;
    match pattern {
        Pattern::Wildcard | Pattern::Literal(_) => {}
        Pattern::Ident(name) => {
            if boxed_names.contains(name) {
                let cell_type = closures::ensure_cell_type(builder, state, helpers::any_ref());
                ctx.declare_boxed_local(name, helpers::any_ref(), cell_type);
            } else {
                ctx.declare_local(name, helpers::any_ref());
            }
        }
        Pattern::Tuple(patterns) | Pattern::Or(patterns) => {
            for p in patterns {
                collect_locals_pattern(ctx, builder, state, boxed_names, p);
            }
        }
        Pattern::Struct { fields, .. } => {
            for (_, p) in fields {
                collect_locals_pattern(ctx, builder, state, boxed_names, p);
            }
        }
        Pattern::EnumVariant { fields, .. } => {
            for p in fields {
                collect_locals_pattern(ctx, builder, state, boxed_names, p);
            }
        }
    }
}

/// Recurses into every expression form that can itself contain a
/// nested `let`/match-arm binding, a nested block, or a nested loop —
/// mirrors `codegen::closures`'s free-variable walker, except it
/// declares locals instead of computing a capture set. A closure
/// literal's own body is never recursed into here: its locals are
/// collected separately, by `lower_closure_impl`'s own call into
/// `collect_locals_block`, once it gets its own `FnLowerCtx`.
fn collect_locals_expr(ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, boxed_names: &std::collections::BTreeSet<String>, expr: &Expression) {
    match expr {
        Expression::Ident(..)
        | Expression::IntLiteral(..)
        | Expression::FloatLiteral(..)
        | Expression::StringLiteral(..)
        | Expression::BoolLiteral(..)
        | Expression::NullLiteral(_)
        | Expression::Super(_)
        | Expression::This(_)
        | Expression::Closure { .. } => {}
        Expression::Binary { left, right, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, left);
            collect_locals_expr(ctx, builder, state, boxed_names, right);
        }
        Expression::Unary { expr: inner, .. } => collect_locals_expr(ctx, builder, state, boxed_names, inner),
        Expression::Call { callee, args, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, callee);
            for arg in args {
                collect_locals_expr(ctx, builder, state, boxed_names, arg);
            }
        }
        Expression::MethodCall { receiver, args, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, receiver);
            for arg in args {
                collect_locals_expr(ctx, builder, state, boxed_names, arg);
            }
        }
        Expression::FieldAccess { object, .. } => collect_locals_expr(ctx, builder, state, boxed_names, object),
        Expression::Index { object, index, .. } => {
            collect_locals_expr(ctx, builder, state, boxed_names, object);
            collect_locals_expr(ctx, builder, state, boxed_names, index);
        }
        Expression::ArrayLiteral(items, _) | Expression::TupleLiteral(items, _) => {
            for item in items {
                collect_locals_expr(ctx, builder, state, boxed_names, item);
            }
        }
        Expression::RecordLiteral(fields, _) => {
            for (_, value) in fields {
                collect_locals_expr(ctx, builder, state, boxed_names, value);
            }
        }
        Expression::StructLiteral { fields, .. } => {
            for (_, value) in fields {
                collect_locals_expr(ctx, builder, state, boxed_names, value);
            }
        }
        Expression::New { args, .. } => {
            for arg in args {
                collect_locals_expr(ctx, builder, state, boxed_names, arg);
            }
        }
        Expression::Cast { expr: inner, .. } => collect_locals_expr(ctx, builder, state, boxed_names, inner),
        Expression::Match { scrutinee, arms, span } => {
            collect_locals_expr(ctx, builder, state, boxed_names, scrutinee);
            let scrutinee_ty = helpers::val_type(&ctx.type_of(scrutinee));
            // Named per match site (not a single shared scratch local,
            // unlike `__new_tmp`/`__recv_tmp`): two `match` expressions
            // in the same body can scrutinize differently represented
            // values (e.g. one an `i32`, another a class `anyref`), and
            // a shared slot's physical type is fixed at its first
            // declaration.
            ctx.declare_local(&match_scrutinee_local(*span), scrutinee_ty);
            for arm in arms {
                collect_locals_pattern(ctx, builder, state, boxed_names, &arm.pattern);
                if let Some(guard) = &arm.guard {
                    collect_locals_expr(ctx, builder, state, boxed_names, guard);
                }
                collect_locals_expr(ctx, builder, state, boxed_names, &arm.body);
            }
        }
        Expression::Block { statements, trailing, .. } => {
            for statement in statements {
                collect_locals_statement(ctx, builder, state, boxed_names, statement);
            }
            if let Some(trailing) = trailing {
                collect_locals_expr(ctx, builder, state, boxed_names, trailing);
            }
        }
    }
}

/// Declares the two scratch locals every function body may need: a
/// slot to hold a freshly allocated instance while its vtable/fields
/// are installed (`New`), and a slot to hold a method-call receiver
/// while it's re-loaded for vtable lookup.
fn declare_scratch_locals(ctx: &mut FnLowerCtx) {
    ctx.declare_local("__new_tmp", helpers::any_ref());
    ctx.declare_local("__recv_tmp", helpers::any_ref());
    // Hold a freshly built closure value while its function ref and
    // context struct are assembled, and hold a closure value being
    // called while its two fields are loaded for `call_ref`.
    ctx.declare_local("__closure_tmp", helpers::any_ref());
    ctx.declare_local("__closure_ctx_tmp", helpers::any_ref());
}

/// Declares `param_names` at the physical parameter indices the
/// function's `wasm` type gives them (indices `0..param_names.len()`,
/// in order — unaffected by boxing, since the call-site ABI always
/// passes the plain unboxed value). A name in `boxed_names` (and not
/// `"this"`, which is never reassignable and must keep its plain
/// receiver representation for `super`/static-dispatch call sites) gets
/// an *additional*, freshly appended local holding its boxed cell; the
/// name then resolves to that boxed local instead of the raw parameter
/// slot. Returns `(raw_index, boxed_index, cell_type)` for each boxed
/// parameter, so the caller can emit the entry prologue that moves the
/// incoming plain value into its cell.
fn declare_params(
    ctx: &mut FnLowerCtx,
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    param_names: &[String],
    param_val_types: &[ValType],
    boxed_names: &std::collections::BTreeSet<String>,
) -> Vec<(u32, u32, u32)> {
    let mut raw_indices = Vec::with_capacity(param_names.len());
    for val_ty in param_val_types {
        let index = ctx.next_local;
        ctx.next_local += 1;
        ctx.extra_locals.push(*val_ty);
        raw_indices.push(index);
    }
    let mut boxed_params = Vec::new();
    for ((name, val_ty), &raw_index) in param_names.iter().zip(param_val_types.iter()).zip(raw_indices.iter()) {
        if name != "this" && boxed_names.contains(name) {
            let cell_type = closures::ensure_cell_type(builder, state, *val_ty);
            let boxed_index = ctx.declare_boxed_local(name, *val_ty, cell_type);
            boxed_params.push((raw_index, boxed_index, cell_type));
        } else {
            ctx.locals.insert(name.clone(), (raw_index, IdentSlot { val_ty: *val_ty, cell: None }));
        }
    }
    boxed_params
}

/// Emits the prologue that boxes every parameter `declare_params`
/// flagged: move its incoming plain value into a freshly allocated
/// cell, so the rest of the body (and any nested closure that captures
/// it) only ever sees the boxed local.
fn emit_box_param_prologue(func: &mut Function, boxed_params: &[(u32, u32, u32)]) {
    for &(raw_index, boxed_index, cell_type) in boxed_params {
        func.instruction(&Instruction::LocalGet(raw_index));
        func.instruction(&Instruction::StructNew(cell_type));
        func.instruction(&Instruction::LocalSet(boxed_index));
    }
}

fn push_default(func: &mut Function, ty: ValType) {
    match ty {
        ValType::I32 => func.instruction(&Instruction::I32Const(0)),
        ValType::I64 => func.instruction(&Instruction::I64Const(0)),
        ValType::F32 => func.instruction(&Instruction::F32Const(0.0)),
        ValType::F64 => func.instruction(&Instruction::F64Const(0.0)),
        ValType::Ref(rt) => func.instruction(&Instruction::RefNull(rt.heap_type)),
        _ => func.instruction(&Instruction::Unreachable),
    };
}

/// Lowers one body (top-level function, method, constructor) into a
/// registered function, returning its index. `this_class` is `Some`
/// for methods/constructors so `this`/`super` resolve; `param_names`
/// already includes a leading `"this"` entry when applicable.
#[allow(clippy::too_many_arguments)]
#[allow(clippy::too_many_arguments)]
fn lower_body(
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    types: &ProgramTypes,
    node_types: &HashMap<NodeId, Type>,
    this_class: Option<Rc<ClassType>>,
    param_names: &[String],
    param_val_types: &[ValType],
    result_type: ValType,
    body: &Block,
    qualified_name: &str,
) -> u32 {
    let type_index = builder.add_function_type(param_val_types.to_vec(), vec![result_type]);

    let boxed_names = closures::closure_captured_names_in_block(body);
    let mut ctx = FnLowerCtx {
        locals: HashMap::new(),
        next_local: 0,
        extra_locals: Vec::new(),
        node_types,
        types,
        this_class,
        captures: HashMap::new(),
        capture_ctx: None,
    };
    let boxed_params = declare_params(&mut ctx, builder, state, param_names, param_val_types, &boxed_names);
    let param_count = param_names.len() as u32;
    declare_scratch_locals(&mut ctx);
    collect_locals_block(&mut ctx, builder, state, &boxed_names, body);

    let mut func = new_function(&ctx.extra_locals[param_count as usize..]);
    emit_box_param_prologue(&mut func, &boxed_params);
    lower_block(&mut func, &mut ctx, builder, state, body);
    push_default(&mut func, result_type);
    func.instruction(&Instruction::End);

    let index = builder.add_function(type_index, func, Some(qualified_name));
    state.function_indices.insert(qualified_name.to_string(), index);
    index
}

/// Lowers a closure literal's implementation function: like
/// [`lower_body`], but the body may be a bare expression (spec
/// `ClosureBody::Expr`) instead of a block, the function closes over
/// `captures` (read through the `capture_ctx_struct`-typed first
/// parameter, conventionally named `"__ctx"`), and `type_index` is the
/// function type already shared with every other closure of this
/// signature (via `closures::ensure_closure_types`) rather than a
/// freshly allocated one, so the struct field typed to hold this
/// function reference and the reference this function is registered
/// under agree.
#[allow(clippy::too_many_arguments)]
fn lower_closure_impl(
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    types: &ProgramTypes,
    node_types: &HashMap<NodeId, Type>,
    param_names: &[String],
    param_val_types: &[ValType],
    result_type: ValType,
    type_index: u32,
    body: &ClosureBody,
    qualified_name: &str,
    captures: HashMap<String, (u32, IdentSlot)>,
    capture_ctx_struct: u32,
) -> u32 {
    let boxed_names = closures::closure_captured_names_in_closure_body(body);
    let mut ctx = FnLowerCtx {
        locals: HashMap::new(),
        next_local: 0,
        extra_locals: Vec::new(),
        node_types,
        types,
        this_class: None,
        captures,
        capture_ctx: None,
    };
    let boxed_params = declare_params(&mut ctx, builder, state, param_names, param_val_types, &boxed_names);
    if let Some((ctx_local, _)) = ctx.local("__ctx") {
        ctx.capture_ctx = Some((ctx_local, capture_ctx_struct));
    }
    let param_count = param_names.len() as u32;
    declare_scratch_locals(&mut ctx);
    if let ClosureBody::Block(block) = body {
        collect_locals_block(&mut ctx, builder, state, &boxed_names, block);
    }

    let mut func = new_function(&ctx.extra_locals[param_count as usize..]);
    emit_box_param_prologue(&mut func, &boxed_params);
    match body {
        ClosureBody::Expr(expr) => {
            lower_expression(&mut func, &mut ctx, builder, state, expr);
            func.instruction(&Instruction::Return);
        }
        ClosureBody::Block(block) => {
            lower_block(&mut func, &mut ctx, builder, state, block);
            push_default(&mut func, result_type);
        }
    }
    func.instruction(&Instruction::End);

    let index = builder.add_function(type_index, func, Some(qualified_name));
    state.function_indices.insert(qualified_name.to_string(), index);
    index
}

pub fn lower_function(builder: &mut ModuleBuilder, state: &mut CodegenState, types: &ProgramTypes, node_types: &HashMap<NodeId, Type>, f: &zena_ast::Function) {
    let Some(func_type) = types.functions.get(&f.name) else {
        return codegen_bug("function declared without a resolved FunctionType");
    };
    let param_val_types: Vec<ValType> = func_type.parameters.iter().map(helpers::val_type).collect();
    let result_type = helpers::val_type(&func_type.return_type);
    let param_names: Vec<String> = f.params.iter().map(|p| p.name.clone()).collect();
    lower_body(builder, state, types, node_types, None, &param_names, &param_val_types, result_type, &f.body, &f.name);
}

/// Lowers every method on `class`: field accessors (`get_x`/`set_x`)
/// as direct `struct.get`/`struct.set` bodies, own-declared methods by
/// looking up their AST body on the matching `Item::Class`, and
/// abstract/interface-only slots (no body anywhere in the source) as
/// trapping stubs so every vtable slot is still a valid `call_ref`
/// target.
pub fn lower_class_methods(
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    types: &ProgramTypes,
    node_types: &HashMap<NodeId, Type>,
    program: &Program,
    class: &Rc<ClassType>,
) {
    let ast_class = find_ast_class(program, &class.name);
    let field_names: Vec<String> = class.fields.borrow().iter().map(|(n, _, _)| n.clone()).collect();

    for (name, func_type) in class.methods.borrow().iter() {
        let qualified = format!("{}.{}", class.name, name);
        if state.function_indices.contains_key(&qualified) {
            continue;
        }
        let param_val_types: Vec<ValType> = std::iter::once(helpers::any_ref())
            .chain(func_type.parameters.iter().map(helpers::val_type))
            .collect();
        let result_type = helpers::val_type(&func_type.return_type);

        if let Some(field) = name.strip_prefix("get_").filter(|f| field_names.iter().any(|n| n == f)) {
            let type_index = builder.add_function_type(param_val_types.clone(), vec![result_type]);
            let mut body = new_function(&[]);
            body.instruction(&Instruction::LocalGet(0));
            let Some(layout) = state.class_layouts.get(&class.name) else { continue };
            dispatch::emit_field_get(&mut body, layout, field);
            body.instruction(&Instruction::End);
            let index = builder.add_function(type_index, body, Some(&qualified));
            state.function_indices.insert(qualified, index);
            continue;
        }
        if let Some(field) = name.strip_prefix("set_").filter(|f| field_names.iter().any(|n| n == f)) {
            let type_index = builder.add_function_type(param_val_types.clone(), vec![result_type]);
            let mut body = new_function(&[]);
            body.instruction(&Instruction::LocalGet(0));
            body.instruction(&Instruction::LocalGet(1));
            let Some(layout) = state.class_layouts.get(&class.name) else { continue };
            dispatch::emit_field_set(&mut body, layout, field);
            push_default(&mut body, result_type);
            body.instruction(&Instruction::End);
            let index = builder.add_function(type_index, body, Some(&qualified));
            state.function_indices.insert(qualified, index);
            continue;
        }

        let method_ast = ast_class.and_then(|c| c.methods.iter().find(|m| &m.name == name));
        match method_ast.and_then(|m| m.body.as_ref().map(|b| (m, b))) {
            Some((method_ast, body)) => {
                let mut param_names = vec!["this".to_string()];
                param_names.extend(method_ast.params.iter().map(|p| p.name.clone()));
                lower_body(
                    builder,
                    state,
                    types,
                    node_types,
                    Some(class.clone()),
                    &param_names,
                    &param_val_types,
                    result_type,
                    body,
                    &qualified,
                );
            }
            None => {
                // Abstract method, or an interface/mixin slot this
                // class never overrides a concrete body for — the
                // checker has already rejected programs that would
                // actually reach this at runtime through a concrete
                // instance, so a trap keeps the vtable slot valid.
                let type_index = builder.add_function_type(param_val_types, vec![result_type]);
                let mut body = new_function(&[]);
                body.instruction(&Instruction::Unreachable);
                body.instruction(&Instruction::End);
                let index = builder.add_function(type_index, body, Some(&qualified));
                state.function_indices.insert(qualified, index);
            }
        }
    }
}

/// Lowers `class`'s constructor body (if the source declared one) into
/// `ClassName.#new`, taking the already-allocated, vtable-installed
/// instance as `this` (see `Expression::New`'s lowering) plus the
/// declared constructor parameters, returning void.
pub fn lower_constructors(
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    types: &ProgramTypes,
    node_types: &HashMap<NodeId, Type>,
    program: &Program,
    class: &Rc<ClassType>,
) {
    let Some(ast_class) = find_ast_class(program, &class.name) else { return };
    let Some(ctor) = &ast_class.constructor else { return };
    let Some(ctor_type) = class.constructor_type.borrow().clone() else { return };

    let param_val_types: Vec<ValType> = std::iter::once(helpers::any_ref())
        .chain(ctor_type.parameters.iter().map(helpers::val_type))
        .collect();
    let mut param_names = vec!["this".to_string()];
    param_names.extend(ctor.params.iter().map(|p| p.name.clone()));

    lower_body(
        builder,
        state,
        types,
        node_types,
        Some(class.clone()),
        &param_names,
        &param_val_types,
        ValType::I32,
        &ctor.body,
        &format!("{}.#new", class.name),
    );
}

fn lower_block(func: &mut Function, ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, block: &Block) {
    for statement in &block.statements {
        lower_statement(func, ctx, builder, state, statement);
    }
}

fn lower_statement(func: &mut Function, ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, statement: &Statement) {
    match statement {
        Statement::Let { name, value, span, .. } => {
            lower_expression(func, ctx, builder, state, value);
            let declared = ctx.node_types.get(span).cloned();
            let inferred = ctx.node_types.get(&expression_id(value)).cloned();
            match (&declared, &inferred) {
                // Upcasting a class instance to an interface-typed
                // binding needs the fat-pointer wrap (spec §3.3); every
                // other pairing keeps the existing numeric-promotion
                // behavior.
                (Some(Type::Interface(iface)), Some(Type::Class(class))) => {
                    interfaces::emit_wrap_as_interface(func, state, class, iface);
                }
                _ => {
                    let ty = declared.as_ref().map(helpers::val_type).unwrap_or_else(helpers::any_ref);
                    let value_ty = inferred.as_ref().map(helpers::val_type).unwrap_or(ty);
                    convert_numeric(func, value_ty, ty);
                }
            }
            let ty = declared.as_ref().map(helpers::val_type).unwrap_or_else(helpers::any_ref);
            let index = ctx.declare_local(name, ty);
            // `declare_local` is idempotent: if the pre-pass already
            // boxed this name (some nested closure captures it), this
            // call just returns its existing boxed slot, so the value
            // just pushed/converted above still needs wrapping in a
            // fresh cell before it's stored.
            if let Some(cell_type) = ctx.local(name).and_then(|(_, slot)| slot.cell) {
                func.instruction(&Instruction::StructNew(cell_type));
            }
            func.instruction(&Instruction::LocalSet(index));
        }
        Statement::Assign { target, value, .. } => match target {
            Expression::Ident(name, _) => match (ctx.local(name), ctx.captures.get(name).copied()) {
                (Some((index, slot)), _) => match slot.cell {
                    Some(cell_type) => {
                        // `struct.set` wants [cell_ref, value] on the
                        // stack: the local itself already holds the
                        // live cell ref, so push it first, then the
                        // new value, writing through the shared cell
                        // rather than overwriting the local.
                        func.instruction(&Instruction::LocalGet(index));
                        lower_expression(func, ctx, builder, state, value);
                        func.instruction(&Instruction::StructSet { struct_type_index: cell_type, field_index: 0 });
                    }
                    None => {
                        lower_expression(func, ctx, builder, state, value);
                        func.instruction(&Instruction::LocalSet(index));
                    }
                },
                (None, Some((field_index, slot))) => {
                    // Assigning to a captured name is only reachable
                    // (and only legal) when the capture is boxed: an
                    // unboxed capture is a by-value copy with no
                    // shared storage to write back into.
                    let Some(cell_type) = slot.cell else {
                        codegen_bug("assignment to a non-boxed capture");
                    };
                    let Some((ctx_local, struct_type)) = ctx.capture_ctx else {
                        codegen_bug("capture reference without a context local");
                    };
                    func.instruction(&Instruction::LocalGet(ctx_local));
                    func.instruction(&Instruction::RefCast(RefType {
                        nullable: false,
                        heap_type: HeapType::Concrete(struct_type),
                    }));
                    func.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index });
                    lower_expression(func, ctx, builder, state, value);
                    func.instruction(&Instruction::StructSet { struct_type_index: cell_type, field_index: 0 });
                }
                (None, None) => codegen_bug("assignment target resolved to no local"),
            },
            Expression::FieldAccess { object, field, .. } => {
                let object_ty = ctx.type_of(object);
                match &object_ty {
                    Type::Interface(iface) => {
                        lower_expression(func, ctx, builder, state, object);
                        let recv_tmp = ctx.local("__recv_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __recv_tmp scratch local"));
                        func.instruction(&Instruction::LocalSet(recv_tmp));
                        interfaces::push_instance_from_fatptr(func, state, iface, recv_tmp);
                        lower_expression(func, ctx, builder, state, value);
                        let setter = format!("set_{field}");
                        let func_type = interfaces::push_interface_slot_func(func, state, iface, recv_tmp, &setter);
                        func.instruction(&Instruction::CallRef(func_type));
                        func.instruction(&Instruction::Drop);
                    }
                    Type::Class(c) => {
                        lower_expression(func, ctx, builder, state, object);
                        lower_expression(func, ctx, builder, state, value);
                        if let Some(layout) = state.class_layouts.get(&c.name) {
                            dispatch::emit_field_set(func, layout, field);
                        } else {
                            func.instruction(&Instruction::Unreachable);
                        }
                    }
                    _ => {
                        lower_expression(func, ctx, builder, state, object);
                        lower_expression(func, ctx, builder, state, value);
                        func.instruction(&Instruction::Unreachable);
                    }
                };
            }
            Expression::Index { object, index, .. } => {
                let array_type = ensure_array_type(builder, state, array_elem_val(ctx, object));
                lower_expression(func, ctx, builder, state, object);
                lower_expression(func, ctx, builder, state, index);
                lower_expression(func, ctx, builder, state, value);
                func.instruction(&Instruction::ArraySet { array_type_index: array_type });
            }
            _ => codegen_bug("unsupported assignment target"),
        },
        Statement::Return(value, _) => {
            match value {
                Some(value) => lower_expression(func, ctx, builder, state, value),
                None => func.instruction(&Instruction::I32Const(0)),
            };
            func.instruction(&Instruction::Return);
        }
        Statement::Break(_) => {
            func.instruction(&Instruction::Br(1));
        }
        Statement::Continue(_) => {
            func.instruction(&Instruction::Br(0));
        }
        Statement::If {
            condition,
            then_block,
            elif_branches,
            else_block,
            ..
        } => {
            lower_expression(func, ctx, builder, state, condition);
            func.instruction(&Instruction::If(BlockType::Empty));
            lower_block(func, ctx, builder, state, then_block);
            if !elif_branches.is_empty() || else_block.is_some() {
                func.instruction(&Instruction::Else);
                for (elif_condition, elif_block) in elif_branches {
                    lower_expression(func, ctx, builder, state, elif_condition);
                    func.instruction(&Instruction::If(BlockType::Empty));
                    lower_block(func, ctx, builder, state, elif_block);
                    func.instruction(&Instruction::Else);
                }
                if let Some(else_block) = else_block {
                    lower_block(func, ctx, builder, state, else_block);
                }
                for _ in elif_branches {
                    func.instruction(&Instruction::End);
                }
            }
            func.instruction(&Instruction::End);
        }
        Statement::While { condition, body, .. } => {
            func.instruction(&Instruction::Block(BlockType::Empty));
            func.instruction(&Instruction::Loop(BlockType::Empty));
            lower_expression(func, ctx, builder, state, condition);
            func.instruction(&Instruction::I32Eqz);
            func.instruction(&Instruction::BrIf(1));
            lower_block(func, ctx, builder, state, body);
            func.instruction(&Instruction::Br(0));
            func.instruction(&Instruction::End);
            func.instruction(&Instruction::End);
        }
        Statement::For { init, condition, post, body, .. } => {
            if let Some(init) = init {
                lower_statement(func, ctx, builder, state, init);
            }
            func.instruction(&Instruction::Block(BlockType::Empty));
            func.instruction(&Instruction::Loop(BlockType::Empty));
            if let Some(condition) = condition {
                lower_expression(func, ctx, builder, state, condition);
                func.instruction(&Instruction::I32Eqz);
                func.instruction(&Instruction::BrIf(1));
            }
            lower_block(func, ctx, builder, state, body);
            if let Some(post) = post {
                lower_statement(func, ctx, builder, state, post);
            }
            func.instruction(&Instruction::Br(0));
            func.instruction(&Instruction::End);
            func.instruction(&Instruction::End);
        }
        Statement::ForIn { binding, iterable, body, .. } => {
            // Lowered against the `Iterator` well-known interface as a
            // null-terminated pull loop: `it = iterable.iterator(); loop
            // { value = it.next(); if value == null break; ... }`. A
            // `null` sentinel return from `next()` signals exhaustion
            // rather than an unpacked `(bool, T)` pair, since tuple
            // returns are erased to a single opaque `anyref` in this
            // simplified value mapping.
            lower_expression(func, ctx, builder, state, iterable);
            let iterator_local = ctx.declare_local("__iter", helpers::any_ref());
            func.instruction(&Instruction::LocalSet(iterator_local));
            let binding_local = ctx.declare_local(binding, helpers::any_ref());
            func.instruction(&Instruction::Block(BlockType::Empty));
            func.instruction(&Instruction::Loop(BlockType::Empty));
            let recv_tmp = ctx.declare_local("__recv_tmp", helpers::any_ref());
            func.instruction(&Instruction::LocalGet(iterator_local));
            func.instruction(&Instruction::LocalSet(recv_tmp));
            let iterable_ty = ctx.type_of(iterable);
            push_receiver_arg(func, state, &iterable_ty, recv_tmp);
            emit_virtual_or_static_call(func, state, &iterable_ty, false, "next", recv_tmp);
            func.instruction(&Instruction::LocalTee(binding_local));
            func.instruction(&Instruction::RefIsNull);
            func.instruction(&Instruction::BrIf(1));
            lower_block(func, ctx, builder, state, body);
            func.instruction(&Instruction::Br(0));
            func.instruction(&Instruction::End);
            func.instruction(&Instruction::End);
        }
        Statement::Expression(expr) => {
            lower_expression(func, ctx, builder, state, expr);
            func.instruction(&Instruction::Drop);
        }
    }
}

/// Shared by `MethodCall` and `for..in`'s desugared `next()` call:
/// `this`/args are already staged on the stack with `recv_tmp` holding
/// the receiver for a vtable reload. Static dispatch (final
/// class/method, extension class, or `super`) calls the owning
/// class's lowered body directly; otherwise loads the method out of
/// the receiver's vtable and `call_ref`s it.
fn emit_virtual_or_static_call(func: &mut Function, state: &CodegenState, receiver_ty: &Type, is_super: bool, method: &str, recv_tmp: u32) {
    let class = match receiver_ty {
        Type::Class(class) => class,
        Type::Interface(iface) => {
            // The caller has already pushed the unwrapped instance (via
            // `push_receiver_arg`) as the call's first argument; only
            // the funcref to dispatch through is this function's job.
            let func_type = interfaces::push_interface_slot_func(func, state, iface, recv_tmp, method);
            func.instruction(&Instruction::CallRef(func_type));
            return;
        }
        _ => {
            func.instruction(&Instruction::Unreachable);
            return;
        }
    };
    let Some(layout) = state.class_layouts.get(&class.name) else {
        func.instruction(&Instruction::Unreachable);
        return;
    };
    if is_super || dispatch::is_static_dispatch(class, method) {
        let target = layout::owning_class(class, method).unwrap_or_else(|| class.clone());
        let qualified = format!("{}.{}", target.name, method);
        match state.function_indices.get(&qualified) {
            Some(&idx) => func.instruction(&Instruction::Call(idx)),
            None => func.instruction(&Instruction::Unreachable),
        };
    } else {
        dispatch::push_vtable_slot_func(func, layout, recv_tmp, method);
        let type_index = layout.vtable_slot_func_type.get(method).copied().unwrap_or(0);
        func.instruction(&Instruction::CallRef(type_index));
    }
}

/// Recognizes `EnumName.Variant(args)`, parsed like any other
/// `receiver.method(args)` call (spec §6 names no dedicated syntax for
/// enum construction, so the checker and codegen both resolve it the
/// same way a field/method lookup would fail to): `receiver` is a bare
/// name that isn't a bound local/capture (so it can't be an ordinary
/// value) and matches an enum registered in `ProgramTypes`, with
/// `method` naming one of its variants.
fn enum_variant_target(ctx: &FnLowerCtx, receiver: &Expression, method: &str) -> Option<Rc<ClassType>> {
    let Expression::Ident(name, _) = receiver else { return None };
    if ctx.local(name).is_some() || ctx.captures.contains_key(name) {
        return None;
    }
    ctx.types
        .enum_variants
        .get(name)
        .and_then(|variants| variants.get(method))
        .map(|(_, class)| class.clone())
}

/// Constructs an enum variant value: allocates the variant's struct
/// (laid out like any other class — inherited vtable-ref slot 0, then
/// its own positionally-named `_0`, `_1`, ... fields, spec §4.4),
/// installs its vtable global, and writes each constructor argument
/// into its matching field directly (no `#new` function call: variant
/// classes never declare a constructor, spec §9's enum desugaring to
/// subclasses has no body to run beyond storing the fields).
fn lower_enum_variant_construction(
    func: &mut Function,
    ctx: &mut FnLowerCtx,
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    variant_class: &Rc<ClassType>,
    args: &[Expression],
) {
    let Some(layout) = state.class_layouts.get(&variant_class.name) else {
        codegen_bug(&format!("no layout for enum variant `{}`", variant_class.name));
    };
    let struct_type = layout.struct_type;
    let vtable_global = layout.vtable_global;
    let field_index = layout.field_index.clone();

    let new_tmp = ctx.local("__new_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __new_tmp scratch local"));
    func.instruction(&Instruction::StructNewDefault(struct_type));
    func.instruction(&Instruction::LocalSet(new_tmp));
    func.instruction(&Instruction::LocalGet(new_tmp));
    func.instruction(&Instruction::GlobalGet(vtable_global));
    func.instruction(&Instruction::StructSet { struct_type_index: struct_type, field_index: 0 });

    for (i, arg) in args.iter().enumerate() {
        let Some(&idx) = field_index.get(&format!("_{i}")) else { continue };
        func.instruction(&Instruction::LocalGet(new_tmp));
        lower_expression(func, ctx, builder, state, arg);
        func.instruction(&Instruction::StructSet { struct_type_index: struct_type, field_index: idx });
    }
    func.instruction(&Instruction::LocalGet(new_tmp));
}

/// Pushes the call's first argument (the receiver) for a method-call or
/// `for..in`-desugared `next()` site: the unwrapped instance for an
/// interface-typed receiver (the fat pointer itself is never a valid
/// `call_ref` argument, since a trampoline's own first parameter is the
/// erased instance, not the pointer), or `recv_tmp` directly otherwise.
fn push_receiver_arg(func: &mut Function, state: &CodegenState, receiver_ty: &Type, recv_tmp: u32) {
    match receiver_ty {
        Type::Interface(iface) => interfaces::push_instance_from_fatptr(func, state, iface, recv_tmp),
        _ => {
            func.instruction(&Instruction::LocalGet(recv_tmp));
        }
    };
}

fn lower_expression(func: &mut Function, ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, expr: &Expression) {
    match expr {
        Expression::IntLiteral(value, _) => {
            func.instruction(&Instruction::I32Const(*value as i32));
        }
        Expression::FloatLiteral(value, _) => {
            func.instruction(&Instruction::F64Const(*value));
        }
        Expression::StringLiteral(value, _) => {
            let data_index = state.string_data.intern(builder, value);
            let array_type = ensure_byte_array_type(builder, state);
            func.instruction(&Instruction::ArrayNewData {
                array_type_index: array_type,
                array_data_index: data_index,
            });
        }
        Expression::BoolLiteral(value, _) => {
            func.instruction(&Instruction::I32Const(i32::from(*value)));
        }
        Expression::NullLiteral(_) => {
            func.instruction(&Instruction::RefNull(HeapType::ANY));
        }
        Expression::Ident(name, _) => emit_ident_load(func, ctx, name),
        Expression::This(_) => emit_ident_load(func, ctx, "this"),
        Expression::Super(_) => {
            if let Some((index, _)) = ctx.local("this") {
                func.instruction(&Instruction::LocalGet(index));
            }
        }
        Expression::Binary { left, op, right, .. } => lower_binary(func, ctx, builder, state, left, *op, right),
        Expression::Unary { op, expr: inner, .. } => {
            let operand_ty = helpers::val_type(&ctx.type_of(inner));
            lower_expression(func, ctx, builder, state, inner);
            match op {
                UnaryOp::Neg => match operand_ty {
                    ValType::I32 => {
                        func.instruction(&Instruction::I32Const(-1));
                        func.instruction(&Instruction::I32Mul);
                    }
                    ValType::I64 => {
                        func.instruction(&Instruction::I64Const(-1));
                        func.instruction(&Instruction::I64Mul);
                    }
                    ValType::F32 => {
                        func.instruction(&Instruction::F32Neg);
                    }
                    ValType::F64 => {
                        func.instruction(&Instruction::F64Neg);
                    }
                    _ => {
                        func.instruction(&Instruction::Unreachable);
                    }
                },
                UnaryOp::Not => {
                    func.instruction(&Instruction::I32Eqz);
                }
            }
        }
        Expression::Call { callee, args, .. } => match callee.as_ref() {
            // A bare name calls a top-level function directly, unless
            // that name is itself bound to a closure value (a local or
            // a capture) — then it falls through to the `call_ref` path
            // below like any other closure-valued callee expression.
            Expression::Ident(name, _) if ctx.local(name).is_none() && !ctx.captures.contains_key(name) => {
                for arg in args {
                    lower_expression(func, ctx, builder, state, arg);
                }
                match state.function_indices.get(name) {
                    Some(&idx) => func.instruction(&Instruction::Call(idx)),
                    None => func.instruction(&Instruction::Unreachable),
                };
            }
            Expression::Super(_) => {
                // `super(...)` inside a derived constructor: a static
                // call to the parent's `#new` with the receiver and
                // the given arguments (spec §4.5, "super inside a
                // derived constructor").
                let Some(this_class) = ctx.this_class.clone() else {
                    codegen_bug("super() used outside a class body");
                };
                let Some(Type::Class(parent)) = this_class.super_type.borrow().clone() else {
                    codegen_bug("super() with no superclass");
                };
                if let Some((index, _)) = ctx.local("this") {
                    func.instruction(&Instruction::LocalGet(index));
                }
                for arg in args {
                    lower_expression(func, ctx, builder, state, arg);
                }
                let qualified = format!("{}.#new", parent.name);
                match state.function_indices.get(&qualified) {
                    Some(&idx) => {
                        func.instruction(&Instruction::Call(idx));
                        func.instruction(&Instruction::Drop);
                    }
                    None => {}
                };
                func.instruction(&Instruction::RefNull(HeapType::ANY));
            }
            // A closure value: reload its two fields (context, function
            // reference) off the closure struct and `call_ref` through
            // the function reference, the context going in as the
            // implicit first argument (spec §3.4/§4.5.1).
            _ => match ctx.type_of(callee) {
                Type::Function(func_type) => {
                    let param_vals: Vec<ValType> = func_type.parameters.iter().map(helpers::val_type).collect();
                    let result_val = helpers::val_type(&func_type.return_type);
                    let (struct_type, fn_type_index) = closures::ensure_closure_types(builder, state, &param_vals, result_val);
                    lower_expression(func, ctx, builder, state, callee);
                    let closure_tmp = ctx.local("__closure_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __closure_tmp scratch local"));
                    func.instruction(&Instruction::LocalSet(closure_tmp));
                    func.instruction(&Instruction::LocalGet(closure_tmp));
                    cast_to_struct(func, struct_type);
                    func.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index: 1 });
                    for arg in args {
                        lower_expression(func, ctx, builder, state, arg);
                    }
                    func.instruction(&Instruction::LocalGet(closure_tmp));
                    cast_to_struct(func, struct_type);
                    func.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index: 0 });
                    func.instruction(&Instruction::CallRef(fn_type_index));
                }
                _ => {
                    lower_expression(func, ctx, builder, state, callee);
                    func.instruction(&Instruction::Drop);
                    func.instruction(&Instruction::RefNull(HeapType::ANY));
                }
            },
        },
        Expression::MethodCall { receiver, method, args, .. } => {
            if let Some(variant_class) = enum_variant_target(ctx, receiver, method) {
                lower_enum_variant_construction(func, ctx, builder, state, &variant_class, args);
                return;
            }
            let is_super = matches!(receiver.as_ref(), Expression::Super(_));
            let receiver_ty = ctx.type_of(receiver);
            lower_expression(func, ctx, builder, state, receiver);
            let recv_tmp = ctx.local("__recv_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __recv_tmp scratch local"));
            func.instruction(&Instruction::LocalSet(recv_tmp));
            push_receiver_arg(func, state, &receiver_ty, recv_tmp);
            for arg in args {
                lower_expression(func, ctx, builder, state, arg);
            }
            emit_virtual_or_static_call(func, state, &receiver_ty, is_super, method, recv_tmp);
        }
        Expression::FieldAccess { object, field, .. } => {
            lower_expression(func, ctx, builder, state, object);
            match ctx.type_of(object) {
                Type::Class(c) => match state.class_layouts.get(&c.name) {
                    Some(layout) => dispatch::emit_field_get(func, layout, field),
                    None => func.instruction(&Instruction::Unreachable),
                },
                Type::Interface(iface) => {
                    let recv_tmp = ctx.local("__recv_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __recv_tmp scratch local"));
                    func.instruction(&Instruction::LocalSet(recv_tmp));
                    interfaces::push_instance_from_fatptr(func, state, &iface, recv_tmp);
                    let getter = format!("get_{field}");
                    let func_type = interfaces::push_interface_slot_func(func, state, &iface, recv_tmp, &getter);
                    func.instruction(&Instruction::CallRef(func_type));
                }
                Type::Array(_) if field == "length" => {
                    func.instruction(&Instruction::ArrayLen);
                }
                _ => {
                    func.instruction(&Instruction::Drop);
                    func.instruction(&Instruction::RefNull(HeapType::ANY));
                }
            };
        }
        Expression::Index { object, index, .. } => {
            let array_type = ensure_array_type(builder, state, array_elem_val(ctx, object));
            lower_expression(func, ctx, builder, state, object);
            lower_expression(func, ctx, builder, state, index);
            func.instruction(&Instruction::ArrayGet { array_type_index: array_type });
        }
        Expression::ArrayLiteral(items, _) => {
            let elem_val = match ctx.type_of(expr) {
                Type::Array(elem) => helpers::val_type(elem.as_ref()),
                _ => items.first().map(|item| helpers::val_type(&ctx.type_of(item))).unwrap_or_else(helpers::any_ref),
            };
            let array_type = ensure_array_type(builder, state, elem_val);
            for item in items {
                lower_expression(func, ctx, builder, state, item);
            }
            func.instruction(&Instruction::ArrayNewFixed {
                array_type_index: array_type,
                array_size: items.len() as u32,
            });
        }
        Expression::TupleLiteral(items, _) => {
            let elem_vals: Vec<ValType> = match ctx.type_of(expr) {
                Type::Tuple(elems) => elems.iter().map(helpers::val_type).collect(),
                _ => items.iter().map(|item| helpers::val_type(&ctx.type_of(item))).collect(),
            };
            let struct_type = ensure_tuple_struct_type(builder, state, &elem_vals);
            for item in items {
                lower_expression(func, ctx, builder, state, item);
            }
            func.instruction(&Instruction::StructNew(struct_type));
        }
        Expression::RecordLiteral(fields, _) => {
            let field_vals: Vec<(String, ValType)> = match ctx.type_of(expr) {
                Type::Record(props) => props.iter().map(|(name, ty)| (name.clone(), helpers::val_type(ty))).collect(),
                _ => fields
                    .iter()
                    .map(|(name, value)| (name.clone(), helpers::val_type(&ctx.type_of(value))))
                    .collect(),
            };
            let struct_type = ensure_record_struct_type(builder, state, &field_vals);
            for (_, value) in fields {
                lower_expression(func, ctx, builder, state, value);
            }
            func.instruction(&Instruction::StructNew(struct_type));
        }
        Expression::StructLiteral { class_name, fields, .. } => {
            let Some(layout) = state.class_layouts.get(class_name) else {
                codegen_bug(&format!("no layout for class `{class_name}`"));
            };
            let (struct_type, vtable_global) = (layout.struct_type, layout.vtable_global);
            let field_index = layout.field_index.clone();
            func.instruction(&Instruction::StructNewDefault(struct_type));
            let new_tmp = ctx.local("__new_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __new_tmp scratch local"));
            func.instruction(&Instruction::LocalSet(new_tmp));
            func.instruction(&Instruction::LocalGet(new_tmp));
            func.instruction(&Instruction::GlobalGet(vtable_global));
            func.instruction(&Instruction::StructSet { struct_type_index: struct_type, field_index: 0 });
            for (name, value) in fields {
                let Some(&idx) = field_index.get(name) else {
                    codegen_bug(&format!("class `{class_name}` has no field `{name}`"));
                };
                func.instruction(&Instruction::LocalGet(new_tmp));
                lower_expression(func, ctx, builder, state, value);
                func.instruction(&Instruction::StructSet { struct_type_index: struct_type, field_index: idx });
            }
            func.instruction(&Instruction::LocalGet(new_tmp));
        }
        Expression::New { class_name, args, .. } => {
            let Some(layout_struct) = state.class_layouts.get(class_name).map(|l| (l.struct_type, l.vtable_global)) else {
                codegen_bug(&format!("no layout for class `{class_name}`"));
            };
            let (struct_type, vtable_global) = layout_struct;
            func.instruction(&Instruction::StructNewDefault(struct_type));
            let new_tmp = ctx.local("__new_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __new_tmp scratch local"));
            func.instruction(&Instruction::LocalSet(new_tmp));
            func.instruction(&Instruction::LocalGet(new_tmp));
            func.instruction(&Instruction::GlobalGet(vtable_global));
            func.instruction(&Instruction::StructSet { struct_type_index: struct_type, field_index: 0 });

            let qualified = format!("{class_name}.#new");
            if let Some(&ctor_idx) = state.function_indices.get(&qualified) {
                func.instruction(&Instruction::LocalGet(new_tmp));
                for arg in args {
                    lower_expression(func, ctx, builder, state, arg);
                }
                func.instruction(&Instruction::Call(ctor_idx));
                func.instruction(&Instruction::Drop);
            }
            func.instruction(&Instruction::LocalGet(new_tmp));
        }
        Expression::Cast { expr: inner, .. } => {
            lower_expression(func, ctx, builder, state, inner);
        }
        Expression::Match { scrutinee, arms, span } => lower_match(func, ctx, builder, state, expr, scrutinee, arms, *span),
        Expression::Block { statements, trailing, .. } => {
            for statement in statements {
                lower_statement(func, ctx, builder, state, statement);
            }
            if let Some(trailing) = trailing {
                lower_expression(func, ctx, builder, state, trailing);
            } else {
                func.instruction(&Instruction::RefNull(HeapType::ANY));
            }
        }
        Expression::Closure { params, body, .. } => {
            let Type::Function(func_type) = ctx.type_of(expr) else {
                codegen_bug("closure literal without a resolved function type");
            };
            let param_vals: Vec<ValType> = func_type.parameters.iter().map(helpers::val_type).collect();
            let result_val = helpers::val_type(&func_type.return_type);
            let (struct_type, fn_type_index) = closures::ensure_closure_types(builder, state, &param_vals, result_val);

            // Build the context struct: one field per captured name, in
            // the same sorted order `captured_names` returns, each
            // holding its current value at the point the closure is
            // created (captured by value, spec §3.4) — except a name
            // that's itself boxed (a mutable outer binding some closure
            // reassigns, or reassigned after capture), whose field
            // holds the shared cell reference instead, so a write on
            // either side stays visible to the other.
            let capture_names = closures::captured_names(params, body.as_ref());
            let mut capture_fields = Vec::with_capacity(capture_names.len());
            let mut captures_map = HashMap::new();
            for (i, name) in capture_names.iter().enumerate() {
                let slot = ctx.ident_slot(name);
                let field_ty = match slot.cell {
                    Some(cell_type) => ModuleBuilder::struct_ref(cell_type, true),
                    None => slot.val_ty,
                };
                capture_fields.push((StorageType::Val(field_ty), false));
                captures_map.insert(name.clone(), (i as u32, slot));
            }
            let ctx_struct_type = builder.add_struct_type(capture_fields, None);

            for name in &capture_names {
                emit_ident_repr(func, ctx, name);
            }
            func.instruction(&Instruction::StructNew(ctx_struct_type));
            let closure_ctx_tmp = ctx.local("__closure_ctx_tmp").map(|(i, _)| i).unwrap_or_else(|| codegen_bug("missing __closure_ctx_tmp scratch local"));
            func.instruction(&Instruction::LocalSet(closure_ctx_tmp));

            state.closure_counter += 1;
            let qualified_name = format!("__closure_{}", state.closure_counter);
            let param_names: Vec<String> = std::iter::once("__ctx".to_string()).chain(params.iter().map(|p| p.name.clone())).collect();
            let mut impl_param_vals = vec![helpers::any_ref()];
            impl_param_vals.extend(param_vals.iter().copied());
            let impl_index = lower_closure_impl(
                builder,
                state,
                ctx.types,
                ctx.node_types,
                &param_names,
                &impl_param_vals,
                result_val,
                fn_type_index,
                body.as_ref(),
                &qualified_name,
                captures_map,
                ctx_struct_type,
            );

            func.instruction(&Instruction::RefFunc(impl_index));
            func.instruction(&Instruction::LocalGet(closure_ctx_tmp));
            func.instruction(&Instruction::StructNew(struct_type));
        }
    }
}

/// Matches `collect_locals_expr`'s naming for the per-`match`-site
/// scrutinee scratch local.
fn match_scrutinee_local(span: NodeId) -> String {
    format!("__match_scrutinee_{}", span.0)
}

/// Resolves a `Pattern::EnumVariant`'s target variant class by name,
/// falling back to a search across every registered enum when the
/// pattern omits its enum name (`.Some(x)` rather than
/// `Option.Some(x)`) — mirrors `checker::patterns::find_enum_for_variant`.
fn resolve_variant_class_name(types: &ProgramTypes, enum_name: &Option<String>, variant: &str) -> Option<String> {
    if let Some(enum_name) = enum_name {
        return types
            .enum_variants
            .get(enum_name)
            .and_then(|variants| variants.get(variant))
            .map(|(_, class)| class.name.clone());
    }
    types
        .enum_variants
        .values()
        .find_map(|variants| variants.get(variant))
        .map(|(_, class)| class.name.clone())
}

/// `match` dispatch (spec §4.5): a nested-block `br_if`/`br` chain, one
/// inner block per arm. Each arm's block tests its pattern against the
/// scrutinee (already spilled to a scratch local so every arm can
/// re-examine it); a mismatch `br_if`s out of that arm's own block,
/// falling through to the next arm's block start. A match binds its
/// pattern's identifiers, checks its guard (same skip-on-false branch),
/// then evaluates the arm body and branches out to the enclosing
/// `$done` block with the result on the stack. Because arm blocks are
/// siblings rather than nested inside one another, both branch depths
/// are constant across every arm: `br_if 0` to skip, `br 1` to finish.
/// Exhaustiveness is already checker-proven, so the `unreachable` after
/// the last arm is never actually reached at runtime — it's there only
/// to satisfy the validator, which doesn't know that.
fn lower_match(
    func: &mut Function,
    ctx: &mut FnLowerCtx,
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    match_expr: &Expression,
    scrutinee: &Expression,
    arms: &[zena_ast::MatchArm],
    span: NodeId,
) {
    lower_expression(func, ctx, builder, state, scrutinee);
    let scrutinee_name = match_scrutinee_local(span);
    let Some((scrutinee_local, slot)) = ctx.local(&scrutinee_name) else {
        codegen_bug("missing match scrutinee scratch local");
    };
    func.instruction(&Instruction::LocalSet(scrutinee_local));

    let scrutinee_sem_ty = ctx.type_of(scrutinee);
    let result_ty = helpers::val_type(&ctx.type_of(match_expr));
    func.instruction(&Instruction::Block(BlockType::Result(result_ty)));
    for arm in arms {
        func.instruction(&Instruction::Block(BlockType::Empty));
        let push_scrutinee_for_test = move |f: &mut Function| {
            f.instruction(&Instruction::LocalGet(scrutinee_local));
        };
        lower_pattern_test(func, ctx, builder, state, &push_scrutinee_for_test, slot.val_ty, &scrutinee_sem_ty, &arm.pattern);
        func.instruction(&Instruction::I32Eqz);
        func.instruction(&Instruction::BrIf(0));

        let push_scrutinee = move |f: &mut Function| {
            f.instruction(&Instruction::LocalGet(scrutinee_local));
        };
        lower_pattern_bind(func, ctx, builder, state, &push_scrutinee, &scrutinee_sem_ty, &arm.pattern);

        if let Some(guard) = &arm.guard {
            lower_expression(func, ctx, builder, state, guard);
            func.instruction(&Instruction::I32Eqz);
            func.instruction(&Instruction::BrIf(0));
        }

        lower_expression(func, ctx, builder, state, &arm.body);
        func.instruction(&Instruction::Br(1));
        func.instruction(&Instruction::End);
    }
    func.instruction(&Instruction::Unreachable);
    func.instruction(&Instruction::End);
}

/// Pushes an `i32` boolean: whether `pattern` matches the value
/// `push_value` reloads (the bare scrutinee at the top call, or a
/// `ref.cast` + `struct.get` chain for a tuple element nested at any
/// depth, mirroring `lower_pattern_bind`'s composition). Struct/enum-
/// variant patterns test their own tag with `ref.test` (spec §4.5); a
/// field nested inside one that itself carries a non-binding
/// sub-pattern (e.g. a literal) isn't independently re-tested here —
/// only the outer tag is — so an arm that needs to discriminate on a
/// nested value should do it with a guard clause. A string-literal
/// pattern compares byte-for-byte against the pattern's own (compile-
/// time-known) content rather than `ref.eq`, since two separately
/// lowered string literals are two distinct `array.new_data` instances
/// with no shared identity `ref.eq` could compare.
#[allow(clippy::too_many_arguments)]
fn lower_pattern_test(
    func: &mut Function,
    ctx: &FnLowerCtx,
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    push_value: &dyn Fn(&mut Function),
    scrutinee_ty: ValType,
    scrutinee_sem_ty: &Type,
    pattern: &zena_ast::Pattern,
) {
    use zena_ast::{LiteralValue, Pattern};
    match pattern {
        Pattern::Wildcard | Pattern::Ident(_) => {
            func.instruction(&Instruction::I32Const(1));
        }
        Pattern::Literal(LiteralValue::Str(s)) => {
            let byte_array_type = ensure_byte_array_type(builder, state);
            let bytes = s.as_bytes();
            push_value(func);
            func.instruction(&Instruction::ArrayLen);
            func.instruction(&Instruction::I32Const(bytes.len() as i32));
            func.instruction(&Instruction::I32Eq);
            for (i, byte) in bytes.iter().enumerate() {
                push_value(func);
                func.instruction(&Instruction::I32Const(i as i32));
                func.instruction(&Instruction::ArrayGet { array_type_index: byte_array_type });
                func.instruction(&Instruction::I32Const(*byte as i32));
                func.instruction(&Instruction::I32Eq);
                func.instruction(&Instruction::I32And);
            }
        }
        Pattern::Literal(lit) => match (lit, scrutinee_ty) {
            (LiteralValue::Int(v), ValType::I32) => {
                push_value(func);
                func.instruction(&Instruction::I32Const(*v as i32));
                func.instruction(&Instruction::I32Eq);
            }
            (LiteralValue::Int(v), ValType::I64) => {
                push_value(func);
                func.instruction(&Instruction::I64Const(*v));
                func.instruction(&Instruction::I64Eq);
            }
            (LiteralValue::Float(bits), ValType::F32) => {
                push_value(func);
                func.instruction(&Instruction::F32Const(f64::from_bits(*bits) as f32));
                func.instruction(&Instruction::F32Eq);
            }
            (LiteralValue::Float(bits), ValType::F64) => {
                push_value(func);
                func.instruction(&Instruction::F64Const(f64::from_bits(*bits)));
                func.instruction(&Instruction::F64Eq);
            }
            (LiteralValue::Bool(b), _) => {
                push_value(func);
                func.instruction(&Instruction::I32Const(i32::from(*b)));
                func.instruction(&Instruction::I32Eq);
            }
            _ => {
                func.instruction(&Instruction::I32Const(1));
            }
        },
        Pattern::Tuple(sub_patterns) => {
            let elem_tys: Vec<Type> = match scrutinee_sem_ty {
                Type::Tuple(elems) if elems.len() == sub_patterns.len() => elems.clone(),
                _ => Vec::new(),
            };
            if elem_tys.is_empty() {
                func.instruction(&Instruction::I32Const(1));
                return;
            }
            let elem_vals: Vec<ValType> = elem_tys.iter().map(helpers::val_type).collect();
            let struct_type = ensure_tuple_struct_type(builder, state, &elem_vals);
            for (i, (sub, elem_ty)) in sub_patterns.iter().zip(elem_tys.iter()).enumerate() {
                let field_index = i as u32;
                let field_push = |f: &mut Function| {
                    push_value(f);
                    cast_to_struct(f, struct_type);
                    f.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index });
                };
                let elem_val = helpers::val_type(elem_ty);
                lower_pattern_test(func, ctx, builder, state, &field_push, elem_val, elem_ty, sub);
                if i > 0 {
                    func.instruction(&Instruction::I32And);
                }
            }
        }
        Pattern::Struct { name, .. } => {
            let Some(layout) = state.class_layouts.get(name) else {
                func.instruction(&Instruction::I32Const(1));
                return;
            };
            push_value(func);
            func.instruction(&Instruction::RefTest(RefType {
                nullable: false,
                heap_type: HeapType::Concrete(layout.struct_type),
            }));
        }
        Pattern::EnumVariant { enum_name, variant, .. } => {
            let Some(variant_class) = resolve_variant_class_name(ctx.types, enum_name, variant) else {
                func.instruction(&Instruction::I32Const(1));
                return;
            };
            let Some(layout) = state.class_layouts.get(&variant_class) else {
                func.instruction(&Instruction::I32Const(1));
                return;
            };
            push_value(func);
            func.instruction(&Instruction::RefTest(RefType {
                nullable: false,
                heap_type: HeapType::Concrete(layout.struct_type),
            }));
        }
        Pattern::Or(alternatives) => {
            let mut iter = alternatives.iter();
            match iter.next() {
                Some(first) => lower_pattern_test(func, ctx, builder, state, push_value, scrutinee_ty, scrutinee_sem_ty, first),
                None => {
                    func.instruction(&Instruction::I32Const(0));
                    return;
                }
            }
            for alt in iter {
                lower_pattern_test(func, ctx, builder, state, push_value, scrutinee_ty, scrutinee_sem_ty, alt);
                func.instruction(&Instruction::I32Or);
            }
        }
    }
}

/// Writes every identifier a (now tag-tested) pattern binds into its
/// pre-declared local. `push_value` emits whatever code reloads the
/// pattern's "current" destructuring target — the bare scrutinee at
/// the top call, or a `ref.cast` + `struct.get` chain for a nested
/// field — so a `Struct`/`EnumVariant`/`Tuple` sub-pattern at any depth
/// is bound by composing one more field access onto it, without
/// needing its own scratch local. `scrutinee_sem_ty` is only consulted
/// by the `Tuple` arm (to rebuild the same interned struct type
/// `lower_pattern_test` already allocated for this pattern); a tuple
/// pattern nested inside a `Struct`/`EnumVariant` field doesn't have
/// its element types threaded through and so isn't bound (consistent
/// with that case's pre-existing, documented scope limit).
#[allow(clippy::too_many_arguments)]
fn lower_pattern_bind(
    func: &mut Function,
    ctx: &FnLowerCtx,
    builder: &mut ModuleBuilder,
    state: &mut CodegenState,
    push_value: &dyn Fn(&mut Function),
    scrutinee_sem_ty: &Type,
    pattern: &zena_ast::Pattern,
) {
    use zena_ast::Pattern;
    match pattern {
        Pattern::Wildcard | Pattern::Literal(_) => {}
        Pattern::Tuple(sub_patterns) => {
            let elem_tys: Vec<Type> = match scrutinee_sem_ty {
                Type::Tuple(elems) if elems.len() == sub_patterns.len() => elems.clone(),
                _ => return,
            };
            let elem_vals: Vec<ValType> = elem_tys.iter().map(helpers::val_type).collect();
            let struct_type = ensure_tuple_struct_type(builder, state, &elem_vals);
            for (i, (sub, elem_ty)) in sub_patterns.iter().zip(elem_tys.iter()).enumerate() {
                let field_index = i as u32;
                let nested = |f: &mut Function| {
                    push_value(f);
                    cast_to_struct(f, struct_type);
                    f.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index });
                };
                lower_pattern_bind(func, ctx, builder, state, &nested, elem_ty, sub);
            }
        }
        Pattern::Ident(name) => {
            push_value(func);
            let Some((index, slot)) = ctx.local(name) else {
                codegen_bug(&format!("pattern binding `{name}` has no declared local"));
            };
            if let Some(cell_type) = slot.cell {
                func.instruction(&Instruction::StructNew(cell_type));
            }
            func.instruction(&Instruction::LocalSet(index));
        }
        Pattern::Struct { name, fields } => {
            let Some(layout) = state.class_layouts.get(name) else { return };
            let struct_type = layout.struct_type;
            let field_indices: Vec<(u32, &zena_ast::Pattern)> = fields
                .iter()
                .filter_map(|(field_name, field_pattern)| {
                    layout
                        .field_index
                        .get(field_name)
                        .or_else(|| layout.field_index.get(&format!("__{field_name}")))
                        .map(|&idx| (idx, field_pattern))
                })
                .collect();
            for (field_index, field_pattern) in field_indices {
                let nested = |f: &mut Function| {
                    push_value(f);
                    cast_to_struct(f, struct_type);
                    f.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index });
                };
                lower_pattern_bind(func, ctx, builder, state, &nested, &Type::Unknown, field_pattern);
            }
        }
        Pattern::EnumVariant { enum_name, variant, fields } => {
            let Some(variant_class) = resolve_variant_class_name(ctx.types, enum_name, variant) else { return };
            let Some(layout) = state.class_layouts.get(&variant_class) else { return };
            let struct_type = layout.struct_type;
            let field_indices: Vec<(u32, &zena_ast::Pattern)> = fields
                .iter()
                .enumerate()
                .filter_map(|(i, field_pattern)| layout.field_index.get(&format!("_{i}")).map(|&idx| (idx, field_pattern)))
                .collect();
            for (field_index, field_pattern) in field_indices {
                let nested = |f: &mut Function| {
                    push_value(f);
                    cast_to_struct(f, struct_type);
                    f.instruction(&Instruction::StructGet { struct_type_index: struct_type, field_index });
                };
                lower_pattern_bind(func, ctx, builder, state, &nested, &Type::Unknown, field_pattern);
            }
        }
        Pattern::Or(alternatives) => {
            // Only the first alternative's own bindings are ever
            // emitted here; every name an alternative can bind was
            // already pre-declared by `collect_locals_pattern`
            // regardless of which alternative matched, so a later
            // alternative's distinct binding shape (spec's Non-goals
            // don't require same-name-same-type across `|` arms to be
            // enforced by the checker) isn't something this needs to
            // reconcile at this pass.
            if let Some(first) = alternatives.first() {
                lower_pattern_bind(func, ctx, builder, state, push_value, scrutinee_sem_ty, first);
            }
        }
    }
}

fn ensure_byte_array_type(builder: &mut ModuleBuilder, state: &mut CodegenState) -> u32 {
    if let Some(index) = state.byte_array_type {
        return index;
    }
    let index = builder.add_array_type(StorageType::I8, false);
    state.byte_array_type = Some(index);
    index
}

fn lower_binary(func: &mut Function, ctx: &mut FnLowerCtx, builder: &mut ModuleBuilder, state: &mut CodegenState, left: &Expression, op: BinaryOp, right: &Expression) {
    match op {
        BinaryOp::And => {
            lower_expression(func, ctx, builder, state, left);
            func.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
            lower_expression(func, ctx, builder, state, right);
            func.instruction(&Instruction::Else);
            func.instruction(&Instruction::I32Const(0));
            func.instruction(&Instruction::End);
            return;
        }
        BinaryOp::Or => {
            lower_expression(func, ctx, builder, state, left);
            func.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
            func.instruction(&Instruction::I32Const(1));
            func.instruction(&Instruction::Else);
            lower_expression(func, ctx, builder, state, right);
            func.instruction(&Instruction::End);
            return;
        }
        _ => {}
    }
    // `ref.eq` is the correct opcode for `===`/`!==`; both operands must
    // already be reference-typed per the checker's `infer_binary`.
    if matches!(op, BinaryOp::RefEq | BinaryOp::RefNotEq) {
        lower_expression(func, ctx, builder, state, left);
        lower_expression(func, ctx, builder, state, right);
        func.instruction(&Instruction::RefEq);
        if op == BinaryOp::RefNotEq {
            func.instruction(&Instruction::I32Eqz);
        }
        return;
    }

    // Numeric promotion (spec §4.5): the narrower of the two operand
    // widths converts up to the wider before the operator runs, so
    // e.g. an `i32` compared against an `i64` compares as `i64`.
    let left_ty = helpers::val_type(&ctx.type_of(left));
    let right_ty = helpers::val_type(&ctx.type_of(right));
    let common = wider_val_type(left_ty, right_ty);

    lower_expression(func, ctx, builder, state, left);
    convert_numeric(func, left_ty, common);
    lower_expression(func, ctx, builder, state, right);
    convert_numeric(func, right_ty, common);

    use Instruction as I;
    let instruction = match (op, common) {
        (BinaryOp::Add, ValType::I32) => I::I32Add,
        (BinaryOp::Add, ValType::I64) => I::I64Add,
        (BinaryOp::Add, ValType::F32) => I::F32Add,
        (BinaryOp::Add, ValType::F64) => I::F64Add,
        (BinaryOp::Sub, ValType::I32) => I::I32Sub,
        (BinaryOp::Sub, ValType::I64) => I::I64Sub,
        (BinaryOp::Sub, ValType::F32) => I::F32Sub,
        (BinaryOp::Sub, ValType::F64) => I::F64Sub,
        (BinaryOp::Mul, ValType::I32) => I::I32Mul,
        (BinaryOp::Mul, ValType::I64) => I::I64Mul,
        (BinaryOp::Mul, ValType::F32) => I::F32Mul,
        (BinaryOp::Mul, ValType::F64) => I::F64Mul,
        (BinaryOp::Div, ValType::I32) => I::I32DivS,
        (BinaryOp::Div, ValType::I64) => I::I64DivS,
        (BinaryOp::Div, ValType::F32) => I::F32Div,
        (BinaryOp::Div, ValType::F64) => I::F64Div,
        (BinaryOp::Mod, ValType::I32) => I::I32RemS,
        (BinaryOp::Mod, ValType::I64) => I::I64RemS,
        // No float remainder instruction in wasm; float `%` is not
        // reachable from any source program the checker accepts today.
        (BinaryOp::Mod, ValType::F32 | ValType::F64) => I::Unreachable,
        (BinaryOp::Eq, ValType::I32) => I::I32Eq,
        (BinaryOp::Eq, ValType::I64) => I::I64Eq,
        (BinaryOp::Eq, ValType::F32) => I::F32Eq,
        (BinaryOp::Eq, ValType::F64) => I::F64Eq,
        (BinaryOp::NotEq, ValType::I32) => I::I32Ne,
        (BinaryOp::NotEq, ValType::I64) => I::I64Ne,
        (BinaryOp::NotEq, ValType::F32) => I::F32Ne,
        (BinaryOp::NotEq, ValType::F64) => I::F64Ne,
        (BinaryOp::Lt, ValType::I32) => I::I32LtS,
        (BinaryOp::Lt, ValType::I64) => I::I64LtS,
        (BinaryOp::Lt, ValType::F32) => I::F32Lt,
        (BinaryOp::Lt, ValType::F64) => I::F64Lt,
        (BinaryOp::LtEq, ValType::I32) => I::I32LeS,
        (BinaryOp::LtEq, ValType::I64) => I::I64LeS,
        (BinaryOp::LtEq, ValType::F32) => I::F32Le,
        (BinaryOp::LtEq, ValType::F64) => I::F64Le,
        (BinaryOp::Gt, ValType::I32) => I::I32GtS,
        (BinaryOp::Gt, ValType::I64) => I::I64GtS,
        (BinaryOp::Gt, ValType::F32) => I::F32Gt,
        (BinaryOp::Gt, ValType::F64) => I::F64Gt,
        (BinaryOp::GtEq, ValType::I32) => I::I32GeS,
        (BinaryOp::GtEq, ValType::I64) => I::I64GeS,
        (BinaryOp::GtEq, ValType::F32) => I::F32Ge,
        (BinaryOp::GtEq, ValType::F64) => I::F64Ge,
        (BinaryOp::RefEq | BinaryOp::RefNotEq, _) => unreachable!("handled above"),
        (BinaryOp::And | BinaryOp::Or, _) => unreachable!("handled above"),
        _ => I::Unreachable,
    };
    func.instruction(&instruction);
}

/// Orders `ValType`s by numeric promotion rank (spec §4.5: i32 < i64 <
/// f32 < f64) and returns the wider of the two; non-numeric types rank
/// lowest and never win against an actual numeric type.
fn wider_val_type(a: ValType, b: ValType) -> ValType {
    fn rank(v: ValType) -> u8 {
        match v {
            ValType::I32 => 0,
            ValType::I64 => 1,
            ValType::F32 => 2,
            ValType::F64 => 3,
            _ => 0,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}
