//! Closure layout (spec §3.4): a closure value is a two-field struct —
//! a `call_ref`-able function reference and a captures struct holding
//! every non-locally-bound identifier the closure body reads. A
//! captured name that's never reassigned (by either side, anywhere in
//! its lifetime) is stored by value, same as any other read. A name
//! that's `is_mutable` (a `var` local, or a parameter — always
//! reassignable per the checker) and that some closure nested
//! anywhere inside its declaring scope actually captures is instead
//! boxed: its local/parameter slot holds a one-field mutable "cell"
//! struct rather than the value directly, and the captures struct
//! stores the shared cell reference rather than a snapshot, so a write
//! from the declaring scope or from any closure (at any nesting depth)
//! is visible to the other side. See `codegen::expressions`'s
//! `declare_params`/`IdentSlot`/`emit_ident_repr` for how a binding's
//! boxed-ness is decided once, at its point of declaration, and
//! propagated down through every level of nested capture from there.
//! Not boxed: a `for..in` loop's per-iteration binding, since lowering
//! writes it with a direct `local.tee` each iteration rather than
//! allocating a fresh cell per iteration (the per-iteration rebinding a
//! boxed loop variable would need).
//!
//! Adapter closures (spec §4.2 rule 17, function-to-function
//! assignability with a narrower arity or widened parameter types) are
//! synthesized as an ordinary closure whose body just forwards to the
//! original function value with the excess parameters dropped or the
//! parameter types upcast — no special runtime support needed beyond
//! what a normal closure already lowers to.

use std::collections::BTreeSet;

use wasm_encoder::{StorageType, ValType};
use zena_ast::{Block, ClosureBody, Expression, Statement};

use crate::codegen::{helpers, CodegenState};
use crate::wasm::ModuleBuilder;

/// Returns (and lazily allocates) the closure struct type and the
/// underlying `call_ref`-able function type for a closure signature
/// with the given *user-visible* parameter/result `ValType`s (the
/// context parameter is implicit and always `anyref`, per spec §3.4).
/// Shared across every closure literal/adapter of the same signature.
pub fn ensure_closure_types(builder: &mut ModuleBuilder, state: &mut CodegenState, param_vals: &[ValType], result_val: ValType) -> (u32, u32) {
    let key = format!("{param_vals:?}->{result_val:?}");
    if let Some(&pair) = state.closure_types.get(&key) {
        return pair;
    }
    let mut fn_params = vec![helpers::any_ref()];
    fn_params.extend(param_vals.iter().copied());
    let func_type = builder.add_function_type(fn_params, vec![result_val]);
    let fields = vec![
        (StorageType::Val(ModuleBuilder::struct_ref(func_type, true)), false),
        (StorageType::Val(helpers::any_ref()), false),
    ];
    let struct_type = builder.add_struct_type(fields, None);
    state.closure_types.insert(key, (struct_type, func_type));
    (struct_type, func_type)
}

/// Returns (and lazily allocates) the one-field mutable "cell" struct
/// type boxing a value physically represented as `val_ty`, shared
/// across every mutably captured binding of that representation.
pub fn ensure_cell_type(builder: &mut ModuleBuilder, state: &mut CodegenState, val_ty: ValType) -> u32 {
    let key = format!("{val_ty:?}");
    if let Some(&index) = state.cell_types.get(&key) {
        return index;
    }
    let fields = vec![(StorageType::Val(val_ty), true)];
    let index = builder.add_struct_type(fields, None);
    state.cell_types.insert(key, index);
    index
}

/// Every free identifier a closure body reads, in name order so layout
/// is deterministic across builds of the same source.
pub fn captured_names(params: &[zena_ast::Param], body: &ClosureBody) -> Vec<String> {
    let mut bound: BTreeSet<String> = params.iter().map(|p| p.name.clone()).collect();
    let mut free = BTreeSet::new();
    match body {
        ClosureBody::Expr(expr) => collect_free_in_expr(expr, &mut bound, &mut free),
        ClosureBody::Block(block) => collect_free_in_block(block, &mut bound, &mut free),
    }
    free.into_iter().collect()
}

/// Every name some closure literal inside `block` — at any nesting
/// depth — captures from outside itself: the set of candidate bindings
/// the function `block` is the body of must box if it also declares
/// that name as a mutable local or parameter (see
/// `codegen::expressions::declare_params` and its `Let`-statement
/// counterpart). Unlike `captured_names`, which computes one closure
/// literal's own immediate capture list relative to its own bound set,
/// this walks every closure literal found and unions their already-
/// computed capture lists — each closure's own list already correctly
/// bubbles up names free in its own nested closures, so no bound-set
/// tracking is needed here.
pub fn closure_captured_names_in_block(block: &Block) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    scan_block_for_closures(block, &mut out);
    out
}

/// Like `closure_captured_names_in_block`, for a closure's own body —
/// used when lowering a closure literal that itself contains nested
/// closures capturing one of its own parameters or locals.
pub fn closure_captured_names_in_closure_body(body: &ClosureBody) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    match body {
        ClosureBody::Expr(expr) => scan_expr_for_closures(expr, &mut out),
        ClosureBody::Block(block) => scan_block_for_closures(block, &mut out),
    }
    out
}

fn scan_block_for_closures(block: &Block, out: &mut BTreeSet<String>) {
    for statement in &block.statements {
        scan_statement_for_closures(statement, out);
    }
}

fn scan_statement_for_closures(statement: &Statement, out: &mut BTreeSet<String>) {
    match statement {
        Statement::Let { value, .. } => scan_expr_for_closures(value, out),
        Statement::Assign { target, value, .. } => {
            scan_expr_for_closures(target, out);
            scan_expr_for_closures(value, out);
        }
        Statement::Return(value, _) => {
            if let Some(value) = value {
                scan_expr_for_closures(value, out);
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::If { condition, then_block, elif_branches, else_block, .. } => {
            scan_expr_for_closures(condition, out);
            scan_block_for_closures(then_block, out);
            for (cond, block) in elif_branches {
                scan_expr_for_closures(cond, out);
                scan_block_for_closures(block, out);
            }
            if let Some(block) = else_block {
                scan_block_for_closures(block, out);
            }
        }
        Statement::While { condition, body, .. } => {
            scan_expr_for_closures(condition, out);
            scan_block_for_closures(body, out);
        }
        Statement::For { init, condition, post, body, .. } => {
            if let Some(init) = init {
                scan_statement_for_closures(init, out);
            }
            if let Some(condition) = condition {
                scan_expr_for_closures(condition, out);
            }
            if let Some(post) = post {
                scan_statement_for_closures(post, out);
            }
            scan_block_for_closures(body, out);
        }
        Statement::ForIn { iterable, body, .. } => {
            scan_expr_for_closures(iterable, out);
            scan_block_for_closures(body, out);
        }
        Statement::Expression(expr, _) => scan_expr_for_closures(expr, out),
    }
}

fn scan_expr_for_closures(expr: &Expression, out: &mut BTreeSet<String>) {
    match expr {
        Expression::Closure { params, body, .. } => {
            out.extend(captured_names(params, body.as_ref()));
            match body.as_ref() {
                ClosureBody::Expr(inner) => scan_expr_for_closures(inner, out),
                ClosureBody::Block(block) => scan_block_for_closures(block, out),
            }
        }
        Expression::IntLiteral(..)
        | Expression::FloatLiteral(..)
        | Expression::StringLiteral(..)
        | Expression::BoolLiteral(..)
        | Expression::NullLiteral(_)
        | Expression::Ident(..)
        | Expression::This(_)
        | Expression::Super(_) => {}
        Expression::Binary { left, right, .. } => {
            scan_expr_for_closures(left, out);
            scan_expr_for_closures(right, out);
        }
        Expression::Unary { expr: inner, .. } => scan_expr_for_closures(inner, out),
        Expression::Call { callee, args, .. } => {
            scan_expr_for_closures(callee, out);
            for arg in args {
                scan_expr_for_closures(arg, out);
            }
        }
        Expression::MethodCall { receiver, args, .. } => {
            scan_expr_for_closures(receiver, out);
            for arg in args {
                scan_expr_for_closures(arg, out);
            }
        }
        Expression::FieldAccess { object, .. } => scan_expr_for_closures(object, out),
        Expression::Index { object, index, .. } => {
            scan_expr_for_closures(object, out);
            scan_expr_for_closures(index, out);
        }
        Expression::ArrayLiteral(items, _) | Expression::TupleLiteral(items, _) => {
            for item in items {
                scan_expr_for_closures(item, out);
            }
        }
        Expression::RecordLiteral(fields, _) => {
            for (_, value) in fields {
                scan_expr_for_closures(value, out);
            }
        }
        Expression::StructLiteral { fields, .. } => {
            for (_, value) in fields {
                scan_expr_for_closures(value, out);
            }
        }
        Expression::New { args, .. } => {
            for arg in args {
                scan_expr_for_closures(arg, out);
            }
        }
        Expression::Cast { expr: inner, .. } => scan_expr_for_closures(inner, out),
        Expression::Match { scrutinee, arms, .. } => {
            scan_expr_for_closures(scrutinee, out);
            for arm in arms {
                if let Some(guard) = &arm.guard {
                    scan_expr_for_closures(guard, out);
                }
                scan_expr_for_closures(&arm.body, out);
            }
        }
        Expression::Block { statements, trailing, .. } => {
            for statement in statements {
                scan_statement_for_closures(statement, out);
            }
            if let Some(trailing) = trailing {
                scan_expr_for_closures(trailing, out);
            }
        }
    }
}

fn collect_free_in_block(block: &zena_ast::Block, bound: &mut BTreeSet<String>, free: &mut BTreeSet<String>) {
    let mut local_bound = bound.clone();
    for statement in &block.statements {
        collect_free_in_statement(statement, &mut local_bound, free);
    }
}

fn collect_free_in_statement(statement: &Statement, bound: &mut BTreeSet<String>, free: &mut BTreeSet<String>) {
    match statement {
        Statement::Let { name, value, .. } => {
            collect_free_in_expr(value, bound, free);
            bound.insert(name.clone());
        }
        Statement::Assign { target, value, .. } => {
            collect_free_in_expr(target, bound, free);
            collect_free_in_expr(value, bound, free);
        }
        Statement::Return(value, _) => {
            if let Some(value) = value {
                collect_free_in_expr(value, bound, free);
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::If { condition, then_block, elif_branches, else_block, .. } => {
            collect_free_in_expr(condition, bound, free);
            collect_free_in_block(then_block, bound, free);
            for (cond, block) in elif_branches {
                collect_free_in_expr(cond, bound, free);
                collect_free_in_block(block, bound, free);
            }
            if let Some(block) = else_block {
                collect_free_in_block(block, bound, free);
            }
        }
        Statement::While { condition, body, .. } => {
            collect_free_in_expr(condition, bound, free);
            collect_free_in_block(body, bound, free);
        }
        Statement::For { init, condition, post, body, .. } => {
            let mut scope = bound.clone();
            if let Some(init) = init {
                collect_free_in_statement(init, &mut scope, free);
            }
            if let Some(condition) = condition {
                collect_free_in_expr(condition, &mut scope, free);
            }
            if let Some(post) = post {
                collect_free_in_statement(post, &mut scope, free);
            }
            collect_free_in_block(body, &mut scope, free);
        }
        Statement::ForIn { binding, iterable, body, .. } => {
            collect_free_in_expr(iterable, bound, free);
            let mut scope = bound.clone();
            scope.insert(binding.clone());
            collect_free_in_block(body, &mut scope, free);
        }
        Statement::Expression(expr, _) => collect_free_in_expr(expr, bound, free),
    }
}

fn collect_free_in_expr(expr: &Expression, bound: &mut BTreeSet<String>, free: &mut BTreeSet<String>) {
    match expr {
        Expression::Ident(name, _) => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
        }
        Expression::IntLiteral(..)
        | Expression::FloatLiteral(..)
        | Expression::StringLiteral(..)
        | Expression::BoolLiteral(..)
        | Expression::NullLiteral(_)
        | Expression::Super(_) => {}
        // `this` is never a closure parameter, so a reference to it
        // inside a closure body is always a capture of the enclosing
        // method's receiver (captured like any other free identifier,
        // under the reserved name `"this"`).
        Expression::This(_) => {
            if !bound.contains("this") {
                free.insert("this".to_string());
            }
        }
        Expression::Binary { left, right, .. } => {
            collect_free_in_expr(left, bound, free);
            collect_free_in_expr(right, bound, free);
        }
        Expression::Unary { expr, .. } => collect_free_in_expr(expr, bound, free),
        Expression::Call { callee, args, .. } => {
            collect_free_in_expr(callee, bound, free);
            for arg in args {
                collect_free_in_expr(arg, bound, free);
            }
        }
        Expression::MethodCall { receiver, args, .. } => {
            collect_free_in_expr(receiver, bound, free);
            for arg in args {
                collect_free_in_expr(arg, bound, free);
            }
        }
        Expression::FieldAccess { object, .. } => collect_free_in_expr(object, bound, free),
        Expression::Index { object, index, .. } => {
            collect_free_in_expr(object, bound, free);
            collect_free_in_expr(index, bound, free);
        }
        Expression::ArrayLiteral(items, _) | Expression::TupleLiteral(items, _) => {
            for item in items {
                collect_free_in_expr(item, bound, free);
            }
        }
        Expression::RecordLiteral(fields, _) => {
            for (_, value) in fields {
                collect_free_in_expr(value, bound, free);
            }
        }
        Expression::StructLiteral { fields, .. } => {
            for (_, value) in fields {
                collect_free_in_expr(value, bound, free);
            }
        }
        Expression::New { args, .. } => {
            for arg in args {
                collect_free_in_expr(arg, bound, free);
            }
        }
        Expression::Cast { expr, .. } => collect_free_in_expr(expr, bound, free),
        Expression::Match { scrutinee, arms, .. } => {
            collect_free_in_expr(scrutinee, bound, free);
            for arm in arms {
                let mut scope = bound.clone();
                bind_pattern(&arm.pattern, &mut scope);
                if let Some(guard) = &arm.guard {
                    collect_free_in_expr(guard, &mut scope, free);
                }
                collect_free_in_expr(&arm.body, &mut scope, free);
            }
        }
        Expression::Block { statements, trailing, .. } => {
            let mut scope = bound.clone();
            for statement in statements {
                collect_free_in_statement(statement, &mut scope, free);
            }
            if let Some(trailing) = trailing {
                collect_free_in_expr(trailing, &mut scope, free);
            }
        }
        Expression::Closure { params, body, .. } => {
            let mut scope = bound.clone();
            for param in params {
                scope.insert(param.name.clone());
            }
            match body.as_ref() {
                ClosureBody::Expr(inner) => collect_free_in_expr(inner, &mut scope, free),
                ClosureBody::Block(block) => collect_free_in_block(block, &mut scope, free),
            }
        }
    }
}

fn bind_pattern(pattern: &zena_ast::Pattern, bound: &mut BTreeSet<String>) {
    use zena_ast::Pattern;
    match pattern {
        Pattern::Wildcard | Pattern::Literal(_) => {}
        Pattern::Ident(name) => {
            bound.insert(name.clone());
        }
        Pattern::Tuple(patterns) | Pattern::Or(patterns) => {
            for p in patterns {
                bind_pattern(p, bound);
            }
        }
        Pattern::Struct { fields, .. } => {
            for (_, p) in fields {
                bind_pattern(p, bound);
            }
        }
        Pattern::EnumVariant { fields, .. } => {
            for p in fields {
                bind_pattern(p, bound);
            }
        }
    }
}
