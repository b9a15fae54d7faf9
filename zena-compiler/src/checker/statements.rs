//! Statement and control-flow checking (spec §4.3).

use zena_ast::{Block, Statement};

use crate::context::CheckerContext;
use crate::resolver::resolve_type_expr;
use crate::types::{print_type, widen_literal, Type};

use super::expressions::infer_expression;
use super::ProgramTypes;

pub fn check_block(ctx: &mut CheckerContext, types: &mut ProgramTypes, block: &Block) {
    ctx.push_scope();
    for stmt in &block.statements {
        check_statement(ctx, types, stmt);
    }
    ctx.pop_scope();
}

pub fn check_statement(ctx: &mut CheckerContext, types: &mut ProgramTypes, stmt: &Statement) {
    match stmt {
        Statement::Let {
            is_mutable,
            name,
            ty,
            value,
            span,
        } => {
            let inferred = infer_expression(ctx, types, value);
            let declared = match ty {
                Some(annotation) => {
                    let annotated = resolve_type_expr(ctx, annotation);
                    if !super::assignable(types, &inferred, &annotated) {
                        let s = ctx.span_for(*span);
                        ctx.emit_error(
                            "TypeMismatch",
                            format!(
                                "cannot assign `{}` to `{name}` of type `{}`",
                                print_type(&inferred),
                                print_type(&annotated)
                            ),
                            s,
                        );
                    }
                    annotated
                }
                // `var`/no annotation: widen literal types to their base.
                None => widen_literal(&inferred),
            };
            // Recorded under the `let`'s own span so codegen can look up
            // the binding's exact runtime type (not just `anyref`) when
            // it allocates the local.
            ctx.record_type(*span, declared.clone());
            ctx.declare_variable(name, declared, *is_mutable);
        }
        Statement::Assign { target, value, span } => {
            let target_ty = infer_expression(ctx, types, target);
            let value_ty = infer_expression(ctx, types, value);
            if let zena_ast::Expression::Ident(name, _) = target {
                if !ctx.is_variable_mutable(name) && ctx.lookup_variable(name).is_some() {
                    let s = ctx.span_for(*span);
                    ctx.emit_error("TypeMismatch", format!("cannot assign to immutable binding `{name}`"), s);
                }
            }
            if !super::assignable(types, &value_ty, &target_ty) {
                let s = ctx.span_for(*span);
                ctx.emit_error(
                    "TypeMismatch",
                    format!(
                        "cannot assign `{}` to target of type `{}`",
                        print_type(&value_ty),
                        print_type(&target_ty)
                    ),
                    s,
                );
            }
        }
        Statement::Return(value, id) => {
            let Some(expected) = ctx.current_return_type.clone() else {
                let span = ctx.span_for(*id);
                ctx.emit_error("ReturnOutsideFunction", "`return` outside a function".to_string(), span);
                if let Some(value) = value {
                    infer_expression(ctx, types, value);
                }
                return;
            };
            let actual = value
                .as_ref()
                .map(|v| infer_expression(ctx, types, v))
                .unwrap_or(Type::Void);
            if !super::assignable(types, &actual, &expected) {
                let span = ctx.span_for(*id);
                ctx.emit_error(
                    "TypeMismatch",
                    format!(
                        "cannot return `{}` from a function returning `{}`",
                        print_type(&actual),
                        print_type(&expected)
                    ),
                    span,
                );
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::If {
            condition,
            then_block,
            elif_branches,
            else_block,
            span,
        } => {
            check_condition(ctx, types, condition, *span);
            check_block(ctx, types, then_block);
            for (cond, block) in elif_branches {
                check_condition(ctx, types, cond, *span);
                check_block(ctx, types, block);
            }
            if let Some(block) = else_block {
                check_block(ctx, types, block);
            }
        }
        Statement::While { condition, body, span } => {
            check_condition(ctx, types, condition, *span);
            check_block(ctx, types, body);
        }
        Statement::For {
            init,
            condition,
            post,
            body,
            ..
        } => {
            ctx.push_scope();
            if let Some(init) = init {
                check_statement(ctx, types, init);
            }
            if let Some(condition) = condition {
                let ty = infer_expression(ctx, types, condition);
                if !is_boolean_like(&ty) {
                    ctx.emit_error(
                        "TypeMismatch",
                        "for-loop condition must be boolean".to_string(),
                        zena_diagnostics::Span::unknown(),
                    );
                }
            }
            if let Some(post) = post {
                check_statement(ctx, types, post);
            }
            check_block(ctx, types, body);
            ctx.pop_scope();
        }
        Statement::ForIn {
            binding,
            iterable,
            body,
            span,
        } => {
            let iterable_ty = infer_expression(ctx, types, iterable);
            let element_ty = element_type_of_iterable(ctx, &iterable_ty, *span);
            ctx.push_scope();
            ctx.declare_variable(binding, element_ty, false);
            check_block(ctx, types, body);
            ctx.pop_scope();
        }
        Statement::Expression(expr) => {
            infer_expression(ctx, types, expr);
        }
    }
}

fn check_condition(ctx: &mut CheckerContext, types: &mut ProgramTypes, condition: &zena_ast::Expression, span: zena_ast::NodeId) {
    let ty = infer_expression(ctx, types, condition);
    if !is_boolean_like(&ty) {
        let s = ctx.span_for(span);
        ctx.emit_error("TypeMismatch", "condition must be a boolean".to_string(), s);
    }
}

fn is_boolean_like(ty: &Type) -> bool {
    matches!(ty, Type::Boolean | Type::Unknown)
        || matches!(ty, Type::Literal(crate::types::LiteralValue::Bool(_)))
}


/// Lowers `for (x in iterable)` against the well-known `Iterable`/
/// `Iterator` interfaces: the element type is the second element of the
/// `(bool, T)` pair `Iterator::next()` returns (spec §9's tagged-pair
/// description).
fn element_type_of_iterable(ctx: &mut CheckerContext, iterable_ty: &Type, span: zena_ast::NodeId) -> Type {
    if let Type::Array(elem) = iterable_ty {
        return (**elem).clone();
    }
    if let Type::Class(class) = iterable_ty {
        if let Some((_, iterator_fn)) = class
            .methods
            .borrow()
            .iter()
            .find(|(name, _)| name == "iterator")
        {
            if let Type::Interface(iterator_iface) = &iterator_fn.return_type {
                if let Some((_, next_fn)) = iterator_iface
                    .methods
                    .borrow()
                    .iter()
                    .find(|(name, _)| name == "next")
                {
                    if let Type::Tuple(members) = &next_fn.return_type {
                        if members.len() == 2 {
                            return members[1].clone();
                        }
                    }
                }
            }
        }
    }
    let s = ctx.span_for(span);
    ctx.emit_error(
        "TypeMismatch",
        format!("`{}` is not iterable", print_type(iterable_ty)),
        s,
    );
    Type::Unknown
}
