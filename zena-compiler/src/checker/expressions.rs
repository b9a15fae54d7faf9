//! Expression type inference.

use std::rc::Rc;

use zena_ast::{BinaryOp, ClosureBody, Expression, UnaryOp};

use crate::context::CheckerContext;
use crate::resolver::{instantiate_generic, resolve_type_expr};
use crate::types::{print_type, FunctionType, LiteralValue, NumberKind, Type};

use super::patterns::check_pattern;
use super::statements::check_statement;
use super::ProgramTypes;

/// Every expression variant's `NodeId`, wherever the grammar puts it
/// (a trailing positional field for leaves, a `span` field for the
/// rest) — the same id `infer_expression` records its inferred type
/// under, so codegen can look a node's static type back up by id.
pub(crate) fn expression_id(expr: &Expression) -> zena_ast::NodeId {
    match expr {
        Expression::IntLiteral(_, id)
        | Expression::FloatLiteral(_, id)
        | Expression::StringLiteral(_, id)
        | Expression::BoolLiteral(_, id)
        | Expression::NullLiteral(id)
        | Expression::Ident(_, id)
        | Expression::This(id)
        | Expression::Super(id)
        | Expression::ArrayLiteral(_, id)
        | Expression::TupleLiteral(_, id)
        | Expression::RecordLiteral(_, id) => *id,
        Expression::Binary { span, .. }
        | Expression::Unary { span, .. }
        | Expression::Call { span, .. }
        | Expression::MethodCall { span, .. }
        | Expression::FieldAccess { span, .. }
        | Expression::Index { span, .. }
        | Expression::StructLiteral { span, .. }
        | Expression::New { span, .. }
        | Expression::Cast { span, .. }
        | Expression::Match { span, .. }
        | Expression::Block { span, .. }
        | Expression::Closure { span, .. } => *span,
    }
}

pub fn infer_expression(ctx: &mut CheckerContext, types: &mut ProgramTypes, expr: &Expression) -> Type {
    let ty = infer_expression_kind(ctx, types, expr);
    ctx.record_type(expression_id(expr), ty.clone());
    ty
}

fn infer_expression_kind(ctx: &mut CheckerContext, types: &mut ProgramTypes, expr: &Expression) -> Type {
    match expr {
        Expression::IntLiteral(v, _) => Type::Literal(LiteralValue::Int(*v)),
        Expression::FloatLiteral(v, _) => Type::Literal(LiteralValue::Float(v.to_bits())),
        Expression::StringLiteral(s, _) => Type::Literal(LiteralValue::Str(s.clone())),
        Expression::BoolLiteral(b, _) => Type::Literal(LiteralValue::Bool(*b)),
        Expression::NullLiteral(_) => Type::Null,
        Expression::This(id) => ctx.current_this_type.clone().unwrap_or_else(|| {
            let span = ctx.span_for(*id);
            ctx.emit_error("UnknownError", "`this` used outside a method".to_string(), span);
            Type::Unknown
        }),
        Expression::Super(id) => match &ctx.current_this_type {
            Some(Type::Class(class)) => class.super_type.borrow().clone().unwrap_or_else(|| {
                let span = ctx.span_for(*id);
                ctx.emit_error("UnknownError", "class has no superclass".to_string(), span);
                Type::Unknown
            }),
            _ => {
                let span = ctx.span_for(*id);
                ctx.emit_error("UnknownError", "`super` used outside a method".to_string(), span);
                Type::Unknown
            }
        },
        Expression::Ident(name, id) => resolve_ident(ctx, types, name, *id),
        Expression::Binary { left, op, right, span } => {
            infer_binary(ctx, types, left, *op, right, *span)
        }
        Expression::Unary { op, expr, span } => infer_unary(ctx, types, *op, expr, *span),
        Expression::Call { callee, args, type_args: _, span } => {
            infer_call(ctx, types, callee, args, *span)
        }
        Expression::MethodCall {
            receiver,
            method,
            args,
            span,
            ..
        } => infer_method_call(ctx, types, receiver, method, args, *span),
        Expression::FieldAccess { object, field, span } => {
            infer_field_access(ctx, types, object, field, *span)
        }
        Expression::Index { object, index, span } => {
            let object_ty = infer_expression(ctx, types, object);
            let index_ty = infer_expression(ctx, types, index);
            if !super::assignable(types, &index_ty, &Type::Number(NumberKind::I32)) {
                let s = ctx.span_for(*span);
                ctx.emit_error("TypeMismatch", "array index must be an integer".to_string(), s);
            }
            match object_ty {
                Type::Array(elem) => (*elem).clone(),
                other => {
                    let s = ctx.span_for(*span);
                    ctx.emit_error(
                        "TypeMismatch",
                        format!("cannot index into `{}`", print_type(&other)),
                        s,
                    );
                    Type::Unknown
                }
            }
        }
        Expression::ArrayLiteral(items, _) => {
            let elem = items
                .first()
                .map(|e| infer_expression(ctx, types, e))
                .unwrap_or(Type::Never);
            for item in items.iter().skip(1) {
                infer_expression(ctx, types, item);
            }
            Type::Array(Rc::new(elem))
        }
        Expression::TupleLiteral(items, _) => Type::Tuple(
            items.iter().map(|e| infer_expression(ctx, types, e)).collect(),
        ),
        Expression::RecordLiteral(fields, _) => Type::Record(
            fields
                .iter()
                .map(|(name, e)| (name.clone(), infer_expression(ctx, types, e)))
                .collect(),
        ),
        Expression::StructLiteral { class_name, fields, span, .. } => {
            infer_struct_literal(ctx, types, class_name, fields, *span)
        }
        Expression::New { class_name, type_args, args, span } => {
            infer_new(ctx, types, class_name, type_args, args, *span)
        }
        Expression::Cast { expr, target, .. } => {
            infer_expression(ctx, types, expr);
            resolve_type_expr(ctx, target)
        }
        Expression::Match { scrutinee, arms, span } => infer_match(ctx, types, scrutinee, arms, *span),
        Expression::Block { statements, trailing, .. } => {
            ctx.push_scope();
            for stmt in statements {
                check_statement(ctx, types, stmt);
            }
            let result = trailing
                .as_ref()
                .map(|e| infer_expression(ctx, types, e))
                .unwrap_or(Type::Void);
            ctx.pop_scope();
            result
        }
        Expression::Closure { params, return_type, body, .. } => {
            infer_closure(ctx, types, params, return_type, body)
        }
    }
}

fn resolve_ident(ctx: &mut CheckerContext, types: &ProgramTypes, name: &str, id: zena_ast::NodeId) -> Type {
    if let Some(ty) = ctx.lookup_variable(name) {
        return ty.clone();
    }
    if let Some(ty) = types.consts.get(name) {
        return ty.clone();
    }
    if let Some(func) = types.functions.get(name) {
        return Type::Function(func.clone());
    }
    let span = ctx.span_for(id);
    ctx.emit_error("SymbolNotFound", format!("cannot find `{name}` in this scope"), span);
    Type::Unknown
}

fn infer_binary(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    left: &Expression,
    op: BinaryOp,
    right: &Expression,
    span: zena_ast::NodeId,
) -> Type {
    let lhs = infer_expression(ctx, types, left);
    let rhs = infer_expression(ctx, types, right);
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let s = ctx.span_for(span);
            if !is_boolean_like(&lhs) || !is_boolean_like(&rhs) {
                ctx.emit_error("TypeMismatch", "logical operator requires boolean operands".to_string(), s);
            }
            Type::Boolean
        }
        BinaryOp::Eq | BinaryOp::NotEq => Type::Boolean,
        BinaryOp::RefEq | BinaryOp::RefNotEq => {
            let s = ctx.span_for(span);
            if !lhs.is_reference() || !rhs.is_reference() {
                ctx.emit_error(
                    "TypeMismatch",
                    "`===`/`!==` require reference-typed operands".to_string(),
                    s,
                );
            }
            Type::Boolean
        }
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            numeric_promotion(ctx, &lhs, &rhs, span);
            Type::Boolean
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            numeric_promotion(ctx, &lhs, &rhs, span)
        }
    }
}

fn is_boolean_like(ty: &Type) -> bool {
    matches!(ty, Type::Boolean | Type::Unknown)
        || matches!(ty, Type::Literal(LiteralValue::Bool(_)))
}

/// If either operand is `f64`/`f32`, both sides convert to that width
/// before the operator applies; otherwise the result is `i32`.
fn numeric_promotion(ctx: &mut CheckerContext, lhs: &Type, rhs: &Type, span: zena_ast::NodeId) -> Type {
    let lhs_kind = number_kind_of(lhs);
    let rhs_kind = number_kind_of(rhs);
    match (lhs_kind, rhs_kind) {
        (Some(a), Some(b)) => {
            if a.is_float() || b.is_float() {
                Type::Number(if a == NumberKind::F64 || b == NumberKind::F64 {
                    NumberKind::F64
                } else {
                    NumberKind::F32
                })
            } else {
                Type::Number(NumberKind::I32)
            }
        }
        _ => {
            let s = ctx.span_for(span);
            ctx.emit_error("TypeMismatch", "arithmetic operator requires numeric operands".to_string(), s);
            Type::Unknown
        }
    }
}

fn number_kind_of(ty: &Type) -> Option<NumberKind> {
    match ty {
        Type::Number(k) => Some(*k),
        Type::Literal(LiteralValue::Int(_)) => Some(NumberKind::I32),
        Type::Literal(LiteralValue::Float(_)) => Some(NumberKind::F64),
        _ => None,
    }
}

fn infer_unary(ctx: &mut CheckerContext, types: &mut ProgramTypes, op: UnaryOp, expr: &Expression, span: zena_ast::NodeId) -> Type {
    let ty = infer_expression(ctx, types, expr);
    match op {
        UnaryOp::Neg => {
            if number_kind_of(&ty).is_none() {
                let s = ctx.span_for(span);
                ctx.emit_error("TypeMismatch", "unary `-` requires a numeric operand".to_string(), s);
            }
            ty
        }
        UnaryOp::Not => {
            if !is_boolean_like(&ty) {
                let s = ctx.span_for(span);
                ctx.emit_error("TypeMismatch", "unary `!` requires a boolean operand".to_string(), s);
            }
            Type::Boolean
        }
    }
}

fn infer_call(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    callee: &Expression,
    args: &[Expression],
    span: zena_ast::NodeId,
) -> Type {
    if let Expression::Super(_) = callee {
        return infer_super_call(ctx, types, args, span);
    }
    let callee_ty = infer_expression(ctx, types, callee);
    let arg_types: Vec<Type> = args.iter().map(|a| infer_expression(ctx, types, a)).collect();
    match callee_ty {
        Type::Function(func) => {
            check_call_arguments(ctx, types, &func, &arg_types, span);
            func.return_type.clone()
        }
        Type::Unknown => Type::Unknown,
        other => {
            let s = ctx.span_for(span);
            ctx.emit_error("TypeMismatch", format!("`{}` is not callable", print_type(&other)), s);
            Type::Unknown
        }
    }
}

/// A `super(...)` call is only legal inside a constructor body, and
/// completing it is what flips `is_this_initialized` (spec §4.3's
/// `isThisInitialized` flag) so `this` becomes usable afterward.
fn infer_super_call(ctx: &mut CheckerContext, types: &mut ProgramTypes, args: &[Expression], span: zena_ast::NodeId) -> Type {
    let arg_types: Vec<Type> = args.iter().map(|a| infer_expression(ctx, types, a)).collect();

    // In an extension class, `super(v)` has no parent constructor to
    // forward to: it defines `this` directly from the underlying value.
    if let Some(Type::Class(class)) = &ctx.current_this_type {
        if class.is_extension {
            let on_type = class.on_type.borrow().clone();
            match (on_type, arg_types.as_slice()) {
                (Some(on_type), [arg]) if crate::assign::assignable(arg, &on_type) => {}
                (Some(on_type), [arg]) => {
                    let s = ctx.span_for(span);
                    ctx.emit_error(
                        "TypeMismatch",
                        format!(
                            "extension class `{}` requires `{}` for `super(...)`, found `{}`",
                            class.name,
                            print_type(&on_type),
                            print_type(arg)
                        ),
                        s,
                    );
                }
                _ => {
                    let s = ctx.span_for(span);
                    ctx.emit_error(
                        "TypeMismatch",
                        format!("`super(...)` in extension class `{}` takes exactly one argument", class.name),
                        s,
                    );
                }
            }
            ctx.is_this_initialized = true;
            return Type::Void;
        }
    }

    let super_class = match &ctx.current_this_type {
        Some(Type::Class(class)) => class.super_type.borrow().clone(),
        _ => {
            let s = ctx.span_for(span);
            ctx.emit_error("UnknownError", "`super(...)` used outside a constructor".to_string(), s);
            None
        }
    };
    match super_class {
        Some(Type::Class(super_class)) => {
            if let Some(ctor) = super_class.constructor_type.borrow().clone() {
                check_call_arguments(ctx, types, &ctor, &arg_types, span);
            }
        }
        None => {
            if !arg_types.is_empty() {
                let s = ctx.span_for(span);
                ctx.emit_error("TypeMismatch", "no superclass to forward constructor arguments to".to_string(), s);
            }
        }
        _ => {}
    }
    ctx.is_this_initialized = true;
    Type::Void
}

fn check_call_arguments(ctx: &mut CheckerContext, types: &ProgramTypes, func: &FunctionType, args: &[Type], span: zena_ast::NodeId) {
    if args.len() != func.parameters.len() {
        let s = ctx.span_for(span);
        ctx.emit_error(
            "TypeMismatch",
            format!(
                "expected {} argument(s), found {}",
                func.parameters.len(),
                args.len()
            ),
            s,
        );
        return;
    }
    for (arg, expected) in args.iter().zip(func.parameters.iter()) {
        if !super::assignable(types, arg, expected) {
            let s = ctx.span_for(span);
            ctx.emit_error(
                "TypeMismatch",
                format!(
                    "argument of type `{}` is not assignable to parameter of type `{}`",
                    print_type(arg),
                    print_type(expected)
                ),
                s,
            );
        }
    }
}

fn infer_method_call(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    receiver: &Expression,
    method: &str,
    args: &[Expression],
    span: zena_ast::NodeId,
) -> Type {
    if let Expression::Ident(name, _) = receiver {
        if ctx.lookup_variable(name).is_none() {
            if let Some(variant) = types.enum_variants.get(name).and_then(|variants| variants.get(method)) {
                let (field_types, variant_class) = variant.clone();
                let arg_types: Vec<Type> = args.iter().map(|a| infer_expression(ctx, types, a)).collect();
                if arg_types.len() != field_types.len() {
                    let s = ctx.span_for(span);
                    ctx.emit_error(
                        "TypeMismatch",
                        format!("`{name}.{method}` expects {} argument(s), found {}", field_types.len(), arg_types.len()),
                        s,
                    );
                } else {
                    for (arg, expected) in arg_types.iter().zip(field_types.iter()) {
                        if !super::assignable(types, arg, expected) {
                            let s = ctx.span_for(span);
                            ctx.emit_error(
                                "TypeMismatch",
                                format!("expected `{}`, found `{}`", print_type(expected), print_type(arg)),
                                s,
                            );
                        }
                    }
                }
                return Type::Class(variant_class);
            }
        }
    }

    let receiver_ty = infer_expression(ctx, types, receiver);
    let arg_types: Vec<Type> = args.iter().map(|a| infer_expression(ctx, types, a)).collect();
    let func = find_method(&receiver_ty, method);
    match func {
        Some(func) => {
            check_call_arguments(ctx, types, &func, &arg_types, span);
            func.return_type.clone()
        }
        None => {
            let s = ctx.span_for(span);
            ctx.emit_error(
                "PropertyNotFound",
                format!("`{}` has no method `{method}`", print_type(&receiver_ty)),
                s,
            );
            Type::Unknown
        }
    }
}

fn find_method(receiver: &Type, name: &str) -> Option<Rc<FunctionType>> {
    match receiver {
        Type::Class(class) => class
            .methods
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.clone())
            .or_else(|| {
                class
                    .super_type
                    .borrow()
                    .clone()
                    .and_then(|parent| find_method(&parent, name))
            }),
        Type::Interface(iface) => iface
            .methods
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.clone())
            .or_else(|| {
                iface
                    .extends
                    .borrow()
                    .iter()
                    .find_map(|parent| find_method(parent, name))
            }),
        _ => None,
    }
}

fn infer_field_access(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    object: &Expression,
    field: &str,
    span: zena_ast::NodeId,
) -> Type {
    let object_ty = infer_expression(ctx, types, object);
    match find_field(&object_ty, field) {
        Some(ty) => ty,
        None => {
            let s = ctx.span_for(span);
            ctx.emit_error(
                "PropertyNotFound",
                format!("`{}` has no field `{field}`", print_type(&object_ty)),
                s,
            );
            Type::Unknown
        }
    }
}

fn find_field(object: &Type, name: &str) -> Option<Type> {
    match object {
        Type::Class(class) => class
            .fields
            .borrow()
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, ty, _)| ty.clone())
            .or_else(|| {
                class
                    .super_type
                    .borrow()
                    .clone()
                    .and_then(|parent| find_field(&parent, name))
            }),
        Type::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, t)| t.clone()),
        Type::Interface(iface) => iface.fields.borrow().iter().find(|(n, _)| n == name).map(|(_, t)| t.clone()),
        Type::Array(_) if name == "length" => Some(Type::Number(NumberKind::I32)),
        _ => None,
    }
}

fn infer_struct_literal(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    class_name: &str,
    fields: &[(String, Expression)],
    span: zena_ast::NodeId,
) -> Type {
    let Some(class) = types.classes.get(class_name).cloned() else {
        let s = ctx.span_for(span);
        ctx.emit_error("SymbolNotFound", format!("cannot find class `{class_name}`"), s);
        return Type::Unknown;
    };
    for (name, value) in fields {
        let value_ty = infer_expression(ctx, types, value);
        match find_field(&Type::Class(class.clone()), name) {
            Some(expected) if !super::assignable(types, &value_ty, &expected) => {
                let s = ctx.span_for(span);
                ctx.emit_error(
                    "TypeMismatch",
                    format!("field `{name}` expects `{}`, found `{}`", print_type(&expected), print_type(&value_ty)),
                    s,
                );
            }
            None => {
                let s = ctx.span_for(span);
                ctx.emit_error("PropertyNotFound", format!("class `{class_name}` has no field `{name}`"), s);
            }
            _ => {}
        }
    }
    Type::Class(class)
}

fn infer_new(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    class_name: &str,
    type_args: &[zena_ast::TypeExpr],
    args: &[Expression],
    span: zena_ast::NodeId,
) -> Type {
    let Some(class) = types.classes.get(class_name).cloned() else {
        let s = ctx.span_for(span);
        ctx.emit_error("SymbolNotFound", format!("cannot find class `{class_name}`"), s);
        return Type::Unknown;
    };
    let resolved_args: Vec<Type> = type_args.iter().map(|t| resolve_type_expr(ctx, t)).collect();
    let instantiated = if resolved_args.is_empty() {
        Type::Class(class.clone())
    } else {
        let s = ctx.span_for(span);
        instantiate_generic(ctx, &Type::Class(class.clone()), &resolved_args, Some(s))
    };
    let arg_types: Vec<Type> = args.iter().map(|a| infer_expression(ctx, types, a)).collect();
    if let Type::Class(instantiated_class) = &instantiated {
        if let Some(ctor) = instantiated_class.constructor_type.borrow().clone() {
            check_call_arguments(ctx, types, &ctor, &arg_types, span);
        } else if !arg_types.is_empty() {
            let s = ctx.span_for(span);
            ctx.emit_error("TypeMismatch", format!("class `{class_name}` takes no constructor arguments"), s);
        }
    }
    instantiated
}

fn infer_match(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    scrutinee: &Expression,
    arms: &[zena_ast::MatchArm],
    span: zena_ast::NodeId,
) -> Type {
    let scrutinee_ty = infer_expression(ctx, types, scrutinee);
    let mut arm_types = Vec::new();
    for arm in arms {
        ctx.push_scope();
        check_pattern(ctx, types, &arm.pattern, &scrutinee_ty);
        if let Some(guard) = &arm.guard {
            let guard_ty = infer_expression(ctx, types, guard);
            if !is_boolean_like(&guard_ty) {
                let s = ctx.span_for(span);
                ctx.emit_error("TypeMismatch", "match guard must be boolean".to_string(), s);
            }
        }
        arm_types.push(infer_expression(ctx, types, &arm.body));
        ctx.pop_scope();
    }
    arm_types.dedup();
    match arm_types.len() {
        0 => Type::Never,
        1 => arm_types.into_iter().next().unwrap_or(Type::Never),
        _ => Type::Union(arm_types),
    }
}

fn infer_closure(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    params: &[zena_ast::Param],
    return_type: &Option<zena_ast::TypeExpr>,
    body: &ClosureBody,
) -> Type {
    ctx.push_scope();
    let parameters: Vec<Type> = params
        .iter()
        .map(|p| {
            let ty = resolve_type_expr(ctx, &p.ty);
            ctx.declare_variable(&p.name, ty.clone(), true);
            ty
        })
        .collect();
    let declared_return = return_type.as_ref().map(|t| resolve_type_expr(ctx, t));
    let previous_return = ctx.current_return_type.take();
    ctx.current_return_type = declared_return.clone();
    let inferred_return = match body {
        ClosureBody::Expr(expr) => infer_expression(ctx, types, expr),
        ClosureBody::Block(block) => {
            for stmt in &block.statements {
                check_statement(ctx, types, stmt);
            }
            Type::Void
        }
    };
    ctx.current_return_type = previous_return;
    ctx.pop_scope();
    let return_type = declared_return.unwrap_or(inferred_return);
    Type::Function(Rc::new(FunctionType {
        type_parameters: vec![],
        type_arguments: None,
        parameters,
        return_type,
        is_final: true,
        is_abstract: false,
        generic_source: None,
    }))
}
