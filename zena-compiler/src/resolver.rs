//! Resolves source-level `TypeExpr` annotations to semantic `Type`s, and
//! implements the generic-instantiation algorithm (identity shortcut,
//! interning-cache lookup, insert-before-recurse substitution).

use std::rc::Rc;

use zena_ast::{LiteralValue as AstLiteral, TypeExpr, TypeExprKind};

use crate::context::CheckerContext;
use crate::types::{
    ClassType, FieldAttrs, FunctionType, InterfaceType, LiteralValue, MixinType, NumberKind, Type,
    TypeAliasData, TypeParameterData,
};

fn convert_literal(value: &AstLiteral) -> LiteralValue {
    match value {
        AstLiteral::Int(v) => LiteralValue::Int(*v),
        AstLiteral::Float(bits) => LiteralValue::Float(*bits),
        AstLiteral::Bool(b) => LiteralValue::Bool(*b),
        AstLiteral::Str(s) => LiteralValue::Str(s.clone()),
    }
}

/// Resolves one `TypeExpr` in the current scope. Unknown names resolve
/// to `Type::Unknown` with a `SymbolNotFound` diagnostic rather than
/// aborting resolution of the surrounding declaration.
pub fn resolve_type_expr(ctx: &mut CheckerContext, expr: &TypeExpr) -> Type {
    match &expr.kind {
        TypeExprKind::This => ctx.current_this_type.clone().unwrap_or(Type::This),
        TypeExprKind::Literal(value) => Type::Literal(convert_literal(value)),
        TypeExprKind::Distinct(inner) => resolve_type_expr(ctx, inner),
        TypeExprKind::Array(elem) => Type::Array(Rc::new(resolve_type_expr(ctx, elem))),
        TypeExprKind::Tuple(items) => {
            Type::Tuple(items.iter().map(|t| resolve_type_expr(ctx, t)).collect())
        }
        TypeExprKind::UnboxedTuple(items) => Type::UnboxedTuple(
            items.iter().map(|t| resolve_type_expr(ctx, t)).collect(),
        ),
        TypeExprKind::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), resolve_type_expr(ctx, ty)))
                .collect(),
        ),
        TypeExprKind::Union(members) => {
            let resolved: Vec<Type> = members.iter().map(|t| resolve_type_expr(ctx, t)).collect();
            if resolved.len() == 1 {
                return resolved.into_iter().next().unwrap_or(Type::Never);
            }
            Type::Union(resolved)
        }
        TypeExprKind::Function { params, return_type } => {
            let parameters = params.iter().map(|p| resolve_type_expr(ctx, p)).collect();
            let return_type = resolve_type_expr(ctx, return_type);
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
        TypeExprKind::Named(name) => resolve_named(ctx, name, &[], expr.id),
        TypeExprKind::Generic { name, args } => {
            let resolved_args: Vec<Type> = args.iter().map(|a| resolve_type_expr(ctx, a)).collect();
            resolve_named(ctx, name, &resolved_args, expr.id)
        }
    }
}

fn resolve_named(
    ctx: &mut CheckerContext,
    name: &str,
    args: &[Type],
    node: zena_ast::NodeId,
) -> Type {
    if let Some(kind) = NumberKind::from_name(name) {
        return Type::Number(kind);
    }
    match name {
        "boolean" => return Type::Boolean,
        "void" => return Type::Void,
        "null" => return Type::Null,
        "never" => return Type::Never,
        "any" => return Type::Any,
        "anyref" => return Type::AnyRef,
        "bytearray" => return Type::ByteArray,
        _ => {}
    }

    let Some(found) = ctx.lookup_type(name).cloned() else {
        let span = ctx.span_for(node);
        ctx.emit_error(
            "SymbolNotFound",
            format!("cannot find type `{name}` in this scope"),
            span,
        );
        return Type::Unknown;
    };

    if args.is_empty() {
        return found;
    }

    let span = ctx.span_for(node);
    instantiate_generic(ctx, &found, args, Some(span))
}

/// Number of type parameters `source` declares, or `None` if it isn't
/// a generic-capable type at all (arity checking is meaningless then).
fn generic_arity(source: &Type) -> Option<(String, usize)> {
    match source {
        Type::Class(c) => Some((c.name.clone(), c.type_parameters.len())),
        Type::Interface(i) => Some((i.name.clone(), i.type_parameters.len())),
        Type::Mixin(m) => Some((m.name.clone(), m.type_parameters.len())),
        Type::TypeAlias(a) => Some((a.name.clone(), a.type_parameters.len())),
        _ => None,
    }
}

/// Substitutes `args` for `source`'s type parameters, interning the
/// result so repeated instantiations with the same arguments share one
/// object (spec property: interning identity). `span` is `Some` at a
/// user-facing instantiation site (so a wrong argument count gets a
/// diagnostic) and `None` for internal re-substitutions of an
/// already-validated argument list (e.g. `This`/recursive generics).
pub fn instantiate_generic(ctx: &mut CheckerContext, source: &Type, args: &[Type], span: Option<zena_diagnostics::Span>) -> Type {
    if let Some(span) = span {
        if let Some((name, expected)) = generic_arity(source) {
            if expected != 0 && args.len() != expected {
                ctx.emit_error(
                    "GenericTypeArgumentMismatch",
                    format!(
                        "`{name}` expects {expected} type argument{} but {} {} supplied",
                        if expected == 1 { "" } else { "s" },
                        args.len(),
                        if args.len() == 1 { "was" } else { "were" }
                    ),
                    span,
                );
            }
        }
    }
    match source {
        Type::Class(class) => {
            if class.type_parameters.is_empty()
                || is_identity_substitution(&class.type_parameters, args)
            {
                return Type::Class(class.clone());
            }
            let instance = ctx.interner.get_or_insert_class(class, args, || {
                Rc::new(ClassType {
                    name: class.name.clone(),
                    type_parameters: class.type_parameters.clone(),
                    type_arguments: Some(args.to_vec()),
                    super_type: std::cell::RefCell::new(None),
                    implements: std::cell::RefCell::new(vec![]),
                    fields: std::cell::RefCell::new(vec![]),
                    methods: std::cell::RefCell::new(vec![]),
                    constructor_type: std::cell::RefCell::new(None),
                    vtable: std::cell::RefCell::new(vec![]),
                    is_final: class.is_final,
                    is_abstract: class.is_abstract,
                    is_extension: class.is_extension,
                    on_type: std::cell::RefCell::new(None),
                    generic_source: std::cell::RefCell::new(Some(class.clone())),
                })
            });
            substitute_class_body(ctx, class, &instance, &class.type_parameters, args);
            Type::Class(instance)
        }
        Type::Interface(iface) => {
            if iface.type_parameters.is_empty()
                || is_identity_substitution(&iface.type_parameters, args)
            {
                return Type::Interface(iface.clone());
            }
            let instance = ctx.interner.get_or_insert_interface(iface, args, || {
                Rc::new(InterfaceType {
                    name: iface.name.clone(),
                    type_parameters: iface.type_parameters.clone(),
                    type_arguments: Some(args.to_vec()),
                    fields: std::cell::RefCell::new(vec![]),
                    methods: std::cell::RefCell::new(vec![]),
                    extends: std::cell::RefCell::new(vec![]),
                    generic_source: std::cell::RefCell::new(Some(iface.clone())),
                })
            });
            substitute_interface_body(ctx, iface, &instance, &iface.type_parameters, args);
            Type::Interface(instance)
        }
        Type::Mixin(mixin) => {
            if mixin.type_parameters.is_empty()
                || is_identity_substitution(&mixin.type_parameters, args)
            {
                return Type::Mixin(mixin.clone());
            }
            let instance = ctx.interner.get_or_insert_mixin(mixin, args, || {
                Rc::new(MixinType {
                    name: mixin.name.clone(),
                    type_parameters: mixin.type_parameters.clone(),
                    type_arguments: Some(args.to_vec()),
                    on_type: std::cell::RefCell::new(None),
                    fields: std::cell::RefCell::new(vec![]),
                    methods: std::cell::RefCell::new(vec![]),
                    implements: std::cell::RefCell::new(vec![]),
                    generic_source: std::cell::RefCell::new(Some(mixin.clone())),
                })
            });
            substitute_mixin_body(ctx, mixin, &instance, &mixin.type_parameters, args);
            Type::Mixin(instance)
        }
        Type::TypeAlias(alias) => {
            if alias.type_parameters.is_empty()
                || is_identity_substitution(&alias.type_parameters, args)
            {
                return Type::TypeAlias(alias.clone());
            }
            let instance = ctx.interner.get_or_insert_alias(alias, args, || {
                Rc::new(TypeAliasData {
                    name: alias.name.clone(),
                    type_parameters: alias.type_parameters.clone(),
                    is_distinct: alias.is_distinct,
                    target: std::cell::RefCell::new(Type::Never),
                    type_arguments: Some(args.to_vec()),
                    generic_source: std::cell::RefCell::new(Some(alias.clone())),
                })
            });
            let substituted = substitute(
                &alias.target.borrow(),
                &alias.type_parameters,
                args,
                ctx,
            );
            *instance.target.borrow_mut() = substituted;
            Type::TypeAlias(instance)
        }
        other => other.clone(),
    }
}

fn is_identity_substitution(params: &[Rc<TypeParameterData>], args: &[Type]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args.iter())
            .all(|(p, a)| matches!(a, Type::TypeParameter(q) if Rc::ptr_eq(p, q)))
}

fn substitute_class_body(
    ctx: &mut CheckerContext,
    source: &Rc<ClassType>,
    target: &Rc<ClassType>,
    params: &[Rc<TypeParameterData>],
    args: &[Type],
) {
    let super_type = source
        .super_type
        .borrow()
        .as_ref()
        .map(|t| substitute(t, params, args, ctx));
    *target.super_type.borrow_mut() = super_type;

    let implements = source
        .implements
        .borrow()
        .iter()
        .map(|t| substitute(t, params, args, ctx))
        .collect();
    *target.implements.borrow_mut() = implements;

    let fields: Vec<(String, Type, FieldAttrs)> = source
        .fields
        .borrow()
        .iter()
        .map(|(name, ty, attrs)| (name.clone(), substitute(ty, params, args, ctx), *attrs))
        .collect();
    *target.fields.borrow_mut() = fields;

    let methods: Vec<(String, Rc<FunctionType>)> = source
        .methods
        .borrow()
        .iter()
        .map(|(name, func)| (name.clone(), substitute_function(func, params, args, ctx)))
        .collect();
    *target.methods.borrow_mut() = methods;

    let ctor = source
        .constructor_type
        .borrow()
        .as_ref()
        .map(|f| substitute_function(f, params, args, ctx));
    *target.constructor_type.borrow_mut() = ctor;

    *target.vtable.borrow_mut() = source.vtable.borrow().clone();
}

fn substitute_interface_body(
    ctx: &mut CheckerContext,
    source: &Rc<InterfaceType>,
    target: &Rc<InterfaceType>,
    params: &[Rc<TypeParameterData>],
    args: &[Type],
) {
    let fields: Vec<(String, Type)> = source
        .fields
        .borrow()
        .iter()
        .map(|(name, ty)| (name.clone(), substitute(ty, params, args, ctx)))
        .collect();
    *target.fields.borrow_mut() = fields;

    let methods: Vec<(String, Rc<FunctionType>)> = source
        .methods
        .borrow()
        .iter()
        .map(|(name, func)| (name.clone(), substitute_function(func, params, args, ctx)))
        .collect();
    *target.methods.borrow_mut() = methods;

    let extends = source
        .extends
        .borrow()
        .iter()
        .map(|t| substitute(t, params, args, ctx))
        .collect();
    *target.extends.borrow_mut() = extends;
}

fn substitute_mixin_body(
    ctx: &mut CheckerContext,
    source: &Rc<MixinType>,
    target: &Rc<MixinType>,
    params: &[Rc<TypeParameterData>],
    args: &[Type],
) {
    let on_type = source
        .on_type
        .borrow()
        .as_ref()
        .map(|t| substitute(t, params, args, ctx));
    *target.on_type.borrow_mut() = on_type;

    let fields: Vec<(String, Type, FieldAttrs)> = source
        .fields
        .borrow()
        .iter()
        .map(|(name, ty, attrs)| (name.clone(), substitute(ty, params, args, ctx), *attrs))
        .collect();
    *target.fields.borrow_mut() = fields;

    let methods: Vec<(String, Rc<FunctionType>)> = source
        .methods
        .borrow()
        .iter()
        .map(|(name, func)| (name.clone(), substitute_function(func, params, args, ctx)))
        .collect();
    *target.methods.borrow_mut() = methods;

    let implements = source
        .implements
        .borrow()
        .iter()
        .map(|t| substitute(t, params, args, ctx))
        .collect();
    *target.implements.borrow_mut() = implements;
}

fn substitute_function(
    func: &Rc<FunctionType>,
    params: &[Rc<TypeParameterData>],
    args: &[Type],
    ctx: &mut CheckerContext,
) -> Rc<FunctionType> {
    Rc::new(FunctionType {
        type_parameters: func.type_parameters.clone(),
        type_arguments: func.type_arguments.clone(),
        parameters: func
            .parameters
            .iter()
            .map(|p| substitute(p, params, args, ctx))
            .collect(),
        return_type: substitute(&func.return_type, params, args, ctx),
        is_final: func.is_final,
        is_abstract: func.is_abstract,
        generic_source: func.generic_source.clone(),
    })
}

/// Walks `ty`, replacing any `TypeParameter` that appears in `params`
/// with the corresponding entry in `args`, and recursing through
/// generic class/interface/mixin/alias instantiations so nested
/// generics (`Box<Node<T>>`) substitute correctly.
fn substitute(
    ty: &Type,
    params: &[Rc<TypeParameterData>],
    args: &[Type],
    ctx: &mut CheckerContext,
) -> Type {
    match ty {
        Type::TypeParameter(p) => params
            .iter()
            .position(|q| Rc::ptr_eq(p, q))
            .and_then(|i| args.get(i).cloned())
            .unwrap_or_else(|| ty.clone()),
        Type::Array(elem) => Type::Array(Rc::new(substitute(elem, params, args, ctx))),
        Type::Tuple(items) => Type::Tuple(
            items.iter().map(|t| substitute(t, params, args, ctx)).collect(),
        ),
        Type::UnboxedTuple(items) => Type::UnboxedTuple(
            items.iter().map(|t| substitute(t, params, args, ctx)).collect(),
        ),
        Type::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(name, t)| (name.clone(), substitute(t, params, args, ctx)))
                .collect(),
        ),
        Type::Union(members) => Type::Union(
            members
                .iter()
                .map(|t| substitute(t, params, args, ctx))
                .collect(),
        ),
        Type::Function(func) => Type::Function(substitute_function(func, params, args, ctx)),
        Type::Class(class) if class.type_parameters.is_empty() => Type::Class(class.clone()),
        Type::Class(class) => {
            let own_args: Vec<Type> = class
                .type_arguments
                .clone()
                .unwrap_or_else(|| class.type_parameters.iter().map(|p| Type::TypeParameter(p.clone())).collect())
                .iter()
                .map(|t| substitute(t, params, args, ctx))
                .collect();
            instantiate_generic(ctx, &Type::Class(class.generic_source.borrow().clone().unwrap_or_else(|| class.clone())), &own_args, None)
        }
        Type::Interface(iface) if iface.type_parameters.is_empty() => {
            Type::Interface(iface.clone())
        }
        Type::Interface(iface) => {
            let own_args: Vec<Type> = iface
                .type_arguments
                .clone()
                .unwrap_or_else(|| iface.type_parameters.iter().map(|p| Type::TypeParameter(p.clone())).collect())
                .iter()
                .map(|t| substitute(t, params, args, ctx))
                .collect();
            instantiate_generic(ctx, &Type::Interface(iface.generic_source.borrow().clone().unwrap_or_else(|| iface.clone())), &own_args, None)
        }
        _ => ty.clone(),
    }
}
