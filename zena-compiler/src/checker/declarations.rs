//! Skeleton-then-body declaration checking (spec §4.3).

use std::cell::RefCell;
use std::rc::Rc;

use zena_ast::{Class, Constructor, Interface, Item, Method, Mixin, Program, TypeParam};

use crate::context::CheckerContext;
use crate::resolver::resolve_type_expr;
use crate::types::{
    print_type, ClassType, FieldAttrs, FunctionType, InterfaceType, MixinType, NumberKind, Type,
    TypeAliasData, TypeParameterData,
};

use super::expressions::infer_expression;
use super::statements::check_block;
use super::ProgramTypes;

/// Registers the well-known interfaces/classes every checker context
/// starts with (spec §4.12): `String`, `FixedArray<T>`, `Iterator<T>`,
/// `Iterable<T>`, `Comparable<T>`, `Equatable`.
pub fn register_well_known_types(ctx: &mut CheckerContext) {
    let string_class = Rc::new(ClassType {
        name: "String".to_string(),
        type_parameters: vec![],
        type_arguments: None,
        super_type: RefCell::new(None),
        implements: RefCell::new(vec![]),
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![]),
        constructor_type: RefCell::new(None),
        vtable: RefCell::new(vec![]),
        is_final: true,
        is_abstract: false,
        is_extension: false,
        on_type: RefCell::new(None),
        generic_source: RefCell::new(None),
    });
    ctx.well_known.string = Some(Type::Class(string_class.clone()));
    ctx.declare_type("String", Type::Class(string_class));

    let t = Rc::new(TypeParameterData {
        name: "T".to_string(),
        constraint: None,
        default: None,
    });

    let fixed_array = Rc::new(InterfaceType {
        name: "FixedArray".to_string(),
        type_parameters: vec![t.clone()],
        type_arguments: None,
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![]),
        extends: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.well_known.fixed_array = Some(fixed_array.clone());
    ctx.declare_type("FixedArray", Type::Interface(fixed_array));

    let bool_tuple = Type::Tuple(vec![Type::Boolean, Type::TypeParameter(t.clone())]);
    let iterator = Rc::new(InterfaceType {
        name: "Iterator".to_string(),
        type_parameters: vec![t.clone()],
        type_arguments: None,
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![(
            "next".to_string(),
            Rc::new(FunctionType {
                type_parameters: vec![],
                type_arguments: None,
                parameters: vec![],
                return_type: bool_tuple,
                is_final: true,
                is_abstract: true,
                generic_source: None,
            }),
        )]),
        extends: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.well_known.iterator = Some(iterator.clone());
    ctx.declare_type("Iterator", Type::Interface(iterator.clone()));

    let iterable = Rc::new(InterfaceType {
        name: "Iterable".to_string(),
        type_parameters: vec![t.clone()],
        type_arguments: None,
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![(
            "iterator".to_string(),
            Rc::new(FunctionType {
                type_parameters: vec![],
                type_arguments: None,
                parameters: vec![],
                return_type: Type::Interface(iterator),
                is_final: true,
                is_abstract: true,
                generic_source: None,
            }),
        )]),
        extends: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.well_known.iterable = Some(iterable.clone());
    ctx.declare_type("Iterable", Type::Interface(iterable));

    let comparable = Rc::new(InterfaceType {
        name: "Comparable".to_string(),
        type_parameters: vec![t.clone()],
        type_arguments: None,
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![(
            "compareTo".to_string(),
            Rc::new(FunctionType {
                type_parameters: vec![],
                type_arguments: None,
                parameters: vec![Type::TypeParameter(t.clone())],
                return_type: Type::Number(NumberKind::I32),
                is_final: true,
                is_abstract: true,
                generic_source: None,
            }),
        )]),
        extends: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.well_known.comparable = Some(comparable.clone());
    ctx.declare_type("Comparable", Type::Interface(comparable));

    let equatable = Rc::new(InterfaceType {
        name: "Equatable".to_string(),
        type_parameters: vec![],
        type_arguments: None,
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![(
            "equals".to_string(),
            Rc::new(FunctionType {
                type_parameters: vec![],
                type_arguments: None,
                parameters: vec![Type::AnyRef],
                return_type: Type::Boolean,
                is_final: true,
                is_abstract: true,
                generic_source: None,
            }),
        )]),
        extends: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.well_known.equatable = Some(equatable.clone());
    ctx.declare_type("Equatable", Type::Interface(equatable));
}

fn resolve_type_params(ctx: &mut CheckerContext, params: &[TypeParam]) -> Vec<Rc<TypeParameterData>> {
    // Declare placeholders first so a constraint can reference a sibling
    // parameter (`<T, U: Comparable<T>>`).
    let placeholders: Vec<Rc<TypeParameterData>> = params
        .iter()
        .map(|p| {
            Rc::new(TypeParameterData {
                name: p.name.clone(),
                constraint: None,
                default: None,
            })
        })
        .collect();
    for placeholder in &placeholders {
        ctx.declare_type(&placeholder.name, Type::TypeParameter(placeholder.clone()));
    }
    placeholders
}

/// Pass 1: declare every class/interface/mixin/alias/enum/function/const
/// name with an empty body so forward references across declarations
/// resolve, then fill in the bodies (still without type-checking method
/// statements, which is pass 2's `check_bodies` job).
pub fn register_skeletons(ctx: &mut CheckerContext, program: &Program, types: &mut ProgramTypes) {
    for item in &program.items {
        match item {
            Item::Class(c) => register_class_skeleton(ctx, c, types),
            Item::Interface(i) => register_interface_skeleton(ctx, i, types),
            Item::Mixin(m) => register_mixin_skeleton(ctx, m, types),
            Item::TypeAlias(a) => {
                let placeholder = Rc::new(TypeAliasData {
                    name: a.name.clone(),
                    type_parameters: vec![],
                    is_distinct: a.is_distinct,
                    target: RefCell::new(Type::Never),
                    type_arguments: None,
                    generic_source: RefCell::new(None),
                });
                ctx.declare_type(&a.name, Type::TypeAlias(placeholder.clone()));
                types.aliases.insert(a.name.clone(), placeholder);
            }
            Item::Enum(e) => {
                let base = Rc::new(ClassType {
                    name: e.name.clone(),
                    type_parameters: vec![],
                    type_arguments: None,
                    super_type: RefCell::new(None),
                    implements: RefCell::new(vec![]),
                    fields: RefCell::new(vec![]),
                    methods: RefCell::new(vec![]),
                    constructor_type: RefCell::new(None),
                    vtable: RefCell::new(vec![]),
                    is_final: false,
                    is_abstract: true,
                    is_extension: false,
                    on_type: RefCell::new(None),
                    generic_source: RefCell::new(None),
                });
                ctx.declare_type(&e.name, Type::Class(base.clone()));
                types.classes.insert(e.name.clone(), base.clone());
                types.enum_variants.insert(e.name.clone(), Default::default());
            }
            Item::Function(_) | Item::Const(_) => {}
        }
    }

    // Now fill in bodies that reference other skeletons (superclass,
    // field types, method signatures), and resolve the enum variant
    // subclasses now that the base class exists.
    for item in &program.items {
        match item {
            Item::Class(c) => fill_class_skeleton(ctx, c, types),
            Item::Interface(i) => fill_interface_skeleton(ctx, i, types),
            Item::Mixin(m) => fill_mixin_skeleton(ctx, m, types),
            Item::TypeAlias(a) => {
                ctx.push_type_scope();
                let params = resolve_type_params(ctx, &a.type_params);
                let target = resolve_type_expr(ctx, &a.target);
                ctx.pop_type_scope();
                if let Some(alias) = types.aliases.get(&a.name) {
                    *alias.target.borrow_mut() = target;
                    // type_parameters is immutable on TypeAliasData once built, so
                    // a generic alias gets a fresh record here instead of mutating.
                    if !params.is_empty() {
                        let replacement = Rc::new(TypeAliasData {
                            name: alias.name.clone(),
                            type_parameters: params,
                            is_distinct: alias.is_distinct,
                            target: RefCell::new(alias.target.borrow().clone()),
                            type_arguments: None,
                            generic_source: RefCell::new(None),
                        });
                        ctx.declare_type(&a.name, Type::TypeAlias(replacement.clone()));
                        types.aliases.insert(a.name.clone(), replacement);
                    }
                }
            }
            Item::Enum(e) => {
                let base = types.classes.get(&e.name).cloned();
                let Some(base) = base else { continue };
                ctx.push_type_scope();
                let _params = resolve_type_params(ctx, &e.type_params);
                let mut variants = Default::default();
                for variant in &e.variants {
                    let field_types: Vec<Type> = variant
                        .fields
                        .iter()
                        .map(|f| resolve_type_expr(ctx, f))
                        .collect();
                    let variant_class = Rc::new(ClassType {
                        name: format!("{}.{}", e.name, variant.name),
                        type_parameters: vec![],
                        type_arguments: None,
                        super_type: RefCell::new(Some(Type::Class(base.clone()))),
                        implements: RefCell::new(vec![]),
                        fields: RefCell::new(
                            field_types
                                .iter()
                                .enumerate()
                                .map(|(i, ty)| {
                                    (
                                        format!("_{i}"),
                                        ty.clone(),
                                        FieldAttrs {
                                            is_mutable: false,
                                            is_private: false,
                                        },
                                    )
                                })
                                .collect(),
                        ),
                        methods: RefCell::new(vec![]),
                        constructor_type: RefCell::new(None),
                        vtable: RefCell::new(vec![]),
                        is_final: true,
                        is_abstract: false,
                        is_extension: false,
                        on_type: RefCell::new(None),
                        generic_source: RefCell::new(None),
                    });
                    // Registered in `types.classes` too (not just
                    // `enum_variants`) so codegen's per-class layout pass
                    // lays out its struct/vtable like any other class.
                    types.classes.insert(variant_class.name.clone(), variant_class.clone());
                    let map: &mut std::collections::HashMap<String, (Vec<Type>, Rc<ClassType>)> =
                        &mut variants;
                    map.insert(variant.name.clone(), (field_types, variant_class));
                }
                ctx.pop_type_scope();
                types.enum_variants.insert(e.name.clone(), variants);
            }
            Item::Function(_) | Item::Const(_) => {}
        }
    }

    // Functions and consts have no forward-reference concerns among
    // themselves worth a skeleton pass; resolve them directly.
    for item in &program.items {
        match item {
            Item::Function(f) => {
                ctx.push_type_scope();
                let _params = resolve_type_params(ctx, &f.type_params);
                let parameters = f.params.iter().map(|p| resolve_type_expr(ctx, &p.ty)).collect();
                let return_type = f
                    .return_type
                    .as_ref()
                    .map(|t| resolve_type_expr(ctx, t))
                    .unwrap_or(Type::Void);
                ctx.pop_type_scope();
                let func_type = Rc::new(FunctionType {
                    type_parameters: vec![],
                    type_arguments: None,
                    parameters,
                    return_type,
                    is_final: true,
                    is_abstract: false,
                    generic_source: None,
                });
                types.functions.insert(f.name.clone(), func_type);
            }
            Item::Const(c) => {
                let ty = if let Some(annotation) = &c.ty {
                    resolve_type_expr(ctx, annotation)
                } else {
                    infer_expression(ctx, types, &c.value)
                };
                types.consts.insert(c.name.clone(), ty);
            }
            _ => {}
        }
    }
}

fn register_class_skeleton(ctx: &mut CheckerContext, c: &Class, types: &mut ProgramTypes) {
    let class = Rc::new(ClassType {
        name: c.name.clone(),
        type_parameters: vec![],
        type_arguments: None,
        super_type: RefCell::new(None),
        implements: RefCell::new(vec![]),
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![]),
        constructor_type: RefCell::new(None),
        vtable: RefCell::new(vec![]),
        is_final: c.is_final,
        is_abstract: c.is_abstract,
        is_extension: c.on_type.is_some(),
        on_type: RefCell::new(None),
        generic_source: RefCell::new(None),
    });
    ctx.declare_type(&c.name, Type::Class(class.clone()));
    types.classes.insert(c.name.clone(), class);
}

fn register_interface_skeleton(ctx: &mut CheckerContext, i: &Interface, types: &mut ProgramTypes) {
    let iface = Rc::new(InterfaceType {
        name: i.name.clone(),
        type_parameters: vec![],
        type_arguments: None,
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![]),
        extends: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.declare_type(&i.name, Type::Interface(iface.clone()));
    types.interfaces.insert(i.name.clone(), iface);
}

fn register_mixin_skeleton(ctx: &mut CheckerContext, m: &Mixin, types: &mut ProgramTypes) {
    let mixin = Rc::new(MixinType {
        name: m.name.clone(),
        type_parameters: vec![],
        type_arguments: None,
        on_type: RefCell::new(None),
        fields: RefCell::new(vec![]),
        methods: RefCell::new(vec![]),
        implements: RefCell::new(vec![]),
        generic_source: RefCell::new(None),
    });
    ctx.declare_type(&m.name, Type::Mixin(mixin.clone()));
    types.mixins.insert(m.name.clone(), mixin);
}

fn method_function_type(ctx: &mut CheckerContext, method: &Method) -> Rc<FunctionType> {
    ctx.push_type_scope();
    let _params = resolve_type_params(ctx, &method.type_params);
    let parameters = method
        .params
        .iter()
        .map(|p| resolve_type_expr(ctx, &p.ty))
        .collect();
    let return_type = method
        .return_type
        .as_ref()
        .map(|t| resolve_type_expr(ctx, t))
        .unwrap_or(Type::Void);
    ctx.pop_type_scope();
    Rc::new(FunctionType {
        type_parameters: vec![],
        type_arguments: None,
        parameters,
        return_type,
        is_final: method.is_final,
        is_abstract: method.is_abstract,
        generic_source: None,
    })
}

fn constructor_function_type(ctx: &mut CheckerContext, constructor: &Constructor) -> Rc<FunctionType> {
    let parameters = constructor
        .params
        .iter()
        .map(|p| resolve_type_expr(ctx, &p.ty))
        .collect();
    Rc::new(FunctionType {
        type_parameters: vec![],
        type_arguments: None,
        parameters,
        return_type: Type::Void,
        is_final: true,
        is_abstract: false,
        generic_source: None,
    })
}

fn fill_class_skeleton(ctx: &mut CheckerContext, c: &Class, types: &mut ProgramTypes) {
    let Some(class) = types.classes.get(&c.name).cloned() else { return };
    ctx.push_type_scope();
    let type_params = resolve_type_params(ctx, &c.type_params);

    let super_type = c.superclass.as_ref().map(|t| resolve_type_expr(ctx, t));
    if let Some(Type::Class(parent)) = &super_type {
        if parent.is_final {
            let span = ctx.span_for(c.span);
            ctx.emit_error(
                "TypeMismatch",
                format!("cannot extend final class `{}`", parent.name),
                span,
            );
        }
    }

    if let Some(on_type_expr) = &c.on_type {
        let on_type = resolve_type_expr(ctx, on_type_expr);
        if c.superclass.is_some() {
            let span = ctx.span_for(c.span);
            ctx.emit_error(
                "TypeMismatch",
                format!("extension class `{}` may not also extend a superclass", c.name),
                span,
            );
        }
        let key = print_type(&on_type);
        *class.on_type.borrow_mut() = Some(on_type);
        types.extensions_by_target.entry(key).or_default().push(class.clone());
    }

    let mut implements: Vec<Type> = c
        .implements
        .iter()
        .map(|t| resolve_type_expr(ctx, t))
        .collect();

    // Mixin linearisation: build one intermediate `Parent_Mixin` class per
    // applied mixin, chaining super types so the last intermediate becomes
    // this class's actual super type.
    let mut current_super = super_type.clone();
    for mixin_expr in &c.mixins {
        let mixin_type = resolve_type_expr(ctx, mixin_expr);
        if let Type::Mixin(mixin) = mixin_type {
            if let Some(on_type) = mixin.on_type.borrow().clone() {
                if let Some(current) = &current_super {
                    if !crate::assign::assignable(current, &on_type) {
                        let span = ctx.span_for(c.span);
                        ctx.emit_error(
                            "TypeMismatch",
                            format!(
                                "mixin `{}` requires `{}`, but the super chain provides `{}`",
                                mixin.name,
                                print_type(&on_type),
                                print_type(current)
                            ),
                            span,
                        );
                    }
                }
            }
            let intermediate_name = format!(
                "{}_{}",
                current_super
                    .as_ref()
                    .map(|t| t.name())
                    .unwrap_or_else(|| "Object".to_string()),
                mixin.name
            );
            let intermediate = Rc::new(ClassType {
                name: intermediate_name.clone(),
                type_parameters: vec![],
                type_arguments: None,
                super_type: RefCell::new(current_super.clone()),
                implements: RefCell::new(mixin.implements.borrow().clone()),
                fields: RefCell::new(mixin.fields.borrow().clone()),
                methods: RefCell::new(mixin.methods.borrow().clone()),
                constructor_type: RefCell::new(None),
                vtable: RefCell::new(vec![]),
                is_final: false,
                is_abstract: false,
                is_extension: false,
                on_type: RefCell::new(None),
                generic_source: RefCell::new(None),
            });
            implements.extend(mixin.implements.borrow().iter().cloned());
            types.classes.insert(intermediate_name, intermediate.clone());
            current_super = Some(Type::Class(intermediate));
        }
    }

    *class.super_type.borrow_mut() = current_super;
    *class.implements.borrow_mut() = implements;

    let mut fields: Vec<(String, Type, FieldAttrs)> = c
        .fields
        .iter()
        .map(|f| {
            (
                f.name.clone(),
                resolve_type_expr(ctx, &f.ty),
                FieldAttrs {
                    is_mutable: f.is_mutable,
                    is_private: f.is_private,
                },
            )
        })
        .collect();
    // Public fields automatically induce a getter/setter pair (non-mutable
    // fields omit the setter).
    let mut methods: Vec<(String, Rc<FunctionType>)> = Vec::new();
    for (name, ty, attrs) in &fields {
        if attrs.is_private {
            continue;
        }
        methods.push((
            format!("get_{name}"),
            Rc::new(FunctionType {
                type_parameters: vec![],
                type_arguments: None,
                parameters: vec![],
                return_type: ty.clone(),
                is_final: false,
                is_abstract: false,
                generic_source: None,
            }),
        ));
        if attrs.is_mutable {
            methods.push((
                format!("set_{name}"),
                Rc::new(FunctionType {
                    type_parameters: vec![],
                    type_arguments: None,
                    parameters: vec![ty.clone()],
                    return_type: Type::Void,
                    is_final: false,
                    is_abstract: false,
                    generic_source: None,
                }),
            ));
        }
    }

    for method in &c.methods {
        methods.push((method.name.clone(), method_function_type(ctx, method)));
    }

    *class.fields.borrow_mut() = std::mem::take(&mut fields);
    *class.methods.borrow_mut() = methods;

    if let Some(constructor) = &c.constructor {
        *class.constructor_type.borrow_mut() = Some(constructor_function_type(ctx, constructor));
    }

    build_vtable(&class);
    ctx.pop_type_scope();
}

/// Inherited-then-declared vtable order (spec §3.2): walk the super
/// chain collecting the parent's vtable first, then append this class's
/// own methods, replacing any inherited slot an override reuses.
fn build_vtable(class: &Rc<ClassType>) {
    let mut slots: Vec<String> = Vec::new();
    if let Some(Type::Class(parent)) = class.super_type.borrow().clone() {
        slots = parent.vtable.borrow().clone();
    }
    for (name, _) in class.methods.borrow().iter() {
        if !slots.contains(name) {
            slots.push(name.clone());
        }
    }
    *class.vtable.borrow_mut() = slots;
}

fn fill_interface_skeleton(ctx: &mut CheckerContext, i: &Interface, types: &mut ProgramTypes) {
    let Some(iface) = types.interfaces.get(&i.name).cloned() else { return };
    ctx.push_type_scope();
    let _params = resolve_type_params(ctx, &i.type_params);

    let extends: Vec<Type> = i.extends.iter().map(|t| resolve_type_expr(ctx, t)).collect();

    let mut fields: Vec<(String, Type)> = Vec::new();
    let mut methods: Vec<(String, Rc<FunctionType>)> = Vec::new();
    for parent in &extends {
        if let Type::Interface(parent) = parent {
            fields.extend(parent.fields.borrow().iter().cloned());
            methods.extend(parent.methods.borrow().iter().cloned());
        }
    }

    for field in &i.fields {
        let ty = resolve_type_expr(ctx, &field.ty);
        if fields.iter().any(|(n, _)| n == &field.name) {
            let span = ctx.span_for(field.span);
            ctx.emit_error(
                "DuplicateDeclaration",
                format!("duplicate member `{}` in interface `{}`", field.name, i.name),
                span,
            );
        }
        fields.push((field.name.clone(), ty));
    }
    for method in &i.methods {
        if methods.iter().any(|(n, _)| n == &method.name) {
            let span = ctx.span_for(method.span);
            ctx.emit_error(
                "DuplicateDeclaration",
                format!("duplicate member `{}` in interface `{}`", method.name, i.name),
                span,
            );
        }
        methods.push((method.name.clone(), method_function_type(ctx, method)));
    }

    *iface.extends.borrow_mut() = extends;
    *iface.fields.borrow_mut() = fields;
    *iface.methods.borrow_mut() = methods;
    ctx.pop_type_scope();
}

fn fill_mixin_skeleton(ctx: &mut CheckerContext, m: &Mixin, types: &mut ProgramTypes) {
    let Some(mixin) = types.mixins.get(&m.name).cloned() else { return };
    ctx.push_type_scope();
    let _params = resolve_type_params(ctx, &m.type_params);

    if m.constructor.is_some() {
        let span = ctx.span_for(m.span);
        ctx.emit_error(
            "ConstructorInMixin",
            format!("mixin `{}` may not define a constructor", m.name),
            span,
        );
    }

    let on_type = resolve_type_expr(ctx, &m.on_type);
    let implements: Vec<Type> = m.implements.iter().map(|t| resolve_type_expr(ctx, t)).collect();
    let fields: Vec<(String, Type, FieldAttrs)> = m
        .fields
        .iter()
        .map(|f| {
            (
                f.name.clone(),
                resolve_type_expr(ctx, &f.ty),
                FieldAttrs {
                    is_mutable: f.is_mutable,
                    is_private: f.is_private,
                },
            )
        })
        .collect();
    let methods: Vec<(String, Rc<FunctionType>)> = m
        .methods
        .iter()
        .map(|method| (method.name.clone(), method_function_type(ctx, method)))
        .collect();

    *mixin.on_type.borrow_mut() = Some(on_type);
    *mixin.implements.borrow_mut() = implements;
    *mixin.fields.borrow_mut() = fields;
    *mixin.methods.borrow_mut() = methods;
    ctx.pop_type_scope();
}

/// Pass 2: type-check every constructor/method/function body and const
/// initializer now that every declaration's signature is known.
pub fn check_bodies(ctx: &mut CheckerContext, program: &Program, types: &mut ProgramTypes) {
    for item in &program.items {
        match item {
            Item::Class(c) => check_class_bodies(ctx, c, types),
            Item::Interface(i) => check_interface_implementations(ctx, i, types),
            Item::Mixin(_) => {}
            Item::Function(f) => {
                ctx.push_scope();
                let func = types.functions.get(&f.name).cloned();
                ctx.current_return_type = func.as_ref().map(|f| f.return_type.clone());
                for (param, expected) in f
                    .params
                    .iter()
                    .zip(func.as_ref().map(|f| f.parameters.clone()).unwrap_or_default())
                {
                    ctx.declare_variable(&param.name, expected, true);
                }
                check_block(ctx, types, &f.body);
                ctx.current_return_type = None;
                ctx.pop_scope();
            }
            _ => {}
        }
    }
}

fn check_class_bodies(ctx: &mut CheckerContext, c: &Class, types: &mut ProgramTypes) {
    let Some(class) = types.classes.get(&c.name).cloned() else { return };

    if c.is_abstract {
        for method in &c.methods {
            if !method.is_abstract && method.body.is_none() && !method.is_static {
                let span = ctx.span_for(method.span);
                ctx.emit_error(
                    "AbstractMethodInConcreteClass",
                    format!("method `{}` has no body", method.name),
                    span,
                );
            }
        }
    } else {
        for method in &c.methods {
            if method.is_abstract {
                let span = ctx.span_for(method.span);
                ctx.emit_error(
                    "AbstractMethodInConcreteClass",
                    format!(
                        "abstract method `{}` in non-abstract class `{}`",
                        method.name, c.name
                    ),
                    span,
                );
            }
        }
    }

    for iface in class.implements.borrow().iter() {
        if let Type::Interface(iface) = iface {
            check_implements_interface(ctx, &class, iface, c.span);
        }
    }

    // A concrete class must provide a body for every abstract method it
    // inherits; walking its own vtable (inherited-then-declared, spec
    // §3.2) and finding each slot's true declaring ancestor catches a
    // slot that is still abstract all the way down to this class.
    if !c.is_abstract {
        for slot in class.vtable.borrow().iter() {
            let Some(owner) = find_method_owner(&class, slot) else { continue };
            if owner.name == class.name {
                // Declared directly on this class: already covered by
                // the direct-declaration check above.
                continue;
            }
            let is_abstract_slot = owner
                .methods
                .borrow()
                .iter()
                .find(|(n, _)| n == slot)
                .is_some_and(|(_, f)| f.is_abstract);
            if is_abstract_slot {
                let span = ctx.span_for(c.span);
                ctx.emit_error(
                    "AbstractMethodNotImplemented",
                    format!("class `{}` does not implement abstract method `{}`", c.name, slot),
                    span,
                );
            }
        }
    }

    ctx.push_scope();
    ctx.current_this_type = Some(Type::Class(class.clone()));

    if let Some(constructor) = &c.constructor {
        ctx.is_this_initialized = class.super_type.borrow().is_none() && !class.is_extension;
        for param in &constructor.params {
            let ty = resolve_param_type(ctx, &param.ty);
            ctx.declare_variable(&param.name, ty, true);
        }
        for (name, ty, _) in class.fields.borrow().iter() {
            ctx.declare_variable(name, ty.clone(), true);
        }
        ctx.current_return_type = Some(Type::Void);
        check_block(ctx, types, &constructor.body);
        if !ctx.is_this_initialized {
            let span = ctx.span_for(constructor.span);
            ctx.emit_error(
                "TypeMismatch",
                "constructor must call super(...) before use of `this`".to_string(),
                span,
            );
        }
        ctx.current_return_type = None;
    } else if class.is_extension {
        let span = ctx.span_for(c.span);
        ctx.emit_error(
            "TypeMismatch",
            format!("extension class `{}` must declare a constructor calling `super(...)`", c.name),
            span,
        );
    } else if class.super_type.borrow().is_some() {
        // No explicit constructor but a superclass exists: the implicit
        // constructor still must forward to `super()`, which is trivially
        // satisfied, so nothing to check.
    }

    for method in &c.methods {
        let Some(body) = &method.body else { continue };
        ctx.push_scope();
        ctx.push_type_scope();
        let _params = resolve_type_params(ctx, &method.type_params);
        let func = class
            .methods
            .borrow()
            .iter()
            .find(|(n, _)| n == &method.name)
            .map(|(_, f)| f.clone());
        for (param, expected) in method
            .params
            .iter()
            .zip(func.as_ref().map(|f| f.parameters.clone()).unwrap_or_default())
        {
            ctx.declare_variable(&param.name, expected, true);
        }
        ctx.current_return_type = func.map(|f| f.return_type.clone());
        check_block(ctx, types, body);
        ctx.current_return_type = None;
        ctx.pop_type_scope();
        ctx.pop_scope();
    }

    ctx.current_this_type = None;
    ctx.pop_scope();
}

fn resolve_param_type(ctx: &mut CheckerContext, ty: &zena_ast::TypeExpr) -> Type {
    resolve_type_expr(ctx, ty)
}

fn check_implements_interface(ctx: &mut CheckerContext, class: &Rc<ClassType>, iface: &Rc<InterfaceType>, class_span: zena_ast::NodeId) {
    let span = ctx.span_for(class_span);
    for (name, field_ty) in iface.fields.borrow().iter() {
        let found = class_has_member(class, name, Some(field_ty));
        if !found {
            ctx.emit_error(
                "PropertyNotFound",
                format!(
                    "class `{}` does not implement field `{}` from interface `{}`",
                    class.name, name, iface.name
                ),
                span.clone(),
            );
        }
    }
    for (name, method_ty) in iface.methods.borrow().iter() {
        let found = class_has_method(class, name, method_ty);
        if !found {
            ctx.emit_error(
                "AbstractMethodNotImplemented",
                format!(
                    "class `{}` does not implement method `{}` from interface `{}`",
                    class.name, name, iface.name
                ),
                span.clone(),
            );
        }
    }
}

/// Nearest class (including `class` itself) whose own declared methods
/// contain `name` — `ClassType::methods` only holds a class's own
/// declarations (spec §3.2), so an inherited vtable slot's declaring
/// class (and thus whether it is still abstract) lives on an ancestor.
fn find_method_owner(class: &Rc<ClassType>, name: &str) -> Option<Rc<ClassType>> {
    if class.methods.borrow().iter().any(|(n, _)| n == name) {
        return Some(class.clone());
    }
    match class.super_type.borrow().clone() {
        Some(Type::Class(parent)) => find_method_owner(&parent, name),
        _ => None,
    }
}

fn class_has_member(class: &Rc<ClassType>, name: &str, expected: Option<&Type>) -> bool {
    if let Some((_, ty, _)) = class.fields.borrow().iter().find(|(n, _, _)| n == name) {
        return match expected {
            Some(expected) => ty == expected,
            None => true,
        };
    }
    if let Some(Type::Class(parent)) = class.super_type.borrow().clone() {
        return class_has_member(&parent, name, expected);
    }
    false
}

fn class_has_method(class: &Rc<ClassType>, name: &str, expected: &FunctionType) -> bool {
    if let Some((_, func)) = class.methods.borrow().iter().find(|(n, _)| n == name) {
        return func.parameters == expected.parameters && func.return_type == expected.return_type;
    }
    if let Some(Type::Class(parent)) = class.super_type.borrow().clone() {
        return class_has_method(&parent, name, expected);
    }
    false
}

fn check_interface_implementations(_ctx: &mut CheckerContext, _i: &Interface, _types: &mut ProgramTypes) {
    // Interfaces have no bodies to check; member resolution against
    // implementers happens per-class in `check_class_bodies`.
}
