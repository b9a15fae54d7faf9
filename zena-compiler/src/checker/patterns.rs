//! Pattern binding and matching (`match` arms, not yet `let` destructuring
//! since the grammar only allows plain identifiers there).

use zena_ast::Pattern;

use crate::context::CheckerContext;
use crate::types::{print_type, LiteralValue as TyLiteral, Type};

use super::ProgramTypes;

/// Checks `pattern` against `scrutinee`, binding any identifiers it
/// introduces into the current scope. Mismatches are reported but do
/// not abort checking of the rest of the arm.
pub fn check_pattern(
    ctx: &mut CheckerContext,
    types: &mut ProgramTypes,
    pattern: &Pattern,
    scrutinee: &Type,
) {
    match pattern {
        Pattern::Wildcard => {}
        Pattern::Ident(name) => {
            ctx.declare_variable(name, scrutinee.clone(), false);
        }
        Pattern::Literal(lit) => {
            let literal_type = Type::Literal(match lit {
                zena_ast::LiteralValue::Int(v) => TyLiteral::Int(*v),
                zena_ast::LiteralValue::Float(b) => TyLiteral::Float(*b),
                zena_ast::LiteralValue::Bool(b) => TyLiteral::Bool(*b),
                zena_ast::LiteralValue::Str(s) => TyLiteral::Str(s.clone()),
            });
            if !crate::assign::assignable(&literal_type, scrutinee)
                && !crate::assign::assignable(scrutinee, &literal_type)
            {
                ctx.emit_error(
                    "TypeMismatch",
                    format!(
                        "pattern of type `{}` cannot match scrutinee of type `{}`",
                        print_type(&literal_type),
                        print_type(scrutinee)
                    ),
                    zena_diagnostics::Span::unknown(),
                );
            }
        }
        Pattern::Tuple(items) => match scrutinee {
            Type::Tuple(member_types) | Type::UnboxedTuple(member_types) => {
                if items.len() != member_types.len() {
                    ctx.emit_error(
                        "TypeMismatch",
                        format!(
                            "tuple pattern has {} elements but scrutinee has {}",
                            items.len(),
                            member_types.len()
                        ),
                        zena_diagnostics::Span::unknown(),
                    );
                }
                for (item, member_ty) in items.iter().zip(member_types.iter()) {
                    check_pattern(ctx, types, item, member_ty);
                }
            }
            _ => {
                ctx.emit_error(
                    "TypeMismatch",
                    format!(
                        "tuple pattern cannot match non-tuple scrutinee `{}`",
                        print_type(scrutinee)
                    ),
                    zena_diagnostics::Span::unknown(),
                );
            }
        },
        Pattern::Struct { name, fields } => {
            let Some(class) = types.classes.get(name).cloned() else {
                ctx.emit_error(
                    "SymbolNotFound",
                    format!("cannot find class `{name}` for struct pattern"),
                    zena_diagnostics::Span::unknown(),
                );
                return;
            };
            for (field_name, field_pattern) in fields {
                let field_ty = class
                    .fields
                    .borrow()
                    .iter()
                    .find(|(n, _, _)| n == field_name)
                    .map(|(_, ty, _)| ty.clone());
                match field_ty {
                    Some(ty) => check_pattern(ctx, types, field_pattern, &ty),
                    None => ctx.emit_error(
                        "PropertyNotFound",
                        format!("class `{name}` has no field `{field_name}`"),
                        zena_diagnostics::Span::unknown(),
                    ),
                }
            }
        }
        Pattern::EnumVariant {
            enum_name,
            variant,
            fields,
        } => {
            let resolved = enum_name
                .clone()
                .or_else(|| scrutinee_enum_name(scrutinee))
                .or_else(|| find_enum_for_variant(types, variant));
            let Some(enum_name) = resolved else {
                ctx.emit_error(
                    "SymbolNotFound",
                    format!("cannot determine enum for variant `{variant}`"),
                    zena_diagnostics::Span::unknown(),
                );
                return;
            };
            let Some((field_types, _)) = types
                .enum_variants
                .get(&enum_name)
                .and_then(|variants| variants.get(variant))
                .cloned()
            else {
                ctx.emit_error(
                    "SymbolNotFound",
                    format!("enum `{enum_name}` has no variant `{variant}`"),
                    zena_diagnostics::Span::unknown(),
                );
                return;
            };
            if fields.len() != field_types.len() {
                ctx.emit_error(
                    "TypeMismatch",
                    format!(
                        "variant `{variant}` has {} fields but pattern has {}",
                        field_types.len(),
                        fields.len()
                    ),
                    zena_diagnostics::Span::unknown(),
                );
            }
            for (field_pattern, field_ty) in fields.iter().zip(field_types.iter()) {
                check_pattern(ctx, types, field_pattern, field_ty);
            }
        }
        Pattern::Or(alternatives) => {
            for alt in alternatives {
                check_pattern(ctx, types, alt, scrutinee);
            }
        }
    }
}

fn scrutinee_enum_name(scrutinee: &Type) -> Option<String> {
    match scrutinee {
        Type::Class(c) => Some(c.name.clone()),
        _ => None,
    }
}

fn find_enum_for_variant(types: &ProgramTypes, variant: &str) -> Option<String> {
    types
        .enum_variants
        .iter()
        .find(|(_, variants)| variants.contains_key(variant))
        .map(|(name, _)| name.clone())
}
