//! Renders a [`super::Type`] back into source-like syntax for diagnostics.

use super::Type;

pub fn print_type(ty: &Type) -> String {
    match ty {
        Type::Number(k) => k.name().to_string(),
        Type::Boolean => "boolean".to_string(),
        Type::Void => "void".to_string(),
        Type::Null => "null".to_string(),
        Type::Never => "never".to_string(),
        Type::Any => "any".to_string(),
        Type::AnyRef => "anyref".to_string(),
        Type::Unknown => "unknown".to_string(),
        Type::ByteArray => "bytearray".to_string(),
        Type::This => "this".to_string(),
        Type::Literal(super::LiteralValue::Int(v)) => v.to_string(),
        Type::Literal(super::LiteralValue::Float(bits)) => format!("{}", f64::from_bits(*bits)),
        Type::Literal(super::LiteralValue::Bool(b)) => b.to_string(),
        Type::Literal(super::LiteralValue::Str(s)) => format!("\"{s}\""),
        Type::TypeParameter(p) => p.name.clone(),
        Type::TypeAlias(a) => print_named(&a.name, a.type_arguments.as_deref()),
        Type::Array(elem) => format!("Array<{}>", print_type(elem)),
        Type::Tuple(items) => print_tuple(items, false),
        Type::UnboxedTuple(items) => print_tuple(items, true),
        Type::Record(fields) => {
            let body = fields
                .iter()
                .map(|(name, ty)| format!("{name}: {}", print_type(ty)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{ {body} }}")
        }
        Type::Union(members) => members
            .iter()
            .map(print_type)
            .collect::<Vec<_>>()
            .join(" | "),
        Type::Function(f) => {
            let params = f
                .parameters
                .iter()
                .map(print_type)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({params}) -> {}", print_type(&f.return_type))
        }
        Type::Class(c) => print_named(&c.name, c.type_arguments.as_deref()),
        Type::Interface(i) => print_named(&i.name, i.type_arguments.as_deref()),
        Type::Mixin(m) => print_named(&m.name, m.type_arguments.as_deref()),
    }
}

fn print_tuple(items: &[Type], unboxed: bool) -> String {
    let body = items
        .iter()
        .map(print_type)
        .collect::<Vec<_>>()
        .join(", ");
    if unboxed {
        format!("unboxed ({body})")
    } else {
        format!("({body})")
    }
}

fn print_named(name: &str, type_arguments: Option<&[Type]>) -> String {
    match type_arguments {
        Some(args) if !args.is_empty() => {
            let args = args.iter().map(print_type).collect::<Vec<_>>().join(", ");
            format!("{name}<{args}>")
        }
        _ => name.to_string(),
    }
}
