//! Numeric/value-type mapping from the semantic `Type` model to
//! `wasm_encoder::ValType`.

use wasm_encoder::{HeapType, RefType, ValType};

use crate::types::{widen_literal, NumberKind, Type};

/// Maps a semantic type to the WasmGC value type it's stored/passed as.
/// Literal types widen to their base first (spec §3.1) so a bare
/// integer/float/boolean literal gets the same physical representation
/// as a variable declared with the widened type.
pub fn val_type(ty: &Type) -> ValType {
    match ty {
        Type::Literal(_) => val_type(&widen_literal(ty)),
        Type::Number(NumberKind::I8 | NumberKind::I16 | NumberKind::I32 | NumberKind::U8 | NumberKind::U16 | NumberKind::U32) => {
            ValType::I32
        }
        Type::Number(NumberKind::I64 | NumberKind::U64) => ValType::I64,
        Type::Number(NumberKind::F32) => ValType::F32,
        Type::Number(NumberKind::F64) => ValType::F64,
        Type::Boolean => ValType::I32,
        Type::Void => ValType::I32,
        Type::Null => any_ref(),
        _ => any_ref(),
    }
}

/// The untyped `anyref` slot used for `Null`, `Any`, `AnyRef` and any
/// type this simplified mapping has no concrete struct index for yet
/// (unions, type parameters before monomorphization).
pub fn any_ref() -> ValType {
    ValType::Ref(RefType {
        nullable: true,
        heap_type: HeapType::ANY,
    })
}

/// Slot 0 of every class struct (spec §4.4 step 1: "the root class
/// reserves slot 0 for an untyped vtable reference (`eqref`)"). Kept
/// untyped rather than a concrete vtable-struct ref so every class in
/// a hierarchy shares the exact same field type at slot 0 regardless
/// of declaration order, sidestepping the forward-reference problem a
/// precisely-typed slot would have (the vtable struct type for a class
/// is only known after its own struct type is allocated).
pub fn eq_ref() -> ValType {
    ValType::Ref(RefType {
        nullable: true,
        heap_type: HeapType::EQ,
    })
}

pub fn is_float(ty: &Type) -> bool {
    matches!(ty, Type::Number(NumberKind::F32 | NumberKind::F64))
}
