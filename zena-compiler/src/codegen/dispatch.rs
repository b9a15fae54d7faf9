//! Call-site lowering primitives: virtual dispatch through a class's
//! vtable (`struct.get` the vtable ref off the receiver, `ref.cast` to
//! the exact vtable struct, `struct.get` the slot, `call_ref`), and
//! direct struct field get/set. Resolved against the checker's
//! inferred per-node static type (threaded in as `node_types`, see
//! `codegen::mod`) rather than the AST's textual name alone, so the
//! right vtable slot or struct field index is picked instead of
//! guessed.

use wasm_encoder::{Function, HeapType, Instruction, RefType};

use crate::codegen::{codegen_bug, layout::owning_class, ClassLayout};
use crate::types::ClassType;
use std::rc::Rc;

fn cast_to(func: &mut Function, heap_type_index: u32) {
    func.instruction(&Instruction::RefCast(RefType {
        nullable: false,
        heap_type: HeapType::Concrete(heap_type_index),
    }));
}

fn mangled(field: &str) -> String {
    format!("__{field}")
}

fn field_slot(layout: &ClassLayout, field: &str) -> Option<u32> {
    layout
        .field_index
        .get(field)
        .or_else(|| layout.field_index.get(&mangled(field)))
        .copied()
}

/// `receiver` (already on the stack) → its `field` value, via a
/// `ref.cast` to the concrete struct type so `struct.get` is valid.
pub(crate) fn emit_field_get(func: &mut Function, layout: &ClassLayout, field: &str) {
    let Some(index) = field_slot(layout, field) else {
        codegen_bug(&format!("no field slot for `{field}`"));
    };
    cast_to(func, layout.struct_type);
    func.instruction(&Instruction::StructGet {
        struct_type_index: layout.struct_type,
        field_index: index,
    });
}

/// `receiver`, then `value` (both already on the stack) → writes
/// `value` into `field`.
pub(crate) fn emit_field_set(func: &mut Function, layout: &ClassLayout, field: &str) {
    let Some(index) = field_slot(layout, field) else {
        codegen_bug(&format!("no field slot for `{field}`"));
    };
    cast_to(func, layout.struct_type);
    func.instruction(&Instruction::StructSet {
        struct_type_index: layout.struct_type,
        field_index: index,
    });
}

/// Virtual dispatch: `receiver_tmp` (a local already holding the
/// receiver, staged as the first `call_ref` argument by the caller
/// before this runs) is reloaded to cast-and-load the method out of
/// the vtable. Leaves the slot's function reference on top of the
/// stack, ready for `call_ref`.
pub(crate) fn push_vtable_slot_func(func: &mut Function, layout: &ClassLayout, receiver_tmp: u32, slot_name: &str) {
    let Some(&slot) = layout.vtable_slot.get(slot_name) else {
        codegen_bug(&format!("no vtable slot for `{slot_name}`"));
    };
    func.instruction(&Instruction::LocalGet(receiver_tmp));
    cast_to(func, layout.struct_type);
    func.instruction(&Instruction::StructGet {
        struct_type_index: layout.struct_type,
        field_index: 0,
    });
    cast_to(func, layout.vtable_type);
    func.instruction(&Instruction::StructGet {
        struct_type_index: layout.vtable_type,
        field_index: slot,
    });
}

/// True when `method` must be invoked statically on a receiver of
/// static type `class` (spec §4.5): the class is final, the method
/// itself is final, or the class is an extension class.
pub(crate) fn is_static_dispatch(class: &Rc<ClassType>, method: &str) -> bool {
    if class.is_final || class.is_extension {
        return true;
    }
    owning_class(class, method)
        .and_then(|owner| owner.methods.borrow().iter().find(|(n, _)| n == method).map(|(_, f)| f.is_final))
        .unwrap_or(false)
}
