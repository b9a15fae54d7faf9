//! Class/interface struct and vtable layout (spec §4.4's six-step
//! algorithm): field collection with private-name mangling, struct type
//! with a supertype link, per-method function-type slot allocation
//! (reusing an inherited slot's type for an override), a vtable struct
//! type with the parent vtable as its supertype, and an immutable
//! vtable global.

use std::collections::HashMap;
use std::rc::Rc;

use wasm_encoder::{ConstExpr, HeapType, StorageType, ValType};

use crate::codegen::{helpers, ClassLayout, CodegenState};
use crate::types::ClassType;
use crate::wasm::ModuleBuilder;

/// Reserved field-index-map key for the slot-0 untyped vtable
/// reference; `$` can never collide with a source identifier.
const VTABLE_FIELD: &str = "$vtable";

fn mangled_field_name(name: &str, is_private: bool) -> String {
    if is_private {
        format!("__{name}")
    } else {
        name.to_string()
    }
}

pub fn build_class_layout(builder: &mut ModuleBuilder, state: &mut CodegenState, class: &Rc<ClassType>) {
    if state.class_layouts.contains_key(&class.name) {
        return;
    }
    if let Some(crate::types::Type::Class(parent)) = class.super_type.borrow().clone() {
        build_class_layout(builder, state, &parent);
    }

    let parent_layout_types = class
        .super_type
        .borrow()
        .clone()
        .and_then(|t| match t {
            crate::types::Type::Class(parent) => state.class_layouts.get(&parent.name).map(|l| (l.struct_type, l.vtable_type)),
            _ => None,
        });

    let mut field_index = HashMap::new();
    let mut field_storage: HashMap<String, (ValType, bool)> = HashMap::new();
    let mut fields = Vec::new();
    // Inherited fields (including the inherited slot-0 vtable ref)
    // occupy the same leading positions as the parent struct, so
    // codegen for a subclass instance can still be accessed through a
    // parent-typed reference. Storage types are copied straight from
    // the parent's own `field_storage` (already transitively correct
    // for its whole super chain), never re-derived from the parent's
    // own `ClassType::fields` alone — that would only see fields the
    // immediate parent itself declares, silently dropping the real
    // storage type of anything declared further up the chain.
    if let Some(crate::types::Type::Class(parent)) = class.super_type.borrow().clone() {
        if let Some(parent_layout) = state.class_layouts.get(&parent.name) {
            for (name, index) in &parent_layout.field_index {
                field_index.insert(name.clone(), *index);
            }
            fields = vec![(StorageType::Val(helpers::eq_ref()), false); parent_layout.field_index.len()];
            for (name, &idx) in &parent_layout.field_index {
                let (val_ty, mutable) = if name == VTABLE_FIELD {
                    (helpers::eq_ref(), false)
                } else {
                    parent_layout
                        .field_storage
                        .get(name)
                        .copied()
                        .unwrap_or((helpers::eq_ref(), false))
                };
                field_storage.insert(name.clone(), (val_ty, mutable));
                if let Some(slot) = fields.get_mut(idx as usize) {
                    *slot = (StorageType::Val(val_ty), mutable);
                }
            }
        }
    } else {
        // Root of a class hierarchy: reserve slot 0 for the untyped
        // vtable reference every instance carries.
        field_index.insert(VTABLE_FIELD.to_string(), 0);
        field_storage.insert(VTABLE_FIELD.to_string(), (helpers::eq_ref(), false));
        fields.push((StorageType::Val(helpers::eq_ref()), false));
    }

    for (name, ty, attrs) in class.fields.borrow().iter() {
        let mangled = mangled_field_name(name, attrs.is_private);
        if field_index.contains_key(&mangled) {
            continue;
        }
        let idx = fields.len() as u32;
        let val_ty = helpers::val_type(ty);
        field_index.insert(mangled.clone(), idx);
        field_storage.insert(mangled, (val_ty, attrs.is_mutable));
        fields.push((StorageType::Val(val_ty), attrs.is_mutable));
    }

    let struct_type = builder.add_struct_type(fields, parent_layout_types.map(|(s, _)| s));

    let mut vtable_slot = HashMap::new();
    let mut vtable_slot_func_type = HashMap::new();
    let mut vtable_fields = Vec::new();
    if let Some(crate::types::Type::Class(parent)) = class.super_type.borrow().clone() {
        if let Some(parent_layout) = state.class_layouts.get(&parent.name) {
            vtable_slot = parent_layout.vtable_slot.clone();
            vtable_slot_func_type = parent_layout.vtable_slot_func_type.clone();
            vtable_fields = vec![(StorageType::Val(helpers::any_ref()), false); vtable_slot.len()];
        }
    }
    for slot_name in class.vtable.borrow().iter() {
        if vtable_slot.contains_key(slot_name) {
            continue;
        }
        let idx = vtable_fields.len() as u32;
        vtable_slot.insert(slot_name.clone(), idx);
        // The concrete function-ref type for this slot is whichever
        // class first declares it; methods map is searched by name.
        let func_ty = class
            .methods
            .borrow()
            .iter()
            .find(|(n, _)| n == slot_name)
            .map(|(_, f)| f.clone());
        let slot_value_type = match func_ty {
            Some(func) => {
                let params: Vec<ValType> = std::iter::once(helpers::any_ref())
                    .chain(func.parameters.iter().map(helpers::val_type))
                    .collect();
                let results = vec![helpers::val_type(&func.return_type)];
                let type_index = builder.add_function_type(params, results);
                vtable_slot_func_type.insert(slot_name.clone(), type_index);
                ModuleBuilder::struct_ref(type_index, true)
            }
            None => helpers::any_ref(),
        };
        vtable_fields.push((StorageType::Val(slot_value_type), false));
    }
    let vtable_type = builder.add_struct_type(vtable_fields, parent_layout_types.map(|(_, v)| v));

    state.class_layouts.insert(
        class.name.clone(),
        ClassLayout {
            struct_type,
            vtable_type,
            vtable_global: u32::MAX,
            field_index,
            vtable_slot,
            vtable_slot_func_type,
            field_storage,
        },
    );
}

/// Emits `class`'s vtable global, null-initialized. The real `ref.func`
/// entries aren't known yet at this point in the pass order (method
/// bodies haven't been lowered, so their function indices don't exist)
/// — they're filled in by [`build_vtable_init_function`] once every
/// method/constructor has a function index, via a synthesized module
/// start function. The global is therefore mutable (write-once, from
/// that start function only) rather than a true `wasm_encoder`
/// immutable const-expr global.
pub fn build_vtable_global(builder: &mut ModuleBuilder, state: &mut CodegenState, class: &Rc<ClassType>) {
    let Some(layout) = state.class_layouts.get(&class.name) else { return };
    let vtable_type = layout.vtable_type;
    let init = ConstExpr::ref_null(HeapType::Concrete(vtable_type));
    let global_index = builder.add_global(ModuleBuilder::struct_ref(vtable_type, true), true, &init);
    if let Some(layout) = state.class_layouts.get_mut(&class.name) {
        layout.vtable_global = global_index;
    }
}

/// Finds the nearest class (including `class` itself) whose own
/// declared methods contain `slot_name` — `ClassType::methods` only
/// holds a class's own declarations (spec §3.2), not the full
/// inherited set, so an inherited vtable slot's body lives on an
/// ancestor.
pub fn owning_class(class: &Rc<ClassType>, slot_name: &str) -> Option<Rc<ClassType>> {
    if class.methods.borrow().iter().any(|(n, _)| n == slot_name) {
        return Some(class.clone());
    }
    match class.super_type.borrow().clone() {
        Some(crate::types::Type::Class(parent)) => owning_class(&parent, slot_name),
        _ => None,
    }
}

/// Synthesizes the module start function that populates every class's
/// vtable global with `ref.func` entries to its (by-then lowered)
/// method bodies, in vtable-slot order (spec §4.4 step 5: "an
/// immutable global holding a freshly constructed vtable whose slots
/// reference each method's function index").
pub fn build_vtable_init_function(
    builder: &mut ModuleBuilder,
    state: &CodegenState,
    classes: &[Rc<ClassType>],
    class_iface_pairs: &[(Rc<ClassType>, Rc<crate::types::InterfaceType>)],
) -> u32 {
    use wasm_encoder::{Function, Instruction};

    let mut func = Function::new(std::iter::empty());
    for class in classes {
        let Some(layout) = state.class_layouts.get(&class.name) else { continue };
        let vtable_type = layout.vtable_type;
        let vtable_global = layout.vtable_global;
        for slot_name in class.vtable.borrow().iter() {
            let Some(owner) = owning_class(class, slot_name) else { continue };
            let qualified = format!("{}.{}", owner.name, slot_name);
            let Some(&func_index) = state.function_indices.get(&qualified) else { continue };
            func.instruction(&Instruction::RefFunc(func_index));
        }
        func.instruction(&Instruction::StructNew(vtable_type));
        func.instruction(&Instruction::GlobalSet(vtable_global));
    }
    crate::codegen::interfaces::emit_interface_vtable_init(&mut func, state, class_iface_pairs);
    func.instruction(&Instruction::End);
    let type_index = builder.add_function_type(vec![], vec![]);
    builder.add_function(type_index, func, Some("$zena_vtable_init"))
}
