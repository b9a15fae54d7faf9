//! Interface fat-pointer and vtable layout (spec §3.3), plus the
//! trampoline functions that populate one vtable per `(class, interface)`
//! conformance pair (spec §4.4 step 6). An interface-typed value is a
//! reference to a two-field fat pointer: field 0 the erased instance,
//! field 1 the trampoline vtable for whichever concrete class produced
//! it. Every trampoline forwards to the class's own vtable slot of the
//! same name, which already exists for both declared methods and the
//! checker's auto-induced field accessors (spec §4.3) — so one
//! mechanism covers both of spec §4.4 step 6's cases (a) and (b).

use std::collections::HashMap;
use std::rc::Rc;

use wasm_encoder::{ConstExpr, Function, HeapType, Instruction, RefType, StorageType, ValType};

use crate::codegen::{codegen_bug, dispatch, helpers, CodegenState};
use crate::types::{ClassType, FunctionType, InterfaceType, Type};
use crate::wasm::ModuleBuilder;

pub struct InterfaceLayout {
    pub vtable_type: u32,
    pub fatptr_type: u32,
    pub vtable_order: Vec<String>,
    pub vtable_slot: HashMap<String, u32>,
    pub vtable_slot_func_type: HashMap<String, u32>,
    pub vtable_param_count: HashMap<String, u32>,
}

fn cast_to(func: &mut Function, heap_type_index: u32) {
    func.instruction(&Instruction::RefCast(RefType {
        nullable: false,
        heap_type: HeapType::Concrete(heap_type_index),
    }));
}

/// Builds (once) `iface`'s vtable struct type and fat-pointer struct
/// type, recursing into `extends` first so inherited slots occupy the
/// same leading positions as the parent interface's vtable (spec §3.2's
/// ordering rule, applied to interfaces exactly as it is to classes).
/// An interface field induces a read-only `get_<field>` slot, since the
/// fat pointer carries no storage of its own for interface-declared
/// fields — only the trampoline, forwarding to the declaring class's
/// own accessor, does.
pub fn build_interface_layout(builder: &mut ModuleBuilder, state: &mut CodegenState, iface: &Rc<InterfaceType>) {
    if state.interface_layouts.contains_key(&iface.name) {
        return;
    }
    let mut slot_order: Vec<String> = Vec::new();
    let mut slot_func: HashMap<String, Option<Rc<FunctionType>>> = HashMap::new();

    for parent in iface.extends.borrow().iter() {
        if let Type::Interface(p) = parent {
            build_interface_layout(builder, state, p);
            if let Some(parent_layout) = state.interface_layouts.get(&p.name) {
                for name in parent_layout.vtable_order.clone() {
                    if !slot_func.contains_key(&name) {
                        slot_order.push(name.clone());
                        slot_func.insert(name, None);
                    }
                }
            }
        }
    }
    for (name, func) in iface.methods.borrow().iter() {
        if !slot_func.contains_key(name) {
            slot_order.push(name.clone());
            slot_func.insert(name.clone(), Some(func.clone()));
        }
    }
    for (name, ty) in iface.fields.borrow().iter() {
        let getter = format!("get_{name}");
        if !slot_func.contains_key(&getter) {
            slot_order.push(getter.clone());
            slot_func.insert(
                getter,
                Some(Rc::new(FunctionType {
                    type_parameters: vec![],
                    type_arguments: None,
                    parameters: vec![],
                    return_type: ty.clone(),
                    is_final: false,
                    is_abstract: false,
                    generic_source: None,
                })),
            );
        }
    }

    let mut vtable_fields = Vec::with_capacity(slot_order.len());
    let mut vtable_slot = HashMap::new();
    let mut vtable_slot_func_type = HashMap::new();
    let mut vtable_param_count = HashMap::new();
    for (i, name) in slot_order.iter().enumerate() {
        vtable_slot.insert(name.clone(), i as u32);
        let func = slot_func.get(name).cloned().flatten();
        vtable_param_count.insert(name.clone(), func.as_ref().map(|f| f.parameters.len() as u32).unwrap_or(0));
        let value_type = match &func {
            Some(f) => {
                let params: Vec<ValType> = std::iter::once(helpers::any_ref()).chain(f.parameters.iter().map(helpers::val_type)).collect();
                let results = vec![helpers::val_type(&f.return_type)];
                let type_index = builder.add_function_type(params, results);
                vtable_slot_func_type.insert(name.clone(), type_index);
                ModuleBuilder::struct_ref(type_index, true)
            }
            None => helpers::any_ref(),
        };
        vtable_fields.push((StorageType::Val(value_type), false));
    }
    let vtable_type = builder.add_struct_type(vtable_fields, None);
    let fatptr_fields = vec![
        (StorageType::Val(helpers::any_ref()), false),
        (StorageType::Val(ModuleBuilder::struct_ref(vtable_type, true)), false),
    ];
    let fatptr_type = builder.add_struct_type(fatptr_fields, None);

    state.interface_layouts.insert(
        iface.name.clone(),
        InterfaceLayout {
            vtable_type,
            fatptr_type,
            vtable_order: slot_order,
            vtable_slot,
            vtable_slot_func_type,
            vtable_param_count,
        },
    );
}

/// Allocates the (null-initialized) trampoline-vtable global for one
/// `(class, interface)` conformance pair, mirroring
/// `layout::build_vtable_global`'s write-once-from-a-start-function
/// shape: the trampolines themselves aren't lowered until every class
/// method has a function index, so the global can't be const-initialized
/// up front.
pub fn build_interface_vtable_global(builder: &mut ModuleBuilder, state: &mut CodegenState, class: &Rc<ClassType>, iface: &Rc<InterfaceType>) {
    let key = (class.name.clone(), iface.name.clone());
    if state.interface_vtable_globals.contains_key(&key) {
        return;
    }
    let Some(vtable_type) = state.interface_layouts.get(&iface.name).map(|l| l.vtable_type) else {
        return;
    };
    let init = ConstExpr::ref_null(HeapType::Concrete(vtable_type));
    let global_index = builder.add_global(ModuleBuilder::struct_ref(vtable_type, true), true, &init);
    state.interface_vtable_globals.insert(key, global_index);
}

/// Synthesizes one trampoline per interface vtable slot for `(class,
/// iface)`: casts the erased instance argument to `class`'s struct type
/// (via the reload inside `dispatch::push_vtable_slot_func`) and
/// forwards through `class`'s own vtable slot of the same name. Stores
/// the resulting function indices, in slot order, for later use by
/// `build_combined_vtable_init`.
pub fn build_interface_trampolines(builder: &mut ModuleBuilder, state: &mut CodegenState, class: &Rc<ClassType>, iface: &Rc<InterfaceType>) {
    let key = (class.name.clone(), iface.name.clone());
    if state.interface_trampolines.contains_key(&key) {
        return;
    }
    let Some(iface_layout_order) = state.interface_layouts.get(&iface.name).map(|l| l.vtable_order.clone()) else {
        return;
    };

    let mut indices = Vec::with_capacity(iface_layout_order.len());
    for slot_name in &iface_layout_order {
        let Some(iface_layout) = state.interface_layouts.get(&iface.name) else { continue };
        let Some(&iface_func_type) = iface_layout.vtable_slot_func_type.get(slot_name) else { continue };
        let param_count = iface_layout.vtable_param_count.get(slot_name).copied().unwrap_or(0);
        let Some(class_layout) = state.class_layouts.get(&class.name) else {
            codegen_bug(&format!("no struct layout for class `{}`", class.name));
        };
        if !class_layout.vtable_slot.contains_key(slot_name) {
            codegen_bug(&format!("class `{}` has no vtable slot for interface `{}` member `{slot_name}`", class.name, iface.name));
        }

        let mut func = Function::new(std::iter::empty());
        func.instruction(&Instruction::LocalGet(0));
        for i in 1..=param_count {
            func.instruction(&Instruction::LocalGet(i));
        }
        dispatch::push_vtable_slot_func(&mut func, class_layout, 0, slot_name);
        let class_func_type = class_layout
            .vtable_slot_func_type
            .get(slot_name)
            .copied()
            .unwrap_or_else(|| codegen_bug(&format!("class `{}` vtable slot `{slot_name}` has no function type", class.name)));
        func.instruction(&Instruction::CallRef(class_func_type));
        func.instruction(&Instruction::End);

        let qualified = format!("{}.${}.{}", class.name, iface.name, slot_name);
        let index = builder.add_function(iface_func_type, func, Some(&qualified));
        indices.push(index);
    }
    state.interface_trampolines.insert(key, indices);
}

/// Finds the nearest class (including `class` itself) whose own
/// declared `implements` list names `iface_name` directly, walking the
/// super chain otherwise. An instance of a subclass that never
/// re-declares conformance is wrapped using its ancestor's trampoline
/// set — a single `ref.cast` to the ancestor's struct type still
/// succeeds for any subtype, and virtual dispatch off the reloaded
/// vtable resolves to the subclass's own override regardless (spec §9's
/// "single cast at dispatch time" note, applied one level further up).
pub fn find_implementing_class(class: &Rc<ClassType>, iface_name: &str) -> Option<Rc<ClassType>> {
    if class.implements.borrow().iter().any(|t| matches!(t, Type::Interface(i) if i.name == iface_name)) {
        return Some(class.clone());
    }
    match class.super_type.borrow().clone() {
        Some(Type::Class(parent)) => find_implementing_class(&parent, iface_name),
        _ => None,
    }
}

/// Wraps the class instance already on top of the stack into `iface`'s
/// fat-pointer representation, looking up the trampoline vtable global
/// for whichever ancestor class actually declares conformance.
pub fn emit_wrap_as_interface(func: &mut Function, state: &CodegenState, class: &Rc<ClassType>, iface: &Rc<InterfaceType>) {
    let Some(owner) = find_implementing_class(class, &iface.name) else {
        codegen_bug(&format!("class `{}` does not implement interface `{}`", class.name, iface.name));
    };
    let Some(&global_index) = state.interface_vtable_globals.get(&(owner.name.clone(), iface.name.clone())) else {
        codegen_bug(&format!("no trampoline vtable global for `{}` implementing `{}`", owner.name, iface.name));
    };
    let Some(fatptr_type) = state.interface_layouts.get(&iface.name).map(|l| l.fatptr_type) else {
        codegen_bug(&format!("interface `{}` has no layout", iface.name));
    };
    func.instruction(&Instruction::GlobalGet(global_index));
    func.instruction(&Instruction::StructNew(fatptr_type));
}

/// `recv_tmp` holds a fat pointer; pushes its unwrapped instance field
/// (field 0), the value a trampoline expects as its own first
/// parameter.
pub fn push_instance_from_fatptr(func: &mut Function, state: &CodegenState, iface: &Rc<InterfaceType>, recv_tmp: u32) {
    let Some(layout) = state.interface_layouts.get(&iface.name) else {
        codegen_bug(&format!("interface `{}` has no layout", iface.name));
    };
    func.instruction(&Instruction::LocalGet(recv_tmp));
    cast_to(func, layout.fatptr_type);
    func.instruction(&Instruction::StructGet {
        struct_type_index: layout.fatptr_type,
        field_index: 0,
    });
}

/// `recv_tmp` holds a fat pointer; pushes the `call_ref`-able function
/// reference for `method`'s vtable slot (field 1's vtable, reloaded and
/// cast), returning the function type index to call it with.
pub fn push_interface_slot_func(func: &mut Function, state: &CodegenState, iface: &Rc<InterfaceType>, recv_tmp: u32, method: &str) -> u32 {
    let Some(layout) = state.interface_layouts.get(&iface.name) else {
        codegen_bug(&format!("interface `{}` has no layout", iface.name));
    };
    let Some(&slot) = layout.vtable_slot.get(method) else {
        codegen_bug(&format!("interface `{}` has no vtable slot `{method}`", iface.name));
    };
    let func_type = layout
        .vtable_slot_func_type
        .get(method)
        .copied()
        .unwrap_or_else(|| codegen_bug(&format!("interface `{}` slot `{method}` has no function type", iface.name)));
    func.instruction(&Instruction::LocalGet(recv_tmp));
    cast_to(func, layout.fatptr_type);
    func.instruction(&Instruction::StructGet {
        struct_type_index: layout.fatptr_type,
        field_index: 1,
    });
    cast_to(func, layout.vtable_type);
    func.instruction(&Instruction::StructGet {
        struct_type_index: layout.vtable_type,
        field_index: slot,
    });
    func_type
}

/// Extends `layout::build_vtable_init_function`'s class-vtable
/// population with one more pass populating every `(class, interface)`
/// trampoline-vtable global, sharing the same module start function so
/// both run once, in order, before any export is reachable.
pub fn emit_interface_vtable_init(func: &mut Function, state: &CodegenState, pairs: &[(Rc<ClassType>, Rc<InterfaceType>)]) {
    for (class, iface) in pairs {
        let key = (class.name.clone(), iface.name.clone());
        let Some(indices) = state.interface_trampolines.get(&key) else { continue };
        let Some(&global_index) = state.interface_vtable_globals.get(&key) else { continue };
        let Some(vtable_type) = state.interface_layouts.get(&iface.name).map(|l| l.vtable_type) else { continue };
        for &index in indices {
            func.instruction(&Instruction::RefFunc(index));
        }
        func.instruction(&Instruction::StructNew(vtable_type));
        func.instruction(&Instruction::GlobalSet(global_index));
    }
}
