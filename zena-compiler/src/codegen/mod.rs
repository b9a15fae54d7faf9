//! Lowers a checked program to a WasmGC module (spec §4.4-§4.6).

pub mod closures;
pub mod dispatch;
pub mod expressions;
pub mod helpers;
pub mod interfaces;
pub mod layout;
pub mod strings;

use std::collections::HashMap;
use std::rc::Rc;

use zena_ast::{Item, NodeId, Program};

use crate::checker::ProgramTypes;
use crate::types::{ClassType, InterfaceType, Type};
use crate::wasm::ModuleBuilder;

/// Per-class WasmGC indices computed by [`layout`], threaded through the
/// rest of codegen so expression lowering can `struct.get`/`struct.new`
/// without recomputing field offsets.
pub struct ClassLayout {
    pub struct_type: u32,
    pub vtable_type: u32,
    pub vtable_global: u32,
    pub field_index: HashMap<String, u32>,
    pub vtable_slot: HashMap<String, u32>,
    /// The `call_ref`-able function type index for each vtable slot
    /// (distinct from the slot's index within the vtable struct),
    /// needed at a virtual-dispatch call site to type the `call_ref`.
    pub vtable_slot_func_type: HashMap<String, u32>,
    /// Each field's own (mangled-name-keyed) storage `ValType` and
    /// mutability, accumulated across the whole super chain as each
    /// class's layout is built. A subclass copies every inherited
    /// entry verbatim from its parent's `field_storage` rather than
    /// re-deriving it from the parent's own `ClassType::fields` (which
    /// only holds that one class's *own* declarations, not fields
    /// declared further up the chain) — see `layout::build_class_layout`.
    pub field_storage: HashMap<String, (wasm_encoder::ValType, bool)>,
}

#[derive(Default)]
pub struct CodegenState {
    pub class_layouts: HashMap<String, ClassLayout>,
    pub function_indices: HashMap<String, u32>,
    pub string_data: strings::StringTable,
    /// Lazily allocated shared `array i8` type backing string literals;
    /// `None` until the first string literal is lowered.
    pub byte_array_type: Option<u32>,
    /// Fixed-array WasmGC array types, keyed by element `ValType`
    /// (`{:?}`-formatted, since `ValType` has no `Hash` impl), allocated
    /// on first use per distinct element representation (spec §6:
    /// "array types for fixed arrays keyed by element type").
    pub array_types: HashMap<String, u32>,
    /// Closure struct + underlying function type per distinct closure
    /// signature (context-erased parameter/result `ValType`s), shared
    /// across every closure value of that signature (spec §3.4).
    pub closure_types: HashMap<String, (u32, u32)>,
    /// Disambiguates the synthesized function name of each closure
    /// literal lowered in this compile.
    pub closure_counter: u32,
    /// Interface vtable/fat-pointer struct types, per interface name
    /// (spec §3.3), built lazily the first time a class's `implements`
    /// list or an interface-typed `let` needs one.
    pub interface_layouts: HashMap<String, interfaces::InterfaceLayout>,
    /// Trampoline-vtable global per `(class, interface)` conformance
    /// pair a class directly declares (spec §4.4 step 6).
    pub interface_vtable_globals: HashMap<(String, String), u32>,
    /// Lowered trampoline function indices per `(class, interface)`
    /// pair, in the interface's vtable slot order, populated once every
    /// class method has a function index.
    pub interface_trampolines: HashMap<(String, String), Vec<u32>>,
    /// One-field mutable "cell" struct type per distinct boxed value
    /// type (`{:?}`-formatted `ValType` key, same convention as
    /// `array_types`), allocated the first time a mutably captured
    /// local/parameter of that representation needs boxing (spec
    /// §3.4's capture semantics, generalized — see `codegen::closures`).
    pub cell_types: HashMap<String, u32>,
    /// Anonymous struct types backing tuple and record literals (spec
    /// §4.5: "a tuple literal uses a struct type interned by element
    /// types"), keyed by the `{:?}`-formatted ordered list of field
    /// `ValType`s (tuples) or `(name, ValType)` pairs (records) so two
    /// literals of the same shape share one struct type.
    pub compound_struct_types: HashMap<String, u32>,
}

/// Internal compiler invariant failure: a construct the checker should
/// have already rejected reached codegen anyway. These are `panic!`s by
/// design (spec §4.6) rather than `CompileError`s, since they indicate a
/// compiler bug, not a user-facing source error.
#[allow(clippy::panic)]
pub fn codegen_bug(message: &str) -> ! {
    panic!("codegen invariant violated: {message}");
}

pub fn codegen_program(program: &Program, types: &ProgramTypes, node_types: &HashMap<NodeId, Type>) -> Vec<u8> {
    let mut builder = ModuleBuilder::new();
    let mut state = CodegenState::default();

    // Step 1-6 of spec §4.4's class layout algorithm: every class gets a
    // struct type, vtable struct type and vtable global before any
    // method body is lowered, so methods can reference sibling classes
    // regardless of declaration order. A generic class is laid out
    // exactly once here too, under type erasure: the checker type-checks
    // a generic class's own body precisely once, against its declared
    // type parameters directly (never re-checked per instantiation), so
    // every `node_types` entry inside that body already reflects a bare
    // `Type::TypeParameter`, which `helpers::val_type` maps to `anyref`
    // like any other type it has no concrete mapping for. One physical
    // struct/vtable/method set per generic class template is therefore
    // sound for every instantiation whose type arguments are themselves
    // reference types (the only case SPEC_FULL's generics exercise) —
    // see DESIGN.md for the narrower case this doesn't cover.
    let mut classes: Vec<Rc<ClassType>> = types.classes.values().cloned().collect();
    classes.sort_by(|a, b| a.name.cmp(&b.name));
    for class in &classes {
        layout::build_class_layout(&mut builder, &mut state, class);
    }

    for class in &classes {
        layout::build_vtable_global(&mut builder, &mut state, class);
    }

    // Every interface a class directly declares conformance to gets a
    // vtable/fat-pointer layout and a (still null) trampoline-vtable
    // global, before any method body is lowered — mirroring the class
    // layout pass above (spec §4.4 step 6). Generic interfaces/classes
    // are included under the same erasure reasoning as the struct/vtable
    // pass above.
    let mut class_iface_pairs: Vec<(Rc<ClassType>, Rc<InterfaceType>)> = Vec::new();
    for class in &classes {
        for iface_ty in class.implements.borrow().iter() {
            if let Type::Interface(iface) = iface_ty {
                interfaces::build_interface_layout(&mut builder, &mut state, iface);
                interfaces::build_interface_vtable_global(&mut builder, &mut state, class, iface);
                class_iface_pairs.push((class.clone(), iface.clone()));
            }
        }
    }

    for item in &program.items {
        if let Item::Function(f) = item {
            expressions::lower_function(&mut builder, &mut state, types, node_types, f);
        }
    }

    for class in &classes {
        expressions::lower_class_methods(&mut builder, &mut state, types, node_types, program, class);
    }

    for class in &classes {
        expressions::lower_constructors(&mut builder, &mut state, types, node_types, program, class);
    }

    // Every class method/constructor now has a function index, so the
    // trampolines forwarding to them can be lowered too.
    for (class, iface) in &class_iface_pairs {
        interfaces::build_interface_trampolines(&mut builder, &mut state, class, iface);
    }

    // Every method/constructor body now has a function index: the
    // vtable globals allocated (null) earlier can be populated by a
    // synthesized start function (spec §4.4 step 5), class vtables and
    // interface trampoline vtables alike.
    let start_index = layout::build_vtable_init_function(&mut builder, &state, &classes, &class_iface_pairs);
    builder.set_start(start_index);

    for item in &program.items {
        if let Item::Function(f) = item {
            if f.is_exported {
                if let Some(&index) = state.function_indices.get(&f.name) {
                    builder.export_function(&f.name, index);
                }
            }
        }
        if let Item::Const(c) = item {
            if c.is_exported {
                log::debug!("exported const `{}` is emitted as an immutable global by expressions::lower_const", c.name);
            }
        }
    }

    builder.finish()
}
