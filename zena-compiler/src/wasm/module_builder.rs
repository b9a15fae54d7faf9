//! Accumulates WasmGC sections (function types, struct/array types,
//! functions, globals, exports, data segments) and serialises them to a
//! single binary module. Every index this hands back is the `u32` the
//! section it was added to will assign, so callers can wire up
//! `call_ref`/`struct.new`/global references before the module is
//! finished.

use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, ExportKind, ExportSection, Function, FunctionSection,
    GlobalSection, GlobalType, HeapType, Module, NameMap, NameSection, RefType, StartSection,
    StorageType, TypeSection, ValType,
};

use crate::utils::safe_arithmetic::{safe_array_size, safe_field_index};

/// One field of a struct type: `(field type, mutable)`.
pub type StructField = (StorageType, bool);

pub struct ModuleBuilder {
    types: TypeSection,
    functions: FunctionSection,
    code: CodeSection,
    globals: GlobalSection,
    exports: ExportSection,
    data: DataSection,
    names: NameSection,
    function_names: NameMap,
    next_type_index: u32,
    next_function_index: u32,
    next_global_index: u32,
    next_data_index: u32,
    start_function: Option<u32>,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            types: TypeSection::new(),
            functions: FunctionSection::new(),
            code: CodeSection::new(),
            globals: GlobalSection::new(),
            exports: ExportSection::new(),
            data: DataSection::new(),
            names: NameSection::new(),
            function_names: NameMap::new(),
            next_type_index: 0,
            next_function_index: 0,
            next_global_index: 0,
            next_data_index: 0,
            start_function: None,
        }
    }

    /// Adds a `(params) -> results` function type, returning its index.
    pub fn add_function_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let index = self.next_type_index;
        self.types.ty().function(params, results);
        self.next_type_index += 1;
        index
    }

    /// Adds a GC struct type, optionally as a subtype of `supertype`
    /// (used for class/interface-vtable/record/tuple/closure-context
    /// layouts, per spec §4.4's six-step class layout algorithm).
    pub fn add_struct_type(&mut self, fields: Vec<StructField>, supertype: Option<u32>) -> u32 {
        let index = self.next_type_index;
        let encoded_fields: Vec<_> = fields
            .into_iter()
            .map(|(ty, mutable)| wasm_encoder::FieldType {
                element_type: ty,
                mutable,
            })
            .collect();
        match supertype {
            Some(parent) => {
                self.types.ty().subtype(
                    &[parent],
                    false,
                    &wasm_encoder::CompositeType::Struct(wasm_encoder::StructType {
                        fields: encoded_fields.into(),
                    }),
                );
            }
            None => {
                self.types.ty().struct_(encoded_fields);
            }
        }
        self.next_type_index += 1;
        index
    }

    /// Adds a GC array type (backing `FixedArray<T>`/array literals).
    pub fn add_array_type(&mut self, element: StorageType, mutable: bool) -> u32 {
        let index = self.next_type_index;
        self.types.ty().array(&element, mutable);
        self.next_type_index += 1;
        index
    }

    /// Registers a function's signature and body, returning its index.
    pub fn add_function(&mut self, type_index: u32, func: Function, name: Option<&str>) -> u32 {
        let index = self.next_function_index;
        self.functions.function(type_index);
        self.code.function(&func);
        if let Some(name) = name {
            self.function_names.append(index, name);
        }
        self.next_function_index += 1;
        index
    }

    /// Adds an immutable or mutable global (used for class vtables,
    /// interned string caches, and the like).
    pub fn add_global(&mut self, value_type: ValType, mutable: bool, init: &ConstExpr) -> u32 {
        let index = self.next_global_index;
        self.globals.global(
            GlobalType {
                val_type: value_type,
                mutable,
                shared: false,
            },
            init,
        );
        self.next_global_index += 1;
        index
    }

    pub fn export_function(&mut self, name: &str, function_index: u32) {
        self.exports.export(name, ExportKind::Func, function_index);
    }

    pub fn export_global(&mut self, name: &str, global_index: u32) {
        self.exports.export(name, ExportKind::Global, global_index);
    }

    /// Adds a passive or active data segment for a string literal,
    /// returning its index for later `array.new_data`/memory-init use.
    pub fn add_data_segment(&mut self, bytes: Vec<u8>) -> u32 {
        let index = self.next_data_index;
        self.data.passive(bytes);
        self.next_data_index += 1;
        index
    }

    /// Registers `function_index` as the module's start function, run
    /// once at instantiation before any export is reachable. Used to
    /// populate vtable globals with `ref.func` entries to lowered
    /// method bodies once every function index is known, since those
    /// bodies are lowered after the globals they populate are
    /// allocated (see `codegen::layout::build_vtable_global`).
    pub fn set_start(&mut self, function_index: u32) {
        self.start_function = Some(function_index);
    }

    pub fn set_function_name(&mut self, function_index: u32, name: &str) {
        self.function_names.append(function_index, name);
    }

    pub fn struct_ref(heap_type_index: u32, nullable: bool) -> ValType {
        ValType::Ref(RefType {
            nullable,
            heap_type: HeapType::Concrete(heap_type_index),
        })
    }

    pub fn array_ref(heap_type_index: u32, nullable: bool) -> ValType {
        ValType::Ref(RefType {
            nullable,
            heap_type: HeapType::Concrete(heap_type_index),
        })
    }

    pub fn safe_array_len(len: usize) -> u32 {
        safe_array_size(len).unwrap_or(0)
    }

    pub fn safe_field(index: usize) -> u32 {
        safe_field_index(index).unwrap_or(0)
    }

    /// Consumes the builder and serialises the assembled module.
    pub fn finish(mut self) -> Vec<u8> {
        self.names.functions(&self.function_names);

        let mut module = Module::new();
        module.section(&self.types);
        module.section(&self.functions);
        module.section(&self.globals);
        module.section(&self.exports);
        if let Some(start) = self.start_function {
            module.section(&StartSection { function_index: start });
        }
        module.section(&self.code);
        module.section(&self.data);
        module.section(&self.names);
        module.finish()
    }
}
