//! Thin `wasm_encoder`-backed module assembly (spec §4 component 5).

pub mod module_builder;

pub use module_builder::ModuleBuilder;
