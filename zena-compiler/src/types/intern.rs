//! Generic-instantiation interning cache.
//!
//! `dashmap` backs the cache so a single [`TypeInterner`] can be shared
//! behind an `Rc`/`&` without needing `RefCell<HashMap<..>>` at every call
//! site. Keys are the generic source's `Rc` address plus the canonical
//! (printed) form of the type arguments — two instantiations with the same
//! source and textually identical arguments must be the same object
//! (spec property: interning identity).

use std::rc::Rc;

use dashmap::DashMap;

use super::{print_type, ClassType, InterfaceType, MixinType, Type, TypeAliasData};

fn canonical_key(args: &[Type]) -> String {
    args.iter().map(print_type).collect::<Vec<_>>().join(",")
}

#[derive(Default)]
pub struct TypeInterner {
    classes: DashMap<(usize, String), Rc<ClassType>>,
    interfaces: DashMap<(usize, String), Rc<InterfaceType>>,
    mixins: DashMap<(usize, String), Rc<MixinType>>,
    aliases: DashMap<(usize, String), Rc<TypeAliasData>>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cached instantiation, or inserts `placeholder` and
    /// returns it. The placeholder must be inserted *before* its fields
    /// are filled in by the caller, so that self-referential generics
    /// (`Node<T> { next: Node<T> }`) terminate instead of recursing
    /// forever while substituting the field types.
    pub fn get_or_insert_class(
        &self,
        source: &Rc<ClassType>,
        args: &[Type],
        placeholder: impl FnOnce() -> Rc<ClassType>,
    ) -> Rc<ClassType> {
        let key = (Rc::as_ptr(source) as usize, canonical_key(args));
        if let Some(existing) = self.classes.get(&key) {
            return existing.clone();
        }
        let instance = placeholder();
        self.classes.insert(key, instance.clone());
        instance
    }

    pub fn get_or_insert_interface(
        &self,
        source: &Rc<InterfaceType>,
        args: &[Type],
        placeholder: impl FnOnce() -> Rc<InterfaceType>,
    ) -> Rc<InterfaceType> {
        let key = (Rc::as_ptr(source) as usize, canonical_key(args));
        if let Some(existing) = self.interfaces.get(&key) {
            return existing.clone();
        }
        let instance = placeholder();
        self.interfaces.insert(key, instance.clone());
        instance
    }

    pub fn get_or_insert_mixin(
        &self,
        source: &Rc<MixinType>,
        args: &[Type],
        placeholder: impl FnOnce() -> Rc<MixinType>,
    ) -> Rc<MixinType> {
        let key = (Rc::as_ptr(source) as usize, canonical_key(args));
        if let Some(existing) = self.mixins.get(&key) {
            return existing.clone();
        }
        let instance = placeholder();
        self.mixins.insert(key, instance.clone());
        instance
    }

    pub fn get_or_insert_alias(
        &self,
        source: &Rc<TypeAliasData>,
        args: &[Type],
        placeholder: impl FnOnce() -> Rc<TypeAliasData>,
    ) -> Rc<TypeAliasData> {
        let key = (Rc::as_ptr(source) as usize, canonical_key(args));
        if let Some(existing) = self.aliases.get(&key) {
            return existing.clone();
        }
        let instance = placeholder();
        self.aliases.insert(key, instance.clone());
        instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassType, FieldAttrs};
    use std::cell::RefCell;

    fn empty_class(name: &str) -> Rc<ClassType> {
        Rc::new(ClassType {
            name: name.to_string(),
            type_parameters: vec![],
            type_arguments: None,
            super_type: RefCell::new(None),
            implements: RefCell::new(vec![]),
            fields: RefCell::new(vec![]),
            methods: RefCell::new(vec![]),
            constructor_type: RefCell::new(None),
            vtable: RefCell::new(vec![]),
            is_final: false,
            is_abstract: false,
            is_extension: false,
            on_type: RefCell::new(None),
            generic_source: RefCell::new(None),
        })
    }

    #[test]
    fn same_source_and_args_returns_same_object() {
        let interner = TypeInterner::new();
        let source = empty_class("Box");
        let args = vec![Type::Number(super::super::NumberKind::I32)];

        let first = interner.get_or_insert_class(&source, &args, || empty_class("Box<i32>"));
        let second = interner.get_or_insert_class(&source, &args, || empty_class("Box<i32>-dup"));

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.name, "Box<i32>");
    }

    #[test]
    fn distinct_arguments_produce_distinct_objects() {
        let interner = TypeInterner::new();
        let source = empty_class("Box");
        let i32_args = vec![Type::Number(super::super::NumberKind::I32)];
        let bool_args = vec![Type::Boolean];

        let a = interner.get_or_insert_class(&source, &i32_args, || empty_class("Box<i32>"));
        let b = interner.get_or_insert_class(&source, &bool_args, || empty_class("Box<boolean>"));

        assert!(!Rc::ptr_eq(&a, &b));
        let _unused = FieldAttrs {
            is_mutable: false,
            is_private: false,
        };
    }
}
