//! Tagged-variant semantic type model.
//!
//! Nominal kinds (`Class`, `Interface`, `Mixin`, `TypeAlias`) are
//! `Rc`-shared so that `Rc::ptr_eq` is a meaningful identity check — the
//! generic-instantiation interning cache in [`intern`] relies on it.
//! Value kinds (`Array`, `Tuple`, `Record`, `Union`, `Function`) compare
//! structurally instead.

pub mod intern;
pub mod print;

use std::cell::RefCell;
use std::rc::Rc;

pub use print::print_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumberKind {
    pub fn name(self) -> &'static str {
        match self {
            NumberKind::I8 => "i8",
            NumberKind::I16 => "i16",
            NumberKind::I32 => "i32",
            NumberKind::I64 => "i64",
            NumberKind::U8 => "u8",
            NumberKind::U16 => "u16",
            NumberKind::U32 => "u32",
            NumberKind::U64 => "u64",
            NumberKind::F32 => "f32",
            NumberKind::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => NumberKind::I8,
            "i16" => NumberKind::I16,
            "i32" => NumberKind::I32,
            "i64" => NumberKind::I64,
            "u8" => NumberKind::U8,
            "u16" => NumberKind::U16,
            "u32" => NumberKind::U32,
            "u64" => NumberKind::U64,
            "f32" => NumberKind::F32,
            "f64" => NumberKind::F64,
            _ => return None,
        })
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumberKind::F32 | NumberKind::F64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    /// f64 bit pattern so `Type` can derive structural equality.
    Float(u64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone)]
pub enum Type {
    Number(NumberKind),
    Boolean,
    Void,
    Null,
    Never,
    Any,
    AnyRef,
    Unknown,
    ByteArray,
    Literal(LiteralValue),
    TypeParameter(Rc<TypeParameterData>),
    TypeAlias(Rc<TypeAliasData>),
    Array(Rc<Type>),
    Tuple(Vec<Type>),
    /// Only valid in function return position; lowers to WasmGC
    /// multi-value results instead of a heap-allocated struct.
    UnboxedTuple(Vec<Type>),
    Record(Vec<(String, Type)>),
    Union(Vec<Type>),
    Function(Rc<FunctionType>),
    Class(Rc<ClassType>),
    Interface(Rc<InterfaceType>),
    Mixin(Rc<MixinType>),
    /// Unresolved `this`, before the enclosing declaration is known.
    This,
}

#[derive(Debug)]
pub struct TypeParameterData {
    pub name: String,
    pub constraint: Option<Type>,
    pub default: Option<Type>,
}

#[derive(Debug)]
pub struct TypeAliasData {
    pub name: String,
    pub type_parameters: Vec<Rc<TypeParameterData>>,
    pub is_distinct: bool,
    pub target: RefCell<Type>,
    pub type_arguments: Option<Vec<Type>>,
    pub generic_source: RefCell<Option<Rc<TypeAliasData>>>,
}

#[derive(Debug)]
pub struct FunctionType {
    pub type_parameters: Vec<Rc<TypeParameterData>>,
    pub type_arguments: Option<Vec<Type>>,
    pub parameters: Vec<Type>,
    pub return_type: Type,
    pub is_final: bool,
    pub is_abstract: bool,
    pub generic_source: Option<Rc<FunctionType>>,
}

#[derive(Debug)]
pub struct ClassType {
    pub name: String,
    pub type_parameters: Vec<Rc<TypeParameterData>>,
    pub type_arguments: Option<Vec<Type>>,
    pub super_type: RefCell<Option<Type>>,
    pub implements: RefCell<Vec<Type>>,
    pub fields: RefCell<Vec<(String, Type, FieldAttrs)>>,
    pub methods: RefCell<Vec<(String, Rc<FunctionType>)>>,
    pub constructor_type: RefCell<Option<Rc<FunctionType>>>,
    /// Inherited-then-declared method/accessor name order (spec §3.2).
    pub vtable: RefCell<Vec<String>>,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_extension: bool,
    pub on_type: RefCell<Option<Type>>,
    pub generic_source: RefCell<Option<Rc<ClassType>>>,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldAttrs {
    pub is_mutable: bool,
    pub is_private: bool,
}

#[derive(Debug)]
pub struct InterfaceType {
    pub name: String,
    pub type_parameters: Vec<Rc<TypeParameterData>>,
    pub type_arguments: Option<Vec<Type>>,
    pub fields: RefCell<Vec<(String, Type)>>,
    pub methods: RefCell<Vec<(String, Rc<FunctionType>)>>,
    pub extends: RefCell<Vec<Type>>,
    pub generic_source: RefCell<Option<Rc<InterfaceType>>>,
}

#[derive(Debug)]
pub struct MixinType {
    pub name: String,
    pub type_parameters: Vec<Rc<TypeParameterData>>,
    pub type_arguments: Option<Vec<Type>>,
    pub on_type: RefCell<Option<Type>>,
    pub fields: RefCell<Vec<(String, Type, FieldAttrs)>>,
    pub methods: RefCell<Vec<(String, Rc<FunctionType>)>>,
    /// Propagated per SPEC_FULL §4.11: empty by default, unioned into the
    /// linearised `Parent_Mixin` intermediate class's own `implements`.
    pub implements: RefCell<Vec<Type>>,
    pub generic_source: RefCell<Option<Rc<MixinType>>>,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        use Type::*;
        match (self, other) {
            (Number(a), Number(b)) => a == b,
            (Boolean, Boolean)
            | (Void, Void)
            | (Null, Null)
            | (Never, Never)
            | (Any, Any)
            | (AnyRef, AnyRef)
            | (Unknown, Unknown)
            | (ByteArray, ByteArray)
            | (This, This) => true,
            (Literal(a), Literal(b)) => a == b,
            (TypeParameter(a), TypeParameter(b)) => Rc::ptr_eq(a, b),
            (TypeAlias(a), TypeAlias(b)) => Rc::ptr_eq(a, b),
            (Array(a), Array(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (UnboxedTuple(a), UnboxedTuple(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (Union(a), Union(b)) => a == b,
            (Function(a), Function(b)) => Rc::ptr_eq(a, b) || function_types_equal(a, b),
            (Class(a), Class(b)) => Rc::ptr_eq(a, b),
            (Interface(a), Interface(b)) => Rc::ptr_eq(a, b),
            (Mixin(a), Mixin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn function_types_equal(a: &FunctionType, b: &FunctionType) -> bool {
    a.parameters == b.parameters && a.return_type == b.return_type
}

/// Widens a literal type to its base (spec §3.1's "widens to base via
/// an explicit rule"); a no-op on every other kind. Shared by `var`/
/// unannotated `let` bindings (checker) and value-representation
/// lowering (codegen), which both need "what's the real runtime type
/// behind this literal" rather than the literal's own singleton value.
pub fn widen_literal(ty: &Type) -> Type {
    match ty {
        Type::Literal(LiteralValue::Int(_)) => Type::Number(NumberKind::I32),
        Type::Literal(LiteralValue::Float(_)) => Type::Number(NumberKind::F64),
        Type::Literal(LiteralValue::Bool(_)) => Type::Boolean,
        Type::Literal(LiteralValue::Str(_)) => Type::AnyRef,
        other => other.clone(),
    }
}

impl Type {
    pub fn is_reference(&self) -> bool {
        !matches!(
            self,
            Type::Number(_) | Type::Boolean | Type::Void | Type::Never
        )
    }

    pub fn name(&self) -> String {
        match self {
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
            Type::TypeAlias(a) => a.name.clone(),
            Type::TypeParameter(p) => p.name.clone(),
            Type::Class(c) => c.name.clone(),
            Type::Interface(i) => i.name.clone(),
            Type::Mixin(m) => m.name.clone(),
            _ => print::print_type(self),
        }
    }
}
