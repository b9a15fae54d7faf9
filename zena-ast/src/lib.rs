//! Abstract syntax tree for the Zena language.
//!
//! Produced by `zena-parser`, consumed by the checker and codegen in
//! `zena-compiler`. Nodes that the checker or codegen need to attach
//! derived information to (a resolved semantic type, a source span)
//! carry a [`NodeId`] rather than the information itself, so that
//! side tables can be queried by identity without mutating the tree.

use serde::{Deserialize, Serialize};

mod node_id;
pub use node_id::{NodeId, NodeIdGen};

/// Root of a single compiled module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub imports: Vec<Import>,
    pub items: Vec<Item>,
}

/// `import { io, log } from "std";` or `import "zena:iterator";`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub items: Vec<String>,
    pub module: String,
    pub alias: Option<String>,
    pub span: NodeId,
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Class(Class),
    Interface(Interface),
    Mixin(Mixin),
    TypeAlias(TypeAliasDecl),
    Enum(EnumDecl),
    Function(Function),
    Const(ConstDecl),
}

/// Generic type parameter with an optional bound and default:
/// `T`, `T: Comparable<T>`, `T = i32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<TypeExpr>,
    pub default: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub is_mutable: bool,
    pub is_private: bool,
    pub span: NodeId,
}

/// `class Name<T> extends Super with M1, M2 implements I1, I2 { ... }`,
/// or an extension class `class Name on OnType implements I1 { ... }`
/// giving method syntax and interface conformance to a pre-existing
/// underlying type (`on_type`), with no fields of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<TypeExpr>,
    pub mixins: Vec<TypeExpr>,
    pub implements: Vec<TypeExpr>,
    pub on_type: Option<TypeExpr>,
    pub is_final: bool,
    pub is_abstract: bool,
    pub fields: Vec<FieldDecl>,
    pub constructor: Option<Constructor>,
    pub methods: Vec<Method>,
    pub is_exported: bool,
    pub span: NodeId,
}

/// `#new(params) { body }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Block,
    pub span: NodeId,
}

/// A method on a class, interface or mixin. `body` is `None` for
/// interface method signatures and for abstract methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Option<Block>,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_override: bool,
    pub span: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expression>,
    pub span: NodeId,
}

/// Top-level function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub is_exported: bool,
    pub span: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<TypeExpr>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<Method>,
    pub is_exported: bool,
    pub span: NodeId,
}

/// `mixin Name on OnType implements I1 { ... }`
///
/// The grammar happily accepts a constructor here; the checker is what
/// rejects it (`ConstructorInMixin`), so that source with a stray
/// constructor gets a semantic diagnostic rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixin {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub on_type: TypeExpr,
    pub implements: Vec<TypeExpr>,
    pub fields: Vec<FieldDecl>,
    pub constructor: Option<Constructor>,
    pub methods: Vec<Method>,
    pub span: NodeId,
}

/// `type Name<T> = Type;` or `type Name = distinct Type;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub is_distinct: bool,
    pub target: TypeExpr,
    pub is_exported: bool,
    pub span: NodeId,
}

/// `enum Name<T> { Variant1, Variant2(T) }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub variants: Vec<EnumVariant>,
    pub is_exported: bool,
    pub span: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expression,
    pub is_exported: bool,
    pub span: NodeId,
}

/// A type annotation as written in source. The checker's type resolver
/// resolves this to a semantic `zena_compiler::types::Type` and records
/// the result in a side table keyed by `id`, rather than overwriting
/// the annotation in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExprKind {
    Named(String),
    Generic { name: String, args: Vec<TypeExpr> },
    Array(Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    UnboxedTuple(Vec<TypeExpr>),
    Record(Vec<(String, TypeExpr)>),
    Union(Vec<TypeExpr>),
    Function {
        params: Vec<TypeExpr>,
        return_type: Box<TypeExpr>,
    },
    Literal(LiteralValue),
    This,
    Distinct(Box<TypeExpr>),
}

/// Literal constant shared by expressions and literal-type annotations
/// (`Literal(value)` in the type kind table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    /// f64 bit pattern, so the type carrying this can derive `Eq`/`Hash`.
    Float(u64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Let {
        is_mutable: bool,
        name: String,
        ty: Option<TypeExpr>,
        value: Expression,
        span: NodeId,
    },
    Assign {
        target: Expression,
        value: Expression,
        span: NodeId,
    },
    Return(Option<Expression>, NodeId),
    Break(NodeId),
    Continue(NodeId),
    If {
        condition: Expression,
        then_block: Block,
        elif_branches: Vec<(Expression, Block)>,
        else_block: Option<Block>,
        span: NodeId,
    },
    While {
        condition: Expression,
        body: Block,
        span: NodeId,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        post: Option<Box<Statement>>,
        body: Block,
        span: NodeId,
    },
    ForIn {
        binding: String,
        iterable: Expression,
        body: Block,
        span: NodeId,
    },
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    IntLiteral(i64, NodeId),
    FloatLiteral(f64, NodeId),
    StringLiteral(String, NodeId),
    BoolLiteral(bool, NodeId),
    NullLiteral(NodeId),
    Ident(String, NodeId),
    This(NodeId),
    Super(NodeId),
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
        span: NodeId,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
        span: NodeId,
    },
    Call {
        callee: Box<Expression>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expression>,
        span: NodeId,
    },
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        type_args: Vec<TypeExpr>,
        args: Vec<Expression>,
        span: NodeId,
    },
    FieldAccess {
        object: Box<Expression>,
        field: String,
        span: NodeId,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        span: NodeId,
    },
    ArrayLiteral(Vec<Expression>, NodeId),
    TupleLiteral(Vec<Expression>, NodeId),
    RecordLiteral(Vec<(String, Expression)>, NodeId),
    StructLiteral {
        class_name: String,
        type_args: Vec<TypeExpr>,
        fields: Vec<(String, Expression)>,
        span: NodeId,
    },
    New {
        class_name: String,
        type_args: Vec<TypeExpr>,
        args: Vec<Expression>,
        span: NodeId,
    },
    Cast {
        expr: Box<Expression>,
        target: TypeExpr,
        span: NodeId,
    },
    Match {
        scrutinee: Box<Expression>,
        arms: Vec<MatchArm>,
        span: NodeId,
    },
    Block {
        statements: Vec<Statement>,
        trailing: Option<Box<Expression>>,
        span: NodeId,
    },
    Closure {
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        body: Box<ClosureBody>,
        span: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClosureBody {
    Expr(Expression),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expression>,
    pub body: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard,
    Literal(LiteralValue),
    Ident(String),
    Tuple(Vec<Pattern>),
    Struct {
        name: String,
        fields: Vec<(String, Pattern)>,
    },
    EnumVariant {
        enum_name: Option<String>,
        variant: String,
        fields: Vec<Pattern>,
    },
    Or(Vec<Pattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    RefEq,
    RefNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl Program {
    pub fn new() -> Self {
        Self {
            imports: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Expression {
    /// The id every variant carries, used to look up a span or an
    /// inferred type in a side table.
    pub fn id(&self) -> NodeId {
        match self {
            Expression::IntLiteral(_, id)
            | Expression::FloatLiteral(_, id)
            | Expression::StringLiteral(_, id)
            | Expression::BoolLiteral(_, id)
            | Expression::NullLiteral(id)
            | Expression::Ident(_, id)
            | Expression::This(id)
            | Expression::Super(id)
            | Expression::Binary { span: id, .. }
            | Expression::Unary { span: id, .. }
            | Expression::Call { span: id, .. }
            | Expression::MethodCall { span: id, .. }
            | Expression::FieldAccess { span: id, .. }
            | Expression::Index { span: id, .. }
            | Expression::ArrayLiteral(_, id)
            | Expression::TupleLiteral(_, id)
            | Expression::RecordLiteral(_, id)
            | Expression::StructLiteral { span: id, .. }
            | Expression::New { span: id, .. }
            | Expression::Cast { span: id, .. }
            | Expression::Match { span: id, .. }
            | Expression::Block { span: id, .. }
            | Expression::Closure { span: id, .. } => *id,
        }
    }
}

impl TypeExprKind {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExprKind::Named(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_roundtrip() {
        let mut gen = NodeIdGen::new();
        let program = Program {
            imports: vec![Import {
                items: vec!["io".to_string()],
                module: "std".to_string(),
                alias: None,
                span: gen.next(),
            }],
            items: vec![],
        };

        let json = serde_json::to_string(&program).unwrap();
        let deserialized: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(program, deserialized);
    }

    #[test]
    fn test_expression_id_matches_constructor() {
        let mut gen = NodeIdGen::new();
        let id = gen.next();
        let expr = Expression::IntLiteral(42, id);
        assert_eq!(expr.id(), id);
    }

    #[test]
    fn test_type_expr_kind_constructors() {
        let mut gen = NodeIdGen::new();
        let t = TypeExpr {
            id: gen.next(),
            kind: TypeExprKind::named("String"),
        };
        assert_eq!(t.kind, TypeExprKind::Named("String".to_string()));
    }
}
