//! Untyped syntax tree
//!
//! Direct output of the parser, before any name resolution or typing.
//! Serializable so the driver can dump it for inspection.

use serde::{Deserialize, Serialize};

/// A whole source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub externs: Vec<ExternDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExternDecl {
    FuncDef(FuncDef),
    Decl(Declaration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDef {
    pub specs: DeclnSpecs,
    pub declarator: Declarator,
    pub body: Stmt,
}

/// `specs declarator [= init] (, declarator [= init])* ;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub specs: DeclnSpecs,
    pub declarators: Vec<InitDeclarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitDeclarator {
    pub declarator: Declarator,
    pub initializer: Option<Expr>,
}

/// Storage class, type specifiers, and qualifiers, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeclnSpecs {
    pub storage: Option<StorageClass>,
    pub type_specs: Vec<TypeSpec>,
    pub is_const: bool,
    pub is_volatile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    Typedef,
    Extern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpec {
    Void,
    Char,
    Short,
    Int,
    Long,
    Signed,
    Unsigned,
    Float,
    Double,
    Struct(StructSpec),
    Union(StructSpec),
    Enum(EnumSpec),
    TypedefName(String),
}

/// `struct tag`, `struct tag { ... }`, or `struct { ... }`.
/// `members` is `None` for a reference by tag alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructSpec {
    pub tag: Option<String>,
    pub members: Option<Vec<StructMemberDecl>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMemberDecl {
    pub specs: DeclnSpecs,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSpec {
    pub tag: Option<String>,
    pub enumerators: Option<Vec<Enumerator>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    pub value: Option<Expr>,
}

/// A declarator: an optional name plus the type modifiers wrapped around
/// it, innermost first. `int *a[3]` gives name `a`, modifiers
/// `[Array(3), Pointer]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Declarator {
    pub name: Option<String>,
    pub modifiers: Vec<TypeModifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeModifier {
    Pointer { is_const: bool, is_volatile: bool },
    Array(Option<Box<Expr>>),
    Function { params: Vec<ParamDecl>, is_varargs: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub specs: DeclnSpecs,
    pub declarator: Declarator,
}

/// A type name as written in a cast or sizeof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeName {
    pub specs: DeclnSpecs,
    pub declarator: Declarator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntConst(i64),
    UIntConst(u32),
    FloatConst(f32),
    DoubleConst(f64),
    CharConst(u8),
    StringLiteral(String),
    Variable(String),

    Assign {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a op= b`; lowered to `a = a op b` during analysis.
    AssignOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IncDec {
        op: IncDecOp,
        expr: Box<Expr>,
    },
    Cast {
        type_name: Box<TypeName>,
        expr: Box<Expr>,
    },
    FuncCall {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `expr.name`
    Member {
        expr: Box<Expr>,
        name: String,
    },
    /// `expr->name`; lowered to `(*expr).name` during analysis.
    Arrow {
        expr: Box<Expr>,
        name: String,
    },
    /// `base[index]`; lowered to `*(base + index)` during analysis.
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Reference(Box<Expr>),
    Dereference(Box<Expr>),
    SizeofExpr(Box<Expr>),
    SizeofType(Box<TypeName>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    LShift,
    RShift,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    BitwiseAnd,
    Xor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Positive,
    Negative,
    BitwiseNot,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Compound(Vec<BlockItem>),
    Expr(Option<Expr>),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Expr>,
        cond: Option<Expr>,
        loop_expr: Option<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        expr: Expr,
        body: Box<Stmt>,
    },
    Case {
        value: Expr,
        stmt: Box<Stmt>,
    },
    Default(Box<Stmt>),
    Return(Option<Expr>),
    Break,
    Continue,
    Goto(String),
    Labeled {
        label: String,
        stmt: Box<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockItem {
    Decl(Declaration),
    Stmt(Stmt),
}
