//! The typed program tree
//!
//! Output of semantic analysis and input to code generation. Every
//! expression node carries its computed type; conversions are explicit
//! cast nodes; statements that allocate locals carry the environment that
//! was in force when they were analyzed.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, CastKind, Expr, ExprKind, IncDecOp, UnaryOp};
pub use stmt::{Decln, Stmt};

use crate::env::Env;
use crate::types::FunctionType;
use std::rc::Rc;

/// A fully analyzed translation unit.
#[derive(Debug, Clone)]
pub struct TranslnUnit {
    pub declns: Vec<ExternDecln>,
}

/// One external definition.
#[derive(Debug, Clone)]
pub enum ExternDecln {
    Func(FuncDef),
    Obj(GlobalDecln),
}

/// A function definition, ready for code generation.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub func_type: Rc<FunctionType>,
    pub env: Env,
    pub body: Stmt,
}

/// A file-scope object declaration.
#[derive(Debug, Clone)]
pub struct GlobalDecln {
    pub name: String,
    pub decln_type: crate::types::ExprType,
    pub initializer: Option<Expr>,
    /// Tentative definitions and externs get `.comm`/no emission.
    pub is_extern: bool,
}
