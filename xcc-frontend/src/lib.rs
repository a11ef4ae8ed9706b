//! xcc compiler frontend
//!
//! This crate turns C source text into a typed program tree:
//! - Lexer: tokenizes the source
//! - Parser: builds the untyped syntax tree
//! - Semantic analysis: resolves types and environments, producing the
//!   typed tree that code generation consumes

pub mod ast;
pub mod cast;
pub mod env;
pub mod lexer;
pub mod parser;
pub mod semant;
pub mod typed;
pub mod types;

pub use cast::make_cast;
pub use env::{Entry, EntryKind, Env};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{parse, Parser};
pub use semant::analyze;
pub use typed::{ExternDecln, FuncDef, GlobalDecln, TranslnUnit};
pub use types::{ExprType, FunctionType, StructOrUnionLayout, TypeKind};

use xcc_common::CompilerResult;

/// High-level frontend interface.
pub struct Frontend;

impl Frontend {
    /// Tokenize source text (for debugging and the `tokens` subcommand).
    pub fn tokenize_source(filename: &str, source: &str) -> CompilerResult<Vec<Token>> {
        Lexer::new(filename, source).tokenize()
    }

    /// Parse source text into the untyped syntax tree.
    pub fn parse_source(filename: &str, source: &str) -> CompilerResult<ast::TranslationUnit> {
        parse(filename, source)
    }

    /// Parse and analyze source text into the typed program tree.
    pub fn analyze_source(filename: &str, source: &str) -> CompilerResult<TranslnUnit> {
        let ast = Self::parse_source(filename, source)?;
        analyze(&ast)
    }
}
