//! Typed statements
//!
//! Compound statements keep, per declaration and per statement, the
//! environment that was current when the item was analyzed; code
//! generation reads local offsets and frame sizes straight from those
//! snapshots.

use crate::env::Env;
use crate::typed::expr::Expr;
use crate::types::ExprType;

/// A local declaration inside a function body.
#[derive(Debug, Clone)]
pub struct Decln {
    pub name: String,
    pub decln_type: ExprType,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `{ declns... stmts... }` with per-item environment snapshots.
    Compound {
        declns: Vec<(Env, Decln)>,
        stmts: Vec<(Env, Stmt)>,
    },

    /// An expression statement; `None` for the empty statement `;`.
    Expr(Option<Expr>),

    If {
        cond: Expr,
        then: Box<Stmt>,
    },

    IfElse {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Box<Stmt>,
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
        value: i32,
        stmt: Box<Stmt>,
    },

    Default(Box<Stmt>),

    /// Carries the environment so the return path can restore the stack
    /// and find the enclosing function's return type.
    Return {
        env: Env,
        expr: Option<Expr>,
    },

    Break,
    Continue,

    Goto(String),

    Labeled {
        label: String,
        stmt: Box<Stmt>,
    },
}

impl Stmt {
    /// Collect the labels defined by `label:` statements in this subtree.
    /// Used at function entry to pre-allocate goto targets.
    pub fn collect_labels(&self, labels: &mut Vec<String>) {
        match self {
            Stmt::Labeled { label, stmt } => {
                labels.push(label.clone());
                stmt.collect_labels(labels);
            }
            Stmt::Compound { stmts, .. } => {
                for (_, stmt) in stmts {
                    stmt.collect_labels(labels);
                }
            }
            Stmt::If { then, .. } => then.collect_labels(labels),
            Stmt::IfElse {
                then, otherwise, ..
            } => {
                then.collect_labels(labels);
                otherwise.collect_labels(labels);
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::For { body, .. }
            | Stmt::Switch { body, .. } => body.collect_labels(labels),
            Stmt::Case { stmt, .. } | Stmt::Default(stmt) => stmt.collect_labels(labels),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_labels() {
        let inner = Stmt::Labeled {
            label: "done".to_string(),
            stmt: Box::new(Stmt::Expr(None)),
        };
        let body = Stmt::Compound {
            declns: vec![],
            stmts: vec![
                (Env::new(), Stmt::Goto("done".to_string())),
                (
                    Env::new(),
                    Stmt::While {
                        cond: Expr::const_long(1),
                        body: Box::new(inner),
                    },
                ),
            ],
        };
        let mut labels = Vec::new();
        body.collect_labels(&mut labels);
        assert_eq!(labels, vec!["done".to_string()]);
    }
}
