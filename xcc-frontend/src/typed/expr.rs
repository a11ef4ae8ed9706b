//! Typed expressions
//!
//! Every node carries the type it evaluates to. Implicit conversions have
//! already been made explicit as `Cast` nodes, and usual arithmetic
//! conversions have been applied, so code generation never has to think
//! about types again.

use crate::env::Env;
use crate::types::ExprType;

/// A typed expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub expr_type: ExprType,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    ConstLong(i32),
    ConstULong(u32),
    /// A pointer-valued constant (e.g. a cast integer literal).
    ConstPtr(u32),
    ConstFloat(f32),
    ConstDouble(f64),
    ConstString(String),

    /// A name; resolved against `env` at code generation time.
    Variable { name: String, env: Env },

    Assign {
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    FuncCall {
        func: Box<Expr>,
        args: Vec<Expr>,
    },

    /// Member access on a struct or union value.
    Attribute {
        expr: Box<Expr>,
        member: String,
    },

    /// `&expr`
    Reference(Box<Expr>),
    /// `*expr`
    Dereference(Box<Expr>),

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
        cast: CastKind,
        expr: Box<Expr>,
    },
}

/// Binary operators surviving into the typed tree. Compound assignments
/// and array subscripts have been desugared away by this point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Negative,
    BitwiseNot,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

/// The closed set of machine-level conversions. `Nop` covers every
/// reinterpretation that needs no code (pointer casts, same-width
/// sign changes, int/uint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Nop,
    Int8ToInt16,
    Int8ToInt32,
    Int16ToInt32,
    Int32ToFloat,
    Int32ToDouble,
    PreserveInt8,
    PreserveInt16,
    UInt8ToUInt16,
    UInt8ToUInt32,
    UInt16ToUInt32,
    FloatToInt32,
    FloatToDouble,
    DoubleToInt32,
    DoubleToFloat,
}

impl Expr {
    pub fn new(kind: ExprKind, expr_type: ExprType) -> Self {
        Self { kind, expr_type }
    }

    pub fn const_long(value: i32) -> Self {
        Self::new(ExprKind::ConstLong(value), ExprType::long())
    }

    pub fn const_ulong(value: u32) -> Self {
        Self::new(ExprKind::ConstULong(value), ExprType::ulong())
    }

    pub fn const_float(value: f32) -> Self {
        Self::new(ExprKind::ConstFloat(value), ExprType::float())
    }

    pub fn const_double(value: f64) -> Self {
        Self::new(ExprKind::ConstDouble(value), ExprType::double())
    }

    /// Is this node a compile-time constant?
    pub fn is_const(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::ConstLong(_)
                | ExprKind::ConstULong(_)
                | ExprKind::ConstPtr(_)
                | ExprKind::ConstFloat(_)
                | ExprKind::ConstDouble(_)
                | ExprKind::ConstString(_)
        )
    }

    /// Can this node be assigned to or have its address taken?
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Variable { .. } | ExprKind::Dereference(_) => true,
            ExprKind::Attribute { expr, .. } => expr.is_lvalue(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_predicates() {
        assert!(Expr::const_long(3).is_const());
        let var = Expr::new(
            ExprKind::Variable {
                name: "x".to_string(),
                env: Env::new(),
            },
            ExprType::long(),
        );
        assert!(!var.is_const());
        assert!(var.is_lvalue());
        assert!(!Expr::const_long(3).is_lvalue());
    }

    #[test]
    fn test_attribute_lvalue_follows_base() {
        let var = Expr::new(
            ExprKind::Variable {
                name: "s".to_string(),
                env: Env::new(),
            },
            ExprType::long(),
        );
        let attr = Expr::new(
            ExprKind::Attribute {
                expr: Box::new(var),
                member: "field".to_string(),
            },
            ExprType::long(),
        );
        assert!(attr.is_lvalue());
    }
}
