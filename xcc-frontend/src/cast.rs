//! Explicit conversion construction
//!
//! `make_cast` turns "this expression, viewed as that type" into a typed
//! tree: either the expression unchanged, a folded constant, or a chain of
//! machine-level `Cast` nodes. Multi-step conversions (char to float,
//! double to short) are built as chains of single-step casts so code
//! generation stays a flat match on `CastKind`.

use crate::typed::{CastKind, Expr, ExprKind};
use crate::types::{ExprType, TypeKind};
use xcc_common::{CompilerError, CompilerResult};

fn cast(kind: CastKind, expr: Expr, to: ExprType) -> Expr {
    Expr::new(
        ExprKind::Cast {
            cast: kind,
            expr: Box::new(expr),
        },
        to,
    )
}

/// Cast `expr` to `to`, folding constants and chaining single-step
/// conversions. Fails for casts C does not allow (struct to scalar,
/// scalar to struct, anything out of the arithmetic/pointer lattice).
pub fn make_cast(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    if expr.expr_type.equal_type(to) {
        return Ok(expr);
    }
    if expr.expr_type.is_pointer() {
        return from_pointer(expr, to);
    }
    if to.is_pointer() {
        return to_pointer(expr, to);
    }
    if to.is_void() {
        return Ok(cast(CastKind::Nop, expr, to.clone()));
    }
    match expr.expr_type.kind {
        TypeKind::Char | TypeKind::Short | TypeKind::Long => signed_integral_to_arith(expr, to),
        TypeKind::UChar | TypeKind::UShort | TypeKind::ULong => {
            unsigned_integral_to_arith(expr, to)
        }
        TypeKind::Float | TypeKind::Double => float_to_arith(expr, to),
        _ => Err(CompilerError::type_error(format!(
            "cannot cast from '{}' to '{}'",
            expr.expr_type, to
        ))),
    }
}

fn invalid(expr: &Expr, to: &ExprType) -> CompilerError {
    CompilerError::type_error(format!(
        "cannot cast from '{}' to '{}'",
        expr.expr_type, to
    ))
}

/// Conversions out of `char`, `short`, `long`. Only `long` sources fold;
/// narrower sources widen to `long` first when the target is not integral.
fn signed_integral_to_arith(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    match (&expr.expr_type.kind, &to.kind) {
        (TypeKind::Char, TypeKind::UChar) => Ok(cast(CastKind::Nop, expr, to.clone())),
        (TypeKind::Char, TypeKind::Short) | (TypeKind::Char, TypeKind::UShort) => {
            Ok(cast(CastKind::Int8ToInt16, expr, to.clone()))
        }
        (TypeKind::Char, TypeKind::Long) | (TypeKind::Char, TypeKind::ULong) => {
            Ok(cast(CastKind::Int8ToInt32, expr, to.clone()))
        }
        (TypeKind::Char, TypeKind::Float) | (TypeKind::Char, TypeKind::Double) => {
            make_cast(cast(CastKind::Int8ToInt32, expr, ExprType::long()), to)
        }

        (TypeKind::Short, TypeKind::Char) | (TypeKind::Short, TypeKind::UChar) => {
            Ok(cast(CastKind::PreserveInt8, expr, to.clone()))
        }
        (TypeKind::Short, TypeKind::UShort) => Ok(cast(CastKind::Nop, expr, to.clone())),
        (TypeKind::Short, TypeKind::Long) | (TypeKind::Short, TypeKind::ULong) => {
            Ok(cast(CastKind::Int16ToInt32, expr, to.clone()))
        }
        (TypeKind::Short, TypeKind::Float) | (TypeKind::Short, TypeKind::Double) => {
            make_cast(cast(CastKind::Int16ToInt32, expr, ExprType::long()), to)
        }

        (TypeKind::Long, _) => long_to_arith(expr, to),

        _ => Err(invalid(&expr, to)),
    }
}

fn long_to_arith(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    let value = match expr.kind {
        ExprKind::ConstLong(v) => Some(v),
        _ => None,
    };
    match (&to.kind, value) {
        (TypeKind::Char, Some(v)) => Ok(Expr::new(ExprKind::ConstLong(v as i8 as i32), to.clone())),
        (TypeKind::Char, None) => Ok(cast(CastKind::PreserveInt8, expr, to.clone())),
        (TypeKind::UChar, Some(v)) => Ok(Expr::new(ExprKind::ConstLong(v as u8 as i32), to.clone())),
        (TypeKind::UChar, None) => Ok(cast(CastKind::PreserveInt8, expr, to.clone())),
        (TypeKind::Short, Some(v)) => {
            Ok(Expr::new(ExprKind::ConstLong(v as i16 as i32), to.clone()))
        }
        (TypeKind::Short, None) => Ok(cast(CastKind::PreserveInt16, expr, to.clone())),
        (TypeKind::UShort, Some(v)) => {
            Ok(Expr::new(ExprKind::ConstLong(v as u16 as i32), to.clone()))
        }
        (TypeKind::UShort, None) => Ok(cast(CastKind::PreserveInt16, expr, to.clone())),
        (TypeKind::ULong, Some(v)) => Ok(Expr::new(ExprKind::ConstULong(v as u32), to.clone())),
        (TypeKind::ULong, None) => Ok(cast(CastKind::Nop, expr, to.clone())),
        (TypeKind::Float, Some(v)) => Ok(Expr::new(ExprKind::ConstFloat(v as f32), to.clone())),
        (TypeKind::Float, None) => Ok(cast(CastKind::Int32ToFloat, expr, to.clone())),
        (TypeKind::Double, Some(v)) => Ok(Expr::new(ExprKind::ConstDouble(v as f64), to.clone())),
        (TypeKind::Double, None) => Ok(cast(CastKind::Int32ToDouble, expr, to.clone())),
        _ => Err(invalid(&expr, to)),
    }
}

/// Conversions out of `unsigned char`, `unsigned short`, `unsigned int`.
fn unsigned_integral_to_arith(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    match (&expr.expr_type.kind, &to.kind) {
        (TypeKind::UChar, TypeKind::Char) => Ok(cast(CastKind::Nop, expr, to.clone())),
        (TypeKind::UChar, TypeKind::Short) | (TypeKind::UChar, TypeKind::UShort) => {
            Ok(cast(CastKind::UInt8ToUInt16, expr, to.clone()))
        }
        (TypeKind::UChar, TypeKind::Long) | (TypeKind::UChar, TypeKind::ULong) => {
            Ok(cast(CastKind::UInt8ToUInt32, expr, to.clone()))
        }
        (TypeKind::UChar, TypeKind::Float) | (TypeKind::UChar, TypeKind::Double) => {
            make_cast(cast(CastKind::UInt8ToUInt32, expr, ExprType::ulong()), to)
        }

        (TypeKind::UShort, TypeKind::Char) | (TypeKind::UShort, TypeKind::UChar) => {
            Ok(cast(CastKind::PreserveInt8, expr, to.clone()))
        }
        (TypeKind::UShort, TypeKind::Short) => Ok(cast(CastKind::Nop, expr, to.clone())),
        (TypeKind::UShort, TypeKind::Long) | (TypeKind::UShort, TypeKind::ULong) => {
            Ok(cast(CastKind::UInt16ToUInt32, expr, to.clone()))
        }
        (TypeKind::UShort, TypeKind::Float) | (TypeKind::UShort, TypeKind::Double) => {
            make_cast(cast(CastKind::UInt16ToUInt32, expr, ExprType::ulong()), to)
        }

        (TypeKind::ULong, _) => ulong_to_arith(expr, to),

        _ => Err(invalid(&expr, to)),
    }
}

fn ulong_to_arith(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    let value = match expr.kind {
        ExprKind::ConstULong(v) => Some(v),
        _ => None,
    };
    match (&to.kind, value) {
        (TypeKind::Char, Some(v)) => Ok(Expr::new(ExprKind::ConstLong(v as i8 as i32), to.clone())),
        (TypeKind::Char, None) | (TypeKind::UChar, None) => {
            Ok(cast(CastKind::PreserveInt8, expr, to.clone()))
        }
        (TypeKind::UChar, Some(v)) => Ok(Expr::new(ExprKind::ConstLong(v as u8 as i32), to.clone())),
        (TypeKind::Short, Some(v)) => {
            Ok(Expr::new(ExprKind::ConstLong(v as i16 as i32), to.clone()))
        }
        (TypeKind::Short, None) | (TypeKind::UShort, None) => {
            Ok(cast(CastKind::PreserveInt16, expr, to.clone()))
        }
        (TypeKind::UShort, Some(v)) => {
            Ok(Expr::new(ExprKind::ConstLong(v as u16 as i32), to.clone()))
        }
        (TypeKind::Long, Some(v)) => Ok(Expr::new(ExprKind::ConstLong(v as i32), to.clone())),
        (TypeKind::Long, None) => Ok(cast(CastKind::Nop, expr, to.clone())),
        (TypeKind::Float, Some(v)) => Ok(Expr::new(ExprKind::ConstFloat(v as f32), to.clone())),
        (TypeKind::Float, None) => Ok(cast(CastKind::Int32ToFloat, expr, to.clone())),
        (TypeKind::Double, Some(v)) => Ok(Expr::new(ExprKind::ConstDouble(v as f64), to.clone())),
        (TypeKind::Double, None) => Ok(cast(CastKind::Int32ToDouble, expr, to.clone())),
        _ => Err(invalid(&expr, to)),
    }
}

/// Conversions out of `float` and `double`. Narrow integral targets go
/// through the 32-bit conversion first.
fn float_to_arith(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    match (&expr.expr_type.kind, &to.kind) {
        (TypeKind::Float, TypeKind::Double) => match expr.kind {
            ExprKind::ConstFloat(v) => Ok(Expr::new(ExprKind::ConstDouble(v as f64), to.clone())),
            _ => Ok(cast(CastKind::FloatToDouble, expr, to.clone())),
        },
        (TypeKind::Float, TypeKind::Long) => match expr.kind {
            ExprKind::ConstFloat(v) => Ok(Expr::new(ExprKind::ConstLong(v as i32), to.clone())),
            _ => Ok(cast(CastKind::FloatToInt32, expr, to.clone())),
        },
        (TypeKind::Float, TypeKind::ULong) => match expr.kind {
            ExprKind::ConstFloat(v) => Ok(Expr::new(ExprKind::ConstULong(v as u32), to.clone())),
            _ => Ok(cast(CastKind::FloatToInt32, expr, to.clone())),
        },
        (TypeKind::Float, TypeKind::Char)
        | (TypeKind::Float, TypeKind::Short)
        | (TypeKind::Float, TypeKind::UChar)
        | (TypeKind::Float, TypeKind::UShort) => {
            let widened = make_cast(expr, &ExprType::long())?;
            make_cast(widened, to)
        }

        (TypeKind::Double, TypeKind::Float) => match expr.kind {
            ExprKind::ConstDouble(v) => Ok(Expr::new(ExprKind::ConstFloat(v as f32), to.clone())),
            _ => Ok(cast(CastKind::DoubleToFloat, expr, to.clone())),
        },
        (TypeKind::Double, TypeKind::Long) => match expr.kind {
            ExprKind::ConstDouble(v) => Ok(Expr::new(ExprKind::ConstLong(v as i32), to.clone())),
            _ => Ok(cast(CastKind::DoubleToInt32, expr, to.clone())),
        },
        (TypeKind::Double, TypeKind::ULong) => match expr.kind {
            ExprKind::ConstDouble(v) => Ok(Expr::new(ExprKind::ConstULong(v as u32), to.clone())),
            _ => Ok(cast(CastKind::DoubleToInt32, expr, to.clone())),
        },
        (TypeKind::Double, TypeKind::Char) | (TypeKind::Double, TypeKind::UChar) => {
            let narrowed = make_cast(expr, &ExprType::float())?;
            make_cast(narrowed, to)
        }
        (TypeKind::Double, TypeKind::Short) => {
            let narrowed = make_cast(expr, &ExprType::float())?;
            make_cast(narrowed, to)
        }
        (TypeKind::Double, TypeKind::UShort) => {
            let widened = make_cast(expr, &ExprType::long())?;
            make_cast(widened, to)
        }

        _ => Err(invalid(&expr, to)),
    }
}

/// Conversions out of a pointer type.
fn from_pointer(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    if to.is_pointer() {
        return match expr.kind {
            ExprKind::ConstPtr(v) => Ok(Expr::new(ExprKind::ConstPtr(v), to.clone())),
            _ => Ok(cast(CastKind::Nop, expr, to.clone())),
        };
    }
    if to.is_integral() {
        // Reinterpret the pointer as an unsigned int, then narrow.
        let as_ulong = match expr.kind {
            ExprKind::ConstPtr(v) => Expr::const_ulong(v),
            _ => cast(CastKind::Nop, expr, ExprType::ulong()),
        };
        return make_cast(as_ulong, to);
    }
    Err(invalid(&expr, to))
}

/// Conversions into a pointer type.
fn to_pointer(expr: Expr, to: &ExprType) -> CompilerResult<Expr> {
    if expr.expr_type.is_integral() {
        let as_ulong = make_cast(expr, &ExprType::ulong())?;
        return match as_ulong.kind {
            ExprKind::ConstULong(v) => Ok(Expr::new(ExprKind::ConstPtr(v), to.clone())),
            _ => Ok(cast(CastKind::Nop, as_ulong, to.clone())),
        };
    }
    match expr.expr_type.kind {
        TypeKind::Function(_) | TypeKind::Array(..) | TypeKind::IncompleteArray(_) => {
            Ok(cast(CastKind::Nop, expr, to.clone()))
        }
        _ => Err(invalid(&expr, to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nonconst_long() -> Expr {
        // A unary node so folding cannot apply.
        Expr::new(
            ExprKind::Unary {
                op: crate::typed::UnaryOp::Negative,
                expr: Box::new(Expr::const_long(1)),
            },
            ExprType::long(),
        )
    }

    #[test]
    fn test_int_to_char_folds_by_truncation() {
        let out = make_cast(Expr::const_long(300), &ExprType::char()).unwrap();
        match out.kind {
            ExprKind::ConstLong(v) => assert_eq!(v, 44),
            other => panic!("expected folded constant, got {:?}", other),
        }
    }

    #[test]
    fn test_int_to_double_folds() {
        let out = make_cast(Expr::const_long(3), &ExprType::double()).unwrap();
        match out.kind {
            ExprKind::ConstDouble(v) => assert_eq!(v, 3.0),
            other => panic!("expected folded constant, got {:?}", other),
        }
    }

    #[test]
    fn test_double_to_int_folds_by_truncation() {
        let out = make_cast(Expr::const_double(3.9), &ExprType::long()).unwrap();
        match out.kind {
            ExprKind::ConstLong(v) => assert_eq!(v, 3),
            other => panic!("expected folded constant, got {:?}", other),
        }
    }

    #[test]
    fn test_nonconst_int_to_char_preserves() {
        let out = make_cast(nonconst_long(), &ExprType::char()).unwrap();
        match out.kind {
            ExprKind::Cast { cast, .. } => assert_eq!(cast, CastKind::PreserveInt8),
            other => panic!("expected cast node, got {:?}", other),
        }
    }

    #[test]
    fn test_char_to_float_chains_through_int() {
        let ch = make_cast(nonconst_long(), &ExprType::char()).unwrap();
        let out = make_cast(ch, &ExprType::float()).unwrap();
        let ExprKind::Cast { cast: outer, expr } = out.kind else {
            panic!("expected cast node");
        };
        assert_eq!(outer, CastKind::Int32ToFloat);
        let ExprKind::Cast { cast: inner, .. } = expr.kind else {
            panic!("expected inner widening cast");
        };
        assert_eq!(inner, CastKind::Int8ToInt32);
    }

    #[test]
    fn test_pointer_to_int_goes_through_ulong() {
        let ptr = Expr::new(ExprKind::ConstPtr(0x1000), ExprType::pointer(ExprType::long()));
        let out = make_cast(ptr, &ExprType::ulong()).unwrap();
        match out.kind {
            ExprKind::ConstULong(v) => assert_eq!(v, 0x1000),
            other => panic!("expected folded constant, got {:?}", other),
        }
    }

    #[test]
    fn test_int_to_pointer_folds_to_const_ptr() {
        let out = make_cast(
            Expr::const_long(0x2000),
            &ExprType::pointer(ExprType::char()),
        )
        .unwrap();
        assert!(matches!(out.kind, ExprKind::ConstPtr(0x2000)));
    }

    #[test]
    fn test_equal_types_pass_through() {
        let out = make_cast(Expr::const_long(7), &ExprType::long()).unwrap();
        assert!(matches!(out.kind, ExprKind::ConstLong(7)));
    }

    #[test]
    fn test_struct_cast_rejected() {
        use crate::types::StructOrUnionLayout;
        let layout = StructOrUnionLayout::new_struct(None, vec![("x".to_string(), ExprType::long())]);
        let st = ExprType::new(TypeKind::StructOrUnion(layout));
        let err = make_cast(Expr::const_long(1), &st).unwrap_err();
        assert!(err.to_string().contains("cannot cast"));
    }
}
