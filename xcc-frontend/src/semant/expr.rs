//! Expression analysis
//!
//! Types every expression, applies the usual arithmetic conversions,
//! scales pointer arithmetic, desugars `a[i]`, `p->m`, and compound
//! assignment, and folds constant subexpressions.

use crate::ast;
use crate::cast::make_cast;
use crate::env::{EntryKind, Env};
use crate::semant::{apply_declarator, resolve_base_type};
use crate::typed::{BinaryOp, CastKind, Expr, ExprKind, IncDecOp, UnaryOp};
use crate::types::{ExprType, TypeKind};
use xcc_common::{CompilerError, CompilerResult};

/// Analyze one expression against the current environment.
pub fn analyze_expr(expr: &ast::Expr, env: &mut Env) -> CompilerResult<Expr> {
    match expr {
        ast::Expr::IntConst(value) => {
            if *value <= i32::MAX as i64 {
                Ok(Expr::const_long(*value as i32))
            } else if *value <= u32::MAX as i64 {
                Ok(Expr::const_ulong(*value as u32))
            } else {
                Err(CompilerError::semantic_error(format!(
                    "integer literal {} does not fit in 32 bits",
                    value
                )))
            }
        }
        ast::Expr::UIntConst(value) => Ok(Expr::const_ulong(*value)),
        ast::Expr::FloatConst(value) => Ok(Expr::const_float(*value)),
        ast::Expr::DoubleConst(value) => Ok(Expr::const_double(*value)),
        ast::Expr::CharConst(value) => Ok(Expr::const_long(*value as i32)),
        ast::Expr::StringLiteral(value) => Ok(Expr::new(
            ExprKind::ConstString(value.clone()),
            ExprType::pointer(ExprType::char()),
        )),

        ast::Expr::Variable(name) => analyze_variable(name, env),

        ast::Expr::Assign { left, right } => {
            let left = analyze_expr(left, env)?;
            let right = decay(analyze_expr(right, env)?);
            analyze_assign(left, right)
        }

        // `a op= b` lowers to `a = a op b`.
        ast::Expr::AssignOp { op, left, right } => {
            let lowered = ast::Expr::Assign {
                left: left.clone(),
                right: Box::new(ast::Expr::Binary {
                    op: *op,
                    left: left.clone(),
                    right: right.clone(),
                }),
            };
            analyze_expr(&lowered, env)
        }

        ast::Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            let cond = require_scalar(decay(analyze_expr(cond, env)?), "conditional")?;
            let then_expr = decay(analyze_expr(then_expr, env)?);
            let else_expr = decay(analyze_expr(else_expr, env)?);
            analyze_conditional(cond, then_expr, else_expr)
        }

        ast::Expr::Binary { op, left, right } => {
            let left = decay(analyze_expr(left, env)?);
            let right = decay(analyze_expr(right, env)?);
            construct_binary(*op, left, right)
        }

        ast::Expr::Unary { op, expr } => {
            let expr = decay(analyze_expr(expr, env)?);
            construct_unary(*op, expr)
        }

        ast::Expr::IncDec { op, expr } => {
            let op = match op {
                ast::IncDecOp::PreIncrement => IncDecOp::PreIncrement,
                ast::IncDecOp::PreDecrement => IncDecOp::PreDecrement,
                ast::IncDecOp::PostIncrement => IncDecOp::PostIncrement,
                ast::IncDecOp::PostDecrement => IncDecOp::PostDecrement,
            };
            let expr = analyze_expr(expr, env)?;
            analyze_inc_dec(op, expr)
        }

        ast::Expr::Cast { type_name, expr } => {
            let to = resolve_type_name(type_name, env)?;
            let expr = decay(analyze_expr(expr, env)?);
            make_cast(expr, &to)
        }

        ast::Expr::FuncCall { func, args } => analyze_func_call(func, args, env),

        ast::Expr::Member { expr, name } => {
            let expr = analyze_expr(expr, env)?;
            analyze_member(expr, name)
        }

        // `p->m` lowers to `(*p).m`.
        ast::Expr::Arrow { expr, name } => {
            let lowered = ast::Expr::Member {
                expr: Box::new(ast::Expr::Dereference(expr.clone())),
                name: name.clone(),
            };
            analyze_expr(&lowered, env)
        }

        // `a[i]` lowers to `*(a + i)`.
        ast::Expr::Index { base, index } => {
            let lowered = ast::Expr::Dereference(Box::new(ast::Expr::Binary {
                op: ast::BinaryOp::Add,
                left: base.clone(),
                right: index.clone(),
            }));
            analyze_expr(&lowered, env)
        }

        ast::Expr::Reference(inner) => {
            let inner = analyze_expr(inner, env)?;
            if !inner.is_lvalue() && !matches!(inner.expr_type.kind, TypeKind::Function(_)) {
                return Err(CompilerError::semantic_error(
                    "cannot take the address of a non-lvalue",
                ));
            }
            let result_type = ExprType::pointer(inner.expr_type.clone());
            Ok(Expr::new(ExprKind::Reference(Box::new(inner)), result_type))
        }

        ast::Expr::Dereference(inner) => {
            let inner = decay(analyze_expr(inner, env)?);
            let pointee = match &inner.expr_type.kind {
                TypeKind::Pointer(pointee) => (**pointee).clone(),
                _ => {
                    return Err(CompilerError::type_error(format!(
                        "cannot dereference a value of type '{}'",
                        inner.expr_type
                    )))
                }
            };
            if pointee.is_void() {
                return Err(CompilerError::type_error("cannot dereference a void pointer"));
            }
            Ok(Expr::new(ExprKind::Dereference(Box::new(inner)), pointee))
        }

        ast::Expr::SizeofExpr(inner) => {
            let inner = analyze_expr(inner, env)?;
            let size = size_of_checked(&inner.expr_type)?;
            Ok(Expr::const_ulong(size as u32))
        }
        ast::Expr::SizeofType(type_name) => {
            let ty = resolve_type_name(type_name, env)?;
            let size = size_of_checked(&ty)?;
            Ok(Expr::const_ulong(size as u32))
        }
    }
}

/// Evaluate an integer constant expression (enum values, array sizes,
/// case labels).
pub fn eval_const_long(expr: &ast::Expr, env: &mut Env) -> CompilerResult<i32> {
    let typed = analyze_expr(expr, env)?;
    match typed.kind {
        ExprKind::ConstLong(value) => Ok(value),
        ExprKind::ConstULong(value) => Ok(value as i32),
        _ => Err(CompilerError::semantic_error(
            "expected an integer constant expression",
        )),
    }
}

/// Resolve a written type name (casts, sizeof).
pub(crate) fn resolve_type_name(
    type_name: &ast::TypeName,
    env: &mut Env,
) -> CompilerResult<ExprType> {
    let base = resolve_base_type(&type_name.specs, env)?;
    let (name, ty) = apply_declarator(base, &type_name.declarator, env)?;
    if name.is_some() {
        return Err(CompilerError::semantic_error(
            "type name cannot declare an identifier",
        ));
    }
    Ok(ty)
}

fn analyze_variable(name: &str, env: &Env) -> CompilerResult<Expr> {
    let entry = env.find(name).ok_or_else(|| {
        CompilerError::semantic_error(format!("undeclared identifier '{}'", name))
    })?;
    let expr_type = match entry.kind {
        EntryKind::Enum => ExprType::long(),
        EntryKind::Typedef => {
            return Err(CompilerError::semantic_error(format!(
                "unexpected type name '{}' in expression",
                name
            )))
        }
        EntryKind::Stack | EntryKind::Frame | EntryKind::Global => entry.entry_type,
    };
    Ok(Expr::new(
        ExprKind::Variable {
            name: name.to_string(),
            env: env.clone(),
        },
        expr_type,
    ))
}

fn analyze_assign(left: Expr, right: Expr) -> CompilerResult<Expr> {
    if !left.is_lvalue() {
        return Err(CompilerError::semantic_error(
            "left side of assignment is not an lvalue",
        ));
    }
    if matches!(
        left.expr_type.kind,
        TypeKind::Array(..) | TypeKind::IncompleteArray(_) | TypeKind::Function(_)
    ) {
        return Err(CompilerError::semantic_error(format!(
            "cannot assign to a value of type '{}'",
            left.expr_type
        )));
    }
    let result_type = left.expr_type.clone();
    let right = make_cast(right, &result_type)?;
    Ok(Expr::new(
        ExprKind::Assign {
            left: Box::new(left),
            right: Box::new(right),
        },
        result_type,
    ))
}

fn analyze_conditional(cond: Expr, then_expr: Expr, else_expr: Expr) -> CompilerResult<Expr> {
    if then_expr.expr_type.is_arith() && else_expr.expr_type.is_arith() {
        let (then_expr, else_expr, result_type) =
            usual_arithmetic_conversion(then_expr, else_expr)?;
        return Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            result_type,
        ));
    }
    if then_expr.expr_type.equal_type(&else_expr.expr_type) {
        let result_type = then_expr.expr_type.clone();
        return Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            result_type,
        ));
    }
    Err(CompilerError::type_error(format!(
        "incompatible branch types '{}' and '{}' in conditional",
        then_expr.expr_type, else_expr.expr_type
    )))
}

fn analyze_inc_dec(op: IncDecOp, expr: Expr) -> CompilerResult<Expr> {
    if !expr.is_lvalue() {
        return Err(CompilerError::semantic_error(
            "operand of ++/-- is not an lvalue",
        ));
    }
    if !expr.expr_type.is_scalar() {
        return Err(CompilerError::type_error(format!(
            "cannot increment a value of type '{}'",
            expr.expr_type
        )));
    }
    if let TypeKind::Pointer(pointee) = &expr.expr_type.kind {
        // The step is sizeof(*p), so the pointee must be sized.
        size_of_checked(pointee)?;
    }
    let result_type = expr.expr_type.clone();
    Ok(Expr::new(
        ExprKind::IncDec {
            op,
            expr: Box::new(expr),
        },
        result_type,
    ))
}

fn analyze_func_call(
    func: &ast::Expr,
    args: &[ast::Expr],
    env: &mut Env,
) -> CompilerResult<Expr> {
    let func = analyze_expr(func, env)?;
    let func_type = match &func.expr_type.kind {
        TypeKind::Function(ft) => ft.clone(),
        TypeKind::Pointer(pointee) => match &pointee.kind {
            TypeKind::Function(ft) => ft.clone(),
            _ => {
                return Err(CompilerError::type_error(format!(
                    "called object has type '{}', not a function",
                    func.expr_type
                )))
            }
        },
        _ => {
            return Err(CompilerError::type_error(format!(
                "called object has type '{}', not a function",
                func.expr_type
            )))
        }
    };

    let expected = func_type.params.len();
    if func_type.is_varargs {
        if args.len() < expected {
            return Err(CompilerError::semantic_error(format!(
                "too few arguments: expected at least {}, got {}",
                expected,
                args.len()
            )));
        }
    } else if args.len() != expected {
        return Err(CompilerError::semantic_error(format!(
            "wrong number of arguments: expected {}, got {}",
            expected,
            args.len()
        )));
    }

    let mut typed_args = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let typed = decay(analyze_expr(arg, env)?);
        let typed = if i < expected {
            make_cast(typed, &func_type.params[i].param_type)?
        } else {
            default_argument_promotion(typed)?
        };
        typed_args.push(typed);
    }

    let result_type = func_type.ret.clone();
    Ok(Expr::new(
        ExprKind::FuncCall {
            func: Box::new(func),
            args: typed_args,
        },
        result_type,
    ))
}

/// Variadic arguments past the named parameters widen: float goes to
/// double, small integers to int.
fn default_argument_promotion(expr: Expr) -> CompilerResult<Expr> {
    match expr.expr_type.kind {
        TypeKind::Float => make_cast(expr, &ExprType::double()),
        TypeKind::Char | TypeKind::Short => make_cast(expr, &ExprType::long()),
        TypeKind::UChar | TypeKind::UShort => make_cast(expr, &ExprType::ulong()),
        _ => Ok(expr),
    }
}

fn analyze_member(expr: Expr, name: &str) -> CompilerResult<Expr> {
    let layout = match &expr.expr_type.kind {
        TypeKind::StructOrUnion(layout) => layout.clone(),
        _ => {
            return Err(CompilerError::type_error(format!(
                "member access on a value of type '{}'",
                expr.expr_type
            )))
        }
    };
    if !layout.is_complete() {
        return Err(CompilerError::type_error(format!(
            "member access on incomplete type '{}'",
            layout
        )));
    }
    let member = layout.find_member(name).ok_or_else(|| {
        CompilerError::semantic_error(format!("'{}' has no member named '{}'", layout, name))
    })?;
    Ok(Expr::new(
        ExprKind::Attribute {
            expr: Box::new(expr),
            member: name.to_string(),
        },
        member.member_type,
    ))
}

/// Arrays used as values become pointers to their first element;
/// functions become pointers to themselves.
pub(crate) fn decay(expr: Expr) -> Expr {
    let decayed = match &expr.expr_type.kind {
        TypeKind::Array(elem, _) | TypeKind::IncompleteArray(elem) => {
            ExprType::pointer((**elem).clone())
        }
        TypeKind::Function(_) => ExprType::pointer(expr.expr_type.clone()),
        _ => return expr,
    };
    Expr::new(
        ExprKind::Cast {
            cast: CastKind::Nop,
            expr: Box::new(expr),
        },
        decayed,
    )
}

fn require_scalar(expr: Expr, what: &str) -> CompilerResult<Expr> {
    if expr.expr_type.is_scalar() {
        Ok(expr)
    } else {
        Err(CompilerError::type_error(format!(
            "{} needs a scalar operand, got '{}'",
            what, expr.expr_type
        )))
    }
}

fn size_of_checked(ty: &ExprType) -> CompilerResult<i32> {
    match &ty.kind {
        TypeKind::Void => Err(CompilerError::type_error("sizeof(void) is not allowed")),
        TypeKind::Function(_) => Err(CompilerError::type_error(
            "sizeof a function is not allowed",
        )),
        TypeKind::IncompleteArray(_) => Err(CompilerError::type_error(
            "sizeof an array of unknown size is not allowed",
        )),
        TypeKind::StructOrUnion(layout) if !layout.is_complete() => Err(
            CompilerError::type_error(format!("sizeof incomplete type '{}'", layout)),
        ),
        _ => Ok(ty.size_of()),
    }
}

/// Promote small integral types to long. Sub-int unsigned types fit in
/// long, so promotion never produces ulong.
fn integral_promote(expr: Expr) -> CompilerResult<Expr> {
    match expr.expr_type.kind {
        TypeKind::Char | TypeKind::UChar | TypeKind::Short | TypeKind::UShort => {
            make_cast(expr, &ExprType::long())
        }
        _ => Ok(expr),
    }
}

/// The usual arithmetic conversions: double beats float beats unsigned
/// int beats int. Returns both operands converted plus the common type.
fn usual_arithmetic_conversion(
    left: Expr,
    right: Expr,
) -> CompilerResult<(Expr, Expr, ExprType)> {
    if !left.expr_type.is_arith() || !right.expr_type.is_arith() {
        return Err(CompilerError::type_error(format!(
            "invalid operands '{}' and '{}'",
            left.expr_type, right.expr_type
        )));
    }
    let common = if matches!(left.expr_type.kind, TypeKind::Double)
        || matches!(right.expr_type.kind, TypeKind::Double)
    {
        ExprType::double()
    } else if matches!(left.expr_type.kind, TypeKind::Float)
        || matches!(right.expr_type.kind, TypeKind::Float)
    {
        ExprType::float()
    } else {
        // Only a full-width ulong forces the unsigned branch; smaller
        // unsigned types promote into long first.
        let left_unsigned = matches!(left.expr_type.kind, TypeKind::ULong);
        let right_unsigned = matches!(right.expr_type.kind, TypeKind::ULong);
        if left_unsigned || right_unsigned {
            ExprType::ulong()
        } else {
            ExprType::long()
        }
    };
    let left = make_cast(left, &common)?;
    let right = make_cast(right, &common)?;
    Ok((left, right, common))
}

/// Build a typed binary expression, folding constants and scaling
/// pointer arithmetic.
pub(crate) fn construct_binary(
    op: ast::BinaryOp,
    left: Expr,
    right: Expr,
) -> CompilerResult<Expr> {
    let op = lower_binary_op(op);
    match op {
        BinaryOp::Mul | BinaryOp::Div => arith_binary(op, left, right),

        BinaryOp::Mod
        | BinaryOp::LShift
        | BinaryOp::RShift
        | BinaryOp::BitwiseAnd
        | BinaryOp::Xor
        | BinaryOp::BitwiseOr => {
            if !left.expr_type.is_integral() || !right.expr_type.is_integral() {
                return Err(CompilerError::type_error(format!(
                    "invalid operands '{}' and '{}'",
                    left.expr_type, right.expr_type
                )));
            }
            arith_binary(op, left, right)
        }

        BinaryOp::Add => {
            if left.expr_type.is_pointer() && right.expr_type.is_integral() {
                return pointer_offset(left, right, false);
            }
            if left.expr_type.is_integral() && right.expr_type.is_pointer() {
                return pointer_offset(right, left, false);
            }
            arith_binary(op, left, right)
        }

        BinaryOp::Sub => {
            if left.expr_type.is_pointer() && right.expr_type.is_integral() {
                return pointer_offset(left, right, true);
            }
            if left.expr_type.is_pointer() && right.expr_type.is_pointer() {
                return pointer_diff(left, right);
            }
            arith_binary(op, left, right)
        }

        BinaryOp::Less
        | BinaryOp::Greater
        | BinaryOp::LessEqual
        | BinaryOp::GreaterEqual
        | BinaryOp::Equal
        | BinaryOp::NotEqual => comparison(op, left, right),

        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            let left = require_scalar(left, "logical operator")?;
            let right = require_scalar(right, "logical operator")?;
            if let Some(folded) = fold_binary(op, &left, &right) {
                return Ok(Expr::new(folded, ExprType::long()));
            }
            Ok(Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                ExprType::long(),
            ))
        }
    }
}

fn lower_binary_op(op: ast::BinaryOp) -> BinaryOp {
    match op {
        ast::BinaryOp::Mul => BinaryOp::Mul,
        ast::BinaryOp::Div => BinaryOp::Div,
        ast::BinaryOp::Mod => BinaryOp::Mod,
        ast::BinaryOp::Add => BinaryOp::Add,
        ast::BinaryOp::Sub => BinaryOp::Sub,
        ast::BinaryOp::LShift => BinaryOp::LShift,
        ast::BinaryOp::RShift => BinaryOp::RShift,
        ast::BinaryOp::Less => BinaryOp::Less,
        ast::BinaryOp::Greater => BinaryOp::Greater,
        ast::BinaryOp::LessEqual => BinaryOp::LessEqual,
        ast::BinaryOp::GreaterEqual => BinaryOp::GreaterEqual,
        ast::BinaryOp::Equal => BinaryOp::Equal,
        ast::BinaryOp::NotEqual => BinaryOp::NotEqual,
        ast::BinaryOp::BitwiseAnd => BinaryOp::BitwiseAnd,
        ast::BinaryOp::Xor => BinaryOp::Xor,
        ast::BinaryOp::BitwiseOr => BinaryOp::BitwiseOr,
        ast::BinaryOp::LogicalAnd => BinaryOp::LogicalAnd,
        ast::BinaryOp::LogicalOr => BinaryOp::LogicalOr,
    }
}

fn arith_binary(op: BinaryOp, left: Expr, right: Expr) -> CompilerResult<Expr> {
    let (left, right, result_type) = usual_arithmetic_conversion(left, right)?;
    if let Some(folded) = fold_binary(op, &left, &right) {
        let folded_type = match folded {
            ExprKind::ConstLong(_) => ExprType::long(),
            ExprKind::ConstULong(_) => ExprType::ulong(),
            ExprKind::ConstFloat(_) => ExprType::float(),
            ExprKind::ConstDouble(_) => ExprType::double(),
            _ => result_type.clone(),
        };
        return Ok(Expr::new(folded, folded_type));
    }
    Ok(Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        result_type,
    ))
}

fn comparison(op: BinaryOp, left: Expr, right: Expr) -> CompilerResult<Expr> {
    if left.expr_type.is_pointer() || right.expr_type.is_pointer() {
        if !left.expr_type.is_scalar() || !right.expr_type.is_scalar() {
            return Err(CompilerError::type_error(format!(
                "cannot compare '{}' and '{}'",
                left.expr_type, right.expr_type
            )));
        }
        // Pointers compare as unsigned addresses.
        let left = make_cast(left, &ExprType::ulong())?;
        let right = make_cast(right, &ExprType::ulong())?;
        if let Some(folded) = fold_binary(op, &left, &right) {
            return Ok(Expr::new(folded, ExprType::long()));
        }
        return Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ExprType::long(),
        ));
    }
    let (left, right, _) = usual_arithmetic_conversion(left, right)?;
    if let Some(folded) = fold_binary(op, &left, &right) {
        return Ok(Expr::new(folded, ExprType::long()));
    }
    Ok(Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        ExprType::long(),
    ))
}

/// `p + i` and `p - i`: scale the index by the element size in the
/// integer domain and move back to the pointer type.
fn pointer_offset(ptr: Expr, index: Expr, negate: bool) -> CompilerResult<Expr> {
    let ptr_type = ptr.expr_type.clone();
    let elem_size = match &ptr_type.kind {
        TypeKind::Pointer(pointee) => size_of_checked(pointee)?,
        _ => panic!("pointer_offset on non-pointer"),
    };
    let index = make_cast(index, &ExprType::long())?;
    let scaled = arith_binary(BinaryOp::Mul, index, Expr::const_long(elem_size))?;
    let ptr_as_int = make_cast(ptr, &ExprType::ulong())?;
    let op = if negate { BinaryOp::Sub } else { BinaryOp::Add };
    let moved = arith_binary(op, ptr_as_int, scaled)?;
    make_cast(moved, &ptr_type)
}

/// `p - q` on pointers of the same type: byte difference divided by the
/// element size, as an int.
fn pointer_diff(left: Expr, right: Expr) -> CompilerResult<Expr> {
    if !left.expr_type.equal_type(&right.expr_type) {
        return Err(CompilerError::type_error(format!(
            "cannot subtract '{}' from '{}'",
            right.expr_type, left.expr_type
        )));
    }
    let elem_size = match &left.expr_type.kind {
        TypeKind::Pointer(pointee) => size_of_checked(pointee)?,
        _ => panic!("pointer_diff on non-pointer"),
    };
    let left = make_cast(left, &ExprType::long())?;
    let right = make_cast(right, &ExprType::long())?;
    let diff = arith_binary(BinaryOp::Sub, left, right)?;
    arith_binary(BinaryOp::Div, diff, Expr::const_long(elem_size))
}

fn construct_unary(op: ast::UnaryOp, expr: Expr) -> CompilerResult<Expr> {
    match op {
        ast::UnaryOp::Positive => {
            if !expr.expr_type.is_arith() {
                return Err(CompilerError::type_error(format!(
                    "unary '+' needs an arithmetic operand, got '{}'",
                    expr.expr_type
                )));
            }
            Ok(expr)
        }
        ast::UnaryOp::Negative => {
            if !expr.expr_type.is_arith() {
                return Err(CompilerError::type_error(format!(
                    "unary '-' needs an arithmetic operand, got '{}'",
                    expr.expr_type
                )));
            }
            let expr = if expr.expr_type.is_integral() {
                integral_promote(expr)?
            } else {
                expr
            };
            let result_type = expr.expr_type.clone();
            match expr.kind {
                ExprKind::ConstLong(v) => Ok(Expr::const_long(v.wrapping_neg())),
                ExprKind::ConstULong(v) => Ok(Expr::const_ulong(v.wrapping_neg())),
                ExprKind::ConstFloat(v) => Ok(Expr::const_float(-v)),
                ExprKind::ConstDouble(v) => Ok(Expr::const_double(-v)),
                _ => Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Negative,
                        expr: Box::new(expr),
                    },
                    result_type,
                )),
            }
        }
        ast::UnaryOp::BitwiseNot => {
            if !expr.expr_type.is_integral() {
                return Err(CompilerError::type_error(format!(
                    "unary '~' needs an integral operand, got '{}'",
                    expr.expr_type
                )));
            }
            let expr = integral_promote(expr)?;
            let result_type = expr.expr_type.clone();
            match expr.kind {
                ExprKind::ConstLong(v) => Ok(Expr::const_long(!v)),
                ExprKind::ConstULong(v) => Ok(Expr::const_ulong(!v)),
                _ => Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::BitwiseNot,
                        expr: Box::new(expr),
                    },
                    result_type,
                )),
            }
        }
        ast::UnaryOp::LogicalNot => {
            let expr = require_scalar(expr, "unary '!'")?;
            match expr.kind {
                ExprKind::ConstLong(v) => Ok(Expr::const_long((v == 0) as i32)),
                ExprKind::ConstULong(v) => Ok(Expr::const_long((v == 0) as i32)),
                _ => Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::LogicalNot,
                        expr: Box::new(expr),
                    },
                    ExprType::long(),
                )),
            }
        }
    }
}

fn fold_binary(op: BinaryOp, left: &Expr, right: &Expr) -> Option<ExprKind> {
    match (&left.kind, &right.kind) {
        (ExprKind::ConstLong(a), ExprKind::ConstLong(b)) => fold_long(op, *a, *b),
        (ExprKind::ConstULong(a), ExprKind::ConstULong(b)) => fold_ulong(op, *a, *b),
        (ExprKind::ConstFloat(a), ExprKind::ConstFloat(b)) => {
            fold_floating(op, *a as f64, *b as f64, true)
        }
        (ExprKind::ConstDouble(a), ExprKind::ConstDouble(b)) => fold_floating(op, *a, *b, false),
        _ => None,
    }
}

fn fold_long(op: BinaryOp, a: i32, b: i32) -> Option<ExprKind> {
    let value = match op {
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::LShift => a.wrapping_shl(b as u32),
        BinaryOp::RShift => a.wrapping_shr(b as u32),
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::Less => (a < b) as i32,
        BinaryOp::Greater => (a > b) as i32,
        BinaryOp::LessEqual => (a <= b) as i32,
        BinaryOp::GreaterEqual => (a >= b) as i32,
        BinaryOp::Equal => (a == b) as i32,
        BinaryOp::NotEqual => (a != b) as i32,
        BinaryOp::LogicalAnd => (a != 0 && b != 0) as i32,
        BinaryOp::LogicalOr => (a != 0 || b != 0) as i32,
    };
    Some(ExprKind::ConstLong(value))
}

fn fold_ulong(op: BinaryOp, a: u32, b: u32) -> Option<ExprKind> {
    let value = match op {
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return None;
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0 {
                return None;
            }
            a % b
        }
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::LShift => a.wrapping_shl(b),
        BinaryOp::RShift => a.wrapping_shr(b),
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::BitwiseOr => a | b,
        // Comparisons and logicals produce a signed result.
        BinaryOp::Less => return Some(ExprKind::ConstLong((a < b) as i32)),
        BinaryOp::Greater => return Some(ExprKind::ConstLong((a > b) as i32)),
        BinaryOp::LessEqual => return Some(ExprKind::ConstLong((a <= b) as i32)),
        BinaryOp::GreaterEqual => return Some(ExprKind::ConstLong((a >= b) as i32)),
        BinaryOp::Equal => return Some(ExprKind::ConstLong((a == b) as i32)),
        BinaryOp::NotEqual => return Some(ExprKind::ConstLong((a != b) as i32)),
        BinaryOp::LogicalAnd => {
            return Some(ExprKind::ConstLong((a != 0 && b != 0) as i32));
        }
        BinaryOp::LogicalOr => {
            return Some(ExprKind::ConstLong((a != 0 || b != 0) as i32));
        }
    };
    Some(ExprKind::ConstULong(value))
}

fn fold_floating(op: BinaryOp, a: f64, b: f64, is_float: bool) -> Option<ExprKind> {
    let arith = |value: f64| {
        if is_float {
            ExprKind::ConstFloat(value as f32)
        } else {
            ExprKind::ConstDouble(value)
        }
    };
    match op {
        BinaryOp::Mul => Some(arith(a * b)),
        BinaryOp::Div => Some(arith(a / b)),
        BinaryOp::Add => Some(arith(a + b)),
        BinaryOp::Sub => Some(arith(a - b)),
        BinaryOp::Less => Some(ExprKind::ConstLong((a < b) as i32)),
        BinaryOp::Greater => Some(ExprKind::ConstLong((a > b) as i32)),
        BinaryOp::LessEqual => Some(ExprKind::ConstLong((a <= b) as i32)),
        BinaryOp::GreaterEqual => Some(ExprKind::ConstLong((a >= b) as i32)),
        BinaryOp::Equal => Some(ExprKind::ConstLong((a == b) as i32)),
        BinaryOp::NotEqual => Some(ExprKind::ConstLong((a != b) as i32)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn analyze_str(input: &str) -> CompilerResult<Expr> {
        let tokens = Lexer::new("test.c", input).tokenize().unwrap();
        let ast = Parser::new(tokens).parse_expression().unwrap();
        analyze_expr(&ast, &mut Env::new())
    }

    fn analyze_with_env(input: &str, env: &mut Env) -> CompilerResult<Expr> {
        let tokens = Lexer::new("test.c", input).tokenize().unwrap();
        let ast = Parser::new(tokens).parse_expression().unwrap();
        analyze_expr(&ast, env)
    }

    #[test]
    fn test_const_folding() {
        let expr = analyze_str("2 + 3 * 4").unwrap();
        assert!(matches!(expr.kind, ExprKind::ConstLong(14)));
    }

    #[test]
    fn test_comparison_folds_to_long() {
        let expr = analyze_str("2 < 3").unwrap();
        assert!(matches!(expr.kind, ExprKind::ConstLong(1)));
        assert!(expr.expr_type.equal_type(&ExprType::long()));
    }

    #[test]
    fn test_mixed_int_double_promotes() {
        let expr = analyze_str("1 + 2.0").unwrap();
        assert!(matches!(expr.kind, ExprKind::ConstDouble(v) if v == 3.0));
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        let expr = analyze_str("1 / 0").unwrap();
        assert!(matches!(expr.kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_unsigned_wins_uac() {
        let expr = analyze_str("1 + 2u").unwrap();
        assert!(matches!(expr.kind, ExprKind::ConstULong(3)));
    }

    #[test]
    fn test_uchar_arithmetic_common_type_is_long() {
        let mut env = Env::new().in_scope();
        env.push_stack("a", ExprType::uchar());
        env.push_stack("b", ExprType::uchar());
        let expr = analyze_with_env("a + b", &mut env).unwrap();
        assert!(expr.expr_type.equal_type(&ExprType::long()));
    }

    #[test]
    fn test_ushort_with_ulong_is_ulong() {
        let mut env = Env::new().in_scope();
        env.push_stack("s", ExprType::ushort());
        env.push_stack("u", ExprType::ulong());
        let expr = analyze_with_env("s + u", &mut env).unwrap();
        assert!(expr.expr_type.equal_type(&ExprType::ulong()));
    }

    #[test]
    fn test_sizeof_folds() {
        let expr = analyze_str("sizeof(double)").unwrap();
        assert!(matches!(expr.kind, ExprKind::ConstULong(8)));
    }

    #[test]
    fn test_pointer_add_scales_constant_index() {
        let mut env = Env::new().in_scope();
        env.push_stack("p", ExprType::pointer(ExprType::double()));
        let expr = analyze_with_env("p + 2", &mut env).unwrap();
        assert!(expr.expr_type.is_pointer());
        // The scaled offset 2 * 8 folds to a constant.
        fn contains_const_16(expr: &Expr) -> bool {
            match &expr.kind {
                ExprKind::ConstLong(16) => true,
                ExprKind::Binary { left, right, .. } => {
                    contains_const_16(left) || contains_const_16(right)
                }
                ExprKind::Cast { expr, .. } => contains_const_16(expr),
                _ => false,
            }
        }
        assert!(contains_const_16(&expr));
    }

    #[test]
    fn test_array_decays_in_arithmetic() {
        let mut env = Env::new().in_scope();
        env.push_stack("a", ExprType::array(ExprType::long(), 4));
        let expr = analyze_with_env("a + 1", &mut env).unwrap();
        assert!(expr.expr_type.is_pointer());
    }

    #[test]
    fn test_sizeof_array_does_not_decay() {
        let mut env = Env::new().in_scope();
        env.push_stack("a", ExprType::array(ExprType::long(), 4));
        let expr = analyze_with_env("sizeof a", &mut env).unwrap();
        assert!(matches!(expr.kind, ExprKind::ConstULong(16)));
    }

    #[test]
    fn test_assign_requires_lvalue() {
        let err = analyze_str("1 = 2").unwrap_err();
        assert!(err.to_string().contains("lvalue"));
    }

    #[test]
    fn test_compound_assign_lowering() {
        let mut env = Env::new().in_scope();
        env.push_stack("x", ExprType::long());
        let expr = analyze_with_env("x += 2", &mut env).unwrap();
        match expr.kind {
            ExprKind::Assign { right, .. } => {
                assert!(matches!(
                    right.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_negate_char_promotes_to_long() {
        let mut env = Env::new().in_scope();
        env.push_stack("c", ExprType::char());
        let expr = analyze_with_env("-c", &mut env).unwrap();
        assert!(expr.expr_type.equal_type(&ExprType::long()));
    }

    #[test]
    fn test_logical_result_is_long() {
        let mut env = Env::new().in_scope();
        env.push_stack("p", ExprType::pointer(ExprType::long()));
        let expr = analyze_with_env("p && 1", &mut env).unwrap();
        assert!(expr.expr_type.equal_type(&ExprType::long()));
    }

    #[test]
    fn test_string_literal_is_char_pointer() {
        let expr = analyze_str("\"hi\"").unwrap();
        assert_eq!(format!("{}", expr.expr_type), "char *");
    }

    #[test]
    fn test_deref_void_pointer_rejected() {
        let mut env = Env::new().in_scope();
        env.push_stack("p", ExprType::pointer(ExprType::void()));
        let err = analyze_with_env("*p", &mut env).unwrap_err();
        assert!(err.to_string().contains("void"));
    }

    #[test]
    fn test_pointer_difference_is_long() {
        let mut env = Env::new().in_scope();
        env.push_stack("p", ExprType::pointer(ExprType::long()));
        env.push_stack("q", ExprType::pointer(ExprType::long()));
        let expr = analyze_with_env("p - q", &mut env).unwrap();
        assert!(expr.expr_type.equal_type(&ExprType::long()));
    }
}
