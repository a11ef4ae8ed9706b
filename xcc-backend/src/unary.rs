//! Unary operator code generation
//!
//! Increment and decrement work on an lvalue: the address goes to %ecx,
//! the old value is cached, the new value is computed and stored back.
//! Post forms compute in %ebx and return the old %eax; pre forms compute
//! in %eax directly. Floating operands go through the FPU with 1.0
//! loaded on top.

use xcc_common::{CompilerError, CompilerResult};
use xcc_frontend::typed::{Expr, IncDecOp, UnaryOp};
use xcc_frontend::types::TypeKind;

use crate::emit::{CodeGen, Reg};
use crate::expr::{gen_address, gen_test, gen_value};

pub fn gen_unary(op: UnaryOp, inner: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    let reg = gen_value(inner, state)?;
    match op {
        UnaryOp::Negative => match reg {
            Reg::Eax => {
                state.instr("neg %eax");
                Ok(Reg::Eax)
            }
            Reg::St0 => {
                state.instr("fchs");
                Ok(Reg::St0)
            }
            _ => Err(unexpected_reg(reg)),
        },

        UnaryOp::BitwiseNot => match reg {
            Reg::Eax => {
                state.instr("not %eax");
                Ok(Reg::Eax)
            }
            _ => Err(unexpected_reg(reg)),
        },

        UnaryOp::LogicalNot => {
            gen_test(reg, state)?;
            state.instr("sete %al");
            state.instr("movzbl %al, %eax");
            Ok(Reg::Eax)
        }
    }
}

fn unexpected_reg(reg: Reg) -> CompilerError {
    CompilerError::codegen_error(format!("unary operand in unexpected register {}", reg))
}

pub fn gen_inc_dec(op: IncDecOp, inner: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    // %eax = &expr, parked on the stack while the value loads.
    gen_address(inner, state)?;
    let saved = state.push_long(Reg::Eax);

    let reg = gen_value(inner, state)?;

    match reg {
        Reg::Eax => {
            // %eax = expr, %ebx = expr, %ecx = &expr.
            state.pop_long(saved, Reg::Ecx);
            state.instr("movl %eax, %ebx");

            let step = step_size(inner)?;
            let is_increment = matches!(op, IncDecOp::PreIncrement | IncDecOp::PostIncrement);
            let arith = if is_increment { "addl" } else { "subl" };

            // Post forms update %ebx so the original value survives in
            // %eax; pre forms update %eax itself.
            let work_reg = match op {
                IncDecOp::PostIncrement | IncDecOp::PostDecrement => "%ebx",
                IncDecOp::PreIncrement | IncDecOp::PreDecrement => "%eax",
            };
            state.instr(&format!("{} ${}, {}", arith, step, work_reg));

            match &inner.expr_type.kind {
                TypeKind::Char | TypeKind::UChar => {
                    let low = if work_reg == "%ebx" { "%bl" } else { "%al" };
                    state.instr(&format!("movb {}, 0(%ecx)", low));
                }
                TypeKind::Short | TypeKind::UShort => {
                    let low = if work_reg == "%ebx" { "%bx" } else { "%ax" };
                    state.instr(&format!("movw {}, 0(%ecx)", low));
                }
                TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
                    state.instr(&format!("movl {}, 0(%ecx)", work_reg));
                }
                _ => {
                    return Err(CompilerError::codegen_error(format!(
                        "cannot increment a value of type '{}'",
                        inner.expr_type
                    )))
                }
            }
            Ok(Reg::Eax)
        }

        Reg::St0 => {
            // %ecx = &expr; %st(0) = 1.0, %st(1) = expr.
            state.pop_long(saved, Reg::Ecx);
            state.instr("fld1");

            let arith = match op {
                IncDecOp::PreIncrement | IncDecOp::PostIncrement => "fadd",
                IncDecOp::PreDecrement | IncDecOp::PostDecrement => "fsub",
            };
            state.instr(&format!("{} %st(1), %st(0)", arith));

            // Post forms pop the new value after storing, leaving the
            // original on top; pre forms keep the new value as result.
            let store = match (&inner.expr_type.kind, op) {
                (TypeKind::Float, IncDecOp::PostIncrement | IncDecOp::PostDecrement) => "fstps",
                (TypeKind::Float, _) => "fsts",
                (TypeKind::Double, IncDecOp::PostIncrement | IncDecOp::PostDecrement) => "fstpl",
                (TypeKind::Double, _) => "fstl",
                _ => {
                    return Err(CompilerError::codegen_error(format!(
                        "cannot increment a value of type '{}'",
                        inner.expr_type
                    )))
                }
            };
            state.instr(&format!("{} 0(%ecx)", store));
            Ok(Reg::St0)
        }

        _ => Err(unexpected_reg(reg)),
    }
}

// Pointers step by the size of what they point to; everything else by 1.
fn step_size(inner: &Expr) -> CompilerResult<i32> {
    match &inner.expr_type.kind {
        TypeKind::Pointer(pointee) => match &pointee.kind {
            TypeKind::Void | TypeKind::Function(_) | TypeKind::IncompleteArray(_) => {
                Err(CompilerError::codegen_error(format!(
                    "cannot increment a pointer to '{}'",
                    pointee
                )))
            }
            _ => Ok(pointee.size_of()),
        },
        _ => Ok(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcc_frontend::env::Env;
    use xcc_frontend::typed::ExprKind;
    use xcc_frontend::types::ExprType;

    fn stack_var(name: &str, var_type: ExprType) -> Expr {
        let mut env = Env::new().in_scope();
        env.push_stack(name, var_type.clone());
        Expr::new(
            ExprKind::Variable {
                name: name.to_string(),
                env,
            },
            var_type,
        )
    }

    fn gen(expr: &Expr) -> String {
        let mut state = CodeGen::new();
        gen_value(expr, &mut state).unwrap();
        state.finish()
    }

    fn inc_dec(op: IncDecOp, inner: Expr) -> Expr {
        let expr_type = inner.expr_type.clone();
        Expr::new(
            ExprKind::IncDec {
                op,
                expr: Box::new(inner),
            },
            expr_type,
        )
    }

    #[test]
    fn test_negate_long() {
        let expr = Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Negative,
                expr: Box::new(Expr::const_long(5)),
            },
            ExprType::long(),
        );
        assert!(gen(&expr).contains("neg %eax"));
    }

    #[test]
    fn test_negate_double_uses_fchs() {
        let expr = Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Negative,
                expr: Box::new(Expr::const_double(5.0)),
            },
            ExprType::double(),
        );
        assert!(gen(&expr).contains("fchs"));
    }

    #[test]
    fn test_logical_not() {
        let expr = Expr::new(
            ExprKind::Unary {
                op: UnaryOp::LogicalNot,
                expr: Box::new(Expr::const_long(5)),
            },
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("testl %eax, %eax"));
        assert!(asm.contains("sete %al"));
        assert!(asm.contains("movzbl %al, %eax"));
    }

    #[test]
    fn test_post_increment_long_keeps_old_value() {
        let expr = inc_dec(IncDecOp::PostIncrement, stack_var("x", ExprType::long()));
        let asm = gen(&expr);
        // New value computed in %ebx and stored; %eax keeps the original.
        assert!(asm.contains("addl $1, %ebx"));
        assert!(asm.contains("movl %ebx, 0(%ecx)"));
    }

    #[test]
    fn test_pre_decrement_long_returns_new_value() {
        let expr = inc_dec(IncDecOp::PreDecrement, stack_var("x", ExprType::long()));
        let asm = gen(&expr);
        assert!(asm.contains("subl $1, %eax"));
        assert!(asm.contains("movl %eax, 0(%ecx)"));
    }

    #[test]
    fn test_char_increment_stores_byte() {
        let expr = inc_dec(IncDecOp::PreIncrement, stack_var("c", ExprType::char()));
        assert!(gen(&expr).contains("movb %al, 0(%ecx)"));
    }

    #[test]
    fn test_pointer_steps_by_pointee_size() {
        let expr = inc_dec(
            IncDecOp::PreIncrement,
            stack_var("p", ExprType::pointer(ExprType::double())),
        );
        assert!(gen(&expr).contains("addl $8, %eax"));
    }

    #[test]
    fn test_double_post_increment_pops_after_store() {
        let expr = inc_dec(IncDecOp::PostIncrement, stack_var("d", ExprType::double()));
        let asm = gen(&expr);
        assert!(asm.contains("fld1"));
        assert!(asm.contains("fadd %st(1), %st(0)"));
        assert!(asm.contains("fstpl 0(%ecx)"));
    }

    #[test]
    fn test_float_pre_increment_keeps_new_value() {
        let expr = inc_dec(IncDecOp::PreIncrement, stack_var("f", ExprType::float()));
        assert!(gen(&expr).contains("fsts 0(%ecx)"));
    }

    #[test]
    fn test_void_pointer_increment_rejected() {
        let expr = inc_dec(
            IncDecOp::PreIncrement,
            stack_var("p", ExprType::pointer(ExprType::void())),
        );
        let mut state = CodeGen::new();
        assert!(gen_value(&expr, &mut state).is_err());
    }
}
