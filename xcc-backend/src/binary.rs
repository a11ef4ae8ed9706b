//! Binary operator code generation
//!
//! Integral operands arrive as %eax = left, %ebx = right with the stack
//! unchanged; the operation leaves the result in %eax. Floating operands
//! arrive as %st(0) = left, %st(1) = right; the FPU pops both and pushes
//! the result. The left value survives right-operand evaluation by going
//! through the memory stack.

use xcc_common::{CompilerError, CompilerResult};
use xcc_frontend::typed::{BinaryOp, Expr};
use xcc_frontend::types::{ExprType, TypeKind};

use crate::emit::{CodeGen, Reg};
use crate::expr::{gen_test, gen_value};

pub fn gen_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    result_type: &ExprType,
    state: &mut CodeGen,
) -> CompilerResult<Reg> {
    match op {
        BinaryOp::LogicalAnd => gen_logical_and(left, right, state),
        BinaryOp::LogicalOr => gen_logical_or(left, right, state),
        _ => gen_arithmetic(op, left, right, result_type, state),
    }
}

fn gen_arithmetic(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    result_type: &ExprType,
    state: &mut CodeGen,
) -> CompilerResult<Reg> {
    // Comparisons carry a long result type but operate on the operand
    // type; everything else operates on the result type.
    let operand_type = if is_comparison(op) {
        &left.expr_type
    } else {
        result_type
    };

    match &operand_type.kind {
        TypeKind::Long => {
            prepare_integral_operands(left, right, state)?;
            operate_long(op, state)?;
            Ok(Reg::Eax)
        }
        TypeKind::ULong => {
            prepare_integral_operands(left, right, state)?;
            operate_ulong(op, state)?;
            Ok(Reg::Eax)
        }
        TypeKind::Float => {
            gen_value_expecting(left, Reg::St0, state)?;
            let saved = state.push_float_pop();
            gen_value_expecting(right, Reg::St0, state)?;
            state.pop_float(saved);
            operate_float(op, state)
        }
        TypeKind::Double => {
            gen_value_expecting(left, Reg::St0, state)?;
            let saved = state.push_double_pop();
            gen_value_expecting(right, Reg::St0, state)?;
            state.pop_double(saved);
            operate_float(op, state)
        }
        _ => Err(CompilerError::codegen_error(format!(
            "binary operator on operands of type '{}'",
            operand_type
        ))),
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Less
            | BinaryOp::Greater
            | BinaryOp::LessEqual
            | BinaryOp::GreaterEqual
            | BinaryOp::Equal
            | BinaryOp::NotEqual
    )
}

fn gen_value_expecting(expr: &Expr, want: Reg, state: &mut CodeGen) -> CompilerResult<Reg> {
    let reg = gen_value(expr, state)?;
    if reg != want {
        return Err(CompilerError::codegen_error(format!(
            "operand in {} where {} was expected",
            reg, want
        )));
    }
    Ok(reg)
}

/// Leave %eax = left, %ebx = right, stack unchanged.
fn prepare_integral_operands(
    left: &Expr,
    right: &Expr,
    state: &mut CodeGen,
) -> CompilerResult<()> {
    gen_value_expecting(left, Reg::Eax, state)?;
    let saved = state.push_long(Reg::Eax);
    gen_value_expecting(right, Reg::Eax, state)?;
    state.instr("movl %eax, %ebx");
    state.pop_long(saved, Reg::Eax);
    Ok(())
}

fn operate_long(op: BinaryOp, state: &mut CodeGen) -> CompilerResult<()> {
    match op {
        BinaryOp::Mul => state.instr("imul %ebx"),
        BinaryOp::Div => {
            state.instr("cltd");
            state.instr("idivl %ebx");
        }
        BinaryOp::Mod => {
            state.instr("cltd");
            state.instr("idivl %ebx");
            state.instr("movl %edx, %eax");
        }
        BinaryOp::Add => state.instr("addl %ebx, %eax"),
        BinaryOp::Sub => state.instr("subl %ebx, %eax"),
        BinaryOp::LShift => shift("sall", state),
        BinaryOp::RShift => shift("sarl", state),
        BinaryOp::BitwiseAnd => state.instr("andl %ebx, %eax"),
        BinaryOp::Xor => state.instr("xorl %ebx, %eax"),
        BinaryOp::BitwiseOr => state.instr("orl %ebx, %eax"),
        BinaryOp::Less => set_compare("setl", state),
        BinaryOp::Greater => set_compare("setg", state),
        BinaryOp::LessEqual => set_compare("setle", state),
        BinaryOp::GreaterEqual => set_compare("setge", state),
        BinaryOp::Equal => set_compare("sete", state),
        BinaryOp::NotEqual => set_compare("setne", state),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            return Err(CompilerError::codegen_error(
                "short-circuit operator in arithmetic path",
            ))
        }
    }
    Ok(())
}

fn operate_ulong(op: BinaryOp, state: &mut CodeGen) -> CompilerResult<()> {
    match op {
        BinaryOp::Mul => state.instr("mul %ebx"),
        BinaryOp::Div => {
            state.instr("cltd");
            state.instr("divl %ebx");
        }
        BinaryOp::Mod => {
            state.instr("cltd");
            state.instr("divl %ebx");
            state.instr("movl %edx, %eax");
        }
        BinaryOp::RShift => shift("shrl", state),
        BinaryOp::Less => set_compare("setb", state),
        BinaryOp::Greater => set_compare("seta", state),
        BinaryOp::LessEqual => set_compare("setna", state),
        BinaryOp::GreaterEqual => set_compare("setnb", state),
        // Addition, subtraction, bit operations, left shift, and the
        // equality tests are sign-agnostic.
        _ => return operate_long(op, state),
    }
    Ok(())
}

// The shift count has to go through %cl.
fn shift(mnemonic: &str, state: &mut CodeGen) {
    state.instr("movb %bl, %cl");
    state.instr(&format!("{} %cl, %eax", mnemonic));
}

fn set_compare(set: &str, state: &mut CodeGen) {
    state.instr("cmpl %ebx, %eax");
    state.instr(&format!("{} %al", set));
    state.instr("movzbl %al, %eax");
}

fn operate_float(op: BinaryOp, state: &mut CodeGen) -> CompilerResult<Reg> {
    match op {
        BinaryOp::Add => {
            state.instr("faddp");
            Ok(Reg::St0)
        }
        BinaryOp::Sub => {
            state.instr("fsubp");
            Ok(Reg::St0)
        }
        BinaryOp::Mul => {
            state.instr("fmulp");
            Ok(Reg::St0)
        }
        BinaryOp::Div => {
            state.instr("fdivp");
            Ok(Reg::St0)
        }
        BinaryOp::Less => set_compare_float("setb", state),
        BinaryOp::Greater => set_compare_float("seta", state),
        BinaryOp::LessEqual => set_compare_float("setna", state),
        BinaryOp::GreaterEqual => set_compare_float("setnb", state),
        BinaryOp::Equal => set_compare_float("sete", state),
        BinaryOp::NotEqual => set_compare_float("setne", state),
        _ => Err(CompilerError::codegen_error(
            "integral operator on floating operands",
        )),
    }
}

// %st(0) = left, %st(1) = right: compare, empty the FPU stack, set %al.
fn set_compare_float(set: &str, state: &mut CodeGen) -> CompilerResult<Reg> {
    state.instr("fucomip %st(1), %st");
    state.instr("fstp %st(0)");
    state.instr(&format!("{} %al", set));
    state.instr("movzbl %al, %eax");
    Ok(Reg::Eax)
}

// Each route through a short-circuit operator takes exactly one jump:
//
//     test lhs, jz reset
//     test rhs, jz reset
//     eax = 1
//     jmp finish
//   reset:
//     eax = 0
//   finish:
fn gen_logical_and(left: &Expr, right: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    let reset_label = state.request_label();
    let finish_label = state.request_label();

    let reg = gen_value(left, state)?;
    gen_test(reg, state)?;
    state.jz(reset_label);

    let reg = gen_value(right, state)?;
    gen_test(reg, state)?;
    state.jz(reset_label);

    state.instr("movl $1, %eax");
    state.jmp(finish_label);
    state.label(reset_label);
    state.instr("movl $0, %eax");
    state.label(finish_label);

    Ok(Reg::Eax)
}

fn gen_logical_or(left: &Expr, right: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    let set_label = state.request_label();
    let finish_label = state.request_label();

    let reg = gen_value(left, state)?;
    gen_test(reg, state)?;
    state.jnz(set_label);

    let reg = gen_value(right, state)?;
    gen_test(reg, state)?;
    state.jnz(set_label);

    state.instr("movl $0, %eax");
    state.jmp(finish_label);
    state.label(set_label);
    state.instr("movl $1, %eax");
    state.label(finish_label);

    Ok(Reg::Eax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcc_frontend::typed::ExprKind;

    fn binary(op: BinaryOp, left: Expr, right: Expr, result_type: ExprType) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            result_type,
        )
    }

    fn gen(expr: &Expr) -> String {
        let mut state = CodeGen::new();
        gen_value(expr, &mut state).unwrap();
        state.finish()
    }

    #[test]
    fn test_long_add() {
        let expr = binary(
            BinaryOp::Add,
            Expr::const_long(1),
            Expr::const_long(2),
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("pushl %eax"));
        assert!(asm.contains("movl %eax, %ebx"));
        assert!(asm.contains("popl %eax"));
        assert!(asm.contains("addl %ebx, %eax"));
    }

    #[test]
    fn test_signed_division_sign_extends() {
        let expr = binary(
            BinaryOp::Div,
            Expr::const_long(7),
            Expr::const_long(2),
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("cltd"));
        assert!(asm.contains("idivl %ebx"));
    }

    #[test]
    fn test_modulo_takes_edx() {
        let expr = binary(
            BinaryOp::Mod,
            Expr::const_long(7),
            Expr::const_long(2),
            ExprType::long(),
        );
        assert!(gen(&expr).contains("movl %edx, %eax"));
    }

    #[test]
    fn test_shift_count_through_cl() {
        let expr = binary(
            BinaryOp::LShift,
            Expr::const_long(1),
            Expr::const_long(3),
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("movb %bl, %cl"));
        assert!(asm.contains("sall %cl, %eax"));
    }

    #[test]
    fn test_unsigned_right_shift_is_logical() {
        let expr = binary(
            BinaryOp::RShift,
            Expr::const_ulong(8),
            Expr::const_ulong(1),
            ExprType::ulong(),
        );
        assert!(gen(&expr).contains("shrl %cl, %eax"));
    }

    #[test]
    fn test_signed_comparison_sets_setl() {
        let expr = binary(
            BinaryOp::Less,
            Expr::const_long(1),
            Expr::const_long(2),
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("cmpl %ebx, %eax"));
        assert!(asm.contains("setl %al"));
        assert!(asm.contains("movzbl %al, %eax"));
    }

    #[test]
    fn test_unsigned_comparison_sets_setb() {
        let expr = binary(
            BinaryOp::Less,
            Expr::const_ulong(1),
            Expr::const_ulong(2),
            ExprType::long(),
        );
        assert!(gen(&expr).contains("setb %al"));
    }

    #[test]
    fn test_double_add_goes_through_memory() {
        let expr = binary(
            BinaryOp::Add,
            Expr::const_double(1.0),
            Expr::const_double(2.0),
            ExprType::double(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("fstpl 0(%esp)"));
        assert!(asm.contains("faddp"));
    }

    #[test]
    fn test_double_comparison_empties_fpu_stack() {
        let expr = binary(
            BinaryOp::Equal,
            Expr::const_double(1.0),
            Expr::const_double(2.0),
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert!(asm.contains("fucomip %st(1), %st"));
        assert!(asm.contains("fstp %st(0)"));
        assert!(asm.contains("sete %al"));
    }

    #[test]
    fn test_logical_and_short_circuits() {
        let expr = binary(
            BinaryOp::LogicalAnd,
            Expr::const_long(1),
            Expr::const_long(0),
            ExprType::long(),
        );
        let asm = gen(&expr);
        assert_eq!(asm.matches("jz .L2").count(), 2);
        assert!(asm.contains("movl $1, %eax"));
        assert!(asm.contains("jmp .L3"));
        assert!(asm.contains("movl $0, %eax"));
    }

    #[test]
    fn test_logical_or_jumps_on_nonzero() {
        let expr = binary(
            BinaryOp::LogicalOr,
            Expr::const_long(0),
            Expr::const_long(1),
            ExprType::long(),
        );
        assert_eq!(gen(&expr).matches("jnz .L2").count(), 2);
    }
}
