//! Expression code generation
//!
//! Every expression is generated for value or for address. A value lands
//! in %eax (integers, pointers, struct addresses) or %st(0) (float,
//! double); an address always lands in %eax. The typed tree has already
//! made every conversion explicit, so generation is a plain dispatch on
//! node and type kind.

use xcc_common::{CompilerError, CompilerResult};
use xcc_frontend::env::EntryKind;
use xcc_frontend::typed::{CastKind, Expr, ExprKind};
use xcc_frontend::types::{pack_arguments, ExprType, TypeKind, SIZEOF_POINTER};

use crate::binary;
use crate::emit::{CodeGen, Reg};
use crate::unary;

/// Generate code leaving the value of `expr` in a register. Struct and
/// union values are represented by their address in %eax.
pub fn gen_value(expr: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    match &expr.kind {
        ExprKind::ConstLong(value) => {
            state.instr(&format!("movl ${}, %eax", value));
            Ok(Reg::Eax)
        }

        ExprKind::ConstULong(value) => {
            state.instr(&format!("movl ${}, %eax", *value as i32));
            Ok(Reg::Eax)
        }

        ExprKind::ConstPtr(value) => {
            state.instr(&format!("movl ${}, %eax", *value as i32));
            Ok(Reg::Eax)
        }

        ExprKind::ConstFloat(value) => {
            let name = state.long_const(value.to_bits() as i32);
            state.instr(&format!("flds {}", name));
            Ok(Reg::St0)
        }

        ExprKind::ConstDouble(value) => {
            let bits = value.to_bits();
            let lo = bits as u32 as i32;
            let hi = (bits >> 32) as u32 as i32;
            let name = state.long_long_const(lo, hi);
            state.instr(&format!("fldl {}", name));
            Ok(Reg::St0)
        }

        ExprKind::ConstString(value) => {
            let name = state.string_const(value);
            state.instr(&format!("lea {}, %eax", name));
            Ok(Reg::Eax)
        }

        ExprKind::Variable { name, env } => gen_variable_value(name, env, &expr.expr_type, state),

        ExprKind::Assign { left, right } => gen_assign(left, right, state),

        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => gen_conditional(cond, then_expr, else_expr, state),

        ExprKind::FuncCall { func, args } => gen_func_call(func, args, &expr.expr_type, state),

        ExprKind::Attribute {
            expr: base, member, ..
        } => gen_attribute_value(base, member, &expr.expr_type, state),

        ExprKind::Reference(inner) => {
            gen_address(inner, state)?;
            Ok(Reg::Eax)
        }

        ExprKind::Dereference(inner) => gen_dereference(inner, state),

        ExprKind::Binary { op, left, right } => {
            binary::gen_binary(*op, left, right, &expr.expr_type, state)
        }

        ExprKind::Unary { op, expr: inner } => unary::gen_unary(*op, inner, state),

        ExprKind::IncDec { op, expr: inner } => unary::gen_inc_dec(*op, inner, state),

        ExprKind::Cast { cast, expr: inner } => gen_cast(*cast, inner, state),
    }
}

/// Generate code leaving the address of `expr` in %eax.
pub fn gen_address(expr: &Expr, state: &mut CodeGen) -> CompilerResult<()> {
    match &expr.kind {
        ExprKind::Variable { name, env } => {
            let entry = env.find(name).ok_or_else(|| {
                CompilerError::codegen_error(format!("unresolved name '{}'", name))
            })?;
            match entry.kind {
                EntryKind::Frame | EntryKind::Stack => {
                    state.instr(&format!("lea {}(%ebp), %eax", entry.offset));
                    Ok(())
                }
                EntryKind::Global => {
                    state.instr(&format!("lea {}, %eax", name));
                    Ok(())
                }
                EntryKind::Enum | EntryKind::Typedef => Err(CompilerError::codegen_error(format!(
                    "cannot take the address of '{}'",
                    name
                ))),
            }
        }

        ExprKind::Attribute { expr: base, member } => {
            if !base.expr_type.is_struct_or_union() {
                return Err(CompilerError::codegen_error(
                    "member access on a non-aggregate value",
                ));
            }
            gen_address(base, state)?;
            let offset = member_offset(&base.expr_type, member)?;
            state.instr(&format!("addl ${}, %eax", offset));
            Ok(())
        }

        ExprKind::Dereference(inner) => {
            let reg = gen_value(inner, state)?;
            if reg != Reg::Eax {
                return Err(CompilerError::codegen_error(
                    "dereferenced pointer not in %eax",
                ));
            }
            Ok(())
        }

        _ => Err(CompilerError::codegen_error(
            "expression is not an lvalue; cannot take its address",
        )),
    }
}

fn member_offset(aggregate: &ExprType, member: &str) -> CompilerResult<i32> {
    match &aggregate.kind {
        TypeKind::StructOrUnion(layout) => layout
            .find_member(member)
            .map(|m| m.offset)
            .ok_or_else(|| {
                CompilerError::codegen_error(format!("no member '{}' in {}", member, layout))
            }),
        _ => Err(CompilerError::codegen_error(
            "member access on a non-aggregate value",
        )),
    }
}

fn gen_variable_value(
    name: &str,
    env: &xcc_frontend::env::Env,
    expr_type: &ExprType,
    state: &mut CodeGen,
) -> CompilerResult<Reg> {
    let entry = env
        .find(name)
        .ok_or_else(|| CompilerError::codegen_error(format!("unresolved name '{}'", name)))?;

    match entry.kind {
        // Enum constants carry their value in the entry's offset field.
        EntryKind::Enum => {
            state.instr(&format!("movl ${}, %eax", entry.offset));
            Ok(Reg::Eax)
        }

        EntryKind::Frame | EntryKind::Stack => {
            let offset = entry.offset;
            match &expr_type.kind {
                TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
                    state.instr(&format!("movl {}(%ebp), %eax", offset));
                    Ok(Reg::Eax)
                }
                TypeKind::Char => {
                    state.instr(&format!("movsbl {}(%ebp), %eax", offset));
                    Ok(Reg::Eax)
                }
                TypeKind::UChar => {
                    state.instr(&format!("movzbl {}(%ebp), %eax", offset));
                    Ok(Reg::Eax)
                }
                TypeKind::Short => {
                    state.instr(&format!("movswl {}(%ebp), %eax", offset));
                    Ok(Reg::Eax)
                }
                TypeKind::UShort => {
                    state.instr(&format!("movzwl {}(%ebp), %eax", offset));
                    Ok(Reg::Eax)
                }
                TypeKind::Float => {
                    state.instr(&format!("flds {}(%ebp)", offset));
                    Ok(Reg::St0)
                }
                TypeKind::Double => {
                    state.instr(&format!("fldl {}(%ebp)", offset));
                    Ok(Reg::St0)
                }
                TypeKind::StructOrUnion(_) | TypeKind::Array(_, _) => {
                    state.instr(&format!("lea {}(%ebp), %eax", offset));
                    Ok(Reg::Eax)
                }
                _ => Err(CompilerError::codegen_error(format!(
                    "cannot load a value of type '{}'",
                    expr_type
                ))),
            }
        }

        EntryKind::Global => match &expr_type.kind {
            TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
                state.instr(&format!("movl {}, %eax", name));
                Ok(Reg::Eax)
            }
            TypeKind::Char => {
                state.instr(&format!("movsbl {}, %eax", name));
                Ok(Reg::Eax)
            }
            TypeKind::UChar => {
                state.instr(&format!("movzbl {}, %eax", name));
                Ok(Reg::Eax)
            }
            TypeKind::Short => {
                state.instr(&format!("movswl {}, %eax", name));
                Ok(Reg::Eax)
            }
            TypeKind::UShort => {
                state.instr(&format!("movzwl {}, %eax", name));
                Ok(Reg::Eax)
            }
            TypeKind::Float => {
                state.instr(&format!("flds {}", name));
                Ok(Reg::St0)
            }
            TypeKind::Double => {
                state.instr(&format!("fldl {}", name));
                Ok(Reg::St0)
            }
            TypeKind::Function(_) | TypeKind::StructOrUnion(_) | TypeKind::Array(_, _) => {
                state.instr(&format!("movl ${}, %eax", name));
                Ok(Reg::Eax)
            }
            _ => Err(CompilerError::codegen_error(format!(
                "cannot load a value of type '{}'",
                expr_type
            ))),
        },

        EntryKind::Typedef => Err(CompilerError::codegen_error(format!(
            "'{}' names a type, not a value",
            name
        ))),
    }
}

fn gen_assign(left: &Expr, right: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    // The target address is computed first and parked on the stack; the
    // right-hand side may clobber every register.
    gen_address(left, state)?;
    let saved = state.push_long(Reg::Eax);

    gen_value(right, state)?;

    match &left.expr_type.kind {
        TypeKind::Char | TypeKind::UChar => {
            state.pop_long(saved, Reg::Ebx);
            state.instr("movb %al, 0(%ebx)");
            Ok(Reg::Eax)
        }
        TypeKind::Short | TypeKind::UShort => {
            state.pop_long(saved, Reg::Ebx);
            state.instr("movw %ax, 0(%ebx)");
            Ok(Reg::Eax)
        }
        TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
            state.pop_long(saved, Reg::Ebx);
            state.instr("movl %eax, 0(%ebx)");
            Ok(Reg::Eax)
        }
        // The stored value stays on the FPU stack as the result.
        TypeKind::Float => {
            state.pop_long(saved, Reg::Ebx);
            state.instr("fsts 0(%ebx)");
            Ok(Reg::St0)
        }
        TypeKind::Double => {
            state.pop_long(saved, Reg::Ebx);
            state.instr("fstl 0(%ebx)");
            Ok(Reg::St0)
        }
        TypeKind::StructOrUnion(_) => {
            state.pop_long(saved, Reg::Edi);
            state.instr("movl %eax, %esi");
            state.instr(&format!("movl ${}, %ecx", left.expr_type.size_of()));
            state.mem_cpy();
            state.instr("movl %edi, %eax");
            Ok(Reg::Eax)
        }
        _ => Err(CompilerError::codegen_error(format!(
            "cannot assign to a value of type '{}'",
            left.expr_type
        ))),
    }
}

//          test cond
//          jz false ---+
//          then_expr   |
// +------- jmp finish  |
// |    false: <--------+
// |        else_expr
// +--> finish:
fn gen_conditional(
    cond: &Expr,
    then_expr: &Expr,
    else_expr: &Expr,
    state: &mut CodeGen,
) -> CompilerResult<Reg> {
    let stack_size = state.stack_size();
    let reg = gen_value(cond, state)?;
    state.force_stack_size_to(stack_size);

    gen_test(reg, state)?;

    let false_label = state.request_label();
    let finish_label = state.request_label();

    state.jz(false_label);

    gen_value(then_expr, state)?;

    state.jmp(finish_label);
    state.label(false_label);

    let ret = gen_value(else_expr, state)?;

    state.label(finish_label);
    Ok(ret)
}

/// Set ZF from the value in `reg`: `testl` for integers, a compare
/// against 0.0 for the FPU top (which is popped).
pub(crate) fn gen_test(reg: Reg, state: &mut CodeGen) -> CompilerResult<()> {
    match reg {
        Reg::Eax => {
            state.instr("testl %eax, %eax");
            Ok(())
        }
        Reg::St0 => {
            state.instr("fldz");
            state.instr("fucomip %st(1), %st");
            state.instr("fstp %st(0)");
            Ok(())
        }
        _ => Err(CompilerError::codegen_error(
            "condition value in an unexpected register",
        )),
    }
}

// GCC's IA-32 calling convention: all arguments go on the stack, each
// slot at least 4 bytes. Scalars return in %eax or %st(0). A returned
// struct gets caller-allocated space whose address is passed as a hidden
// first argument; the callee hands the address back in %eax.
fn gen_func_call(
    func: &Expr,
    args: &[Expr],
    ret_type: &ExprType,
    state: &mut CodeGen,
) -> CompilerResult<Reg> {
    state.newline();
    state.comment(&format!(
        "Before pushing the arguments, stack size = {}.",
        state.stack_size()
    ));

    let arg_types: Vec<ExprType> = args.iter().map(|arg| arg.expr_type.clone()).collect();
    let (mut pack_size, mut offsets) = pack_arguments(&arg_types);

    let returns_struct = ret_type.is_struct_or_union();
    if returns_struct {
        state.comment("Allocate space for returning stack.");
        state.expand_stack_with_alignment(ret_type.size_of(), ret_type.alignment());

        // Keep the return area's address until the slots exist.
        state.instr("movl %esp, %eax");

        pack_size += SIZEOF_POINTER;
        for offset in &mut offsets {
            *offset += SIZEOF_POINTER;
        }
    }

    state.comment(&format!("Arguments take {} bytes.", pack_size));
    state.expand_stack_by(pack_size);
    state.newline();

    if returns_struct {
        state.comment("Putting extra argument for struct return address.");
        state.instr("movl %eax, 0(%esp)");
        state.newline();
    }

    // %ebp-relative base of the argument area.
    let header_base = -state.stack_size();

    // Evaluate in reverse order; each value is stored straight into its
    // slot, so earlier slots stay untouched while later args evaluate.
    for i in (0..args.len()).rev() {
        let arg = &args[i];
        let pos = header_base + offsets[i];
        state.comment(&format!("Argument {} is at {}", i, pos));

        let reg = gen_value(arg, state)?;
        match &arg.expr_type.kind {
            TypeKind::Char
            | TypeKind::UChar
            | TypeKind::Short
            | TypeKind::UShort
            | TypeKind::Long
            | TypeKind::ULong
            | TypeKind::Pointer(_)
            | TypeKind::Array(_, _) => {
                expect_reg(reg, Reg::Eax)?;
                state.instr(&format!("movl %eax, {}(%ebp)", pos));
            }
            TypeKind::Float | TypeKind::Double => {
                expect_reg(reg, Reg::St0)?;
                state.instr(&format!("fstpl {}(%ebp)", pos));
            }
            TypeKind::StructOrUnion(_) => {
                expect_reg(reg, Reg::Eax)?;
                state.instr("movl %eax, %esi");
                state.instr(&format!("lea {}(%ebp), %edi", pos));
                state.instr(&format!("movl ${}, %ecx", arg.expr_type.size_of()));
                state.mem_cpy();
            }
            _ => {
                return Err(CompilerError::codegen_error(format!(
                    "cannot pass an argument of type '{}'",
                    arg.expr_type
                )))
            }
        }
        state.newline();
    }

    // Argument evaluation may have moved %esp; resync before the call.
    state.force_stack_size_to(-header_base);

    match &func.expr_type.kind {
        TypeKind::Function(_) => gen_address(func, state)?,
        TypeKind::Pointer(_) => {
            gen_value(func, state)?;
        }
        _ => {
            return Err(CompilerError::codegen_error(format!(
                "called value has type '{}', not a function",
                func.expr_type
            )))
        }
    }

    state.instr("call *%eax");
    state.comment("Function returned.");
    state.newline();

    match ret_type.kind {
        TypeKind::Float | TypeKind::Double => Ok(Reg::St0),
        _ => Ok(Reg::Eax),
    }
}

fn expect_reg(got: Reg, want: Reg) -> CompilerResult<()> {
    if got != want {
        return Err(CompilerError::codegen_error(format!(
            "value in {} where {} was expected",
            got, want
        )));
    }
    Ok(())
}

fn gen_attribute_value(
    base: &Expr,
    member: &str,
    result_type: &ExprType,
    state: &mut CodeGen,
) -> CompilerResult<Reg> {
    let reg = gen_value(base, state)?;
    expect_reg(reg, Reg::Eax)?;
    if !base.expr_type.is_struct_or_union() {
        return Err(CompilerError::codegen_error(
            "member access on a non-aggregate value",
        ));
    }

    let offset = member_offset(&base.expr_type, member)?;

    match &result_type.kind {
        TypeKind::Array(_, _) | TypeKind::StructOrUnion(_) => {
            state.instr(&format!("addl ${}, %eax", offset));
            Ok(Reg::Eax)
        }
        TypeKind::Char => {
            state.instr(&format!("movsbl {}(%eax), %eax", offset));
            Ok(Reg::Eax)
        }
        TypeKind::UChar => {
            state.instr(&format!("movzbl {}(%eax), %eax", offset));
            Ok(Reg::Eax)
        }
        TypeKind::Short => {
            state.instr(&format!("movswl {}(%eax), %eax", offset));
            Ok(Reg::Eax)
        }
        TypeKind::UShort => {
            state.instr(&format!("movzwl {}(%eax), %eax", offset));
            Ok(Reg::Eax)
        }
        TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
            state.instr(&format!("movl {}(%eax), %eax", offset));
            Ok(Reg::Eax)
        }
        TypeKind::Float => {
            state.instr(&format!("flds {}(%eax)", offset));
            Ok(Reg::St0)
        }
        TypeKind::Double => {
            state.instr(&format!("fldl {}(%eax)", offset));
            Ok(Reg::St0)
        }
        _ => Err(CompilerError::codegen_error(format!(
            "cannot load a member of type '{}'",
            result_type
        ))),
    }
}

fn gen_dereference(inner: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    let reg = gen_value(inner, state)?;
    expect_reg(reg, Reg::Eax)?;

    let pointee = match &inner.expr_type.kind {
        TypeKind::Pointer(pointee) => pointee,
        _ => {
            return Err(CompilerError::codegen_error(format!(
                "cannot dereference a value of type '{}'",
                inner.expr_type
            )))
        }
    };

    match &pointee.kind {
        // Arrays, functions, and aggregates keep the address as the value.
        TypeKind::Array(_, _) | TypeKind::Function(_) | TypeKind::StructOrUnion(_) => Ok(Reg::Eax),
        TypeKind::Char => {
            state.instr("movsbl 0(%eax), %eax");
            Ok(Reg::Eax)
        }
        TypeKind::UChar => {
            state.instr("movzbl 0(%eax), %eax");
            Ok(Reg::Eax)
        }
        TypeKind::Short => {
            state.instr("movswl 0(%eax), %eax");
            Ok(Reg::Eax)
        }
        TypeKind::UShort => {
            state.instr("movzwl 0(%eax), %eax");
            Ok(Reg::Eax)
        }
        TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
            state.instr("movl 0(%eax), %eax");
            Ok(Reg::Eax)
        }
        TypeKind::Float => {
            state.instr("flds 0(%eax)");
            Ok(Reg::St0)
        }
        TypeKind::Double => {
            state.instr("fldl 0(%eax)");
            Ok(Reg::St0)
        }
        _ => Err(CompilerError::codegen_error(format!(
            "cannot dereference a pointer to '{}'",
            pointee
        ))),
    }
}

fn gen_cast(cast: CastKind, inner: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    let reg = gen_value(inner, state)?;
    match cast {
        // Reinterpretations: the bits are already right.
        CastKind::Nop
        | CastKind::PreserveInt8
        | CastKind::PreserveInt16
        | CastKind::FloatToDouble
        | CastKind::DoubleToFloat => Ok(reg),

        CastKind::FloatToInt32 | CastKind::DoubleToInt32 => {
            state.convert_float_to_long();
            Ok(Reg::Eax)
        }

        CastKind::Int32ToFloat | CastKind::Int32ToDouble => {
            state.convert_long_to_float();
            Ok(Reg::St0)
        }

        CastKind::Int16ToInt32 => {
            state.instr("movswl %ax, %eax");
            Ok(reg)
        }

        CastKind::Int8ToInt16 | CastKind::Int8ToInt32 => {
            state.instr("movsbl %al, %eax");
            Ok(reg)
        }

        CastKind::UInt16ToUInt32 => {
            state.instr("movzwl %ax, %eax");
            Ok(reg)
        }

        CastKind::UInt8ToUInt16 | CastKind::UInt8ToUInt32 => {
            state.instr("movzbl %al, %eax");
            Ok(reg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcc_frontend::env::Env;

    #[test]
    fn test_const_long_in_eax() {
        let mut state = CodeGen::new();
        let reg = gen_value(&Expr::const_long(42), &mut state).unwrap();
        assert_eq!(reg, Reg::Eax);
        assert!(state.finish().contains("movl $42, %eax"));
    }

    #[test]
    fn test_const_double_loads_from_rodata() {
        let mut state = CodeGen::new();
        let reg = gen_value(&Expr::const_double(1.0), &mut state).unwrap();
        assert_eq!(reg, Reg::St0);
        let asm = state.finish();
        assert!(asm.contains("fldl .LC0"));
        // 1.0 = 0x3FF0000000000000: low word 0, high word 0x3FF00000.
        assert!(asm.contains(".long 0\n"));
        assert!(asm.contains(&format!(".long {}", 0x3ff00000)));
    }

    #[test]
    fn test_stack_variable_loads() {
        let mut env = Env::new().in_scope();
        env.push_stack("x", ExprType::char());
        let var = Expr::new(
            ExprKind::Variable {
                name: "x".to_string(),
                env,
            },
            ExprType::char(),
        );
        let mut state = CodeGen::new();
        gen_value(&var, &mut state).unwrap();
        assert!(state.finish().contains("movsbl -4(%ebp), %eax"));
    }

    #[test]
    fn test_global_address() {
        let mut env = Env::new();
        env.push_global("counter", ExprType::long());
        let var = Expr::new(
            ExprKind::Variable {
                name: "counter".to_string(),
                env,
            },
            ExprType::long(),
        );
        let mut state = CodeGen::new();
        gen_address(&var, &mut state).unwrap();
        assert!(state.finish().contains("lea counter, %eax"));
    }

    #[test]
    fn test_assign_long_stores_through_ebx() {
        let mut env = Env::new().in_scope();
        env.push_stack("x", ExprType::long());
        let left = Expr::new(
            ExprKind::Variable {
                name: "x".to_string(),
                env,
            },
            ExprType::long(),
        );
        let assign = Expr::new(
            ExprKind::Assign {
                left: Box::new(left),
                right: Box::new(Expr::const_long(7)),
            },
            ExprType::long(),
        );
        let mut state = CodeGen::new();
        let reg = gen_value(&assign, &mut state).unwrap();
        assert_eq!(reg, Reg::Eax);
        let asm = state.finish();
        assert!(asm.contains("lea -4(%ebp), %eax"));
        assert!(asm.contains("pushl %eax"));
        assert!(asm.contains("movl %eax, 0(%ebx)"));
    }

    #[test]
    fn test_conditional_branches() {
        let cond = Expr::new(
            ExprKind::Conditional {
                cond: Box::new(Expr::const_long(1)),
                then_expr: Box::new(Expr::const_long(2)),
                else_expr: Box::new(Expr::const_long(3)),
            },
            ExprType::long(),
        );
        let mut state = CodeGen::new();
        gen_value(&cond, &mut state).unwrap();
        let asm = state.finish();
        assert!(asm.contains("testl %eax, %eax"));
        assert!(asm.contains("jz .L2"));
        assert!(asm.contains("jmp .L3"));
        assert!(asm.contains(".L2:"));
        assert!(asm.contains(".L3:"));
    }

    #[test]
    fn test_cast_int_to_double() {
        let cast = Expr::new(
            ExprKind::Cast {
                cast: CastKind::Int32ToDouble,
                expr: Box::new(Expr::const_long(1)),
            },
            ExprType::double(),
        );
        let mut state = CodeGen::new();
        let reg = gen_value(&cast, &mut state).unwrap();
        assert_eq!(reg, Reg::St0);
        assert!(state.finish().contains("fildl 0(%esp)"));
    }

    #[test]
    fn test_cannot_address_constant() {
        let mut state = CodeGen::new();
        assert!(gen_address(&Expr::const_long(1), &mut state).is_err());
    }
}
