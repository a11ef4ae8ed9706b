//! Statement code generation
//!
//! Statements leave no value behind: every expression statement records
//! the stack size first and forces %esp back to it afterwards, so
//! temporaries never leak across statement boundaries. Loops and
//! switches scope their break/continue targets through the emitter's
//! label pack stack.

use std::collections::HashMap;

use xcc_common::{CompilerError, CompilerResult};
use xcc_frontend::env::Env;
use xcc_frontend::typed::{Decln, Expr, Stmt};
use xcc_frontend::types::{TypeKind, SIZEOF_POINTER};

use crate::emit::{CodeGen, Reg};
use crate::expr::{gen_test, gen_value};

pub fn gen_stmt(stmt: &Stmt, env: &Env, state: &mut CodeGen) -> CompilerResult<()> {
    match stmt {
        Stmt::Compound { declns, stmts } => {
            for (env, decln) in declns {
                gen_local_decln(decln, env, state)?;
            }
            for (env, stmt) in stmts {
                gen_stmt(stmt, env, state)?;
            }
            Ok(())
        }

        Stmt::Expr(expr) => {
            if let Some(expr) = expr {
                gen_expr_stmt(expr, state)?;
            }
            Ok(())
        }

        Stmt::If { cond, then } => {
            let reg = gen_expr_stmt(cond, state)?;
            let finish_label = state.request_label();
            gen_test(reg, state)?;
            state.jz(finish_label);
            gen_stmt(then, env, state)?;
            state.label(finish_label);
            Ok(())
        }

        Stmt::IfElse {
            cond,
            then,
            otherwise,
        } => {
            let reg = gen_expr_stmt(cond, state)?;
            gen_test(reg, state)?;
            let false_label = state.request_label();
            let finish_label = state.request_label();
            state.jz(false_label);
            gen_stmt(then, env, state)?;
            state.jmp(finish_label);
            state.label(false_label);
            gen_stmt(otherwise, env, state)?;
            state.label(finish_label);
            Ok(())
        }

        Stmt::While { cond, body } => {
            let start_label = state.request_label();
            let finish_label = state.request_label();

            state.label(start_label);
            let reg = gen_expr_stmt(cond, state)?;
            gen_test(reg, state)?;
            state.jz(finish_label);

            state.in_loop(start_label, finish_label);
            gen_stmt(body, env, state)?;
            state.out_labels();

            state.jmp(start_label);
            state.label(finish_label);
            Ok(())
        }

        Stmt::DoWhile { body, cond } => {
            let start_label = state.request_label();
            let finish_label = state.request_label();
            let continue_label = state.request_label();

            state.label(start_label);

            state.in_loop(continue_label, finish_label);
            gen_stmt(body, env, state)?;
            state.out_labels();

            state.label(continue_label);
            let reg = gen_expr_stmt(cond, state)?;
            gen_test(reg, state)?;
            state.jnz(start_label);

            state.label(finish_label);
            Ok(())
        }

        Stmt::For {
            init,
            cond,
            loop_expr,
            body,
        } => {
            if let Some(init) = init {
                gen_expr_stmt(init, state)?;
            }

            let start_label = state.request_label();
            let finish_label = state.request_label();
            let continue_label = state.request_label();

            state.label(start_label);
            if let Some(cond) = cond {
                let reg = gen_expr_stmt(cond, state)?;
                gen_test(reg, state)?;
                state.jz(finish_label);
            }

            state.in_loop(continue_label, finish_label);
            gen_stmt(body, env, state)?;
            state.out_labels();

            state.label(continue_label);
            if let Some(loop_expr) = loop_expr {
                gen_expr_stmt(loop_expr, state)?;
            }
            state.jmp(start_label);
            state.label(finish_label);
            Ok(())
        }

        Stmt::Switch { expr, body } => gen_switch(expr, body, state),

        Stmt::Case { value, stmt } => {
            let label = state.case_label(*value)?;
            state.label(label);
            gen_stmt(stmt, env, state)
        }

        Stmt::Default(stmt) => {
            let label = state.default_label()?;
            state.label(label);
            gen_stmt(stmt, env, state)
        }

        Stmt::Return { expr, .. } => gen_return(expr.as_ref(), state),

        Stmt::Break => {
            let label = state.break_label()?;
            state.jmp(label);
            Ok(())
        }

        Stmt::Continue => {
            let label = state.continue_label()?;
            state.jmp(label);
            Ok(())
        }

        Stmt::Goto(label) => {
            let label = state.goto_label(label)?;
            state.jmp(label);
            Ok(())
        }

        Stmt::Labeled { label, stmt } => {
            let label_id = state.goto_label(label)?;
            state.label(label_id);
            let current = state.stack_size();
            state.force_stack_size_to(current);
            gen_stmt(stmt, env, state)
        }
    }
}

/// Evaluate an expression for side effects: the stack is restored to its
/// pre-expression size, discarding temporaries. The value register is
/// still valid afterwards (the resync uses `lea`).
fn gen_expr_stmt(expr: &Expr, state: &mut CodeGen) -> CompilerResult<Reg> {
    let stack_size = state.stack_size();
    let reg = gen_value(expr, state)?;
    state.force_stack_size_to(stack_size);
    Ok(reg)
}

/// Allocate a local's stack slot and run its initializer, if any.
fn gen_local_decln(decln: &Decln, env: &Env, state: &mut CodeGen) -> CompilerResult<()> {
    state.comment(&format!("{}: {}", decln.name, decln.decln_type));
    state.expand_stack_to(env.stack_size());

    let initializer = match &decln.initializer {
        Some(initializer) => initializer,
        None => return Ok(()),
    };

    let entry = env.find(&decln.name).ok_or_else(|| {
        CompilerError::codegen_error(format!("unresolved local '{}'", decln.name))
    })?;
    let offset = entry.offset;

    let stack_size = state.stack_size();
    gen_value(initializer, state)?;

    match &decln.decln_type.kind {
        TypeKind::Char | TypeKind::UChar => {
            state.instr(&format!("movb %al, {}(%ebp)", offset));
        }
        TypeKind::Short | TypeKind::UShort => {
            state.instr(&format!("movw %ax, {}(%ebp)", offset));
        }
        TypeKind::Long | TypeKind::ULong | TypeKind::Pointer(_) => {
            state.instr(&format!("movl %eax, {}(%ebp)", offset));
        }
        // Popped here: a declaration leaves nothing on the FPU stack.
        TypeKind::Float => {
            state.instr(&format!("fstps {}(%ebp)", offset));
        }
        TypeKind::Double => {
            state.instr(&format!("fstpl {}(%ebp)", offset));
        }
        TypeKind::StructOrUnion(_) => {
            state.instr("movl %eax, %esi");
            state.instr(&format!("lea {}(%ebp), %edi", offset));
            state.instr(&format!("movl ${}, %ecx", decln.decln_type.size_of()));
            state.mem_cpy();
        }
        _ => {
            return Err(CompilerError::codegen_error(format!(
                "cannot initialize a local of type '{}'",
                decln.decln_type
            )))
        }
    }

    state.force_stack_size_to(stack_size);
    Ok(())
}

fn gen_switch(expr: &Expr, body: &Stmt, state: &mut CodeGen) -> CompilerResult<()> {
    // A switch body is a compound statement; the case dispatch needs to
    // see its statements to grab the case values, and its declarations
    // only contribute stack space (jumping over an initializer skips it).
    let (declns, stmts) = match body {
        Stmt::Compound { declns, stmts } => (declns, stmts),
        _ => {
            return Err(CompilerError::codegen_error(
                "switch body must be a compound statement",
            ))
        }
    };

    let mut values = Vec::new();
    collect_case_values(body, &mut values);

    let mut value_to_label = HashMap::new();
    for value in &values {
        if value_to_label.contains_key(value) {
            return Err(CompilerError::codegen_error(format!(
                "duplicate case value {}",
                value
            )));
        }
        value_to_label.insert(*value, state.request_label());
    }

    let finish_label = state.request_label();

    let num_defaults = stmts
        .iter()
        .filter(|(_, stmt)| matches!(stmt, Stmt::Default(_)))
        .count();
    if num_defaults > 1 {
        return Err(CompilerError::codegen_error(
            "multiple default labels in one switch",
        ));
    }
    let default_label = if num_defaults == 1 {
        state.request_label()
    } else {
        finish_label
    };

    let saved_stack_size = state.stack_size();
    let stack_size = declns
        .last()
        .map(|(env, _)| env.stack_size())
        .unwrap_or(saved_stack_size);

    gen_expr_stmt(expr, state)?;

    state.force_stack_size_to(stack_size);

    // The jump list: one compare per case value, then the default.
    for value in &values {
        state.instr(&format!("cmpl ${}, %eax", value));
        state.jz(value_to_label[value]);
    }
    state.jmp(default_label);

    state.in_switch(finish_label, default_label, value_to_label);
    for (env, stmt) in stmts {
        gen_stmt(stmt, env, state)?;
    }
    state.out_labels();

    state.label(finish_label);
    state.force_stack_size_to(saved_stack_size);
    Ok(())
}

/// Collect the case values belonging to this switch, without descending
/// into nested switches.
fn collect_case_values(stmt: &Stmt, values: &mut Vec<i32>) {
    match stmt {
        Stmt::Case { value, stmt } => {
            values.push(*value);
            collect_case_values(stmt, values);
        }
        Stmt::Default(stmt) | Stmt::Labeled { stmt, .. } => collect_case_values(stmt, values),
        Stmt::Compound { stmts, .. } => {
            for (_, stmt) in stmts {
                collect_case_values(stmt, values);
            }
        }
        Stmt::If { then, .. } => collect_case_values(then, values),
        Stmt::IfElse {
            then, otherwise, ..
        } => {
            collect_case_values(then, values);
            collect_case_values(otherwise, values);
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::For { body, .. } => {
            collect_case_values(body, values);
        }
        // A nested switch owns its case labels.
        Stmt::Switch { .. } => {}
        _ => {}
    }
}

fn gen_return(expr: Option<&Expr>, state: &mut CodeGen) -> CompilerResult<()> {
    let stack_size = state.stack_size();

    if let Some(expr) = expr {
        gen_value(expr, state)?;

        // A returned struct is copied to the caller's area, whose
        // address came in as the hidden argument at 8(%ebp).
        if expr.expr_type.is_struct_or_union() {
            state.instr("movl %eax, %esi");
            state.instr(&format!("movl {}(%ebp), %edi", 2 * SIZEOF_POINTER));
            state.instr(&format!("movl ${}, %ecx", expr.expr_type.size_of()));
            state.mem_cpy();
            state.instr(&format!("movl {}(%ebp), %eax", 2 * SIZEOF_POINTER));
        }

        state.force_stack_size_to(stack_size);
    }

    let label = state.return_label();
    state.jmp(label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use xcc_frontend::Frontend;

    // Generate a whole function and return its assembly.
    fn gen_function(source: &str) -> String {
        let unit = Frontend::analyze_source("test.c", source).unwrap();
        crate::generate(&unit).unwrap()
    }

    #[test]
    fn test_expr_stmt_restores_stack() {
        let asm = gen_function("int f(int a) { a + 1; return a; }");
        assert!(asm.contains("lea 0(%ebp), %esp"));
    }

    #[test]
    fn test_while_loop_shape() {
        let asm = gen_function("int f(int n) { while (n) n = n - 1; return n; }");
        // Condition test at the top, back edge at the bottom.
        assert!(asm.contains("jz .L"));
        assert!(asm.contains("jmp .L"));
    }

    #[test]
    fn test_do_while_uses_jnz_back_edge() {
        let asm = gen_function("int f(int n) { do n = n - 1; while (n); return n; }");
        assert!(asm.contains("jnz .L"));
    }

    #[test]
    fn test_break_outside_loop_is_error() {
        let unit = Frontend::analyze_source("test.c", "int f() { break; return 0; }").unwrap();
        let err = crate::generate(&unit).unwrap_err();
        assert!(err.to_string().contains("break"));
    }

    #[test]
    fn test_switch_dispatch_chain() {
        let asm = gen_function(
            "int f(int x) { switch (x) { case 1: return 10; case 2: return 20; default: return 0; } }",
        );
        assert!(asm.contains("cmpl $1, %eax"));
        assert!(asm.contains("cmpl $2, %eax"));
        // One jz per case plus the default jump.
        assert!(asm.matches("jmp .L").count() >= 1);
    }

    #[test]
    fn test_duplicate_case_rejected() {
        let unit = Frontend::analyze_source(
            "test.c",
            "int f(int x) { switch (x) { case 1: return 1; case 1: return 2; } return 0; }",
        )
        .unwrap();
        let err = crate::generate(&unit).unwrap_err();
        assert!(err.to_string().contains("duplicate case"));
    }

    #[test]
    fn test_local_initializer_stores_to_slot() {
        let asm = gen_function("int f() { int x = 42; return x; }");
        assert!(asm.contains("movl %eax, -4(%ebp)"));
    }

    #[test]
    fn test_goto_targets_function_scope_label() {
        let asm = gen_function("int f() { goto done; done: return 1; }");
        // The label is allocated at function entry, right after .L for
        // the return label.
        assert!(asm.contains("jmp .L"));
    }

    #[test]
    fn test_return_jumps_to_shared_epilogue() {
        let asm = gen_function("void f(int x) { if (x) return; x = 1; }");
        // Both the explicit return and fall-through exit through one
        // leave/ret pair.
        assert_eq!(asm.matches("leave").count(), 1);
        assert_eq!(asm.matches("\n    ret\n").count(), 1);
    }
}
