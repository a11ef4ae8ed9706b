//! External definitions
//!
//! A translation unit is a sequence of function definitions and
//! file-scope objects. Functions get the standard prologue and a shared
//! epilogue every `return` jumps to. Initialized globals are emitted as
//! `.data` records; tentative definitions become `.comm`; plain extern
//! declarations emit nothing.

use xcc_common::{CompilerError, CompilerResult};
use xcc_frontend::typed::{ExprKind, ExternDecln, FuncDef, GlobalDecln, TranslnUnit};
use xcc_frontend::types::TypeKind;

use crate::emit::CodeGen;
use crate::stmt::gen_stmt;

pub fn gen_transln_unit(unit: &TranslnUnit, state: &mut CodeGen) -> CompilerResult<()> {
    for decln in &unit.declns {
        match decln {
            ExternDecln::Func(func) => gen_func_def(func, state)?,
            ExternDecln::Obj(obj) => gen_global_decln(obj, state)?,
        }
    }
    Ok(())
}

//     .text
//     .globl <func>
// <func>:
//     pushl %ebp
//     movl %esp, %ebp
//     ...
//     leave
//     ret
fn gen_func_def(func: &FuncDef, state: &mut CodeGen) -> CompilerResult<()> {
    state.text_section();
    state.comment(&format!("fn {}: {}", func.name, func.func_type));
    state.globl(&func.name);
    state.func_start(&func.name);

    let mut goto_labels = Vec::new();
    func.body.collect_labels(&mut goto_labels);
    state.in_function(&goto_labels);

    gen_stmt(&func.body, &func.env, state)?;

    let return_label = state.return_label();
    state.label(return_label);
    state.out_function();

    state.leave();
    state.ret();
    state.newline();
    Ok(())
}

fn gen_global_decln(obj: &GlobalDecln, state: &mut CodeGen) -> CompilerResult<()> {
    // A plain extern declaration is someone else's definition.
    if obj.is_extern {
        return Ok(());
    }

    let initializer = match &obj.initializer {
        Some(initializer) => initializer,
        None => {
            // Tentative definition: common storage, zero-initialized by
            // the linker.
            state.comm(
                &obj.name,
                obj.decln_type.size_of(),
                obj.decln_type.alignment(),
            );
            return Ok(());
        }
    };

    state.data_section();
    state.globl(&obj.name);
    state.align(obj.decln_type.alignment());
    state.named_label(&obj.name);
    gen_global_initializer(obj, initializer, state)
}

fn gen_global_initializer(
    obj: &GlobalDecln,
    initializer: &xcc_frontend::typed::Expr,
    state: &mut CodeGen,
) -> CompilerResult<()> {
    let value = match &initializer.kind {
        ExprKind::ConstLong(value) => Some(*value),
        ExprKind::ConstULong(value) | ExprKind::ConstPtr(value) => Some(*value as i32),
        _ => None,
    };

    match (&obj.decln_type.kind, &initializer.kind) {
        (TypeKind::Char | TypeKind::UChar, _) => match value {
            Some(value) => {
                state.byte_directive(value);
                Ok(())
            }
            None => Err(bad_initializer(obj)),
        },
        (TypeKind::Short | TypeKind::UShort, _) => match value {
            Some(value) => {
                state.value_directive(value);
                Ok(())
            }
            None => Err(bad_initializer(obj)),
        },
        (TypeKind::Long | TypeKind::ULong, _) => match value {
            Some(value) => {
                state.long_directive(value);
                Ok(())
            }
            None => Err(bad_initializer(obj)),
        },
        // A string initializer becomes a rodata string plus a pointer
        // to it; other pointer constants are emitted directly.
        (TypeKind::Pointer(_), ExprKind::ConstString(text)) => {
            let label = state.string_const(text);
            state.long_directive_label(&label);
            Ok(())
        }
        (TypeKind::Pointer(_), _) => match value {
            Some(value) => {
                state.long_directive(value);
                Ok(())
            }
            None => Err(bad_initializer(obj)),
        },
        (TypeKind::Float, ExprKind::ConstFloat(value)) => {
            state.long_directive(value.to_bits() as i32);
            Ok(())
        }
        (TypeKind::Double, ExprKind::ConstDouble(value)) => {
            let bits = value.to_bits();
            state.long_directive(bits as u32 as i32);
            state.long_directive((bits >> 32) as u32 as i32);
            Ok(())
        }
        _ => Err(bad_initializer(obj)),
    }
}

fn bad_initializer(obj: &GlobalDecln) -> CompilerError {
    CompilerError::codegen_error(format!(
        "global '{}' needs a constant initializer of type '{}'",
        obj.name, obj.decln_type
    ))
}

#[cfg(test)]
mod tests {
    use xcc_frontend::Frontend;

    fn gen(source: &str) -> String {
        let unit = Frontend::analyze_source("test.c", source).unwrap();
        crate::generate(&unit).unwrap()
    }

    #[test]
    fn test_function_prologue_and_epilogue() {
        let asm = gen("int main() { return 0; }");
        assert!(asm.contains("    .text"));
        assert!(asm.contains("    .globl main"));
        assert!(asm.contains("main:"));
        assert!(asm.contains("pushl %ebp"));
        assert!(asm.contains("movl %esp, %ebp"));
        assert!(asm.contains("leave"));
        assert!(asm.contains("ret"));
    }

    #[test]
    fn test_initialized_global() {
        let asm = gen("int x = 42;");
        assert!(asm.contains("    .data"));
        assert!(asm.contains("    .globl x"));
        assert!(asm.contains("    .align 4"));
        assert!(asm.contains("x:"));
        assert!(asm.contains("    .long 42"));
    }

    #[test]
    fn test_tentative_definition_gets_comm() {
        let asm = gen("int x;");
        assert!(asm.contains(".comm x,4,4"));
    }

    #[test]
    fn test_extern_declaration_emits_nothing() {
        let asm = gen("extern int x; int f() { return x; }");
        assert!(!asm.contains(".comm x"));
        assert!(!asm.contains("\nx:"));
    }

    #[test]
    fn test_global_char_uses_byte_directive() {
        let asm = gen("char c = 'A';");
        assert!(asm.contains("    .byte 65"));
    }

    #[test]
    fn test_global_double_splits_into_two_longs() {
        let asm = gen("double d = 1.0;");
        // 1.0 = 0x3FF0000000000000.
        assert!(asm.contains("    .long 0\n"));
        assert!(asm.contains(&format!("    .long {}\n", 0x3ff00000)));
    }

    #[test]
    fn test_global_string_pointer() {
        let asm = gen("char *greeting = \"hi\";");
        assert!(asm.contains(".string \"hi\""));
        assert!(asm.contains("    .long .LC0"));
    }

    #[test]
    fn test_rodata_trails_text() {
        let asm = gen("double half() { return 0.5; }");
        let text_pos = asm.find("half:").unwrap();
        let rodata_pos = asm.find(".section .rodata").unwrap();
        assert!(rodata_pos > text_pos);
    }
}
