//! xcc compiler backend
//!
//! Lowers the typed program tree to 32-bit x86 assembly in AT&T syntax.
//! The output is a single text: the code and data records in emission
//! order, followed by the accumulated `.rodata` constants.

pub mod binary;
pub mod emit;
pub mod expr;
pub mod func;
pub mod stmt;
pub mod unary;

pub use emit::{CodeGen, Reg};

use log::debug;
use xcc_common::CompilerResult;
use xcc_frontend::TranslnUnit;

/// Generate assembly for a whole translation unit.
pub fn generate(unit: &TranslnUnit) -> CompilerResult<String> {
    debug!(
        "generating code for {} external definition(s)",
        unit.declns.len()
    );
    let mut state = CodeGen::new();
    func::gen_transln_unit(unit, &mut state)?;
    Ok(state.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xcc_frontend::Frontend;

    fn gen(source: &str) -> String {
        let unit = Frontend::analyze_source("test.c", source).unwrap();
        generate(&unit).unwrap()
    }

    #[test]
    fn test_minimal_program() {
        let asm = gen("int main() { return 0; }");
        let expected = "    .text
    # fn main: int ()
    .globl main
main:
    pushl %ebp
    movl %esp, %ebp
    movl $0, %eax
    lea 0(%ebp), %esp
    jmp .L2
.L2:
    leave
    ret

    .section .rodata
";
        assert_eq!(asm, expected);
    }

    #[test]
    fn test_argument_passing_and_call() {
        let asm = gen(
            "int add(int a, int b) { return a + b; }\n\
             int main() { return add(1, 2); }",
        );
        // Parameters live above the frame header.
        assert!(asm.contains("movl 8(%ebp), %eax"));
        assert!(asm.contains("movl 12(%ebp), %eax"));
        assert!(asm.contains("call *%eax"));
        assert!(asm.contains("lea add, %eax"));
    }

    #[test]
    fn test_uchar_difference_compares_signed() {
        let asm = gen(
            "int f(unsigned char a, unsigned char b) { return (a - b) < 0; }",
        );
        // a and b promote to long, so the difference compares signed.
        assert!(asm.contains("setl %al"));
        assert!(!asm.contains("setb %al"));
    }

    #[test]
    fn test_pointer_arithmetic_scales() {
        let asm = gen("int get(int *p) { return *(p + 2); }");
        // p + 2 folds the scale: 2 * sizeof(int) = 8.
        assert!(asm.contains("movl $8, %eax"));
        assert!(asm.contains("movl 0(%eax), %eax"));
    }

    #[test]
    fn test_float_literal_goes_to_rodata() {
        let asm = gen("double pi() { return 3.25; }");
        assert!(asm.contains("fldl .LC0"));
        assert!(asm.contains(".align 8"));
    }

    #[test]
    fn test_struct_member_access() {
        let asm = gen(
            "struct point { int x; int y; };\n\
             int get_y(struct point *p) { return p->y; }",
        );
        // y sits at offset 4.
        assert!(asm.contains("movl 4(%eax), %eax"));
    }

    #[test]
    fn test_string_literal() {
        let asm = gen("char *greet() { return \"hello\"; }");
        assert!(asm.contains(".string \"hello\""));
        assert!(asm.contains("lea .LC0, %eax"));
    }
}
