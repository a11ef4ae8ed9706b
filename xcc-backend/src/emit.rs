//! Assembly emission state
//!
//! Collects AT&T-syntax x86 text into two streams (`.text`-side output
//! and `.rodata`) and tracks the one piece of state the generators need
//! to agree on: the current logical stack size below %ebp. Values pushed
//! while evaluating subexpressions may leave %esp lower than the logical
//! size; statement boundaries resync with `force_stack_size_to`.

use std::collections::HashMap;
use std::fmt;

use xcc_common::{CompilerError, CompilerResult};

/// The registers the generated code uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Eax,
    Ecx,
    Edx,
    Ebx,
    Ebp,
    Esp,
    Edi,
    Esi,
    Al,
    Ax,
    Bl,
    Bx,
    Cl,
    St0,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::Eax => "%eax",
            Reg::Ecx => "%ecx",
            Reg::Edx => "%edx",
            Reg::Ebx => "%ebx",
            Reg::Ebp => "%ebp",
            Reg::Esp => "%esp",
            Reg::Edi => "%edi",
            Reg::Esi => "%esi",
            Reg::Al => "%al",
            Reg::Ax => "%ax",
            Reg::Bl => "%bl",
            Reg::Bx => "%bx",
            Reg::Cl => "%cl",
            Reg::St0 => "%st(0)",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Text,
    Data,
}

/// Labels visible to `break`, `continue`, `case`, and `default` at the
/// current nesting depth. Loops fill the first two; switches fill the
/// rest.
#[derive(Debug)]
struct LabelPack {
    continue_label: Option<i32>,
    break_label: Option<i32>,
    default_label: Option<i32>,
    case_labels: Option<HashMap<i32, i32>>,
}

/// The assembly writer.
#[derive(Debug)]
pub struct CodeGen {
    text: String,
    rodata: String,
    rodata_idx: i32,
    label_idx: i32,
    section: Section,
    stack_size: i32,
    label_packs: Vec<LabelPack>,
    goto_labels: HashMap<String, i32>,
    return_label: Option<i32>,
}

impl CodeGen {
    pub fn new() -> Self {
        let mut rodata = String::new();
        rodata.push_str("    .section .rodata\n");
        Self {
            text: String::new(),
            rodata,
            rodata_idx: 0,
            label_idx: 2,
            section: Section::None,
            stack_size: 0,
            label_packs: Vec::new(),
            goto_labels: HashMap::new(),
            return_label: None,
        }
    }

    /// The finished assembly: text followed by rodata.
    pub fn finish(self) -> String {
        let mut out = self.text;
        out.push_str(&self.rodata);
        out
    }

    pub fn stack_size(&self) -> i32 {
        self.stack_size
    }

    fn line(&mut self, s: &str) {
        self.text.push_str(s);
        self.text.push('\n');
    }

    fn rodata_line(&mut self, s: &str) {
        self.rodata.push_str(s);
        self.rodata.push('\n');
    }

    /// Emit one 4-space-indented instruction.
    pub fn instr(&mut self, text: &str) {
        self.line(&format!("    {}", text));
    }

    pub fn comment(&mut self, text: &str) {
        self.line(&format!("    # {}", text));
    }

    pub fn newline(&mut self) {
        self.text.push('\n');
    }

    // Sections and directives

    pub fn text_section(&mut self) {
        if self.section != Section::Text {
            self.instr(".text");
            self.section = Section::Text;
        }
    }

    pub fn data_section(&mut self) {
        if self.section != Section::Data {
            self.instr(".data");
            self.section = Section::Data;
        }
    }

    pub fn globl(&mut self, name: &str) {
        self.instr(&format!(".globl {}", name));
    }

    pub fn align(&mut self, align: i32) {
        self.instr(&format!(".align {}", align));
    }

    pub fn comm(&mut self, name: &str, size: i32, align: i32) {
        self.instr(&format!(".comm {},{},{}", name, size, align));
    }

    pub fn byte_directive(&mut self, value: i32) {
        self.instr(&format!(".byte {}", value));
    }

    pub fn value_directive(&mut self, value: i32) {
        self.instr(&format!(".value {}", value));
    }

    pub fn long_directive(&mut self, value: i32) {
        self.instr(&format!(".long {}", value));
    }

    pub fn long_directive_label(&mut self, label: &str) {
        self.instr(&format!(".long {}", label));
    }

    // Labels

    pub fn request_label(&mut self) -> i32 {
        let label = self.label_idx;
        self.label_idx += 1;
        label
    }

    pub fn label(&mut self, label: i32) {
        self.line(&format!(".L{}:", label));
    }

    pub fn named_label(&mut self, name: &str) {
        self.line(&format!("{}:", name));
    }

    pub fn jmp(&mut self, label: i32) {
        self.instr(&format!("jmp .L{}", label));
    }

    pub fn jz(&mut self, label: i32) {
        self.instr(&format!("jz .L{}", label));
    }

    pub fn jnz(&mut self, label: i32) {
        self.instr(&format!("jnz .L{}", label));
    }

    // Stack bookkeeping

    /// Grow %esp so the frame covers `size` bytes of locals. No-op if the
    /// frame already does.
    pub fn expand_stack_to(&mut self, size: i32) {
        if size > self.stack_size {
            self.instr(&format!("subl ${}, %esp", size - self.stack_size));
            self.stack_size = size;
        }
    }

    pub fn expand_stack_by(&mut self, nbytes: i32) {
        self.stack_size += nbytes;
        self.instr(&format!("subl ${}, %esp", nbytes));
    }

    /// Grow the stack by `nbytes`, first padding so the new area starts
    /// `align`-aligned relative to %ebp.
    pub fn expand_stack_with_alignment(&mut self, nbytes: i32, align: i32) {
        let grown = round_up(self.stack_size + nbytes, align) - self.stack_size;
        self.expand_stack_by(grown);
    }

    pub fn shrink_stack_by(&mut self, nbytes: i32) {
        self.stack_size -= nbytes;
        self.instr(&format!("addl ${}, %esp", nbytes));
    }

    /// Resync %esp with a known logical size, discarding temporaries.
    pub fn force_stack_size_to(&mut self, nbytes: i32) {
        self.stack_size = nbytes;
        self.instr(&format!("lea {}(%ebp), %esp", -nbytes));
    }

    // Pushing and popping values

    /// Push %reg; returns the stack size to hand back to `pop_long`.
    pub fn push_long(&mut self, src: Reg) -> i32 {
        self.instr(&format!("pushl {}", src));
        self.stack_size += 4;
        self.stack_size
    }

    /// Retrieve a value pushed at `saved`. Pops if it is still on top,
    /// otherwise reads it through %ebp and leaves %esp alone.
    pub fn pop_long(&mut self, saved: i32, dst: Reg) {
        if self.stack_size == saved {
            self.instr(&format!("popl {}", dst));
            self.stack_size -= 4;
        } else {
            self.instr(&format!("movl {}(%ebp), {}", -saved, dst));
        }
    }

    /// Store %st(0) to a fresh 4-byte slot without popping it.
    pub fn push_float(&mut self) -> i32 {
        self.expand_stack_by(4);
        self.instr("fsts 0(%esp)");
        self.stack_size
    }

    /// Pop %st(0) into a fresh 4-byte slot.
    pub fn push_float_pop(&mut self) -> i32 {
        self.expand_stack_by(4);
        self.instr("fstps 0(%esp)");
        self.stack_size
    }

    pub fn push_double(&mut self) -> i32 {
        self.expand_stack_by(8);
        self.instr("fstl 0(%esp)");
        self.stack_size
    }

    pub fn push_double_pop(&mut self) -> i32 {
        self.expand_stack_by(8);
        self.instr("fstpl 0(%esp)");
        self.stack_size
    }

    pub fn pop_float(&mut self, saved: i32) {
        self.instr(&format!("fldl {}(%ebp)", -saved));
        if saved == self.stack_size {
            self.shrink_stack_by(4);
        }
    }

    pub fn pop_double(&mut self, saved: i32) {
        self.instr(&format!("fldl {}(%ebp)", -saved));
        if saved == self.stack_size {
            self.shrink_stack_by(8);
        }
    }

    // FPU/integer conversions, through a scratch slot.

    /// %eax = (int)%st(0), popping the FPU stack.
    pub fn convert_float_to_long(&mut self) {
        self.expand_stack_by(4);
        self.instr("fistl 0(%esp)");
        self.instr("movl 0(%esp), %eax");
        self.shrink_stack_by(4);
    }

    /// %st(0) = (float)%eax.
    pub fn convert_long_to_float(&mut self) {
        self.expand_stack_by(4);
        self.instr("movl %eax, 0(%esp)");
        self.instr("fildl 0(%esp)");
        self.shrink_stack_by(4);
    }

    /// Copy %ecx bytes from *%esi to *%edi. Clobbers %al and %ecx.
    pub fn mem_cpy(&mut self) {
        self.instr("movb %cl, %al");
        self.instr("shrl $2, %ecx");
        self.instr("cld");
        self.instr("rep movsl");
        self.instr("movb %al, %cl");
        self.instr("andb $3, %cl");
        self.instr("rep movsb");
    }

    // Read-only data

    pub fn long_const(&mut self, value: i32) -> String {
        let name = format!(".LC{}", self.rodata_idx);
        self.rodata_idx += 1;
        self.rodata_line("    .align 4");
        self.rodata_line(&format!("{}:", name));
        self.rodata_line(&format!("    .long {}", value));
        name
    }

    pub fn long_long_const(&mut self, lo: i32, hi: i32) -> String {
        let name = format!(".LC{}", self.rodata_idx);
        self.rodata_idx += 1;
        self.rodata_line("    .align 8");
        self.rodata_line(&format!("{}:", name));
        self.rodata_line(&format!("    .long {}", lo));
        self.rodata_line(&format!("    .long {}", hi));
        name
    }

    pub fn string_const(&mut self, value: &str) -> String {
        let name = format!(".LC{}", self.rodata_idx);
        self.rodata_idx += 1;
        self.rodata_line(&format!("{}:", name));
        self.rodata_line(&format!("    .string \"{}\"", escape_string(value)));
        name
    }

    // Function entry and exit

    pub fn func_start(&mut self, name: &str) {
        self.named_label(name);
        self.instr("pushl %ebp");
        self.instr("movl %esp, %ebp");
        self.stack_size = 0;
    }

    pub fn leave(&mut self) {
        self.instr("leave");
    }

    pub fn ret(&mut self) {
        self.instr("ret");
    }

    /// Enter a function: allocate the return label and one label per
    /// goto target.
    pub fn in_function(&mut self, goto_labels: &[String]) {
        self.return_label = Some(self.request_label());
        self.goto_labels.clear();
        for name in goto_labels {
            let label = self.request_label();
            self.goto_labels.insert(name.clone(), label);
        }
    }

    pub fn out_function(&mut self) {
        self.return_label = None;
        self.goto_labels.clear();
    }

    pub fn return_label(&mut self) -> i32 {
        match self.return_label {
            Some(label) => label,
            None => panic!("return label requested outside a function"),
        }
    }

    pub fn goto_label(&mut self, name: &str) -> CompilerResult<i32> {
        self.goto_labels.get(name).copied().ok_or_else(|| {
            CompilerError::codegen_error(format!("use of undeclared label '{}'", name))
        })
    }

    // Loop and switch label scoping

    pub fn in_loop(&mut self, continue_label: i32, break_label: i32) {
        self.label_packs.push(LabelPack {
            continue_label: Some(continue_label),
            break_label: Some(break_label),
            default_label: None,
            case_labels: None,
        });
    }

    pub fn in_switch(
        &mut self,
        break_label: i32,
        default_label: i32,
        case_labels: HashMap<i32, i32>,
    ) {
        self.label_packs.push(LabelPack {
            continue_label: None,
            break_label: Some(break_label),
            default_label: Some(default_label),
            case_labels: Some(case_labels),
        });
    }

    pub fn out_labels(&mut self) {
        if self.label_packs.pop().is_none() {
            panic!("label pack stack underflow");
        }
    }

    pub fn continue_label(&mut self) -> CompilerResult<i32> {
        self.label_packs
            .iter()
            .rev()
            .find_map(|pack| pack.continue_label)
            .ok_or_else(|| CompilerError::codegen_error("'continue' outside a loop"))
    }

    pub fn break_label(&mut self) -> CompilerResult<i32> {
        self.label_packs
            .iter()
            .rev()
            .find_map(|pack| pack.break_label)
            .ok_or_else(|| CompilerError::codegen_error("'break' outside a loop or switch"))
    }

    pub fn default_label(&mut self) -> CompilerResult<i32> {
        self.label_packs
            .last()
            .and_then(|pack| pack.default_label)
            .ok_or_else(|| CompilerError::codegen_error("'default' outside a switch"))
    }

    pub fn case_label(&mut self, value: i32) -> CompilerResult<i32> {
        self.label_packs
            .iter()
            .rev()
            .find_map(|pack| pack.case_labels.as_ref())
            .and_then(|labels| labels.get(&value).copied())
            .ok_or_else(|| CompilerError::codegen_error("'case' outside a switch"))
    }
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

fn round_up(value: i32, alignment: i32) -> i32 {
    (value + alignment - 1) & !(alignment - 1)
}

fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_pop_balanced() {
        let mut state = CodeGen::new();
        state.func_start("f");
        let saved = state.push_long(Reg::Eax);
        assert_eq!(state.stack_size(), 4);
        state.pop_long(saved, Reg::Ebx);
        assert_eq!(state.stack_size(), 0);
        assert!(state.finish().contains("popl %ebx"));
    }

    #[test]
    fn test_pop_reads_through_ebp_when_buried() {
        let mut state = CodeGen::new();
        state.func_start("f");
        let saved = state.push_long(Reg::Eax);
        state.push_long(Reg::Eax);
        state.pop_long(saved, Reg::Ebx);
        assert!(state.finish().contains("movl -4(%ebp), %ebx"));
    }

    #[test]
    fn test_expand_stack_to_is_monotonic() {
        let mut state = CodeGen::new();
        state.func_start("f");
        state.expand_stack_to(8);
        state.expand_stack_to(4);
        let asm = state.finish();
        assert_eq!(asm.matches("subl").count(), 1);
    }

    #[test]
    fn test_rodata_labels_count_up() {
        let mut state = CodeGen::new();
        assert_eq!(state.long_const(1), ".LC0");
        assert_eq!(state.string_const("hi"), ".LC1");
        let asm = state.finish();
        assert!(asm.contains(".section .rodata"));
        assert!(asm.contains(".string \"hi\""));
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(escape_string("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
        assert_eq!(escape_string("\x01"), "\\001");
    }

    #[test]
    fn test_jnz_mnemonic() {
        let mut state = CodeGen::new();
        state.jnz(5);
        assert!(state.finish().contains("jnz .L5"));
    }

    #[test]
    fn test_labels_start_at_two() {
        let mut state = CodeGen::new();
        assert_eq!(state.request_label(), 2);
        assert_eq!(state.request_label(), 3);
    }

    #[test]
    fn test_break_label_skips_inner_loop_for_continue() {
        let mut state = CodeGen::new();
        state.in_loop(10, 11);
        state.in_switch(20, 21, HashMap::new());
        // continue inside a switch targets the enclosing loop.
        assert_eq!(state.continue_label().unwrap(), 10);
        assert_eq!(state.break_label().unwrap(), 20);
        state.out_labels();
        state.out_labels();
    }

    #[test]
    fn test_break_outside_loop_is_error() {
        let mut state = CodeGen::new();
        assert!(state.break_label().is_err());
    }

    #[test]
    fn test_section_switch_emitted_once() {
        let mut state = CodeGen::new();
        state.text_section();
        state.text_section();
        assert_eq!(state.finish().matches(".text").count(), 1);
    }
}
