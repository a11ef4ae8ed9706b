//! Scoped symbol environment
//!
//! An `Env` is an append-only chain of scopes. Entering a block adds a
//! scope; looking up a name walks inward-out. Child scopes never mutate a
//! parent's entries. Snapshots are cheap: scopes sit behind `Rc` and are
//! copied on write, so every typed tree node can keep the environment that
//! was valid at its point of construction.

use crate::types::{round_up, ExprType, FunctionType, StructOrUnionLayout};
use std::rc::Rc;

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// An enum constant; `offset` holds its value.
    Enum,
    Typedef,
    /// A block-scope object; `offset` is negative, relative to %ebp.
    Stack,
    /// A function parameter; `offset` is positive, relative to %ebp.
    Frame,
    /// A file-scope object, addressed by symbol name.
    Global,
}

/// The result of a successful lookup.
#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: EntryKind,
    pub entry_type: ExprType,
    pub offset: i32,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    enums: Vec<(String, Entry)>,
    typedefs: Vec<(String, Entry)>,
    locals: Vec<(String, Entry)>,
    frames: Vec<(String, Entry)>,
    globals: Vec<(String, Entry)>,
    /// Struct and union tags declared in this scope.
    tags: Vec<(String, Rc<StructOrUnionLayout>)>,
    esp_pos: i32,
    func: Option<Rc<FunctionType>>,
}

fn search<'a>(entries: &'a [(String, Entry)], name: &str) -> Option<&'a Entry> {
    entries.iter().rev().find(|(n, _)| n == name).map(|(_, e)| e)
}

impl Scope {
    fn find(&self, name: &str) -> Option<&Entry> {
        search(&self.enums, name)
            .or_else(|| search(&self.typedefs, name))
            .or_else(|| search(&self.locals, name))
            .or_else(|| search(&self.frames, name))
            .or_else(|| search(&self.globals, name))
    }
}

/// A chain of scopes, innermost last.
#[derive(Debug, Clone)]
pub struct Env {
    scopes: Vec<Rc<Scope>>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: vec![Rc::new(Scope::default())],
        }
    }

    /// Enter a block: a fresh scope inheriting the stack offset and the
    /// current function.
    pub fn in_scope(&self) -> Self {
        let top = self.top();
        let inner = Scope {
            esp_pos: top.esp_pos,
            func: top.func.clone(),
            ..Scope::default()
        };
        let mut scopes = self.scopes.clone();
        scopes.push(Rc::new(inner));
        Self { scopes }
    }

    /// Leave the innermost scope.
    pub fn out_scope(&self) -> Self {
        let mut scopes = self.scopes.clone();
        scopes.pop();
        Self { scopes }
    }

    fn top(&self) -> &Scope {
        self.scopes.last().map(Rc::as_ref).unwrap_or_else(|| {
            panic!("environment with no scopes");
        })
    }

    fn top_mut(&mut self) -> &mut Scope {
        let top = self
            .scopes
            .last_mut()
            .unwrap_or_else(|| panic!("environment with no scopes"));
        Rc::make_mut(top)
    }

    /// Add a block-scope object; returns the assigned negative offset.
    /// Every local takes a 4-byte-rounded slot below the previous one.
    pub fn push_stack(&mut self, name: &str, entry_type: ExprType) -> i32 {
        let size = round_up(entry_type.size_of(), 4);
        let top = self.top_mut();
        top.esp_pos -= size;
        let offset = top.esp_pos;
        top.locals.push((
            name.to_string(),
            Entry {
                kind: EntryKind::Stack,
                entry_type,
                offset,
            },
        ));
        offset
    }

    /// Add a function parameter at its packed frame offset.
    pub fn push_frame(&mut self, name: &str, entry_type: ExprType, offset: i32) {
        self.top_mut().frames.push((
            name.to_string(),
            Entry {
                kind: EntryKind::Frame,
                entry_type,
                offset,
            },
        ));
    }

    /// Add a file-scope object, addressed by its symbol name.
    pub fn push_global(&mut self, name: &str, entry_type: ExprType) {
        self.top_mut().globals.push((
            name.to_string(),
            Entry {
                kind: EntryKind::Global,
                entry_type,
                offset: 0,
            },
        ));
    }

    pub fn push_typedef(&mut self, name: &str, entry_type: ExprType) {
        self.top_mut().typedefs.push((
            name.to_string(),
            Entry {
                kind: EntryKind::Typedef,
                entry_type,
                offset: 0,
            },
        ));
    }

    /// Add an enum constant with its value.
    pub fn push_enum(&mut self, name: &str, entry_type: ExprType, value: i32) {
        self.top_mut().enums.push((
            name.to_string(),
            Entry {
                kind: EntryKind::Enum,
                entry_type,
                offset: value,
            },
        ));
    }

    /// Declare a struct or union tag in the innermost scope.
    pub fn push_tag(&mut self, name: &str, layout: Rc<StructOrUnionLayout>) {
        self.top_mut().tags.push((name.to_string(), layout));
    }

    /// Innermost-out tag lookup.
    pub fn find_tag(&self, name: &str) -> Option<Rc<StructOrUnionLayout>> {
        self.scopes.iter().rev().find_map(|scope| {
            scope
                .tags
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, l)| l.clone())
        })
    }

    pub fn find_tag_in_current_scope(&self, name: &str) -> Option<Rc<StructOrUnionLayout>> {
        self.top()
            .tags
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l.clone())
    }

    pub fn set_current_function(&mut self, func: Rc<FunctionType>) {
        self.top_mut().func = Some(func);
    }

    /// The function whose body is being analyzed, if any.
    pub fn current_function(&self) -> Option<Rc<FunctionType>> {
        self.top().func.clone()
    }

    /// Bytes of stack the innermost scope's locals occupy below %ebp.
    pub fn stack_size(&self) -> i32 {
        -self.top().esp_pos
    }

    /// Innermost-out lookup.
    pub fn find(&self, name: &str) -> Option<Entry> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.find(name))
            .cloned()
    }

    pub fn find_in_current_scope(&self, name: &str) -> Option<Entry> {
        self.top().find(name).cloned()
    }

    pub fn is_global(&self) -> bool {
        self.scopes.len() == 1
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_offsets_grow_downward() {
        let mut env = Env::new().in_scope();
        let a = env.push_stack("a", ExprType::long());
        let b = env.push_stack("b", ExprType::char());
        assert_eq!(a, -4);
        // A char still takes a rounded 4-byte slot.
        assert_eq!(b, -8);
        assert_eq!(env.stack_size(), 8);
    }

    #[test]
    fn test_inner_scope_shadows() {
        let mut env = Env::new().in_scope();
        env.push_stack("x", ExprType::long());
        let mut inner = env.in_scope();
        inner.push_stack("x", ExprType::double());
        let entry = inner.find("x").unwrap();
        assert_eq!(entry.entry_type.size_of(), 8);
        // The outer snapshot is untouched.
        assert_eq!(env.find("x").unwrap().entry_type.size_of(), 4);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let mut env = Env::new();
        env.push_global("g", ExprType::long());
        let snapshot = env.clone();
        env.push_global("h", ExprType::long());
        assert!(snapshot.find("h").is_none());
        assert!(env.find("h").is_some());
    }

    #[test]
    fn test_enum_constant() {
        let mut env = Env::new();
        env.push_enum("RED", ExprType::long(), 2);
        let entry = env.find("RED").unwrap();
        assert_eq!(entry.kind, EntryKind::Enum);
        assert_eq!(entry.offset, 2);
    }

    #[test]
    fn test_is_global() {
        let env = Env::new();
        assert!(env.is_global());
        assert!(!env.in_scope().is_global());
    }
}
