//! The closed C type lattice for the 32-bit x86 target
//!
//! Every object type knows its size and alignment. All integral kinds and
//! pointers are 4 bytes or less; `long` is the C `int` (4 bytes); `double`
//! is 8 bytes and 8-aligned. Struct and union layouts are computed once at
//! construction and shared behind `Rc`; two struct types are equal exactly
//! when they share the same layout object.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub const SIZEOF_CHAR: i32 = 1;
pub const SIZEOF_SHORT: i32 = 2;
pub const SIZEOF_LONG: i32 = 4;
pub const SIZEOF_FLOAT: i32 = 4;
pub const SIZEOF_DOUBLE: i32 = 8;
pub const SIZEOF_POINTER: i32 = 4;

pub const ALIGN_CHAR: i32 = 1;
pub const ALIGN_SHORT: i32 = 2;
pub const ALIGN_LONG: i32 = 4;
pub const ALIGN_FLOAT: i32 = 4;
pub const ALIGN_DOUBLE: i32 = 8;
pub const ALIGN_POINTER: i32 = 4;

/// Round `value` up to a multiple of `alignment` (a power of two).
pub fn round_up(value: i32, alignment: i32) -> i32 {
    (value + alignment - 1) & !(alignment - 1)
}

/// A C object type together with its qualifiers.
#[derive(Debug, Clone)]
pub struct ExprType {
    pub kind: TypeKind,
    pub is_const: bool,
    pub is_volatile: bool,
}

/// The closed set of type kinds on this target.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Void,
    Char,
    UChar,
    Short,
    UShort,
    /// The C `int`: 4 bytes, signed.
    Long,
    /// The C `unsigned int`: 4 bytes.
    ULong,
    Float,
    Double,
    Pointer(Box<ExprType>),
    Array(Box<ExprType>, i32),
    IncompleteArray(Box<ExprType>),
    StructOrUnion(Rc<StructOrUnionLayout>),
    Function(Rc<FunctionType>),
}

impl ExprType {
    pub fn new(kind: TypeKind) -> Self {
        Self::qualified(kind, false, false)
    }

    pub fn qualified(kind: TypeKind, is_const: bool, is_volatile: bool) -> Self {
        Self {
            kind,
            is_const,
            is_volatile,
        }
    }

    pub fn void() -> Self {
        Self::new(TypeKind::Void)
    }

    pub fn char() -> Self {
        Self::new(TypeKind::Char)
    }

    pub fn uchar() -> Self {
        Self::new(TypeKind::UChar)
    }

    pub fn short() -> Self {
        Self::new(TypeKind::Short)
    }

    pub fn ushort() -> Self {
        Self::new(TypeKind::UShort)
    }

    pub fn long() -> Self {
        Self::new(TypeKind::Long)
    }

    pub fn ulong() -> Self {
        Self::new(TypeKind::ULong)
    }

    pub fn float() -> Self {
        Self::new(TypeKind::Float)
    }

    pub fn double() -> Self {
        Self::new(TypeKind::Double)
    }

    pub fn pointer(referenced: ExprType) -> Self {
        Self::new(TypeKind::Pointer(Box::new(referenced)))
    }

    pub fn array(element: ExprType, num_elems: i32) -> Self {
        Self::new(TypeKind::Array(Box::new(element), num_elems))
    }

    /// Same kind, new qualifiers. Types are never mutated in place.
    pub fn with_qualifiers(&self, is_const: bool, is_volatile: bool) -> Self {
        Self::qualified(self.kind.clone(), is_const, is_volatile)
    }

    /// Size in bytes. Panics for types without a size; asking is a
    /// construction-phase bug, not a user error.
    pub fn size_of(&self) -> i32 {
        match &self.kind {
            TypeKind::Char | TypeKind::UChar => SIZEOF_CHAR,
            TypeKind::Short | TypeKind::UShort => SIZEOF_SHORT,
            TypeKind::Long | TypeKind::ULong => SIZEOF_LONG,
            TypeKind::Float => SIZEOF_FLOAT,
            TypeKind::Double => SIZEOF_DOUBLE,
            TypeKind::Pointer(_) => SIZEOF_POINTER,
            TypeKind::Array(element, num_elems) => element.size_of() * num_elems,
            TypeKind::StructOrUnion(layout) => layout.size_of(),
            TypeKind::Void => panic!("sizeof(void) is not defined"),
            TypeKind::Function(_) => panic!("sizeof a function designator is not defined"),
            TypeKind::IncompleteArray(_) => panic!("sizeof an incomplete array is not defined"),
        }
    }

    /// Alignment in bytes. Same panic contract as `size_of`.
    pub fn alignment(&self) -> i32 {
        match &self.kind {
            TypeKind::Char | TypeKind::UChar => ALIGN_CHAR,
            TypeKind::Short | TypeKind::UShort => ALIGN_SHORT,
            TypeKind::Long | TypeKind::ULong => ALIGN_LONG,
            TypeKind::Float => ALIGN_FLOAT,
            TypeKind::Double => ALIGN_DOUBLE,
            TypeKind::Pointer(_) => ALIGN_POINTER,
            TypeKind::Array(element, _) | TypeKind::IncompleteArray(element) => element.alignment(),
            TypeKind::StructOrUnion(layout) => layout.alignment(),
            TypeKind::Void => panic!("alignof(void) is not defined"),
            TypeKind::Function(_) => panic!("alignof a function designator is not defined"),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Char
                | TypeKind::UChar
                | TypeKind::Short
                | TypeKind::UShort
                | TypeKind::Long
                | TypeKind::ULong
        )
    }

    pub fn is_arith(&self) -> bool {
        self.is_integral() || matches!(self.kind, TypeKind::Float | TypeKind::Double)
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arith() || matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }

    pub fn is_struct_or_union(&self) -> bool {
        matches!(self.kind, TypeKind::StructOrUnion(_))
    }

    /// Structural type equality, ignoring qualifiers. Struct/union types
    /// are equal only when they share one layout object.
    pub fn equal_type(&self, other: &ExprType) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Void, TypeKind::Void)
            | (TypeKind::Char, TypeKind::Char)
            | (TypeKind::UChar, TypeKind::UChar)
            | (TypeKind::Short, TypeKind::Short)
            | (TypeKind::UShort, TypeKind::UShort)
            | (TypeKind::Long, TypeKind::Long)
            | (TypeKind::ULong, TypeKind::ULong)
            | (TypeKind::Float, TypeKind::Float)
            | (TypeKind::Double, TypeKind::Double) => true,
            (TypeKind::Pointer(a), TypeKind::Pointer(b)) => a.equal_type(b),
            (TypeKind::Array(a, n), TypeKind::Array(b, m)) => n == m && a.equal_type(b),
            (TypeKind::IncompleteArray(a), TypeKind::IncompleteArray(b)) => a.equal_type(b),
            (TypeKind::StructOrUnion(a), TypeKind::StructOrUnion(b)) => Rc::ptr_eq(a, b),
            (TypeKind::Function(a), TypeKind::Function(b)) => a.equal_type(b),
            _ => false,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        if self.is_volatile {
            write!(f, "volatile ")?;
        }
        match &self.kind {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::UChar => write!(f, "unsigned char"),
            TypeKind::Short => write!(f, "short"),
            TypeKind::UShort => write!(f, "unsigned short"),
            TypeKind::Long => write!(f, "int"),
            TypeKind::ULong => write!(f, "unsigned int"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::Pointer(referenced) => write!(f, "{} *", referenced),
            TypeKind::Array(element, num_elems) => write!(f, "{}[{}]", element, num_elems),
            TypeKind::IncompleteArray(element) => write!(f, "{}[]", element),
            TypeKind::StructOrUnion(layout) => write!(f, "{}", layout),
            TypeKind::Function(func) => write!(f, "{}", func),
        }
    }
}

/// One named member of a struct or union, with its assigned byte offset.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub member_type: ExprType,
    pub offset: i32,
}

/// The layout of a struct or union, shared behind `Rc`. A layout starts
/// incomplete (a bare `struct tag` reference) and is filled in once when
/// the defining member list is analyzed; pointers to it may already exist
/// by then, which is how self-referential types work.
#[derive(Debug)]
pub struct StructOrUnionLayout {
    pub is_struct: bool,
    pub tag: Option<String>,
    data: RefCell<Option<LayoutData>>,
}

#[derive(Debug)]
struct LayoutData {
    members: Vec<Member>,
    size: i32,
    align: i32,
}

impl StructOrUnionLayout {
    pub fn incomplete(is_struct: bool, tag: Option<String>) -> Rc<Self> {
        Rc::new(Self {
            is_struct,
            tag,
            data: RefCell::new(None),
        })
    }

    pub fn new_struct(tag: Option<String>, members: Vec<(String, ExprType)>) -> Rc<Self> {
        let layout = Self::incomplete(true, tag);
        layout.define(members);
        layout
    }

    pub fn new_union(tag: Option<String>, members: Vec<(String, ExprType)>) -> Rc<Self> {
        let layout = Self::incomplete(false, tag);
        layout.define(members);
        layout
    }

    /// Fill in the member list and compute the layout. Struct members
    /// pack in declaration order, each offset rounded up to the member's
    /// alignment; union members all sit at offset 0. The total size
    /// rounds up to the max member alignment.
    pub fn define(&self, members: Vec<(String, ExprType)>) {
        let mut data = self.data.borrow_mut();
        if data.is_some() {
            panic!("{} defined twice", self);
        }
        let mut packed = Vec::with_capacity(members.len());
        let mut offset = 0;
        let mut size = 0;
        let mut align = 1;
        for (name, member_type) in members {
            let member_align = member_type.alignment();
            align = align.max(member_align);
            if self.is_struct {
                offset = round_up(offset, member_align);
                packed.push(Member {
                    name,
                    member_type,
                    offset,
                });
                offset += packed[packed.len() - 1].member_type.size_of();
            } else {
                size = size.max(member_type.size_of());
                packed.push(Member {
                    name,
                    member_type,
                    offset: 0,
                });
            }
        }
        let total = if self.is_struct { offset } else { size };
        *data = Some(LayoutData {
            members: packed,
            size: round_up(total, align),
            align,
        });
    }

    pub fn is_complete(&self) -> bool {
        self.data.borrow().is_some()
    }

    pub fn size_of(&self) -> i32 {
        match self.data.borrow().as_ref() {
            Some(data) => data.size,
            None => panic!("sizeof incomplete {}", self),
        }
    }

    pub fn alignment(&self) -> i32 {
        match self.data.borrow().as_ref() {
            Some(data) => data.align,
            None => panic!("alignof incomplete {}", self),
        }
    }

    pub fn members(&self) -> Vec<Member> {
        match self.data.borrow().as_ref() {
            Some(data) => data.members.clone(),
            None => panic!("member list of incomplete {}", self),
        }
    }

    pub fn find_member(&self, name: &str) -> Option<Member> {
        self.data
            .borrow()
            .as_ref()
            .and_then(|data| data.members.iter().find(|m| m.name == name).cloned())
    }
}

impl fmt::Display for StructOrUnionLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_struct { "struct" } else { "union" };
        match &self.tag {
            Some(tag) => write!(f, "{} {}", keyword, tag),
            None => write!(f, "{} <anonymous>", keyword),
        }
    }
}

/// One function parameter with its frame offset (header included).
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub param_type: ExprType,
    pub offset: i32,
}

/// A function type: return type, packed parameters, varargs flag.
#[derive(Debug)]
pub struct FunctionType {
    pub ret: ExprType,
    pub params: Vec<Param>,
    pub is_varargs: bool,
}

impl FunctionType {
    /// Pack the parameters and add the frame header: saved %ebp plus the
    /// return address (8 bytes), plus the hidden return-value pointer
    /// (4 more) when the function returns a struct or union.
    pub fn new(ret: ExprType, params: Vec<(String, ExprType)>, is_varargs: bool) -> Rc<Self> {
        let header = if ret.is_struct_or_union() {
            3 * SIZEOF_POINTER
        } else {
            2 * SIZEOF_POINTER
        };
        let types: Vec<ExprType> = params.iter().map(|(_, t)| t.clone()).collect();
        let (_, offsets) = pack_arguments(&types);
        let params = params
            .into_iter()
            .zip(offsets)
            .map(|((name, param_type), offset)| Param {
                name,
                param_type,
                offset: offset + header,
            })
            .collect();
        Rc::new(Self {
            ret,
            params,
            is_varargs,
        })
    }

    pub fn equal_type(&self, other: &FunctionType) -> bool {
        self.is_varargs == other.is_varargs
            && self.ret.equal_type(&other.ret)
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.param_type.equal_type(&b.param_type))
    }

    pub fn find_param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.param_type)?;
        }
        if self.is_varargs {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}

/// Pack a list of argument types into a call frame: each slot is aligned
/// to the running alignment (at least 4, grows monotonically) and the
/// total rounds up to the final alignment. Returns (total, offsets).
pub fn pack_arguments(types: &[ExprType]) -> (i32, Vec<i32>) {
    let mut alignment = SIZEOF_LONG;
    let mut offsets = Vec::with_capacity(types.len());
    let mut offset = 0;
    for ty in types {
        alignment = alignment.max(ty.alignment());
        offset = round_up(offset, alignment);
        offsets.push(offset);
        offset += ty.size_of();
    }
    (round_up(offset, alignment), offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ExprType::char().size_of(), 1);
        assert_eq!(ExprType::short().size_of(), 2);
        assert_eq!(ExprType::long().size_of(), 4);
        assert_eq!(ExprType::float().size_of(), 4);
        assert_eq!(ExprType::double().size_of(), 8);
        assert_eq!(ExprType::pointer(ExprType::double()).size_of(), 4);
        assert_eq!(ExprType::double().alignment(), 8);
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 4), 0);
        assert_eq!(round_up(1, 4), 4);
        assert_eq!(round_up(4, 4), 4);
        assert_eq!(round_up(5, 8), 8);
        assert_eq!(round_up(9, 8), 16);
    }

    #[test]
    fn test_struct_layout_char_int_double() {
        let layout = StructOrUnionLayout::new_struct(
            Some("s".to_string()),
            vec![
                ("c".to_string(), ExprType::char()),
                ("i".to_string(), ExprType::long()),
                ("d".to_string(), ExprType::double()),
            ],
        );
        let offsets: Vec<i32> = layout.members().iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(layout.size_of(), 16);
        assert_eq!(layout.alignment(), 8);
    }

    #[test]
    fn test_empty_struct() {
        let layout = StructOrUnionLayout::new_struct(None, vec![]);
        assert_eq!(layout.size_of(), 0);
    }

    #[test]
    fn test_union_layout() {
        let layout = StructOrUnionLayout::new_union(
            None,
            vec![
                ("c".to_string(), ExprType::char()),
                ("d".to_string(), ExprType::double()),
            ],
        );
        assert!(layout.members().iter().all(|m| m.offset == 0));
        assert_eq!(layout.size_of(), 8);
    }

    #[test]
    fn test_struct_equality_is_layout_identity() {
        let members = vec![("x".to_string(), ExprType::long())];
        let a = StructOrUnionLayout::new_struct(Some("s".to_string()), members.clone());
        let b = StructOrUnionLayout::new_struct(Some("s".to_string()), members);
        let ta = ExprType::new(TypeKind::StructOrUnion(a.clone()));
        let ta2 = ExprType::new(TypeKind::StructOrUnion(a));
        let tb = ExprType::new(TypeKind::StructOrUnion(b));
        assert!(ta.equal_type(&ta2));
        assert!(!ta.equal_type(&tb));
    }

    #[test]
    fn test_pack_arguments() {
        let (total, offsets) = pack_arguments(&[
            ExprType::char(),
            ExprType::long(),
            ExprType::double(),
            ExprType::char(),
        ]);
        // char takes a full 4-byte slot; double raises the alignment to 8.
        assert_eq!(offsets, vec![0, 4, 8, 16]);
        assert_eq!(total, 24);
    }

    #[test]
    fn test_function_param_offsets() {
        let func = FunctionType::new(
            ExprType::long(),
            vec![
                ("a".to_string(), ExprType::long()),
                ("b".to_string(), ExprType::long()),
            ],
            false,
        );
        assert_eq!(func.params[0].offset, 8);
        assert_eq!(func.params[1].offset, 12);
    }

    #[test]
    fn test_struct_return_shifts_params() {
        let layout = StructOrUnionLayout::new_struct(None, vec![("x".to_string(), ExprType::long())]);
        let ret = ExprType::new(TypeKind::StructOrUnion(layout));
        let func = FunctionType::new(ret, vec![("a".to_string(), ExprType::long())], false);
        // Hidden return pointer occupies the first slot above the header.
        assert_eq!(func.params[0].offset, 12);
    }

    #[test]
    fn test_category_predicates() {
        assert!(ExprType::char().is_integral());
        assert!(ExprType::ulong().is_integral());
        assert!(!ExprType::float().is_integral());
        assert!(ExprType::float().is_arith());
        assert!(ExprType::pointer(ExprType::void()).is_scalar());
        assert!(!ExprType::pointer(ExprType::void()).is_arith());
        assert!(!ExprType::void().is_scalar());
    }
}
