//! Semantic analysis
//!
//! Turns the untyped syntax tree into the typed program tree: resolves
//! declaration specifiers and declarators into types, builds symbol
//! environments, types every expression, and makes all conversions
//! explicit. Errors out of this phase are user errors; shape violations
//! the parser cannot produce are panics.

pub mod expr;
pub mod stmt;

use crate::ast;
use crate::cast::make_cast;
use crate::env::{Entry, EntryKind, Env};
use crate::typed::{Decln, ExternDecln, FuncDef, GlobalDecln, TranslnUnit};
use crate::types::{ExprType, FunctionType, StructOrUnionLayout, TypeKind};
use std::rc::Rc;
use xcc_common::{CompilerError, CompilerResult};

pub use expr::analyze_expr;
pub use stmt::analyze_stmt;

/// Analyze a whole translation unit.
pub fn analyze(unit: &ast::TranslationUnit) -> CompilerResult<TranslnUnit> {
    let mut env = Env::new();
    let mut declns = Vec::new();

    for external in &unit.externs {
        match external {
            ast::ExternDecl::FuncDef(def) => {
                declns.push(ExternDecln::Func(analyze_func_def(def, &mut env)?));
            }
            ast::ExternDecl::Decl(decl) => {
                analyze_external_decl(decl, &mut env, &mut declns)?;
            }
        }
    }

    Ok(TranslnUnit { declns })
}

fn analyze_func_def(def: &ast::FuncDef, env: &mut Env) -> CompilerResult<FuncDef> {
    let base = resolve_base_type(&def.specs, env)?;
    let (name, func_type) = apply_declarator(base, &def.declarator, env)?;
    let name = name.ok_or_else(|| CompilerError::semantic_error("function definition needs a name"))?;
    let func_type = match func_type.kind {
        TypeKind::Function(ft) => ft,
        _ => {
            return Err(CompilerError::semantic_error(format!(
                "'{}' is not a function",
                name
            )))
        }
    };

    log::debug!("analyzing function '{}'", name);
    env.push_global(&name, ExprType::new(TypeKind::Function(func_type.clone())));

    let mut func_env = env.in_scope();
    func_env.set_current_function(func_type.clone());
    for param in &func_type.params {
        if param.name.is_empty() {
            return Err(CompilerError::semantic_error(format!(
                "parameter of function '{}' needs a name",
                name
            )));
        }
        func_env.push_frame(&param.name, param.param_type.clone(), param.offset);
    }

    let body = analyze_stmt(&def.body, &mut func_env)?;

    Ok(FuncDef {
        name,
        func_type,
        env: func_env,
        body,
    })
}

fn analyze_external_decl(
    decl: &ast::Declaration,
    env: &mut Env,
    declns: &mut Vec<ExternDecln>,
) -> CompilerResult<()> {
    let base = resolve_base_type(&decl.specs, env)?;

    for init in &decl.declarators {
        let (name, decln_type) = apply_declarator(base.clone(), &init.declarator, env)?;
        let name =
            name.ok_or_else(|| CompilerError::semantic_error("declaration needs a name"))?;

        if decl.specs.storage == Some(ast::StorageClass::Typedef) {
            if init.initializer.is_some() {
                return Err(CompilerError::semantic_error(format!(
                    "typedef '{}' cannot have an initializer",
                    name
                )));
            }
            env.push_typedef(&name, decln_type);
            continue;
        }

        // Function declarations introduce a name but emit nothing.
        if matches!(decln_type.kind, TypeKind::Function(_)) {
            env.push_global(&name, decln_type);
            continue;
        }

        let is_extern = decl.specs.storage == Some(ast::StorageClass::Extern);
        if !is_extern {
            require_complete_object(&decln_type, &name)?;
        }

        let initializer = match &init.initializer {
            Some(init_expr) => {
                if is_extern {
                    return Err(CompilerError::semantic_error(format!(
                        "extern declaration of '{}' cannot have an initializer",
                        name
                    )));
                }
                let typed = analyze_expr(init_expr, env)?;
                let typed = make_cast(typed, &decln_type)?;
                if !typed.is_const() {
                    return Err(CompilerError::semantic_error(format!(
                        "initializer of global '{}' must be a constant expression",
                        name
                    )));
                }
                Some(typed)
            }
            None => None,
        };

        env.push_global(&name, decln_type.clone());
        declns.push(ExternDecln::Obj(GlobalDecln {
            name,
            decln_type,
            initializer,
            is_extern,
        }));
    }

    Ok(())
}

/// Analyze one block-scope declaration, pushing entries into `env` and
/// producing the locals to materialize (with their env snapshots).
pub(crate) fn analyze_local_decl(
    decl: &ast::Declaration,
    env: &mut Env,
) -> CompilerResult<Vec<(Env, Decln)>> {
    let base = resolve_base_type(&decl.specs, env)?;
    let mut out = Vec::new();

    for init in &decl.declarators {
        let (name, decln_type) = apply_declarator(base.clone(), &init.declarator, env)?;
        let name =
            name.ok_or_else(|| CompilerError::semantic_error("declaration needs a name"))?;

        if decl.specs.storage == Some(ast::StorageClass::Typedef) {
            env.push_typedef(&name, decln_type);
            continue;
        }
        if decl.specs.storage == Some(ast::StorageClass::Extern) {
            return Err(CompilerError::semantic_error(format!(
                "block-scope extern declaration of '{}' is not supported",
                name
            )));
        }
        if matches!(decln_type.kind, TypeKind::Function(_)) {
            env.push_global(&name, decln_type);
            continue;
        }

        require_complete_object(&decln_type, &name)?;

        // The initializer is typed in the environment before the new
        // name exists, so `int x = x;` cannot see itself.
        let initializer = match &init.initializer {
            Some(init_expr) => {
                if decln_type.is_struct_or_union() {
                    let typed = analyze_expr(init_expr, env)?;
                    Some(make_cast(typed, &decln_type)?)
                } else {
                    let typed = analyze_expr(init_expr, env)?;
                    let typed = expr::decay(typed);
                    Some(make_cast(typed, &decln_type)?)
                }
            }
            None => None,
        };

        env.push_stack(&name, decln_type.clone());
        out.push((
            env.clone(),
            Decln {
                name,
                decln_type,
                initializer,
            },
        ));
    }

    Ok(out)
}

fn require_complete_object(decln_type: &ExprType, name: &str) -> CompilerResult<()> {
    match &decln_type.kind {
        TypeKind::Void => Err(CompilerError::semantic_error(format!(
            "cannot declare '{}' with type void",
            name
        ))),
        TypeKind::IncompleteArray(_) => Err(CompilerError::semantic_error(format!(
            "array '{}' has no size",
            name
        ))),
        TypeKind::StructOrUnion(layout) if !layout.is_complete() => Err(
            CompilerError::semantic_error(format!("'{}' has incomplete type '{}'", name, layout)),
        ),
        _ => Ok(()),
    }
}

/// Resolve declaration specifiers into a base type. Struct, union, and
/// enum specifiers mutate the environment (tags, enum constants).
pub(crate) fn resolve_base_type(
    specs: &ast::DeclnSpecs,
    env: &mut Env,
) -> CompilerResult<ExprType> {
    let mut is_short = false;
    let mut is_long = false;
    let mut is_signed = false;
    let mut is_unsigned = false;
    let mut basic: Option<&ast::TypeSpec> = None;

    for spec in &specs.type_specs {
        match spec {
            ast::TypeSpec::Short => set_flag(&mut is_short, "short")?,
            ast::TypeSpec::Long => set_flag(&mut is_long, "long")?,
            ast::TypeSpec::Signed => set_flag(&mut is_signed, "signed")?,
            ast::TypeSpec::Unsigned => set_flag(&mut is_unsigned, "unsigned")?,
            other => {
                if basic.is_some() {
                    return Err(CompilerError::semantic_error(
                        "multiple type specifiers in declaration",
                    ));
                }
                basic = Some(other);
            }
        }
    }
    if is_signed && is_unsigned {
        return Err(CompilerError::semantic_error(
            "both 'signed' and 'unsigned' in declaration",
        ));
    }
    if is_short && is_long {
        return Err(CompilerError::semantic_error(
            "both 'short' and 'long' in declaration",
        ));
    }

    let kind = match basic {
        None | Some(ast::TypeSpec::Int) => {
            if basic.is_none() && !is_short && !is_long && !is_signed && !is_unsigned {
                return Err(CompilerError::semantic_error(
                    "declaration has no type specifier",
                ));
            }
            match (is_short, is_unsigned) {
                (true, false) => TypeKind::Short,
                (true, true) => TypeKind::UShort,
                (false, false) => TypeKind::Long,
                (false, true) => TypeKind::ULong,
            }
        }
        Some(ast::TypeSpec::Void) => TypeKind::Void,
        Some(ast::TypeSpec::Char) => {
            if is_unsigned {
                TypeKind::UChar
            } else {
                TypeKind::Char
            }
        }
        Some(ast::TypeSpec::Float) => TypeKind::Float,
        Some(ast::TypeSpec::Double) => TypeKind::Double,
        Some(ast::TypeSpec::Struct(spec)) => {
            TypeKind::StructOrUnion(resolve_struct_spec(spec, true, env)?)
        }
        Some(ast::TypeSpec::Union(spec)) => {
            TypeKind::StructOrUnion(resolve_struct_spec(spec, false, env)?)
        }
        Some(ast::TypeSpec::Enum(spec)) => {
            resolve_enum_spec(spec, env)?;
            TypeKind::Long
        }
        Some(ast::TypeSpec::TypedefName(name)) => {
            let entry = env.find(name);
            match entry {
                Some(Entry {
                    kind: EntryKind::Typedef,
                    entry_type,
                    ..
                }) => {
                    return Ok(entry_type.with_qualifiers(
                        specs.is_const || entry_type.is_const,
                        specs.is_volatile || entry_type.is_volatile,
                    ));
                }
                _ => {
                    return Err(CompilerError::semantic_error(format!(
                        "'{}' is not a type name",
                        name
                    )))
                }
            }
        }
        Some(other) => panic!("type specifier {:?} escaped the flag pass", other),
    };

    Ok(ExprType::qualified(kind, specs.is_const, specs.is_volatile))
}

fn set_flag(flag: &mut bool, what: &str) -> CompilerResult<()> {
    if *flag {
        return Err(CompilerError::semantic_error(format!(
            "duplicate '{}' in declaration",
            what
        )));
    }
    *flag = true;
    Ok(())
}

fn resolve_struct_spec(
    spec: &ast::StructSpec,
    is_struct: bool,
    env: &mut Env,
) -> CompilerResult<Rc<StructOrUnionLayout>> {
    match (&spec.tag, &spec.members) {
        // Reference by tag: find it anywhere, or forward-declare here.
        (Some(tag), None) => match env.find_tag(tag) {
            Some(layout) => {
                if layout.is_struct != is_struct {
                    return Err(CompilerError::semantic_error(format!(
                        "'{}' declared as both struct and union",
                        tag
                    )));
                }
                Ok(layout)
            }
            None => {
                let layout = StructOrUnionLayout::incomplete(is_struct, Some(tag.clone()));
                env.push_tag(tag, layout.clone());
                Ok(layout)
            }
        },
        // Definition: complete an incomplete tag in this scope, or
        // introduce a new one.
        (tag, Some(member_decls)) => {
            let layout = match tag {
                Some(tag) => match env.find_tag_in_current_scope(tag) {
                    Some(existing) => {
                        if existing.is_complete() {
                            return Err(CompilerError::semantic_error(format!(
                                "redefinition of '{}'",
                                existing
                            )));
                        }
                        if existing.is_struct != is_struct {
                            return Err(CompilerError::semantic_error(format!(
                                "'{}' declared as both struct and union",
                                tag
                            )));
                        }
                        existing
                    }
                    None => {
                        let layout = StructOrUnionLayout::incomplete(is_struct, Some(tag.clone()));
                        env.push_tag(tag, layout.clone());
                        layout
                    }
                },
                None => StructOrUnionLayout::incomplete(is_struct, None),
            };

            let mut members = Vec::new();
            for member_decl in member_decls {
                let base = resolve_base_type(&member_decl.specs, env)?;
                for declarator in &member_decl.declarators {
                    let (name, member_type) = apply_declarator(base.clone(), declarator, env)?;
                    let name = name.ok_or_else(|| {
                        CompilerError::semantic_error("struct member needs a name")
                    })?;
                    require_complete_object(&member_type, &name)?;
                    if matches!(member_type.kind, TypeKind::Function(_)) {
                        return Err(CompilerError::semantic_error(format!(
                            "member '{}' cannot have function type",
                            name
                        )));
                    }
                    if members.iter().any(|(n, _): &(String, ExprType)| *n == name) {
                        return Err(CompilerError::semantic_error(format!(
                            "duplicate member '{}'",
                            name
                        )));
                    }
                    members.push((name, member_type));
                }
            }
            layout.define(members);
            Ok(layout)
        }
        (None, None) => panic!("struct specifier with neither tag nor members"),
    }
}

fn resolve_enum_spec(spec: &ast::EnumSpec, env: &mut Env) -> CompilerResult<()> {
    if let Some(enumerators) = &spec.enumerators {
        let mut next = 0i32;
        for enumerator in enumerators {
            let value = match &enumerator.value {
                Some(value_expr) => expr::eval_const_long(value_expr, env)?,
                None => next,
            };
            env.push_enum(&enumerator.name, ExprType::long(), value);
            next = value.wrapping_add(1);
        }
    }
    Ok(())
}

/// Wrap a base type in a declarator's modifiers, innermost last.
pub(crate) fn apply_declarator(
    base: ExprType,
    declarator: &ast::Declarator,
    env: &mut Env,
) -> CompilerResult<(Option<String>, ExprType)> {
    let mut ty = base;

    for modifier in declarator.modifiers.iter().rev() {
        match modifier {
            ast::TypeModifier::Pointer {
                is_const,
                is_volatile,
            } => {
                ty = ExprType::qualified(
                    TypeKind::Pointer(Box::new(ty)),
                    *is_const,
                    *is_volatile,
                );
            }
            ast::TypeModifier::Array(size) => {
                ty = match size {
                    Some(size_expr) => {
                        let num_elems = expr::eval_const_long(size_expr, env)?;
                        if num_elems <= 0 {
                            return Err(CompilerError::semantic_error(format!(
                                "array size must be positive, got {}",
                                num_elems
                            )));
                        }
                        ExprType::array(ty, num_elems)
                    }
                    None => ExprType::new(TypeKind::IncompleteArray(Box::new(ty))),
                };
            }
            ast::TypeModifier::Function { params, is_varargs } => {
                let mut resolved = Vec::with_capacity(params.len());
                for param in params {
                    let param_base = resolve_base_type(&param.specs, env)?;
                    let (param_name, param_type) =
                        apply_declarator(param_base, &param.declarator, env)?;
                    // Parameters of array or function type adjust to
                    // pointers.
                    let param_type = match param_type.kind {
                        TypeKind::Array(elem, _) | TypeKind::IncompleteArray(elem) => {
                            ExprType::pointer(*elem)
                        }
                        TypeKind::Function(_) => ExprType::pointer(param_type),
                        _ => param_type,
                    };
                    resolved.push((param_name.unwrap_or_default(), param_type));
                }
                ty = ExprType::new(TypeKind::Function(FunctionType::new(
                    ty,
                    resolved,
                    *is_varargs,
                )));
            }
        }
    }

    Ok((declarator.name.clone(), ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze_source(source: &str) -> CompilerResult<TranslnUnit> {
        analyze(&parse("test.c", source).unwrap())
    }

    #[test]
    fn test_simple_function() {
        let unit = analyze_source("int main() { return 0; }").unwrap();
        assert_eq!(unit.declns.len(), 1);
        match &unit.declns[0] {
            ExternDecln::Func(def) => {
                assert_eq!(def.name, "main");
                assert!(def.func_type.ret.equal_type(&ExprType::long()));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = analyze_source("int main() { return x; }").unwrap_err();
        assert!(err.to_string().contains("x"));
    }

    #[test]
    fn test_global_with_const_initializer() {
        let unit = analyze_source("int x = 2 + 3;").unwrap();
        match &unit.declns[0] {
            ExternDecln::Obj(obj) => {
                assert_eq!(obj.name, "x");
                assert!(matches!(
                    obj.initializer.as_ref().map(|e| &e.kind),
                    Some(crate::typed::ExprKind::ConstLong(5))
                ));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_global_initializer_must_be_const() {
        let err = analyze_source("int y; int x = y;").unwrap_err();
        assert!(err.to_string().contains("constant"));
    }

    #[test]
    fn test_self_referential_struct() {
        let unit = analyze_source(
            "struct node { struct node *next; int value; };\n\
             int main() { struct node n; n.value = 1; return n.value; }",
        )
        .unwrap();
        assert_eq!(unit.declns.len(), 1);
    }

    #[test]
    fn test_struct_redefinition_rejected() {
        let err =
            analyze_source("struct s { int x; }; struct s { int y; };").unwrap_err();
        assert!(err.to_string().contains("redefinition"));
    }

    #[test]
    fn test_void_object_rejected() {
        let err = analyze_source("void x;").unwrap_err();
        assert!(err.to_string().contains("void"));
    }

    #[test]
    fn test_enum_constants_usable() {
        let unit = analyze_source(
            "enum color { RED, GREEN = 5, BLUE };\n\
             int main() { return BLUE; }",
        )
        .unwrap();
        assert_eq!(unit.declns.len(), 1);
    }

    #[test]
    fn test_typedef_resolves() {
        let unit = analyze_source("typedef unsigned int uint; uint x;").unwrap();
        match &unit.declns[0] {
            ExternDecln::Obj(obj) => {
                assert!(obj.decln_type.equal_type(&ExprType::ulong()));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_short_unsigned_combinations() {
        let unit = analyze_source("unsigned short a; short b; unsigned c;").unwrap();
        let types: Vec<&ExprType> = unit
            .declns
            .iter()
            .map(|d| match d {
                ExternDecln::Obj(obj) => &obj.decln_type,
                other => panic!("expected object, got {:?}", other),
            })
            .collect();
        assert!(types[0].equal_type(&ExprType::ushort()));
        assert!(types[1].equal_type(&ExprType::short()));
        assert!(types[2].equal_type(&ExprType::ulong()));
    }
}
