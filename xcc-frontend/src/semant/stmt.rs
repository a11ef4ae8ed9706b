//! Statement analysis
//!
//! Statements carry no types of their own; this pass types the embedded
//! expressions, checks conditions are scalar, resolves case labels to
//! constants, casts return values, and records the environment snapshots
//! code generation needs for stack bookkeeping.

use crate::ast;
use crate::cast::make_cast;
use crate::env::Env;
use crate::semant::{analyze_local_decl, expr};
use crate::typed::{Expr, Stmt};
use crate::types::ExprType;
use xcc_common::{CompilerError, CompilerResult};

/// Analyze one statement against the current environment.
pub fn analyze_stmt(stmt: &ast::Stmt, env: &mut Env) -> CompilerResult<Stmt> {
    match stmt {
        ast::Stmt::Compound(items) => analyze_compound(items, env),

        ast::Stmt::Expr(expr) => {
            let expr = match expr {
                Some(expr) => Some(expr::analyze_expr(expr, env)?),
                None => None,
            };
            Ok(Stmt::Expr(expr))
        }

        ast::Stmt::If {
            cond,
            then,
            otherwise,
        } => {
            let cond = analyze_condition(cond, env, "if condition")?;
            let then = Box::new(analyze_stmt(then, env)?);
            match otherwise {
                Some(otherwise) => Ok(Stmt::IfElse {
                    cond,
                    then,
                    otherwise: Box::new(analyze_stmt(otherwise, env)?),
                }),
                None => Ok(Stmt::If { cond, then }),
            }
        }

        ast::Stmt::While { cond, body } => {
            let cond = analyze_condition(cond, env, "while condition")?;
            let body = Box::new(analyze_stmt(body, env)?);
            Ok(Stmt::While { cond, body })
        }

        ast::Stmt::DoWhile { body, cond } => {
            let body = Box::new(analyze_stmt(body, env)?);
            let cond = analyze_condition(cond, env, "do-while condition")?;
            Ok(Stmt::DoWhile { body, cond })
        }

        ast::Stmt::For {
            init,
            cond,
            loop_expr,
            body,
        } => {
            let init = match init {
                Some(init) => Some(expr::analyze_expr(init, env)?),
                None => None,
            };
            let cond = match cond {
                Some(cond) => Some(analyze_condition(cond, env, "for condition")?),
                None => None,
            };
            let loop_expr = match loop_expr {
                Some(loop_expr) => Some(expr::analyze_expr(loop_expr, env)?),
                None => None,
            };
            let body = Box::new(analyze_stmt(body, env)?);
            Ok(Stmt::For {
                init,
                cond,
                loop_expr,
                body,
            })
        }

        ast::Stmt::Switch { expr, body } => {
            let typed = expr::decay(expr::analyze_expr(expr, env)?);
            if !typed.expr_type.is_integral() {
                return Err(CompilerError::type_error(format!(
                    "switch needs an integral controlling expression, got '{}'",
                    typed.expr_type
                )));
            }
            let typed = make_cast(typed, &ExprType::long())?;
            let body = Box::new(analyze_stmt(body, env)?);
            Ok(Stmt::Switch { expr: typed, body })
        }

        ast::Stmt::Case { value, stmt } => {
            let value = expr::eval_const_long(value, env)?;
            let stmt = Box::new(analyze_stmt(stmt, env)?);
            Ok(Stmt::Case { value, stmt })
        }

        ast::Stmt::Default(stmt) => Ok(Stmt::Default(Box::new(analyze_stmt(stmt, env)?))),

        ast::Stmt::Return(expr) => analyze_return(expr.as_ref(), env),

        ast::Stmt::Break => Ok(Stmt::Break),
        ast::Stmt::Continue => Ok(Stmt::Continue),

        ast::Stmt::Goto(label) => Ok(Stmt::Goto(label.clone())),

        ast::Stmt::Labeled { label, stmt } => Ok(Stmt::Labeled {
            label: label.clone(),
            stmt: Box::new(analyze_stmt(stmt, env)?),
        }),
    }
}

fn analyze_compound(items: &[ast::BlockItem], env: &mut Env) -> CompilerResult<Stmt> {
    let mut inner = env.in_scope();
    let mut declns = Vec::new();
    let mut stmts = Vec::new();

    for item in items {
        match item {
            ast::BlockItem::Decl(decl) => {
                // Declarations open the block; interleaving would let an
                // initializer's side effect reorder past a statement.
                if !stmts.is_empty() {
                    return Err(CompilerError::semantic_error(
                        "declarations must precede statements in a block",
                    ));
                }
                declns.extend(analyze_local_decl(decl, &mut inner)?);
            }
            ast::BlockItem::Stmt(stmt) => {
                let typed = analyze_stmt(stmt, &mut inner)?;
                stmts.push((inner.clone(), typed));
            }
        }
    }

    Ok(Stmt::Compound { declns, stmts })
}

fn analyze_condition(cond: &ast::Expr, env: &mut Env, what: &str) -> CompilerResult<Expr> {
    let cond = expr::decay(expr::analyze_expr(cond, env)?);
    if !cond.expr_type.is_scalar() {
        return Err(CompilerError::type_error(format!(
            "{} needs a scalar value, got '{}'",
            what, cond.expr_type
        )));
    }
    Ok(cond)
}

fn analyze_return(expr: Option<&ast::Expr>, env: &mut Env) -> CompilerResult<Stmt> {
    let func = env
        .current_function()
        .unwrap_or_else(|| panic!("return statement outside a function body"));
    let expr = match expr {
        Some(expr) => {
            if func.ret.is_void() {
                return Err(CompilerError::semantic_error(
                    "void function cannot return a value",
                ));
            }
            let typed = expr::decay(expr::analyze_expr(expr, env)?);
            Some(make_cast(typed, &func.ret)?)
        }
        None => None,
    };
    Ok(Stmt::Return {
        env: env.clone(),
        expr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::typed::ExprKind;
    use crate::types::{FunctionType, TypeKind};

    fn analyze_in_function(input: &str, ret: ExprType) -> CompilerResult<Stmt> {
        let tokens = Lexer::new("test.c", input).tokenize().unwrap();
        let ast = Parser::new(tokens).parse_statement().unwrap();
        let mut env = Env::new().in_scope();
        env.set_current_function(FunctionType::new(ret, vec![], false));
        analyze_stmt(&ast, &mut env)
    }

    #[test]
    fn test_return_casts_to_return_type() {
        let stmt = analyze_in_function("return 'a';", ExprType::double()).unwrap();
        match stmt {
            Stmt::Return {
                expr: Some(expr), ..
            } => {
                assert!(matches!(expr.expr_type.kind, TypeKind::Double));
                assert!(matches!(expr.kind, ExprKind::ConstDouble(v) if v == 97.0));
            }
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_void_function_cannot_return_value() {
        let err = analyze_in_function("return 1;", ExprType::void()).unwrap_err();
        assert!(err.to_string().contains("void"));
    }

    #[test]
    fn test_compound_snapshots_see_earlier_locals() {
        let stmt =
            analyze_in_function("{ int x = 1; int y = 2; x = y; }", ExprType::long()).unwrap();
        match stmt {
            Stmt::Compound { declns, stmts } => {
                assert_eq!(declns.len(), 2);
                assert_eq!(stmts.len(), 1);
                // The second local's snapshot includes the first.
                assert!(declns[1].0.find("x").is_some());
                // The statement's snapshot includes both locals.
                assert_eq!(stmts[0].0.stack_size(), 8);
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_declaration_after_statement_rejected() {
        let err =
            analyze_in_function("{ x = 1; int x; }", ExprType::long()).unwrap_err();
        assert!(err.to_string().contains("precede"));
    }

    #[test]
    fn test_switch_requires_integral() {
        let err = analyze_in_function("switch (1.0) { }", ExprType::long()).unwrap_err();
        assert!(err.to_string().contains("integral"));
    }

    #[test]
    fn test_case_value_folds() {
        let stmt =
            analyze_in_function("switch (1) { case 2 + 3: break; }", ExprType::long()).unwrap();
        fn find_case(stmt: &Stmt) -> Option<i32> {
            match stmt {
                Stmt::Case { value, .. } => Some(*value),
                Stmt::Switch { body, .. } => find_case(body),
                Stmt::Compound { stmts, .. } => stmts.iter().find_map(|(_, s)| find_case(s)),
                _ => None,
            }
        }
        assert_eq!(find_case(&stmt), Some(5));
    }

    #[test]
    fn test_if_condition_must_be_scalar() {
        let tokens = Lexer::new("test.c", "if (v) ;").tokenize().unwrap();
        let ast = Parser::new(tokens).parse_statement().unwrap();
        let mut env = Env::new().in_scope();
        env.set_current_function(FunctionType::new(ExprType::long(), vec![], false));
        let layout = crate::types::StructOrUnionLayout::new_struct(
            None,
            vec![("x".to_string(), ExprType::long())],
        );
        env.push_stack("v", ExprType::new(TypeKind::StructOrUnion(layout)));
        let err = analyze_stmt(&ast, &mut env).unwrap_err();
        assert!(err.to_string().contains("scalar"));
    }

    #[test]
    fn test_inner_scope_does_not_leak() {
        let stmt = analyze_in_function("{ { int x = 1; } }", ExprType::long()).unwrap();
        match stmt {
            Stmt::Compound { stmts, .. } => match &stmts[0].1 {
                Stmt::Compound { declns, .. } => assert_eq!(declns.len(), 1),
                other => panic!("expected inner compound, got {:?}", other),
            },
            other => panic!("expected compound, got {:?}", other),
        }
    }
}
