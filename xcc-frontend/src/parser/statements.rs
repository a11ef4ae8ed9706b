//! Statement parsing

use crate::ast::*;
use crate::lexer::TokenType;
use crate::parser::Parser;
use xcc_common::CompilerError;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, CompilerError> {
        match self.peek().map(|t| &t.token_type) {
            Some(TokenType::LeftBrace) => self.parse_compound_statement(),
            Some(TokenType::If) => self.parse_if_statement(),
            Some(TokenType::While) => self.parse_while_statement(),
            Some(TokenType::Do) => self.parse_do_while_statement(),
            Some(TokenType::For) => self.parse_for_statement(),
            Some(TokenType::Switch) => self.parse_switch_statement(),
            Some(TokenType::Case) => self.parse_case_statement(),
            Some(TokenType::Default) => {
                self.advance();
                self.expect(TokenType::Colon, "default label")?;
                let stmt = self.parse_statement()?;
                Ok(Stmt::Default(Box::new(stmt)))
            }
            Some(TokenType::Return) => {
                self.advance();
                let expr = if self.check(&TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenType::Semicolon, "return statement")?;
                Ok(Stmt::Return(expr))
            }
            Some(TokenType::Break) => {
                self.advance();
                self.expect(TokenType::Semicolon, "break statement")?;
                Ok(Stmt::Break)
            }
            Some(TokenType::Continue) => {
                self.advance();
                self.expect(TokenType::Semicolon, "continue statement")?;
                Ok(Stmt::Continue)
            }
            Some(TokenType::Goto) => {
                self.advance();
                let label = self.expect_identifier("goto statement")?;
                self.expect(TokenType::Semicolon, "goto statement")?;
                Ok(Stmt::Goto(label))
            }
            Some(TokenType::Semicolon) => {
                self.advance();
                Ok(Stmt::Expr(None))
            }
            // `label:` needs two tokens of lookahead to tell apart from
            // an expression statement starting with an identifier.
            Some(TokenType::Identifier(_)) if self.peek_type(1) == Some(&TokenType::Colon) => {
                let label = self.expect_identifier("labeled statement")?;
                self.advance(); // ':'
                let stmt = self.parse_statement()?;
                Ok(Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenType::Semicolon, "expression statement")?;
                Ok(Stmt::Expr(Some(expr)))
            }
        }
    }

    pub(crate) fn parse_compound_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.expect(TokenType::LeftBrace, "compound statement")?;
        self.enter_scope();

        let mut items = Vec::new();
        while !self.check(&TokenType::RightBrace) {
            if self.check(&TokenType::EndOfFile) {
                self.exit_scope();
                return Err(self.error_here("unterminated compound statement"));
            }
            if self.at_declaration_start() {
                match self.parse_declaration() {
                    Ok(decl) => items.push(BlockItem::Decl(decl)),
                    Err(err) => {
                        self.exit_scope();
                        return Err(err);
                    }
                }
            } else {
                match self.parse_statement() {
                    Ok(stmt) => items.push(BlockItem::Stmt(stmt)),
                    Err(err) => {
                        self.exit_scope();
                        return Err(err);
                    }
                }
            }
        }

        self.exit_scope();
        self.expect(TokenType::RightBrace, "compound statement")?;
        Ok(Stmt::Compound(items))
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.advance(); // 'if'
        self.expect(TokenType::LeftParen, "if statement")?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::RightParen, "if statement")?;
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.match_token(&TokenType::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.advance(); // 'while'
        self.expect(TokenType::LeftParen, "while statement")?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::RightParen, "while statement")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_do_while_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.advance(); // 'do'
        let body = Box::new(self.parse_statement()?);
        self.expect(TokenType::While, "do-while statement")?;
        self.expect(TokenType::LeftParen, "do-while statement")?;
        let cond = self.parse_expression()?;
        self.expect(TokenType::RightParen, "do-while statement")?;
        self.expect(TokenType::Semicolon, "do-while statement")?;
        Ok(Stmt::DoWhile { body, cond })
    }

    fn parse_for_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.advance(); // 'for'
        self.expect(TokenType::LeftParen, "for statement")?;
        let init = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenType::Semicolon, "for statement")?;
        let cond = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenType::Semicolon, "for statement")?;
        let loop_expr = if self.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenType::RightParen, "for statement")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            loop_expr,
            body,
        })
    }

    fn parse_switch_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.advance(); // 'switch'
        self.expect(TokenType::LeftParen, "switch statement")?;
        let expr = self.parse_expression()?;
        self.expect(TokenType::RightParen, "switch statement")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::Switch { expr, body })
    }

    fn parse_case_statement(&mut self) -> Result<Stmt, CompilerError> {
        self.advance(); // 'case'
        let value = self.parse_conditional()?;
        self.expect(TokenType::Colon, "case label")?;
        let stmt = Box::new(self.parse_statement()?);
        Ok(Stmt::Case { value, stmt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_stmt(input: &str) -> Stmt {
        let tokens = Lexer::new("test.c", input).tokenize().unwrap();
        Parser::new(tokens).parse_statement().unwrap()
    }

    #[test]
    fn test_if_else() {
        let stmt = parse_stmt("if (x) y = 1; else y = 2;");
        match stmt {
            Stmt::If { otherwise, .. } => assert!(otherwise.is_some()),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_else_binds_inner() {
        let stmt = parse_stmt("if (a) if (b) x; else y;");
        match stmt {
            Stmt::If {
                then, otherwise, ..
            } => {
                assert!(otherwise.is_none());
                assert!(matches!(
                    *then,
                    Stmt::If {
                        otherwise: Some(_),
                        ..
                    }
                ));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_for_with_empty_clauses() {
        let stmt = parse_stmt("for (;;) break;");
        match stmt {
            Stmt::For {
                init,
                cond,
                loop_expr,
                ..
            } => {
                assert!(init.is_none());
                assert!(cond.is_none());
                assert!(loop_expr.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_switch_with_cases() {
        let stmt = parse_stmt("switch (x) { case 1: break; default: break; }");
        match stmt {
            Stmt::Switch { body, .. } => match *body {
                Stmt::Compound(items) => assert_eq!(items.len(), 2),
                other => panic!("expected compound body, got {:?}", other),
            },
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn test_labeled_and_goto() {
        let stmt = parse_stmt("{ goto out; out: ; }");
        match stmt {
            Stmt::Compound(items) => {
                assert!(matches!(items[0], BlockItem::Stmt(Stmt::Goto(_))));
                assert!(matches!(items[1], BlockItem::Stmt(Stmt::Labeled { .. })));
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_do_while() {
        let stmt = parse_stmt("do x = x - 1; while (x);");
        assert!(matches!(stmt, Stmt::DoWhile { .. }));
    }

    #[test]
    fn test_declarations_inside_block() {
        let stmt = parse_stmt("{ int x = 1; x = x + 1; }");
        match stmt {
            Stmt::Compound(items) => {
                assert!(matches!(items[0], BlockItem::Decl(_)));
                assert!(matches!(items[1], BlockItem::Stmt(_)));
            }
            other => panic!("expected compound, got {:?}", other),
        }
    }
}
