//! Expression parsing
//!
//! One function per precedence level, from assignment down to primary
//! expressions. The comma operator is not part of the subset, so a full
//! expression is an assignment expression.

use crate::ast::*;
use crate::lexer::TokenType;
use crate::parser::Parser;
use xcc_common::CompilerError;

impl Parser {
    pub fn parse_expression(&mut self) -> Result<Expr, CompilerError> {
        self.parse_assignment()
    }

    /// Assignment is right-associative; the left side's lvalue-ness is
    /// checked during analysis, not here.
    pub(crate) fn parse_assignment(&mut self) -> Result<Expr, CompilerError> {
        let left = self.parse_conditional()?;

        let op = match self.peek().map(|t| &t.token_type) {
            Some(TokenType::Equal) => None,
            Some(TokenType::PlusEqual) => Some(BinaryOp::Add),
            Some(TokenType::MinusEqual) => Some(BinaryOp::Sub),
            Some(TokenType::StarEqual) => Some(BinaryOp::Mul),
            Some(TokenType::SlashEqual) => Some(BinaryOp::Div),
            Some(TokenType::PercentEqual) => Some(BinaryOp::Mod),
            Some(TokenType::AmpersandEqual) => Some(BinaryOp::BitwiseAnd),
            Some(TokenType::PipeEqual) => Some(BinaryOp::BitwiseOr),
            Some(TokenType::CaretEqual) => Some(BinaryOp::Xor),
            Some(TokenType::LeftShiftEqual) => Some(BinaryOp::LShift),
            Some(TokenType::RightShiftEqual) => Some(BinaryOp::RShift),
            _ => return Ok(left),
        };
        self.advance();
        let right = Box::new(self.parse_assignment()?);
        let left = Box::new(left);

        Ok(match op {
            None => Expr::Assign { left, right },
            Some(op) => Expr::AssignOp { op, left, right },
        })
    }

    pub(crate) fn parse_conditional(&mut self) -> Result<Expr, CompilerError> {
        let cond = self.parse_logical_or()?;
        if !self.match_token(&TokenType::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expression()?;
        self.expect(TokenType::Colon, "conditional expression")?;
        let else_expr = self.parse_conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_logical_or(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_logical_and()?;
        while self.match_token(&TokenType::PipePipe) {
            let right = self.parse_logical_and()?;
            left = binary(BinaryOp::LogicalOr, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_bitwise_or()?;
        while self.match_token(&TokenType::AmpersandAmpersand) {
            let right = self.parse_bitwise_or()?;
            left = binary(BinaryOp::LogicalAnd, left, right);
        }
        Ok(left)
    }

    fn parse_bitwise_or(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_xor()?;
        while self.match_token(&TokenType::Pipe) {
            let right = self.parse_xor()?;
            left = binary(BinaryOp::BitwiseOr, left, right);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_bitwise_and()?;
        while self.match_token(&TokenType::Caret) {
            let right = self.parse_bitwise_and()?;
            left = binary(BinaryOp::Xor, left, right);
        }
        Ok(left)
    }

    fn parse_bitwise_and(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_equality()?;
        while self.match_token(&TokenType::Ampersand) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::BitwiseAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::EqualEqual) => BinaryOp::Equal,
                Some(TokenType::BangEqual) => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::Less) => BinaryOp::Less,
                Some(TokenType::Greater) => BinaryOp::Greater,
                Some(TokenType::LessEqual) => BinaryOp::LessEqual,
                Some(TokenType::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_shift()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::LeftShift) => BinaryOp::LShift,
                Some(TokenType::RightShift) => BinaryOp::RShift,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::Plus) => BinaryOp::Add,
                Some(TokenType::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompilerError> {
        let mut left = self.parse_cast_expr()?;
        loop {
            let op = match self.peek().map(|t| &t.token_type) {
                Some(TokenType::Star) => BinaryOp::Mul,
                Some(TokenType::Slash) => BinaryOp::Div,
                Some(TokenType::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_cast_expr()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `(type-name) expr` or a unary expression.
    fn parse_cast_expr(&mut self) -> Result<Expr, CompilerError> {
        if self.check(&TokenType::LeftParen) && self.token_starts_type_at(1) {
            self.advance();
            let type_name = self.parse_type_name()?;
            self.expect(TokenType::RightParen, "cast expression")?;
            let expr = self.parse_cast_expr()?;
            return Ok(Expr::Cast {
                type_name: Box::new(type_name),
                expr: Box::new(expr),
            });
        }
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> Result<Expr, CompilerError> {
        match self.peek().map(|t| &t.token_type) {
            Some(TokenType::PlusPlus) => {
                self.advance();
                let expr = self.parse_unary()?;
                Ok(Expr::IncDec {
                    op: IncDecOp::PreIncrement,
                    expr: Box::new(expr),
                })
            }
            Some(TokenType::MinusMinus) => {
                self.advance();
                let expr = self.parse_unary()?;
                Ok(Expr::IncDec {
                    op: IncDecOp::PreDecrement,
                    expr: Box::new(expr),
                })
            }
            Some(TokenType::Ampersand) => {
                self.advance();
                let expr = self.parse_cast_expr()?;
                Ok(Expr::Reference(Box::new(expr)))
            }
            Some(TokenType::Star) => {
                self.advance();
                let expr = self.parse_cast_expr()?;
                Ok(Expr::Dereference(Box::new(expr)))
            }
            Some(TokenType::Plus) => {
                self.advance();
                let expr = self.parse_cast_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Positive,
                    expr: Box::new(expr),
                })
            }
            Some(TokenType::Minus) => {
                self.advance();
                let expr = self.parse_cast_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Negative,
                    expr: Box::new(expr),
                })
            }
            Some(TokenType::Tilde) => {
                self.advance();
                let expr = self.parse_cast_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::BitwiseNot,
                    expr: Box::new(expr),
                })
            }
            Some(TokenType::Bang) => {
                self.advance();
                let expr = self.parse_cast_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::LogicalNot,
                    expr: Box::new(expr),
                })
            }
            Some(TokenType::Sizeof) => {
                self.advance();
                if self.check(&TokenType::LeftParen) && self.token_starts_type_at(1) {
                    self.advance();
                    let type_name = self.parse_type_name()?;
                    self.expect(TokenType::RightParen, "sizeof")?;
                    Ok(Expr::SizeofType(Box::new(type_name)))
                } else {
                    let expr = self.parse_unary()?;
                    Ok(Expr::SizeofExpr(Box::new(expr)))
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompilerError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().map(|t| &t.token_type) {
                Some(TokenType::LeftParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenType::RightParen) {
                        args.push(self.parse_assignment()?);
                        while self.match_token(&TokenType::Comma) {
                            args.push(self.parse_assignment()?);
                        }
                    }
                    self.expect(TokenType::RightParen, "function call")?;
                    expr = Expr::FuncCall {
                        func: Box::new(expr),
                        args,
                    };
                }
                Some(TokenType::LeftBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenType::RightBracket, "array subscript")?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(TokenType::Dot) => {
                    self.advance();
                    let name = self.expect_identifier("member access")?;
                    expr = Expr::Member {
                        expr: Box::new(expr),
                        name,
                    };
                }
                Some(TokenType::Arrow) => {
                    self.advance();
                    let name = self.expect_identifier("member access")?;
                    expr = Expr::Arrow {
                        expr: Box::new(expr),
                        name,
                    };
                }
                Some(TokenType::PlusPlus) => {
                    self.advance();
                    expr = Expr::IncDec {
                        op: IncDecOp::PostIncrement,
                        expr: Box::new(expr),
                    };
                }
                Some(TokenType::MinusMinus) => {
                    self.advance();
                    expr = Expr::IncDec {
                        op: IncDecOp::PostDecrement,
                        expr: Box::new(expr),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompilerError> {
        match self.peek().map(|t| t.token_type.clone()) {
            Some(TokenType::IntLiteral(value)) => {
                self.advance();
                Ok(Expr::IntConst(value))
            }
            Some(TokenType::UIntLiteral(value)) => {
                self.advance();
                Ok(Expr::UIntConst(value))
            }
            Some(TokenType::FloatLiteral(value)) => {
                self.advance();
                Ok(Expr::FloatConst(value))
            }
            Some(TokenType::DoubleLiteral(value)) => {
                self.advance();
                Ok(Expr::DoubleConst(value))
            }
            Some(TokenType::CharLiteral(value)) => {
                self.advance();
                Ok(Expr::CharConst(value))
            }
            Some(TokenType::StringLiteral(value)) => {
                self.advance();
                Ok(Expr::StringLiteral(value))
            }
            Some(TokenType::Identifier(name)) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            Some(TokenType::LeftParen) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::RightParen, "parenthesized expression")?;
                Ok(expr)
            }
            Some(other) => Err(self.error_here(format!("expected expression, found '{}'", other))),
            None => Err(self.error_here("expected expression, found end of file")),
        }
    }

    /// Does the token `offset` ahead begin a type name?
    pub(crate) fn token_starts_type_at(&self, offset: usize) -> bool {
        match self.peek_type(offset) {
            Some(
                TokenType::Void
                | TokenType::Char
                | TokenType::Short
                | TokenType::Int
                | TokenType::Long
                | TokenType::Signed
                | TokenType::Unsigned
                | TokenType::Float
                | TokenType::Double
                | TokenType::Struct
                | TokenType::Union
                | TokenType::Enum
                | TokenType::Const
                | TokenType::Volatile,
            ) => true,
            Some(TokenType::Identifier(name)) => self.is_typedef_name(name),
            _ => false,
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_expr(input: &str) -> Expr {
        let tokens = Lexer::new("test.c", input).tokenize().unwrap();
        Parser::new(tokens).parse_expression().unwrap()
    }

    #[test]
    fn test_postfix_chain() {
        let expr = parse_expr("p->next->value");
        match expr {
            Expr::Arrow { expr, name } => {
                assert_eq!(name, "value");
                assert!(matches!(*expr, Expr::Arrow { .. }));
            }
            other => panic!("expected arrow access, got {:?}", other),
        }
    }

    #[test]
    fn test_index_lowers_later() {
        let expr = parse_expr("a[i + 1]");
        match expr {
            Expr::Index { index, .. } => {
                assert!(matches!(*index, Expr::Binary { .. }));
            }
            other => panic!("expected subscript, got {:?}", other),
        }
    }

    #[test]
    fn test_call_with_args() {
        let expr = parse_expr("f(1, x, g(2))");
        match expr {
            Expr::FuncCall { args, .. } => assert_eq!(args.len(), 3),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_cast_expression() {
        let expr = parse_expr("(double)x");
        assert!(matches!(expr, Expr::Cast { .. }));
    }

    #[test]
    fn test_paren_expr_is_not_cast() {
        let expr = parse_expr("(x) + 1");
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_sizeof_type_and_expr() {
        assert!(matches!(parse_expr("sizeof(int)"), Expr::SizeofType(_)));
        assert!(matches!(parse_expr("sizeof x"), Expr::SizeofExpr(_)));
        assert!(matches!(parse_expr("sizeof(x)"), Expr::SizeofExpr(_)));
    }

    #[test]
    fn test_unary_binding() {
        let expr = parse_expr("-a * b");
        match expr {
            Expr::Binary {
                op: BinaryOp::Mul,
                left,
                ..
            } => assert!(matches!(*left, Expr::Unary { .. })),
            other => panic!("expected multiplication at top, got {:?}", other),
        }
    }

    #[test]
    fn test_address_and_deref() {
        assert!(matches!(parse_expr("&x"), Expr::Reference(_)));
        assert!(matches!(parse_expr("*p"), Expr::Dereference(_)));
    }

    #[test]
    fn test_shift_precedence_below_additive() {
        let expr = parse_expr("1 << 2 + 3");
        match expr {
            Expr::Binary {
                op: BinaryOp::LShift,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    op: BinaryOp::Add,
                    ..
                }
            )),
            other => panic!("expected shift at top, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_precedence() {
        let expr = parse_expr("a || b && c");
        match expr {
            Expr::Binary {
                op: BinaryOp::LogicalOr,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    op: BinaryOp::LogicalAnd,
                    ..
                }
            )),
            other => panic!("expected logical-or at top, got {:?}", other),
        }
    }
}
