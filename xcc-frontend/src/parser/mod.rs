//! C Recursive Descent Parser
//!
//! Parses tokens into an untyped syntax tree. The only context the parser
//! keeps is the set of typedef names in scope, needed to tell a
//! declaration from an expression statement and to parse casts.

pub mod declarations;
pub mod expressions;
pub mod statements;

use crate::ast::*;
use crate::lexer::{Token, TokenType};
use std::collections::{HashSet, VecDeque};
use xcc_common::{CompilerError, SourceLocation};

/// C Parser
pub struct Parser {
    pub(crate) tokens: VecDeque<Token>,
    /// One set of typedef names per brace scope, innermost last.
    pub(crate) typedef_scopes: Vec<HashSet<String>>,
}

impl Parser {
    /// Create a new parser
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
            typedef_scopes: vec![HashSet::new()],
        }
    }

    /// Peek at current token without consuming
    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    /// Peek at the token type `offset` tokens ahead.
    pub(crate) fn peek_type(&self, offset: usize) -> Option<&TokenType> {
        self.tokens.get(offset).map(|t| &t.token_type)
    }

    /// Get current token and advance
    pub(crate) fn advance(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    /// Check if current token matches expected type
    pub(crate) fn check(&self, token_type: &TokenType) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.token_type) == std::mem::discriminant(token_type)
        } else {
            matches!(token_type, TokenType::EndOfFile)
        }
    }

    /// Consume token if it matches expected type
    pub(crate) fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect and consume a specific token type
    pub(crate) fn expect(
        &mut self,
        token_type: TokenType,
        context: &str,
    ) -> Result<Token, CompilerError> {
        match self.advance() {
            Some(token)
                if std::mem::discriminant(&token.token_type)
                    == std::mem::discriminant(&token_type) =>
            {
                Ok(token)
            }
            Some(token) => Err(CompilerError::parse_error(
                format!(
                    "expected '{}' in {}, found '{}'",
                    token_type, context, token.token_type
                ),
                token.span.start,
            )),
            None => Err(CompilerError::parse_error(
                format!("expected '{}' in {}, found end of file", token_type, context),
                SourceLocation::dummy(),
            )),
        }
    }

    /// Expect an identifier and return its name.
    pub(crate) fn expect_identifier(&mut self, context: &str) -> Result<String, CompilerError> {
        match self.advance() {
            Some(Token {
                token_type: TokenType::Identifier(name),
                ..
            }) => Ok(name),
            Some(token) => Err(CompilerError::parse_error(
                format!("expected identifier in {}, found '{}'", context, token.token_type),
                token.span.start,
            )),
            None => Err(CompilerError::parse_error(
                format!("expected identifier in {}, found end of file", context),
                SourceLocation::dummy(),
            )),
        }
    }

    /// Get current location for error reporting
    pub(crate) fn current_location(&self) -> SourceLocation {
        match self.peek() {
            Some(token) => token.span.start.clone(),
            None => SourceLocation::dummy(),
        }
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::parse_error(message.into(), self.current_location())
    }

    pub(crate) fn enter_scope(&mut self) {
        self.typedef_scopes.push(HashSet::new());
    }

    pub(crate) fn exit_scope(&mut self) {
        self.typedef_scopes.pop();
    }

    pub(crate) fn add_typedef_name(&mut self, name: &str) {
        if let Some(scope) = self.typedef_scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    pub(crate) fn is_typedef_name(&self, name: &str) -> bool {
        self.typedef_scopes.iter().rev().any(|s| s.contains(name))
    }

    /// Does the current token begin a declaration?
    pub(crate) fn at_declaration_start(&self) -> bool {
        match self.peek().map(|t| &t.token_type) {
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
                | TokenType::Volatile
                | TokenType::Typedef
                | TokenType::Extern
                | TokenType::Static,
            ) => true,
            Some(TokenType::Identifier(name)) => self.is_typedef_name(name),
            _ => false,
        }
    }

    /// Parse a complete translation unit
    pub fn parse_translation_unit(&mut self) -> Result<TranslationUnit, CompilerError> {
        let mut externs = Vec::new();

        while !self.check(&TokenType::EndOfFile) {
            externs.push(self.parse_external_declaration()?);
        }

        Ok(TranslationUnit { externs })
    }
}

/// Parse a source string into a translation unit.
pub fn parse(filename: &str, source: &str) -> Result<TranslationUnit, CompilerError> {
    let tokens = crate::lexer::Lexer::new(filename, source).tokenize()?;
    Parser::new(tokens).parse_translation_unit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_expression_from_str(input: &str) -> Result<Expr, CompilerError> {
        let tokens = Lexer::new("test.c", input).tokenize()?;
        Parser::new(tokens).parse_expression()
    }

    fn parse_unit(input: &str) -> Result<TranslationUnit, CompilerError> {
        parse("test.c", input)
    }

    #[test]
    fn test_parse_integer_literal() {
        let expr = parse_expression_from_str("42").unwrap();
        assert_eq!(expr, Expr::IntConst(42));
    }

    #[test]
    fn test_parse_binary_precedence() {
        let expr = parse_expression_from_str("2 + 3 * 4").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => match *right {
                Expr::Binary {
                    op: BinaryOp::Mul, ..
                } => {}
                other => panic!("expected multiplication on the right, got {:?}", other),
            },
            other => panic!("expected addition at the top, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assignment_is_right_associative() {
        let expr = parse_expression_from_str("a = b = 1").unwrap();
        match expr {
            Expr::Assign { right, .. } => {
                assert!(matches!(*right, Expr::Assign { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compound_assignment() {
        let expr = parse_expression_from_str("a += 2").unwrap();
        assert!(matches!(
            expr,
            Expr::AssignOp {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_conditional() {
        let expr = parse_expression_from_str("a ? b : c").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_parse_simple_function() {
        let unit = parse_unit("int main() { return 0; }").unwrap();
        assert_eq!(unit.externs.len(), 1);
        match &unit.externs[0] {
            ExternDecl::FuncDef(def) => {
                assert_eq!(def.declarator.name.as_deref(), Some("main"));
            }
            other => panic!("expected function definition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_declaration() {
        let unit = parse_unit("int x; extern double y;").unwrap();
        assert_eq!(unit.externs.len(), 2);
        assert!(matches!(unit.externs[0], ExternDecl::Decl(_)));
    }

    #[test]
    fn test_typedef_name_enables_declaration() {
        let unit = parse_unit("typedef int myint; myint x;").unwrap();
        assert_eq!(unit.externs.len(), 2);
        match &unit.externs[1] {
            ExternDecl::Decl(decl) => {
                assert_eq!(
                    decl.specs.type_specs,
                    vec![TypeSpec::TypedefName("myint".to_string())]
                );
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_reports_location() {
        let err = parse_unit("int main() { return }").unwrap_err();
        assert!(matches!(err, CompilerError::ParseError { .. }));
    }
}
