//! C Lexer
//!
//! Tokenizes C source code into a stream of tokens. Handles keywords,
//! operators, literals, and identifiers; whitespace and comments are
//! consumed, not tokenized.

pub mod literals;
pub mod token;

pub use token::{Token, TokenType};

use std::collections::HashMap;
use xcc_common::{CompilerError, SourceLocation, SourceTracker};

/// C Lexer
pub struct Lexer {
    pub(crate) input: Vec<char>,
    pub(crate) position: usize,
    tracker: SourceTracker,
    keywords: HashMap<String, TokenType>,
}

impl Lexer {
    /// Create a new lexer
    pub fn new(filename: &str, input: &str) -> Self {
        let mut lexer = Self {
            input: input.chars().collect(),
            position: 0,
            tracker: SourceTracker::new(filename),
            keywords: HashMap::new(),
        };

        lexer.initialize_keywords();
        lexer
    }

    /// Initialize keyword map
    fn initialize_keywords(&mut self) {
        let keywords = [
            ("break", TokenType::Break),
            ("case", TokenType::Case),
            ("char", TokenType::Char),
            ("const", TokenType::Const),
            ("continue", TokenType::Continue),
            ("default", TokenType::Default),
            ("do", TokenType::Do),
            ("double", TokenType::Double),
            ("else", TokenType::Else),
            ("enum", TokenType::Enum),
            ("extern", TokenType::Extern),
            ("float", TokenType::Float),
            ("for", TokenType::For),
            ("goto", TokenType::Goto),
            ("if", TokenType::If),
            ("int", TokenType::Int),
            ("long", TokenType::Long),
            ("return", TokenType::Return),
            ("short", TokenType::Short),
            ("signed", TokenType::Signed),
            ("sizeof", TokenType::Sizeof),
            ("static", TokenType::Static),
            ("struct", TokenType::Struct),
            ("switch", TokenType::Switch),
            ("typedef", TokenType::Typedef),
            ("union", TokenType::Union),
            ("unsigned", TokenType::Unsigned),
            ("void", TokenType::Void),
            ("volatile", TokenType::Volatile),
            ("while", TokenType::While),
        ];

        for (keyword, token_type) in keywords {
            self.keywords.insert(keyword.to_string(), token_type);
        }
    }

    /// Get current character
    pub(crate) fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    pub(crate) fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    /// Advance to next character
    pub(crate) fn advance(&mut self) -> Option<char> {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            self.tracker.advance(ch);
            Some(ch)
        } else {
            None
        }
    }

    /// Get current location
    pub(crate) fn current_location(&self) -> SourceLocation {
        self.tracker.location()
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_char(1) == Some('/') => {
                    while let Some(ch) = self.current_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_char(1) == Some('*') => {
                    let start = self.current_location();
                    self.advance();
                    self.advance();
                    loop {
                        match self.current_char() {
                            Some('*') if self.peek_char(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(CompilerError::lexer_error(
                                    "Unterminated block comment".to_string(),
                                    start,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Tokenize an identifier or keyword
    fn tokenize_identifier(&mut self) -> TokenType {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if let Some(keyword_token) = self.keywords.get(&identifier) {
            keyword_token.clone()
        } else {
            TokenType::Identifier(identifier)
        }
    }

    /// Get next token
    pub fn next_token(&mut self) -> Result<Token, CompilerError> {
        self.skip_trivia()?;

        let start_location = self.current_location();

        let token_type = match self.current_char() {
            None => TokenType::EndOfFile,

            Some(ch) if ch.is_alphabetic() || ch == '_' => self.tokenize_identifier(),

            Some(ch) if ch.is_ascii_digit() => self.tokenize_number()?,

            Some('\'') => self.tokenize_char_literal()?,

            Some('"') => self.tokenize_string_literal()?,

            Some('+') => {
                self.advance();
                if self.current_char() == Some('+') {
                    self.advance();
                    TokenType::PlusPlus
                } else if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::PlusEqual
                } else {
                    TokenType::Plus
                }
            }

            Some('-') => {
                self.advance();
                if self.current_char() == Some('-') {
                    self.advance();
                    TokenType::MinusMinus
                } else if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::MinusEqual
                } else if self.current_char() == Some('>') {
                    self.advance();
                    TokenType::Arrow
                } else {
                    TokenType::Minus
                }
            }

            Some('*') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::StarEqual
                } else {
                    TokenType::Star
                }
            }

            Some('/') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::SlashEqual
                } else {
                    TokenType::Slash
                }
            }

            Some('%') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::PercentEqual
                } else {
                    TokenType::Percent
                }
            }

            Some('&') => {
                self.advance();
                if self.current_char() == Some('&') {
                    self.advance();
                    TokenType::AmpersandAmpersand
                } else if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::AmpersandEqual
                } else {
                    TokenType::Ampersand
                }
            }

            Some('|') => {
                self.advance();
                if self.current_char() == Some('|') {
                    self.advance();
                    TokenType::PipePipe
                } else if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::PipeEqual
                } else {
                    TokenType::Pipe
                }
            }

            Some('^') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::CaretEqual
                } else {
                    TokenType::Caret
                }
            }

            Some('~') => {
                self.advance();
                TokenType::Tilde
            }
            Some('!') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                }
            }

            Some('=') => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                }
            }

            Some('<') => {
                self.advance();
                if self.current_char() == Some('<') {
                    self.advance();
                    if self.current_char() == Some('=') {
                        self.advance();
                        TokenType::LeftShiftEqual
                    } else {
                        TokenType::LeftShift
                    }
                } else if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }

            Some('>') => {
                self.advance();
                if self.current_char() == Some('>') {
                    self.advance();
                    if self.current_char() == Some('=') {
                        self.advance();
                        TokenType::RightShiftEqual
                    } else {
                        TokenType::RightShift
                    }
                } else if self.current_char() == Some('=') {
                    self.advance();
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }

            Some('?') => {
                self.advance();
                TokenType::Question
            }
            Some(':') => {
                self.advance();
                TokenType::Colon
            }
            Some('(') => {
                self.advance();
                TokenType::LeftParen
            }
            Some(')') => {
                self.advance();
                TokenType::RightParen
            }
            Some('{') => {
                self.advance();
                TokenType::LeftBrace
            }
            Some('}') => {
                self.advance();
                TokenType::RightBrace
            }
            Some('[') => {
                self.advance();
                TokenType::LeftBracket
            }
            Some(']') => {
                self.advance();
                TokenType::RightBracket
            }
            Some(';') => {
                self.advance();
                TokenType::Semicolon
            }
            Some(',') => {
                self.advance();
                TokenType::Comma
            }

            Some('.') => {
                if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.tokenize_float_fraction()?
                } else if self.peek_char(1) == Some('.') && self.peek_char(2) == Some('.') {
                    self.advance();
                    self.advance();
                    self.advance();
                    TokenType::Ellipsis
                } else {
                    self.advance();
                    TokenType::Dot
                }
            }

            Some(ch) => {
                return Err(CompilerError::lexer_error(
                    format!("Unexpected character: {}", ch),
                    self.current_location(),
                ));
            }
        };

        let span = self.tracker.span_from(start_location);

        Ok(Token::new(token_type, span))
    }

    /// A floating literal starting with '.', e.g. `.5`.
    fn tokenize_float_fraction(&mut self) -> Result<TokenType, CompilerError> {
        self.tokenize_number()
    }

    /// Tokenize entire input into a vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompilerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::EndOfFile);
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        let mut lexer = Lexer::new("test.c", "int main void return if else");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens.len(), 7); // 6 words + EOF
        assert!(matches!(tokens[0].token_type, TokenType::Int));
        assert!(matches!(tokens[1].token_type, TokenType::Identifier(_)));
        assert!(matches!(tokens[2].token_type, TokenType::Void));
        assert!(matches!(tokens[3].token_type, TokenType::Return));
        assert!(matches!(tokens[4].token_type, TokenType::If));
        assert!(matches!(tokens[5].token_type, TokenType::Else));
    }

    #[test]
    fn test_operators() {
        let mut lexer = Lexer::new("test.c", "+ - * / % == != <= >= && || ++ -- << >>");
        let tokens = lexer.tokenize().unwrap();

        let expected = vec![
            TokenType::Plus,
            TokenType::Minus,
            TokenType::Star,
            TokenType::Slash,
            TokenType::Percent,
            TokenType::EqualEqual,
            TokenType::BangEqual,
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::AmpersandAmpersand,
            TokenType::PipePipe,
            TokenType::PlusPlus,
            TokenType::MinusMinus,
            TokenType::LeftShift,
            TokenType::RightShift,
            TokenType::EndOfFile,
        ];

        for (i, expected_type) in expected.iter().enumerate() {
            assert_eq!(tokens[i].token_type, *expected_type);
        }
    }

    #[test]
    fn test_integer_literals() {
        let mut lexer = Lexer::new("test.c", "42 0xff 017 3u");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0].token_type, TokenType::IntLiteral(42));
        assert_eq!(tokens[1].token_type, TokenType::IntLiteral(255));
        assert_eq!(tokens[2].token_type, TokenType::IntLiteral(15));
        assert_eq!(tokens[3].token_type, TokenType::UIntLiteral(3));
    }

    #[test]
    fn test_float_literals() {
        let mut lexer = Lexer::new("test.c", "3.0 2.5f 1e3 .5");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0].token_type, TokenType::DoubleLiteral(3.0));
        assert_eq!(tokens[1].token_type, TokenType::FloatLiteral(2.5));
        assert_eq!(tokens[2].token_type, TokenType::DoubleLiteral(1000.0));
        assert_eq!(tokens[3].token_type, TokenType::DoubleLiteral(0.5));
    }

    #[test]
    fn test_char_and_string_literals() {
        let mut lexer = Lexer::new("test.c", r#"'a' '\n' "hello\n" """#);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0].token_type, TokenType::CharLiteral(b'a'));
        assert_eq!(tokens[1].token_type, TokenType::CharLiteral(b'\n'));
        assert_eq!(
            tokens[2].token_type,
            TokenType::StringLiteral("hello\n".to_string())
        );
        assert_eq!(tokens[3].token_type, TokenType::StringLiteral(String::new()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut lexer = Lexer::new("test.c", "a // line\n/* block\n */ b");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens.len(), 3); // a, b, EOF
        assert!(matches!(tokens[0].token_type, TokenType::Identifier(_)));
        assert!(matches!(tokens[1].token_type, TokenType::Identifier(_)));
    }

    #[test]
    fn test_member_access_tokens() {
        let mut lexer = Lexer::new("test.c", "p->x s.y");
        let tokens = lexer.tokenize().unwrap();

        assert!(matches!(tokens[1].token_type, TokenType::Arrow));
        assert!(matches!(tokens[4].token_type, TokenType::Dot));
    }

    #[test]
    fn test_simple_function() {
        let input = r#"
int main() {
    return 42;
}
"#;
        let mut lexer = Lexer::new("test.c", input);
        let tokens = lexer.tokenize().unwrap();

        // int main ( ) { return 42 ; } EOF
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[0].token_type, TokenType::Int);
        match &tokens[1].token_type {
            TokenType::Identifier(name) => assert_eq!(name, "main"),
            other => panic!("expected identifier, got {:?}", other),
        }
        assert_eq!(tokens[5].token_type, TokenType::Return);
        assert_eq!(tokens[6].token_type, TokenType::IntLiteral(42));
    }

    #[test]
    fn test_location_tracking() {
        let mut lexer = Lexer::new("test.c", "a\n  b");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(tokens[0].span.start.line, 1);
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("test.c", "a @ b");
        let err = lexer.tokenize().unwrap_err();
        assert!(err.to_string().contains("Unexpected character"));
    }
}
