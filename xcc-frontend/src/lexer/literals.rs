//! Literal parsing for the C lexer
//!
//! This module handles parsing of numeric, character, and string literals.

use crate::lexer::{Lexer, TokenType};
use xcc_common::CompilerError;

impl Lexer {
    /// Tokenize a numeric literal: hex, octal, decimal, or floating.
    pub fn tokenize_number(&mut self) -> Result<TokenType, CompilerError> {
        // Hex: no floating forms in this subset.
        if self.current_char() == Some('0')
            && matches!(self.peek_char(1), Some('x') | Some('X'))
        {
            self.advance(); // '0'
            self.advance(); // 'x'
            let mut digits = String::new();
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_hexdigit() {
                    digits.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(CompilerError::lexer_error(
                    "Invalid hex literal".to_string(),
                    self.current_location(),
                ));
            }
            let value = u64::from_str_radix(&digits, 16).map_err(|_| {
                CompilerError::lexer_error(
                    format!("Invalid hex literal: 0x{}", digits),
                    self.current_location(),
                )
            })?;
            return Ok(self.integer_token(value));
        }

        let mut number = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let has_fraction = self.current_char() == Some('.')
            && self.peek_char(1).is_some_and(|c| c.is_ascii_digit());
        let has_exponent = matches!(self.current_char(), Some('e') | Some('E'));
        if has_fraction || has_exponent {
            return self.tokenize_float_tail(number);
        }
        if matches!(self.current_char(), Some('f') | Some('F')) {
            // "1f" style: an integer part with a float suffix.
            return self.tokenize_float_tail(number);
        }

        // A leading zero makes the literal octal.
        let (radix, digits) = if number.len() > 1 && number.starts_with('0') {
            (8, &number[1..])
        } else {
            (10, number.as_str())
        };
        let value = u64::from_str_radix(digits, radix).map_err(|_| {
            CompilerError::lexer_error(
                format!("Invalid integer literal: {}", number),
                self.current_location(),
            )
        })?;
        Ok(self.integer_token(value))
    }

    /// Apply integer suffixes. `u`/`U` forces unsigned; `l`/`L` is
    /// accepted and ignored since long and int share a width.
    fn integer_token(&mut self, value: u64) -> TokenType {
        let mut is_unsigned = false;
        while let Some(ch) = self.current_char() {
            match ch {
                'u' | 'U' => {
                    is_unsigned = true;
                    self.advance();
                }
                'l' | 'L' => {
                    self.advance();
                }
                _ => break,
            }
        }
        if is_unsigned {
            TokenType::UIntLiteral(value as u32)
        } else {
            TokenType::IntLiteral(value as i64)
        }
    }

    /// Finish a floating literal whose integer part is already consumed.
    fn tokenize_float_tail(&mut self, mut number: String) -> Result<TokenType, CompilerError> {
        if self.current_char() == Some('.') {
            number.push('.');
            self.advance();
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_digit() {
                    number.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.current_char(), Some('e') | Some('E')) {
            number.push('e');
            self.advance();
            if matches!(self.current_char(), Some('+') | Some('-')) {
                number.push(self.current_char().unwrap_or('+'));
                self.advance();
            }
            let mut saw_digit = false;
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_digit() {
                    number.push(ch);
                    self.advance();
                    saw_digit = true;
                } else {
                    break;
                }
            }
            if !saw_digit {
                return Err(CompilerError::lexer_error(
                    format!("Exponent has no digits: {}", number),
                    self.current_location(),
                ));
            }
        }

        let value = number.parse::<f64>().map_err(|_| {
            CompilerError::lexer_error(
                format!("Invalid floating literal: {}", number),
                self.current_location(),
            )
        })?;

        match self.current_char() {
            Some('f') | Some('F') => {
                self.advance();
                Ok(TokenType::FloatLiteral(value as f32))
            }
            Some('l') | Some('L') => {
                self.advance();
                Ok(TokenType::DoubleLiteral(value))
            }
            _ => Ok(TokenType::DoubleLiteral(value)),
        }
    }

    /// Tokenize a character literal
    pub fn tokenize_char_literal(&mut self) -> Result<TokenType, CompilerError> {
        self.advance(); // opening quote

        let ch = match self.current_char() {
            Some('\\') => {
                self.advance();
                self.escape_char('\'')?
            }
            Some(ch) if ch != '\'' => {
                self.advance();
                ch as u8
            }
            _ => {
                return Err(CompilerError::lexer_error(
                    "Empty character literal".to_string(),
                    self.current_location(),
                ));
            }
        };

        if self.current_char() != Some('\'') {
            return Err(CompilerError::lexer_error(
                "Unterminated character literal".to_string(),
                self.current_location(),
            ));
        }
        self.advance(); // closing quote
        Ok(TokenType::CharLiteral(ch))
    }

    /// Tokenize a string literal
    pub fn tokenize_string_literal(&mut self) -> Result<TokenType, CompilerError> {
        self.advance(); // opening quote
        let mut string = String::new();

        while let Some(ch) = self.current_char() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(TokenType::StringLiteral(string));
                }
                '\\' => {
                    self.advance();
                    let escaped = self.escape_char('"')?;
                    string.push(escaped as char);
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(CompilerError::lexer_error(
            "Unterminated string literal".to_string(),
            self.current_location(),
        ))
    }

    /// The character after a backslash. `quote` is the enclosing quote
    /// kind, allowed as an escape in its own literal form.
    fn escape_char(&mut self, quote: char) -> Result<u8, CompilerError> {
        match self.current_char() {
            Some('n') => {
                self.advance();
                Ok(b'\n')
            }
            Some('t') => {
                self.advance();
                Ok(b'\t')
            }
            Some('r') => {
                self.advance();
                Ok(b'\r')
            }
            Some('\\') => {
                self.advance();
                Ok(b'\\')
            }
            Some('0') => {
                self.advance();
                Ok(0)
            }
            Some(c) if c == quote || c == '\'' || c == '"' => {
                self.advance();
                Ok(c as u8)
            }
            Some(c) => Err(CompilerError::lexer_error(
                format!("Invalid escape sequence: \\{}", c),
                self.current_location(),
            )),
            None => Err(CompilerError::lexer_error(
                "Unterminated literal".to_string(),
                self.current_location(),
            )),
        }
    }
}
