//! FILENAME: parser/src/lexer.rs
//! PURPOSE: Scans the body of a code-bearing tag and produces a stream of Tokens.
//! CONTEXT: First stage of the expression pipeline. The scanner walks the tag
//! body by byte offset; whitespace (including newlines inside code blocks) only
//! separates tokens.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / ^ & ( ) [ ] , : ; = < >
//! - Multi char: <= >= <> == !=
//! - Strings: "text" or 'text' (a doubled quote escapes itself)

use crate::token::Token;

#[derive(Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        let src = self.src;
        &src[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consumes `ch` if it is next.
    fn eat(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes characters while `pred` holds and returns them as a slice.
    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &src[start..self.pos]
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.take_while(char::is_whitespace);
        let start = self.pos;

        let Some(ch) = self.bump() else {
            return Token::EOF;
        };
        match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Asterisk,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '&' => Token::Ampersand,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '=' => {
                self.eat('=');
                Token::Equals
            }
            '!' if self.eat('=') => Token::NotEqual,
            '<' if self.eat('=') => Token::LessEqual,
            '<' if self.eat('>') => Token::NotEqual,
            '<' => Token::LessThan,
            '>' if self.eat('=') => Token::GreaterEqual,
            '>' => Token::GreaterThan,
            '"' | '\'' => self.string(ch),
            c if c.is_ascii_digit() || c == '.' => self.number(start),
            c if starts_identifier(c) => self.identifier(start),
            other => Token::Illegal(other),
        }
    }

    /// The rest of a quoted string. An unterminated string ends at end of input.
    fn string(&mut self, quote: char) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.bump() {
            if ch != quote {
                text.push(ch);
            } else if self.eat(quote) {
                text.push(quote);
            } else {
                break;
            }
        }
        Token::String(text)
    }

    fn number(&mut self, start: usize) -> Token {
        let mut seen_dot = self.src[start..].starts_with('.');
        self.take_while(|c| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                return true;
            }
            c.is_ascii_digit()
        });
        let literal = &self.src[start..self.pos];
        match literal.parse::<f64>() {
            Ok(n) => Token::Number(n),
            // A lone "."
            Err(_) => Token::Illegal('.'),
        }
    }

    /// Identifiers may contain dots, so "fin.tax.vat" is one name.
    fn identifier(&mut self, start: usize) -> Token {
        self.take_while(|c| starts_identifier(c) || c.is_ascii_digit() || c == '.');
        let name = self.src[start..self.pos].to_uppercase();
        match name.as_str() {
            "TRUE" => Token::Boolean(true),
            "FALSE" => Token::Boolean(false),
            _ => Token::Identifier(name),
        }
    }
}

fn starts_identifier(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}
