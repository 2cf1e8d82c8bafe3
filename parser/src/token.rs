//! FILENAME: parser/src/token.rs
//! PURPOSE: Token definitions for the expression lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by the parser.

/// Tokens recognized by the expression lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Number(f64),
    String(String),
    Boolean(bool),
    Identifier(String),

    Plus,
    Minus,
    Asterisk,
    Slash,
    Caret,
    Ampersand,
    Equals,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,

    EOF,
    Illegal(char),
}

impl Token {
    /// Source spelling of operators and delimiters.
    pub fn symbol(&self) -> Option<&'static str> {
        Some(match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Asterisk => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Ampersand => "&",
            Token::Equals => "=",
            Token::NotEqual => "<>",
            Token::LessThan => "<",
            Token::GreaterThan => ">",
            Token::LessEqual => "<=",
            Token::GreaterEqual => ">=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            _ => return None,
        })
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(symbol) = self.symbol() {
            return f.write_str(symbol);
        }
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "{:?}", s),
            Token::Boolean(true) => f.write_str("TRUE"),
            Token::Boolean(false) => f.write_str("FALSE"),
            Token::Identifier(name) => f.write_str(name),
            Token::Illegal(c) => write!(f, "illegal character {:?}", c),
            _ => f.write_str("end of input"),
        }
    }
}
