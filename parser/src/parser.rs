//! FILENAME: parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the expression pipeline. It takes tokens
//! from the Lexer and builds an Expression tree, a code-block Program, or a
//! Lambda, depending on which tag the text came from.
//!
//! GRAMMAR:
//!   program        --> statement ( ";"? statement )*
//!   statement      --> IDENTIFIER "=" expression | expression
//!   lambda         --> IDENTIFIER ( "," IDENTIFIER )* ":" expression
//!   expression     --> comparison
//!   comparison     --> concatenation ( ("=" | "<>" | "<" | ">" | "<=" | ">=") concatenation )*
//!   concatenation  --> additive ( "&" additive )*
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/") unary )*
//!   unary          --> "-" unary | power
//!   power          --> postfix ( "^" unary )?
//!   postfix        --> primary ( "[" expression "]" )*
//!   primary        --> NUMBER | STRING | BOOLEAN | IDENTIFIER | function_call | "(" expression ")"
//!   function_call  --> IDENTIFIER "(" arguments? ")"
//!   arguments      --> expression ("," expression)*

use crate::ast::{BinaryOperator, Expression, Lambda, Program, Statement, UnaryOperator, Value};
use crate::lexer::Lexer;
use crate::token::Token;

/// Parser errors with descriptive messages.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    /// Parses the entire input as a single expression.
    /// A leading '=' is tolerated so spreadsheet-style "=a+b" reads the same as "a+b".
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::Equals {
            self.advance();
        }

        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parses the entire input as a code block (sequence of statements).
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();

        while self.current_token != Token::EOF {
            if self.current_token == Token::Semicolon {
                self.advance();
                continue;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    /// Parses the entire input as a lambda: `params: body`.
    pub fn parse_lambda(&mut self) -> ParseResult<Lambda> {
        let mut params = Vec::new();

        loop {
            match self.current_token.clone() {
                Token::Identifier(name) => {
                    self.advance();
                    params.push(name);
                }
                other => {
                    return Err(ParseError::new(format!(
                        "Expected lambda parameter, found {:?}",
                        other
                    )))
                }
            }
            if self.current_token == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(Token::Colon)?;
        let body = self.parse_expression()?;
        self.expect_end()?;

        Ok(Lambda { params, body })
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Looks one token past the current one without consuming anything.
    fn peek(&self) -> Token {
        self.lexer.clone().next_token()
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {:?}, found {:?}",
                expected, self.current_token
            )))
        }
    }

    fn expect_end(&self) -> ParseResult<()> {
        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {:?}",
                self.current_token
            )));
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        if let Token::Identifier(name) = self.current_token.clone() {
            if self.peek() == Token::Equals {
                self.advance(); // name
                self.advance(); // '='
                let value = self.parse_expression()?;
                return Ok(Statement::Assign { name, value });
            }
        }
        Ok(Statement::Expr(self.parse_expression()?))
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary(0)
    }

    /// Left-associative binary levels, loosest first. Below the last level
    /// sit unary minus and `^`.
    const LEVELS: usize = 4;

    fn binary_operator(level: usize, token: &Token) -> Option<BinaryOperator> {
        let op = match (level, token) {
            (0, Token::Equals) => BinaryOperator::Equal,
            (0, Token::NotEqual) => BinaryOperator::NotEqual,
            (0, Token::LessThan) => BinaryOperator::LessThan,
            (0, Token::GreaterThan) => BinaryOperator::GreaterThan,
            (0, Token::LessEqual) => BinaryOperator::LessEqual,
            (0, Token::GreaterEqual) => BinaryOperator::GreaterEqual,
            (1, Token::Ampersand) => BinaryOperator::Concat,
            (2, Token::Plus) => BinaryOperator::Add,
            (2, Token::Minus) => BinaryOperator::Subtract,
            (3, Token::Asterisk) => BinaryOperator::Multiply,
            (3, Token::Slash) => BinaryOperator::Divide,
            _ => return None,
        };
        Some(op)
    }

    fn parse_operand(&mut self, level: usize) -> ParseResult<Expression> {
        if level + 1 < Self::LEVELS {
            self.parse_binary(level + 1)
        } else {
            self.parse_unary()
        }
    }

    fn parse_binary(&mut self, level: usize) -> ParseResult<Expression> {
        let mut left = self.parse_operand(level)?;
        while let Some(op) = Self::binary_operator(level, &self.current_token) {
            self.advance();
            let right = self.parse_operand(level)?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// `-x` binds looser than `^`, so `-2^2` is `-(2^2)`.
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if self.current_token != Token::Minus {
            return self.parse_power();
        }
        self.advance();
        Ok(Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(self.parse_unary()?),
        })
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let base = self.parse_postfix()?;
        if self.current_token != Token::Caret {
            return Ok(base);
        }
        self.advance();
        Ok(Expression::BinaryOp {
            left: Box::new(base),
            op: BinaryOperator::Power,
            right: Box::new(self.parse_unary()?),
        })
    }

    /// `record['a']`, possibly chained.
    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        while self.current_token == Token::LBracket {
            self.advance();
            let key = self.parse_expression()?;
            self.expect(Token::RBracket)?;
            expr = Expression::Subscript {
                target: Box::new(expr),
                key: Box::new(key),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = std::mem::replace(&mut self.current_token, Token::EOF);
        let literal = match token {
            Token::Number(n) => Value::Number(n),
            Token::String(s) => Value::String(s),
            Token::Boolean(b) => {
                self.advance();
                // TRUE() and FALSE() read as the plain constants
                if self.current_token == Token::LParen {
                    self.advance();
                    self.expect(Token::RParen)?;
                }
                return Ok(Expression::Literal(Value::Boolean(b)));
            }
            Token::Identifier(name) => {
                self.advance();
                return if self.current_token == Token::LParen {
                    self.parse_call(name)
                } else {
                    Ok(Expression::Identifier(name))
                };
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::EOF => return Err(ParseError::new("Unexpected end of expression")),
            Token::Illegal(ch) => {
                return Err(ParseError::new(format!("Illegal character: {}", ch)))
            }
            other => return Err(ParseError::new(format!("Unexpected token: {}", other))),
        };
        self.advance();
        Ok(Expression::Literal(literal))
    }

    /// Arguments of `name(...)`; the current token is the opening parenthesis.
    fn parse_call(&mut self, name: String) -> ParseResult<Expression> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.current_token != Token::RParen {
            loop {
                args.push(self.parse_expression()?);
                if self.current_token != Token::Comma {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen)?;
        Ok(Expression::FunctionCall { name, args })
    }
}

/// Convenience function to parse an expression string directly.
pub fn parse(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Convenience function to parse a code block body.
pub fn parse_program(input: &str) -> ParseResult<Program> {
    let mut parser = Parser::new(input);
    parser.parse_program()
}

/// Convenience function to parse a lambda body (`params: expression`).
pub fn parse_lambda(input: &str) -> ParseResult<Lambda> {
    let mut parser = Parser::new(input);
    parser.parse_lambda()
}
