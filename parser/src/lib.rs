//! FILENAME: parser/src/lib.rs
//! PURPOSE: Library root for the report template parsers.
//! CONTEXT: Two languages live in a template cell. The outer one is the tag
//! mini-language (`['field']`, `[#expr#]`, `[^SUM({x})^]`, ...) that splits raw
//! cell text into a format string plus tagged sub-expressions. The inner one is
//! the sandboxed expression language used inside the code-bearing tags.
//!
//! PIPELINE: Cell Text --> tags::parse_expression --> CellFormat { fmt, func }
//!           Tag body  --> Lexer --> Tokens --> Parser --> AST --> Evaluator (engine crate)
//!
//! SUPPORTED EXPRESSION FEATURES:
//! - Arithmetic: +, -, *, /, ^ (power)
//! - Comparison: =, <>, <, >, <=, >=
//! - String concatenation: &
//! - Identifiers: variables, record fields, locals
//! - Subscripts: record['field']
//! - Function calls: ROUND(x, 2), fin.tax(record['sum'])
//! - Statement sequences with assignments: a = 1; value = a * 2
//! - Lambdas: rec: rec['price'] * rec['qty']

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod tags;
pub mod token;


pub use ast::{BinaryOperator, Expression, Lambda, Program, Statement, UnaryOperator, Value};
pub use lexer::Lexer;
pub use parser::{parse, parse_lambda, parse_program, ParseError, ParseResult, Parser};
pub use tags::{parse_expression, parse_system_call, render_format, CellFormat, Tag, TagKind};
pub use token::Token;
