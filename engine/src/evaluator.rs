//! FILENAME: engine/src/evaluator.rs
//! PURPOSE: Evaluates template expressions against a record and the report namespace.
//! CONTEXT: The parser turns the body of an expression, lambda or code-block tag
//! into an AST; this module walks it. There is no host code execution: names
//! resolve to locals, the record alias, report variables or record fields, and
//! calls resolve to registered host functions or the built-ins below.
//!
//! NAME RESOLUTION (case-insensitive, first match wins):
//! 1. Locals (code-block assignments, CELL_ROW, CELL_COL)
//! 2. Record alias (`record`, or the lambda parameter), only with a `[key]` subscript
//! 3. Report variables
//! 4. Record fields
//!
//! Built-ins other than IF live in `builtins`.

use crate::builtins;
use crate::cell::{CellError, CellValue};
use crate::functions::FunctionRegistry;
use crate::record::{Namespace, Record};
use parser::{BinaryOperator, Expression, Lambda, Program, Statement, UnaryOperator, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Default alias under which the current record is visible to expressions.
pub const RECORD_ALIAS: &str = "RECORD";

/// Local holding a code block's result.
pub const VALUE_LOCAL: &str = "VALUE";

/// What an expression evaluates to. Mirrors `CellValue`, which is what ends up in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
}

impl From<&CellValue> for EvalResult {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => EvalResult::Empty,
            CellValue::Number(n) => EvalResult::Number(*n),
            CellValue::Text(s) => EvalResult::Text(s.clone()),
            CellValue::Boolean(b) => EvalResult::Boolean(*b),
            CellValue::Error(e) => EvalResult::Error(*e),
        }
    }
}

impl From<EvalResult> for CellValue {
    fn from(result: EvalResult) -> Self {
        match result {
            EvalResult::Empty => CellValue::Empty,
            EvalResult::Number(n) => CellValue::Number(n),
            EvalResult::Text(s) => CellValue::Text(s),
            EvalResult::Boolean(b) => CellValue::Boolean(b),
            EvalResult::Error(e) => CellValue::Error(e),
        }
    }
}

impl EvalResult {
    pub fn to_cell_value(&self) -> CellValue {
        self.clone().into()
    }

    pub fn from_cell_value(value: &CellValue) -> Self {
        value.into()
    }

    /// Numeric view: blanks are zero, booleans 0/1, text only if it parses.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EvalResult::Number(n) => Some(*n),
            EvalResult::Empty | EvalResult::Boolean(false) => Some(0.0),
            EvalResult::Boolean(true) => Some(1.0),
            EvalResult::Text(s) => s.trim().parse().ok(),
            EvalResult::Error(_) => None,
        }
    }

    /// Truth view: nonzero numbers and the words TRUE/FALSE in any case.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            EvalResult::Boolean(b) => Some(*b),
            EvalResult::Empty => Some(false),
            EvalResult::Number(n) => Some(*n != 0.0),
            EvalResult::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            EvalResult::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            EvalResult::Text(_) | EvalResult::Error(_) => None,
        }
    }

    /// Display text, as the value would appear in a cell.
    pub fn as_text(&self) -> String {
        self.to_cell_value().display()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EvalResult::Error(_))
    }
}

/// Read-only inputs shared by every evaluation within one report generation.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub record: Option<&'a Record>,
    pub variables: &'a Namespace,
    pub functions: &'a FunctionRegistry,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        record: Option<&'a Record>,
        variables: &'a Namespace,
        functions: &'a FunctionRegistry,
    ) -> Self {
        EvalContext {
            record,
            variables,
            functions,
        }
    }
}

/// The expression evaluator.
/// Holds the shared context plus locals introduced by code blocks and the caller.
pub struct Evaluator<'a> {
    ctx: EvalContext<'a>,
    locals: HashMap<String, EvalResult>,
    aliases: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvalContext<'a>) -> Self {
        Evaluator {
            ctx,
            locals: HashMap::new(),
            aliases: vec![RECORD_ALIAS.to_string()],
        }
    }

    /// Adds a local visible to every expression run by this evaluator.
    pub fn with_local(mut self, name: &str, value: EvalResult) -> Self {
        self.locals.insert(name.to_uppercase(), value);
        self
    }

    pub fn local(&self, name: &str) -> Option<&EvalResult> {
        self.locals.get(&name.to_uppercase())
    }

    pub fn evaluate(&self, expr: &Expression) -> EvalResult {
        match expr {
            Expression::Literal(value) => self.eval_literal(value),
            Expression::Identifier(name) => self.eval_identifier(name),
            Expression::Subscript { target, key } => self.eval_subscript(target, key),
            Expression::BinaryOp { left, op, right } => self.eval_binary_op(left, op, right),
            Expression::UnaryOp { op, operand } => self.eval_unary_op(op, operand),
            Expression::FunctionCall { name, args } => self.eval_function(name, args),
        }
    }

    /// Runs a code block and returns its `value` local, or None if the block never set it.
    /// The first statement that yields an error aborts the block.
    pub fn run_program(&mut self, program: &Program) -> Result<Option<EvalResult>, CellError> {
        for statement in &program.statements {
            match statement {
                Statement::Assign { name, value } => {
                    let result = self.evaluate(value);
                    if let EvalResult::Error(e) = result {
                        return Err(e);
                    }
                    self.locals.insert(name.to_uppercase(), result);
                }
                Statement::Expr(expr) => {
                    if let EvalResult::Error(e) = self.evaluate(expr) {
                        return Err(e);
                    }
                }
            }
        }
        Ok(self.locals.get(VALUE_LOCAL).cloned())
    }

    /// Invokes a one-parameter lambda with the current record bound to its parameter.
    pub fn call_lambda(&mut self, lambda: &Lambda) -> EvalResult {
        if lambda.params.len() != 1 {
            return EvalResult::Error(CellError::Value);
        }
        let param = lambda.params[0].to_uppercase();
        self.aliases.push(param);
        let result = self.evaluate(&lambda.body);
        self.aliases.pop();
        result
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    fn eval_literal(&self, value: &Value) -> EvalResult {
        match value {
            Value::Number(n) => EvalResult::Number(*n),
            Value::Boolean(b) => EvalResult::Boolean(*b),
            Value::String(s) => EvalResult::Text(s.to_owned()),
        }
    }

    fn eval_identifier(&self, name: &str) -> EvalResult {
        if let Some(local) = self.locals.get(&name.to_uppercase()) {
            return local.clone();
        }
        if self.is_alias(name) {
            // A bare alias has no scalar value.
            return EvalResult::Error(CellError::Value);
        }
        if let Some(var) = self.ctx.variables.get(name) {
            return EvalResult::from_cell_value(var);
        }
        if let Some(field) = self.ctx.record.and_then(|r| r.get(name)) {
            return EvalResult::from_cell_value(field);
        }
        EvalResult::Error(CellError::Name)
    }

    fn eval_subscript(&self, target: &Expression, key: &Expression) -> EvalResult {
        if !matches!(target, Expression::Identifier(name) if self.is_alias(name)) {
            return EvalResult::Error(CellError::Value);
        }

        let key = self.evaluate(key);
        if let EvalResult::Error(e) = key {
            return EvalResult::Error(e);
        }
        let field = key.as_text();

        match self.ctx.record.and_then(|r| r.get(&field)) {
            Some(value) => EvalResult::from_cell_value(value),
            None => EvalResult::Error(CellError::Ref),
        }
    }

    fn eval_binary_op(
        &self,
        left: &Expression,
        op: &BinaryOperator,
        right: &Expression,
    ) -> EvalResult {
        let (l, r) = match (self.evaluate(left), self.evaluate(right)) {
            (EvalResult::Error(e), _) | (_, EvalResult::Error(e)) => return EvalResult::Error(e),
            pair => pair,
        };
        match op {
            BinaryOperator::Add => numeric(&l, &r, |a, b| Some(a + b)),
            BinaryOperator::Subtract => numeric(&l, &r, |a, b| Some(a - b)),
            BinaryOperator::Multiply => numeric(&l, &r, |a, b| Some(a * b)),
            BinaryOperator::Divide => match r.as_number() {
                Some(b) if b == 0.0 && l.as_number().is_some() => EvalResult::Error(CellError::Div0),
                _ => numeric(&l, &r, |a, b| Some(a / b)),
            },
            // NaN and infinities are not representable in a cell
            BinaryOperator::Power => numeric(&l, &r, |a, b| Some(a.powf(b)).filter(|p| p.is_finite())),
            BinaryOperator::Concat => EvalResult::Text(l.as_text() + &r.as_text()),
            BinaryOperator::Equal => EvalResult::Boolean(values_equal(&l, &r)),
            BinaryOperator::NotEqual => EvalResult::Boolean(!values_equal(&l, &r)),
            BinaryOperator::LessThan => compare(&l, &r, Ordering::is_lt),
            BinaryOperator::GreaterThan => compare(&l, &r, Ordering::is_gt),
            BinaryOperator::LessEqual => compare(&l, &r, Ordering::is_le),
            BinaryOperator::GreaterEqual => compare(&l, &r, Ordering::is_ge),
        }
    }

    fn eval_unary_op(&self, op: &UnaryOperator, operand: &Expression) -> EvalResult {
        match (op, self.evaluate(operand)) {
            (_, EvalResult::Error(e)) => EvalResult::Error(e),
            (UnaryOperator::Negate, value) => match value.as_number() {
                Some(n) => EvalResult::Number(-n),
                None => EvalResult::Error(CellError::Value),
            },
        }
    }

    /// Registered host functions shadow built-ins. IF only evaluates the branch it takes.
    fn eval_function(&self, name: &str, args: &[Expression]) -> EvalResult {
        let host = self.ctx.functions.get(name);
        let upper = name.to_uppercase();
        let builtin = builtins::lookup(&upper);
        if host.is_none() {
            if upper == "IF" {
                return self.eval_if(args);
            }
            if builtin.is_none() {
                return EvalResult::Error(CellError::Name);
            }
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.evaluate(arg) {
                EvalResult::Error(e) => return EvalResult::Error(e),
                value => values.push(value),
            }
        }
        match (host, builtin) {
            (Some(host), _) => host(&values),
            (None, Some(f)) => f(&values).unwrap_or_else(EvalResult::Error),
            (None, None) => EvalResult::Error(CellError::Name),
        }
    }

    fn eval_if(&self, args: &[Expression]) -> EvalResult {
        if !(2..=3).contains(&args.len()) {
            return EvalResult::Error(CellError::Value);
        }
        let condition = match self.evaluate(&args[0]) {
            EvalResult::Error(e) => return EvalResult::Error(e),
            other => other.as_boolean().unwrap_or(false),
        };
        match (condition, args.get(2)) {
            (true, _) => self.evaluate(&args[1]),
            (false, Some(otherwise)) => self.evaluate(otherwise),
            (false, None) => EvalResult::Boolean(false),
        }
    }
}

fn numeric(left: &EvalResult, right: &EvalResult, f: impl Fn(f64, f64) -> Option<f64>) -> EvalResult {
    left.as_number()
        .zip(right.as_number())
        .and_then(|(a, b)| f(a, b))
        .map_or(EvalResult::Error(CellError::Value), EvalResult::Number)
}

fn values_equal(left: &EvalResult, right: &EvalResult) -> bool {
    match (left, right) {
        (EvalResult::Number(l), EvalResult::Number(r)) => (l - r).abs() < f64::EPSILON,
        (EvalResult::Text(l), EvalResult::Text(r)) => l.to_uppercase() == r.to_uppercase(),
        (EvalResult::Boolean(l), EvalResult::Boolean(r)) => l == r,
        (EvalResult::Empty, EvalResult::Empty) => true,
        (EvalResult::Empty, EvalResult::Text(s)) | (EvalResult::Text(s), EvalResult::Empty) => {
            s.is_empty()
        }
        // Cross-type comparisons
        (EvalResult::Number(n), EvalResult::Text(s)) | (EvalResult::Text(s), EvalResult::Number(n)) => {
            s.trim().parse::<f64>().map(|p| (p - n).abs() < f64::EPSILON).unwrap_or(false)
        }
        (EvalResult::Empty, other) | (other, EvalResult::Empty) => other.as_number() == Some(0.0),
        _ => false,
    }
}

/// Two non-numeric texts compare case-insensitively; anything else compares as numbers.
fn compare(left: &EvalResult, right: &EvalResult, test: fn(Ordering) -> bool) -> EvalResult {
    let is_number = |s: &str| s.trim().parse::<f64>().is_ok();
    if let (EvalResult::Text(l), EvalResult::Text(r)) = (left, right) {
        if !is_number(l) || !is_number(r) {
            return EvalResult::Boolean(test(l.to_uppercase().cmp(&r.to_uppercase())));
        }
    }
    left.as_number()
        .zip(right.as_number())
        .and_then(|(a, b)| a.partial_cmp(&b))
        .map_or(EvalResult::Error(CellError::Value), |o| EvalResult::Boolean(test(o)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::{parse, parse_lambda, parse_program};

    fn sample_record() -> Record {
        let fields = vec!["g".to_string(), "v".to_string(), "name".to_string()];
        Record::from_row(&fields, &[1.0.into(), 10.0.into(), "alpha".into()], 0)
    }

    fn eval_with(record: &Record, vars: &Namespace, funcs: &FunctionRegistry, src: &str) -> EvalResult {
        let expr = parse(src).unwrap();
        Evaluator::new(EvalContext::new(Some(record), vars, funcs)).evaluate(&expr)
    }

    fn eval(src: &str) -> EvalResult {
        eval_with(&sample_record(), &Namespace::new(), &FunctionRegistry::new(), src)
    }

    #[test]
    fn evaluates_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), EvalResult::Number(7.0));
        assert_eq!(eval("2 ^ 3"), EvalResult::Number(8.0));
        assert_eq!(eval("1 / 0"), EvalResult::Error(CellError::Div0));
    }

    #[test]
    fn reads_record_subscript() {
        assert_eq!(eval("record['v'] * 2"), EvalResult::Number(20.0));
        assert_eq!(eval("record[\"name\"]"), EvalResult::Text("alpha".to_string()));
        assert_eq!(eval("record['missing']"), EvalResult::Error(CellError::Ref));
    }

    #[test]
    fn bare_names_fall_back_to_fields() {
        assert_eq!(eval("v + 1"), EvalResult::Number(11.0));
        assert_eq!(eval("nope"), EvalResult::Error(CellError::Name));
    }

    #[test]
    fn variables_shadow_fields() {
        let vars: Namespace = vec![("v", 99.0)].into_iter().collect();
        let result = eval_with(&sample_record(), &vars, &FunctionRegistry::new(), "v");
        assert_eq!(result, EvalResult::Number(99.0));
    }

    #[test]
    fn concatenation_and_comparison() {
        assert_eq!(eval("name & \"-\" & g"), EvalResult::Text("alpha-1".to_string()));
        assert_eq!(eval("record['v'] > 5"), EvalResult::Boolean(true));
        assert_eq!(eval("name = 'ALPHA'"), EvalResult::Boolean(true));
    }

    #[test]
    fn builtin_functions() {
        assert_eq!(eval("IF(v > 5, 'big', 'small')"), EvalResult::Text("big".to_string()));
        assert_eq!(eval("ROUND(1.256, 2)"), EvalResult::Number(1.26));
        assert_eq!(eval("SUM(1, 2, v)"), EvalResult::Number(13.0));
        assert_eq!(eval("UPPER(name)"), EvalResult::Text("ALPHA".to_string()));
        assert_eq!(eval("MID(name, 2, 3)"), EvalResult::Text("lph".to_string()));
        assert_eq!(eval("TEXT(1234.5, '#,##0.00')"), EvalResult::Text("1,234.50".to_string()));
        assert_eq!(eval("NOSUCH(1)"), EvalResult::Error(CellError::Name));
    }

    #[test]
    fn host_functions_are_called_with_evaluated_args() {
        let mut funcs = FunctionRegistry::new();
        funcs.register("fin.double", |args: &[EvalResult]| {
            EvalResult::Number(args[0].as_number().unwrap_or(0.0) * 2.0)
        });
        let result = eval_with(&sample_record(), &Namespace::new(), &funcs, "fin.double(record['v'])");
        assert_eq!(result, EvalResult::Number(20.0));
    }

    #[test]
    fn program_returns_value_local() {
        let record = sample_record();
        let vars = Namespace::new();
        let funcs = FunctionRegistry::new();
        let program = parse_program("a = record['v'] + 5; value = a * 2").unwrap();
        let mut evaluator = Evaluator::new(EvalContext::new(Some(&record), &vars, &funcs));
        assert_eq!(evaluator.run_program(&program), Ok(Some(EvalResult::Number(30.0))));
    }

    #[test]
    fn program_without_value_yields_none() {
        let record = sample_record();
        let vars = Namespace::new();
        let funcs = FunctionRegistry::new();
        let program = parse_program("a = 1").unwrap();
        let mut evaluator = Evaluator::new(EvalContext::new(Some(&record), &vars, &funcs));
        assert_eq!(evaluator.run_program(&program), Ok(None));
    }

    #[test]
    fn program_aborts_on_error() {
        let record = sample_record();
        let vars = Namespace::new();
        let funcs = FunctionRegistry::new();
        let program = parse_program("value = record['zzz']").unwrap();
        let mut evaluator = Evaluator::new(EvalContext::new(Some(&record), &vars, &funcs));
        assert_eq!(evaluator.run_program(&program), Err(CellError::Ref));
    }

    #[test]
    fn lambda_binds_parameter_to_record() {
        let record = sample_record();
        let vars = Namespace::new();
        let funcs = FunctionRegistry::new();
        let lambda = parse_lambda("rec: rec['v'] + rec['g']").unwrap();
        let mut evaluator = Evaluator::new(EvalContext::new(Some(&record), &vars, &funcs));
        assert_eq!(evaluator.call_lambda(&lambda), EvalResult::Number(11.0));
    }

    #[test]
    fn cell_locals_are_visible() {
        let record = sample_record();
        let vars = Namespace::new();
        let funcs = FunctionRegistry::new();
        let evaluator = Evaluator::new(EvalContext::new(Some(&record), &vars, &funcs))
            .with_local("CELL_ROW", EvalResult::Number(4.0));
        assert_eq!(evaluator.evaluate(&parse("cell_row + 1").unwrap()), EvalResult::Number(5.0));
    }
}
