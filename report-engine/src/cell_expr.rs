//! FILENAME: report-engine/src/cell_expr.rs
//! PURPOSE: Evaluates the tagged text of one template cell.
//! CONTEXT: The raw value is split once per distinct text into a format string
//! and its tags; each tag is evaluated against the band's record, the result
//! is re-scanned once for further tags, and the values are substituted back.
//! Style directives and sub-report references produce no text; they are
//! returned to the generator as side effects.
//!
//! Per-tag failures never abort: the tag renders empty and the failure is
//! logged (missing field or variable as a warning, failing code as fatal).

use crate::logging::CELL;
use crate::model::Accumulator;
use crate::{log_fatal, log_warn};
use engine::{
    coord_to_a1, format_number, CellStyle, EvalContext, EvalResult, Evaluator, FunctionRegistry,
    Namespace, Record,
};
use parser::{parse_expression, parse_system_call, render_format, CellFormat, Tag, TagKind};
use std::collections::{BTreeMap, HashMap};

/// Everything a cell's tags can see.
#[derive(Clone, Copy)]
pub struct CellContext<'a> {
    pub record: Option<&'a Record>,
    pub variables: &'a Namespace,
    pub functions: &'a FunctionRegistry,
    pub style_lib: &'a BTreeMap<String, CellStyle>,
    /// Output coordinates of the cell being built.
    pub row: usize,
    pub col: usize,
}

/// The evaluated text plus the side effects of the cell's tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellOutput {
    pub text: String,
    /// The last style directive in the cell, if any.
    pub style: Option<CellStyle>,
    /// Sub-reports referenced by the cell, in order.
    pub subreports: Vec<String>,
}

#[derive(Default)]
struct TagState {
    next_sum: usize,
    style: Option<CellStyle>,
    subreports: Vec<String>,
}

/// Cell evaluator with a format cache keyed by raw text.
#[derive(Debug, Default)]
pub struct CellEvaluator {
    formats: HashMap<String, CellFormat>,
    keep_unknown_tags: bool,
}

impl CellEvaluator {
    pub fn new(keep_unknown_tags: bool) -> Self {
        CellEvaluator {
            formats: HashMap::new(),
            keep_unknown_tags,
        }
    }

    /// The split form of `raw`, computed once per distinct text.
    pub fn format(&mut self, raw: &str) -> &CellFormat {
        self.formats
            .entry(raw.to_string())
            .or_insert_with(|| parse_expression(raw, &TagKind::ALL))
    }

    pub fn cached_formats(&self) -> usize {
        self.formats.len()
    }

    /// Evaluates a raw cell value. `sums` are the cell's accumulators, read in
    /// order by its SUM/AVG tags.
    pub fn evaluate(
        &mut self,
        raw: &str,
        sums: Option<&[Accumulator]>,
        ctx: &CellContext<'_>,
    ) -> CellOutput {
        let format = self.format(raw).clone();
        if format.is_plain() {
            return CellOutput {
                text: format.plain_text(),
                ..CellOutput::default()
            };
        }

        let mut state = TagState::default();
        let mut values = Vec::with_capacity(format.func.len());
        for raw_tag in &format.func {
            let value = self.eval_tag(raw_tag, sums, ctx, &mut state);
            values.push(self.rescan(value, ctx, &mut state));
        }

        CellOutput {
            text: render_format(&format.fmt, &values),
            style: state.style,
            subreports: state.subreports,
        }
    }

    /// Evaluates the tags inside an already computed value, without recursing further.
    /// Computed values are data, so their splits are not cached.
    fn rescan(&self, value: String, ctx: &CellContext<'_>, state: &mut TagState) -> String {
        let format = parse_expression(&value, &TagKind::ALL);
        if format.is_plain() {
            return value;
        }
        let mut values = Vec::with_capacity(format.func.len());
        for raw_tag in &format.func {
            values.push(self.eval_tag(raw_tag, None, ctx, state));
        }
        render_format(&format.fmt, &values)
    }

    fn eval_tag(
        &self,
        raw_tag: &str,
        sums: Option<&[Accumulator]>,
        ctx: &CellContext<'_>,
        state: &mut TagState,
    ) -> String {
        let Some(tag) = Tag::classify(raw_tag) else {
            return String::new();
        };
        let at = coord_to_a1((ctx.row, ctx.col));
        match tag {
            Tag::Field(name) => match ctx.record.and_then(|r| r.get(&name)) {
                Some(value) => value.display(),
                None => {
                    log_warn!(CELL, "{}: no field '{}' in record", at, name);
                    String::new()
                }
            },
            Tag::Variable(name) => match ctx.variables.get(name.trim()) {
                Some(value) => value.display(),
                None => {
                    log_warn!(CELL, "{}: no variable '{}'", at, name.trim());
                    String::new()
                }
            },
            Tag::Function(body) | Tag::Expression(body) => eval_expression(&body, ctx, &at),
            Tag::Lambda(body) => eval_lambda(&body, ctx, &at),
            Tag::Code(body) => eval_code(&body, ctx, &at),
            Tag::System(body) => self.eval_system(raw_tag, &body, sums, ctx, state, &at),
            Tag::Style(name) => {
                match ctx.style_lib.get(name.trim()) {
                    Some(style) => state.style = Some(style.clone()),
                    None => log_warn!(CELL, "{}: no style '{}' in style library", at, name.trim()),
                }
                String::new()
            }
            Tag::SubReport(name) => {
                state.subreports.push(name.trim().to_string());
                String::new()
            }
        }
    }

    fn eval_system(
        &self,
        raw_tag: &str,
        body: &str,
        sums: Option<&[Accumulator]>,
        ctx: &CellContext<'_>,
        state: &mut TagState,
        at: &str,
    ) -> String {
        let ordinal = ctx.record.and_then(Record::ordinal);
        match parse_system_call(body) {
            (name, Some(_)) if name == "SUM" || name == "AVG" => {
                let slot = state.next_sum;
                state.next_sum += 1;
                let Some(acc) = sums.and_then(|s| s.get(slot)) else {
                    log_warn!(CELL, "{}: {} has no accumulator", at, name);
                    return String::new();
                };
                if name == "AVG" {
                    match ordinal {
                        Some(n) => format_number(acc.value / (n + 1) as f64),
                        None => format_number(acc.value),
                    }
                } else {
                    format_number(acc.value)
                }
            }
            (name, None) if name == "N" => match ordinal {
                Some(n) => (n + 1).to_string(),
                None => String::new(),
            },
            (name, _) => {
                log_warn!(CELL, "{}: unknown system function '{}'", at, name);
                if self.keep_unknown_tags {
                    raw_tag.to_string()
                } else {
                    String::new()
                }
            }
        }
    }
}

fn evaluator<'a>(ctx: &CellContext<'a>) -> Evaluator<'a> {
    Evaluator::new(EvalContext::new(ctx.record, ctx.variables, ctx.functions))
        .with_local("CELL_ROW", EvalResult::Number(ctx.row as f64))
        .with_local("CELL_COL", EvalResult::Number(ctx.col as f64))
}

fn result_text(result: EvalResult, body: &str, at: &str) -> String {
    match result {
        EvalResult::Error(e) => {
            log_fatal!(CELL, "{}: '{}' failed with {}", at, body, e);
            String::new()
        }
        other => other.as_text(),
    }
}

fn eval_expression(body: &str, ctx: &CellContext<'_>, at: &str) -> String {
    match parser::parse(body) {
        Ok(expr) => result_text(evaluator(ctx).evaluate(&expr), body, at),
        Err(e) => {
            log_fatal!(CELL, "{}: '{}': {}", at, body, e);
            String::new()
        }
    }
}

fn eval_lambda(body: &str, ctx: &CellContext<'_>, at: &str) -> String {
    match parser::parse_lambda(body) {
        Ok(lambda) => result_text(evaluator(ctx).call_lambda(&lambda), body, at),
        Err(e) => {
            log_fatal!(CELL, "{}: '{}': {}", at, body, e);
            String::new()
        }
    }
}

fn eval_code(body: &str, ctx: &CellContext<'_>, at: &str) -> String {
    let program = match parser::parse_program(body) {
        Ok(program) => program,
        Err(e) => {
            log_fatal!(CELL, "{}: '{}': {}", at, body, e);
            return String::new();
        }
    };
    match evaluator(ctx).run_program(&program) {
        Ok(Some(value)) => result_text(value, body, at),
        Ok(None) => {
            log_warn!(CELL, "{}: code block never assigns value", at);
            String::new()
        }
        Err(e) => {
            log_fatal!(CELL, "{}: '{}' failed with {}", at, body, e);
            String::new()
        }
    }
}
