//! FILENAME: report-engine/src/summation.rs
//! PURPOSE: Running totals behind `[^SUM(..)^]` and `[^AVG(..)^]` cells.
//! CONTEXT: Each SUM/AVG occurrence in a cell owns one accumulator. The
//! generator adds every record's contribution to every accumulator of the
//! working template, and zeroes band rows when a header or group starts over.
//! Argument fields are written `{field}` and stored as `record['field']`.

use crate::logging::SUM;
use crate::model::{Accumulator, ReportCell};
use crate::log_warn;
use engine::{EvalContext, EvalResult, Evaluator, FunctionRegistry, Namespace, Record};
use once_cell::sync::Lazy;
use parser::{parse_expression, parse_system_call, Expression, Tag, TagKind};
use regex::Regex;
use std::collections::HashMap;

static FIELD_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"));

/// Rewrites `{field}` placeholders to `record['field']`.
pub fn rewrite_fields(arg: &str) -> String {
    FIELD_PLACEHOLDER
        .replace_all(arg, |caps: &regex::Captures| format!("record['{}']", caps[1].trim()))
        .into_owned()
}

/// The accumulators a raw cell value declares, in order of appearance.
pub fn accumulators_for(raw: &str) -> Vec<Accumulator> {
    parse_expression(raw, &[TagKind::System])
        .func
        .iter()
        .filter_map(|t| match Tag::classify(t) {
            Some(Tag::System(body)) => Some(body),
            _ => None,
        })
        .filter_map(|body| match parse_system_call(&body) {
            (name, Some(arg)) if name == "SUM" || name == "AVG" => {
                Some(Accumulator::new(&rewrite_fields(&arg)))
            }
            _ => None,
        })
        .collect()
}

/// Rebuilds the accumulator list of every cell from its raw value.
/// Cells without SUM/AVG tags end up with no list.
pub fn init_sum_cells(sheet: &mut [Vec<Option<ReportCell>>]) {
    for cell in sheet.iter_mut().flatten().flatten() {
        let sums = cell
            .value
            .as_deref()
            .map(accumulators_for)
            .unwrap_or_default();
        cell.sum = if sums.is_empty() { None } else { Some(sums) };
    }
}

/// Zeroes the accumulators of rows `start_row..stop_row`.
pub fn clear_sum(sheet: &mut [Vec<Option<ReportCell>>], start_row: usize, stop_row: usize) {
    let stop_row = stop_row.min(sheet.len());
    if start_row >= stop_row {
        return;
    }
    for cell in sheet[start_row..stop_row].iter_mut().flatten().flatten() {
        if let Some(sums) = cell.sum.as_mut() {
            for acc in sums {
                acc.value = 0.0;
            }
        }
    }
}

/// Parsed accumulator formulas, keyed by formula text.
#[derive(Debug, Default)]
pub struct FormulaCache {
    parsed: HashMap<String, Option<Expression>>,
}

impl FormulaCache {
    pub fn new() -> Self {
        FormulaCache::default()
    }

    /// The parsed formula, or None when it does not parse (logged once).
    pub fn get(&mut self, formul: &str) -> Option<&Expression> {
        if !self.parsed.contains_key(formul) {
            let parsed = match parser::parse(formul) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    log_warn!(SUM, "formula '{}' does not parse: {}", formul, e);
                    None
                }
            };
            self.parsed.insert(formul.to_string(), parsed);
        }
        self.parsed.get(formul).and_then(Option::as_ref)
    }
}

/// Adds `record`'s contribution to every accumulator of the sheet.
/// A formula that fails contributes 0 for this record.
pub fn sum_iterate(
    sheet: &mut [Vec<Option<ReportCell>>],
    record: &Record,
    variables: &Namespace,
    functions: &FunctionRegistry,
    formulas: &mut FormulaCache,
) {
    let evaluator = Evaluator::new(EvalContext::new(Some(record), variables, functions));
    for cell in sheet.iter_mut().flatten().flatten() {
        let Some(sums) = cell.sum.as_mut() else {
            continue;
        };
        for acc in sums.iter_mut() {
            let Some(expr) = formulas.get(&acc.formul) else {
                continue;
            };
            match contribution(&evaluator.evaluate(expr)) {
                Some(n) => acc.value += n,
                None => log_warn!(
                    SUM,
                    "formula '{}' gave no number for record {}",
                    acc.formul,
                    record.ordinal().unwrap_or(0)
                ),
            }
        }
    }
}

fn contribution(result: &EvalResult) -> Option<f64> {
    match result {
        EvalResult::Empty => Some(0.0),
        EvalResult::Error(_) => None,
        other => other.as_number(),
    }
}
