//! FILENAME: engine/src/builtins.rs
//! PURPOSE: Built-in functions callable from template expressions.
//! CONTEXT: Built-ins take already-evaluated arguments, the same shape as host
//! functions. IF is the exception and lives in the evaluator, since only one
//! branch may run.

use crate::cell::{format_number, CellError};
use crate::evaluator::EvalResult;

type Args<'a> = &'a [EvalResult];
pub(crate) type Builtin = fn(Args) -> Result<EvalResult, CellError>;

/// Looks up a built-in by its uppercased name.
pub(crate) fn lookup(name: &str) -> Option<Builtin> {
    let f: Builtin = match name {
        "SUM" => |a| Ok(EvalResult::Number(numbers(a).iter().sum())),
        "AVERAGE" | "AVG" => average,
        "MIN" => |a| Ok(EvalResult::Number(fold(a, f64::INFINITY, f64::min))),
        "MAX" => |a| Ok(EvalResult::Number(fold(a, f64::NEG_INFINITY, f64::max))),
        "COUNT" => |a| Ok(EvalResult::Number(numbers(a).len() as f64)),
        "AND" => |a| logical(a, false),
        "OR" => |a| logical(a, true),
        "NOT" => |a| Ok(EvalResult::Boolean(!boolean(single(a)?)?)),
        "ABS" => |a| Ok(EvalResult::Number(number(single(a)?)?.abs())),
        "INT" => |a| Ok(EvalResult::Number(number(single(a)?)?.floor())),
        "ROUND" => round,
        "MOD" => modulo,
        "LEN" => |a| Ok(EvalResult::Number(single(a)?.as_text().chars().count() as f64)),
        "UPPER" => |a| Ok(EvalResult::Text(single(a)?.as_text().to_uppercase())),
        "LOWER" => |a| Ok(EvalResult::Text(single(a)?.as_text().to_lowercase())),
        "TRIM" => |a| {
            let text = single(a)?.as_text();
            Ok(EvalResult::Text(text.split_whitespace().collect::<Vec<_>>().join(" ")))
        },
        "CONCATENATE" | "CONCAT" => |a| Ok(EvalResult::Text(a.iter().map(EvalResult::as_text).collect())),
        "LEFT" => left,
        "RIGHT" => right,
        "MID" => mid,
        "TEXT" => text,
        "ISBLANK" => |a| {
            let blank = match single(a)? {
                EvalResult::Empty => true,
                EvalResult::Text(s) => s.is_empty(),
                _ => false,
            };
            Ok(EvalResult::Boolean(blank))
        },
        "ISNUMBER" => |a| Ok(EvalResult::Boolean(matches!(single(a)?, EvalResult::Number(_)))),
        _ => return None,
    };
    Some(f)
}

fn arity(args: Args, min: usize, max: usize) -> Result<(), CellError> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(CellError::Value)
    }
}

fn single(args: Args) -> Result<&EvalResult, CellError> {
    arity(args, 1, 1)?;
    Ok(&args[0])
}

fn number(value: &EvalResult) -> Result<f64, CellError> {
    value.as_number().ok_or(CellError::Value)
}

/// A character position or count: finite, never NaN.
fn finite(value: &EvalResult) -> Result<f64, CellError> {
    number(value).and_then(|n| if n.is_finite() { Ok(n) } else { Err(CellError::Value) })
}

fn boolean(value: &EvalResult) -> Result<bool, CellError> {
    value.as_boolean().ok_or(CellError::Value)
}

/// Numeric arguments of an aggregate. Blanks and non-numeric text are skipped.
fn numbers(args: Args) -> Vec<f64> {
    args.iter()
        .filter(|a| !matches!(a, EvalResult::Empty))
        .filter_map(EvalResult::as_number)
        .collect()
}

/// MIN and MAX of nothing are zero.
fn fold(args: Args, init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let values = numbers(args);
    if values.is_empty() {
        0.0
    } else {
        values.into_iter().fold(init, f)
    }
}

fn average(args: Args) -> Result<EvalResult, CellError> {
    let values = numbers(args);
    if values.is_empty() {
        return Err(CellError::Div0);
    }
    Ok(EvalResult::Number(values.iter().sum::<f64>() / values.len() as f64))
}

/// AND stops at the first false, OR at the first true.
fn logical(args: Args, stop_at: bool) -> Result<EvalResult, CellError> {
    if args.is_empty() {
        return Err(CellError::Value);
    }
    for arg in args {
        if boolean(arg)? == stop_at {
            return Ok(EvalResult::Boolean(stop_at));
        }
    }
    Ok(EvalResult::Boolean(!stop_at))
}

fn round(args: Args) -> Result<EvalResult, CellError> {
    arity(args, 1, 2)?;
    let digits = match args.get(1) {
        Some(d) => number(d)? as i32,
        None => 0,
    };
    Ok(EvalResult::Number(round_to(number(&args[0])?, digits)))
}

/// The result takes the sign of the divisor.
fn modulo(args: Args) -> Result<EvalResult, CellError> {
    arity(args, 2, 2)?;
    let n = number(&args[0])?;
    let d = number(&args[1])?;
    if d == 0.0 {
        return Err(CellError::Div0);
    }
    Ok(EvalResult::Number(n - d * (n / d).floor()))
}

/// Optional character count, 1 when omitted.
fn char_count(arg: Option<&EvalResult>) -> Result<usize, CellError> {
    match arg {
        None => Ok(1),
        Some(value) => match finite(value)? {
            n if n < 0.0 => Err(CellError::Value),
            n => Ok(n as usize),
        },
    }
}

fn left(args: Args) -> Result<EvalResult, CellError> {
    arity(args, 1, 2)?;
    let count = char_count(args.get(1))?;
    Ok(EvalResult::Text(args[0].as_text().chars().take(count).collect()))
}

fn right(args: Args) -> Result<EvalResult, CellError> {
    arity(args, 1, 2)?;
    let count = char_count(args.get(1))?;
    let chars: Vec<char> = args[0].as_text().chars().collect();
    let from = chars.len().saturating_sub(count);
    Ok(EvalResult::Text(chars[from..].iter().collect()))
}

fn mid(args: Args) -> Result<EvalResult, CellError> {
    arity(args, 3, 3)?;
    let start = finite(&args[1])?;
    if start < 1.0 {
        return Err(CellError::Value);
    }
    let count = char_count(Some(&args[2]))?;
    let text = args[0].as_text();
    Ok(EvalResult::Text(text.chars().skip(start as usize - 1).take(count).collect()))
}

/// TEXT(value, format) with the decimals and grouping of `format` ("#,##0.00").
fn text(args: Args) -> Result<EvalResult, CellError> {
    arity(args, 2, 2)?;
    let format = args[1].as_text();
    let rendered = match (&args[0], args[0].as_number()) {
        (EvalResult::Empty, _) | (_, None) => args[0].as_text(),
        (_, Some(n)) => apply_number_format(n, &format),
    };
    Ok(EvalResult::Text(rendered))
}

pub(crate) fn round_to(n: f64, digits: i32) -> f64 {
    let scale = 10_f64.powi(digits);
    (n * scale).round() / scale
}

/// Applies a simple numeric format: "0", "0.00", "#,##0.0". Anything else
/// falls back to plain number display.
pub fn apply_number_format(n: f64, format: &str) -> String {
    if format.is_empty() || !format.chars().all(|c| matches!(c, '0' | '#' | '.' | ',')) {
        return format_number(n);
    }
    let decimals = format
        .split_once('.')
        .map_or(0, |(_, frac)| frac.chars().filter(|c| matches!(c, '0' | '#')).count());
    let fixed = format!("{:.*}", decimals, round_to(n, decimals as i32));
    if !format.contains(',') {
        return fixed;
    }

    let (sign, digits) = fixed.strip_prefix('-').map_or(("", fixed.as_str()), |d| ("-", d));
    let (whole, frac) = digits.split_once('.').map_or((digits, None), |(w, f)| (w, Some(f)));
    let mut out = String::from(sign);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}
