//! FILENAME: parser/src/tags.rs
//! PURPOSE: Tokenizer for the bracket-delimited cell tag mini-language.
//! CONTEXT: A raw template cell such as `Total: [^SUM({sum})^] [&currency&]` is
//! split into a format string with `%s` placeholders ("Total: %s %s") and the
//! ordered list of raw tagged substrings. Untagged text is kept verbatim, with
//! a literal '%' escaped as "%%" so the pair can be re-assembled losslessly.
//!
//! TAG VOCABULARY:
//! - ['field']            field reference
//! - [@module.fn(args)@]  host function call
//! - [#expr#]             expression
//! - [~params: body~]     lambda over the record
//! - [&name&]             report variable
//! - [=code=]             code block assigning `value`
//! - [^SUM({f})^]         system function (SUM, AVG, N)
//! - [*style*]            style directive
//! - [$name$]             sub-report

use once_cell::sync::Lazy;
use regex::Regex;

/// The kinds of tag, in the order they are tried at a given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Field,
    Function,
    Expression,
    Lambda,
    Variable,
    Code,
    System,
    Style,
    SubReport,
}

impl TagKind {
    pub const ALL: [TagKind; 9] = [
        TagKind::Field,
        TagKind::Function,
        TagKind::Expression,
        TagKind::Lambda,
        TagKind::Variable,
        TagKind::Code,
        TagKind::System,
        TagKind::Style,
        TagKind::SubReport,
    ];

    fn pattern(self) -> &'static str {
        match self {
            TagKind::Field => r"\['[^']*'\]",
            TagKind::Function => r"\[@.*?@\]",
            TagKind::Expression => r"\[#.*?#\]",
            TagKind::Lambda => r"\[~.*?~\]",
            TagKind::Variable => r"\[&.*?&\]",
            TagKind::Code => r"\[=.*?=\]",
            TagKind::System => r"\[\^.*?\^\]",
            TagKind::Style => r"\[\*.*?\*\]",
            TagKind::SubReport => r"\[\$.*?\$\]",
        }
    }

    /// Opening and closing delimiters of the tag.
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            TagKind::Field => ("['", "']"),
            TagKind::Function => ("[@", "@]"),
            TagKind::Expression => ("[#", "#]"),
            TagKind::Lambda => ("[~", "~]"),
            TagKind::Variable => ("[&", "&]"),
            TagKind::Code => ("[=", "=]"),
            TagKind::System => ("[^", "^]"),
            TagKind::Style => ("[*", "*]"),
            TagKind::SubReport => ("[$", "$]"),
        }
    }
}

fn build_regex(kinds: &[TagKind]) -> Regex {
    let alternation = kinds
        .iter()
        .map(|k| format!("(?:{})", k.pattern()))
        .collect::<Vec<_>>()
        .join("|");
    // Every pattern above is a fixed, valid regex.
    Regex::new(&format!("(?s){}", alternation)).expect("tag patterns are valid")
}

static ALL_TAGS: Lazy<Regex> = Lazy::new(|| build_regex(&TagKind::ALL));
static SYSTEM_TAGS: Lazy<Regex> = Lazy::new(|| build_regex(&[TagKind::System]));

fn regex_for(kinds: &[TagKind]) -> std::borrow::Cow<'static, Regex> {
    if kinds == TagKind::ALL.as_slice() {
        std::borrow::Cow::Borrowed(&*ALL_TAGS)
    } else if kinds == [TagKind::System].as_slice() {
        std::borrow::Cow::Borrowed(&*SYSTEM_TAGS)
    } else {
        std::borrow::Cow::Owned(build_regex(kinds))
    }
}

/// A classified tag with its body (the text between the delimiters).
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Field(String),
    Function(String),
    Expression(String),
    Lambda(String),
    Variable(String),
    Code(String),
    System(String),
    Style(String),
    SubReport(String),
}

impl Tag {
    /// Classifies a raw tagged substring produced by `parse_expression`.
    pub fn classify(raw: &str) -> Option<Tag> {
        for kind in TagKind::ALL {
            let (open, close) = kind.delimiters();
            if raw.len() >= open.len() + close.len() && raw.starts_with(open) && raw.ends_with(close) {
                let body = raw[open.len()..raw.len() - close.len()].to_string();
                return Some(match kind {
                    TagKind::Field => Tag::Field(body),
                    TagKind::Function => Tag::Function(body),
                    TagKind::Expression => Tag::Expression(body),
                    TagKind::Lambda => Tag::Lambda(body),
                    TagKind::Variable => Tag::Variable(body),
                    TagKind::Code => Tag::Code(body),
                    TagKind::System => Tag::System(body),
                    TagKind::Style => Tag::Style(body),
                    TagKind::SubReport => Tag::SubReport(body),
                });
            }
        }
        None
    }
}

/// A cell value split into untagged text and tagged sub-expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellFormat {
    /// Untagged text with one `%s` per tag; literal '%' is written as "%%".
    pub fmt: String,
    /// Raw tagged substrings, left to right.
    pub func: Vec<String>,
}

impl CellFormat {
    /// True when the text contained no tags at all.
    pub fn is_plain(&self) -> bool {
        self.func.is_empty()
    }

    /// The untagged text with placeholders removed (only meaningful when `is_plain`).
    pub fn plain_text(&self) -> String {
        render_format(&self.fmt, &[])
    }
}

/// Splits `text` on the given tag kinds.
///
/// Empty input yields an empty format and no tags.
pub fn parse_expression(text: &str, kinds: &[TagKind]) -> CellFormat {
    let mut result = CellFormat::default();
    if text.is_empty() {
        return result;
    }

    let re = regex_for(kinds);
    let mut last = 0;
    for m in re.find_iter(text) {
        push_escaped(&mut result.fmt, &text[last..m.start()]);
        result.fmt.push_str("%s");
        result.func.push(m.as_str().to_string());
        last = m.end();
    }
    push_escaped(&mut result.fmt, &text[last..]);
    result
}

fn push_escaped(out: &mut String, literal: &str) {
    for ch in literal.chars() {
        if ch == '%' {
            out.push_str("%%");
        } else {
            out.push(ch);
        }
    }
}

/// Substitutes `values` into the `%s` placeholders of `fmt`, in order.
/// Missing values render as empty text.
pub fn render_format(fmt: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_value = 0;

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                if let Some(value) = values.get(next_value) {
                    out.push_str(value);
                }
                next_value += 1;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    out
}

/// Splits a system function body such as `SUM({price} * {qty})` into its
/// uppercased name and optional argument text.
pub fn parse_system_call(body: &str) -> (String, Option<String>) {
    let body = body.trim();
    match body.find('(') {
        Some(open) if body.ends_with(')') => {
            let name = body[..open].trim().to_uppercase();
            let arg = body[open + 1..body.len() - 1].to_string();
            (name, Some(arg))
        }
        _ => (body.to_uppercase(), None),
    }
}
