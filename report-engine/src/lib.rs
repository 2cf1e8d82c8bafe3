//! FILENAME: report-engine/src/lib.rs
//! iq Report Engine
//!
//! Parses band-tagged spreadsheet templates and fills them from query tables.
//!
//! ```text
//! SpreadsheetDocument --TemplateParser--> Report (template)
//! Report + QueryTable --ReportGenerator--> Report (generated) --to_document--> SpreadsheetDocument
//! ```

pub mod logging;

pub mod cache;
pub mod cell_expr;
pub mod convert;
pub mod error;
pub mod generator;
pub mod model;
pub mod options;
pub mod query;
pub mod summation;
pub mod template_parser;

pub use cache::TemplateCache;
pub use cell_expr::{CellContext, CellEvaluator, CellOutput};
pub use convert::to_document;
pub use error::{CacheError, GenerateError, RenderError, TemplateError};
pub use generator::{detect_break, ReportGenerator};
pub use model::{Accumulator, Band, BandKind, Group, Report, ReportCell};
pub use options::GeneratorOptions;
pub use query::{create_empty_query_table, QueryTable, SubReport};
pub use summation::{clear_sum, init_sum_cells, sum_iterate, FormulaCache};
pub use template_parser::{RowTag, TemplateParser, TitleKind};

use persistence::save_spreadsheet_xml;
use std::path::Path;

/// Parses the template at `template_path`, fills it from `table` and writes the
/// result as SpreadsheetML to `output_path`.
pub fn render_to_file(
    template_path: &Path,
    table: &QueryTable,
    output_path: &Path,
    options: &GeneratorOptions,
) -> Result<Report, RenderError> {
    let template = TemplateParser::new()
        .with_options(options.clone())
        .try_parse_file(template_path)?;
    let report = ReportGenerator::new()
        .with_options(options.clone())
        .try_generate(&template, table, None, None)?;
    save_spreadsheet_xml(&to_document(&report), output_path)?;
    Ok(report)
}
