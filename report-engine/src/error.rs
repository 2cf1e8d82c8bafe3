//! FILENAME: report-engine/src/error.rs

use persistence::PersistenceError;
use thiserror::Error;

/// Structural problems found while parsing a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template document has no worksheet")]
    NoWorksheet,

    #[error("Band [{band}] resumes at row {row} after another band started")]
    DuplicateBand { band: String, row: usize },

    #[error("Group band [{band}] at row {row} names no group field")]
    MissingGroupField { band: String, row: usize },

    #[error("Template load error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Failures that abort a whole report generation.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Failed to emit {band} band: {source}")]
    Band {
        band: String,
        #[source]
        source: Box<GenerateError>,
    },

    #[error("Template cell ({row}, {col}) is outside the template sheet")]
    OutOfRange { row: usize, col: usize },

    #[error("Sub-report '{name}': {reason}")]
    SubReport { name: String, reason: String },

    #[error("Group field '{0}' is not a query field")]
    UnknownField(String),
}

impl GenerateError {
    pub fn in_band(band: impl Into<String>, source: GenerateError) -> Self {
        GenerateError::Band {
            band: band.into(),
            source: Box::new(source),
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Any failure of `render_to_file`.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("Report write error: {0}")]
    Write(#[from] PersistenceError),
}
