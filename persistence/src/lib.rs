//! FILENAME: persistence/src/lib.rs
//! iq Persistence Module
//!
//! Loads report templates from spreadsheet files and writes generated reports
//! back as SpreadsheetML 2003 XML.

mod document;
mod error;
mod xlsx_reader;
mod xml_reader;
mod xml_writer;

pub use document::{
    DocCell, DocColumn, DocRow, DocStyle, HeaderFooter, Orientation, PageMargins, PageSetup,
    SpreadsheetDocument, Worksheet, DEFAULT_STYLE_ID,
};
pub use error::PersistenceError;
pub use xlsx_reader::load_xlsx_document;
pub use xml_reader::{load_spreadsheet_xml, parse_spreadsheet_xml};
pub use xml_writer::{save_spreadsheet_xml, write_spreadsheet_xml};

use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads a template document, choosing the reader by file extension.
/// `.xlsx`/`.xlsm` go through calamine; everything else is read as SpreadsheetML.
pub fn load_document(path: &Path) -> Result<SpreadsheetDocument, PersistenceError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx") | Some("xlsm") => load_xlsx_document(path),
        _ => load_spreadsheet_xml(path),
    }
}

/// Reads and deserializes a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
