//! FILENAME: persistence/src/document.rs
//! PURPOSE: Generic spreadsheet-document model.
//! CONTEXT: Mirrors the SpreadsheetML 2003 layout: a style table plus worksheets
//! of sparse rows and cells. Positions are kept as written (`index` is the
//! optional 1-based `ss:Index`, `span` the number of extra repeats), so the
//! template parser decides how to normalize them into a rectangular grid.

use engine::{CellStyle, CellValue};
use serde::{Deserialize, Serialize};

/// Style id SpreadsheetML uses for the workbook default.
pub const DEFAULT_STYLE_ID: &str = "Default";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpreadsheetDocument {
    pub styles: Vec<DocStyle>,
    pub worksheets: Vec<Worksheet>,
}

impl SpreadsheetDocument {
    pub fn new() -> Self {
        SpreadsheetDocument::default()
    }

    /// Resolves a style by id, applying its parent chain.
    pub fn style(&self, id: &str) -> Option<CellStyle> {
        self.resolve_style(id, 0)
    }

    fn resolve_style(&self, id: &str, depth: usize) -> Option<CellStyle> {
        let entry = self.styles.iter().find(|s| s.id == id)?;
        let parent = match (&entry.parent, depth < 16) {
            (Some(parent), true) => self.resolve_style(parent, depth + 1),
            _ => None,
        };
        Some(match parent {
            Some(base) => base.overlay(&entry.style),
            None => entry.style.clone(),
        })
    }

    pub fn default_style(&self) -> Option<CellStyle> {
        self.style(DEFAULT_STYLE_ID)
    }

    pub fn worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|w| w.name == name)
    }
}

/// One entry of the style table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocStyle {
    pub id: String,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub style: CellStyle,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    pub columns: Vec<DocColumn>,
    pub rows: Vec<DocRow>,
    pub page_setup: PageSetup,
}

impl Worksheet {
    pub fn new(name: &str) -> Self {
        Worksheet {
            name: name.to_string(),
            ..Worksheet::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocColumn {
    pub index: Option<usize>,
    pub span: usize,
    pub width: Option<f64>,
    pub style_id: Option<String>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocRow {
    pub index: Option<usize>,
    pub span: usize,
    pub height: Option<f64>,
    pub style_id: Option<String>,
    pub hidden: bool,
    pub cells: Vec<DocCell>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocCell {
    pub index: Option<usize>,
    pub merge_across: usize,
    pub merge_down: usize,
    pub style_id: Option<String>,
    pub value: CellValue,
}

impl DocCell {
    pub fn text(value: &str) -> Self {
        DocCell {
            value: CellValue::Text(value.to_string()),
            ..DocCell::default()
        }
    }

    /// The cell content as it would be displayed.
    pub fn display(&self) -> String {
        self.value.display()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        PageMargins {
            left: 0.75,
            right: 0.75,
            top: 1.0,
            bottom: 1.0,
        }
    }
}

/// Running page header or footer text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeaderFooter {
    pub text: String,
    pub margin: Option<f64>,
}

/// Print settings of a worksheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSetup {
    pub orientation: Orientation,
    pub margins: PageMargins,
    pub header: Option<HeaderFooter>,
    pub footer: Option<HeaderFooter>,
    pub paper_size: Option<u32>,
    pub scale: Option<u32>,
    pub fit_to_page: bool,
    pub fit_width: Option<u32>,
    pub fit_height: Option<u32>,
    pub resolution: Option<u32>,
}
