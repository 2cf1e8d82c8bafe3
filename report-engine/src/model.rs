//! FILENAME: report-engine/src/model.rs
//! PURPOSE: The report structure shared by the template parser and the generator.
//! CONTEXT: A parsed template and a generated report have the same shape. In a
//! template, cell values are raw tagged text and bands describe template rows;
//! in a generated report, values are final text and bands describe the rows
//! actually emitted.

use engine::{Alignment, Borders, CellStyle, Fill, FontStyle, Namespace, Record};
use persistence::PageSetup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

// ============================================================================
// BANDS
// ============================================================================

/// The kinds of emitted band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandKind {
    Header,
    Footer,
    Detail,
    GroupHeader,
    GroupFooter,
    Upper,
    Under,
}

impl BandKind {
    /// The band tag as written in a template, without brackets.
    pub fn tag(self) -> &'static str {
        match self {
            BandKind::Header => "header",
            BandKind::Footer => "footer",
            BandKind::Detail => "detail",
            BandKind::GroupHeader => "head_grp",
            BandKind::GroupFooter => "foot_grp",
            BandKind::Upper => "upper",
            BandKind::Under => "under",
        }
    }

    pub fn from_tag(tag: &str) -> Option<BandKind> {
        match tag {
            "header" => Some(BandKind::Header),
            "footer" => Some(BandKind::Footer),
            "detail" => Some(BandKind::Detail),
            "head_grp" => Some(BandKind::GroupHeader),
            "foot_grp" => Some(BandKind::GroupFooter),
            "upper" => Some(BandKind::Upper),
            "under" => Some(BandKind::Under),
            _ => None,
        }
    }

    pub fn is_group(self) -> bool {
        matches!(self, BandKind::GroupHeader | BandKind::GroupFooter)
    }
}

impl fmt::Display for BandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A rectangular region of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Band {
    pub row: usize,
    pub col: usize,
    pub row_size: usize,
    pub col_size: usize,
}

impl Band {
    pub fn new(row: usize, col: usize, row_size: usize, col_size: usize) -> Self {
        Band {
            row,
            col,
            row_size,
            col_size,
        }
    }

    /// One past the last row.
    pub fn end_row(&self) -> usize {
        self.row + self.row_size
    }

    pub fn rows(&self) -> Range<usize> {
        self.row..self.end_row()
    }

    pub fn contains_row(&self, row: usize) -> bool {
        self.rows().contains(&row)
    }
}

/// A control-break level. Groups are stored outermost first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub field: String,
    pub header: Option<Band>,
    pub footer: Option<Band>,
    /// Last record seen by this group; set while generating.
    #[serde(skip)]
    pub old_rec: Option<Record>,
}

impl Group {
    pub fn new(field: &str) -> Self {
        Group {
            field: field.to_string(),
            ..Group::default()
        }
    }
}

// ============================================================================
// CELLS
// ============================================================================

/// Running total behind one SUM/AVG occurrence in a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Accumulator {
    pub value: f64,
    /// Expression evaluated against each record, fields written as `record['f']`.
    pub formul: String,
}

impl Accumulator {
    pub fn new(formul: &str) -> Self {
        Accumulator {
            value: 0.0,
            formul: formul.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCell {
    /// Rows covered, 1 when not merged.
    pub merge_row: usize,
    /// Columns covered, 1 when not merged.
    pub merge_col: usize,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub value: Option<String>,
    pub font: Option<FontStyle>,
    pub color: Option<Fill>,
    pub border: Borders,
    pub align: Option<Alignment>,
    pub sum: Option<Vec<Accumulator>>,
    pub visible: bool,
    pub num_format: Option<String>,
}

impl Default for ReportCell {
    fn default() -> Self {
        ReportCell {
            merge_row: 1,
            merge_col: 1,
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            value: None,
            font: None,
            color: None,
            border: Borders::default(),
            align: None,
            sum: None,
            visible: true,
            num_format: None,
        }
    }
}

impl ReportCell {
    pub fn new(value: Option<&str>) -> Self {
        ReportCell {
            value: value.map(str::to_string),
            ..ReportCell::default()
        }
    }

    /// Sets the merge extent. Spans below 1 are raised to 1.
    pub fn set_merge(&mut self, rows: usize, cols: usize) {
        self.merge_row = rows.max(1);
        self.merge_col = cols.max(1);
    }

    pub fn with_merge(mut self, rows: usize, cols: usize) -> Self {
        self.set_merge(rows, cols);
        self
    }

    /// Extra columns absorbed to the right.
    pub fn merge_across(&self) -> usize {
        self.merge_col.saturating_sub(1)
    }

    /// Extra rows absorbed below.
    pub fn merge_down(&self) -> usize {
        self.merge_row.saturating_sub(1)
    }

    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// The cell attributes as a style.
    pub fn style(&self) -> CellStyle {
        CellStyle {
            font: self.font.clone(),
            fill: self.color.clone(),
            borders: if self.border.is_empty() {
                None
            } else {
                Some(self.border.clone())
            },
            alignment: self.align,
            number_format: self.num_format.clone(),
        }
    }

    /// Replaces the cell attributes with `style`.
    pub fn set_style(&mut self, style: &CellStyle) {
        self.font = style.font.clone();
        self.color = style.fill.clone();
        self.border = style.borders.clone().unwrap_or_default();
        self.align = style.alignment;
        self.num_format = style.number_format.clone();
    }

    /// Overlays the parts `style` defines onto the cell attributes.
    pub fn apply_style(&mut self, style: &CellStyle) {
        let merged = self.style().overlay(style);
        self.set_style(&merged);
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// A parsed template, or a generated report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub name: String,
    pub description: Option<String>,
    pub generator: Option<String>,
    pub data_source: Option<String>,
    pub query: Option<String>,
    pub variables: Namespace,
    pub style_lib: BTreeMap<String, CellStyle>,
    pub header: Option<Band>,
    pub footer: Option<Band>,
    pub detail: Option<Band>,
    pub upper: Option<Band>,
    pub under: Option<Band>,
    pub groups: Vec<Group>,
    pub sheet: Vec<Vec<Option<ReportCell>>>,
    pub page_setup: PageSetup,
    /// The detail band was synthesized as `['A'], ['B'], ...` and is bound to
    /// query fields by position at generation time.
    pub auto_detail: bool,
}

impl Report {
    pub fn new(name: &str) -> Self {
        Report {
            name: name.to_string(),
            ..Report::default()
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&ReportCell> {
        self.sheet.get(row)?.get(col)?.as_ref()
    }

    pub fn row_count(&self) -> usize {
        self.sheet.len()
    }

    pub fn col_count(&self) -> usize {
        self.sheet.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Grows the sheet with empty positions so that (rows - 1, cols - 1) exists.
    pub fn ensure_size(&mut self, rows: usize, cols: usize) {
        let width = self.col_count().max(cols);
        if self.sheet.len() < rows {
            self.sheet.resize_with(rows, Vec::new);
        }
        for row in &mut self.sheet {
            if row.len() < width {
                row.resize(width, None);
            }
        }
    }

    /// Cell texts of a row; absent positions read as empty.
    pub fn row_texts(&self, row: usize) -> Vec<String> {
        self.sheet
            .get(row)
            .map(|cells| {
                cells
                    .iter()
                    .map(|c| c.as_ref().map(|c| c.text().to_string()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every band with a label, for diagnostics.
    pub fn bands(&self) -> Vec<(String, Band)> {
        let mut bands = Vec::new();
        let singles = [
            (BandKind::Upper, self.upper),
            (BandKind::Header, self.header),
            (BandKind::Detail, self.detail),
            (BandKind::Footer, self.footer),
            (BandKind::Under, self.under),
        ];
        for (kind, band) in singles {
            if let Some(band) = band {
                bands.push((kind.tag().to_string(), band));
            }
        }
        for group in &self.groups {
            if let Some(band) = group.header {
                bands.push((format!("{}:{}", BandKind::GroupHeader, group.field), band));
            }
            if let Some(band) = group.footer {
                bands.push((format!("{}:{}", BandKind::GroupFooter, group.field), band));
            }
        }
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{BorderStyle, TextAlign};

    #[test]
    fn merge_spans_are_clamped() {
        let cell = ReportCell::new(Some("x")).with_merge(0, 3);
        assert_eq!(cell.merge_row, 1);
        assert_eq!(cell.merge_col, 3);
        assert_eq!(cell.merge_across(), 2);
        assert_eq!(cell.merge_down(), 0);
    }

    #[test]
    fn style_round_trips_through_cell_attributes() {
        let style = CellStyle::new()
            .with_bold(true)
            .with_text_align(TextAlign::Center)
            .with_number_format("0.00")
            .with_borders(Borders {
                bottom: Some(BorderStyle::solid(1)),
                ..Borders::default()
            });
        let mut cell = ReportCell::default();
        cell.set_style(&style);
        assert_eq!(cell.style(), style);
    }

    #[test]
    fn apply_style_keeps_undefined_parts() {
        let mut cell = ReportCell::default();
        cell.set_style(&CellStyle::new().with_number_format("#,##0"));
        cell.apply_style(&CellStyle::new().with_italic(true));
        assert_eq!(cell.num_format.as_deref(), Some("#,##0"));
        assert!(cell.font.as_ref().unwrap().italic);
    }

    #[test]
    fn ensure_size_keeps_rows_rectangular() {
        let mut report = Report::new("r");
        report.ensure_size(2, 3);
        report.sheet[1][2] = Some(ReportCell::new(Some("z")));
        report.ensure_size(3, 1);
        assert_eq!(report.row_count(), 3);
        assert!(report.sheet.iter().all(|r| r.len() == 3));
        assert_eq!(report.row_texts(1), vec!["", "", "z"]);
    }

    #[test]
    fn band_rows() {
        let band = Band::new(2, 0, 3, 4);
        assert_eq!(band.end_row(), 5);
        assert!(band.contains_row(4));
        assert!(!band.contains_row(5));
        assert_eq!(BandKind::from_tag("foot_grp"), Some(BandKind::GroupFooter));
        assert_eq!(BandKind::from_tag("var"), None);
    }
}
