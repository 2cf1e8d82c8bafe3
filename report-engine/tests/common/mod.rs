//! FILENAME: tests/common/mod.rs
//! Template and query-table fixtures for report-engine integration tests.

#![allow(dead_code)]

use engine::CellValue;
use persistence::{
    save_spreadsheet_xml, DocCell, DocRow, SpreadsheetDocument, Worksheet,
};
use report_engine::{QueryTable, Report, TemplateParser};
use std::path::{Path, PathBuf};

/// Builds template documents row by row. Every row gets its band tag in the
/// column right after the content, so all tags share one column.
pub struct TemplateBuilder {
    name: String,
    width: usize,
    rows: Vec<DocRow>,
}

impl TemplateBuilder {
    /// A template whose content is `width` columns wide.
    pub fn new(name: &str, width: usize) -> Self {
        TemplateBuilder {
            name: name.to_string(),
            width,
            rows: Vec::new(),
        }
    }

    /// Adds a content row. `tag` may be empty for a row continuing the
    /// previous band.
    pub fn row(mut self, cells: &[&str], tag: &str) -> Self {
        let mut doc_cells: Vec<DocCell> = (0..self.width)
            .map(|c| DocCell::text(cells.get(c).copied().unwrap_or("")))
            .collect();
        doc_cells.push(DocCell::text(tag));
        self.rows.push(DocRow {
            cells: doc_cells,
            ..DocRow::default()
        });
        self
    }

    /// Adds a row as given, for merges and explicit indexes.
    pub fn raw_row(mut self, row: DocRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn document(self) -> SpreadsheetDocument {
        let mut sheet = Worksheet::new(&self.name);
        sheet.rows = self.rows;
        SpreadsheetDocument {
            styles: Vec::new(),
            worksheets: vec![sheet],
        }
    }

    pub fn parse(self) -> Report {
        TemplateParser::new()
            .parse(&self.document(), None)
            .expect("fixture template parses")
    }

    /// Writes the template as SpreadsheetML into `dir`.
    pub fn save(self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        save_spreadsheet_xml(&self.document(), &path).expect("fixture template saves");
        path
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Header, one group on `g`, detail, group footer total and report total.
pub fn grouped_template() -> Report {
    TemplateBuilder::new("grouped", 2)
        .row(&["Title"], "[header]")
        .row(&["['g']"], "[head_grp]['g']")
        .row(&["['g']", "['v']"], "[detail]")
        .row(&["['g']", "[^SUM({v})^]"], "[foot_grp]['g']")
        .row(&["Total [^SUM({v})^]"], "[footer]")
        .parse()
}

/// g=1 (10, 20), g=2 (5).
pub fn grouped_table() -> QueryTable {
    QueryTable::new(
        &["g", "v"],
        vec![
            vec![1.0.into(), 10.0.into()],
            vec![1.0.into(), 20.0.into()],
            vec![2.0.into(), 5.0.into()],
        ],
    )
}

pub fn text_table(fields: &[&str], rows: &[&[&str]]) -> QueryTable {
    let data = rows
        .iter()
        .map(|row| row.iter().map(|v| CellValue::from(*v)).collect())
        .collect();
    QueryTable::new(fields, data)
}

/// All output rows as text.
pub fn texts(report: &Report) -> Vec<Vec<String>> {
    (0..report.row_count()).map(|r| report.row_texts(r)).collect()
}

/// First-column text of every output row.
pub fn first_column(report: &Report) -> Vec<String> {
    (0..report.row_count())
        .map(|r| report.row_texts(r).into_iter().next().unwrap_or_default())
        .collect()
}
