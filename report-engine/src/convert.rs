//! FILENAME: report-engine/src/convert.rs
//! PURPOSE: Converts a report into the generic spreadsheet document.
//! CONTEXT: The document is what the SpreadsheetML writer serializes. Cell
//! attributes become deduplicated styles, merges become MergeAcross/MergeDown,
//! and absorbed or missing positions are skipped with explicit indexes.

use crate::model::{Report, ReportCell};
use engine::{CellValue, StyleRegistry};
use persistence::{
    DocCell, DocColumn, DocRow, DocStyle, SpreadsheetDocument, Worksheet, DEFAULT_STYLE_ID,
};

fn style_id(index: usize) -> String {
    if index == 0 {
        DEFAULT_STYLE_ID.to_string()
    } else {
        format!("s{}", 20 + index)
    }
}

/// Numeric text is written as a number, everything else as text.
fn cell_value(cell: &ReportCell) -> CellValue {
    let text = cell.text();
    if text.is_empty() {
        return CellValue::Empty;
    }
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(text.to_string()),
    }
}

pub fn to_document(report: &Report) -> SpreadsheetDocument {
    let mut registry = StyleRegistry::new();
    let width = report.col_count();

    let mut columns = Vec::with_capacity(width);
    for col in 0..width {
        let column_width = report
            .sheet
            .iter()
            .filter_map(|row| row.get(col).and_then(Option::as_ref))
            .find(|c| c.merge_col == 1 && c.width > 0.0)
            .map(|c| c.width);
        columns.push(DocColumn {
            index: Some(col + 1),
            width: column_width,
            ..DocColumn::default()
        });
    }

    let mut rows = Vec::with_capacity(report.row_count());
    for (r, row) in report.sheet.iter().enumerate() {
        let height = row
            .iter()
            .flatten()
            .filter(|c| c.merge_row == 1 && c.height > 0.0)
            .map(|c| c.height)
            .fold(None, |acc: Option<f64>, h| Some(acc.map_or(h, |a| a.max(h))));

        let cells = row
            .iter()
            .enumerate()
            .filter_map(|(c, slot)| slot.as_ref().map(|cell| (c, cell)))
            .filter(|(_, cell)| cell.visible)
            .map(|(c, cell)| {
                let index = registry.get_or_create(cell.style());
                DocCell {
                    index: Some(c + 1),
                    merge_across: cell.merge_across(),
                    merge_down: cell.merge_down(),
                    style_id: Some(style_id(index)),
                    value: cell_value(cell),
                }
            })
            .collect();

        rows.push(DocRow {
            index: Some(r + 1),
            height,
            cells,
            ..DocRow::default()
        });
    }

    let styles = registry
        .all_styles()
        .iter()
        .enumerate()
        .map(|(i, style)| DocStyle {
            id: style_id(i),
            name: (i == 0).then(|| "Normal".to_string()),
            parent: None,
            style: style.clone(),
        })
        .collect();

    let name = if report.name.is_empty() {
        "Sheet1".to_string()
    } else {
        report.name.clone()
    };
    let worksheet = Worksheet {
        name,
        columns,
        rows,
        page_setup: report.page_setup.clone(),
    };

    SpreadsheetDocument {
        styles,
        worksheets: vec![worksheet],
    }
}
