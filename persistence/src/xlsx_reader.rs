//! FILENAME: persistence/src/xlsx_reader.rs
//! PURPOSE: Loads an XLSX workbook as a value-only `SpreadsheetDocument`.
//! CONTEXT: Lets templates be authored in any spreadsheet program. Styles,
//! merges and print settings are not read; every cell uses the default style.

use crate::document::{DocCell, DocRow, SpreadsheetDocument, Worksheet};
use crate::PersistenceError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use engine::CellValue;
use std::path::Path;

pub fn load_xlsx_document(path: &Path) -> Result<SpreadsheetDocument, PersistenceError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err(PersistenceError::InvalidFormat(
            "Workbook contains no sheets".to_string(),
        ));
    }

    let mut doc = SpreadsheetDocument::new();

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| PersistenceError::InvalidFormat(e.to_string()))?;

        // Ranges start at the first used cell; keep absolute positions via ss:Index.
        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let mut sheet = Worksheet::new(sheet_name);

        for (row_offset, row) in range.rows().enumerate() {
            let cells: Vec<DocCell> = row
                .iter()
                .enumerate()
                .filter_map(|(col_offset, cell)| {
                    let value = data_to_value(cell)?;
                    Some(DocCell {
                        index: Some(first_col as usize + col_offset + 1),
                        value,
                        ..DocCell::default()
                    })
                })
                .collect();

            if cells.is_empty() {
                continue;
            }
            sheet.rows.push(DocRow {
                index: Some(first_row as usize + row_offset + 1),
                cells,
                ..DocRow::default()
            });
        }

        doc.worksheets.push(sheet);
    }

    Ok(doc)
}

fn data_to_value(cell: &Data) -> Option<CellValue> {
    let value = match cell {
        Data::Empty => return None,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Text(format!("{:?}", e)),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    };
    Some(value)
}
