//! FILENAME: engine/src/coord.rs
//! PURPOSE: Column-letter helpers.
//! CONTEXT: Auto-filled detail bands name their columns `A`, `B`, ... and the
//! generator maps those letters back to query field positions. Log messages
//! refer to cells in A1 notation. All indices are 0-based.

/// A cell coordinate as (row, col) with 0-based indices.
pub type CellCoord = (usize, usize);

/// Converts a column string ("A", "AA", "abc") to a 0-based index.
/// Returns None if the string is empty or contains anything but ASCII letters.
pub fn col_to_index(col_str: &str) -> Option<usize> {
    if col_str.is_empty() || !col_str.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut result: usize = 0;
    for c in col_str.chars() {
        let digit = (c.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        result = result.checked_mul(26)?.checked_add(digit)?;
    }
    Some(result - 1)
}

/// Converts a 0-based column index to a column string.
/// 0 -> "A", 25 -> "Z", 26 -> "AA".
pub fn index_to_col(mut col_index: usize) -> String {
    let mut result = String::new();
    loop {
        let remainder = col_index % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col_index < 26 {
            break;
        }
        col_index = col_index / 26 - 1;
    }
    result
}

/// (0, 0) -> "A1"
pub fn coord_to_a1(coord: CellCoord) -> String {
    let (row, col) = coord;
    format!("{}{}", index_to_col(col), row + 1)
}
