//! PDF text dump into a single-sheet workbook
//!
//! This is a plain per-page text extraction, not table recognition: every
//! non-empty line of page text becomes one cell in column A.

use crate::error::{Error, Result};
use crate::pdf::{blocking, extract_page_texts};
use crate::storage::write_atomic;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

/// Worksheet the extracted text is written to
pub const SHEET_NAME: &str = "Extracted";

/// XLSX cell text limit
const MAX_CELL_CHARS: usize = 32_767;

/// XLSX rows per sheet
const MAX_ROWS: usize = 1_048_576;

/// One row of the output sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetRow {
    /// `--- Page N ---`
    Marker(u32),
    Line(String),
    Blank,
}

impl SheetRow {
    fn text(&self) -> Option<String> {
        match self {
            SheetRow::Marker(page) => Some(format!("--- Page {} ---", page)),
            SheetRow::Line(line) => Some(line.clone()),
            SheetRow::Blank => None,
        }
    }
}

/// Lay out page texts as rows: a marker, the page's non-empty lines, then a
/// blank separator.
pub fn build_rows(pages: &[(u32, String)]) -> Vec<SheetRow> {
    let mut rows = Vec::new();
    for (page, text) in pages {
        rows.push(SheetRow::Marker(*page));
        rows.extend(
            text.split(['\r', '\n'])
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| SheetRow::Line(line.to_string())),
        );
        rows.push(SheetRow::Blank);
    }
    rows
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> Error {
    Error::execution("xlsx", e)
}

fn write_workbook(rows: &[SheetRow]) -> Result<Vec<u8>> {
    if rows.len() > MAX_ROWS {
        tracing::warn!(
            rows = rows.len(),
            kept = MAX_ROWS,
            "Extracted text exceeds sheet row limit, truncating"
        );
    }

    let mut workbook = Workbook::new();
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME).map_err(xlsx_error)?;
        for (index, row) in rows.iter().take(MAX_ROWS).enumerate() {
            if let Some(text) = row.text() {
                let cell: String = text.chars().take(MAX_CELL_CHARS).collect();
                worksheet
                    .write_string(index as u32, 0, cell)
                    .map_err(xlsx_error)?;
            }
        }
    }
    workbook.save_to_buffer().map_err(xlsx_error)
}

pub(super) async fn extract(input: &Path, output: &Path) -> Result<PathBuf> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    blocking(move || {
        let data = std::fs::read(&input)?;
        let pages = extract_page_texts(&data)?;
        let rows = build_rows(&pages);
        tracing::debug!(pages = pages.len(), rows = rows.len(), "Extracted PDF text");
        let workbook = write_workbook(&rows)?;
        write_atomic(&output, &workbook)?;
        Ok(output)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Reader, Xlsx};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_build_rows_layout() {
        let pages = vec![
            (1, "Invoice\r\n\r\n  Total: 42  \n".to_string()),
            (2, String::new()),
        ];
        assert_eq!(
            build_rows(&pages),
            vec![
                SheetRow::Marker(1),
                SheetRow::Line("Invoice".to_string()),
                SheetRow::Line("Total: 42".to_string()),
                SheetRow::Blank,
                SheetRow::Marker(2),
                SheetRow::Blank,
            ]
        );
    }

    #[test]
    fn test_workbook_contents() {
        let rows = build_rows(&[(1, "alpha\nbeta".to_string()), (2, "gamma".to_string())]);
        let bytes = write_workbook(&rows).unwrap();

        let mut workbook = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let column: Vec<String> = range
            .rows()
            .map(|row| row.first().map(|c| c.to_string()).unwrap_or_default())
            .collect();

        assert_eq!(
            column,
            vec!["--- Page 1 ---", "alpha", "beta", "", "--- Page 2 ---", "gamma"]
        );
    }

    #[test]
    fn test_long_cells_are_truncated() {
        let rows = vec![SheetRow::Line("x".repeat(MAX_CELL_CHARS + 10))];
        let bytes = write_workbook(&rows).unwrap();

        let mut workbook = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let cell = range.get_value((0, 0)).unwrap().to_string();
        assert_eq!(cell.len(), MAX_CELL_CHARS);
    }
}
