//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use translit_e2e::workbook::{CellValue, Workbook as Book};

pub const HEADER: [&str; 7] = [
    "TC ID",
    "Test case name",
    "Input length type",
    "Input",
    "Expected output",
    "Accuracy justification/Description of issue type",
    "What is covered by the test",
];

/// A fixture row; `None` leaves the cell blank
pub type Row<'a> = Vec<Option<&'a str>>;

pub fn case_row<'a>(tc_id: &'a str, input: &'a str, expected: &'a str) -> Row<'a> {
    vec![
        Some(tc_id),
        Some("Simple sentence"),
        Some("S"),
        Some(input),
        Some(expected),
        Some("Accurate"),
        Some("Daily usage"),
    ]
}

/// Write a workbook with a `Notes` sheet and a `Test Cases` sheet
pub fn write_workbook(path: &Path, rows: &[Row<'_>]) {
    let mut book = Workbook::new();

    let notes = book.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "Owner: QA").unwrap();

    let sheet = book.add_worksheet();
    sheet.set_name("Test Cases").unwrap();
    for (c, name) in HEADER.iter().enumerate() {
        sheet.write_string(0, c as u16, *name).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                sheet.write_string(r as u32 + 1, c as u16, *value).unwrap();
            }
        }
    }

    book.save(path).unwrap();
}

pub fn fixture(rows: &[Row<'_>]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test_cases.xlsx");
    write_workbook(&path, rows);
    (dir, path)
}

/// The `Test Cases` grid as display strings
pub fn grid(path: &Path) -> Vec<Vec<String>> {
    let book = Book::open(path).unwrap();
    book.sheet("Test Cases")
        .unwrap()
        .rows()
        .iter()
        .map(|row| row.iter().map(CellValue::to_string).collect())
        .collect()
}

pub fn column(grid: &[Vec<String>], name: &str) -> Option<usize> {
    grid[0].iter().position(|h| h == name)
}

pub fn cell(grid: &[Vec<String>], row: usize, name: &str) -> String {
    column(grid, name)
        .and_then(|c| grid[row].get(c).cloned())
        .unwrap_or_default()
}
