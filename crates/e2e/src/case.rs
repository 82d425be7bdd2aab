//! Test cases loaded from the spreadsheet

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::E2eResult;
use crate::workbook::{CellValue, Sheet, Workbook};

pub const TC_ID: &str = "TC ID";
pub const TEST_CASE_NAME: &str = "Test case name";
pub const INPUT_LENGTH_TYPE: &str = "Input length type";
pub const INPUT: &str = "Input";
pub const EXPECTED_OUTPUT: &str = "Expected output";
pub const JUSTIFICATION: &str = "Accuracy justification/Description of issue type";
pub const COVERAGE: &str = "What is covered by the test";
pub const ACTUAL_OUTPUT: &str = "Actual Output";
pub const STATUS: &str = "Status";

/// One spreadsheet row driving one browser interaction
#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    /// 1-based physical row in the sheet
    pub row_index: u32,

    /// Display form of the `TC ID` cell
    pub tc_id: String,

    /// Raw `TC ID` cell, the key used when writing results back
    #[serde(skip)]
    pub tc_key: CellValue,

    pub name: String,
    pub input_type: String,
    pub input: String,
    pub expected: String,
    pub justification: String,
    pub coverage: String,
}

/// Outcome recorded in the `Status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    /// Strict comparison: no whitespace, case or mark normalization
    pub fn compare(actual: &str, expected: &str) -> Self {
        if actual == expected {
            Status::Pass
        } else {
            Status::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header name to column position; first occurrence wins
struct Header<'a> {
    columns: HashMap<&'a str, usize>,
}

impl<'a> Header<'a> {
    fn new(row: &'a [CellValue]) -> Self {
        let mut columns = HashMap::new();
        for (i, cell) in row.iter().enumerate() {
            if let Some(name) = cell.as_text() {
                columns.entry(name).or_insert(i);
            }
        }
        Self { columns }
    }

    fn cell<'r>(&self, row: &'r [CellValue], name: &str) -> Option<&'r CellValue> {
        self.columns.get(name).and_then(|&i| row.get(i))
    }

    fn text(&self, row: &[CellValue], name: &str) -> String {
        self.cell(row, name).map(ToString::to_string).unwrap_or_default()
    }
}

impl TestCase {
    /// Convert a sheet into test cases, skipping fully blank rows
    pub fn from_sheet(sheet: &Sheet) -> Vec<Self> {
        let Some((header_row, data)) = sheet.rows().split_first() else {
            return Vec::new();
        };
        let header = Header::new(header_row);
        let first_row = sheet.origin().0 + 1;

        let mut seen = HashSet::new();
        let mut cases = Vec::new();

        for (i, row) in data.iter().enumerate() {
            if row.iter().all(CellValue::is_empty) {
                continue;
            }

            let tc_key = header.cell(row, TC_ID).cloned().unwrap_or_default();
            let case = TestCase {
                row_index: first_row + 1 + i as u32,
                tc_id: tc_key.to_string(),
                tc_key,
                name: header.text(row, TEST_CASE_NAME),
                input_type: header.text(row, INPUT_LENGTH_TYPE),
                input: header.text(row, INPUT),
                expected: header.text(row, EXPECTED_OUTPUT),
                justification: header.text(row, JUSTIFICATION),
                coverage: header.text(row, COVERAGE),
            };

            if !seen.insert(case.tc_id.clone()) {
                warn!(
                    "Duplicate TC ID '{}' at row {}; results will be written to its first occurrence",
                    case.tc_id, case.row_index
                );
            }
            cases.push(case);
        }

        cases
    }
}

/// Load every test case from `sheet_name` in the workbook at `path`
pub fn load_test_cases(path: &Path, sheet_name: &str) -> E2eResult<Vec<TestCase>> {
    let workbook = Workbook::open(path)?;
    let sheet = workbook.sheet(sheet_name)?;
    let cases = TestCase::from_sheet(sheet);

    info!(
        "Loaded {} test case(s) from '{}' in {}",
        cases.len(),
        sheet_name,
        path.display()
    );
    Ok(cases)
}
