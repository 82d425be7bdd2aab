//! Writes actual output and status back into the test-case sheet

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::case::{Status, ACTUAL_OUTPUT, EXPECTED_OUTPUT, STATUS, TC_ID};
use crate::error::{E2eError, E2eResult};
use crate::workbook::{CellValue, Workbook};

/// What happened to a single `record` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Result stored in this 1-based sheet row
    Written { row: u32 },
    /// Nothing was written; the reason has already been logged
    Skipped { reason: String },
}

/// Re-opens, mutates and rewrites the workbook on every call
pub struct ResultWriter {
    path: PathBuf,
    sheet_name: String,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl ResultWriter {
    pub fn new(path: impl Into<PathBuf>, sheet_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet_name: sheet_name.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store `actual` and `status` in the first row whose `TC ID` equals
    /// `tc_key`. Errors are logged and swallowed.
    pub fn record(&self, tc_key: &CellValue, actual: &str, status: Status) -> WriteOutcome {
        let _guard = self.lock.lock();

        match self.try_record(tc_key, actual, status) {
            Ok(row) => {
                info!("Recorded {} for {} in row {}", status, tc_key, row);
                WriteOutcome::Written { row }
            }
            Err(e) => {
                error!(
                    "Failed to record result for {} in {}: {}",
                    tc_key,
                    self.path.display(),
                    e
                );
                WriteOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_record(&self, tc_key: &CellValue, actual: &str, status: Status) -> E2eResult<u32> {
        let mut workbook = Workbook::open(&self.path)?;
        let sheet = workbook.sheet_mut(&self.sheet_name)?;

        let mut rows = sheet.rows().to_vec();
        let index = stamp_result(&mut rows, tc_key, actual, status)?;
        let row = sheet.origin().0 + index as u32 + 1;

        sheet.replace_rows(rows);
        workbook.save()?;
        Ok(row)
    }
}

fn column_of(header: &[CellValue], name: &str) -> Option<usize> {
    header.iter().position(|cell| cell.as_text() == Some(name))
}

/// Insert a column at `at`, shifting every row long enough to reach it
fn insert_column(rows: &mut [Vec<CellValue>], at: usize, name: &str) {
    debug!("Inserting column '{}' at index {}", name, at);

    if let Some((header, data)) = rows.split_first_mut() {
        if header.len() < at {
            header.resize(at, CellValue::Empty);
        }
        header.insert(at, CellValue::from(name));

        for row in data {
            if row.len() > at {
                row.insert(at, CellValue::Empty);
            }
        }
    }
}

/// Apply one result to an array-of-arrays sheet (row 0 = header).
///
/// Creates `Actual Output` right after `Expected output` and `Status` right
/// after `Actual Output` when either is missing, then overwrites both cells of
/// the first row whose `TC ID` cell equals `tc_key`. Returns that row's index.
/// On `WriteTargetNotFound` the rows may already carry the new columns; callers
/// must discard them.
pub fn stamp_result(
    rows: &mut Vec<Vec<CellValue>>,
    tc_key: &CellValue,
    actual: &str,
    status: Status,
) -> E2eResult<usize> {
    let header = rows
        .first()
        .ok_or_else(|| E2eError::ColumnNotFound(TC_ID.to_string()))?;
    if column_of(header, TC_ID).is_none() {
        return Err(E2eError::ColumnNotFound(TC_ID.to_string()));
    }

    let actual_col = match column_of(&rows[0], ACTUAL_OUTPUT) {
        Some(col) => col,
        None => {
            let at = column_of(&rows[0], EXPECTED_OUTPUT)
                .map(|col| col + 1)
                .unwrap_or(rows[0].len());
            insert_column(rows, at, ACTUAL_OUTPUT);
            at
        }
    };

    let status_col = match column_of(&rows[0], STATUS) {
        Some(col) => col,
        None => {
            let at = actual_col + 1;
            insert_column(rows, at, STATUS);
            at
        }
    };

    // Positions may have shifted after an insert.
    let actual_col = column_of(&rows[0], ACTUAL_OUTPUT).unwrap_or(actual_col);
    let tc_col = column_of(&rows[0], TC_ID)
        .ok_or_else(|| E2eError::ColumnNotFound(TC_ID.to_string()))?;

    let index = rows
        .iter()
        .skip(1)
        .position(|row| row.get(tc_col) == Some(tc_key))
        .map(|pos| pos + 1)
        .ok_or_else(|| E2eError::WriteTargetNotFound(tc_key.to_string()))?;

    let row = &mut rows[index];
    let width = actual_col.max(status_col) + 1;
    if row.len() < width {
        row.resize(width, CellValue::Empty);
    }
    row[actual_col] = CellValue::from(actual);
    row[status_col] = CellValue::from(status.as_str());

    Ok(index)
}
