//! Whole-workbook load and rewrite
//!
//! Every sheet is read with calamine into a value grid and written back with
//! rust_xlsxwriter. Saving always re-serializes the complete workbook; there is
//! no in-place patching of the original file.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, ExcelDateTime, ExcelDateTimeType, Range, Reader};
use rust_xlsxwriter::{Format, Formula, Worksheet};
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

/// A single cell value. Equality is type-sensitive: `Float(1.0) != Text("1")`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Excel serial date in the 1900 date system
    DateTime(f64),
    /// Elapsed time in days, as in an `[h]:mm:ss` cell
    Duration(f64),
    /// Error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The text of a `Text` cell, `None` for every other kind
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::Error(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(n) | CellValue::DateTime(n) | CellValue::Duration(n) => {
                write!(f, "{n}")
            }
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(n) => CellValue::Float(*n),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) if dt.is_duration() => CellValue::Duration(dt.as_f64()),
            Data::DateTime(dt) => CellValue::DateTime(serial_1900(dt)),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
        }
    }
}

// Days between the 1900 and 1904 epochs.
const DAYS_1900_TO_1904: f64 = 1462.0;

/// Serial of `dt` in the 1900 date system, which is the only one the writer
/// emits. calamine keeps 1904 serials as-is and only applies the offset when
/// converting to a calendar date.
fn serial_1900(dt: &ExcelDateTime) -> f64 {
    let value = dt.as_f64();
    let read_as_1900 = ExcelDateTime::new(value, ExcelDateTimeType::DateTime, false);
    if dt.as_datetime() == read_as_1900.as_datetime() {
        value
    } else {
        value + DAYS_1900_TO_1904
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// A formula preserved from the source file, at absolute (0-based) coordinates
#[derive(Debug, Clone)]
struct FormulaCell {
    row: u32,
    col: u32,
    formula: String,
}

/// One named grid. Row 0 of `rows` is the first row of the used range.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    origin: (u32, u32),
    rows: Vec<Vec<CellValue>>,
    formulas: Vec<FormulaCell>,
}

impl Sheet {
    /// Build a sheet anchored at A1
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            origin: (0, 0),
            rows,
            formulas: Vec::new(),
        }
    }

    fn from_ranges(name: String, values: &Range<Data>, formulas: &Range<String>) -> Self {
        let origin = values.start().unwrap_or((0, 0));
        let rows = values
            .rows()
            .map(|row| row.iter().map(CellValue::from).collect())
            .collect();

        let formula_origin = formulas.start().unwrap_or((0, 0));
        let formulas = formulas
            .used_cells()
            .filter(|(_, _, f)| !f.is_empty())
            .map(|(r, c, f)| FormulaCell {
                row: formula_origin.0.saturating_add(r as u32),
                col: formula_origin.1.saturating_add(c as u32),
                formula: f.clone(),
            })
            .collect();

        Self {
            name,
            origin,
            rows,
            formulas,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0-based (row, column) of the top-left cell of the used range
    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Swap in a rebuilt grid. The sheet is rewritten from values only, so any
    /// formulas it carried are dropped.
    pub fn replace_rows(&mut self, rows: Vec<Vec<CellValue>>) {
        self.rows = rows;
        self.formulas.clear();
    }

    fn cell_at(&self, row: u32, col: u32) -> Option<&CellValue> {
        let r = row.checked_sub(self.origin.0)? as usize;
        let c = col.checked_sub(self.origin.1)? as usize;
        self.rows.get(r)?.get(c)
    }

    fn write_into(&self, worksheet: &mut Worksheet, formats: &NumberFormats) -> E2eResult<()> {
        for (r, row) in self.rows.iter().enumerate() {
            let row_num = self.origin.0.saturating_add(r as u32);
            for (c, cell) in row.iter().enumerate() {
                let col_num = column_number(self.origin.1.saturating_add(c as u32));
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        if !s.is_empty() {
                            worksheet.write_string(row_num, col_num, s.as_str())?;
                        }
                    }
                    CellValue::Error(e) => {
                        let formula = Formula::new(format!("={e}")).set_result(e.as_str());
                        worksheet.write_formula(row_num, col_num, formula)?;
                    }
                    CellValue::Int(i) => {
                        worksheet.write_number(row_num, col_num, *i as f64)?;
                    }
                    CellValue::Float(n) => {
                        if n.is_finite() {
                            worksheet.write_number(row_num, col_num, *n)?;
                        }
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(row_num, col_num, *b)?;
                    }
                    CellValue::DateTime(n) => {
                        let format = formats.for_date(*n);
                        worksheet.write_number_with_format(row_num, col_num, *n, format)?;
                    }
                    CellValue::Duration(n) => {
                        let format = &formats.duration;
                        worksheet.write_number_with_format(row_num, col_num, *n, format)?;
                    }
                }
            }
        }

        for cell in &self.formulas {
            let cached = self
                .cell_at(cell.row, cell.col)
                .map(ToString::to_string)
                .unwrap_or_default();
            let formula = Formula::new(cell.formula.as_str()).set_result(cached);
            worksheet.write_formula(cell.row, column_number(cell.col), formula)?;
        }

        Ok(())
    }
}

/// Number formats for date-like cells. The source file's own format strings
/// are not available from calamine, so dates come back in ISO form.
struct NumberFormats {
    date: Format,
    datetime: Format,
    duration: Format,
}

impl NumberFormats {
    fn new() -> Self {
        Self {
            date: Format::new().set_num_format(DATE_FORMAT),
            datetime: Format::new().set_num_format(DATETIME_FORMAT),
            duration: Format::new().set_num_format(DURATION_FORMAT),
        }
    }

    /// Whole serials carry no time of day
    fn for_date(&self, serial: f64) -> &Format {
        if serial.fract() == 0.0 {
            &self.date
        } else {
            &self.datetime
        }
    }
}

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DURATION_FORMAT: &str = "[h]:mm:ss";

// Out-of-range columns are left for rust_xlsxwriter to reject.
fn column_number(col: u32) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

/// All sheets of a workbook file, in file order
#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Load every sheet of the workbook at `path`
    pub fn open(path: &Path) -> E2eResult<Self> {
        let mut source = open_workbook_auto(path)?;
        let mut sheets = Vec::new();

        for name in source.sheet_names() {
            let values = source.worksheet_range(&name)?;
            let formulas = match source.worksheet_formula(&name) {
                Ok(formulas) => formulas,
                Err(e) => {
                    warn!("Could not read formulas of sheet '{}': {}", name, e);
                    Range::empty()
                }
            };
            sheets.push(Sheet::from_ranges(name, &values, &formulas));
        }

        debug!("Loaded {} sheet(s) from {}", sheets.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    /// A workbook that has not been read from disk
    pub fn from_sheets(path: impl Into<PathBuf>, sheets: Vec<Sheet>) -> Self {
        Self {
            path: path.into(),
            sheets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet(&self, name: &str) -> E2eResult<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| self.sheet_not_found(name))
    }

    pub fn sheet_mut(&mut self, name: &str) -> E2eResult<&mut Sheet> {
        let missing = self.sheet_not_found(name);
        self.sheets.iter_mut().find(|s| s.name == name).ok_or(missing)
    }

    fn sheet_not_found(&self, name: &str) -> E2eError {
        E2eError::SheetNotFound {
            sheet: name.to_string(),
            path: self.path.clone(),
        }
    }

    /// Rewrite the whole workbook to the path it was opened from
    pub fn save(&self) -> E2eResult<()> {
        self.save_as(&self.path)
    }

    /// Serialize every sheet and atomically replace the file at `path`
    pub fn save_as(&self, path: &Path) -> E2eResult<()> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let formats = NumberFormats::new();

        for sheet in &self.sheets {
            let worksheet = book.add_worksheet();
            worksheet.set_name(sheet.name.as_str())?;
            sheet.write_into(worksheet, &formats)?;
        }

        let buffer = book.save_to_buffer()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&buffer)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| E2eError::Io(e.error))?;

        debug!("Wrote {} bytes to {}", buffer.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_cell_equality_is_type_sensitive() {
        assert_ne!(CellValue::Float(1.0), text("1"));
        assert_ne!(CellValue::Int(1), CellValue::Float(1.0));
        assert_ne!(text("tc-01"), text("TC-01"));
        assert_eq!(text("TC-01"), text("TC-01"));
    }

    #[test]
    fn test_display_uses_shortest_number_form() {
        assert_eq!(CellValue::Float(12.0).to_string(), "12");
        assert_eq!(CellValue::Float(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Int(7).to_string(), "7");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn test_save_and_reopen_keeps_every_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let book = Workbook::from_sheets(
            &path,
            vec![
                Sheet::new("Notes", vec![vec![text("keep me")]]),
                Sheet::new(
                    "Test Cases",
                    vec![
                        vec![text("TC ID"), text("Input")],
                        vec![text("Pos_01"), text("mama")],
                        vec![CellValue::Float(3.0), CellValue::Bool(false)],
                    ],
                ),
            ],
        );
        book.save().unwrap();

        let reopened = Workbook::open(&path).unwrap();
        assert_eq!(reopened.sheet_names(), vec!["Notes", "Test Cases"]);
        assert_eq!(reopened.sheet("Notes").unwrap().rows()[0][0], text("keep me"));

        let cases = reopened.sheet("Test Cases").unwrap();
        assert_eq!(cases.rows().len(), 3);
        assert_eq!(cases.rows()[1][0], text("Pos_01"));
        assert_eq!(cases.rows()[2][0], CellValue::Float(3.0));
        assert_eq!(cases.rows()[2][1], CellValue::Bool(false));
    }

    #[test]
    fn test_1904_dates_are_rebased_to_1900() {
        let date_1904 = Data::DateTime(ExcelDateTime::new(100.0, ExcelDateTimeType::DateTime, true));
        let date_1900 = Data::DateTime(ExcelDateTime::new(100.0, ExcelDateTimeType::DateTime, false));
        let elapsed = Data::DateTime(ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, true));

        assert_eq!(CellValue::from(&date_1904), CellValue::DateTime(1562.0));
        assert_eq!(CellValue::from(&date_1900), CellValue::DateTime(100.0));
        assert_eq!(CellValue::from(&elapsed), CellValue::Duration(1.5));
    }

    #[test]
    fn test_date_only_serials_get_a_date_only_format() {
        let formats = NumberFormats::new();
        assert!(std::ptr::eq(formats.for_date(45_000.0), &formats.date));
        assert!(std::ptr::eq(formats.for_date(45_000.25), &formats.datetime));
    }

    #[test]
    fn test_dates_and_errors_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        Workbook::from_sheets(
            &path,
            vec![Sheet::new(
                "Log",
                vec![vec![
                    CellValue::DateTime(45_000.0),
                    CellValue::DateTime(45_000.5),
                    CellValue::Error("#N/A".to_string()),
                ]],
            )],
        )
        .save()
        .unwrap();

        let reopened = Workbook::open(&path).unwrap();
        let log = reopened.sheet("Log").unwrap();
        assert_eq!(log.rows()[0][0], CellValue::DateTime(45_000.0));
        assert_eq!(log.rows()[0][1], CellValue::DateTime(45_000.5));

        let formulas: Vec<_> = log.formulas.iter().map(|f| (f.col, f.formula.as_str())).collect();
        assert_eq!(formulas, vec![(2, "#N/A")]);
    }

    #[test]
    fn test_missing_sheet() {
        let book = Workbook::from_sheets("x.xlsx", vec![Sheet::new("Only", vec![])]);
        let err = book.sheet("Test Cases").unwrap_err();
        assert!(matches!(err, E2eError::SheetNotFound { ref sheet, .. } if sheet == "Test Cases"));
    }
}
