//! Error types for E2E testing

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Sheet '{sheet}' not found in {}", path.display())]
    SheetNotFound { sheet: String, path: PathBuf },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Only ever logged by the result writer, never returned to the runner.
    #[error("No row with TC ID {0}")]
    WriteTargetNotFound(String),

    #[error("No output appeared within {timeout_ms} ms")]
    OutputTimeout { timeout_ms: u64 },

    #[error("{tc_id}: expected '{expected}' but got '{actual}'")]
    ExpectationMismatch {
        tc_id: String,
        expected: String,
        actual: String,
    },

    #[error("{tc_id} aborted: {source}")]
    CaseAborted {
        tc_id: String,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Playwright bridge exited unexpectedly")]
    BridgeClosed,

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Workbook read error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

pub type E2eResult<T> = Result<T, E2eError>;
