//! Main test runner that drives every spreadsheet row through the page and
//! records the outcome back into the workbook

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::case::{Status, TestCase};
use crate::config::HarnessConfig;
use crate::driver::PageDriver;
use crate::error::{E2eError, E2eResult};
use crate::playwright::BrowserPage;
use crate::writer::{ResultWriter, WriteOutcome};

/// Result of running a single spreadsheet row
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub tc_id: String,
    pub name: String,
    pub row_index: u32,
    pub status: Status,
    pub expected: String,
    pub actual: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub attachment: Option<PathBuf>,
}

/// Result of running all rows
#[derive(Debug, Clone, Serialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseReport>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Everything known about a case that errored, attached to its report
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub tc_id: String,
    pub name: String,
    pub input_type: String,
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub justification: String,
    pub coverage: String,
}

impl Diagnostic {
    pub fn new(case: &TestCase, actual: &str) -> Self {
        Self {
            tc_id: case.tc_id.clone(),
            name: case.name.clone(),
            input_type: case.input_type.clone(),
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual: actual.to_string(),
            justification: case.justification.clone(),
            coverage: case.coverage.clone(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (label, value) in [
            ("TC ID", &self.tc_id),
            ("Test case name", &self.name),
            ("Input length type", &self.input_type),
            ("Input", &self.input),
            ("Expected output", &self.expected),
            ("Actual output", &self.actual),
            ("Justification", &self.justification),
            ("Coverage", &self.coverage),
        ] {
            let _ = writeln!(out, "{}: {}", label, value);
        }
        out
    }
}

/// Main E2E test runner
pub struct TestRunner {
    writer: Arc<ResultWriter>,

    /// Pause after every case, pass or fail
    between_cases: Duration,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            writer: Arc::new(ResultWriter::new(&config.workbook_path, &config.sheet_name)),
            between_cases: config.timing.between_cases(),
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn writer(&self) -> &ResultWriter {
        &self.writer
    }

    /// Run one case. The result is already in the workbook when this returns,
    /// including when it returns an error.
    pub async fn run_case<P: BrowserPage>(
        &self,
        driver: &mut PageDriver<P>,
        case: &TestCase,
    ) -> E2eResult<CaseReport> {
        let (report, failure) = self.execute_case(driver, case).await;
        verdict(&report, failure)?;
        Ok(report)
    }

    /// Run every case in order
    pub async fn run_all<P: BrowserPage>(
        &self,
        driver: &mut PageDriver<P>,
        cases: &[TestCase],
    ) -> TestSuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(cases.len());
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} test(s)...", cases.len());

        for case in cases {
            let (mut report, failure) = self.execute_case(driver, case).await;

            match verdict(&report, failure) {
                Ok(()) => {
                    passed += 1;
                    info!("✓ {} {} ({} ms)", report.tc_id, report.name, report.duration_ms);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} {} - {}", report.tc_id, report.name, e);
                    report.error = Some(e.to_string());
                }
            }
            results.push(report);

            sleep(self.between_cases).await;
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        TestSuiteResult {
            started_at,
            total: cases.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    async fn execute_case<P: BrowserPage>(
        &self,
        driver: &mut PageDriver<P>,
        case: &TestCase,
    ) -> (CaseReport, Option<E2eError>) {
        let start = Instant::now();
        debug!("Running test: {} (row {})", case.tc_id, case.row_index);

        let outcome = match driver.navigate().await {
            Ok(()) => driver.translate(&case.input).await,
            Err(e) => Err(e),
        };

        let (actual, failure) = match outcome {
            Ok(text) => (text.unwrap_or_default(), None),
            Err(e) => {
                warn!("{} failed while driving the page: {}", case.tc_id, e);
                (String::new(), Some(e))
            }
        };

        let status = match failure {
            Some(_) => Status::Fail,
            None => Status::compare(&actual, &case.expected),
        };
        let attachment = match status {
            Status::Fail => self.attach_diagnostic(case, &actual),
            Status::Pass => None,
        };

        self.record(case, &actual, status).await;

        let report = CaseReport {
            tc_id: case.tc_id.clone(),
            name: case.name.clone(),
            row_index: case.row_index,
            status,
            expected: case.expected.clone(),
            actual,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
            attachment,
        };
        (report, failure)
    }

    /// Store the result in the workbook. The rewrite is blocking file IO, so it
    /// runs on the blocking pool; the case still waits for it to finish.
    async fn record(&self, case: &TestCase, actual: &str, status: Status) -> WriteOutcome {
        let writer = Arc::clone(&self.writer);
        let tc_key = case.tc_key.clone();
        let actual = actual.to_string();

        match tokio::task::spawn_blocking(move || writer.record(&tc_key, &actual, status)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Result writer for {} did not finish: {}", case.tc_id, e);
                WriteOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Write the diagnostic bundle next to the report. Failure to write it is
    /// logged and does not affect the case.
    fn attach_diagnostic(&self, case: &TestCase, actual: &str) -> Option<PathBuf> {
        let diagnostic = Diagnostic::new(case, actual);
        let dir = self.output_dir.join("attachments");
        let path = dir.join(format!("{}.txt", attachment_stem(case)));

        let written = std::fs::create_dir_all(&dir)
            .and_then(|()| std::fs::write(&path, diagnostic.render()));

        match written {
            Ok(()) => {
                debug!("Diagnostic for {} written to {}", case.tc_id, path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write diagnostic for {}: {}", case.tc_id, e);
                None
            }
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Turn a finished case into pass or the error the caller should see
fn verdict(report: &CaseReport, failure: Option<E2eError>) -> E2eResult<()> {
    if let Some(source) = failure {
        return Err(E2eError::CaseAborted {
            tc_id: report.tc_id.clone(),
            source: Box::new(source),
        });
    }
    match report.status {
        Status::Pass => Ok(()),
        Status::Fail => Err(E2eError::ExpectationMismatch {
            tc_id: report.tc_id.clone(),
            expected: report.expected.clone(),
            actual: report.actual.clone(),
        }),
    }
}

/// File name stem for a case's diagnostic. The sheet row keeps cases with
/// equal or equally-sanitized IDs apart.
fn attachment_stem(case: &TestCase) -> String {
    if case.tc_id.is_empty() {
        return format!("row{}", case.row_index);
    }
    let id: String = case
        .tc_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}-row{}", id, case.row_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    fn case(tc_id: &str) -> TestCase {
        TestCase {
            row_index: 9,
            tc_id: tc_id.to_string(),
            tc_key: CellValue::from(tc_id),
            name: "Compound sentence".to_string(),
            input_type: "M".to_string(),
            input: "api passe kathaa karamu".to_string(),
            expected: "අපි පස්සෙ කතා කරමු".to_string(),
            justification: "Spacing kept".to_string(),
            coverage: "Future tense".to_string(),
        }
    }

    #[test]
    fn test_diagnostic_lists_every_field() {
        let rendered = Diagnostic::new(&case("Neg_Fun_0003"), "").render();
        assert!(rendered.starts_with("TC ID: Neg_Fun_0003\n"));
        assert!(rendered.contains("Input: api passe kathaa karamu\n"));
        assert!(rendered.contains("Expected output: අපි පස්සෙ කතා කරමු\n"));
        assert!(rendered.contains("Actual output: \n"));
        assert!(rendered.contains("Coverage: Future tense\n"));
        assert_eq!(rendered.lines().count(), 8);
    }

    #[test]
    fn test_attachment_stem_is_file_safe() {
        assert_eq!(attachment_stem(&case("Pos_Fun_0001")), "Pos_Fun_0001-row9");
        assert_eq!(attachment_stem(&case("a/b c")), "a_b_c-row9");
        assert_eq!(attachment_stem(&case("")), "row9");
    }

    #[test]
    fn test_attachment_stem_separates_rows_with_the_same_id() {
        let mut second = case("a/b");
        second.row_index = 10;
        assert_ne!(attachment_stem(&case("a_b")), attachment_stem(&second));

        let duplicate = TestCase {
            row_index: 10,
            ..case("DUP")
        };
        assert_ne!(attachment_stem(&case("DUP")), attachment_stem(&duplicate));
    }

    #[test]
    fn test_verdict_raises_mismatch_with_both_strings() {
        let report = CaseReport {
            tc_id: "T1".to_string(),
            name: String::new(),
            row_index: 2,
            status: Status::Fail,
            expected: "මම".to_string(),
            actual: "mama".to_string(),
            duration_ms: 0,
            error: None,
            attachment: None,
        };

        let err = verdict(&report, None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("expected 'මම'"));
        assert!(message.contains("got 'mama'"));

        let err = verdict(&report, Some(E2eError::OutputTimeout { timeout_ms: 10 })).unwrap_err();
        assert!(matches!(err, E2eError::CaseAborted { .. }));
    }
}
