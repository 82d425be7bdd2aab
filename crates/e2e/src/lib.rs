//! Translator E2E Test Framework
//!
//! This crate provides a Rust-controlled E2E harness for the Singlish to
//! Sinhala translator UI that:
//! - Loads test cases from a spreadsheet sheet
//! - Controls Playwright through a long-lived bridge process speaking JSON lines
//! - Drives the page through a fixed clear/type/wait/read protocol
//! - Writes `Actual Output` and `Status` back into the same workbook
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  load_test_cases(workbook, sheet) -> Vec<TestCase>          │
//! │  TestRunner                                                 │
//! │    ├── run_all(driver, cases) -> TestSuiteResult            │
//! │    ├── run_case(driver, case) -> CaseReport                 │
//! │    │     ├── PageDriver::navigate()                         │
//! │    │     ├── PageDriver::translate(input)                   │
//! │    │     │     clear -> type -> wait-for-output -> read     │
//! │    │     └── ResultWriter::record(tc id, actual, status)    │
//! │    └── write_results(suite) -> test-results.json            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightBridge: BrowserPage                              │
//! │    node + playwright, one page, JSON request/reply lines    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod case;
pub mod config;
pub mod driver;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod workbook;
pub mod writer;

pub use case::{load_test_cases, Status, TestCase};
pub use config::HarnessConfig;
pub use driver::PageDriver;
pub use error::{E2eError, E2eResult};
pub use playwright::{BrowserPage, PlaywrightBridge};
pub use runner::{TestRunner, TestSuiteResult};
pub use writer::{ResultWriter, WriteOutcome};
