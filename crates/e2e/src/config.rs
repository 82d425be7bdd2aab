//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Workbook holding the test cases; results are written back into it
    pub workbook_path: PathBuf,

    /// Sheet inside the workbook
    pub sheet_name: String,

    /// Page under test
    pub site_url: String,

    /// Accessible name of the Singlish input control
    pub input_label: String,

    /// CSS selector matching every candidate output container
    pub output_selector: String,

    /// Directory for the JSON report and diagnostic attachments
    pub output_dir: PathBuf,

    pub browser: BrowserConfig,

    pub timing: TimingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from("test-data/test_cases.xlsx"),
            sheet_name: "Test Cases".to_string(),
            site_url: "https://www.swifttranslator.com/".to_string(),
            input_label: "Input Your Singlish Text Here.".to_string(),
            output_selector: default_output_selector(),
            output_dir: PathBuf::from("test-results"),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

fn default_output_selector() -> String {
    [
        ".card .bg-slate-50",
        "div.whitespace-pre-wrap",
        "div.w-full.h-80.p-3.rounded-lg.ring-1.ring-slate-300",
    ]
    .join(", ")
}

impl HarnessConfig {
    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.sheet_name.is_empty() {
            return Err(E2eError::Config("sheet_name must not be empty".into()));
        }
        if self.output_selector.trim().is_empty() {
            return Err(E2eError::Config("output_selector must not be empty".into()));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(E2eError::Config("timing.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for the Playwright bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Directory whose node_modules provides `playwright`
    pub node_project_dir: PathBuf,

    /// How long to wait for the browser to report ready
    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_project_dir: PathBuf::from("."),
            launch_timeout_ms: 30_000,
        }
    }
}

/// Dwell times and the output poll bound, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub navigate_dwell_ms: u64,
    pub clear_dwell_ms: u64,
    pub settle_dwell_ms: u64,
    pub between_cases_ms: u64,
    pub output_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigate_dwell_ms: 1000,
            clear_dwell_ms: 500,
            settle_dwell_ms: 2000,
            between_cases_ms: 1000,
            output_timeout_ms: 10_000,
            poll_interval_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn navigate_dwell(&self) -> Duration {
        Duration::from_millis(self.navigate_dwell_ms)
    }

    pub fn clear_dwell(&self) -> Duration {
        Duration::from_millis(self.clear_dwell_ms)
    }

    pub fn settle_dwell(&self) -> Duration {
        Duration::from_millis(self.settle_dwell_ms)
    }

    pub fn between_cases(&self) -> Duration {
        Duration::from_millis(self.between_cases_ms)
    }

    pub fn output_timeout(&self) -> Duration {
        Duration::from_millis(self.output_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
