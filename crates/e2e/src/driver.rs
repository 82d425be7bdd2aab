//! Page driver for the translator UI
//!
//! One fixed, linear interaction protocol per input:
//!
//! ```text
//! Idle -> Cleared -> Typed -> WaitingForOutput -> OutputRead
//! ```
//!
//! Every wait is either a configured dwell or the bounded output poll. Nothing
//! is retried.

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::{HarnessConfig, TimingConfig};
use crate::error::{E2eError, E2eResult};
use crate::playwright::BrowserPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Cleared,
    Typed,
    WaitingForOutput,
    OutputRead,
}

/// Drives one page through the translate protocol
pub struct PageDriver<P> {
    page: P,
    site_url: String,
    input_label: String,
    output_selector: String,
    timing: TimingConfig,
    state: DriverState,
}

impl<P: BrowserPage> PageDriver<P> {
    pub fn new(page: P, config: &HarnessConfig) -> Self {
        Self {
            page,
            site_url: config.site_url.clone(),
            input_label: config.input_label.clone(),
            output_selector: config.output_selector.clone(),
            timing: config.timing.clone(),
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    /// Load the site, wait for network idle, then dwell
    pub async fn navigate(&mut self) -> E2eResult<()> {
        info!("Navigating to {}", self.site_url);
        self.page.goto(&self.site_url).await?;
        sleep(self.timing.navigate_dwell()).await;
        self.state = DriverState::Idle;
        Ok(())
    }

    pub async fn clear_input(&mut self) -> E2eResult<()> {
        self.page.clear_input(&self.input_label).await?;
        sleep(self.timing.clear_dwell()).await;
        self.state = DriverState::Cleared;
        Ok(())
    }

    /// Set the input value in one go, without simulated keystrokes
    pub async fn type_input(&mut self, text: &str) -> E2eResult<()> {
        debug!("Typing {:?}", text);
        self.page.fill_input(&self.input_label, text).await?;
        self.state = DriverState::Typed;
        Ok(())
    }

    /// Poll until some output container has non-blank text, then let late
    /// content settle. Fails with `OutputTimeout` once the bound is spent.
    pub async fn wait_for_output(&mut self) -> E2eResult<()> {
        self.state = DriverState::WaitingForOutput;
        let deadline = Instant::now() + self.timing.output_timeout();
        let mut polls = 0u32;

        loop {
            polls += 1;
            let panels = self.page.output_panels(&self.output_selector).await?;
            if panels.iter().any(|p| !p.text.trim().is_empty()) {
                debug!("Output appeared after {} poll(s)", polls);
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(E2eError::OutputTimeout {
                    timeout_ms: self.timing.output_timeout_ms,
                });
            }
            sleep(self.timing.poll_interval().min(deadline - now)).await;
        }

        sleep(self.timing.settle_dwell()).await;
        Ok(())
    }

    /// Trimmed text of the first container without a text input, which is the
    /// rendered result rather than the editable source panel
    pub async fn read_output(&mut self) -> E2eResult<Option<String>> {
        let panels = self.page.output_panels(&self.output_selector).await?;
        self.state = DriverState::OutputRead;

        Ok(panels
            .into_iter()
            .find(|p| !p.has_text_input)
            .map(|p| p.text.trim().to_string()))
    }

    /// clear -> type -> wait-for-output -> read-output
    pub async fn translate(&mut self, text: &str) -> E2eResult<Option<String>> {
        self.clear_input().await?;
        self.type_input(text).await?;
        self.wait_for_output().await?;
        self.read_output().await
    }
}
