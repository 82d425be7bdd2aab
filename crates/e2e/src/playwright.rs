//! Playwright browser automation
//!
//! A single `node` process runs an embedded Playwright script for the whole
//! run and keeps one page open. Commands go to its stdin and replies come back
//! on stdout, one JSON object per line.

use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{E2eError, E2eResult};

/// One candidate output container as seen by the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPanel {
    /// Raw `textContent`, untrimmed
    pub text: String,

    /// Whether the container holds a raw text-input element
    pub has_text_input: bool,
}

/// The page operations the driver needs
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Load `url` and wait for network idle
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Clear the control with the given accessible name
    async fn clear_input(&self, label: &str) -> E2eResult<()>;

    /// Set the value of the control with the given accessible name
    async fn fill_input(&self, label: &str, value: &str) -> E2eResult<()>;

    /// Every element currently matching `selector`, in document order
    async fn output_panels(&self, selector: &str) -> E2eResult<Vec<OutputPanel>>;
}

/// Commands understood by the bridge script
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeCommand {
    Goto { url: String },
    Clear { label: String },
    Fill { label: String, value: String },
    Panels { selector: String },
    Close,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Playwright browser handle
pub struct PlaywrightBridge {
    child: Mutex<Child>,
    io: Mutex<BridgeIo>,
}

impl PlaywrightBridge {
    /// Launch the browser and wait for the bridge to report ready
    pub async fn launch(config: &BrowserConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        info!(
            "Launching {} (headless: {})",
            config.browser.as_str(),
            config.headless
        );

        let mut child = TokioCommand::new("node")
            .arg("-e")
            .arg(build_script(config))
            .current_dir(&config.node_project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("Failed to spawn node: {}", e)))?;

        let stdin = child.stdin.take().ok_or(E2eError::BridgeClosed)?;
        let stdout = child.stdout.take().ok_or(E2eError::BridgeClosed)?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut io = BridgeIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
        };

        let launch_timeout = Duration::from_millis(config.launch_timeout_ms);
        let ready = tokio::time::timeout(launch_timeout, read_reply(&mut io.stdout, 0))
            .await
            .map_err(|_| E2eError::Timeout("browser launch".to_string()))??;
        ready.into_result()?;

        info!("Browser ready");
        Ok(Self {
            child: Mutex::new(child),
            io: Mutex::new(io),
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Send one command and wait for its reply
    pub async fn request(&self, command: BridgeCommand) -> E2eResult<serde_json::Value> {
        let mut io = self.io.lock().await;
        let id = io.next_id;
        io.next_id += 1;

        let mut line = serde_json::to_string(&Request {
            id,
            command: &command,
        })?;
        line.push('\n');

        debug!("-> bridge #{}: {:?}", id, command);
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        read_reply(&mut io.stdout, id).await?.into_result()
    }

    /// Ask the bridge to close the browser, then make sure the process is gone
    pub async fn close(mut self) -> E2eResult<()> {
        if let Err(e) = self.request(BridgeCommand::Close).await {
            warn!("Bridge did not acknowledge close: {}", e);
        }

        let child = self.child.get_mut();
        let waited = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
        match waited {
            Ok(status) => {
                let status = status?;
                debug!("Bridge exited with {}", status);
            }
            Err(_) => terminate(child).await,
        }
        Ok(())
    }
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!("Stopping bridge (pid: {})", pid);
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    let _ = child.kill().await;
}

impl Reply {
    fn into_result(self) -> E2eResult<serde_json::Value> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(E2eError::Playwright(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Read lines until the reply for `id` arrives; other output is logged
async fn read_reply(stdout: &mut Lines<BufReader<ChildStdout>>, id: u64) -> E2eResult<Reply> {
    while let Some(line) = stdout.next_line().await? {
        match serde_json::from_str::<Reply>(&line) {
            Ok(reply) if reply.id == id => return Ok(reply),
            Ok(reply) => warn!("Ignoring stale bridge reply #{}", reply.id),
            Err(_) => debug!(target: "playwright", "{}", line),
        }
    }
    Err(E2eError::BridgeClosed)
}

#[async_trait]
impl BrowserPage for PlaywrightBridge {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Goto {
            url: url.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn clear_input(&self, label: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Clear {
            label: label.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn fill_input(&self, label: &str, value: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Fill {
            label: label.to_string(),
            value: value.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn output_panels(&self, selector: &str) -> E2eResult<Vec<OutputPanel>> {
        let result = self
            .request(BridgeCommand::Panels {
                selector: selector.to_string(),
            })
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Build the bridge script for the configured browser
pub fn build_script(config: &BrowserConfig) -> String {
    format!(
        r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const readline = require('readline');

(async () => {{
  const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
  let browser;
  try {{
    browser = await {browser}.launch({{ headless: {headless} }});
  }} catch (error) {{
    reply({{ id: 0, ok: false, error: error.message }});
    process.exit(1);
  }}
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  reply({{ id: 0, ok: true, result: null }});

  const rl = readline.createInterface({{ input: process.stdin }});
  for await (const line of rl) {{
    if (!line.trim()) continue;
    const cmd = JSON.parse(line);
    try {{
      let result = null;
      switch (cmd.op) {{
        case 'goto':
          await page.goto(cmd.url);
          await page.waitForLoadState('networkidle');
          break;
        case 'clear':
          await page.getByLabel(cmd.label).clear();
          break;
        case 'fill':
          await page.getByLabel(cmd.label).fill(cmd.value);
          break;
        case 'panels':
          result = await page.$$eval(cmd.selector, (els) => els.map((el) => ({{
            text: el.textContent || '',
            has_text_input: el.querySelector('textarea') !== null,
          }})));
          break;
        case 'close':
          reply({{ id: cmd.id, ok: true, result: null }});
          await browser.close();
          process.exit(0);
        default:
          throw new Error('unknown op: ' + cmd.op);
      }}
      reply({{ id: cmd.id, ok: true, result }});
    }} catch (error) {{
      reply({{ id: cmd.id, ok: false, error: error.message }});
    }}
  }}
  await browser.close();
}})();
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Browser;

    #[test]
    fn test_request_wire_format() {
        let command = BridgeCommand::Fill {
            label: "Input Your Singlish Text Here.".to_string(),
            value: "mama gedara yanawa".to_string(),
        };
        let json = serde_json::to_value(Request {
            id: 7,
            command: &command,
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "op": "fill",
                "label": "Input Your Singlish Text Here.",
                "value": "mama gedara yanawa",
            })
        );

        let close = serde_json::to_value(Request {
            id: 8,
            command: &BridgeCommand::Close,
        })
        .unwrap();
        assert_eq!(close, serde_json::json!({ "id": 8, "op": "close" }));
    }

    #[test]
    fn test_reply_parsing() {
        let ok: Reply = serde_json::from_str(
            r#"{"id":3,"ok":true,"result":[{"text":" මම ","has_text_input":false}]}"#,
        )
        .unwrap();
        let panels: Vec<OutputPanel> = serde_json::from_value(ok.into_result().unwrap()).unwrap();
        assert_eq!(panels[0].text, " මම ");
        assert!(!panels[0].has_text_input);

        let failed: Reply =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"locator not found"}"#).unwrap();
        let err = failed.into_result().unwrap_err();
        assert!(matches!(err, E2eError::Playwright(ref m) if m == "locator not found"));
    }

    #[test]
    fn test_script_uses_configured_browser() {
        let config = BrowserConfig {
            browser: Browser::Webkit,
            headless: false,
            viewport_width: 1920,
            viewport_height: 1080,
            ..Default::default()
        };
        let script = build_script(&config);
        assert!(script.contains("await webkit.launch({ headless: false })"));
        assert!(script.contains("viewport: { width: 1920, height: 1080 }"));
        assert!(script.contains("waitForLoadState('networkidle')"));
    }
}
