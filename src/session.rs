//! Browser session lifecycle and failure artifacts.
//!
//! A session moves `Closed -> Opening -> Open -> Closed`. A failed open is
//! retried exactly once after a forced close (`Opening -> Retrying`). Close
//! is best-effort: its failure is logged and swallowed, since a stuck
//! session from an earlier run must not block the next one.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::BrowserCommand;
use crate::error::{E2eError, E2eResult};
use crate::gateway::BrowserDriver;
use crate::harness::{CommandClass, RunOptions};

/// Lifecycle state of a browser session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    /// Second open attempt after a forced close
    Retrying,
    Open,
}

/// Open/close contract the feature runner relies on
#[async_trait]
pub trait SessionControl: Send {
    /// Open the browser at `url`; retried once internally
    async fn open(&mut self, url: &str) -> E2eResult<()>;

    /// Best-effort close; never fails
    async fn close(&mut self);

    fn state(&self) -> SessionState;
}

/// Session backed by a [`BrowserDriver`]
pub struct BrowserSession<'a> {
    driver: &'a dyn BrowserDriver,
    options: &'a RunOptions,
    state: SessionState,
}

impl<'a> BrowserSession<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, options: &'a RunOptions) -> Self {
        Self {
            driver,
            options,
            state: SessionState::Closed,
        }
    }

    async fn try_open(&self, url: &str) -> Result<(), String> {
        let command = BrowserCommand::Open {
            url: url.to_string(),
            headed: !self.options.headless,
        };
        let outcome = self
            .driver
            .exec(&command, &self.options.command(CommandClass::Open))
            .await;
        if outcome.success {
            Ok(())
        } else {
            Err(outcome.reason())
        }
    }

    async fn force_close(&self) {
        let outcome = self
            .driver
            .exec(&BrowserCommand::Close, &self.options.command(CommandClass::Interact))
            .await;
        if !outcome.success {
            warn!(error = %outcome.reason(), "close failed, ignoring");
        }
    }
}

#[async_trait]
impl SessionControl for BrowserSession<'_> {
    async fn open(&mut self, url: &str) -> E2eResult<()> {
        self.state = SessionState::Opening;
        info!(url, headless = self.options.headless, "opening browser session");

        if let Err(first) = self.try_open(url).await {
            warn!(url, error = %first, "open failed, closing and retrying once");
            self.state = SessionState::Retrying;
            self.force_close().await;
            if let Err(second) = self.try_open(url).await {
                self.state = SessionState::Closed;
                return Err(E2eError::OpenFailure(second));
            }
        }

        self.state = SessionState::Open;
        let settle = self.options.settle.after_open;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.force_close().await;
        self.state = SessionState::Closed;
        info!("browser session closed");
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

/// Screenshot path for a failed feature: `<dir>/<feature-id>-<timestamp>.png`
pub fn artifact_path(output_dir: &Path, feature_id: &str) -> PathBuf {
    let filename = format!(
        "{}-{}.png",
        sanitize_name(feature_id),
        generate_timestamp_suffix()
    );
    output_dir.join(filename)
}

/// Best-effort full-page screenshot; `None` when anything goes wrong
pub async fn capture_screenshot(
    driver: &dyn BrowserDriver,
    options: &RunOptions,
    feature_id: &str,
) -> Option<PathBuf> {
    if let Err(err) = fs::create_dir_all(&options.output_dir) {
        warn!(dir = %options.output_dir.display(), error = %err, "cannot create screenshot directory");
        return None;
    }
    let path = artifact_path(&options.output_dir, feature_id);
    let command = BrowserCommand::Screenshot {
        path: path.clone(),
        full_page: true,
    };
    let outcome = driver
        .exec(&command, &options.command(CommandClass::Read))
        .await;
    if outcome.success {
        info!(path = %path.display(), "saved failure screenshot");
        Some(path)
    } else {
        warn!(error = %outcome.reason(), "screenshot failed, ignoring");
        None
    }
}

/// Generate a timestamp suffix
fn generate_timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
