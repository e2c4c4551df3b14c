//! Per-kind action strategies.
//!
//! Each action is an ordered list of candidate commands tried until one
//! succeeds. A candidate's timeout only fails that candidate; the next one
//! still runs. The action fails when every candidate has failed.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::classify::{ActionKind, classify, is_credential_fill};
use super::extract::{extract_input, extract_target, resolve_url, verify_target, wait_duration};
use crate::command::{BrowserCommand, css_string};
use crate::error::{E2eError, E2eResult};
use crate::features::Feature;
use crate::gateway::{BrowserDriver, CommandOptions};
use crate::harness::{CommandClass, RunOptions};

/// Everything a step needs to run
pub struct StepContext<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub options: &'a RunOptions,
    pub feature: &'a Feature,
}

/// Where a verify step found its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    Snapshot,
    PageText,
    Url,
}

impl<'a> StepContext<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, options: &'a RunOptions, feature: &'a Feature) -> Self {
        Self {
            driver,
            options,
            feature,
        }
    }

    /// Classify and execute one step
    pub async fn execute(&self, step: &str) -> E2eResult<ActionKind> {
        let kind = classify(step);
        debug!(feature = %self.feature.id, step, %kind, "executing step");
        match kind {
            ActionKind::Navigate => self.navigate(step).await?,
            ActionKind::Click => self.click(step).await?,
            ActionKind::Fill if is_credential_fill(step) => self.fill_credentials().await?,
            ActionKind::Fill => self.fill(step).await?,
            ActionKind::Verify => {
                self.verify(step).await?;
            }
            ActionKind::Login => self.login().await?,
            ActionKind::Wait => {
                let duration = wait_duration(step);
                settle(duration).await;
            }
            ActionKind::Default => {
                info!(feature = %self.feature.id, step, "no action matches step, treating as no-op");
            }
        }
        Ok(kind)
    }

    pub async fn navigate(&self, step: &str) -> E2eResult<()> {
        let target = extract_target(step, &self.options.routes);
        let url = resolve_url(&self.options.base_url, &target);
        let command = BrowserCommand::Open {
            url: url.clone(),
            headed: false,
        };
        let outcome = self
            .driver
            .exec(&command, &self.options.command(CommandClass::Navigate))
            .await;
        if outcome.success {
            Ok(())
        } else {
            Err(E2eError::step(format!("failed to open {}: {}", url, outcome.reason())))
        }
    }

    pub async fn click(&self, step: &str) -> E2eResult<()> {
        let target = extract_target(step, &self.options.routes);
        let candidates = [
            BrowserCommand::ClickButton {
                name: target.clone(),
            },
            BrowserCommand::ClickText {
                text: target.clone(),
            },
            BrowserCommand::Click {
                selector: format!("text={}", target),
            },
        ];
        first_success(self.driver, &candidates, &self.options.command(CommandClass::Interact))
            .await
            .map_err(|reason| E2eError::step(format!("could not click '{}': {}", target, reason)))
    }

    pub async fn fill(&self, step: &str) -> E2eResult<()> {
        let input = extract_input(step, Some(self.feature));
        let candidates = [
            BrowserCommand::FillByPlaceholder {
                placeholder: input.field.clone(),
                value: input.value.clone(),
            },
            BrowserCommand::Fill {
                selector: format!("[placeholder*={}]", css_string(&input.field)),
                value: input.value.clone(),
            },
        ];
        first_success(self.driver, &candidates, &self.options.command(CommandClass::Interact))
            .await
            .map_err(|reason| E2eError::step(format!("could not fill '{}': {}", input.field, reason)))
    }

    /// Student-id then password, both must succeed
    pub async fn fill_credentials(&self) -> E2eResult<()> {
        let creds = &self.options.credentials;
        self.fill_placeholder(&creds.student_id_field, &creds.student_id)
            .await
            .map_err(|reason| {
                E2eError::step(format!("could not fill '{}': {}", creds.student_id_field, reason))
            })?;
        settle(self.options.settle.between_fields).await;
        self.fill_placeholder(&creds.password_field, &creds.password)
            .await
            .map_err(|reason| {
                E2eError::step(format!("could not fill '{}': {}", creds.password_field, reason))
            })
    }

    /// Fill both credential fields, then press the login button.
    ///
    /// Only the button click decides the outcome; a fill that fails is logged
    /// and the click still happens, since the form may be prefilled.
    pub async fn login(&self) -> E2eResult<()> {
        let creds = &self.options.credentials;
        if let Err(reason) = self
            .fill_placeholder(&creds.student_id_field, &creds.student_id)
            .await
        {
            warn!(field = %creds.student_id_field, %reason, "login fill failed");
        }
        settle(self.options.settle.between_fields).await;
        if let Err(reason) = self
            .fill_placeholder(&creds.password_field, &creds.password)
            .await
        {
            warn!(field = %creds.password_field, %reason, "login fill failed");
        }
        settle(self.options.settle.between_fields).await;

        let click = BrowserCommand::ClickButton {
            name: creds.login_button.clone(),
        };
        let outcome = self
            .driver
            .exec(&click, &self.options.command(CommandClass::Interact))
            .await;
        if outcome.success {
            Ok(())
        } else {
            Err(E2eError::step(format!(
                "could not click '{}': {}",
                creds.login_button,
                outcome.reason()
            )))
        }
    }

    /// Look for the step's target in the snapshot, the page text and the URL
    pub async fn verify(&self, step: &str) -> E2eResult<Evidence> {
        settle(self.options.settle.before_verify).await;
        let target = verify_target(step);
        let read = self.options.command(CommandClass::Read);

        if self.snapshot_contains(&target, &read).await {
            return Ok(Evidence::Snapshot);
        }
        if self.page_text_contains(&target, &read).await {
            return Ok(Evidence::PageText);
        }
        if self.url_matches(&target, &read).await {
            return Ok(Evidence::Url);
        }
        Err(E2eError::step(format!("'{}' not found on page", target)))
    }

    async fn fill_placeholder(&self, placeholder: &str, value: &str) -> Result<(), String> {
        let command = BrowserCommand::FillByPlaceholder {
            placeholder: placeholder.to_string(),
            value: value.to_string(),
        };
        let outcome = self
            .driver
            .exec(&command, &self.options.command(CommandClass::Interact))
            .await;
        if outcome.success {
            Ok(())
        } else {
            Err(outcome.reason())
        }
    }

    async fn snapshot_contains(&self, target: &str, opts: &CommandOptions) -> bool {
        let outcome = self
            .driver
            .exec(&BrowserCommand::Snapshot { interactive: true }, opts)
            .await;
        if !outcome.success {
            return false;
        }
        // Unparseable snapshots count as no evidence.
        match serde_json::from_str::<serde_json::Value>(&outcome.output) {
            Ok(value) => value.to_string().contains(target),
            Err(err) => {
                debug!(error = %err, "snapshot output is not JSON");
                false
            }
        }
    }

    async fn page_text_contains(&self, target: &str, opts: &CommandOptions) -> bool {
        let outcome = self.driver.exec(&BrowserCommand::BodyText, opts).await;
        outcome.success && outcome.output.contains(target)
    }

    async fn url_matches(&self, target: &str, opts: &CommandOptions) -> bool {
        let outcome = self.driver.exec(&BrowserCommand::CurrentUrl, opts).await;
        outcome.success && self.options.routes.url_matches(target, outcome.output.trim())
    }
}

/// Run candidates in order until one succeeds; the error is the last failure
async fn first_success(
    driver: &dyn BrowserDriver,
    candidates: &[BrowserCommand],
    opts: &CommandOptions,
) -> Result<(), String> {
    let mut last = String::from("no candidate operations");
    for command in candidates {
        let outcome = driver.exec(command, opts).await;
        if outcome.success {
            return Ok(());
        }
        debug!(command = ?command, error = %outcome.reason(), "candidate failed, trying next");
        last = outcome.reason();
    }
    Err(last)
}

async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
