use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use crate::command::BrowserCommand;
use crate::error::{E2eError, E2eResult};
use crate::features::Feature;
use crate::gateway::BrowserDriver;
use crate::harness::types::{CommandClass, RunOptions};
use crate::runner::{FeatureResult, StepResult};
use crate::session::{BrowserSession, SessionControl, capture_screenshot};
use crate::steps::StepContext;

/// Step text recorded for features that define no steps
pub const GENERIC_CHECK_STEP: &str = "page snapshot check";

/// Make sure the automation binary is usable, installing it once if needed
pub async fn ensure_dependency(driver: &dyn BrowserDriver) -> E2eResult<()> {
    if driver.is_installed().await {
        return Ok(());
    }
    warn!("browser automation binary not found, attempting install");
    if driver.install().await && driver.is_installed().await {
        info!("browser automation binary installed");
        return Ok(());
    }
    Err(E2eError::DependencyMissing)
}

/// Run every step of `feature` against a fresh browser session.
///
/// Never fails: dependency, session and step problems all end up in the
/// returned [`FeatureResult`].
pub async fn run_feature_test(
    driver: &dyn BrowserDriver,
    feature: &Feature,
    options: &RunOptions,
) -> FeatureResult {
    if let Err(err) = ensure_dependency(driver).await {
        error!(feature = %feature.id, error = %err, "cannot run feature");
        return FeatureResult::aborted(feature, err.to_string());
    }
    run_with_new_session(driver, feature, options).await
}

/// Like [`run_feature_test`] for callers that already checked the dependency
pub(crate) async fn run_with_new_session(
    driver: &dyn BrowserDriver,
    feature: &Feature,
    options: &RunOptions,
) -> FeatureResult {
    let mut session = BrowserSession::new(driver, options);
    run_feature_in_session(driver, &mut session, feature, options).await
}

/// Run `feature` inside `session`, closing the session exactly once on every path
pub async fn run_feature_in_session<S>(
    driver: &dyn BrowserDriver,
    session: &mut S,
    feature: &Feature,
    options: &RunOptions,
) -> FeatureResult
where
    S: SessionControl + ?Sized,
{
    info!(feature = %feature.id, steps = feature.steps.len(), "running feature");
    let mut result = FeatureResult::new(feature);
    let mut current: Option<usize> = None;

    let run = AssertUnwindSafe(drive(
        driver,
        &mut *session,
        feature,
        options,
        &mut result,
        &mut current,
    ))
    .catch_unwind()
    .await;

    if let Err(panic) = run {
        let message = panic_message(panic.as_ref());
        error!(feature = %feature.id, %message, "feature run aborted by unexpected fault");
        record_fault(&mut result, feature, current, &message);
        if current.is_some() {
            if let Some(path) = capture_screenshot(driver, options, &feature.id).await {
                result.screenshots.push(path);
            }
        }
    }

    session.close().await;

    if result.passed {
        info!(feature = %feature.id, "feature passed");
    } else {
        warn!(feature = %feature.id, error = ?result.error, "feature failed");
    }
    result
}

async fn drive<S>(
    driver: &dyn BrowserDriver,
    session: &mut S,
    feature: &Feature,
    options: &RunOptions,
    result: &mut FeatureResult,
    current: &mut Option<usize>,
) where
    S: SessionControl + ?Sized,
{
    if let Err(err) = session.open(&options.base_url).await {
        warn!(feature = %feature.id, error = %err, "could not open session");
        result.error = Some(err.to_string());
        return;
    }

    if feature.steps.is_empty() {
        let check = generic_check(driver, options).await;
        result.passed = check.passed;
        if let Some(reason) = &check.error {
            result.error = Some(format!("{} failed: {}", GENERIC_CHECK_STEP, reason));
            if let Some(path) = capture_screenshot(driver, options, &feature.id).await {
                result.screenshots.push(path);
            }
        }
        result.steps.push(check);
        return;
    }

    let ctx = StepContext::new(driver, options, feature);
    for (index, step) in feature.steps.iter().enumerate() {
        *current = Some(index);
        let outcome = ctx.execute(step).await;
        *current = None;

        match outcome {
            Ok(kind) => {
                info!(feature = %feature.id, step = index + 1, %kind, "step passed");
                result.steps.push(StepResult::passed(step.as_str()));
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(feature = %feature.id, step = index + 1, %reason, "step failed");
                result.steps.push(StepResult::failed(step.as_str(), reason.as_str()));
                if let Some(path) = capture_screenshot(driver, options, &feature.id).await {
                    result.screenshots.push(path);
                }
                result.error = Some(format!("Step {} failed: {}", index + 1, reason));
                return;
            }
        }
    }

    result.passed = true;
}

async fn generic_check(driver: &dyn BrowserDriver, options: &RunOptions) -> StepResult {
    let outcome = driver
        .exec(
            &BrowserCommand::Snapshot { interactive: true },
            &options.command(CommandClass::Read),
        )
        .await;
    if outcome.success {
        StepResult::passed(GENERIC_CHECK_STEP)
    } else {
        StepResult::failed(GENERIC_CHECK_STEP, outcome.reason())
    }
}

fn record_fault(result: &mut FeatureResult, feature: &Feature, current: Option<usize>, message: &str) {
    result.passed = false;
    let reason = format!("unexpected fault: {}", message);
    match current.and_then(|index| feature.steps.get(index).map(|step| (index, step))) {
        Some((index, step)) => {
            result.steps.push(StepResult::failed(step.as_str(), reason.as_str()));
            result.error = Some(format!("Step {} failed: {}", index + 1, reason));
        }
        None => result.error = Some(reason),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::{CommandOutcome, ScriptedDriver};
    use crate::harness::SettleDelays;
    use crate::session::SessionState;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Session double that counts lifecycle calls
    struct CountingSession {
        fail_open: bool,
        panic_on_open: bool,
        opens: usize,
        closes: usize,
        state: SessionState,
    }

    impl CountingSession {
        fn new() -> Self {
            Self {
                fail_open: false,
                panic_on_open: false,
                opens: 0,
                closes: 0,
                state: SessionState::Closed,
            }
        }
    }

    #[async_trait]
    impl SessionControl for CountingSession {
        async fn open(&mut self, _url: &str) -> E2eResult<()> {
            self.opens += 1;
            if self.panic_on_open {
                panic!("driver crashed");
            }
            if self.fail_open {
                return Err(E2eError::OpenFailure("browser busy".into()));
            }
            self.state = SessionState::Open;
            Ok(())
        }

        async fn close(&mut self) {
            self.closes += 1;
            self.state = SessionState::Closed;
        }

        fn state(&self) -> SessionState {
            self.state
        }
    }

    fn options(dir: &std::path::Path) -> RunOptions {
        RunOptions::from_config(&Config::defaults())
            .settle(SettleDelays::none())
            .output_dir(dir)
    }

    #[tokio::test]
    async fn test_close_once_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let mut session = CountingSession::new();
        let feature = Feature::new("F1", "demo").step("打开 登录页").step("点击 登录");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert!(result.passed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!((session.opens, session.closes), (1, 1));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_close_once_on_step_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::with_responder(|args, _| match args[0].as_str() {
            "find" | "click" => CommandOutcome::failed("not found"),
            _ => CommandOutcome::ok(""),
        });
        let mut session = CountingSession::new();
        let feature = Feature::new("F1", "demo")
            .step("打开 登录页")
            .step("点击 提交")
            .step("验证 成功");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert!(!result.passed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(
            result.error.as_deref(),
            Some("Step 2 failed: could not click '提交': not found")
        );
        assert_eq!(result.screenshots.len(), 1);
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn test_close_once_on_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let mut session = CountingSession::new();
        session.fail_open = true;
        let feature = Feature::new("F1", "demo").step("打开 登录页");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert!(!result.passed);
        assert!(result.steps.is_empty());
        assert_eq!(
            result.error.as_deref(),
            Some("failed to open browser session: browser busy")
        );
        assert!(driver.calls().is_empty());
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn test_close_once_on_fault_during_open() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let mut session = CountingSession::new();
        session.panic_on_open = true;
        let feature = Feature::new("F1", "demo").step("打开 登录页");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert!(!result.passed);
        assert!(result.steps.is_empty());
        assert_eq!(result.error.as_deref(), Some("unexpected fault: driver crashed"));
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn test_fault_inside_step_becomes_step_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::with_responder(|args, _| {
            if args[0] == "find" {
                panic!("boom");
            }
            CommandOutcome::ok("")
        });
        let mut session = CountingSession::new();
        let feature = Feature::new("F1", "demo")
            .step("打开 登录页")
            .step("点击 提交")
            .step("等待 1");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert!(!result.passed);
        assert_eq!(result.steps.len(), 2);
        assert!(!result.steps[1].passed);
        assert_eq!(
            result.error.as_deref(),
            Some("Step 2 failed: unexpected fault: boom")
        );
        assert_eq!(result.screenshots.len(), 1);
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn test_zero_steps_runs_generic_check() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let mut session = CountingSession::new();
        let feature = Feature::new("F1", "demo");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert_eq!(result.steps, vec![StepResult::passed(GENERIC_CHECK_STEP)]);
        assert!(result.passed);
        assert_eq!(driver.subcommands(), vec!["snapshot"]);
    }

    #[tokio::test]
    async fn test_zero_steps_generic_check_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::with_responder(|args, _| match args[0].as_str() {
            "snapshot" => CommandOutcome::failed("page crashed"),
            _ => CommandOutcome::ok(""),
        });
        let mut session = CountingSession::new();
        let feature = Feature::new("F1", "demo");

        let result = run_feature_in_session(&driver, &mut session, &feature, &options(dir.path())).await;
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.passed, result.steps[0].passed);
        assert!(!result.passed);
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn test_ensure_dependency_installs_once() {
        let driver = ScriptedDriver::new().uninstalled(true);
        ensure_dependency(&driver).await.unwrap();
        assert_eq!(driver.install_attempts(), 1);

        let driver = ScriptedDriver::new().uninstalled(false);
        assert!(matches!(
            ensure_dependency(&driver).await,
            Err(E2eError::DependencyMissing)
        ));
        assert_eq!(driver.install_attempts(), 1);
    }

    #[tokio::test]
    async fn test_missing_dependency_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new().uninstalled(false);
        let feature = Feature::new("F1", "demo").step("打开 登录页");

        let result = run_feature_test(&driver, &feature, &options(dir.path())).await;
        assert!(!result.passed);
        assert_eq!(result.error.as_deref(), Some("dependency not installed"));
        assert!(result.steps.is_empty());
        assert!(driver.calls().is_empty());
    }
}
