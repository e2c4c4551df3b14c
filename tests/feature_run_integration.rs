//! Integration tests for feature and batch runs against a scripted browser

use pretty_assertions::assert_eq;
use std::path::Path;

use feature_e2e::config::Config;
use feature_e2e::harness::GENERIC_CHECK_STEP;
use feature_e2e::{
    CommandOutcome, Feature, RunOptions, ScriptedDriver, SettleDelays, StepResult, parse_features,
    run_all, run_feature_test,
};

fn options(dir: &Path) -> RunOptions {
    RunOptions::from_config(&Config::defaults())
        .base_url("http://app.test")
        .settle(SettleDelays::none())
        .output_dir(dir.join("shots"))
}

/// Session opens and closes only, ignoring everything in between
fn lifecycle(driver: &ScriptedDriver) -> Vec<String> {
    driver
        .subcommands()
        .into_iter()
        .filter(|name| name == "open" || name == "close")
        .collect()
}

#[tokio::test]
async fn test_login_flow_passes() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::with_responder(|args, _| match args[0].as_str() {
        "snapshot" => CommandOutcome::ok(r#"{"refs":{"e1":{"name":"课程列表","role":"heading"}}}"#),
        _ => CommandOutcome::ok(""),
    });
    let feature = Feature::new("F001", "学生登录")
        .step("打开 登录页")
        .step("输入学号和密码")
        .step("点击 登录")
        .step("验证 课程列表");

    let result = run_feature_test(&driver, &feature, &options(dir.path())).await;

    assert!(result.passed, "{:?}", result.error);
    assert_eq!(result.steps.len(), 4);
    assert!(result.steps.iter().all(|s| s.passed));
    assert!(result.screenshots.is_empty());

    let calls = driver.calls();
    assert_eq!(calls[0], vec!["open", "http://app.test", "--headed"]);
    assert_eq!(calls[1], vec!["open", "http://app.test/login"]);
    assert_eq!(calls[2], vec!["find", "placeholder", "学号", "fill", "2021000001"]);
    assert_eq!(calls[3], vec!["find", "placeholder", "密码", "fill", "123456"]);
    assert_eq!(calls.last().unwrap(), &vec!["close".to_string()]);
    assert_eq!(driver.count("close"), 1);
}

#[tokio::test]
async fn test_headless_session_has_no_window_flag() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new();
    let feature = Feature::new("F1", "demo").step("打开 首页");

    let result = run_feature_test(&driver, &feature, &options(dir.path()).headless(true)).await;

    assert!(result.passed);
    assert!(driver.calls().iter().all(|args| !args.contains(&"--headed".to_string())));
}

#[tokio::test]
async fn test_zero_steps_reports_single_check() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new();
    let feature = Feature::new("F2", "empty");

    let result = run_feature_test(&driver, &feature, &options(dir.path())).await;

    assert_eq!(result.steps, vec![StepResult::passed(GENERIC_CHECK_STEP)]);
    assert!(result.passed);
    assert_eq!(driver.subcommands(), vec!["open", "snapshot", "close"]);
}

#[tokio::test]
async fn test_failure_stops_at_failing_step() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::with_responder(|args, _| match args[0].as_str() {
        "snapshot" | "get" => CommandOutcome::ok("{}"),
        _ => CommandOutcome::ok(""),
    });
    let feature = Feature::new("F3", "broken")
        .step("打开 登录页")
        .step("验证 欢迎回来")
        .step("点击 退出");

    let result = run_feature_test(&driver, &feature, &options(dir.path())).await;

    assert!(!result.passed);
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps[0].passed);
    assert!(!result.steps[1].passed);
    assert_eq!(
        result.error.as_deref(),
        Some("Step 2 failed: '欢迎回来' not found on page")
    );
    assert_eq!(driver.count("find"), 0);

    // Screenshot is taken before the session closes
    assert_eq!(result.screenshots.len(), 1);
    let shot = &result.screenshots[0];
    assert!(shot.starts_with(dir.path().join("shots")));
    assert!(shot.file_name().unwrap().to_string_lossy().starts_with("F3-"));
    let subcommands = driver.subcommands();
    assert_eq!(&subcommands[subcommands.len() - 2..], ["screenshot", "close"]);
    assert_eq!(driver.count("close"), 1);
}

#[tokio::test]
async fn test_open_is_retried_once() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::with_responder(|args, nth| {
        if args[0] == "open" && nth == 0 {
            CommandOutcome::failed("browser already running")
        } else {
            CommandOutcome::ok("")
        }
    });
    let feature = Feature::new("F4", "retry").step("等待 1");

    let result = run_feature_test(&driver, &feature, &options(dir.path())).await;

    assert!(result.passed);
    assert_eq!(lifecycle(&driver), vec!["open", "close", "open", "close"]);
}

#[tokio::test]
async fn test_open_failure_reports_second_reason() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::with_responder(|args, nth| match (args[0].as_str(), nth) {
        ("open", 0) => CommandOutcome::failed("first"),
        ("open", _) => CommandOutcome::failed("chrome crashed"),
        _ => CommandOutcome::ok(""),
    });
    let feature = Feature::new("F5", "no browser").step("打开 登录页");

    let result = run_feature_test(&driver, &feature, &options(dir.path())).await;

    assert!(!result.passed);
    assert!(result.steps.is_empty());
    assert_eq!(
        result.error.as_deref(),
        Some("failed to open browser session: chrome crashed")
    );
    // One close between the attempts, one at the end of the run
    assert_eq!(lifecycle(&driver), vec!["open", "close", "open", "close"]);
}

#[tokio::test]
async fn test_batch_runs_accepted_features_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let features = parse_features(
        r#"{"features": [
            {"id": "A", "description": "a", "steps": ["等待 1"], "passes": true},
            {"id": "B", "description": "b", "steps": ["等待 1"], "passes": false},
            {"id": "C", "description": "c", "steps": ["等待 1"], "passes": true}
        ]}"#,
    )
    .unwrap();

    let driver = ScriptedDriver::new();
    let batch = run_all(&driver, &features, &options(dir.path())).await;

    let ids: Vec<_> = batch.results.iter().map(|r| r.feature_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "C"]);
    assert_eq!(
        (batch.total, batch.passed, batch.failed, batch.skipped),
        (3, 2, 0, 1)
    );
    assert!(batch.all_passed());
    // Runs never overlap
    assert_eq!(lifecycle(&driver), vec!["open", "close", "open", "close"]);

    let driver = ScriptedDriver::new();
    let batch = run_all(&driver, &features, &options(dir.path()).test_all(true)).await;

    let ids: Vec<_> = batch.results.iter().map(|r| r.feature_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(batch.skipped, 0);
    assert_eq!(driver.count("close"), 3);
}

#[tokio::test]
async fn test_batch_counts_failures() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::with_responder(|args, _| match args[0].as_str() {
        "find" | "click" => CommandOutcome::failed("element not found"),
        _ => CommandOutcome::ok(""),
    });
    let features = vec![
        Feature::new("A", "ok").step("等待 1").accepted(true),
        Feature::new("B", "broken").step("点击 保存").accepted(true),
    ];

    let batch = run_all(&driver, &features, &options(dir.path())).await;

    assert_eq!((batch.passed, batch.failed), (1, 1));
    assert!(!batch.all_passed());
    assert_eq!(
        batch.results[1].error.as_deref(),
        Some("Step 1 failed: could not click '保存': element not found")
    );
    assert_eq!(batch.summary_line(), "2 features: 1 passed, 1 failed, 0 skipped");
}

#[tokio::test]
async fn test_missing_dependency_fails_whole_batch() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new().uninstalled(false);
    let features = vec![
        Feature::new("A", "a").accepted(true),
        Feature::new("B", "b"),
    ];

    let batch = run_all(&driver, &features, &options(dir.path())).await;

    assert_eq!(driver.install_attempts(), 1);
    assert!(driver.calls().is_empty());
    assert!(batch.results.is_empty());
    assert_eq!(batch.failed, 2);
    assert_eq!(batch.error.as_deref(), Some("dependency not installed"));
}

#[tokio::test]
async fn test_dependency_installed_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new().uninstalled(true);
    let features = vec![Feature::new("A", "a").step("等待 1").accepted(true)];

    let batch = run_all(&driver, &features, &options(dir.path())).await;

    assert_eq!(driver.install_attempts(), 1);
    assert_eq!(batch.passed, 1);
}

#[tokio::test]
async fn test_batch_result_serializes_for_reports() {
    let dir = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new();
    let features = vec![Feature::new("A", "a").step("等待 1").accepted(true)];

    let batch = run_all(&driver, &features, &options(dir.path())).await;
    let json = serde_json::to_value(&batch).unwrap();

    assert_eq!(json["total"], 1);
    assert_eq!(json["results"][0]["featureId"], "A");
    assert_eq!(json["results"][0]["steps"][0]["step"], "等待 1");
}
