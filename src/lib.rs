//! Feature E2E - natural-language feature steps driven through agent-browser.
//!
//! This crate provides:
//! - A process gateway for the `agent-browser` CLI with per-command timeouts
//! - A browser session controller with one open retry and guaranteed close
//! - Keyword classification of free-text steps and target/input extraction
//! - Fallback strategies per action kind (navigate, click, fill, verify, login, wait)
//! - Feature and batch runners that report structured results
//!
//! # Example
//!
//! ```rust,no_run
//! use feature_e2e::{Feature, ProcessGateway, RunOptions, run_feature_test};
//!
//! # async fn demo() {
//! let feature = Feature::new("F001", "login")
//!     .step("打开 登录页")
//!     .step("登录")
//!     .step("验证 课程列表");
//! let driver = ProcessGateway::default();
//! let result = run_feature_test(&driver, &feature, &RunOptions::default()).await;
//! println!("{}", result.summary_lines().join("\n"));
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod features;
pub mod gateway;
pub mod harness;
pub mod runner;
pub mod session;
pub mod steps;

// Re-export error types
pub use error::{E2eError, E2eResult};

// Re-export feature source
pub use features::{Feature, TestData, find_feature, load_features, parse_features};

// Re-export gateway types
pub use command::BrowserCommand;
pub use gateway::{BrowserDriver, CommandOptions, CommandOutcome, ProcessGateway, ScriptedDriver};

// Re-export session management
pub use session::{BrowserSession, SessionControl, SessionState, artifact_path, capture_screenshot};

// Re-export step handling
pub use steps::{ActionKind, InputSpec, RouteTable, classify, extract_input, extract_target};

// Re-export runners and results
pub use harness::{RunOptions, SettleDelays, ensure_dependency, run_all, run_feature_test};
pub use runner::{BatchResult, FeatureResult, StepResult};
