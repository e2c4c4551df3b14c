//! Types for feature and batch run results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::features::Feature;

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step text exactly as written in the feature
    pub step: String,

    pub passed: bool,

    /// Failure reason, if the step failed
    pub error: Option<String>,
}

impl StepResult {
    pub fn passed(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            passed: true,
            error: None,
        }
    }

    pub fn failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            passed: false,
            error: Some(error.into()),
        }
    }
}

/// Result of running one feature
///
/// `steps` is a prefix of the feature's steps: execution stops at the first
/// failure. A feature with no steps gets a single synthetic check instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResult {
    pub feature_id: String,

    pub description: String,

    pub steps: Vec<StepResult>,

    pub passed: bool,

    pub error: Option<String>,

    /// Failure screenshots, in capture order
    pub screenshots: Vec<PathBuf>,
}

impl FeatureResult {
    /// Empty, not-yet-passed result for `feature`
    pub fn new(feature: &Feature) -> Self {
        Self {
            feature_id: feature.id.clone(),
            description: feature.description.clone(),
            steps: Vec::new(),
            passed: false,
            error: None,
            screenshots: Vec::new(),
        }
    }

    /// Result for a run that never reached its steps
    pub fn aborted(feature: &Feature, error: impl Into<String>) -> Self {
        let mut result = Self::new(feature);
        result.error = Some(error.into());
        result
    }

    /// Human-readable report lines
    pub fn summary_lines(&self) -> Vec<String> {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut lines = vec![format!("[{}] {} {}", status, self.feature_id, self.description)];
        for (index, step) in self.steps.iter().enumerate() {
            let mark = if step.passed { "ok" } else { "FAILED" };
            let mut line = format!("  {}. {} ... {}", index + 1, step.step, mark);
            if let Some(error) = &step.error {
                line.push_str(&format!(" ({})", error));
            }
            lines.push(line);
        }
        if let Some(error) = &self.error {
            lines.push(format!("  error: {}", error));
        }
        for shot in &self.screenshots {
            lines.push(format!("  screenshot: {}", shot.display()));
        }
        lines
    }
}

/// Aggregate result of a batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Number of features handed to the batch
    pub total: usize,

    pub passed: usize,

    pub failed: usize,

    /// Features left out by the inclusion filter
    pub skipped: usize,

    /// Set when the batch could not run at all
    pub error: Option<String>,

    /// Results of the features that ran, in input order
    pub results: Vec<FeatureResult>,
}

impl BatchResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Count a finished feature run
    pub fn record(&mut self, result: FeatureResult) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} features: {} passed, {} failed, {} skipped",
            self.total, self.passed, self.failed, self.skipped
        )
    }
}
