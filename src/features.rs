//! Read-only feature list loading.
//!
//! The feature list is owned by the project tooling; this crate only reads
//! it. Both a bare array and a `{"features": [...]}` document are accepted,
//! and keys the runner does not care about (priority, category, notes) are
//! ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// Default test data for a fill step whose text names no field/value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    pub field: String,
    pub value: String,
}

/// One feature and its ordered, natural-language test steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Executed in order; text is never modified by the runner
    #[serde(default)]
    pub steps: Vec<String>,

    /// Already accepted; batch runs include only these unless told otherwise
    #[serde(default, alias = "passes")]
    pub accepted: bool,

    #[serde(default)]
    pub test_data: Option<TestData>,
}

impl Feature {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            steps: Vec::new(),
            accepted: false,
            test_data: None,
        }
    }

    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn accepted(mut self, accepted: bool) -> Self {
        self.accepted = accepted;
        self
    }

    pub fn test_data(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.test_data = Some(TestData {
            field: field.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureDocument {
    Wrapped { features: Vec<Feature> },
    Bare(Vec<Feature>),
}

/// Parse a feature list from JSON text
pub fn parse_features(json: &str) -> E2eResult<Vec<Feature>> {
    let document: FeatureDocument = serde_json::from_str(json)?;
    Ok(match document {
        FeatureDocument::Wrapped { features } => features,
        FeatureDocument::Bare(features) => features,
    })
}

/// Load a feature list from a JSON file
pub fn load_features(path: &Path) -> E2eResult<Vec<Feature>> {
    let raw = fs::read_to_string(path)?;
    parse_features(&raw)
}

/// Find a feature by id
pub fn find_feature<'a>(features: &'a [Feature], id: &str) -> E2eResult<&'a Feature> {
    features
        .iter()
        .find(|f| f.id == id)
        .ok_or_else(|| E2eError::FeatureNotFound(id.to_string()))
}
