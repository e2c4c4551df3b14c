//! Target and input extraction from step text.
//!
//! Everything here is pure and total: every function returns a value for any
//! input. Route labels are data ([`RouteTable`]) handed in by the caller.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::classify::{
    CLICK_KEYWORDS, FILL_KEYWORDS, NAVIGATE_KEYWORDS, VERIFY_KEYWORDS, WAIT_KEYWORDS, strip_any,
};
use crate::error::E2eResult;
use crate::features::Feature;

/// Wait used when a wait step names no duration
pub const DEFAULT_WAIT_MS: u64 = 2000;

const QUOTE_CHARS: &[char] = &['"', '\'', '`', '“', '”', '‘', '’', '「', '」', '『', '』', '《', '》'];

/// Chinese "输入/填写 FIELD VALUE"
static FILL_CN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:输入|填写|填入)\s*[：:]?\s*(\S+)\s+(.+)$").expect("valid regex"));

/// Chinese "在 FIELD 中输入 VALUE"
static FILL_IN_FIELD_CN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^在\s*(\S+?)\s*(?:输入框中|输入框里|输入框|框中|中|里)?\s*(?:输入|填写|填入)\s*(.+)$")
        .expect("valid regex")
});

/// English "fill FIELD with VALUE" / "input FIELD VALUE"
static FILL_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:input|fill(?:\s+in)?|type)\s+(?:the\s+)?(\S+)\s+(?:with\s+|as\s+)?(.+)$")
        .expect("valid regex")
});

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Words that may join two verify verbs, as in "验证并确认 X"
const VERB_CONNECTORS: &[&str] = &["并且", "并", "然后", "和", "and", "then"];

/// One label → route pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub label: String,
    pub path: String,
}

/// Ordered label → path lookup used by navigation and verification
///
/// Lookup is first-match in table order, so longer labels that share a
/// prefix with shorter ones must come first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in labels for the course portal the runner was first written for
    pub fn builtin() -> Self {
        Self::new()
            .route("登录页面", "/login")
            .route("登录页", "/login")
            .route("注册页面", "/register")
            .route("注册页", "/register")
            .route("课程列表", "/courses")
            .route("个人中心", "/profile")
            .route("首页", "/")
            .route("login page", "/login")
            .route("course list", "/courses")
            .route("home page", "/")
    }

    pub fn route(mut self, label: impl Into<String>, path: impl Into<String>) -> Self {
        self.entries.push(RouteEntry {
            label: label.into(),
            path: path.into(),
        });
        self
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a table from JSON.
    ///
    /// Accepts `[["label", "/path"], ...]` (order kept) or
    /// `{"label": "/path", ...}` (ordered longest label first).
    pub fn from_json(json: &str) -> E2eResult<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            Pairs(Vec<(String, String)>),
            Map(std::collections::BTreeMap<String, String>),
        }

        let entries = match serde_json::from_str::<Document>(json)? {
            Document::Pairs(pairs) => pairs,
            Document::Map(map) => {
                let mut pairs: Vec<(String, String)> = map.into_iter().collect();
                pairs.sort_by_key(|(label, _)| std::cmp::Reverse(label.chars().count()));
                pairs
            }
        };

        Ok(Self {
            entries: entries
                .into_iter()
                .map(|(label, path)| RouteEntry { label, path })
                .collect(),
        })
    }

    pub fn load(path: &Path) -> E2eResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Path for text that starts with a known label
    pub fn resolve(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| !e.label.is_empty() && text.starts_with(e.label.as_str()))
            .map(|e| e.path.as_str())
    }

    /// Whether `url` is the route of a label mentioned in `target`
    pub fn url_matches(&self, target: &str, url: &str) -> bool {
        let path = url_path(url);
        self.entries
            .iter()
            .filter(|e| !e.label.is_empty() && target.contains(e.label.as_str()))
            .any(|e| route_matches(&path, &e.path))
    }
}

/// A field/value pair to type into the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub field: String,
    pub value: String,
}

/// Navigation or click target named by a step
///
/// Drops one leading verb and all quote marks, then maps a known label to
/// its route. Text with no known label comes back cleaned but otherwise as-is.
pub fn extract_target(step: &str, routes: &RouteTable) -> String {
    let cleaned = clean(strip_leading_verb(step.trim()));
    match routes.resolve(&cleaned) {
        Some(path) => path.to_string(),
        None => cleaned,
    }
}

/// Field and value for a fill step
///
/// Tries the three fill phrasings in order, then the feature's own test data,
/// then a generic `input`/`test` pair.
pub fn extract_input(step: &str, feature: Option<&Feature>) -> InputSpec {
    let text = step.trim();
    for pattern in [&*FILL_CN, &*FILL_IN_FIELD_CN, &*FILL_EN] {
        if let Some(caps) = pattern.captures(text) {
            let field = clean(&caps[1]);
            let value = clean(&caps[2]);
            if !field.is_empty() && !value.is_empty() {
                return InputSpec { field, value };
            }
        }
    }

    if let Some(data) = feature.and_then(|f| f.test_data.as_ref()) {
        return InputSpec {
            field: data.field.clone(),
            value: data.value.clone(),
        };
    }

    InputSpec {
        field: "input".to_string(),
        value: "test".to_string(),
    }
}

/// Text a verify step expects to find, with verify verbs and quotes removed
pub fn verify_target(step: &str) -> String {
    let mut rest = trim_separators(step);
    if let Some(tail) = strip_any(rest, VERIFY_KEYWORDS) {
        rest = trim_separators(tail);
        while let Some(tail) = strip_any(rest, VERB_CONNECTORS)
            .map(trim_separators)
            .and_then(|after| strip_any(after, VERIFY_KEYWORDS))
        {
            rest = trim_separators(tail);
        }
    }
    clean(rest).trim_start_matches([':', '：']).trim().to_string()
}

/// Duration of a wait step: the first integer, read as milliseconds
pub fn wait_duration(step: &str) -> Duration {
    let ms = FIRST_INTEGER
        .find(step)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .unwrap_or(DEFAULT_WAIT_MS);
    Duration::from_millis(ms)
}

/// Absolute URL for a navigation target
pub fn resolve_url(base_url: &str, target: &str) -> String {
    if is_absolute_url(target) {
        return target.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if target.starts_with('/') {
        format!("{}{}", base, target)
    } else {
        format!("{}/{}", base, target)
    }
}

pub fn is_absolute_url(target: &str) -> bool {
    url::Url::parse(target)
        .map(|u| matches!(u.scheme(), "http" | "https" | "file" | "about" | "data"))
        .unwrap_or(false)
}

fn strip_leading_verb(text: &str) -> &str {
    [NAVIGATE_KEYWORDS, CLICK_KEYWORDS, VERIFY_KEYWORDS, FILL_KEYWORDS, WAIT_KEYWORDS]
        .into_iter()
        .find_map(|verbs| strip_any(text, verbs))
        .unwrap_or(text)
}

fn trim_separators(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '：' | ',' | '，'))
}

fn clean(text: &str) -> String {
    text.chars()
        .filter(|c| !QUOTE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn url_path(url: &str) -> String {
    match url::Url::parse(url.trim()) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.trim().to_string(),
    }
}

fn route_matches(path: &str, route: &str) -> bool {
    let route = route.trim_end_matches('/');
    if route.is_empty() {
        return path.is_empty() || path == "/";
    }
    path == route || path.starts_with(&format!("{}/", route))
}
