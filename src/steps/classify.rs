//! Keyword classification of step text.

use serde::{Deserialize, Serialize};

/// Classified intent of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    Verify,
    Login,
    Wait,
    /// Unrecognized; executed as a no-op
    Default,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Navigate => write!(f, "navigate"),
            ActionKind::Click => write!(f, "click"),
            ActionKind::Fill => write!(f, "fill"),
            ActionKind::Verify => write!(f, "verify"),
            ActionKind::Login => write!(f, "login"),
            ActionKind::Wait => write!(f, "wait"),
            ActionKind::Default => write!(f, "default"),
        }
    }
}

pub const NAVIGATE_KEYWORDS: &[&str] = &["打开", "进入", "访问", "跳转", "open", "visit", "navigate", "go to"];
pub const CLICK_KEYWORDS: &[&str] = &["点击", "单击", "click"];
pub const FILL_KEYWORDS: &[&str] = &["输入", "填写", "填入", "input", "fill", "type"];
pub const VERIFY_KEYWORDS: &[&str] = &["验证", "检查", "确认", "verify", "check", "confirm", "assert"];
pub const LOGIN_KEYWORDS: &[&str] = &["登录", "login", "log in", "sign in"];
pub const WAIT_KEYWORDS: &[&str] = &["等待", "wait"];

pub const STUDENT_ID_TOKENS: &[&str] = &["学号", "student id", "student-id"];
pub const PASSWORD_TOKENS: &[&str] = &["密码", "password"];

/// Keyword groups in precedence order; the first group with a hit wins.
///
/// A step such as "点击并验证课程列表" mentions both a click and a verify
/// verb and must classify as [`ActionKind::Click`].
pub const PRECEDENCE: [(ActionKind, &[&str]); 6] = [
    (ActionKind::Navigate, NAVIGATE_KEYWORDS),
    (ActionKind::Click, CLICK_KEYWORDS),
    (ActionKind::Fill, FILL_KEYWORDS),
    (ActionKind::Verify, VERIFY_KEYWORDS),
    (ActionKind::Login, LOGIN_KEYWORDS),
    (ActionKind::Wait, WAIT_KEYWORDS),
];

/// Map a step's text to an [`ActionKind`]. Total: unknown text is `Default`.
pub fn classify(step: &str) -> ActionKind {
    let text = step.to_lowercase();
    PRECEDENCE
        .iter()
        .find(|(_, keywords)| contains_any(&text, keywords))
        .map(|(kind, _)| *kind)
        .unwrap_or(ActionKind::Default)
}

/// A fill step that names both the student-id and the password field
pub fn is_credential_fill(step: &str) -> bool {
    let text = step.to_lowercase();
    contains_any(&text, STUDENT_ID_TOKENS) && contains_any(&text, PASSWORD_TOKENS)
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_keyword(text, k))
}

/// Whether `keyword` occurs in `text` as a word.
///
/// CJK keywords match anywhere. ASCII keywords must not touch another ASCII
/// letter or digit, so "open" does not fire inside "opening".
pub(crate) fn contains_keyword(text: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    text.match_indices(keyword)
        .any(|(start, _)| at_word_edges(text, start, start + keyword.len()))
}

/// `text` without a leading `keyword` (ASCII case-insensitive), word edges as above
pub(crate) fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    if keyword.is_ascii() && !at_word_edges(text, 0, keyword.len()) {
        return None;
    }
    Some(&text[keyword.len()..])
}

/// First keyword that `text` starts with, stripped
pub(crate) fn strip_any<'a>(text: &'a str, keywords: &[&str]) -> Option<&'a str> {
    keywords.iter().find_map(|k| strip_keyword(text, k))
}

fn at_word_edges(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_alphanumeric())
        && !after.is_some_and(|c| c.is_ascii_alphanumeric())
}
