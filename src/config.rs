//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for feature runs, supporting:
//! - Environment variables for all configurable values
//! - Defaults that keep a bare `feature-e2e run` pointed at a local dev server
//! - Builder pattern on [`RunOptions`](crate::harness::RunOptions) for programmatic use
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FEATURE_E2E_BASE_URL` | Root for relative navigation targets | `http://localhost:3000` |
//! | `FEATURE_E2E_HEADLESS` | Hide the browser window | `false` |
//! | `FEATURE_E2E_TIMEOUT_MS` | Uniform per-command timeout override | unset |
//! | `FEATURE_E2E_OUTPUT_DIR` | Directory for failure screenshots | `./e2e-screenshots` |
//! | `FEATURE_E2E_BROWSER_BIN` | Automation binary | `agent-browser` |
//! | `FEATURE_E2E_STUDENT_ID` | Value typed into the student-id field | `2021000001` |
//! | `FEATURE_E2E_PASSWORD` | Value typed into the password field | `123456` |
//!
//! # Example
//!
//! ```bash
//! export FEATURE_E2E_BASE_URL="http://127.0.0.1:5173"
//! export FEATURE_E2E_HEADLESS=1
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default root for relative navigation targets
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Sessions are visible by default so a human can watch
pub const DEFAULT_HEADLESS: bool = false;

/// Default directory for failure screenshots
pub const DEFAULT_OUTPUT_DIR: &str = "./e2e-screenshots";

/// Default automation binary
pub const DEFAULT_BROWSER_BIN: &str = "agent-browser";

/// Default value for the student-id login field
pub const DEFAULT_STUDENT_ID: &str = "2021000001";

/// Default value for the password login field
pub const DEFAULT_PASSWORD: &str = "123456";

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_BASE_URL: &str = "FEATURE_E2E_BASE_URL";
pub const ENV_HEADLESS: &str = "FEATURE_E2E_HEADLESS";
pub const ENV_TIMEOUT_MS: &str = "FEATURE_E2E_TIMEOUT_MS";
pub const ENV_OUTPUT_DIR: &str = "FEATURE_E2E_OUTPUT_DIR";
pub const ENV_BROWSER_BIN: &str = "FEATURE_E2E_BROWSER_BIN";
pub const ENV_STUDENT_ID: &str = "FEATURE_E2E_STUDENT_ID";
pub const ENV_PASSWORD: &str = "FEATURE_E2E_PASSWORD";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub browser: BrowserSettings,
    pub run: RunSettings,
    pub login: LoginSettings,
}

/// Automation binary settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Binary name or path
    pub binary: String,
    /// Run without a visible window
    pub headless: bool,
    /// Uniform per-command timeout override (milliseconds)
    pub timeout_ms: Option<u64>,
}

/// Run-level settings
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_url: String,
    pub output_dir: String,
}

/// Fixed credentials used by login steps
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub student_id: String,
    pub password: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            browser: BrowserSettings::from_env(),
            run: RunSettings::from_env(),
            login: LoginSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            browser: BrowserSettings::defaults(),
            run: RunSettings::defaults(),
            login: LoginSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BrowserSettings {
    pub fn from_env() -> Self {
        Self {
            binary: env::var(ENV_BROWSER_BIN).unwrap_or_else(|_| DEFAULT_BROWSER_BIN.to_string()),
            headless: env::var(ENV_HEADLESS)
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(DEFAULT_HEADLESS),
            timeout_ms: env::var(ENV_TIMEOUT_MS)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|ms| *ms > 0),
        }
    }

    pub fn defaults() -> Self {
        Self {
            binary: DEFAULT_BROWSER_BIN.to_string(),
            headless: DEFAULT_HEADLESS,
            timeout_ms: None,
        }
    }
}

impl RunSettings {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            output_dir: env::var(ENV_OUTPUT_DIR).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

impl LoginSettings {
    pub fn from_env() -> Self {
        Self {
            student_id: env::var(ENV_STUDENT_ID).unwrap_or_else(|_| DEFAULT_STUDENT_ID.to_string()),
            password: env::var(ENV_PASSWORD).unwrap_or_else(|_| DEFAULT_PASSWORD.to_string()),
        }
    }

    pub fn defaults() -> Self {
        Self {
            student_id: DEFAULT_STUDENT_ID.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a boolean flag value: 1/true/yes/on and 0/false/no/off
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get the automation binary (convenience function)
pub fn browser_binary() -> String {
    get().browser.binary.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.run.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.run.output_dir, DEFAULT_OUTPUT_DIR);
        assert_eq!(config.browser.binary, DEFAULT_BROWSER_BIN);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.timeout_ms, None);
        assert_eq!(config.login.student_id, DEFAULT_STUDENT_ID);
    }
}
