use std::path::PathBuf;
use std::time::Duration;

use crate::config::{self, Config};
use crate::gateway::CommandOptions;
use crate::steps::RouteTable;

/// Timeout class of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// Session open
    Open,
    /// In-session navigation
    Navigate,
    /// Clicks, fills, close
    Interact,
    /// Snapshot, page text, URL, screenshot
    Read,
}

/// Per-class command timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub open: Duration,
    pub navigate: Duration,
    pub interact: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            open: Duration::from_secs(15),
            navigate: Duration::from_secs(10),
            interact: Duration::from_secs(5),
            read: Duration::from_secs(10),
        }
    }
}

/// Pauses that let the page catch up with the previous action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleDelays {
    /// After the session opens, before the first step
    pub after_open: Duration,
    /// Between consecutive field fills in login shortcuts
    pub between_fields: Duration,
    /// Before collecting evidence for a verify step
    pub before_verify: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_open: Duration::from_millis(2000),
            between_fields: Duration::from_millis(500),
            before_verify: Duration::from_millis(1500),
        }
    }
}

impl SettleDelays {
    /// No pauses at all (scripted drivers, CI against a warm server)
    pub fn none() -> Self {
        Self {
            after_open: Duration::ZERO,
            between_fields: Duration::ZERO,
            before_verify: Duration::ZERO,
        }
    }
}

/// Fixed login fields and values used by credential steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Placeholder of the student-id input
    pub student_id_field: String,
    pub student_id: String,
    /// Placeholder of the password input
    pub password_field: String,
    pub password: String,
    /// Accessible name of the login button
    pub login_button: String,
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            student_id_field: "学号".to_string(),
            student_id: config.login.student_id.clone(),
            password_field: "密码".to_string(),
            password: config.login.password.clone(),
            login_button: "登录".to_string(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::from_config(config::get())
    }
}

/// Options for feature and batch runs
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root for relative navigation targets
    pub base_url: String,

    /// Run the browser without a window
    pub headless: bool,

    /// Uniform per-command timeout; overrides every class in `timeouts`
    pub timeout_ms: Option<u64>,

    /// Directory for failure screenshots
    pub output_dir: PathBuf,

    /// Include features that are not accepted yet in batch runs
    pub test_all: bool,

    /// Label → route table for navigation and URL evidence
    pub routes: RouteTable,

    pub credentials: Credentials,

    pub timeouts: Timeouts,

    pub settle: SettleDelays,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(config::get())
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.run.base_url.clone(),
            headless: config.browser.headless,
            timeout_ms: config.browser.timeout_ms,
            output_dir: PathBuf::from(&config.run.output_dir),
            test_all: false,
            routes: RouteTable::builtin(),
            credentials: Credentials::from_config(config),
            timeouts: Timeouts::default(),
            settle: SettleDelays::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn test_all(mut self, test_all: bool) -> Self {
        self.test_all = test_all;
        self
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn settle(mut self, settle: SettleDelays) -> Self {
        self.settle = settle;
        self
    }

    /// Timeout for a command class, honoring the uniform override
    pub fn timeout_for(&self, class: CommandClass) -> Duration {
        if let Some(ms) = self.timeout_ms {
            return Duration::from_millis(ms);
        }
        match class {
            CommandClass::Open => self.timeouts.open,
            CommandClass::Navigate => self.timeouts.navigate,
            CommandClass::Interact => self.timeouts.interact,
            CommandClass::Read => self.timeouts.read,
        }
    }

    /// Gateway options for a command class
    pub fn command(&self, class: CommandClass) -> CommandOptions {
        CommandOptions::new(self.timeout_for(class))
    }
}
