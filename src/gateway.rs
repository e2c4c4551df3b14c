//! Process gateway for the external browser-automation binary.
//!
//! Runs one command at a time with:
//! - A per-call timeout, after which the child is killed
//! - Partial stdout kept when the call times out
//! - Normal failures (non-zero exit, timeout, missing binary) reported as data
//!
//! The [`BrowserDriver`] trait is the seam the session controller and the
//! step actions are written against. [`ProcessGateway`] is the real
//! implementation; [`ScriptedDriver`] is a recording double for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::BrowserCommand;
use crate::config;

/// How long to wait for the output pipes to drain once the child is gone
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Upper bound for the one-time install attempt
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for a single gateway call
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Keep the child's output off the parent console
    pub silent: bool,
    /// Kill the child after this long
    pub timeout: Duration,
    /// Extra environment variables for the child
    pub env: HashMap<String, String>,
}

impl CommandOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            silent: true,
            timeout,
            env: HashMap::new(),
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Normalized outcome of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    /// Captured standard output (possibly partial)
    pub output: String,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Human-readable failure reason
    pub fn reason(&self) -> String {
        match &self.error {
            Some(error) if !error.is_empty() => error.clone(),
            _ if self.success => "ok".to_string(),
            _ => "command failed".to_string(),
        }
    }
}

/// Executes automation commands on behalf of the session and step actions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Run the binary with a structured argument list
    async fn run(&self, args: &[String], opts: &CommandOptions) -> CommandOutcome;

    /// Whether the binary can be invoked at all
    async fn is_installed(&self) -> bool;

    /// One best-effort install attempt; returns whether it reported success
    async fn install(&self) -> bool;

    /// Run a typed subcommand; refuses step text that would read as an option
    async fn exec(&self, command: &BrowserCommand, opts: &CommandOptions) -> CommandOutcome {
        if let Some(arg) = command.option_like_argument() {
            warn!(command = command.name(), arg, "refusing argument that starts with '-'");
            return CommandOutcome::failed(format!("refusing argument that looks like an option: {}", arg));
        }
        self.run(&command.to_args(), opts).await
    }
}

/// Real gateway that spawns the automation binary
#[derive(Debug, Clone)]
pub struct ProcessGateway {
    binary: String,
}

impl Default for ProcessGateway {
    fn default() -> Self {
        Self::new(config::get().browser.binary.clone())
    }
}

impl ProcessGateway {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl BrowserDriver for ProcessGateway {
    async fn run(&self, args: &[String], opts: &CommandOptions) -> CommandOutcome {
        debug!(binary = %self.binary, args = ?args, timeout_ms = opts.timeout.as_millis() as u64, "running command");
        let outcome = run_program(&self.binary, args, opts).await;
        if !outcome.success {
            debug!(binary = %self.binary, args = ?args, error = %outcome.reason(), "command failed");
        }
        outcome
    }

    async fn is_installed(&self) -> bool {
        let opts = CommandOptions::new(Duration::from_secs(10));
        run_program(&self.binary, &["--version".to_string()], &opts)
            .await
            .success
    }

    async fn install(&self) -> bool {
        info!(binary = %self.binary, "attempting to install browser automation dependency");
        let opts = CommandOptions::new(INSTALL_TIMEOUT).silent(false);
        let npm_args: Vec<String> = ["install", "-g", "agent-browser"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let npm = run_program("npm", &npm_args, &opts).await;
        if !npm.success {
            warn!(error = %npm.reason(), "npm install failed");
            return false;
        }

        // Downloads the bundled browser; a failure here is not fatal yet.
        let browser = run_program(&self.binary, &["install".to_string()], &opts).await;
        if !browser.success {
            warn!(error = %browser.reason(), "browser download failed");
        }
        true
    }
}

/// Spawn `program` with `args`, enforcing the timeout and normalizing the outcome
async fn run_program(program: &str, args: &[String], opts: &CommandOptions) -> CommandOutcome {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(&opts.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return CommandOutcome::failed(format!("{} not found", program));
        }
        Err(err) => {
            return CommandOutcome::failed(format!("failed to spawn {}: {}", program, err));
        }
    };

    let stdout_task = drain(child.stdout.take());
    let stderr_task = drain(child.stderr.take());

    let status = match tokio::time::timeout(opts.timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(err)) => Err(format!("failed to wait for {}: {}", program, err)),
        Err(_) => {
            let _ = child.kill().await;
            Err(format!(
                "{} timed out after {}ms",
                program,
                opts.timeout.as_millis()
            ))
        }
    };

    let stdout = collect(stdout_task).await;
    let stderr = collect(stderr_task).await;

    if !opts.silent {
        if !stdout.is_empty() {
            print!("{}", stdout);
        }
        if !stderr.is_empty() {
            eprint!("{}", stderr);
        }
    }

    match status {
        Ok(status) if status.success() => CommandOutcome {
            success: true,
            output: stdout,
            error: None,
        },
        Ok(status) => {
            let detail = stderr.trim();
            let error = if detail.is_empty() {
                match status.code() {
                    Some(code) => format!("{} exited with status {}", program, code),
                    None => format!("{} terminated by signal", program),
                }
            } else {
                detail.to_string()
            };
            CommandOutcome {
                success: false,
                output: stdout,
                error: Some(error),
            }
        }
        Err(error) => CommandOutcome {
            success: false,
            output: stdout,
            error: Some(error),
        },
    }
}

/// Output captured by a background reader; readable even if the reader never finishes
struct PipeCapture {
    task: JoinHandle<()>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

fn drain<R>(reader: Option<R>) -> PipeCapture
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);
    let task = tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(&chunk[..n]),
            }
        }
    });
    PipeCapture { task, buffer }
}

async fn collect(capture: PipeCapture) -> String {
    // A grandchild may inherit the pipe and keep it open; take what arrived.
    let mut task = capture.task;
    if tokio::time::timeout(PIPE_DRAIN_GRACE, &mut task).await.is_err() {
        task.abort();
    }
    let bytes = capture
        .buffer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}

type Responder = dyn Fn(&[String], usize) -> CommandOutcome + Send + Sync;

/// A recording driver for tests
///
/// Every call is logged. Outcomes come from a responder closure that receives
/// the argv and how many times that subcommand was invoked before (0 for the
/// first call), so tests can script "fail first, then succeed" sequences.
pub struct ScriptedDriver {
    responder: Box<Responder>,
    calls: Mutex<Vec<Vec<String>>>,
    installed: AtomicBool,
    installable: bool,
    install_attempts: AtomicUsize,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDriver {
    /// Every command succeeds with empty output
    pub fn new() -> Self {
        Self::with_responder(|_, _| CommandOutcome::ok(""))
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[String], usize) -> CommandOutcome + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            installed: AtomicBool::new(true),
            installable: false,
            install_attempts: AtomicUsize::new(0),
        }
    }

    /// Start out uninstalled; `installable` decides whether `install` fixes it
    pub fn uninstalled(mut self, installable: bool) -> Self {
        self.installed = AtomicBool::new(false);
        self.installable = installable;
        self
    }

    /// All recorded argv vectors, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded subcommand names, in call order
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|args| args.first().cloned().unwrap_or_default())
            .collect()
    }

    /// Number of calls to the given subcommand
    pub fn count(&self, subcommand: &str) -> usize {
        self.subcommands()
            .iter()
            .filter(|name| name.as_str() == subcommand)
            .count()
    }

    pub fn install_attempts(&self) -> usize {
        self.install_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn run(&self, args: &[String], _opts: &CommandOptions) -> CommandOutcome {
        let nth = {
            let mut calls = self
                .calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let name = args.first();
            let nth = calls.iter().filter(|c| c.first() == name).count();
            calls.push(args.to_vec());
            nth
        };
        (self.responder)(args, nth)
    }

    async fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    async fn install(&self) -> bool {
        self.install_attempts.fetch_add(1, Ordering::SeqCst);
        if self.installable {
            self.installed.store(true, Ordering::SeqCst);
        }
        self.installable
    }
}
