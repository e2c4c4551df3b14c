//! Structured agent-browser subcommands.
//!
//! Every call the crate makes to the automation binary is built from a
//! [`BrowserCommand`], which renders to an argv vector. Nothing is ever
//! joined into a shell string, so text lifted from step descriptions is
//! passed through verbatim as a single argument.

use std::path::PathBuf;

/// One agent-browser invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand {
    /// `open <url> [--headed]`
    Open { url: String, headed: bool },
    /// `close`
    Close,
    /// `screenshot <path> [--full]`
    Screenshot { path: PathBuf, full_page: bool },
    /// `snapshot [-i] --json`
    Snapshot { interactive: bool },
    /// `get text body`
    BodyText,
    /// `url`
    CurrentUrl,
    /// `find placeholder <text> fill <value>`
    FillByPlaceholder { placeholder: String, value: String },
    /// `find role button click --name <name>`
    ClickButton { name: String },
    /// `find text <text> click`
    ClickText { text: String },
    /// `click <selector>`
    Click { selector: String },
    /// `fill <selector> <value>`
    Fill { selector: String, value: String },
}

impl BrowserCommand {
    /// Subcommand name, used for logging and by test doubles
    pub fn name(&self) -> &'static str {
        match self {
            BrowserCommand::Open { .. } => "open",
            BrowserCommand::Close => "close",
            BrowserCommand::Screenshot { .. } => "screenshot",
            BrowserCommand::Snapshot { .. } => "snapshot",
            BrowserCommand::BodyText => "get",
            BrowserCommand::CurrentUrl => "url",
            BrowserCommand::FillByPlaceholder { .. }
            | BrowserCommand::ClickButton { .. }
            | BrowserCommand::ClickText { .. } => "find",
            BrowserCommand::Click { .. } => "click",
            BrowserCommand::Fill { .. } => "fill",
        }
    }

    /// Render to the argument vector passed to the binary
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![self.name().to_string()];
        match self {
            BrowserCommand::Open { url, headed } => {
                args.push(url.clone());
                if *headed {
                    args.push("--headed".to_string());
                }
            }
            BrowserCommand::Close | BrowserCommand::CurrentUrl => {}
            BrowserCommand::Screenshot { path, full_page } => {
                args.push(path.to_string_lossy().into_owned());
                if *full_page {
                    args.push("--full".to_string());
                }
            }
            BrowserCommand::Snapshot { interactive } => {
                if *interactive {
                    args.push("-i".to_string());
                }
                args.push("--json".to_string());
            }
            BrowserCommand::BodyText => {
                args.extend(["text", "body"].map(String::from));
            }
            BrowserCommand::FillByPlaceholder { placeholder, value } => {
                args.extend([
                    "placeholder".to_string(),
                    placeholder.clone(),
                    "fill".to_string(),
                    value.clone(),
                ]);
            }
            BrowserCommand::ClickButton { name } => {
                args.extend([
                    "role".to_string(),
                    "button".to_string(),
                    "click".to_string(),
                    "--name".to_string(),
                    name.clone(),
                ]);
            }
            BrowserCommand::ClickText { text } => {
                args.extend(["text".to_string(), text.clone(), "click".to_string()]);
            }
            BrowserCommand::Click { selector } => args.push(selector.clone()),
            BrowserCommand::Fill { selector, value } => {
                args.push(selector.clone());
                args.push(value.clone());
            }
        }
        args
    }

    /// First caller-supplied argument starting with `-`, if any.
    ///
    /// Such text would reach the binary as a positional argument that its
    /// parser could take for a flag.
    pub fn option_like_argument(&self) -> Option<&str> {
        let supplied: Vec<&str> = match self {
            BrowserCommand::Open { url, .. } => vec![url.as_str()],
            BrowserCommand::FillByPlaceholder { placeholder, value } => {
                vec![placeholder.as_str(), value.as_str()]
            }
            BrowserCommand::ClickButton { name } => vec![name.as_str()],
            BrowserCommand::ClickText { text } => vec![text.as_str()],
            BrowserCommand::Click { selector } => vec![selector.as_str()],
            BrowserCommand::Fill { selector, value } => vec![selector.as_str(), value.as_str()],
            BrowserCommand::Close
            | BrowserCommand::Screenshot { .. }
            | BrowserCommand::Snapshot { .. }
            | BrowserCommand::BodyText
            | BrowserCommand::CurrentUrl => Vec::new(),
        };
        supplied.into_iter().find(|arg| arg.starts_with('-'))
    }
}

/// Quote a value for use inside a double-quoted CSS attribute selector
pub fn css_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_args() {
        let cmd = BrowserCommand::Open {
            url: "http://localhost:3000".into(),
            headed: true,
        };
        assert_eq!(cmd.to_args(), vec!["open", "http://localhost:3000", "--headed"]);

        let headless = BrowserCommand::Open {
            url: "http://localhost:3000".into(),
            headed: false,
        };
        assert_eq!(headless.to_args(), vec!["open", "http://localhost:3000"]);
    }

    #[test]
    fn test_find_args_keep_text_as_single_argument() {
        let cmd = BrowserCommand::ClickText {
            text: "登录; rm -rf /".into(),
        };
        assert_eq!(cmd.to_args(), vec!["find", "text", "登录; rm -rf /", "click"]);

        let cmd = BrowserCommand::ClickButton { name: "提交".into() };
        assert_eq!(
            cmd.to_args(),
            vec!["find", "role", "button", "click", "--name", "提交"]
        );

        let cmd = BrowserCommand::FillByPlaceholder {
            placeholder: "学号".into(),
            value: "2021 001".into(),
        };
        assert_eq!(
            cmd.to_args(),
            vec!["find", "placeholder", "学号", "fill", "2021 001"]
        );
    }

    #[test]
    fn test_read_args() {
        assert_eq!(
            BrowserCommand::Snapshot { interactive: true }.to_args(),
            vec!["snapshot", "-i", "--json"]
        );
        assert_eq!(BrowserCommand::BodyText.to_args(), vec!["get", "text", "body"]);
        assert_eq!(BrowserCommand::CurrentUrl.to_args(), vec!["url"]);
        assert_eq!(
            BrowserCommand::Screenshot {
                path: PathBuf::from("/tmp/a.png"),
                full_page: true
            }
            .to_args(),
            vec!["screenshot", "/tmp/a.png", "--full"]
        );
    }

    #[test]
    fn test_option_like_arguments_are_detected() {
        let cmd = BrowserCommand::ClickButton { name: "--help".into() };
        assert_eq!(cmd.option_like_argument(), Some("--help"));

        let cmd = BrowserCommand::FillByPlaceholder {
            placeholder: "金额".into(),
            value: "-5".into(),
        };
        assert_eq!(cmd.option_like_argument(), Some("-5"));

        let cmd = BrowserCommand::ClickText { text: "a-b".into() };
        assert_eq!(cmd.option_like_argument(), None);
        assert_eq!(
            BrowserCommand::Snapshot { interactive: true }.option_like_argument(),
            None
        );
    }

    #[test]
    fn test_css_string_escapes_quotes() {
        assert_eq!(css_string("name"), "\"name\"");
        assert_eq!(css_string("a\"b"), "\"a\\\"b\"");
    }
}
