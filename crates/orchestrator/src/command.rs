use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// External program invocation; arguments are passed as-is, never through a
/// shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&sh_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", sh_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote for display only when the word would otherwise be ambiguous.
fn sh_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` did not finish within {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
    #[error("`{command}` exited with {}: {}", render_code(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn render_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Runs external programs. Implementations return `Ok` only for a zero exit
/// status.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

pub type DynCommandExecutor = Arc<dyn CommandExecutor>;

/// Executes commands as child processes, killing any that outlive the timeout.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let rendered = spec.to_string();
        debug!(command = %rendered, "running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| CommandError::Spawn {
                command: rendered.clone(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::TimedOut {
                    command: rendered,
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(CommandError::Failed {
                command: rendered,
                code: output.status.code(),
                stderr,
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}
