//! Bounded execution of external tools.
//!
//! Every analysis tool, installer and bootstrap step runs through
//! `ToolRunner`:
//! - spawns `sh -c <command>` in the project root
//! - bounds each attempt with a timeout, retrying a timed-out attempt
//! - maps exit code 127 / spawn `NotFound` to `ToolNotFound`
//! - maps other non-zero exits to `ToolFailed` with the tail of stderr

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::{BrownfieldError, Result};

/// Default per-attempt timeout for tool invocations.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;

/// Lines of stderr kept in `ToolFailed`.
const STDERR_TAIL_LINES: usize = 20;

/// Exit code used by POSIX shells for "command not found".
const SHELL_NOT_FOUND: i32 = 127;

/// A shell command plus the name it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    /// Short name used in logs and errors (e.g. "pytest")
    pub name: String,
    /// Shell command line
    pub command: String,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
    retries: u32,
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS), 1)
    }
}

impl ToolRunner {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self { timeout, retries }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a tool to completion.
    pub async fn run(&self, tool: &ToolCommand, cwd: &Path) -> Result<ToolOutput> {
        let mut attempt = 0;
        loop {
            if let Some(output) = self.run_once(tool, cwd).await? {
                return Ok(output);
            }
            if attempt >= self.retries {
                return Err(BrownfieldError::ToolTimeout {
                    tool: tool.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                    attempts: attempt,
                });
            }
            attempt += 1;
            warn!(
                tool = %tool.name,
                timeout_ms = self.timeout.as_millis() as u64,
                attempt,
                "tool timed out, retrying"
            );
        }
    }

    /// One attempt. `Ok(None)` means the attempt timed out.
    async fn run_once(&self, tool: &ToolCommand, cwd: &Path) -> Result<Option<ToolOutput>> {
        debug!(tool = %tool.name, command = %tool.command, "spawning tool");
        let started = Instant::now();

        let child = Command::new("sh")
            .arg("-c")
            .arg(&tool.command)
            .current_dir(cwd)
            .envs(tool.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    BrownfieldError::ToolNotFound {
                        tool: tool.name.clone(),
                    }
                } else {
                    BrownfieldError::Io {
                        path: cwd.to_path_buf(),
                        source,
                    }
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| BrownfieldError::Io {
                path: cwd.to_path_buf(),
                source,
            })?,
            Err(_) => return Ok(None),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            tool = %tool.name,
            exit_code,
            duration_ms = started.elapsed().as_millis() as u64,
            "tool finished"
        );

        match exit_code {
            0 => Ok(Some(ToolOutput {
                stdout,
                stderr,
                duration: started.elapsed(),
            })),
            SHELL_NOT_FOUND => Err(BrownfieldError::ToolNotFound {
                tool: tool.name.clone(),
            }),
            code => Err(BrownfieldError::ToolFailed {
                tool: tool.name.clone(),
                exit_code: code,
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            }),
        }
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
