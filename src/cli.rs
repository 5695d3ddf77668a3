//! Adapter around the `openclaw` command-line tool.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::ExecutionError;

/// Hard cap on a single CLI invocation.
pub const CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest stdout/stderr payload accepted from the CLI (10 MiB).
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Something that can run a CLI subcommand and hand back its JSON output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `<binary> <args...> --json` and parse stdout as JSON.
    async fn run(&self, args: &[&str]) -> Result<Value, ExecutionError>;
}

/// Spawns one `openclaw` process per call.
#[derive(Debug, Clone)]
pub struct OpenClawCli {
    binary: String,
    timeout: Duration,
    max_output: usize,
}

impl OpenClawCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: CLI_TIMEOUT,
            max_output: MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn execute(&self, args: &[&str], command: &str) -> Result<Value, ExecutionError> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .arg("--json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let limit = self.max_output;
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), limit));

        let stdout = read_capped(child.stdout.take(), limit)
            .await
            .map_err(|source| ExecutionError::Io {
                command: command.to_string(),
                source,
            })?;
        if stdout.len() > limit {
            // Dropping the child kills it.
            return Err(ExecutionError::OutputTooLarge {
                command: command.to_string(),
                limit,
            });
        }

        let status = child.wait().await.map_err(|source| ExecutionError::Io {
            command: command.to_string(),
            source,
        })?;
        let stderr = stderr_task
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(ExecutionError::NonZeroExit {
                command: command.to_string(),
                status,
                stderr,
            });
        }

        serde_json::from_slice(&stdout).map_err(|source| ExecutionError::InvalidJson {
            command: command.to_string(),
            source,
        })
    }
}

#[async_trait]
impl CommandRunner for OpenClawCli {
    async fn run(&self, args: &[&str]) -> Result<Value, ExecutionError> {
        let command = format!("{} {} --json", self.binary, args.join(" "));
        debug!("Running {}", command);

        let result = match tokio::time::timeout(self.timeout, self.execute(args, &command)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout {
                command: command.clone(),
                timeout: self.timeout,
            }),
        };

        if let Err(e) = &result {
            error!("Error running command: {}: {}", args.join(" "), e);
        }
        result
    }
}

/// Read at most `limit + 1` bytes so callers can detect overflow.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Write a shell script and return a runner that executes it through `sh`.
    fn script(body: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openclaw.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_appends_json_flag_and_parses_stdout() {
        let (_dir, path) = script(r#"printf '{"args":"%s"}' "$*""#);
        let cli = OpenClawCli::new("sh");

        let value = cli.run(&[path.to_str().unwrap(), "cron", "list"]).await.unwrap();
        assert_eq!(value, json!({"args": "cron list --json"}));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let (_dir, path) = script(r#"echo '{"partial":true}'; echo boom >&2; exit 3"#);
        let cli = OpenClawCli::new("sh");

        let err = cli.run(&[path.to_str().unwrap(), "status"]).await.unwrap_err();
        match err {
            ExecutionError::NonZeroExit { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_stdout_fails() {
        let (_dir, path) = script("echo 'not json at all'");
        let cli = OpenClawCli::new("sh");

        let err = cli.run(&[path.to_str().unwrap(), "sessions"]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn test_empty_stdout_fails() {
        let (_dir, path) = script("exit 0");
        let cli = OpenClawCli::new("sh");

        let err = cli.run(&[path.to_str().unwrap(), "sessions"]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn test_timeout_fails() {
        let (_dir, path) = script("sleep 5; echo '{}'");
        let cli = OpenClawCli::new("sh").with_timeout(Duration::from_millis(200));

        let err = cli.run(&[path.to_str().unwrap(), "status"]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_oversized_output_fails() {
        let (_dir, path) = script(r#"printf '"%0100d"' 0"#);
        let cli = OpenClawCli::new("sh").with_max_output(16);

        let err = cli.run(&[path.to_str().unwrap(), "sessions"]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::OutputTooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let cli = OpenClawCli::new("/nonexistent/openclaw-binary");

        let err = cli.run(&["sessions"]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
    }
}
