use super::error::{AnalystError, Result};
use crate::shared::config::ExecutionConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};

/// Exit code reported when the script was killed for exceeding its budget.
/// Real exit codes are 0..=255 and signal deaths map to 128+N, so a negative
/// value never collides with them.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Runs a model-authored script inside a request's scratch directory.
///
/// Misbehaving scripts never produce an `Err`: non-zero exits, crashes and
/// timeouts all come back as a `ScriptOutput`. `Err` is reserved for the
/// executor itself being unable to do its job (script not writable,
/// interpreter not spawnable).
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(
        &self,
        workdir: &Path,
        script: &str,
        limits: &ExecutionLimits,
    ) -> Result<ScriptOutput>;
}

/// Plain subprocess runner: writes the script to a fixed filename in the
/// working directory and runs it with the configured interpreter.
pub struct SubprocessExecutor {
    interpreter: String,
    script_name: String,
}

impl SubprocessExecutor {
    pub fn new(interpreter: impl Into<String>, script_name: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script_name: script_name.into(),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.interpreter.clone(), config.script_name.clone())
    }

    pub fn script_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.script_name)
    }
}

#[async_trait]
impl ScriptExecutor for SubprocessExecutor {
    async fn execute(
        &self,
        workdir: &Path,
        script: &str,
        limits: &ExecutionLimits,
    ) -> Result<ScriptOutput> {
        let script_path = self.script_path(workdir);
        tokio::fs::write(&script_path, script).await.map_err(|e| {
            AnalystError::Execution(format!(
                "failed to write script to {}: {}",
                script_path.display(),
                e
            ))
        })?;

        let started = Instant::now();
        let child = Command::new(&self.interpreter)
            .arg(&self.script_name)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AnalystError::Execution(format!(
                    "failed to spawn interpreter '{}': {}",
                    self.interpreter, e
                ))
            })?;

        // On timeout the wait future is dropped together with the child, and
        // kill_on_drop sends SIGKILL.
        match tokio::time::timeout(limits.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = exit_code_of(output.status);
                let result = ScriptOutput {
                    exit_code,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    timed_out: false,
                };
                info!(
                    exit_code,
                    stdout_bytes = result.stdout.len(),
                    stderr_bytes = result.stderr.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Script finished"
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                warn!("Failed to collect script output: {}", e);
                Ok(ScriptOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout: String::new(),
                    stderr: format!("failed to collect script output: {}", e),
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!(
                    timeout_secs = limits.timeout.as_secs_f64(),
                    "Script exceeded its time budget and was killed"
                );
                Ok(ScriptOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout: String::new(),
                    stderr: format!(
                        "TimeoutExpired: script did not finish within {:.1}s and was terminated",
                        limits.timeout.as_secs_f64()
                    ),
                    timed_out: true,
                })
            }
        }
    }
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(TIMEOUT_EXIT_CODE)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(TIMEOUT_EXIT_CODE)
}
