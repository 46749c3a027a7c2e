#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use kdeck_core::ExecError;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::{CommandExecutor, CommandOutput};

/// Runs commands by shelling out to `kubectl`.
#[derive(Debug, Clone)]
pub struct KubectlExecutor {
    binary: PathBuf,
    context: Option<String>,
    timeout: Option<Duration>,
}

impl Default for KubectlExecutor {
    fn default() -> Self { Self { binary: PathBuf::from("kubectl"), context: None, timeout: None } }
}

impl KubectlExecutor {
    pub fn new() -> Self { Self::default() }

    /// `KDECK_KUBECTL`, `KDECK_CONTEXT`, `KDECK_EXEC_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let binary = std::env::var("KDECK_KUBECTL").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("kubectl"));
        let context = std::env::var("KDECK_CONTEXT").ok().filter(|s| !s.is_empty());
        let timeout = std::env::var("KDECK_EXEC_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_secs);
        Self { binary, context, timeout }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self { self.binary = binary.into(); self }
    pub fn with_context(mut self, context: impl Into<String>) -> Self { self.context = Some(context.into()); self }
    pub fn with_timeout(mut self, timeout: Duration) -> Self { self.timeout = Some(timeout); self }

    /// Full argument vector passed to the binary. The command is split on
    /// whitespace only; quoting is the caller's concern.
    pub fn build_args(&self, scope: &str, command: &str, parse_json: bool) -> Vec<String> {
        let mut args = vec!["--namespace".to_string(), scope.to_string()];
        if let Some(ctx) = &self.context {
            args.push("--context".to_string());
            args.push(ctx.clone());
        }
        args.extend(command.split_whitespace().map(|s| s.to_string()));
        if parse_json {
            args.push("-o".to_string());
            args.push("json".to_string());
        }
        args
    }
}

#[async_trait::async_trait]
impl CommandExecutor for KubectlExecutor {
    async fn execute(&self, scope: &str, command: &str, parse_json: bool) -> Result<CommandOutput, ExecError> {
        let args = self.build_args(scope, command, parse_json);
        let t0 = Instant::now();
        debug!(bin = %self.binary.display(), args = ?args, "kubectl: exec");
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);
        let run = cmd.output();
        let output = match self.timeout {
            Some(t) => match tokio::time::timeout(t, run).await {
                Ok(res) => res,
                Err(_) => {
                    let after_ms = t.as_millis() as u64;
                    warn!(scope = %scope, command = %command, after_ms, "kubectl: timed out");
                    counter!("exec_failures_total", 1u64, "backend" => "kubectl");
                    return Err(ExecError::Timeout { after_ms });
                }
            },
            None => run.await,
        }
        .map_err(|e| ExecError::Spawn(format!("{}: {}", self.binary.display(), e)))?;
        histogram!("exec_command_ms", t0.elapsed().as_secs_f64() * 1000.0, "backend" => "kubectl");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            counter!("exec_failures_total", 1u64, "backend" => "kubectl");
            return Err(ExecError::Exit { code: output.status.code(), stderr });
        }
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = stdout.len(), took_ms = %t0.elapsed().as_millis(), "kubectl: ok");
        if parse_json {
            serde_json::from_str(&stdout).map(CommandOutput::Json).map_err(|e| ExecError::Parse(e.to_string()))
        } else {
            Ok(CommandOutput::Raw(stdout))
        }
    }
}
