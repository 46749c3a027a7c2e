//! kdeck command executors.
//!
//! Every backend takes a scope (namespace) and a pre-built, trusted command string
//! and returns either parsed JSON or raw output. Argument construction lives in
//! `kdeck_core::Command`; nothing here escapes or rewrites the string.

#![forbid(unsafe_code)]

use kdeck_core::ExecError;
use serde_json::Value;

pub mod kube_api;
pub mod kubectl;
pub mod mock;

pub use kube_api::KubeApiExecutor;
pub use kubectl::KubectlExecutor;
pub use mock::MockCluster;

/// Output of a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// Structured output (`parse_json = true`).
    Json(Value),
    /// Opaque output (`parse_json = false`).
    Raw(String),
}

impl CommandOutput {
    pub fn data(&self) -> Option<&Value> {
        match self {
            CommandOutput::Json(v) => Some(v),
            CommandOutput::Raw(_) => None,
        }
    }

    pub fn into_data(self) -> Result<Value, ExecError> {
        match self {
            CommandOutput::Json(v) => Ok(v),
            CommandOutput::Raw(s) => Err(ExecError::Parse(format!("expected JSON output, got {} raw bytes", s.len()))),
        }
    }
}

/// Executes cluster commands against a scope.
#[async_trait::async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, scope: &str, command: &str, parse_json: bool) -> Result<CommandOutput, ExecError>;
}

/// Backend selector used by front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Kubectl,
    Api,
    /// Seeded in-memory cluster (`MockCluster::demo`).
    Mock,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kubectl" => Ok(Backend::Kubectl),
            "api" | "kube" => Ok(Backend::Api),
            "mock" => Ok(Backend::Mock),
            other => Err(format!("unknown backend: {} (expect kubectl|api|mock)", other)),
        }
    }
}

/// Build the executor for a backend, reading its environment configuration.
pub fn executor_for(backend: Backend) -> std::sync::Arc<dyn CommandExecutor> {
    match backend {
        Backend::Kubectl => std::sync::Arc::new(KubectlExecutor::from_env()),
        Backend::Api => std::sync::Arc::new(KubeApiExecutor::new()),
        Backend::Mock => std::sync::Arc::new(MockCluster::demo()),
    }
}
