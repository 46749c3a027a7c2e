#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Failure of a single command execution, whatever the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ExecError {
    #[error("spawn: {0}")]
    Spawn(String),
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("exit {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("parse: {0}")]
    Parse(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("api: {0}")]
    Api(String),
}

/// A read command failed or its output could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum FetchError {
    #[error("fetch: {0}")]
    Exec(#[from] ExecError),
    #[error("decode: {0}")]
    Decode(String),
}

/// A write command (scale, delete) failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum MutationError {
    #[error("mutation: {0}")]
    Exec(#[from] ExecError),
    #[error("mutation abandoned before completion")]
    Abandoned,
}

/// Local input rejected before any command is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("replicas must be non-negative (got {0})")]
    Negative(i64),
    #[error("replicas must be an integer (got {0:?})")]
    NotANumber(String),
    #[error("replicas out of range (got {0})")]
    OutOfRange(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ViewError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
