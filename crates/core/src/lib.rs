//! kdeck core types: query keys, the command vocabulary spoken to the cluster
//! tool, workload/pod records decoded from its JSON, and the error taxonomy.

#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod kind;
pub mod resource;
pub mod scale;

use serde::{Deserialize, Serialize};

pub use command::Command;
pub use error::{ExecError, FetchError, MutationError, ValidationError, ViewError};
pub use kind::WorkloadKind;
pub use resource::{LabelSelector, PodPhase, PodRecord, Workload};
pub use scale::ScaleInput;

/// Identity of a cached read: the scope (namespace) plus the command string.
///
/// Two keys are equal only when both parts are byte-identical; no normalisation of
/// the command string happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub scope: String,
    pub command: String,
}

impl QueryKey {
    pub fn new(scope: impl Into<String>, command: impl Into<String>) -> Self {
        Self { scope: scope.into(), command: command.into() }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.scope, self.command)
    }
}

pub mod prelude {
    pub use super::{
        Command, ExecError, FetchError, LabelSelector, MutationError, PodPhase, PodRecord, QueryKey,
        ScaleInput, ValidationError, ViewError, Workload, WorkloadKind,
    };
}
