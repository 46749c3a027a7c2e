//! Workload view-model.
//!
//! A [`WorkloadView`] shows one replica-managed workload and its pods. It reads
//! through the shared [`QueryClient`], keeps the replicas input in an
//! [`EditBuffer`], and issues scale/delete mutations on spawned tasks whose
//! completions come back through a channel drained by [`WorkloadView::sync`].

#![forbid(unsafe_code)]

use std::sync::Arc;

use kdeck_core::{Command, QueryKey, WorkloadKind};
use kdeck_exec::CommandExecutor;
use kdeck_query::QueryClient;
use serde::Serialize;

mod buffer;
mod config;
mod nav;
mod panel;
mod ticket;
mod view;

pub use buffer::EditBuffer;
pub use config::{DeleteErrorPolicy, ReseedPolicy, ViewConfig};
pub use nav::{routes, LogNavigator, Navigator, RecordingNavigator};
pub use panel::{ChildRows, Panel, PodRow, WorkloadPanel};
pub use ticket::{DeleteOutcome, MutationTicket};
pub use view::WorkloadView;

/// Collaborators shared by every view of a session.
#[derive(Clone)]
pub struct ViewContext {
    pub queries: QueryClient,
    pub executor: Arc<dyn CommandExecutor>,
    pub navigator: Arc<dyn Navigator>,
    pub config: ViewConfig,
}

impl ViewContext {
    /// New session over `executor` with a fresh query cache and default config.
    pub fn new(executor: Arc<dyn CommandExecutor>, navigator: Arc<dyn Navigator>) -> Self {
        Self { queries: QueryClient::new(executor.clone()), executor, navigator, config: ViewConfig::default() }
    }

    pub fn with_config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }
}

/// The workload a view is mounted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkloadRef {
    pub scope: String,
    pub kind: WorkloadKind,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(scope: impl Into<String>, kind: WorkloadKind, name: impl Into<String>) -> Self {
        Self { scope: scope.into(), kind, name: name.into() }
    }

    pub fn deployment(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(scope, WorkloadKind::Deployment, name)
    }

    /// Key of the primary read: `get <kind> <name>` in the workload's scope.
    pub fn primary_key(&self) -> QueryKey {
        QueryKey::new(self.scope.clone(), Command::get(self.kind, &self.name).to_string())
    }
}

impl std::fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.scope, self.kind.short(), self.name)
    }
}
