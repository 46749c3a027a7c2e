#![forbid(unsafe_code)]

use kdeck_core::{FetchError, PodPhase, PodRecord, WorkloadKind};
use kdeck_query::QueryState;
use serde::Serialize;

use crate::routes;

/// What the rendering surface gets for one workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "panel", rename_all = "lowercase")]
pub enum Panel {
    Loading,
    Failed(FetchError),
    Ready(WorkloadPanel),
}

impl Panel {
    pub fn ready(&self) -> Option<&WorkloadPanel> {
        match self {
            Panel::Ready(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<WorkloadPanel> {
        match self {
            Panel::Ready(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadPanel {
    pub scope: String,
    pub kind: WorkloadKind,
    pub name: String,
    /// Replicas input field.
    pub replicas: Option<i64>,
    /// Unsaved input that differs from `desired`.
    pub dirty: bool,
    pub desired: i64,
    pub ready: i64,
    pub available: i64,
    pub updated: i64,
    /// Data is shown while a re-execution is outstanding.
    pub refreshing: bool,
    pub children: ChildRows,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "rows", rename_all = "lowercase")]
pub enum ChildRows {
    Loading,
    Failed(FetchError),
    Rows(Vec<PodRow>),
}

impl ChildRows {
    pub fn rows(&self) -> &[PodRow] {
        match self {
            ChildRows::Rows(r) => r,
            _ => &[],
        }
    }

    pub(crate) fn from_state(scope: &str, state: &QueryState) -> Self {
        match state {
            QueryState::Pending => ChildRows::Loading,
            QueryState::Failed { error, .. } => ChildRows::Failed(error.clone()),
            QueryState::Resolved(v) | QueryState::Stale(v) => match PodRecord::list_from_json(v) {
                Ok(pods) => ChildRows::Rows(pods.into_iter().map(|p| PodRow::new(scope, p)).collect()),
                Err(e) => ChildRows::Failed(e),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRow {
    pub name: String,
    pub phase: PodPhase,
    pub node: Option<String>,
    pub creation_ts: i64,
    pub info_path: String,
}

impl PodRow {
    fn new(scope: &str, p: PodRecord) -> Self {
        let info_path = routes::pod_info(scope, &p.name);
        Self { name: p.name, phase: p.phase, node: p.node, creation_ts: p.creation_ts, info_path }
    }
}
