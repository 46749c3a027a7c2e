#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Replica-managed workload kinds a view can be mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkloadKind {
    #[default]
    Deployment,
    StatefulSet,
    ReplicaSet,
}

impl WorkloadKind {
    /// Singular resource noun used in read commands (`get deployment web`).
    pub fn noun(self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulset",
            WorkloadKind::ReplicaSet => "replicaset",
        }
    }

    /// Short name used in mutation commands (`scale deploy web ...`).
    pub fn short(self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deploy",
            WorkloadKind::StatefulSet => "sts",
            WorkloadKind::ReplicaSet => "rs",
        }
    }

    /// Plural path segment for routes (`/default/deployments`).
    pub fn plural(self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployments",
            WorkloadKind::StatefulSet => "statefulsets",
            WorkloadKind::ReplicaSet => "replicasets",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.noun())
    }
}

impl std::str::FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_kind(s) {
            Some("apps/v1/Deployment") => Ok(WorkloadKind::Deployment),
            Some("apps/v1/StatefulSet") => Ok(WorkloadKind::StatefulSet),
            Some("apps/v1/ReplicaSet") => Ok(WorkloadKind::ReplicaSet),
            _ => Err(format!("not a replica-managed workload kind: {}", s)),
        }
    }
}

/// Map a kind token as typed on a command line (`deploy`, `deployments`,
/// `deployment.apps`, `po`, ...) to its GVK key (`apps/v1/Deployment`).
pub fn canonical_kind(token: &str) -> Option<&'static str> {
    let lower = token.to_ascii_lowercase();
    let base = lower.strip_suffix(".apps").unwrap_or(&lower);
    match base {
        "deploy" | "deployment" | "deployments" => Some("apps/v1/Deployment"),
        "sts" | "statefulset" | "statefulsets" => Some("apps/v1/StatefulSet"),
        "rs" | "replicaset" | "replicasets" => Some("apps/v1/ReplicaSet"),
        "po" | "pod" | "pods" => Some("v1/Pod"),
        _ => None,
    }
}
