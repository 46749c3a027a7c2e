//! Records decoded from the cluster tool's JSON output.
//!
//! Decoding reads fields by JSON pointer and falls back to API-server defaults for
//! absent optional fields, so partially populated objects (fresh rollouts, fakes in
//! tests) still decode. Only identity is mandatory.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::FetchError;

/// Equality-based label selector, rendered as `k=v[,k=v...]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSelector {
    pub pairs: SmallVec<[(String, String); 4]>,
}

impl LabelSelector {
    pub fn single(key: &str, value: &str) -> Self {
        let mut pairs = SmallVec::new();
        pairs.push((key.to_string(), value.to_string()));
        Self { pairs }
    }

    /// Whether `labels` carries every pair of this selector.
    pub fn matches(&self, labels: &[(String, String)]) -> bool {
        self.pairs.iter().all(|(k, v)| labels.iter().any(|(lk, lv)| lk == k && lv == v))
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut pairs = SmallVec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = part.split_once('=')?;
            let v = v.strip_prefix('=').unwrap_or(v);
            if k.is_empty() { return None; }
            pairs.push((k.to_string(), v.to_string()));
        }
        Some(Self { pairs })
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (k, v)) in self.pairs.iter().enumerate() {
            if i > 0 { f.write_str(",")?; }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// A replica-managed workload (Deployment, StatefulSet, ReplicaSet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: Option<String>,
    pub labels: SmallVec<[(String, String); 8]>,
    /// `spec.selector.matchLabels`, sorted by key.
    pub match_labels: SmallVec<[(String, String); 4]>,
    pub desired_replicas: i64,
    pub ready_replicas: i64,
    pub available_replicas: i64,
    pub updated_replicas: i64,
    pub creation_ts: i64,
}

impl Workload {
    pub fn from_json(raw: &Value) -> Result<Self, FetchError> {
        let name = raw
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::Decode("workload missing metadata.name".into()))?
            .to_string();
        let namespace = raw.pointer("/metadata/namespace").and_then(|v| v.as_str()).map(|s| s.to_string());
        let labels = string_pairs(raw.pointer("/metadata/labels"));
        let mut match_labels: SmallVec<[(String, String); 4]> =
            string_pairs(raw.pointer("/spec/selector/matchLabels")).into_iter().collect();
        match_labels.sort();
        // API server defaults spec.replicas to 1
        let desired_replicas = raw.pointer("/spec/replicas").and_then(|v| v.as_i64()).unwrap_or(1);
        let count = |p: &str| raw.pointer(p).and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(Self {
            name,
            namespace,
            labels,
            match_labels,
            desired_replicas,
            ready_replicas: count("/status/readyReplicas"),
            available_replicas: count("/status/availableReplicas"),
            updated_replicas: count("/status/updatedReplicas"),
            creation_ts: creation_ts(raw),
        })
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Selector for the workload's pods: the `label_key` label when present,
    /// otherwise `spec.selector.matchLabels`.
    pub fn child_selector(&self, label_key: &str) -> Option<LabelSelector> {
        if let Some(v) = self.label(label_key) {
            return Some(LabelSelector::single(label_key, v));
        }
        if self.match_labels.is_empty() {
            return None;
        }
        Some(LabelSelector { pairs: self.match_labels.clone() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    Other(String),
}

impl From<String> for PodPhase {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            "Unknown" | "" => PodPhase::Unknown,
            _ => PodPhase::Other(s),
        }
    }
}

impl From<PodPhase> for String {
    fn from(p: PodPhase) -> Self { p.to_string() }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => f.write_str("Pending"),
            PodPhase::Running => f.write_str("Running"),
            PodPhase::Succeeded => f.write_str("Succeeded"),
            PodPhase::Failed => f.write_str("Failed"),
            PodPhase::Unknown => f.write_str("Unknown"),
            PodPhase::Other(s) => f.write_str(s),
        }
    }
}

/// One child instance of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub phase: PodPhase,
    pub node: Option<String>,
    pub creation_ts: i64,
}

impl PodRecord {
    pub fn from_json(raw: &Value) -> Result<Self, FetchError> {
        let name = raw
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::Decode("pod missing metadata.name".into()))?
            .to_string();
        let phase: PodPhase = raw.pointer("/status/phase").and_then(|v| v.as_str()).unwrap_or("").to_string().into();
        let node = raw.pointer("/spec/nodeName").and_then(|v| v.as_str()).map(|s| s.to_string());
        Ok(Self { name, phase, node, creation_ts: creation_ts(raw) })
    }

    /// Decode a list document (`{"items": [...]}`), keeping item order.
    pub fn list_from_json(raw: &Value) -> Result<Vec<Self>, FetchError> {
        let items = raw
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| FetchError::Decode("list missing items".into()))?;
        items.iter().map(Self::from_json).collect()
    }
}

fn creation_ts(raw: &Value) -> i64 {
    raw.pointer("/metadata/creationTimestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

fn string_pairs(v: Option<&Value>) -> SmallVec<[(String, String); 8]> {
    let mut out = SmallVec::new();
    if let Some(obj) = v.and_then(|m| m.as_object()) {
        for (k, v) in obj.iter() {
            if let Some(val) = v.as_str() { out.push((k.clone(), val.to_string())); }
        }
    }
    out
}
