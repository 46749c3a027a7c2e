//! In-memory fake cluster speaking the same command vocabulary as the real
//! backends. Used by tests across the workspace and by `kdeckctl --backend mock`.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use kdeck_core::{kind::canonical_kind, Command, ExecError, LabelSelector};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::debug;

use crate::{CommandExecutor, CommandOutput};

/// One recorded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub scope: String,
    pub command: String,
    pub parse_json: bool,
}

struct StoredObject {
    scope: String,
    gvk_key: &'static str,
    name: String,
    raw: Value,
}

struct Failure {
    command: String,
    error: ExecError,
    remaining: Option<usize>,
}

#[derive(Default)]
struct MockState {
    objects: Vec<StoredObject>,
    failures: Vec<Failure>,
    calls: Vec<RecordedCall>,
}

pub struct MockCluster {
    state: Mutex<MockState>,
    latency: Duration,
    gate: watch::Sender<bool>,
}

impl Default for MockCluster {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self { state: Mutex::new(MockState::default()), latency: Duration::ZERO, gate }
    }
}

impl MockCluster {
    pub fn new() -> Self { Self::default() }

    /// Delay every command by `latency` after it is recorded.
    pub fn with_latency(mut self, latency: Duration) -> Self { self.latency = latency; self }

    /// A small seeded cluster: deployment `web` (3 replicas) and its pods in `default`.
    pub fn demo() -> Self {
        let m = Self::new();
        let web = json!({
            "metadata": { "name": "web", "namespace": "default", "labels": { "app": "web" } },
            "spec": { "replicas": 3, "selector": { "matchLabels": { "app": "web" } } },
            "status": { "readyReplicas": 2, "availableReplicas": 2, "updatedReplicas": 3 }
        });
        m.put("default", "apps/v1/Deployment", "web", web);
        for (name, phase) in [("web-7d4b9-2xkqp", "Running"), ("web-7d4b9-9zv4c", "Running"), ("web-7d4b9-q8l2m", "Pending")] {
            let pod = json!({
                "metadata": { "name": name, "namespace": "default", "labels": { "app": "web" } },
                "spec": { "nodeName": "node-1" },
                "status": { "phase": phase }
            });
            m.put("default", "v1/Pod", name, pod);
        }
        m
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object under `scope`; an existing object of the same kind and name is replaced.
    pub fn insert(&self, scope: &str, kind: &str, raw: Value) -> Result<(), ExecError> {
        let gvk_key = canonical_kind(kind).ok_or_else(|| ExecError::Unsupported(format!("kind {}", kind)))?;
        let name = raw
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExecError::Parse("object missing metadata.name".into()))?
            .to_string();
        self.put(scope, gvk_key, &name, raw);
        Ok(())
    }

    fn put(&self, scope: &str, gvk_key: &'static str, name: &str, raw: Value) {
        let mut st = self.state();
        match st.objects.iter_mut().find(|o| o.scope == scope && o.gvk_key == gvk_key && o.name == name) {
            Some(o) => o.raw = raw,
            None => st.objects.push(StoredObject { scope: scope.to_string(), gvk_key, name: name.to_string(), raw }),
        }
    }

    pub fn get(&self, scope: &str, kind: &str, name: &str) -> Option<Value> {
        let gvk_key = canonical_kind(kind)?;
        self.state()
            .objects
            .iter()
            .find(|o| o.scope == scope && o.gvk_key == gvk_key && o.name == name)
            .map(|o| o.raw.clone())
    }

    /// Apply `f` to a stored object in place (e.g. to simulate a controller updating status).
    pub fn update(&self, scope: &str, kind: &str, name: &str, f: impl FnOnce(&mut Value)) -> bool {
        let Some(gvk_key) = canonical_kind(kind) else { return false };
        let mut st = self.state();
        match st.objects.iter_mut().find(|o| o.scope == scope && o.gvk_key == gvk_key && o.name == name) {
            Some(o) => { f(&mut o.raw); true }
            None => false,
        }
    }

    /// Fail every call whose command string equals `command`.
    pub fn fail(&self, command: &str, error: ExecError) {
        self.state().failures.push(Failure { command: command.to_string(), error, remaining: None });
    }

    /// Fail the next call whose command string equals `command`.
    pub fn fail_once(&self, command: &str, error: ExecError) {
        self.state().failures.push(Failure { command: command.to_string(), error, remaining: Some(1) });
    }

    pub fn clear_failures(&self) { self.state().failures.clear(); }

    /// Hold every command after it is recorded until `resume` is called.
    pub fn pause(&self) { self.gate.send_replace(false); }

    pub fn resume(&self) { self.gate.send_replace(true); }

    pub fn calls(&self) -> Vec<RecordedCall> { self.state().calls.clone() }

    pub fn count(&self, command: &str) -> usize {
        self.state().calls.iter().filter(|c| c.command == command).count()
    }

    fn take_failure(&self, command: &str) -> Option<ExecError> {
        let mut st = self.state();
        let idx = st.failures.iter().position(|f| f.command == command)?;
        let err = st.failures[idx].error.clone();
        if let Some(n) = st.failures[idx].remaining.as_mut() {
            *n -= 1;
            if *n == 0 { st.failures.remove(idx); }
        }
        Some(err)
    }

    fn apply(&self, scope: &str, cmd: &Command) -> Result<Value, ExecError> {
        let gvk_key = canonical_kind(cmd.kind()).ok_or_else(|| ExecError::Unsupported(format!("kind {}", cmd.kind())))?;
        let mut st = self.state();
        match cmd {
            Command::Get { kind, name } => {
                let idx = position(&st.objects, scope, gvk_key, name).ok_or_else(|| not_found(kind, name))?;
                Ok(st.objects[idx].raw.clone())
            }
            Command::List { selector, .. } => {
                let sel = LabelSelector::parse(selector).ok_or_else(|| ExecError::Parse(format!("bad selector {:?}", selector)))?;
                let items: Vec<Value> = st
                    .objects
                    .iter()
                    .filter(|o| o.scope == scope && o.gvk_key == gvk_key)
                    .filter(|o| sel.matches(&labels_of(&o.raw)))
                    .map(|o| o.raw.clone())
                    .collect();
                Ok(json!({ "apiVersion": "v1", "kind": "List", "items": items }))
            }
            Command::Scale { kind, name, replicas } => {
                let idx = position(&st.objects, scope, gvk_key, name).ok_or_else(|| not_found(kind, name))?;
                let raw = &mut st.objects[idx].raw;
                if !raw.get("spec").map(|s| s.is_object()).unwrap_or(false) {
                    raw["spec"] = json!({});
                }
                raw["spec"]["replicas"] = json!(replicas);
                Ok(json!({ "kind": kind, "name": name, "result": "scaled" }))
            }
            Command::Delete { kind, name } => {
                let idx = position(&st.objects, scope, gvk_key, name).ok_or_else(|| not_found(kind, name))?;
                st.objects.remove(idx);
                Ok(json!({ "kind": kind, "name": name, "result": "deleted" }))
            }
        }
    }
}

fn position(objects: &[StoredObject], scope: &str, gvk_key: &str, name: &str) -> Option<usize> {
    objects.iter().position(|o| o.scope == scope && o.gvk_key == gvk_key && o.name == name)
}

fn not_found(kind: &str, name: &str) -> ExecError {
    ExecError::Exit { code: Some(1), stderr: format!("Error from server (NotFound): {} \"{}\" not found", kind, name) }
}

fn labels_of(raw: &Value) -> Vec<(String, String)> {
    raw.pointer("/metadata/labels")
        .and_then(|m| m.as_object())
        .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl CommandExecutor for MockCluster {
    async fn execute(&self, scope: &str, command: &str, parse_json: bool) -> Result<CommandOutput, ExecError> {
        self.state().calls.push(RecordedCall { scope: scope.to_string(), command: command.to_string(), parse_json });
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = self.take_failure(command) {
            debug!(scope = %scope, command = %command, error = %err, "mock: injected failure");
            return Err(err);
        }
        let cmd = Command::parse(command)?;
        let v = self.apply(scope, &cmd)?;
        debug!(scope = %scope, command = %command, "mock: ok");
        if parse_json {
            Ok(CommandOutput::Json(v))
        } else if cmd.is_read() {
            Ok(CommandOutput::Raw(serde_json::to_string_pretty(&v).unwrap_or_default()))
        } else {
            Ok(CommandOutput::Raw(format!("{}/{} {}\n", cmd.kind(), v["name"].as_str().unwrap_or(""), v["result"].as_str().unwrap_or(""))))
        }
    }
}
