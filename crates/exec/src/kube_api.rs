//! Executes the command vocabulary directly against the API server with kube-rs,
//! without a `kubectl` binary.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{anyhow, Result};
use kdeck_core::{kind::canonical_kind, Command, ExecError};
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client,
};
use metrics::histogram;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{CommandExecutor, CommandOutput};

/// kube-rs backed executor. The client and discovered API resources are cached for
/// the executor's lifetime.
#[derive(Default)]
pub struct KubeApiExecutor {
    client: OnceCell<Client>,
    resources: Mutex<HashMap<String, (ApiResource, bool)>>,
}

impl KubeApiExecutor {
    pub fn new() -> Self { Self::default() }

    /// Use an already configured client instead of the default kubeconfig.
    pub fn with_client(client: Client) -> Self {
        Self { client: OnceCell::new_with(Some(client)), resources: Mutex::new(HashMap::new()) }
    }

    async fn client(&self) -> Result<Client> {
        let c = self.client.get_or_try_init(|| async { Client::try_default().await }).await?;
        Ok(c.clone())
    }

    async fn api_for(&self, gvk_key: &str, scope: &str) -> Result<Api<DynamicObject>> {
        let client = self.client().await?;
        let cached = self.resources.lock().unwrap_or_else(|e| e.into_inner()).get(gvk_key).cloned();
        let (ar, namespaced) = match cached {
            Some(hit) => hit,
            None => {
                let (group, version, kind) = parse_gvk_key(gvk_key)?;
                let found = find_api_resource(client.clone(), &GroupVersionKind { group, version, kind }).await?;
                self.resources.lock().unwrap_or_else(|e| e.into_inner()).insert(gvk_key.to_string(), found.clone());
                found
            }
        };
        Ok(if namespaced { Api::namespaced_with(client, scope, &ar) } else { Api::all_with(client, &ar) })
    }

    async fn run(&self, scope: &str, cmd: &Command, parse_json: bool) -> Result<CommandOutput> {
        let gvk_key = canonical_kind(cmd.kind()).ok_or_else(|| anyhow!("unsupported kind: {}", cmd.kind()))?;
        let api = self.api_for(gvk_key, scope).await?;
        match cmd {
            Command::Get { name, .. } => {
                let obj = api.get(name).await?;
                let mut v = serde_json::to_value(&obj)?;
                strip_managed_fields(&mut v);
                Ok(shape(v, parse_json))
            }
            Command::List { selector, .. } => {
                let mut lp = ListParams::default();
                if !selector.is_empty() { lp = lp.labels(selector); }
                let list = api.list(&lp).await?;
                let mut items = Vec::with_capacity(list.items.len());
                for o in list.items.iter() {
                    let mut v = serde_json::to_value(o)?;
                    strip_managed_fields(&mut v);
                    items.push(v);
                }
                debug!(count = items.len(), selector = %selector, "kube: list ok");
                Ok(shape(json!({ "apiVersion": "v1", "kind": "List", "items": items }), parse_json))
            }
            Command::Scale { name, replicas, kind } => {
                let pp = PatchParams::default();
                let payload = json!({"spec": {"replicas": replicas}});
                match api.patch_scale(name, &pp, &Patch::Merge(&payload)).await {
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "patch_scale failed; falling back to spec.replicas");
                        let _ = api.patch(name, &pp, &Patch::Merge(&payload)).await?;
                    }
                }
                Ok(mutation_output(kind, name, "scaled", parse_json))
            }
            Command::Delete { name, kind } => {
                let _ = api.delete(name, &DeleteParams::default()).await?;
                Ok(mutation_output(kind, name, "deleted", parse_json))
            }
        }
    }
}

#[async_trait::async_trait]
impl CommandExecutor for KubeApiExecutor {
    async fn execute(&self, scope: &str, command: &str, parse_json: bool) -> Result<CommandOutput, ExecError> {
        let cmd = Command::parse(command)?;
        if canonical_kind(cmd.kind()).is_none() {
            return Err(ExecError::Unsupported(format!("kind {}", cmd.kind())));
        }
        let t0 = Instant::now();
        let res = self.run(scope, &cmd, parse_json).await;
        histogram!("exec_command_ms", t0.elapsed().as_secs_f64() * 1000.0, "backend" => "api");
        match res {
            Ok(out) => {
                info!(scope = %scope, command = %command, took_ms = %t0.elapsed().as_millis(), "kube: ok");
                Ok(out)
            }
            Err(e) => Err(ExecError::Api(e.to_string())),
        }
    }
}

fn shape(v: Value, parse_json: bool) -> CommandOutput {
    if parse_json {
        CommandOutput::Json(v)
    } else {
        CommandOutput::Raw(serde_json::to_string_pretty(&v).unwrap_or_default())
    }
}

fn mutation_output(kind: &str, name: &str, verb: &str, parse_json: bool) -> CommandOutput {
    if parse_json {
        CommandOutput::Json(json!({ "kind": kind, "name": name, "result": verb }))
    } else {
        CommandOutput::Raw(format!("{}/{} {}\n", kind, name, verb))
    }
}

fn strip_managed_fields(v: &mut Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

fn parse_gvk_key(key: &str) -> Result<(String, String, String)> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] => Ok((String::new(), (*version).to_string(), (*kind).to_string())),
        [group, version, kind] => Ok(((*group).to_string(), (*version).to_string(), (*kind).to_string())),
        _ => Err(anyhow!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key)),
    }
}

async fn find_api_resource(client: Client, gvk: &GroupVersionKind) -> Result<(ApiResource, bool)> {
    let discovery = Discovery::new(client).run().await?;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar.clone(), namespaced));
            }
        }
    }
    Err(anyhow!("GVK not found: {}/{}/{}", gvk.group, gvk.version, gvk.kind))
}
