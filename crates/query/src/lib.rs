//! Keyed query cache shared by every view in a session.
//!
//! One entry exists per [`QueryKey`]. Subscribing to a key whose entry is new
//! starts an execution; subscribing to a known key only attaches to the entry.
//! At most one execution per key is ever in flight: a revalidation that arrives
//! while one is running is folded into a single follow-up run.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use kdeck_core::{FetchError, QueryKey};
use kdeck_exec::CommandExecutor;
use metrics::{counter, histogram};
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod state;

pub use state::QueryState;

#[derive(Default)]
struct Flight {
    running: bool,
    rerun: bool,
    executions: u64,
}

struct Entry {
    key: QueryKey,
    state: watch::Sender<QueryState>,
    flight: Mutex<Flight>,
}

impl Entry {
    fn new(key: QueryKey) -> Self {
        let (state, _) = watch::channel(QueryState::Pending);
        Self { key, state, flight: Mutex::new(Flight::default()) }
    }

    fn flight(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_refetching(&self) {
        self.state.send_if_modified(|s| match s.refetching() {
            Some(next) => { *s = next; true }
            None => false,
        });
    }

    /// Publish a finished run. With a rerun queued the result lands as
    /// revalidating data, never as settled.
    fn publish(&self, res: Result<serde_json::Value, FetchError>, rerun: bool) {
        self.state.send_modify(|s| {
            let done = s.completed(res);
            *s = if rerun { done.refetching().unwrap_or(done) } else { done };
        });
    }
}

struct Inner {
    executor: Arc<dyn CommandExecutor>,
    entries: Mutex<FxHashMap<QueryKey, Arc<Entry>>>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, FxHashMap<QueryKey, Arc<Entry>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start an execution for `entry`, or queue one follow-up if one is running.
    fn start(self: &Arc<Self>, entry: &Arc<Entry>) {
        {
            // Marked under the flight lock: a run finishing concurrently
            // either sees the rerun or has already published.
            let mut f = entry.flight();
            entry.mark_refetching();
            if f.running {
                if !f.rerun {
                    debug!(key = %entry.key, "query: revalidate queued behind in-flight run");
                }
                f.rerun = true;
                counter!("query_coalesced_total", 1u64);
                return;
            }
            f.running = true;
            f.executions += 1;
        }
        let inner = self.clone();
        let entry = entry.clone();
        tokio::spawn(async move { inner.run(entry).await });
    }

    async fn run(self: Arc<Self>, entry: Arc<Entry>) {
        loop {
            let t0 = Instant::now();
            counter!("query_executions_total", 1u64);
            let res = self
                .executor
                .execute(&entry.key.scope, &entry.key.command, true)
                .await
                .and_then(|out| out.into_data())
                .map_err(FetchError::from);
            let took = t0.elapsed();
            histogram!("query_fetch_ms", took.as_secs_f64() * 1000.0);
            match &res {
                Ok(_) => info!(key = %entry.key, took_ms = %took.as_millis(), "query: resolved"),
                Err(e) => warn!(key = %entry.key, error = %e, took_ms = %took.as_millis(), "query: failed"),
            }

            // Decide and publish under the flight lock so a queued rerun is
            // never observed as settled.
            let again = {
                let mut f = entry.flight();
                let again = f.rerun;
                if again {
                    f.rerun = false;
                    f.executions += 1;
                } else {
                    f.running = false;
                }
                entry.publish(res, again);
                again
            };
            if !again { break; }
        }
    }
}

/// Session-wide cache of reads, cheap to clone.
///
/// Must be used from within a Tokio runtime: executions run on spawned tasks.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { inner: Arc::new(Inner { executor, entries: Mutex::new(FxHashMap::default()) }) }
    }

    /// Attach to the entry for `key`, creating it and starting its first
    /// execution when absent.
    pub fn subscribe(&self, key: QueryKey) -> QueryHandle {
        let (entry, created) = {
            let mut map = self.inner.entries();
            match map.get(&key) {
                Some(e) => (e.clone(), false),
                None => {
                    let e = Arc::new(Entry::new(key.clone()));
                    map.insert(key, e.clone());
                    (e, true)
                }
            }
        };
        if created {
            debug!(key = %entry.key, "query: new entry");
            self.inner.start(&entry);
        }
        let rx = entry.state.subscribe();
        QueryHandle { inner: self.inner.clone(), entry, rx }
    }

    /// Current state of `key` without subscribing.
    pub fn peek(&self, key: &QueryKey) -> Option<QueryState> {
        self.inner.entries().get(key).map(|e| e.state.borrow().clone())
    }

    /// Mark `key` stale and re-execute it. No-op for unknown keys.
    pub fn revalidate(&self, key: &QueryKey) {
        let entry = self.inner.entries().get(key).cloned();
        if let Some(e) = entry {
            self.inner.start(&e);
        }
    }

    /// Executions started for `key` so far.
    pub fn executions(&self, key: &QueryKey) -> u64 {
        self.inner.entries().get(key).map(|e| e.flight().executions).unwrap_or(0)
    }

    /// Drop the entry for `key`. Live handles keep their entry; the next
    /// `subscribe` creates a fresh one.
    pub fn forget(&self, key: &QueryKey) -> bool {
        self.inner.entries().remove(key).is_some()
    }

    pub fn len(&self) -> usize { self.inner.entries().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// A subscription to one cached read.
#[derive(Clone)]
pub struct QueryHandle {
    inner: Arc<Inner>,
    entry: Arc<Entry>,
    rx: watch::Receiver<QueryState>,
}

impl QueryHandle {
    pub fn key(&self) -> &QueryKey { &self.entry.key }

    pub fn current(&self) -> QueryState { self.rx.borrow().clone() }

    /// Mark stale and re-execute; folded into the running execution if any.
    pub fn revalidate(&self) { self.inner.start(&self.entry); }

    /// Wait for the next transition and return the new state.
    pub async fn changed(&mut self) -> QueryState {
        // The sender lives in `entry`, which this handle keeps alive.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until data or an error is available (state is not `Pending`).
    pub async fn ready(&mut self) -> QueryState {
        self.wait_for(|s| !s.is_pending()).await
    }

    /// Wait until nothing is outstanding (`Resolved` or `Failed`).
    pub async fn settled(&mut self) -> QueryState {
        self.wait_for(QueryState::is_settled).await
    }

    async fn wait_for(&mut self, f: impl FnMut(&QueryState) -> bool) -> QueryState {
        let res = self.rx.wait_for(f).await.map(|s| s.clone());
        res.unwrap_or_else(|_| self.current())
    }
}

impl std::fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle").field("key", &self.entry.key).field("state", &*self.rx.borrow()).finish()
    }
}
