#![forbid(unsafe_code)]

use kdeck_core::{
    scale::coerce_text, Command, FetchError, LabelSelector, MutationError, QueryKey, ScaleInput, ValidationError,
    ViewError, Workload,
};
use kdeck_query::{QueryHandle, QueryState};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    routes, ChildRows, DeleteErrorPolicy, DeleteOutcome, EditBuffer, MutationTicket, Panel, ViewContext,
    WorkloadPanel, WorkloadRef,
};

/// Mutation completions posted back to the view.
#[derive(Debug)]
enum ViewUpdate {
    Scaled { replicas: u32 },
    ScaleFailed(MutationError),
    Deleted,
    DeleteFailed(MutationError),
}

enum ChildSlot {
    /// Primary has not produced data yet.
    Waiting,
    /// Primary resolved but yields no selector.
    NoSelector(FetchError),
    Query { selector: LabelSelector, handle: QueryHandle, state: QueryState },
}

/// View-model for one workload and its pods. Dropping it unmounts it.
pub struct WorkloadView {
    ctx: ViewContext,
    target: WorkloadRef,
    primary: QueryHandle,
    primary_state: QueryState,
    children: ChildSlot,
    buffer: EditBuffer,
    seeded_from: Option<(String, i64)>,
    notice: Option<String>,
    updates_tx: mpsc::UnboundedSender<ViewUpdate>,
    updates_rx: mpsc::UnboundedReceiver<ViewUpdate>,
}

impl WorkloadView {
    /// Subscribe to the workload's primary query. Must run inside a Tokio runtime.
    pub fn mount(ctx: ViewContext, target: WorkloadRef) -> Self {
        info!(workload = %target, "view: mount");
        let primary = ctx.queries.subscribe(target.primary_key());
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let mut view = Self {
            ctx,
            target,
            primary_state: QueryState::Pending,
            primary,
            children: ChildSlot::Waiting,
            buffer: EditBuffer::default(),
            seeded_from: None,
            notice: None,
            updates_tx,
            updates_rx,
        };
        view.sync();
        view
    }

    pub fn target(&self) -> &WorkloadRef { &self.target }

    pub fn buffer(&self) -> EditBuffer { self.buffer }

    /// Key of the pods query, once the primary resource has yielded a selector.
    pub fn children_key(&self) -> Option<&QueryKey> {
        match &self.children {
            ChildSlot::Query { handle, .. } => Some(handle.key()),
            _ => None,
        }
    }

    /// Drain mutation completions and fold in current query states.
    pub fn sync(&mut self) {
        while let Ok(u) = self.updates_rx.try_recv() {
            self.apply_update(u);
        }

        self.primary_state = self.primary.current();
        if let Some(data) = self.primary_state.data().cloned() {
            match Workload::from_json(&data) {
                Ok(w) => {
                    self.reseed(&w);
                    self.rekey_children(&w);
                }
                Err(e) => debug!(workload = %self.target, error = %e, "view: primary does not decode"),
            }
        }

        if let ChildSlot::Query { handle, state, .. } = &mut self.children {
            *state = handle.current();
        }
    }

    fn apply_update(&mut self, u: ViewUpdate) {
        match u {
            ViewUpdate::Scaled { replicas } => {
                self.buffer.commit(replicas as i64);
                self.notice = None;
            }
            ViewUpdate::ScaleFailed(e) => {
                self.notice = Some(format!("scale failed: {}", e));
            }
            ViewUpdate::Deleted => {
                self.notice = None;
            }
            ViewUpdate::DeleteFailed(e) => {
                if self.ctx.config.delete_errors == DeleteErrorPolicy::Surface {
                    self.notice = Some(format!("delete failed: {}", e));
                }
            }
        }
    }

    fn reseed(&mut self, w: &Workload) {
        let seen = (w.name.clone(), w.desired_replicas);
        if self.seeded_from.as_ref() == Some(&seen) {
            return;
        }
        self.buffer.seed(w.desired_replicas, self.ctx.config.reseed);
        debug!(workload = %self.target, desired = w.desired_replicas, buffer = ?self.buffer, "view: buffer reseeded");
        self.seeded_from = Some(seen);
    }

    fn rekey_children(&mut self, w: &Workload) {
        let label = self.ctx.config.selector_label.as_str();
        let Some(selector) = w.child_selector(label) else {
            if !matches!(self.children, ChildSlot::NoSelector(_)) {
                warn!(workload = %self.target, label = %label, "view: workload has no pod selector");
            }
            self.children = ChildSlot::NoSelector(FetchError::Decode(format!(
                "workload {} has neither an {:?} label nor spec.selector.matchLabels",
                w.name, label
            )));
            return;
        };
        if let ChildSlot::Query { selector: cur, .. } = &self.children {
            if *cur == selector {
                return;
            }
        }
        let key = QueryKey::new(self.target.scope.clone(), Command::list_pods(&selector).to_string());
        debug!(workload = %self.target, key = %key, "view: children keyed");
        let handle = self.ctx.queries.subscribe(key);
        let state = handle.current();
        self.children = ChildSlot::Query { selector, handle, state };
    }

    /// Panel for the last synced state.
    pub fn render(&self) -> Panel {
        let data = match &self.primary_state {
            QueryState::Pending => return Panel::Loading,
            QueryState::Failed { error, .. } => return Panel::Failed(error.clone()),
            QueryState::Resolved(d) | QueryState::Stale(d) => d,
        };
        let w = match Workload::from_json(data) {
            Ok(w) => w,
            Err(e) => return Panel::Failed(e),
        };
        let (children, children_refreshing) = match &self.children {
            ChildSlot::Waiting => (ChildRows::Loading, false),
            ChildSlot::NoSelector(e) => (ChildRows::Failed(e.clone()), false),
            ChildSlot::Query { state, .. } => (ChildRows::from_state(&self.target.scope, state), state.is_refreshing()),
        };
        Panel::Ready(WorkloadPanel {
            scope: self.target.scope.clone(),
            kind: self.target.kind,
            name: w.name,
            replicas: self.buffer.value(),
            dirty: self.buffer.is_dirty(),
            desired: w.desired_replicas,
            ready: w.ready_replicas,
            available: w.available_replicas,
            updated: w.updated_replicas,
            refreshing: self.primary_state.is_refreshing() || children_refreshing,
            children,
            notice: self.notice.clone(),
        })
    }

    fn busy(&self) -> bool {
        if !self.primary_state.is_settled() {
            return true;
        }
        match &self.children {
            ChildSlot::Query { state, .. } => !state.is_settled(),
            _ => false,
        }
    }

    /// Sync until neither query is pending or revalidating, then render.
    pub async fn settle(&mut self) -> Panel {
        loop {
            self.sync();
            if !self.busy() {
                return self.render();
            }
            let primary = &mut self.primary;
            match &mut self.children {
                ChildSlot::Query { handle, .. } => {
                    tokio::select! {
                        _ = primary.changed() => {}
                        _ = handle.changed() => {}
                    }
                }
                _ => {
                    primary.changed().await;
                }
            }
        }
    }

    /// Replicas field text input. Anything that is not an integer becomes 0.
    pub fn set_replicas_text(&mut self, raw: &str) {
        self.buffer.set(coerce_text(raw));
    }

    pub fn set_replicas(&mut self, value: i64) {
        self.buffer.set(value);
    }

    /// Scale to the buffered replica count.
    pub fn save(&self) -> Result<MutationTicket, ViewError> {
        match self.buffer.value() {
            Some(n) => self.apply_scale(n),
            None => Err(ValidationError::NotANumber(String::new()).into()),
        }
    }

    /// Validate `input` and issue `scale <kind> <name> --replicas=<n>`. On success
    /// the primary query is revalidated; on failure the notice is set and the
    /// ticket carries the error. The buffer is never rolled back.
    pub fn apply_scale(&self, input: impl Into<ScaleInput>) -> Result<MutationTicket, ViewError> {
        let input = input.into();
        let replicas = input.validate().map_err(|e| {
            warn!(workload = %self.target, input = ?input, error = %e, "view: scale rejected");
            e
        })?;
        let command = Command::scale(self.target.kind, &self.target.name, replicas).to_string();
        let (ticket, done) = MutationTicket::new(command.clone());
        let exec = self.ctx.executor.clone();
        let tx = self.updates_tx.clone();
        let primary = self.primary.clone();
        let scope = self.target.scope.clone();
        info!(scope = %scope, command = %command, replicas, "view: scale start");
        tokio::spawn(async move {
            let res = exec.execute(&scope, &command, false).await.map(|_| ()).map_err(MutationError::from);
            match &res {
                Ok(()) => {
                    info!(scope = %scope, command = %command, "view: scale ok");
                    if tx.send(ViewUpdate::Scaled { replicas }).is_ok() {
                        primary.revalidate();
                    }
                }
                Err(e) => {
                    warn!(scope = %scope, command = %command, error = %e, "view: scale failed");
                    let _ = tx.send(ViewUpdate::ScaleFailed(e.clone()));
                }
            }
            let _ = done.send(res);
        });
        Ok(ticket)
    }

    /// Issue `delete <kind> <name>`; on success navigate to the scope's collection.
    pub fn delete_resource(&self) -> MutationTicket<DeleteOutcome> {
        let command = Command::delete(self.target.kind, &self.target.name).to_string();
        let (ticket, done) = MutationTicket::new(command.clone());
        let exec = self.ctx.executor.clone();
        let nav = self.ctx.navigator.clone();
        let tx = self.updates_tx.clone();
        let scope = self.target.scope.clone();
        let route = routes::collection(&scope, self.target.kind);
        info!(scope = %scope, command = %command, "view: delete start");
        tokio::spawn(async move {
            let res = match exec.execute(&scope, &command, false).await {
                Ok(_) => {
                    info!(scope = %scope, command = %command, "view: delete ok");
                    let navigated = tx.send(ViewUpdate::Deleted).is_ok();
                    if navigated {
                        nav.navigate(&route);
                    }
                    Ok(DeleteOutcome { route, navigated })
                }
                Err(e) => {
                    let e = MutationError::from(e);
                    error!(scope = %scope, command = %command, error = %e, "view: delete failed");
                    let _ = tx.send(ViewUpdate::DeleteFailed(e.clone()));
                    Err(e)
                }
            };
            let _ = done.send(res);
        });
        ticket
    }

    /// Navigate to the workload's edit route.
    pub fn request_edit(&self) -> String {
        let path = routes::edit(&self.target.scope, self.target.kind, &self.target.name);
        self.ctx.navigator.navigate(&path);
        path
    }

    /// Navigate to a pod's info route.
    pub fn open_child(&self, pod: &str) -> String {
        let path = routes::pod_info(&self.target.scope, pod);
        self.ctx.navigator.navigate(&path);
        path
    }

    /// Revalidate the primary and, when keyed, the pods query.
    pub fn refresh(&self) {
        debug!(workload = %self.target, "view: refresh");
        self.primary.revalidate();
        if let ChildSlot::Query { handle, .. } = &self.children {
            handle.revalidate();
        }
    }
}

impl Drop for WorkloadView {
    fn drop(&mut self) {
        debug!(workload = %self.target, "view: unmount");
    }
}
