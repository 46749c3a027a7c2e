#![forbid(unsafe_code)]

use std::sync::Mutex;

use kdeck_core::WorkloadKind;
use tracing::info;

/// Receives route changes. Fire-and-forget.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Logs each route.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        info!(path = %path, "navigate");
    }
}

/// Keeps every route it is sent, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self { Self::default() }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<String> { self.paths().pop() }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        info!(path = %path, "navigate (recorded)");
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).push(path.to_string());
    }
}

pub mod routes {
    use super::WorkloadKind;

    /// `/<scope>/<plural>`
    pub fn collection(scope: &str, kind: WorkloadKind) -> String {
        format!("/{}/{}", scope, kind.plural())
    }

    /// `/<scope>/<plural>/<name>/edit`
    pub fn edit(scope: &str, kind: WorkloadKind, name: &str) -> String {
        format!("/{}/{}/{}/edit", scope, kind.plural(), name)
    }

    /// `/<scope>/pods/<name>/info`
    pub fn pod_info(scope: &str, pod: &str) -> String {
        format!("/{}/pods/{}/info", scope, pod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_shapes() {
        assert_eq!(routes::collection("default", WorkloadKind::Deployment), "/default/deployments");
        assert_eq!(routes::edit("prod", WorkloadKind::StatefulSet, "db"), "/prod/statefulsets/db/edit");
        assert_eq!(routes::pod_info("default", "web-1"), "/default/pods/web-1/info");
    }

    #[test]
    fn recording_navigator_keeps_order() {
        let nav = RecordingNavigator::new();
        nav.navigate("/a");
        nav.navigate("/b");
        assert_eq!(nav.paths(), vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(nav.last().as_deref(), Some("/b"));
    }
}
