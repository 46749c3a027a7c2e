#![forbid(unsafe_code)]

use std::sync::Arc;

use kdeck_core::FetchError;
use serde::Serialize;
use serde_json::Value;

/// Lifecycle of one cached read.
///
/// ```text
/// Pending --ok--> Resolved --revalidate--> Stale --ok--> Resolved
///    |                                       |
///    +--err--> Failed --revalidate--> Stale / Pending (no data yet)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryState {
    /// No data yet, first execution outstanding.
    Pending,
    Resolved(Arc<Value>),
    /// Previously resolved data, served while a re-execution is outstanding.
    Stale(Arc<Value>),
    /// The latest execution failed; `last` keeps the most recent good data.
    Failed { error: FetchError, last: Option<Arc<Value>> },
}

impl QueryState {
    pub fn is_pending(&self) -> bool { matches!(self, QueryState::Pending) }

    /// Resolved or failed: nothing outstanding.
    pub fn is_settled(&self) -> bool { matches!(self, QueryState::Resolved(_) | QueryState::Failed { .. }) }

    pub fn is_refreshing(&self) -> bool { matches!(self, QueryState::Stale(_)) }

    /// Data to render: present for `Resolved` and `Stale`.
    pub fn data(&self) -> Option<&Arc<Value>> {
        match self {
            QueryState::Resolved(v) | QueryState::Stale(v) => Some(v),
            _ => None,
        }
    }

    /// Most recent good data in any state.
    pub fn last_data(&self) -> Option<&Arc<Value>> {
        match self {
            QueryState::Resolved(v) | QueryState::Stale(v) => Some(v),
            QueryState::Failed { last, .. } => last.as_ref(),
            QueryState::Pending => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            QueryState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// State entered when an execution starts. Returns `None` when unchanged.
    pub(crate) fn refetching(&self) -> Option<QueryState> {
        match self {
            QueryState::Pending | QueryState::Stale(_) => None,
            QueryState::Resolved(v) => Some(QueryState::Stale(v.clone())),
            QueryState::Failed { last: Some(v), .. } => Some(QueryState::Stale(v.clone())),
            QueryState::Failed { last: None, .. } => Some(QueryState::Pending),
        }
    }

    /// State entered when an execution completes.
    pub(crate) fn completed(&self, res: Result<Value, FetchError>) -> QueryState {
        match res {
            Ok(v) => QueryState::Resolved(Arc::new(v)),
            Err(error) => QueryState::Failed { error, last: self.last_data().cloned() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transitions_follow_the_lifecycle() {
        let p = QueryState::Pending;
        assert_eq!(p.refetching(), None);
        let r = p.completed(Ok(json!(1)));
        assert_eq!(r.data().map(|v| (**v).clone()), Some(json!(1)));
        let s = r.refetching().unwrap();
        assert!(s.is_refreshing());
        assert_eq!(s.data().map(|v| (**v).clone()), Some(json!(1)));
        assert_eq!(s.refetching(), None);
    }

    #[test]
    fn failure_keeps_last_good_data_for_the_next_refetch() {
        let r = QueryState::Resolved(Arc::new(json!("old")));
        let f = r.completed(Err(FetchError::Decode("x".into())));
        assert!(f.data().is_none());
        assert_eq!(f.last_data().map(|v| (**v).clone()), Some(json!("old")));
        assert!(matches!(f.refetching(), Some(QueryState::Stale(_))));

        let never = QueryState::Pending.completed(Err(FetchError::Decode("x".into())));
        assert_eq!(never.refetching(), Some(QueryState::Pending));
    }
}
