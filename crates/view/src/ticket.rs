#![forbid(unsafe_code)]

use kdeck_core::MutationError;
use serde::Serialize;
use tokio::sync::oneshot;

/// Completion handle of one mutation. Awaiting it is optional; dropping it does
/// not cancel the command.
#[derive(Debug)]
pub struct MutationTicket<T = ()> {
    command: String,
    rx: oneshot::Receiver<Result<T, MutationError>>,
}

impl<T> MutationTicket<T> {
    pub(crate) fn new(command: String) -> (Self, oneshot::Sender<Result<T, MutationError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { command, rx }, tx)
    }

    /// Command string that was issued.
    pub fn command(&self) -> &str { &self.command }

    pub async fn wait(self) -> Result<T, MutationError> {
        self.rx.await.unwrap_or(Err(MutationError::Abandoned))
    }
}

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Collection route for the workload's scope.
    pub route: String,
    /// False when the view was gone before the delete completed.
    pub navigated: bool,
}
