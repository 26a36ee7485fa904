//! In-process execution bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use pagerule_domain::execution::AutomationExecution;

/// Broadcasts executions once they reach a terminal state.
///
/// Publishing succeeds even when there are no active subscribers
/// (the execution is simply dropped).
pub struct ExecutionBus {
    sender: broadcast::Sender<AutomationExecution>,
}

impl ExecutionBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a receiver that will get all executions published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationExecution> {
        self.sender.subscribe()
    }

    pub fn publish(&self, execution: AutomationExecution) {
        // send fails only when there are zero receivers
        let _ = self.sender.send(execution);
    }
}
