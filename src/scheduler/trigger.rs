use std::sync::Arc;

use tokio::sync::Notify;

/// Requests an immediate balance, stats and history refresh.
///
/// Firing while no refresh loop is waiting stores a single permit, so a burst of
/// fires collapses into one refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshTrigger(Arc<Notify>);

impl RefreshTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.notify_one();
    }

    /// Resolves on the next fire (or immediately if a permit is stored).
    pub async fn notified(&self) {
        self.0.notified().await;
    }
}
