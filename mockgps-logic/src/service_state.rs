use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, specta::Type)]
/// Snapshot of what the host is doing, always replaced as a whole
pub struct ServiceState {
    pub is_mocking: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub error_message: Option<String>,
}

impl ServiceState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn mocking(latitude: f64, longitude: f64) -> Self {
        Self {
            is_mocking: true,
            latitude,
            longitude,
            error_message: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            error_message: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Create a state cell initialized to "not mocking". There's exactly one
/// publisher, receivers can be cloned freely.
pub fn channel() -> (ServiceStatePublisher, ServiceStateReceiver) {
    let (tx, rx) = watch::channel(ServiceState::idle());
    (ServiceStatePublisher(tx), ServiceStateReceiver(rx))
}

/// Write side of the service state, owned by the host
pub struct ServiceStatePublisher(watch::Sender<ServiceState>);

impl ServiceStatePublisher {
    /// Replace the snapshot and wake every receiver, even if nothing changed
    pub fn publish(&self, state: ServiceState) {
        self.0.send_replace(state);
    }

    pub fn current(&self) -> ServiceState {
        self.0.borrow().clone()
    }

    pub fn subscribe(&self) -> ServiceStateReceiver {
        ServiceStateReceiver(self.0.subscribe())
    }
}

#[derive(Clone)]
/// Read side of the service state, a new receiver sees the latest snapshot
/// right away
pub struct ServiceStateReceiver(watch::Receiver<ServiceState>);

impl ServiceStateReceiver {
    pub fn current(&self) -> ServiceState {
        self.0.borrow().clone()
    }

    /// Get the latest snapshot and mark it as seen
    pub fn current_and_mark_seen(&mut self) -> ServiceState {
        self.0.borrow_and_update().clone()
    }

    /// Wait for the next snapshot, [None] once the publisher is gone
    pub async fn changed(&mut self) -> Option<ServiceState> {
        self.0.changed().await.ok()?;
        Some(self.0.borrow_and_update().clone())
    }

    /// Wait until a snapshot matches `f`, checking the current one first
    pub async fn wait_for(&mut self, f: impl FnMut(&ServiceState) -> bool) -> Option<ServiceState> {
        self.0.wait_for(f).await.ok().map(|s| s.clone())
    }
}
