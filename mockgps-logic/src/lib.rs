mod controller;
mod coordinate;
mod error;
mod host;
mod provider;
mod scheduler;
mod service_state;
mod settings;

pub use controller::{MockLocationController, UiState};
pub use coordinate::{MockCoordinate, UtcDT, validate};
pub use error::{BackendError, MockError};
pub use host::{HostHandle, HostPhase, HostRuntime, PersistentTaskHost, StatusNotifier};
pub use provider::{
    LocationBackend, ProviderAccuracy, ProviderLifecycleManager, ProviderPowerUsage,
    ProviderProperties, ProviderSession,
};
pub use scheduler::RefreshScheduler;
pub use service_state::{ServiceState, ServiceStatePublisher, ServiceStateReceiver, channel};
pub use settings::MockSettings;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
