use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    coordinate::validate,
    error::MockError,
    host::HostHandle,
    service_state::{ServiceState, ServiceStateReceiver},
    settings::MockSettings,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, specta::Type)]
/// Everything the UI needs to render the mock location screen
pub struct UiState {
    pub is_mocking: bool,
    /// A request was sent to the host and no answer has come back yet
    pub is_loading: bool,
    /// Latitude field text, not necessarily valid
    pub latitude: String,
    /// Longitude field text, not necessarily valid
    pub longitude: String,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
}

impl UiState {
    /// Fold a new host snapshot into the UI state
    fn apply(&mut self, service: &ServiceState) {
        let was_mocking = self.is_mocking;

        self.is_mocking = service.is_mocking;
        self.is_loading = false;

        if let Some(why) = &service.error_message {
            self.error_message = Some(why.clone());
        }

        if service.is_mocking {
            self.success_message = Some(format!(
                "Mock location active at {}, {}",
                service.latitude, service.longitude
            ));
            // Coming back to an already running session should show where it is
            self.latitude = service.latitude.to_string();
            self.longitude = service.longitude.to_string();
        } else if was_mocking {
            self.success_message = Some("Mock location disabled".to_string());
        }
    }
}

/// UI-facing side of mocking: holds the form state, validates input, and
/// forwards requests to the host without waiting on it. Dropping the
/// controller only stops it following the host, mocking continues.
pub struct MockLocationController {
    host: HostHandle,
    ui: Arc<watch::Sender<UiState>>,
    _follower: DropGuard,
}

impl MockLocationController {
    /// Create a controller following `host`. The follower task is spawned on
    /// the current runtime, so this must be called from within one.
    pub fn new(host: HostHandle, settings: &MockSettings) -> Self {
        let mut service = host.subscribe();
        let mut initial = UiState {
            latitude: settings.default_latitude.clone(),
            longitude: settings.default_longitude.clone(),
            ..Default::default()
        };
        initial.apply(&service.current_and_mark_seen());
        let ui = Arc::new(watch::Sender::new(initial));

        let cancel = CancellationToken::new();
        Self::follow_host(service, ui.clone(), cancel.clone());

        Self {
            host,
            ui,
            _follower: cancel.drop_guard(),
        }
    }

    fn follow_host(
        mut service: ServiceStateReceiver,
        ui: Arc<watch::Sender<UiState>>,
        cancel: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    next = service.changed() => match next {
                        Some(state) => ui.send_modify(|s| s.apply(&state)),
                        None => {
                            debug!("Host went away, no more service updates");
                            break;
                        }
                    },
                }
            }
        });
    }

    /// Watch the UI state, the latest value is available immediately
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.ui.subscribe()
    }

    pub fn ui_state(&self) -> UiState {
        self.ui.borrow().clone()
    }

    pub fn update_latitude(&self, text: &str) {
        self.ui.send_modify(|s| {
            s.latitude = text.to_string();
            s.error_message = None;
        });
    }

    pub fn update_longitude(&self, text: &str) {
        self.ui.send_modify(|s| {
            s.longitude = text.to_string();
            s.error_message = None;
        });
    }

    pub fn clear_messages(&self) {
        self.ui.send_modify(|s| {
            s.error_message = None;
            s.success_message = None;
        });
    }

    /// Validate the entered coordinates and ask the host to start mocking.
    ///
    /// An `Err` means the host was never contacted, the message is also put
    /// in [UiState::error_message].
    pub fn request_start(&self, lat_text: &str, lng_text: &str) -> Result<(), MockError> {
        self.ui.send_modify(|s| {
            s.latitude = lat_text.to_string();
            s.longitude = lng_text.to_string();
        });

        let res = validate(lat_text, lng_text).and_then(|coord| {
            self.begin_request();
            self.host.request_start(coord)
        });

        if let Err(why) = &res {
            self.fail_request(why);
        }

        res
    }

    /// Ask the host to stop mocking
    pub fn request_stop(&self) -> Result<(), MockError> {
        self.begin_request();
        let res = self.host.request_stop();
        if let Err(why) = &res {
            self.fail_request(why);
        }
        res
    }

    fn begin_request(&self) {
        self.ui.send_modify(|s| {
            s.is_loading = true;
            s.error_message = None;
            s.success_message = None;
        });
    }

    fn fail_request(&self, why: &MockError) {
        self.ui.send_modify(|s| {
            s.is_loading = false;
            s.error_message = Some(why.to_string());
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{test, time::timeout};

    use super::*;
    use crate::{
        PersistentTaskHost,
        host::HostRuntime,
        tests::{DummyNotifier, FakeLocationBackend},
    };

    const WAIT: Duration = Duration::from_secs(30);

    fn mk_controller(backend: &FakeLocationBackend) -> (MockLocationController, HostRuntime) {
        tokio::time::pause();
        let settings = MockSettings::default();
        let (handle, runtime) =
            PersistentTaskHost::spawn(backend.clone(), DummyNotifier, settings.clone());
        (MockLocationController::new(handle, &settings), runtime)
    }

    async fn wait_ui(
        ctrl: &MockLocationController,
        f: impl FnMut(&UiState) -> bool,
    ) -> UiState {
        let mut rx = ctrl.subscribe();
        let state = timeout(WAIT, rx.wait_for(f))
            .await
            .expect("Timed out waiting for UI state")
            .expect("UI state sender dropped")
            .clone();
        state
    }

    #[std::prelude::v1::test]
    fn test_new_inside_entered_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("Failed to build runtime");
        let _guard = rt.enter();

        let settings = MockSettings::default();
        let (handle, _runtime) =
            PersistentTaskHost::spawn(FakeLocationBackend::default(), DummyNotifier, settings.clone());
        let ctrl = MockLocationController::new(handle, &settings);
        assert_eq!(ctrl.ui_state().latitude, "35.6762");
    }

    #[test]
    async fn test_initial_fields() {
        let backend = FakeLocationBackend::default();
        let (ctrl, _runtime) = mk_controller(&backend);
        let state = ctrl.ui_state();
        assert_eq!(state.latitude, "35.6762");
        assert_eq!(state.longitude, "139.6503");
        assert!(!state.is_mocking);
        assert!(!state.is_loading);
    }

    #[test]
    async fn test_start_and_stop() {
        let backend = FakeLocationBackend::default();
        let (ctrl, _runtime) = mk_controller(&backend);

        ctrl.request_start("35.6762", "139.6503")
            .expect("Request rejected");
        assert!(ctrl.ui_state().is_loading);

        let state = wait_ui(&ctrl, |s| s.is_mocking && !s.is_loading).await;
        assert_eq!(
            state.success_message.as_deref(),
            Some("Mock location active at 35.6762, 139.6503")
        );
        assert!(state.error_message.is_none());
        assert!(backend.is_enabled("gps"));

        ctrl.request_stop().expect("Request rejected");
        let state = wait_ui(&ctrl, |s| !s.is_mocking && !s.is_loading).await;
        assert_eq!(state.success_message.as_deref(), Some("Mock location disabled"));
        assert_eq!(backend.registered_count(), 0);
    }

    #[test]
    async fn test_invalid_latitude_never_reaches_host() {
        let backend = FakeLocationBackend::default();
        let (ctrl, _runtime) = mk_controller(&backend);

        let res = ctrl.request_start("abc", "139.6503");
        match res {
            Err(MockError::InvalidCoordinates(detail)) => assert!(detail.contains("Latitude")),
            other => panic!("Expected InvalidCoordinates, got {other:?}"),
        }

        let state = ctrl.ui_state();
        assert!(!state.is_mocking);
        assert!(!state.is_loading);
        assert_eq!(state.latitude, "abc");
        assert!(
            state
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("Latitude"))
        );
        assert!(backend.calls().is_empty());
    }

    #[test]
    async fn test_host_error_is_shown() {
        let backend = FakeLocationBackend::default();
        backend.with(|r| r.developer_mode = Ok(false));
        let (ctrl, _runtime) = mk_controller(&backend);

        ctrl.request_start("1", "2").expect("Request rejected");
        let state = wait_ui(&ctrl, |s| !s.is_loading).await;

        assert!(!state.is_mocking);
        assert_eq!(
            state.error_message,
            Some(MockError::DeveloperOptionsDisabled.to_string())
        );
    }

    #[test]
    async fn test_editing_clears_error() {
        let backend = FakeLocationBackend::default();
        let (ctrl, _runtime) = mk_controller(&backend);

        ctrl.request_start("1", "999").ok();
        assert!(ctrl.ui_state().error_message.is_some());

        ctrl.update_longitude("99");
        let state = ctrl.ui_state();
        assert!(state.error_message.is_none());
        assert_eq!(state.longitude, "99");

        ctrl.update_latitude("-12.5");
        assert_eq!(ctrl.ui_state().latitude, "-12.5");
    }

    #[test]
    async fn test_clear_messages() {
        let backend = FakeLocationBackend::default();
        let (ctrl, _runtime) = mk_controller(&backend);

        ctrl.request_start("1", "2").expect("Request rejected");
        wait_ui(&ctrl, |s| s.success_message.is_some()).await;

        ctrl.clear_messages();
        let state = ctrl.ui_state();
        assert!(state.success_message.is_none());
        assert!(state.error_message.is_none());
        assert!(state.is_mocking);
    }

    #[test]
    async fn test_new_controller_restores_running_session() {
        let backend = FakeLocationBackend::default();
        let (ctrl, _runtime) = mk_controller(&backend);

        ctrl.request_start("48.8566", "2.3522").expect("Request rejected");
        wait_ui(&ctrl, |s| s.is_mocking).await;

        let handle = ctrl.host.clone();
        drop(ctrl);

        let fresh = MockLocationController::new(handle, &MockSettings::default());
        let state = wait_ui(&fresh, |s| s.is_mocking).await;
        assert_eq!(state.latitude, "48.8566");
        assert_eq!(state.longitude, "2.3522");
    }

    #[test]
    async fn test_dropping_controller_keeps_mocking() {
        let backend = FakeLocationBackend::default();
        let (ctrl, runtime) = mk_controller(&backend);

        ctrl.request_start("1", "2").expect("Request rejected");
        wait_ui(&ctrl, |s| s.is_mocking).await;
        drop(ctrl);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(backend.is_enabled("gps"));
        assert!(backend.fixes("gps").len() > 1);
        assert!(!runtime.is_finished());
    }
}
