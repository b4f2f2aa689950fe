use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    coordinate::MockCoordinate,
    error::{BackendError, MockError},
    settings::MockSettings,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderPowerUsage {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderAccuracy {
    Fine,
    Coarse,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Capabilities the synthetic provider advertises to the OS when registered
pub struct ProviderProperties {
    pub requires_network: bool,
    pub requires_satellite: bool,
    pub requires_cell: bool,
    pub has_monetary_cost: bool,
    pub supports_altitude: bool,
    pub supports_speed: bool,
    pub supports_bearing: bool,
    pub power_usage: ProviderPowerUsage,
    pub accuracy: ProviderAccuracy,
}

impl ProviderProperties {
    /// A free, self-contained provider with full fix support
    pub const SYNTHETIC: Self = Self {
        requires_network: false,
        requires_satellite: false,
        requires_cell: false,
        has_monetary_cost: false,
        supports_altitude: true,
        supports_speed: true,
        supports_bearing: true,
        power_usage: ProviderPowerUsage::Low,
        accuracy: ProviderAccuracy::Fine,
    };
}

/// The OS location subsystem, everything here touches process-external
/// global state. Implementations decide which failures are permission-class
/// by returning [BackendError::PermissionDenied].
pub trait LocationBackend: Send + 'static {
    /// Read the developer settings flag
    fn developer_mode_enabled(&self) -> Result<bool, BackendError>;
    /// Read the secure setting that records the selected mock location app
    fn mock_location_setting(&self) -> Result<Option<String>, BackendError>;
    /// Register a test provider under `name`
    fn register_provider(
        &mut self,
        name: &str,
        properties: &ProviderProperties,
    ) -> Result<(), BackendError>;
    /// Enable or disable a registered test provider
    fn set_provider_enabled(&mut self, name: &str, enabled: bool) -> Result<(), BackendError>;
    /// Replace the current fix of a registered test provider
    fn push_location(&mut self, name: &str, fix: &MockCoordinate) -> Result<(), BackendError>;
    /// Remove a test provider
    fn unregister_provider(&mut self, name: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A live registration of the synthetic provider, there is at most one per
/// manager
pub struct ProviderSession {
    pub id: Uuid,
    pub provider_name: String,
    pub enabled: bool,
    /// PID of the process that registered the provider
    pub owner_pid: u32,
}

/// Owns the registration of the synthetic location provider. `start` and
/// `stop` are the only operations that create or remove the provider.
pub struct ProviderLifecycleManager<B: LocationBackend> {
    backend: B,
    provider_name: String,
    probe_provider_name: String,
    session: Option<ProviderSession>,
}

impl<B: LocationBackend> ProviderLifecycleManager<B> {
    pub fn new(backend: B, settings: &MockSettings) -> Self {
        Self {
            backend,
            provider_name: settings.provider_name.clone(),
            probe_provider_name: settings.probe_provider_name.clone(),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&ProviderSession> {
        self.session.as_ref()
    }

    /// Whether a session is registered and enabled
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.enabled)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_developer_mode_enabled(&self) -> bool {
        match self.backend.developer_mode_enabled() {
            Ok(enabled) => enabled,
            Err(why) => {
                error!("Failed to check Developer Options status: {why}");
                false
            }
        }
    }

    /// Best-effort check, the OS has no direct API for this. [Self::start] is
    /// the authoritative test.
    pub fn is_app_authorized_as_mock_source(&mut self) -> bool {
        match self.backend.mock_location_setting() {
            Ok(Some(value)) if value == "1" => return true,
            Ok(_) => {}
            Err(why) => {
                warn!("Failed to read the mock location setting: {why}");
            }
        }
        self.probe_registration()
    }

    /// Register and immediately remove a throwaway provider
    fn probe_registration(&mut self) -> bool {
        let name = self.probe_provider_name.clone();
        match self
            .backend
            .register_provider(&name, &ProviderProperties::SYNTHETIC)
        {
            Ok(()) => {
                if let Err(why) = self.backend.unregister_provider(&name) {
                    error!("Failed to remove probe provider {name}: {why}");
                }
                true
            }
            Err(why) => {
                debug!("Probe registration refused: {why}");
                false
            }
        }
    }

    pub fn start(&mut self) -> Result<(), MockError> {
        if let Some(session) = &self.session {
            if session.enabled {
                debug!("Provider {} already registered", self.provider_name);
                return Ok(());
            }
            debug!("Retrying removal of leftover provider {}", session.provider_name);
            self.stop()?;
        }

        if !self.is_developer_mode_enabled() {
            return Err(MockError::DeveloperOptionsDisabled);
        }

        let name = self.provider_name.clone();

        if let Err(why) = self
            .backend
            .register_provider(&name, &ProviderProperties::SYNTHETIC)
        {
            error!("Failed to register provider {name}: {why}");
            return Err(why.into());
        }

        if let Err(why) = self.backend.set_provider_enabled(&name, true) {
            error!("Failed to enable provider {name}: {why}");
            if let Err(why) = self.backend.unregister_provider(&name) {
                error!("Failed to roll back registration of {name}: {why}");
            }
            return Err(why.into());
        }

        let session = ProviderSession {
            id: Uuid::new_v4(),
            provider_name: name,
            enabled: true,
            owner_pid: std::process::id(),
        };
        info!(
            "Registered mock provider {} (session {})",
            session.provider_name, session.id
        );
        self.session = Some(session);

        Ok(())
    }

    pub fn set_location(&mut self, coord: &MockCoordinate) -> Result<(), MockError> {
        if let Err(why) = coord.check() {
            error!("Refusing to push invalid coordinate: {why}");
            return Err(why);
        }

        let Some(session) = self.session.as_ref() else {
            return Err(MockError::Unknown(
                "no active mock location session".to_string(),
            ));
        };

        self.backend
            .push_location(&session.provider_name, coord)
            .map_err(|why| {
                error!("Failed to set mock location: {why}");
                why.into()
            })
    }

    /// Disable and remove the provider. Both steps are always attempted, the
    /// first failure is returned. Succeeds when there's no session.
    ///
    /// If removal fails the session is kept (disabled where possible) so a
    /// later `stop`, `start` or drop retries it.
    pub fn stop(&mut self) -> Result<(), MockError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let name = session.provider_name.clone();

        let disabled = self.backend.set_provider_enabled(&name, false);
        match &disabled {
            Ok(()) => session.enabled = false,
            Err(why) => error!("Failed to disable provider {name}: {why}"),
        }

        let removed = self.backend.unregister_provider(&name);
        match &removed {
            Ok(()) => {
                info!("Removed mock provider {name} (session {})", session.id);
                self.session = None;
            }
            Err(why) => error!("Failed to remove provider {name}, will retry: {why}"),
        }

        disabled.and(removed).map_err(|why| MockError::Unknown(why.to_string()))
    }
}

impl<B: LocationBackend> Drop for ProviderLifecycleManager<B> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Lifecycle manager dropped with a live session, tearing down");
            self.stop().ok();
        }
    }
}
