use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::debug;
use mockgps_logic::{BackendError, LocationBackend, MockCoordinate, ProviderProperties};

#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    pub properties: ProviderProperties,
    pub enabled: bool,
    pub last_fix: Option<MockCoordinate>,
    pub fix_count: usize,
}

#[derive(Debug)]
struct Registry {
    developer_mode: bool,
    authorized: bool,
    providers: HashMap<String, SimulatedProvider>,
}

#[derive(Debug, Clone)]
/// In-memory OS provider registry for running the host off-device. Clones
/// share the same registry.
pub struct SimulatedLocationBackend(Arc<Mutex<Registry>>);

impl SimulatedLocationBackend {
    pub fn new(developer_mode: bool, authorized: bool) -> Self {
        Self(Arc::new(Mutex::new(Registry {
            developer_mode,
            authorized,
            providers: HashMap::new(),
        })))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>, BackendError> {
        self.0
            .lock()
            .map_err(|_| BackendError::Failure("location registry poisoned".to_string()))
    }

    pub fn provider(&self, name: &str) -> Option<SimulatedProvider> {
        self.lock().ok()?.providers.get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.lock()
            .map(|r| r.providers.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn with_provider<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut SimulatedProvider) -> T,
    ) -> Result<T, BackendError> {
        let mut registry = self.lock()?;
        if !registry.authorized {
            return Err(BackendError::PermissionDenied(
                "caller is not the selected mock location app".to_string(),
            ));
        }
        registry
            .providers
            .get_mut(name)
            .map(f)
            .ok_or_else(|| BackendError::Failure(format!("Provider \"{name}\" unknown")))
    }
}

impl LocationBackend for SimulatedLocationBackend {
    fn developer_mode_enabled(&self) -> Result<bool, BackendError> {
        Ok(self.lock()?.developer_mode)
    }

    fn mock_location_setting(&self) -> Result<Option<String>, BackendError> {
        let authorized = self.lock()?.authorized;
        Ok(authorized.then(|| "1".to_string()))
    }

    fn register_provider(
        &mut self,
        name: &str,
        properties: &ProviderProperties,
    ) -> Result<(), BackendError> {
        let mut registry = self.lock()?;
        if !registry.authorized {
            return Err(BackendError::PermissionDenied(
                "caller is not the selected mock location app".to_string(),
            ));
        }
        debug!("Registering simulated provider {name}");
        registry.providers.insert(
            name.to_string(),
            SimulatedProvider {
                properties: *properties,
                enabled: false,
                last_fix: None,
                fix_count: 0,
            },
        );
        Ok(())
    }

    fn set_provider_enabled(&mut self, name: &str, enabled: bool) -> Result<(), BackendError> {
        self.with_provider(name, |p| p.enabled = enabled)
    }

    fn push_location(&mut self, name: &str, fix: &MockCoordinate) -> Result<(), BackendError> {
        self.with_provider(name, |p| {
            p.last_fix = Some(*fix);
            p.fix_count += 1;
        })
    }

    fn unregister_provider(&mut self, name: &str) -> Result<(), BackendError> {
        let mut registry = self.lock()?;
        debug!("Removing simulated provider {name}");
        registry
            .providers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BackendError::Failure(format!("Provider \"{name}\" unknown")))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockgps_logic::{
        MockError, MockSettings, PersistentTaskHost, ProviderLifecycleManager, StatusNotifier,
    };
    use tokio::test;

    use super::*;

    struct Quiet;

    impl StatusNotifier for Quiet {
        fn mocking_started(&self, _coord: &MockCoordinate) {}
        fn mocking_stopped(&self) {}
    }

    fn mk_coord() -> MockCoordinate {
        MockCoordinate::new(35.6762, 139.6503).expect("Valid coordinate")
    }

    #[test]
    async fn test_host_over_simulated_registry() {
        tokio::time::pause();
        let backend = SimulatedLocationBackend::new(true, true);
        let (handle, runtime) =
            PersistentTaskHost::spawn(backend.clone(), Quiet, MockSettings::default());

        handle.start(mk_coord()).await.expect("Failed to start");

        let provider = backend.provider("gps").expect("Provider not registered");
        assert!(provider.enabled);
        assert_eq!(provider.properties, ProviderProperties::SYNTHETIC);

        tokio::time::sleep(Duration::from_millis(4100)).await;
        tokio::task::yield_now().await;
        let provider = backend.provider("gps").expect("Provider not registered");
        assert!(provider.fix_count >= 3, "Got {} fixes", provider.fix_count);

        runtime.shutdown().await.expect("Shutdown failed");
        assert!(backend.provider_names().is_empty());
    }

    #[test]
    async fn test_unauthorized_registry_denies() {
        let backend = SimulatedLocationBackend::new(true, false);
        let mut manager = ProviderLifecycleManager::new(backend.clone(), &MockSettings::default());

        assert!(!manager.is_app_authorized_as_mock_source());
        assert_eq!(manager.start(), Err(MockError::MockLocationAppNotSelected));
        assert!(backend.provider_names().is_empty());
    }

    #[test]
    async fn test_developer_mode_off() {
        let backend = SimulatedLocationBackend::new(false, true);
        let mut manager = ProviderLifecycleManager::new(backend.clone(), &MockSettings::default());

        assert!(!manager.is_developer_mode_enabled());
        assert_eq!(manager.start(), Err(MockError::DeveloperOptionsDisabled));
    }
}
