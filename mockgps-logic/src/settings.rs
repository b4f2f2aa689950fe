use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinate::{DEFAULT_ACCURACY, DEFAULT_ALTITUDE, DEFAULT_BEARING, DEFAULT_SPEED};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Tunables for the mock location host, every field has a sensible default
pub struct MockSettings {
    /// Name the synthetic provider is registered under
    pub provider_name: String,
    /// Name used for the throwaway registration when probing for authorization
    pub probe_provider_name: String,
    /// Time between re-asserting the held coordinate
    pub refresh_interval_ms: u64,
    /// Accuracy stamped on every fix, in meters
    pub accuracy: f32,
    pub altitude: f64,
    pub speed: f32,
    pub bearing: f32,
    /// Initial text of the latitude field in the UI
    pub default_latitude: String,
    /// Initial text of the longitude field in the UI
    pub default_longitude: String,
}

impl MockSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            provider_name: "gps".to_string(),
            probe_provider_name: "test_check_provider".to_string(),
            refresh_interval_ms: 2000,
            accuracy: DEFAULT_ACCURACY,
            altitude: DEFAULT_ALTITUDE,
            speed: DEFAULT_SPEED,
            bearing: DEFAULT_BEARING,
            // Tokyo
            default_latitude: "35.6762".to_string(),
            default_longitude: "139.6503".to_string(),
        }
    }
}
