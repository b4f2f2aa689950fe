mod requests;
mod simulated;

use std::path::Path;

use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use mockgps_logic::{MockSettings, UiState};
use serde::{Deserialize, Serialize};

pub use requests::handle_request;
pub use simulated::{SimulatedLocationBackend, SimulatedProvider};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

/// Parse host settings from JSON, missing fields take their defaults
pub fn parse_settings(raw: &str) -> Result<MockSettings> {
    serde_json::from_str(raw).context("Failed to parse settings")
}

/// Load host settings from `path`, or the defaults if there's no file
pub fn load_settings(path: Option<&Path>) -> Result<MockSettings> {
    let Some(path) = path else {
        return Ok(MockSettings::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    parse_settings(&raw)
}

/// A line of JSON sent from the driver to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum HostRequest {
    Start { latitude: String, longitude: String },
    Stop,
    Status,
    ClearMessages,
}

impl HostRequest {
    /// Whether the daemon should keep streaming until the host answers
    pub fn awaits_host(&self) -> bool {
        matches!(self, Self::Start { .. } | Self::Stop)
    }
}

/// A line of JSON sent from the daemon to the driver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HostResponse {
    State(UiState),
    Error(String),
}

impl From<UiState> for HostResponse {
    fn from(val: UiState) -> Self {
        HostResponse::State(val)
    }
}

impl From<anyhow::Error> for HostResponse {
    fn from(value: anyhow::Error) -> Self {
        HostResponse::Error(value.to_string())
    }
}

impl From<mockgps_logic::MockError> for HostResponse {
    fn from(value: mockgps_logic::MockError) -> Self {
        HostResponse::Error(value.to_string())
    }
}

/// Encode a message as a single newline terminated JSON line
pub fn encode_line(msg: &impl Serialize) -> Result<Vec<u8>> {
    let mut encoded = serde_json::to_vec(msg).context("Failed to encode message")?;
    encoded.push(b'\n');
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_lines_are_single_lines() {
        let req = HostRequest::Start {
            latitude: "35.6762".to_string(),
            longitude: "139.6503".to_string(),
        };
        let line = encode_line(&req).expect("Failed to encode");
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(line.last(), Some(&b'\n'));

        let decoded: HostRequest =
            serde_json::from_slice(&line).expect("Failed to decode");
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings = parse_settings(r#"{ "refresh_interval_ms": 500, "provider_name": "fused" }"#)
            .expect("Failed to parse");
        assert_eq!(settings.refresh_interval_ms, 500);
        assert_eq!(settings.provider_name, "fused");
        assert_eq!(settings.probe_provider_name, MockSettings::default().probe_provider_name);
        assert_eq!(settings.accuracy, 5.0);
    }

    #[test]
    fn test_bad_settings_are_an_error() {
        assert!(parse_settings("{ \"refresh_interval_ms\": \"soon\" }").is_err());
        assert!(load_settings(None).is_ok_and(|s| s == MockSettings::default()));
    }

    #[test]
    fn test_only_transitions_await_host() {
        assert!(HostRequest::Stop.awaits_host());
        assert!(!HostRequest::Status.awaits_host());
        assert!(!HostRequest::ClearMessages.awaits_host());
    }
}
