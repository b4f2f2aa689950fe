use serde::{Deserialize, Serialize};

/// Every way mocking a location can fail, carried in the `Err` side of each
/// fallible operation. The `Display` output is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error, specta::Type)]
pub enum MockError {
    /// Developer mode is off, the user has to enable it in system settings
    #[error(
        "Developer Options are not enabled. Go to Settings -> About Phone -> Tap Build Number 7 times."
    )]
    DeveloperOptionsDisabled,
    /// The OS refused us as a mock location source
    #[error(
        "This app is not selected as the mock location app. Go to Developer Options -> Select mock location app -> Choose this app."
    )]
    MockLocationAppNotSelected,
    /// Caller input could not be parsed or is out of range
    #[error("{0}")]
    InvalidCoordinates(String),
    /// Anything else the OS threw at us, surfaced verbatim
    #[error("{0}")]
    Unknown(String),
}

/// Failure reported by a [crate::LocationBackend] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The OS rejected the call because we lack the mock location privilege
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Failure(String),
}

impl From<BackendError> for MockError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::PermissionDenied(_) => MockError::MockLocationAppNotSelected,
            BackendError::Failure(why) => MockError::Unknown(why),
        }
    }
}
