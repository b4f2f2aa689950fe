use std::ops::RangeInclusive;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::MockError, settings::MockSettings};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;

pub const DEFAULT_ACCURACY: f32 = 5.0;
pub const DEFAULT_ALTITUDE: f64 = 0.0;
pub const DEFAULT_SPEED: f32 = 0.0;
pub const DEFAULT_BEARING: f32 = 0.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A single fabricated fix as it gets pushed into the synthetic provider
pub struct MockCoordinate {
    /// Latitude in degrees, always within [-90, 90]
    pub latitude: f64,
    /// Longitude in degrees, always within [-180, 180]
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f32,
    pub altitude: f64,
    pub speed: f32,
    pub bearing: f32,
    /// When this fix was produced, strictly increases across refreshes
    pub timestamp: UtcDT,
}

fn check_range(name: &str, value: f64, range: &RangeInclusive<f64>) -> Result<f64, MockError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(MockError::InvalidCoordinates(format!(
            "{name} must be between {:.1} and {:.1}, got: {value}",
            range.start(),
            range.end()
        )))
    }
}

fn parse_component(name: &str, text: &str, range: &RangeInclusive<f64>) -> Result<f64, MockError> {
    let value = text.trim().parse::<f64>().map_err(|_| {
        MockError::InvalidCoordinates(format!("{name} must be a number, got: \"{text}\""))
    })?;
    check_range(name, value, range)
}

/// Parse and range check a latitude / longitude pair entered as text.
///
/// Latitude is checked first, so when both are bad the error cites latitude.
pub fn validate(lat_text: &str, lng_text: &str) -> Result<MockCoordinate, MockError> {
    let latitude = parse_component("Latitude", lat_text, &LATITUDE_RANGE)?;
    let longitude = parse_component("Longitude", lng_text, &LONGITUDE_RANGE)?;
    Ok(MockCoordinate::unchecked(latitude, longitude))
}

impl MockCoordinate {
    /// Build a fix with default attributes, rejecting out of range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MockError> {
        let coord = Self::unchecked(latitude, longitude);
        coord.check()?;
        Ok(coord)
    }

    fn unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: DEFAULT_ACCURACY,
            altitude: DEFAULT_ALTITUDE,
            speed: DEFAULT_SPEED,
            bearing: DEFAULT_BEARING,
            timestamp: Utc::now(),
        }
    }

    /// Range check this coordinate, NaN and infinities are rejected too.
    pub fn check(&self) -> Result<(), MockError> {
        check_range("Latitude", self.latitude, &LATITUDE_RANGE)?;
        check_range("Longitude", self.longitude, &LONGITUDE_RANGE)?;
        Ok(())
    }

    /// Same position, with the fix attributes configured in `settings`
    pub fn with_attributes(&self, settings: &MockSettings) -> Self {
        Self {
            accuracy: settings.accuracy,
            altitude: settings.altitude,
            speed: settings.speed,
            bearing: settings.bearing,
            ..*self
        }
    }

    /// A copy of this fix stamped with a newer timestamp
    pub fn refreshed(&self) -> Self {
        let now = Utc::now();
        let timestamp = if now > self.timestamp {
            now
        } else {
            self.timestamp + TimeDelta::microseconds(1)
        };
        Self { timestamp, ..*self }
    }

    /// Whether two fixes describe the same position, ignoring time
    pub fn same_position(&self, other: &Self) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}
