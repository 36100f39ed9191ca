//! Domain entities built from accepted webhooks.
//!
//! `EnvironmentData` can only be obtained through a validating constructor,
//! so any value of the type satisfies the temperature, humidity and
//! brightness rules. It is immutable once built.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::DomainError,
    events::{Hub2Event, MAX_LIGHT_LEVEL, MIN_LIGHT_LEVEL},
};

/// Accepted temperature range in degrees Celsius.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -50.0..=60.0;

/// Accepted relative humidity range in percent.
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Accepted brightness range in percent.
pub const BRIGHTNESS_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// A validated room environment sample.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use switchhook_core::models::EnvironmentData;
///
/// let data = EnvironmentData::new("AA:BB:CC:DD:EE:FF", Utc::now(), 22.0, 45.0, 50.0).unwrap();
/// assert_eq!(data.device_id(), "AA:BB:CC:DD:EE:FF");
///
/// assert!(EnvironmentData::new("AA:BB:CC:DD:EE:FF", Utc::now(), 75.0, 45.0, 50.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentData {
    device_id: String,
    timestamp: DateTime<Utc>,
    temperature: f64,
    humidity: f64,
    brightness: f64,
}

impl EnvironmentData {
    /// Builds a sample, enforcing every business rule.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule, checked in the order temperature,
    /// humidity, brightness. NaN fails every range.
    pub fn new(
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        temperature: f64,
        humidity: f64,
        brightness: f64,
    ) -> Result<Self, DomainError> {
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(DomainError::TemperatureOutOfRange { value: temperature });
        }
        if !HUMIDITY_RANGE.contains(&humidity) {
            return Err(DomainError::HumidityOutOfRange { value: humidity });
        }
        if !BRIGHTNESS_RANGE.contains(&brightness) {
            return Err(DomainError::BrightnessOutOfRange { value: brightness });
        }

        Ok(Self { device_id: device_id.into(), timestamp, temperature, humidity, brightness })
    }

    /// Maps a Hub 2 light level (1..=20) linearly onto 0..=100 %.
    ///
    /// Level 1 is 0 %, level 20 is 100 %. Values outside the device range
    /// are rejected rather than clamped.
    pub fn convert_light_level_to_brightness(light_level: f64) -> Result<f64, DomainError> {
        if !(MIN_LIGHT_LEVEL..=MAX_LIGHT_LEVEL).contains(&light_level) {
            return Err(DomainError::LightLevelOutOfRange { value: light_level });
        }

        Ok((light_level - MIN_LIGHT_LEVEL) / (MAX_LIGHT_LEVEL - MIN_LIGHT_LEVEL) * 100.0)
    }

    /// Device identifier (the reporting device's MAC address).
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Time the sample was taken.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Temperature in degrees Celsius.
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity in percent.
    pub const fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Brightness in percent.
    pub const fn brightness(&self) -> f64 {
        self.brightness
    }
}

/// Builds an [`EnvironmentData`] from a structurally valid Hub 2 event.
///
/// Converts `timeOfSample` from seconds to an instant, maps the light level
/// to brightness, then lets the entity constructor apply the business rules.
///
/// # Errors
///
/// Returns a `DomainError` when the light level or any derived value
/// violates a rule, or when the sample time overflows.
pub fn build_from_hub2_event(event: &Hub2Event) -> Result<EnvironmentData, DomainError> {
    let context = &event.context;

    let timestamp = context
        .time_of_sample
        .checked_mul(1000)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or(DomainError::InvalidSampleTime { seconds: context.time_of_sample })?;

    let brightness = EnvironmentData::convert_light_level_to_brightness(context.light_level)?;

    EnvironmentData::new(
        context.device_mac.clone(),
        timestamp,
        context.temperature,
        context.humidity,
        brightness,
    )
}

impl TryFrom<&Hub2Event> for EnvironmentData {
    type Error = DomainError;

    fn try_from(event: &Hub2Event) -> Result<Self, Self::Error> {
        build_from_hub2_event(event)
    }
}
