//! SwitchBot webhook wire types and the two-phase payload parser.
//!
//! Decoding happens in two passes. [`parse_envelope`] only checks the
//! device-agnostic `{eventType, eventVersion, context}` shape. Then
//! [`SwitchBotWebhookEvent::from_envelope`] routes on `context.deviceType`
//! and checks the per-device wire contract. Neither pass looks at business
//! ranges such as plausible temperatures; those belong to
//! [`crate::models::EnvironmentData`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PayloadError;

/// The only `eventType` SwitchBot emits for state changes.
pub const CHANGE_REPORT: &str = "changeReport";

/// Lowest light level a Hub 2 reports.
pub const MIN_LIGHT_LEVEL: f64 = 1.0;

/// Highest light level a Hub 2 reports.
pub const MAX_LIGHT_LEVEL: f64 = 20.0;

/// Devices this service accepts webhooks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Hub 2 temperature, humidity and light sensor.
    #[serde(rename = "WoHub2")]
    Hub2,
    /// Plug Mini (JP) smart plug.
    #[serde(rename = "WoPlugJP")]
    PlugMini,
}

impl DeviceType {
    /// Returns the discriminator string used on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hub2 => "WoHub2",
            Self::PlugMini => "WoPlugJP",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WoHub2" => Ok(Self::Hub2),
            "WoPlugJP" => Ok(Self::PlugMini),
            other => Err(PayloadError::UnsupportedDeviceType(other.to_string())),
        }
    }
}

/// Temperature scale reported by a Hub 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureScale {
    /// Degrees Celsius, the only scale accepted.
    #[serde(rename = "CELSIUS")]
    Celsius,
}

/// Plug Mini relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// Relay closed.
    #[serde(rename = "ON")]
    On,
    /// Relay open.
    #[serde(rename = "OFF")]
    Off,
}

/// Device-agnostic webhook envelope.
///
/// Produced by the first validation pass. `context` is kept as a raw JSON
/// object so the second pass can pick the device-specific shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    /// Event kind, expected to be [`CHANGE_REPORT`].
    pub event_type: String,
    /// Version string of the event schema.
    pub event_version: String,
    /// Device-specific payload.
    pub context: Map<String, Value>,
}

impl WebhookEnvelope {
    /// Resolves the device discriminator from `context.deviceType`.
    ///
    /// A missing or non-string discriminator is reported as an unsupported
    /// device, the same as an unknown one.
    pub fn device_type(&self) -> Result<DeviceType, PayloadError> {
        match self.context.get("deviceType") {
            Some(Value::String(tag)) => tag.parse(),
            Some(other) => Err(PayloadError::UnsupportedDeviceType(other.to_string())),
            None => Err(PayloadError::UnsupportedDeviceType("<missing>".to_string())),
        }
    }
}

/// Hub 2 sensor reading as sent on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hub2Context {
    /// Device MAC address, used as the device identifier.
    pub device_mac: String,
    /// Temperature in [`Hub2Context::scale`] units.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Ambient light level, 1 (dark) to 20 (bright).
    pub light_level: f64,
    /// Temperature scale.
    pub scale: TemperatureScale,
    /// Sample time in seconds since the Unix epoch.
    pub time_of_sample: i64,
}

/// Plug Mini state change as sent on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugMiniContext {
    /// Device MAC address.
    pub device_mac: String,
    /// New relay state.
    pub power_state: PowerState,
    /// Sample time in seconds since the Unix epoch.
    pub time_of_sample: i64,
}

/// Structurally valid Hub 2 webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct Hub2Event {
    /// Version string of the event schema.
    pub event_version: String,
    /// Sensor reading.
    pub context: Hub2Context,
}

/// Structurally valid Plug Mini webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct PlugMiniEvent {
    /// Version string of the event schema.
    pub event_version: String,
    /// State change.
    pub context: PlugMiniContext,
}

/// A webhook from a supported device, tagged by `context.deviceType`.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchBotWebhookEvent {
    /// `WoHub2`
    Hub2(Hub2Event),
    /// `WoPlugJP`
    PlugMini(PlugMiniEvent),
}

impl SwitchBotWebhookEvent {
    /// Second validation pass: discriminate and check the device contract.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDeviceType` for unknown discriminators and
    /// `InvalidStructure` when a known device's context is malformed.
    pub fn from_envelope(envelope: WebhookEnvelope) -> Result<Self, PayloadError> {
        let device_type = envelope.device_type()?;

        if envelope.event_type != CHANGE_REPORT {
            return Err(invalid(
                device_type,
                format!("eventType must be {CHANGE_REPORT:?}, got {:?}", envelope.event_type),
            ));
        }

        let context = Value::Object(envelope.context);
        match device_type {
            DeviceType::Hub2 => {
                let context: Hub2Context = serde_json::from_value(context)
                    .map_err(|e| invalid(device_type, e.to_string()))?;
                validate_hub2(&context).map_err(|reason| invalid(device_type, reason))?;
                Ok(Self::Hub2(Hub2Event { event_version: envelope.event_version, context }))
            },
            DeviceType::PlugMini => {
                let context: PlugMiniContext = serde_json::from_value(context)
                    .map_err(|e| invalid(device_type, e.to_string()))?;
                validate_plug_mini(&context).map_err(|reason| invalid(device_type, reason))?;
                Ok(Self::PlugMini(PlugMiniEvent { event_version: envelope.event_version, context }))
            },
        }
    }

    /// Returns the device discriminator.
    pub const fn device_type(&self) -> DeviceType {
        match self {
            Self::Hub2(_) => DeviceType::Hub2,
            Self::PlugMini(_) => DeviceType::PlugMini,
        }
    }

    /// Returns the reporting device's MAC address.
    pub fn device_mac(&self) -> &str {
        match self {
            Self::Hub2(event) => &event.context.device_mac,
            Self::PlugMini(event) => &event.context.device_mac,
        }
    }
}

/// First validation pass: decode JSON and check the envelope shape.
///
/// # Errors
///
/// - `EmptyBody` for a blank body or a bare JSON `null`
/// - `InvalidJson` when the bytes are not JSON
/// - `InvalidEnvelope` when the JSON lacks `eventType`/`eventVersion`
///   strings or an object `context`
pub fn parse_envelope(body: &[u8]) -> Result<WebhookEnvelope, PayloadError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(PayloadError::EmptyBody);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
    if value.is_null() {
        return Err(PayloadError::EmptyBody);
    }

    WebhookEnvelope::deserialize(value).map_err(|e| PayloadError::InvalidEnvelope(e.to_string()))
}

/// Runs both validation passes over a raw body.
pub fn parse_webhook(body: &[u8]) -> Result<SwitchBotWebhookEvent, PayloadError> {
    SwitchBotWebhookEvent::from_envelope(parse_envelope(body)?)
}

fn invalid(device_type: DeviceType, reason: impl Into<String>) -> PayloadError {
    PayloadError::InvalidStructure {
        device_type: device_type.as_str().to_string(),
        reason: reason.into(),
    }
}

fn validate_hub2(context: &Hub2Context) -> Result<(), String> {
    if context.device_mac.is_empty() {
        return Err("deviceMac must not be empty".to_string());
    }
    if !(MIN_LIGHT_LEVEL..=MAX_LIGHT_LEVEL).contains(&context.light_level) {
        return Err(format!("lightLevel {} outside 1..=20", context.light_level));
    }
    if context.time_of_sample <= 0 {
        return Err(format!("timeOfSample {} must be positive", context.time_of_sample));
    }
    Ok(())
}

fn validate_plug_mini(context: &PlugMiniContext) -> Result<(), String> {
    if context.device_mac.is_empty() {
        return Err("deviceMac must not be empty".to_string());
    }
    if context.time_of_sample <= 0 {
        return Err(format!("timeOfSample {} must be positive", context.time_of_sample));
    }
    Ok(())
}
