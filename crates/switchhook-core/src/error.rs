//! Error types for payload parsing, domain validation and storage.
//!
//! The three enums here are kept apart on purpose: `PayloadError` describes
//! a wire-contract violation, `DomainError` a sensor value that parsed fine
//! but makes no sense for the application, and `CoreError` a failure of the
//! storage collaborator. Callers translate each into exactly one response
//! class.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Storage-level error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Wire-contract failures raised while decoding a webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The request carried no body, or an empty one.
    #[error("request body is empty")]
    EmptyBody,

    /// The body exceeds the configured size limit.
    #[error("request body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// The body is not syntactically valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The body is JSON but lacks the `{eventType, eventVersion, context}`
    /// envelope.
    #[error("invalid webhook envelope: {0}")]
    InvalidEnvelope(String),

    /// `context.deviceType` names a device this service does not handle.
    #[error("unsupported device type: {0}")]
    UnsupportedDeviceType(String),

    /// A known device's context violates its wire contract.
    #[error("invalid {device_type} payload: {reason}")]
    InvalidStructure {
        /// Discriminator value of the offending event
        device_type: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Business-rule violations raised while building domain entities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Temperature outside -50..=60 °C.
    #[error("temperature {value} must be between -50 and 60 degrees")]
    TemperatureOutOfRange {
        /// Reported value
        value: f64,
    },

    /// Humidity outside 0..=100 %.
    #[error("humidity {value} must be between 0 and 100 percent")]
    HumidityOutOfRange {
        /// Reported value
        value: f64,
    },

    /// Brightness outside 0..=100 %.
    #[error("brightness {value} must be between 0 and 100 percent")]
    BrightnessOutOfRange {
        /// Computed value
        value: f64,
    },

    /// Device light level outside 1..=20.
    #[error("light level {value} must be between 1 and 20")]
    LightLevelOutOfRange {
        /// Reported value
        value: f64,
    },

    /// Sample time cannot be represented as an instant.
    #[error("sample time {seconds}s is not a valid instant")]
    InvalidSampleTime {
        /// Reported seconds since the Unix epoch
        seconds: i64,
    },
}
