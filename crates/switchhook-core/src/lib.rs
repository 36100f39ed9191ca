//! Core types for SwitchBot webhook ingestion.
//!
//! Provides the webhook wire types and their two-phase parser, the
//! `EnvironmentData` domain entity, the clock abstraction used for replay
//! checks, and the storage collaborator the pipeline persists into.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, DomainError, PayloadError, Result};
pub use events::{
    parse_envelope, parse_webhook, DeviceType, Hub2Context, Hub2Event, PlugMiniContext,
    PlugMiniEvent, PowerState, SwitchBotWebhookEvent, TemperatureScale, WebhookEnvelope,
};
pub use models::{build_from_hub2_event, EnvironmentData};
pub use storage::{environment_data::PgEnvironmentRepository, EnvironmentRepository};
pub use time::{Clock, RealClock, TestClock};
