//! HTTP request handlers.
//!
//! - `webhook` - SwitchBot webhook entry point
//! - `health` - liveness and readiness checks

pub mod health;
pub mod webhook;

pub use health::{liveness_check, readiness_check};
pub use webhook::receive_webhook;
