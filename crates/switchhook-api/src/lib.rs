//! HTTP surface for SwitchBot webhooks.
//!
//! Authentication, the processing pipeline, error mapping and the axum
//! router that exposes them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod server;

pub use auth::{AuthConfig, AuthConfigSource, AuthPolicy, Authenticator, StaticAuthConfigSource};
pub use config::Config;
pub use error::WebhookError;
pub use pipeline::{WebhookAck, WebhookProcessor, WebhookRequest};
pub use server::{create_router, start_server, AppState};
