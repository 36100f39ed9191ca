//! Webhook authentication: signature, replay window and origin fallback.
//!
//! SwitchBot delivers webhooks in two modes. Secure webhooks carry
//! `Authorization`, `sign`, `t` and `nonce` headers and are checked against
//! the account token and secret. Simple webhooks carry none of them and are
//! accepted only from SwitchBot's published address ranges.

use std::{fmt, net::IpAddr, sync::Arc, time::Duration};

use axum::http::HeaderMap;
use switchhook_core::Clock;
use tracing::{debug, info, warn};

use crate::{
    crypto::{generate_signature, timing_safe_eq},
    error::WebhookError,
};

/// Default replay window, applied symmetrically to past and future.
pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Address prefixes SwitchBot sends simple webhooks from.
pub const SWITCHBOT_SOURCE_PREFIXES: [&str; 3] = ["54.64.81.21", "54.64.", "52.68."];

const SIGNATURE_LOG_PREFIX: usize = 10;

/// SwitchBot account credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Open token, sent verbatim in the `Authorization` header.
    pub token: String,
    /// Secret key used for HMAC signing.
    pub secret: String,
}

impl AuthConfig {
    /// Builds credentials from optional parts.
    ///
    /// Returns `None` unless both parts are present and non-blank.
    pub fn from_parts(token: Option<&str>, secret: Option<&str>) -> Option<Self> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;
        let secret = secret.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self { token: token.to_string(), secret: secret.to_string() })
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &redact(&self.token))
            .field("secret", &"***")
            .finish()
    }
}

/// Supplies credentials to the pipeline.
///
/// Called once per request, and only for secure webhooks.
pub trait AuthConfigSource: Send + Sync {
    /// Returns the active credentials, or `None` when not configured.
    fn auth_config(&self) -> Option<AuthConfig>;
}

/// Credentials resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthConfigSource {
    config: Option<AuthConfig>,
}

impl StaticAuthConfigSource {
    /// Wraps already-resolved credentials.
    pub fn new(config: Option<AuthConfig>) -> Self {
        Self { config }
    }
}

impl AuthConfigSource for StaticAuthConfigSource {
    fn auth_config(&self) -> Option<AuthConfig> {
        self.config.clone()
    }
}

/// Authentication mode selected from the request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// All four signature headers present.
    Secure,
    /// At least one signature header absent; origin allow-list applies.
    Simple,
}

/// Signature-related headers of an inbound webhook.
///
/// Header names are matched case-insensitively. Blank values are kept as
/// `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    /// `Authorization` header, the account token.
    pub authorization: Option<String>,
    /// `sign` header, the uppercase base64 HMAC.
    pub sign: Option<String>,
    /// `t` header, milliseconds since the Unix epoch.
    pub timestamp: Option<String>,
    /// `nonce` header.
    pub nonce: Option<String>,
}

impl WebhookHeaders {
    /// Extracts the signature headers from an HTTP header map.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Self {
            authorization: get("authorization"),
            sign: get("sign"),
            timestamp: get("t"),
            nonce: get("nonce"),
        }
    }

    /// Secure mode requires every signature header; anything less is simple.
    pub fn mode(&self) -> AuthMode {
        if self.authorization.is_some()
            && self.sign.is_some()
            && self.timestamp.is_some()
            && self.nonce.is_some()
        {
            AuthMode::Secure
        } else {
            AuthMode::Simple
        }
    }
}

/// Why a secure webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// One or more headers absent. Fields record presence only.
    MissingHeaders {
        /// `Authorization` present
        authorization: bool,
        /// `sign` present
        sign: bool,
        /// `t` present
        timestamp: bool,
        /// `nonce` present
        nonce: bool,
    },
    /// `Authorization` does not match the configured token.
    TokenMismatch,
    /// `t` is not a strictly positive integer.
    InvalidTimestamp,
    /// The secret could not key the MAC.
    InvalidSecret,
    /// `sign` does not match the expected signature.
    SignatureMismatch {
        /// First characters of the received signature
        received_prefix: String,
        /// First characters of the expected signature
        expected_prefix: String,
    },
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeaders { authorization, sign, timestamp, nonce } => write!(
                f,
                "missing signature headers (authorization={authorization}, sign={sign}, \
                 t={timestamp}, nonce={nonce})"
            ),
            Self::TokenMismatch => write!(f, "authorization token mismatch"),
            Self::InvalidTimestamp => write!(f, "timestamp is not a positive integer"),
            Self::InvalidSecret => write!(f, "secret cannot key HMAC"),
            Self::SignatureMismatch { received_prefix, expected_prefix } => {
                write!(f, "signature mismatch (received {received_prefix}, expected {expected_prefix})")
            },
        }
    }
}

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureVerdict {
    /// Whether the signature verified.
    pub is_valid: bool,
    /// Diagnostic for a rejected signature.
    pub failure: Option<SignatureFailure>,
}

impl SignatureVerdict {
    fn valid() -> Self {
        Self { is_valid: true, failure: None }
    }

    fn invalid(failure: SignatureFailure) -> Self {
        Self { is_valid: false, failure: Some(failure) }
    }
}

/// Verifies a secure webhook signature.
///
/// Never fails: every problem, including missing headers and key errors, is
/// reported as an invalid verdict with a diagnostic safe to log.
pub fn verify_webhook_signature(headers: &WebhookHeaders, config: &AuthConfig) -> SignatureVerdict {
    let (Some(authorization), Some(sign), Some(timestamp), Some(nonce)) =
        (&headers.authorization, &headers.sign, &headers.timestamp, &headers.nonce)
    else {
        return SignatureVerdict::invalid(SignatureFailure::MissingHeaders {
            authorization: headers.authorization.is_some(),
            sign: headers.sign.is_some(),
            timestamp: headers.timestamp.is_some(),
            nonce: headers.nonce.is_some(),
        });
    };

    if !timing_safe_eq(authorization.as_bytes(), config.token.as_bytes()) {
        return SignatureVerdict::invalid(SignatureFailure::TokenMismatch);
    }

    if parse_timestamp(timestamp).is_none() {
        return SignatureVerdict::invalid(SignatureFailure::InvalidTimestamp);
    }

    let expected = match generate_signature(&config.token, timestamp, nonce, &config.secret) {
        Ok(expected) => expected,
        Err(_) => return SignatureVerdict::invalid(SignatureFailure::InvalidSecret),
    };

    if timing_safe_eq(sign.as_bytes(), expected.as_bytes()) {
        SignatureVerdict::valid()
    } else {
        SignatureVerdict::invalid(SignatureFailure::SignatureMismatch {
            received_prefix: redact(sign),
            expected_prefix: redact(&expected),
        })
    }
}

/// Parses a `t` header value as strictly positive milliseconds.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|t| *t > 0)
}

/// Returns true when `timestamp_ms` is within `tolerance` of the clock.
pub fn validate_timestamp(timestamp_ms: i64, tolerance: Duration, clock: &dyn Clock) -> bool {
    within_tolerance(clock.now_millis(), timestamp_ms, tolerance)
}

/// Returns true iff `|now_ms - timestamp_ms| <= tolerance`.
pub fn within_tolerance(now_ms: i64, timestamp_ms: i64, tolerance: Duration) -> bool {
    let tolerance_ms = i128::try_from(tolerance.as_millis()).unwrap_or(i128::MAX);
    (i128::from(now_ms) - i128::from(timestamp_ms)).abs() <= tolerance_ms
}

/// Address prefixes accepted for simple webhooks.
///
/// Matching is a plain string prefix test on the canonical textual form of
/// the address, so IPv4-mapped IPv6 callers match their IPv4 prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAllowlist {
    prefixes: Vec<String>,
}

impl SourceAllowlist {
    /// Creates an allow-list from address prefixes.
    ///
    /// Blank prefixes are discarded; an empty prefix would match every
    /// address.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(Into::into)
            .map(|prefix: String| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty())
            .collect();

        Self { prefixes }
    }

    /// SwitchBot's published webhook source ranges.
    pub fn switchbot_default() -> Self {
        Self::new(SWITCHBOT_SOURCE_PREFIXES)
    }

    /// Returns true when `ip` starts with any configured prefix.
    pub fn is_allowed(&self, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical().to_string();
        self.prefixes.iter().any(|prefix| ip.starts_with(prefix.as_str()))
    }

    /// Configured prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for SourceAllowlist {
    fn default() -> Self {
        Self::switchbot_default()
    }
}

/// Tunables for the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Replay window for secure webhooks.
    pub tolerance: Duration,
    /// Accepted origins for simple webhooks.
    pub allowlist: SourceAllowlist,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self { tolerance: DEFAULT_TIMESTAMP_TOLERANCE, allowlist: SourceAllowlist::default() }
    }
}

/// Authenticates inbound webhooks in either mode.
#[derive(Debug, Clone)]
pub struct Authenticator {
    policy: AuthPolicy,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Creates an authenticator with the given policy and clock.
    pub fn new(policy: AuthPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Authenticates one request.
    ///
    /// Credentials are requested from `source` only for secure webhooks.
    ///
    /// # Errors
    ///
    /// - `MissingAuthConfig` when secure headers arrive but no credentials
    ///   are configured
    /// - `InvalidSignature` when the signature does not verify
    /// - `StaleTimestamp` when `t` is outside the replay window
    /// - `ForbiddenSource` when a simple webhook comes from an unknown origin
    pub fn authenticate(
        &self,
        headers: &WebhookHeaders,
        source_ip: Option<IpAddr>,
        source: &dyn AuthConfigSource,
    ) -> Result<AuthMode, WebhookError> {
        match headers.mode() {
            AuthMode::Secure => self.authenticate_secure(headers, source),
            AuthMode::Simple => self.authenticate_simple(source_ip),
        }
    }

    fn authenticate_secure(
        &self,
        headers: &WebhookHeaders,
        source: &dyn AuthConfigSource,
    ) -> Result<AuthMode, WebhookError> {
        let config = source.auth_config().ok_or(WebhookError::MissingAuthConfig)?;

        let verdict = verify_webhook_signature(headers, &config);
        if let Some(failure) = verdict.failure {
            return Err(WebhookError::InvalidSignature(failure));
        }

        let timestamp_ms = headers
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or(WebhookError::InvalidSignature(SignatureFailure::InvalidTimestamp))?;

        if !validate_timestamp(timestamp_ms, self.policy.tolerance, self.clock.as_ref()) {
            return Err(WebhookError::StaleTimestamp { timestamp_ms });
        }

        debug!(timestamp_ms, "Secure webhook authenticated");
        Ok(AuthMode::Secure)
    }

    fn authenticate_simple(&self, source_ip: Option<IpAddr>) -> Result<AuthMode, WebhookError> {
        match source_ip {
            Some(ip) if self.policy.allowlist.is_allowed(&ip) => {
                warn!(
                    source_ip = %ip,
                    "Simple webhook accepted by source address only; no signature assurance"
                );
                Ok(AuthMode::Simple)
            },
            other => {
                let source_ip = other.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
                info!(source_ip = %source_ip, "Simple webhook from address outside allow-list");
                Err(WebhookError::ForbiddenSource { source_ip })
            },
        }
    }
}

fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(SIGNATURE_LOG_PREFIX).collect();
    format!("{prefix}...")
}
