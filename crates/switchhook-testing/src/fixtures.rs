//! Payload fixtures and request builders.
//!
//! Payloads mirror what SwitchBot sends. [`WebhookRequestBuilder::signed`]
//! produces the same four headers SwitchBot attaches to secure webhooks.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request},
};
use serde_json::{json, Value};
use switchhook_api::crypto::generate_signature;

/// MAC address used by Hub 2 fixtures.
pub const HUB2_MAC: &str = "AA:BB:CC:DD:EE:FF";

/// MAC address used by Plug Mini fixtures.
pub const PLUG_MINI_MAC: &str = "11:22:33:44:55:66";

/// Sample time used by fixtures, seconds since the Unix epoch.
pub const SAMPLE_TIME_SECS: i64 = 1_700_000_000;

/// Token the test application is configured with.
pub const TEST_TOKEN: &str = "test-switchbot-token";

/// Secret the test application is configured with.
pub const TEST_SECRET: &str = "test-switchbot-secret";

/// Address inside SwitchBot's published ranges.
pub const SWITCHBOT_IP: &str = "54.64.81.21";

/// Hub 2 `changeReport` body.
pub fn hub2_payload(temperature: f64, humidity: f64, light_level: f64) -> Value {
    json!({
        "eventType": "changeReport",
        "eventVersion": "1",
        "context": {
            "deviceType": "WoHub2",
            "deviceMac": HUB2_MAC,
            "temperature": temperature,
            "humidity": humidity,
            "lightLevel": light_level,
            "scale": "CELSIUS",
            "timeOfSample": SAMPLE_TIME_SECS
        }
    })
}

/// Plug Mini `changeReport` body.
pub fn plug_mini_payload(power_state: &str) -> Value {
    json!({
        "eventType": "changeReport",
        "eventVersion": "1",
        "context": {
            "deviceType": "WoPlugJP",
            "deviceMac": PLUG_MINI_MAC,
            "powerState": power_state,
            "timeOfSample": SAMPLE_TIME_SECS
        }
    })
}

/// Builder for requests against the webhook route.
#[derive(Debug, Clone)]
pub struct WebhookRequestBuilder {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    peer: Option<SocketAddr>,
}

impl WebhookRequestBuilder {
    /// Starts a POST to `/webhook/switchbot`.
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Starts a request with the given method to `/webhook/switchbot`.
    pub fn new(method: Method) -> Self {
        Self { method, path: "/webhook/switchbot".to_string(), headers: Vec::new(), body: None, peer: None }
    }

    /// Overrides the request path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(self, value: &Value) -> Self {
        self.header("content-type", "application/json").raw_body(value.to_string())
    }

    /// Sets raw body bytes.
    #[must_use]
    pub fn raw_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the socket peer address, as the server sees it on accept.
    ///
    /// # Panics
    ///
    /// Panics if `ip` is not an IP address.
    #[must_use]
    pub fn from_ip(mut self, ip: &str) -> Self {
        let ip: IpAddr = ip.parse().expect("valid peer address");
        self.peer = Some(SocketAddr::new(ip, 443));
        self
    }

    /// Adds an `X-Forwarded-For` header.
    #[must_use]
    pub fn forwarded_for(self, chain: &str) -> Self {
        self.header("x-forwarded-for", chain)
    }

    /// Adds SwitchBot signature headers for the given credentials.
    ///
    /// # Panics
    ///
    /// Panics if the secret cannot key HMAC, which never happens for
    /// non-pathological test input.
    #[must_use]
    pub fn signed(self, token: &str, secret: &str, timestamp_ms: i64, nonce: &str) -> Self {
        let t = timestamp_ms.to_string();
        let sign = generate_signature(token, &t, nonce, secret).expect("HMAC accepts any key");

        self.header("Authorization", token).header("sign", sign).header("t", t).header("nonce", nonce)
    }

    /// Adds signature headers for the test credentials.
    #[must_use]
    pub fn signed_with_test_credentials(self, timestamp_ms: i64) -> Self {
        self.signed(TEST_TOKEN, TEST_SECRET, timestamp_ms, "test-nonce")
    }

    /// Builds the HTTP request.
    ///
    /// # Panics
    ///
    /// Panics on header names or values that are not valid HTTP.
    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.path);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        if let Some(peer) = self.peer {
            builder = builder.extension(ConnectInfo(peer));
        }

        let body = self.body.map_or_else(Body::empty, Body::from);
        builder.body(body).expect("valid test request")
    }
}
