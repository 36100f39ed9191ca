#![no_main]

//! Fuzz target for webhook signature verification.
//!
//! Splits the input into header values and credentials. Verification must
//! never panic, and a signature generated for the same inputs must verify.

use libfuzzer_sys::fuzz_target;
use switchhook_api::{
    auth::{verify_webhook_signature, WebhookHeaders},
    crypto::generate_signature,
    AuthConfig,
};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut parts = text.splitn(5, '\n');
    let (Some(token), Some(t), Some(nonce), Some(secret), sign) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return;
    };

    let config = AuthConfig { token: token.to_string(), secret: secret.to_string() };
    let mut headers = WebhookHeaders {
        authorization: Some(token.to_string()),
        sign: sign.map(String::from),
        timestamp: Some(t.to_string()),
        nonce: Some(nonce.to_string()),
    };

    let _ = verify_webhook_signature(&headers, &config);

    let positive = t.parse::<i64>().is_ok_and(|t| t > 0);
    if let Ok(expected) = generate_signature(token, t, nonce, secret) {
        headers.sign = Some(expected);
        assert_eq!(verify_webhook_signature(&headers, &config).is_valid, positive);
    }
});
