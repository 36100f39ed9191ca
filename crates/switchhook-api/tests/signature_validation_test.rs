//! Property tests for signature verification, comparison and replay window.

use std::time::Duration;

use proptest::prelude::*;
use switchhook_api::{
    auth::{validate_timestamp, verify_webhook_signature, within_tolerance, WebhookHeaders},
    crypto::{generate_signature, timing_safe_eq_traced},
    AuthConfig,
};
use switchhook_core::TestClock;

fn headers(token: &str, t: &str, nonce: &str, sign: String) -> WebhookHeaders {
    WebhookHeaders {
        authorization: Some(token.to_string()),
        sign: Some(sign),
        timestamp: Some(t.to_string()),
        nonce: Some(nonce.to_string()),
    }
}

proptest! {
    #[test]
    fn generated_signature_always_verifies(
        token in "[A-Za-z0-9]{1,64}",
        secret in "[A-Za-z0-9]{1,64}",
        nonce in "[A-Za-z0-9-]{1,36}",
        t in 1i64..=4_102_444_800_000,
    ) {
        let t = t.to_string();
        let sign = generate_signature(&token, &t, &nonce, &secret).unwrap();
        let config = AuthConfig { token: token.clone(), secret };

        let verdict = verify_webhook_signature(&headers(&token, &t, &nonce, sign), &config);

        prop_assert!(verdict.is_valid);
    }

    #[test]
    fn any_single_byte_change_breaks_the_signature(
        token in "[A-Za-z0-9]{1,32}",
        secret in "[A-Za-z0-9]{1,32}",
        nonce in "[A-Za-z0-9]{1,16}",
        position in 0usize..44,
        replacement in prop::sample::select(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/=".to_vec()),
    ) {
        let t = "1700000000000";
        let sign = generate_signature(&token, t, &nonce, &secret).unwrap();
        let mut tampered = sign.clone().into_bytes();
        prop_assume!(tampered[position] != replacement);
        tampered[position] = replacement;
        let tampered = String::from_utf8(tampered).unwrap();
        let config = AuthConfig { token: token.clone(), secret };

        let verdict = verify_webhook_signature(&headers(&token, t, &nonce, tampered), &config);

        prop_assert!(!verdict.is_valid);
    }

    #[test]
    fn comparison_work_is_independent_of_mismatch_position(
        reference in prop::collection::vec(any::<u8>(), 1..128),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let index = position.index(reference.len());
        let mut candidate = reference.clone();
        candidate[index] ^= flip;

        let mismatch = timing_safe_eq_traced(&candidate, &reference);
        let matching = timing_safe_eq_traced(&reference, &reference);

        prop_assert!(!mismatch.equal);
        prop_assert!(matching.equal);
        prop_assert_eq!(mismatch.iterations, reference.len());
        prop_assert_eq!(matching.iterations, mismatch.iterations);
    }

    #[test]
    fn replay_window_is_symmetric(
        now in 0i64..4_102_444_800_000,
        delta in 0i64..1_000_000,
        tolerance_ms in 1u64..600_000,
    ) {
        let tolerance = Duration::from_millis(tolerance_ms);
        let expected = u64::try_from(delta).unwrap() <= tolerance_ms;

        prop_assert_eq!(within_tolerance(now, now - delta, tolerance), expected);
        prop_assert_eq!(within_tolerance(now, now + delta, tolerance), expected);
    }

    #[test]
    fn validate_timestamp_follows_the_clock(offset in -600_000i64..600_000) {
        let clock = TestClock::at_millis(1_700_000_000_000);
        let tolerance = Duration::from_secs(300);

        let accepted = validate_timestamp(1_700_000_000_000 + offset, tolerance, &clock);

        prop_assert_eq!(accepted, offset.abs() <= 300_000);
    }
}

#[test]
fn wrong_secret_never_verifies() {
    let sign = generate_signature("token", "1700000000000", "nonce", "secret-a").unwrap();
    let config = AuthConfig { token: "token".to_string(), secret: "secret-b".to_string() };

    let verdict =
        verify_webhook_signature(&headers("token", "1700000000000", "nonce", sign), &config);

    assert!(!verdict.is_valid);
}
