//! Cryptographic utilities for SwitchBot webhook signatures.
//!
//! SwitchBot signs `token + t + nonce` with HMAC-SHA256 keyed by the
//! account secret, then sends the digest as uppercase standard base64.

use std::fmt;

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signature computation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The secret key could not initialise the MAC.
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSecret => write!(f, "invalid secret key"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Computes the signature SwitchBot sends in the `sign` header.
///
/// `uppercase(base64(HMAC-SHA256(secret, token + t + nonce)))`
///
/// # Example
///
/// ```
/// use switchhook_api::crypto::generate_signature;
///
/// let sign = generate_signature("token", "1700000000000", "nonce", "secret").unwrap();
/// assert_eq!(sign, sign.to_uppercase());
/// ```
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the MAC rejects the key.
pub fn generate_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    secret: &str,
) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(token.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());

    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()).to_uppercase())
}

/// Outcome of a traced comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// Whether the inputs were byte-for-byte equal.
    pub equal: bool,
    /// Number of byte positions visited.
    pub iterations: usize,
}

/// Timing-safe byte comparison.
///
/// Unequal lengths return immediately; the length of a signature is not
/// secret. For equal lengths every byte is visited and differences are
/// OR-accumulated, so the work done does not depend on where the first
/// mismatch is.
pub fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    timing_safe_eq_traced(a, b).equal
}

/// Same as [`timing_safe_eq`], also reporting how many bytes were visited.
pub fn timing_safe_eq_traced(a: &[u8], b: &[u8]) -> Comparison {
    if a.len() != b.len() {
        return Comparison { equal: false, iterations: 0 };
    }

    let mut result = 0u8;
    let mut iterations = 0usize;
    for (a_byte, b_byte) in a.iter().zip(b.iter()) {
        result |= a_byte ^ b_byte;
        iterations += 1;
    }

    Comparison { equal: result == 0, iterations }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_signature_is_deterministic() {
        let first = generate_signature("token", "1700000000000", "nonce", "secret").unwrap();
        let second = generate_signature("token", "1700000000000", "nonce", "secret").unwrap();

        assert_eq!(first, second);
        // 32-byte digest, padded base64
        assert_eq!(first.len(), 44);
        assert!(first.ends_with('='));
    }

    #[test]
    fn generate_signature_matches_manual_hmac() {
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"token1700000000000nonce");
        let expected = BASE64_STANDARD.encode(mac.finalize().into_bytes()).to_uppercase();

        assert_eq!(generate_signature("token", "1700000000000", "nonce", "secret").unwrap(), expected);
    }

    #[test]
    fn generate_signature_depends_on_every_input() {
        let base = generate_signature("token", "1", "nonce", "secret").unwrap();

        assert_ne!(base, generate_signature("tokem", "1", "nonce", "secret").unwrap());
        assert_ne!(base, generate_signature("token", "2", "nonce", "secret").unwrap());
        assert_ne!(base, generate_signature("token", "1", "nonse", "secret").unwrap());
        assert_ne!(base, generate_signature("token", "1", "nonce", "secreT").unwrap());
    }

    #[test]
    fn timing_safe_eq_same() {
        assert!(timing_safe_eq(b"hello", b"hello"));
    }

    #[test]
    fn timing_safe_eq_different() {
        assert!(!timing_safe_eq(b"hello", b"world"));
    }

    #[test]
    fn timing_safe_eq_different_length() {
        assert!(!timing_safe_eq(b"hello", b"hello_world"));
    }

    #[test]
    fn timing_safe_eq_visits_every_byte_regardless_of_mismatch_position() {
        let expected = [b'A'; 44];

        for position in 0..expected.len() {
            let mut candidate = expected;
            candidate[position] = b'B';

            let trace = timing_safe_eq_traced(&candidate, &expected);
            assert!(!trace.equal);
            assert_eq!(trace.iterations, expected.len());
        }

        let trace = timing_safe_eq_traced(&expected, &expected);
        assert!(trace.equal);
        assert_eq!(trace.iterations, expected.len());
    }
}
