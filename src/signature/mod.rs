//! Zoom webhook request authentication.
//!
//! Zoom signs every webhook delivery with HMAC-SHA256 over the string
//! `v0:{timestamp}:{raw body}` using the endpoint's shared secret token and
//! sends the result as `x-zm-signature: v0={hex digest}`. The URL-validation
//! handshake reuses the same secret to encrypt a one-time plain token.
//!
//! This is the sole authentication mechanism for inbound requests, so it
//! must run before any event-specific handling.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_VERSION: &str = "v0";

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Computes the `v0={hex}` signature Zoom expects for a request.
///
/// The body is hashed as raw bytes so non-UTF8 payloads sign identically to
/// how Zoom signed them on the wire.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Verifies a provided signature header against the expected value.
pub fn verify(secret: &str, timestamp: &str, body: &[u8], provided: &str) -> bool {
    sign(secret, timestamp, body) == provided
}

/// Encrypts the plain token from an `endpoint.url_validation` event.
///
/// The response to the challenge must echo the plain token together with
/// this hex digest as `encryptedToken`.
pub fn encrypt_validation_token(secret: &str, plain_token: &str) -> String {
    hmac_hex(secret, plain_token.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-webhook-secret";
    const TIMESTAMP: &str = "1700000000";
    const BODY: &[u8] = br#"{"event":"meeting.participant_joined"}"#;

    #[test]
    fn test_sign_shape() {
        let signature = sign(SECRET, TIMESTAMP, BODY);
        assert!(signature.starts_with("v0="));
        let digest = &signature[3..];
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_round_trip() {
        let signature = sign(SECRET, TIMESTAMP, BODY);
        assert!(verify(SECRET, TIMESTAMP, BODY, &signature));
    }

    #[test]
    fn test_tampered_inputs_fail_verification() {
        let signature = sign(SECRET, TIMESTAMP, BODY);

        assert!(!verify("other-secret", TIMESTAMP, BODY, &signature));
        assert!(!verify(SECRET, "1700000001", BODY, &signature));
        assert!(!verify(SECRET, TIMESTAMP, b"{}", &signature));
        assert!(!verify(SECRET, TIMESTAMP, BODY, "v0=deadbeef"));
    }

    #[test]
    fn test_validation_token_known_vector() {
        // RFC 4231 test case 2 for HMAC-SHA256.
        let encrypted = encrypt_validation_token("Jefe", "what do ya want for nothing?");
        assert_eq!(
            encrypted,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_validation_token_differs_per_input() {
        assert_ne!(
            encrypt_validation_token(SECRET, "token-a"),
            encrypt_validation_token(SECRET, "token-b")
        );
        assert_ne!(
            encrypt_validation_token("secret-a", "token"),
            encrypt_validation_token("secret-b", "token")
        );
    }
}
