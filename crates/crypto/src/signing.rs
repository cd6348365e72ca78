//! HMAC-SHA256 request signing

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Generate a 128-bit random nonce, lowercase hex encoded (32 chars).
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Signs outbound API requests with the integration secret key.
///
/// The signature is `HMAC_SHA256(secret, timestamp ++ nonce ++ body)`,
/// lowercase hex. It is a pure function of its inputs; the nonce makes
/// each signature single-use.
pub struct RequestSigner {
    secret: Zeroizing<Vec<u8>>,
}

impl RequestSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Zeroizing::new(secret.as_bytes().to_vec()),
        }
    }

    /// Compute the signature for one request. Never log the inputs.
    pub fn sign(&self, timestamp: &str, nonce: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(nonce.as_bytes());
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let signer = RequestSigner::new("secret-key");
        let a = signer.sign("1700000000", "aabbccdd", r#"{"x":1}"#);
        let b = signer.sign("1700000000", "aabbccdd", r#"{"x":1}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_any_input_byte_changes_signature() {
        let signer = RequestSigner::new("secret-key");
        let base = signer.sign("1700000000", "aabbccdd", r#"{"x":1}"#);

        assert_ne!(base, signer.sign("1700000001", "aabbccdd", r#"{"x":1}"#));
        assert_ne!(base, signer.sign("1700000000", "aabbccde", r#"{"x":1}"#));
        assert_ne!(base, signer.sign("1700000000", "aabbccdd", r#"{"x":2}"#));
    }

    #[test]
    fn test_different_secrets_differ() {
        let a = RequestSigner::new("key-a").sign("1", "n", "b");
        let b = RequestSigner::new("key-b").sign("1", "n", "b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_vector() {
        // echo -n "1700000000deadbeef{}" | openssl dgst -sha256 -hmac "k"
        let signer = RequestSigner::new("k");
        assert_eq!(
            signer.sign("1700000000", "deadbeef", "{}"),
            "78ba800705fb3d376133003c1730c94b3206cdc8dc19e19740da9f5816bb7a0c"
        );
    }

    #[test]
    fn test_nonce_shape_and_uniqueness() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
