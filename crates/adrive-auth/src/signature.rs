//! Deterministic device key and session signature derivation
//!
//! The device-session endpoint expects a public key at session creation and
//! a signature derived from the same key material on subsequent requests.
//! Both are derived deterministically from `(nonce, user_id, device_id)`,
//! so every process computes identical material for the same account — no
//! key state needs to be exchanged between cooperating processes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Key pair and signature produced for one device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSignature {
    pub signature: String,
    pub public_key: String,
    pub secret_key: String,
}

/// Derive the session key pair and signature for an account's device.
///
/// `secret = SHA256(nonce:user_id:device_id)`, `public = SHA256(secret)`,
/// `signature = SHA256(public || user_id || nonce)`; all base64url, no
/// padding. The nonce is 0 for session creation and increments per device
/// re-registration.
pub fn device_signature(nonce: u32, user_id: &str, device_id: &str) -> DeviceSignature {
    let secret = Sha256::digest(format!("{nonce}:{user_id}:{device_id}").as_bytes());

    let public = Sha256::digest(secret);

    let mut hasher = Sha256::new();
    hasher.update(public);
    hasher.update(user_id.as_bytes());
    hasher.update(nonce.to_be_bytes());
    let signature = hasher.finalize();

    DeviceSignature {
        signature: URL_SAFE_NO_PAD.encode(signature),
        public_key: URL_SAFE_NO_PAD.encode(public),
        secret_key: URL_SAFE_NO_PAD.encode(secret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = device_signature(0, "u1", "dev-1");
        let b = device_signature(0, "u1", "dev-1");
        assert_eq!(a, b);
    }

    #[test]
    fn inputs_change_all_outputs() {
        let base = device_signature(0, "u1", "dev-1");
        for other in [
            device_signature(1, "u1", "dev-1"),
            device_signature(0, "u2", "dev-1"),
            device_signature(0, "u1", "dev-2"),
        ] {
            assert_ne!(base.signature, other.signature);
            assert_ne!(base.public_key, other.public_key);
            assert_ne!(base.secret_key, other.secret_key);
        }
    }

    #[test]
    fn outputs_are_url_safe_base64() {
        let sig = device_signature(0, "u1", "dev-1");
        for value in [&sig.signature, &sig.public_key, &sig.secret_key] {
            // SHA-256 → 32 bytes → 43 base64url chars, no padding
            assert_eq!(value.len(), 43);
            let decoded = URL_SAFE_NO_PAD.decode(value).expect("valid base64url");
            assert_eq!(decoded.len(), 32);
        }
    }

    #[test]
    fn public_key_is_not_secret_key() {
        let sig = device_signature(0, "u1", "dev-1");
        assert_ne!(sig.public_key, sig.secret_key);
    }
}
