//! Salted password digests for the user store.
//!
//! `digest = SHA-256(salt || password)`, with a random 16-byte salt per
//! user. Both are stored as lowercase hex text.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::CryptoError;

/// Salt size in bytes.
pub const SALT_LEN: usize = 16;

/// A salt and the digest computed with it, both hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltedHash {
    pub salt: String,
    pub hash: String,
}

/// Hashes `password` under a freshly generated salt.
pub fn hash_password(password: &str) -> SaltedHash {
    let salt: [u8; SALT_LEN] = rand::rng().random();
    SaltedHash {
        salt: hex::encode(salt),
        hash: digest(&salt, password),
    }
}

/// Checks `password` against a stored salt and digest.
///
/// Returns an error only when the stored salt is not valid hex, which
/// means the store itself is corrupt.
pub fn verify_password(salt_hex: &str, hash_hex: &str, password: &str) -> Result<bool, CryptoError> {
    let salt = hex::decode(salt_hex)?;
    Ok(digest(&salt, password) == hash_hex)
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_then_verify_accepts_same_password() {
        let stored = hash_password("secret1");
        assert!(verify_password(&stored.salt, &stored.hash, "secret1").unwrap());
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let stored = hash_password("secret1");
        assert!(!verify_password(&stored.salt, &stored.hash, "wrong").unwrap());
    }

    #[test]
    fn test_hash_password_salts_differ() {
        let a = hash_password("same");
        let b = hash_password("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_digest_known_vector() {
        // SHA-256 of the empty salt followed by "abc".
        assert_eq!(
            digest(&[], "abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_corrupt_salt_is_error() {
        assert!(verify_password("not-hex", "00", "pw").is_err());
    }
}
