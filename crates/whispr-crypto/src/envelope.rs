//! The symmetric envelope: AES-256-CBC under a per-connection session key.
//!
//! Every message after the handshake is sealed with [`SessionKey::seal`]:
//!
//! ```text
//! IV (16 random bytes) || AES-256-CBC(PKCS#7(plaintext))
//! ```
//!
//! The IV is drawn fresh for every message. That is what makes it safe to
//! reuse one session key for the whole life of a connection.

use std::fmt;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::Rng;

use crate::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Session key size in bytes (256 bits).
pub const SESSION_KEY_LEN: usize = 32;

/// Initialization vector size in bytes (one AES block).
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

/// A 256-bit symmetric key shared by one client and the server.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let bytes: [u8; SESSION_KEY_LEN] = rand::rng().random();
        Self(bytes)
    }

    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses the hex text form used on the wire during the handshake.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(text.trim())?;
        let got = bytes.len();
        let array: [u8; SESSION_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: SESSION_KEY_LEN,
                got,
            })?;
        Ok(Self(array))
    }

    /// Returns the lowercase hex text form of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Encrypts `plaintext` under a fresh random IV and returns `IV || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let iv: [u8; IV_LEN] = rand::rng().random();
        let cipher = Aes256CbcEnc::new_from_slices(&self.0, &iv).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: SESSION_KEY_LEN,
                got: self.0.len(),
            }
        })?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut sealed = Vec::with_capacity(IV_LEN + ciphertext.len());
        sealed.extend_from_slice(&iv);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Length of [`seal`](Self::seal)'s output for `plain_len` bytes of
    /// plaintext. PKCS#7 always adds at least one byte of padding.
    pub fn sealed_len(plain_len: usize) -> usize {
        IV_LEN + (plain_len / BLOCK_LEN + 1) * BLOCK_LEN
    }

    /// Reverses [`seal`](Self::seal): splits off the IV, decrypts, strips padding.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        // At least the IV plus one padded block, and whole blocks after it.
        if sealed.len() < IV_LEN + BLOCK_LEN || (sealed.len() - IV_LEN) % BLOCK_LEN != 0 {
            return Err(CryptoError::MalformedEnvelope(sealed.len()));
        }
        let (iv, ciphertext) = sealed.split_at(IV_LEN);
        let cipher = Aes256CbcDec::new_from_slices(&self.0, iv).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: IV_LEN,
                got: iv.len(),
            }
        })?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::BadPadding)
    }
}

/// Key bytes never show up in logs.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}
