//! Cryptography for Whispr.
//!
//! Three independent pieces live here:
//!
//! - [`SessionKey`]: the AES-256-CBC envelope every message is sealed in
//!   once a connection has finished its handshake.
//! - [`ClientKeyPair`] / [`PeerPublicKey`] / [`offer_session_key`]: the
//!   RSA-OAEP handshake that delivers the session key to the client.
//! - [`hash_password`] / [`verify_password`]: salted digests for the
//!   user store.
//!
//! # How it fits in the stack
//!
//! ```text
//! Protocol Layer (above)  ← seals/opens frame fields with SessionKey
//!     ↕
//! Crypto Layer (this crate)
//! ```

mod envelope;
mod error;
mod handshake;
mod password;

pub use envelope::{IV_LEN, SESSION_KEY_LEN, SessionKey};
pub use error::CryptoError;
pub use handshake::{
    ClientKeyPair, PeerPublicKey, RSA_KEY_BITS, SESSION_KEY_TAG, SessionKeyOffer,
    offer_session_key,
};
pub use password::{SALT_LEN, SaltedHash, hash_password, verify_password};
