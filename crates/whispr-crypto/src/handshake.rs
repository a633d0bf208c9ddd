//! The hybrid handshake: RSA-OAEP carries one AES session key.
//!
//! ```text
//! client                                   server
//!   |  HANDSHAKE(public key PEM)  ------>    |   offer_session_key()
//!   |  <------  HANDSHAKE("SESSION_KEY:" + hex(RSA-OAEP(hex(K))))
//!   |  accept_session_key()                  |
//! ```
//!
//! OAEP uses SHA-256 both as the label hash and inside MGF1. The key is
//! transported as its hex *text*, so what RSA encrypts is 64 ASCII bytes.

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::{CryptoError, SessionKey};

/// Modulus size for client keypairs. The public exponent is 65537.
pub const RSA_KEY_BITS: usize = 2048;

/// Literal prefix of the server's handshake reply.
pub const SESSION_KEY_TAG: &str = "SESSION_KEY:";

/// A client's RSA keypair. Only the client ever holds one.
pub struct ClientKeyPair {
    private: RsaPrivateKey,
}

impl ClientKeyPair {
    /// Generates a 2048-bit keypair.
    ///
    /// This takes a noticeable amount of CPU; async callers should run it
    /// on a blocking thread.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with_bits(RSA_KEY_BITS)
    }

    /// Generates a keypair with a custom modulus size.
    pub fn generate_with_bits(bits: usize) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self { private })
    }

    /// Returns the public half.
    pub fn public_key(&self) -> PeerPublicKey {
        PeerPublicKey(RsaPublicKey::from(&self.private))
    }

    /// Returns the public key as SubjectPublicKeyInfo PEM text, the form
    /// sent in the HANDSHAKE command.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        self.public_key().to_pem()
    }

    /// Decrypts an RSA-OAEP ciphertext addressed to this keypair.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.private
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| CryptoError::Rsa(e.to_string()))
    }

    /// Recovers the session key from the server's `SESSION_KEY:<hex>` reply.
    pub fn accept_session_key(&self, payload: &str) -> Result<SessionKey, CryptoError> {
        let (_, encrypted_hex) = payload
            .split_once(SESSION_KEY_TAG)
            .ok_or(CryptoError::MissingTag)?;
        let encrypted = hex::decode(encrypted_hex.trim())?;
        let key_hex = self.decrypt(&encrypted)?;
        let key_hex = std::str::from_utf8(&key_hex).map_err(|_| CryptoError::InvalidText)?;
        SessionKey::from_hex(key_hex)
    }
}

/// A peer's RSA public key, as received in the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPublicKey(RsaPublicKey);

impl PeerPublicKey {
    /// Parses PEM text. SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) is the
    /// expected form; bare PKCS#1 (`BEGIN RSA PUBLIC KEY`) is accepted too.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(Self)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }

    /// Serializes as SubjectPublicKeyInfo PEM with `\n` line endings.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    /// Encrypts `data` with RSA-OAEP (SHA-256, MGF1-SHA-256).
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
            .map_err(|e| CryptoError::Rsa(e.to_string()))
    }
}

/// What the server produces when answering a HANDSHAKE command.
#[derive(Debug)]
pub struct SessionKeyOffer {
    /// The client's parsed public key.
    pub peer_key: PeerPublicKey,
    /// The freshly generated session key.
    pub session_key: SessionKey,
    /// The reply text: `SESSION_KEY:` followed by the hex RSA ciphertext.
    pub payload: String,
}

/// Server side of the handshake: parse the client's key, mint a session
/// key, and encrypt its hex form to the client.
pub fn offer_session_key(peer_pem: &str) -> Result<SessionKeyOffer, CryptoError> {
    let peer_key = PeerPublicKey::from_pem(peer_pem)?;
    let session_key = SessionKey::generate();
    let encrypted = peer_key.encrypt(session_key.to_hex().as_bytes())?;
    let payload = format!("{SESSION_KEY_TAG}{}", hex::encode(encrypted));
    Ok(SessionKeyOffer {
        peer_key,
        session_key,
        payload,
    })
}
