//! Error types for the crypto layer.

/// Errors that can occur while generating, exchanging, or using keys.
///
/// Every one of these is fatal to the connection it happens on: there is
/// no renegotiation, so the caller tears the session down.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Generating an RSA keypair failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Key material could not be parsed (bad PEM, bad encoding).
    #[error("malformed key material: {0}")]
    MalformedKey(String),

    /// A symmetric key or IV had the wrong size.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// RSA-OAEP encryption or decryption failed.
    #[error("RSA operation failed: {0}")]
    Rsa(String),

    /// The envelope is too short or its ciphertext is not block-aligned.
    #[error("malformed envelope ({0} bytes)")]
    MalformedEnvelope(usize),

    /// Decryption produced invalid PKCS#7 padding (wrong key or tampering).
    #[error("bad padding")]
    BadPadding,

    /// The handshake payload did not carry the session-key tag.
    #[error("handshake payload is missing the session key tag")]
    MissingTag,

    /// Text that should have been hex was not.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Decrypted key text was not valid UTF-8.
    #[error("decrypted key is not valid text")]
    InvalidText,
}
