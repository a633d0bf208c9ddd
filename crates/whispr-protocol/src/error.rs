//! Error types for the protocol layer.
//!
//! The codec reports every decode failure as a [`FramingError`]. Callers
//! do not branch on the sub-cause: any framing error ends the connection.
//! The variants exist so that logs say *what* went wrong.

use whispr_crypto::CryptoError;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The peer closed the connection before a whole quantity arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// The bytes do not form a valid frame: bad header digit, unknown
    /// code, unparseable length prefix, invalid hex or UTF-8, or the
    /// wrong number of fields for the command.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A field is longer than the six-digit length prefix can express.
    /// Raised on encode, before anything is written.
    #[error("field of {0} bytes exceeds the 999999-byte limit")]
    FieldTooLarge(usize),

    /// Sealing or opening the encrypted envelope failed.
    #[error("envelope: {0}")]
    Envelope(#[from] CryptoError),

    /// The underlying reader failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
