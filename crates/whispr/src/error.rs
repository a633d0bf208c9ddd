//! Unified error type for Whispr.

use whispr_crypto::CryptoError;
use whispr_protocol::{FramingError, ResponseCode};
use whispr_session::{SessionError, StoreError};
use whispr_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `whispr` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum WhisprError {
    /// A transport-level error (bind, accept, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// The handshake or a key operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A session-level error (out-of-order command, store failure).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The user store failed outside of a session.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration file could not be parsed.
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),

    /// Plain I/O outside the transport (config files, stdin).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The server answered with a code the client did not expect.
    #[error("expected {expected:?} response, got {got:?}: {text}")]
    UnexpectedResponse {
        expected: ResponseCode,
        got: ResponseCode,
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let whispr_err: WhisprError = err.into();
        assert!(matches!(whispr_err, WhisprError::Transport(_)));
        assert!(whispr_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_framing_error() {
        let err = FramingError::Malformed("bad".into());
        let whispr_err: WhisprError = err.into();
        assert!(matches!(whispr_err, WhisprError::Framing(_)));
    }

    #[test]
    fn test_from_crypto_error() {
        let whispr_err: WhisprError = CryptoError::MissingTag.into();
        assert!(matches!(whispr_err, WhisprError::Crypto(_)));
    }

    #[test]
    fn test_from_store_error() {
        let whispr_err: WhisprError = StoreError::Duplicate("alice".into()).into();
        assert!(matches!(whispr_err, WhisprError::Store(_)));
        assert!(whispr_err.to_string().contains("alice"));
    }
}
