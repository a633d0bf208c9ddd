/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed (broken pipe, reset, aborted).
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a remote server failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if this error means the peer is gone for good.
    ///
    /// Broken pipes, resets and aborts are how a vanished peer shows up
    /// on the write side; the reactor tears such sessions down the same
    /// way it handles a clean close.
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Self::ConnectionClosed(_) => true,
            Self::SendFailed(e) | Self::ReceiveFailed(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_is_disconnect_broken_pipe_true() {
        let err = TransportError::SendFailed(Error::from(ErrorKind::BrokenPipe));
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_is_disconnect_clean_close_true() {
        let err = TransportError::ConnectionClosed("peer closed the connection".into());
        assert!(err.is_disconnect());
    }

    #[test]
    fn test_is_disconnect_accept_failure_false() {
        let err = TransportError::AcceptFailed(Error::from(ErrorKind::AddrInUse));
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_is_disconnect_other_io_error_false() {
        let err = TransportError::ReceiveFailed(Error::from(ErrorKind::InvalidData));
        assert!(!err.is_disconnect());
    }
}
