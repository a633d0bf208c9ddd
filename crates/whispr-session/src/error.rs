//! Error types for the session layer.

use whispr_protocol::Command;

/// Errors that can occur while driving a session through its lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command is not valid in the session's current phase. The
    /// server ignores it; the connection stays open.
    #[error("{command} out of order: {reason}")]
    OutOfOrder {
        command: Command,
        reason: &'static str,
    },

    /// The user store failed. Fatal to the connection.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub(crate) fn out_of_order(command: Command, reason: &'static str) -> Self {
        Self::OutOfOrder { command, reason }
    }

    /// Whether this error should tear the connection down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OutOfOrder { .. })
    }
}

/// Errors reported by a [`UserStore`](crate::UserStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `create` was called for a username that is already taken.
    #[error("user {0:?} already exists")]
    Duplicate(String),

    /// A stored record could not be read back.
    #[error("corrupt user record for {username:?}: {reason}")]
    Corrupt { username: String, reason: String },

    /// The backing file could not be parsed.
    #[error("user file: {0}")]
    Format(#[from] serde_json::Error),

    /// The backing file could not be read or written.
    #[error("user file: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fatal_out_of_order_is_not() {
        let err = SessionError::out_of_order(Command::Broadcast, "not authenticated");
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "BROADCAST out of order: not authenticated");
    }

    #[test]
    fn test_is_fatal_store_error_is() {
        let err = SessionError::from(StoreError::Duplicate("alice".into()));
        assert!(err.is_fatal());
    }
}
