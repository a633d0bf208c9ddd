//! The authentication state machine.
//!
//! A connection proves who it is in two steps, and only after the
//! handshake has given it a session key:
//!
//! ```text
//!   Unidentified ──set_username──→ AwaitPassword{New|Existing}
//!                                     │      ↑   │
//!                                     │      └───┘ wrong password /
//!                                     │            set_username again
//!                                     ▼
//!                              Authenticated (terminal)
//! ```
//!
//! The functions here only move the session between phases and talk to
//! the [`UserStore`]. Replies, rosters, and join notices are the caller's
//! business; the returned outcome says which one applies.

use whispr_crypto::hash_password;
use whispr_protocol::Command;

use crate::{Session, SessionError, UserStore};

/// Whether the account named in `set_username` already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
    New,
    Existing,
}

/// Where a session is in the auth flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthPhase {
    /// No username yet.
    #[default]
    Unidentified,
    /// A username was given; waiting for its password.
    AwaitPassword { username: String, account: Account },
    /// Done. Chat commands are accepted.
    Authenticated { username: String },
}

/// The result of a successful `set_password` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordOutcome {
    /// A new account was created; the session is authenticated.
    Created,
    /// The existing account's password matched; the session is
    /// authenticated.
    Accepted,
    /// The password did not match. The session keeps waiting.
    Rejected,
}

impl PasswordOutcome {
    pub fn is_authenticated(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Handles SET_USERNAME.
///
/// # Errors
/// - [`SessionError::OutOfOrder`] before the handshake or once
///   authenticated.
/// - [`SessionError::Store`] if the lookup fails.
pub fn identify<S: UserStore + ?Sized>(
    session: &mut Session,
    username: &str,
    store: &S,
) -> Result<Account, SessionError> {
    if session.session_key().is_none() {
        return Err(SessionError::out_of_order(
            Command::SetUsername,
            "handshake not complete",
        ));
    }
    if session.is_authenticated() {
        return Err(SessionError::out_of_order(
            Command::SetUsername,
            "already authenticated",
        ));
    }

    let account = if store.exists(username)? {
        Account::Existing
    } else {
        Account::New
    };
    tracing::debug!(conn_id = %session.id(), username, ?account, "username set");
    session.set_phase(AuthPhase::AwaitPassword {
        username: username.to_owned(),
        account,
    });
    Ok(account)
}

/// Handles SET_PASSWORD.
///
/// `username` must be the name given to [`identify`].
///
/// # Errors
/// - [`SessionError::OutOfOrder`] outside `AwaitPassword` or when the
///   name does not match.
/// - [`SessionError::Store`] if creating or verifying the account fails.
pub fn submit_password<S: UserStore + ?Sized>(
    session: &mut Session,
    username: &str,
    password: &str,
    store: &mut S,
) -> Result<PasswordOutcome, SessionError> {
    let account = match session.phase() {
        AuthPhase::AwaitPassword {
            username: pending,
            account,
        } if pending == username => *account,
        AuthPhase::AwaitPassword { .. } => {
            return Err(SessionError::out_of_order(
                Command::SetPassword,
                "username does not match SET_USERNAME",
            ));
        }
        _ => {
            return Err(SessionError::out_of_order(
                Command::SetPassword,
                "no username pending",
            ));
        }
    };

    let outcome = match account {
        Account::New => {
            let hashed = hash_password(password);
            store.create(username, &hashed.salt, &hashed.hash)?;
            PasswordOutcome::Created
        }
        Account::Existing if store.verify(username, password)? => PasswordOutcome::Accepted,
        Account::Existing => PasswordOutcome::Rejected,
    };

    if outcome.is_authenticated() {
        session.set_phase(AuthPhase::Authenticated {
            username: username.to_owned(),
        });
        tracing::info!(conn_id = %session.id(), username, "authenticated");
    } else {
        tracing::debug!(conn_id = %session.id(), username, "incorrect password");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use whispr_crypto::SessionKey;
    use whispr_transport::ConnectionId;

    use super::*;
    use crate::MemoryUserStore;

    fn keyed_session() -> Session {
        let mut session = Session::new(ConnectionId::new(1));
        session.mark_keyed(SessionKey::generate());
        session
    }

    fn store_with(username: &str, password: &str) -> MemoryUserStore {
        let mut store = MemoryUserStore::new();
        let hashed = hash_password(password);
        store.create(username, &hashed.salt, &hashed.hash).unwrap();
        store
    }

    #[test]
    fn test_identify_before_handshake_is_out_of_order() {
        let mut session = Session::new(ConnectionId::new(1));
        let store = MemoryUserStore::new();

        let result = identify(&mut session, "alice", &store);

        assert!(matches!(result, Err(SessionError::OutOfOrder { .. })));
        assert_eq!(session.phase(), &AuthPhase::Unidentified);
    }

    #[test]
    fn test_identify_unknown_user_awaits_new_password() {
        let mut session = keyed_session();
        let store = MemoryUserStore::new();

        assert_eq!(identify(&mut session, "alice", &store).unwrap(), Account::New);
        assert!(session.is_new_user());
        assert!(!session.password_set());
        assert_eq!(session.username(), None);
    }

    #[test]
    fn test_identify_known_user_awaits_existing_password() {
        let mut session = keyed_session();
        let store = store_with("alice", "pw");

        assert_eq!(identify(&mut session, "alice", &store).unwrap(), Account::Existing);
        assert!(!session.is_new_user());
    }

    #[test]
    fn test_identify_again_restarts_with_new_name() {
        let mut session = keyed_session();
        let store = store_with("alice", "pw");

        identify(&mut session, "alice", &store).unwrap();
        assert_eq!(identify(&mut session, "bob", &store).unwrap(), Account::New);
        assert_eq!(
            session.phase(),
            &AuthPhase::AwaitPassword {
                username: "bob".into(),
                account: Account::New,
            }
        );
    }

    #[test]
    fn test_submit_password_new_account_creates_and_authenticates() {
        let mut session = keyed_session();
        let mut store = MemoryUserStore::new();
        identify(&mut session, "alice", &store).unwrap();

        let outcome = submit_password(&mut session, "alice", "pw", &mut store).unwrap();

        assert_eq!(outcome, PasswordOutcome::Created);
        assert!(session.password_set());
        assert_eq!(session.username(), Some("alice"));
        assert!(store.verify("alice", "pw").unwrap());
    }

    #[test]
    fn test_submit_password_wrong_password_stays_waiting() {
        let mut session = keyed_session();
        let mut store = store_with("alice", "right");
        identify(&mut session, "alice", &store).unwrap();

        for _ in 0..5 {
            let outcome = submit_password(&mut session, "alice", "wrong", &mut store).unwrap();
            assert_eq!(outcome, PasswordOutcome::Rejected);
            assert!(!session.password_set());
        }
        let outcome = submit_password(&mut session, "alice", "right", &mut store).unwrap();
        assert_eq!(outcome, PasswordOutcome::Accepted);
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_submit_password_without_username_is_out_of_order() {
        let mut session = keyed_session();
        let mut store = MemoryUserStore::new();

        let result = submit_password(&mut session, "alice", "pw", &mut store);

        assert!(matches!(result, Err(SessionError::OutOfOrder { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_submit_password_name_mismatch_is_out_of_order() {
        let mut session = keyed_session();
        let mut store = MemoryUserStore::new();
        identify(&mut session, "alice", &store).unwrap();

        let result = submit_password(&mut session, "mallory", "pw", &mut store);

        assert!(matches!(result, Err(SessionError::OutOfOrder { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_submit_password_store_conflict_is_fatal() {
        let mut session = keyed_session();
        let mut store = MemoryUserStore::new();
        identify(&mut session, "alice", &store).unwrap();
        // Another connection registers the name first.
        let hashed = hash_password("theirs");
        store.create("alice", &hashed.salt, &hashed.hash).unwrap();

        let err = submit_password(&mut session, "alice", "mine", &mut store).unwrap_err();

        assert!(err.is_fatal());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_identify_after_authentication_is_out_of_order() {
        let mut session = keyed_session();
        let mut store = MemoryUserStore::new();
        identify(&mut session, "alice", &store).unwrap();
        submit_password(&mut session, "alice", "pw", &mut store).unwrap();

        let result = identify(&mut session, "bob", &store);

        assert!(matches!(result, Err(SessionError::OutOfOrder { .. })));
        assert_eq!(session.username(), Some("alice"));
    }
}
