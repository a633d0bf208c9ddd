//! The session registry: every live connection, keyed by id.
//!
//! Connection ids are handed out in accept order, so iterating the
//! `BTreeMap` is iterating in connection order. The roster relies on
//! that.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. It is owned by the
//! server's event loop task and only ever touched from there.

use std::collections::BTreeMap;

use whispr_transport::ConnectionId;

use crate::Session;

/// All live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<ConnectionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. A session with the same id is replaced.
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id(), session);
    }

    /// Removes and returns a session.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of live sessions, authenticated or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// All sessions in connection order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Authenticated sessions in connection order.
    pub fn authenticated(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(|s| s.is_authenticated())
    }

    /// Authenticated sessions in connection order, mutably.
    pub fn authenticated_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut().filter(|s| s.is_authenticated())
    }

    /// The first authenticated session with exactly this username.
    pub fn find_authenticated(&self, username: &str) -> Option<ConnectionId> {
        self.authenticated()
            .find(|s| s.username() == Some(username))
            .map(Session::id)
    }

    /// Authenticated usernames in connection order.
    pub fn roster(&self) -> Vec<&str> {
        self.authenticated().filter_map(Session::username).collect()
    }
}

#[cfg(test)]
mod tests {
    use whispr_crypto::{SessionKey, hash_password};

    use super::*;
    use crate::{MemoryUserStore, UserStore, identify, submit_password};

    /// Builds an authenticated session for `username`.
    fn authed(id: u64, username: &str) -> Session {
        let mut store = MemoryUserStore::new();
        let hashed = hash_password("pw");
        store.create(username, &hashed.salt, &hashed.hash).unwrap();

        let mut session = Session::new(ConnectionId::new(id));
        session.mark_keyed(SessionKey::generate());
        identify(&mut session, username, &store).unwrap();
        submit_password(&mut session, username, "pw", &mut store).unwrap();
        session
    }

    #[test]
    fn test_roster_lists_authenticated_in_connection_order() {
        let mut registry = SessionRegistry::new();
        registry.insert(authed(3, "carol"));
        registry.insert(Session::new(ConnectionId::new(2)));
        registry.insert(authed(1, "alice"));

        assert_eq!(registry.roster(), vec!["alice", "carol"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_find_authenticated_is_case_sensitive() {
        let mut registry = SessionRegistry::new();
        registry.insert(authed(1, "alice"));

        assert_eq!(registry.find_authenticated("alice"), Some(ConnectionId::new(1)));
        assert_eq!(registry.find_authenticated("Alice"), None);
    }

    #[test]
    fn test_find_authenticated_ignores_unauthenticated() {
        let mut registry = SessionRegistry::new();
        registry.insert(Session::new(ConnectionId::new(1)));
        assert_eq!(registry.find_authenticated("alice"), None);
    }

    #[test]
    fn test_remove_returns_session_and_forgets_it() {
        let mut registry = SessionRegistry::new();
        registry.insert(authed(1, "alice"));

        let removed = registry.remove(ConnectionId::new(1)).unwrap();
        assert_eq!(removed.username(), Some("alice"));
        assert!(!registry.contains(ConnectionId::new(1)));
        assert!(registry.is_empty());
        assert!(registry.remove(ConnectionId::new(1)).is_none());
    }

    #[test]
    fn test_authenticated_mut_skips_pending_sessions() {
        let mut registry = SessionRegistry::new();
        registry.insert(authed(1, "alice"));
        registry.insert(Session::new(ConnectionId::new(2)));

        assert_eq!(registry.authenticated_mut().count(), 1);
        assert_eq!(registry.iter_mut().count(), 2);
    }
}
