//! Message routing between authenticated sessions.
//!
//! The router holds no state of its own. Every function looks at the live
//! registry, formats the delivered text, and appends it to the right
//! outbound queues. Nothing is written to a socket here; the server
//! flushes queues after each event.
//!
//! Delivered texts follow a fixed convention that clients parse:
//!
//! ```text
//! broadcast   "<sender>: <text>"
//! private     "[Private Message from <sender>]: <text>"
//! server      "Server: <text>"
//! ```
//!
//! The prefixes make a delivered frame larger than the request it came
//! from, so chat traffic is size-checked before anything is queued. A
//! message that would not fit is refused for the sender only.

use whispr_protocol::{FramingError, MessageType, Response, ResponseCode, check_encodable};
use whispr_session::{Session, SessionRegistry};
use whispr_transport::ConnectionId;

/// Sender name used for server-originated broadcasts.
pub const SERVER_SENDER: &str = "Server";

/// What happened to a private message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateDelivery {
    Delivered(ConnectionId),
    RecipientNotFound,
}

/// Sends `text` from `sender` to every *other* authenticated session.
///
/// Returns how many sessions it was queued for. An unauthenticated
/// sender reaches nobody.
///
/// # Errors
/// [`FramingError::FieldTooLarge`] if the delivered frame would not fit.
/// Nothing is queued in that case.
pub fn broadcast(
    registry: &mut SessionRegistry,
    sender: ConnectionId,
    message_type: MessageType,
    text: &str,
) -> Result<usize, FramingError> {
    let Some(name) = sender_name(registry, sender) else {
        return Ok(0);
    };
    let line = format!("{name}: {text}");
    check_deliverable(&Response::new(ResponseCode::Ok, message_type, line.as_str()))?;
    let delivered = fan_out(registry, Some(sender), message_type, &line);
    tracing::debug!(%sender, username = %name, delivered, "broadcast");
    Ok(delivered)
}

/// Sends `text` from `sender` to the authenticated session named
/// `recipient` (exact, case-sensitive match).
///
/// When nobody by that name is online, the sender is told so with
/// `RECIPIENT_NOT_FOUND`. The sender gets no confirmation otherwise.
///
/// # Errors
/// [`FramingError::FieldTooLarge`] if the frame for either of them would
/// not fit. Nothing is queued in that case.
pub fn private(
    registry: &mut SessionRegistry,
    sender: ConnectionId,
    recipient: &str,
    message_type: MessageType,
    text: &str,
) -> Result<PrivateDelivery, FramingError> {
    let Some(name) = sender_name(registry, sender) else {
        return Ok(PrivateDelivery::RecipientNotFound);
    };

    let target = registry.find_authenticated(recipient);
    let (to, response, outcome) = match target {
        Some(id) => (
            id,
            Response::new(
                ResponseCode::Ok,
                message_type,
                format!("[Private Message from {name}]: {text}"),
            ),
            PrivateDelivery::Delivered(id),
        ),
        None => (
            sender,
            Response::new(
                ResponseCode::RecipientNotFound,
                message_type,
                format!("SERVER: User '{recipient}' not found."),
            ),
            PrivateDelivery::RecipientNotFound,
        ),
    };
    check_deliverable(&response)?;
    if let Some(session) = registry.get_mut(to) {
        session.enqueue(response);
    }
    tracing::debug!(%sender, username = %name, recipient, ?outcome, "private message");
    Ok(outcome)
}

/// Broadcasts a server notice, `Server: <text>`, to every authenticated
/// session except `except`.
pub fn announce(
    registry: &mut SessionRegistry,
    except: Option<ConnectionId>,
    message_type: MessageType,
    text: &str,
) -> usize {
    fan_out(
        registry,
        except,
        message_type,
        &format!("{SERVER_SENDER}: {text}"),
    )
}

/// The roster line sent to a newly authenticated session.
///
/// ```text
/// SERVER: Clients connected to general are: ['alice', 'bob']
/// ```
pub fn roster_text(registry: &SessionRegistry) -> String {
    let names: Vec<String> = registry
        .roster()
        .into_iter()
        .map(|name| format!("'{name}'"))
        .collect();
    format!(
        "SERVER: Clients connected to general are: [{}]",
        names.join(", ")
    )
}

fn sender_name(registry: &SessionRegistry, sender: ConnectionId) -> Option<String> {
    registry
        .get(sender)
        .and_then(Session::username)
        .map(str::to_owned)
}

/// Recipients are always past the handshake, so their frames are sealed.
fn check_deliverable(response: &Response) -> Result<(), FramingError> {
    check_encodable(response, true)
}

fn fan_out(
    registry: &mut SessionRegistry,
    except: Option<ConnectionId>,
    message_type: MessageType,
    line: &str,
) -> usize {
    let mut delivered = 0;
    for session in registry.authenticated_mut() {
        if Some(session.id()) == except {
            continue;
        }
        session.enqueue(Response::new(ResponseCode::Ok, message_type, line));
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use whispr_crypto::{PeerPublicKey, SessionKey};
    use whispr_session::{MemoryUserStore, identify, submit_password};

    use super::*;

    /// Builds a registry where each name is an authenticated session, in
    /// the given order, plus one session that never authenticated.
    fn registry_with(names: &[&str]) -> SessionRegistry {
        let mut registry = SessionRegistry::new();
        let mut store = MemoryUserStore::new();
        for (i, name) in names.iter().enumerate() {
            let id = ConnectionId::new(i as u64 + 1);
            registry.insert(authenticated(id, name, &mut store));
        }
        registry.insert(Session::new(ConnectionId::new(100)));
        registry
    }

    fn authenticated(id: ConnectionId, name: &str, store: &mut MemoryUserStore) -> Session {
        let mut session = Session::new(id);
        session
            .complete_handshake(test_peer_key(), SessionKey::generate())
            .unwrap();
        identify(&mut session, name, store).unwrap();
        submit_password(&mut session, name, "pw", store).unwrap();
        session
    }

    fn test_peer_key() -> PeerPublicKey {
        crate::test_support::keypair().public_key()
    }

    fn texts(registry: &mut SessionRegistry, id: u64) -> Vec<(ResponseCode, String)> {
        registry
            .get_mut(ConnectionId::new(id))
            .unwrap()
            .take_outbound()
            .into_iter()
            .map(|r| (r.code, r.text))
            .collect()
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_sender() {
        let mut registry = registry_with(&["a", "b", "c"]);

        let delivered = broadcast(&mut registry, ConnectionId::new(1), MessageType::Text, "hi").unwrap();

        assert_eq!(delivered, 2);
        assert!(texts(&mut registry, 1).is_empty());
        assert_eq!(texts(&mut registry, 2), vec![(ResponseCode::Ok, "a: hi".to_string())]);
        assert_eq!(texts(&mut registry, 3), vec![(ResponseCode::Ok, "a: hi".to_string())]);
        assert!(texts(&mut registry, 100).is_empty());
    }

    #[test]
    fn test_broadcast_keeps_message_type() {
        let mut registry = registry_with(&["a", "b"]);
        broadcast(&mut registry, ConnectionId::new(1), MessageType::Voice, "0a0b").unwrap();

        let got = registry
            .get_mut(ConnectionId::new(2))
            .unwrap()
            .take_outbound();
        assert_eq!(got[0].message_type, MessageType::Voice);
    }

    #[test]
    fn test_broadcast_from_unauthenticated_reaches_nobody() {
        let mut registry = registry_with(&["a"]);
        assert_eq!(
            broadcast(&mut registry, ConnectionId::new(100), MessageType::Text, "x").unwrap(),
            0
        );
        assert!(texts(&mut registry, 1).is_empty());
    }

    #[test]
    fn test_private_delivers_only_to_recipient() {
        let mut registry = registry_with(&["a", "b", "c"]);

        let outcome =
            private(&mut registry, ConnectionId::new(1), "c", MessageType::Text, "psst").unwrap();

        assert_eq!(outcome, PrivateDelivery::Delivered(ConnectionId::new(3)));
        assert!(texts(&mut registry, 1).is_empty());
        assert!(texts(&mut registry, 2).is_empty());
        assert_eq!(
            texts(&mut registry, 3),
            vec![(ResponseCode::Ok, "[Private Message from a]: psst".to_string())]
        );
    }

    #[test]
    fn test_private_unknown_recipient_tells_only_sender() {
        let mut registry = registry_with(&["a", "b"]);

        let outcome =
            private(&mut registry, ConnectionId::new(1), "ghost", MessageType::Text, "x").unwrap();

        assert_eq!(outcome, PrivateDelivery::RecipientNotFound);
        assert_eq!(
            texts(&mut registry, 1),
            vec![(
                ResponseCode::RecipientNotFound,
                "SERVER: User 'ghost' not found.".to_string()
            )]
        );
        assert!(texts(&mut registry, 2).is_empty());
    }

    #[test]
    fn test_private_recipient_match_is_case_sensitive() {
        let mut registry = registry_with(&["a", "bob"]);
        let outcome =
            private(&mut registry, ConnectionId::new(1), "Bob", MessageType::Text, "x").unwrap();
        assert_eq!(outcome, PrivateDelivery::RecipientNotFound);
    }

    #[test]
    fn test_broadcast_too_large_after_prefix_queues_nothing() {
        let mut registry = registry_with(&["a", "b"]);
        let text = "x".repeat(499_960);

        let result = broadcast(&mut registry, ConnectionId::new(1), MessageType::Text, &text);

        assert!(matches!(result, Err(FramingError::FieldTooLarge(_))));
        assert!(texts(&mut registry, 1).is_empty());
        assert!(texts(&mut registry, 2).is_empty());
    }

    #[test]
    fn test_private_too_large_after_prefix_queues_nothing() {
        let mut registry = registry_with(&["a", "b"]);
        let text = "x".repeat(499_940);

        let result = private(&mut registry, ConnectionId::new(1), "b", MessageType::Text, &text);

        assert!(matches!(result, Err(FramingError::FieldTooLarge(_))));
        assert!(texts(&mut registry, 1).is_empty());
        assert!(texts(&mut registry, 2).is_empty());
    }

    #[test]
    fn test_announce_excludes_one_session() {
        let mut registry = registry_with(&["a", "b"]);

        let delivered = announce(
            &mut registry,
            Some(ConnectionId::new(2)),
            MessageType::Text,
            "User 'b' has joined the general chat!",
        );

        assert_eq!(delivered, 1);
        assert_eq!(
            texts(&mut registry, 1),
            vec![(
                ResponseCode::Ok,
                "Server: User 'b' has joined the general chat!".to_string()
            )]
        );
        assert!(texts(&mut registry, 2).is_empty());
    }

    #[test]
    fn test_roster_text_quotes_names_in_connection_order() {
        let registry = registry_with(&["a", "b"]);
        assert_eq!(
            roster_text(&registry),
            "SERVER: Clients connected to general are: ['a', 'b']"
        );
    }

    #[test]
    fn test_roster_text_empty_registry() {
        let registry = SessionRegistry::new();
        assert_eq!(
            roster_text(&registry),
            "SERVER: Clients connected to general are: []"
        );
    }
}
