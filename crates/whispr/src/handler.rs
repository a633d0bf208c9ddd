//! Per-connection dispatch: handshake, auth, and message routing.
//!
//! [`ChatCore`] is everything the server knows, with no I/O attached:
//! the session registry and the user store. The server's event loop
//! feeds it accepted connections and received bytes, then asks it for
//! the encoded bytes each connection should be sent. Keeping it
//! synchronous means the whole protocol can be exercised in tests
//! without a socket.
//!
//! For every complete frame the flow is:
//!   1. HANDSHAKE → mint the session key (once)
//!   2. SET_USERNAME / SET_PASSWORD → auth state machine
//!   3. BROADCAST / PRIVATE → router, authenticated sessions only
//!
//! A command that does not fit the session's phase is logged and
//! dropped; the connection stays up. Anything else that fails is fatal
//! to that connection only.

use whispr_crypto::{PeerPublicKey, offer_session_key};
use whispr_protocol::{ClientMessage, Command, MessageType, Request, Response, ResponseCode};
use whispr_session::{
    Account, PasswordOutcome, Session, SessionError, SessionRegistry, UserStore, identify,
    submit_password,
};
use whispr_transport::ConnectionId;

use crate::router;
use crate::WhisprError;

pub const GREETING: &str = "SERVER: Hello! Please send your RSA key.";
pub const USER_EXISTS: &str = "SERVER: User exists in the database. Please send password.";
pub const USER_DOES_NOT_EXIST: &str =
    "SERVER: User does not exist in the database.\nPlease set a new password.";
pub const CREATED_USER: &str = "SERVER: User created successfully!";
pub const CORRECT_PASSWORD: &str =
    "SERVER: Correct password! You may start sending messages in the global chat.";
pub const INCORRECT_PASSWORD: &str = "SERVER: Incorrect password! Please try again.";

/// The protocol engine: registry plus store, driven by connection events.
pub struct ChatCore<S> {
    registry: SessionRegistry,
    store: S,
}

impl<S: UserStore> ChatCore<S> {
    pub fn new(store: S) -> Self {
        Self {
            registry: SessionRegistry::new(),
            store,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a newly accepted connection and queues the plaintext
    /// greeting.
    pub fn accept(&mut self, id: ConnectionId) {
        let mut session = Session::new(id);
        session.enqueue(Response::text(ResponseCode::Hello, GREETING));
        self.registry.insert(session);
        tracing::debug!(conn_id = %id, "session created");
    }

    /// Feeds bytes read from a connection and handles every complete
    /// frame they finish.
    ///
    /// # Errors
    /// Any framing, crypto, or store failure. The caller should then
    /// [`disconnect`](Self::disconnect) the connection.
    pub fn receive(&mut self, id: ConnectionId, data: &[u8]) -> Result<(), WhisprError> {
        let Some(session) = self.registry.get_mut(id) else {
            tracing::debug!(conn_id = %id, "data for unknown connection dropped");
            return Ok(());
        };
        session.push_inbound(data);

        loop {
            let request = match self.registry.get_mut(id) {
                Some(session) => session.next_request()?,
                None => return Ok(()),
            };
            let Some(request) = request else {
                return Ok(());
            };
            match self.dispatch(id, request) {
                Ok(()) => {}
                Err(WhisprError::Session(e)) if !e.is_fatal() => {
                    tracing::warn!(conn_id = %id, error = %e, "ignoring out-of-order command");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Removes a connection. If it was authenticated, everyone else is
    /// told it left. Returns the removed session, if there was one.
    pub fn disconnect(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.registry.remove(id)?;
        if let Some(username) = session.username() {
            router::announce(
                &mut self.registry,
                None,
                MessageType::Text,
                &format!("User '{username}' has left the general chat!"),
            );
            tracing::info!(conn_id = %id, username, "user left");
        }
        tracing::debug!(
            conn_id = %id,
            dropped = session.outbound_len(),
            "session removed"
        );
        Some(session)
    }

    /// Encodes and empties the outbound queue of every session that has
    /// something to send, in connection order.
    ///
    /// Whether a frame is sealed is decided here, at flush time, from the
    /// session key as it is now.
    pub fn drain_outbound(&mut self) -> Vec<(ConnectionId, Vec<u8>)> {
        self.registry
            .iter_mut()
            .filter(|s| s.has_outbound())
            .map(|s| (s.id(), s.drain_encoded()))
            .collect()
    }

    fn dispatch(&mut self, id: ConnectionId, request: Request) -> Result<(), WhisprError> {
        let message_type = request.message_type;
        match request.message {
            ClientMessage::Handshake { public_key_pem } => {
                self.handshake(id, message_type, &public_key_pem)
            }
            ClientMessage::SetUsername { username } => {
                self.set_username(id, message_type, &username)
            }
            ClientMessage::SetPassword { username, password } => {
                self.set_password(id, message_type, &username, &password)
            }
            // The username field of chat commands is ignored: the
            // session's own identity is the sender.
            ClientMessage::Broadcast { text, .. } => {
                self.require_authenticated(id, Command::Broadcast)?;
                if let Err(e) = router::broadcast(&mut self.registry, id, message_type, &text) {
                    tracing::warn!(conn_id = %id, error = %e, "dropping oversized broadcast");
                }
                Ok(())
            }
            ClientMessage::Private {
                recipient, text, ..
            } => {
                self.require_authenticated(id, Command::Private)?;
                if let Err(e) =
                    router::private(&mut self.registry, id, &recipient, message_type, &text)
                {
                    tracing::warn!(conn_id = %id, error = %e, "dropping oversized private message");
                }
                Ok(())
            }
        }
    }

    fn require_authenticated(&self, id: ConnectionId, command: Command) -> Result<(), SessionError> {
        match self.registry.get(id) {
            Some(session) if session.is_authenticated() => Ok(()),
            _ => Err(SessionError::OutOfOrder {
                command,
                reason: "not authenticated",
            }),
        }
    }

    fn handshake(
        &mut self,
        id: ConnectionId,
        message_type: MessageType,
        public_key_pem: &str,
    ) -> Result<(), WhisprError> {
        let Some(session) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if session.session_key().is_some() {
            return Err(SessionError::OutOfOrder {
                command: Command::Handshake,
                reason: "session key already set",
            }
            .into());
        }

        let offer = offer_session_key(public_key_pem)?;
        session.enqueue(Response::new(ResponseCode::Handshake, message_type, offer.payload));
        session.complete_handshake(offer.peer_key, offer.session_key)?;
        let key_bits = session.peer_public_key().map(PeerPublicKey::bits);
        tracing::debug!(conn_id = %id, ?key_bits, "session key issued");
        Ok(())
    }

    fn set_username(
        &mut self,
        id: ConnectionId,
        message_type: MessageType,
        username: &str,
    ) -> Result<(), WhisprError> {
        let Some(session) = self.registry.get_mut(id) else {
            return Ok(());
        };
        let (code, text) = match identify(session, username, &self.store)? {
            Account::Existing => (ResponseCode::UserExists, USER_EXISTS),
            Account::New => (ResponseCode::UserDoesNotExist, USER_DOES_NOT_EXIST),
        };
        session.enqueue(Response::new(code, message_type, text));
        Ok(())
    }

    fn set_password(
        &mut self,
        id: ConnectionId,
        message_type: MessageType,
        username: &str,
        password: &str,
    ) -> Result<(), WhisprError> {
        let Some(session) = self.registry.get_mut(id) else {
            return Ok(());
        };
        let (code, text) = match submit_password(session, username, password, &mut self.store)? {
            PasswordOutcome::Created => (ResponseCode::CreatedUser, CREATED_USER),
            PasswordOutcome::Accepted => (ResponseCode::CorrectPassword, CORRECT_PASSWORD),
            PasswordOutcome::Rejected => {
                session.enqueue(Response::new(
                    ResponseCode::IncorrectPassword,
                    message_type,
                    INCORRECT_PASSWORD,
                ));
                return Ok(());
            }
        };
        session.enqueue(Response::new(code, message_type, text));

        let roster = router::roster_text(&self.registry);
        if let Some(session) = self.registry.get_mut(id) {
            session.enqueue(Response::new(ResponseCode::Ok, message_type, roster));
        }
        router::announce(
            &mut self.registry,
            Some(id),
            MessageType::Text,
            &format!("User '{username}' has joined the general chat!"),
        );
        Ok(())
    }
}
