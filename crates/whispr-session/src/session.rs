//! The per-connection session record.
//!
//! A session is the server's view of one accepted connection. It tracks:
//! - WHO is on the other end (the [`AuthPhase`])
//! - HOW to talk to them (the client's public key and the session key)
//! - WHAT is waiting to be sent (the outbound queue) and what has
//!   arrived but not yet formed a whole frame (the inbound decoder)

use std::collections::VecDeque;

use whispr_crypto::{PeerPublicKey, SessionKey};
use whispr_protocol::{Command, FrameDecoder, FramingError, Request, Response, encode};
use whispr_transport::ConnectionId;

use crate::{Account, AuthPhase, SessionError};

/// One connection's protocol state.
///
/// Created on accept and owned by the server's event loop for as long as
/// the connection lives. Nothing else holds a reference to it.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    phase: AuthPhase,
    peer_public_key: Option<PeerPublicKey>,
    session_key: Option<SessionKey>,
    outbound: VecDeque<Response>,
    inbound: FrameDecoder,
}

impl Session {
    /// Creates a fresh, unidentified session with no keys.
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: AuthPhase::Unidentified,
            peer_public_key: None,
            session_key: None,
            outbound: VecDeque::new(),
            inbound: FrameDecoder::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: AuthPhase) {
        self.phase = phase;
    }

    /// The authenticated username. `None` until the password step
    /// succeeds, and never changes after that.
    pub fn username(&self) -> Option<&str> {
        match &self.phase {
            AuthPhase::Authenticated { username } => Some(username.as_str()),
            _ => None,
        }
    }

    /// True while waiting for the first password of an account that does
    /// not exist yet.
    pub fn is_new_user(&self) -> bool {
        matches!(
            self.phase,
            AuthPhase::AwaitPassword {
                account: Account::New,
                ..
            }
        )
    }

    /// True once a password has been created or verified.
    pub fn password_set(&self) -> bool {
        self.is_authenticated()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, AuthPhase::Authenticated { .. })
    }

    pub fn peer_public_key(&self) -> Option<&PeerPublicKey> {
        self.peer_public_key.as_ref()
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Records the outcome of the handshake.
    ///
    /// # Errors
    /// [`SessionError::OutOfOrder`] if a key is already set. The existing
    /// key is kept.
    pub fn complete_handshake(
        &mut self,
        peer_public_key: PeerPublicKey,
        session_key: SessionKey,
    ) -> Result<(), SessionError> {
        if self.session_key.is_some() {
            return Err(SessionError::out_of_order(
                Command::Handshake,
                "session key already set",
            ));
        }
        self.peer_public_key = Some(peer_public_key);
        self.session_key = Some(session_key);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn mark_keyed(&mut self, session_key: SessionKey) {
        self.session_key = Some(session_key);
    }

    // -- inbound ------------------------------------------------------------

    /// Buffers bytes read from the socket.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.push(data);
    }

    /// Decodes the next complete command, if one is buffered.
    ///
    /// Uses the session key as it is *now*, so a handshake decoded by one
    /// call switches the next call over to the envelope.
    pub fn next_request(&mut self) -> Result<Option<Request>, FramingError> {
        self.inbound.decode(self.session_key.as_ref())
    }

    // -- outbound -----------------------------------------------------------

    /// Appends a response to the outbound queue.
    pub fn enqueue(&mut self, response: Response) {
        self.outbound.push_back(response);
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Number of queued, unflushed responses.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Drains the queue in FIFO order without encoding. Mostly useful for
    /// inspecting what a session would have been sent.
    pub fn take_outbound(&mut self) -> Vec<Response> {
        self.outbound.drain(..).collect()
    }

    /// Drains the queue in FIFO order and encodes every response into one
    /// contiguous buffer, sealed with the session key if there is one.
    ///
    /// A response that cannot be encoded is logged and skipped. The rest
    /// of the queue still goes out, and the connection is not at fault.
    pub fn drain_encoded(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(response) = self.outbound.pop_front() {
            match encode(&response, self.session_key.as_ref()) {
                Ok(frame) => out.extend(frame),
                Err(e) => tracing::warn!(
                    conn_id = %self.id,
                    code = ?response.code,
                    error = %e,
                    "dropping response that cannot be encoded"
                ),
            }
        }
        out
    }
}
