//! Typed messages for each direction of the wire.
//!
//! The codec only knows about a code digit, a message type, and an
//! ordered list of string fields. The [`Message`] trait is the seam
//! between that untyped frame and the two typed views: [`Request`]
//! (client → server) and [`Response`] (server → client).

use crate::{Command, FramingError, MessageType, ResponseCode};

/// A frame that can be built from, and flattened into, ordered fields.
pub trait Message: Sized {
    /// Number of plaintext fields carried by frames with this code, or
    /// `None` when the digit is not a code of this direction.
    fn plaintext_arity(code: u8) -> Option<usize>;

    /// Builds a typed message from a decoded header and its fields.
    ///
    /// The codec guarantees `fields.len()` matches
    /// [`plaintext_arity`](Self::plaintext_arity) for `code`.
    fn from_fields(
        code: u8,
        message_type: MessageType,
        fields: Vec<String>,
    ) -> Result<Self, FramingError>;

    /// The header code digit.
    fn code(&self) -> u8;

    /// The header message-type digit's meaning.
    fn message_type(&self) -> MessageType;

    /// The plaintext fields, in wire order.
    fn fields(&self) -> Vec<&str>;
}

// ---------------------------------------------------------------------------
// Request: client → server
// ---------------------------------------------------------------------------

/// The body of a client command.
///
/// Chat and password commands carry the sender's username as their first
/// field. The server never trusts it and uses the connection's own
/// identity instead; the field is kept so frames stay faithful to what
/// was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Opens the handshake with the client's RSA public key.
    Handshake { public_key_pem: String },
    /// Announces which account this connection wants.
    SetUsername { username: String },
    /// Sets (new account) or checks (existing account) a password.
    SetPassword { username: String, password: String },
    /// A message for everyone in the general chat.
    Broadcast { username: String, text: String },
    /// A message for one online user.
    Private {
        username: String,
        recipient: String,
        text: String,
    },
}

impl ClientMessage {
    /// The command this body belongs to.
    pub fn command(&self) -> Command {
        match self {
            Self::Handshake { .. } => Command::Handshake,
            Self::SetUsername { .. } => Command::SetUsername,
            Self::SetPassword { .. } => Command::SetPassword,
            Self::Broadcast { .. } => Command::Broadcast,
            Self::Private { .. } => Command::Private,
        }
    }
}

/// A client command with its message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub message_type: MessageType,
    pub message: ClientMessage,
}

impl Request {
    /// Wraps a text-typed command.
    pub fn text(message: ClientMessage) -> Self {
        Self {
            message_type: MessageType::Text,
            message,
        }
    }

    /// The command this request carries.
    pub fn command(&self) -> Command {
        self.message.command()
    }
}

impl Message for Request {
    fn plaintext_arity(code: u8) -> Option<usize> {
        Command::from_digit(code).map(Command::plaintext_arity)
    }

    fn from_fields(
        code: u8,
        message_type: MessageType,
        fields: Vec<String>,
    ) -> Result<Self, FramingError> {
        let command = Command::from_digit(code)
            .ok_or_else(|| FramingError::malformed(format!("unknown command code {code}")))?;

        let message = match command {
            Command::Handshake => {
                let [public_key_pem] = exact_fields(command, fields)?;
                ClientMessage::Handshake { public_key_pem }
            }
            Command::SetUsername => {
                let [username] = exact_fields(command, fields)?;
                ClientMessage::SetUsername { username }
            }
            Command::SetPassword => {
                let [username, password] = exact_fields(command, fields)?;
                ClientMessage::SetPassword { username, password }
            }
            Command::Broadcast => {
                let [username, text] = exact_fields(command, fields)?;
                ClientMessage::Broadcast { username, text }
            }
            Command::Private => {
                let [username, recipient, text] = exact_fields(command, fields)?;
                ClientMessage::Private {
                    username,
                    recipient,
                    text,
                }
            }
        };
        Ok(Self {
            message_type,
            message,
        })
    }

    fn code(&self) -> u8 {
        self.command().digit()
    }

    fn message_type(&self) -> MessageType {
        self.message_type
    }

    fn fields(&self) -> Vec<&str> {
        match &self.message {
            ClientMessage::Handshake { public_key_pem } => vec![public_key_pem],
            ClientMessage::SetUsername { username } => vec![username],
            ClientMessage::SetPassword { username, password } => vec![username, password],
            ClientMessage::Broadcast { username, text } => vec![username, text],
            ClientMessage::Private {
                username,
                recipient,
                text,
            } => vec![username, recipient, text],
        }
    }
}

/// Moves exactly `N` decoded fields out of `fields`.
fn exact_fields<const N: usize>(
    command: Command,
    fields: Vec<String>,
) -> Result<[String; N], FramingError> {
    fields.try_into().map_err(|f: Vec<String>| {
        FramingError::malformed(format!("{command} expects {N} fields, got {}", f.len()))
    })
}

// ---------------------------------------------------------------------------
// Response: server → client
// ---------------------------------------------------------------------------

/// A server response. Every response is a code plus one text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    pub message_type: MessageType,
    pub text: String,
}

impl Response {
    pub fn new(code: ResponseCode, message_type: MessageType, text: impl Into<String>) -> Self {
        Self {
            code,
            message_type,
            text: text.into(),
        }
    }

    /// Shorthand for a text-typed response.
    pub fn text(code: ResponseCode, text: impl Into<String>) -> Self {
        Self::new(code, MessageType::Text, text)
    }
}

impl Message for Response {
    fn plaintext_arity(code: u8) -> Option<usize> {
        ResponseCode::from_digit(code).map(|_| 1)
    }

    fn from_fields(
        code: u8,
        message_type: MessageType,
        fields: Vec<String>,
    ) -> Result<Self, FramingError> {
        let code = ResponseCode::from_digit(code)
            .ok_or_else(|| FramingError::malformed(format!("unknown response code {code}")))?;
        let [text]: [String; 1] = fields
            .try_into()
            .map_err(|f: Vec<String>| {
                FramingError::malformed(format!("response expects 1 field, got {}", f.len()))
            })?;
        Ok(Self {
            code,
            message_type,
            text,
        })
    }

    fn code(&self) -> u8 {
        self.code.digit()
    }

    fn message_type(&self) -> MessageType {
        self.message_type
    }

    fn fields(&self) -> Vec<&str> {
        vec![&self.text]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_request_from_fields_private_keeps_order() {
        let req = Request::from_fields(
            2,
            MessageType::Text,
            strings(&["alice", "bob", "hi"]),
        )
        .unwrap();

        assert_eq!(
            req.message,
            ClientMessage::Private {
                username: "alice".into(),
                recipient: "bob".into(),
                text: "hi".into(),
            }
        );
        assert_eq!(req.fields(), vec!["alice", "bob", "hi"]);
    }

    #[test]
    fn test_request_from_fields_wrong_arity_is_malformed() {
        let result = Request::from_fields(8, MessageType::Text, strings(&["alice"]));
        assert!(matches!(result, Err(FramingError::Malformed(_))));
    }

    #[test]
    fn test_request_from_fields_extra_field_is_malformed() {
        let result = Request::from_fields(1, MessageType::Text, strings(&["a", "hi", "extra"]));
        match result {
            Err(FramingError::Malformed(reason)) => {
                assert_eq!(reason, "BROADCAST expects 2 fields, got 3");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_request_from_fields_unknown_code_is_malformed() {
        let result = Request::from_fields(4, MessageType::Text, strings(&["x"]));
        assert!(matches!(result, Err(FramingError::Malformed(_))));
    }

    #[test]
    fn test_request_arity_per_command() {
        assert_eq!(Request::plaintext_arity(9), Some(1));
        assert_eq!(Request::plaintext_arity(7), Some(1));
        assert_eq!(Request::plaintext_arity(8), Some(2));
        assert_eq!(Request::plaintext_arity(1), Some(2));
        assert_eq!(Request::plaintext_arity(2), Some(3));
        assert_eq!(Request::plaintext_arity(0), None);
    }

    #[test]
    fn test_response_from_fields_single_text() {
        let resp = Response::from_fields(3, MessageType::Voice, strings(&["gone"])).unwrap();
        assert_eq!(resp.code, ResponseCode::RecipientNotFound);
        assert_eq!(resp.message_type, MessageType::Voice);
        assert_eq!(resp.text, "gone");
    }

    #[test]
    fn test_response_from_fields_two_fields_is_malformed() {
        let result = Response::from_fields(2, MessageType::Text, strings(&["a", "b"]));
        assert!(matches!(result, Err(FramingError::Malformed(_))));
    }

    #[test]
    fn test_request_command_matches_code() {
        let req = Request::text(ClientMessage::SetUsername {
            username: "carol".into(),
        });
        assert_eq!(req.command(), Command::SetUsername);
        assert_eq!(req.code(), 7);
    }
}
