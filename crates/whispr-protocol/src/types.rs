//! Core protocol types for Whispr's wire format.
//!
//! Every frame starts with two single decimal digits: a code and a
//! message type. Codes mean different things depending on direction, so
//! there is one enum per direction ([`Command`] for client → server,
//! [`ResponseCode`] for server → client). Both directions reuse `9` for
//! the handshake, and the handshake is the one frame that is never
//! encrypted.

use std::fmt;

/// The code both directions use for the handshake frame.
pub const HANDSHAKE_CODE: u8 = 9;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// What the text payload of a message represents.
///
/// Voice clips travel as hex text inside an ordinary field; only the
/// presentation layer cares about the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageType {
    #[default]
    Text,
    Voice,
}

impl MessageType {
    /// Parses the header digit.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::Text),
            1 => Some(Self::Voice),
            _ => None,
        }
    }

    /// Returns the header digit.
    pub fn digit(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Voice => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Command: client → server
// ---------------------------------------------------------------------------

/// Command codes a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Broadcast,
    Private,
    SetUsername,
    SetPassword,
    Handshake,
}

impl Command {
    /// Parses the header digit.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(Self::Broadcast),
            2 => Some(Self::Private),
            7 => Some(Self::SetUsername),
            8 => Some(Self::SetPassword),
            HANDSHAKE_CODE => Some(Self::Handshake),
            _ => None,
        }
    }

    /// Returns the header digit.
    pub fn digit(self) -> u8 {
        match self {
            Self::Broadcast => 1,
            Self::Private => 2,
            Self::SetUsername => 7,
            Self::SetPassword => 8,
            Self::Handshake => HANDSHAKE_CODE,
        }
    }

    /// How many fields follow the header when the frame is not encrypted.
    ///
    /// ```text
    /// HANDSHAKE     public key PEM
    /// SET_USERNAME  username
    /// SET_PASSWORD  username, password
    /// BROADCAST     username, text
    /// PRIVATE       username, recipient, text
    /// ```
    pub fn plaintext_arity(self) -> usize {
        match self {
            Self::Handshake | Self::SetUsername => 1,
            Self::SetPassword | Self::Broadcast => 2,
            Self::Private => 3,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Broadcast => "BROADCAST",
            Self::Private => "PRIVATE",
            Self::SetUsername => "SET_USERNAME",
            Self::SetPassword => "SET_PASSWORD",
            Self::Handshake => "HANDSHAKE",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ResponseCode: server → client
// ---------------------------------------------------------------------------

/// Response codes the server may send. Every response carries exactly one
/// text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Greeting sent on accept, before any encryption.
    Hello,
    /// A delivered chat message or a roster listing.
    Ok,
    /// A private message named a user who is not online.
    RecipientNotFound,
    UserExists,
    UserDoesNotExist,
    IncorrectPassword,
    CorrectPassword,
    CreatedUser,
    /// "Here is your session key."
    Handshake,
}

impl ResponseCode {
    /// Parses the header digit.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(Self::Hello),
            2 => Some(Self::Ok),
            3 => Some(Self::RecipientNotFound),
            4 => Some(Self::UserExists),
            5 => Some(Self::UserDoesNotExist),
            6 => Some(Self::IncorrectPassword),
            7 => Some(Self::CorrectPassword),
            8 => Some(Self::CreatedUser),
            HANDSHAKE_CODE => Some(Self::Handshake),
            _ => None,
        }
    }

    /// Returns the header digit.
    pub fn digit(self) -> u8 {
        match self {
            Self::Hello => 1,
            Self::Ok => 2,
            Self::RecipientNotFound => 3,
            Self::UserExists => 4,
            Self::UserDoesNotExist => 5,
            Self::IncorrectPassword => 6,
            Self::CorrectPassword => 7,
            Self::CreatedUser => 8,
            Self::Handshake => HANDSHAKE_CODE,
        }
    }
}
