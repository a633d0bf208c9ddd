//! Wire protocol for Whispr.
//!
//! This crate defines the "language" that chat clients and the server
//! speak:
//!
//! - **Types** ([`Command`], [`ResponseCode`], [`MessageType`]): the
//!   header digits.
//! - **Messages** ([`Request`], [`Response`], the [`Message`] trait):
//!   typed views over a frame's fields.
//! - **Codec** ([`encode`], [`FrameDecoder`], [`read_message`]): how
//!   frames are turned into bytes and back, including the encrypted
//!   envelope.
//! - **Errors** ([`FramingError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (who is talking). It doesn't know about connections or users; it
//! only needs the session key, if there is one, to seal and open frames.
//!
//! ```text
//! Transport (bytes) → Protocol (Request/Response) → Session (identity)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::{
    FrameDecoder, LENGTH_FIELD_WIDTH, MAX_FIELD_LEN, check_encodable, encode, pad_with_length, read_message,
    read_request, read_response,
};
pub use error::FramingError;
pub use message::{ClientMessage, Message, Request, Response};
pub use types::{Command, HANDSHAKE_CODE, MessageType, ResponseCode};
