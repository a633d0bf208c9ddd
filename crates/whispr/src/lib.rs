//! # Whispr
//!
//! Encrypted multi-user chat over a length-prefixed wire protocol.
//!
//! A client connects, receives a plaintext greeting, and sends its RSA
//! public key. The server answers with an AES-256 session key encrypted
//! to that key; from then on every frame in both directions is sealed.
//! The client then picks a username and either creates the account or
//! logs into it, after which it can broadcast to the general chat or
//! message one user privately.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whispr::prelude::*;
//!
//! # async fn demo() -> Result<(), WhisprError> {
//! let server = WhisprServer::builder()
//!     .bind("0.0.0.0:5555")
//!     .build(MemoryUserStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! whispr            server event loop, handler, router, client
//! whispr-session    sessions, auth state machine, user stores
//! whispr-protocol   frame codec and message types
//! whispr-crypto     RSA handshake, AES envelope, password hashing
//! whispr-transport  TCP accept/read/write
//! ```

mod client;
mod config;
mod error;
mod handler;
pub mod router;
mod server;

pub use client::{ChatClient, ChatReader, ChatWriter, ClientCommand, Incoming, UsageError};
pub use config::{DEFAULT_BIND_ADDR, ServerConfig};
pub use error::WhisprError;
pub use handler::{
    CORRECT_PASSWORD, CREATED_USER, ChatCore, GREETING, INCORRECT_PASSWORD, USER_DOES_NOT_EXIST,
    USER_EXISTS,
};
pub use server::{WhisprServer, WhisprServerBuilder};

pub use whispr_crypto::{ClientKeyPair, SessionKey};
pub use whispr_protocol::{MessageType, Response, ResponseCode};
pub use whispr_session::{FileUserStore, MemoryUserStore, UserStore};
pub use whispr_transport::ConnectionId;

/// Everything needed to run a server or a client.
pub mod prelude {
    pub use crate::{
        ChatClient, ClientCommand, FileUserStore, Incoming, MemoryUserStore, MessageType, Response,
        ResponseCode, ServerConfig, UserStore, WhisprError, WhisprServer,
    };
}
