//! Session management for Whispr.
//!
//! This crate handles everything the server knows about a connection
//! between accepting it and dropping it:
//!
//! 1. **Session state** ([`Session`]): keys, auth phase, and the
//!    inbound/outbound buffers of one connection
//! 2. **Authentication** ([`identify`], [`submit_password`]): the
//!    username-then-password state machine
//! 3. **Registry** ([`SessionRegistry`]): every live session, in
//!    connection order
//! 4. **Accounts** ([`UserStore`] trait, [`MemoryUserStore`],
//!    [`FileUserStore`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server Layer (above)  ← routes messages between sessions
//!     ↕
//! Session Layer (this crate)  ← who is connected and what they may do
//!     ↕
//! Protocol Layer (below)  ← frames, codes, the envelope
//! ```

mod auth;
mod error;
mod registry;
mod session;
mod store;

pub use auth::{Account, AuthPhase, PasswordOutcome, identify, submit_password};
pub use error::{SessionError, StoreError};
pub use registry::SessionRegistry;
pub use session::Session;
pub use store::{FileUserStore, MemoryUserStore, UserRecord, UserStore};
