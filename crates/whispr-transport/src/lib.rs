//! Transport layer for Whispr.
//!
//! Provides the [`Transport`] trait for accepting connections, a plain
//! TCP implementation ([`TcpTransport`]), and the two connection halves
//! ([`ConnectionReader`], [`ConnectionWriter`]) that the server hands to
//! its per-connection reader and writer tasks.
//!
//! The transport knows nothing about frames: it moves raw byte chunks.
//! Framing lives one layer up, in `whispr-protocol`.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{ConnectionReader, ConnectionWriter, TcpConnection, TcpTransport};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Ids are handed out in accept order and never reused within a process,
/// so ordering by id is ordering by connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr>;
}
