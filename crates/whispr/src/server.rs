//! `WhisprServer` builder and event loop.
//!
//! This is the entry point for running a Whispr server. It ties
//! together all the layers: transport → protocol → session → router.
//!
//! # Task layout
//!
//! ```text
//!   reader task (per conn) ──Data/Closed──┐
//!   reader task (per conn) ──Data/Closed──┤
//!                                         ▼
//!   accept ──────────────────────→  event loop (owns ChatCore)
//!                                         │ encoded frames
//!                                         ▼
//!                     writer task (per conn) ──Closed on failure──┐
//!                                                                 │
//!                                 (back into the event loop) ◄────┘
//! ```
//!
//! Only the event loop touches sessions, so nothing is locked. Reader
//! and writer tasks own nothing but their half of the socket. Tearing a
//! connection down aborts both tasks, which drops both halves and closes
//! the socket even if the peer has stopped reading.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use whispr_session::UserStore;
use whispr_transport::{
    ConnectionId, ConnectionReader, ConnectionWriter, TcpConnection, TcpTransport, Transport,
    TransportError,
};

use crate::{ChatCore, ServerConfig, WhisprError};

/// What connection tasks report to the event loop.
#[derive(Debug)]
enum ConnectionEvent {
    /// Bytes arrived.
    Data(ConnectionId, Bytes),
    /// The connection is unusable: EOF, read error, or write error.
    Closed(ConnectionId, TransportError),
}

/// The event loop's handle on one connection's tasks.
struct Link {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Builder for configuring and starting a Whispr server.
///
/// # Example
///
/// ```rust,no_run
/// use whispr::prelude::*;
///
/// # async fn demo() -> Result<(), WhisprError> {
/// let server = WhisprServer::builder()
///     .bind("0.0.0.0:5555")
///     .build(MemoryUserStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct WhisprServerBuilder {
    config: ServerConfig,
}

impl WhisprServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener. The server does not accept anything until
    /// [`run`](WhisprServer::run) is called.
    pub async fn build<S: UserStore>(self, store: S) -> Result<WhisprServer<S>, WhisprError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(WhisprServer {
            transport,
            core: ChatCore::new(store),
            links: HashMap::new(),
            events_tx,
            events_rx,
        })
    }
}

impl Default for WhisprServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Whispr server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WhisprServer<S> {
    transport: TcpTransport,
    core: ChatCore<S>,
    links: HashMap<ConnectionId, Link>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl WhisprServer<()> {
    /// Creates a new builder.
    pub fn builder() -> WhisprServerBuilder {
        WhisprServerBuilder::new()
    }
}

impl<S: UserStore> WhisprServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the event loop. Runs until the process is terminated; a
    /// failing connection never stops it.
    pub async fn run(mut self) -> Result<(), WhisprError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Whispr server running");

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => self.on_accept(conn),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                Some(event) = self.events_rx.recv() => self.on_event(event),
            }
            self.flush();
        }
    }

    fn on_accept(&mut self, conn: TcpConnection) {
        let id = conn.id();
        let peer = conn.peer_addr();
        let (reader, writer) = conn.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(reader, self.events_tx.clone()));
        let writer = tokio::spawn(write_loop(writer, outbound_rx, self.events_tx.clone()));
        self.links.insert(
            id,
            Link {
                outbound,
                reader,
                writer,
            },
        );
        self.core.accept(id);

        tracing::info!(conn_id = %id, %peer, "client connected");
    }

    fn on_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Data(id, bytes) => {
                if let Err(e) = self.core.receive(id, &bytes) {
                    tracing::info!(conn_id = %id, error = %e, "dropping connection");
                    self.teardown(id);
                }
            }
            ConnectionEvent::Closed(id, error) => {
                if !self.links.contains_key(&id) {
                    return;
                }
                if error.is_disconnect() {
                    tracing::info!(conn_id = %id, reason = %error, "client disconnected");
                } else {
                    tracing::warn!(conn_id = %id, error = %error, "connection failed");
                }
                self.teardown(id);
            }
        }
    }

    /// Hands every queued frame to its writer task. Tearing a session
    /// down queues leave notices for the others, so this repeats until
    /// nothing is left.
    fn flush(&mut self) {
        loop {
            let batch = self.core.drain_outbound();
            if batch.is_empty() {
                return;
            }
            for (id, bytes) in batch {
                if bytes.is_empty() {
                    continue;
                }
                let delivered = self
                    .links
                    .get(&id)
                    .is_some_and(|link| link.outbound.send(bytes).is_ok());
                if !delivered {
                    self.teardown(id);
                }
            }
        }
    }

    /// Forgets a connection. Both tasks are stopped outright, so frames
    /// still queued for it are lost.
    fn teardown(&mut self, id: ConnectionId) {
        if let Some(link) = self.links.remove(&id) {
            link.reader.abort();
            link.writer.abort();
        }
        self.core.disconnect(id);
    }
}

async fn read_loop(mut reader: ConnectionReader, events: mpsc::UnboundedSender<ConnectionEvent>) {
    let id = reader.id();
    let error = loop {
        match reader.recv_chunk().await {
            Ok(Some(bytes)) => {
                if events.send(ConnectionEvent::Data(id, bytes)).is_err() {
                    return;
                }
            }
            Ok(None) => break TransportError::ConnectionClosed("peer closed the connection".into()),
            Err(e) => break e,
        }
    };
    let _ = events.send(ConnectionEvent::Closed(id, error));
}

async fn write_loop(
    mut writer: ConnectionWriter,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let id = writer.id();
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = writer.send(&bytes).await {
            tracing::debug!(conn_id = %id, error = %e, "write failed");
            let _ = events.send(ConnectionEvent::Closed(id, e));
            return;
        }
    }
    let _ = writer.close().await;
}
