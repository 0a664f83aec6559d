//! Layered transport stack: Socket → TLS → WebSocket → MQTT framing
//! (spec §4.C). Grounded in `hebo/src/stream.rs` (a `Stream` enum over
//! `TcpStream`/`TlsStream`/`WebSocketStream` with uniform `read_buf`/
//! `write` methods) and `hebo/src/listener/init.rs` (`Listener::bind`/
//! `accept` building TLS acceptors and WebSocket upgrades per protocol).
//!
//! Unlike the teacher's single `Stream` enum, each layer here is its own
//! type parameterized over its inner layer (`TlsServer<Inner>`,
//! `WebSocketConnection<Inner>`, ...), so a listener's concrete protocol
//! stack is visible in its type rather than matched on at every I/O
//! call. Both are the "uniform abstraction" the spec allows (§9 design
//! note); this crate picks static composition.

pub mod mqtt;
pub mod socket;
pub mod tls;
pub mod websocket;

use crate::error::{Error, ErrorKind};

/// A connection that can send, receive and flush byte chunks (or, for
/// the MQTT layer, whole packets — see `mqtt::MqttConnection`).
pub trait Connection: Send {
    type Message;

    async fn send(&mut self, message: &Self::Message) -> Result<(), Error>;
    async fn receive(&mut self, max_bytes: usize) -> Result<Self::Message, Error>;
    async fn flush(&mut self) -> Result<(), Error>;
}

/// Either an already-accepted connection, or the handle to a task still
/// performing a handshake on top of one (TLS, WebSocket). The caller can
/// await `join` to get the finished connection; keeping the handle
/// separate is what lets `with_connection` return before a slow
/// handshake completes, so new connections keep being accepted at the
/// lowest layer (spec §4.C concurrency requirement).
pub enum Accepted<C> {
    Ready(C),
    Spawned(tokio::task::JoinHandle<Result<C, Error>>),
}

impl<C> Accepted<C> {
    /// Wait for the handshake (if any) to finish and return the
    /// connection, or propagate its failure.
    pub async fn join(self) -> Result<C, Error> {
        match self {
            Self::Ready(conn) => Ok(conn),
            Self::Spawned(handle) => handle
                .await
                .map_err(|err| Error::new(ErrorKind::Transport, format!("handshake task panicked: {err}")))?,
        }
    }
}

/// A listening endpoint for one transport layer.
pub trait Server: Send + Sync {
    type Connection: Connection;

    /// Accept one connection at this layer. Returns as soon as the
    /// lowest layer has a socket; any handshake this layer itself
    /// performs (TLS, WebSocket upgrade) is represented by
    /// `Accepted::Spawned` so it runs without blocking further accepts.
    async fn with_connection(&self) -> Result<Accepted<Self::Connection>, Error>;
}
