//! Lowest transport layer: a plain TCP listener and stream. Grounded in
//! `hebo/src/socket.rs`'s `new_tcp_listener`, minus its Linux-specific
//! `SO_BINDTODEVICE`/`TCP_FASTOPEN` tuning (raw syscalls via the `nc`
//! crate) — not named by any broker operation, so it is left out rather
//! than carried along unused (see DESIGN.md).

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use super::{Accepted, Connection, Server};
use crate::error::Error;

#[derive(Clone, Copy, Debug)]
pub struct SocketConfig {
    pub bind_address: SocketAddr,
    /// Kernel accept backlog size, passed straight through to `listen(2)`.
    pub listen_queue_size: u32,
}

pub struct SocketServer {
    listener: TcpListener,
}

impl SocketServer {
    /// Binds via `TcpSocket` rather than `TcpListener::bind` so
    /// `listen_queue_size` reaches `listen(2)` as the backlog argument
    /// instead of being silently ignored.
    pub async fn bind(config: SocketConfig) -> Result<Self, Error> {
        log::info!(
            "binding tcp listener on {} with backlog {}",
            config.bind_address,
            config.listen_queue_size
        );
        let socket = if config.bind_address.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(config.bind_address)?;
        let listener = socket.listen(config.listen_queue_size)?;
        Ok(Self { listener })
    }

    /// The address actually bound, which may differ from the configured
    /// one when `bind_address`'s port is 0.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }
}

impl Server for SocketServer {
    type Connection = SocketConnection;

    async fn with_connection(&self) -> Result<Accepted<Self::Connection>, Error> {
        let (stream, peer_addr) = self.listener.accept().await?;
        log::debug!("accepted tcp connection from {peer_addr}");
        Ok(Accepted::Ready(SocketConnection { stream, peer_addr }))
    }
}

pub struct SocketConnection {
    pub(crate) stream: TcpStream,
    pub peer_addr: SocketAddr,
}

impl Connection for SocketConnection {
    type Message = Vec<u8>;

    async fn send(&mut self, message: &Vec<u8>) -> Result<(), Error> {
        self.stream.write_all(message).await?;
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; max_bytes];
        let n = self.stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn flush(&mut self) -> Result<(), Error> {
        self.stream.flush().await?;
        Ok(())
    }
}

// Lets higher layers (TLS, WebSocket) treat an accepted socket as a
// plain async byte stream, the same way `tokio_rustls`/`tokio_tungstenite`
// expect their inner transport to behave.
impl AsyncRead for SocketConnection {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for SocketConnection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}
