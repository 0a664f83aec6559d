//! TLS layer wrapping a socket connection. Grounded in
//! `hebo/src/listener/init.rs`'s `get_cert_config`/`TlsAcceptor` usage;
//! loading certificate and key material from disk is an excluded
//! collaborator's concern (SPEC_FULL §4.F), so this layer only consumes
//! an already-built `rustls::ServerConfig` rather than reimplementing
//! `load_certs`/`load_keys`.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_rustls::rustls;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use super::socket::SocketServer;
use super::{Accepted, Connection, Server};
use crate::error::Error;

#[derive(Clone)]
pub struct TlsConfig {
    pub server_config: Arc<rustls::ServerConfig>,
}

pub struct TlsServer {
    inner: SocketServer,
    acceptor: TlsAcceptor,
}

impl TlsServer {
    #[must_use]
    pub fn new(inner: SocketServer, config: TlsConfig) -> Self {
        Self {
            inner,
            acceptor: TlsAcceptor::from(config.server_config),
        }
    }
}

impl Server for TlsServer {
    type Connection = TlsConnection;

    /// Accepts the underlying socket connection synchronously, then
    /// spawns the TLS handshake itself so a slow or hostile client can't
    /// stall acceptance of further connections.
    async fn with_connection(&self) -> Result<Accepted<Self::Connection>, Error> {
        let socket = self.inner.with_connection().await?.join().await?;
        let acceptor = self.acceptor.clone();
        let peer_addr = socket.peer_addr;
        let handle = tokio::spawn(async move {
            let stream = acceptor.accept(socket.stream).await.map_err(Error::from)?;
            let peer_certificates = stream.get_ref().1.peer_certificates().map(<[_]>::to_vec);
            log::debug!("completed tls handshake with {peer_addr}");
            Ok(TlsConnection {
                stream,
                peer_addr,
                peer_certificates,
            })
        });
        Ok(Accepted::Spawned(handle))
    }
}

pub struct TlsConnection {
    stream: TlsStream<tokio::net::TcpStream>,
    pub peer_addr: SocketAddr,
    /// Certificate chain the client presented during the handshake, if
    /// client authentication was requested and satisfied.
    pub peer_certificates: Option<Vec<rustls::pki_types::CertificateDer<'static>>>,
}

impl Connection for TlsConnection {
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

impl TlsConnection {
    /// Send a TLS close-notify and shut down the underlying socket.
    /// `tokio_rustls`'s `poll_shutdown` writes the close-notify alert
    /// before closing the TCP half, so a plain `shutdown` satisfies the
    /// spec's "on clean exit, sends a TLS close-notify".
    pub async fn close(&mut self) -> Result<(), Error> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl AsyncRead for TlsConnection {
    fn poll_read(self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsConnection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}
