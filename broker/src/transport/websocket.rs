//! WebSocket layer carrying MQTT as binary frames. Grounded in
//! `hebo/src/listener/init.rs`'s `check_ws_path` handshake closure and
//! `hebo/src/stream.rs`'s `Ws`/`Wss` arms of `read_buf`/`write`, which
//! map each binary WebSocket message to one chunk of the byte stream the
//! MQTT framer expects.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::server as ws_server;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

use super::{Accepted, Connection, Server};
use crate::error::Error;

/// The HTTP upgrade request head the client sent, captured for the
/// embedding application's connection info (spec §4.C: WebSocket
/// "exposes the original request head via connection info").
#[derive(Clone, Debug)]
pub struct RequestHead {
    pub method: http::Method,
    pub uri: http::Uri,
    pub headers: http::HeaderMap,
}

#[derive(Clone, Debug, Default)]
pub struct WebSocketConfig {
    /// Restrict the upgrade to this HTTP path; `None` accepts any path
    /// (mirrors `hebo`'s `listener_path` check).
    pub path: Option<String>,
}

pub struct WebSocketServer<Inner> {
    inner: Inner,
    config: WebSocketConfig,
}

impl<Inner> WebSocketServer<Inner> {
    pub const fn new(inner: Inner, config: WebSocketConfig) -> Self {
        Self { inner, config }
    }
}

/// Object-safe shorthand so the WebSocket layer's connection type does
/// not have to carry `Inner` as its own type parameter.
pub trait AsyncReadWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncReadWrite for T {}

impl<Inner> Server for WebSocketServer<Inner>
where
    Inner: Server + Send + Sync,
    Inner::Connection: AsyncReadWrite + 'static,
{
    type Connection = WebSocketConnection;

    async fn with_connection(&self) -> Result<Accepted<Self::Connection>, Error> {
        let byte_stream = self.inner.with_connection().await?.join().await?;
        let boxed: Box<dyn AsyncReadWrite> = Box::new(byte_stream);
        let listener_path = self.config.path.clone();
        let captured_head: Arc<Mutex<Option<RequestHead>>> = Arc::new(Mutex::new(None));
        let handle = tokio::spawn(async move {
            let head_slot = captured_head.clone();
            let check_path = move |request: &ws_server::Request, response: ws_server::Response| {
                *head_slot.lock().expect("request-head mutex poisoned") = Some(RequestHead {
                    method: request.method().clone(),
                    uri: request.uri().clone(),
                    headers: request.headers().clone(),
                });
                let path = request.uri().path();
                match &listener_path {
                    None => Ok(response),
                    Some(expected) if expected == path => Ok(response),
                    Some(_) => {
                        let rejection = http::Response::builder()
                            .status(http::StatusCode::NOT_FOUND)
                            .body(None)
                            .expect("building a bodyless rejection response cannot fail");
                        Err(rejection)
                    }
                }
            };
            let ws_stream = tokio_tungstenite::accept_hdr_async(boxed, check_path)
                .await
                .map_err(Error::from)?;
            log::debug!("completed websocket upgrade");
            let request_head = captured_head
                .lock()
                .expect("request-head mutex poisoned")
                .take()
                .expect("accept_hdr_async always invokes the callback before succeeding");
            Ok(WebSocketConnection {
                stream: ws_stream,
                request_head,
            })
        });
        Ok(Accepted::Spawned(handle))
    }
}

pub struct WebSocketConnection {
    stream: WebSocketStream<Box<dyn AsyncReadWrite>>,
    /// The original HTTP upgrade request's head, for connection info.
    pub request_head: RequestHead,
}

impl Connection for WebSocketConnection {
    type Message = Vec<u8>;

    async fn send(&mut self, message: &Vec<u8>) -> Result<(), Error> {
        self.stream.send(Message::binary(message.clone())).await?;
        Ok(())
    }

    /// Each WebSocket binary message becomes one chunk of the MQTT byte
    /// stream; `max_bytes` has no analogue at this layer since a whole
    /// message always arrives as a unit (spec: WebSocket "exposes a
    /// binary-message stream").
    async fn receive(&mut self, _max_bytes: usize) -> Result<Vec<u8>, Error> {
        match self.stream.next().await {
            Some(frame) => Ok(frame?.into_data()),
            None => Ok(Vec::new()),
        }
    }

    async fn flush(&mut self) -> Result<(), Error> {
        self.stream.flush().await?;
        Ok(())
    }
}

impl WebSocketConnection {
    /// Send a WebSocket close frame with a normal-closure status.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.stream
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: std::borrow::Cow::Borrowed(""),
            }))
            .await?;
        Ok(())
    }
}
