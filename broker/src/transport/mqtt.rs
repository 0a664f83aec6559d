//! MQTT framing layer: turns a byte-stream connection into a connection
//! of whole `codec::Packet` values. Grounded in `hebo/src/stream.rs`'s
//! `read_buf`-into-an-accumulating-buffer pattern, generalized to use
//! `codec::Packet::peek_len` so a packet is only decoded once every one
//! of its bytes has arrived (spec §4.C: "never decodes a partial
//! packet").

use codec::Packet;

use super::{Accepted, Connection, Server};
use crate::error::{Error, ErrorKind};

/// Read calls ask the inner connection for at most this many bytes at a
/// time when topping up the leftover buffer.
const READ_CHUNK: usize = 4096;

#[derive(Clone, Copy, Debug, Default)]
pub struct MqttConfig {
    /// Largest frame this layer will decode before giving up and raising
    /// a protocol violation, guarding against a peer that claims an
    /// unbounded remaining length.
    pub max_packet_size: Option<usize>,
}

pub struct MqttServer<Inner> {
    inner: Inner,
    config: MqttConfig,
}

impl<Inner> MqttServer<Inner> {
    pub const fn new(inner: Inner, config: MqttConfig) -> Self {
        Self { inner, config }
    }
}

impl<Inner> Server for MqttServer<Inner>
where
    Inner: Server + Send + Sync,
    Inner::Connection: Connection<Message = Vec<u8>>,
{
    type Connection = MqttConnection<Inner::Connection>;

    async fn with_connection(&self) -> Result<Accepted<Self::Connection>, Error> {
        let inner = self.inner.with_connection().await?.join().await?;
        Ok(Accepted::Ready(MqttConnection {
            inner,
            leftover: Vec::new(),
            config: self.config,
        }))
    }
}

pub struct MqttConnection<Inner> {
    inner: Inner,
    leftover: Vec<u8>,
    config: MqttConfig,
}

impl<Inner> MqttConnection<Inner>
where
    Inner: Connection<Message = Vec<u8>>,
{
    /// Block until one whole MQTT packet has been read and decoded,
    /// topping up the leftover buffer with fresh reads from the inner
    /// connection as needed. Returns `Ok(None)` if the inner connection
    /// reached end of stream with no partial packet pending.
    pub async fn receive_message(&mut self) -> Result<Option<Packet>, Error> {
        loop {
            match Packet::peek_len(&self.leftover) {
                Ok(Some(len)) => {
                    if let Some(max) = self.config.max_packet_size {
                        if len > max {
                            return Err(Error::new(
                                ErrorKind::ProtocolViolation,
                                format!("packet of {len} bytes exceeds configured max {max}"),
                            ));
                        }
                    }
                    if len > self.leftover.len() {
                        let chunk = self.inner.receive(READ_CHUNK).await?;
                        if chunk.is_empty() {
                            return Err(Error::new(
                                ErrorKind::ProtocolViolation,
                                "connection closed mid-packet",
                            ));
                        }
                        self.leftover.extend_from_slice(&chunk);
                        continue;
                    }
                    let frame: Vec<u8> = self.leftover.drain(..len).collect();
                    let packet = Packet::decode(&frame)?;
                    return Ok(Some(packet));
                }
                Ok(None) => {
                    let chunk = self.inner.receive(READ_CHUNK).await?;
                    if chunk.is_empty() {
                        if self.leftover.is_empty() {
                            return Ok(None);
                        }
                        return Err(Error::new(
                            ErrorKind::ProtocolViolation,
                            "connection closed mid-packet",
                        ));
                    }
                    self.leftover.extend_from_slice(&chunk);
                }
                Err(err) => return Err(Error::from(err)),
            }
        }
    }

    /// Decode and yield every whole packet currently available without
    /// blocking for more input, feeding each to `f` in arrival order until
    /// either input runs out or `f` returns `ControlFlow::Break` (the
    /// spec's "done" signal). Either way the remaining leftover bytes
    /// (a partial frame, or frames `f` never asked for) stay buffered for
    /// the next call. Mirrors the spec's `consume_messages(connection, fn)`.
    pub fn consume_buffered(
        &mut self,
        mut f: impl FnMut(Packet) -> std::ops::ControlFlow<()>,
    ) -> Result<(), Error> {
        loop {
            match Packet::peek_len(&self.leftover)? {
                Some(len) if len <= self.leftover.len() => {
                    let frame: Vec<u8> = self.leftover.drain(..len).collect();
                    if f(Packet::decode(&frame)?).is_break() {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    pub async fn send_message(&mut self, packet: &Packet) -> Result<(), Error> {
        let mut buf = Vec::new();
        packet.encode(&mut buf)?;
        self.inner.send(&buf).await
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use codec::{ConnectPacket, Packet, ProtocolLevel};

    use super::*;

    /// A connection whose `receive` hands out one scripted chunk per call,
    /// so a test can force a packet to arrive split across several reads.
    struct ScriptedConnection {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Connection for ScriptedConnection {
        type Message = Vec<u8>;

        async fn send(&mut self, _message: &Vec<u8>) -> Result<(), Error> {
            Ok(())
        }

        async fn receive(&mut self, _max_bytes: usize) -> Result<Vec<u8>, Error> {
            Ok(self.chunks.pop_front().unwrap_or_default())
        }

        async fn flush(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    struct ScriptedServer {
        connection: Mutex<Option<ScriptedConnection>>,
    }

    impl Server for ScriptedServer {
        type Connection = ScriptedConnection;

        async fn with_connection(&self) -> Result<Accepted<Self::Connection>, Error> {
            let connection = self
                .connection
                .lock()
                .expect("scripted server mutex poisoned")
                .take()
                .expect("scripted server only accepts once");
            Ok(Accepted::Ready(connection))
        }
    }

    fn sample_connect() -> Packet {
        Packet::Connect(ConnectPacket {
            protocol_level: ProtocolLevel::V311,
            client_id: "split-read-client".to_string(),
            clean_session: true,
            keep_alive: 30,
            will: None,
            username: None,
            password: None,
        })
    }

    #[tokio::test]
    async fn a_connect_packet_split_across_three_reads_decodes_to_exactly_one_packet() {
        let mut encoded = Vec::new();
        sample_connect().encode(&mut encoded).expect("encoding a connect packet cannot fail");

        let third = encoded.len() / 3;
        let chunks = vec![
            encoded[..third].to_vec(),
            encoded[third..2 * third].to_vec(),
            encoded[2 * third..].to_vec(),
        ];

        let server = MqttServer::new(
            ScriptedServer {
                connection: Mutex::new(Some(ScriptedConnection { chunks: chunks.into() })),
            },
            MqttConfig::default(),
        );
        let mut connection = server.with_connection().await.unwrap().join().await.unwrap();

        let packet = connection.receive_message().await.unwrap();
        assert_eq!(packet, Some(sample_connect()));
        assert!(connection.leftover.is_empty());
    }

    #[tokio::test]
    async fn consume_buffered_stops_as_soon_as_the_callback_asks_to_break() {
        let mut encoded = Vec::new();
        sample_connect().encode(&mut encoded).unwrap();
        // Two whole packets back to back in the leftover buffer.
        let mut leftover = encoded.clone();
        leftover.extend_from_slice(&encoded);

        let server = MqttServer::new(
            ScriptedServer {
                connection: Mutex::new(Some(ScriptedConnection { chunks: VecDeque::new() })),
            },
            MqttConfig::default(),
        );
        let mut connection = server.with_connection().await.unwrap().join().await.unwrap();
        connection.leftover = leftover;

        let mut seen = 0;
        connection
            .consume_buffered(|_packet| {
                seen += 1;
                std::ops::ControlFlow::Break(())
            })
            .unwrap();

        assert_eq!(seen, 1);
        assert_eq!(connection.leftover.len(), encoded.len());
    }
}
