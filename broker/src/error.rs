// Error taxonomy for the broker core (spec §7). Mirrors the teacher's
// hand-rolled `{kind, message}` shape rather than reaching for a derive
// macro: `hebo::error::Error` is a plain struct with a `Display` impl and
// `From` conversions at the I/O boundary, and this crate follows suit.

use std::fmt;
use std::io;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised by `codec::topic::parse_topic`.
    InvalidTopic,
    /// Raised by `codec::topic::parse_filter`.
    InvalidFilter,
    /// The MQTT framer saw a well-formed-but-illegal packet sequence or a
    /// packet it could not decode.
    ProtocolViolation,
    /// CONNECT processing rejected the client (bad credentials,
    /// unsupported protocol level, duplicate client id policy, ...).
    ConnectionRefused,
    /// I/O failure at the socket/TLS/WebSocket layer.
    Transport,
    /// A session was addressed that is not (or no longer) registered.
    SessionNotFound,
    /// A QoS1/QoS2 outbound queue hit its capacity (spec §7: "for
    /// QoS1/QoS2, overflow tears down the session's connection").
    QueueOverflow,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Transport, format!("io error: {err}"))
    }
}

impl From<codec::DecodeError> for Error {
    fn from(err: codec::DecodeError) -> Self {
        Self::new(ErrorKind::ProtocolViolation, format!("decode error: {err}"))
    }
}

impl From<codec::EncodeError> for Error {
    fn from(err: codec::EncodeError) -> Self {
        Self::new(ErrorKind::ProtocolViolation, format!("encode error: {err}"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::new(ErrorKind::Transport, format!("websocket error: {err}"))
    }
}

impl From<tokio_rustls::rustls::Error> for Error {
    fn from(err: tokio_rustls::rustls::Error) -> Self {
        Self::new(ErrorKind::Transport, format!("tls error: {err}"))
    }
}
