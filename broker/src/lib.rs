//! In-memory MQTT v3.1.1 broker core: connection handling, session
//! lifecycle, subscription routing and message dispatch, layered over a
//! generic Socket → TLS → WebSocket → MQTT transport stack.
//!
//! Persisted sessions, a configuration file format, a CLI/daemon entry
//! point, and a management dashboard are all out of scope (spec §1
//! Non-goals); this crate exposes the broker and session state machine
//! as a library for an embedding application to drive.

pub mod auth;
pub mod broker;
pub mod error;
pub mod handler;
pub mod retained;
pub mod session;
pub mod transport;
pub mod trie;
pub mod types;

pub use auth::{AllowAll, AuthBackend, AuthOutcome};
pub use broker::{new_broker, Broker};
pub use error::{Error, ErrorKind};
pub use handler::ConnectionHandler;
pub use retained::{NoRetainedStore, RetainedStore};
pub use session::{Session, MAX_QUEUE_LEN};
pub use types::SessionKey;
