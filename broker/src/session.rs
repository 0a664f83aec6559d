//! Per-client subscriptions and per-QoS outbound queues (spec §4.E).
//!
//! A `Session` is a cheap `Arc` handle; the actual state lives behind its
//! own mutex, taken before the broker's mutex wherever both are needed
//! (spec §5 lock ordering), and never held across I/O.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use codec::topic::Topic;
use codec::QoS;

use crate::broker::BrokerInner;
use crate::error::{Error, ErrorKind};
use crate::trie::{lookup_with, Trie};
use crate::types::SessionKey;

/// Bound on each per-QoS queue. Not specified by the spec; chosen as a
/// generous in-memory default (see DESIGN.md).
pub const MAX_QUEUE_LEN: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Open,
    Closing,
    Closed,
}

pub(crate) struct SessionState {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) subscriptions: Trie<QoS>,
    qos0: VecDeque<(Topic, Vec<u8>)>,
    qos1: VecDeque<(Topic, Vec<u8>)>,
    qos2: VecDeque<(Topic, Vec<u8>)>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Open,
            subscriptions: Trie::default(),
            qos0: VecDeque::new(),
            qos1: VecDeque::new(),
            qos2: VecDeque::new(),
        }
    }
}

pub(crate) struct SessionInner {
    pub(crate) session_key: SessionKey,
    pub(crate) broker: Weak<BrokerInner>,
    pub(crate) state: Mutex<SessionState>,
}

/// A handle to one client's broker-side state. Cloning shares the same
/// underlying session (it is a reference-counted handle, not a copy).
#[derive(Clone)]
pub struct Session(pub(crate) Arc<SessionInner>);

fn max_qos(a: QoS, b: QoS) -> QoS {
    a.max(b)
}

impl Session {
    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.0.session_key
    }

    /// Upgrade this session's weak back-reference and ask the owning
    /// broker to close it (spec §9's cyclic back-reference design note).
    /// A no-op if the broker has already been dropped.
    pub fn close(&self) {
        if let Some(broker) = self.0.broker.upgrade() {
            crate::broker::Broker(broker).close_session(self);
        }
    }

    /// Enqueue `(topic, message)` onto the queue matching this session's
    /// effective subscribed QoS for `topic` (spec's `deliver_session`).
    /// Silently drops the message if no subscription matches, or if the
    /// session is closing/closed (races with `close_session` resolve by
    /// dropping the delivery, per the spec's open question on this).
    ///
    /// # Errors
    /// Returns `ErrorKind::QueueOverflow` if the QoS1/QoS2 queue selected
    /// for this delivery is already at capacity; the caller is expected
    /// to tear down this session's connection in response. QoS0 overflow
    /// is never an error: the oldest undelivered at-most-once message is
    /// simply dropped, per MQTT's best-effort QoS0 contract.
    pub fn deliver(&self, topic: &Topic, message: &[u8]) -> Result<(), Error> {
        let mut state = self.0.state.lock().expect("session mutex poisoned");
        if state.lifecycle != Lifecycle::Open {
            return Ok(());
        }
        let Some(qos) = lookup_with(&state.subscriptions, max_qos, topic) else {
            return Ok(());
        };
        let key = self.session_key_for_log();
        let entry = (topic.clone(), message.to_vec());
        match qos {
            QoS::AtMostOnce => {
                if state.qos0.len() >= MAX_QUEUE_LEN {
                    state.qos0.pop_front();
                }
                state.qos0.push_back(entry);
            }
            QoS::AtLeastOnce => {
                if state.qos1.len() >= MAX_QUEUE_LEN {
                    return Err(Error::new(
                        ErrorKind::QueueOverflow,
                        format!("qos1 queue full for session {key}"),
                    ));
                }
                state.qos1.push_back(entry);
            }
            QoS::ExactlyOnce => {
                if state.qos2.len() >= MAX_QUEUE_LEN {
                    return Err(Error::new(
                        ErrorKind::QueueOverflow,
                        format!("qos2 queue full for session {key}"),
                    ));
                }
                state.qos2.push_back(entry);
            }
        }
        Ok(())
    }

    fn session_key_for_log(&self) -> SessionKey {
        self.0.session_key
    }

    /// Pop the oldest queued at-most-once message, if any. Dequeue
    /// ordering across the three queues is left to the caller (spec:
    /// "the responsibility of the external session-dispatch loop").
    pub fn pop_qos0(&self) -> Option<(Topic, Vec<u8>)> {
        self.0.state.lock().expect("session mutex poisoned").qos0.pop_front()
    }

    pub fn pop_qos1(&self) -> Option<(Topic, Vec<u8>)> {
        self.0.state.lock().expect("session mutex poisoned").qos1.pop_front()
    }

    pub fn pop_qos2(&self) -> Option<(Topic, Vec<u8>)> {
        self.0.state.lock().expect("session mutex poisoned").qos2.pop_front()
    }

    #[must_use]
    pub fn queue_lengths(&self) -> (usize, usize, usize) {
        let state = self.0.state.lock().expect("session mutex poisoned");
        (state.qos0.len(), state.qos1.len(), state.qos2.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::new_broker;
    use codec::parse_filter;
    use codec::parse_topic;

    fn filter(s: &str) -> codec::Filter {
        parse_filter(s).expect("valid filter")
    }

    fn topic(s: &str) -> Topic {
        parse_topic(s).expect("valid topic")
    }

    #[test]
    fn delivery_with_no_matching_subscription_is_silently_dropped() {
        let broker = new_broker();
        let session = broker.create_session();
        session.deliver(&topic("a/b"), b"m").expect("no overflow");
        assert_eq!(session.queue_lengths(), (0, 0, 0));
    }

    #[test]
    fn qos0_overflow_drops_the_oldest_message_instead_of_erroring() {
        let broker = new_broker();
        let session = broker.create_session();
        broker.subscribe_session(&session, &[(filter("a/b"), QoS::AtMostOnce)]);

        for i in 0..MAX_QUEUE_LEN {
            session
                .deliver(&topic("a/b"), format!("{i}").as_bytes())
                .expect("qos0 never overflows as an error");
        }
        session.deliver(&topic("a/b"), b"overflow").expect("qos0 never errors");

        assert_eq!(session.queue_lengths().0, MAX_QUEUE_LEN);
        let (oldest_topic, oldest_message) = session.pop_qos0().expect("queue not empty");
        assert_eq!(oldest_topic, topic("a/b"));
        assert_eq!(oldest_message, b"1".to_vec());
    }

    #[test]
    fn qos1_overflow_is_reported_to_the_caller() {
        let broker = new_broker();
        let session = broker.create_session();
        broker.subscribe_session(&session, &[(filter("a/b"), QoS::AtLeastOnce)]);

        for _ in 0..MAX_QUEUE_LEN {
            session.deliver(&topic("a/b"), b"m").expect("room left in queue");
        }
        let err = session.deliver(&topic("a/b"), b"one too many").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::QueueOverflow);
        assert_eq!(session.queue_lengths().1, MAX_QUEUE_LEN);
    }

    #[test]
    fn deliver_after_close_is_silently_dropped() {
        let broker = new_broker();
        let session = broker.create_session();
        broker.subscribe_session(&session, &[(filter("a/b"), QoS::AtMostOnce)]);
        session.close();

        session.deliver(&topic("a/b"), b"m").expect("closing sessions silently drop deliveries");
        assert_eq!(session.queue_lengths(), (0, 0, 0));
    }
}
