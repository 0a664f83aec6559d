//! Ties decoded MQTT packets to the broker/session state machine: CONNECT
//! authentication, SUBSCRIBE retained-message replay, and PUBLISH dispatch
//! (SPEC_FULL §4.F). Grounded in `hebo/src/session/client.rs`'s per-packet
//! dispatch (`on_client_connect`, `on_client_subscribe`, ...), generalized
//! to drive this crate's `Broker`/`Session` rather than mutate a listener
//! actor's `self` in place.
//!
//! One `ConnectionHandler` is owned per accepted MQTT connection; its
//! `session` field is `None` until a CONNECT packet is accepted, matching
//! the spec's "a session is created via `create_session`" only after
//! authentication succeeds.

use std::sync::Arc;

use codec::topic::{parse_topic, Topic};
use codec::{
    ConnectAckPacket, ConnectPacket, ConnectReturnCode, PingResponsePacket, PublishPacket,
    SubscribeAckPacket, SubscribeAckReason, SubscribePacket, UnsubscribeAckPacket,
    UnsubscribePacket,
};

use crate::auth::{AuthBackend, AuthOutcome};
use crate::broker::Broker;
use crate::error::{Error, ErrorKind};
use crate::retained::RetainedStore;
use crate::session::Session;
use crate::types::SessionKey;

pub struct ConnectionHandler {
    broker: Broker,
    auth: Arc<dyn AuthBackend>,
    retained: Arc<dyn RetainedStore>,
    session: Option<Session>,
}

impl ConnectionHandler {
    #[must_use]
    pub fn new(broker: Broker, auth: Arc<dyn AuthBackend>, retained: Arc<dyn RetainedStore>) -> Self {
        Self {
            broker,
            auth,
            retained,
            session: None,
        }
    }

    /// The session this connection owns, once CONNECT has succeeded.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn require_session(&self) -> Result<&Session, Error> {
        self.session.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::ProtocolViolation,
                "packet received on a connection that has not completed CONNECT",
            )
        })
    }

    /// Authenticate `packet` and, on success, create a session and record
    /// it on this handler (spec §6: "called once per CONNECT"). Always
    /// returns a CONNACK for the caller to send; a non-`Accepted` return
    /// code means the caller must close the connection afterward without
    /// ever calling another `handle_*` method on this handler (spec §7:
    /// "sent as CONNACK then connection closed").
    ///
    /// # Errors
    /// Returns `ErrorKind::ProtocolViolation` if a CONNECT arrives on a
    /// connection that already completed one (MQTT-3.1.0-2).
    pub fn handle_connect(&mut self, packet: &ConnectPacket) -> Result<ConnectAckPacket, Error> {
        if self.session.is_some() {
            return Err(Error::new(
                ErrorKind::ProtocolViolation,
                "a second CONNECT was received on an already-connected session",
            ));
        }

        let outcome = self
            .auth
            .authenticate(packet.username.as_deref(), packet.password.as_deref());
        let return_code = match outcome {
            AuthOutcome::Accepted => ConnectReturnCode::Accepted,
            AuthOutcome::BadCredentials => ConnectReturnCode::BadUsernameOrPassword,
            AuthOutcome::NotAuthorized => ConnectReturnCode::NotAuthorized,
        };

        if return_code == ConnectReturnCode::Accepted {
            self.session = Some(self.broker.create_session());
            log::info!("connect accepted for client {:?}", packet.client_id);
        } else {
            log::warn!(
                "connect refused for client {:?}: {:?}",
                packet.client_id,
                outcome
            );
        }

        Ok(ConnectAckPacket::new(false, return_code))
    }

    /// Record each `(filter, qos)` pair in both subscription tries via
    /// `Broker::subscribe_session`, then replay any retained messages
    /// matching a newly subscribed filter onto this session's queues
    /// through the ordinary delivery path (SPEC_FULL §4.F), so retained
    /// and live messages share one ordering and queue-selection
    /// mechanism. Every requested filter is granted at its requested QoS;
    /// this core never downgrades a subscription.
    ///
    /// # Errors
    /// Returns `ErrorKind::ProtocolViolation` if no CONNECT has completed
    /// on this connection yet.
    pub fn handle_subscribe(&self, packet: &SubscribePacket) -> Result<SubscribeAckPacket, Error> {
        let session = self.require_session()?;

        let pairs: Vec<_> = packet
            .topics
            .iter()
            .map(|topic| (topic.filter.clone(), topic.qos))
            .collect();
        self.broker.subscribe_session(session, &pairs);

        for topic in &packet.topics {
            for (retained_topic, message) in self.retained.matching(&topic.filter) {
                // Best-effort: a full QoS1/QoS2 queue here tears down the
                // connection the same as a live-publish overflow would,
                // but we don't let one bad retained replay block the rest.
                let _ = session.deliver(&retained_topic, &message);
            }
        }

        let reasons = packet
            .topics
            .iter()
            .map(|topic| SubscribeAckReason::Granted(topic.qos))
            .collect();
        Ok(SubscribeAckPacket {
            packet_id: packet.packet_id,
            reasons,
        })
    }

    /// Remove each filter from the session's own trie and the broker-wide
    /// index (`Broker::unsubscribe_session`).
    ///
    /// # Errors
    /// Returns `ErrorKind::ProtocolViolation` if no CONNECT has completed
    /// on this connection yet.
    pub fn handle_unsubscribe(&self, packet: &UnsubscribePacket) -> Result<UnsubscribeAckPacket, Error> {
        let session = self.require_session()?;
        self.broker.unsubscribe_session(session, &packet.filters);
        Ok(UnsubscribeAckPacket {
            packet_id: packet.packet_id,
        })
    }

    /// Store or clear the retained message for this topic (MQTT-3.3.1-10:
    /// an empty payload clears it), then dispatch to every matching
    /// subscriber via `Broker::publish_broker`. Returns one entry per
    /// recipient whose queue overflowed, so the caller can tear down just
    /// those connections (spec §7: "for QoS1/QoS2, overflow tears down
    /// the session's connection").
    ///
    /// # Errors
    /// Returns `ErrorKind::InvalidTopic` if the PUBLISH topic fails the
    /// level grammar, or `ErrorKind::ProtocolViolation` if no CONNECT has
    /// completed on this connection yet.
    pub fn handle_publish(
        &self,
        packet: &PublishPacket,
    ) -> Result<Vec<(SessionKey, Error)>, Error> {
        self.require_session()?;
        let topic = parse_topic(&packet.topic)
            .map_err(|_err| Error::new(ErrorKind::InvalidTopic, packet.topic.clone()))?;

        if packet.retain {
            if packet.payload.is_empty() {
                self.retained.clear(&topic);
            } else {
                self.retained.store(&topic, &packet.payload);
            }
        }

        Ok(self.broker.publish_broker(&topic, &packet.payload))
    }

    /// Reply to a keepalive probe (MQTT-3.12).
    #[must_use]
    pub fn handle_ping(&self) -> PingResponsePacket {
        PingResponsePacket
    }

    /// Close this connection's session, if one was ever created. Called
    /// both for a graceful DISCONNECT (MQTT-3.14) and for any other
    /// connection teardown (transport error, cancellation) — `close_session`
    /// is idempotent to call at most once, so the caller's teardown path
    /// can call this unconditionally. The caller is still responsible for
    /// discarding any last-will message without publishing it
    /// (MQTT-3.1.2-10) — this core does not track last-will state, since
    /// neither `spec.md` nor its expansion names a will-publish operation
    /// (see DESIGN.md).
    pub fn handle_disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use codec::{Filter, QoS, SubscribeTopic};

    use super::*;
    use crate::broker::new_broker;
    use crate::retained::NoRetainedStore;

    struct RejectOneBackend {
        rejected_user: &'static str,
    }

    impl AuthBackend for RejectOneBackend {
        fn authenticate(&self, username: Option<&str>, _password: Option<&[u8]>) -> AuthOutcome {
            if username == Some(self.rejected_user) {
                AuthOutcome::BadCredentials
            } else {
                AuthOutcome::Accepted
            }
        }
    }

    struct FakeRetainedStore {
        entries: Mutex<Vec<(Topic, Vec<u8>)>>,
    }

    impl RetainedStore for FakeRetainedStore {
        fn store(&self, topic: &Topic, message: &[u8]) {
            self.entries
                .lock()
                .unwrap()
                .push((topic.clone(), message.to_vec()));
        }

        fn clear(&self, topic: &Topic) {
            self.entries.lock().unwrap().retain(|(t, _)| t != topic);
        }

        fn matching(&self, filter: &Filter) -> Vec<(Topic, Vec<u8>)> {
            let entries = self.entries.lock().unwrap();
            entries
                .iter()
                .filter(|(topic, _)| filter_matches(filter, topic))
                .cloned()
                .collect()
        }
    }

    fn filter_matches(filter: &Filter, topic: &Topic) -> bool {
        let mut trie: crate::trie::Trie<()> = crate::trie::Trie::default();
        crate::trie::insert_with(&mut trie, |(), ()| (), filter, ());
        crate::trie::lookup_with(&trie, |(), ()| (), topic).is_some()
    }

    fn connect_packet(username: Option<&str>) -> ConnectPacket {
        ConnectPacket {
            protocol_level: codec::ProtocolLevel::V311,
            client_id: "client-1".to_string(),
            clean_session: true,
            keep_alive: 60,
            will: None,
            username: username.map(str::to_string),
            password: None,
        }
    }

    #[test]
    fn connect_rejected_credentials_do_not_create_a_session() {
        let broker = new_broker();
        let auth = Arc::new(RejectOneBackend {
            rejected_user: "bob",
        });
        let mut handler = ConnectionHandler::new(broker.clone(), auth, Arc::new(NoRetainedStore));

        let ack = handler.handle_connect(&connect_packet(Some("bob"))).unwrap();
        assert_eq!(ack.return_code, ConnectReturnCode::BadUsernameOrPassword);
        assert!(handler.session().is_none());
        assert_eq!(broker.session_count(), 0);
    }

    #[test]
    fn connect_accepted_creates_a_session() {
        let broker = new_broker();
        let auth = Arc::new(RejectOneBackend {
            rejected_user: "bob",
        });
        let mut handler = ConnectionHandler::new(broker.clone(), auth, Arc::new(NoRetainedStore));

        let ack = handler.handle_connect(&connect_packet(Some("alice"))).unwrap();
        assert_eq!(ack.return_code, ConnectReturnCode::Accepted);
        assert!(handler.session().is_some());
        assert_eq!(broker.session_count(), 1);
    }

    #[test]
    fn subscribe_before_connect_is_a_protocol_violation() {
        let broker = new_broker();
        let handler = ConnectionHandler::new(
            broker,
            Arc::new(crate::auth::AllowAll),
            Arc::new(NoRetainedStore),
        );
        let packet = SubscribePacket {
            packet_id: 1,
            topics: vec![SubscribeTopic {
                filter: codec::parse_filter("a/b").unwrap(),
                qos: QoS::AtMostOnce,
            }],
        };
        assert_eq!(
            handler.handle_subscribe(&packet).unwrap_err().kind(),
            &ErrorKind::ProtocolViolation
        );
    }

    #[test]
    fn subscribe_replays_matching_retained_messages() {
        let broker = new_broker();
        let retained = Arc::new(FakeRetainedStore {
            entries: Mutex::new(Vec::new()),
        });
        let topic = parse_topic("a/b").unwrap();
        retained.store(&topic, b"retained payload");

        let mut handler =
            ConnectionHandler::new(broker, Arc::new(crate::auth::AllowAll), retained);
        handler.handle_connect(&connect_packet(None)).unwrap();

        let packet = SubscribePacket {
            packet_id: 1,
            topics: vec![SubscribeTopic {
                filter: codec::parse_filter("a/+").unwrap(),
                qos: QoS::AtLeastOnce,
            }],
        };
        let ack = handler.handle_subscribe(&packet).unwrap();
        assert_eq!(ack.reasons, vec![SubscribeAckReason::Granted(QoS::AtLeastOnce)]);

        let (_topic, message) = handler.session().unwrap().pop_qos1().unwrap();
        assert_eq!(message, b"retained payload");
    }

    #[test]
    fn publish_dispatches_to_subscribed_session() {
        let broker = new_broker();
        let mut publisher = ConnectionHandler::new(
            broker.clone(),
            Arc::new(crate::auth::AllowAll),
            Arc::new(NoRetainedStore),
        );
        publisher.handle_connect(&connect_packet(None)).unwrap();

        let mut subscriber = ConnectionHandler::new(
            broker,
            Arc::new(crate::auth::AllowAll),
            Arc::new(NoRetainedStore),
        );
        subscriber.handle_connect(&connect_packet(None)).unwrap();
        subscriber
            .handle_subscribe(&SubscribePacket {
                packet_id: 1,
                topics: vec![SubscribeTopic {
                    filter: codec::parse_filter("a/b").unwrap(),
                    qos: QoS::AtMostOnce,
                }],
            })
            .unwrap();

        let failures = publisher
            .handle_publish(&PublishPacket {
                dup: false,
                qos: QoS::AtMostOnce,
                retain: false,
                topic: "a/b".to_string(),
                packet_id: None,
                payload: b"hi".to_vec(),
            })
            .unwrap();
        assert!(failures.is_empty());

        let (topic, message) = subscriber.session().unwrap().pop_qos0().unwrap();
        assert_eq!(topic.to_string(), "a/b");
        assert_eq!(message, b"hi");
    }

    #[test]
    fn disconnect_closes_the_session_and_removes_it_from_the_broker() {
        let broker = new_broker();
        let mut handler = ConnectionHandler::new(
            broker.clone(),
            Arc::new(crate::auth::AllowAll),
            Arc::new(NoRetainedStore),
        );
        handler.handle_connect(&connect_packet(None)).unwrap();
        assert_eq!(broker.session_count(), 1);

        handler.handle_disconnect();
        assert!(handler.session().is_none());
        assert_eq!(broker.session_count(), 0);
    }
}
