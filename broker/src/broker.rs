//! Session registry, subscription index, and publish dispatch (spec
//! §4.D). `Broker` is a cheap `Arc` handle over a single mutex-protected
//! state cell, matching the "single mutually exclusive cell" model of
//! spec §5 rather than the teacher's mpsc-actor architecture: the spec
//! is explicit about lock ordering and snapshot reads in a way only a
//! shared-state design can satisfy directly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use codec::topic::Topic;
use codec::{Filter, QoS};

use crate::session::{Lifecycle, Session, SessionInner, SessionState};
use crate::trie::{adjust, delete, difference_with, insert_with, map, subscriptions, Trie};
use crate::types::SessionKey;

pub(crate) struct BrokerInner {
    pub(crate) state: Mutex<BrokerState>,
}

pub(crate) struct BrokerState {
    max_session_key: u64,
    pub(crate) subscriptions: Trie<HashSet<SessionKey>>,
    sessions: HashMap<SessionKey, Session>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            max_session_key: 0,
            subscriptions: Trie::default(),
            sessions: HashMap::new(),
        }
    }
}

fn union_keys(mut a: HashSet<SessionKey>, b: HashSet<SessionKey>) -> HashSet<SessionKey> {
    a.extend(b);
    a
}

fn singleton(key: SessionKey) -> HashSet<SessionKey> {
    let mut set = HashSet::with_capacity(1);
    set.insert(key);
    set
}

/// A cheap, cloneable handle to one broker's shared state.
#[derive(Clone)]
pub struct Broker(pub(crate) Arc<BrokerInner>);

/// Allocate empty broker state (spec's `new_broker`).
#[must_use]
pub fn new_broker() -> Broker {
    Broker(Arc::new(BrokerInner {
        state: Mutex::new(BrokerState::default()),
    }))
}

impl Broker {
    /// Allocate a fresh session with empty subscriptions and empty
    /// queues, register it, and return its handle. Returned session keys
    /// are strictly increasing and unique for this broker's lifetime.
    pub fn create_session(&self) -> Session {
        let mut state = self.0.state.lock().expect("broker mutex poisoned");
        state.max_session_key += 1;
        let key = SessionKey::new(state.max_session_key);
        let session = Session(Arc::new(SessionInner {
            session_key: key,
            broker: Arc::downgrade(&self.0),
            state: Mutex::new(SessionState::default()),
        }));
        state.sessions.insert(key, session.clone());
        session
    }

    /// Remove every trace of `session` from broker state: its
    /// contributions to the subscription index, and its registry entry.
    /// Acquires the session lock before the broker lock (spec §5).
    pub fn close_session(&self, session: &Session) {
        let mut session_guard = session.0.state.lock().expect("session mutex poisoned");
        session_guard.lifecycle = Lifecycle::Closing;

        let key = session.key();
        let session_as_keys = map(&session_guard.subscriptions, move |_qos| singleton(key));

        let mut broker_guard = self.0.state.lock().expect("broker mutex poisoned");
        difference_with(
            &mut broker_guard.subscriptions,
            |a: HashSet<SessionKey>, b: HashSet<SessionKey>| {
                let remaining: HashSet<SessionKey> = a.difference(&b).copied().collect();
                if remaining.is_empty() {
                    None
                } else {
                    Some(remaining)
                }
            },
            &session_as_keys,
        );
        broker_guard.sessions.remove(&key);
        drop(broker_guard);

        session_guard.lifecycle = Lifecycle::Closed;
    }

    /// For each `(filter, qos)` pair: record it in the session's own
    /// subscription trie (combine = max QoS) and add this session's key
    /// to the broker-wide index for that filter (combine = set union).
    /// A no-op for a session that is closing or closed.
    pub fn subscribe_session(&self, session: &Session, topics: &[(Filter, QoS)]) {
        let mut session_guard = session.0.state.lock().expect("session mutex poisoned");
        if session_guard.lifecycle != Lifecycle::Open {
            return;
        }
        for (filter, qos) in topics {
            insert_with(&mut session_guard.subscriptions, |a, b| a.max(b), filter, *qos);
        }

        let key = session.key();
        let mut broker_guard = self.0.state.lock().expect("broker mutex poisoned");
        for (filter, _qos) in topics {
            insert_with(&mut broker_guard.subscriptions, union_keys, filter, singleton(key));
        }
    }

    /// Remove each filter from the session's own trie, and remove this
    /// session's key from the corresponding broker-wide entry, pruning
    /// nodes left with an empty key set.
    pub fn unsubscribe_session(&self, session: &Session, filters: &[Filter]) {
        let mut session_guard = session.0.state.lock().expect("session mutex poisoned");
        if session_guard.lifecycle != Lifecycle::Open {
            return;
        }
        for filter in filters {
            delete(&mut session_guard.subscriptions, filter);
        }

        let key = session.key();
        let mut broker_guard = self.0.state.lock().expect("broker mutex poisoned");
        for filter in filters {
            adjust(&mut broker_guard.subscriptions, filter, move |mut set: HashSet<SessionKey>| {
                set.remove(&key);
                if set.is_empty() {
                    None
                } else {
                    Some(set)
                }
            });
        }
    }

    /// Snapshot-read the subscription index for `topic`, release the
    /// broker lock, then deliver to each still-registered recipient.
    /// Errors from individual deliveries (queue overflow) are returned
    /// per session so the caller can tear down just that connection;
    /// delivery to the rest of the recipients still happens.
    pub fn publish_broker(
        &self,
        topic: &Topic,
        message: &[u8],
    ) -> Vec<(SessionKey, crate::error::Error)> {
        let recipients: Vec<Session> = {
            let state = self.0.state.lock().expect("broker mutex poisoned");
            let keys = subscriptions(&state.subscriptions, topic);
            keys.into_iter()
                .filter_map(|key| state.sessions.get(&key).cloned())
                .collect()
        };

        let mut failures = Vec::new();
        for session in recipients {
            if let Err(err) = session.deliver(topic, message) {
                failures.push((session.key(), err));
            }
        }
        failures
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.0.state.lock().expect("broker mutex poisoned").sessions.len()
    }

    #[must_use]
    pub fn has_subscribers(&self, topic: &Topic) -> bool {
        let state = self.0.state.lock().expect("broker mutex poisoned");
        !subscriptions(&state.subscriptions, topic).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::parse_filter;
    use codec::parse_topic;

    fn filter(s: &str) -> Filter {
        parse_filter(s).expect("valid filter")
    }

    fn topic(s: &str) -> Topic {
        parse_topic(s).expect("valid topic")
    }

    #[test]
    fn publish_reaches_only_the_matching_subscriber() {
        let broker = new_broker();
        let s1 = broker.create_session();
        let s2 = broker.create_session();
        broker.subscribe_session(&s1, &[(filter("a/+"), QoS::AtLeastOnce)]);

        let failures = broker.publish_broker(&topic("a/x"), b"hello");
        assert!(failures.is_empty());
        assert_eq!(s1.pop_qos1(), Some((topic("a/x"), b"hello".to_vec())));
        assert_eq!(s1.pop_qos1(), None);
        assert_eq!(s2.queue_lengths(), (0, 0, 0));
    }

    #[test]
    fn subscribing_twice_with_different_qos_combines_by_max() {
        let broker = new_broker();
        let s1 = broker.create_session();
        broker.subscribe_session(&s1, &[(filter("a/+"), QoS::AtMostOnce), (filter("a/#"), QoS::ExactlyOnce)]);

        broker.publish_broker(&topic("a/b"), b"m");
        assert_eq!(s1.pop_qos2(), Some((topic("a/b"), b"m".to_vec())));
        assert_eq!(s1.queue_lengths(), (0, 0, 0));
    }

    #[test]
    fn closing_a_session_removes_it_from_the_subscription_index() {
        let broker = new_broker();
        let s1 = broker.create_session();
        broker.subscribe_session(&s1, &[(filter("a/b"), QoS::AtMostOnce)]);
        assert!(broker.has_subscribers(&topic("a/b")));

        broker.close_session(&s1);

        assert!(!broker.has_subscribers(&topic("a/b")));
        let failures = broker.publish_broker(&topic("a/b"), b"m");
        assert!(failures.is_empty());
        assert_eq!(broker.session_count(), 0);
    }

    #[test]
    fn created_session_keys_are_strictly_increasing() {
        let broker = new_broker();
        let s1 = broker.create_session();
        let s2 = broker.create_session();
        let s3 = broker.create_session();
        assert!(s1.key().value() < s2.key().value());
        assert!(s2.key().value() < s3.key().value());
    }

    #[test]
    fn concurrent_publishes_to_the_same_session_preserve_insertion_order() {
        use std::sync::Barrier;
        use std::thread;

        let broker = new_broker();
        let s1 = broker.create_session();
        broker.subscribe_session(&s1, &[(filter("a/b"), QoS::AtMostOnce)]);

        let barrier = Arc::new(Barrier::new(2));
        thread::scope(|scope| {
            let b1 = broker.clone();
            let bar1 = Arc::clone(&barrier);
            scope.spawn(move || {
                bar1.wait();
                b1.publish_broker(&topic("a/b"), b"first");
            });
            let b2 = broker.clone();
            let bar2 = Arc::clone(&barrier);
            scope.spawn(move || {
                bar2.wait();
                b2.publish_broker(&topic("a/b"), b"second");
            });
        });

        let mut seen = Vec::new();
        while let Some((_, message)) = s1.pop_qos0() {
            seen.push(message);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen == vec![b"first".to_vec(), b"second".to_vec()] || seen == vec![b"second".to_vec(), b"first".to_vec()]);
    }
}
