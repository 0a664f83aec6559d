//! Retained-message store seam (spec §6, expanded in SPEC_FULL §4.F).
//!
//! Persisted storage is explicitly out of scope; this trait is the
//! interface `publish_broker`'s caller and the SUBSCRIBE handler use to
//! store and replay retained messages through the ordinary
//! `deliver_session` dispatch path.

use codec::topic::Topic;

pub trait RetainedStore: Send + Sync {
    /// Record `message` as the retained message for `topic`, replacing
    /// any previous one.
    fn store(&self, topic: &Topic, message: &[u8]);

    /// Drop the retained message for `topic`, if any (an empty-payload
    /// retained PUBLISH is the wire signal for this, per MQTT-3.3.1-10).
    fn clear(&self, topic: &Topic);

    /// All retained messages whose topic matches `filter`, for replay
    /// immediately after a successful SUBSCRIBE.
    fn matching(&self, filter: &codec::Filter) -> Vec<(Topic, Vec<u8>)>;
}

/// Retains nothing and returns no matches. Default when no retained
/// store is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetainedStore;

impl RetainedStore for NoRetainedStore {
    fn store(&self, _topic: &Topic, _message: &[u8]) {}

    fn clear(&self, _topic: &Topic) {}

    fn matching(&self, _filter: &codec::Filter) -> Vec<(Topic, Vec<u8>)> {
        Vec::new()
    }
}
