//! Generic routing trie mapping subscription filters to payloads, and
//! matching concrete topics against the stored filters (spec §4.B).
//!
//! Grounded on `other_examples`' `vibesrc-vibemq` `TopicTrie<V>` (node
//! shape: literal children in a map, one dedicated slot for `+`, one for
//! `#`) generalized to the combine/difference operations the broker and
//! session state machines need. Operators are passed in per call rather
//! than fixed by a trait, matching the spec's `insert_with(combine, ...)`
//! / `difference_with(sub, ...)` signatures directly.

use std::collections::HashMap;

use codec::topic::{FilterLevel, Level, Topic};
use codec::Filter;

struct Node<V> {
    value: Option<V>,
    children: HashMap<Level, Node<V>>,
    plus: Option<Box<Node<V>>>,
    hash: Option<V>,
}

impl<V> Node<V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty() && self.plus.is_none() && self.hash.is_none()
    }
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: HashMap::new(),
            plus: None,
            hash: None,
        }
    }
}

/// A trie with no nodes (spec's `empty`).
pub struct Trie<V> {
    root: Node<V>,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Self {
            root: Node::default(),
        }
    }
}

impl<V> Trie<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

fn accumulate<V>(slot: &mut Option<V>, v: V, combine: &impl Fn(V, V) -> V) {
    *slot = Some(match slot.take() {
        Some(old) => combine(old, v),
        None => v,
    });
}

/// Insert `v` at the node keyed by `filter`; if a payload already exists
/// there, replace it with `combine(existing, v)`.
pub fn insert_with<V>(trie: &mut Trie<V>, combine: impl Fn(V, V) -> V, filter: &Filter, v: V) {
    let levels = filter.levels();
    debug_assert!(!levels.is_empty(), "filters always have at least one level");
    let mut node = &mut trie.root;
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        match level {
            FilterLevel::Hash => {
                accumulate(&mut node.hash, v, &combine);
                return;
            }
            FilterLevel::Plus => {
                node = node.plus.get_or_insert_with(|| Box::new(Node::default()));
            }
            FilterLevel::Literal(s) => {
                node = node.children.entry(s.clone()).or_default();
            }
        }
        if i == last {
            accumulate(&mut node.value, v, &combine);
            return;
        }
    }
}

fn delete_child<V>(child: Option<&mut Node<V>>, rest: &[FilterLevel]) -> (bool, Option<V>) {
    match child {
        Some(child) => {
            if rest.is_empty() {
                let removed = child.value.take();
                (child.is_empty(), removed)
            } else {
                let removed = delete_rec(child, rest);
                (child.is_empty(), removed)
            }
        }
        None => (false, None),
    }
}

fn delete_rec<V>(node: &mut Node<V>, levels: &[FilterLevel]) -> Option<V> {
    let (head, rest) = levels
        .split_first()
        .expect("filters always have at least one level");
    match head {
        FilterLevel::Hash => node.hash.take(),
        FilterLevel::Plus => {
            let (prune, removed) = delete_child(node.plus.as_deref_mut(), rest);
            if prune {
                node.plus = None;
            }
            removed
        }
        FilterLevel::Literal(s) => {
            let (prune, removed) = delete_child(node.children.get_mut(s), rest);
            if prune {
                node.children.remove(s);
            }
            removed
        }
    }
}

/// Remove the payload at `filter` exactly, pruning nodes left empty.
/// Returns the removed payload, if any.
pub fn delete<V>(trie: &mut Trie<V>, filter: &Filter) -> Option<V> {
    delete_rec(&mut trie.root, filter.levels())
}

fn adjust_child<V>(child: Option<&mut Node<V>>, rest: &[FilterLevel], f: impl FnOnce(V) -> Option<V>) -> bool {
    match child {
        Some(child) => {
            if rest.is_empty() {
                if let Some(v) = child.value.take() {
                    child.value = f(v);
                }
            } else {
                adjust_rec(child, rest, f);
            }
            child.is_empty()
        }
        None => false,
    }
}

fn adjust_rec<V>(node: &mut Node<V>, levels: &[FilterLevel], f: impl FnOnce(V) -> Option<V>) {
    let (head, rest) = levels
        .split_first()
        .expect("filters always have at least one level");
    match head {
        FilterLevel::Hash => {
            if let Some(v) = node.hash.take() {
                node.hash = f(v);
            }
        }
        FilterLevel::Plus => {
            if adjust_child(node.plus.as_deref_mut(), rest, f) {
                node.plus = None;
            }
        }
        FilterLevel::Literal(s) => {
            if adjust_child(node.children.get_mut(s), rest, f) {
                node.children.remove(s);
            }
        }
    }
}

/// If a payload exists at `filter`, replace it with `f(payload)`;
/// `f` returning `None` prunes the node the same way `delete` would.
pub fn adjust<V>(trie: &mut Trie<V>, filter: &Filter, f: impl FnOnce(V) -> Option<V>) {
    adjust_rec(&mut trie.root, filter.levels(), f);
}

fn difference_rec<V: Clone>(node: &mut Node<V>, other: &Node<V>, sub: &impl Fn(V, V) -> Option<V>) {
    match (node.hash.take(), other.hash.clone()) {
        (Some(v1), Some(v2)) => node.hash = sub(v1, v2),
        (Some(v1), None) => node.hash = Some(v1),
        (None, _) => {}
    }
    match (node.value.take(), other.value.clone()) {
        (Some(v1), Some(v2)) => node.value = sub(v1, v2),
        (Some(v1), None) => node.value = Some(v1),
        (None, _) => {}
    }
    if let Some(child) = node.plus.as_deref_mut() {
        if let Some(other_child) = other.plus.as_deref() {
            difference_rec(child, other_child, sub);
        }
        if child.is_empty() {
            node.plus = None;
        }
    }
    let keys: Vec<Level> = node.children.keys().cloned().collect();
    for key in keys {
        if let Some(other_child) = other.children.get(&key) {
            if let Some(child) = node.children.get_mut(&key) {
                difference_rec(child, other_child, sub);
            }
        }
        if node.children.get(&key).is_some_and(Node::is_empty) {
            node.children.remove(&key);
        }
    }
}

/// Structural zip of `t1` against `t2`: overlapping payloads become
/// `sub(v1, v2)` (pruned when `sub` returns `None`); payloads only on the
/// left are kept unchanged; payloads only on the right are ignored.
/// Mutates `t1` in place.
pub fn difference_with<V: Clone>(t1: &mut Trie<V>, sub: impl Fn(V, V) -> Option<V>, t2: &Trie<V>) {
    difference_rec(&mut t1.root, &t2.root, &sub);
}

fn map_node<V, W>(node: &Node<V>, f: &impl Fn(&V) -> W) -> Node<W> {
    Node {
        value: node.value.as_ref().map(|v| f(v)),
        children: node
            .children
            .iter()
            .map(|(k, child)| (k.clone(), map_node(child, f)))
            .collect(),
        plus: node.plus.as_deref().map(|child| Box::new(map_node(child, f))),
        hash: node.hash.as_ref().map(|v| f(v)),
    }
}

/// Build a new trie with every payload transformed by `f`.
pub fn map<V, W>(trie: &Trie<V>, f: impl Fn(&V) -> W) -> Trie<W> {
    Trie {
        root: map_node(&trie.root, &f),
    }
}

fn lookup_rec<V: Clone>(
    node: &Node<V>,
    levels: &[Level],
    combine: &impl Fn(V, V) -> V,
    acc: &mut Option<V>,
) {
    if let Some(h) = &node.hash {
        accumulate(acc, h.clone(), combine);
    }
    match levels.split_first() {
        None => {
            if let Some(v) = &node.value {
                accumulate(acc, v.clone(), combine);
            }
        }
        Some((level, rest)) => {
            if let Some(child) = node.children.get(level) {
                lookup_rec(child, rest, combine, acc);
            }
            if let Some(child) = node.plus.as_deref() {
                lookup_rec(child, rest, combine, acc);
            }
        }
    }
}

/// Returns the combined payload of every filter in the trie that matches
/// `topic`, or `None` if nothing matches.
pub fn lookup_with<V: Clone>(trie: &Trie<V>, combine: impl Fn(V, V) -> V, topic: &Topic) -> Option<V> {
    let mut acc = None;
    lookup_rec(&trie.root, topic.levels(), &combine, &mut acc);
    acc
}

use std::collections::HashSet;

use crate::types::SessionKey;

fn union_session_keys(mut a: HashSet<SessionKey>, b: HashSet<SessionKey>) -> HashSet<SessionKey> {
    a.extend(b);
    a
}

/// Convenience over `lookup_with(union, ...)` for set-valued tries.
#[must_use]
pub fn subscriptions(trie: &Trie<HashSet<SessionKey>>, topic: &Topic) -> HashSet<SessionKey> {
    lookup_with(trie, union_session_keys, topic).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::topic::{parse_filter, parse_topic};
    use codec::QoS;

    fn keyset(keys: &[u64]) -> HashSet<SessionKey> {
        keys.iter().copied().map(SessionKey::new).collect()
    }

    #[test]
    fn insert_then_lookup_finds_matching_filter() {
        let mut trie = Trie::default();
        let filter = parse_filter("a/+").unwrap();
        insert_with(&mut trie, union_session_keys, &filter, keyset(&[1]));

        let topic = parse_topic("a/x").unwrap();
        assert_eq!(subscriptions(&trie, &topic), keyset(&[1]));
    }

    #[test]
    fn delete_after_insert_restores_empty_trie() {
        let mut trie: Trie<HashSet<SessionKey>> = Trie::default();
        let filter = parse_filter("a/b/+").unwrap();
        insert_with(&mut trie, union_session_keys, &filter, keyset(&[1]));
        assert!(delete(&mut trie, &filter).is_some());
        assert!(trie.is_empty());
    }

    #[test]
    fn combining_two_inserts_equals_inserting_combined_value_once() {
        let mut merged = Trie::default();
        let filter = parse_filter("a").unwrap();
        insert_with(&mut merged, union_session_keys, &filter, keyset(&[1, 2]));

        let mut sequential = Trie::default();
        insert_with(&mut sequential, union_session_keys, &filter, keyset(&[1]));
        insert_with(&mut sequential, union_session_keys, &filter, keyset(&[2]));

        let topic = parse_topic("a").unwrap();
        assert_eq!(subscriptions(&merged, &topic), subscriptions(&sequential, &topic));
    }

    #[test]
    fn hash_captures_descendants_but_not_siblings() {
        let mut trie = Trie::default();
        insert_with(&mut trie, union_session_keys, &parse_filter("a/#").unwrap(), keyset(&[1]));

        assert_eq!(subscriptions(&trie, &parse_topic("a").unwrap()), keyset(&[1]));
        assert_eq!(subscriptions(&trie, &parse_topic("a/b").unwrap()), keyset(&[1]));
        assert_eq!(subscriptions(&trie, &parse_topic("a/b/c").unwrap()), keyset(&[1]));
        assert!(subscriptions(&trie, &parse_topic("b/a").unwrap()).is_empty());
    }

    #[test]
    fn plus_matches_single_levels_including_empty() {
        let mut trie = Trie::default();
        insert_with(&mut trie, union_session_keys, &parse_filter("+/x").unwrap(), keyset(&[1]));

        assert_eq!(subscriptions(&trie, &parse_topic("/x").unwrap()), keyset(&[1]));
        assert_eq!(subscriptions(&trie, &parse_topic("a/x").unwrap()), keyset(&[1]));
        assert!(subscriptions(&trie, &parse_topic("x").unwrap()).is_empty());
        assert!(subscriptions(&trie, &parse_topic("a/b/x").unwrap()).is_empty());
    }

    #[test]
    fn max_combine_picks_highest_qos() {
        let mut trie: Trie<QoS> = Trie::default();
        let max_qos = |a: QoS, b: QoS| a.max(b);
        insert_with(&mut trie, max_qos, &parse_filter("a/+").unwrap(), QoS::AtMostOnce);
        insert_with(&mut trie, max_qos, &parse_filter("a/#").unwrap(), QoS::ExactlyOnce);

        let result = lookup_with(&trie, max_qos, &parse_topic("a/b").unwrap());
        assert_eq!(result, Some(QoS::ExactlyOnce));
    }

    #[test]
    fn difference_with_removes_only_overlapping_key() {
        let mut broker_index: Trie<HashSet<SessionKey>> = Trie::default();
        let filter = parse_filter("a/b").unwrap();
        insert_with(&mut broker_index, union_session_keys, &filter, keyset(&[1, 2]));

        let mut removal = Trie::default();
        insert_with(&mut removal, union_session_keys, &filter, keyset(&[1]));

        difference_with(
            &mut broker_index,
            |a: HashSet<SessionKey>, b: HashSet<SessionKey>| {
                let diff: HashSet<SessionKey> = a.difference(&b).copied().collect();
                if diff.is_empty() {
                    None
                } else {
                    Some(diff)
                }
            },
            &removal,
        );

        assert_eq!(subscriptions(&broker_index, &parse_topic("a/b").unwrap()), keyset(&[2]));
    }

    #[test]
    fn difference_with_prunes_when_fully_removed() {
        let mut broker_index: Trie<HashSet<SessionKey>> = Trie::default();
        let filter = parse_filter("a/b").unwrap();
        insert_with(&mut broker_index, union_session_keys, &filter, keyset(&[1]));

        let mut removal = Trie::default();
        insert_with(&mut removal, union_session_keys, &filter, keyset(&[1]));

        difference_with(
            &mut broker_index,
            |a: HashSet<SessionKey>, b: HashSet<SessionKey>| {
                let diff: HashSet<SessionKey> = a.difference(&b).copied().collect();
                if diff.is_empty() {
                    None
                } else {
                    Some(diff)
                }
            },
            &removal,
        );

        assert!(broker_index.is_empty());
    }

    #[test]
    fn map_transforms_payload_type() {
        let mut session_subs: Trie<QoS> = Trie::default();
        insert_with(&mut session_subs, |_a, b| b, &parse_filter("a/b").unwrap(), QoS::AtLeastOnce);

        let key = SessionKey::new(7);
        let as_keyset = map(&session_subs, move |_qos| {
            let mut set = HashSet::new();
            set.insert(key);
            set
        });
        assert_eq!(subscriptions(&as_keyset, &parse_topic("a/b").unwrap()), keyset(&[7]));
    }
}
