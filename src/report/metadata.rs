//! Per-node metadata.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Serialize};

/// String attributes attached to one node within one topology.
///
/// Each tagger owns the keys it writes. Merging is meant to combine disjoint
/// attribute sets from different taggers; when both sides carry the same key
/// the later (right-hand) value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeMetadata(BTreeMap<String, String>);

impl NodeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds metadata from any collection of key/value pairs.
    pub fn with<I, K, V>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Applies `other` on top of `self`: union of keys, `other` wins on
    /// collision.
    pub fn merge(&mut self, other: NodeMetadata) {
        self.0.extend(other.0);
    }

    pub fn merged(mut self, other: NodeMetadata) -> Self {
        self.merge(other);
        self
    }
}

impl<'a> IntoIterator for &'a NodeMetadata {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
