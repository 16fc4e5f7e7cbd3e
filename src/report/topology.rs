//! One domain's graph: node metadata, adjacency and edge metadata.
//!
//! All three merges are commutative and associative, so topologies observed
//! by different probes converge regardless of arrival order or grouping.
//! Adjacency and node metadata are also idempotent. Edge counters are not:
//! merging the same topology twice doubles them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::metadata::NodeMetadata;

/// Node id to the metadata describing it.
pub type NodeMetadatas = BTreeMap<String, NodeMetadata>;

/// Node id to the ids it has been observed talking to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Adjacency(BTreeMap<String, BTreeSet<String>>);

impl Adjacency {
    pub fn add(&mut self, src: impl Into<String>, dst: impl Into<String>) {
        self.0.entry(src.into()).or_default().insert(dst.into());
    }

    pub fn neighbours(&self, src: &str) -> Option<&BTreeSet<String>> {
        self.0.get(src)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// Set union per source node.
    pub fn merge(&mut self, other: Adjacency) {
        for (src, dsts) in other.0 {
            self.0.entry(src).or_default().extend(dsts);
        }
    }
}

/// Unordered pair of node ids, stored with the smaller id first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId {
    lo: String,
    hi: String,
}

impl EdgeId {
    /// Normalizes the pair. The flag is true when `a` and `b` were swapped.
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> (Self, bool) {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            (Self { lo: a, hi: b }, false)
        } else {
            (Self { lo: b, hi: a }, true)
        }
    }

    pub fn endpoints(&self) -> (&str, &str) {
        (&self.lo, &self.hi)
    }
}

/// Counters for one edge, oriented from the lower node id to the higher one.
///
/// Absent counters were not measured; they are the identity for merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_packets: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_packets: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<u64>,
}

impl EdgeMetadata {
    /// The same measurement seen from the other end.
    pub fn flipped(self) -> Self {
        Self {
            egress_packets: self.ingress_packets,
            ingress_packets: self.egress_packets,
            egress_bytes: self.ingress_bytes,
            ingress_bytes: self.egress_bytes,
            connections: self.connections,
        }
    }

    /// Field-wise sum.
    pub fn merge(&mut self, other: EdgeMetadata) {
        add(&mut self.egress_packets, other.egress_packets);
        add(&mut self.ingress_packets, other.ingress_packets);
        add(&mut self.egress_bytes, other.egress_bytes);
        add(&mut self.ingress_bytes, other.ingress_bytes);
        add(&mut self.connections, other.connections);
    }
}

fn add(dst: &mut Option<u64>, src: Option<u64>) {
    *dst = match (*dst, src) {
        (Some(a), Some(b)) => Some(a.saturating_add(b)),
        (a, b) => a.or(b),
    };
}

/// Edge metadata keyed by normalized node pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<EdgeEntry>", into = "Vec<EdgeEntry>")]
pub struct EdgeMetadatas(BTreeMap<EdgeId, EdgeMetadata>);

impl EdgeMetadatas {
    /// Records a measurement taken from `src` towards `dst`.
    pub fn add(&mut self, src: impl Into<String>, dst: impl Into<String>, md: EdgeMetadata) {
        let (id, flipped) = EdgeId::new(src, dst);
        let md = if flipped { md.flipped() } else { md };
        self.0.entry(id).or_default().merge(md);
    }

    /// Metadata for the pair, oriented from `src` towards `dst`.
    pub fn get(&self, src: &str, dst: &str) -> Option<EdgeMetadata> {
        let (id, flipped) = EdgeId::new(src, dst);
        self.0
            .get(&id)
            .map(|md| if flipped { md.flipped() } else { *md })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeId, &EdgeMetadata)> {
        self.0.iter()
    }

    pub fn merge(&mut self, other: EdgeMetadatas) {
        for (id, md) in other.0 {
            self.0.entry(id).or_default().merge(md);
        }
    }
}

#[derive(Serialize, Deserialize)]
struct EdgeEntry {
    source: String,
    target: String,
    #[serde(flatten)]
    metadata: EdgeMetadata,
}

impl From<Vec<EdgeEntry>> for EdgeMetadatas {
    fn from(entries: Vec<EdgeEntry>) -> Self {
        let mut edges = EdgeMetadatas::default();
        for e in entries {
            edges.add(e.source, e.target, e.metadata);
        }
        edges
    }
}

impl From<EdgeMetadatas> for Vec<EdgeEntry> {
    fn from(edges: EdgeMetadatas) -> Self {
        edges
            .0
            .into_iter()
            .map(|(id, metadata)| EdgeEntry {
                source: id.lo,
                target: id.hi,
                metadata,
            })
            .collect()
    }
}

/// The graph of a single domain.
///
/// Ids referenced from `adjacency` or `edge_metadatas` need not have an
/// entry in `node_metadatas` yet; the owning tagger may report it later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub node_metadatas: NodeMetadatas,
    pub adjacency: Adjacency,
    pub edge_metadatas: EdgeMetadatas,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or merges metadata for a node.
    pub fn add_node(&mut self, node_id: impl Into<String>, md: NodeMetadata) {
        self.node_metadatas
            .entry(node_id.into())
            .or_default()
            .merge(md);
    }

    pub fn with_node(mut self, node_id: impl Into<String>, md: NodeMetadata) -> Self {
        self.add_node(node_id, md);
        self
    }

    pub fn add_adjacency(&mut self, src: impl Into<String>, dst: impl Into<String>) {
        self.adjacency.add(src, dst);
    }

    pub fn add_edge(&mut self, src: impl Into<String>, dst: impl Into<String>, md: EdgeMetadata) {
        self.edge_metadatas.add(src, dst, md);
    }

    pub fn is_empty(&self) -> bool {
        self.node_metadatas.is_empty() && self.adjacency.is_empty() && self.edge_metadatas.is_empty()
    }

    /// Merges `other` into `self`.
    pub fn merge(&mut self, other: Topology) {
        for (id, md) in other.node_metadatas {
            self.add_node(id, md);
        }
        self.adjacency.merge(other.adjacency);
        self.edge_metadatas.merge(other.edge_metadatas);
    }

    pub fn merged(mut self, other: Topology) -> Self {
        self.merge(other);
        self
    }
}
