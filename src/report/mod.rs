//! The report data model and its merge algebra.
//!
//! A [`Report`] is one producer's current view of the host, split into one
//! [`Topology`] per domain. Reports from taggers and from hosts are combined
//! with [`Report::merge`]; the empty report is its identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod id;
pub mod metadata;
pub mod topology;

pub use id::{
    address_scope, make_address_node_id, make_container_node_id, make_endpoint_node_id,
    make_host_node_id, make_overlay_node_id, make_process_node_id, parse_node_id,
};
pub use metadata::NodeMetadata;
pub use topology::{Adjacency, EdgeId, EdgeMetadata, EdgeMetadatas, NodeMetadatas, Topology};

/// A snapshot of everything one producer knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub endpoint: Topology,
    pub address: Topology,
    pub process: Topology,
    pub container: Topology,
    pub container_image: Topology,
    pub host: Topology,
    pub overlay: Topology,

    /// Container id to the host it runs on.
    pub container_hosts: BTreeMap<String, String>,

    /// Topologies this build has no field for. Kept so reports from newer
    /// probes pass through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Topology>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a topology by its serialized name, including unknown ones.
    pub fn topology(&self, name: &str) -> Option<&Topology> {
        match name {
            "endpoint" => Some(&self.endpoint),
            "address" => Some(&self.address),
            "process" => Some(&self.process),
            "container" => Some(&self.container),
            "container_image" => Some(&self.container_image),
            "host" => Some(&self.host),
            "overlay" => Some(&self.overlay),
            other => self.extra.get(other),
        }
    }

    /// Mutable access by name. Unknown names create an empty topology.
    pub fn topology_mut(&mut self, name: &str) -> &mut Topology {
        match name {
            "endpoint" => &mut self.endpoint,
            "address" => &mut self.address,
            "process" => &mut self.process,
            "container" => &mut self.container,
            "container_image" => &mut self.container_image,
            "host" => &mut self.host,
            "overlay" => &mut self.overlay,
            other => self.extra.entry(other.to_string()).or_default(),
        }
    }

    fn topologies(&self) -> [&Topology; 7] {
        [
            &self.endpoint,
            &self.address,
            &self.process,
            &self.container,
            &self.container_image,
            &self.host,
            &self.overlay,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.topologies().iter().all(|t| t.is_empty())
            && self.container_hosts.is_empty()
            && self.extra.values().all(Topology::is_empty)
    }

    /// Number of nodes across every topology.
    pub fn node_count(&self) -> usize {
        self.topologies()
            .iter()
            .map(|t| t.node_metadatas.len())
            .chain(self.extra.values().map(|t| t.node_metadatas.len()))
            .sum()
    }

    /// Merges `other` into `self`, topology by topology.
    pub fn merge(&mut self, other: Report) {
        let Report {
            endpoint,
            address,
            process,
            container,
            container_image,
            host,
            overlay,
            container_hosts,
            extra,
        } = other;

        self.endpoint.merge(endpoint);
        self.address.merge(address);
        self.process.merge(process);
        self.container.merge(container);
        self.container_image.merge(container_image);
        self.host.merge(host);
        self.overlay.merge(overlay);
        self.container_hosts.extend(container_hosts);
        for (name, topology) in extra {
            self.extra.entry(name).or_default().merge(topology);
        }
    }

    pub fn merged(mut self, other: Report) -> Self {
        self.merge(other);
        self
    }
}
