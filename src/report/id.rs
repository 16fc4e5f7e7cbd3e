//! Node identifiers.
//!
//! Every tagger derives node ids with the functions in this module so that
//! two taggers describing the same container (or peer, or process) arrive at
//! byte-identical strings and their partial views merge into one node.
//!
//! Host-scoped ids join their parts with [`SCOPE_DELIM`]. Callers must not
//! pass host ids containing the delimiter; this is not checked.

use std::net::IpAddr;

/// Separates the parts of a host-scoped node id.
pub const SCOPE_DELIM: &str = ";";

/// Prefix for overlay peer ids. Host-scoped ids never start with it.
pub const OVERLAY_PREFIX: &str = "#";

/// Id of an endpoint (address and port) in the given address scope.
pub fn make_endpoint_node_id(scope: &str, address: &str, port: &str) -> String {
    format!("{scope}{SCOPE_DELIM}{address}{SCOPE_DELIM}{port}")
}

/// Id of an address in the given address scope.
pub fn make_address_node_id(scope: &str, address: &str) -> String {
    format!("{scope}{SCOPE_DELIM}{address}")
}

pub fn make_process_node_id(host_id: &str, pid: &str) -> String {
    format!("{host_id}{SCOPE_DELIM}{pid}")
}

/// Id of a container. The host id guards against container id collisions
/// across hosts.
pub fn make_container_node_id(host_id: &str, container_id: &str) -> String {
    format!("{host_id}{SCOPE_DELIM}{container_id}")
}

pub fn make_host_node_id(host_id: &str) -> String {
    format!("{host_id}{SCOPE_DELIM}{host_id}")
}

/// Id of a peer in the overlay network. Peer names are unique across the
/// overlay, so no host qualifier is needed.
pub fn make_overlay_node_id(peer_name: &str) -> String {
    format!("{OVERLAY_PREFIX}{peer_name}")
}

/// Splits a host-scoped id into its host and the remainder.
pub fn parse_node_id(node_id: &str) -> Option<(&str, &str)> {
    node_id.split_once(SCOPE_DELIM)
}

/// Address space an IP belongs to.
///
/// Loopback addresses are only meaningful on the host that observed them, so
/// they are qualified by the host id. Every other address lives in the shared
/// (empty) scope and converges across hosts.
pub fn address_scope(host_id: &str, ip: &IpAddr) -> String {
    if ip.is_loopback() {
        host_id.to_string()
    } else {
        String::new()
    }
}
