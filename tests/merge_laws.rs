//! Algebraic laws of the report merge.
//!
//! Generated attribute values are a function of (node, key), so two reports
//! never disagree about an attribute. Conflicting writes are resolved by
//! apply order and are deliberately not commutative.

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

use scoped::report::{
    make_container_node_id, make_overlay_node_id, EdgeMetadata, NodeMetadata, Report, Topology,
};

fn node_id() -> impl Strategy<Value = String> {
    "[a-d]{1,2}"
}

fn metadata(node: String) -> impl Strategy<Value = NodeMetadata> {
    vec("[k-n]", 0..3).prop_map(move |keys| {
        NodeMetadata::with(keys.into_iter().map(|k| {
            let v = format!("{node}/{k}");
            (k, v)
        }))
    })
}

fn edge_metadata() -> impl Strategy<Value = EdgeMetadata> {
    (
        proptest::option::of(0u64..1_000),
        proptest::option::of(0u64..1_000),
        proptest::option::of(0u64..10),
    )
        .prop_map(|(egress_bytes, ingress_bytes, connections)| EdgeMetadata {
            egress_bytes,
            ingress_bytes,
            connections,
            ..Default::default()
        })
}

fn topology() -> impl Strategy<Value = Topology> {
    (
        vec(node_id().prop_flat_map(|n| (Just(n.clone()), metadata(n))), 0..4),
        vec((node_id(), node_id()), 0..4),
        vec((node_id(), node_id(), edge_metadata()), 0..3),
    )
        .prop_map(|(nodes, adjacency, edges)| {
            let mut t = Topology::new();
            for (id, md) in nodes {
                t.add_node(id, md);
            }
            for (src, dst) in adjacency {
                t.add_adjacency(src, dst);
            }
            for (src, dst, md) in edges {
                t.add_edge(src, dst, md);
            }
            t
        })
}

fn report() -> impl Strategy<Value = Report> {
    (
        topology(),
        topology(),
        topology(),
        btree_map("[a-c]", Just(()), 0..2),
        proptest::option::of(topology()),
    )
        .prop_map(|(container, overlay, endpoint, containers, pods)| {
            let mut r = Report::new();
            r.container = container;
            r.overlay = overlay;
            r.endpoint = endpoint;
            for (id, ()) in containers {
                let host = format!("host-{id}");
                r.container_hosts.insert(id, host);
            }
            if let Some(pods) = pods {
                *r.topology_mut("pod") = pods;
            }
            r
        })
}

/// Same as [`report`] but without edge counters, which are not idempotent.
fn countless_report() -> impl Strategy<Value = Report> {
    report().prop_map(|mut r| {
        r.container.edge_metadatas = Default::default();
        r.overlay.edge_metadatas = Default::default();
        r.endpoint.edge_metadatas = Default::default();
        for t in r.extra.values_mut() {
            t.edge_metadatas = Default::default();
        }
        r
    })
}

proptest! {
    #[test]
    fn empty_is_identity(r in report()) {
        prop_assert_eq!(r.clone().merged(Report::new()), r.clone());
        prop_assert_eq!(Report::new().merged(r.clone()), r);
    }

    #[test]
    fn merge_commutes(a in report(), b in report()) {
        prop_assert_eq!(a.clone().merged(b.clone()), b.merged(a));
    }

    #[test]
    fn merge_associates(a in report(), b in report(), c in report()) {
        let left = a.clone().merged(b.clone()).merged(c.clone());
        let right = a.merged(b.merged(c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn merge_is_idempotent_without_counters(r in countless_report()) {
        prop_assert_eq!(r.clone().merged(r.clone()), r);
    }

    #[test]
    fn container_ids_are_injective(
        h1 in "[a-z0-9-]{0,8}", c1 in "[a-z0-9;]{0,8}",
        h2 in "[a-z0-9-]{0,8}", c2 in "[a-z0-9;]{0,8}",
    ) {
        let same = make_container_node_id(&h1, &c1) == make_container_node_id(&h2, &c2);
        prop_assert_eq!(same, (h1, c1) == (h2, c2));
    }

    #[test]
    fn ids_are_deterministic(h in ".*", c in ".*") {
        prop_assert_eq!(make_container_node_id(&h, &c), make_container_node_id(&h, &c));
        prop_assert_eq!(make_overlay_node_id(&c), make_overlay_node_id(&c));
    }
}

#[test]
fn doubling_a_report_doubles_its_counters() {
    let mut r = Report::new();
    r.endpoint.add_edge(
        "a",
        "b",
        EdgeMetadata {
            egress_bytes: Some(3),
            ..Default::default()
        },
    );
    let doubled = r.clone().merged(r);
    assert_eq!(
        doubled.endpoint.edge_metadatas.get("a", "b").unwrap().egress_bytes,
        Some(6)
    );
}
