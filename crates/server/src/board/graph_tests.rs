// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::arena::Arena;
use crate::board::tile::{Tile, TileKind, TileRotate};

use super::Graph;

fn dummy_tile_ref() -> crate::board::tile::TileRef {
    let mut arena = Arena::new();
    arena.insert(Tile::new("", 0, 0, TileRotate::Deg0, TileKind::Straight))
}

#[test]
fn link_connect_binds_both_endpoints() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let link = g.add_link(Vec::new());

    assert!(g.link_connect(link, a, 0, b, 1));

    // Strict back-reference both ways.
    assert_eq!(g.nodes.get(a).and_then(|n| n.link(0)), Some(link));
    assert_eq!(g.nodes.get(b).and_then(|n| n.link(1)), Some(link));
    let next = g.next_node(a, link);
    assert!(matches!(next, Some(end) if end.node == b && end.slot == 1));
}

#[test]
fn reconnect_of_same_endpoints_is_a_no_op() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let first = g.add_link(Vec::new());
    assert!(g.link_connect(first, a, 0, b, 1));

    // A second link over the same endpoints with the same (empty) tile list
    // leaves the original in place.
    let second = g.add_link(Vec::new());
    assert!(g.link_connect(second, a, 0, b, 1));
    assert_eq!(g.nodes.get(a).and_then(|n| n.link(0)), Some(first));
}

#[test]
fn connected_link_refuses_second_connect() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let c = g.add_node(t, 2);
    let link = g.add_link(Vec::new());
    assert!(g.link_connect(link, a, 0, b, 1));
    assert!(!g.link_connect(link, a, 1, c, 0));
}

#[test]
fn node_disconnect_is_idempotent_and_exact() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let link = g.add_link(Vec::new());
    let other = g.add_link(Vec::new());
    g.link_connect(link, a, 0, b, 1);

    assert!(!g.node_disconnect(a, 0, other)); // wrong link
    assert!(g.node_disconnect(a, 0, link));
    assert!(!g.node_disconnect(a, 0, link)); // already gone
}

#[test]
fn link_disconnect_is_safe_and_idempotent() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let link = g.add_link(Vec::new());
    g.link_connect(link, a, 0, b, 1);

    g.link_disconnect(link);
    assert_eq!(g.nodes.get(a).and_then(|n| n.link(0)), None);
    assert_eq!(g.nodes.get(b).and_then(|n| n.link(1)), None);
    g.link_disconnect(link); // second call: no effect
    assert!(g.links.contains(link)); // entry outlives the disconnect call
}

#[test]
fn node_connect_evicts_prior_occupant() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let c = g.add_node(t, 2);
    let first = g.add_link(Vec::new());
    g.link_connect(first, a, 0, b, 0);

    let second = g.add_link(Vec::new());
    assert!(g.link_connect(second, a, 1, c, 0));
    // Placing `second` into a:0 kicks `first` out entirely.
    g.link_disconnect(second);
    assert!(g.node_connect(a, 0, second));
    assert_eq!(g.nodes.get(a).and_then(|n| n.link(0)), Some(second));
    assert_eq!(g.nodes.get(b).and_then(|n| n.link(0)), None);
}

#[test]
fn remove_node_drops_fully_disconnected_links() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let link = g.add_link(Vec::new());
    g.link_connect(link, a, 0, b, 1);

    g.remove_node(a);
    assert!(!g.links.contains(link));
    assert_eq!(g.nodes.get(b).and_then(|n| n.link(1)), None);
}

#[test]
fn other_link_on_two_slot_nodes() {
    let mut g = Graph::new();
    let t = dummy_tile_ref();
    let a = g.add_node(t, 2);
    let b = g.add_node(t, 2);
    let c = g.add_node(t, 2);
    let ab = g.add_link(Vec::new());
    let ac = g.add_link(Vec::new());
    g.link_connect(ab, a, 0, b, 0);
    g.link_connect(ac, a, 1, c, 0);

    let node_a = g.nodes.get(a);
    assert!(node_a.is_some_and(|n| n.other_link(ab) == Some(ac)));
    assert!(node_a.is_some_and(|n| n.other_link(ac) == Some(ab)));
}
