// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::board::tile::TileKind;
use crate::test_support::*;
use crate::world::World;

#[test]
fn straight_run_collapses_into_one_link() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let s1 = straight(&mut world, 0, 1);
    let s2 = straight(&mut world, 0, 2);
    let b1 = block(&mut world, "b1", 0, 3);
    world.board_modified();

    let n0 = world.board.node_of(b0);
    let n1 = world.board.node_of(b1);
    assert!(n0.is_some() && n1.is_some());

    // Plain track owns no node.
    assert!(world.board.node_of(s1).is_none());
    assert!(world.board.node_of(s2).is_none());

    // One link joins b0 side B to b1 side A, carrying both straights.
    let (Some(n0), Some(n1)) = (n0, n1) else { return };
    let link = world.board.graph.nodes.get(n0).and_then(|n| n.link(1));
    assert!(link.is_some());
    let Some(link) = link else { return };
    let end = world.board.graph.next_node(n0, link);
    assert!(matches!(end, Some(e) if e.node == n1 && e.slot == 0));
    let tiles = world.board.graph.links.get(link).map(|l| l.tiles.clone()).unwrap_or_default();
    assert_eq!(tiles, vec![s1, s2]);
}

#[test]
fn unconnected_side_has_no_link() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    world.board_modified();

    let Some(node) = world.board.node_of(b0) else {
        unreachable!("block must own a node")
    };
    let n = world.board.graph.nodes.get(node);
    assert!(n.is_some_and(|n| n.link(0).is_none() && n.link(1).is_none()));
}

#[test]
fn removing_a_tile_disconnects_its_neighbours() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let s = signal2(&mut world, "s", 0, 1, crate::board::tile::TileRotate::Deg0);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    world.remove_tile(s);
    world.board_modified();

    // b0 and b1 are now separated by a hole: neither joins the other.
    for (block_ref, slot) in [(b0, 1usize), (b1, 0usize)] {
        let node = world.board.node_of(block_ref);
        assert!(node.is_some());
        if let Some(node) = node {
            assert!(world.board.graph.nodes.get(node).is_some_and(|n| n.link(slot).is_none()));
        }
    }
}

#[test]
fn multi_cell_block_occupies_all_cells() {
    let mut world = World::new();
    let b = add(&mut world, {
        let mut tile = crate::board::tile::Tile::new(
            "b",
            0,
            0,
            crate::board::tile::TileRotate::Deg0,
            TileKind::Block(crate::board::tile::BlockTile::new()),
        );
        tile.height = 3;
        tile
    });
    assert_eq!(world.board.tile_at(0, 0), Some(b));
    assert_eq!(world.board.tile_at(0, 1), Some(b));
    assert_eq!(world.board.tile_at(0, 2), Some(b));
    assert_eq!(world.board.tile_at(0, 3), None);
}

#[test]
fn occupied_cell_rejects_second_tile() {
    let mut world = World::new();
    let _b = block(&mut world, "b0", 0, 0);
    let result = world.add_tile(crate::board::tile::Tile::new(
        "x",
        0,
        0,
        crate::board::tile::TileRotate::Deg0,
        TileKind::Straight,
    ));
    assert!(result.is_err());
}

#[test]
fn signal_front_faces_slot_zero() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let s = signal3(&mut world, "s", 0, 1, crate::board::tile::TileRotate::Deg0);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    // The signal's slot 0 link leads to b0, slot 1 to b1.
    let Some(sn) = world.board.node_of(s) else {
        unreachable!("signal must own a node")
    };
    for (slot, target) in [(0usize, b0), (1usize, b1)] {
        let link = world.board.graph.nodes.get(sn).and_then(|n| n.link(slot));
        assert!(link.is_some(), "slot {slot} unconnected");
        let Some(link) = link else { continue };
        let end = world.board.graph.next_node(sn, link);
        assert!(
            matches!(end, Some(e) if world.board.node_tile(e.node) == Some(target)),
            "slot {slot} does not reach its block"
        );
    }
}
