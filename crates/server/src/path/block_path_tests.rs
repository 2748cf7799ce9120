// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::board::tile::TileRotate;
use crate::enums::{BlockSide, CrossState, DirectionControlState, TurnoutPosition};
use crate::test_support::*;
use crate::world::World;

use super::find;

#[test]
fn straight_line_yields_one_path_per_direction() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    straight(&mut world, 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    let paths = find(&world.board, b0);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].from_side, BlockSide::B);
    assert_eq!(paths[0].to_block, b1);
    assert_eq!(paths[0].to_side, BlockSide::A);
    assert_eq!(paths[0].tiles.len(), 1);

    let back = find(&world.board, b1);
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].from_side, BlockSide::A);
    assert_eq!(back[0].to_block, b0);
    assert_eq!(back[0].to_side, BlockSide::B);
}

#[test]
fn source_block_with_one_connected_side_only_emits_that_side() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let _b1 = block(&mut world, "b1", 0, 1);
    world.board_modified();

    let paths = find(&world.board, b0);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].from_side, BlockSide::B);
}

#[test]
fn turnout_forks_into_both_branches() {
    let mut world = World::new();
    let (b0, _s, t, b1, b2) = turnout_layout(&mut world);

    let paths = find(&world.board, b0);
    assert_eq!(paths.len(), 2);

    let to_b1 = paths.iter().find(|p| p.to_block == b1);
    let to_b2 = paths.iter().find(|p| p.to_block == b2);
    assert!(
        matches!(to_b1, Some(p) if p.turnouts == vec![(t, TurnoutPosition::Straight)]),
        "missing straight branch"
    );
    assert!(
        matches!(to_b2, Some(p) if p.turnouts == vec![(t, TurnoutPosition::Left)]),
        "missing diverging branch"
    );
}

#[test]
fn signal_is_recorded_only_when_passed_front_side() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let s = signal2(&mut world, "s", 0, 1, TileRotate::Deg0);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    let forward = find(&world.board, b0);
    assert_eq!(forward.len(), 1);
    assert_eq!(forward[0].signals, vec![s]);

    // The reverse direction passes the signal's back; not recorded.
    let reverse = find(&world.board, b1);
    assert_eq!(reverse.len(), 1);
    assert!(reverse[0].signals.is_empty());
}

#[test]
fn one_way_blocks_reverse_traversal() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    // Arrow points from slot 0 (north side) to slot 1: travelling south
    // enters via slot 0 only when the tile is rotated to face north.
    one_way(&mut world, 0, 1, TileRotate::Deg0);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    let forward = find(&world.board, b0);
    assert_eq!(forward.len(), 1, "forward direction must pass");
    let reverse = find(&world.board, b1);
    assert!(reverse.is_empty(), "reverse direction must be dropped");
}

#[test]
fn direction_control_records_travel_direction() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let dc = direction_control(&mut world, "dc", 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    let forward = find(&world.board, b0);
    assert_eq!(forward[0].direction_controls, vec![(dc, DirectionControlState::AtoB)]);
    let reverse = find(&world.board, b1);
    assert_eq!(reverse[0].direction_controls, vec![(dc, DirectionControlState::BtoA)]);
}

#[test]
fn bridge_passes_straight_through_without_locking() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let bridge = bridge90(&mut world, 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    let paths = find(&world.board, b0);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].to_block, b1);
    // Recorded for passive reservation; no turnout/crossing obligations.
    assert_eq!(paths[0].bridges.len(), 1);
    assert!(paths[0].turnouts.is_empty());
    assert!(paths[0].crossings.is_empty());
}

#[test]
fn cross_records_the_claimed_diagonal() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let cross = cross90(&mut world, 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    // The east-west route over the same crossing.
    let b2 = block_rotated(&mut world, "b2", -1, 1, TileRotate::Deg90);
    let b3 = block_rotated(&mut world, "b3", 1, 1, TileRotate::Deg270);
    world.board_modified();

    let vertical = find(&world.board, b0);
    assert_eq!(vertical.len(), 1);
    assert_eq!(vertical[0].crossings, vec![(cross, CrossState::AC)]);

    let horizontal = find(&world.board, b2);
    assert_eq!(horizontal.len(), 1);
    assert_eq!(horizontal[0].to_block, b3);
    assert_eq!(horizontal[0].crossings, vec![(cross, CrossState::BD)]);
}

#[test]
fn buffer_stop_is_a_dead_end() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    buffer_stop(&mut world, 0, 1, TileRotate::Deg0);
    world.board_modified();

    assert!(find(&world.board, b0).is_empty());
}

#[test]
fn unbound_link_tile_drops_the_path() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    link_tile(&mut world, "l0", 0, 1, TileRotate::Deg0);
    world.board_modified();

    assert!(find(&world.board, b0).is_empty());
}

#[test]
fn paired_link_tiles_jump_across_the_board() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let l0 = link_tile(&mut world, "l0", 0, 1, TileRotate::Deg0);
    let l1 = link_tile(&mut world, "l1", 10, 1, TileRotate::Deg0);
    let b1 = block(&mut world, "b1", 10, 0);
    pair_links(&mut world, l0, l1);
    world.board_modified();

    let paths = find(&world.board, b0);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].to_block, b1);
}

#[test]
fn nx_buttons_bracket_the_path() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let nf = nx_button(&mut world, "nf", 0, 1);
    straight(&mut world, 0, 2);
    let nt = nx_button(&mut world, "nt", 0, 3);
    let b1 = block(&mut world, "b1", 0, 4);
    world.board_modified();

    let paths = find(&world.board, b0);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].nx_button_from, Some(nf));
    assert_eq!(paths[0].nx_button_to, Some(nt));
    assert!(paths[0].has_nx_buttons());
}

#[test]
fn reentrant_path_terminates_exactly_once() {
    // b0 side B runs into a link tile whose pair sits above b0, so the walk
    // re-enters the source block on its other side.
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let l0 = link_tile(&mut world, "l0", 0, 1, TileRotate::Deg0);
    let l1 = link_tile(&mut world, "l1", 0, -1, TileRotate::Deg180);
    pair_links(&mut world, l0, l1);
    world.board_modified();

    let paths = find(&world.board, b0);
    // Both sides discover the loop; each terminates exactly once back at b0.
    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert_eq!(path.to_block, b0);
        assert_eq!(path.to_side, path.from_side.opposite());
    }
}

#[test]
fn is_ready_tracks_turnout_positions_and_direction_controls() {
    let mut world = World::new();
    let (b0, _s, t, b1, _b2) = turnout_layout(&mut world);

    let Some(path) = find(&world.board, b0).into_iter().find(|p| p.to_block == b1) else {
        unreachable!("path to b1 must exist")
    };
    assert!(!path.is_ready(&world.board), "turnout still unknown");

    world.do_set_position(t, TurnoutPosition::Straight, false);
    assert!(path.is_ready(&world.board));

    world.do_set_position(t, TurnoutPosition::Left, false);
    assert!(!path.is_ready(&world.board));
}
