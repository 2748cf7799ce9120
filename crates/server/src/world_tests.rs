// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::board::tile::{Tile, TileRotate};
use crate::enums::{BlockState, SensorState};
use crate::test_support::*;
use crate::world::{HwAction, World};

#[test]
fn active_tiles_get_generated_object_ids() {
    let mut world = World::new();
    let b = block(&mut world, "", 0, 0);
    let id = world.object_id(b);
    assert_eq!(id, "block_1");
    assert_eq!(world.object("block_1"), Some(b));

    let b2 = block(&mut world, "", 0, 5);
    assert_eq!(world.object_id(b2), "block_2");
}

#[test]
fn passive_tiles_have_no_object_id() {
    let mut world = World::new();
    let s = straight(&mut world, 0, 0);
    assert_eq!(world.object_id(s), "");
}

#[test]
fn duplicate_object_id_is_rejected() {
    let mut world = World::new();
    block(&mut world, "b", 0, 0);
    let result = world.add_tile(Tile::new(
        "b",
        0,
        5,
        TileRotate::Deg0,
        crate::board::tile::TileKind::Block(crate::board::tile::BlockTile::new()),
    ));
    assert!(result.is_err());
}

#[test]
fn board_modified_discovers_paths_both_ways() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    straight(&mut world, 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();

    let outgoing = world.board.tile(b0).and_then(Tile::as_block).map(|b| b.paths.len());
    assert_eq!(outgoing, Some(1));
    let incoming = world.board.tile(b1).and_then(Tile::as_block).map(|b| b.paths_in.len());
    assert_eq!(incoming, Some(1));
    assert!(path_between(&world, b0, b1).is_some());
    assert!(path_between(&world, b1, b0).is_some());
}

#[test]
fn board_modified_drops_stale_reservations() {
    let mut world = World::new();
    let (b0, _s, _t, b1, _b2) = turnout_layout(&mut world);
    let train = world.add_train("t1");
    world.assign_train(b0, train);
    let Some(path) = path_between(&world, b0, b1) else {
        unreachable!("path must exist")
    };
    assert!(crate::interlock::reserve(&mut world, path, train, false));

    world.board_modified();

    // Fresh paths, no reservations anywhere.
    assert!(world.paths.iter().all(|(_, p)| !p.is_reserved()));
    let blocks_clear = world
        .board
        .tiles
        .iter()
        .filter_map(|(_, t)| t.as_block())
        .all(|b| b.reserved.iter().all(Option::is_none));
    assert!(blocks_clear);
}

#[test]
fn block_state_rules() {
    let mut world = World::new();
    let b = block(&mut world, "b", 0, 0);
    world.board_modified();

    let state = |world: &World| world.board.tile(b).and_then(Tile::as_block).map(|b| b.state);

    assert_eq!(state(&world), Some(BlockState::Free));

    world.set_block_input(b, 0, SensorState::Occupied);
    assert_eq!(state(&world), Some(BlockState::Occupied));

    world.set_block_input(b, 0, SensorState::Unknown);
    assert_eq!(state(&world), Some(BlockState::Unknown));

    world.set_block_input(b, 0, SensorState::Free);
    assert_eq!(state(&world), Some(BlockState::Free));
}

#[test]
fn occupied_wins_over_reserved() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    straight(&mut world, 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();
    let train = world.add_train("t1");
    world.assign_train(b0, train);

    let Some(path) = path_between(&world, b0, b1) else {
        unreachable!("path must exist")
    };
    assert!(crate::interlock::reserve(&mut world, path, train, false));
    world.set_block_occupied(b1, true);

    let state = world.board.tile(b1).and_then(Tile::as_block).map(|b| b.state);
    assert_eq!(state, Some(BlockState::Occupied));
}

#[test]
fn power_change_queues_a_track_command_once() {
    let mut world = World::new();
    world.set_power(true);
    world.set_power(true);
    assert_eq!(world.take_hw_actions(), vec![HwAction::TrackPower(true)]);
    assert!(world.take_hw_actions().is_empty());
}

#[test]
fn emergency_stop_is_idempotent_per_train() {
    let mut world = World::new();
    let train = world.add_train("t1");
    assert!(world.emergency_stop_train(train));
    assert!(!world.emergency_stop_train(train));
    let stopped = world.trains.get(train).map(|t| t.emergency_stop);
    assert_eq!(stopped, Some(true));
}

#[test]
fn run_requires_a_transition() {
    let mut world = World::new();
    assert!(!world.running);
    world.run();
    assert!(world.running);
    world.stop();
    assert!(!world.running);
}

#[test]
fn sensor_reports_feed_routed_block_inputs() {
    let mut world = World::new();
    let b = block(&mut world, "b", 0, 0);
    world.board_modified();
    world.assign_block_input_address(b, 0, 1, 42);

    world.sensor_report(1, 42, true);
    let state = world.board.tile(b).and_then(Tile::as_block).map(|b| b.state);
    assert_eq!(state, Some(BlockState::Occupied));

    world.sensor_report(1, 42, false);
    let state = world.board.tile(b).and_then(Tile::as_block).map(|b| b.state);
    assert_eq!(state, Some(BlockState::Free));

    // Unrouted addresses change nothing.
    world.sensor_report(9, 9, true);
    let state = world.board.tile(b).and_then(Tile::as_block).map(|b| b.state);
    assert_eq!(state, Some(BlockState::Free));
}

#[test]
fn direction_control_refuses_states_that_break_a_reservation() {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    let dc = direction_control(&mut world, "dc", 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();
    let train = world.add_train("t");
    world.assign_train(b0, train);

    let Some(path) = path_between(&world, b0, b1) else {
        unreachable!("path must exist")
    };
    // The path needs AtoB through the control.
    assert!(crate::interlock::reserve(&mut world, path, train, false));

    use crate::enums::DirectionControlState as Dcs;
    assert!(!world.set_direction_control_state(dc, Dcs::BtoA), "forbids the reserved direction");
    assert!(!world.set_direction_control_state(dc, Dcs::None));
    assert!(world.set_direction_control_state(dc, Dcs::AtoB));
    assert!(world.set_direction_control_state(dc, Dcs::Both));

    assert!(crate::interlock::release(&mut world, path, false));
    assert!(world.set_direction_control_state(dc, Dcs::BtoA), "free after release");
}

#[test]
fn train_speed_respects_the_emergency_stop() {
    let mut world = World::new();
    let train = world.add_train("t");
    if let Some(t) = world.trains.get_mut(train) {
        t.address = Some(3);
    }

    assert!(world.set_train_speed(train, 60.0));
    assert_eq!(
        world.take_hw_actions(),
        vec![HwAction::Throttle { address: 3, speed: 60, emergency_stop: false }]
    );

    world.emergency_stop_train(train);
    assert!(!world.set_train_speed(train, 10.0));
    assert!(world.set_train_speed(train, 0.0), "zero is always allowed");

    assert!(world.reset_emergency_stop(train));
    assert!(world.set_train_speed(train, 10.0));
}

#[test]
fn train_lookup_by_id() {
    let mut world = World::new();
    let train = world.add_train("ice1");
    assert_eq!(world.train_by_id("ice1"), Some(train));
    assert_eq!(world.train_by_id("ghost"), None);
}

#[test]
fn removing_an_object_frees_its_id() {
    let mut world = World::new();
    let b = block(&mut world, "b", 0, 0);
    world.remove_tile(b);
    assert_eq!(world.object("b"), None);
    // The id can be used again.
    let b2 = block(&mut world, "b", 0, 0);
    assert_eq!(world.object("b"), Some(b2));
}
