// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The literal end-to-end interlocking scenarios: observable signal aspects
//! and block states after the named events.

use signalbox::board::tile::{Tile, TileRotate};
use signalbox::enums::{BlockState, ExtOutputChangeAction, TurnoutPosition};
use signalbox::interlock;
use signalbox::signal::aspect::SignalAspect;
use signalbox::test_support as board;
use signalbox::world::World;

fn aspect(world: &World, signal: signalbox::board::tile::TileRef) -> Option<SignalAspect> {
    world.board.tile(signal).and_then(Tile::as_signal).map(|s| s.aspect)
}

// Scenario 1: straight section, no turnouts.
#[test]
fn straight_section_no_turnouts() {
    let mut world = World::new();
    let b0 = board::block(&mut world, "b0", 0, 0);
    let s = board::signal3(&mut world, "s", 0, 1, TileRotate::Deg0);
    let b1 = board::block(&mut world, "b1", 0, 2);
    world.board_modified();

    let train = world.add_train("t");
    world.assign_train(b0, train);

    // requireReservation=Auto resolves to false: no turnout ahead.
    assert_eq!(aspect(&world, s), Some(SignalAspect::ProceedReducedSpeed));

    let Some(path) = board::path_between(&world, b0, b1) else {
        unreachable!("path b0->b1 must exist")
    };
    assert!(interlock::reserve(&mut world, path, train, false));
    assert_eq!(aspect(&world, s), Some(SignalAspect::Proceed));

    world.set_block_occupied(b1, true);
    assert_eq!(aspect(&world, s), Some(SignalAspect::Stop));
}

// Scenario 2: single turnout, auto reservation requirement, external
// regressions retried then escalated.
#[test]
fn single_turnout_with_escalation() {
    let mut world = World::new();
    world.options.correct_output_pos_when_locked = true;
    world.options.ext_output_change_action = ExtOutputChangeAction::EmergencyStopTrain;

    let b0 = board::block(&mut world, "b0", 0, 0);
    let s = board::signal2(&mut world, "s", 0, 1, TileRotate::Deg0);
    let t = board::turnout_left45(&mut world, "t", 0, 2);
    let b1 = board::block(&mut world, "b1", 0, 3);
    let _b2 = board::block_rotated(&mut world, "b2", 1, 3, TileRotate::Deg315);
    world.board_modified();

    let train = world.add_train("t1");
    world.assign_train(b0, train);

    // Turnout unlocked: stop.
    assert_eq!(aspect(&world, s), Some(SignalAspect::Stop));

    let Some(path) = board::path_between(&world, b0, b1) else {
        unreachable!("straight path must exist")
    };
    assert!(interlock::reserve(&mut world, path, train, false));

    let reserved = world.board.tile(t).and_then(Tile::as_turnout).map(|t| t.reserved_position());
    assert_eq!(reserved, Some(TurnoutPosition::Straight));
    assert_eq!(aspect(&world, s), Some(SignalAspect::Proceed));

    // External change: W3003, one retry back to straight, aspect holds.
    interlock::turnout_output_matched(&mut world, t, TurnoutPosition::Left);
    let position = world.board.tile(t).and_then(Tile::as_turnout).map(|t| t.position);
    assert_eq!(position, Some(TurnoutPosition::Straight));
    assert_eq!(aspect(&world, s), Some(SignalAspect::Proceed));

    // Three more within the minute: escalation stops the train.
    for _ in 0..3 {
        interlock::turnout_output_matched(&mut world, t, TurnoutPosition::Left);
    }
    assert!(world.trains.get(train).is_some_and(|t| t.emergency_stop));
}

// Scenario 3: NX entry/exit.
#[test]
fn nx_entry_exit() {
    let mut world = World::new();
    let b0 = board::block(&mut world, "b0", 0, 0);
    let nf = board::nx_button(&mut world, "nf", 0, 1);
    let nt = board::nx_button(&mut world, "nt", 0, 2);
    let b1 = board::block(&mut world, "b1", 0, 3);
    world.board_modified();
    world.run();

    let train = world.add_train("t");
    world.assign_train(b0, train);

    interlock::nx::pressed(&mut world, nf);
    interlock::nx::pressed(&mut world, nt);

    let reserved = board::path_between(&world, b0, b1)
        .and_then(|p| world.paths.get(p))
        .map(|p| p.is_reserved());
    assert_eq!(reserved, Some(true));
    // Entry press consumed on success.
    assert!(world.nx.pressed_buttons().is_empty());

    // Any other second button is a no-op.
    let stray = board::nx_button(&mut world, "stray", 5, 5);
    interlock::nx::pressed(&mut world, nf);
    interlock::nx::pressed(&mut world, stray);
    assert_eq!(world.nx.pressed_buttons(), &[nf]);
}

// Scenario 4: 3-aspect distant look-ahead over two blocks.
#[test]
fn three_aspect_distant_lookahead() {
    let mut world = World::new();
    let (_b0, s3, b1, b2) = board::straight_line_with_distant_signal(&mut world);

    assert_eq!(aspect(&world, s3), Some(SignalAspect::Proceed));

    world.set_block_occupied(b2, true);
    assert_eq!(aspect(&world, s3), Some(SignalAspect::ProceedReducedSpeed));

    world.set_block_occupied(b1, true);
    assert_eq!(aspect(&world, s3), Some(SignalAspect::Stop));
}

// Scenario 5: bridge traversal is passive.
#[test]
fn bridge_traversal_is_passive() {
    let mut world = World::new();
    let b0 = board::block(&mut world, "b0", 0, 0);
    let bridge = board::bridge90(&mut world, 0, 1);
    let b1 = board::block(&mut world, "b1", 0, 2);
    world.board_modified();

    // Entering via slot 2 exits via slot 0 (pair map {0<->2, 1<->3}): the
    // path from b1 northwards crosses the bridge straight through.
    let Some(path_id) = board::path_between(&world, b1, b0) else {
        unreachable!("path b1->b0 must exist")
    };
    let Some(path) = world.paths.get(path_id) else {
        unreachable!("path must resolve")
    };
    assert_eq!(path.bridges.len(), 1);
    assert_eq!(path.bridges[0].0, bridge);
    assert!(path.turnouts.is_empty());
    assert!(path.crossings.is_empty());

    // Reserving it puts no locking obligation on the bridge: the opposite
    // track over the same bridge stays reservable.
    let train = world.add_train("t");
    world.assign_train(b1, train);
    assert!(interlock::reserve(&mut world, path_id, train, false));

    let east = board::block_rotated(&mut world, "e", -1, 1, TileRotate::Deg90);
    let west = board::block_rotated(&mut world, "w", 1, 1, TileRotate::Deg270);
    world.board_modified(); // drops the reservation, rediscovers
    let train = world.add_train("t2");
    world.assign_train(b1, train);
    let (Some(vertical), Some(horizontal)) = (
        board::path_between(&world, b1, b0),
        board::path_between(&world, east, west),
    ) else {
        unreachable!("both routes must exist")
    };
    assert!(interlock::reserve(&mut world, vertical, train, false));
    let train_e = world.add_train("t3");
    world.assign_train(east, train_e);
    assert!(
        interlock::reserve(&mut world, horizontal, train_e, false),
        "independent bridge tracks must not conflict"
    );
}

// Block state propagation into reservations.
#[test]
fn block_states_follow_reservation_lifecycle() {
    let mut world = World::new();
    let b0 = board::block(&mut world, "b0", 0, 0);
    board::straight(&mut world, 0, 1);
    let b1 = board::block(&mut world, "b1", 0, 2);
    world.board_modified();

    let train = world.add_train("t");
    world.assign_train(b0, train);

    let state = |world: &World, b| world.board.tile(b).and_then(Tile::as_block).map(|b| b.state);
    assert_eq!(state(&world, b1), Some(BlockState::Free));

    let Some(path) = board::path_between(&world, b0, b1) else {
        unreachable!("path must exist")
    };
    assert!(interlock::reserve(&mut world, path, train, false));
    assert_eq!(state(&world, b1), Some(BlockState::Reserved));

    assert!(interlock::release(&mut world, path, false));
    assert_eq!(state(&world, b1), Some(BlockState::Free));
}
