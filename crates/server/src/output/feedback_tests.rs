// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::board::tile::Tile;
use crate::enums::{DecouplerState, TurnoutPosition};
use crate::output::map::{
    OutputActionValue, OutputEntry, OutputType, PairOutputAction, SingleOutputAction,
};
use crate::signal::aspect::SignalAspect;
use crate::test_support::*;
use crate::world::World;

use super::observe_output;

fn pair_entry(index: u16, action: PairOutputAction) -> OutputEntry {
    OutputEntry { output: OutputType::Pair, index, action: OutputActionValue::Pair(action) }
}

#[test]
fn observed_pair_output_moves_the_turnout() {
    let mut world = World::new();
    let t = turnout_left45(&mut world, "t", 0, 0);
    world.board_modified();

    if let Some(state) = world.board.tile_mut(t).and_then(Tile::as_turnout_mut) {
        state.output_map.set(TurnoutPosition::Straight, vec![pair_entry(7, PairOutputAction::First)]);
        state.output_map.set(TurnoutPosition::Left, vec![pair_entry(7, PairOutputAction::Second)]);
    }

    observe_output(&mut world, OutputType::Pair, 7, OutputActionValue::Pair(PairOutputAction::Second));
    let position = world.board.tile(t).and_then(Tile::as_turnout).map(|t| t.position);
    assert_eq!(position, Some(TurnoutPosition::Left));
}

#[test]
fn observed_aspect_output_feeds_the_signal_regression_path() {
    let mut world = World::new();
    let (b0, s, b1, _b2) = straight_line_with_distant_signal(&mut world);
    world.options.correct_output_pos_when_locked = true;

    if let Some(state) = world.board.tile_mut(s).and_then(Tile::as_signal_mut) {
        state.output_map.set(
            SignalAspect::Stop,
            vec![OutputEntry {
                output: OutputType::Aspect,
                index: 2,
                action: OutputActionValue::Aspect(0),
            }],
        );
    }

    let train = world.add_train("t");
    world.assign_train(b0, train);
    let Some(path) = path_between(&world, b0, b1) else {
        unreachable!("path must exist")
    };
    assert!(crate::interlock::reserve(&mut world, path, train, false));
    let aspect = |world: &World| {
        world.board.tile(s).and_then(Tile::as_signal).map(|sig| sig.aspect)
    };
    assert_eq!(aspect(&world), Some(SignalAspect::Proceed));

    // The wire reports the stop aspect: locked signal snaps back.
    observe_output(&mut world, OutputType::Aspect, 2, OutputActionValue::Aspect(0));
    assert_eq!(aspect(&world), Some(SignalAspect::Proceed));
}

#[test]
fn observed_single_output_tracks_the_decoupler() {
    let mut world = World::new();
    let d = decoupler(&mut world, "d", 0, 0);
    world.board_modified();

    if let Some(crate::board::tile::TileKind::Decoupler(state)) =
        world.board.tile_mut(d).map(|t| &mut t.kind)
    {
        state.output_map.set(
            DecouplerState::Activated,
            vec![OutputEntry {
                output: OutputType::Single,
                index: 3,
                action: OutputActionValue::Single(SingleOutputAction::On),
            }],
        );
    }

    observe_output(
        &mut world,
        OutputType::Single,
        3,
        OutputActionValue::Single(SingleOutputAction::On),
    );
    let state = match world.board.tile(d).map(|t| &t.kind) {
        Some(crate::board::tile::TileKind::Decoupler(s)) => Some(s.state),
        _ => None,
    };
    assert_eq!(state, Some(DecouplerState::Activated));
}

#[test]
fn unmatched_observation_is_ignored() {
    let mut world = World::new();
    let t = turnout_left45(&mut world, "t", 0, 0);
    world.board_modified();

    observe_output(&mut world, OutputType::Pair, 9, OutputActionValue::Pair(PairOutputAction::First));
    let position = world.board.tile(t).and_then(Tile::as_turnout).map(|t| t.position);
    assert_eq!(position, Some(TurnoutPosition::Unknown));
}
