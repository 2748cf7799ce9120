// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::enums::BlockTrainDirection;
use crate::test_support::*;
use crate::world::World;

use super::{find_direct, reserve_direct};

fn line_world() -> (World, crate::board::tile::TileRef, crate::board::tile::TileRef) {
    let mut world = World::new();
    let b0 = block(&mut world, "b0", 0, 0);
    straight(&mut world, 0, 1);
    let b1 = block(&mut world, "b1", 0, 2);
    world.board_modified();
    (world, b0, b1)
}

#[test]
fn finds_the_direct_path_by_sides() {
    let (world, b0, b1) = line_world();
    // Leaving b0 towards B, arriving in b1 travelling towards B (enter A).
    let found = find_direct(
        &world,
        b0,
        BlockTrainDirection::TowardsB,
        b1,
        BlockTrainDirection::TowardsB,
    );
    assert!(found.is_some());

    // The opposite arrival direction does not exist on this layout.
    let missing = find_direct(
        &world,
        b0,
        BlockTrainDirection::TowardsB,
        b1,
        BlockTrainDirection::TowardsA,
    );
    assert!(missing.is_none());
}

#[test]
fn reserve_requires_a_train() {
    let (mut world, b0, b1) = line_world();
    assert!(!reserve_direct(
        &mut world,
        b0,
        BlockTrainDirection::TowardsB,
        b1,
        BlockTrainDirection::TowardsB,
    ));

    let train = world.add_train("t");
    world.assign_train(b0, train);
    assert!(reserve_direct(
        &mut world,
        b0,
        BlockTrainDirection::TowardsB,
        b1,
        BlockTrainDirection::TowardsB,
    ));
    assert!(world
        .paths
        .iter()
        .any(|(_, p)| p.is_reserved() && p.reserved_by == Some(train)));
}

#[test]
fn departing_end_picks_the_right_train() {
    let (mut world, b0, b1) = line_world();
    let first = world.add_train("first");
    let last = world.add_train("last");
    world.assign_train(b0, first);
    world.assign_train(b0, last);

    assert!(reserve_direct(
        &mut world,
        b0,
        BlockTrainDirection::TowardsB,
        b1,
        BlockTrainDirection::TowardsB,
    ));
    let holder = world.paths.iter().find(|(_, p)| p.is_reserved()).and_then(|(_, p)| p.reserved_by);
    assert_eq!(holder, Some(last), "towards B departs with the rearmost train");
}
