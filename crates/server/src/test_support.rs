// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board-building helpers shared by unit and end-to-end tests.
//!
//! The convention throughout: layouts grow downwards (south) from `(0, 0)`,
//! tiles rotated `Deg0` face north, so a vertical run reads top-to-bottom in
//! the source.

use crate::board::tile::{
    BlockTile, DecouplerTile, DirectionControlTile, LinkTile, NxButtonTile, SignalKind,
    SignalTile, Tile, TileId, TileKind, TileRef, TileRotate, TurnoutTile,
};
use crate::world::World;

pub fn add(world: &mut World, tile: Tile) -> TileRef {
    match world.add_tile(tile) {
        Ok(r) => r,
        Err(e) => unreachable!("add_tile failed in test setup: {e}"),
    }
}

pub fn block(world: &mut World, id: &str, x: i16, y: i16) -> TileRef {
    add(world, Tile::new(id, x, y, TileRotate::Deg0, TileKind::Block(BlockTile::new())))
}

pub fn block_rotated(world: &mut World, id: &str, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(world, Tile::new(id, x, y, rotate, TileKind::Block(BlockTile::new())))
}

pub fn straight(world: &mut World, x: i16, y: i16) -> TileRef {
    add(world, Tile::new("", x, y, TileRotate::Deg0, TileKind::Straight))
}

pub fn buffer_stop(world: &mut World, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(world, Tile::new("", x, y, rotate, TileKind::BufferStop))
}

pub fn one_way(world: &mut World, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(world, Tile::new("", x, y, rotate, TileKind::OneWay))
}

pub fn signal2(world: &mut World, id: &str, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(
        world,
        Tile::new(id, x, y, rotate, TileKind::Signal(SignalTile::new(SignalKind::TwoAspect))),
    )
}

pub fn signal3(world: &mut World, id: &str, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(
        world,
        Tile::new(id, x, y, rotate, TileKind::Signal(SignalTile::new(SignalKind::ThreeAspect))),
    )
}

pub fn signal_ita(world: &mut World, id: &str, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(
        world,
        Tile::new(id, x, y, rotate, TileKind::Signal(SignalTile::new(SignalKind::Italian))),
    )
}

pub fn turnout(
    world: &mut World,
    id: &str,
    tile_id: TileId,
    x: i16,
    y: i16,
    rotate: TileRotate,
) -> TileRef {
    add(world, Tile::new(id, x, y, rotate, TileKind::Turnout(tile_id, TurnoutTile::new())))
}

pub fn turnout_left45(world: &mut World, id: &str, x: i16, y: i16) -> TileRef {
    turnout(world, id, TileId::RailTurnoutLeft45, x, y, TileRotate::Deg0)
}

pub fn direction_control(world: &mut World, id: &str, x: i16, y: i16) -> TileRef {
    add(
        world,
        Tile::new(
            id,
            x,
            y,
            TileRotate::Deg0,
            TileKind::DirectionControl(DirectionControlTile::new()),
        ),
    )
}

pub fn decoupler(world: &mut World, id: &str, x: i16, y: i16) -> TileRef {
    add(world, Tile::new(id, x, y, TileRotate::Deg0, TileKind::Decoupler(DecouplerTile::new())))
}

pub fn nx_button(world: &mut World, id: &str, x: i16, y: i16) -> TileRef {
    add(world, Tile::new(id, x, y, TileRotate::Deg0, TileKind::NxButton(NxButtonTile::default())))
}

pub fn link_tile(world: &mut World, id: &str, x: i16, y: i16, rotate: TileRotate) -> TileRef {
    add(world, Tile::new(id, x, y, rotate, TileKind::Link(LinkTile::default())))
}

pub fn bridge90(world: &mut World, x: i16, y: i16) -> TileRef {
    add(world, Tile::new("", x, y, TileRotate::Deg0, TileKind::Bridge90(Default::default())))
}

pub fn cross90(world: &mut World, x: i16, y: i16) -> TileRef {
    add(
        world,
        Tile::new(
            "",
            x,
            y,
            TileRotate::Deg0,
            TileKind::Cross90(crate::board::tile::CrossTile::new()),
        ),
    )
}

/// Bind two link tiles to each other.
pub fn pair_links(world: &mut World, a: TileRef, b: TileRef) {
    if let Some(TileKind::Link(l)) = world.board.tile_mut(a).map(|t| &mut t.kind) {
        l.pair = Some(b);
    }
    if let Some(TileKind::Link(l)) = world.board.tile_mut(b).map(|t| &mut t.kind) {
        l.pair = Some(a);
    }
}

/// `B0 — S(3-aspect) — B1 — B2`, vertical. Returns `(b0, s, b1, b2)`.
pub fn straight_line_with_distant_signal(world: &mut World) -> (TileRef, TileRef, TileRef, TileRef) {
    let b0 = block(world, "b0", 0, 0);
    let s = signal3(world, "s", 0, 1, TileRotate::Deg0);
    let b1 = block(world, "b1", 0, 2);
    let b2 = block(world, "b2", 0, 3);
    world.board_modified();
    (b0, s, b1, b2)
}

/// `B0 — S(2-aspect) — T(left45) — B1 (straight) / B2 (left)`. Returns
/// `(b0, s, t, b1, b2)`.
pub fn turnout_layout(world: &mut World) -> (TileRef, TileRef, TileRef, TileRef, TileRef) {
    let b0 = block(world, "b0", 0, 0);
    let s = signal2(world, "s", 0, 1, TileRotate::Deg0);
    let t = turnout_left45(world, "t", 0, 2);
    let b1 = block(world, "b1", 0, 3);
    let b2 = block_rotated(world, "b2", 1, 3, TileRotate::Deg315);
    world.board_modified();
    (b0, s, t, b1, b2)
}

/// Find the path id from one block to another.
pub fn path_between(
    world: &World,
    from: TileRef,
    to: TileRef,
) -> Option<crate::path::block_path::PathId> {
    let block = world.board.tile(from)?.as_block()?;
    block
        .paths
        .iter()
        .copied()
        .find(|p| world.paths.get(*p).is_some_and(|p| p.to_block == to))
}
