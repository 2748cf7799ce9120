// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry-exit (NX) route selection.
//!
//! Pressing one button and then another reserves the unique path whose entry
//! and exit buttons match. The entry press is consumed on success; anything
//! else is a silent no-op.

use tracing::{debug, warn};

use crate::board::graph::NodeId;
use crate::board::tile::{Tile, TileKind, TileRef};
use crate::board::Board;
use crate::path::step::opposite_slot;
use crate::world::World;

/// Currently held entry buttons.
#[derive(Debug, Default)]
pub struct NxManager {
    pressed: Vec<TileRef>,
}

impl NxManager {
    pub fn pressed_buttons(&self) -> &[TileRef] {
        &self.pressed
    }
}

/// Input went high on an NX button.
pub fn pressed(world: &mut World, button: TileRef) {
    if !world.running {
        return;
    }
    let enabled = match world.board.tile(button).map(|t| &t.kind) {
        Some(TileKind::NxButton(b)) => b.enabled,
        _ => false,
    };
    if !enabled {
        return;
    }

    let held = world.nx.pressed.clone();
    for first in held {
        if select_path(world, first, button) {
            released(world, first);
            return;
        }
    }
    if !world.nx.pressed.contains(&button) {
        world.nx.pressed.push(button);
    }
}

/// Input went low on an NX button.
pub fn released(world: &mut World, button: TileRef) {
    world.nx.pressed.retain(|b| *b != button);
}

/// Reserve the unique path running from `from` to `to`, for the first train
/// in the entry block. Returns whether a reservation was made.
pub fn select_path(world: &mut World, from: TileRef, to: TileRef) -> bool {
    if from == to {
        return false;
    }
    let from_block = match world.board.tile(from).map(|t| &t.kind) {
        Some(TileKind::NxButton(b)) => b.block,
        _ => None,
    };
    let Some(from_block) = from_block else {
        return false;
    };
    let candidates = world
        .board
        .tile(from_block)
        .and_then(Tile::as_block)
        .map(|b| b.paths.clone())
        .unwrap_or_default();

    for path_id in candidates {
        let Some(path) = world.paths.get(path_id) else {
            continue;
        };
        if path.nx_button_from != Some(from) || path.nx_button_to != Some(to) {
            continue;
        }
        let train = world
            .board
            .tile(from_block)
            .and_then(Tile::as_block)
            .and_then(|b| b.trains.first().copied());
        let Some(train) = train else {
            debug!(
                from = %world.object_id(from),
                to = %world.object_id(to),
                "nx route found but entry block holds no train"
            );
            return false;
        };
        if crate::interlock::reserve(world, path_id, train, false) {
            debug!(
                from = %world.object_id(from),
                to = %world.object_id(to),
                "nx route reserved"
            );
            return true;
        }
        return false;
    }
    false
}

/// Resolve each NX button's owning block and enablement. Called after every
/// board change.
pub fn resolve_buttons(world: &mut World) {
    let buttons: Vec<TileRef> = world
        .board
        .tiles
        .iter()
        .filter(|(_, t)| matches!(t.kind, TileKind::NxButton(_)))
        .map(|(h, _)| h)
        .collect();

    for button in buttons {
        let Some(node) = world.board.node_of(button) else {
            continue;
        };
        let block_a = find_block(&world.board, node, 0);
        let block_b = find_block(&world.board, node, 1);
        let id = world.object_id(button);

        let block = match (block_a, block_b) {
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (Some(_), Some(_)) => {
                warn!(code = "W3001", id = %id, "nx button connected to two blocks");
                None
            }
            (None, None) => {
                warn!(code = "W3002", id = %id, "nx button not connected to any block");
                None
            }
        };

        if let Some(TileKind::NxButton(b)) = world.board.tile_mut(button).map(|t| &mut t.kind) {
            b.block = block;
            b.enabled = block.is_some();
        }
    }
}

/// Walk outward from a button slot until a block is found. Bridges are
/// transparent; anything else ends the walk.
fn find_block(board: &Board, node: NodeId, slot: usize) -> Option<TileRef> {
    let mut node = node;
    let mut link = board.graph.nodes.get(node)?.link(slot)?;
    loop {
        let end = board.graph.next_node(node, link)?;
        let tile_ref = board.node_tile(end.node)?;
        match board.tile(tile_ref).map(|t| &t.kind)? {
            TileKind::Block(_) => return Some(tile_ref),
            TileKind::Bridge45Left(_) | TileKind::Bridge45Right(_) | TileKind::Bridge90(_) => {
                node = end.node;
                link = board.graph.nodes.get(node)?.link(opposite_slot(end.slot))?;
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
#[path = "nx_tests.rs"]
mod tests;
