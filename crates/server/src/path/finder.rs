// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Train path finder: resolve a block-to-block request into the matching
//! discovered path and reserve it for the train standing in the origin
//! block. Scripts and the NX layer both route through this.

use crate::board::tile::{Tile, TileRef};
use crate::enums::{BlockSide, BlockTrainDirection};
use crate::path::block_path::PathId;
use crate::world::World;

/// Find the unique direct path `from` (leaving towards `from_direction`) to
/// `to` (arriving so the train travels `to_direction`).
pub fn find_direct(
    world: &World,
    from: TileRef,
    from_direction: BlockTrainDirection,
    to: TileRef,
    to_direction: BlockTrainDirection,
) -> Option<PathId> {
    let from_side = match from_direction {
        BlockTrainDirection::TowardsA => BlockSide::A,
        BlockTrainDirection::TowardsB => BlockSide::B,
    };
    // Arriving "towards B" means entering on side A, and vice versa.
    let to_side = match to_direction {
        BlockTrainDirection::TowardsB => BlockSide::A,
        BlockTrainDirection::TowardsA => BlockSide::B,
    };

    let block = world.board.tile(from)?.as_block()?;
    block.paths.iter().copied().find(|id| {
        world
            .paths
            .get(*id)
            .is_some_and(|p| p.from_side == from_side && p.to_block == to && p.to_side == to_side)
    })
}

/// Reserve a direct path for the train occupying the origin block. The train
/// at the departing end is chosen: leaving towards B takes the last train in
/// the block, towards A the first.
pub fn reserve_direct(
    world: &mut World,
    from: TileRef,
    from_direction: BlockTrainDirection,
    to: TileRef,
    to_direction: BlockTrainDirection,
) -> bool {
    let Some(path) = find_direct(world, from, from_direction, to, to_direction) else {
        return false;
    };
    let train = {
        let Some(block) = world.board.tile(from).and_then(Tile::as_block) else {
            return false;
        };
        let picked = match from_direction {
            BlockTrainDirection::TowardsB => block.trains.last(),
            BlockTrainDirection::TowardsA => block.trains.first(),
        };
        match picked {
            Some(train) => *train,
            None => return false,
        }
    };
    crate::interlock::reserve(world, path, train, false)
}

#[cfg(test)]
#[path = "finder_tests.rs"]
mod tests;
