// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tile traversal rules shared by the block-path and signal-path engines.
//!
//! For turnouts, entering through a given node slot yields the legal
//! `(position, exit slot)` pairs. Bridges and crossings always exit on the
//! opposite connector of the 4-slot node (`slot ^ 2`).

use crate::board::tile::TileId;
use crate::enums::TurnoutPosition;

/// One legal way through a turnout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnoutHop {
    pub position: TurnoutPosition,
    pub exit_slot: usize,
}

const fn hop(position: TurnoutPosition, exit_slot: usize) -> TurnoutHop {
    TurnoutHop { position, exit_slot }
}

use TurnoutPosition::{DoubleSlipStraightA, DoubleSlipStraightB, Left, Right, Straight};

/// Legal `(position, exit)` pairs when entering `tile_id` via `entry_slot`.
///
/// Slot layouts:
/// ```text
///   left:   1  2     right:  1  2     wye:  1     2     3-way:  1  2  3
///            \ |             | /            \   /               \ | /
///             \|             |/              \ /                 \|/
///              0             0                0                   0
///
///   slip:      2
///              |\
///          1 --+-- 3     (single slip omits the 2-3 curve)
///             \|
///              0
/// ```
pub fn turnout_hops(tile_id: TileId, entry_slot: usize) -> &'static [TurnoutHop] {
    match tile_id {
        TileId::RailTurnoutLeft45 | TileId::RailTurnoutLeft90 | TileId::RailTurnoutLeftCurved => {
            match entry_slot {
                0 => &[TurnoutHop { position: Left, exit_slot: 1 }, TurnoutHop { position: Straight, exit_slot: 2 }],
                1 => &[TurnoutHop { position: Left, exit_slot: 0 }],
                2 => &[TurnoutHop { position: Straight, exit_slot: 0 }],
                _ => &[],
            }
        }
        TileId::RailTurnoutRight45
        | TileId::RailTurnoutRight90
        | TileId::RailTurnoutRightCurved => match entry_slot {
            0 => &[TurnoutHop { position: Straight, exit_slot: 1 }, TurnoutHop { position: Right, exit_slot: 2 }],
            1 => &[TurnoutHop { position: Straight, exit_slot: 0 }],
            2 => &[TurnoutHop { position: Right, exit_slot: 0 }],
            _ => &[],
        },
        TileId::RailTurnoutWye => match entry_slot {
            0 => &[TurnoutHop { position: Left, exit_slot: 1 }, TurnoutHop { position: Right, exit_slot: 2 }],
            1 => &[TurnoutHop { position: Left, exit_slot: 0 }],
            2 => &[TurnoutHop { position: Right, exit_slot: 0 }],
            _ => &[],
        },
        TileId::RailTurnout3Way => match entry_slot {
            0 => &[TurnoutHop { position: Left, exit_slot: 1 }, TurnoutHop { position: Straight, exit_slot: 2 }, TurnoutHop { position: Right, exit_slot: 3 }],
            1 => &[TurnoutHop { position: Left, exit_slot: 0 }],
            2 => &[TurnoutHop { position: Straight, exit_slot: 0 }],
            3 => &[TurnoutHop { position: Right, exit_slot: 0 }],
            _ => &[],
        },
        TileId::RailTurnoutDoubleSlip => match entry_slot {
            0 => &[TurnoutHop { position: DoubleSlipStraightA, exit_slot: 2 }, TurnoutHop { position: Left, exit_slot: 1 }],
            1 => &[TurnoutHop { position: DoubleSlipStraightA, exit_slot: 3 }, TurnoutHop { position: Left, exit_slot: 0 }],
            2 => &[TurnoutHop { position: DoubleSlipStraightB, exit_slot: 0 }, TurnoutHop { position: Right, exit_slot: 3 }],
            3 => &[TurnoutHop { position: DoubleSlipStraightB, exit_slot: 1 }, TurnoutHop { position: Right, exit_slot: 2 }],
            _ => &[],
        },
        TileId::RailTurnoutSingleSlip => match entry_slot {
            0 => &[TurnoutHop { position: DoubleSlipStraightA, exit_slot: 2 }, TurnoutHop { position: Left, exit_slot: 1 }],
            1 => &[TurnoutHop { position: DoubleSlipStraightA, exit_slot: 3 }, TurnoutHop { position: Left, exit_slot: 0 }],
            2 => &[TurnoutHop { position: DoubleSlipStraightB, exit_slot: 0 }],
            3 => &[TurnoutHop { position: DoubleSlipStraightB, exit_slot: 1 }],
            _ => &[],
        },
        _ => &[],
    }
}

/// Exit slot of a 4-connector bridge or crossing.
pub fn opposite_slot(entry_slot: usize) -> usize {
    (entry_slot + 2) % 4
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
