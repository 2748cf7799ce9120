// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output feedback: a command station reporting the actual value of an
//! output resolves, through the device output maps, back to the logical
//! state it represents. That match drives the anti-regression machinery for
//! locked turnouts and signals, and plain state tracking for decouplers.

use crate::board::tile::{TileKind, TileRef};
use crate::enums::{DecouplerState, TurnoutPosition};
use crate::interlock;
use crate::output::map::{OutputActionValue, OutputType};
use crate::signal::aspect::SignalAspect;
use crate::world::World;

enum Match {
    Turnout(TileRef, TurnoutPosition),
    Signal(TileRef, SignalAspect),
    Decoupler(TileRef, DecouplerState),
}

/// An output's actual value was observed on the wire. Every device whose
/// map contains a matching entry is updated.
pub fn observe_output(
    world: &mut World,
    output: OutputType,
    index: u16,
    value: OutputActionValue,
) {
    let mut matches = Vec::new();
    for (tile_ref, tile) in world.board.tiles.iter() {
        match &tile.kind {
            TileKind::Turnout(_, t) => {
                if let Some(position) = t.output_map.state_for_output(output, index, value) {
                    matches.push(Match::Turnout(tile_ref, position));
                }
            }
            TileKind::Signal(s) => {
                if let Some(aspect) = s.output_map.state_for_output(output, index, value) {
                    matches.push(Match::Signal(tile_ref, aspect));
                }
            }
            TileKind::Decoupler(d) => {
                if let Some(state) = d.output_map.state_for_output(output, index, value) {
                    matches.push(Match::Decoupler(tile_ref, state));
                }
            }
            _ => {}
        }
    }

    for matched in matches {
        match matched {
            Match::Turnout(tile, position) => {
                interlock::turnout_output_matched(world, tile, position);
            }
            Match::Signal(tile, aspect) => {
                interlock::signal_output_matched(world, tile, aspect);
            }
            Match::Decoupler(tile, state) => {
                if let Some(TileKind::Decoupler(d)) =
                    world.board.tile_mut(tile).map(|t| &mut t.kind)
                {
                    d.state = state;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
