// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interlocking: atomic reservation of block paths, lock propagation to
//! every device along the route, delayed release, and the anti-regression
//! reaction when a locked device changes under external control.

pub mod nx;
pub mod regress;

use std::time::Duration;

use tracing::{error, info, warn};

use crate::board::tile::{Tile, TileKind, TileRef};
use crate::enums::{BlockState, ExtOutputChangeAction, TurnoutPosition};
use crate::path::block_path::PathId;
use crate::signal::aspect::SignalAspect;
use crate::train::TrainId;
use crate::world::World;

use self::regress::RegressCheck;

/// Reserve `path` for `train`. Atomic: the dry-run pass must fully succeed
/// before any state changes; with `dry_run` set nothing is committed.
pub fn reserve(world: &mut World, path: PathId, train: TrainId, dry_run: bool) -> bool {
    let Some(p) = world.paths.get(path) else {
        return false;
    };
    let turnouts = p.turnouts.clone();
    let direction_controls = p.direction_controls.clone();
    let crossings = p.crossings.clone();
    let bridges = p.bridges.clone();
    let signals = p.signals.clone();
    let (from_block, from_side) = (p.from_block, p.from_side);
    let (to_block, to_side) = (p.to_block, p.to_side);

    if p.is_reserved() {
        return false;
    }

    // Validation pass: every participant must accept.
    for (tile, position) in &turnouts {
        let Some(t) = world.board.tile(*tile) else {
            return false;
        };
        if !crate::board::tile::valid_positions(t.tile_id()).contains(position) {
            return false;
        }
        let Some(state) = t.as_turnout() else {
            return false;
        };
        // Already locked, even for the same position: rejected.
        if state.reserved.is_some() {
            return false;
        }
    }
    for (tile, _) in &direction_controls {
        match world.board.tile(*tile).map(|t| &t.kind) {
            Some(TileKind::DirectionControl(dc)) => {
                if dc.reserved.is_some() {
                    return false;
                }
            }
            _ => return false,
        }
    }
    for (tile, _) in &crossings {
        match world.board.tile(*tile).map(|t| &t.kind) {
            Some(TileKind::Cross45(c) | TileKind::Cross90(c)) => {
                if c.reserved.is_some() {
                    return false;
                }
            }
            _ => return false,
        }
    }
    let side_free = |block: TileRef, side: crate::enums::BlockSide| {
        world
            .board
            .tile(block)
            .and_then(Tile::as_block)
            .is_some_and(|b| b.reserved_path(side).is_none())
    };
    if !side_free(from_block, from_side) || !side_free(to_block, to_side) {
        return false;
    }

    if dry_run {
        return true;
    }

    // Commit.
    for (tile, position) in &turnouts {
        world.do_set_position(*tile, *position, false);
        if let Some(state) = world.board.tile_mut(*tile).and_then(Tile::as_turnout_mut) {
            state.reserved = Some((path, *position));
        }
    }
    for (tile, state) in &direction_controls {
        if let Some(TileKind::DirectionControl(dc)) =
            world.board.tile_mut(*tile).map(|t| &mut t.kind)
        {
            dc.reserved = Some((path, *state));
        }
    }
    for (tile, state) in &crossings {
        if let Some(TileKind::Cross45(c) | TileKind::Cross90(c)) =
            world.board.tile_mut(*tile).map(|t| &mut t.kind)
        {
            c.reserved = Some((path, *state));
        }
    }
    for (tile, track) in &bridges {
        if let Some(
            TileKind::Bridge45Left(b) | TileKind::Bridge45Right(b) | TileKind::Bridge90(b),
        ) = world.board.tile_mut(*tile).map(|t| &mut t.kind)
        {
            b.reserved.push((path, *track));
        }
    }

    if let Some(b) = world.board.tile_mut(from_block).and_then(Tile::as_block_mut) {
        b.reserved[from_side.index()] = Some(path);
    }
    if let Some(b) = world.board.tile_mut(to_block).and_then(Tile::as_block_mut) {
        b.reserved[to_side.index()] = Some(path);
    }
    world.update_block_state(from_block);
    world.update_block_state(to_block);

    for signal in &signals {
        if let Some(s) = world.board.tile_mut(*signal).and_then(Tile::as_signal_mut) {
            s.reserved_path = Some(path);
        }
        world.evaluate_signal(*signal);
    }

    if let Some(p) = world.paths.get_mut(path) {
        p.reserved_by = Some(train);
        p.release_generation += 1;
    }
    info!(
        from = %world.object_id(from_block),
        to = %world.object_id(to_block),
        "path reserved"
    );
    true
}

/// Release a reserved path. The dry run fails while the destination block is
/// still sensed occupied.
pub fn release(world: &mut World, path: PathId, dry_run: bool) -> bool {
    let Some(p) = world.paths.get(path) else {
        return false;
    };
    if !p.is_reserved() {
        return false;
    }
    let turnouts = p.turnouts.clone();
    let direction_controls = p.direction_controls.clone();
    let crossings = p.crossings.clone();
    let bridges = p.bridges.clone();
    let signals = p.signals.clone();
    let (from_block, from_side) = (p.from_block, p.from_side);
    let (to_block, to_side) = (p.to_block, p.to_side);

    let to_occupied = world
        .board
        .tile(to_block)
        .and_then(Tile::as_block)
        .is_some_and(|b| b.state == BlockState::Occupied);
    if to_occupied {
        return false;
    }

    if dry_run {
        return true;
    }

    for (tile, _) in &turnouts {
        if let Some(state) = world.board.tile_mut(*tile).and_then(Tile::as_turnout_mut) {
            if state.reserved.map(|(p, _)| p) == Some(path) {
                state.reserved = None;
                state.retry.reset();
            }
        }
    }
    for (tile, _) in &direction_controls {
        if let Some(TileKind::DirectionControl(dc)) =
            world.board.tile_mut(*tile).map(|t| &mut t.kind)
        {
            if dc.reserved.map(|(p, _)| p) == Some(path) {
                dc.reserved = None;
            }
        }
    }
    for (tile, _) in &crossings {
        if let Some(TileKind::Cross45(c) | TileKind::Cross90(c)) =
            world.board.tile_mut(*tile).map(|t| &mut t.kind)
        {
            if c.reserved.map(|(p, _)| p) == Some(path) {
                c.reserved = None;
            }
        }
    }
    for (tile, _) in &bridges {
        if let Some(
            TileKind::Bridge45Left(b) | TileKind::Bridge45Right(b) | TileKind::Bridge90(b),
        ) = world.board.tile_mut(*tile).map(|t| &mut t.kind)
        {
            b.reserved.retain(|(p, _)| *p != path);
        }
    }

    let clear_side = |world: &mut World, block: TileRef, side: crate::enums::BlockSide| {
        if let Some(b) = world.board.tile_mut(block).and_then(Tile::as_block_mut) {
            if b.reserved[side.index()] == Some(path) {
                b.reserved[side.index()] = None;
            }
        }
    };
    clear_side(world, from_block, from_side);
    clear_side(world, to_block, to_side);
    world.update_block_state(from_block);
    world.update_block_state(to_block);

    for signal in &signals {
        if let Some(s) = world.board.tile_mut(*signal).and_then(Tile::as_signal_mut) {
            if s.reserved_path == Some(path) {
                s.reserved_path = None;
            }
        }
        world.evaluate_signal(*signal);
    }

    if let Some(p) = world.paths.get_mut(path) {
        p.reserved_by = None;
        p.release_generation += 1;
    }
    true
}

/// Schedule a single-shot release on the event loop. A reservation change in
/// between invalidates the timer.
pub fn delayed_release(world: &mut World, path: PathId, timeout_millis: u64) -> bool {
    let Some(p) = world.paths.get(path) else {
        return false;
    };
    if !p.is_reserved() {
        return false;
    }
    let generation = p.release_generation;
    let Some(handle) = world.handle.clone() else {
        return false;
    };
    handle.call_later(Duration::from_millis(timeout_millis), move |world, _host| {
        let still_current = world
            .paths
            .get(path)
            .is_some_and(|p| p.is_reserved() && p.release_generation == generation);
        if still_current {
            release(world, path, false);
        }
    });
    true
}

/// Feedback: the hardware reports a turnout output now matching `position`.
/// Restores the reserved position of a locked turnout, with escalation when
/// the retry budget is exhausted.
pub fn turnout_output_matched(world: &mut World, turnout: TileRef, position: TurnoutPosition) {
    let before = world.board.tile(turnout).and_then(Tile::as_turnout).map(|t| t.position);
    if !world.do_set_position(turnout, position, true) || before == Some(position) {
        return;
    }
    let Some(state) = world.board.tile(turnout).and_then(Tile::as_turnout) else {
        return;
    };
    let Some((path, reserved_position)) = state.reserved else {
        return;
    };
    if reserved_position == position {
        return;
    }

    let id = world.object_id(turnout);
    warn!(code = "W3003", id = %id, "locked turnout changed externally");

    if world.options.correct_output_pos_when_locked {
        let check = world
            .board
            .tile_mut(turnout)
            .and_then(Tile::as_turnout_mut)
            .map(|t| t.retry.register());
        if let Some(RegressCheck::Correct { attempt }) = check {
            world.do_set_position(turnout, reserved_position, false);
            info!(code = "N3003", id = %id, attempt, "turnout reset to reserved position");
            return;
        }
    }
    escalate(world, path, &id, DeviceKind::Turnout);
}

/// Feedback: the hardware reports a signal output now matching `aspect`.
pub fn signal_output_matched(world: &mut World, signal: TileRef, aspect: SignalAspect) {
    let before = world.board.tile(signal).and_then(Tile::as_signal).map(|s| s.aspect);
    if before == Some(aspect) {
        return;
    }
    let ita = world
        .board
        .tile(signal)
        .and_then(Tile::as_signal)
        .map_or(crate::signal::aspect::ItalianAspect::UNKNOWN, |s| s.aspect_ita);
    if !world.set_aspect(signal, aspect, ita, true) {
        return;
    }
    let Some(state) = world.board.tile(signal).and_then(Tile::as_signal) else {
        return;
    };
    let Some(path) = state.reserved_path else {
        return;
    };

    let id = world.object_id(signal);
    warn!(code = "W3004", id = %id, "locked signal changed externally");

    if world.options.correct_output_pos_when_locked {
        let check = world
            .board
            .tile_mut(signal)
            .and_then(Tile::as_signal_mut)
            .map(|s| s.retry.register());
        if let Some(RegressCheck::Correct { attempt }) = check {
            world.evaluate_signal(signal);
            info!(code = "N3004", id = %id, attempt, "signal reset to reserved aspect");
            return;
        }
    }
    escalate(world, path, &id, DeviceKind::Signal);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Turnout,
    Signal,
}

/// Retry budget exhausted: act per the configured policy.
fn escalate(world: &mut World, path: PathId, device_id: &str, kind: DeviceKind) {
    match world.options.ext_output_change_action {
        ExtOutputChangeAction::DoNothing => {}
        ExtOutputChangeAction::EmergencyStopTrain => {
            let Some(p) = world.paths.get(path) else {
                return;
            };
            let (from_block, to_block) = (p.from_block, p.to_block);
            let mut trains: Vec<TrainId> = Vec::new();
            for block in [from_block, to_block] {
                if let Some(b) = world.board.tile(block).and_then(Tile::as_block) {
                    for train in &b.trains {
                        if !trains.contains(train) {
                            trains.push(*train);
                        }
                    }
                }
            }
            for train in trains {
                world.emergency_stop_train(train);
                let code = match kind {
                    DeviceKind::Turnout => "E3003",
                    DeviceKind::Signal => "E3004",
                };
                error!(code, device = %device_id, "train stopped, locked device changed");
            }
        }
        ExtOutputChangeAction::EmergencyStopWorld => {
            world.stop();
            let code = match kind {
                DeviceKind::Turnout => "E3007",
                DeviceKind::Signal => "E3008",
            };
            error!(code, device = %device_id, "world stopped, locked device changed");
        }
        ExtOutputChangeAction::PowerOffWorld => {
            world.power_off();
            let code = match kind {
                DeviceKind::Turnout => "E3009",
                DeviceKind::Signal => "E3010",
            };
            error!(code, device = %device_id, "world power off, locked device changed");
        }
    }
}

#[cfg(test)]
#[path = "interlock_tests.rs"]
mod tests;
