// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aspect computation for the three signal flavours.
//!
//! All rules are pure functions over the board, the discovered paths and the
//! signal's look-ahead tree, so they are directly unit testable.

use crate::arena::Arena;
use crate::board::tile::{SignalKind, TileId, TileRef};
use crate::board::Board;
use crate::enums::{AutoYesNo, BlockSide, BlockState, SensorState, TurnoutPosition};
use crate::path::block_path::BlockPath;
use crate::path::signal_path::{
    block_state, next_block, next_block_or_signal, resolve_next, SignalPath, SpItem,
};
use crate::signal::aspect::{ita, ItalianAspect, SignalAspect};

/// Read-only state the rules need.
pub struct AspectContext<'a> {
    pub board: &'a Board,
    pub paths: &'a Arena<BlockPath>,
}

impl AspectContext<'_> {
    fn signal_reserved_path_to(&self, signal: TileRef, block: TileRef) -> bool {
        self.board
            .tile(signal)
            .and_then(|t| t.as_signal())
            .and_then(|s| s.reserved_path)
            .and_then(|p| self.paths.get(p))
            .is_some_and(|p| p.to_block == block)
    }

    fn block_path_reserved(&self, from: TileRef, from_side: BlockSide, to: TileRef) -> bool {
        self.board
            .tile(from)
            .and_then(|t| t.as_block())
            .and_then(|b| b.reserved_path(from_side))
            .and_then(|p| self.paths.get(p))
            .is_some_and(|p| p.to_block == to)
    }

    fn plain_aspect_of(&self, signal: TileRef) -> SignalAspect {
        self.board
            .tile(signal)
            .and_then(|t| t.as_signal())
            .map_or(SignalAspect::Unknown, |s| s.aspect)
    }
}

/// Whether the signal effectively demands a reservation before clearing.
pub fn requires_reservation(ctx: &AspectContext<'_>, signal: TileRef, sp: &SignalPath) -> bool {
    match ctx.board.tile(signal).and_then(|t| t.as_signal()).map(|s| s.require_reservation) {
        Some(AutoYesNo::Yes) => true,
        Some(AutoYesNo::No) => false,
        Some(AutoYesNo::Auto) => sp.auto_require_reservation,
        None => false,
    }
}

/// Full evaluation: the per-kind rule, pre-empted to Stop while a required
/// reservation is missing. Returns the plain aspect and, for Italian
/// signals, the composite one.
pub fn evaluate(
    ctx: &AspectContext<'_>,
    signal: TileRef,
    sp: &SignalPath,
) -> (SignalAspect, ItalianAspect) {
    let Some(tile) = ctx.board.tile(signal).and_then(|t| t.as_signal()) else {
        return (SignalAspect::Stop, ItalianAspect::VIA_IMPEDITA);
    };
    let must_stop = !tile.has_reserved_path() && requires_reservation(ctx, signal, sp)
        && !(tile.kind == SignalKind::Italian && tile.only_anticipate);
    match tile.kind {
        SignalKind::TwoAspect => {
            let aspect =
                if must_stop { SignalAspect::Stop } else { two_aspect(ctx, signal, sp) };
            (aspect, ItalianAspect::UNKNOWN)
        }
        SignalKind::ThreeAspect => {
            let aspect =
                if must_stop { SignalAspect::Stop } else { three_aspect(ctx, signal, sp) };
            (aspect, ItalianAspect::UNKNOWN)
        }
        SignalKind::Italian => {
            let composite = if must_stop {
                ItalianAspect::VIA_IMPEDITA
            } else {
                let raw = italian(ctx, signal, sp, tile.only_anticipate);
                if tile.only_anticipate {
                    anticipation_adjust(raw)
                } else {
                    raw
                }
            };
            (composite.to_plain(), composite)
        }
    }
}

/// 2-aspect: one block of look-ahead.
pub fn two_aspect(ctx: &AspectContext<'_>, signal: TileRef, sp: &SignalPath) -> SignalAspect {
    let require = requires_reservation(ctx, signal, sp);
    let Some(block_item) = next_block(sp.root.as_deref(), ctx.board) else {
        return SignalAspect::Stop;
    };
    let state = block_state(block_item, ctx.board);

    if !require && state == BlockState::Free {
        return SignalAspect::Proceed;
    }
    if state == BlockState::Reserved {
        if let SpItem::Block { tile, .. } = block_item {
            if ctx.signal_reserved_path_to(signal, *tile) {
                return SignalAspect::Proceed;
            }
        }
    }
    SignalAspect::Stop
}

/// 3-aspect: two blocks of look-ahead, or the next signal when one appears
/// before the second block.
pub fn three_aspect(ctx: &AspectContext<'_>, signal: TileRef, sp: &SignalPath) -> SignalAspect {
    let require = requires_reservation(ctx, signal, sp);
    let Some(block_item) = next_block(sp.root.as_deref(), ctx.board) else {
        return SignalAspect::Stop;
    };
    let SpItem::Block { tile: first_block, enter_side, .. } = block_item else {
        return SignalAspect::Stop;
    };
    let state = block_state(block_item, ctx.board);

    let cleared = (!require && state == BlockState::Free)
        || (state == BlockState::Reserved && ctx.signal_reserved_path_to(signal, *first_block));
    if !cleared {
        return SignalAspect::Stop;
    }

    let (second_block, next_signal) =
        next_block_or_signal(resolve_next(block_item, ctx.board), ctx.board);
    if let Some(second) = second_block {
        let state2 = block_state(second, ctx.board);
        if let SpItem::Block { tile: second_tile, .. } = second {
            if state2 == BlockState::Free
                || (state2 == BlockState::Reserved
                    && ctx.block_path_reserved(*first_block, enter_side.opposite(), *second_tile))
            {
                return SignalAspect::Proceed;
            }
        }
    } else if let Some(SpItem::Signal { tile, .. }) = next_signal {
        match ctx.plain_aspect_of(*tile) {
            SignalAspect::Proceed | SignalAspect::ProceedReducedSpeed => {
                return SignalAspect::Proceed;
            }
            SignalAspect::Stop | SignalAspect::Unknown => {}
        }
    } else if state == BlockState::Reserved {
        // Nothing to look at beyond a block reserved for us: the route is
        // set and locked all the way, no distant restriction applies.
        return SignalAspect::Proceed;
    }
    SignalAspect::ProceedReducedSpeed
}

/// Maximum speed over a turnout in its current position, 0 = unrestricted.
/// The second value reports a non-straight route.
fn turnout_max_speed(ctx: &AspectContext<'_>, turnout: TileRef) -> (i32, bool) {
    let Some(tile) = ctx.board.tile(turnout) else {
        return (0, false);
    };
    let Some(state) = tile.as_turnout() else {
        return (0, false);
    };
    match tile.tile_id() {
        TileId::RailTurnoutLeft45
        | TileId::RailTurnoutRight45
        | TileId::RailTurnoutLeft90
        | TileId::RailTurnoutRight90
        | TileId::RailTurnoutLeftCurved
        | TileId::RailTurnoutRightCurved => {
            if state.position != TurnoutPosition::Straight {
                (60, true)
            } else {
                (0, false)
            }
        }
        // A wye never has a straight route.
        TileId::RailTurnoutWye => (100, true),
        TileId::RailTurnout3Way => {
            if state.position != TurnoutPosition::Straight {
                (30, true)
            } else {
                (0, false)
            }
        }
        TileId::RailTurnoutSingleSlip | TileId::RailTurnoutDoubleSlip => {
            if matches!(state.position, TurnoutPosition::Left | TurnoutPosition::Right) {
                (30, true)
            } else {
                (0, false)
            }
        }
        _ => (0, false),
    }
}

/// Minimum turnout speed along the path up to the next signal.
fn path_max_speed(ctx: &AspectContext<'_>, sp: &SignalPath) -> (i32, bool) {
    let mut max_speed = 0;
    let mut deviata = false;
    let mut item = sp.root.as_deref();
    while let Some(current) = item {
        match current {
            SpItem::Turnout { tile, .. } => {
                let (speed, non_straight) = turnout_max_speed(ctx, *tile);
                if max_speed == 0 || (speed > 0 && speed < max_speed) {
                    max_speed = speed;
                }
                deviata |= non_straight;
            }
            SpItem::Signal { .. } => break,
            _ => {}
        }
        item = resolve_next(current, ctx.board);
    }
    (max_speed, deviata)
}

fn riduzione_bits(speed: i32) -> u8 {
    if speed <= 0 {
        0
    } else if speed < 60 {
        ita::RIDUZIONE_30
    } else if speed < 100 {
        ita::RIDUZIONE_60
    } else {
        ita::RIDUZIONE_100
    }
}

/// Italian multi-aspect rule.
pub fn italian(
    ctx: &AspectContext<'_>,
    signal: TileRef,
    sp: &SignalPath,
    anticipation_only: bool,
) -> ItalianAspect {
    let require = requires_reservation(ctx, signal, sp);

    let Some(block_item) = next_block(sp.root.as_deref(), ctx.board) else {
        return ItalianAspect::VIA_IMPEDITA;
    };
    let SpItem::Block { tile: first_block, enter_side, .. } = block_item else {
        return ItalianAspect::VIA_IMPEDITA;
    };
    let state = block_state(block_item, ctx.board);

    let (mut second_block, mut next_signal) =
        next_block_or_signal(resolve_next(block_item, ctx.board), ctx.board);

    if anticipation_only {
        // Anticipation-only signals mirror the next main signal; prefer a
        // signal found before the next block.
        let (_, before_block) = next_block_or_signal(sp.root.as_deref(), ctx.board);
        if let Some(SpItem::Signal { tile, .. }) = before_block {
            let is_italian = ctx
                .board
                .tile(*tile)
                .and_then(|t| t.as_signal())
                .is_some_and(|s| s.kind == SignalKind::Italian);
            if is_italian {
                next_signal = before_block;
                second_block = None;
            }
        }
    }

    let (speed, _deviata) = path_max_speed(ctx, sp);
    let mut riduzione = riduzione_bits(speed);

    if !anticipation_only
        && state == BlockState::Occupied
        && (!require || ctx.signal_reserved_path_to(signal, *first_block))
    {
        // Next block occupied: only a partially occupied block (clear on the
        // entry side) may show the short-track aspect.
        let Some(block) = ctx.board.tile(*first_block).and_then(|t| t.as_block()) else {
            return ItalianAspect::VIA_IMPEDITA;
        };
        if block.input_map.len() < 2 {
            return ItalianAspect::VIA_IMPEDITA;
        }
        let sensor = match enter_side {
            BlockSide::A => block.input_map.first(),
            BlockSide::B => block.input_map.last(),
        };
        if sensor.map(|s| s.value) != Some(SensorState::Free) {
            return ItalianAspect::VIA_IMPEDITA;
        }
        if require {
            // Station entrance: red over the short-track marker.
            return ItalianAspect::BINARIO_INGOMBRO_TRONCO_DEVIATO;
        }
        return ItalianAspect::BINARIO_INGOMBRO_TRONCO;
    }

    let cleared = anticipation_only
        || (!require && state == BlockState::Free)
        || (state == BlockState::Reserved && ctx.signal_reserved_path_to(signal, *first_block));
    if !cleared {
        return ItalianAspect::VIA_IMPEDITA;
    }

    if let (Some(second), false) = (second_block, anticipation_only) {
        let state2 = block_state(second, ctx.board);
        if let SpItem::Block { tile: second_tile, .. } = second {
            if state2 == BlockState::Free
                || (state2 == BlockState::Reserved
                    && ctx.block_path_reserved(*first_block, enter_side.opposite(), *second_tile))
            {
                return ItalianAspect(ita::VIA_LIBERA | riduzione);
            }
        }
    } else if let Some(SpItem::Signal { tile, .. }) = next_signal {
        let neighbour = ctx.board.tile(*tile).and_then(|t| t.as_signal());
        if let Some(neighbour) = neighbour {
            if neighbour.kind == SignalKind::Italian {
                let next_aspect = neighbour.aspect_ita;
                if next_aspect.is_stop() {
                    // No 100 km/h reduction ahead of a stop aspect.
                    if riduzione == ita::RIDUZIONE_100 {
                        riduzione = ita::RIDUZIONE_60;
                    }
                    return ItalianAspect(ita::AVVISO_VIA_IMPEDITA | riduzione);
                }
                let avviso = ItalianAspect::riduzione_to_avviso(next_aspect.riduzione());
                return ItalianAspect(ita::VIA_LIBERA | avviso | riduzione);
            }
            // Non-Italian neighbour: collapse to the plain proceed family.
            match neighbour.aspect {
                SignalAspect::Proceed | SignalAspect::ProceedReducedSpeed => {
                    return ItalianAspect::VIA_LIBERA;
                }
                SignalAspect::Stop | SignalAspect::Unknown => {}
            }
        }
    }
    ItalianAspect::VIA_LIBERA_AVVISO_VIA_IMPEDITA
}

/// Anticipation-only signals never show stop or their own reductions; they
/// repeat what the next main signal announces.
pub fn anticipation_adjust(value: ItalianAspect) -> ItalianAspect {
    let partially_occupied =
        value.bits() & ita::BINARIO_INGOMBRO_TRONCO == ita::BINARIO_INGOMBRO_TRONCO;
    if value == ItalianAspect::VIA_IMPEDITA || partially_occupied {
        return ItalianAspect::VIA_LIBERA_AVVISO_VIA_IMPEDITA;
    }
    value.without(ita::RIDUZIONE_MASK).without(ita::DEVIATA)
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
