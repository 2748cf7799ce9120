// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-signal look-ahead tree.
//!
//! Rooted at a signal, the tree describes what lies up to `blocks_ahead`
//! blocks in front of it, through every reachable turnout branch. Every
//! addressable device visited during construction is recorded as a
//! subscription; the world re-evaluates the signal whenever one of them
//! changes.

use std::collections::BTreeMap;

use crate::board::graph::{LinkId, NodeId};
use crate::board::tile::{TileKind, TileRef};
use crate::board::Board;
use crate::enums::{BlockSide, BlockState, DirectionControlState, TurnoutPosition};
use crate::path::step::{opposite_slot, turnout_hops};

/// Interior node of the look-ahead tree.
#[derive(Debug)]
pub enum SpItem {
    Block {
        tile: TileRef,
        enter_side: BlockSide,
        next: Option<Box<SpItem>>,
    },
    Signal {
        tile: TileRef,
        next: Option<Box<SpItem>>,
    },
    Turnout {
        tile: TileRef,
        branches: BTreeMap<TurnoutPosition, Option<Box<SpItem>>>,
    },
    DirectionControl {
        tile: TileRef,
        /// Travel direction this branch represents; the subtree is reachable
        /// only while the device permits it.
        open_state: DirectionControlState,
        next: Option<Box<SpItem>>,
    },
}

/// The tree plus its subscription set.
#[derive(Debug, Default)]
pub struct SignalPath {
    pub root: Option<Box<SpItem>>,
    /// Derived: a turnout lies between the signal and the first block.
    pub auto_require_reservation: bool,
    /// Devices whose changes must re-evaluate the owning signal.
    pub subscriptions: Vec<TileRef>,
}

impl SignalPath {
    /// Build the look-ahead tree for `signal`.
    pub fn build(board: &Board, signal: TileRef, blocks_ahead: usize) -> Self {
        let mut path = SignalPath::default();
        let Some(signal_node) = board.node_of(signal) else {
            return path;
        };
        if blocks_ahead > 0 {
            if let Some(link) = board.graph.nodes.get(signal_node).and_then(|n| n.link(1)) {
                path.root =
                    find_blocks(board, signal_node, link, blocks_ahead, signal_node, &mut path.subscriptions);
            }
        }

        // Require a reserved path when a turnout lies before the next block.
        let mut item = path.root.as_deref();
        while let Some(current) = item {
            match current {
                SpItem::Block { .. } => break,
                SpItem::Turnout { .. } => {
                    path.auto_require_reservation = true;
                    break;
                }
                _ => item = resolve_next(current, board),
            }
        }
        path
    }
}

/// Step over `item` following the device's current state.
pub fn resolve_next<'a>(item: &'a SpItem, board: &Board) -> Option<&'a SpItem> {
    match item {
        SpItem::Block { next, .. } | SpItem::Signal { next, .. } => next.as_deref(),
        SpItem::Turnout { tile, branches } => {
            let position = board.tile(*tile)?.as_turnout()?.position;
            branches.get(&position)?.as_deref()
        }
        SpItem::DirectionControl { tile, open_state, next } => {
            let state = match &board.tile(*tile)?.kind {
                TileKind::DirectionControl(dc) => dc.state,
                _ => return None,
            };
            if state.permits(*open_state) {
                next.as_deref()
            } else {
                None
            }
        }
    }
}

/// First block item at or after `item`.
pub fn next_block<'a>(mut item: Option<&'a SpItem>, board: &Board) -> Option<&'a SpItem> {
    while let Some(current) = item {
        if matches!(current, SpItem::Block { .. }) {
            return Some(current);
        }
        item = resolve_next(current, board);
    }
    None
}

/// First block or signal item at or after `item`. Returns
/// `(block, signal)`, at most one of them set.
pub fn next_block_or_signal<'a>(
    mut item: Option<&'a SpItem>,
    board: &Board,
) -> (Option<&'a SpItem>, Option<&'a SpItem>) {
    while let Some(current) = item {
        match current {
            SpItem::Block { .. } => return (Some(current), None),
            SpItem::Signal { .. } => return (None, Some(current)),
            _ => item = resolve_next(current, board),
        }
    }
    (None, None)
}

/// State of the block behind an `SpItem::Block`, `Unknown` when it vanished.
pub fn block_state(item: &SpItem, board: &Board) -> BlockState {
    match item {
        SpItem::Block { tile, .. } => board
            .tile(*tile)
            .and_then(|t| t.as_block())
            .map_or(BlockState::Unknown, |b| b.state),
        _ => BlockState::Unknown,
    }
}

fn find_blocks(
    board: &Board,
    node: NodeId,
    link: LinkId,
    blocks_ahead: usize,
    signal_node: NodeId,
    subscriptions: &mut Vec<TileRef>,
) -> Option<Box<SpItem>> {
    let end = board.graph.next_node(node, link)?;
    let next_node = end.node;
    let entry_slot = end.slot;
    let tile_ref = board.node_tile(next_node)?;
    let tile = board.tile(tile_ref)?;

    let other_link = || -> Option<LinkId> {
        board.graph.nodes.get(next_node).and_then(|n| n.other_link(link))
    };
    let slot_link =
        |slot: usize| -> Option<LinkId> { board.graph.nodes.get(next_node).and_then(|n| n.link(slot)) };

    match &tile.kind {
        TileKind::Block(_) => {
            subscriptions.push(tile_ref);
            let enter_side = if entry_slot == 0 { BlockSide::A } else { BlockSide::B };
            let next = if blocks_ahead > 1 {
                other_link().and_then(|l| {
                    find_blocks(board, next_node, l, blocks_ahead - 1, signal_node, subscriptions)
                })
            } else {
                None
            };
            Some(Box::new(SpItem::Block { tile: tile_ref, enter_side, next }))
        }
        TileKind::Signal(_) => {
            let far = other_link()?;
            subscriptions.push(tile_ref);
            let next = find_blocks(board, next_node, far, blocks_ahead, signal_node, subscriptions);
            Some(Box::new(SpItem::Signal { tile: tile_ref, next }))
        }
        TileKind::Turnout(id, _) => {
            subscriptions.push(tile_ref);
            let mut branches = BTreeMap::new();
            for hop in turnout_hops(*id, entry_slot) {
                let subtree = slot_link(hop.exit_slot).and_then(|l| {
                    find_blocks(board, next_node, l, blocks_ahead, signal_node, subscriptions)
                });
                branches.insert(hop.position, subtree);
            }
            if branches.is_empty() {
                None
            } else {
                Some(Box::new(SpItem::Turnout { tile: tile_ref, branches }))
            }
        }
        TileKind::DirectionControl(_) => {
            let far = other_link()?;
            subscriptions.push(tile_ref);
            let open_state = if entry_slot == 0 {
                DirectionControlState::AtoB
            } else {
                DirectionControlState::BtoA
            };
            let next = find_blocks(board, next_node, far, blocks_ahead, signal_node, subscriptions);
            Some(Box::new(SpItem::DirectionControl { tile: tile_ref, open_state, next }))
        }
        TileKind::OneWay => {
            if entry_slot == 0 {
                let far = other_link()?;
                find_blocks(board, next_node, far, blocks_ahead, signal_node, subscriptions)
            } else {
                None
            }
        }
        TileKind::Bridge45Left(_)
        | TileKind::Bridge45Right(_)
        | TileKind::Bridge90(_)
        | TileKind::Cross45(_)
        | TileKind::Cross90(_) => {
            let far = slot_link(opposite_slot(entry_slot))?;
            find_blocks(board, next_node, far, blocks_ahead, signal_node, subscriptions)
        }
        TileKind::Link(link_tile) => {
            let pair = link_tile.pair?;
            let pair_node = board.node_of(pair)?;
            let far = board.graph.nodes.get(pair_node).and_then(|n| n.link(0))?;
            find_blocks(board, pair_node, far, blocks_ahead, signal_node, subscriptions)
        }
        TileKind::BufferStop => None,
        _ => {
            if next_node == signal_node {
                return None; // walked all the way around to ourselves
            }
            let far = other_link()?;
            find_blocks(board, next_node, far, blocks_ahead, signal_node, subscriptions)
        }
    }
}

#[cfg(test)]
#[path = "signal_path_tests.rs"]
mod tests;
