// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Block-to-block route discovery.
//!
//! From each connected side of a block, a breadth-first walk fans out over
//! the graph, forking at turnouts, until it reaches another block (or the
//! same block from the other side), a dead end, or a disconnected link. The
//! result carries every device sub-state the route depends on.

use std::collections::VecDeque;

use crate::arena::Handle;
use crate::board::graph::{LinkId, NodeId};
use crate::board::tile::{TileKind, TileRef};
use crate::board::Board;
use crate::enums::{
    BlockSide, BridgePath, CrossState, DirectionControlState, TurnoutPosition,
};
use crate::path::step::{opposite_slot, turnout_hops};
use crate::train::TrainId;

pub type PathId = Handle<BlockPath>;

/// Hard cap on BFS steps; a sane board terminates far below this, a
/// malformed cyclic board must not spin forever.
const STEP_LIMIT: usize = 65_536;

/// A directed route between two block sides and everything it must lock.
#[derive(Debug, Clone)]
pub struct BlockPath {
    pub from_block: TileRef,
    pub from_side: BlockSide,
    pub to_block: TileRef,
    pub to_side: BlockSide,
    /// Passive tiles to reserve along the route.
    pub tiles: Vec<TileRef>,
    /// Required turnout positions, in travel order.
    pub turnouts: Vec<(TileRef, TurnoutPosition)>,
    /// Required direction-control states.
    pub direction_controls: Vec<(TileRef, DirectionControlState)>,
    /// Required crossing diagonals.
    pub crossings: Vec<(TileRef, CrossState)>,
    /// Bridges crossed (reserved as passive tiles only).
    pub bridges: Vec<(TileRef, BridgePath)>,
    /// Signals passed front-side, in travel order.
    pub signals: Vec<TileRef>,
    pub nx_button_from: Option<TileRef>,
    pub nx_button_to: Option<TileRef>,
    /// Train holding the reservation, when reserved.
    pub reserved_by: Option<TrainId>,
    /// Bumped on every reserve/release; stale delayed-release timers check it.
    pub release_generation: u64,
}

impl BlockPath {
    fn start(from_block: TileRef, from_side: BlockSide) -> Self {
        Self {
            from_block,
            from_side,
            to_block: from_block,
            to_side: from_side,
            tiles: Vec::new(),
            turnouts: Vec::new(),
            direction_controls: Vec::new(),
            crossings: Vec::new(),
            bridges: Vec::new(),
            signals: Vec::new(),
            nx_button_from: None,
            nx_button_to: None,
            reserved_by: None,
            release_generation: 0,
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved_by.is_some()
    }

    pub fn has_nx_buttons(&self) -> bool {
        self.nx_button_from.is_some() && self.nx_button_to.is_some()
    }

    /// Same route: endpoints and required turnout positions all agree.
    pub fn same_route(&self, other: &BlockPath) -> bool {
        self.from_block == other.from_block
            && self.from_side == other.from_side
            && self.to_block == other.to_block
            && self.to_side == other.to_side
            && self.turnouts == other.turnouts
    }

    /// All turnouts in position and all direction controls permitting.
    pub fn is_ready(&self, board: &Board) -> bool {
        let turnouts_ready = self.turnouts.iter().all(|(tile, required)| {
            board.tile(*tile).and_then(|t| t.as_turnout()).is_some_and(|t| t.position == *required)
        });
        let controls_ready = self.direction_controls.iter().all(|(tile, required)| {
            board
                .tile(*tile)
                .map(|t| match &t.kind {
                    TileKind::DirectionControl(dc) => dc.state.permits(*required),
                    _ => false,
                })
                .unwrap_or(false)
        });
        turnouts_ready && controls_ready
    }
}

struct Pending {
    path: BlockPath,
    node: NodeId,
    link: Option<LinkId>,
}

/// Discover every path leaving `block`, both sides.
pub fn find(board: &Board, block: TileRef) -> Vec<BlockPath> {
    let Some(node) = board.node_of(block) else {
        return Vec::new();
    };
    let (link_a, link_b) = match board.graph.nodes.get(node) {
        Some(n) => (n.link(0), n.link(1)),
        None => return Vec::new(),
    };

    let mut todo: VecDeque<Pending> = VecDeque::new();
    if let Some(link) = link_a {
        todo.push_back(Pending { path: BlockPath::start(block, BlockSide::A), node, link: Some(link) });
    }
    if let Some(link) = link_b {
        todo.push_back(Pending { path: BlockPath::start(block, BlockSide::B), node, link: Some(link) });
    }

    let mut paths = Vec::new();
    let mut steps = 0usize;

    while let Some(mut current) = todo.pop_front() {
        steps += 1;
        if steps > STEP_LIMIT {
            break;
        }
        let Some(link) = current.link else {
            continue; // dead end
        };
        let Some(end) = board.graph.next_node(current.node, link) else {
            continue; // half-connected link
        };
        let next_node = end.node;
        let entry_slot = end.slot;
        let Some(tile_ref) = board.node_tile(next_node) else {
            continue;
        };
        let Some(tile) = board.tile(tile_ref) else {
            continue;
        };

        // Passive tiles on the link become part of the path.
        if let Some(l) = board.graph.links.get(link) {
            current.path.tiles.extend(l.tiles.iter().copied());
        }

        let node_slots = |slot: usize| -> Option<LinkId> {
            board.graph.nodes.get(next_node).and_then(|n| n.link(slot))
        };

        match &tile.kind {
            TileKind::Block(_) => {
                let from_tile = board.node_tile(current.node);
                if let Some(from_tile) = from_tile {
                    let is_nx = board
                        .tile(from_tile)
                        .is_some_and(|t| matches!(t.kind, TileKind::NxButton(_)));
                    if is_nx {
                        current.path.nx_button_to = Some(from_tile);
                    }
                }
                current.path.to_block = tile_ref;
                current.path.to_side =
                    if entry_slot == 0 { BlockSide::A } else { BlockSide::B };
                paths.push(current.path);
            }
            TileKind::Turnout(id, _) => {
                let hops = turnout_hops(*id, entry_slot);
                if hops.is_empty() {
                    continue;
                }
                for extra in &hops[1..] {
                    let mut forked = current.path.clone();
                    forked.turnouts.push((tile_ref, extra.position));
                    todo.push_back(Pending {
                        path: forked,
                        node: next_node,
                        link: node_slots(extra.exit_slot),
                    });
                }
                current.path.turnouts.push((tile_ref, hops[0].position));
                current.node = next_node;
                current.link = node_slots(hops[0].exit_slot);
                todo.push_back(current);
            }
            TileKind::OneWay => {
                if entry_slot == 0 {
                    current.node = next_node;
                    current.link = node_slots(1);
                    todo.push_back(current);
                }
                // entered against the arrow: drop
            }
            TileKind::DirectionControl(_) => {
                let side_a = entry_slot == 0;
                current.path.direction_controls.push((
                    tile_ref,
                    if side_a {
                        DirectionControlState::AtoB
                    } else {
                        DirectionControlState::BtoA
                    },
                ));
                current.node = next_node;
                current.link = node_slots(if side_a { 1 } else { 0 });
                todo.push_back(current);
            }
            TileKind::Bridge45Left(_) | TileKind::Bridge45Right(_) | TileKind::Bridge90(_) => {
                let track = if entry_slot % 2 == 0 { BridgePath::AC } else { BridgePath::BD };
                current.path.bridges.push((tile_ref, track));
                current.node = next_node;
                current.link = node_slots(opposite_slot(entry_slot));
                todo.push_back(current);
            }
            TileKind::Cross45(_) | TileKind::Cross90(_) => {
                let diagonal = if entry_slot % 2 == 0 { CrossState::AC } else { CrossState::BD };
                current.path.crossings.push((tile_ref, diagonal));
                current.node = next_node;
                current.link = node_slots(opposite_slot(entry_slot));
                todo.push_back(current);
            }
            TileKind::Link(link_tile) => {
                let Some(pair) = link_tile.pair else {
                    continue; // unbound link tile: dead end
                };
                let Some(pair_node) = board.node_of(pair) else {
                    continue;
                };
                current.node = pair_node;
                current.link =
                    board.graph.nodes.get(pair_node).and_then(|n| n.link(0));
                todo.push_back(current);
            }
            TileKind::Signal(_) => {
                current.node = next_node;
                if entry_slot == 0 {
                    // front side
                    current.path.signals.push(tile_ref);
                    current.link = node_slots(1);
                } else {
                    current.link = node_slots(0);
                }
                todo.push_back(current);
            }
            TileKind::Decoupler(_) => {
                current.node = next_node;
                current.link = node_slots(1 - entry_slot.min(1));
                todo.push_back(current);
            }
            TileKind::NxButton(_) => {
                if board.node_tile(current.node) == Some(current.path.from_block) {
                    current.path.nx_button_from = Some(tile_ref);
                }
                current.node = next_node;
                current.link = node_slots(1 - entry_slot.min(1));
                todo.push_back(current);
            }
            TileKind::BufferStop => {
                // dead end
            }
            _ => {
                // passive tiles never own nodes; nothing to continue into
            }
        }
    }

    paths
}

#[cfg(test)]
#[path = "block_path_tests.rs"]
mod tests;
