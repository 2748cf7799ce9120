// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The board: tiles on a grid plus the derived node/link graph.
//!
//! Two connectors are joined when they sit in adjacent cells facing each
//! other. Plain track (straights, curves, tunnels, sensors) owns no node and
//! is collapsed into the link spanning it.

pub mod cells;
pub mod graph;
pub mod tile;

use std::collections::HashMap;

use tracing::warn;

use crate::arena::Arena;
use graph::{Graph, LinkEnd, NodeId};
use tile::{Connector, Tile, TileRef, TileRotate};

/// Tiles plus the derived routing graph.
#[derive(Debug, Default)]
pub struct Board {
    pub tiles: Arena<Tile>,
    cells: HashMap<(i16, i16), TileRef>,
    pub graph: Graph,
    /// Bumped on every structural change; consumers re-derive paths when it
    /// moves.
    pub revision: u64,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile(&self, tile: TileRef) -> Option<&Tile> {
        self.tiles.get(tile)
    }

    pub fn tile_mut(&mut self, tile: TileRef) -> Option<&mut Tile> {
        self.tiles.get_mut(tile)
    }

    pub fn tile_at(&self, x: i16, y: i16) -> Option<TileRef> {
        self.cells.get(&(x, y)).copied()
    }

    /// Place a tile. Fails when any of its cells is already occupied.
    pub fn add(&mut self, tile: Tile) -> Result<TileRef, Tile> {
        let cells = tile.occupied_cells();
        if cells.iter().any(|cell| self.cells.contains_key(cell)) {
            return Err(tile);
        }
        let tile_ref = self.tiles.insert(tile);
        for cell in cells {
            self.cells.insert(cell, tile_ref);
        }
        self.revision += 1;
        Ok(tile_ref)
    }

    /// Remove a tile. Its node (when it has one) disconnects all links.
    pub fn remove(&mut self, tile_ref: TileRef) -> Option<Tile> {
        let tile = self.tiles.get(tile_ref)?;
        for cell in tile.occupied_cells() {
            self.cells.remove(&cell);
        }
        if let Some(node) = tile.node {
            self.graph.remove_node(node);
        }
        self.revision += 1;
        self.tiles.remove(tile_ref)
    }

    pub fn node_of(&self, tile: TileRef) -> Option<NodeId> {
        self.tiles.get(tile).and_then(|t| t.node)
    }

    /// Tile owning a node.
    pub fn node_tile(&self, node: NodeId) -> Option<TileRef> {
        self.graph.nodes.get(node).map(|n| n.tile)
    }

    /// Recompute the node/link graph from the current tile set.
    pub fn rebuild_graph(&mut self) {
        self.graph.clear();

        // One node per node-owning tile.
        let handles = self.tiles.handles();
        for tile_ref in &handles {
            let (has_node, connectors) = match self.tiles.get(*tile_ref) {
                Some(t) => (t.has_node(), t.connectors().len()),
                None => continue,
            };
            let node = has_node.then(|| self.graph.add_node(*tile_ref, connectors));
            if let Some(t) = self.tiles.get_mut(*tile_ref) {
                t.node = node;
            }
        }

        // Connector lookup: (cell, outward direction) -> (tile, connector index).
        let mut by_key: HashMap<(i16, i16, TileRotate), (TileRef, usize)> = HashMap::new();
        for tile_ref in &handles {
            let Some(t) = self.tiles.get(*tile_ref) else { continue };
            for (index, connector) in t.connectors().into_iter().enumerate() {
                let key = (connector.x, connector.y, connector.direction);
                if by_key.insert(key, (*tile_ref, index)).is_some() {
                    warn!(x = connector.x, y = connector.y, "duplicate connector on board");
                }
            }
        }

        // Join node connectors, collapsing passive runs.
        for tile_ref in handles {
            let Some(t) = self.tiles.get(tile_ref) else { continue };
            let Some(node) = t.node else { continue };
            let connectors = t.connectors();
            for (slot, connector) in connectors.into_iter().enumerate() {
                if self.graph.nodes.get(node).and_then(|n| n.link(slot)).is_some() {
                    continue; // already joined from the other end
                }
                let Some((other_tile, other_slot, passives)) =
                    self.walk_to_node(&by_key, connector)
                else {
                    continue;
                };
                let Some(other_node) = self.node_of(other_tile) else { continue };
                if other_node == node && other_slot == slot {
                    continue;
                }
                let link = self.graph.add_link(passives);
                if !self.graph.link_connect(link, node, slot, other_node, other_slot) {
                    self.graph.links.remove(link);
                }
            }
        }
        self.revision += 1;
    }

    /// Follow a connector outwards through passive tiles until another
    /// node-owning connector is reached. Returns the target and the passive
    /// tiles crossed, in order.
    fn walk_to_node(
        &self,
        by_key: &HashMap<(i16, i16, TileRotate), (TileRef, usize)>,
        from: Connector,
    ) -> Option<(TileRef, usize, Vec<TileRef>)> {
        let mut current = from;
        let mut passives = Vec::new();
        let mut steps = 0usize;
        loop {
            // A board has finitely many cells; bail out on malformed loops.
            steps += 1;
            if steps > self.tiles.len() + 1 {
                return None;
            }
            let mate = current.mate();
            let key = (mate.x, mate.y, mate.direction);
            let (tile_ref, index) = by_key.get(&key).copied()?;
            let t = self.tile(tile_ref)?;
            if t.has_node() {
                return Some((tile_ref, index, passives));
            }
            passives.push(tile_ref);
            let connectors = t.connectors();
            if connectors.len() != 2 {
                return None;
            }
            current = connectors[1 - index];
        }
    }

    /// Resolve the far end of a link seen from `node`.
    pub fn next_end(&self, node: NodeId, link: graph::LinkId) -> Option<LinkEnd> {
        self.graph.next_node(node, link)
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
