// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared undirected multigraph under the board: per-tile nodes with one
//! slot per connector, joined by links that may span runs of plain track.

use crate::arena::{Arena, Handle};
use crate::board::tile::TileRef;

pub type NodeId = Handle<Node>;
pub type LinkId = Handle<Link>;

/// Per-tile hub. Slot order equals the tile's connector order.
#[derive(Debug)]
pub struct Node {
    pub tile: TileRef,
    slots: Vec<Option<LinkId>>,
}

impl Node {
    pub fn new(tile: TileRef, connectors: usize) -> Self {
        Self { tile, slots: vec![None; connectors] }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn link(&self, slot: usize) -> Option<LinkId> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<LinkId>] {
        &self.slots
    }

    /// Slot currently holding `link`, if any.
    pub fn slot_of(&self, link: LinkId) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(link))
    }

    /// For two-slot nodes: the link on the other slot.
    pub fn other_link(&self, link: LinkId) -> Option<LinkId> {
        if self.slots.len() != 2 {
            return None;
        }
        if self.slots[0] == Some(link) {
            self.slots[1]
        } else {
            self.slots[0]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEnd {
    pub node: NodeId,
    pub slot: usize,
}

/// Edge between two node slots, carrying the passive tiles along the run.
#[derive(Debug, Default)]
pub struct Link {
    ends: [Option<LinkEnd>; 2],
    /// Plain track tiles between the two endpoints, in traversal order.
    pub tiles: Vec<TileRef>,
}

impl Link {
    pub fn new(tiles: Vec<TileRef>) -> Self {
        Self { ends: [None, None], tiles }
    }

    pub fn ends(&self) -> &[Option<LinkEnd>; 2] {
        &self.ends
    }

    pub fn is_connected(&self) -> bool {
        self.ends[0].is_some() || self.ends[1].is_some()
    }

    /// The endpoint on the far side of `node`.
    pub fn next_from(&self, node: NodeId) -> Option<LinkEnd> {
        match self.ends {
            [Some(a), Some(b)] if a.node == node => Some(b),
            [Some(a), Some(b)] if b.node == node => Some(a),
            _ => None,
        }
    }
}

/// Node/link store plus the connect/disconnect operations.
#[derive(Debug, Default)]
pub struct Graph {
    pub nodes: Arena<Node>,
    pub links: Arena<Link>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    pub fn add_node(&mut self, tile: TileRef, connectors: usize) -> NodeId {
        self.nodes.insert(Node::new(tile, connectors))
    }

    pub fn add_link(&mut self, tiles: Vec<TileRef>) -> LinkId {
        self.links.insert(Link::new(tiles))
    }

    /// Place `link` in `slot` of `node`, disconnecting any prior occupant.
    pub fn node_connect(&mut self, node: NodeId, slot: usize, link: LinkId) -> bool {
        let Some(prior) = self.nodes.get(node).and_then(|n| n.slots.get(slot).copied()) else {
            return false;
        };
        if let Some(prior) = prior {
            if prior == link {
                return true;
            }
            self.link_disconnect(prior);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.slots[slot] = Some(link);
            return true;
        }
        false
    }

    /// Remove `link` from `slot` iff that exact link occupies it. Idempotent.
    pub fn node_disconnect(&mut self, node: NodeId, slot: usize, link: LinkId) -> bool {
        if let Some(n) = self.nodes.get_mut(node) {
            if n.slots.get(slot).copied().flatten() == Some(link) {
                n.slots[slot] = None;
                return true;
            }
        }
        false
    }

    /// Bind both endpoints of `link`. May be called at most once per link;
    /// re-connecting identical endpoints with an identical (or reversed)
    /// in-between tile list is a no-op. A partial failure rolls back.
    pub fn link_connect(
        &mut self,
        link: LinkId,
        node_a: NodeId,
        slot_a: usize,
        node_b: NodeId,
        slot_b: usize,
    ) -> bool {
        let occupant_a = self.nodes.get(node_a).and_then(|n| n.link(slot_a));
        let occupant_b = self.nodes.get(node_b).and_then(|n| n.link(slot_b));
        if let (Some(a), Some(b)) = (occupant_a, occupant_b) {
            if a == b {
                let same_tiles = match (self.links.get(a), self.links.get(link)) {
                    (Some(existing), Some(new)) => {
                        existing.tiles == new.tiles
                            || existing.tiles.iter().rev().eq(new.tiles.iter())
                    }
                    _ => false,
                };
                if same_tiles {
                    return true;
                }
            }
        }

        if self.links.get(link).is_none_or(Link::is_connected) {
            return false;
        }

        if !self.node_connect(node_a, slot_a, link) {
            return false;
        }
        if let Some(l) = self.links.get_mut(link) {
            l.ends[0] = Some(LinkEnd { node: node_a, slot: slot_a });
        }
        if !self.node_connect(node_b, slot_b, link) {
            self.link_disconnect(link);
            return false;
        }
        if let Some(l) = self.links.get_mut(link) {
            l.ends[1] = Some(LinkEnd { node: node_b, slot: slot_b });
        }
        true
    }

    /// Release both endpoint bindings. Safe regardless of prior state; the
    /// link entry itself stays in the arena until removed by the caller.
    pub fn link_disconnect(&mut self, link: LinkId) {
        let ends = match self.links.get(link) {
            Some(l) => l.ends,
            None => return,
        };
        for end in ends.into_iter().flatten() {
            self.node_disconnect(end.node, end.slot, link);
        }
        if let Some(l) = self.links.get_mut(link) {
            l.ends = [None, None];
        }
    }

    /// Drop a node, disconnecting all its links first. A link whose two
    /// endpoints are both gone is removed from the arena.
    pub fn remove_node(&mut self, node: NodeId) {
        let links: Vec<LinkId> = match self.nodes.get(node) {
            Some(n) => n.slots.iter().copied().flatten().collect(),
            None => return,
        };
        for link in links {
            self.link_disconnect(link);
            self.links.remove(link);
        }
        self.nodes.remove(node);
    }

    /// Other endpoint of `link`, seen from `node`.
    pub fn next_node(&self, node: NodeId, link: LinkId) -> Option<LinkEnd> {
        let ends = self.links.get(link)?.ends;
        match ends {
            [Some(a), Some(b)] if a.node == node => Some(b),
            [Some(a), Some(b)] if b.node == node => Some(a),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
