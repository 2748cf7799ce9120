// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external grid representation: one packed record per tile origin,
//! `(x: i16, y: i16, TileData)`, little-endian. This layout is shared with
//! clients and editors and must stay bit-exact.

use crate::board::tile::TileData;
use crate::board::Board;

pub const RECORD_SIZE: usize = 8;

/// One grid cell record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRecord {
    pub x: i16,
    pub y: i16,
    pub data: TileData,
}

impl CellRecord {
    pub fn to_bytes(self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..2].copy_from_slice(&self.x.to_le_bytes());
        out[2..4].copy_from_slice(&self.y.to_le_bytes());
        out[4..8].copy_from_slice(&self.data.to_bytes());
        out
    }

    pub fn from_bytes(bytes: [u8; RECORD_SIZE]) -> Self {
        Self {
            x: i16::from_le_bytes([bytes[0], bytes[1]]),
            y: i16::from_le_bytes([bytes[2], bytes[3]]),
            data: TileData::from_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Snapshot the board as grid records, one per tile origin. Multi-cell
/// tiles carry their extent in the size nibbles.
pub fn snapshot(board: &Board) -> Vec<CellRecord> {
    let mut records: Vec<CellRecord> = board
        .tiles
        .iter()
        .map(|(_, tile)| CellRecord { x: tile.x, y: tile.y, data: tile.data() })
        .collect();
    records.sort_by_key(|r| (r.y, r.x));
    records
}

/// Serialize the whole board.
pub fn encode(board: &Board) -> Vec<u8> {
    let records = snapshot(board);
    let mut out = Vec::with_capacity(records.len() * RECORD_SIZE);
    for record in records {
        out.extend_from_slice(&record.to_bytes());
    }
    out
}

/// Parse grid records; trailing partial records are rejected.
pub fn decode(bytes: &[u8]) -> Option<Vec<CellRecord>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(RECORD_SIZE)
            .map(|chunk| {
                let mut raw = [0u8; RECORD_SIZE];
                raw.copy_from_slice(chunk);
                CellRecord::from_bytes(raw)
            })
            .collect(),
    )
}

/// Build a tile from a grid record. `None` for empty cells and ids this
/// server does not place (device state starts at its power-on default; the
/// opaque state byte is display-only here).
pub fn tile_from_record(record: &CellRecord) -> Option<crate::board::tile::Tile> {
    use crate::board::tile::{
        BlockTile, BridgeTile, CrossTile, DecouplerTile, DirectionControlTile, LinkTile,
        NxButtonTile, SensorTile, SignalKind, SignalTile, Tile, TileId, TileKind, TurnoutTile,
    };
    use crate::enums::SensorState;

    let id = record.data.id()?;
    let kind = match id {
        TileId::None => return None,
        TileId::RailStraight => TileKind::Straight,
        TileId::RailCurve45 => TileKind::Curve45,
        TileId::RailCurve90 => TileKind::Curve90,
        TileId::RailTunnel => TileKind::Tunnel,
        TileId::RailBufferStop => TileKind::BufferStop,
        TileId::RailOneWay => TileKind::OneWay,
        TileId::RailSensor => TileKind::Sensor(SensorTile { value: SensorState::Unknown }),
        TileId::RailBridge45Left => TileKind::Bridge45Left(BridgeTile::default()),
        TileId::RailBridge45Right => TileKind::Bridge45Right(BridgeTile::default()),
        TileId::RailBridge90 => TileKind::Bridge90(BridgeTile::default()),
        TileId::RailCross45 => TileKind::Cross45(CrossTile::new()),
        TileId::RailCross90 => TileKind::Cross90(CrossTile::new()),
        TileId::RailSignal2Aspect => TileKind::Signal(SignalTile::new(SignalKind::TwoAspect)),
        TileId::RailSignal3Aspect => TileKind::Signal(SignalTile::new(SignalKind::ThreeAspect)),
        TileId::RailSignalAspectIta => TileKind::Signal(SignalTile::new(SignalKind::Italian)),
        TileId::RailBlock => TileKind::Block(BlockTile::new()),
        TileId::RailDirectionControl => {
            TileKind::DirectionControl(DirectionControlTile::new())
        }
        TileId::RailDecoupler => TileKind::Decoupler(DecouplerTile::new()),
        TileId::RailLink => TileKind::Link(LinkTile::default()),
        TileId::RailNXButton => TileKind::NxButton(NxButtonTile::default()),
        TileId::PushButton => TileKind::PushButton,
        TileId::Label => TileKind::Label,
        TileId::Switch => TileKind::Switch,
        turnout if turnout.is_turnout() => TileKind::Turnout(turnout, TurnoutTile::new()),
        _ => return None,
    };
    let mut tile = Tile::new("", record.x, record.y, record.data.rotate(), kind);
    tile.width = record.data.width();
    tile.height = record.data.height();
    Some(tile)
}

/// Place decoded records into a world. Returns the number of tiles placed;
/// the caller runs `board_modified` afterwards.
pub fn apply(world: &mut crate::world::World, records: &[CellRecord]) -> anyhow::Result<usize> {
    let mut placed = 0usize;
    for record in records {
        if let Some(tile) = tile_from_record(record) {
            world.add_tile(tile)?;
            placed += 1;
        }
    }
    Ok(placed)
}

#[cfg(test)]
#[path = "cells_tests.rs"]
mod tests;
