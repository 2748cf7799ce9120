// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::{Connector, TileData, TileId, TileRotate};

#[test]
fn tile_id_assignments_are_stable() {
    assert_eq!(TileId::None as u16, 0);
    assert_eq!(TileId::RailStraight as u16, 1);
    assert_eq!(TileId::RailCurve45 as u16, 2);
    assert_eq!(TileId::RailCross45 as u16, 4);
    assert_eq!(TileId::RailTurnoutLeft45 as u16, 6);
    assert_eq!(TileId::RailTurnoutDoubleSlip as u16, 11);
    assert_eq!(TileId::RailSignal2Aspect as u16, 12);
    assert_eq!(TileId::RailSignal3Aspect as u16, 13);
    assert_eq!(TileId::RailBufferStop as u16, 14);
    assert_eq!(TileId::RailBlock as u16, 16);
    assert_eq!(TileId::RailBridge90 as u16, 23);
    assert_eq!(TileId::RailOneWay as u16, 25);
    assert_eq!(TileId::RailDirectionControl as u16, 26);
    assert_eq!(TileId::RailLink as u16, 28);
    assert_eq!(TileId::RailDecoupler as u16, 29);
    assert_eq!(TileId::RailNXButton as u16, 30);
    assert_eq!(TileId::Switch as u16, 32);
}

#[test]
fn active_flag_matches_classification() {
    assert!(TileId::RailBlock.is_active());
    assert!(TileId::RailTurnoutWye.is_active());
    assert!(TileId::RailNXButton.is_active());
    assert!(!TileId::RailStraight.is_active());
    assert!(!TileId::RailCross90.is_active());
    assert!(!TileId::RailBufferStop.is_active());
    assert!(!TileId::RailBridge45Left.is_active());
}

#[test]
fn header_bit_layout() {
    let data = TileData::new(TileId::RailBlock, TileRotate::Deg90, 1, 4, 7);
    let bytes = data.to_bytes();
    let header = u16::from_le_bytes([bytes[0], bytes[1]]);
    assert_eq!(header >> 4, TileId::RailBlock as u16);
    assert_eq!((header >> 1) & 0x7, 2); // Deg90
    assert_eq!(header & 1, 1); // active
    assert_eq!(bytes[2], 0x30); // height-1 in the high nibble
    assert_eq!(bytes[3], 7);
}

#[test]
fn passive_tiles_clear_the_active_bit() {
    let data = TileData::new(TileId::RailCurve45, TileRotate::Deg0, 1, 1, 0);
    assert!(!data.is_active());
}

#[test]
fn rotate_arithmetic_wraps() {
    assert_eq!(TileRotate::Deg315.add(1), TileRotate::Deg0);
    assert_eq!(TileRotate::Deg270.opposite(), TileRotate::Deg90);
    assert_eq!(TileRotate::from_deg(360), TileRotate::Deg0);
    assert_eq!(TileRotate::Deg45.to_deg(), 45);
    assert!(TileRotate::Deg135.is_diagonal());
    assert!(!TileRotate::Deg180.is_diagonal());
}

#[test]
fn connector_mate_faces_back() {
    let c = Connector::new(3, 4, TileRotate::Deg180);
    let m = c.mate();
    assert_eq!((m.x, m.y), (3, 5));
    assert_eq!(m.direction, TileRotate::Deg0);
    assert_eq!(m.mate(), c);
}

proptest! {
    #[test]
    fn tile_data_round_trips(
        id in 0u16..=33,
        rotate in 0u8..8,
        width in 1u8..=16,
        height in 1u8..=16,
        state in any::<u8>(),
    ) {
        prop_assume!(TileId::from_u16(id).is_some());
        let id = match TileId::from_u16(id) {
            Some(id) => id,
            None => return Ok(()),
        };
        let data = TileData::new(id, TileRotate::from_index(rotate), width, height, state);
        let decoded = TileData::from_bytes(data.to_bytes());
        prop_assert_eq!(decoded, data);
        prop_assert_eq!(decoded.id(), Some(id));
        prop_assert_eq!(decoded.rotate(), TileRotate::from_index(rotate));
        prop_assert_eq!(decoded.width(), width);
        prop_assert_eq!(decoded.height(), height);
        prop_assert_eq!(decoded.state, state);
        prop_assert_eq!(decoded.is_active(), id.is_active());
    }
}
