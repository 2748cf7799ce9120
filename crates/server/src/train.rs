// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trains as the interlocking sees them: block assignment, travel direction,
//! emergency stop and target speed. Consist management lives elsewhere.

use crate::arena::Handle;
use crate::board::tile::TileRef;
use crate::enums::BlockTrainDirection;

pub type TrainId = Handle<Train>;

#[derive(Debug)]
pub struct Train {
    pub id: String,
    /// Blocks currently assigned to this train, head first.
    pub blocks: Vec<TileRef>,
    pub direction: BlockTrainDirection,
    pub emergency_stop: bool,
    /// Target speed in the layout's speed unit; 0 when holding.
    pub target_speed: f64,
    /// Decoder address on the wire, when driven through an interface.
    pub address: Option<u16>,
}

impl Train {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blocks: Vec::new(),
            direction: BlockTrainDirection::TowardsB,
            emergency_stop: false,
            target_speed: 0.0,
            address: None,
        }
    }

    /// Trip the emergency stop. Returns whether this changed anything.
    pub fn set_emergency_stop(&mut self) -> bool {
        if self.emergency_stop {
            return false;
        }
        self.emergency_stop = true;
        self.target_speed = 0.0;
        true
    }
}
