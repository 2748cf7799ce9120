// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain enums shared across the board, path and interlocking modules.
//!
//! Numeric assignments are part of the persisted tile state and must not be
//! reordered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a turnout. Which subset is legal depends on the tile kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TurnoutPosition {
    Unknown = 0,
    Straight = 1,
    Left = 2,
    Right = 3,
    Crossed = 4,
    Diverged = 5,
    DoubleSlipStraightA = 6,
    DoubleSlipStraightB = 7,
}

impl TurnoutPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Straight => "straight",
            Self::Left => "left",
            Self::Right => "right",
            Self::Crossed => "crossed",
            Self::Diverged => "diverged",
            Self::DoubleSlipStraightA => "double_slip_straight_a",
            Self::DoubleSlipStraightB => "double_slip_straight_b",
        }
    }
}

impl fmt::Display for TurnoutPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed travel direction across a direction control tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DirectionControlState {
    None = 0,
    AtoB = 1,
    BtoA = 2,
    Both = 3,
}

impl DirectionControlState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AtoB => "a_to_b",
            Self::BtoA => "b_to_a",
            Self::Both => "both",
        }
    }

    /// Whether traffic in `wanted` direction may pass.
    pub fn permits(&self, wanted: DirectionControlState) -> bool {
        *self == DirectionControlState::Both || *self == wanted
    }
}

impl fmt::Display for DirectionControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which diagonal of a flat crossing a path claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossState {
    AC,
    BD,
}

/// Which track of a bridge a path runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePath {
    AC,
    BD,
}

/// Computed occupancy state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    Unknown,
    Free,
    Reserved,
    Occupied,
}

impl BlockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Free => "free",
            Self::Reserved => "reserved",
            Self::Occupied => "occupied",
        }
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::Free
    }
}

/// The two ends of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BlockSide {
    A = 0,
    B = 1,
}

impl BlockSide {
    pub fn opposite(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::ops::Not for BlockSide {
    type Output = Self;

    fn not(self) -> Self {
        self.opposite()
    }
}

/// Raw value of an occupancy input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorState {
    Unknown,
    Free,
    Occupied,
}

/// Kind of input feeding a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockInputType {
    OccupyDetector,
    ReedSwitch,
}

/// Decoupler actuator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecouplerState {
    Deactivated,
    Activated,
}

/// Tri-state override used for per-signal options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoYesNo {
    #[default]
    Auto,
    Yes,
    No,
}

/// Escalation taken when a locked device keeps regressing externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtOutputChangeAction {
    #[default]
    DoNothing,
    EmergencyStopTrain,
    EmergencyStopWorld,
    PowerOffWorld,
}

/// Connection state of a hardware interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceState {
    #[default]
    Offline,
    Initializing,
    Online,
    Error,
}

impl InterfaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Initializing => "initializing",
            Self::Online => "online",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Travel direction of a train relative to a block (entered via side A or B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTrainDirection {
    TowardsA,
    TowardsB,
}
