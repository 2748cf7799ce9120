// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tile identities, the packed grid descriptor, and the tagged tile sum.

use serde::{Deserialize, Serialize};

use crate::arena::Handle;
use crate::enums::{
    AutoYesNo, BlockInputType, BlockSide, BlockState, DecouplerState, DirectionControlState,
    SensorState, TurnoutPosition,
};
use crate::interlock::regress::RetryWindow;
use crate::output::map::OutputMap;
use crate::path::block_path::PathId;
use crate::signal::aspect::{ItalianAspect, SignalAspect};
use crate::train::TrainId;

pub type TileRef = Handle<Tile>;

/// Numeric tile identity. Assignments are persisted in saved worlds and must
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TileId {
    None = 0,
    RailStraight = 1,
    RailCurve45 = 2,
    RailCurve90 = 3,
    RailCross45 = 4,
    RailCross90 = 5,
    RailTurnoutLeft45 = 6,
    RailTurnoutRight45 = 7,
    RailTurnoutWye = 8,
    RailTurnout3Way = 9,
    RailTurnoutSingleSlip = 10,
    RailTurnoutDoubleSlip = 11,
    RailSignal2Aspect = 12,
    RailSignal3Aspect = 13,
    RailBufferStop = 14,
    RailSensor = 15,
    RailBlock = 16,
    RailTurnoutLeft90 = 17,
    RailTurnoutRight90 = 18,
    RailTurnoutLeftCurved = 19,
    RailTurnoutRightCurved = 20,
    RailBridge45Left = 21,
    RailBridge45Right = 22,
    RailBridge90 = 23,
    RailTunnel = 24,
    RailOneWay = 25,
    RailDirectionControl = 26,
    PushButton = 27,
    RailLink = 28,
    RailDecoupler = 29,
    RailNXButton = 30,
    Label = 31,
    Switch = 32,
    RailSignalAspectIta = 33,
}

impl TileId {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::RailStraight,
            2 => Self::RailCurve45,
            3 => Self::RailCurve90,
            4 => Self::RailCross45,
            5 => Self::RailCross90,
            6 => Self::RailTurnoutLeft45,
            7 => Self::RailTurnoutRight45,
            8 => Self::RailTurnoutWye,
            9 => Self::RailTurnout3Way,
            10 => Self::RailTurnoutSingleSlip,
            11 => Self::RailTurnoutDoubleSlip,
            12 => Self::RailSignal2Aspect,
            13 => Self::RailSignal3Aspect,
            14 => Self::RailBufferStop,
            15 => Self::RailSensor,
            16 => Self::RailBlock,
            17 => Self::RailTurnoutLeft90,
            18 => Self::RailTurnoutRight90,
            19 => Self::RailTurnoutLeftCurved,
            20 => Self::RailTurnoutRightCurved,
            21 => Self::RailBridge45Left,
            22 => Self::RailBridge45Right,
            23 => Self::RailBridge90,
            24 => Self::RailTunnel,
            25 => Self::RailOneWay,
            26 => Self::RailDirectionControl,
            27 => Self::PushButton,
            28 => Self::RailLink,
            29 => Self::RailDecoupler,
            30 => Self::RailNXButton,
            31 => Self::Label,
            32 => Self::Switch,
            33 => Self::RailSignalAspectIta,
            _ => return None,
        })
    }

    pub fn is_rail(self) -> bool {
        !matches!(self, Self::None | Self::PushButton | Self::Label | Self::Switch)
    }

    pub fn is_turnout(self) -> bool {
        matches!(
            self,
            Self::RailTurnoutLeft45
                | Self::RailTurnoutLeft90
                | Self::RailTurnoutLeftCurved
                | Self::RailTurnoutRight45
                | Self::RailTurnoutRight90
                | Self::RailTurnoutRightCurved
                | Self::RailTurnoutWye
                | Self::RailTurnout3Way
                | Self::RailTurnoutSingleSlip
                | Self::RailTurnoutDoubleSlip
        )
    }

    pub fn is_cross(self) -> bool {
        matches!(self, Self::RailCross45 | Self::RailCross90)
    }

    pub fn is_bridge(self) -> bool {
        matches!(self, Self::RailBridge45Left | Self::RailBridge45Right | Self::RailBridge90)
    }

    pub fn is_signal(self) -> bool {
        matches!(
            self,
            Self::RailSignal2Aspect | Self::RailSignal3Aspect | Self::RailSignalAspectIta
        )
    }

    /// Addressable tiles become world objects with an id.
    pub fn is_active(self) -> bool {
        self.is_turnout()
            || self.is_signal()
            || matches!(
                self,
                Self::RailSensor
                    | Self::RailBlock
                    | Self::RailDirectionControl
                    | Self::PushButton
                    | Self::RailLink
                    | Self::RailDecoupler
                    | Self::RailNXButton
                    | Self::Label
                    | Self::Switch
            )
    }
}

/// Rotation in 45 degree steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileRotate {
    #[default]
    Deg0 = 0,
    Deg45 = 1,
    Deg90 = 2,
    Deg135 = 3,
    Deg180 = 4,
    Deg225 = 5,
    Deg270 = 6,
    Deg315 = 7,
}

impl TileRotate {
    pub fn from_index(index: u8) -> Self {
        match index % 8 {
            0 => Self::Deg0,
            1 => Self::Deg45,
            2 => Self::Deg90,
            3 => Self::Deg135,
            4 => Self::Deg180,
            5 => Self::Deg225,
            6 => Self::Deg270,
            _ => Self::Deg315,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn to_deg(self) -> u16 {
        u16::from(self.index()) * 45
    }

    pub fn from_deg(deg: u16) -> Self {
        Self::from_index(((deg / 45) % 8) as u8)
    }

    pub fn is_diagonal(self) -> bool {
        self.index() & 1 == 1
    }

    pub fn add(self, steps: u8) -> Self {
        Self::from_index(self.index().wrapping_add(steps))
    }

    pub fn opposite(self) -> Self {
        self.add(4)
    }

    /// Grid offset of the neighbouring cell this direction points at.
    pub fn delta(self) -> (i16, i16) {
        match self {
            Self::Deg0 => (0, -1),
            Self::Deg45 => (1, -1),
            Self::Deg90 => (1, 0),
            Self::Deg135 => (1, 1),
            Self::Deg180 => (0, 1),
            Self::Deg225 => (-1, 1),
            Self::Deg270 => (-1, 0),
            Self::Deg315 => (-1, -1),
        }
    }
}

/// Packed per-cell descriptor: `header` (bits 15..4 tile id, 3..1 rotation,
/// 0 active), `size` (nibbles width-1 / height-1) and an opaque `state` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileData {
    header: u16,
    size: u8,
    pub state: u8,
}

impl TileData {
    pub const WIDTH_MAX: u8 = 16;
    pub const HEIGHT_MAX: u8 = 16;

    pub fn new(id: TileId, rotate: TileRotate, width: u8, height: u8, state: u8) -> Self {
        let header = ((id as u16) << 4)
            | (u16::from(rotate.index()) << 1)
            | u16::from(id.is_active());
        let mut data = Self { header, size: 0, state };
        data.set_size(width, height);
        data
    }

    pub fn id(&self) -> Option<TileId> {
        TileId::from_u16(self.header >> 4)
    }

    pub fn rotate(&self) -> TileRotate {
        TileRotate::from_index(((self.header >> 1) & 0x0007) as u8)
    }

    pub fn set_rotate(&mut self, rotate: TileRotate) {
        self.header &= 0xFFF1;
        self.header |= u16::from(rotate.index()) << 1;
    }

    pub fn is_active(&self) -> bool {
        self.header & 0x0001 != 0
    }

    pub fn width(&self) -> u8 {
        1 + (self.size & 0x0F)
    }

    pub fn height(&self) -> u8 {
        1 + (self.size >> 4)
    }

    pub fn set_size(&mut self, width: u8, height: u8) {
        let width = width.clamp(1, Self::WIDTH_MAX);
        let height = height.clamp(1, Self::HEIGHT_MAX);
        self.size = ((height - 1) << 4) | ((width - 1) & 0x0F);
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let [h0, h1] = self.header.to_le_bytes();
        [h0, h1, self.size, self.state]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self { header: u16::from_le_bytes([bytes[0], bytes[1]]), size: bytes[2], state: bytes[3] }
    }
}

/// Rail connector of a tile: a grid cell plus the outward facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connector {
    pub x: i16,
    pub y: i16,
    pub direction: TileRotate,
}

impl Connector {
    pub fn new(x: i16, y: i16, direction: TileRotate) -> Self {
        Self { x, y, direction }
    }

    /// Cell and direction the mating connector must have.
    pub fn mate(&self) -> Connector {
        let (dx, dy) = self.direction.delta();
        Connector::new(self.x + dx, self.y + dy, self.direction.opposite())
    }
}

// -- per-kind state ----------------------------------------------------------

#[derive(Debug)]
pub struct TurnoutTile {
    pub position: TurnoutPosition,
    pub reserved: Option<(PathId, TurnoutPosition)>,
    pub output_map: OutputMap<TurnoutPosition>,
    pub retry: RetryWindow,
}

impl TurnoutTile {
    pub fn new() -> Self {
        Self {
            position: TurnoutPosition::Unknown,
            reserved: None,
            output_map: OutputMap::new(),
            retry: RetryWindow::new(),
        }
    }

    pub fn reserved_position(&self) -> TurnoutPosition {
        self.reserved.map_or(TurnoutPosition::Unknown, |(_, p)| p)
    }
}

impl Default for TurnoutTile {
    fn default() -> Self {
        Self::new()
    }
}

/// Flavour of a signal tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    TwoAspect,
    ThreeAspect,
    Italian,
}

impl SignalKind {
    /// Look-ahead depth used when building the signal path.
    pub fn blocks_ahead(self) -> usize {
        match self {
            Self::TwoAspect => 1,
            Self::ThreeAspect | Self::Italian => 2,
        }
    }

    pub fn tile_id(self) -> TileId {
        match self {
            Self::TwoAspect => TileId::RailSignal2Aspect,
            Self::ThreeAspect => TileId::RailSignal3Aspect,
            Self::Italian => TileId::RailSignalAspectIta,
        }
    }
}

#[derive(Debug)]
pub struct SignalTile {
    pub kind: SignalKind,
    pub aspect: SignalAspect,
    pub aspect_ita: ItalianAspect,
    pub require_reservation: AutoYesNo,
    /// Italian option: repeat the next main signal instead of authorizing.
    pub only_anticipate: bool,
    pub reserved_path: Option<PathId>,
    pub output_map: OutputMap<SignalAspect>,
    pub retry: RetryWindow,
}

impl SignalTile {
    pub fn new(kind: SignalKind) -> Self {
        Self {
            kind,
            aspect: SignalAspect::Unknown,
            aspect_ita: ItalianAspect::UNKNOWN,
            require_reservation: AutoYesNo::Auto,
            only_anticipate: false,
            reserved_path: None,
            output_map: OutputMap::new(),
            retry: RetryWindow::new(),
        }
    }

    pub fn has_reserved_path(&self) -> bool {
        self.reserved_path.is_some()
    }
}

/// One occupancy input feeding a block.
#[derive(Debug, Clone)]
pub struct BlockInputItem {
    pub kind: BlockInputType,
    pub value: SensorState,
}

impl BlockInputItem {
    pub fn occupy_detector() -> Self {
        Self { kind: BlockInputType::OccupyDetector, value: SensorState::Unknown }
    }
}

#[derive(Debug, Default)]
pub struct BlockTile {
    pub state: BlockState,
    pub input_map: Vec<BlockInputItem>,
    pub trains: Vec<TrainId>,
    /// Paths leaving this block.
    pub paths: Vec<PathId>,
    /// Paths arriving into this block.
    pub paths_in: Vec<PathId>,
    /// Reserved path per side, indexed by [`BlockSide`].
    pub reserved: [Option<PathId>; 2],
}

impl BlockTile {
    pub fn new() -> Self {
        Self { state: BlockState::Free, ..Self::default() }
    }

    pub fn reserved_path(&self, side: BlockSide) -> Option<PathId> {
        self.reserved[side.index()]
    }
}

#[derive(Debug)]
pub struct DirectionControlTile {
    pub state: DirectionControlState,
    pub reserved: Option<(PathId, DirectionControlState)>,
}

impl DirectionControlTile {
    pub fn new() -> Self {
        Self { state: DirectionControlState::Both, reserved: None }
    }
}

#[derive(Debug)]
pub struct DecouplerTile {
    pub state: DecouplerState,
    pub output_map: OutputMap<DecouplerState>,
}

impl DecouplerTile {
    pub fn new() -> Self {
        Self { state: DecouplerState::Deactivated, output_map: OutputMap::new() }
    }
}

#[derive(Debug)]
pub struct SensorTile {
    pub value: SensorState,
}

#[derive(Debug, Default)]
pub struct LinkTile {
    /// The paired link tile, when bound.
    pub pair: Option<TileRef>,
}

#[derive(Debug, Default)]
pub struct NxButtonTile {
    pub enabled: bool,
    /// The unique block this button belongs to, when resolvable.
    pub block: Option<TileRef>,
    pub pressed: bool,
}

#[derive(Debug)]
pub struct CrossTile {
    pub reserved: Option<(PathId, CrossStateField)>,
}

/// Reserved diagonal of a crossing.
pub type CrossStateField = crate::enums::CrossState;

impl CrossTile {
    pub fn new() -> Self {
        Self { reserved: None }
    }
}

#[derive(Debug, Default)]
pub struct BridgeTile {
    /// Tracks currently reserved over the bridge (both may be held at once).
    pub reserved: Vec<(PathId, crate::enums::BridgePath)>,
}

/// The tile sum. Passive variants are geometry only; active variants carry
/// their device state.
#[derive(Debug)]
pub enum TileKind {
    Straight,
    Curve45,
    Curve90,
    Tunnel,
    BufferStop,
    OneWay,
    Sensor(SensorTile),
    Bridge45Left(BridgeTile),
    Bridge45Right(BridgeTile),
    Bridge90(BridgeTile),
    Cross45(CrossTile),
    Cross90(CrossTile),
    Turnout(TileId, TurnoutTile),
    Signal(SignalTile),
    Block(BlockTile),
    DirectionControl(DirectionControlTile),
    Decoupler(DecouplerTile),
    Link(LinkTile),
    NxButton(NxButtonTile),
    PushButton,
    Label,
    Switch,
}

impl TileKind {
    pub fn tile_id(&self) -> TileId {
        match self {
            Self::Straight => TileId::RailStraight,
            Self::Curve45 => TileId::RailCurve45,
            Self::Curve90 => TileId::RailCurve90,
            Self::Tunnel => TileId::RailTunnel,
            Self::BufferStop => TileId::RailBufferStop,
            Self::OneWay => TileId::RailOneWay,
            Self::Sensor(_) => TileId::RailSensor,
            Self::Bridge45Left(_) => TileId::RailBridge45Left,
            Self::Bridge45Right(_) => TileId::RailBridge45Right,
            Self::Bridge90(_) => TileId::RailBridge90,
            Self::Cross45(_) => TileId::RailCross45,
            Self::Cross90(_) => TileId::RailCross90,
            Self::Turnout(id, _) => *id,
            Self::Signal(signal) => signal.kind.tile_id(),
            Self::Block(_) => TileId::RailBlock,
            Self::DirectionControl(_) => TileId::RailDirectionControl,
            Self::Decoupler(_) => TileId::RailDecoupler,
            Self::Link(_) => TileId::RailLink,
            Self::NxButton(_) => TileId::RailNXButton,
            Self::PushButton => TileId::PushButton,
            Self::Label => TileId::Label,
            Self::Switch => TileId::Switch,
        }
    }
}

/// A tile placed on the board.
#[derive(Debug)]
pub struct Tile {
    /// World object id (empty for passive tiles).
    pub id: String,
    pub x: i16,
    pub y: i16,
    pub rotate: TileRotate,
    pub width: u8,
    pub height: u8,
    pub kind: TileKind,
    pub node: Option<crate::board::graph::NodeId>,
}

impl Tile {
    pub fn new(id: impl Into<String>, x: i16, y: i16, rotate: TileRotate, kind: TileKind) -> Self {
        Self { id: id.into(), x, y, rotate, width: 1, height: 1, kind, node: None }
    }

    pub fn tile_id(&self) -> TileId {
        self.kind.tile_id()
    }

    pub fn data(&self) -> TileData {
        let state = match &self.kind {
            TileKind::Turnout(_, t) => t.position as u8,
            TileKind::Signal(s) => s.aspect as u8,
            TileKind::DirectionControl(d) => d.state as u8,
            _ => 0,
        };
        TileData::new(self.tile_id(), self.rotate, self.width, self.height, state)
    }

    /// Cells covered by this tile. Blocks extend along their rotation axis.
    pub fn occupied_cells(&self) -> Vec<(i16, i16)> {
        let length = match self.kind {
            TileKind::Block(_) => self.height.max(self.width),
            _ => 1,
        };
        if length <= 1 {
            return vec![(self.x, self.y)];
        }
        let (dx, dy) = self.rotate.opposite().delta();
        (0..i16::from(length)).map(|i| (self.x + dx * i, self.y + dy * i)).collect()
    }

    /// Whether this tile owns a graph node. Plain track (straight, curves,
    /// tunnels, sensors) is collapsed into links instead.
    pub fn has_node(&self) -> bool {
        !matches!(
            self.kind,
            TileKind::Straight
                | TileKind::Curve45
                | TileKind::Curve90
                | TileKind::Tunnel
                | TileKind::Sensor(_)
                | TileKind::PushButton
                | TileKind::Label
                | TileKind::Switch
        )
    }

    /// Connector list. Order matters: it defines the node slot indexes the
    /// path engines rely on.
    pub fn connectors(&self) -> Vec<Connector> {
        let r = self.rotate;
        let c = |steps: u8| Connector::new(self.x, self.y, r.add(steps));
        match &self.kind {
            TileKind::Straight | TileKind::Tunnel | TileKind::Sensor(_) => vec![c(0), c(4)],
            TileKind::Curve45 => vec![c(0), c(3)],
            TileKind::Curve90 => vec![c(0), c(2)],
            TileKind::BufferStop | TileKind::Link(_) => vec![c(0)],
            TileKind::OneWay
            | TileKind::Decoupler(_)
            | TileKind::NxButton(_)
            | TileKind::DirectionControl(_)
            | TileKind::Signal(_) => vec![c(0), c(4)],
            TileKind::Block(_) => {
                let cells = self.occupied_cells();
                let (lx, ly) = *cells.last().unwrap_or(&(self.x, self.y));
                vec![
                    Connector::new(self.x, self.y, r),
                    Connector::new(lx, ly, r.opposite()),
                ]
            }
            TileKind::Turnout(id, _) => match id {
                TileId::RailTurnoutLeft45 => vec![c(0), c(3), c(4)],
                TileId::RailTurnoutLeft90 => vec![c(0), c(2), c(4)],
                TileId::RailTurnoutLeftCurved => vec![c(0), c(2), c(3)],
                TileId::RailTurnoutRight45 => vec![c(0), c(4), c(5)],
                TileId::RailTurnoutRight90 => vec![c(0), c(4), c(6)],
                TileId::RailTurnoutRightCurved => vec![c(0), c(5), c(6)],
                TileId::RailTurnoutWye => vec![c(0), c(3), c(5)],
                TileId::RailTurnout3Way => vec![c(0), c(3), c(4), c(5)],
                TileId::RailTurnoutSingleSlip | TileId::RailTurnoutDoubleSlip => {
                    vec![c(0), c(2), c(4), c(6)]
                }
                _ => Vec::new(),
            },
            TileKind::Bridge90(_) | TileKind::Cross90(_) => vec![c(0), c(2), c(4), c(6)],
            TileKind::Bridge45Left(_) | TileKind::Cross45(_) => vec![c(0), c(3), c(4), c(7)],
            TileKind::Bridge45Right(_) => vec![c(0), c(5), c(4), c(1)],
            TileKind::PushButton | TileKind::Label | TileKind::Switch => Vec::new(),
        }
    }

    pub fn as_block(&self) -> Option<&BlockTile> {
        match &self.kind {
            TileKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut BlockTile> {
        match &mut self.kind {
            TileKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_turnout(&self) -> Option<&TurnoutTile> {
        match &self.kind {
            TileKind::Turnout(_, t) => Some(t),
            _ => None,
        }
    }

    pub fn as_turnout_mut(&mut self) -> Option<&mut TurnoutTile> {
        match &mut self.kind {
            TileKind::Turnout(_, t) => Some(t),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&SignalTile> {
        match &self.kind {
            TileKind::Signal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_signal_mut(&mut self) -> Option<&mut SignalTile> {
        match &mut self.kind {
            TileKind::Signal(s) => Some(s),
            _ => None,
        }
    }
}

/// Legal positions for a turnout tile kind, in display order.
pub fn valid_positions(id: TileId) -> &'static [TurnoutPosition] {
    use TurnoutPosition::*;
    match id {
        TileId::RailTurnoutLeft45 | TileId::RailTurnoutLeft90 | TileId::RailTurnoutLeftCurved => {
            &[Straight, Left]
        }
        TileId::RailTurnoutRight45
        | TileId::RailTurnoutRight90
        | TileId::RailTurnoutRightCurved => &[Straight, Right],
        TileId::RailTurnoutWye => &[Left, Right],
        TileId::RailTurnout3Way => &[Straight, Left, Right],
        TileId::RailTurnoutSingleSlip => &[DoubleSlipStraightA, DoubleSlipStraightB, Left],
        TileId::RailTurnoutDoubleSlip => {
            &[DoubleSlipStraightA, DoubleSlipStraightB, Left, Right]
        }
        _ => &[],
    }
}

#[cfg(test)]
#[path = "tile_tests.rs"]
mod tests;
