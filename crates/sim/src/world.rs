// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static description of a simulated layout, loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::protocol::DecoderProtocol;

pub const INVALID_INDEX: usize = usize::MAX;
pub const INVALID_ADDRESS: u16 = u16::MAX;
pub const DEFAULT_CHANNEL: u16 = 0;

/// Shape of a track segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Straight,
    Curve,
    Turnout,
    TurnoutCurved,
    Turnout3Way,
    SingleSlipTurnout,
    DoubleSlipTurnout,
}

/// Occupancy sensor attached to a segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentSensor {
    #[serde(default)]
    pub channel: u16,
    pub address: u16,
}

/// Turnout motor addresses attached to a segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentTurnout {
    #[serde(default)]
    pub channel: u16,
    pub addresses: [u16; 2],
}

/// One piece of track. Segments are joined through `next`, one entry per
/// connector (up to four, unused entries are `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSegment {
    pub id: String,
    pub kind: SegmentKind,
    /// Length in world units of the main route.
    pub length: f32,
    /// Length of the diverging route, when the segment has one.
    #[serde(default)]
    pub length_diverging: Option<f32>,
    /// Neighbour segment ids per connector.
    #[serde(default)]
    pub next: Vec<Option<String>>,
    #[serde(default)]
    pub sensor: Option<SegmentSensor>,
    #[serde(default)]
    pub turnout: Option<SegmentTurnout>,
}

/// Rolling stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub length: f32,
}

/// A train: an ordered list of vehicle indexes plus its decoder identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Train {
    #[serde(default)]
    pub vehicles: Vec<usize>,
    #[serde(default = "Train::default_speed_max")]
    pub speed_max: f32,
    #[serde(default)]
    pub protocol: DecoderProtocol,
    #[serde(default = "Train::default_address")]
    pub address: u16,
    /// Segment the head of the train starts on.
    pub segment: String,
    /// Distance of the head along that segment.
    #[serde(default)]
    pub offset: f32,
}

impl Train {
    fn default_speed_max() -> f32 {
        10.0
    }

    fn default_address() -> u16 {
        INVALID_ADDRESS
    }
}

/// The whole static layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub segments: Vec<TrackSegment>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub trains: Vec<Train>,
}

impl Layout {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve a segment id to its index.
    pub fn segment_index(&self, id: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }
}
