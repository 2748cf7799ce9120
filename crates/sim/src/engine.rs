// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kinematic simulation of the layout.
//!
//! The engine advances train positions at a fixed tick rate, derives segment
//! occupancy, and produces the protocol messages a real command station would
//! send (sensor changes). It consumes power and locomotive commands.

use std::time::Duration;

use tracing::debug;

use crate::protocol::{Direction, Message};
use crate::world::{Layout, SegmentKind, INVALID_ADDRESS};

/// 30 Hz, like the hardware it stands in for.
pub const TICK_RATE: Duration = Duration::from_millis(1000 / 30);

/// Route selection of a simulated turnout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnoutRoute {
    #[default]
    Main,
    Diverging,
}

#[derive(Debug, Clone, Default)]
struct SensorState {
    occupied: usize,
    value: bool,
}

#[derive(Debug, Clone)]
struct TrainState {
    speed: f32,
    reverse: bool,
    emergency_stop: bool,
    /// Head position: segment index plus distance from its entry end.
    segment: usize,
    offset: f32,
    length: f32,
}

/// Mutable simulation state, advanced by [`Engine::tick`].
pub struct Engine {
    layout: Layout,
    power_on: bool,
    sensors: Vec<SensorState>,
    turnouts: Vec<TurnoutRoute>,
    trains: Vec<TrainState>,
    /// Per-segment neighbour indexes resolved from ids: `[prev, main, diverging]`.
    topology: Vec<[Option<usize>; 3]>,
}

impl Engine {
    pub fn new(layout: Layout) -> Self {
        let topology = layout
            .segments
            .iter()
            .map(|segment| {
                let mut next = [None, None, None];
                for (i, neighbour) in segment.next.iter().take(3).enumerate() {
                    next[i] = neighbour.as_deref().and_then(|id| layout.segment_index(id));
                }
                next
            })
            .collect();

        let sensors = vec![SensorState::default(); layout.segments.len()];
        let turnouts = vec![TurnoutRoute::default(); layout.segments.len()];

        let trains = layout
            .trains
            .iter()
            .filter_map(|train| {
                let segment = layout.segment_index(&train.segment)?;
                let length = train
                    .vehicles
                    .iter()
                    .filter_map(|&v| layout.vehicles.get(v))
                    .map(|v| v.length)
                    .sum();
                Some(TrainState {
                    speed: 0.0,
                    reverse: false,
                    emergency_stop: false,
                    segment,
                    offset: train.offset,
                    length,
                })
            })
            .collect();

        Self { layout, power_on: false, sensors, turnouts, trains, topology }
    }

    pub fn power_on(&self) -> bool {
        self.power_on
    }

    pub fn set_turnout_route(&mut self, segment: usize, route: TurnoutRoute) {
        if let Some(slot) = self.turnouts.get_mut(segment) {
            *slot = route;
        }
    }

    /// Apply an inbound protocol message. Returns messages to broadcast in
    /// response (power echo).
    pub fn apply(&mut self, message: Message) -> Vec<Message> {
        match message {
            Message::Power { on } => {
                if self.power_on != on {
                    self.power_on = on;
                    debug!(on, "power changed");
                    return vec![Message::Power { on }];
                }
                Vec::new()
            }
            Message::LocomotiveSpeedDirection {
                address,
                emergency_stop,
                direction,
                speed,
                ..
            } => {
                for (index, train) in self.layout.trains.iter().enumerate() {
                    if train.address != address || address == INVALID_ADDRESS {
                        continue;
                    }
                    if let Some(state) = self.trains.get_mut(index) {
                        state.emergency_stop = emergency_stop;
                        state.reverse = direction == Direction::Reverse;
                        state.speed = if emergency_stop {
                            0.0
                        } else {
                            f32::from(speed) / 126.0 * train.speed_max
                        };
                    }
                }
                Vec::new()
            }
            Message::SensorChanged { .. } => Vec::new(),
        }
    }

    /// Advance the simulation by one tick. Returns sensor change messages.
    pub fn tick(&mut self) -> Vec<Message> {
        if self.power_on {
            for index in 0..self.trains.len() {
                self.advance_train(index, TICK_RATE.as_secs_f32());
            }
        }
        self.update_sensors()
    }

    fn segment_length(&self, index: usize, route: TurnoutRoute) -> f32 {
        let Some(segment) = self.layout.segments.get(index) else {
            return 0.0;
        };
        match route {
            TurnoutRoute::Main => segment.length,
            TurnoutRoute::Diverging => segment.length_diverging.unwrap_or(segment.length),
        }
    }

    fn exit_of(&self, index: usize, reverse: bool) -> Option<usize> {
        let top = self.topology.get(index)?;
        if reverse {
            top[0]
        } else {
            let diverging = self
                .layout
                .segments
                .get(index)
                .is_some_and(|s| !matches!(s.kind, SegmentKind::Straight | SegmentKind::Curve))
                && self.turnouts.get(index) == Some(&TurnoutRoute::Diverging);
            if diverging {
                top[2].or(top[1])
            } else {
                top[1]
            }
        }
    }

    fn advance_train(&mut self, index: usize, dt: f32) {
        let Some(train) = self.trains.get(index).cloned() else {
            return;
        };
        if train.speed <= 0.0 {
            return;
        }
        let mut segment = train.segment;
        let mut offset = train.offset + if train.reverse { -train.speed * dt } else { train.speed * dt };

        // Cross segment boundaries, stopping dead when the layout ends.
        loop {
            let length = self.segment_length(segment, self.route_of(segment));
            if offset >= 0.0 && offset <= length {
                break;
            }
            if offset > length {
                match self.exit_of(segment, false) {
                    Some(next) => {
                        offset -= length;
                        segment = next;
                    }
                    None => {
                        offset = length;
                        if let Some(state) = self.trains.get_mut(index) {
                            state.speed = 0.0;
                        }
                        break;
                    }
                }
            } else {
                match self.exit_of(segment, true) {
                    Some(prev) => {
                        offset += self.segment_length(prev, self.route_of(prev));
                        segment = prev;
                    }
                    None => {
                        offset = 0.0;
                        if let Some(state) = self.trains.get_mut(index) {
                            state.speed = 0.0;
                        }
                        break;
                    }
                }
            }
        }

        if let Some(state) = self.trains.get_mut(index) {
            state.segment = segment;
            state.offset = offset;
        }
    }

    fn route_of(&self, segment: usize) -> TurnoutRoute {
        self.turnouts.get(segment).copied().unwrap_or_default()
    }

    /// Segments covered by a train: head segment plus predecessors back along
    /// the train's length.
    fn covered_segments(&self, train: &TrainState) -> Vec<usize> {
        let mut covered = vec![train.segment];
        let mut remaining = train.length - train.offset;
        let mut segment = train.segment;
        while remaining > 0.0 {
            match self.exit_of(segment, true) {
                Some(prev) => {
                    covered.push(prev);
                    remaining -= self.segment_length(prev, self.route_of(prev));
                    segment = prev;
                }
                None => break,
            }
        }
        covered
    }

    fn update_sensors(&mut self) -> Vec<Message> {
        let mut occupied = vec![0usize; self.sensors.len()];
        for train in &self.trains {
            for segment in self.covered_segments(train) {
                if let Some(slot) = occupied.get_mut(segment) {
                    *slot += 1;
                }
            }
        }

        let mut changes = Vec::new();
        for (index, count) in occupied.into_iter().enumerate() {
            let Some(sensor) = self.sensors.get_mut(index) else {
                continue;
            };
            sensor.occupied = count;
            let value = count > 0;
            if sensor.value != value {
                sensor.value = value;
                if let Some(cfg) = self.layout.segments.get(index).and_then(|s| s.sensor) {
                    changes.push(Message::SensorChanged {
                        channel: cfg.channel,
                        address: cfg.address,
                        value,
                    });
                }
            }
        }
        changes
    }

    /// Current value of the sensor attached to a segment.
    pub fn sensor_value(&self, segment: usize) -> bool {
        self.sensors.get(segment).is_some_and(|s| s.value)
    }

    /// Current head position of a train as `(segment, offset)`.
    pub fn train_position(&self, train: usize) -> Option<(usize, f32)> {
        self.trains.get(train).map(|t| (t.segment, t.offset))
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
