// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The world: every domain object, the derived path structures, and the
//! mutation entry points that keep signals, blocks and reservations
//! consistent.
//!
//! All methods run on the event-loop task; nothing here is locked.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::arena::Arena;
use crate::board::tile::{Tile, TileKind, TileRef};
use crate::board::Board;
use crate::enums::{
    BlockState, DecouplerState, ExtOutputChangeAction, SensorState, TurnoutPosition,
};
use crate::event::{EventArg, EventBus};
use crate::exec::EventLoopHandle;
use crate::hw::interface::Interface;
use crate::interlock::nx::NxManager;
use crate::output::map::OutputCommand;
use crate::path::block_path::{self, BlockPath};
use crate::path::signal_path::SignalPath;
use crate::signal::aspect::{ItalianAspect, SignalAspect};
use crate::signal::rules::{self, AspectContext};
use crate::train::{Train, TrainId};

/// World-wide interlocking options.
#[derive(Debug, Clone, Default)]
pub struct WorldOptions {
    /// Push locked devices back when they change under external control.
    pub correct_output_pos_when_locked: bool,
    /// Escalation when the retry budget is exhausted.
    pub ext_output_change_action: ExtOutputChangeAction,
}

/// Hardware-bound side effect produced by a domain mutation. The event loop
/// forwards these to the online interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwAction {
    Output { device: String, command: OutputCommand },
    TrackPower(bool),
    EmergencyStop,
    Throttle { address: u16, speed: u8, emergency_stop: bool },
}

#[derive(Debug, Default)]
pub struct World {
    pub board: Board,
    pub paths: Arena<BlockPath>,
    pub trains: Arena<Train>,
    pub interfaces: IndexMap<String, Interface>,
    /// Object id -> tile, insertion ordered.
    pub objects: IndexMap<String, TileRef>,
    pub signal_paths: HashMap<TileRef, SignalPath>,
    pub nx: NxManager,
    pub events: EventBus,
    pub options: WorldOptions,
    pub running: bool,
    pub power_on: bool,
    /// Device -> signals whose look-ahead subscribes to it.
    pub(crate) subscribers: HashMap<TileRef, Vec<TileRef>>,
    /// Side effects for the hardware layer, drained by the event loop.
    pub pending_hw: Vec<HwAction>,
    /// Present when running under an event loop; enables timers.
    pub handle: Option<EventLoopHandle>,
    /// `(channel, address)` of hardware occupancy inputs -> block input item.
    input_routes: HashMap<(u16, u16), (TileRef, usize)>,
    id_counters: HashMap<&'static str, u32>,
}

impl World {
    pub fn new() -> Self {
        Self { events: EventBus::new(), ..Self::default() }
    }

    // -- objects -------------------------------------------------------------

    fn id_prefix(kind: &TileKind) -> &'static str {
        match kind {
            TileKind::Block(_) => "block",
            TileKind::Turnout(..) => "turnout",
            TileKind::Signal(_) => "signal",
            TileKind::DirectionControl(_) => "direction_control",
            TileKind::Decoupler(_) => "decoupler",
            TileKind::Link(_) => "link",
            TileKind::NxButton(_) => "nx_button",
            TileKind::Sensor(_) => "sensor",
            TileKind::PushButton => "push_button",
            TileKind::Label => "label",
            TileKind::Switch => "switch",
            _ => "tile",
        }
    }

    /// Place a tile; active tiles get a generated object id when none is set.
    pub fn add_tile(&mut self, mut tile: Tile) -> anyhow::Result<TileRef> {
        let active = tile.tile_id().is_active();
        if active && tile.id.is_empty() {
            let prefix = Self::id_prefix(&tile.kind);
            let counter = self.id_counters.entry(prefix).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{prefix}_{counter}");
                if !self.objects.contains_key(&candidate) {
                    tile.id = candidate;
                    break;
                }
            }
        }
        if !tile.id.is_empty() && self.objects.contains_key(&tile.id) {
            anyhow::bail!("duplicate object id {}", tile.id);
        }
        let id = tile.id.clone();
        let tile_ref = self
            .board
            .add(tile)
            .map_err(|t| anyhow::anyhow!("cell ({}, {}) already occupied", t.x, t.y))?;
        if !id.is_empty() {
            self.objects.insert(id, tile_ref);
        }
        Ok(tile_ref)
    }

    pub fn remove_tile(&mut self, tile_ref: TileRef) {
        if let Some(tile) = self.board.remove(tile_ref) {
            if !tile.id.is_empty() {
                self.objects.shift_remove(&tile.id);
            }
        }
        self.signal_paths.remove(&tile_ref);
    }

    pub fn object(&self, id: &str) -> Option<TileRef> {
        self.objects.get(id).copied()
    }

    pub fn object_id(&self, tile: TileRef) -> String {
        self.board.tile(tile).map(|t| t.id.clone()).unwrap_or_default()
    }

    pub fn add_train(&mut self, id: impl Into<String>) -> TrainId {
        self.trains.insert(Train::new(id))
    }

    // -- board derivation ----------------------------------------------------

    /// Recompute the graph, the block paths and the signal paths. Clears all
    /// reservations: a modified board invalidates every derived structure.
    pub fn board_modified(&mut self) {
        self.board.rebuild_graph();

        // Drop every reservation and derived path.
        self.paths.clear();
        for tile_ref in self.board.tiles.handles() {
            if let Some(tile) = self.board.tile_mut(tile_ref) {
                match &mut tile.kind {
                    TileKind::Block(b) => {
                        b.paths.clear();
                        b.paths_in.clear();
                        b.reserved = [None, None];
                    }
                    TileKind::Turnout(_, t) => {
                        t.reserved = None;
                        t.retry.reset();
                    }
                    TileKind::Signal(s) => {
                        s.reserved_path = None;
                        s.retry.reset();
                    }
                    TileKind::DirectionControl(dc) => dc.reserved = None,
                    TileKind::Cross45(c) | TileKind::Cross90(c) => c.reserved = None,
                    TileKind::Bridge45Left(b)
                    | TileKind::Bridge45Right(b)
                    | TileKind::Bridge90(b) => b.reserved.clear(),
                    _ => {}
                }
            }
        }

        // Rediscover block paths.
        let blocks: Vec<TileRef> = self
            .board
            .tiles
            .iter()
            .filter(|(_, t)| matches!(t.kind, TileKind::Block(_)))
            .map(|(h, _)| h)
            .collect();
        for block in &blocks {
            let discovered = block_path::find(&self.board, *block);
            let mut ids = Vec::with_capacity(discovered.len());
            for path in discovered {
                let to_block = path.to_block;
                let id = self.paths.insert(path);
                ids.push(id);
                if let Some(b) = self.board.tile_mut(to_block).and_then(Tile::as_block_mut) {
                    b.paths_in.push(id);
                }
            }
            if let Some(b) = self.board.tile_mut(*block).and_then(Tile::as_block_mut) {
                b.paths = ids;
            }
        }

        // NX buttons resolve their block.
        crate::interlock::nx::resolve_buttons(self);

        // Rebuild signal look-ahead trees and the subscription index.
        self.subscribers.clear();
        self.signal_paths.clear();
        let signals: Vec<TileRef> = self
            .board
            .tiles
            .iter()
            .filter(|(_, t)| matches!(t.kind, TileKind::Signal(_)))
            .map(|(h, _)| h)
            .collect();
        for signal in &signals {
            let blocks_ahead = self
                .board
                .tile(*signal)
                .and_then(Tile::as_signal)
                .map_or(1, |s| s.kind.blocks_ahead());
            let sp = SignalPath::build(&self.board, *signal, blocks_ahead);
            for device in &sp.subscriptions {
                self.subscribers.entry(*device).or_default().push(*signal);
            }
            self.signal_paths.insert(*signal, sp);
        }
        for signal in signals {
            self.evaluate_signal(signal);
        }
        info!(
            blocks = blocks.len(),
            paths = self.paths.len(),
            "board derivation complete"
        );
    }

    // -- signals -------------------------------------------------------------

    /// Re-run the aspect rule of one signal.
    pub fn evaluate_signal(&mut self, signal: TileRef) {
        let Some(sp) = self.signal_paths.remove(&signal) else {
            let ita = match self.board.tile(signal).and_then(Tile::as_signal) {
                Some(s) if s.kind == crate::board::tile::SignalKind::Italian => {
                    ItalianAspect::VIA_IMPEDITA
                }
                _ => ItalianAspect::UNKNOWN,
            };
            self.set_aspect(signal, SignalAspect::Stop, ita, false);
            return;
        };
        let (aspect, aspect_ita) = {
            let ctx = AspectContext { board: &self.board, paths: &self.paths };
            rules::evaluate(&ctx, signal, &sp)
        };
        self.signal_paths.insert(signal, sp);
        self.set_aspect(signal, aspect, aspect_ita, false);
    }

    /// Store a new aspect, execute its output map entry unless `skip_action`,
    /// and fan the change out. Returns false for unknown tiles.
    pub fn set_aspect(
        &mut self,
        signal: TileRef,
        aspect: SignalAspect,
        aspect_ita: ItalianAspect,
        skip_action: bool,
    ) -> bool {
        let id = self.object_id(signal);
        let Some(state) = self.board.tile_mut(signal).and_then(Tile::as_signal_mut) else {
            return false;
        };
        if state.aspect == aspect && state.aspect_ita == aspect_ita {
            return true;
        }
        state.aspect = aspect;
        state.aspect_ita = aspect_ita;
        let commands = if skip_action { Vec::new() } else { state.output_map.execute(aspect) };
        for command in commands {
            self.pending_hw.push(HwAction::Output { device: id.clone(), command });
        }
        self.events.fire(
            &id,
            "on_aspect_changed",
            vec![EventArg::Object(id.clone()), EventArg::Enum("signal_aspect", aspect.as_str())],
        );
        self.notify_changed(signal);
        true
    }

    /// Evaluate every signal subscribed to `device`.
    pub fn notify_changed(&mut self, device: TileRef) {
        let watchers = self.subscribers.get(&device).cloned().unwrap_or_default();
        for signal in watchers {
            self.evaluate_signal(signal);
        }
    }

    // -- turnouts ------------------------------------------------------------

    /// User/script request. Refused while the turnout is locked to another
    /// position.
    pub fn throw_turnout(&mut self, turnout: TileRef, position: TurnoutPosition) -> bool {
        let Some(state) = self.board.tile(turnout).and_then(Tile::as_turnout) else {
            return false;
        };
        let reserved = state.reserved_position();
        if reserved != TurnoutPosition::Unknown && reserved != position {
            return false;
        }
        self.do_set_position(turnout, position, false)
    }

    /// Unconditional position change. `skip_action` suppresses the output
    /// map (used when the change was reported by the hardware itself).
    pub fn do_set_position(
        &mut self,
        turnout: TileRef,
        position: TurnoutPosition,
        skip_action: bool,
    ) -> bool {
        let id = self.object_id(turnout);
        let Some(tile) = self.board.tile(turnout) else {
            return false;
        };
        if !crate::board::tile::valid_positions(tile.tile_id()).contains(&position) {
            return false;
        }
        let Some(state) = self.board.tile_mut(turnout).and_then(Tile::as_turnout_mut) else {
            return false;
        };
        state.position = position;
        let commands = if skip_action { Vec::new() } else { state.output_map.execute(position) };
        for command in commands {
            self.pending_hw.push(HwAction::Output { device: id.clone(), command });
        }
        self.events.fire(
            &id,
            "on_position_changed",
            vec![
                EventArg::Object(id.clone()),
                EventArg::Enum("turnout_position", position.as_str()),
            ],
        );
        self.notify_changed(turnout);
        true
    }

    // -- blocks --------------------------------------------------------------

    /// Feed one input map item. Missing items up to `index` are created as
    /// occupancy detectors.
    pub fn set_block_input(&mut self, block: TileRef, index: usize, value: SensorState) {
        if let Some(state) = self.board.tile_mut(block).and_then(Tile::as_block_mut) {
            while state.input_map.len() <= index {
                state.input_map.push(crate::board::tile::BlockInputItem::occupy_detector());
            }
            state.input_map[index].value = value;
        }
        self.update_block_state(block);
    }

    /// Route a hardware occupancy address onto a block input item.
    pub fn assign_block_input_address(
        &mut self,
        block: TileRef,
        index: usize,
        channel: u16,
        address: u16,
    ) {
        self.input_routes.insert((channel, address), (block, index));
    }

    /// A hardware sensor reported a value; feed the routed block input, if
    /// any, and notify scripts.
    pub fn sensor_report(&mut self, channel: u16, address: u16, occupied: bool) {
        if let Some((block, index)) = self.input_routes.get(&(channel, address)).copied() {
            self.set_block_input(
                block,
                index,
                if occupied { SensorState::Occupied } else { SensorState::Free },
            );
        }
        self.events.fire(
            "world",
            "on_sensor_changed",
            vec![
                EventArg::Int(i64::from(channel)),
                EventArg::Int(i64::from(address)),
                EventArg::Bool(occupied),
            ],
        );
    }

    /// Convenience: single-detector occupancy.
    pub fn set_block_occupied(&mut self, block: TileRef, occupied: bool) {
        self.set_block_input(
            block,
            0,
            if occupied { SensorState::Occupied } else { SensorState::Free },
        );
    }

    /// Recompute a block's state from its inputs and reservations.
    pub fn update_block_state(&mut self, block: TileRef) {
        let Some(state) = self.board.tile(block).and_then(Tile::as_block) else {
            return;
        };
        let any_occupied = state.input_map.iter().any(|i| i.value == SensorState::Occupied);
        let any_unknown = state.input_map.iter().any(|i| i.value == SensorState::Unknown);
        let reserved = state.reserved.iter().any(Option::is_some);
        let next = if any_occupied {
            BlockState::Occupied
        } else if reserved {
            BlockState::Reserved
        } else if any_unknown {
            BlockState::Unknown
        } else {
            BlockState::Free
        };
        self.set_block_state(block, next);
    }

    pub fn set_block_state(&mut self, block: TileRef, state: BlockState) {
        let id = self.object_id(block);
        let Some(b) = self.board.tile_mut(block).and_then(Tile::as_block_mut) else {
            return;
        };
        if b.state == state {
            return;
        }
        b.state = state;
        self.events.fire(
            &id,
            "on_state_changed",
            vec![EventArg::Object(id.clone()), EventArg::Enum("block_state", state.as_str())],
        );
        self.notify_changed(block);
    }

    /// Assign a train to a block (user action, e.g. placing stock).
    pub fn assign_train(&mut self, block: TileRef, train: TrainId) {
        let id = self.object_id(block);
        if let Some(b) = self.board.tile_mut(block).and_then(Tile::as_block_mut) {
            if !b.trains.contains(&train) {
                b.trains.push(train);
            }
        }
        let train_id = self.trains.get(train).map(|t| t.id.clone()).unwrap_or_default();
        if let Some(t) = self.trains.get_mut(train) {
            if !t.blocks.contains(&block) {
                t.blocks.push(block);
            }
        }
        self.events.fire(
            &id,
            "on_train_assigned",
            vec![EventArg::Object(train_id), EventArg::Object(id.clone())],
        );
    }

    pub fn remove_train_from_block(&mut self, block: TileRef, train: TrainId) {
        if let Some(b) = self.board.tile_mut(block).and_then(Tile::as_block_mut) {
            b.trains.retain(|t| *t != train);
        }
        if let Some(t) = self.trains.get_mut(train) {
            t.blocks.retain(|b| *b != block);
        }
    }

    // -- direction controls --------------------------------------------------

    /// Change a direction control. Refused while a reservation depends on a
    /// direction the new state would forbid.
    pub fn set_direction_control_state(
        &mut self,
        tile: TileRef,
        state: crate::enums::DirectionControlState,
    ) -> bool {
        let id = self.object_id(tile);
        let Some(TileKind::DirectionControl(dc)) = self.board.tile_mut(tile).map(|t| &mut t.kind)
        else {
            return false;
        };
        if let Some((_, required)) = dc.reserved {
            if !state.permits(required) {
                return false;
            }
        }
        dc.state = state;
        self.events.fire(
            &id,
            "on_state_changed",
            vec![
                EventArg::Object(id.clone()),
                EventArg::Enum("direction_control_state", state.as_str()),
            ],
        );
        self.notify_changed(tile);
        true
    }

    // -- trains --------------------------------------------------------------

    pub fn train_by_id(&self, id: &str) -> Option<TrainId> {
        self.trains.iter().find(|(_, t)| t.id == id).map(|(h, _)| h)
    }

    /// Set a train's target speed in throttle steps (0..126). Refused while
    /// the train is emergency stopped.
    pub fn set_train_speed(&mut self, train: TrainId, speed: f64) -> bool {
        let Some(t) = self.trains.get_mut(train) else {
            return false;
        };
        if t.emergency_stop && speed > 0.0 {
            return false;
        }
        t.target_speed = speed.clamp(0.0, 126.0);
        let id = t.id.clone();
        if let Some(address) = t.address {
            let step = t.target_speed.round() as u8;
            self.pending_hw.push(HwAction::Throttle {
                address,
                speed: step,
                emergency_stop: false,
            });
        }
        self.events.fire(&id, "on_speed_changed", vec![EventArg::Object(id.clone())]);
        true
    }

    /// Clear a train's emergency stop; the target speed stays zero.
    pub fn reset_emergency_stop(&mut self, train: TrainId) -> bool {
        let Some(t) = self.trains.get_mut(train) else {
            return false;
        };
        t.emergency_stop = false;
        true
    }

    // -- decouplers ----------------------------------------------------------

    pub fn set_decoupler(&mut self, decoupler: TileRef, state: DecouplerState) -> bool {
        let id = self.object_id(decoupler);
        let Some(tile) = self.board.tile_mut(decoupler) else {
            return false;
        };
        let TileKind::Decoupler(d) = &mut tile.kind else {
            return false;
        };
        d.state = state;
        for command in d.output_map.execute(state) {
            self.pending_hw.push(HwAction::Output { device: id.clone(), command });
        }
        self.events.fire(&id, "on_state_changed", vec![EventArg::Object(id.clone())]);
        true
    }

    // -- world state ---------------------------------------------------------

    pub fn run(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.events.fire("world", "on_run", Vec::new());
        let signals: Vec<TileRef> = self.signal_paths.keys().copied().collect();
        for signal in signals {
            self.evaluate_signal(signal);
        }
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.events.fire("world", "on_stop", Vec::new());
    }

    pub fn set_power(&mut self, on: bool) {
        if self.power_on == on {
            return;
        }
        self.power_on = on;
        self.pending_hw.push(HwAction::TrackPower(on));
        self.events.fire("world", if on { "on_power_on" } else { "on_power_off" }, Vec::new());
    }

    pub fn power_off(&mut self) {
        self.set_power(false);
    }

    /// Emergency stop a single train; returns whether it was newly stopped.
    pub fn emergency_stop_train(&mut self, train: TrainId) -> bool {
        let Some(t) = self.trains.get_mut(train) else {
            return false;
        };
        if !t.set_emergency_stop() {
            return false;
        }
        let id = t.id.clone();
        let address = t.address;
        warn!(train = %id, "train emergency stopped");
        self.events.fire(&id, "on_emergency_stop", vec![EventArg::Object(id.clone())]);
        match address {
            Some(address) => self.pending_hw.push(HwAction::Throttle {
                address,
                speed: 0,
                emergency_stop: true,
            }),
            None => self.pending_hw.push(HwAction::EmergencyStop),
        }
        true
    }

    /// Drain the queued hardware actions.
    pub fn take_hw_actions(&mut self) -> Vec<HwAction> {
        std::mem::take(&mut self.pending_hw)
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
