// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host side of the scripting bridge: property access, method calls, event
//! connect/disconnect, and logging, all dispatched into the world.

use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::board::tile::{Tile, TileKind};
use crate::enums::AutoYesNo;
use crate::script::interp::{ScriptError, SResult, ERR_DEAD_OBJECT};
use crate::script::sandbox;
use crate::script::value::Value;
use crate::signal::aspect::SignalAspect;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Fatal,
}

/// What the interpreter needs from the host.
pub trait HostBridge {
    fn index_object(&mut self, id: &str, name: &str) -> SResult<Value>;
    fn set_property(&mut self, id: &str, name: &str, value: Value) -> SResult<()>;
    fn call_method(&mut self, id: &str, name: &str, args: &[Value]) -> SResult<Value>;
    fn connect_event(
        &mut self,
        script: &str,
        object: &str,
        event: &str,
        func: u32,
        user_data: Option<u32>,
    ) -> SResult<i64>;
    fn disconnect_event(&mut self, handle: i64) -> bool;
    fn log(&mut self, script: &str, level: LogLevel, message: String);
}

/// Bridge implementation over the live world.
pub struct WorldBridge<'a> {
    pub world: &'a mut World,
}

fn enum_arg(type_name: &str, value: &Value) -> Option<i64> {
    match value {
        Value::Enum { type_name: t, value, .. } if *t == type_name => Some(*value),
        Value::Str(s) => sandbox::enum_value(type_name, s),
        Value::Int(i) => Some(*i),
        _ => None,
    }
}

fn enum_result(type_name: &'static str, value: i64) -> Value {
    let name = sandbox::enum_name(type_name, value).unwrap_or("unknown");
    Value::Enum { type_name, name: Rc::from(name), value }
}

impl WorldBridge<'_> {
    fn tile(&self, id: &str) -> SResult<&Tile> {
        self.world
            .object(id)
            .and_then(|r| self.world.board.tile(r))
            .ok_or_else(|| ScriptError::new(ERR_DEAD_OBJECT))
    }
}

impl HostBridge for WorldBridge<'_> {
    fn index_object(&mut self, id: &str, name: &str) -> SResult<Value> {
        // Events are properties of every object.
        if name.starts_with("on_") {
            let known = id == "world"
                || self.world.object(id).is_some()
                || self.world.train_by_id(id).is_some();
            if !known {
                return Err(ScriptError::new(ERR_DEAD_OBJECT));
            }
            return Ok(Value::Event { object: Rc::from(id), event: Rc::from(name) });
        }
        if id == "world" {
            return Ok(match name {
                "running" => Value::Bool(self.world.running),
                "power_on" => Value::Bool(self.world.power_on),
                "stop" | "run" | "power_off" | "power_on_tracks" | "get_object" => {
                    Value::Method { object: Rc::from(id), method: Rc::from(name) }
                }
                _ => Value::Nil,
            });
        }

        // Trains are world objects too, addressed by their id.
        if self.world.object(id).is_none() {
            if let Some(train) = self.world.train_by_id(id) {
                let Some(t) = self.world.trains.get(train) else {
                    return Err(ScriptError::new(ERR_DEAD_OBJECT));
                };
                return Ok(match name {
                    "id" | "name" => Value::str(&t.id),
                    "speed" => Value::Num(t.target_speed),
                    "emergency_stop" => Value::Bool(t.emergency_stop),
                    "set_speed" | "stop" => {
                        Value::Method { object: Rc::from(id), method: Rc::from(name) }
                    }
                    _ => Value::Nil,
                });
            }
        }

        let tile = self.tile(id)?;
        Ok(match (&tile.kind, name) {
            (_, "id") | (_, "name") => Value::str(&tile.id),
            (TileKind::Turnout(_, t), "position") => {
                enum_result("turnout_position", t.position as i64)
            }
            (TileKind::Turnout(_, t), "reserved_position") => {
                enum_result("turnout_position", t.reserved_position() as i64)
            }
            (TileKind::Turnout(..), "set_position") => {
                Value::Method { object: Rc::from(id), method: Rc::from(name) }
            }
            (TileKind::Signal(s), "aspect") => enum_result("signal_aspect", s.aspect as i64),
            (TileKind::Signal(s), "require_reservation") => {
                enum_result("auto_yes_no", s.require_reservation as i64)
            }
            (TileKind::Signal(_), "set_aspect") => {
                Value::Method { object: Rc::from(id), method: Rc::from(name) }
            }
            (TileKind::Block(b), "state") => enum_result("block_state", b.state as i64),
            (TileKind::Block(b), "sensor_states") => {
                // Vector property: a fresh sequence of the current values.
                let table = Value::table();
                if let Value::Table(t) = &table {
                    let mut t = t.borrow_mut();
                    for (i, item) in b.input_map.iter().enumerate() {
                        t.map.insert(
                            crate::script::value::Key::Int(i as i64 + 1),
                            enum_result("sensor_state", item.value as i64),
                        );
                    }
                }
                table
            }
            (TileKind::DirectionControl(dc), "state") => {
                enum_result("direction_control_state", dc.state as i64)
            }
            (TileKind::DirectionControl(_), "set_state") => {
                Value::Method { object: Rc::from(id), method: Rc::from(name) }
            }
            (TileKind::NxButton(b), "enabled") => Value::Bool(b.enabled),
            (TileKind::Decoupler(d), "state") => {
                enum_result("decoupler_state", d.state as i64)
            }
            (TileKind::Sensor(s), "value") => Value::Bool(
                s.value == crate::enums::SensorState::Occupied,
            ),
            _ => Value::Nil,
        })
    }

    fn set_property(&mut self, id: &str, name: &str, value: Value) -> SResult<()> {
        let tile_ref =
            self.world.object(id).ok_or_else(|| ScriptError::new(ERR_DEAD_OBJECT))?;
        match name {
            "require_reservation" => {
                let v = enum_arg("auto_yes_no", &value)
                    .ok_or_else(|| ScriptError::new("expected auto_yes_no value"))?;
                let new = match v {
                    1 => AutoYesNo::Yes,
                    2 => AutoYesNo::No,
                    _ => AutoYesNo::Auto,
                };
                let Some(signal) =
                    self.world.board.tile_mut(tile_ref).and_then(Tile::as_signal_mut)
                else {
                    return Err(ScriptError::new("property require_reservation is read-only"));
                };
                signal.require_reservation = new;
                self.world.evaluate_signal(tile_ref);
                Ok(())
            }
            other => Err(ScriptError::new(format!("property {other} is read-only"))),
        }
    }

    fn call_method(&mut self, id: &str, name: &str, args: &[Value]) -> SResult<Value> {
        if id == "world" {
            return match name {
                "stop" => {
                    self.world.stop();
                    Ok(Value::Nil)
                }
                "run" => {
                    self.world.run();
                    Ok(Value::Nil)
                }
                "power_off" => {
                    self.world.power_off();
                    Ok(Value::Nil)
                }
                "power_on_tracks" => {
                    self.world.set_power(true);
                    Ok(Value::Nil)
                }
                "get_object" => {
                    let key = args.first().map(Value::display).unwrap_or_default();
                    let exists =
                        self.world.object(&key).is_some() || self.world.train_by_id(&key).is_some();
                    Ok(if exists { Value::Object(Rc::from(key.as_str())) } else { Value::Nil })
                }
                other => Err(ScriptError::new(format!("unknown method world:{other}"))),
            };
        }

        // Train throttle methods.
        if self.world.object(id).is_none() {
            if let Some(train) = self.world.train_by_id(id) {
                return match name {
                    "set_speed" => {
                        let speed = args
                            .first()
                            .and_then(Value::as_number)
                            .ok_or_else(|| ScriptError::new("set_speed expects a number"))?;
                        Ok(Value::Bool(self.world.set_train_speed(train, speed)))
                    }
                    "stop" => Ok(Value::Bool(self.world.emergency_stop_train(train))),
                    other => Err(ScriptError::new(format!("unknown method {id}:{other}"))),
                };
            }
        }

        let tile_ref =
            self.world.object(id).ok_or_else(|| ScriptError::new(ERR_DEAD_OBJECT))?;
        let kind_is = |world: &World, f: fn(&TileKind) -> bool| {
            world.board.tile(tile_ref).map(|t| f(&t.kind)).unwrap_or(false)
        };
        match name {
            "set_position" if kind_is(self.world, |k| matches!(k, TileKind::Turnout(..))) => {
                let v = args
                    .first()
                    .and_then(|v| enum_arg("turnout_position", v))
                    .ok_or_else(|| ScriptError::new("expected turnout_position value"))?;
                let position = match v {
                    1 => crate::enums::TurnoutPosition::Straight,
                    2 => crate::enums::TurnoutPosition::Left,
                    3 => crate::enums::TurnoutPosition::Right,
                    4 => crate::enums::TurnoutPosition::Crossed,
                    5 => crate::enums::TurnoutPosition::Diverged,
                    6 => crate::enums::TurnoutPosition::DoubleSlipStraightA,
                    7 => crate::enums::TurnoutPosition::DoubleSlipStraightB,
                    _ => crate::enums::TurnoutPosition::Unknown,
                };
                Ok(Value::Bool(self.world.throw_turnout(tile_ref, position)))
            }
            "set_aspect" if kind_is(self.world, |k| matches!(k, TileKind::Signal(_))) => {
                let v = args
                    .first()
                    .and_then(|v| enum_arg("signal_aspect", v))
                    .ok_or_else(|| ScriptError::new("expected signal_aspect value"))?;
                let aspect = match v {
                    1 => SignalAspect::Stop,
                    2 => SignalAspect::Proceed,
                    3 => SignalAspect::ProceedReducedSpeed,
                    _ => SignalAspect::Unknown,
                };
                let ita = self
                    .world
                    .board
                    .tile(tile_ref)
                    .and_then(Tile::as_signal)
                    .map(|s| s.aspect_ita)
                    .unwrap_or(crate::signal::aspect::ItalianAspect::UNKNOWN);
                Ok(Value::Bool(self.world.set_aspect(tile_ref, aspect, ita, false)))
            }
            "set_state" if kind_is(self.world, |k| matches!(k, TileKind::DirectionControl(_))) => {
                let v = args
                    .first()
                    .and_then(|v| enum_arg("direction_control_state", v))
                    .ok_or_else(|| ScriptError::new("expected direction_control_state value"))?;
                let state = match v {
                    1 => crate::enums::DirectionControlState::AtoB,
                    2 => crate::enums::DirectionControlState::BtoA,
                    3 => crate::enums::DirectionControlState::Both,
                    _ => crate::enums::DirectionControlState::None,
                };
                Ok(Value::Bool(self.world.set_direction_control_state(tile_ref, state)))
            }
            "activate" if kind_is(self.world, |k| matches!(k, TileKind::Decoupler(_))) => {
                Ok(Value::Bool(
                    self.world.set_decoupler(tile_ref, crate::enums::DecouplerState::Activated),
                ))
            }
            "deactivate" if kind_is(self.world, |k| matches!(k, TileKind::Decoupler(_))) => {
                Ok(Value::Bool(
                    self.world
                        .set_decoupler(tile_ref, crate::enums::DecouplerState::Deactivated),
                ))
            }
            other => Err(ScriptError::new(format!("unknown method {id}:{other}"))),
        }
    }

    fn connect_event(
        &mut self,
        script: &str,
        object: &str,
        event: &str,
        func: u32,
        user_data: Option<u32>,
    ) -> SResult<i64> {
        let known = object == "world"
            || self.world.object(object).is_some()
            || self.world.train_by_id(object).is_some();
        if !known {
            return Err(ScriptError::new(ERR_DEAD_OBJECT));
        }
        let handle = self.world.events.connect(object, event, script, func, user_data);
        Ok(handle as i64)
    }

    fn disconnect_event(&mut self, handle: i64) -> bool {
        u64::try_from(handle).map(|h| self.world.events.disconnect(h)).unwrap_or(false)
    }

    fn log(&mut self, script: &str, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => debug!(script, "{message}"),
            LogLevel::Info | LogLevel::Notice => info!(script, "{message}"),
            LogLevel::Warning => warn!(script, "{message}"),
            LogLevel::Error | LogLevel::Critical | LogLevel::Fatal => {
                error!(script, "{message}")
            }
        }
    }
}
