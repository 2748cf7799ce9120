// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded scripting: a sandboxed interpreter over the domain objects.
//!
//! Scripts observe domain events, read and (where permitted) write object
//! properties, call methods, and keep persistent variables. Each top-level
//! invocation runs under a hard 10 ms execution budget.

pub mod ast;
pub mod bridge;
pub mod interp;
pub mod lexer;
pub mod sandbox;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{error, info};

use crate::event::{EventArg, HandlerRef, PendingEvent};
use crate::world::World;

use ast::Block;
use bridge::WorldBridge;
use interp::{Exec, ScriptError, Vm};
use value::{Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptState {
    #[default]
    Stopped,
    Running,
    Error,
}

/// One script: source, compiled chunk, interpreter state.
pub struct Script {
    pub id: String,
    pub source: String,
    pub state: ScriptState,
    vm: Vm,
    chunk: Option<Block>,
}

impl Script {
    fn new(id: String, source: String) -> Self {
        Self { id, source, state: ScriptState::Stopped, vm: Vm::new(), chunk: None }
    }
}

/// Owns all scripts and their persistent variables. Lives next to the world
/// on the event-loop task.
#[derive(Default)]
pub struct ScriptHost {
    scripts: IndexMap<String, Script>,
    /// Per-script persistent dictionaries; survive script restarts.
    persistent: HashMap<String, Value>,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_script(&mut self, id: impl Into<String>, source: impl Into<String>) {
        let id = id.into();
        self.scripts.insert(id.clone(), Script::new(id, source.into()));
    }

    pub fn state(&self, id: &str) -> ScriptState {
        self.scripts.get(id).map(|s| s.state).unwrap_or_default()
    }

    /// Read a script global; test support.
    pub fn debug_global(&self, id: &str, name: &str) -> Value {
        self.scripts
            .get(id)
            .and_then(|s| s.vm.globals.borrow().get(name).cloned())
            .unwrap_or(Value::Nil)
    }

    /// Read a persistent variable; test support.
    pub fn debug_persistent(&self, id: &str, key: &str) -> Value {
        let Some(Value::Table(table)) = self.persistent.get(id) else {
            return Value::Nil;
        };
        table
            .borrow()
            .map
            .get(&value::Key::Str(Rc::from(key)))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    fn persistent_table(&mut self, id: &str) -> Value {
        self.persistent
            .entry(id.to_owned())
            .or_insert_with(|| {
                Value::Table(Rc::new(RefCell::new(Table {
                    map: Default::default(),
                    restricted: true,
                })))
            })
            .clone()
    }

    /// Compile and run a script's top level, then its `init()` if defined.
    pub fn start(&mut self, world: &mut World, id: &str) -> Result<(), ScriptError> {
        let pv = self.persistent_table(id);
        let Some(script) = self.scripts.get_mut(id) else {
            return Err(ScriptError::new("no such script"));
        };
        let chunk = ast::parse(&script.source)
            .map_err(|e| ScriptError::new(e.to_string()))?;

        script.vm = Vm::new();
        sandbox::install_globals(&mut script.vm, pv);

        let mut bridge = WorldBridge { world };
        let result = {
            let mut exec = Exec::new(&mut script.vm, &mut bridge, &script.id);
            exec.run_chunk(&chunk).and_then(|()| {
                exec.call_global("init", Vec::new()).map(|_| ())
            })
        };
        match result {
            Ok(()) => {
                script.chunk = Some(chunk);
                script.state = ScriptState::Running;
                info!(script = %script.id, "script started");
                Ok(())
            }
            Err(e) => {
                script.state = ScriptState::Error;
                world.events.disconnect_script(id);
                Err(e)
            }
        }
    }

    /// Run `fini()` if defined, disconnect every handler, tear down the
    /// sandbox. Persistent variables survive.
    pub fn stop(&mut self, world: &mut World, id: &str) {
        let Some(script) = self.scripts.get_mut(id) else {
            return;
        };
        if script.state == ScriptState::Running {
            let mut bridge = WorldBridge { world };
            let mut exec = Exec::new(&mut script.vm, &mut bridge, &script.id);
            if let Err(e) = exec.call_global("fini", Vec::new()) {
                error!(script = %script.id, error = %e, "fini failed");
            }
        }
        world.events.disconnect_script(id);
        script.vm = Vm::new();
        script.chunk = None;
        script.state = ScriptState::Stopped;
        info!(script = %id, "script stopped");
    }

    /// Drain fired events, invoking the snapshotted handlers.
    pub fn pump(&mut self, world: &mut World) {
        // Handlers can fire further events; drain until quiet, with a guard
        // against event storms.
        let mut rounds = 0usize;
        while let Some(event) = world.events.pending.pop_front() {
            rounds += 1;
            if rounds > 10_000 {
                error!("event queue storm, dropping remainder");
                world.events.pending.clear();
                break;
            }
            for handler in &event.handlers {
                self.invoke(world, handler, &event);
            }
        }
    }

    fn invoke(&mut self, world: &mut World, handler: &HandlerRef, event: &PendingEvent) {
        let Some(script) = self.scripts.get_mut(&handler.script) else {
            return;
        };
        if script.state != ScriptState::Running {
            return;
        }
        let mut args: Vec<Value> = event.args.iter().map(arg_to_value).collect();
        if let Some(user_key) = handler.user_data {
            if let Some(user) = script.vm.registry.get(&user_key).cloned() {
                args.push(user);
            }
        }
        let mut bridge = WorldBridge { world };
        let result = {
            let mut exec = Exec::new(&mut script.vm, &mut bridge, &script.id);
            exec.call_registered(handler.func, args)
        };
        if let Err(e) = result {
            // The handler stays registered; it may fail again on the next
            // event.
            error!(
                code = "E9001",
                script = %handler.script,
                event = format!("{}.{}", event.object, event.event),
                error = %e,
                "error during event handler"
            );
        }
    }
}

fn arg_to_value(arg: &EventArg) -> Value {
    match arg {
        EventArg::Nil => Value::Nil,
        EventArg::Bool(b) => Value::Bool(*b),
        EventArg::Int(i) => Value::Int(*i),
        EventArg::Float(f) => Value::Num(*f),
        EventArg::Str(s) => Value::str(s),
        EventArg::Object(id) => Value::Object(Rc::from(id.as_str())),
        EventArg::Enum(type_name, name) => Value::Enum {
            type_name,
            name: Rc::from(*name),
            value: sandbox::enum_value(type_name, name).unwrap_or(0),
        },
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
