// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script-visible event dispatch.
//!
//! Handlers are registered per `(object id, event name)` and identified by an
//! integer handle. Firing snapshots the handler list, so a handler that
//! disconnects itself (or others) while running cannot corrupt dispatch; the
//! snapshot is queued and executed by the script host after the current
//! domain mutation completes.

use std::collections::{HashMap, VecDeque};

/// Argument value carried by a fired event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Domain object, by id.
    Object(String),
    /// Enum value: type name plus value name.
    Enum(&'static str, &'static str),
}

/// A registered handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRef {
    pub handle: u64,
    /// Owning script id.
    pub script: String,
    /// Function key in the owning script's registry.
    pub func: u32,
    /// Optional user-data key passed back on every invocation.
    pub user_data: Option<u32>,
}

/// One fired event waiting for the script host.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub object: String,
    pub event: String,
    pub args: Vec<EventArg>,
    /// Snapshot of the handlers at fire time.
    pub handlers: Vec<HandlerRef>,
}

/// Handler registry plus the fired-event queue.
#[derive(Debug, Default)]
pub struct EventBus {
    handlers: HashMap<(String, String), Vec<HandlerRef>>,
    next_handle: u64,
    pub pending: VecDeque<PendingEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { next_handle: 1, ..Self::default() }
    }

    /// Register a handler, returning its handle.
    pub fn connect(
        &mut self,
        object: &str,
        event: &str,
        script: &str,
        func: u32,
        user_data: Option<u32>,
    ) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handlers
            .entry((object.to_owned(), event.to_owned()))
            .or_default()
            .push(HandlerRef { handle, script: script.to_owned(), func, user_data });
        handle
    }

    /// Remove a handler by handle. Idempotent.
    pub fn disconnect(&mut self, handle: u64) -> bool {
        let mut removed = false;
        self.handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|h| h.handle != handle);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Remove every handler owned by `script` (script stop).
    pub fn disconnect_script(&mut self, script: &str) {
        self.handlers.retain(|_, list| {
            list.retain(|h| h.script != script);
            !list.is_empty()
        });
    }

    pub fn handler_count(&self, object: &str, event: &str) -> usize {
        self.handlers
            .get(&(object.to_owned(), event.to_owned()))
            .map_or(0, Vec::len)
    }

    /// Queue an event with a snapshot of its current handlers.
    pub fn fire(&mut self, object: &str, event: &str, args: Vec<EventArg>) {
        let handlers = self
            .handlers
            .get(&(object.to_owned(), event.to_owned()))
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            return;
        }
        self.pending.push_back(PendingEvent {
            object: object.to_owned(),
            event: event.to_owned(),
            args,
            handlers,
        });
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
