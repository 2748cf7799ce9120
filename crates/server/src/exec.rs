// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event loop: all domain mutation runs on one task, fed closures
//! through an unbounded channel. Kernels and timers post work here; after
//! every closure the queued script events and hardware actions drain.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::script::ScriptHost;
use crate::world::{HwAction, World};

pub type Task = Box<dyn FnOnce(&mut World, &mut ScriptHost) + Send>;

/// Cloneable poster onto the event loop.
#[derive(Debug, Clone)]
pub struct EventLoopHandle {
    tx: mpsc::UnboundedSender<Task>,
}

impl EventLoopHandle {
    /// Post a closure; it runs on the event-loop task in posting order.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce(&mut World, &mut ScriptHost) + Send + 'static,
    {
        let _ = self.tx.send(Box::new(f));
    }

    /// Post a closure after `delay`. Single shot.
    pub fn call_later<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce(&mut World, &mut ScriptHost) + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Box::new(f));
        });
    }
}

/// Owns the world and the script host; executes posted tasks until
/// cancelled.
pub struct EventLoop {
    world: World,
    host: ScriptHost,
    rx: mpsc::UnboundedReceiver<Task>,
    handle: EventLoopHandle,
}

impl EventLoop {
    pub fn new(mut world: World, host: ScriptHost) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = EventLoopHandle { tx };
        world.handle = Some(handle.clone());
        Self { world, host, rx, handle }
    }

    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    /// Run until cancelled. Returns the world for inspection.
    pub async fn run(mut self, cancel: CancellationToken) -> (World, ScriptHost) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                task = self.rx.recv() => {
                    let Some(task) = task else { break };
                    task(&mut self.world, &mut self.host);
                    self.host.pump(&mut self.world);
                    dispatch_hw(&mut self.world);
                }
            }
        }
        debug!("event loop stopped");
        (self.world, self.host)
    }
}

/// Forward queued hardware actions to every online interface.
fn dispatch_hw(world: &mut World) {
    let actions = world.take_hw_actions();
    if actions.is_empty() {
        return;
    }
    for action in actions {
        for interface in world.interfaces.values() {
            let Some(kernel) = &interface.kernel else { continue };
            match &action {
                HwAction::TrackPower(true) => {
                    kernel.track_on();
                }
                HwAction::TrackPower(false) => {
                    kernel.track_off();
                }
                HwAction::EmergencyStop => {
                    kernel.request_emergency_stop();
                }
                HwAction::Output { command, .. } => {
                    kernel.send_output(command.index, command.action);
                }
                HwAction::Throttle { address, speed, emergency_stop } => {
                    kernel.throttle(*address, *speed, *emergency_stop);
                }
            }
        }
    }
}
