// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface domain objects: one per hardware connection. An interface owns
//! a kernel while online; kernel faults isolate to the one interface.

use tracing::{info, warn};

use crate::enums::InterfaceState;
use crate::event::EventArg;
use crate::hw::io::IoConfig;
use crate::hw::kernel::{self, KernelConfig, KernelEvent, KernelHandle};
use crate::world::World;

#[derive(Debug)]
pub struct Interface {
    pub id: String,
    pub state: InterfaceState,
    pub io_config: IoConfig,
    pub kernel_config: KernelConfig,
    pub kernel: Option<KernelHandle>,
}

impl Interface {
    pub fn new(id: impl Into<String>, io_config: IoConfig) -> Self {
        Self {
            id: id.into(),
            state: InterfaceState::Offline,
            io_config,
            kernel_config: KernelConfig::default(),
            kernel: None,
        }
    }
}

/// Register an interface with the world.
pub fn add_interface(world: &mut World, interface: Interface) {
    world.interfaces.insert(interface.id.clone(), interface);
}

/// Bring an interface online (spawning its kernel) or take it offline.
/// Requires the world to run under an event loop when going online.
pub fn set_online(world: &mut World, id: &str, online: bool) -> bool {
    if online {
        let Some(handle) = world.handle.clone() else {
            return false;
        };
        let Some(interface) = world.interfaces.get_mut(id) else {
            return false;
        };
        if matches!(interface.state, InterfaceState::Initializing | InterfaceState::Online) {
            return true;
        }
        interface.state = InterfaceState::Initializing;
        let kernel = kernel::start(
            interface.id.clone(),
            interface.io_config.clone(),
            interface.kernel_config.clone(),
            handle,
        );
        interface.kernel = Some(kernel);
        fire_state(world, id);
        true
    } else {
        let Some(interface) = world.interfaces.get_mut(id) else {
            return false;
        };
        if let Some(kernel) = interface.kernel.take() {
            // Cancels outstanding work; the task drops the kernel once idle.
            kernel.stop();
        }
        interface.state = InterfaceState::Offline;
        fire_state(world, id);
        true
    }
}

/// Kernel callback entry point, always invoked on the event-loop task.
pub fn kernel_event(world: &mut World, id: &str, event: KernelEvent) {
    match event {
        KernelEvent::Started => {
            if let Some(interface) = world.interfaces.get_mut(id) {
                interface.state = InterfaceState::Online;
                info!(interface = %id, "interface online");
            }
            fire_state(world, id);
        }
        KernelEvent::Errored(detail) => {
            if let Some(interface) = world.interfaces.get_mut(id) {
                // Pending commands on this interface are lost; a fresh
                // set_online is required to recover.
                if let Some(kernel) = interface.kernel.take() {
                    kernel.stop();
                }
                interface.state = InterfaceState::Error;
                warn!(interface = %id, %detail, "interface error");
            }
            fire_state(world, id);
        }
        KernelEvent::Sensor(channel, address, value) => {
            world.sensor_report(channel, address, value);
        }
    }
}

fn fire_state(world: &mut World, id: &str) {
    let state = world.interfaces.get(id).map(|i| i.state).unwrap_or_default();
    world.events.fire(
        id,
        "on_state_changed",
        vec![EventArg::Object(id.to_owned()), EventArg::Enum("interface_state", state.as_str())],
    );
}
