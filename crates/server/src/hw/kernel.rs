// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The protocol kernel: one task per online interface.
//!
//! The kernel owns its IO handler and runs a handshake state machine
//! (`Initial → ProtocolVersion → Started → Error`). Commands posted through
//! the handle are delivered to the wire strictly in posting order. A
//! keep-alive timer, restarted on every inbound frame, trips the kernel into
//! the error state when the device goes silent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::exec::EventLoopHandle;
use crate::hw::frame::{opcode, CanFrame};
use crate::hw::io::{IoConfig, IoHandler};
use crate::output::map::{OutputActionValue, PairOutputAction, SingleOutputAction};

/// Kernel tuning.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Our CAN id on the bus.
    pub node_id: u8,
    /// Error out when the device stays silent this long.
    pub keep_alive: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { node_id: 0x01, keep_alive: Duration::from_secs(10) }
    }
}

#[derive(Debug)]
enum Command {
    TrackOn,
    TrackOff,
    EmergencyStop,
    Send(CanFrame),
    SendDcc { packet: Vec<u8>, repeat: u8 },
    Output { index: u16, value: u16 },
    Throttle { address: u16, speed: u8, emergency_stop: bool },
    SetConfig(KernelConfig),
}

/// Kernel lifecycle notifications delivered to the event loop.
#[derive(Debug)]
pub enum KernelEvent {
    /// Handshake complete; fires exactly once per start.
    Started,
    /// Fatal fault; fires at most once, the kernel stops afterwards.
    Errored(String),
    /// A sensor report from the device: `(channel, address, value)`.
    Sensor(u16, u16, bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    ProtocolVersion,
    Started,
    Error,
}

/// Cloneable handle. All sends are FIFO per kernel; they return `false`
/// once the kernel has stopped or errored.
#[derive(Debug, Clone)]
pub struct KernelHandle {
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
}

impl KernelHandle {
    fn post(&self, command: Command) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(command).is_ok()
    }

    pub fn track_on(&self) -> bool {
        self.post(Command::TrackOn)
    }

    pub fn track_off(&self) -> bool {
        self.post(Command::TrackOff)
    }

    pub fn request_emergency_stop(&self) -> bool {
        self.post(Command::EmergencyStop)
    }

    pub fn send(&self, frame: CanFrame) -> bool {
        self.post(Command::Send(frame))
    }

    pub fn send_dcc(&self, packet: Vec<u8>, repeat: u8) -> bool {
        self.post(Command::SendDcc { packet, repeat })
    }

    pub fn send_output(&self, index: u16, action: OutputActionValue) -> bool {
        let value = match action {
            OutputActionValue::Single(SingleOutputAction::On) => 1,
            OutputActionValue::Single(SingleOutputAction::Pulse) => 2,
            OutputActionValue::Single(_) => 0,
            OutputActionValue::Pair(PairOutputAction::Second) => 1,
            OutputActionValue::Pair(_) => 0,
            OutputActionValue::Aspect(v) => v as u16,
            OutputActionValue::ECoSState(v) => v,
        };
        self.post(Command::Output { index, value })
    }

    pub fn throttle(&self, address: u16, speed: u8, emergency_stop: bool) -> bool {
        self.post(Command::Throttle { address, speed, emergency_stop })
    }

    pub fn set_config(&self, config: KernelConfig) -> bool {
        self.post(Command::SetConfig(config))
    }

    /// Cancel all outstanding work and close the transport. Idempotent.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Spawn a kernel task for `interface_id`. Events are posted back onto the
/// event loop through `handle`.
pub fn start(
    interface_id: String,
    io_config: IoConfig,
    config: KernelConfig,
    handle: EventLoopHandle,
) -> KernelHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let alive = Arc::new(AtomicBool::new(true));
    let kernel_handle = KernelHandle { tx, cancel: cancel.clone(), alive: Arc::clone(&alive) };

    tokio::spawn(run(interface_id, io_config, config, handle, rx, cancel, alive));

    kernel_handle
}

fn deliver(handle: &EventLoopHandle, interface_id: &str, event: KernelEvent) {
    let id = interface_id.to_owned();
    handle.call(move |world, _host| {
        crate::hw::interface::kernel_event(world, &id, event);
    });
}

#[allow(clippy::too_many_arguments)]
async fn run(
    interface_id: String,
    io_config: IoConfig,
    mut config: KernelConfig,
    handle: EventLoopHandle,
    mut rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
) {
    let io = match IoHandler::connect(&io_config).await {
        Ok(io) => io,
        Err(e) => {
            error!(code = "E2001", interface = %interface_id, error = %e, "connect failed");
            alive.store(false, Ordering::Release);
            deliver(&handle, &interface_id, KernelEvent::Errored(e.to_string()));
            return;
        }
    };
    let simulation = io.is_simulation();
    let (mut io_tx, mut io_rx) = io.split();

    let mut state = State::Initial;
    debug!(interface = %interface_id, ?state, "kernel connected");

    // Initial -> ProtocolVersion once the probe is on the wire.
    let probe = CanFrame::new(config.node_id, &[opcode::REQUEST_VERSION]);
    if let Err(e) = io_tx.send(probe).await {
        error!(code = "E2002", interface = %interface_id, error = %e, "write failed");
        alive.store(false, Ordering::Release);
        deliver(&handle, &interface_id, KernelEvent::Errored(e.to_string()));
        return;
    }
    state = State::ProtocolVersion;

    let keep_alive = tokio::time::sleep(config.keep_alive);
    tokio::pin!(keep_alive);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(interface = %interface_id, "kernel stopped");
                break;
            }
            () = &mut keep_alive, if !simulation && state != State::Error => {
                warn!(interface = %interface_id, "keep-alive expired");
                state = State::Error;
                alive.store(false, Ordering::Release);
                deliver(&handle, &interface_id, KernelEvent::Errored("keep-alive expired".into()));
                break;
            }
            command = rx.recv() => {
                let Some(command) = command else { break };
                if state == State::Error {
                    continue;
                }
                let result = match command {
                    Command::TrackOn => io_tx.send(CanFrame::new(config.node_id, &[opcode::TRACK_ON])).await,
                    Command::TrackOff => io_tx.send(CanFrame::new(config.node_id, &[opcode::TRACK_OFF])).await,
                    Command::EmergencyStop => {
                        io_tx.send(CanFrame::new(config.node_id, &[opcode::EMERGENCY_STOP])).await
                    }
                    Command::Send(frame) => io_tx.send(frame).await,
                    Command::SendDcc { packet, repeat } => {
                        let mut data = vec![opcode::DCC_PACKET, repeat];
                        data.extend_from_slice(&packet[..packet.len().min(6)]);
                        io_tx.send(CanFrame::new(config.node_id, &data)).await
                    }
                    Command::Output { index, value } => {
                        let data = [
                            opcode::ACCESSORY,
                            (index >> 8) as u8,
                            (index & 0xFF) as u8,
                            (value >> 8) as u8,
                            (value & 0xFF) as u8,
                        ];
                        io_tx.send(CanFrame::new(config.node_id, &data)).await
                    }
                    Command::Throttle { address, speed, emergency_stop } => {
                        let data = [
                            opcode::LOCO_SPEED,
                            (address >> 8) as u8,
                            (address & 0xFF) as u8,
                            speed,
                            u8::from(emergency_stop),
                        ];
                        io_tx.send(CanFrame::new(config.node_id, &data)).await
                    }
                    Command::SetConfig(new_config) => {
                        config = new_config;
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    error!(code = "E2002", interface = %interface_id, error = %e, "write failed");
                    state = State::Error;
                    alive.store(false, Ordering::Release);
                    deliver(&handle, &interface_id, KernelEvent::Errored(e.to_string()));
                    break;
                }
            }
            frame = io_rx.recv() => {
                match frame {
                    Ok(Some(frame)) => {
                        keep_alive.as_mut().reset(tokio::time::Instant::now() + config.keep_alive);
                        let dropped = io_rx.take_dropped();
                        if dropped > 0 {
                            warn!(
                                code = "W2001",
                                interface = %interface_id,
                                dropped,
                                "malformed data dropped"
                            );
                        }
                        match (state, frame.opcode()) {
                            (State::ProtocolVersion, Some(opcode::VERSION_REPLY)) => {
                                state = State::Started;
                                debug!(interface = %interface_id, "handshake complete");
                                deliver(&handle, &interface_id, KernelEvent::Started);
                            }
                            (State::Started, Some(opcode::SENSOR)) if frame.data.len() >= 6 => {
                                let channel = u16::from_be_bytes([frame.data[1], frame.data[2]]);
                                let address = u16::from_be_bytes([frame.data[3], frame.data[4]]);
                                let value = frame.data[5] != 0;
                                deliver(
                                    &handle,
                                    &interface_id,
                                    KernelEvent::Sensor(channel, address, value),
                                );
                            }
                            _ => {}
                        }
                    }
                    Ok(None) => {
                        error!(code = "E2001", interface = %interface_id, "transport closed");
                        state = State::Error;
                        alive.store(false, Ordering::Release);
                        deliver(&handle, &interface_id, KernelEvent::Errored("transport closed".into()));
                        break;
                    }
                    Err(e) => {
                        error!(code = "E2001", interface = %interface_id, error = %e, "read failed");
                        state = State::Error;
                        alive.store(false, Ordering::Release);
                        deliver(&handle, &interface_id, KernelEvent::Errored(e.to_string()));
                        break;
                    }
                }
            }
        }
    }
    alive.store(false, Ordering::Release);
}
