// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP server and UDP discovery for the simulator.
//!
//! Clients connect over TCP and exchange [`Message`] records. Discovery:
//! a client broadcasts `sim?` to UDP port 5741 and receives a six byte reply
//! carrying the TCP listener port.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{Engine, TICK_RATE};
use crate::protocol::{discovery_reply, Message, SimCodec, DISCOVERY_PORT, DISCOVERY_REQUEST};

/// Server options.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Answer discovery only for loopback peers.
    pub localhost_only: bool,
    /// UDP discovery port.
    pub discovery_port: u16,
    /// TCP listen port, 0 picks a free one.
    pub port: u16,
    /// Enable the UDP discovery responder.
    pub discoverable: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { localhost_only: true, discovery_port: DISCOVERY_PORT, port: 0, discoverable: false }
    }
}

/// A running simulator server.
pub struct Server {
    engine: Arc<Mutex<Engine>>,
    port: u16,
    cancel: CancellationToken,
    broadcast_tx: broadcast::Sender<Message>,
}

impl Server {
    /// Bind the TCP listener (and, when discoverable, the UDP responder) and
    /// spawn the accept/tick tasks.
    pub async fn start(engine: Engine, config: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        let port = listener.local_addr()?.port();
        info!(port, "simulator listening");

        let engine = Arc::new(Mutex::new(engine));
        let cancel = CancellationToken::new();
        let (broadcast_tx, _) = broadcast::channel(256);

        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&engine),
            broadcast_tx.clone(),
            cancel.clone(),
        ));
        tokio::spawn(tick_loop(Arc::clone(&engine), broadcast_tx.clone(), cancel.clone()));

        if config.discoverable {
            let udp = UdpSocket::bind(("0.0.0.0", config.discovery_port)).await?;
            tokio::spawn(discovery_loop(udp, port, config.localhost_only, cancel.clone()));
        }

        Ok(Self { engine, port, cancel, broadcast_tx })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn engine(&self) -> &Arc<Mutex<Engine>> {
        &self.engine
    }

    /// Inject a message as if received from a connection.
    pub fn inject(&self, message: Message) {
        let responses = self.engine.lock().apply(message);
        let _ = self.broadcast_tx.send(message);
        for response in responses {
            let _ = self.broadcast_tx.send(response);
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    engine: Arc<Mutex<Engine>>,
    broadcast_tx: broadcast::Sender<Message>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "simulator connection");
                        tokio::spawn(connection(
                            stream,
                            Arc::clone(&engine),
                            broadcast_tx.clone(),
                            cancel.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        break;
                    }
                }
            }
        }
    }
}

async fn connection(
    stream: TcpStream,
    engine: Arc<Mutex<Engine>>,
    broadcast_tx: broadcast::Sender<Message>,
    cancel: CancellationToken,
) {
    let mut framed = Framed::new(stream, SimCodec);
    let mut broadcast_rx = broadcast_tx.subscribe();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            outbound = broadcast_rx.recv() => {
                match outbound {
                    Ok(message) => {
                        if framed.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "slow simulator client");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = framed.next() => {
                match inbound {
                    Some(Ok(message)) => {
                        let responses = engine.lock().apply(message);
                        for response in responses {
                            let _ = broadcast_tx.send(response);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "simulator framing error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

async fn tick_loop(
    engine: Arc<Mutex<Engine>>,
    broadcast_tx: broadcast::Sender<Message>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(TICK_RATE);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let changes = engine.lock().tick();
                for change in changes {
                    let _ = broadcast_tx.send(change);
                }
            }
        }
    }
}

async fn discovery_loop(udp: UdpSocket, tcp_port: u16, localhost_only: bool, cancel: CancellationToken) {
    let mut buf = [0u8; 8];
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            received = udp.recv_from(&mut buf) => {
                let Ok((len, peer)) = received else { break };
                if len < DISCOVERY_REQUEST.len() || &buf[..4] != DISCOVERY_REQUEST {
                    continue;
                }
                if localhost_only && !is_loopback(&peer) {
                    continue;
                }
                debug!(%peer, "discovery request");
                let _ = udp.send_to(&discovery_reply(tcp_port), peer).await;
            }
        }
    }
}

fn is_loopback(peer: &SocketAddr) -> bool {
    match peer {
        SocketAddr::V4(a) => a.ip().is_loopback(),
        SocketAddr::V6(a) => a.ip().is_loopback(),
    }
}
