// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring: build the world, optionally start the simulator, run the event
//! loop until interrupted.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::exec::EventLoop;
use crate::script::ScriptHost;
use crate::world::{World, WorldOptions};

pub fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if config.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let mut world = World::new();
    world.options = WorldOptions {
        correct_output_pos_when_locked: config.correct_output_pos_when_locked,
        ext_output_change_action: config.ext_output_change_action(),
    };

    let simulator = if config.simulator {
        let engine = signalboxsim::engine::Engine::new(signalboxsim::world::Layout::default());
        let server = signalboxsim::server::Server::start(
            engine,
            signalboxsim::server::ServerConfig {
                localhost_only: config.sim_localhost_only,
                port: config.sim_port,
                discoverable: true,
                ..Default::default()
            },
        )
        .await?;
        info!(port = server.port(), "simulator started");
        Some(server)
    } else {
        None
    };

    let event_loop = EventLoop::new(world, ScriptHost::new());
    let handle = event_loop.handle();
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
        shutdown.cancel();
    });

    // Kick the derivation once at startup so a world loaded before the loop
    // starts is consistent.
    handle.call(|world, _host| world.board_modified());

    let (_world, _host) = event_loop.run(cancel).await;
    if let Some(server) = simulator {
        server.stop();
    }
    Ok(())
}
