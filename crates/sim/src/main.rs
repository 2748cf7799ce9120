// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use signalboxsim::engine::Engine;
use signalboxsim::server::{Server, ServerConfig};
use signalboxsim::world::Layout;

/// Standalone track simulator speaking the signalbox wire protocol.
#[derive(Debug, Parser)]
#[command(name = "signalboxsim", version, about)]
struct Cli {
    /// Layout JSON file.
    #[arg(long, env = "SIGNALBOXSIM_LAYOUT")]
    layout: Option<PathBuf>,

    /// TCP listen port (0 = pick a free one).
    #[arg(long, env = "SIGNALBOXSIM_PORT", default_value = "0")]
    port: u16,

    /// Answer UDP discovery requests.
    #[arg(long, env = "SIGNALBOXSIM_DISCOVERABLE", default_value_t = true, action = clap::ArgAction::Set)]
    discoverable: bool,

    /// Only answer discovery from loopback peers.
    #[arg(long, env = "SIGNALBOXSIM_LOCALHOST_ONLY", default_value_t = true, action = clap::ArgAction::Set)]
    localhost_only: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SIGNALBOXSIM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let layout = match &cli.layout {
        Some(path) => match std::fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|s| Layout::from_json(&s)) {
            Ok(layout) => layout,
            Err(e) => {
                error!("failed to load layout: {e:#}");
                std::process::exit(2);
            }
        },
        None => Layout::default(),
    };

    let config = ServerConfig {
        localhost_only: cli.localhost_only,
        port: cli.port,
        discoverable: cli.discoverable,
        ..ServerConfig::default()
    };

    match Server::start(Engine::new(layout), config).await {
        Ok(server) => {
            let _ = tokio::signal::ctrl_c().await;
            server.stop();
        }
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}
