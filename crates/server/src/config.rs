// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

/// Model railroad interlocking and train-path server.
#[derive(Debug, Parser)]
#[command(name = "signalbox", version, about)]
pub struct Config {
    /// Push locked devices back when they change under external control.
    #[arg(long, env = "SIGNALBOX_CORRECT_OUTPUT", default_value_t = true, action = clap::ArgAction::Set)]
    pub correct_output_pos_when_locked: bool,

    /// Escalation when a locked device keeps regressing
    /// (do_nothing, emergency_stop_train, emergency_stop_world, power_off_world).
    #[arg(long, env = "SIGNALBOX_EXT_OUTPUT_CHANGE_ACTION", default_value = "emergency_stop_train")]
    pub ext_output_change_action: String,

    /// Start the built-in track simulator.
    #[arg(long, env = "SIGNALBOX_SIMULATOR", default_value_t = false, action = clap::ArgAction::Set)]
    pub simulator: bool,

    /// Simulator answers discovery only from loopback peers.
    #[arg(long, env = "SIGNALBOX_SIM_LOCALHOST_ONLY", default_value_t = true, action = clap::ArgAction::Set)]
    pub sim_localhost_only: bool,

    /// Simulator TCP port (0 = pick a free one).
    #[arg(long, env = "SIGNALBOX_SIM_PORT", default_value = "0")]
    pub sim_port: u16,

    /// Log format (json or text).
    #[arg(long, env = "SIGNALBOX_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SIGNALBOX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        match self.ext_output_change_action.as_str() {
            "do_nothing" | "emergency_stop_train" | "emergency_stop_world"
            | "power_off_world" => {}
            other => return Err(format!("invalid ext output change action: {other}")),
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => return Err(format!("invalid log format: {other}")),
        }
        Ok(())
    }

    pub fn ext_output_change_action(&self) -> crate::enums::ExtOutputChangeAction {
        use crate::enums::ExtOutputChangeAction::*;
        match self.ext_output_change_action.as_str() {
            "emergency_stop_train" => EmergencyStopTrain,
            "emergency_stop_world" => EmergencyStopWorld,
            "power_off_world" => PowerOffWorld,
            _ => DoNothing,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
