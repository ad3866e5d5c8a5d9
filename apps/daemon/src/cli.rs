// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Command-line entry point. Mirrors the teacher's `Serve`/`Config`
//! subcommand split (`cli.rs`), with one addition the teacher has no
//! equivalent for: a bare positional port number, so `opencli-daemon
//! 8080` overrides `server.http_port` without touching the config file.
//! An unparseable positional value is ignored — it falls back to
//! whatever `server.http_port` resolves to from config/env — rather
//! than failing the whole invocation, since the daemon is meant to be
//! launched unattended.

use clap::{Parser, Subcommand};
use schemars::schema_for;
use tracing::{error, info, warn};

use crate::config;

type LogInitFn =
    fn(&config::LogConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Overrides `server.http_port` for this run. Ignored if not a
    /// valid port number.
    pub port: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Starts the daemon's three listeners.
    Serve,
    /// Manage configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout.
    Default,
    /// Generate a JSON schema for the config and print it to stdout.
    Schema,
}

fn log_startup_info(config: &config::Config) {
    info!(
        bind_address = %config.server.bind_address,
        http_port = config.server.http_port,
        ws_port = config.server.ws_port,
        status_port = config.server.status_port,
        console_enable = config.log.console_enable,
        file_enable = config.log.file_enable,
        "starting opencli daemon"
    );
}

/// Starts the daemon. Exits the process with status 1 on config load
/// or logging init failure, matching the teacher's fail-fast startup;
/// once the three listeners are running, a bind failure on any single
/// one of them is logged and does not exit the process (see
/// [`crate::server::serve_http`], [`crate::server::serve_ws`], and
/// [`crate::status::serve`]).
#[allow(clippy::disallowed_macros)]
async fn handle_serve_command(config_path: &std::path::Path, port_override: Option<u16>, init_logging: LogInitFn) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = match init_logging(&config_result.config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        }
    };

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "config file not found, using defaults");
    }

    let mut config = config_result.config;
    if let Some(port) = port_override {
        info!(port, "overriding server.http_port from the command line");
        config.server.http_port = port;
    }

    log_startup_info(&config);

    if let Err(e) = crate::run_daemon(config).await {
        error!(error = %e, "daemon exited with an error");
        std::process::exit(1);
    }
}

#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default opencli-daemon configuration file");
            println!("{toml_string}");
        }
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        }
    }
}

#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        }
    }
}

/// Dispatches on the parsed CLI, defaulting to `Serve` when no
/// subcommand is given (so a bare `opencli-daemon` or `opencli-daemon
/// 8080` just starts the daemon).
#[allow(clippy::disallowed_macros)]
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    let config_path = cli
        .config
        .as_ref()
        .map_or_else(config::default_config_path, std::path::PathBuf::from);
    let port_override = cli.port.as_deref().and_then(|p| p.parse::<u16>().ok());

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            handle_serve_command(&config_path, port_override, init_logging).await;
        }
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        }
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        }
    }
}
