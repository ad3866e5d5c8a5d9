// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Binary entry point. Grounded in the teacher's `apps/skit/src/main.rs`:
//! parse the CLI, hand it and the logging initializer to
//! `cli::handle_command`. The teacher's DHAT/jemalloc global-allocator
//! feature gates and `rustls` crypto-provider install are dropped —
//! this daemon has no profiling build and no TLS listener in scope.

use clap::Parser;
use opencli_daemon::cli;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    cli::handle_command(&cli, opencli_daemon::logging::init_logging).await;
}
