// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! `sched-tick`: runs one scheduler tick and exits. Intended to be
//! invoked repeatedly by an external scheduler (cron, a systemd timer);
//! it holds no state in memory between invocations.

use clap::Parser;
use sched_tick::config::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = sched_tick::run(cli).await;
    std::process::exit(code);
}
