// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Binary entry point wiring: config loading, logging init, tick-lock
//! acquisition, and composing the five library crates into one call to
//! `sched_engine::run_tick`.

pub mod config;
pub mod launcher;
pub mod load;
pub mod lock;
pub mod logging;
pub mod state_file;

use config::Config;
use sched_engine::{EngineConditionSpawner, GuardLimits, SpawnStrategy, TickContext};
use sched_flow::steps::HttpPrHost;
use sched_flow::StepRegistry;
use sched_pool::{PoolRegistry, SysinfoLiveness};
use sched_sandbox::SandboxManager;
use sched_store::{HttpStore, Store};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Configuration-time failures exit nonzero; everything else is a
/// runtime error, logged but never failing the tick.
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_OK: i32 = 0;

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Runs one invocation end to end and returns the process exit code.
pub async fn run(cli: config::Cli) -> i32 {
    let config = match Config::load(cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("sched-tick: configuration error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };

    logging::init(&config);

    let lock = match lock::acquire(&config.lock_path()) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            info!("previous tick still running; exiting");
            return EXIT_OK;
        }
        Err(e) => {
            error!(error = %e, "failed to acquire tick lock");
            return EXIT_CONFIG_ERROR;
        }
    };

    let blueprints = match load::load_blueprints(&config.blueprints_dir()) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to load blueprints");
            return EXIT_CONFIG_ERROR;
        }
    };
    let flows = match load::load_flows(&config.flows_dir()) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "failed to load flows");
            return EXIT_CONFIG_ERROR;
        }
    };

    let steps = StepRegistry::new();
    if let Err(e) = load::validate_all(&flows, &blueprints, &steps) {
        error!(error = %e, "flow validation failed");
        return EXIT_CONFIG_ERROR;
    }

    let now_ms = epoch_ms();
    let store: Arc<dyn Store> = match HttpStore::with_timeout(config.store_url.clone(), config.store_timeout) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to build store client");
            return EXIT_CONFIG_ERROR;
        }
    };
    let pr_host = HttpPrHost::new(config.forge_url.clone());
    let sandbox = Arc::new(SandboxManager::new(config.sandbox_root()));
    let pool = Arc::new(PoolRegistry::new(config.pool_root()));
    let liveness = SysinfoLiveness;
    let launcher: Arc<dyn sched_engine::WorkerLauncher> = Arc::new(launcher::ProcessLauncher::new(config.worker_command.clone()));
    let blueprints_arc = Arc::new(blueprints);

    let spawn_strategy = SpawnStrategy::new(config.repo_path(), sandbox.clone(), pool.clone(), launcher.clone());
    let agent_spawner = EngineConditionSpawner::new(
        config.repo_path(),
        sandbox.clone(),
        pool.clone(),
        store.clone(),
        launcher,
        blueprints_arc.clone(),
        now_ms,
    );

    let mut state = state_file::load(&config.state_path()).unwrap_or_default();

    let ctx = TickContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints_arc,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &agent_spawner,
        spawn_strategy: &spawn_strategy,
        limits: GuardLimits {
            max_claimed: config.max_claimed,
            max_provisional: config.max_provisional,
        },
        orchestrator_id: &config.orchestrator_id,
        cluster: &config.cluster,
        machine_id: &config.machine_id,
    };

    match sched_engine::run_tick(&ctx, &mut state, now_ms).await {
        Ok(summary) => {
            for (name, outcome) in &summary.blueprints {
                info!(blueprint = %name, outcome = ?outcome, "blueprint evaluated");
            }
        }
        Err(e) => {
            // Runtime error: logged, tick still exits clean.
            warn!(error = %e, "tick encountered a runtime error");
        }
    }

    if let Err(e) = state_file::save(&config.state_path(), &state) {
        warn!(error = %e, "failed to persist scheduler state");
    }

    drop(lock);
    EXIT_OK
}
