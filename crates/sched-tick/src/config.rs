// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Configuration resolution: CLI flags, then environment variables,
//! then `config.toml` under the runtime directory, then built-in
//! defaults.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not determine a home directory; set --home or SCHED_HOME")]
    NoHomeDir,
}

/// `sched-tick [OPTIONS]`
#[derive(Debug, Parser)]
#[command(name = "sched-tick", about = "Runs one orchestration tick")]
pub struct Cli {
    /// Path to config.toml. Defaults to `<home>/config.toml`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Runtime directory. Defaults to $SCHED_HOME, then ~/.local/share/sched.
    #[arg(long)]
    pub home: Option<PathBuf>,

    /// Run a single tick and exit, ignoring the tick lock. Intended for
    /// tests and manual invocation; normal deployments rely on an
    /// external scheduler (cron, systemd timer) calling this binary once
    /// per tick and respecting its exit code.
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    store_url: Option<String>,
    store_timeout_seconds: Option<u64>,
    forge_url: Option<String>,
    orchestrator_id: Option<String>,
    cluster: Option<String>,
    machine_id: Option<String>,
    log_format: Option<String>,
    worker_command: Option<String>,
    max_claimed: Option<u32>,
    max_provisional: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub store_url: String,
    pub store_timeout: Duration,
    pub forge_url: String,
    pub orchestrator_id: String,
    pub cluster: String,
    pub machine_id: String,
    pub log_format: LogFormat,
    pub worker_command: String,
    pub max_claimed: u32,
    pub max_provisional: u32,
    pub once: bool,
}

impl Config {
    /// Resolves `home`: CLI flag, then `SCHED_HOME`, then
    /// `~/.local/share/sched`.
    fn resolve_home(cli: &Cli) -> Result<PathBuf, ConfigError> {
        if let Some(home) = &cli.home {
            return Ok(home.clone());
        }
        if let Ok(home) = std::env::var("SCHED_HOME") {
            return Ok(PathBuf::from(home));
        }
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHomeDir)?;
        Ok(PathBuf::from(home).join(".local/share/sched"))
    }

    fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let home = Self::resolve_home(&cli)?;
        let config_path = cli.config.clone().unwrap_or_else(|| home.join("config.toml"));
        let file = Self::load_file(&config_path)?;

        let store_url = std::env::var("SCHED_STORE_URL")
            .ok()
            .or(file.store_url)
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
        let orchestrator_id = std::env::var("SCHED_ORCHESTRATOR_ID")
            .ok()
            .or(file.orchestrator_id)
            .unwrap_or_else(|| "sched-tick".to_string());
        let log_format = std::env::var("SCHED_LOG_FORMAT")
            .ok()
            .or(file.log_format)
            .map(|s| if s.eq_ignore_ascii_case("json") { LogFormat::Json } else { LogFormat::Pretty })
            .unwrap_or(LogFormat::Pretty);

        Ok(Config {
            home,
            store_url,
            store_timeout: Duration::from_secs(file.store_timeout_seconds.unwrap_or(10)),
            forge_url: file.forge_url.unwrap_or_else(|| "http://127.0.0.1:8081".to_string()),
            orchestrator_id,
            cluster: file.cluster.unwrap_or_else(|| "default".to_string()),
            machine_id: file.machine_id.unwrap_or_else(|| hostname_fallback()),
            log_format,
            worker_command: file.worker_command.unwrap_or_else(|| "sched-worker".to_string()),
            max_claimed: file.max_claimed.unwrap_or(50),
            max_provisional: file.max_provisional.unwrap_or(50),
            once: cli.once,
        })
    }

    pub fn blueprints_dir(&self) -> PathBuf {
        self.home.join("blueprints")
    }

    pub fn flows_dir(&self) -> PathBuf {
        self.home.join("flows")
    }

    pub fn repo_path(&self) -> PathBuf {
        self.home.join("repo")
    }

    pub fn sandbox_root(&self) -> PathBuf {
        self.home.join("sandboxes")
    }

    pub fn pool_root(&self) -> PathBuf {
        self.home.join("pool")
    }

    pub fn state_path(&self) -> PathBuf {
        self.home.join("state.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.home.join("tick.lock")
    }
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-machine".to_string())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
