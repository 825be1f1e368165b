// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `asmon serve` command - Run the snapshot server.
//!
//! Attaches to the telemetry store, binds the listening socket and serves
//! clients until SIGINT or SIGTERM.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use asmon_core::config::ServerConfig;
use asmon_core::server::shutdown_channel;
use asmon_core::{BroadcastServer, ConfigLoader, MaxClients, Port, Shutdown, TelemetryStore};

use crate::pidfile::{self, PidFile};
use crate::signals;

/// Command-line values that replace the configuration file's.
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind: Option<IpAddr>,
    pub max_clients: Option<usize>,
    pub pid_file: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, mut config: ServerConfig) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        if let Some(port) = self.port {
            config.port = Port::new(port)?;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(max_clients) = self.max_clients {
            config.max_clients = MaxClients::new(max_clients)?;
        }
        if self.pid_file.is_some() {
            config.pid_file = self.pid_file;
        }
        Ok(config)
    }
}

pub async fn execute(
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "asmon server starting");

    // Installed before any resource is acquired.
    let (trigger, shutdown) = shutdown_channel();
    let signal_task = signals::shutdown_on_signal(trigger)?;

    let result = run(config_path, overrides, shutdown).await;
    signal_task.abort();
    result
}

async fn run(
    config_path: Option<&Path>,
    overrides: Overrides,
    shutdown: Shutdown,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load and validate configuration - fail fast on invalid config
    let config = ConfigLoader::load_or_default(config_path)?;
    let server_config = overrides.apply(config.server)?;

    let program = "asmon";
    let _pid_file = match server_config
        .pid_file
        .clone()
        .or_else(|| pidfile::default_path(program))
    {
        Some(path) => Some(PidFile::acquire(&path, program)?),
        None => None,
    };

    let store = Arc::new(TelemetryStore::open(&config.store)?);
    let server = BroadcastServer::bind(&server_config, Arc::clone(&store))?;

    server.serve(shutdown).await?;

    tracing::info!(store = %store.name(), "Releasing telemetry store");
    Ok(())
}
