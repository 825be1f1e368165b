// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `asmon poll` command - Query a server and display its instances.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use asmon_core::client::{self, ConsoleSink, JsonSink, PipeLogSink, SnapshotSink};
use asmon_core::config::ClientConfig;
use asmon_core::server::shutdown_channel;
use asmon_core::{Client, ConfigLoader, InstanceSelection, PollMode, Port};

use crate::signals;

/// Command-line values that replace the configuration file's.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub instance_set: Option<u8>,
    pub interval: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, mut config: ClientConfig) -> Result<ClientConfig, Box<dyn std::error::Error>> {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = Port::new(port)?;
        }
        if let Some(window) = self.instance_set {
            config.selection = InstanceSelection::window(window)?;
        }
        if let Some(secs) = self.interval {
            config.interval = Duration::from_secs(secs.max(1));
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        Ok(config)
    }
}

type Sinks = Vec<Box<dyn SnapshotSink + Send>>;

fn build_sinks(config: &ClientConfig, json: bool) -> std::io::Result<Sinks> {
    let mut sinks: Sinks = Vec::new();
    if json {
        sinks.push(Box::new(JsonSink::new(std::io::stdout())));
    } else {
        sinks.push(Box::new(ConsoleSink::new(std::io::stdout())));
    }

    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!(path = %path.display(), "Appending to log file");
        sinks.push(Box::new(PipeLogSink::new(file)));
    }
    Ok(sinks)
}

pub async fn execute(
    config_path: Option<&Path>,
    overrides: Overrides,
    watch: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let client_config = overrides.apply(config.client)?;

    let mut sinks = build_sinks(&client_config, json)?;
    let mut client = Client::connect(&client_config.host, client_config.port).await?;

    let mode = if watch {
        PollMode::Every(client_config.interval)
    } else {
        PollMode::Once
    };

    let (trigger, shutdown) = shutdown_channel();
    let signal_task = signals::shutdown_on_signal(trigger)?;

    let polls = client::run(
        &mut client,
        client_config.selection,
        mode,
        &mut sinks,
        shutdown,
    )
    .await;
    signal_task.abort();

    let polls = polls?;
    if polls == 0 {
        tracing::info!(addr = %client.target(), "Server closed the connection without a snapshot");
    } else {
        tracing::debug!(polls, addr = %client.target(), "Polling finished");
    }
    Ok(())
}
