// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! asmon CLI
//!
//! Command-line interface for the game server telemetry monitor.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod pidfile;
mod signals;

/// asmon - Game server telemetry monitor
#[derive(Parser)]
#[command(name = "asmon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: search ./asmon.yaml, ~/etc, ~, /etc, /usr/local/etc)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Plain log lines for journald: no colours, no timestamps
    #[arg(long, global = true)]
    pub systemd: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the snapshot server in the foreground
    Serve {
        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen address
        #[arg(short, long)]
        bind: Option<std::net::IpAddr>,

        /// Maximum concurrent clients
        #[arg(short, long)]
        max_clients: Option<usize>,

        /// PID file path
        #[arg(long)]
        pid_file: Option<PathBuf>,
    },

    /// Poll a server and print the instances
    Poll {
        /// Server host
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Show only window 0-3 (four slots each)
        #[arg(short = 'o', long)]
        instance_set: Option<u8>,

        /// Keep polling on an interval
        #[arg(short, long)]
        watch: bool,

        /// Seconds between polls in watch mode
        #[arg(short, long)]
        interval: Option<u64>,

        /// Append pipe-separated lines to this file
        #[arg(short, long)]
        log_file: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Publish synthetic telemetry as one or more game servers would
    Simulate {
        /// Number of simulated instances
        #[arg(short = 'n', long, default_value_t = 1)]
        instances: usize,

        /// Profile name prefix
        #[arg(long, default_value = "sim")]
        profile: String,

        /// Milliseconds between updates
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(cli.debug, cli.systemd);

    // Dispatch to command handlers
    match cli.command {
        Commands::Serve {
            port,
            bind,
            max_clients,
            pid_file,
        } => {
            let overrides = commands::serve::Overrides {
                port,
                bind,
                max_clients,
                pid_file,
            };
            commands::serve::execute(cli.config.as_deref(), overrides).await
        }
        Commands::Poll {
            host,
            port,
            instance_set,
            watch,
            interval,
            log_file,
            json,
        } => {
            let overrides = commands::poll::Overrides {
                host,
                port,
                instance_set,
                interval,
                log_file,
            };
            commands::poll::execute(cli.config.as_deref(), overrides, watch, json).await
        }
        Commands::Simulate {
            instances,
            profile,
            interval_ms,
        } => commands::simulate::execute(cli.config.as_deref(), instances, &profile, interval_ms).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
