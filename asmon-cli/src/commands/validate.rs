// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `asmon validate` command - Validate configuration file.

use std::path::Path;

use asmon_core::ConfigLoader;

pub async fn execute(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file.display(), "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Store Settings:");
            println!("  Name:               {}", config.store.name);
            println!("  Capacity:           {} slot(s)", config.store.capacity.value());
            println!();
            println!("Server Settings:");
            println!("  Bind:               {}:{}", config.server.bind, config.server.port);
            println!("  Max Clients:        {}", config.server.max_clients.value());
            match &config.server.pid_file {
                Some(path) => println!("  PID File:           {}", path.display()),
                None => println!("  PID File:           (default)"),
            }
            println!();
            println!("Client Settings:");
            println!("  Server:             {}:{}", config.client.host, config.client.port);
            println!("  Instances:          {}", config.client.selection);
            println!("  Interval:           {}s", config.client.interval.as_secs());
            if let Some(path) = &config.client.log_file {
                println!("  Log File:           {}", path.display());
            }
            println!();
            println!("Producer Settings:");
            println!(
                "  Slot From Profile:  {}",
                config.producer.profile_prefix_slot_selection
            );
            let counts = config
                .producer
                .object_count_intervals
                .iter()
                .zip(&config.producer.object_count_commands);
            for (i, (interval, command)) in counts.enumerate() {
                println!("  - count {} every {}s: {}", i, interval, command);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
