// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Log output setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
/// Under systemd, journald stamps and colours lines itself.
pub fn init(debug: bool, systemd: bool) {
    let filter = filter(debug, std::env::var("RUST_LOG").ok().as_deref());

    if systemd {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn filter(debug: bool, rust_log: Option<&str>) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    match rust_log {
        Some(directives) if !debug => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        _ => EnvFilter::new(default_level),
    }
}
