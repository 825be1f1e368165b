// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Unix signal handling.

use asmon_core::ShutdownTrigger;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

/// Trigger shutdown on SIGINT or SIGTERM. SIGHUP is logged and ignored.
pub fn shutdown_on_signal(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT");
                    break;
                }
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, ignoring");
                }
            }
        }
        trigger.trigger();
    }))
}
