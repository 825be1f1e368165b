// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `asmon simulate` command - Publish synthetic telemetry.
//!
//! Each simulated instance is a [`Producer`] driven through the same text
//! calls a game server issues, so a local `serve` and `poll` pair can be
//! exercised without a game running.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use asmon_core::producer::INIT_FAILED_REPLY;
use asmon_core::server::shutdown_channel;
use asmon_core::{ConfigLoader, Producer, TelemetryStore};

use crate::signals;

const MISSIONS: [&str; 3] = ["Domination", "Invade & Annex", "Escape Altis"];

/// Calls one instance issues at a given step.
///
/// Values move on a fixed pattern so that several instances are easy to
/// tell apart in a table.
fn calls_for(instance: usize, step: u64) -> Vec<String> {
    let phase = (step + instance as u64 * 7) % 20;
    let fps = 40 + phase;
    let fps_min = 25 + phase / 2;
    let players = (instance as u64 * 3 + step / 5) % 64;
    let ai_local = 50 + phase * 4;
    let ai_remote = 10 + phase;

    let mut calls = vec![
        format!("0:{}:{}", fps, fps_min),
        format!("1:{}", 200 + phase * 10),
        format!("2:{}:{}:{}", players, ai_local, ai_remote),
    ];
    if step == 0 {
        calls.push(format!("3:{}", MISSIONS[instance % MISSIONS.len()]));
    }
    if step % 5 == 0 {
        calls.push(format!("4:{}", 400 + phase * 3));
        calls.push(format!("5:{}", 30 + instance));
        calls.push(format!("6:{}", 900 + phase * 5));
    }
    calls
}

pub async fn execute(
    config_path: Option<&Path>,
    instances: usize,
    profile: &str,
    interval_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let store = Arc::new(TelemetryStore::open(&config.store)?);

    let base_pid = std::process::id();
    let mut producers = Vec::with_capacity(instances);
    for i in 0..instances {
        let pid = base_pid.wrapping_add(i as u32) as u16;
        let mut producer = Producer::with_pid(Arc::clone(&store), config.producer.clone(), pid);
        let reply = producer.call(&format!("9:{}-{}", profile, i));
        if reply == INIT_FAILED_REPLY {
            tracing::warn!(instance = i, "No free slot, stopping at {} instance(s)", i);
            break;
        }
        tracing::info!(instance = i, slot = ?producer.slot(), pid, "Simulated instance registered");
        producers.push(producer);
    }

    if producers.is_empty() {
        return Err("no slot could be claimed".into());
    }

    let (trigger, mut shutdown) = shutdown_channel();
    let signal_task = signals::shutdown_on_signal(trigger)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut step = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => break,
        }
        for (i, producer) in producers.iter_mut().enumerate() {
            for call in calls_for(i, step) {
                producer.call(&call);
            }
        }
        tracing::debug!(step, instances = producers.len(), "Published");
        step += 1;
    }

    signal_task.abort();
    tracing::info!(instances = producers.len(), "Releasing simulated instances");
    drop(producers);
    Ok(())
}
