// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared fixtures for the asmon benchmarks.
//!
//! # Benchmark Categories
//!
//! - **Snapshot codec**: encoding and decoding responses at various occupancy
//! - **Slot store**: claims, updates and snapshots against a live segment

use asmon_core::types::MAX_INSTANCES;
use asmon_core::{InstanceRecord, ShortString, StoreConfig, Tick};

/// Occupied-slot counts to benchmark.
pub const OCCUPANCY: &[usize] = &[0, 1, 4, 8, MAX_INSTANCES];

/// A full store's worth of records, the first `live` of them fresh at `now`.
pub fn records(live: usize, now: Tick) -> Vec<InstanceRecord> {
    (0..MAX_INSTANCES)
        .map(|slot| {
            if slot >= live {
                return InstanceRecord::default();
            }
            InstanceRecord {
                pid: 1000 + slot as u16,
                object_counts: [400, 35, 950],
                players: 12,
                ai_local: 180,
                ai_remote: 40,
                fps: 47,
                fps_min: 31,
                condition_frequency: 900,
                memory_bytes: 1_500 * 1024 * 1024,
                last_updated: now,
                mission: ShortString::new("Domination"),
                profile: ShortString::new(&format!("server{}", slot)),
                ..Default::default()
            }
        })
        .collect()
}

/// Store configuration with a per-process segment name.
pub fn store_config(tag: &str) -> StoreConfig {
    StoreConfig {
        name: format!("asmon-bench-{}-{}", tag, std::process::id()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_occupancy() {
        let now = Tick::from_millis(5_000);
        let records = records(4, now);
        assert_eq!(records.len(), MAX_INSTANCES);
        assert_eq!(records.iter().filter(|r| !r.is_empty()).count(), 4);
        assert!(records[3].is_live(now, 10_000));
    }
}
