// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Instance record: the latest metrics of one tracked game server.

use serde::Serialize;

use crate::types::{ShortString, Tick};

/// Plain copy of one slot.
///
/// Produced by [`TelemetryStore::snapshot`](crate::store::TelemetryStore::snapshot)
/// and by the wire decoder. A record with `pid == 0` is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstanceRecord {
    pub pid: u16,
    pub object_counts: [u16; 3],
    pub players: u16,
    pub ai_local: u16,
    pub ai_remote: u16,
    pub fps: u16,
    pub fps_min: u16,
    pub condition_frequency: u16,
    pub memory_bytes: u32,
    pub net_recv: u32,
    pub net_send: u32,
    pub disk_read: u32,
    pub last_updated: Tick,
    pub mission: ShortString,
    pub profile: ShortString,
}

impl InstanceRecord {
    /// Never claimed, or cleared by its producer.
    pub fn is_empty(&self) -> bool {
        self.pid == 0
    }

    /// Occupied and refreshed within the liveness window.
    pub fn is_live(&self, now: Tick, window_ms: u32) -> bool {
        !self.is_empty() && !self.last_updated.is_stale(now, window_ms)
    }

    pub fn memory_mib(&self) -> u32 {
        self.memory_bytes / (1024 * 1024)
    }
}
