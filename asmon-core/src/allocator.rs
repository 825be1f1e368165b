// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Slot allocation policy.
//!
//! Selection is a pure function over a scan of `(pid, tick)` views. The store
//! writes only the slot this returns.

use crate::types::Tick;

/// How a producer's slot is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPolicy {
    /// First empty or stale slot, lowest index wins.
    FreeScan,
    /// This index, unconditionally, when in range. Out of range falls back
    /// to a free scan.
    Directed(usize),
}

impl SlotPolicy {
    /// Derive a policy from a profile name such as `"3server"`.
    ///
    /// Leading decimal digits select the slot; anything else scans.
    pub fn from_profile_prefix(profile: &str) -> Self {
        let digits: &str = {
            let end = profile
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(profile.len());
            &profile[..end]
        };
        if digits.is_empty() {
            return Self::FreeScan;
        }
        let index = digits.bytes().fold(0usize, |acc, d| {
            acc.saturating_mul(10).saturating_add((d - b'0') as usize)
        });
        Self::Directed(index)
    }
}

/// Minimal view of a slot used for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotView {
    pub pid: u16,
    pub last_updated: Tick,
}

impl SlotView {
    /// Empty or stale at `now`.
    pub fn is_available(&self, now: Tick, window_ms: u32) -> bool {
        self.pid == 0 || self.last_updated.is_stale(now, window_ms)
    }
}

/// Pick a slot for a new producer.
///
/// `now` must be sampled after `views` were read. Returns `None` when every
/// slot is occupied and fresh.
pub fn select_slot(
    views: &[SlotView],
    policy: SlotPolicy,
    now: Tick,
    window_ms: u32,
) -> Option<usize> {
    if let SlotPolicy::Directed(index) = policy {
        if index < views.len() {
            return Some(index);
        }
    }

    views
        .iter()
        .position(|view| view.is_available(now, window_ms))
}
