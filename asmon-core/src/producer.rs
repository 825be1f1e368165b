// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Producer agent: the in-process side of a game server.
//!
//! The game process talks to the agent through short text calls of the form
//! `<tag>:<data>`. Each call becomes one [`MetricUpdate`] on the slot the
//! agent claimed at init. Calls before a successful init are ignored.
//!
//! | call                          | effect                                      |
//! |-------------------------------|---------------------------------------------|
//! | `9:<profile>`                 | claim a slot, returns the object-count options |
//! | `0:<fps>:<fpsmin>`            | frame rate, refreshes the liveness tick     |
//! | `1:<n>`                       | conditions evaluated since the last sample  |
//! | `2:<players>:<ailoc>:<airem>` | population, plus resident memory            |
//! | `3:<mission>`                 | mission name                                |
//! | `4:<n>` `5:<n>` `6:<n>`       | object counts 0, 1, 2                       |
//! | `version`, `id`               | diagnostics                                 |

use std::sync::Arc;
use std::time::Instant;

use crate::allocator::SlotPolicy;
use crate::config::ProducerConfig;
use crate::error::StoreError;
use crate::shm::SharedMemoryRegion;
use crate::store::{MetricUpdate, ObjectCategory, TelemetryStore};
use crate::types::{ShortString, Tick, LIVENESS_WINDOW_MS};

/// Longest call text accepted, tag and separator included.
pub const MAX_CALL_LEN: usize = 2050;

/// Reply to an init that found no slot.
pub const INIT_FAILED_REPLY: &str = r#"_ASM_OPT=[0,0,0,"","",""];"#;

/// Agent bound to at most one slot of a telemetry store.
pub struct Producer {
    store: Arc<TelemetryStore>,
    config: ProducerConfig,
    pid: u16,
    slot: Option<usize>,
    last_condition_sample: Instant,
}

impl Producer {
    /// Agent reporting the calling process id.
    pub fn new(store: Arc<TelemetryStore>, config: ProducerConfig) -> Self {
        Self::with_pid(store, config, std::process::id() as u16)
    }

    /// Agent reporting an explicit process id.
    ///
    /// A pid of zero would read as an empty slot, so it is bumped to one.
    pub fn with_pid(store: Arc<TelemetryStore>, config: ProducerConfig, pid: u16) -> Self {
        Self {
            store,
            config,
            pid: pid.max(1),
            slot: None,
            last_condition_sample: Instant::now(),
        }
    }

    /// Slot claimed at init, if any.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Claim a slot and publish the profile.
    ///
    /// A second init only resets the memory counter of the slot already held.
    pub fn init(&mut self, profile: &str) -> Result<usize, StoreError> {
        if let Some(index) = self.slot {
            self.store.update(index, &MetricUpdate::ResetMemory)?;
            return Ok(index);
        }

        let policy = if self.config.profile_prefix_slot_selection {
            SlotPolicy::from_profile_prefix(profile)
        } else {
            SlotPolicy::FreeScan
        };

        let index = self.store.claim(policy, LIVENESS_WINDOW_MS)?;
        self.store.update(
            index,
            &MetricUpdate::Register {
                pid: self.pid,
                profile: ShortString::new(profile),
                at: Tick::now(),
            },
        )?;
        self.slot = Some(index);

        tracing::info!(slot = index, pid = self.pid, profile = %profile, "Producer registered");
        Ok(index)
    }

    /// Write an update to the claimed slot. No-op before init.
    pub fn update(&self, update: &MetricUpdate) -> Result<(), StoreError> {
        match self.slot {
            Some(index) => self.store.update(index, update),
            None => Ok(()),
        }
    }

    /// Handle one text call and return the reply text (often empty).
    pub fn call(&mut self, text: &str) -> String {
        if text.is_empty() || text.len() >= MAX_CALL_LEN {
            return String::new();
        }

        let bytes = text.as_bytes();
        if !bytes[0].is_ascii_digit() {
            return self.diagnostic(text);
        }
        if bytes.len() < 3 || bytes[1] != b':' {
            return String::new();
        }

        let data = &text[2..];
        let result = match bytes[0] {
            b'9' => return self.init_reply(data),
            b'0' => {
                let (fps, rest) = leading_number(data);
                let (fps_min, _) = leading_number(skip_separator(rest));
                self.update(&MetricUpdate::Fps {
                    fps: fps as u16,
                    fps_min: fps_min as u16,
                    at: Tick::now(),
                })
            }
            b'1' => {
                let (conditions, _) = leading_number(data);
                let frequency = self.sample_condition_frequency(conditions);
                self.update(&MetricUpdate::ConditionFrequency(frequency))
            }
            b'2' => {
                let (players, rest) = leading_number(data);
                let (ai_local, rest) = leading_number(skip_separator(rest));
                let (ai_remote, _) = leading_number(skip_separator(rest));
                self.update(&MetricUpdate::Population {
                    players: players as u16,
                    ai_local: ai_local as u16,
                    ai_remote: ai_remote as u16,
                    memory_bytes: resident_memory_bytes(),
                })
            }
            b'3' => self.update(&MetricUpdate::Mission(ShortString::new(data))),
            tag @ b'4'..=b'6' => {
                let category = match tag {
                    b'4' => ObjectCategory::Zero,
                    b'5' => ObjectCategory::One,
                    _ => ObjectCategory::Two,
                };
                let (count, _) = leading_number(data);
                self.update(&MetricUpdate::ObjectCount {
                    category,
                    count: count as u16,
                })
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, call = %text, "Update failed");
        }
        String::new()
    }

    fn diagnostic(&self, text: &str) -> String {
        if text.eq_ignore_ascii_case("version") {
            env!("CARGO_PKG_VERSION").to_string()
        } else if text.eq_ignore_ascii_case("id") {
            self.slot.unwrap_or(0).to_string()
        } else {
            String::new()
        }
    }

    fn init_reply(&mut self, profile: &str) -> String {
        let already_registered = self.slot.is_some();
        match self.init(profile) {
            Ok(_) if already_registered => String::new(),
            Ok(_) => self.options_reply(),
            Err(e) => {
                tracing::error!(error = %e, "Init failed");
                if already_registered {
                    String::new()
                } else {
                    INIT_FAILED_REPLY.to_string()
                }
            }
        }
    }

    /// Object-count schedule handed back to the game on init.
    fn options_reply(&self) -> String {
        let [i0, i1, i2] = self.config.object_count_intervals;
        let [c0, c1, c2] = &self.config.object_count_commands;
        format!(
            "_ASM_OPT=[{},{},{},\"{}\",\"{}\",\"{}\"];",
            i0, i1, i2, c0, c1, c2
        )
    }

    /// Evaluations per second since the previous sample, rounded.
    fn sample_condition_frequency(&mut self, conditions: u32) -> u16 {
        let now = Instant::now();
        let seconds = now.duration_since(self.last_condition_sample).as_secs_f64();
        self.last_condition_sample = now;
        condition_frequency(conditions, seconds)
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        if let Some(index) = self.slot.take() {
            if let Err(e) = self.store.clear(index) {
                tracing::error!(slot = index, error = %e, "Failed to clear slot");
            } else {
                tracing::info!(slot = index, pid = self.pid, "Producer released slot");
            }
        }
    }
}

/// `conditions * 1000 / seconds`, rounded half up, saturating.
pub fn condition_frequency(conditions: u32, seconds: f64) -> u16 {
    let rate = (conditions as f64 * 1000.0 / seconds + 0.5).floor();
    // f64 to int casts saturate; NaN becomes 0
    rate as u16
}

/// Parse an optionally signed decimal prefix the way the game's callers
/// expect: leading whitespace skipped, no digits means zero, overflow wraps.
fn leading_number(text: &str) -> (u32, &str) {
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if end == 0 {
        return (0, text);
    }

    let value = unsigned[..end].bytes().fold(0u32, |acc, d| {
        acc.wrapping_mul(10).wrapping_add((d - b'0') as u32)
    });
    let value = if negative { value.wrapping_neg() } else { value };
    (value, &unsigned[end..])
}

/// Drop the one separator character between two numbers.
fn skip_separator(text: &str) -> &str {
    let mut chars = text.chars();
    chars.next();
    chars.as_str()
}

/// Resident set size of this process in bytes, zero when unknown.
fn resident_memory_bytes() -> u32 {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|statm| parse_statm_resident(&statm))
        .map(|pages| {
            let bytes = pages.saturating_mul(SharedMemoryRegion::page_size() as u64);
            bytes.min(u32::MAX as u64) as u32
        })
        .unwrap_or(0)
}

fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}
