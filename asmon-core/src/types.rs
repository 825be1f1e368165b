// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs and fixed-width telemetry values.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::HardValidationError;

/// Upper bound on tracked instances. The store never grows past this.
pub const MAX_INSTANCES: usize = 16;

/// Number of slots shown by one instance window.
pub const WINDOW_SIZE: usize = 4;

/// Number of selectable windows over a full store.
pub const WINDOW_COUNT: u8 = (MAX_INSTANCES / WINDOW_SIZE) as u8;

/// Bound of the mission and profile text fields, NUL terminator included.
pub const SHORT_STRING_LEN: usize = 32;

/// A slot that has not been refreshed for this long is stale.
pub const LIVENESS_WINDOW_MS: u32 = 10_000;

/// Default TCP port of the snapshot service.
pub const DEFAULT_PORT: u16 = 24000;

/// Validated network port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, HardValidationError> {
        if port == 0 {
            return Err(HardValidationError::InvalidPort {
                port,
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Self(DEFAULT_PORT)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = HardValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Maximum number of concurrently served clients. At least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxClients(usize);

impl MaxClients {
    pub fn new(limit: usize) -> Result<Self, HardValidationError> {
        if limit == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "max_clients",
                value: "0".to_string(),
                reason: "At least one client must be allowed".to_string(),
            });
        }
        Ok(Self(limit))
    }

    pub fn value(&self) -> usize {
        self.0
    }
}

impl Default for MaxClients {
    fn default() -> Self {
        Self(1)
    }
}

/// Number of slots in the telemetry store, 1..=MAX_INSTANCES.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCapacity(usize);

impl SlotCapacity {
    pub fn new(capacity: usize) -> Result<Self, HardValidationError> {
        if !(1..=MAX_INSTANCES).contains(&capacity) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "capacity",
                value: capacity.to_string(),
                reason: format!("Must be between 1 and {}", MAX_INSTANCES),
            });
        }
        Ok(Self(capacity))
    }

    pub fn value(&self) -> usize {
        self.0
    }
}

impl Default for SlotCapacity {
    fn default() -> Self {
        Self(MAX_INSTANCES)
    }
}

/// Which slots a client presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceSelection {
    /// Every slot of the store.
    #[default]
    All,
    /// One fixed window of four slots, 0..WINDOW_COUNT.
    Window(u8),
}

impl InstanceSelection {
    /// Create a window selection with validation.
    pub fn window(index: u8) -> Result<Self, HardValidationError> {
        if index >= WINDOW_COUNT {
            return Err(HardValidationError::InvalidFieldValue {
                field: "instance_set",
                value: index.to_string(),
                reason: format!("Must be between 0 and {}", WINDOW_COUNT - 1),
            });
        }
        Ok(Self::Window(index))
    }

    /// Slot indices covered by this selection, clamped to `capacity`.
    pub fn slots(&self, capacity: usize) -> Range<usize> {
        match self {
            Self::All => 0..capacity,
            Self::Window(index) => {
                let start = (*index as usize * WINDOW_SIZE).min(capacity);
                let end = (start + WINDOW_SIZE).min(capacity);
                start..end
            }
        }
    }
}

impl fmt::Display for InstanceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Window(index) => write!(f, "window {}", index),
        }
    }
}

/// Monotonic millisecond counter, truncated to 32 bits.
///
/// Wraps roughly every 49.7 days. All comparisons go through modular
/// subtraction, never through ordering of the raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Tick(u32);

impl Tick {
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Sample the system-wide monotonic clock.
    ///
    /// CLOCK_MONOTONIC is shared by every process on the host, so ticks
    /// written by producers compare against ticks sampled by the server.
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec and CLOCK_MONOTONIC is
        // always supported on Linux.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        let millis = (ts.tv_sec as u64)
            .wrapping_mul(1000)
            .wrapping_add(ts.tv_nsec as u64 / 1_000_000);
        Self(millis as u32)
    }

    pub fn millis(&self) -> u32 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, modulo 2^32.
    pub fn wrapping_since(&self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Whether a record stamped with `self` is stale at `now`.
    ///
    /// `now` must be sampled after `self` was read.
    pub fn is_stale(&self, now: Tick, window_ms: u32) -> bool {
        now.wrapping_since(*self) > window_ms
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed 32-byte text field as stored in a slot and sent on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortString([u8; SHORT_STRING_LEN]);

impl ShortString {
    pub const EMPTY: Self = Self([0; SHORT_STRING_LEN]);

    /// Copy `text`, truncated so the last byte stays NUL.
    pub fn new(text: &str) -> Self {
        let mut raw = [0u8; SHORT_STRING_LEN];
        let bytes = text.as_bytes();
        let len = bytes.len().min(SHORT_STRING_LEN - 1);
        raw[..len].copy_from_slice(&bytes[..len]);
        Self(raw)
    }

    /// Wrap raw bytes exactly as received.
    pub const fn from_bytes(raw: [u8; SHORT_STRING_LEN]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_STRING_LEN] {
        &self.0
    }

    /// Text up to the first NUL, invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(SHORT_STRING_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl Default for ShortString {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

impl Serialize for ShortString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}
