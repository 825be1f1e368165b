// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Binary snapshot protocol.
//!
//! Host byte order throughout, no framing, no version field.
//!
//! Request: one 4-byte token. Zero asks for a snapshot; anything else is
//! ignored by the server.
//!
//! Response: one entry per slot, in index order.
//! - empty or stale slot: 2 zero bytes
//! - live slot: 104 bytes
//!
//! ```text
//! offset  size  field
//!      0     2  pid (never zero in a full record)
//!      2     6  object counts 0..2
//!      8     2  players
//!     10     2  ai_local
//!     12     2  ai_remote
//!     14     2  fps
//!     16     2  fps_min
//!     18     2  condition_frequency
//!     20     4  memory_bytes
//!     24     4  net_recv
//!     28     4  net_send
//!     32     4  disk_read
//!     36     4  last_updated
//!     40    32  mission, NUL padded
//!     72    32  profile, NUL padded
//! ```
//!
//! The decoder tells the two shapes apart by the leading u16 alone, so a
//! response is only decodable by a peer that knows the slot count.

use crate::error::WireError;
use crate::record::InstanceRecord;
use crate::types::{ShortString, Tick, SHORT_STRING_LEN};

pub const REQUEST_LEN: usize = 4;
pub const SHORT_RECORD_LEN: usize = 2;
pub const FULL_RECORD_LEN: usize = 104;

/// Token that asks for a snapshot.
pub const SNAPSHOT_TOKEN: u32 = 0;

/// A decoded request token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Snapshot,
    Unknown(u32),
}

impl Request {
    pub fn from_bytes(bytes: [u8; REQUEST_LEN]) -> Self {
        match u32::from_ne_bytes(bytes) {
            SNAPSHOT_TOKEN => Self::Snapshot,
            other => Self::Unknown(other),
        }
    }

    pub fn to_bytes(self) -> [u8; REQUEST_LEN] {
        match self {
            Self::Snapshot => SNAPSHOT_TOKEN.to_ne_bytes(),
            Self::Unknown(token) => token.to_ne_bytes(),
        }
    }
}

/// Largest response a store of `capacity` slots can produce.
pub const fn max_response_len(capacity: usize) -> usize {
    capacity * FULL_RECORD_LEN
}

/// Encode a snapshot. `now` must be sampled after `records` were copied.
pub fn encode_snapshot(records: &[InstanceRecord], now: Tick, window_ms: u32) -> Vec<u8> {
    let live = records.iter().filter(|r| r.is_live(now, window_ms)).count();
    let mut out = Vec::with_capacity(
        live * FULL_RECORD_LEN + (records.len() - live) * SHORT_RECORD_LEN,
    );

    for record in records {
        if record.is_live(now, window_ms) {
            encode_full(record, &mut out);
        } else {
            out.extend_from_slice(&[0u8; SHORT_RECORD_LEN]);
        }
    }
    out
}

fn encode_full(record: &InstanceRecord, out: &mut Vec<u8>) {
    for value in [
        record.pid,
        record.object_counts[0],
        record.object_counts[1],
        record.object_counts[2],
        record.players,
        record.ai_local,
        record.ai_remote,
        record.fps,
        record.fps_min,
        record.condition_frequency,
    ] {
        out.extend_from_slice(&value.to_ne_bytes());
    }
    for value in [
        record.memory_bytes,
        record.net_recv,
        record.net_send,
        record.disk_read,
        record.last_updated.millis(),
    ] {
        out.extend_from_slice(&value.to_ne_bytes());
    }
    out.extend_from_slice(record.mission.as_bytes());
    out.extend_from_slice(record.profile.as_bytes());
}

/// Decode exactly `capacity` entries from `buf`.
///
/// Short entries decode to an empty record.
///
/// # Errors
/// `WireError::Incomplete` if the buffer ends before the last entry,
/// `WireError::TrailingBytes` if bytes remain after it.
pub fn decode_snapshot(buf: &[u8], capacity: usize) -> Result<Vec<InstanceRecord>, WireError> {
    let mut records = Vec::with_capacity(capacity);
    let mut offset = 0;

    for _ in 0..capacity {
        let (record, used) = decode_entry(buf, offset)?;
        records.push(record);
        offset += used;
    }

    if offset < buf.len() {
        return Err(WireError::TrailingBytes {
            extra: buf.len() - offset,
        });
    }
    Ok(records)
}

fn decode_entry(buf: &[u8], offset: usize) -> Result<(InstanceRecord, usize), WireError> {
    let available = buf.len().saturating_sub(offset);
    if available < SHORT_RECORD_LEN {
        return Err(WireError::Incomplete {
            offset,
            needed: SHORT_RECORD_LEN,
            available,
        });
    }

    if read_u16(buf, offset) == 0 {
        return Ok((InstanceRecord::default(), SHORT_RECORD_LEN));
    }

    if available < FULL_RECORD_LEN {
        return Err(WireError::Incomplete {
            offset,
            needed: FULL_RECORD_LEN,
            available,
        });
    }

    let entry = &buf[offset..offset + FULL_RECORD_LEN];
    let record = InstanceRecord {
        pid: read_u16(entry, 0),
        object_counts: [read_u16(entry, 2), read_u16(entry, 4), read_u16(entry, 6)],
        players: read_u16(entry, 8),
        ai_local: read_u16(entry, 10),
        ai_remote: read_u16(entry, 12),
        fps: read_u16(entry, 14),
        fps_min: read_u16(entry, 16),
        condition_frequency: read_u16(entry, 18),
        memory_bytes: read_u32(entry, 20),
        net_recv: read_u32(entry, 24),
        net_send: read_u32(entry, 28),
        disk_read: read_u32(entry, 32),
        last_updated: Tick::from_millis(read_u32(entry, 36)),
        mission: read_text(entry, 40),
        profile: read_text(entry, 40 + SHORT_STRING_LEN),
    };
    Ok((record, FULL_RECORD_LEN))
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_text(buf: &[u8], at: usize) -> ShortString {
    let mut raw = [0u8; SHORT_STRING_LEN];
    raw.copy_from_slice(&buf[at..at + SHORT_STRING_LEN]);
    ShortString::from_bytes(raw)
}
