// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-memory layout of one telemetry slot.
//!
//! Field order and widths match the record layout the producers have always
//! written: ten u16 counters, five u32 counters, two 32-byte strings. Each
//! field is an atomic of the same size and alignment, so a single field never
//! tears. Nothing orders writes across fields.

use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::record::InstanceRecord;
use crate::types::{ShortString, Tick, SHORT_STRING_LEN};

/// One slot as it lives in shared memory.
#[repr(C)]
pub struct SharedSlot {
    pid: AtomicU16,
    object_counts: [AtomicU16; 3],
    players: AtomicU16,
    ai_local: AtomicU16,
    ai_remote: AtomicU16,
    fps: AtomicU16,
    fps_min: AtomicU16,
    condition_frequency: AtomicU16,
    memory_bytes: AtomicU32,
    net_recv: AtomicU32,
    net_send: AtomicU32,
    disk_read: AtomicU32,
    tick: AtomicU32,
    mission: [AtomicU8; SHORT_STRING_LEN],
    profile: [AtomicU8; SHORT_STRING_LEN],
}

/// Bytes occupied by a slot. Slots are placed one page apart.
pub const SLOT_LAYOUT_SIZE: usize = std::mem::size_of::<SharedSlot>();

const _: () = assert!(SLOT_LAYOUT_SIZE == 104);

impl SharedSlot {
    pub fn pid(&self) -> u16 {
        self.pid.load(Ordering::Relaxed)
    }

    pub fn tick(&self) -> Tick {
        Tick::from_millis(self.tick.load(Ordering::Acquire))
    }

    pub fn set_pid(&self, pid: u16) {
        self.pid.store(pid, Ordering::Relaxed);
    }

    pub fn set_tick(&self, tick: Tick) {
        self.tick.store(tick.millis(), Ordering::Release);
    }

    pub fn set_fps(&self, fps: u16, fps_min: u16) {
        self.fps.store(fps, Ordering::Relaxed);
        self.fps_min.store(fps_min, Ordering::Relaxed);
    }

    pub fn set_condition_frequency(&self, frequency: u16) {
        self.condition_frequency.store(frequency, Ordering::Relaxed);
    }

    pub fn set_population(&self, players: u16, ai_local: u16, ai_remote: u16) {
        self.players.store(players, Ordering::Relaxed);
        self.ai_local.store(ai_local, Ordering::Relaxed);
        self.ai_remote.store(ai_remote, Ordering::Relaxed);
    }

    pub fn set_memory_bytes(&self, bytes: u32) {
        self.memory_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn set_object_count(&self, category: usize, count: u16) {
        self.object_counts[category].store(count, Ordering::Relaxed);
    }

    pub fn set_io_counters(&self, net_recv: u32, net_send: u32, disk_read: u32) {
        self.net_recv.store(net_recv, Ordering::Relaxed);
        self.net_send.store(net_send, Ordering::Relaxed);
        self.disk_read.store(disk_read, Ordering::Relaxed);
    }

    pub fn set_mission(&self, mission: &ShortString) {
        store_text(&self.mission, mission);
    }

    pub fn set_profile(&self, profile: &ShortString) {
        store_text(&self.profile, profile);
    }

    /// Zero every field.
    pub fn clear(&self) {
        self.set_pid(0);
        for count in &self.object_counts {
            count.store(0, Ordering::Relaxed);
        }
        self.set_population(0, 0, 0);
        self.set_fps(0, 0);
        self.set_condition_frequency(0);
        self.set_memory_bytes(0);
        self.set_io_counters(0, 0, 0);
        self.set_mission(&ShortString::EMPTY);
        self.set_profile(&ShortString::EMPTY);
        self.set_tick(Tick::from_millis(0));
    }

    /// Field-by-field copy. Not atomic as a whole.
    pub fn load(&self) -> InstanceRecord {
        InstanceRecord {
            pid: self.pid(),
            object_counts: [
                self.object_counts[0].load(Ordering::Relaxed),
                self.object_counts[1].load(Ordering::Relaxed),
                self.object_counts[2].load(Ordering::Relaxed),
            ],
            players: self.players.load(Ordering::Relaxed),
            ai_local: self.ai_local.load(Ordering::Relaxed),
            ai_remote: self.ai_remote.load(Ordering::Relaxed),
            fps: self.fps.load(Ordering::Relaxed),
            fps_min: self.fps_min.load(Ordering::Relaxed),
            condition_frequency: self.condition_frequency.load(Ordering::Relaxed),
            memory_bytes: self.memory_bytes.load(Ordering::Relaxed),
            net_recv: self.net_recv.load(Ordering::Relaxed),
            net_send: self.net_send.load(Ordering::Relaxed),
            disk_read: self.disk_read.load(Ordering::Relaxed),
            last_updated: self.tick(),
            mission: load_text(&self.mission),
            profile: load_text(&self.profile),
        }
    }
}

fn store_text(field: &[AtomicU8; SHORT_STRING_LEN], text: &ShortString) {
    for (cell, byte) in field.iter().zip(text.as_bytes()) {
        cell.store(*byte, Ordering::Relaxed);
    }
}

fn load_text(field: &[AtomicU8; SHORT_STRING_LEN]) -> ShortString {
    let mut raw = [0u8; SHORT_STRING_LEN];
    for (byte, cell) in raw.iter_mut().zip(field) {
        *byte = cell.load(Ordering::Relaxed);
    }
    ShortString::from_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_slot() -> Box<SharedSlot> {
        // SAFETY: all-zero bytes are a valid SharedSlot (atomics of zero)
        Box::new(unsafe { std::mem::zeroed() })
    }

    #[test]
    fn test_layout_offsets() {
        assert_eq!(std::mem::offset_of!(SharedSlot, memory_bytes), 20);
        assert_eq!(std::mem::offset_of!(SharedSlot, tick), 36);
        assert_eq!(std::mem::offset_of!(SharedSlot, mission), 40);
        assert_eq!(std::mem::offset_of!(SharedSlot, profile), 72);
    }

    #[test]
    fn test_set_then_load() {
        let slot = zeroed_slot();
        slot.set_pid(1234);
        slot.set_fps(50, 25);
        slot.set_object_count(2, 6);
        slot.set_mission(&ShortString::new("asmtest"));
        slot.set_tick(Tick::from_millis(777));

        let record = slot.load();
        assert_eq!(record.pid, 1234);
        assert_eq!(record.fps, 50);
        assert_eq!(record.fps_min, 25);
        assert_eq!(record.object_counts, [0, 0, 6]);
        assert_eq!(record.mission.to_string_lossy(), "asmtest");
        assert_eq!(record.last_updated, Tick::from_millis(777));
    }

    #[test]
    fn test_clear_resets_everything() {
        let slot = zeroed_slot();
        slot.set_pid(9);
        slot.set_population(1, 2, 3);
        slot.set_profile(&ShortString::new("3server"));
        slot.clear();
        assert_eq!(slot.load(), InstanceRecord::default());
    }
}
