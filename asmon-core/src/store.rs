// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Telemetry store: a fixed array of slots in shared memory.
//!
//! One page per slot. Producers write their own slot, the server copies all
//! of them. There is no lock anywhere: disjoint slots by convention, and a
//! snapshot may catch a record halfway through an update.

use crate::allocator::{select_slot, SlotPolicy, SlotView};
use crate::error::StoreError;
use crate::record::InstanceRecord;
use crate::shm::{SharedMemoryRegion, SharedSlot, SLOT_LAYOUT_SIZE};
use crate::types::{ShortString, SlotCapacity, Tick};

/// Name of the shared memory object the producers publish into.
pub const DEFAULT_STORE_NAME: &str = "ASM_MapFile";

/// Which shared object to open and how many slots it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub name: String,
    pub capacity: SlotCapacity,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STORE_NAME.to_string(),
            capacity: SlotCapacity::default(),
        }
    }
}

/// Object-count category, 0..=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectCategory {
    Zero,
    One,
    Two,
}

impl ObjectCategory {
    fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// A group of fields written together by one producer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricUpdate {
    /// Claim bookkeeping: owner pid, profile name, zeroed memory, fresh tick.
    Register {
        pid: u16,
        profile: ShortString,
        at: Tick,
    },
    /// Frame rate pair. Doubles as the liveness heartbeat.
    Fps { fps: u16, fps_min: u16, at: Tick },
    ConditionFrequency(u16),
    /// Player and AI counts plus the resident memory sampled with them.
    Population {
        players: u16,
        ai_local: u16,
        ai_remote: u16,
        memory_bytes: u32,
    },
    Mission(ShortString),
    ObjectCount { category: ObjectCategory, count: u16 },
    IoCounters {
        net_recv: u32,
        net_send: u32,
        disk_read: u32,
    },
    /// Reset memory to zero, as a repeated init does.
    ResetMemory,
}

/// Shared telemetry table.
pub struct TelemetryStore {
    region: SharedMemoryRegion,
    capacity: usize,
    stride: usize,
}

impl TelemetryStore {
    /// Create or attach the shared region with one page per slot.
    ///
    /// # Errors
    /// `StoreError::StoreUnavailable` when the shared memory primitive fails.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open_with_stride(config, SharedMemoryRegion::page_size())
    }

    /// Create or attach with an explicit per-record stride.
    pub fn open_with_stride(config: &StoreConfig, stride: usize) -> Result<Self, StoreError> {
        if stride < SLOT_LAYOUT_SIZE || stride % std::mem::align_of::<SharedSlot>() != 0 {
            return Err(StoreError::StoreUnavailable {
                name: config.name.clone(),
                reason: format!("Stride {} cannot hold a {}-byte slot", stride, SLOT_LAYOUT_SIZE),
            });
        }

        let capacity = config.capacity.value();
        let region = SharedMemoryRegion::open_or_create(&config.name, stride * capacity)?;

        tracing::info!(
            name = %region.name(),
            capacity = capacity,
            stride = stride,
            owner = region.is_owner(),
            "Telemetry store open"
        );

        Ok(Self {
            region,
            capacity,
            stride,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Whether closing this store removes the shared object.
    pub fn is_owner(&self) -> bool {
        self.region.is_owner()
    }

    fn slot(&self, index: usize) -> Result<&SharedSlot, StoreError> {
        if index >= self.capacity {
            return Err(StoreError::SlotOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        // SAFETY: index < capacity, so the slot lies within the mapping;
        // the stride is a multiple of the slot alignment and the mapping is
        // page aligned; every bit pattern is a valid SharedSlot.
        Ok(unsafe { &*(self.region.as_ptr().add(index * self.stride) as *const SharedSlot) })
    }

    fn slots(&self) -> impl Iterator<Item = &SharedSlot> + '_ {
        (0..self.capacity).filter_map(move |index| self.slot(index).ok())
    }

    /// Pick a slot for a new producer.
    ///
    /// Directed policies return their index unconditionally when in range.
    /// Otherwise the first empty or stale slot wins. Two producers claiming
    /// concurrently can pick the same slot; nothing arbitrates between them.
    pub fn claim(&self, policy: SlotPolicy, stale_window_ms: u32) -> Result<usize, StoreError> {
        let views = self.views();
        let now = Tick::now();

        let index = select_slot(&views, policy, now, stale_window_ms).ok_or(
            StoreError::NoFreeSlot {
                capacity: self.capacity,
            },
        )?;

        tracing::debug!(slot = index, policy = ?policy, "Slot claimed");
        Ok(index)
    }

    /// Write one field group into a slot. No ownership check.
    pub fn update(&self, index: usize, update: &MetricUpdate) -> Result<(), StoreError> {
        let slot = self.slot(index)?;
        match update {
            MetricUpdate::Register { pid, profile, at } => {
                slot.set_memory_bytes(0);
                slot.set_tick(*at);
                slot.set_pid(*pid);
                slot.set_profile(profile);
            }
            MetricUpdate::Fps { fps, fps_min, at } => {
                slot.set_fps(*fps, *fps_min);
                slot.set_tick(*at);
            }
            MetricUpdate::ConditionFrequency(frequency) => {
                slot.set_condition_frequency(*frequency);
            }
            MetricUpdate::Population {
                players,
                ai_local,
                ai_remote,
                memory_bytes,
            } => {
                slot.set_population(*players, *ai_local, *ai_remote);
                slot.set_memory_bytes(*memory_bytes);
            }
            MetricUpdate::Mission(mission) => slot.set_mission(mission),
            MetricUpdate::ObjectCount { category, count } => {
                slot.set_object_count(category.index(), *count);
            }
            MetricUpdate::IoCounters {
                net_recv,
                net_send,
                disk_read,
            } => slot.set_io_counters(*net_recv, *net_send, *disk_read),
            MetricUpdate::ResetMemory => slot.set_memory_bytes(0),
        }
        Ok(())
    }

    /// Zero a slot, making it empty.
    pub fn clear(&self, index: usize) -> Result<(), StoreError> {
        self.slot(index)?.clear();
        tracing::debug!(slot = index, "Slot cleared");
        Ok(())
    }

    /// Copy every slot as currently observed.
    pub fn snapshot(&self) -> Vec<InstanceRecord> {
        self.slots().map(SharedSlot::load).collect()
    }

    /// Copy one slot.
    pub fn record(&self, index: usize) -> Result<InstanceRecord, StoreError> {
        Ok(self.slot(index)?.load())
    }

    /// Owner and freshness of every slot.
    pub fn views(&self) -> Vec<SlotView> {
        self.slots()
            .map(|slot| SlotView {
                pid: slot.pid(),
                last_updated: slot.tick(),
            })
            .collect()
    }

    /// Unmap, and unlink the object if this process created it.
    pub fn close(self) {
        tracing::debug!(name = %self.name(), owner = self.is_owner(), "Closing telemetry store");
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LIVENESS_WINDOW_MS;

    fn test_store(tag: &str, capacity: usize) -> TelemetryStore {
        let config = StoreConfig {
            name: format!("asmon-store-{}-{}", tag, std::process::id()),
            capacity: SlotCapacity::new(capacity).unwrap(),
        };
        TelemetryStore::open(&config).unwrap()
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let store = test_store("fresh", 16);
        assert!(store.is_owner());
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 16);
        assert!(snapshot.iter().all(InstanceRecord::is_empty));
    }

    #[test]
    fn test_stride_is_page_sized() {
        let store = test_store("stride", 2);
        assert_eq!(store.stride(), SharedMemoryRegion::page_size());
    }

    #[test]
    fn test_stride_too_small_rejected() {
        let config = StoreConfig {
            name: format!("asmon-store-small-{}", std::process::id()),
            capacity: SlotCapacity::new(2).unwrap(),
        };
        assert!(TelemetryStore::open_with_stride(&config, 64).is_err());
    }

    #[test]
    fn test_claim_then_register() {
        let store = test_store("claim", 4);
        let index = store.claim(SlotPolicy::FreeScan, LIVENESS_WINDOW_MS).unwrap();
        assert_eq!(index, 0);

        store
            .update(
                index,
                &MetricUpdate::Register {
                    pid: 321,
                    profile: ShortString::new("server"),
                    at: Tick::now(),
                },
            )
            .unwrap();

        let next = store.claim(SlotPolicy::FreeScan, LIVENESS_WINDOW_MS).unwrap();
        assert_eq!(next, 1);
        assert_eq!(store.record(0).unwrap().pid, 321);
    }

    #[test]
    fn test_claim_no_free_slot() {
        let store = test_store("full", 2);
        for index in 0..2 {
            store
                .update(
                    index,
                    &MetricUpdate::Register {
                        pid: 10 + index as u16,
                        profile: ShortString::EMPTY,
                        at: Tick::now(),
                    },
                )
                .unwrap();
        }
        let result = store.claim(SlotPolicy::FreeScan, LIVENESS_WINDOW_MS);
        assert!(matches!(result, Err(StoreError::NoFreeSlot { capacity: 2 })));
    }

    #[test]
    fn test_claim_reuses_stale_slot() {
        let store = test_store("stale", 2);
        let long_ago = Tick::from_millis(Tick::now().millis().wrapping_sub(LIVENESS_WINDOW_MS + 5_000));
        store
            .update(
                0,
                &MetricUpdate::Register {
                    pid: 77,
                    profile: ShortString::EMPTY,
                    at: long_ago,
                },
            )
            .unwrap();
        store
            .update(
                1,
                &MetricUpdate::Register {
                    pid: 78,
                    profile: ShortString::EMPTY,
                    at: Tick::now(),
                },
            )
            .unwrap();

        assert_eq!(store.claim(SlotPolicy::FreeScan, LIVENESS_WINDOW_MS).unwrap(), 0);
    }

    #[test]
    fn test_update_out_of_range() {
        let store = test_store("range", 2);
        let result = store.update(5, &MetricUpdate::ResetMemory);
        assert!(matches!(result, Err(StoreError::SlotOutOfRange { index: 5, .. })));
    }

    #[test]
    fn test_clear_empties_slot() {
        let store = test_store("clear", 2);
        store
            .update(
                1,
                &MetricUpdate::Register {
                    pid: 5,
                    profile: ShortString::new("p"),
                    at: Tick::now(),
                },
            )
            .unwrap();
        store
            .update(1, &MetricUpdate::Mission(ShortString::new("m")))
            .unwrap();
        store.clear(1).unwrap();
        assert_eq!(store.record(1).unwrap(), InstanceRecord::default());
    }

    #[test]
    fn test_second_open_shares_slots() {
        let config = StoreConfig {
            name: format!("asmon-store-shared-{}", std::process::id()),
            capacity: SlotCapacity::new(4).unwrap(),
        };
        let server = TelemetryStore::open(&config).unwrap();
        let producer = TelemetryStore::open(&config).unwrap();
        assert!(!producer.is_owner());

        producer
            .update(
                2,
                &MetricUpdate::Population {
                    players: 8,
                    ai_local: 100,
                    ai_remote: 50,
                    memory_bytes: 4096,
                },
            )
            .unwrap();

        let record = server.record(2).unwrap();
        assert_eq!(record.players, 8);
        assert_eq!(record.ai_local, 100);
        assert_eq!(record.memory_bytes, 4096);
    }

    #[test]
    fn test_io_counters_reach_the_wire() {
        let store = test_store("io", 4);
        let now = Tick::now();
        store
            .update(
                1,
                &MetricUpdate::Register {
                    pid: 321,
                    profile: ShortString::new("io"),
                    at: now,
                },
            )
            .unwrap();
        store
            .update(
                1,
                &MetricUpdate::IoCounters {
                    net_recv: 70_000,
                    net_send: 80_000,
                    disk_read: 90_000,
                },
            )
            .unwrap();

        let encoded = crate::wire::encode_snapshot(&store.snapshot(), now, LIVENESS_WINDOW_MS);
        let decoded = crate::wire::decode_snapshot(&encoded, 4).unwrap();
        assert_eq!(decoded[1].pid, 321);
        assert_eq!(decoded[1].net_recv, 70_000);
        assert_eq!(decoded[1].net_send, 80_000);
        assert_eq!(decoded[1].disk_read, 90_000);
        assert!(decoded[0].is_empty());
    }
}
