//! asmon Core Library
//!
//! Game server telemetry: a lock-free table of per-instance metrics in POSIX
//! shared memory, the producer agent that fills it, and a TCP service that
//! broadcasts snapshots of it to polling clients.

pub mod allocator;
pub mod client;
pub mod config;
pub mod error;
pub mod producer;
pub mod record;
pub mod server;
pub mod shm;
pub mod store;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use allocator::{select_slot, SlotPolicy, SlotView};
pub use client::{Client, PollMode, SnapshotSink};
pub use config::{ClientConfig, Config, ConfigLoader, ProducerConfig, ServerConfig};
pub use error::{AsmError, AsmResult, HardValidationError, StoreError, WireError};
pub use producer::Producer;
pub use record::InstanceRecord;
pub use server::{BroadcastServer, ServerState, Shutdown, ShutdownTrigger};
pub use store::{MetricUpdate, ObjectCategory, StoreConfig, TelemetryStore};
pub use types::{InstanceSelection, MaxClients, Port, ShortString, SlotCapacity, Tick};
