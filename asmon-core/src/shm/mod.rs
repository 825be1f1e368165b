// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory module.
//!
//! POSIX shared memory mapping plus the fixed slot layout that producers
//! and the server both read and write without locks.

mod layout;
mod region;

pub use layout::{SharedSlot, SLOT_LAYOUT_SIZE};
pub use region::SharedMemoryRegion;
