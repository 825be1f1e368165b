// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cooperative shutdown signal.
//!
//! One [`ShutdownTrigger`] fans out to any number of cloned [`Shutdown`]
//! receivers. Loops check the signal between iterations, never mid-write.

use tokio::sync::watch;

/// Sending half. Dropping it also signals shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace never fails, even with no receivers left
        self.tx.send_replace(true);
    }
}

/// Receiving half, cheap to clone into every task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn recv(&mut self) {
        // An Err means the trigger was dropped, which counts as shutdown.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Create a linked trigger and receiver.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}
