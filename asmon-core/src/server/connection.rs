// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One accepted client connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::shutdown::Shutdown;
use crate::record::InstanceRecord;
use crate::store::TelemetryStore;
use crate::types::{Tick, LIVENESS_WINDOW_MS, MAX_INSTANCES};
use crate::wire::{encode_snapshot, Request, REQUEST_LEN};

/// A held place under the client limit. Released on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    active: Arc<AtomicUsize>,
}

impl ConnectionPermit {
    /// Take a place if fewer than `limit` are held.
    pub fn try_acquire(active: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .ok()
            .map(|_| Self {
                active: Arc::clone(active),
            })
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Serving side of one client.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    ordinal: u64,
    store: Arc<TelemetryStore>,
    _permit: ConnectionPermit,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        ordinal: u64,
        store: Arc<TelemetryStore>,
        permit: ConnectionPermit,
    ) -> Self {
        Self {
            stream,
            peer,
            ordinal,
            store,
            _permit: permit,
        }
    }

    /// Answer snapshot requests until the peer leaves or shutdown is asked.
    ///
    /// Only the wait for the next token is interruptible; a response that
    /// has started is always sent in full.
    pub async fn run(mut self, mut shutdown: Shutdown) -> std::io::Result<()> {
        tracing::info!(client = self.ordinal, peer = %self.peer, "Client connected");

        while !shutdown.is_shutdown() {
            let mut token = [0u8; REQUEST_LEN];
            let read = tokio::select! {
                res = self.stream.read_exact(&mut token) => res,
                _ = shutdown.recv() => break,
            };

            match read {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            match Request::from_bytes(token) {
                Request::Snapshot => {
                    let payload = self.render_snapshot();
                    self.stream.write_all(&payload).await?;
                    tracing::debug!(client = self.ordinal, bytes = payload.len(), "Snapshot sent");
                }
                Request::Unknown(value) => {
                    tracing::warn!(
                        client = self.ordinal,
                        token = %format!("{:08x}", value),
                        raw = ?token,
                        "Ignoring unknown request"
                    );
                }
            }
        }

        tracing::info!(client = self.ordinal, peer = %self.peer, "Client disconnected");
        Ok(())
    }

    /// Always [`MAX_INSTANCES`] records; slots past a smaller store read empty.
    fn render_snapshot(&self) -> Vec<u8> {
        let mut records = self.store.snapshot();
        records.resize(MAX_INSTANCES, InstanceRecord::default());
        let now = Tick::now();
        encode_snapshot(&records, now, LIVENESS_WINDOW_MS)
    }
}
