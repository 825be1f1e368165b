// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Polling client.
//!
//! Sends the zero token, reads until a whole snapshot has been decoded, and
//! hands the selected slots to a sink.

mod sink;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{AsmError, AsmResult, WireError};
use crate::record::InstanceRecord;
use crate::server::Shutdown;
use crate::types::{InstanceSelection, Port, MAX_INSTANCES};
use crate::wire::{decode_snapshot, max_response_len, Request};

pub use sink::{ConsoleSink, JsonSink, PipeLogSink, PolledSnapshot, SlotEntry, SnapshotSink};

const READ_CHUNK: usize = 4096;

/// Connected snapshot client.
pub struct Client {
    stream: TcpStream,
    target: String,
    buf: Vec<u8>,
}

impl Client {
    /// Resolve and connect.
    pub async fn connect(host: &str, port: Port) -> AsmResult<Self> {
        let target = format!("{}:{}", host, port);
        tracing::info!(addr = %target, "Connecting");

        let stream = TcpStream::connect((host, port.value()))
            .await
            .map_err(|e| AsmError::Connect {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            addr = %target,
            peer = ?stream.peer_addr().ok(),
            "Connected"
        );

        Ok(Self {
            stream,
            target,
            buf: Vec::with_capacity(max_response_len(MAX_INSTANCES)),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send one raw token without waiting for a reply.
    pub async fn send_token(&mut self, request: Request) -> AsmResult<()> {
        self.stream
            .write_all(&request.to_bytes())
            .await
            .map_err(|source| AsmError::Io {
                context: "sending request",
                source,
            })
    }

    /// Request and decode one snapshot.
    ///
    /// Returns `None` when the server closed the connection before replying.
    pub async fn request_snapshot(&mut self) -> AsmResult<Option<Vec<InstanceRecord>>> {
        self.send_token(Request::Snapshot).await?;
        self.buf.clear();
        let mut pending: Option<WireError> = None;

        loop {
            let mut chunk = [0u8; READ_CHUNK];
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|source| AsmError::Io {
                    context: "receiving snapshot",
                    source,
                })?;

            if n == 0 {
                return match pending {
                    Some(e) => Err(e.into()),
                    None => {
                        tracing::info!(addr = %self.target, "Server closed the connection");
                        Ok(None)
                    }
                };
            }
            self.buf.extend_from_slice(&chunk[..n]);

            match decode_snapshot(&self.buf, MAX_INSTANCES) {
                Ok(records) => return Ok(Some(records)),
                Err(e @ WireError::Incomplete { .. }) => pending = Some(e),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Pick the selected slots out of a full snapshot.
pub fn select(records: &[InstanceRecord], selection: InstanceSelection) -> Vec<SlotEntry> {
    selection
        .slots(records.len())
        .map(|slot| SlotEntry {
            slot,
            record: records[slot],
        })
        .collect()
}

/// How often to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Once,
    Every(Duration),
}

/// Poll and write to `sink` until done, the server leaves, or shutdown.
///
/// Returns the number of snapshots written.
pub async fn run<S: SnapshotSink + ?Sized>(
    client: &mut Client,
    selection: InstanceSelection,
    mode: PollMode,
    sink: &mut S,
    mut shutdown: Shutdown,
) -> AsmResult<usize> {
    let mut polls = 0;

    loop {
        let Some(records) = client.request_snapshot().await? else {
            break;
        };

        let snapshot = PolledSnapshot {
            unix_time: unix_now(),
            entries: select(&records, selection),
        };
        tracing::debug!(
            selection = %selection,
            count = snapshot.entries.len(),
            "Displaying stats"
        );
        sink.write_snapshot(&snapshot).map_err(|source| AsmError::Io {
            context: "writing snapshot",
            source,
        })?;
        polls += 1;

        let PollMode::Every(interval) = mode else {
            break;
        };
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => break,
        }
    }

    Ok(polls)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
