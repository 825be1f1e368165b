// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Output sinks for polled snapshots.

use std::io::Write;

use serde::Serialize;

use crate::record::InstanceRecord;

/// One selected slot of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    pub slot: usize,
    #[serde(flatten)]
    pub record: InstanceRecord,
}

/// Records selected from one response, stamped with wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolledSnapshot {
    pub unix_time: u64,
    pub entries: Vec<SlotEntry>,
}

/// Destination for polled snapshots.
pub trait SnapshotSink {
    fn write_snapshot(&mut self, snapshot: &PolledSnapshot) -> std::io::Result<()>;
}

/// Human-readable table, memory shown in MiB.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SnapshotSink for ConsoleSink<W> {
    fn write_snapshot(&mut self, snapshot: &PolledSnapshot) -> std::io::Result<()> {
        let out = &mut self.out;
        writeln!(out, "╔══════╦════════╦═══════════╦═══════╦═══════════════╦═══════════════════╦════════╦═══════════════════════╦════════════╦════════════╦══════════════════╦══════════════════╗")?;
        writeln!(out, "║ Slot ║ PID    ║ FPS (min) ║ CPS   ║ Players       ║ Objects           ║ Mem MB ║ Net in/out            ║ Disk read  ║ Tick       ║ Mission          ║ Profile          ║")?;
        writeln!(out, "║      ║        ║           ║       ║ / AI loc, rem ║                   ║        ║                       ║            ║            ║                  ║                  ║")?;
        writeln!(out, "╠══════╬════════╬═══════════╬═══════╬═══════════════╬═══════════════════╬════════╬═══════════════════════╬════════════╬════════════╬══════════════════╬══════════════════╣")?;

        for entry in &snapshot.entries {
            let r = &entry.record;
            if r.is_empty() {
                writeln!(
                    out,
                    "║ {:>4} ║ {:<6} ║ {:<9} ║ {:<5} ║ {:<13} ║ {:<17} ║ {:<6} ║ {:<21} ║ {:<10} ║ {:<10} ║ {:<16} ║ {:<16} ║",
                    entry.slot, "-", "", "", "", "", "", "", "", "", "", ""
                )?;
                continue;
            }

            writeln!(
                out,
                "║ {:>4} ║ {:<6} ║ {:<9} ║ {:<5} ║ {:<13} ║ {:<17} ║ {:<6} ║ {:<21} ║ {:<10} ║ {:<10} ║ {:<16.16} ║ {:<16.16} ║",
                entry.slot,
                r.pid,
                format!("{} ({})", r.fps, r.fps_min),
                r.condition_frequency,
                format!("{}/{},{}", r.players, r.ai_local, r.ai_remote),
                format!(
                    "{}/{}/{}",
                    r.object_counts[0], r.object_counts[1], r.object_counts[2]
                ),
                r.memory_mib(),
                format!("{}/{}", r.net_recv, r.net_send),
                r.disk_read,
                r.last_updated.millis(),
                r.mission.to_string_lossy(),
                r.profile.to_string_lossy(),
            )?;
        }

        writeln!(out, "╚══════╩════════╩═══════════╩═══════╩═══════════════╩═══════════════════╩════════╩═══════════════════════╩════════════╩════════════╩══════════════════╩══════════════════╝")?;
        let live = snapshot.entries.iter().filter(|e| !e.record.is_empty()).count();
        writeln!(out, "Live: {} of {} slot(s)", live, snapshot.entries.len())?;
        out.flush()
    }
}

/// Pipe-separated log lines, one per selected slot:
/// `slot|unix_time|fps|cps|players|ai_local|ai_remote|obj0|obj1|obj2`
pub struct PipeLogSink<W: Write> {
    out: W,
}

impl<W: Write> PipeLogSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SnapshotSink for PipeLogSink<W> {
    fn write_snapshot(&mut self, snapshot: &PolledSnapshot) -> std::io::Result<()> {
        for entry in &snapshot.entries {
            let r = &entry.record;
            writeln!(
                self.out,
                "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                entry.slot,
                snapshot.unix_time,
                r.fps,
                r.condition_frequency,
                r.players,
                r.ai_local,
                r.ai_remote,
                r.object_counts[0],
                r.object_counts[1],
                r.object_counts[2],
            )?;
        }
        self.out.flush()
    }
}

/// One JSON document per poll, newline delimited.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SnapshotSink for JsonSink<W> {
    fn write_snapshot(&mut self, snapshot: &PolledSnapshot) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, snapshot)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Fan one snapshot out to several sinks.
impl SnapshotSink for Vec<Box<dyn SnapshotSink + Send>> {
    fn write_snapshot(&mut self, snapshot: &PolledSnapshot) -> std::io::Result<()> {
        for sink in self.iter_mut() {
            sink.write_snapshot(snapshot)?;
        }
        Ok(())
    }
}
