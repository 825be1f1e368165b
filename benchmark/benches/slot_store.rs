// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Slot store benchmarks against a real shared memory segment.

use asmon_benchmark::store_config;
use asmon_core::types::{LIVENESS_WINDOW_MS, MAX_INSTANCES};
use asmon_core::{select_slot, MetricUpdate, SlotPolicy, SlotView, TelemetryStore, Tick};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

/// Slot selection over a store whose only free slot is the last.
fn bench_select_slot(c: &mut Criterion) {
    let now = Tick::from_millis(60_000);
    let mut views = vec![
        SlotView {
            pid: 1,
            last_updated: now,
        };
        MAX_INSTANCES
    ];
    views[MAX_INSTANCES - 1] = SlotView::default();

    c.bench_function("select_slot_free_scan", |b| {
        b.iter(|| select_slot(black_box(&views), SlotPolicy::FreeScan, now, LIVENESS_WINDOW_MS));
    });
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_store");
    group.measurement_time(Duration::from_secs(3));

    let store = match TelemetryStore::open(&store_config("store")) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Skipping slot_store benchmarks: {}", e);
            return;
        }
    };
    for slot in 0..MAX_INSTANCES {
        let _ = store.update(
            slot,
            &MetricUpdate::Register {
                pid: 1000 + slot as u16,
                profile: asmon_core::ShortString::new("bench"),
                at: Tick::now(),
            },
        );
    }

    group.bench_function("fps_update", |b| {
        b.iter(|| {
            store
                .update(
                    black_box(3),
                    &MetricUpdate::Fps {
                        fps: 47,
                        fps_min: 30,
                        at: Tick::now(),
                    },
                )
                .ok()
        });
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(store.snapshot()));
    });

    group.finish();
    store.close();
}

criterion_group!(benches, bench_select_slot, bench_store);
criterion_main!(benches);
