// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for asmon.
//!
//! These tests run the broadcast server on an ephemeral port against a
//! private shared memory store and talk to it over real TCP sockets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asmon_core::client::{self, ConsoleSink, PipeLogSink, PollMode};
use asmon_core::server::shutdown_channel;
use asmon_core::types::MAX_INSTANCES;
use asmon_core::wire::{FULL_RECORD_LEN, SHORT_RECORD_LEN};
use asmon_core::{
    BroadcastServer, Client, ConfigLoader, InstanceSelection, MaxClients, MetricUpdate,
    ObjectCategory, Port, Producer, ProducerConfig, ShortString, ShutdownTrigger, SlotCapacity,
    StoreConfig, TelemetryStore, Tick,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(5);

fn open_store(tag: &str, capacity: usize) -> Arc<TelemetryStore> {
    let config = StoreConfig {
        name: format!("asmon-it-{}-{}", tag, std::process::id()),
        capacity: SlotCapacity::new(capacity).unwrap(),
    };
    Arc::new(TelemetryStore::open(&config).unwrap())
}

struct RunningServer {
    addr: SocketAddr,
    trigger: ShutdownTrigger,
    handle: JoinHandle<asmon_core::AsmResult<()>>,
}

impl RunningServer {
    async fn stop(self) {
        self.trigger.trigger();
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .expect("server did not drain")
            .unwrap()
            .unwrap();
    }
}

fn start_server(store: Arc<TelemetryStore>, max_clients: usize) -> RunningServer {
    let server = BroadcastServer::bind_addr(
        "127.0.0.1:0".parse().unwrap(),
        MaxClients::new(max_clients).unwrap(),
        store,
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    let (trigger, shutdown) = shutdown_channel();
    let handle = tokio::spawn(server.serve(shutdown));
    RunningServer {
        addr,
        trigger,
        handle,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    Client::connect("127.0.0.1", Port::new(addr.port()).unwrap())
        .await
        .unwrap()
}

fn populate_scenario_slot(store: &TelemetryStore) {
    let now = Tick::now();
    store
        .update(
            0,
            &MetricUpdate::Register {
                pid: 4242,
                profile: ShortString::new("server"),
                at: now,
            },
        )
        .unwrap();
    store
        .update(
            0,
            &MetricUpdate::Fps {
                fps: 50,
                fps_min: 25,
                at: now,
            },
        )
        .unwrap();
    for (category, count) in [
        (ObjectCategory::Zero, 4),
        (ObjectCategory::One, 5),
        (ObjectCategory::Two, 6),
    ] {
        store
            .update(0, &MetricUpdate::ObjectCount { category, count })
            .unwrap();
    }
    store
        .update(
            0,
            &MetricUpdate::Population {
                players: 8,
                ai_local: 100,
                ai_remote: 50,
                memory_bytes: 256 * 1024 * 1024,
            },
        )
        .unwrap();
    store
        .update(0, &MetricUpdate::Mission(ShortString::new("asmtest")))
        .unwrap();
}

/// Slot 0 populated, slots 1..15 empty: one full record and fifteen short ones.
#[tokio::test]
async fn test_e2e_snapshot_scenario() {
    let store = open_store("scenario", 16);
    populate_scenario_slot(&store);
    let server = start_server(store, 1);

    let mut client = connect(server.addr).await;
    let records = tokio::time::timeout(TIMEOUT, client.request_snapshot())
        .await
        .unwrap()
        .unwrap()
        .expect("server closed early");

    assert_eq!(records.len(), 16);
    let slot = &records[0];
    assert_eq!(slot.pid, 4242);
    assert_eq!(slot.fps, 50);
    assert_eq!(slot.fps_min, 25);
    assert_eq!(slot.object_counts, [4, 5, 6]);
    assert_eq!(slot.players, 8);
    assert_eq!(slot.ai_local, 100);
    assert_eq!(slot.ai_remote, 50);
    assert_eq!(slot.memory_mib(), 256);
    assert_eq!(slot.mission.to_string_lossy(), "asmtest");
    assert_eq!(slot.profile.to_string_lossy(), "server");
    assert!(records[1..].iter().all(|r| r.is_empty()));

    // A second request on the same connection works too.
    let again = client.request_snapshot().await.unwrap().unwrap();
    assert_eq!(again[0].pid, 4242);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_e2e_raw_response_length() {
    let store = open_store("rawlen", 16);
    populate_scenario_slot(&store);
    let server = start_server(store, 1);

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&[0, 0, 0, 0]).await.unwrap();

    let expected = FULL_RECORD_LEN + 15 * SHORT_RECORD_LEN;
    let mut buf = vec![0u8; expected];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..2], &4242u16.to_ne_bytes());
    assert!(buf[FULL_RECORD_LEN..].iter().all(|b| *b == 0));

    // Nothing more follows the snapshot.
    let mut extra = [0u8; 1];
    assert!(
        tokio::time::timeout(Duration::from_millis(200), stream.read(&mut extra))
            .await
            .is_err()
    );

    drop(stream);
    server.stop().await;
}

#[tokio::test]
async fn test_e2e_stale_slot_sent_short() {
    let store = open_store("stale", 4);
    let long_ago = Tick::from_millis(Tick::now().millis().wrapping_sub(60_000));
    store
        .update(
            2,
            &MetricUpdate::Register {
                pid: 99,
                profile: ShortString::new("gone"),
                at: long_ago,
            },
        )
        .unwrap();
    let server = start_server(store, 1);

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&[0, 0, 0, 0]).await.unwrap();
    // Four real slots plus twelve padding slots, all short.
    let mut buf = vec![0u8; MAX_INSTANCES * SHORT_RECORD_LEN];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf, vec![0u8; MAX_INSTANCES * SHORT_RECORD_LEN]);

    drop(stream);
    server.stop().await;
}

/// With max_clients = 1 the second connection is accepted and closed at once.
#[tokio::test]
async fn test_e2e_client_limit() {
    let store = open_store("limit", 16);
    let server = start_server(store, 1);

    let mut first = connect(server.addr).await;
    assert!(first.request_snapshot().await.unwrap().is_some());

    // The over-limit client sends nothing and gets nothing back.
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(TIMEOUT, second.read(&mut buf))
        .await
        .expect("over-limit connection was not closed");
    match read {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }

    // The first client is unaffected.
    assert!(first.request_snapshot().await.unwrap().is_some());

    // Once it leaves, a new client gets in.
    drop(first);
    let mut admitted = false;
    for _ in 0..50 {
        let mut third = connect(server.addr).await;
        if let Ok(Some(_)) = third.request_snapshot().await {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted);

    drop(second);
    server.stop().await;
}

/// A store smaller than the wire's slot count still yields a whole snapshot.
#[tokio::test]
async fn test_small_store_pads_snapshot() {
    let store = open_store("small", 4);
    populate_scenario_slot(&store);
    let server = start_server(store, 1);

    let mut client = connect(server.addr).await;
    let records = tokio::time::timeout(TIMEOUT, client.request_snapshot())
        .await
        .expect("client stalled on a short snapshot")
        .unwrap()
        .unwrap();
    assert_eq!(records.len(), MAX_INSTANCES);
    assert_eq!(records[0].pid, 4242);
    assert!(records[4..].iter().all(|r| r.is_empty()));

    drop(client);
    server.stop().await;
}

/// An unknown token gets no reply and leaves the connection open.
#[tokio::test]
async fn test_e2e_unknown_token_ignored() {
    let store = open_store("unknown", 16);
    let server = start_server(store, 1);

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&0xdeadbeefu32.to_ne_bytes()).await.unwrap();

    let mut buf = [0u8; 64];
    let silent = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut buf)).await;
    assert!(silent.is_err(), "server replied to an unknown token");

    stream.write_all(&[0, 0, 0, 0]).await.unwrap();
    let mut snapshot = vec![0u8; 16 * SHORT_RECORD_LEN];
    tokio::time::timeout(TIMEOUT, stream.read_exact(&mut snapshot))
        .await
        .unwrap()
        .unwrap();
    assert!(snapshot.iter().all(|b| *b == 0));

    drop(stream);
    server.stop().await;
}

/// Writers hammer their own slots while readers poll; nothing fails and
/// every response decodes to the full slot count.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_and_readers() {
    let store = open_store("concurrent", 16);
    let server = start_server(Arc::clone(&store), 4);
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|slot| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut round: u16 = 0;
                while !stop.load(Ordering::Relaxed) {
                    round = round.wrapping_add(1);
                    store
                        .update(
                            slot,
                            &MetricUpdate::Register {
                                pid: 100 + slot as u16,
                                profile: ShortString::new("writer"),
                                at: Tick::now(),
                            },
                        )
                        .unwrap();
                    store
                        .update(
                            slot,
                            &MetricUpdate::Fps {
                                fps: round,
                                fps_min: round / 2,
                                at: Tick::now(),
                            },
                        )
                        .unwrap();
                    store
                        .update(slot, &MetricUpdate::Mission(ShortString::new(&round.to_string())))
                        .unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let addr = server.addr;
            tokio::spawn(async move {
                let mut client = connect(addr).await;
                for _ in 0..50 {
                    let records = client.request_snapshot().await.unwrap().unwrap();
                    assert_eq!(records.len(), 16);
                    assert!(records[4..].iter().all(|r| r.is_empty()));
                }
            })
        })
        .collect();

    for reader in readers {
        tokio::time::timeout(Duration::from_secs(30), reader)
            .await
            .unwrap()
            .unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }
    server.stop().await;
}

/// Shutdown ends idle connections and the accept loop.
#[tokio::test]
async fn test_shutdown_drains_idle_clients() {
    let store = open_store("drain", 4);
    let server = start_server(store, 2);

    let mut idle = TcpStream::connect(server.addr).await.unwrap();
    idle.write_all(&[0, 0, 0, 0]).await.unwrap();
    let mut buf = vec![0u8; 4 * SHORT_RECORD_LEN];
    idle.read_exact(&mut buf).await.unwrap();

    server.stop().await;

    let mut rest = [0u8; 8];
    let n = tokio::time::timeout(TIMEOUT, idle.read(&mut rest))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);
}

/// Producer text calls through to a polling client with the pipe log sink.
#[tokio::test]
async fn test_producer_to_client_pipe_log() {
    let store = open_store("pipeline", 16);
    let server = start_server(Arc::clone(&store), 1);

    let mut producer = Producer::with_pid(Arc::clone(&store), ProducerConfig::default(), 777);
    assert!(producer.call("9:5server").starts_with("_ASM_OPT=[30,60,0,"));
    producer.call("0:48:20");
    producer.call("2:12:30:4");
    producer.call("4:1000");
    producer.call("5:40");
    producer.call("6:1200");
    assert_eq!(producer.slot(), Some(5));

    let mut client = connect(server.addr).await;
    let (_trigger, shutdown) = shutdown_channel();
    let mut sink = PipeLogSink::new(Vec::new());
    let polls = client::run(
        &mut client,
        InstanceSelection::window(1).unwrap(),
        PollMode::Once,
        &mut sink,
        shutdown,
    )
    .await
    .unwrap();
    assert_eq!(polls, 1);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    let fields: Vec<&str> = lines[1].split('|').collect();
    assert_eq!(fields[0], "5");
    assert_eq!(&fields[2..], &["48", "0", "12", "30", "4", "1000", "40", "1200"]);

    drop(producer);
    let records = client.request_snapshot().await.unwrap().unwrap();
    assert!(records[5].is_empty());

    drop(client);
    server.stop().await;
}

/// Watch mode keeps polling until shutdown.
#[tokio::test]
async fn test_watch_mode_stops_on_shutdown() {
    let store = open_store("watch", 4);
    let server = start_server(store, 1);

    let mut client = connect(server.addr).await;
    let (trigger, shutdown) = shutdown_channel();
    let poller = tokio::spawn(async move {
        let mut sink = ConsoleSink::new(std::io::sink());
        client::run(
            &mut client,
            InstanceSelection::All,
            PollMode::Every(Duration::from_millis(20)),
            &mut sink,
            shutdown,
        )
        .await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    trigger.trigger();
    let polls = tokio::time::timeout(TIMEOUT, poller)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(polls >= 2);

    server.stop().await;
}

#[tokio::test]
async fn test_connect_refused() {
    // Grab a free port, then close it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let result = Client::connect("127.0.0.1", Port::new(port).unwrap()).await;
    assert!(matches!(result, Err(asmon_core::AsmError::Connect { .. })));
}

#[test]
fn test_config_loading_and_validation() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("asmon.yaml");
    std::fs::write(
        &path,
        r#"
server:
  port: 24500
  max_clients: 3
client:
  instance_set: 1
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.server.port.value(), 24500);
    assert_eq!(config.server.max_clients.value(), 3);
    assert_eq!(config.client.selection, InstanceSelection::Window(1));
    assert_eq!(config.store.capacity.value(), 16);
}
