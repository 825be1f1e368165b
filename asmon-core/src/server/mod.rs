// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Broadcast server.
//!
//! Accepts TCP clients up to a limit and answers each zero token with a
//! snapshot of the telemetry store. One task per connection; the only state
//! shared between them is the store and the active-connection counter.

mod connection;
mod lifecycle;
mod shutdown;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::error::{AsmError, AsmResult};
use crate::store::TelemetryStore;
use crate::types::MaxClients;

pub use connection::{Connection, ConnectionPermit};
pub use lifecycle::{ServerLifecycle, ServerState};
pub use shutdown::{channel as shutdown_channel, Shutdown, ShutdownTrigger};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Listening snapshot server.
pub struct BroadcastServer {
    listener: TcpListener,
    store: Arc<TelemetryStore>,
    max_clients: MaxClients,
    lifecycle: ServerLifecycle,
    active: Arc<AtomicUsize>,
    next_ordinal: u64,
}

impl BroadcastServer {
    /// Bind and listen. Must be called within a Tokio runtime.
    ///
    /// The socket reuses addresses and its backlog equals the client limit.
    ///
    /// # Errors
    /// Bind and listen failures are fatal to the server.
    pub fn bind(config: &ServerConfig, store: Arc<TelemetryStore>) -> AsmResult<Self> {
        let addr = SocketAddr::new(config.bind, config.port.value());
        Self::bind_addr(addr, config.max_clients, store)
    }

    /// Bind to an explicit address; port 0 picks an ephemeral port.
    pub fn bind_addr(
        addr: SocketAddr,
        max_clients: MaxClients,
        store: Arc<TelemetryStore>,
    ) -> AsmResult<Self> {
        let mut lifecycle = ServerLifecycle::new();

        match Self::listen(addr, max_clients) {
            Ok(listener) => {
                lifecycle.transition_to(ServerState::Listening)?;
                tracing::info!(
                    addr = %addr,
                    max_clients = max_clients.value(),
                    "Waiting for connections"
                );
                Ok(Self {
                    listener,
                    store,
                    max_clients,
                    lifecycle,
                    active: Arc::new(AtomicUsize::new(0)),
                    next_ordinal: 0,
                })
            }
            Err(e) => {
                lifecycle.transition_to(ServerState::Stopped)?;
                Err(e)
            }
        }
    }

    fn listen(addr: SocketAddr, max_clients: MaxClients) -> AsmResult<TcpListener> {
        let io = |context: &'static str| move |source| AsmError::Io { context, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(io("creating server socket"))?;

        socket
            .set_reuseaddr(true)
            .map_err(io("setting SO_REUSEADDR"))?;
        socket.bind(addr).map_err(io("binding server socket"))?;

        let backlog = u32::try_from(max_clients.value()).unwrap_or(u32::MAX);
        socket.listen(backlog).map_err(io("listening on server socket"))
    }

    pub fn local_addr(&self) -> AsmResult<SocketAddr> {
        self.listener.local_addr().map_err(|source| AsmError::Io {
            context: "reading server address",
            source,
        })
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Accept until shutdown, then drain every connection task.
    pub async fn serve(mut self, mut shutdown: Shutdown) -> AsmResult<()> {
        let mut tasks = JoinSet::new();

        loop {
            let accepted = tokio::select! {
                res = self.listener.accept() => res,
                _ = shutdown.recv() => break,
            };

            // Reap finished connection tasks so the set stays small.
            while tasks.try_join_next().is_some() {}

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let Some(permit) = ConnectionPermit::try_acquire(&self.active, self.max_clients.value())
            else {
                tracing::warn!(
                    peer = %peer,
                    max_clients = self.max_clients.value(),
                    "Client limit reached, closing connection"
                );
                drop(stream);
                continue;
            };

            self.next_ordinal += 1;
            let connection = Connection::new(
                stream,
                peer,
                self.next_ordinal,
                Arc::clone(&self.store),
                permit,
            );
            let ordinal = self.next_ordinal;
            let connection_shutdown = shutdown.clone();
            tasks.spawn(async move {
                if let Err(e) = connection.run(connection_shutdown).await {
                    tracing::warn!(client = ordinal, error = %e, "Connection ended with error");
                }
            });
        }

        self.lifecycle.transition_to(ServerState::Draining)?;
        tracing::info!(
            active = self.active.load(Ordering::Acquire),
            "Server draining"
        );

        drop(self.listener);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Connection task panicked");
            }
        }

        self.lifecycle.transition_to(ServerState::Stopped)?;
        tracing::info!(served = self.next_ordinal, "Server exiting");
        Ok(())
    }
}
