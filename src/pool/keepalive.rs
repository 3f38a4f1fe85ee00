//! Connection keep-alive probing.
//!
//! # Responsibilities
//! - Send a heartbeat when the connection reports a read-idle timeout
//! - Count consecutive unanswered heartbeats
//! - Close the connection once the miss threshold is reached
//!
//! # Design Decisions
//! - The probe task lives exactly as long as its connection: it stops on any
//!   terminal connection event, on client teardown, or after closing an
//!   unhealthy connection
//! - The probe holds its stream client weakly; a dropped client ends the task
//! - At most one heartbeat is in flight; idle triggers during a probe coalesce

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::config::KeepAliveConfig;
use crate::net::{ConnectionEvent, ConnectionEventListener, ConnectionId};
use crate::stream::{StreamClient, SubProtocol};

/// Periodic liveness prober bound to one connection.
pub struct KeepAliveProbe {
    client: Weak<dyn StreamClient>,
    sub_protocol: SubProtocol,
    config: KeepAliveConfig,
    connection_id: ConnectionId,
    trigger: Notify,
    misses: AtomicU32,
    sent: AtomicU64,
    stop_tx: watch::Sender<bool>,
}

impl KeepAliveProbe {
    pub fn new(
        client: Weak<dyn StreamClient>,
        sub_protocol: SubProtocol,
        config: KeepAliveConfig,
        connection_id: ConnectionId,
    ) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            client,
            sub_protocol,
            config,
            connection_id,
            trigger: Notify::new(),
            misses: AtomicU32::new(0),
            sent: AtomicU64::new(0),
            stop_tx,
        })
    }

    /// Spawn the probe loop. Must be called within a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }

    /// Request one heartbeat.
    pub fn send_keep_alive(&self) {
        self.trigger.notify_one();
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Current run of unanswered heartbeats.
    pub fn misses(&self) -> u32 {
        self.misses.load(Ordering::Acquire)
    }

    /// Heartbeats sent so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &KeepAliveConfig {
        &self.config
    }

    async fn run(self: Arc<Self>) {
        let mut stop = self.stop_tx.subscribe();
        if *stop.borrow_and_update() {
            return;
        }

        tracing::debug!(
            connection_id = %self.connection_id,
            interval_ms = self.config.interval_ms,
            max_retries = self.config.max_retries,
            "Keep-alive probe started"
        );

        loop {
            tokio::select! {
                _ = self.trigger.notified() => {
                    let healthy = tokio::select! {
                        healthy = self.probe_once() => healthy,
                        _ = stop.changed() => break,
                    };
                    if !healthy {
                        break;
                    }
                }
                _ = stop.changed() => break,
            }
        }

        tracing::debug!(connection_id = %self.connection_id, "Keep-alive probe stopped");
    }

    /// Send one heartbeat and wait up to the interval for its ack.
    /// Returns false once the probe should exit.
    async fn probe_once(&self) -> bool {
        let heartbeat = match self.client.upgrade() {
            Some(client) => client.send_heartbeat(self.sub_protocol),
            None => return false,
        };
        self.sent.fetch_add(1, Ordering::AcqRel);

        let failure = match tokio::time::timeout(self.config.interval(), heartbeat).await {
            Ok(Ok(())) => {
                self.misses.store(0, Ordering::Release);
                return true;
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => "no ack within interval".to_string(),
        };

        let misses = self.misses.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::warn!(
            connection_id = %self.connection_id,
            misses,
            max_retries = self.config.max_retries,
            reason = %failure,
            "Keep-alive heartbeat missed"
        );

        if misses < self.config.max_retries {
            return true;
        }

        tracing::warn!(
            connection_id = %self.connection_id,
            "Keep-alive threshold reached, closing connection"
        );
        self.stop();
        if let Some(client) = self.client.upgrade() {
            client.close();
        }
        false
    }
}

impl std::fmt::Debug for KeepAliveProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveProbe")
            .field("connection_id", &self.connection_id)
            .field("sub_protocol", &self.sub_protocol)
            .field("config", &self.config)
            .field("misses", &self.misses())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Connection listener driving a [`KeepAliveProbe`].
#[derive(Debug)]
pub struct KeepAliveListener {
    probe: Arc<KeepAliveProbe>,
}

impl KeepAliveListener {
    pub fn new(probe: Arc<KeepAliveProbe>) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &Arc<KeepAliveProbe> {
        &self.probe
    }
}

impl ConnectionEventListener for KeepAliveListener {
    fn on_event(&self, event: ConnectionEvent) {
        if event == ConnectionEvent::ReadTimeout {
            self.probe.send_keep_alive();
        } else if event.is_terminal() {
            self.probe.stop();
        }
    }
}
