//! Broadcast and unicast fan-out.
//!
//! Outgoing text is written to a snapshot of the registry taken up front, so
//! the registry lock is never held across a network write. Targets are
//! written concurrently and each write has its own deadline: a stalled peer
//! costs at most one `write_timeout` and never delays delivery to the others.
//! A target whose write fails is closed and removed from the registry.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use peerline_proto::{Line, contains_line_break};

use crate::{Connection, PeerRegistry};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Targets that accepted the line
    pub delivered: usize,
    /// Targets whose write failed and which were removed
    pub pruned: usize,
}

impl FanOut {
    /// Number of targets the line was addressed to.
    pub fn targets(&self) -> usize {
        self.delivered + self.pruned
    }
}

/// Writes outgoing chat lines to registered peers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<PeerRegistry>,
    write_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub fn new(registry: Arc<PeerRegistry>, write_timeout: Duration) -> Self {
        Self { registry, write_timeout }
    }

    /// Send `text` to every registered peer.
    pub async fn broadcast(&self, text: &str) -> FanOut {
        let targets =
            self.registry.snapshot_all().into_iter().map(|peer| peer.connection).collect();
        self.fan_out(targets, text).await
    }

    /// Send `text` to every peer currently presenting `name`.
    pub async fn send_to(&self, name: &str, text: &str) -> FanOut {
        let targets = self.registry.snapshot_by_name(name);
        if targets.is_empty() {
            tracing::debug!("No peer named {:?}; nothing sent", name);
        }
        self.fan_out(targets, text).await
    }

    async fn fan_out(&self, targets: Vec<Connection>, text: &str) -> FanOut {
        if contains_line_break(text) {
            tracing::warn!("Outgoing text contains a line break; peers will receive several lines");
        }

        let line = Line::chat(text);
        let line = &line;
        let timeout = self.write_timeout;

        let writes = targets.iter().map(|connection| async move {
            let result = connection.send(line, timeout).await;
            (connection, result)
        });

        let mut report = FanOut::default();
        for (connection, result) in join_all(writes).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(connection = %connection.id(), "Dropping peer: {}", e);
                    self.registry.remove(connection);
                    report.pruned += 1;
                },
            }
        }

        report
    }
}
