//! Peer registry: which open connection presents which display name.
//!
//! The registry is the only state shared between tasks. Every operation takes
//! the lock for the map operation alone and never across a network call;
//! fan-out works on snapshots taken here.
//!
//! Display names are not unique. Two connections may announce the same name
//! and both stay registered.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{Connection, ConnectionId, EventSink, SessionEvent};

/// A registered peer.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Link to the peer
    pub connection: Connection,
    /// Latest name announced on that link
    pub name: String,
}

/// Concurrency-safe mapping from connection to display name.
///
/// # Invariants
///
/// - A connection appears at most once; adding it again overwrites its name.
/// - A closed connection is never (re-)inserted.
/// - [`PeerRegistry::remove`] closes the connection while holding the lock,
///   so a concurrent [`PeerRegistry::add`] cannot resurrect it.
/// - Change notifications are emitted under the lock and therefore observe
///   mutations in the order they happened.
#[derive(Debug)]
pub struct PeerRegistry {
    /// Keyed by id, so iteration runs oldest connection first
    peers: Mutex<BTreeMap<ConnectionId, Peer>>,
    events: EventSink,
}

impl PeerRegistry {
    /// Create an empty registry reporting changes to `events`.
    pub fn new(events: EventSink) -> Self {
        Self { peers: Mutex::new(BTreeMap::new()), events }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, Peer>> {
        // Map operations cannot leave the map half-updated, so a poisoned
        // lock still guards a consistent map.
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `connection` under `name`, replacing any earlier name.
    ///
    /// Emits [`SessionEvent::PeerConnected`] and then
    /// [`SessionEvent::PeersChanged`]. Returns `false` if the connection is
    /// already closed and was not inserted.
    pub fn add(&self, connection: &Connection, name: impl Into<String>) -> bool {
        let mut peers = self.lock();
        if connection.is_closed() {
            return false;
        }

        let name = name.into();
        let peer = Peer { connection: connection.clone(), name: name.clone() };
        peers.insert(connection.id(), peer);
        self.events.emit(SessionEvent::PeerConnected { connection: connection.id(), name });
        self.events.emit(SessionEvent::PeersChanged { names: names_of(&peers) });
        true
    }

    /// Unregister `connection` and close it.
    ///
    /// Safe to call any number of times. Only the call that finds the entry
    /// returns it and emits [`SessionEvent::PeerDisconnected`].
    pub fn remove(&self, connection: &Connection) -> Option<Peer> {
        let mut peers = self.lock();
        connection.close();

        let removed = peers.remove(&connection.id())?;
        self.events.emit(SessionEvent::PeerDisconnected {
            connection: connection.id(),
            name: removed.name.clone(),
        });
        self.events.emit(SessionEvent::PeersChanged { names: names_of(&peers) });
        Some(removed)
    }

    /// Point-in-time copy of every registered peer.
    pub fn snapshot_all(&self) -> Vec<Peer> {
        self.lock().values().cloned().collect()
    }

    /// Connections currently presenting `name`. May be empty or several.
    pub fn snapshot_by_name(&self, name: &str) -> Vec<Connection> {
        self.lock()
            .values()
            .filter(|peer| peer.name == name)
            .map(|peer| peer.connection.clone())
            .collect()
    }

    /// Current display names, oldest connection first.
    pub fn names(&self) -> Vec<String> {
        names_of(&self.lock())
    }

    /// Name registered for a connection. `None` if not registered.
    pub fn name_of(&self, id: ConnectionId) -> Option<String> {
        self.lock().get(&id).map(|peer| peer.name.clone())
    }

    /// Check if a connection is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn names_of(peers: &BTreeMap<ConnectionId, Peer>) -> Vec<String> {
    peers.values().map(|peer| peer.name.clone()).collect()
}
