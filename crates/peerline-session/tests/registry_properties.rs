//! Property-based tests for PeerRegistry
//!
//! Random add/remove sequences are replayed against the registry and a plain
//! model; the registry must agree with the model after every step.

use std::{
    collections::{BTreeMap, BTreeSet},
    net::SocketAddr,
};

use peerline_session::{Connection, ConnectionId, EventSink, PeerRegistry, SessionEvent};
use proptest::prelude::*;

const CONNECTIONS: usize = 6;
const NAMES: [&str; 3] = ["alice", "bob", "alice2"];

#[derive(Debug, Clone)]
enum Op {
    Add { conn: usize, name: usize },
    Remove { conn: usize },
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..CONNECTIONS, 0..NAMES.len()).prop_map(|(conn, name)| Op::Add { conn, name }),
        1 => (0..CONNECTIONS).prop_map(|conn| Op::Remove { conn }),
    ]
}

fn connections() -> Vec<Connection> {
    (0..CONNECTIONS as u64)
        .map(|i| {
            let addr: SocketAddr = format!("10.0.0.{}:7000", i + 1).parse().unwrap();
            Connection::new(ConnectionId::new(i), addr, tokio::io::sink())
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the registry matches a map keyed by connection, where a
    /// removed connection is closed for good
    #[test]
    fn prop_registry_matches_model(ops in prop::collection::vec(arbitrary_op(), 1..40)) {
        let registry = PeerRegistry::new(EventSink::discard());
        let conns = connections();
        let mut model: BTreeMap<ConnectionId, &str> = BTreeMap::new();
        let mut closed: BTreeSet<ConnectionId> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add { conn, name } => {
                    let id = conns[conn].id();
                    let inserted = registry.add(&conns[conn], NAMES[name]);
                    prop_assert_eq!(inserted, !closed.contains(&id));
                    if inserted {
                        model.insert(id, NAMES[name]);
                    }
                },
                Op::Remove { conn } => {
                    let id = conns[conn].id();
                    let removed = registry.remove(&conns[conn]);
                    prop_assert_eq!(removed.is_some(), model.remove(&id).is_some());
                    prop_assert!(conns[conn].is_closed());
                    closed.insert(id);
                },
            }

            prop_assert_eq!(registry.len(), model.len());
            let expected: Vec<&str> = model.values().copied().collect();
            prop_assert_eq!(registry.names(), expected);
        }
    }

    /// Property: every connection sharing a name is found by that name
    #[test]
    fn prop_snapshot_by_name_finds_all_holders(
        names in prop::collection::vec(0..NAMES.len(), CONNECTIONS),
    ) {
        let registry = PeerRegistry::new(EventSink::discard());
        let conns = connections();

        for (conn, name) in conns.iter().zip(&names) {
            registry.add(conn, NAMES[*name]);
        }

        for (index, name) in NAMES.iter().enumerate() {
            let found: Vec<ConnectionId> =
                registry.snapshot_by_name(name).iter().map(Connection::id).collect();
            let expected: Vec<ConnectionId> = conns
                .iter()
                .zip(&names)
                .filter(|(_, n)| **n == index)
                .map(|(c, _)| c.id())
                .collect();
            prop_assert_eq!(found, expected);
        }
    }

    /// Property: removal notifies exactly once per registered connection
    #[test]
    fn prop_disconnect_fires_once(removals in prop::collection::vec(0..CONNECTIONS, 1..20)) {
        let (events, mut rx) = EventSink::channel();
        let registry = PeerRegistry::new(events);
        let conns = connections();

        for conn in &conns {
            registry.add(conn, "peer");
        }
        for conn in &removals {
            registry.remove(&conns[*conn]);
        }

        let mut disconnected = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::PeerDisconnected { connection, .. } = event {
                disconnected.push(connection);
            }
        }

        let distinct: BTreeSet<usize> = removals.iter().copied().collect();
        prop_assert_eq!(disconnected.len(), distinct.len());
        let unique: BTreeSet<ConnectionId> = disconnected.iter().copied().collect();
        prop_assert_eq!(unique.len(), disconnected.len());
    }
}
