//! End-to-end tests over real loopback TCP.
//!
//! Each test runs two or more sessions in one process, wired together the way
//! separate nodes would be.

use std::{net::SocketAddr, time::Duration};

use peerline_session::{ListenerHandle, Session, SessionConfig, SessionError, SessionEvent};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc::UnboundedReceiver,
    time::timeout,
};

type Events = UnboundedReceiver<SessionEvent>;

fn config(name: &str) -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(2),
        ..SessionConfig::new(name)
    }
}

fn node(name: &str) -> (Session, Events) {
    Session::new(config(name)).unwrap()
}

async fn listening_node(name: &str) -> (Session, Events, ListenerHandle) {
    let (session, events) = node(name);
    let handle = session.listen_on("127.0.0.1:0".parse().unwrap()).await.unwrap();
    (session, events, handle)
}

/// Skip events until one matches.
async fn wait_for<F>(events: &mut Events, mut matches: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("session dropped");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_for_peers(events: &mut Events, expected: &[&str]) {
    wait_for(events, |e| matches!(e, SessionEvent::PeersChanged { names } if names == expected))
        .await;
}

async fn wait_for_message(events: &mut Events) -> (String, String) {
    match wait_for(events, |e| matches!(e, SessionEvent::MessageReceived { .. })).await {
        SessionEvent::MessageReceived { sender, text, .. } => (sender, text),
        other => unreachable!("filtered above: {other:?}"),
    }
}

#[tokio::test]
async fn two_nodes_exchange_names_and_messages() {
    let (alice, mut alice_events, listener) = listening_node("alice").await;
    let (bob, mut bob_events) = node("bob");

    bob.connect_to_peer(&listener.local_addr().to_string()).await.unwrap();

    wait_for_peers(&mut alice_events, &["bob"]).await;
    wait_for_peers(&mut bob_events, &["alice"]).await;
    assert_eq!(alice.peer_names(), vec!["bob"]);
    assert_eq!(bob.peer_names(), vec!["alice"]);

    let report = alice.broadcast("hi").await;
    assert_eq!(report.delivered, 1);
    assert_eq!(wait_for_message(&mut bob_events).await, ("alice".into(), "hi".into()));

    bob.send_to("alice", "hello back").await;
    assert_eq!(wait_for_message(&mut alice_events).await, ("bob".into(), "hello back".into()));
}

#[tokio::test]
async fn closing_a_link_disconnects_exactly_once() {
    let (alice, mut alice_events, listener) = listening_node("alice").await;
    let (bob, mut bob_events) = node("bob");

    let link = bob.connect_to_peer(&listener.local_addr().to_string()).await.unwrap();
    wait_for_peers(&mut alice_events, &["bob"]).await;
    wait_for_peers(&mut bob_events, &["alice"]).await;

    // Bob drops its side of the link.
    let bob_side =
        bob.registry().snapshot_all().into_iter().find(|p| p.connection.id() == link).unwrap();
    bob.registry().remove(&bob_side.connection);

    let mut disconnects = 0;
    wait_for(&mut alice_events, |e| {
        if matches!(e, SessionEvent::PeerDisconnected { .. }) {
            disconnects += 1;
        }
        matches!(e, SessionEvent::PeersChanged { names } if names.is_empty())
    })
    .await;
    assert!(alice.peer_names().is_empty());

    // Give stragglers a chance to show up, then count.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(event) = alice_events.try_recv() {
        if matches!(event, SessionEvent::PeerDisconnected { .. }) {
            disconnects += 1;
        }
    }
    assert_eq!(disconnects, 1, "PeerDisconnected must fire exactly once");
}

#[tokio::test]
async fn peer_disconnected_names_the_peer() {
    let (_alice, mut alice_events, listener) = listening_node("alice").await;

    let mut raw = TcpStream::connect(listener.local_addr()).await.unwrap();
    raw.write_all(b"NICKNAME|carol\n").await.unwrap();
    wait_for_peers(&mut alice_events, &["carol"]).await;

    drop(raw);

    let event =
        wait_for(&mut alice_events, |e| matches!(e, SessionEvent::PeerDisconnected { .. })).await;
    assert!(matches!(event, SessionEvent::PeerDisconnected { name, .. } if name == "carol"));
}

#[tokio::test]
async fn messages_before_handshake_use_remote_address() {
    let (_alice, mut alice_events, listener) = listening_node("alice").await;

    let mut raw = TcpStream::connect(listener.local_addr()).await.unwrap();
    let local: SocketAddr = raw.local_addr().unwrap();

    raw.write_all(b"who am i\n").await.unwrap();
    assert_eq!(wait_for_message(&mut alice_events).await, (local.to_string(), "who am i".into()));

    raw.write_all(b"NICKNAME|dave\nnow named\n").await.unwrap();
    assert_eq!(wait_for_message(&mut alice_events).await, ("dave".into(), "now named".into()));
}

#[tokio::test]
async fn listener_sends_handshake_first() {
    let (_alice, _alice_events, listener) = listening_node("alice").await;

    let raw = TcpStream::connect(listener.local_addr()).await.unwrap();
    let mut lines = BufReader::new(raw).lines();

    let first = timeout(Duration::from_secs(2), lines.next_line()).await.unwrap().unwrap();
    assert_eq!(first.as_deref(), Some("NICKNAME|alice"));
}

#[tokio::test]
async fn dialer_sends_handshake_first() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let (bob, _bob_events) = node("bob");

    bob.connect_to_peer(&addr.to_string()).await.unwrap();

    let (stream, _) = server.accept().await.unwrap();
    let mut lines = BufReader::new(stream).lines();
    let first = timeout(Duration::from_secs(2), lines.next_line()).await.unwrap().unwrap();
    assert_eq!(first.as_deref(), Some("NICKNAME|bob"));
}

#[tokio::test]
async fn dial_failure_leaves_node_usable() {
    // Grab a free port, then close it so nothing listens there.
    let addr = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap()
    };

    let (bob, _bob_events) = node("bob");
    let err = bob.connect_to_peer(&addr.to_string()).await.unwrap_err();
    assert!(matches!(err, SessionError::Dial { .. } | SessionError::DialTimeout { .. }));

    assert!(bob.peer_names().is_empty());
    assert_eq!(bob.broadcast("anyone?").await.delivered, 0);
}

#[tokio::test]
async fn duplicate_names_both_receive_unicast() {
    let (alice, mut alice_events, listener) = listening_node("alice").await;
    let (sam1, mut sam1_events) = node("sam");
    let (sam2, mut sam2_events) = node("sam");
    let target = listener.local_addr().to_string();

    sam1.connect_to_peer(&target).await.unwrap();
    wait_for_peers(&mut alice_events, &["sam"]).await;
    sam2.connect_to_peer(&target).await.unwrap();
    wait_for_peers(&mut alice_events, &["sam", "sam"]).await;

    let report = alice.send_to("sam", "both of you").await;
    assert_eq!(report.delivered, 2);
    assert_eq!(wait_for_message(&mut sam1_events).await.1, "both of you");
    assert_eq!(wait_for_message(&mut sam2_events).await.1, "both of you");
}

#[tokio::test]
async fn accept_loop_serves_many_peers() {
    let (alice, mut alice_events, listener) = listening_node("alice").await;
    let target = listener.local_addr().to_string();

    let mut nodes = Vec::new();
    for name in ["p1", "p2", "p3"] {
        let (peer, events) = node(name);
        peer.connect_to_peer(&target).await.unwrap();
        nodes.push((peer, events));
    }

    wait_for(&mut alice_events, |e| {
        matches!(e, SessionEvent::PeersChanged { names } if names.len() == 3)
    })
    .await;

    alice.broadcast("all hands").await;
    for (_, events) in &mut nodes {
        assert_eq!(wait_for_message(events).await, ("alice".into(), "all hands".into()));
    }
}

#[tokio::test]
async fn stopped_listener_refuses_new_links() {
    let (_alice, _alice_events, listener) = listening_node("alice").await;
    let addr = listener.local_addr();

    listener.stop();
    timeout(Duration::from_secs(2), async {
        while !listener.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let (bob, _bob_events) = node("bob");
    assert!(bob.connect_to_peer(&addr.to_string()).await.is_err());
}
