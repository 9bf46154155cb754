//! Events delivered to the presentation layer.
//!
//! The session never renders anything itself. Every observable change is
//! pushed as a [`SessionEvent`] through an [`EventSink`]; the receiving side
//! decides how to show it.

use tokio::sync::mpsc;

use crate::ConnectionId;

/// Notifications produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A chat line arrived.
    MessageReceived {
        /// Connection the line arrived on
        connection: ConnectionId,
        /// Latest handshake name on that connection, or its remote address
        sender: String,
        /// Line text without terminator
        text: String,
    },

    /// A handshake line arrived and the peer was registered.
    PeerConnected {
        /// Connection the handshake arrived on
        connection: ConnectionId,
        /// Announced display name
        name: String,
    },

    /// A registered peer was removed. Fires once per registered connection.
    PeerDisconnected {
        /// Connection that went away
        connection: ConnectionId,
        /// Name it was registered under
        name: String,
    },

    /// The set of registered peers changed.
    PeersChanged {
        /// Current display names, oldest connection first
        names: Vec<String>,
    },

    /// A single accept call failed; the listener keeps running.
    AcceptFailed {
        /// Error description
        reason: String,
    },
}

/// Outlet for [`SessionEvent`]s.
///
/// Cheap to clone. Emitting never blocks; events are dropped silently once
/// the receiving side has gone away.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    /// Create a sink and the receiver the presentation layer reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Deliver an event.
    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("event receiver dropped; discarding event");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn emitted_events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();

        sink.emit(SessionEvent::PeersChanged { names: vec!["bob".into()] });
        sink.emit(SessionEvent::AcceptFailed { reason: "EMFILE".into() });

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PeersChanged { names: vec!["bob".into()] }
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::AcceptFailed { reason: "EMFILE".into() });
    }

    #[test]
    fn emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(SessionEvent::PeersChanged { names: Vec::new() });

        EventSink::discard().emit(SessionEvent::PeersChanged { names: Vec::new() });
    }
}
