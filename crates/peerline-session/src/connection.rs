//! Shared handle to one peer link.
//!
//! The read half of a link belongs to its connection handler. Everything
//! else (registry, fan-out) holds a [`Connection`], a cheap clone of the
//! write half plus the link's identity and closed flag.

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use peerline_proto::Line;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, watch},
};

use crate::SessionError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Process-unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Write side of a peer link.
///
/// # Invariants
///
/// - Closing happens at most once: [`Connection::close`] returns `true` for
///   exactly one caller.
/// - Once closed, every write fails with [`SessionError::Closed`] and the read
///   loop attached to the link is told to stop.
/// - Writes to one connection are serialised; concurrent senders never
///   interleave bytes of two lines.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    remote_addr: SocketAddr,
    /// `None` once the write half has been released
    writer: Mutex<Option<BoxedWriter>>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Wrap the write half of a link.
    pub fn new<W>(id: ConnectionId, remote_addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed, _) = watch::channel(false);
        let inner = Inner { id, remote_addr, writer: Mutex::new(Some(Box::new(writer))), closed };
        Self { inner: Arc::new(inner) }
    }

    /// Identifier of this link.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Address of the remote end.
    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote_addr
    }

    /// Display name used until the peer announces one.
    pub fn synthetic_name(&self) -> String {
        self.inner.remote_addr.to_string()
    }

    /// Whether [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Close the link.
    ///
    /// Returns `true` for the call that actually closed it. Never blocks: the
    /// write half is released right away unless a write is in flight, in
    /// which case it goes when that write finishes.
    pub fn close(&self) -> bool {
        let first = self.inner.closed.send_if_modified(|closed| {
            if *closed {
                return false;
            }
            *closed = true;
            true
        });

        if first {
            if let Ok(mut writer) = self.inner.writer.try_lock() {
                writer.take();
            }
            tracing::debug!(connection = %self.inner.id, "Connection closed");
        }

        first
    }

    /// Resolve once the link has been closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        // The sender lives in `self`, so this only returns on close.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Write one line, bounded by `timeout`.
    pub async fn send(&self, line: &Line, timeout: Duration) -> Result<(), SessionError> {
        let id = self.inner.id;
        let bytes = line.to_bytes();

        let mut guard = self.inner.writer.lock().await;
        if self.is_closed() {
            guard.take();
            return Err(SessionError::Closed(id));
        }
        let Some(writer) = guard.as_mut() else {
            return Err(SessionError::Closed(id));
        };

        let write = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };

        let result = match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(SessionError::Write { connection: id, source }),
            Err(_) => Err(SessionError::WriteTimeout { connection: id, timeout }),
        };

        // `close` could not take the writer while we held it.
        if self.is_closed() {
            guard.take();
        }

        result
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("remote_addr", &self.inner.remote_addr)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
