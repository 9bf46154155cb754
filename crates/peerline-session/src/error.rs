//! Session error types.
//!
//! Only [`SessionError::Bind`], [`SessionError::Dial`] and
//! [`SessionError::DialTimeout`] ever reach callers. The remaining variants
//! describe per-connection failures that the session absorbs: they end up in
//! a log line and, for writes, in the pruning of that one peer.

use std::{io, net::SocketAddr, time::Duration};

use peerline_proto::ProtocolError;
use thiserror::Error;

use crate::ConnectionId;

/// Errors raised by the peer-session engine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The listener could not acquire its address.
    ///
    /// Fatal for this node's inbound role. The caller decides whether the
    /// whole process should stop.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The bootstrap peer could not be reached.
    ///
    /// The node stays usable with zero peers.
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        /// Address as supplied by the caller
        addr: String,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The bootstrap peer did not answer within the connect deadline.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    DialTimeout {
        /// Address as supplied by the caller
        addr: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// A single accept call failed. The accept loop keeps running.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// Reading from a peer failed. Ends that peer's read loop.
    #[error("read failed on {connection}: {source}")]
    Read {
        /// Connection that failed
        connection: ConnectionId,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Writing to a peer failed. The peer is pruned.
    #[error("write failed on {connection}: {source}")]
    Write {
        /// Connection that failed
        connection: ConnectionId,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Writing to a peer did not complete within the write deadline.
    #[error("write to {connection} timed out after {timeout:?}")]
    WriteTimeout {
        /// Connection that stalled
        connection: ConnectionId,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// The connection was already closed locally.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The peer violated line framing (e.g. an overlong line).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
