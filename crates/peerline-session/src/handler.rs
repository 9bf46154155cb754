//! Per-connection read loop.
//!
//! One handler runs per link for the link's whole lifetime. It owns the read
//! half, turns handshake lines into registry updates and chat lines into
//! message events, and unregisters the link when reading stops for any
//! reason.

use std::sync::Arc;

use bytes::BytesMut;
use peerline_proto::{Line, LineDecoder};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Connection, EventSink, PeerRegistry, SessionError, SessionEvent};

const READ_CHUNK: usize = 4096;

/// Read loop for one connection.
pub(crate) struct ConnectionHandler<R> {
    connection: Connection,
    reader: R,
    registry: Arc<PeerRegistry>,
    events: EventSink,
    decoder: LineDecoder,
    /// Latest handshake name, or the synthetic address name
    name: String,
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        connection: Connection,
        reader: R,
        registry: Arc<PeerRegistry>,
        events: EventSink,
        max_line_len: usize,
    ) -> Self {
        let name = connection.synthetic_name();
        Self { connection, reader, registry, events, decoder: LineDecoder::new(max_line_len), name }
    }

    /// Read until end of stream, a read error, or a local close; then
    /// unregister the connection.
    pub(crate) async fn run(mut self) {
        let connection = self.connection.clone();

        let outcome = tokio::select! {
            result = self.read_loop() => result,
            () = connection.closed() => Ok(()),
        };

        match outcome {
            Ok(()) => tracing::debug!(connection = %connection.id(), "Read loop finished"),
            Err(e) => tracing::debug!(connection = %connection.id(), "Read loop failed: {}", e),
        }

        if let Some(peer) = self.registry.remove(&connection) {
            tracing::info!(connection = %connection.id(), "Peer disconnected: {}", peer.name);
        }
    }

    async fn read_loop(&mut self) -> Result<(), SessionError> {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);

        loop {
            while let Some(line) = self.decoder.decode(&mut buf)? {
                self.dispatch(line);
            }

            buf.reserve(READ_CHUNK);
            let n = self
                .reader
                .read_buf(&mut buf)
                .await
                .map_err(|source| SessionError::Read { connection: self.connection.id(), source })?;

            if n == 0 {
                while let Some(line) = self.decoder.decode_eof(&mut buf)? {
                    self.dispatch(line);
                }
                return Ok(());
            }
        }
    }

    fn dispatch(&mut self, line: Line) {
        // A link pruned by the sender may still have buffered lines.
        if self.connection.is_closed() {
            return;
        }

        match line {
            Line::Handshake { name } => {
                // The registry reports the connect, keeping it ordered with
                // a concurrent removal.
                if !self.registry.add(&self.connection, name.clone()) {
                    return;
                }
                tracing::info!(connection = %self.connection.id(), "Peer connected: {}", name);
                self.name = name;
            },
            Line::Chat { text } => {
                tracing::debug!(connection = %self.connection.id(), "Message from {}", self.name);
                self.events.emit(SessionEvent::MessageReceived {
                    connection: self.connection.id(),
                    sender: self.name.clone(),
                    text,
                });
            },
        }
    }
}
