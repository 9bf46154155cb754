//! Session facade and the context shared by its components.

use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use peerline_proto::Line;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};

use crate::{
    Broadcaster, ConfigError, Connection, ConnectionId, EventSink, FanOut, PeerRegistry,
    SessionConfig, SessionError, SessionEvent, dialer,
    handler::ConnectionHandler,
    listener::{Listener, ListenerHandle},
};

/// State shared by the listener, the dialer and every connection handler.
///
/// Passed around explicitly; there is no process-wide registry.
pub(crate) struct SessionContext {
    pub(crate) config: SessionConfig,
    pub(crate) registry: Arc<PeerRegistry>,
    pub(crate) events: EventSink,
    /// Our handshake, sent first on every new link
    handshake: Line,
    next_id: AtomicU64,
}

impl SessionContext {
    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Attach an established TCP stream.
    pub(crate) fn attach_tcp(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
    ) -> Connection {
        let (reader, writer) = split_tcp(stream, remote_addr);
        self.attach(reader, writer, remote_addr)
    }

    /// Send our handshake on a fresh link, then run its read loop on a new
    /// task.
    pub(crate) fn attach<R, W>(
        self: &Arc<Self>,
        reader: R,
        writer: W,
        remote_addr: SocketAddr,
    ) -> Connection
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let connection = Connection::new(self.next_connection_id(), remote_addr, writer);
        let handler = ConnectionHandler::new(
            connection.clone(),
            reader,
            Arc::clone(&self.registry),
            self.events.clone(),
            self.config.max_line_len,
        );

        let ctx = Arc::clone(self);
        let link = connection.clone();
        tokio::spawn(async move {
            // No acknowledgment exists; a lost handshake only means the remote
            // shows our address instead of our name.
            if let Err(e) = link.send(&ctx.handshake, ctx.config.write_timeout).await {
                tracing::warn!(connection = %link.id(), "Failed to send handshake: {}", e);
            }
            handler.run().await;
        });

        connection
    }
}

/// Tune a TCP link for interactive lines and split it.
pub(crate) fn split_tcp(
    stream: TcpStream,
    remote_addr: SocketAddr,
) -> (OwnedReadHalf, OwnedWriteHalf) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", remote_addr, e);
    }
    stream.into_split()
}

/// A running chat node: one listener, any number of links, one registry.
///
/// Cheap to clone; clones share the same registry and links.
///
/// # Example
///
/// ```no_run
/// use peerline_session::{Session, SessionConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let (session, mut events) = Session::new(SessionConfig::new("alice"))?;
/// session.start_listening(9000).await?;
/// session.broadcast("hi").await;
/// while let Some(event) = events.recv().await {
///     // render the event
/// #   let _ = event;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    ctx: Arc<SessionContext>,
    broadcaster: Broadcaster,
}

impl Session {
    /// Create a session and the event receiver for the presentation layer.
    pub fn new(
        config: SessionConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), ConfigError> {
        let (events, rx) = EventSink::channel();
        Ok((Self::with_sink(config, events)?, rx))
    }

    /// Create a session reporting to an existing sink.
    pub fn with_sink(config: SessionConfig, events: EventSink) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(PeerRegistry::new(events.clone()));
        let broadcaster = Broadcaster::new(Arc::clone(&registry), config.write_timeout);
        let handshake = Line::handshake(config.nickname.clone());
        let ctx =
            SessionContext { config, registry, events, handshake, next_id: AtomicU64::new(1) };

        Ok(Self { ctx: Arc::new(ctx), broadcaster })
    }

    /// Our display name.
    pub fn nickname(&self) -> &str {
        &self.ctx.config.nickname
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.ctx.config
    }

    /// The peer registry.
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.ctx.registry
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Listen on `port` on all interfaces.
    ///
    /// Binds the IPv6 wildcard, which also takes IPv4 peers where the host
    /// allows dual-stack sockets. Hosts without IPv6 fall back to the IPv4
    /// wildcard.
    pub async fn start_listening(&self, port: u16) -> Result<ListenerHandle, SessionError> {
        match self.listen_on(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))).await {
            Err(SessionError::Bind { source, .. }) if !is_port_conflict(&source) => {
                tracing::debug!("IPv6 wildcard unavailable ({}), using IPv4 only", source);
                self.listen_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
            },
            result => result,
        }
    }

    /// Listen on an explicit address and run the accept loop on a new task.
    pub async fn listen_on(&self, addr: SocketAddr) -> Result<ListenerHandle, SessionError> {
        Ok(Listener::bind(addr, Arc::clone(&self.ctx)).await?.spawn())
    }

    /// Dial one peer (`host:port`), send our handshake and start reading.
    pub async fn connect_to_peer(&self, addr: &str) -> Result<ConnectionId, SessionError> {
        dialer::connect_to_peer(&self.ctx, addr).await.map(|connection| connection.id())
    }

    /// Attach an already established stream as a peer link.
    ///
    /// Used for transports other than plain TCP and for in-memory tests.
    pub fn attach<R, W>(&self, reader: R, writer: W, remote_addr: SocketAddr) -> Connection
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.ctx.attach(reader, writer, remote_addr)
    }

    /// Send `text` to every registered peer.
    pub async fn broadcast(&self, text: &str) -> FanOut {
        self.broadcaster.broadcast(text).await
    }

    /// Send `text` to every peer presenting `name`.
    pub async fn send_to(&self, name: &str, text: &str) -> FanOut {
        self.broadcaster.send_to(name, text).await
    }

    /// Display names of the registered peers, oldest connection first.
    pub fn peer_names(&self) -> Vec<String> {
        self.ctx.registry.names()
    }
}

fn is_port_conflict(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied)
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("nickname", &self.ctx.config.nickname)
            .field("peers", &self.ctx.registry.len())
            .finish_non_exhaustive()
    }
}
