//! Inbound side: bind, accept, attach.

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpListener,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    task::AbortHandle,
};

use crate::{SessionError, SessionEvent, session::SessionContext};

/// Source of inbound links.
///
/// Each accepted link is handed over already split into its read and write
/// halves.
pub(crate) trait Accept: Send + 'static {
    /// Read half of an accepted link
    type Reader: AsyncRead + Send + Unpin + 'static;
    /// Write half of an accepted link
    type Writer: AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next inbound link.
    fn accept(
        &mut self,
    ) -> impl Future<Output = io::Result<(Self::Reader, Self::Writer, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn accept(&mut self) -> io::Result<(OwnedReadHalf, OwnedWriteHalf, SocketAddr)> {
        let (stream, remote_addr) = TcpListener::accept(self).await?;
        let (reader, writer) = crate::session::split_tcp(stream, remote_addr);
        Ok((reader, writer, remote_addr))
    }
}

/// Bound listening socket, not yet accepting.
pub(crate) struct Listener<A = TcpListener> {
    acceptor: A,
    local_addr: SocketAddr,
    ctx: Arc<SessionContext>,
}

impl Listener<TcpListener> {
    /// Bind `addr`. Failure means this node has no inbound role.
    pub(crate) async fn bind(
        addr: SocketAddr,
        ctx: Arc<SessionContext>,
    ) -> Result<Self, SessionError> {
        let listener =
            TcpListener::bind(addr).await.map_err(|source| SessionError::Bind { addr, source })?;
        let local_addr =
            listener.local_addr().map_err(|source| SessionError::Bind { addr, source })?;

        tracing::info!("Listening on {}", local_addr);

        Ok(Self::new(listener, local_addr, ctx))
    }
}

impl<A: Accept> Listener<A> {
    pub(crate) fn new(acceptor: A, local_addr: SocketAddr, ctx: Arc<SessionContext>) -> Self {
        Self { acceptor, local_addr, ctx }
    }

    /// Run the accept loop on a new task.
    pub(crate) fn spawn(self) -> ListenerHandle {
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.run());
        ListenerHandle::new(local_addr, task.abort_handle())
    }

    /// Accept connections forever.
    ///
    /// A failed accept is reported and followed by a short pause; it never
    /// ends the loop.
    async fn run(mut self) {
        loop {
            match self.acceptor.accept().await {
                Ok((reader, writer, remote_addr)) => {
                    tracing::info!("New connection: {}", remote_addr);
                    self.ctx.attach(reader, writer, remote_addr);
                },
                Err(e) => {
                    let err = SessionError::Accept(e);
                    tracing::warn!("{}", err);
                    self.ctx.events.emit(SessionEvent::AcceptFailed { reason: err.to_string() });
                    tokio::time::sleep(self.ctx.config.accept_backoff).await;
                },
            }
        }
    }
}

/// Handle to a running accept loop.
///
/// Dropping the handle leaves the loop running; call
/// [`ListenerHandle::stop`] to end it. Established connections are not
/// affected by stopping.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    abort_handle: AbortHandle,
}

impl ListenerHandle {
    pub(crate) fn new(local_addr: SocketAddr, abort_handle: AbortHandle) -> Self {
        Self { local_addr, abort_handle }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    /// Whether the accept loop has ended.
    pub fn is_finished(&self) -> bool {
        self.abort_handle.is_finished()
    }
}
