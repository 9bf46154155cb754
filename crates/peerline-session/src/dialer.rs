//! Outbound side: connect to one peer and attach.

use std::sync::Arc;

use tokio::net::TcpStream;

use crate::{Connection, SessionError, session::SessionContext};

/// Connect to `addr` within the configured deadline and attach the link.
///
/// Failure leaves the session untouched; the node keeps running with
/// whatever peers it already has.
pub(crate) async fn connect_to_peer(
    ctx: &Arc<SessionContext>,
    addr: &str,
) -> Result<Connection, SessionError> {
    let timeout = ctx.config.connect_timeout;

    let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(SessionError::Dial { addr: addr.to_string(), source }),
        Err(_) => return Err(SessionError::DialTimeout { addr: addr.to_string(), timeout }),
    };

    let remote_addr =
        stream.peer_addr().map_err(|source| SessionError::Dial { addr: addr.to_string(), source })?;

    tracing::info!("Connected to {}", remote_addr);

    Ok(ctx.attach_tcp(stream, remote_addr))
}
