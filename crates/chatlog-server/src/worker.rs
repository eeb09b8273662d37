//! Per-connection worker
//!
//! A worker serves exactly one request: one read of up to the configured
//! buffer size, one dispatch, one response, then the socket is closed.
//! Bodies larger than what fits in that single read are truncated. There
//! are no read or write timeouts, so a silent peer holds its worker until
//! it disconnects.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, trace};

use crate::codec::parse_request;
use crate::error::ServerResult;
use crate::routes::RouteTable;

/// Serve one request on `stream`
///
/// Handlers run on the blocking pool since the log manager does file I/O
/// while holding its lock.
#[instrument(skip(stream, routes, buffer_size))]
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    routes: Arc<RouteTable>,
    buffer_size: usize,
) -> ServerResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];
    let read = stream.read(&mut buffer).await?;

    let Some(request) = parse_request(&buffer[..read]) else {
        trace!("Peer closed without sending");
        return Ok(());
    };

    debug!(method = %request.method, path = %request.path, bytes = read, "Request");

    let response = tokio::task::spawn_blocking(move || routes.dispatch(&request)).await?;

    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await?;

    debug!(status = response.status.code(), "Response sent");
    Ok(())
}
