//! Connection acceptor
//!
//! Binds the listening socket and runs the accept loop on its own task. Every
//! accepted connection is handed to a freshly spawned worker task. There is
//! no cap on concurrent workers beyond the OS listen backlog, so a flood of
//! slow clients grows the task count without bound.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::routes::RouteTable;
use crate::worker;

/// Pending connection queue length passed to `listen`
const LISTEN_BACKLOG: u32 = 1024;

/// Pause after a failed accept so a persistent error (EMFILE) does not spin
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(10);

/// Handle to a running accept loop
#[derive(Debug)]
pub struct Acceptor {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Acceptor {
    /// Bind `addr` with address reuse and start accepting
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(
        addr: SocketAddr,
        routes: Arc<RouteTable>,
        read_buffer_size: usize,
    ) -> ServerResult<Self> {
        let listener = bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(accept_loop(
            listener,
            routes,
            read_buffer_size,
            Arc::clone(&running),
            cancel.clone(),
        ));

        info!(addr = %local_addr, "Listening");

        Ok(Self {
            local_addr,
            running,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop accepting and close the listening socket
    ///
    /// Waits for the accept loop to exit. In-flight workers are not
    /// interrupted. Calling this again is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            debug!("Acceptor already stopped");
        }
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Accept loop ended abnormally");
            }
            info!(addr = %self.local_addr, "Acceptor stopped");
        }
    }
}

fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

async fn accept_loop(
    listener: TcpListener,
    routes: Arc<RouteTable>,
    read_buffer_size: usize,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    let routes = Arc::clone(&routes);
                    tokio::spawn(async move {
                        if let Err(e) =
                            worker::handle_connection(stream, peer, routes, read_buffer_size).await
                        {
                            warn!(peer = %peer, error = %e, "Connection failed");
                        }
                    });
                }
                Err(e) => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    error!(error = %e, "Accept error");
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                }
            },
        }
    }
    // Dropping the listener closes the socket
}
