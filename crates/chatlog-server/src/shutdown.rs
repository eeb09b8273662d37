//! Graceful shutdown
//!
//! The coordinator owns everything a shutdown needs: the log manager, the
//! acceptor and a cancellation token. It waits for SIGINT, SIGTERM or the
//! token, flushes every non-empty queue to a rotation file, rewrites the
//! snapshot, then stops the acceptor. Workers still in flight may append
//! after the flush; their entries land in the snapshot.

use std::fmt;
use std::sync::Arc;

use chatlog_core::{FlushReport, LogManager};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::acceptor::Acceptor;
use crate::error::ServerResult;

/// What started the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Interrupt,
    Terminate,
    Requested,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Interrupt => write!(f, "SIGINT"),
            ShutdownTrigger::Terminate => write!(f, "SIGTERM"),
            ShutdownTrigger::Requested => write!(f, "requested"),
        }
    }
}

pub struct ShutdownCoordinator {
    manager: Arc<LogManager>,
    acceptor: Arc<Acceptor>,
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(manager: Arc<LogManager>, acceptor: Arc<Acceptor>) -> Self {
        Self {
            manager,
            acceptor,
            token: CancellationToken::new(),
        }
    }

    /// Token that triggers shutdown when cancelled
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for a signal or the token
    pub async fn wait(&self) -> ShutdownTrigger {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => ShutdownTrigger::Interrupt,
                Err(e) => {
                    warn!(error = %e, "Could not listen for SIGINT");
                    self.wait_without_interrupt().await
                }
            },
            _ = terminate() => ShutdownTrigger::Terminate,
            _ = self.token.cancelled() => ShutdownTrigger::Requested,
        }
    }

    /// Wait for SIGTERM or the token
    async fn wait_without_interrupt(&self) -> ShutdownTrigger {
        tokio::select! {
            _ = terminate() => ShutdownTrigger::Terminate,
            _ = self.token.cancelled() => ShutdownTrigger::Requested,
        }
    }

    /// Flush all queues, then stop accepting
    ///
    /// The acceptor is stopped even when the flush fails.
    pub async fn shutdown(&self) -> ServerResult<FlushReport> {
        let manager = Arc::clone(&self.manager);
        let flushed = tokio::task::spawn_blocking(move || manager.flush_all()).await;

        self.acceptor.stop().await;

        let report = flushed??;
        for (key, e) in &report.failed {
            error!(key = %key, error = %e, "Queue kept in snapshot only");
        }
        info!(rotated = report.rotated.len(), "Shutdown flush complete");
        Ok(report)
    }

    /// Wait for a trigger and shut down
    pub async fn run(self) -> ServerResult<FlushReport> {
        let trigger = self.wait().await;
        info!(trigger = %trigger, "Shutting down");
        self.shutdown().await
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Could not listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
