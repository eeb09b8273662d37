//! # Chatlog Server
//!
//! A deliberately small HTTP front end for [`chatlog_core::LogManager`].
//!
//! One request per connection, exact-match routing, and a fixed set of
//! routes:
//!
//! | Path | Response |
//! |---|---|
//! | `/` | the browser UI |
//! | `/api/messages` | every queued message as JSON |
//! | `/api/send` | append `{"username":..,"message":..}` |
//! | `/api/clear` | drop every queue |
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatlog_server::{Server, ServerConfig};
//!
//! let server = Server::start(ServerConfig::default().with_port(0))?;
//! println!("listening on {}", server.local_addr());
//!
//! // Blocks until SIGINT/SIGTERM, then flushes queues to rotation files
//! server.coordinator().run().await?;
//! ```

pub mod acceptor;
pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod shutdown;
pub mod worker;

pub use acceptor::Acceptor;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use routes::RouteTable;
pub use shutdown::{ShutdownCoordinator, ShutdownTrigger};

use std::net::SocketAddr;
use std::sync::Arc;

use chatlog_core::LogManager;
use tracing::info;

/// A running server: the log manager plus its acceptor
pub struct Server {
    manager: Arc<LogManager>,
    acceptor: Arc<Acceptor>,
}

impl Server {
    /// Open the log manager, register routes and start accepting
    ///
    /// Must be called inside a tokio runtime. Loading the snapshot happens
    /// synchronously before the socket is bound.
    pub fn start(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let addr = config.bind_addr()?;

        let manager = Arc::new(LogManager::open(config.log.clone())?);
        let routes = Arc::new(handlers::routes(Arc::clone(&manager), config.ui_path.clone()));
        let acceptor = Arc::new(Acceptor::start(addr, routes, config.read_buffer_size)?);

        info!(
            addr = %acceptor.local_addr(),
            log_dir = %manager.rotation_dir().display(),
            "Chatlog server started"
        );

        Ok(Self { manager, acceptor })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    pub fn manager(&self) -> &Arc<LogManager> {
        &self.manager
    }

    pub fn acceptor(&self) -> &Arc<Acceptor> {
        &self.acceptor
    }

    /// Shutdown coordinator bound to this server's manager and acceptor
    pub fn coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(Arc::clone(&self.manager), Arc::clone(&self.acceptor))
    }
}
