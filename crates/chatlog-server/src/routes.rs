//! Exact-match route table

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::codec::{Request, Response};

/// Handler invoked with the request body; its return value is the response body
pub type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
struct Route {
    content_type: &'static str,
    handler: Handler,
}

/// Maps request paths to handlers
///
/// Paths must match exactly; there are no prefixes, wildcards, or method
/// checks. The table is built once at startup and shared read-only.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `path`, replacing any existing route
    pub fn add_route<F>(&mut self, path: impl Into<String>, content_type: &'static str, handler: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.routes.insert(
            path.into(),
            Route {
                content_type,
                handler: Arc::new(handler),
            },
        );
    }

    /// Builder form of [`RouteTable::add_route`]
    pub fn with_route<F>(mut self, path: impl Into<String>, content_type: &'static str, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.add_route(path, content_type, handler);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<_> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Run the matching handler, or produce a 404
    ///
    /// Handlers may block on file I/O; call this off the async executor.
    pub fn dispatch(&self, request: &Request) -> Response {
        match self.routes.get(&request.path) {
            Some(route) => {
                debug!(method = %request.method, path = %request.path, "Route matched");
                Response::ok(route.content_type, (route.handler)(&request.body))
            }
            None => {
                debug!(method = %request.method, path = %request.path, "No route");
                Response::not_found()
            }
        }
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("paths", &self.paths())
            .finish()
    }
}
