//! Dynamic command API registry
//!
//! Programs can expose command handlers under canonical URIs of the form
//! `domain/address/command`. Incoming requests are resolved by exact match
//! on that three-segment prefix first; when none matches, any handler whose
//! registered key prefixes the request acts as a generic matcher and
//! receives the full request string.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

/// Future type for API handlers
pub type ApiFuture = Pin<Box<dyn Future<Output = Option<serde_json::Value>> + Send>>;

/// API handler function type
pub type ApiHandler = Arc<dyn Fn(String) -> ApiFuture + Send + Sync>;

/// Process-wide mapping from command URIs to handlers
///
/// Register, unregister, and lookup are all safe under concurrent access;
/// lookups never hold a handler entry across an await.
pub struct DynamicApiRegistry {
    handlers: DashMap<String, ApiHandler>,
}

impl DynamicApiRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler under a canonical `domain/address/command` key
    pub fn register<F, Fut>(&self, path: impl Into<String>, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<serde_json::Value>> + Send + 'static,
    {
        let path = path.into();
        debug!(path = %path, "Registering dynamic API handler");

        let handler: ApiHandler = Arc::new(move |request| Box::pin(handler(request)) as ApiFuture);
        self.handlers.insert(path, handler);
    }

    /// Remove a handler, returning whether one was registered
    pub fn unregister(&self, path: &str) -> bool {
        let removed = self.handlers.remove(path).is_some();
        if removed {
            debug!(path = %path, "Unregistered dynamic API handler");
        }
        removed
    }

    /// Whether a handler is registered under the exact key
    pub fn has_handler(&self, path: &str) -> bool {
        self.handlers.contains_key(path)
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Resolve and invoke the handler for a request
    ///
    /// On an exact match the handler receives the request suffix with
    /// surrounding slashes trimmed; a fallback matcher receives the full
    /// request. Returns None when no handler claims the request.
    pub async fn call(&self, request: &str) -> Option<serde_json::Value> {
        if let Some(key) = command_prefix(request) {
            let exact = self.handlers.get(&key).map(|entry| entry.value().clone());
            if let Some(handler) = exact {
                let suffix = request[key.len()..].trim_matches('/').to_string();
                trace!(key = %key, suffix = %suffix, "Dispatching exact API match");
                return handler(suffix).await;
            }
        }

        let matcher = self
            .handlers
            .iter()
            .find(|entry| request.starts_with(entry.key().as_str()))
            .map(|entry| entry.value().clone());
        if let Some(handler) = matcher {
            trace!(request = %request, "Dispatching prefix API match");
            return handler(request.to_string()).await;
        }

        None
    }
}

impl Default for DynamicApiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The canonical `domain/address/command` prefix of a request
fn command_prefix(request: &str) -> Option<String> {
    let mut parts = request.splitn(4, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(domain), Some(address), Some(command))
            if !domain.is_empty() && !address.is_empty() && !command.is_empty() =>
        {
            Some(format!("{}/{}/{}", domain, address, command))
        }
        _ => None,
    }
}
