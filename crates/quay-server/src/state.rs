//! Application state shared across handlers.

use std::sync::Arc;

use quay_session::{MemoryStore, SessionService, SessionStore};

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session engine.
    pub sessions: SessionService,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create state backed by an in-memory store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    /// Create state over an existing store.
    pub fn with_store(store: Arc<dyn SessionStore>, config: ServerConfig) -> Self {
        Self {
            sessions: SessionService::new(store, config.session.clone()),
            config: Arc::new(config),
        }
    }

    /// Create state from a prepared session service.
    pub fn from_service(sessions: SessionService, config: ServerConfig) -> Self {
        Self {
            sessions,
            config: Arc::new(config),
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
