//! HTTP server integration for Quay sessions.
//!
//! This crate wires the session engine into an axum application.
//!
//! # Features
//!
//! - Session middleware: opens the session before the handler and commits it
//!   with the response status afterwards
//! - `SessionHandle` extractor for handlers
//! - Demo routes (visit counter, flash messages, login/logout)
//! - Request logging
//!
//! # Example
//!
//! ```ignore
//! use quay_server::{Server, ServerConfig};
//! use quay_session::SessionConfig;
//!
//! let config = ServerConfig::new(SessionConfig::default().with_secure(true))
//!     .with_bind_address("127.0.0.1:8080".parse()?);
//!
//! Server::new(config).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use logging::request_logging_middleware;
pub use session::{SessionHandle, session_middleware};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Quay HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server backed by an in-memory session store.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(self.session_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Routes that run inside a session.
    fn session_routes(&self) -> Router<AppState> {
        routes::demo_routes().layer(middleware::from_fn_with_state(
            self.state.clone(),
            session::session_middleware,
        ))
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
