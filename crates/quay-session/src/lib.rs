//! Request-scoped session transactions over a key/value cache.
//!
//! This crate provides:
//! - Deferred get/set/flash/unset/clear on typed session models
//! - A single batched write per request, applied at commit
//! - Flash values that survive redirects and errors until the next success
//! - Checksum-gated decoding of stored models
//! - Token renewal that destroys the previous namespace
//!
//! # Example
//!
//! ```rust,ignore
//! use quay_session::{MemoryStore, SessionConfig, SessionService};
//!
//! let service = SessionService::new(Arc::new(MemoryStore::new()), SessionConfig::default());
//!
//! let mut session = service.begin(cookie_value).await?;
//! session.set(Cart { items: vec!["apple".into()] });
//! let set_cookie = service.commit(session, ResponseOutcome::ok()).await?;
//! ```

mod checksum;
mod clock;
mod config;
mod cookies;
mod error;
mod identity;
mod memory;
mod model;
mod service;
mod session;
mod store;
mod transaction;

pub use checksum::{Checksum, ChecksumRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_COOKIE_LIFETIME, DEFAULT_COOKIE_NAME, DEFAULT_SALT, DEFAULT_TTL, SessionConfig,
};
pub use cookies::{SetCookie, find_token, removal_cookie, session_cookie};
pub use error::{Error, Result};
pub use identity::{ClientToken, IdentityGenerator, ServerKey, SessionIdentity};
pub use memory::{DEFAULT_SWEEP_INTERVAL, MemoryStore};
pub use model::SessionModel;
pub use service::SessionService;
pub use session::Session;
pub use store::{BatchOp, Namespace, SESSION_PREFIX, SessionStore, WriteBatch};
pub use transaction::{ResponseOutcome, StagedCommit, Transaction};
