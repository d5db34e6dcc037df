//! Session lifecycle: resolving identities at the start of a request and
//! materializing sessions at the end of it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::checksum::ChecksumRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::cookies::{self, SetCookie};
use crate::error::Result;
use crate::identity::{ClientToken, IdentityGenerator, ServerKey, SessionIdentity};
use crate::session::Session;
use crate::store::{Namespace, SessionStore, WriteBatch};
use crate::transaction::{ResponseOutcome, Transaction};

/// Entry point of the engine.
///
/// Cheap to clone; clones share the store, clock and checksum registry.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    checksums: Arc<ChecksumRegistry>,
    generator: IdentityGenerator,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    /// Create a service over a store using wall-clock time.
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            generator: IdentityGenerator::new(config.salt.clone()),
            store,
            config,
            checksums: Arc::new(ChecksumRegistry::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a checksum registry with other services.
    pub fn with_checksums(mut self, checksums: Arc<ChecksumRegistry>) -> Self {
        self.checksums = checksums;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Open the session for a request.
    ///
    /// `token` is the raw cookie value, if the client sent one. A missing,
    /// malformed or lapsed token yields a new session; only storage failures
    /// are reported as errors.
    pub async fn begin(&self, token: Option<&str>) -> Result<Session> {
        let identity = match token {
            None => self.generator.mint(),
            Some(raw) => match ClientToken::parse(raw) {
                Ok(token) => self.resolve(token).await?,
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed session token");
                    self.generator.mint()
                }
            },
        };

        if identity.is_new() {
            debug!(token = %identity.client_token().short(), "Started new session");
        } else {
            debug!(token = %identity.client_token().short(), "Resumed session");
        }

        let tx = Transaction::new(
            Arc::clone(&self.store),
            Arc::clone(&self.checksums),
            Namespace::new(identity.server_key()),
        );

        Ok(Session::new(identity, tx, self.generator.clone()))
    }

    /// Commit a session once the response status is known.
    ///
    /// Returns the `Set-Cookie` to attach to the response, or `None` when a
    /// new session ended up holding nothing.
    pub async fn commit(
        &self,
        session: Session,
        outcome: ResponseOutcome,
    ) -> Result<Option<SetCookie>> {
        let (identity, tx) = session.into_parts();
        let now = self.clock.now();

        // a renewed session still reads from the namespace it started with
        let target = Namespace::new(identity.server_key());
        let staged = tx.stage(&target, outcome, now, self.config.ttl).await?;

        if staged.live_keys.is_empty() {
            if identity.is_new() {
                debug!(
                    token = %identity.client_token().short(),
                    "Discarding empty new session"
                );
                return Ok(None);
            }

            let mut batch = WriteBatch::new();
            batch.clear_prefix(target.prefix());
            if let Some(old) = identity.old_server_key() {
                batch.clear_prefix(Namespace::new(old).prefix());
            }
            self.store.write_batch(batch, self.config.ttl).await?;

            info!(
                token = %identity.client_token().short(),
                "Destroyed empty session"
            );
            return Ok(Some(cookies::removal_cookie(&self.config)));
        }

        // the cookie must be buildable before anything is written
        let expires = add(now, self.config.cookie_lifetime);
        let cookie = cookies::session_cookie(&self.config, identity.client_token(), expires)?;

        let mut batch = staged.batch;
        if let Some(old) = identity.old_server_key() {
            batch.clear_prefix(Namespace::new(old).prefix());
            info!(
                token = %identity.client_token().short(),
                "Renewed session identity"
            );
        }
        self.store.write_batch(batch, self.config.ttl).await?;

        debug!(
            token = %identity.client_token().short(),
            status = outcome.status(),
            keys = staged.live_keys.len(),
            flashes = staged.flashes.len(),
            "Committed session"
        );

        Ok(Some(cookie))
    }

    /// Check whether a server key holds a live session.
    pub async fn is_active(&self, key: &ServerKey) -> Result<bool> {
        let marker = self.store.get(&Namespace::new(key).expiry_key()).await?;

        let Some(bytes) = marker else {
            return Ok(false);
        };

        match serde_json::from_slice::<i64>(&bytes) {
            Ok(expires) => Ok(expires > self.clock.now().timestamp()),
            Err(e) => {
                warn!(error = %e, "Unreadable session expiration marker");
                Ok(false)
            }
        }
    }

    /// Delete all data of the session a client token points to.
    pub async fn destroy(&self, token: &ClientToken) -> Result<()> {
        let key = self.generator.derive(token);
        self.store
            .clear_namespace(Namespace::new(&key).prefix())
            .await?;
        info!(token = %token.short(), "Destroyed session");
        Ok(())
    }

    async fn resolve(&self, token: ClientToken) -> Result<SessionIdentity> {
        let key = self.generator.derive(&token);

        if self.is_active(&key).await? {
            Ok(self.generator.resume(token))
        } else {
            debug!(token = %token.short(), "Session token lapsed");
            Ok(self.generator.mint())
        }
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("config", &self.config)
            .field("checksums", &self.checksums.len())
            .finish()
    }
}

fn add(now: DateTime<Utc>, by: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| now.checked_add_signed(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
