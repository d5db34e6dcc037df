//! Per-request session transaction.
//!
//! A [`Transaction`] is an in-memory overlay over one session namespace.
//! Reads go through to storage and are cached; writes, removals, and clears
//! are deferred and materialized in a single [`WriteBatch`] at commit.
//!
//! Commit order:
//! 1. a cleared transaction wipes the namespace
//! 2. otherwise the flash index of the previous commit is consulted: on a
//!    successful response its keys are deleted and this request's flashes
//!    become the new index; on a redirect or error the old and new flashes
//!    are kept together
//! 3. removed keys are deleted
//! 4. pending writes are stored (empty models are deleted instead)
//! 5. the expiration marker is refreshed
//! 6. transient state is reset

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::checksum::ChecksumRegistry;
use crate::error::{Error, Result};
use crate::model::{self, SessionModel, StoredModel};
use crate::store::{Namespace, SessionStore, WriteBatch};

/// How the response to the request was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOutcome {
    status: u16,
}

impl ResponseOutcome {
    /// Outcome for an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        Self { status }
    }

    /// A plain successful response.
    pub fn ok() -> Self {
        Self::from_status(200)
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Responses below 300 are successful; redirects and errors are not.
    pub fn is_success(&self) -> bool {
        self.status < 300
    }
}

impl From<u16> for ResponseOutcome {
    fn from(status: u16) -> Self {
        Self::from_status(status)
    }
}

/// The writes a commit will perform, before they are applied.
#[derive(Debug, Clone)]
pub struct StagedCommit {
    /// Storage operations, applied as one batch.
    pub batch: WriteBatch,

    /// Model keys present in the session once the batch is applied.
    pub live_keys: BTreeSet<String>,

    /// Keys in the flash index once the batch is applied.
    pub flashes: BTreeSet<String>,
}

/// Deferred reads and writes against one session namespace.
pub struct Transaction {
    store: Arc<dyn SessionStore>,
    checksums: Arc<ChecksumRegistry>,

    /// Namespace holding the data persisted by earlier requests.
    namespace: Namespace,

    read_cache: HashMap<String, Arc<dyn StoredModel>>,
    write_cache: HashMap<String, Arc<dyn StoredModel>>,
    removed: HashSet<String>,
    flashed: HashSet<String>,
    cleared: bool,
}

impl Transaction {
    /// Open a transaction over a namespace.
    pub fn new(
        store: Arc<dyn SessionStore>,
        checksums: Arc<ChecksumRegistry>,
        namespace: Namespace,
    ) -> Self {
        Self {
            store,
            checksums,
            namespace,
            read_cache: HashMap::new(),
            write_cache: HashMap::new(),
            removed: HashSet::new(),
            flashed: HashSet::new(),
            cleared: false,
        }
    }

    /// Namespace this transaction reads from.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Read a model.
    ///
    /// Returns [`Error::NotFound`] if the model is not in the session; guard
    /// with [`has`](Self::has) when absence is expected. A stored value
    /// written under a different schema reads as `T::default()`.
    pub async fn get<T: SessionModel>(&mut self) -> Result<T> {
        if let Some(model) = self.read_cache.get(T::KEY) {
            trace!(key = T::KEY, "Session model read from cache");
            return downcast::<T>(model.as_ref());
        }

        self.fetch::<T>()
            .await?
            .ok_or_else(|| Error::NotFound(T::KEY.to_string()))
    }

    /// Check whether a model is in the session.
    pub async fn has<T: SessionModel>(&self) -> Result<bool> {
        self.has_key(T::KEY).await
    }

    /// Check whether a key is in the session.
    pub async fn has_key(&self, key: &str) -> Result<bool> {
        if self.read_cache.contains_key(key) {
            return Ok(true);
        }

        if self.is_cut_off(key) {
            return Ok(false);
        }

        self.store.exists(&self.namespace.data_key(key)).await
    }

    /// Store a model.
    ///
    /// Clears any pending removal and any flash mark for the key made in
    /// this transaction. A key flashed by an earlier request stays in the
    /// flash index when this response is not successful, so it is still
    /// deleted by the next successful response. Only a successful commit
    /// turns it back into a regular value.
    pub fn set<T: SessionModel>(&mut self, value: T) {
        self.write(T::KEY, Arc::new(value), false);
    }

    /// Store a model that disappears after the next successful response.
    pub fn flash<T: SessionModel>(&mut self, value: T) {
        self.write(T::KEY, Arc::new(value), true);
    }

    /// Remove a model.
    pub fn unset<T: SessionModel>(&mut self) {
        self.unset_key(T::KEY);
    }

    /// Remove a key.
    pub fn unset_key(&mut self, key: &str) {
        self.read_cache.remove(key);
        self.write_cache.remove(key);
        self.flashed.remove(key);
        self.removed.insert(key.to_string());
        trace!(key = %key, "Session model removal deferred");
    }

    /// Drop everything in the session.
    ///
    /// The namespace is wiped at commit. Writes made after this call in the
    /// same transaction are kept.
    pub fn clear(&mut self) {
        self.read_cache.clear();
        self.write_cache.clear();
        self.removed.clear();
        self.flashed.clear();
        self.cleared = true;
        debug!(namespace = %self.namespace.prefix(), "Session clear deferred");
    }

    /// Whether `clear()` was called since the last commit.
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Whether a key is flagged as a flash value in this transaction.
    pub fn is_flashed(&self, key: &str) -> bool {
        self.flashed.contains(key)
    }

    /// Whether a key is scheduled for removal.
    pub fn is_removed(&self, key: &str) -> bool {
        self.removed.contains(key)
    }

    /// Whether the transaction holds mutations not yet committed.
    pub fn is_dirty(&self) -> bool {
        self.cleared || !self.write_cache.is_empty() || !self.removed.is_empty()
    }

    /// Commit into this transaction's own namespace and reset it.
    pub async fn commit(
        &mut self,
        outcome: ResponseOutcome,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<StagedCommit> {
        let target = self.namespace.clone();
        let staged = self.stage(&target, outcome, now, ttl).await?;
        self.store.write_batch(staged.batch.clone(), ttl).await?;
        self.reset();
        Ok(staged)
    }

    /// Compute the writes of a commit into `target` without applying them.
    ///
    /// When `target` differs from the namespace the transaction reads from
    /// (the identity was renewed), live models that were not rewritten are
    /// copied over as stored, without decoding.
    pub async fn stage(
        &self,
        target: &Namespace,
        outcome: ResponseOutcome,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<StagedCommit> {
        let source = &self.namespace;
        let moving = source != target;
        let mut batch = WriteBatch::new();

        let (mut live, flashes) = if self.cleared {
            batch.clear_prefix(target.prefix());
            (BTreeSet::new(), self.flashed_sorted())
        } else {
            let mut live = self.read_set(&source.index_key()).await?;
            let prior = self.read_set(&source.flashes_key()).await?;

            let flashes = if outcome.is_success() {
                for key in &prior {
                    live.remove(key);
                    batch.delete(target.data_key(key));
                }
                self.flashed_sorted()
            } else {
                // prior flashes persist even if rewritten by a plain set()
                prior.union(&self.flashed_sorted()).cloned().collect()
            };

            for key in &self.removed {
                live.remove(key);
                batch.delete(target.data_key(key));
            }

            (live, flashes)
        };

        for key in live.clone() {
            if self.write_cache.contains_key(&key) {
                continue;
            }

            if !moving {
                batch.touch(target.data_key(&key));
                continue;
            }

            match self.store.get(&source.data_key(&key)).await? {
                Some(bytes) => batch.put(target.data_key(&key), bytes),
                None => {
                    live.remove(&key);
                }
            }
        }

        for (key, model) in &self.write_cache {
            if model.is_empty_model() {
                live.remove(key);
                batch.delete(target.data_key(key));
            } else {
                live.insert(key.clone());
                batch.put(target.data_key(key), model.encode(&self.checksums)?);
            }
        }

        let flashes: BTreeSet<String> = flashes
            .into_iter()
            .filter(|key| live.contains(key))
            .collect();

        batch.put(target.index_key(), serde_json::to_vec(&live)?);
        batch.put(target.flashes_key(), serde_json::to_vec(&flashes)?);

        let expires = now
            .checked_add_signed(chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        batch.put(target.expiry_key(), serde_json::to_vec(&expires.timestamp())?);

        debug!(
            namespace = %target.prefix(),
            status = outcome.status(),
            cleared = self.cleared,
            moving = moving,
            live = live.len(),
            flashes = flashes.len(),
            "Staged session commit"
        );

        Ok(StagedCommit {
            batch,
            live_keys: live,
            flashes,
        })
    }

    /// Drop all transient state.
    pub fn reset(&mut self) {
        self.read_cache.clear();
        self.write_cache.clear();
        self.removed.clear();
        self.flashed.clear();
        self.cleared = false;
    }

    fn write(&mut self, key: &str, value: Arc<dyn StoredModel>, flash: bool) {
        self.removed.remove(key);
        self.read_cache.insert(key.to_string(), Arc::clone(&value));
        self.write_cache.insert(key.to_string(), value);

        if flash {
            self.flashed.insert(key.to_string());
        } else {
            self.flashed.remove(key);
        }

        trace!(key = %key, flash = flash, "Session model write deferred");
    }

    /// Storage is out of reach for keys removed or cleared this request.
    fn is_cut_off(&self, key: &str) -> bool {
        self.cleared || self.removed.contains(key)
    }

    async fn fetch<T: SessionModel>(&mut self) -> Result<Option<T>> {
        if self.is_cut_off(T::KEY) {
            return Ok(None);
        }

        let Some(bytes) = self.store.get(&self.namespace.data_key(T::KEY)).await? else {
            return Ok(None);
        };

        let value = match model::decode::<T>(&bytes, &self.checksums) {
            Ok(value) => value,
            Err(Error::SchemaMismatch { key }) => {
                warn!(key = %key, "Stored session model has a stale schema, using default");
                T::default()
            }
            Err(e) => return Err(e),
        };

        trace!(key = T::KEY, "Session model loaded from storage");
        self.read_cache
            .insert(T::KEY.to_string(), Arc::new(value.clone()));

        Ok(Some(value))
    }

    async fn read_set(&self, key: &str) -> Result<BTreeSet<String>> {
        match self.store.get(key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BTreeSet::new()),
        }
    }

    fn flashed_sorted(&self) -> BTreeSet<String> {
        self.flashed.iter().cloned().collect()
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("namespace", &self.namespace)
            .field("read", &self.read_cache.keys().collect::<Vec<_>>())
            .field("write", &self.write_cache.keys().collect::<Vec<_>>())
            .field("removed", &self.removed)
            .field("flashed", &self.flashed)
            .field("cleared", &self.cleared)
            .finish()
    }
}

fn downcast<T: SessionModel>(model: &dyn StoredModel) -> Result<T> {
    model
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::TypeMismatch {
            key: T::KEY.to_string(),
            expected: std::any::type_name::<T>(),
        })
}
