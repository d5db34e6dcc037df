//! In-memory storage backend with TTL support.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::store::{BatchOp, SessionStore, WriteBatch};

/// Entry stored in memory.
#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// How often a batch write also sweeps expired entries out of the map.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-memory [`SessionStore`].
///
/// Entries expire according to the injected [`Clock`]. An expired entry is
/// dropped when it is next accessed, and batch writes sweep the whole map at
/// most once per sweep interval, so lapsed sessions nobody asks for again do
/// not accumulate. Batches are applied under a single write lock, so readers
/// never observe half a commit. Clones share the same underlying map.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    last_sweep: Arc<Mutex<DateTime<Utc>>>,
}

impl MemoryStore {
    /// Create an empty store using wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store using the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            last_sweep: Arc::new(Mutex::new(now)),
        }
    }

    /// Set how often batch writes sweep expired entries.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Live keys under a prefix, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    /// Drop expired entries and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let count = sweep(&mut self.entries.write(), now);
        *self.last_sweep.lock() = now;
        count
    }

    /// Sweep if the interval has passed since the last sweep.
    fn sweep_if_due(&self, entries: &mut HashMap<String, StoredEntry>, now: DateTime<Utc>) {
        let mut last = self.last_sweep.lock();
        let due = (now - *last)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.sweep_interval);
        if due {
            sweep(entries, now);
            *last = now;
        }
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            trace!(key = %key, "Dropped expired entry");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let expires_at = self.expiry(ttl);
        self.entries
            .write()
            .insert(key.to_string(), StoredEntry { value, expires_at });
        trace!(key = %key, "Stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        trace!(key = %key, "Deleted entry");
        Ok(())
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        refresh(&mut self.entries.write(), key, now, expires_at);
        Ok(())
    }

    async fn clear_namespace(&self, prefix: &str) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|key, _| !key.starts_with(prefix));
        debug!(prefix = %prefix, "Cleared namespace");
        Ok(())
    }

    async fn write_batch(&self, batch: WriteBatch, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let (prefixes, ops) = batch.into_parts();

        let mut entries = self.entries.write();
        self.sweep_if_due(&mut entries, now);

        for prefix in &prefixes {
            entries.retain(|key, _| !key.starts_with(prefix.as_str()));
        }

        let count = ops.len();
        for (key, op) in ops {
            match op {
                BatchOp::Put(value) => {
                    entries.insert(key, StoredEntry { value, expires_at });
                }
                BatchOp::Touch => refresh(&mut entries, &key, now, expires_at),
                BatchOp::Delete => {
                    entries.remove(&key);
                }
            }
        }

        trace!(
            prefixes = prefixes.len(),
            ops = count,
            size = entries.len(),
            "Applied write batch"
        );

        Ok(())
    }
}

/// Extend a live entry, or drop it if it has already expired.
fn refresh(
    entries: &mut HashMap<String, StoredEntry>,
    key: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) {
    let Some(entry) = entries.get_mut(key) else {
        return;
    };

    if entry.is_expired(now) {
        entries.remove(key);
    } else {
        entry.expires_at = expires_at;
    }
}

fn sweep(entries: &mut HashMap<String, StoredEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    let count = before - entries.len();

    if count > 0 {
        debug!(count = count, remaining = entries.len(), "Purged expired entries");
    }

    count
}
