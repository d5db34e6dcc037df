//! Storage adapter contract.
//!
//! The session engine talks to the backing key/value cache only through
//! [`SessionStore`]. Commits are expressed as a single [`WriteBatch`] so a
//! backend with transactional writes can apply them atomically.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::ServerKey;

/// Prefix shared by every key the engine writes.
pub const SESSION_PREFIX: &str = "quay.session.";

/// Trait for key/value storage backends.
///
/// Values are opaque bytes; a missing or expired key reads as `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value that expires after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Extend the lifetime of an existing value without rewriting it.
    /// Touching a missing key is not an error.
    async fn touch(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Check whether a value is present.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Delete every key starting with `prefix`.
    async fn clear_namespace(&self, prefix: &str) -> Result<()>;

    /// Apply a batch: prefix clears first, then the per-key operations.
    ///
    /// The default implementation applies the operations one at a time.
    /// Backends that can should override it to apply the batch atomically.
    async fn write_batch(&self, batch: WriteBatch, ttl: Duration) -> Result<()> {
        let (prefixes, entries) = batch.into_parts();

        for prefix in &prefixes {
            self.clear_namespace(prefix).await?;
        }

        for (key, op) in entries {
            match op {
                BatchOp::Put(value) => self.set(&key, value, ttl).await?,
                BatchOp::Touch => self.touch(&key, ttl).await?,
                BatchOp::Delete => self.delete(&key).await?,
            }
        }

        Ok(())
    }
}

/// Operation recorded for a single key in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write the value.
    Put(Vec<u8>),
    /// Keep the current value, refreshing its lifetime.
    Touch,
    /// Remove the value.
    Delete,
}

/// A set of writes to apply together.
///
/// Each key holds its final operation. Recording a key twice keeps the
/// later operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    clear_prefixes: Vec<String>,
    entries: BTreeMap<String, BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wipe every key under `prefix` before the per-key operations.
    pub fn clear_prefix(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !self.clear_prefixes.contains(&prefix) {
            self.clear_prefixes.push(prefix);
        }
    }

    /// Write a value.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), BatchOp::Put(value));
    }

    /// Refresh the lifetime of a value.
    pub fn touch(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), BatchOp::Touch);
    }

    /// Delete a value.
    pub fn delete(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), BatchOp::Delete);
    }

    /// Prefixes to clear.
    pub fn prefixes(&self) -> &[String] {
        &self.clear_prefixes
    }

    /// Final operation per key.
    pub fn entries(&self) -> &BTreeMap<String, BatchOp> {
        &self.entries
    }

    /// Operation recorded for a key, if any.
    pub fn get(&self, key: &str) -> Option<&BatchOp> {
        self.entries.get(key)
    }

    /// Check if the batch does nothing.
    pub fn is_empty(&self) -> bool {
        self.clear_prefixes.is_empty() && self.entries.is_empty()
    }

    /// Split into prefixes and entries.
    pub fn into_parts(self) -> (Vec<String>, BTreeMap<String, BatchOp>) {
        (self.clear_prefixes, self.entries)
    }
}

/// Key layout of one session inside the store.
///
/// ```text
/// quay.session.<server-key>.data.<model-key>   model envelopes
/// quay.session.<server-key>.meta.keys          index of live model keys
/// quay.session.<server-key>.meta.flashes       keys flashed by the last commit
/// quay.session.<server-key>.meta.expires       expiry, unix seconds
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Namespace of the session with the given server key.
    pub fn new(server_key: &ServerKey) -> Self {
        Self {
            prefix: format!("{}{}.", SESSION_PREFIX, server_key),
        }
    }

    /// Prefix covering every key of the session.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Storage key of a model.
    pub fn data_key(&self, key: &str) -> String {
        format!("{}data.{}", self.prefix, key)
    }

    /// Storage key of the live-key index.
    pub fn index_key(&self) -> String {
        format!("{}meta.keys", self.prefix)
    }

    /// Storage key of the flash index.
    pub fn flashes_key(&self) -> String {
        format!("{}meta.flashes", self.prefix)
    }

    /// Storage key of the expiration marker.
    pub fn expiry_key(&self) -> String {
        format!("{}meta.expires", self.prefix)
    }
}
