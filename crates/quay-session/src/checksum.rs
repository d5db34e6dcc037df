//! Schema fingerprints that gate deserialization of stored models.
//!
//! Every stored value carries the fingerprint of the schema it was written
//! with. A value whose fingerprint differs from the current one is never
//! decoded; the reader substitutes the model's default instead.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::SessionModel;

/// Fingerprint of a model's schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute the fingerprint of a key and schema descriptor.
    pub fn compute(key: &str, schema: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(schema.as_bytes());
        Self(hex::encode(&hasher.finalize()[..16]))
    }

    /// The fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Memoizes model fingerprints for the lifetime of the registry.
///
/// Constructed once and shared by the session service.
#[derive(Debug, Default)]
pub struct ChecksumRegistry {
    known: RwLock<HashMap<&'static str, Checksum>>,
}

impl ChecksumRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint of the current schema of `T`.
    pub fn fingerprint<T: SessionModel>(&self) -> Checksum {
        if let Some(checksum) = self.known.read().get(T::KEY) {
            return checksum.clone();
        }

        self.known
            .write()
            .entry(T::KEY)
            .or_insert_with(|| Checksum::compute(T::KEY, T::SCHEMA))
            .clone()
    }

    /// Whether a stored checksum matches the current schema of `T`.
    pub fn validate<T: SessionModel>(&self, stored: &Checksum) -> bool {
        *stored == self.fingerprint::<T>()
    }

    /// Number of memoized fingerprints.
    pub fn len(&self) -> usize {
        self.known.read().len()
    }

    /// Check if nothing has been fingerprinted yet.
    pub fn is_empty(&self) -> bool {
        self.known.read().is_empty()
    }
}
