//! Session models and their stored representation.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::checksum::{Checksum, ChecksumRegistry};
use crate::error::{Error, Result};

/// A value that can be kept in a session.
///
/// `KEY` is the stable logical name the value is stored under. `SCHEMA`
/// describes the layout of the type; change it whenever a stored value
/// written by the old layout must no longer be decoded by the new one.
///
/// # Example
///
/// ```rust
/// use quay_session::SessionModel;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Cart {
///     items: Vec<String>,
/// }
///
/// impl SessionModel for Cart {
///     const KEY: &'static str = "shop.cart";
///     const SCHEMA: &'static str = "v1";
///
///     fn is_empty(&self) -> bool {
///         self.items.is_empty()
///     }
/// }
/// ```
pub trait SessionModel: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Logical name of the model within a session.
    const KEY: &'static str;

    /// Schema descriptor feeding the checksum gate.
    const SCHEMA: &'static str;

    /// True if the model is in its default state and need not be stored.
    fn is_empty(&self) -> bool;
}

/// Stored form of a model: the schema fingerprint plus the payload.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    checksum: Checksum,
    payload: serde_json::Value,
}

/// Encode a model for storage.
pub(crate) fn encode<T: SessionModel>(value: &T, checksums: &ChecksumRegistry) -> Result<Vec<u8>> {
    let envelope = Envelope {
        checksum: checksums.fingerprint::<T>(),
        payload: serde_json::to_value(value)?,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a stored model.
///
/// Returns [`Error::SchemaMismatch`] without touching the payload when the
/// stored checksum is not the current one.
pub(crate) fn decode<T: SessionModel>(bytes: &[u8], checksums: &ChecksumRegistry) -> Result<T> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    if !checksums.validate::<T>(&envelope.checksum) {
        return Err(Error::SchemaMismatch {
            key: T::KEY.to_string(),
        });
    }

    Ok(serde_json::from_value(envelope.payload)?)
}

/// Object-safe view of a model held in the per-request caches.
pub(crate) trait StoredModel: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn is_empty_model(&self) -> bool;

    fn encode(&self, checksums: &ChecksumRegistry) -> Result<Vec<u8>>;
}

impl<T: SessionModel> StoredModel for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_empty_model(&self) -> bool {
        SessionModel::is_empty(self)
    }

    fn encode(&self, checksums: &ChecksumRegistry) -> Result<Vec<u8>> {
        encode(self, checksums)
    }
}
