//! The request-scoped session handle.

use crate::error::Result;
use crate::identity::{ClientToken, IdentityGenerator, ServerKey, SessionIdentity};
use crate::model::SessionModel;
use crate::transaction::Transaction;

/// Session bound to one request.
///
/// Obtained from [`SessionService::begin`](crate::SessionService::begin) and
/// handed back to [`SessionService::commit`](crate::SessionService::commit)
/// once the response status is known. Nothing reaches storage before then.
#[derive(Debug)]
pub struct Session {
    identity: SessionIdentity,
    tx: Transaction,
    generator: IdentityGenerator,
}

impl Session {
    pub(crate) fn new(identity: SessionIdentity, tx: Transaction, generator: IdentityGenerator) -> Self {
        Self {
            identity,
            tx,
            generator,
        }
    }

    /// Read a model. Fails with `NotFound` if it is absent.
    pub async fn get<T: SessionModel>(&mut self) -> Result<T> {
        self.tx.get::<T>().await
    }

    /// Read a model, falling back to its default when absent.
    pub async fn get_or_default<T: SessionModel>(&mut self) -> Result<T> {
        if self.tx.has::<T>().await? {
            self.tx.get::<T>().await
        } else {
            Ok(T::default())
        }
    }

    /// Check whether a model is present.
    pub async fn has<T: SessionModel>(&self) -> Result<bool> {
        self.tx.has::<T>().await
    }

    /// Store a model.
    pub fn set<T: SessionModel>(&mut self, value: T) {
        self.tx.set(value);
    }

    /// Store a model until the next successful response.
    pub fn flash<T: SessionModel>(&mut self, value: T) {
        self.tx.flash(value);
    }

    /// Remove a model.
    pub fn unset<T: SessionModel>(&mut self) {
        self.tx.unset::<T>();
    }

    /// Remove a model by key.
    pub fn unset_key(&mut self, key: &str) {
        self.tx.unset_key(key);
    }

    /// Drop all session data and issue a fresh identity.
    pub fn clear(&mut self) {
        self.tx.clear();
        self.renew();
    }

    /// Issue a fresh identity, keeping the data.
    ///
    /// The previous token stops working once the session is committed.
    pub fn renew(&mut self) {
        self.generator.renew(&mut self.identity);
    }

    /// Identity bound to this request.
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Token the client will hold after commit.
    pub fn client_token(&self) -> &ClientToken {
        self.identity.client_token()
    }

    /// Storage namespace the session will be committed to.
    pub fn server_key(&self) -> &ServerKey {
        self.identity.server_key()
    }

    /// True if the request did not carry a live session.
    pub fn is_new(&self) -> bool {
        self.identity.is_new()
    }

    /// True if `renew()` or `clear()` was called.
    pub fn is_renewed(&self) -> bool {
        self.identity.is_renewed()
    }

    /// Whether uncommitted mutations are pending.
    pub fn is_dirty(&self) -> bool {
        self.tx.is_dirty()
    }

    pub(crate) fn into_parts(self) -> (SessionIdentity, Transaction) {
        (self.identity, self.tx)
    }
}
