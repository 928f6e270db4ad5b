//! Storage contracts the session manager relies on.
//!
//! The manager holds no state of its own, so every guarantee it gives
//! about concurrent callers comes from the primitives below:
//!
//! - [`SessionStore::update_if_version`]: a conditional write. Identity
//!   binding and kills go through it, so two writers racing on the same
//!   session cannot both win.
//! - [`SessionKeyStore::consume`]: get-and-delete as one step. A key can
//!   be redeemed by exactly one caller.
//!
//! A backend that can only do plain get/set does NOT satisfy these
//! contracts. Redis would use `WATCH`/`MULTI` (or a Lua script) and
//! `GETDEL`; SQL would use `UPDATE ... WHERE version = $n` and
//! `DELETE ... RETURNING`.

use std::future::Future;
use std::sync::Arc;

use crate::{Session, SessionId, SessionKey, StoreError};

/// Durable keyed storage for [`Session`] records.
pub trait SessionStore: Send + Sync + 'static {
    /// Inserts a new session.
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the id is taken.
    fn create(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Loads a session by id.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no such session exists.
    fn get(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Overwrites the stored session unconditionally.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no such session exists.
    fn update(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites the stored session only if its stored version is still
    /// `expected`. Check and write must be a single atomic step.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if no such session exists.
    /// - [`StoreError::VersionMismatch`] if another writer got there first.
    fn update_if_version(
        &self,
        session: &Session,
        expected: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Durable keyed storage for [`SessionKey`] records.
pub trait SessionKeyStore: Send + Sync + 'static {
    /// Stores a key. Its TTL is carried in
    /// [`SessionKey::expires_at`](SessionKey::expires_at).
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the key is taken.
    fn create(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Atomically removes the key and returns the session id it pointed
    /// to. An expired key is removed too, but reported as expired.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if the key is unknown or already consumed.
    /// - [`StoreError::Expired`] if the key's TTL has elapsed.
    fn consume(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<SessionId, StoreError>> + Send;
}

// A shared store (e.g. one with a background sweeper) can be handed to the
// manager behind an `Arc`.

impl<T: SessionStore> SessionStore for Arc<T> {
    fn create(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).create(session)
    }

    fn get(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send {
        (**self).get(id)
    }

    fn update(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).update(session)
    }

    fn update_if_version(
        &self,
        session: &Session,
        expected: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).update_if_version(session, expected)
    }
}

impl<T: SessionKeyStore> SessionKeyStore for Arc<T> {
    fn create(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).create(key)
    }

    fn consume(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<SessionId, StoreError>> + Send {
        (**self).consume(key)
    }
}
