//! In-memory store backends.
//!
//! Each store keeps its records in a `HashMap` behind one Tokio `Mutex`.
//! Every trait method takes the lock once and does its check and write
//! under it, which is what makes `update_if_version` and `consume` atomic.
//!
//! Suitable for tests, development, and single-process deployments.
//! Nothing survives a restart.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{Session, SessionId, SessionKey, SessionKeyStore, SessionStore, StoreError};

// ---------------------------------------------------------------------------
// MemSessionStore
// ---------------------------------------------------------------------------

/// A [`SessionStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemSessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemSessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every session whose expiry is at or before `now`, returning
    /// the removed ids.
    pub async fn purge_expired(&self, now: SystemTime) -> Vec<SessionId> {
        let mut sessions = self.sessions.lock().await;
        let mut purged = Vec::new();
        sessions.retain(|id, session| {
            if session.is_expired(now) {
                purged.push(id.clone());
                false
            } else {
                true
            }
        });
        if !purged.is_empty() {
            tracing::debug!(count = purged.len(), "purged expired sessions");
        }
        purged
    }

    /// Returns the number of stored sessions (any state).
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns `true` if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl SessionStore for MemSessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.entry(session.id().clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        let stored = sessions
            .get_mut(session.id())
            .ok_or(StoreError::NotFound)?;
        *stored = session.clone();
        Ok(())
    }

    async fn update_if_version(
        &self,
        session: &Session,
        expected: u64,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        let stored = sessions
            .get_mut(session.id())
            .ok_or(StoreError::NotFound)?;
        if stored.version() != expected {
            return Err(StoreError::VersionMismatch {
                expected,
                actual: stored.version(),
            });
        }
        *stored = session.clone();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemSessionKeyStore
// ---------------------------------------------------------------------------

/// A [`SessionKeyStore`] backed by a `HashMap`.
///
/// Expired keys are rejected lazily by [`consume`](SessionKeyStore::consume).
/// To reclaim memory held by keys nobody redeems, call
/// [`purge_expired`](Self::purge_expired) periodically or start
/// [`spawn_sweeper`](Self::spawn_sweeper).
#[derive(Debug, Default)]
pub struct MemSessionKeyStore {
    keys: Mutex<HashMap<String, SessionKey>>,
}

impl MemSessionKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut keys = self.keys.lock().await;
        let before = keys.len();
        keys.retain(|_, key| !key.is_expired(now));
        before - keys.len()
    }

    /// Spawns a background task that calls
    /// [`purge_expired`](Self::purge_expired) every `every`.
    ///
    /// The task holds only a weak reference and exits on its own once
    /// the store is dropped. Abort the handle to stop it sooner.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "swept expired session keys");
                }
            }
            tracing::debug!("session key sweeper stopped");
        })
    }

    /// Returns the number of stored keys, expired ones included.
    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    /// Returns `true` if no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }
}

impl SessionKeyStore for MemSessionKeyStore {
    async fn create(&self, key: &SessionKey) -> Result<(), StoreError> {
        let mut keys = self.keys.lock().await;
        match keys.entry(key.key().to_owned()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
                Ok(())
            }
        }
    }

    async fn consume(&self, key: &str) -> Result<SessionId, StoreError> {
        let record = self
            .keys
            .lock()
            .await
            .remove(key)
            .ok_or(StoreError::NotFound)?;
        if record.is_expired(Instant::now()) {
            return Err(StoreError::Expired);
        }
        Ok(record.session_id().clone())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;

    use super::*;
    use crate::{AuthRequest, Identity};

    fn session(id: &str) -> Session {
        Session::new(
            SessionId::from(id),
            AuthRequest::new("connector_id", "XXX").client_state("bogus"),
            SystemTime::now(),
            Duration::from_secs(60),
        )
    }

    fn key(k: &str, session_id: &str, ttl_secs: u64) -> SessionKey {
        SessionKey::new(
            k.to_owned(),
            SessionId::from(session_id),
            Duration::from_secs(ttl_secs),
        )
    }

    // =====================================================================
    // MemSessionStore
    // =====================================================================

    #[tokio::test]
    async fn test_create_then_get_returns_copy() {
        let store = MemSessionStore::new();
        let s = session("s1");

        store.create(&s).await.unwrap();

        assert_eq!(store.get(s.id()).await.unwrap(), s);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_id_returns_already_exists() {
        let store = MemSessionStore::new();
        store.create(&session("s1")).await.unwrap();

        let result = store.create(&session("s1")).await;

        assert_eq!(result, Err(StoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_get_unknown_returns_not_found() {
        let store = MemSessionStore::new();
        let result = store.get(&SessionId::from("nope")).await;
        assert_eq!(result, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_update_unknown_returns_not_found() {
        let store = MemSessionStore::new();
        let result = store.update(&session("s1")).await;
        assert_eq!(result, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_update_overwrites_regardless_of_version() {
        let store = MemSessionStore::new();
        let mut s = session("s1");
        store.create(&s).await.unwrap();
        s.kill();

        // Stored version is still 0; a plain update does not care.
        store.update(&s).await.unwrap();

        assert!(store.get(s.id()).await.unwrap().state().is_terminal());
    }

    #[tokio::test]
    async fn test_update_if_version_matching_writes() {
        let store = MemSessionStore::new();
        let mut s = session("s1");
        store.create(&s).await.unwrap();

        let expected = s.version();
        s.attach_remote_identity(Identity::new("YYY", "elroy", "e@x"))
            .unwrap();
        store.update_if_version(&s, expected).await.unwrap();

        let stored = store.get(s.id()).await.unwrap();
        assert_eq!(stored.version(), 1);
        assert!(stored.has_identity());
    }

    #[tokio::test]
    async fn test_update_if_version_stale_is_rejected() {
        let store = MemSessionStore::new();
        let original = session("s1");
        store.create(&original).await.unwrap();

        let mut first = original.clone();
        first.attach_remote_identity(Identity::new("A", "a", "a@x")).unwrap();
        store.update_if_version(&first, 0).await.unwrap();

        let mut second = original.clone();
        second.attach_remote_identity(Identity::new("B", "b", "b@x")).unwrap();
        let result = store.update_if_version(&second, 0).await;

        assert_eq!(
            result,
            Err(StoreError::VersionMismatch {
                expected: 0,
                actual: 1
            })
        );
        let stored = store.get(original.id()).await.unwrap();
        assert_eq!(stored.identity().unwrap().id, "A");
    }

    #[tokio::test]
    async fn test_purge_expired_sessions_removes_only_expired() {
        let store = MemSessionStore::new();
        let s = session("s1");
        store.create(&s).await.unwrap();

        assert!(store.purge_expired(SystemTime::now()).await.is_empty());

        let later = s.expires_at() + Duration::from_secs(1);
        let purged = store.purge_expired(later).await;

        assert_eq!(purged, vec![SessionId::from("s1")]);
        assert!(store.is_empty().await);
    }

    // =====================================================================
    // MemSessionKeyStore
    // =====================================================================

    #[tokio::test]
    async fn test_consume_returns_session_id_once() {
        let store = MemSessionKeyStore::new();
        store.create(&key("k1", "s1", 60)).await.unwrap();

        assert_eq!(store.consume("k1").await, Ok(SessionId::from("s1")));
        assert_eq!(store.consume("k1").await, Err(StoreError::NotFound));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_duplicate_key_returns_already_exists() {
        let store = MemSessionKeyStore::new();
        store.create(&key("k1", "s1", 60)).await.unwrap();

        let result = store.create(&key("k1", "s2", 60)).await;

        assert_eq!(result, Err(StoreError::AlreadyExists));
        assert_eq!(store.consume("k1").await, Ok(SessionId::from("s1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_expired_key_reports_expired_and_removes() {
        let store = MemSessionKeyStore::new();
        store.create(&key("k1", "s1", 5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(store.consume("k1").await, Err(StoreError::Expired));
        assert_eq!(store.consume("k1").await, Err(StoreError::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keys_keeps_live_ones() {
        let store = MemSessionKeyStore::new();
        store.create(&key("short", "s1", 5)).await.unwrap();
        store.create(&key("long", "s2", 3600)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.consume("long").await, Ok(SessionId::from("s2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_expired_keys() {
        let store = Arc::new(MemSessionKeyStore::new());
        store.create(&key("k1", "s1", 5)).await.unwrap();
        let sweeper = store.spawn_sweeper(Duration::from_secs(10));

        // Auto-advance lets the interval fire past the key's TTL.
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(store.is_empty().await);
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_store_dropped() {
        let store = Arc::new(MemSessionKeyStore::new());
        let sweeper = store.spawn_sweeper(Duration::from_secs(1));

        drop(store);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(sweeper.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_exactly_one_wins() {
        let store = Arc::new(MemSessionKeyStore::new());
        store.create(&key("k1", "s1", 60)).await.unwrap();

        let tasks = (0..32).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.consume("k1").await })
        });
        let results = join_all(tasks).await;

        let wins = results
            .into_iter()
            .map(|r| r.expect("task panicked"))
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(wins, 1);
    }
}
