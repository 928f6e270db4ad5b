//! The session manager: drives every session through its lifecycle.
//!
//! Responsibilities:
//! - Creating sessions and handing back their code
//! - Binding the upstream identity (once) and then the local user
//! - Issuing and redeeming single-use session keys
//! - Killing sessions and returning the final snapshot
//!
//! # Concurrency note
//!
//! `SessionManager` holds no mutable state and takes `&self` everywhere.
//! Share it across tasks behind an `Arc`. There is no locking here:
//! at-most-once identity binding rests on
//! [`SessionStore::update_if_version`], and at-most-once key redemption
//! rests on [`SessionKeyStore::consume`].
//!
//! Every store call is bounded by [`SessionConfig::store_timeout`] when
//! set. Dropping an operation's future drops the in-flight store call
//! with it.

use std::future::Future;
use std::time::SystemTime;

use crate::{
    AuthRequest, CodeGenerator, Identity, RandomCodeGenerator, Session,
    SessionConfig, SessionError, SessionId, SessionKey, SessionKeyStore,
    SessionState, SessionStore, StoreError,
};

/// Orchestrates session lifecycle operations against two stores.
///
/// ## Lifecycle
///
/// ```text
/// new_session() ──→ attach_remote_identity() ──→ attach_user()
///      │                     │                        │
///      ▼                     ▼                        ▼
///    [New]          [RemoteAttached]            [Identified]
///      │                     │                        │
///      └─────────────────────┴───── kill() ───────────┴──→ [Dead]
///
/// new_session_key() ──→ exchange_key()   (any live state, single use)
/// ```
pub struct SessionManager<S, K, G = RandomCodeGenerator> {
    sessions: S,
    keys: K,
    generator: G,
    config: SessionConfig,
}

impl<S, K, G> SessionManager<S, K, G>
where
    S: SessionStore,
    K: SessionKeyStore,
    G: CodeGenerator,
{
    /// Creates a manager over the given stores and generator.
    pub fn new(config: SessionConfig, sessions: S, keys: K, generator: G) -> Self {
        Self {
            sessions,
            keys,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_store(&self) -> &S {
        &self.sessions
    }

    pub fn key_store(&self) -> &K {
        &self.keys
    }

    /// Starts a new authentication attempt.
    ///
    /// The generated value is both the session's primary key and the code
    /// returned to the caller.
    ///
    /// # Errors
    /// - [`SessionError::Generation`] if the generator fails.
    /// - [`SessionError::Storage`] if the session cannot be persisted
    ///   (including an id collision in the store).
    pub async fn new_session(
        &self,
        request: AuthRequest,
    ) -> Result<SessionId, SessionError> {
        let id = SessionId::new(self.generator.generate()?);
        let session = Session::new(
            id.clone(),
            request,
            SystemTime::now(),
            self.config.session_ttl,
        );

        self.bounded(self.sessions.create(&session))
            .await
            .map_err(|e| SessionError::storage("create session", e))?;

        tracing::info!(
            session_id = %id,
            connector_id = session.connector_id(),
            client_id = session.client_id(),
            "session created"
        );
        Ok(id)
    }

    /// Binds a verified upstream identity to the session. Write-once.
    ///
    /// Of several concurrent callers for the same session exactly one
    /// succeeds; the rest get [`SessionError::AlreadyAttached`].
    ///
    /// # Errors
    /// - [`SessionError::SessionNotFound`] if the session doesn't exist.
    /// - [`SessionError::AlreadyAttached`] if an identity is already bound.
    /// - [`SessionError::WrongState`] if the session is dead.
    /// - [`SessionError::Conflict`] if the session changed underneath us
    ///   for some reason other than an identity being attached.
    pub async fn attach_remote_identity(
        &self,
        session_id: &SessionId,
        identity: Identity,
    ) -> Result<Session, SessionError> {
        let mut session = self.load(session_id).await?;
        let expected = session.version();

        let result = match session.attach_remote_identity(identity) {
            Ok(()) => {
                match self
                    .persist(&session, expected, "persist remote identity")
                    .await
                {
                    Err(SessionError::Conflict(_)) => {
                        Err(self.explain_lost_attach(session_id).await)
                    }
                    other => other,
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!(%session_id, "remote identity attached");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "remote identity rejected");
                Err(e)
            }
        }
    }

    /// Binds the local user that the remote identity resolved to.
    ///
    /// # Errors
    /// - [`SessionError::SessionNotFound`] if the session doesn't exist.
    /// - [`SessionError::WrongState`] unless the session is `RemoteAttached`.
    /// - [`SessionError::Conflict`] if the session changed concurrently.
    pub async fn attach_user(
        &self,
        session_id: &SessionId,
        user_id: &str,
    ) -> Result<Session, SessionError> {
        let mut session = self
            .get_session_in_state(session_id, SessionState::RemoteAttached)
            .await?;
        let expected = session.version();

        session.attach_user(user_id)?;
        self.persist(&session, expected, "persist user binding").await?;

        tracing::info!(%session_id, "user attached");
        Ok(session)
    }

    /// Issues a single-use key that redeems to `session_id`.
    ///
    /// Does not change the session.
    ///
    /// # Errors
    /// - [`SessionError::SessionNotFound`] if the session doesn't exist.
    /// - [`SessionError::Generation`] if the generator fails.
    /// - [`SessionError::Storage`] if the key cannot be persisted.
    pub async fn new_session_key(
        &self,
        session_id: &SessionId,
    ) -> Result<String, SessionError> {
        self.load(session_id).await?;

        let key = self.generator.generate()?;
        let record =
            SessionKey::new(key.clone(), session_id.clone(), self.config.key_ttl);

        self.bounded(self.keys.create(&record))
            .await
            .map_err(|e| SessionError::storage("create session key", e))?;

        tracing::debug!(%session_id, "session key issued");
        Ok(key)
    }

    /// Redeems a session key, returning the session it points to.
    ///
    /// The key is consumed whether or not it had expired; it can never be
    /// redeemed again.
    ///
    /// # Errors
    /// - [`SessionError::KeyNotFound`] if the key is unknown or spent.
    /// - [`SessionError::KeyExpired`] if the key outlived its TTL.
    pub async fn exchange_key(&self, key: &str) -> Result<SessionId, SessionError> {
        match self.bounded(self.keys.consume(key)).await {
            Ok(session_id) => {
                tracing::info!(%session_id, "session key redeemed");
                Ok(session_id)
            }
            Err(StoreError::NotFound) => {
                tracing::warn!("unknown or spent session key presented");
                Err(SessionError::KeyNotFound)
            }
            Err(StoreError::Expired) => {
                tracing::warn!("expired session key presented");
                Err(SessionError::KeyExpired)
            }
            Err(e) => Err(SessionError::storage("consume session key", e)),
        }
    }

    /// Loads a session regardless of its state.
    ///
    /// # Errors
    /// [`SessionError::SessionNotFound`] if the session doesn't exist.
    pub async fn get(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        self.load(session_id).await
    }

    /// Terminates the session and returns the snapshot taken just before
    /// the kill, so the caller can finish building its response from the
    /// client state and bound identity.
    ///
    /// Killing an already-dead session writes nothing and returns the
    /// stored (dead) snapshot. Of several concurrent kills, the losers
    /// also succeed with the snapshot they read.
    ///
    /// # Errors
    /// - [`SessionError::SessionNotFound`] if the session doesn't exist.
    /// - [`SessionError::Conflict`] if the session changed concurrently
    ///   and is still alive.
    pub async fn kill(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        let mut session = self.load(session_id).await?;
        let snapshot = session.clone();

        if !session.kill() {
            tracing::debug!(%session_id, "session already dead");
            return Ok(snapshot);
        }
        match self
            .persist(&session, snapshot.version(), "persist killed session")
            .await
        {
            Ok(()) => {}
            Err(SessionError::Conflict(_)) => {
                return self.explain_lost_kill(session_id, snapshot).await;
            }
            Err(e) => return Err(e),
        }

        tracing::info!(%session_id, from = %snapshot.state(), "session killed");
        Ok(snapshot)
    }

    /// Loads a session and checks it is in `want`.
    ///
    /// # Errors
    /// - [`SessionError::SessionNotFound`] if the session doesn't exist.
    /// - [`SessionError::WrongState`] if it is in any other state.
    pub(crate) async fn get_session_in_state(
        &self,
        session_id: &SessionId,
        want: SessionState,
    ) -> Result<Session, SessionError> {
        let session = self.load(session_id).await?;
        session.require_state(want)?;
        Ok(session)
    }

    // -- Store plumbing ---------------------------------------------------

    async fn load(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        match self.bounded(self.sessions.get(session_id)).await {
            Ok(session) => Ok(session),
            Err(StoreError::NotFound) => {
                tracing::debug!(%session_id, "session not found");
                Err(SessionError::SessionNotFound(session_id.clone()))
            }
            Err(e) => Err(SessionError::storage("load session", e)),
        }
    }

    /// Conditional write: succeeds only if the stored version is still
    /// `expected`.
    async fn persist(
        &self,
        session: &Session,
        expected: u64,
        context: &'static str,
    ) -> Result<(), SessionError> {
        match self
            .bounded(self.sessions.update_if_version(session, expected))
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::VersionMismatch { actual, .. }) => {
                tracing::warn!(
                    session_id = %session.id(),
                    expected,
                    actual,
                    "lost race on session update"
                );
                Err(SessionError::Conflict(session.id().clone()))
            }
            Err(StoreError::NotFound) => {
                Err(SessionError::SessionNotFound(session.id().clone()))
            }
            Err(e) => Err(SessionError::storage(context, e)),
        }
    }

    /// After losing the conditional write on attach, re-reads the session
    /// to report why: someone else bound an identity, someone killed it,
    /// or something else moved the version.
    async fn explain_lost_attach(&self, session_id: &SessionId) -> SessionError {
        match self.load(session_id).await {
            Ok(current) if current.has_identity() => {
                SessionError::AlreadyAttached(session_id.clone())
            }
            Ok(current) => match current.require_state(SessionState::New) {
                Err(e) => e,
                Ok(()) => SessionError::Conflict(session_id.clone()),
            },
            Err(e) => e,
        }
    }

    /// After losing the conditional write on kill: if a concurrent kill
    /// won, the session is dead either way and the caller gets its
    /// snapshot. Anything else is a real conflict.
    async fn explain_lost_kill(
        &self,
        session_id: &SessionId,
        snapshot: Session,
    ) -> Result<Session, SessionError> {
        let current = self.load(session_id).await?;
        if current.state().is_terminal() {
            tracing::debug!(%session_id, "session killed concurrently");
            Ok(snapshot)
        } else {
            Err(SessionError::Conflict(session_id.clone()))
        }
    }

    /// Applies the configured store deadline, if any.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.config.store_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => call.await,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
