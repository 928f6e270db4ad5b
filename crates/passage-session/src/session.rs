//! Session types: the records that represent one authentication attempt.
//!
//! A [`Session`] tracks:
//! - WHO asked (connector, client, echoed client state)
//! - WHAT they asked for (redirect, nonce, scopes, registration flag)
//! - WHERE the attempt is in its lifecycle ([`SessionState`])
//! - WHOM it has been bound to (remote identity, then local user)
//!
//! A [`SessionKey`] is a short-lived, single-use pointer back to a session.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{AuthRequest, Identity, SessionError, SessionId};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a session stays valid after creation.
    ///
    /// Default: 15 minutes.
    pub session_ttl: Duration,

    /// How long an issued session key may wait before redemption.
    ///
    /// Default: 10 minutes.
    pub key_ttl: Duration,

    /// Upper bound on every individual store call. `None` leaves calls
    /// unbounded (the caller can still cancel by dropping the future).
    pub store_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(15 * 60),
            key_ttl: Duration::from_secs(10 * 60),
            store_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// Transitions only move forward:
///
/// ```text
/// New ──→ RemoteAttached ──→ Identified
///  │            │                │
///  └────────────┴────────────────┴──→ Dead
/// ```
///
/// - **New**: created, nothing bound yet.
/// - **RemoteAttached**: an upstream identity has been bound.
/// - **Identified**: the upstream identity has been mapped to a local user.
/// - **Dead**: terminated. Terminal; reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    New,
    RemoteAttached,
    Identified,
    Dead,
}

impl SessionState {
    /// Returns `true` once the session has been killed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead)
    }

    /// The next state along the binding path, if any. `Dead` is not
    /// included: it is entered through [`Session::kill`] only.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::RemoteAttached),
            Self::RemoteAttached => Some(Self::Identified),
            Self::Identified | Self::Dead => None,
        }
    }

    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == Self::Dead || self.next() == Some(target)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::RemoteAttached => write!(f, "RemoteAttached"),
            Self::Identified => write!(f, "Identified"),
            Self::Dead => write!(f, "Dead"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The persisted record of one authentication attempt.
///
/// Fields are private. Request parameters are fixed at construction, and
/// the only mutations are the three lifecycle methods
/// ([`attach_remote_identity`](Self::attach_remote_identity),
/// [`attach_user`](Self::attach_user), [`kill`](Self::kill)), each of which
/// checks the transition and bumps [`version`](Self::version).
///
/// Deserialization re-checks that `state` agrees with which bindings are
/// present, so a backend cannot hand back a record that skips a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord")]
pub struct Session {
    id: SessionId,
    connector_id: String,
    client_id: String,
    client_state: String,
    redirect_url: String,
    nonce: String,
    register: bool,
    scopes: std::collections::BTreeSet<String>,
    state: SessionState,
    identity: Option<Identity>,
    user_id: Option<String>,
    created_at: SystemTime,
    expires_at: SystemTime,
    version: u64,
}

impl Session {
    /// Builds a fresh session in [`SessionState::New`].
    pub fn new(
        id: SessionId,
        request: AuthRequest,
        now: SystemTime,
        ttl: Duration,
    ) -> Self {
        Self {
            id,
            connector_id: request.connector_id,
            client_id: request.client_id,
            client_state: request.client_state,
            redirect_url: request.redirect_url,
            nonce: request.nonce,
            register: request.register,
            scopes: request.scopes,
            state: SessionState::New,
            identity: None,
            user_id: None,
            created_at: now,
            expires_at: now + ttl,
            version: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The caller-supplied correlation value, unchanged since creation.
    pub fn client_state(&self) -> &str {
        &self.client_state
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn register(&self) -> bool {
        self.register
    }

    pub fn scopes(&self) -> &std::collections::BTreeSet<String> {
        &self.scopes
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The bound upstream identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The bound local user, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Optimistic-concurrency counter. Starts at 0 and increases by one
    /// with every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` if a remote identity has been bound.
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Returns `true` if `now` is at or past the session's expiry.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Binds the upstream identity. Write-once.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyAttached`] if an identity is already bound
    ///   (checked first, so a killed session that had an identity still
    ///   reports this).
    /// - [`SessionError::WrongState`] if the session is not `New`.
    pub fn attach_remote_identity(
        &mut self,
        identity: Identity,
    ) -> Result<(), SessionError> {
        if self.identity.is_some() {
            return Err(SessionError::AlreadyAttached(self.id.clone()));
        }
        self.require_state(SessionState::New)?;
        self.identity = Some(identity);
        self.advance(SessionState::RemoteAttached);
        Ok(())
    }

    /// Binds the local user id that the remote identity maps to.
    ///
    /// # Errors
    /// [`SessionError::WrongState`] unless the session is `RemoteAttached`.
    pub fn attach_user(
        &mut self,
        user_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.require_state(SessionState::RemoteAttached)?;
        self.user_id = Some(user_id.into());
        self.advance(SessionState::Identified);
        Ok(())
    }

    /// Moves the session to `Dead`.
    ///
    /// Returns `false` (and changes nothing) if it was already dead.
    pub fn kill(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.advance(SessionState::Dead);
        true
    }

    /// Fails with [`SessionError::WrongState`] unless `state == want`.
    pub fn require_state(&self, want: SessionState) -> Result<(), SessionError> {
        if self.state == want {
            Ok(())
        } else {
            Err(SessionError::WrongState {
                id: self.id.clone(),
                expected: want,
                actual: self.state,
            })
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(self.state.can_transition_to(next));
        self.state = next;
        self.version += 1;
    }
}

/// Wire shape of [`Session`], validated on the way in.
#[derive(Deserialize)]
struct SessionRecord {
    id: SessionId,
    connector_id: String,
    client_id: String,
    client_state: String,
    redirect_url: String,
    nonce: String,
    register: bool,
    scopes: std::collections::BTreeSet<String>,
    state: SessionState,
    identity: Option<Identity>,
    user_id: Option<String>,
    created_at: SystemTime,
    expires_at: SystemTime,
    version: u64,
}

impl TryFrom<SessionRecord> for Session {
    type Error = String;

    fn try_from(r: SessionRecord) -> Result<Self, Self::Error> {
        let has_identity = r.identity.is_some();
        let has_user = r.user_id.is_some();
        let consistent = match r.state {
            SessionState::New => !has_identity && !has_user,
            SessionState::RemoteAttached => has_identity && !has_user,
            SessionState::Identified => has_identity && has_user,
            SessionState::Dead => has_identity || !has_user,
        };
        if !consistent {
            return Err(format!(
                "session {} in state {} has inconsistent bindings",
                r.id, r.state
            ));
        }

        Ok(Self {
            id: r.id,
            connector_id: r.connector_id,
            client_id: r.client_id,
            client_state: r.client_state,
            redirect_url: r.redirect_url,
            nonce: r.nonce,
            register: r.register,
            scopes: r.scopes,
            state: r.state,
            identity: r.identity,
            user_id: r.user_id,
            created_at: r.created_at,
            expires_at: r.expires_at,
            version: r.version,
        })
    }
}

// ---------------------------------------------------------------------------
// SessionKey
// ---------------------------------------------------------------------------

/// A single-use token that redeems to exactly one session id.
///
/// Expiry uses Tokio's monotonic clock so tests can drive it with
/// `tokio::time::pause()` / `advance()`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    key: String,
    session_id: SessionId,
    expires_at: Instant,
}

impl SessionKey {
    /// Creates a key that expires `ttl` from now.
    pub fn new(key: String, session_id: SessionId, ttl: Duration) -> Self {
        Self {
            key,
            session_id,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns `true` if `now` is at or past the key's expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// The key is a bearer secret; keep it out of logs.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
