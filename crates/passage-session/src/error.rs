//! Error types for the session layer.
//!
//! Three enums, one per boundary:
//!
//! - [`SessionError`]: what the manager reports to its caller.
//! - [`StoreError`]: what a storage backend reports to the manager.
//! - [`GenerationError`]: what a code generator reports to the manager.
//!
//! Every failure is a typed, recoverable value. The manager never retries;
//! it reports the specific [`ErrorKind`] and lets the protocol layer decide
//! on the outward response.

use std::fmt;
use std::time::Duration;

use crate::{SessionId, SessionState};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors returned by [`SessionManager`](crate::SessionManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists under this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The session key is unknown or has already been redeemed.
    #[error("session key not found")]
    KeyNotFound,

    /// A remote identity is already bound to this session.
    /// The stored identity is left untouched.
    #[error("session {0} already has a remote identity attached")]
    AlreadyAttached(SessionId),

    /// The session is not in the lifecycle state the operation requires.
    #[error("session {id} is in state {actual}, expected {expected}")]
    WrongState {
        id: SessionId,
        expected: SessionState,
        actual: SessionState,
    },

    /// The session key outlived its TTL before being redeemed.
    #[error("session key expired")]
    KeyExpired,

    /// The stored session changed between read and conditional write.
    #[error("concurrent update to session {0}")]
    Conflict(SessionId),

    /// The code generator could not produce a value.
    #[error("code generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// A storage backend call failed.
    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl SessionError {
    /// Wraps a backend failure with a short description of what was
    /// being attempted.
    pub fn storage(context: &'static str, source: StoreError) -> Self {
        Self::Storage { context, source }
    }

    /// Returns the coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) | Self::KeyNotFound => ErrorKind::NotFound,
            Self::AlreadyAttached(_) => ErrorKind::AlreadyAttached,
            Self::WrongState { .. } => ErrorKind::WrongState,
            Self::KeyExpired => ErrorKind::Expired,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Generation(_) => ErrorKind::GenerationFailure,
            Self::Storage { .. } => ErrorKind::StorageFailure,
        }
    }
}

/// Coarse error categories, for mapping onto outward responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyAttached,
    WrongState,
    Expired,
    Conflict,
    GenerationFailure,
    StorageFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::AlreadyAttached => "already_attached",
            Self::WrongState => "wrong_state",
            Self::Expired => "expired",
            Self::Conflict => "conflict",
            Self::GenerationFailure => "generation_failure",
            Self::StorageFailure => "storage_failure",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors reported by [`SessionStore`](crate::SessionStore) and
/// [`SessionKeyStore`](crate::SessionKeyStore) implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record under the requested key.
    #[error("record not found")]
    NotFound,

    /// A record with this key already exists.
    #[error("record already exists")]
    AlreadyExists,

    /// The record was found but its TTL has elapsed.
    #[error("record expired")]
    Expired,

    /// A conditional update was rejected because the stored version moved.
    #[error("version mismatch: expected {expected}, found {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// The call did not complete within the configured deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// Any other backend failure (connection loss, serialization, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// GenerationError
// ---------------------------------------------------------------------------

/// A [`CodeGenerator`](crate::CodeGenerator) failed to produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

impl GenerationError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_not_found_variants() {
        let missing = SessionError::SessionNotFound(SessionId::from("s1"));
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(SessionError::KeyNotFound.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_kind_maps_every_category() {
        let id = SessionId::from("s1");
        assert_eq!(
            SessionError::AlreadyAttached(id.clone()).kind(),
            ErrorKind::AlreadyAttached
        );
        assert_eq!(
            SessionError::WrongState {
                id: id.clone(),
                expected: SessionState::New,
                actual: SessionState::Dead,
            }
            .kind(),
            ErrorKind::WrongState
        );
        assert_eq!(SessionError::KeyExpired.kind(), ErrorKind::Expired);
        assert_eq!(
            SessionError::Conflict(id).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            SessionError::from(GenerationError::new("no entropy")).kind(),
            ErrorKind::GenerationFailure
        );
        assert_eq!(
            SessionError::storage("create session", StoreError::NotFound)
                .kind(),
            ErrorKind::StorageFailure
        );
    }

    #[test]
    fn test_storage_error_message_includes_context() {
        let err = SessionError::storage(
            "persist session",
            StoreError::Backend("connection reset".into()),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("persist session"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_wrong_state_message_names_both_states() {
        let err = SessionError::WrongState {
            id: SessionId::from("abc"),
            expected: SessionState::Dead,
            actual: SessionState::New,
        };
        assert_eq!(
            err.to_string(),
            "session abc is in state New, expected Dead"
        );
    }
}
