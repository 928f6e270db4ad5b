//! Unified error type for the Passage facade.

use passage_session::{GenerationError, SessionError, StoreError};

/// Top-level error that wraps the session crate's errors.
///
/// `#[from]` on each variant lets `?` convert automatically.
#[derive(Debug, thiserror::Error)]
pub enum PassageError {
    /// A session lifecycle error (not found, already attached, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A store error surfaced outside a manager call.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A generator error surfaced outside a manager call.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The tracing subscriber could not be installed.
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
}

#[cfg(test)]
mod tests {
    use passage_session::{ErrorKind, SessionId};

    use super::*;

    #[test]
    fn test_from_session_error() {
        let err = SessionError::SessionNotFound(SessionId::from("gone"));
        let passage_err: PassageError = err.into();
        assert!(matches!(passage_err, PassageError::Session(_)));
        assert!(passage_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_store_error() {
        let passage_err: PassageError = StoreError::Expired.into();
        assert!(matches!(passage_err, PassageError::Store(_)));
    }

    #[test]
    fn test_from_generation_error() {
        let passage_err: PassageError = GenerationError::new("dry").into();
        assert!(matches!(passage_err, PassageError::Generation(_)));
        assert_eq!(passage_err.to_string(), "dry");
    }

    #[test]
    fn test_session_kind_survives_wrapping() {
        let passage_err = PassageError::from(SessionError::KeyExpired);
        match passage_err {
            PassageError::Session(e) => assert_eq!(e.kind(), ErrorKind::Expired),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
