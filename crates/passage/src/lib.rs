//! # Passage
//!
//! Session manager for a federated identity provider.
//!
//! Passage tracks each browser authentication attempt from the initial
//! request to termination: it hands out an unpredictable code, binds the
//! verified upstream identity exactly once, issues single-use session
//! keys, and returns the final snapshot when the session is killed. The
//! HTTP layer, the upstream login exchange, and token issuance live
//! elsewhere; this crate is the lifecycle core they call into.
//!
//! ## Quick Start
//!
//! ```rust
//! use passage::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), PassageError> {
//! let manager = SessionManagerBuilder::new().build_in_memory();
//!
//! let request = AuthRequest::new("github", "my-app")
//!     .client_state("xyz")
//!     .scopes(["openid", "email"]);
//! let code = manager.new_session(request).await?;
//!
//! // ... upstream login completes ...
//! let identity = Identity::new("1234", "Ada", "ada@example.com");
//! manager.attach_remote_identity(&code, identity).await?;
//!
//! let key = manager.new_session_key(&code).await?;
//! let session_id = manager.exchange_key(&key).await?;
//!
//! let snapshot = manager.kill(&session_id).await?;
//! assert_eq!(snapshot.client_state(), "xyz");
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
pub mod telemetry;

pub use builder::SessionManagerBuilder;
pub use error::PassageError;

pub use passage_session as session;

/// Everything needed to build and drive a session manager.
pub mod prelude {
    pub use crate::{PassageError, SessionManagerBuilder};
    pub use passage_session::{
        AuthRequest, CodeGenerator, ErrorKind, GenerationError, Identity,
        MemSessionKeyStore, MemSessionStore, RandomCodeGenerator,
        SequenceCodeGenerator, Session, SessionConfig, SessionError,
        SessionId, SessionKey, SessionKeyStore, SessionManager, SessionState,
        SessionStore, StaticCodeGenerator, StoreError,
    };
}
