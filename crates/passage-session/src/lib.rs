//! Authentication session management for Passage.
//!
//! This crate governs one browser authentication attempt from start to
//! finish:
//!
//! 1. **Creation**: [`SessionManager::new_session`] records the request
//!    and returns an unpredictable code
//! 2. **Binding**: the verified upstream [`Identity`] is attached exactly
//!    once, then the local user
//! 3. **Redemption**: a single-use session key is issued and exchanged
//!    for the session id
//! 4. **Termination**: [`SessionManager::kill`] ends the session and
//!    returns its final snapshot
//!
//! # How it fits in the stack
//!
//! ```text
//! Protocol / HTTP layer (above)  ← maps SessionError kinds to responses
//!     ↕
//! Session layer (this crate)     ← lifecycle rules, at-most-once guarantees
//!     ↕
//! Stores (below)                 ← SessionStore / SessionKeyStore backends
//! ```

mod error;
mod generator;
mod manager;
mod memory;
mod session;
mod store;
mod types;

pub use error::{ErrorKind, GenerationError, SessionError, StoreError};
pub use generator::{
    CodeGenerator, DEFAULT_CODE_BYTES, RandomCodeGenerator, SequenceCodeGenerator,
    StaticCodeGenerator,
};
pub use manager::SessionManager;
pub use memory::{MemSessionKeyStore, MemSessionStore};
pub use session::{Session, SessionConfig, SessionKey, SessionState};
pub use store::{SessionKeyStore, SessionStore};
pub use types::{AuthRequest, Identity, SessionId};
