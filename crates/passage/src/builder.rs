//! `SessionManagerBuilder`: wires config, generator, and stores together.

use std::time::Duration;

use passage_session::{
    CodeGenerator, MemSessionKeyStore, MemSessionStore, RandomCodeGenerator,
    SessionConfig, SessionKeyStore, SessionManager, SessionStore,
};

/// Builder for a [`SessionManager`].
///
/// The stores are arguments to [`build`](Self::build) rather than optional
/// settings, so a manager without storage cannot be constructed.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use passage::prelude::*;
///
/// let manager = SessionManagerBuilder::new()
///     .key_ttl(Duration::from_secs(60))
///     .store_timeout(Duration::from_secs(2))
///     .build(MemSessionStore::new(), MemSessionKeyStore::new());
///
/// assert_eq!(manager.config().key_ttl, Duration::from_secs(60));
/// ```
pub struct SessionManagerBuilder<G = RandomCodeGenerator> {
    config: SessionConfig,
    generator: G,
}

impl SessionManagerBuilder {
    /// Creates a builder with default config and the OS-random generator.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            generator: RandomCodeGenerator::default(),
        }
    }
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: CodeGenerator> SessionManagerBuilder<G> {
    /// Replaces the whole session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how long sessions stay valid.
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    /// Sets how long issued session keys stay redeemable.
    pub fn key_ttl(mut self, ttl: Duration) -> Self {
        self.config.key_ttl = ttl;
        self
    }

    /// Bounds every store call by `limit`.
    pub fn store_timeout(mut self, limit: Duration) -> Self {
        self.config.store_timeout = Some(limit);
        self
    }

    /// Swaps in a different code generator.
    pub fn generator<G2: CodeGenerator>(
        self,
        generator: G2,
    ) -> SessionManagerBuilder<G2> {
        SessionManagerBuilder {
            config: self.config,
            generator,
        }
    }

    /// Builds the manager over the given stores.
    pub fn build<S, K>(self, sessions: S, keys: K) -> SessionManager<S, K, G>
    where
        S: SessionStore,
        K: SessionKeyStore,
    {
        tracing::info!(
            session_ttl_secs = self.config.session_ttl.as_secs(),
            key_ttl_secs = self.config.key_ttl.as_secs(),
            store_timeout = ?self.config.store_timeout,
            "session manager configured"
        );
        SessionManager::new(self.config, sessions, keys, self.generator)
    }

    /// Builds the manager over fresh in-memory stores.
    pub fn build_in_memory(
        self,
    ) -> SessionManager<MemSessionStore, MemSessionKeyStore, G> {
        self.build(MemSessionStore::new(), MemSessionKeyStore::new())
    }
}
