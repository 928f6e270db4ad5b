//! Identifier and request types shared by the session layer.
//!
//! These are the values that cross the boundary between the protocol
//! layer (above) and the session manager: the opaque session id handed
//! back to the browser as a code, the verified identity produced by an
//! upstream login, and the parameters of the initial auth request.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque primary key of a [`Session`](crate::Session).
///
/// The same string doubles as the code returned from
/// [`SessionManager::new_session`](crate::SessionManager::new_session),
/// so it must come from an unpredictable generator in production.
///
/// Serialized as the bare string (`#[serde(transparent)]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw string as a session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A verified identity produced by an upstream connector.
///
/// The session manager never inspects these fields. It stores the record
/// exactly as handed over and returns it on every read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier at the upstream provider.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Email address as asserted by the upstream provider.
    pub email: String,

    /// Any further claims the connector chose to forward.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub claims: BTreeMap<String, String>,
}

impl Identity {
    /// Creates an identity with no extra claims.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            claims: BTreeMap::new(),
        }
    }

    /// Adds an extra claim, returning the updated identity.
    pub fn with_claim(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// AuthRequest
// ---------------------------------------------------------------------------

/// Parameters of an incoming authentication request.
///
/// Captured verbatim into the new session and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Upstream identity provider chosen for this attempt.
    pub connector_id: String,

    /// Relying application that started the flow.
    pub client_id: String,

    /// Opaque value echoed back to the client for correlation.
    pub client_state: String,

    /// Where the browser is sent once the flow completes.
    pub redirect_url: String,

    /// Replay-protection nonce supplied by the client.
    pub nonce: String,

    /// Whether this attempt is a registration rather than a login.
    pub register: bool,

    /// Requested scopes.
    pub scopes: BTreeSet<String>,
}

impl AuthRequest {
    /// Creates a request for the given connector and client with every
    /// other parameter empty.
    pub fn new(
        connector_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            connector_id: connector_id.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the client state.
    pub fn client_state(mut self, state: impl Into<String>) -> Self {
        self.client_state = state.into();
        self
    }

    /// Sets the redirect URL.
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = url.into();
        self
    }

    /// Sets the nonce.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    /// Marks the request as a registration.
    pub fn register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    /// Replaces the requested scopes.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display_is_raw_string() {
        let id = SessionId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_session_id_serializes_transparently() {
        let id = SessionId::from("boo");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"boo\"");
    }

    #[test]
    fn test_identity_skips_empty_claims() {
        let ident = Identity::new("YYY", "elroy", "elroy@example.com");
        let json = serde_json::to_value(&ident).unwrap();
        assert!(json.get("claims").is_none());

        let ident = ident.with_claim("groups", "admins");
        let json = serde_json::to_value(&ident).unwrap();
        assert_eq!(json["claims"]["groups"], "admins");
    }

    #[test]
    fn test_auth_request_builder_sets_fields() {
        let req = AuthRequest::new("bogus_idpc", "XXX")
            .client_state("bogus")
            .nonce("n-1")
            .register(true)
            .scopes(["openid", "email", "openid"]);

        assert_eq!(req.connector_id, "bogus_idpc");
        assert_eq!(req.client_id, "XXX");
        assert_eq!(req.client_state, "bogus");
        assert_eq!(req.nonce, "n-1");
        assert!(req.register);
        assert!(req.redirect_url.is_empty());
        // Scopes are a set; the duplicate collapses.
        assert_eq!(req.scopes.len(), 2);
    }
}
