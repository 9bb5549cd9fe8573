//! Bearer credentials supplied to the chat core.
//!
//! Tokens are issued elsewhere (the marketplace login flow); the core only
//! carries them. The same token authenticates the live channel handshake and
//! every snapshot request.

use secrecy::{ExposeSecret, Secret};
use std::fmt;
use std::sync::RwLock;

use super::ValidationError;

/// An opaque bearer token. Never printed.
#[derive(Clone)]
pub struct AuthToken(Secret<String>);

impl AuthToken {
    /// Wraps a raw token, returning error if empty.
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ValidationError::empty_field("token"));
        }
        Ok(Self(Secret::new(token)))
    }

    /// Exposes the raw token for placing it on the wire.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<Secret<String>> for AuthToken {
    fn from(secret: Secret<String>) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Holds the credential supplied at `connect` time.
///
/// Shared between the connection manager (which stores it) and the snapshot
/// client (which attaches it to requests). It outlives a disconnect so the
/// request/response fallback keeps working while the live channel is down.
#[derive(Debug, Default)]
pub struct CredentialStore {
    token: RwLock<Option<AuthToken>>,
}

impl CredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a token.
    pub fn with_token(token: AuthToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    /// Replaces the stored token.
    pub fn set(&self, token: AuthToken) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token);
    }

    /// Returns the stored token, if any.
    pub fn current(&self) -> Option<AuthToken> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Forgets the stored token.
    pub fn clear(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}
