//! Client session configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::domain::foundation::{AuthToken, UserId};

use super::error::ValidationError;

/// Who the client acts as
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// The local participant's user id
    pub user_id: String,

    /// Bearer token issued by the marketplace login flow
    pub token: Option<Secret<String>>,
}

impl SessionConfig {
    /// Local user id as a typed id
    pub fn user_id(&self) -> Result<UserId, ValidationError> {
        UserId::new(self.user_id.clone()).map_err(|_| ValidationError::MissingRequired("USER_ID"))
    }

    /// Configured token, if any. A blank value counts as absent.
    pub fn auth_token(&self) -> Option<AuthToken> {
        self.token
            .as_ref()
            .and_then(|t| AuthToken::new(t.expose_secret().clone()).ok())
    }

    /// Validate session configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.user_id()?;
        Ok(())
    }
}
