//! Implicit Grant Flow
//!
//! Browser-side grant: the token arrives in the redirect fragment and cannot be
//! refreshed.

use async_trait::async_trait;

use crate::core::verify_callback_state;
use crate::error::{AuthorizationError, YnabResult};
use crate::flows::{parse_callback, Flow};
use crate::types::{CallbackResult, OAuthConfig, ResponseType, Token, DEFAULT_EXPIRES_IN};

/// Implicit grant flow. Completing it performs no network I/O.
#[derive(Clone, Debug)]
pub struct ImplicitGrantFlow {
    config: OAuthConfig,
    default_expires_in: u64,
}

impl ImplicitGrantFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            default_expires_in: DEFAULT_EXPIRES_IN,
        }
    }

    /// Lifetime applied when the fragment carries an unreadable `expires_in`.
    pub fn with_default_expires_in(mut self, default_expires_in: u64) -> Self {
        self.default_expires_in = default_expires_in;
        self
    }
}

#[async_trait]
impl Flow for ImplicitGrantFlow {
    fn response_type(&self) -> ResponseType {
        ResponseType::Token
    }

    fn authorization_url(&self, state: &str) -> YnabResult<String> {
        self.config.validate()?;
        Ok(self.config.implicit_grant_url(state))
    }

    async fn handle_callback(&self, callback_url: &str, expected_state: &str) -> YnabResult<Token> {
        let result = parse_callback(
            callback_url,
            self.default_expires_in,
            AuthorizationError::MissingAccessToken,
        )?;

        if let CallbackResult::Error { error, .. } = result {
            tracing::warn!(error = %error.error, "Authorization denied by provider");
            return Err(error.into());
        }

        verify_callback_state(expected_state, result.state())?;

        let token = result
            .to_token()
            .ok_or(AuthorizationError::MissingAccessToken)?;

        tracing::debug!(expires_in = token.expires_in, "Implicit grant completed");
        Ok(token)
    }
}
