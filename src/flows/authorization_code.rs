//! Authorization Code Flow
//!
//! Server-side grant: the provider redirects back with a code that is exchanged
//! for a refreshable token.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::verify_callback_state;
use crate::error::{AuthorizationError, YnabResult};
use crate::flows::{parse_callback, Flow};
use crate::token::TokenManager;
use crate::types::{CallbackResult, OAuthConfig, ResponseType, Token};

/// Authorization code flow backed by a [`TokenManager`] for the code exchange.
pub struct AuthorizationCodeFlow {
    manager: Arc<TokenManager>,
}

impl AuthorizationCodeFlow {
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self { manager }
    }

    fn config(&self) -> &OAuthConfig {
        self.manager.config()
    }
}

#[async_trait]
impl Flow for AuthorizationCodeFlow {
    fn response_type(&self) -> ResponseType {
        ResponseType::Code
    }

    fn authorization_url(&self, state: &str) -> YnabResult<String> {
        self.config().validate()?;
        Ok(self.config().auth_code_url(state))
    }

    async fn handle_callback(&self, callback_url: &str, expected_state: &str) -> YnabResult<Token> {
        let code = match parse_callback(
            callback_url,
            self.manager.manager_config().default_expires_in,
            AuthorizationError::MissingCode,
        )? {
            CallbackResult::Error { error, .. } => {
                tracing::warn!(error = %error.error, "Authorization denied by provider");
                return Err(error.into());
            }
            CallbackResult::Code { code, state } => {
                verify_callback_state(expected_state, &state)?;
                code
            }
            CallbackResult::Token { .. } => return Err(AuthorizationError::MissingCode.into()),
        };

        if code.is_empty() {
            return Err(AuthorizationError::MissingCode.into());
        }

        tracing::debug!("Exchanging authorization code");
        self.manager.exchange_code(&code).await
    }
}

impl std::fmt::Debug for AuthorizationCodeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeFlow")
            .field("client_id", &self.config().client_id)
            .finish()
    }
}
