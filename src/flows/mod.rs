//! OAuth2 Flows
//!
//! Authorization flows supported by the YNAB provider.
//!
//! - **Authorization Code Flow**: server-side applications; tokens are refreshable
//! - **Implicit Grant Flow**: clients that cannot hold a secret; tokens are not refreshable

pub mod authorization_code;
pub mod implicit;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::generate_state;
use crate::error::{AuthorizationError, YnabError, YnabResult};
use crate::token::TokenManager;
use crate::types::{CallbackResult, ResponseType, Token};

pub use authorization_code::AuthorizationCodeFlow;
pub use implicit::ImplicitGrantFlow;

/// An authorization flow.
#[async_trait]
pub trait Flow: Send + Sync {
    /// Response type requested from the authorization endpoint.
    fn response_type(&self) -> ResponseType;

    /// Build the URL the user is sent to. Fails if the configuration is invalid.
    fn authorization_url(&self, state: &str) -> YnabResult<String>;

    /// Turn the redirect back into a token.
    ///
    /// An empty `expected_state` disables the state check.
    async fn handle_callback(&self, callback_url: &str, expected_state: &str) -> YnabResult<Token>;
}

/// Pick a flow for the client type.
///
/// `_needs_refresh_token` does not influence the result: server-side clients
/// always get the authorization code flow, others the implicit flow.
pub fn recommend_flow(is_server_side: bool, _needs_refresh_token: bool) -> ResponseType {
    if is_server_side {
        ResponseType::Code
    } else {
        ResponseType::Token
    }
}

/// Parse a callback, reporting an absent result as the flow-specific error.
pub(crate) fn parse_callback(
    callback_url: &str,
    default_expires_in: u64,
    missing: AuthorizationError,
) -> YnabResult<CallbackResult> {
    match CallbackResult::parse_with_default(callback_url, default_expires_in) {
        Err(YnabError::Authorization(AuthorizationError::MissingCallbackParameters)) => {
            Err(missing.into())
        }
        other => other,
    }
}

/// Runs both flows against a shared [`TokenManager`] and installs the result.
pub struct FlowManager {
    manager: Arc<TokenManager>,
    authorization_code: AuthorizationCodeFlow,
    implicit: ImplicitGrantFlow,
}

impl FlowManager {
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self {
            authorization_code: AuthorizationCodeFlow::new(manager.clone()),
            implicit: ImplicitGrantFlow::new(manager.config().clone())
                .with_default_expires_in(manager.manager_config().default_expires_in),
            manager,
        }
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.manager
    }

    pub fn authorization_code(&self) -> &AuthorizationCodeFlow {
        &self.authorization_code
    }

    pub fn implicit_grant(&self) -> &ImplicitGrantFlow {
        &self.implicit
    }

    /// Select a flow by response type.
    pub fn flow(&self, response_type: ResponseType) -> &dyn Flow {
        match response_type {
            ResponseType::Code => &self.authorization_code,
            ResponseType::Token => &self.implicit,
        }
    }

    /// Generate a state and the authorization URL. Returns `(url, state)`.
    pub fn start(&self, response_type: ResponseType) -> YnabResult<(String, String)> {
        let state = generate_state();
        let url = self.flow(response_type).authorization_url(&state)?;
        Ok((url, state))
    }

    pub fn start_authorization_code_flow(&self) -> YnabResult<(String, String)> {
        self.start(ResponseType::Code)
    }

    pub fn start_implicit_grant_flow(&self) -> YnabResult<(String, String)> {
        self.start(ResponseType::Token)
    }

    /// Handle the callback and install the token in the manager.
    pub async fn complete(
        &self,
        response_type: ResponseType,
        callback_url: &str,
        expected_state: &str,
    ) -> YnabResult<Token> {
        let token = self
            .flow(response_type)
            .handle_callback(callback_url, expected_state)
            .await?;
        self.manager.set_token(token.clone()).await?;
        tracing::info!(
            response_type = response_type.as_str(),
            refreshable = token.can_refresh(),
            "Authorization completed"
        );
        Ok(token)
    }

    pub async fn complete_authorization_code_flow(
        &self,
        callback_url: &str,
        expected_state: &str,
    ) -> YnabResult<Token> {
        self.complete(ResponseType::Code, callback_url, expected_state)
            .await
    }

    pub async fn complete_implicit_grant_flow(
        &self,
        callback_url: &str,
        expected_state: &str,
    ) -> YnabResult<Token> {
        self.complete(ResponseType::Token, callback_url, expected_state)
            .await
    }
}

impl std::fmt::Debug for FlowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowManager")
            .field("manager", &self.manager)
            .finish()
    }
}
