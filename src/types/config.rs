//! Configuration Types
//!
//! OAuth client configuration for the YNAB authorization server.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::state;
use crate::error::{ConfigurationError, YnabError, YnabResult};
use crate::types::CallbackResult;

/// YNAB authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://app.ynab.com/oauth/authorize";

/// YNAB token endpoint.
pub const TOKEN_URL: &str = "https://app.ynab.com/oauth/token";

/// Environment variable holding the OAuth client id.
pub const ENV_CLIENT_ID: &str = "YNAB_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "YNAB_CLIENT_SECRET";
/// Environment variable holding the registered redirect URI.
pub const ENV_REDIRECT_URI: &str = "YNAB_REDIRECT_URI";
/// Environment variable requesting read-only scope when truthy.
pub const ENV_READ_ONLY: &str = "YNAB_READ_ONLY";

/// OAuth permission scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// GET requests only; writes are rejected by the API with 403.
    #[serde(rename = "read-only")]
    ReadOnly,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
        }
    }
}

/// OAuth `response_type` requested from the authorization endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization code flow.
    Code,
    /// Implicit grant flow.
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
        }
    }
}

/// OAuth client configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Registered redirect URI.
    pub redirect_uri: String,
    /// Requested scopes; empty means full access.
    pub scopes: Vec<Scope>,
    /// Authorization endpoint URL.
    pub authorize_url: String,
    /// Token endpoint URL.
    pub token_url: String,
}

impl OAuthConfig {
    /// Create configuration against the YNAB endpoints with full access.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Load configuration from `YNAB_CLIENT_ID`, `YNAB_CLIENT_SECRET`,
    /// `YNAB_REDIRECT_URI` and the optional `YNAB_READ_ONLY`.
    pub fn from_env() -> YnabResult<Self> {
        let var = |name: &str| -> YnabResult<String> {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    YnabError::Configuration(ConfigurationError::MissingRequired {
                        field: name.to_string(),
                    })
                })
        };

        let config = Self::new(
            var(ENV_CLIENT_ID)?,
            var(ENV_CLIENT_SECRET)?,
            var(ENV_REDIRECT_URI)?,
        );

        let read_only = std::env::var(ENV_READ_ONLY)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(if read_only {
            config.with_read_only_scope()
        } else {
            config
        })
    }

    /// Restrict the client to read-only access.
    pub fn with_read_only_scope(mut self) -> Self {
        self.scopes = vec![Scope::ReadOnly];
        self
    }

    /// Replace the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<Scope>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the provider endpoints.
    pub fn with_endpoints(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.scopes.contains(&Scope::ReadOnly)
    }

    /// Scope parameter value; empty for full access, where the parameter is omitted.
    pub fn scope_string(&self) -> &'static str {
        if self.is_read_only() {
            Scope::ReadOnly.as_str()
        } else {
            ""
        }
    }

    /// Authorization URL for the authorization code flow.
    pub fn auth_code_url(&self, state: &str) -> String {
        self.build_authorize_url(ResponseType::Code, state)
    }

    /// Authorization URL for the implicit grant flow.
    pub fn implicit_grant_url(&self, state: &str) -> String {
        self.build_authorize_url(ResponseType::Token, state)
    }

    fn build_authorize_url(&self, response_type: ResponseType, state: &str) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("client_id", &self.client_id);
        query.append_pair("redirect_uri", &self.redirect_uri);
        query.append_pair("response_type", response_type.as_str());

        let scope = self.scope_string();
        if !scope.is_empty() {
            query.append_pair("scope", scope);
        }
        if !state.is_empty() {
            query.append_pair("state", state);
        }

        format!("{}?{}", self.authorize_url, query.finish())
    }

    /// Generate a random CSRF state parameter.
    pub fn generate_state(&self) -> String {
        state::generate_state()
    }

    /// Check a callback state against the expected one; an empty expectation never matches.
    pub fn validate_state(&self, expected: &str, actual: &str) -> bool {
        state::validate_state(expected, actual)
    }

    /// Check a redirect URI against the configured one.
    pub fn validate_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uri == redirect_uri
    }

    /// Parse an authorization callback URL.
    pub fn parse_callback_url(&self, callback_url: &str) -> YnabResult<CallbackResult> {
        CallbackResult::parse(callback_url)
    }

    /// Validate configuration.
    pub fn validate(&self) -> YnabResult<()> {
        fn required(field: &str, value: &str) -> YnabResult<()> {
            if value.is_empty() {
                return Err(ConfigurationError::MissingRequired {
                    field: field.to_string(),
                }
                .into());
            }
            Ok(())
        }

        required("client_id", &self.client_id)?;
        required("client_secret", self.client_secret.expose_secret())?;
        required("redirect_uri", &self.redirect_uri)?;

        Url::parse(&self.redirect_uri).map_err(|e| ConfigurationError::InvalidRedirectUri {
            uri: self.redirect_uri.clone(),
            message: e.to_string(),
        })?;

        required("authorize_url", &self.authorize_url)?;
        required("token_url", &self.token_url)?;
        Ok(())
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}
