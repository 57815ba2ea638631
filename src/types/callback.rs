//! Callback Types
//!
//! Parsing of the authorization redirect back to the application.

use url::Url;

use crate::error::{AuthorizationError, OAuthErrorResponse, YnabResult};
use crate::types::{Token, DEFAULT_EXPIRES_IN, TOKEN_TYPE_BEARER};

/// Outcome of an authorization redirect. Exactly one shape is present.
#[derive(Clone, Debug, PartialEq)]
pub enum CallbackResult {
    /// Authorization code flow succeeded.
    Code { code: String, state: String },
    /// Implicit grant flow succeeded.
    Token {
        access_token: String,
        token_type: String,
        expires_in: Option<u64>,
        scope: Option<String>,
        state: String,
    },
    /// The provider reported an error.
    Error {
        error: OAuthErrorResponse,
        state: String,
    },
}

impl CallbackResult {
    /// Parse a callback URL.
    ///
    /// Query parameters are checked first (`error`, then `code`). The fragment is
    /// consulted only when neither is present, and a `state` found there takes
    /// precedence over the query's.
    pub fn parse(callback_url: &str) -> YnabResult<Self> {
        Self::parse_with_default(callback_url, DEFAULT_EXPIRES_IN)
    }

    /// Parse a callback URL, using `default_expires_in` for a fragment
    /// `expires_in` that is present but not a number.
    pub fn parse_with_default(callback_url: &str, default_expires_in: u64) -> YnabResult<Self> {
        let url = Url::parse(callback_url).map_err(|e| AuthorizationError::InvalidCallbackUrl {
            message: e.to_string(),
        })?;

        let query = Params::from_pairs(url.query_pairs());
        let mut state = query.get("state").unwrap_or_default();

        if let Some(error) = query.oauth_error() {
            return Ok(Self::Error { error, state });
        }

        if let Some(code) = query.get("code") {
            return Ok(Self::Code { code, state });
        }

        if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
            let fragment = Params::from_pairs(url::form_urlencoded::parse(fragment.as_bytes()));
            if let Some(fragment_state) = fragment.get("state") {
                state = fragment_state;
            }

            if let Some(error) = fragment.oauth_error() {
                return Ok(Self::Error { error, state });
            }

            if let Some(access_token) = fragment.get("access_token") {
                return Ok(Self::Token {
                    access_token,
                    token_type: fragment
                        .get("token_type")
                        .unwrap_or_else(|| TOKEN_TYPE_BEARER.to_string()),
                    expires_in: fragment
                        .get("expires_in")
                        .map(|v| v.parse::<u64>().unwrap_or(default_expires_in)),
                    scope: fragment.get("scope"),
                    state,
                });
            }
        }

        Err(AuthorizationError::MissingCallbackParameters.into())
    }

    /// State echoed back by the provider, empty if none.
    pub fn state(&self) -> &str {
        match self {
            Self::Code { state, .. } | Self::Token { state, .. } | Self::Error { state, .. } => {
                state
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Build a token from an implicit grant result.
    pub fn to_token(&self) -> Option<Token> {
        match self {
            Self::Token {
                access_token,
                token_type,
                expires_in,
                scope,
                ..
            } => {
                let mut token = Token::new(access_token.clone()).with_token_type(token_type.clone());
                token.scope = scope.clone();
                if let Some(secs) = expires_in.filter(|secs| *secs > 0) {
                    token.set_expiration(secs);
                }
                Some(token)
            }
            _ => None,
        }
    }
}

/// Non-empty parameter values keyed by name; the first occurrence wins.
struct Params(Vec<(String, String)>);

impl Params {
    fn from_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    ) -> Self {
        Self(
            pairs
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    }

    fn oauth_error(&self) -> Option<OAuthErrorResponse> {
        self.get("error").map(|error| OAuthErrorResponse {
            error,
            error_description: self.get("error_description"),
            error_uri: self.get("error_uri"),
        })
    }
}
