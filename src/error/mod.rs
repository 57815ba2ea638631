//! YNAB Error Types
//!
//! Error hierarchy for the OAuth token lifecycle, token storage and API requests.

mod api;

pub use api::*;

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Root error type for the YNAB client core.
#[derive(Error, Debug)]
pub enum YnabError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthErrorResponse),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

impl YnabError {
    /// Get error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "YNAB_CONFIG",
            Self::OAuth(_) => "YNAB_OAUTH",
            Self::Authorization(_) => "YNAB_AUTH",
            Self::Token(_) => "YNAB_TOKEN",
            Self::Storage(_) => "YNAB_STORAGE",
            Self::Network(_) => "YNAB_NETWORK",
            Self::Protocol(_) => "YNAB_PROTOCOL",
            Self::Provider(_) => "YNAB_PROVIDER",
            Self::Api(_) => "YNAB_API",
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::OAuth(e) => matches!(
                e.code(),
                OAuthErrorCode::ServerError | OAuthErrorCode::TemporarilyUnavailable
            ),
            Self::Provider(ProviderError::HttpStatus { status, .. }) => *status >= 500,
            Self::Api(e) => e.is_retryable(),
            Self::Token(TokenError::RefreshFailed(source)) => source.is_retryable(),
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network(NetworkError::Timeout { timeout }) => Some(*timeout),
            _ => None,
        }
    }

    /// Check if error requires the user to authorize again.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Token(TokenError::NotAvailable) => true,
            Self::Token(TokenError::Expired) => true,
            Self::Token(TokenError::NoRefreshToken) => true,
            Self::Token(TokenError::RefreshFailed(source)) => {
                source.oauth_error().is_some() || source.needs_reauth()
            }
            Self::OAuth(e) => matches!(
                e.code(),
                OAuthErrorCode::InvalidGrant
                    | OAuthErrorCode::InvalidClient
                    | OAuthErrorCode::AccessDenied
            ),
            Self::Api(e) => e.is_unauthorized(),
            _ => false,
        }
    }

    /// Find the structured OAuth error anywhere in the source chain.
    pub fn oauth_error(&self) -> Option<&OAuthErrorResponse> {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(YnabError::OAuth(response)) = err.downcast_ref::<YnabError>() {
                return Some(response);
            }
            if let Some(response) = err.downcast_ref::<OAuthErrorResponse>() {
                return Some(response);
            }
            current = err.source();
        }
        None
    }

    /// Get the API error when the request reached the YNAB API.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid redirect URI {uri}: {message}")]
    InvalidRedirectUri { uri: String, message: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Authorization callback error.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { expected: String, received: String },

    #[error("Invalid callback URL: {message}")]
    InvalidCallbackUrl { message: String },

    #[error("No authorization code in callback")]
    MissingCode,

    #[error("No access token in callback")]
    MissingAccessToken,

    #[error("No authorization code or access token found in callback")]
    MissingCallbackParameters,
}

/// Token lifecycle error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No token available")]
    NotAvailable,

    #[error("Token expired and cannot be refreshed")]
    Expired,

    #[error("Token cannot be refreshed")]
    NoRefreshToken,

    #[error("Failed to refresh token: {0}")]
    RefreshFailed(#[source] Box<YnabError>),

    #[error("Token provider does not support refresh")]
    RefreshUnsupported,
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No token stored")]
    Empty,

    #[error("Token file not found: {path}")]
    NotFound { path: String },

    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    #[error("Decryption failed: {message}")]
    DecryptionFailed { message: String },
}

/// Token endpoint failure that carried no OAuth error body.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Token endpoint returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Result type for YNAB operations.
pub type YnabResult<T> = Result<T, YnabError>;

/// OAuth error reported by the provider, either in a callback or a token response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthErrorResponse {
    /// Create an error response with only an error code.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
            error_uri: None,
        }
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// Classify the error code.
    pub fn code(&self) -> OAuthErrorCode {
        OAuthErrorCode::from(self.error.as_str())
    }
}

impl fmt::Display for OAuthErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

impl StdError for OAuthErrorResponse {}

/// Known OAuth error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    UnsupportedResponseType,
    InvalidScope,
    AccessDenied,
    ServerError,
    TemporarilyUnavailable,
    Other,
}

impl From<&str> for OAuthErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "invalid_scope" => Self::InvalidScope,
            "access_denied" => Self::AccessDenied,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            _ => Self::Other,
        }
    }
}

/// Parse an OAuth error body, if the body carries one.
pub fn parse_oauth_error(body: &str) -> Option<OAuthErrorResponse> {
    serde_json::from_str::<OAuthErrorResponse>(body)
        .ok()
        .filter(|response| !response.error.is_empty())
}

/// Get user-friendly error message.
pub fn get_user_message(error: &YnabError) -> String {
    match error {
        YnabError::Token(TokenError::NotAvailable) => {
            "You are not signed in. Please authorize the application.".to_string()
        }
        YnabError::Token(TokenError::Expired) | YnabError::Token(TokenError::NoRefreshToken) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        YnabError::Token(TokenError::RefreshFailed(_)) => {
            "Failed to refresh your session. Please sign in again.".to_string()
        }
        YnabError::OAuth(e) if e.code() == OAuthErrorCode::AccessDenied => {
            "Access was denied. Please try signing in again and grant the requested permissions."
                .to_string()
        }
        YnabError::Authorization(AuthorizationError::StateMismatch { .. }) => {
            "Security validation failed. Please restart the sign-in process.".to_string()
        }
        YnabError::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        YnabError::Api(e) if e.is_rate_limit() => {
            "Too many requests. Please wait a moment and try again.".to_string()
        }
        YnabError::Api(e) if e.is_account_error() => {
            "Your YNAB subscription is inactive. Please renew it to continue.".to_string()
        }
        _ => "A YNAB client error occurred. Please try again.".to_string(),
    }
}
