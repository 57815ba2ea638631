//! YNAB API errors and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 400 Bad Request.
pub const ERROR_BAD_REQUEST: &str = "400";
/// 401 Unauthorized.
pub const ERROR_UNAUTHORIZED: &str = "401";
/// Subscription for the account has lapsed.
pub const ERROR_SUBSCRIPTION_LAPSED: &str = "403.1";
/// Trial for the account has expired.
pub const ERROR_TRIAL_EXPIRED: &str = "403.2";
/// Access token scope does not allow access.
pub const ERROR_UNAUTHORIZED_SCOPE: &str = "403.3";
/// Request would exceed data limits.
pub const ERROR_DATA_LIMIT_REACHED: &str = "403.4";
/// Specified URI does not exist.
pub const ERROR_NOT_FOUND: &str = "404.1";
/// Requested resource does not exist.
pub const ERROR_RESOURCE_NOT_FOUND: &str = "404.2";
/// Resource conflicts with an existing one.
pub const ERROR_CONFLICT: &str = "409";
/// Too many requests in the rolling window.
pub const ERROR_RATE_LIMIT: &str = "429";
/// Unexpected API error.
pub const ERROR_INTERNAL_SERVER: &str = "500";
/// API temporarily disabled or request timed out.
pub const ERROR_SERVICE_UNAVAILABLE: &str = "503";

/// Error returned by the YNAB API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub id: String,
    pub name: String,
    pub detail: String,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

impl ApiError {
    /// Build an error from an HTTP status and response body.
    ///
    /// Falls back to an `unknown_api_error` keyed by the status code when the
    /// body is not a YNAB error envelope.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorEnvelope>(body) {
            Ok(envelope) => envelope.error,
            Err(_) => Self {
                id: status.to_string(),
                name: "unknown_api_error".to_string(),
                detail: "Unknown API error".to_string(),
            },
        }
    }

    pub fn is_subscription_lapsed(&self) -> bool {
        self.id == ERROR_SUBSCRIPTION_LAPSED
    }

    pub fn is_trial_expired(&self) -> bool {
        self.id == ERROR_TRIAL_EXPIRED
    }

    /// Account or subscription problem.
    pub fn is_account_error(&self) -> bool {
        self.is_subscription_lapsed() || self.is_trial_expired()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.id == ERROR_UNAUTHORIZED
    }

    pub fn is_unauthorized_scope(&self) -> bool {
        self.id == ERROR_UNAUTHORIZED_SCOPE
    }

    pub fn is_authentication_error(&self) -> bool {
        self.is_unauthorized() || self.is_unauthorized_scope()
    }

    pub fn is_not_found(&self) -> bool {
        self.id == ERROR_NOT_FOUND || self.id == ERROR_RESOURCE_NOT_FOUND
    }

    pub fn is_conflict(&self) -> bool {
        self.id == ERROR_CONFLICT
    }

    pub fn is_data_limit_reached(&self) -> bool {
        self.id == ERROR_DATA_LIMIT_REACHED
    }

    pub fn is_rate_limit(&self) -> bool {
        self.id == ERROR_RATE_LIMIT
    }

    pub fn is_internal_server_error(&self) -> bool {
        self.id == ERROR_INTERNAL_SERVER
    }

    pub fn is_service_unavailable(&self) -> bool {
        self.id == ERROR_SERVICE_UNAVAILABLE
    }

    /// Any 4xx error id.
    pub fn is_client_error(&self) -> bool {
        self.id.starts_with('4')
    }

    /// Any 5xx error id.
    pub fn is_server_error(&self) -> bool {
        self.id.starts_with('5')
    }

    /// The request might succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limit() || self.is_internal_server_error() || self.is_service_unavailable()
    }

    pub fn is_validation_error(&self) -> bool {
        self.id == ERROR_BAD_REQUEST
    }

    /// The user has to act (renew, reauthorize, free up data) before retrying.
    pub fn requires_user_action(&self) -> bool {
        self.is_account_error() || self.is_authentication_error() || self.is_data_limit_reached()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "api: error id={} name={} detail={}",
            self.id, self.name, self.detail
        )
    }
}

impl std::error::Error for ApiError {}
