//! Token Types
//!
//! OAuth token and token endpoint response definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens are treated as expired this long before their actual expiry.
pub const EXPIRY_BUFFER: std::time::Duration = std::time::Duration::from_secs(300);

/// Token lifetime assumed when the provider omits `expires_in` (2 hours).
pub const DEFAULT_EXPIRES_IN: u64 = 7200;

/// Standard bearer token type.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// OAuth token as held in memory and persisted by token storage.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Access token.
    pub access_token: String,
    /// Refresh token, absent for implicit-grant tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds as reported by the provider.
    #[serde(default)]
    pub expires_in: u64,
    /// Granted scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Absolute expiry; `None` means the token never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// When the token was issued or last had its expiry set.
    pub created_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    TOKEN_TYPE_BEARER.to_string()
}

impl Token {
    /// Create a non-expiring token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_in: 0,
            scope: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Set the token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Set the granted scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the lifetime, see [`Token::set_expiration`].
    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.set_expiration(expires_in);
        self
    }

    /// Set the lifetime in seconds, resetting `created_at` to now.
    ///
    /// A lifetime beyond the representable date range leaves the token
    /// without an expiry.
    pub fn set_expiration(&mut self, expires_in: u64) {
        let now = Utc::now();
        self.expires_in = expires_in;
        self.created_at = now;
        self.expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
    }

    /// Check if token is expired or expires within [`EXPIRY_BUFFER`].
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(EXPIRY_BUFFER)
    }

    /// Check if token expires within the given buffer.
    pub fn is_expired_with_buffer(&self, buffer: std::time::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Duration::from_std(buffer)
                .ok()
                .and_then(|buffer| Utc::now().checked_add_signed(buffer))
                .map_or(true, |deadline| deadline >= expires_at),
            None => false,
        }
    }

    /// Usable for an API request right now.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Check if has a non-empty refresh token.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    /// Get remaining lifetime, `None` for tokens without expiry.
    pub fn remaining_lifetime(&self) -> Option<std::time::Duration> {
        self.expires_at.map(|exp| {
            (exp - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO)
        })
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Token response from the token endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenResponse {
    /// Access token, empty when the provider omitted it.
    #[serde(default)]
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scope.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a token, using `default_expires_in` when the provider
    /// reported no lifetime.
    pub fn into_token(self, default_expires_in: u64) -> Token {
        let expires_in = self
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(default_expires_in);

        let mut token = Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            token_type: self.token_type,
            expires_in: 0,
            scope: self.scope.filter(|s| !s.is_empty()),
            expires_at: None,
            created_at: Utc::now(),
        };
        if expires_in > 0 {
            token.set_expiration(expires_in);
        }
        token
    }
}

/// Grant type sent to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_expiration() {
        let mut token = Token::new("access");
        token.set_expiration(3600);

        assert_eq!(token.expires_in, 3600);
        assert_eq!(
            token.expires_at,
            Some(token.created_at + Duration::seconds(3600))
        );
        assert!(token.is_valid());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let token = Token::new("access");
        assert!(token.expires_at.is_none());
        assert!(!token.is_expired());
        assert!(token.is_valid());
        assert!(token.remaining_lifetime().is_none());
    }

    #[test]
    fn test_expiry_buffer() {
        let mut token = Token::new("access").with_expires_in(7200);

        // Inside the 5 minute buffer.
        token.expires_at = Some(Utc::now() + Duration::seconds(299));
        assert!(token.is_expired());
        assert!(!token.is_valid());

        // Exactly on the buffer boundary counts as expired.
        token.expires_at = Some(Utc::now() + Duration::seconds(300));
        assert!(token.is_expired());

        token.expires_at = Some(Utc::now() + Duration::seconds(600));
        assert!(!token.is_expired());

        token.expires_at = Some(Utc::now() - Duration::seconds(10));
        assert!(token.is_expired());
        assert_eq!(
            token.remaining_lifetime(),
            Some(std::time::Duration::ZERO)
        );
    }

    #[test]
    fn test_short_expiration_is_immediately_expired() {
        let token = Token::new("access").with_expires_in(60);
        assert!(token.is_expired());
        assert!(!token.is_expired_with_buffer(std::time::Duration::from_secs(10)));
    }

    #[test]
    fn test_huge_expiration_does_not_overflow() {
        let mut token = Token::new("access");
        token.set_expiration(99_999_999_999_999);
        assert_eq!(token.expires_in, 99_999_999_999_999);
        assert!(token.expires_at.is_none());
        assert!(token.is_valid());

        token.set_expiration(u64::MAX);
        assert!(token.expires_at.is_none());
        assert!(!token.is_expired());

        let response = TokenResponse {
            access_token: "access".to_string(),
            expires_in: Some(u64::MAX),
            ..Default::default()
        };
        assert!(response.into_token(DEFAULT_EXPIRES_IN).is_valid());
    }

    #[test]
    fn test_huge_buffer_counts_as_expired() {
        let token = Token::new("access").with_expires_in(7200);
        assert!(token.is_expired_with_buffer(std::time::Duration::MAX));
    }

    #[test]
    fn test_empty_access_token_invalid() {
        assert!(!Token::new("").is_valid());
    }

    #[test]
    fn test_can_refresh() {
        assert!(!Token::new("a").can_refresh());
        assert!(!Token::new("a").with_refresh_token("").can_refresh());
        assert!(Token::new("a").with_refresh_token("r").can_refresh());
    }

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 7200,
            "refresh_token": "test-refresh"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "test-token");
        assert_eq!(response.expires_in, Some(7200));
        assert_eq!(response.refresh_token, Some("test-refresh".to_string()));

        let token = response.into_token(DEFAULT_EXPIRES_IN);
        assert_eq!(token.expires_in, 7200);
        assert!(token.can_refresh());
        assert!(token.is_valid());
    }

    #[test]
    fn test_token_response_default_lifetime() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"x","expires_in":0}"#).unwrap();
        let token = response.into_token(DEFAULT_EXPIRES_IN);
        assert_eq!(token.expires_in, DEFAULT_EXPIRES_IN);
        assert_eq!(token.token_type, "Bearer");
        assert!(!token.can_refresh());
    }

    #[test]
    fn test_token_json_round_trip_keeps_expiry() {
        let token = Token::new("access")
            .with_refresh_token("refresh")
            .with_expires_in(7200);

        let json = serde_json::to_string(&token).unwrap();
        let parsed: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = Token::new("secret-access").with_refresh_token("secret-refresh");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_authorization_header() {
        assert_eq!(Token::new("abc").authorization_header(), "Bearer abc");
    }
}
