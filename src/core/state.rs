//! State Parameter
//!
//! CSRF state generation and validation for authorization redirects.

use rand::Rng;

use crate::error::{AuthorizationError, YnabResult};

/// Generate a random, URL-safe state parameter (256 bits).
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Check a received state against the expected one; an empty expectation never matches.
pub fn validate_state(expected: &str, received: &str) -> bool {
    !expected.is_empty() && expected == received
}

/// Enforce the state check for a callback.
///
/// An empty `expected` skips the check entirely.
pub fn verify_callback_state(expected: &str, received: &str) -> YnabResult<()> {
    if expected.is_empty() || validate_state(expected, received) {
        return Ok(());
    }

    tracing::warn!("Callback state does not match the expected state");
    Err(AuthorizationError::StateMismatch {
        expected: expected.to_string(),
        received: received.to_string(),
    }
    .into())
}
