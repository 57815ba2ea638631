//! Resilience
//!
//! Client-side accounting of the API's rate limit.

pub mod rate_limiter;

pub use rate_limiter::{RateLimitConfig, RateLimitTracker, DEFAULT_RATE_LIMIT};
