//! YNAB OAuth Types
//!
//! Token, configuration and callback definitions.

pub mod callback;
pub mod config;
pub mod token;

pub use callback::*;
pub use config::*;
pub use token::*;
