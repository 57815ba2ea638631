//! YNAB Core Components
//!
//! HTTP transport and authorization state handling.

pub mod state;
pub mod transport;

pub use state::*;
pub use transport::*;
