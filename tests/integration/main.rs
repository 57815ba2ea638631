//! Integration tests using WireMock
//!
//! These tests drive the flows, token manager and client against a mock HTTP
//! server through the real reqwest transport.

mod api_client;
mod common;
mod oauth_flow;
