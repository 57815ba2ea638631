//! Token Management
//!
//! Token lifecycle management: storage, encryption, refresh and providers.
//!
//! This module provides:
//!
//! - **Token Storage**: memory, file, encrypted-file and chained backends
//! - **Token Manager**: single source of truth for the current token, with refresh
//! - **Token Providers**: bearer token sources for the authenticated transport

pub mod encryption;
pub mod manager;
pub mod provider;
pub mod storage;

// Token Storage
pub use storage::{
    create_memory_token_storage, create_mock_token_storage, create_storage, default_token_path,
    ChainedTokenStorage, EncryptedFileTokenStorage, FileTokenStorage, MemoryTokenStorage,
    MockTokenStorage, StorageKind, StorageOptions, TokenStorage, DEFAULT_FILE_MODE,
};

// Encryption
pub use encryption::TokenCipher;

// Token Manager
pub use manager::{RefreshCallback, TokenManager, TokenManagerConfig, TokenManagerOptions};

// Token Providers
pub use provider::{StaticTokenProvider, TokenProvider};
