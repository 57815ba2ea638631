//! Token Storage
//!
//! Token persistence backends: memory, file, encrypted file and chained.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ConfigurationError, StorageError, YnabError, YnabResult};
use crate::token::encryption::TokenCipher;
use crate::types::Token;

/// Default unix permissions for token files: owner read/write.
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Fallback token path when no platform config directory is known.
pub const FALLBACK_TOKEN_PATH: &str = ".ynab_token.json";

/// Token storage interface.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Persist a token, replacing any previous one.
    async fn save_token(&self, token: &Token) -> YnabResult<()>;

    /// Load the stored token. Fails when nothing is stored.
    async fn load_token(&self) -> YnabResult<Token>;

    /// Remove the stored token. Clearing empty storage succeeds.
    async fn clear_token(&self) -> YnabResult<()>;

    /// Check if a token is stored.
    async fn has_token(&self) -> bool;
}

/// Default token file: `<config dir>/ynab/token.json`.
pub fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("ynab").join("token.json"))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_TOKEN_PATH))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory token storage.
#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<Token>>,
}

impl MemoryTokenStorage {
    /// Create new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage already holding a token.
    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn save_token(&self, token: &Token) -> YnabResult<()> {
        *lock(&self.token) = Some(token.clone());
        Ok(())
    }

    async fn load_token(&self) -> YnabResult<Token> {
        lock(&self.token)
            .clone()
            .ok_or_else(|| StorageError::Empty.into())
    }

    async fn clear_token(&self) -> YnabResult<()> {
        *lock(&self.token) = None;
        Ok(())
    }

    async fn has_token(&self) -> bool {
        lock(&self.token).is_some()
    }
}

/// File-based token storage holding one pretty-printed JSON token.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
    mode: u32,
}

impl FileTokenStorage {
    /// Create storage at `path` with mode `0600`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: DEFAULT_FILE_MODE,
        }
    }

    /// Override the unix file mode (ignored on other platforms).
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Get the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the configured file mode.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub(crate) async fn write_bytes(&self, data: &[u8]) -> YnabResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    message: format!("failed to create {}: {}", parent.display(), e),
                })?;
        }

        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: format!("failed to write {}: {}", self.path.display(), e),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(self.mode);
            tokio::fs::set_permissions(&self.path, perms)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    message: format!(
                        "failed to set permissions on {}: {}",
                        self.path.display(),
                        e
                    ),
                })?;
        }

        Ok(())
    }

    pub(crate) async fn read_bytes(&self) -> YnabResult<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                YnabError::Storage(StorageError::NotFound {
                    path: self.path.display().to_string(),
                })
            } else {
                YnabError::Storage(StorageError::ReadFailed {
                    message: format!("failed to read {}: {}", self.path.display(), e),
                })
            }
        })
    }

    pub(crate) async fn remove_file(&self) -> YnabResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                message: format!("failed to remove {}: {}", self.path.display(), e),
            }
            .into()),
        }
    }

    pub(crate) async fn file_exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

fn parse_token(data: &[u8]) -> YnabResult<Token> {
    serde_json::from_slice(data).map_err(|e| {
        StorageError::CorruptedData {
            message: e.to_string(),
        }
        .into()
    })
}

fn serialize_token(token: &Token) -> YnabResult<Vec<u8>> {
    serde_json::to_vec_pretty(token).map_err(|e| {
        StorageError::WriteFailed {
            message: format!("failed to serialize token: {}", e),
        }
        .into()
    })
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn save_token(&self, token: &Token) -> YnabResult<()> {
        let data = serialize_token(token)?;
        self.write_bytes(&data).await?;
        tracing::debug!(path = %self.path.display(), "Token saved");
        Ok(())
    }

    async fn load_token(&self) -> YnabResult<Token> {
        let data = self.read_bytes().await?;
        let token = parse_token(&data)?;
        tracing::debug!(path = %self.path.display(), "Token loaded");
        Ok(token)
    }

    async fn clear_token(&self) -> YnabResult<()> {
        self.remove_file().await?;
        tracing::debug!(path = %self.path.display(), "Token cleared");
        Ok(())
    }

    async fn has_token(&self) -> bool {
        self.file_exists().await
    }
}

/// File storage whose contents are sealed with [`TokenCipher`].
pub struct EncryptedFileTokenStorage {
    file: FileTokenStorage,
    cipher: TokenCipher,
}

impl EncryptedFileTokenStorage {
    /// Create encrypted storage at `path`; an empty key stores plaintext.
    pub fn new(path: impl Into<PathBuf>, key: &[u8]) -> YnabResult<Self> {
        Ok(Self {
            file: FileTokenStorage::new(path),
            cipher: TokenCipher::new(key)?,
        })
    }

    /// Override the unix file mode (ignored on other platforms).
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.file = self.file.with_mode(mode);
        self
    }

    /// Get the token file path.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[async_trait]
impl TokenStorage for EncryptedFileTokenStorage {
    async fn save_token(&self, token: &Token) -> YnabResult<()> {
        let sealed = self.cipher.encrypt(&serialize_token(token)?)?;
        self.file.write_bytes(&sealed).await?;
        tracing::debug!(path = %self.file.path().display(), "Encrypted token saved");
        Ok(())
    }

    async fn load_token(&self) -> YnabResult<Token> {
        let sealed = self.file.read_bytes().await?;
        parse_token(&self.cipher.decrypt(&sealed)?)
    }

    async fn clear_token(&self) -> YnabResult<()> {
        self.file.remove_file().await
    }

    async fn has_token(&self) -> bool {
        self.file.file_exists().await
    }
}

impl std::fmt::Debug for EncryptedFileTokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileTokenStorage")
            .field("path", &self.file.path())
            .field("cipher", &self.cipher)
            .finish()
    }
}

/// Ordered composition of storages.
///
/// Saves and clears go to every member and report the first failure. Loads
/// come from the first member that holds a token and can produce it.
#[derive(Default)]
pub struct ChainedTokenStorage {
    storages: Vec<Arc<dyn TokenStorage>>,
}

impl ChainedTokenStorage {
    /// Create a chain from storages in priority order.
    pub fn new(storages: Vec<Arc<dyn TokenStorage>>) -> Self {
        Self { storages }
    }

    /// Append a lower-priority storage.
    pub fn with_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storages.push(storage);
        self
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}

#[async_trait]
impl TokenStorage for ChainedTokenStorage {
    async fn save_token(&self, token: &Token) -> YnabResult<()> {
        let results =
            futures::future::join_all(self.storages.iter().map(|s| s.save_token(token))).await;
        results.into_iter().collect::<YnabResult<Vec<()>>>()?;
        Ok(())
    }

    async fn load_token(&self) -> YnabResult<Token> {
        for (index, storage) in self.storages.iter().enumerate() {
            if !storage.has_token().await {
                continue;
            }
            match storage.load_token().await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    tracing::debug!(index = index, error = %e, "Chained storage member failed to load");
                }
            }
        }
        Err(StorageError::Empty.into())
    }

    async fn clear_token(&self) -> YnabResult<()> {
        let results =
            futures::future::join_all(self.storages.iter().map(|s| s.clear_token())).await;
        results.into_iter().collect::<YnabResult<Vec<()>>>()?;
        Ok(())
    }

    async fn has_token(&self) -> bool {
        for storage in &self.storages {
            if storage.has_token().await {
                return true;
            }
        }
        false
    }
}

/// Kind of storage built by [`create_storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    File,
    Encrypted,
}

impl std::str::FromStr for StorageKind {
    type Err = YnabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "encrypted" => Ok(Self::Encrypted),
            other => Err(ConfigurationError::InvalidConfig {
                message: format!("unknown storage type: {}", other),
            }
            .into()),
        }
    }
}

/// Options for [`create_storage`].
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub kind: StorageKind,
    /// Token file path; defaults to [`default_token_path`].
    pub file_path: Option<PathBuf>,
    /// Unix file mode; defaults to `0600`.
    pub file_mode: Option<u32>,
    /// Required for [`StorageKind::Encrypted`].
    pub encryption_key: Option<SecretString>,
}

impl StorageOptions {
    pub fn memory() -> Self {
        Self {
            kind: StorageKind::Memory,
            file_path: None,
            file_mode: None,
            encryption_key: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: StorageKind::File,
            file_path: Some(path.into()),
            ..Self::memory()
        }
    }

    pub fn encrypted(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::Encrypted,
            file_path: Some(path.into()),
            encryption_key: Some(SecretString::new(key.into())),
            ..Self::memory()
        }
    }
}

/// Build a storage backend from options.
pub fn create_storage(options: StorageOptions) -> YnabResult<Arc<dyn TokenStorage>> {
    let path = || options.file_path.clone().unwrap_or_else(default_token_path);
    let mode = options.file_mode.unwrap_or(DEFAULT_FILE_MODE);

    match options.kind {
        StorageKind::Memory => Ok(Arc::new(MemoryTokenStorage::new())),
        StorageKind::File => Ok(Arc::new(FileTokenStorage::new(path()).with_mode(mode))),
        StorageKind::Encrypted => {
            let key = options
                .encryption_key
                .as_ref()
                .map(|k| k.expose_secret().as_bytes())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| ConfigurationError::MissingRequired {
                    field: "encryption_key".to_string(),
                })?;
            Ok(Arc::new(
                EncryptedFileTokenStorage::new(path(), key)?.with_mode(mode),
            ))
        }
    }
}

/// Create in-memory token storage.
pub fn create_memory_token_storage() -> Arc<dyn TokenStorage> {
    Arc::new(MemoryTokenStorage::new())
}

/// Mock token storage for testing.
#[derive(Default)]
pub struct MockTokenStorage {
    token: Mutex<Option<Token>>,
    save_history: Mutex<Vec<Token>>,
    load_count: AtomicUsize,
    clear_count: AtomicUsize,
    should_fail: Mutex<bool>,
}

impl MockTokenStorage {
    /// Create new mock token storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a token.
    pub fn with_token(self, token: Token) -> Self {
        *lock(&self.token) = Some(token);
        self
    }

    /// Set storage to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *lock(&self.should_fail) = should_fail;
        self
    }

    /// Get every token passed to `save_token`.
    pub fn get_save_history(&self) -> Vec<Token> {
        lock(&self.save_history).clone()
    }

    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count.load(Ordering::SeqCst)
    }

    /// Currently stored token.
    pub fn stored_token(&self) -> Option<Token> {
        lock(&self.token).clone()
    }

    fn check_error(&self) -> YnabResult<()> {
        if *lock(&self.should_fail) {
            return Err(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn save_token(&self, token: &Token) -> YnabResult<()> {
        self.check_error()?;
        lock(&self.save_history).push(token.clone());
        *lock(&self.token) = Some(token.clone());
        Ok(())
    }

    async fn load_token(&self) -> YnabResult<Token> {
        self.load_count.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;
        lock(&self.token)
            .clone()
            .ok_or_else(|| StorageError::Empty.into())
    }

    async fn clear_token(&self) -> YnabResult<()> {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;
        *lock(&self.token) = None;
        Ok(())
    }

    async fn has_token(&self) -> bool {
        lock(&self.token).is_some()
    }
}

/// Create mock token storage for testing.
pub fn create_mock_token_storage() -> MockTokenStorage {
    MockTokenStorage::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_token() -> Token {
        Token::new("test-access-token")
            .with_refresh_token("test-refresh-token")
            .with_expires_in(7200)
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryTokenStorage::new();
        assert!(!storage.has_token().await);
        assert!(matches!(
            storage.load_token().await,
            Err(YnabError::Storage(StorageError::Empty))
        ));

        let token = create_test_token();
        storage.save_token(&token).await.unwrap();
        assert!(storage.has_token().await);
        assert_eq!(storage.load_token().await.unwrap(), token);

        storage.clear_token().await.unwrap();
        assert!(!storage.has_token().await);
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let storage = FileTokenStorage::new(&path);

        let token = create_test_token();
        storage.save_token(&token).await.unwrap();
        assert!(storage.has_token().await);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n  \"access_token\""));

        let loaded = storage.load_token().await.unwrap();
        assert_eq!(loaded, token);
        assert!(loaded.is_valid());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_storage_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        FileTokenStorage::new(&path)
            .save_token(&create_test_token())
            .await
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let custom = dir.path().join("custom.json");
        FileTokenStorage::new(&custom)
            .with_mode(0o640)
            .save_token(&create_test_token())
            .await
            .unwrap();
        let mode = std::fs::metadata(&custom).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[tokio::test]
    async fn test_file_storage_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("absent.json"));

        assert!(!storage.has_token().await);
        assert!(matches!(
            storage.load_token().await,
            Err(YnabError::Storage(StorageError::NotFound { .. }))
        ));
        assert!(storage.clear_token().await.is_ok());
    }

    #[tokio::test]
    async fn test_file_storage_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileTokenStorage::new(&path).load_token().await;
        assert!(matches!(
            result,
            Err(YnabError::Storage(StorageError::CorruptedData { .. }))
        ));
    }

    #[tokio::test]
    async fn test_encrypted_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.enc");
        let storage = EncryptedFileTokenStorage::new(&path, b"passphrase").unwrap();

        let token = create_test_token();
        storage.save_token(&token).await.unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("test-access-token"));
        assert_eq!(storage.load_token().await.unwrap(), token);

        let wrong_key = EncryptedFileTokenStorage::new(&path, b"other").unwrap();
        assert!(matches!(
            wrong_key.load_token().await,
            Err(YnabError::Storage(StorageError::DecryptionFailed { .. }))
        ));

        storage.clear_token().await.unwrap();
        assert!(!storage.has_token().await);
    }

    #[tokio::test]
    async fn test_encrypted_storage_empty_key_is_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let storage = EncryptedFileTokenStorage::new(&path, b"").unwrap();

        storage.save_token(&create_test_token()).await.unwrap();
        let plain = FileTokenStorage::new(&path).load_token().await.unwrap();
        assert_eq!(plain.access_token, "test-access-token");
    }

    #[tokio::test]
    async fn test_chained_storage() {
        let first = Arc::new(MemoryTokenStorage::new());
        let second = Arc::new(MemoryTokenStorage::new());
        let chain = ChainedTokenStorage::new(vec![
            first.clone() as Arc<dyn TokenStorage>,
            second.clone() as Arc<dyn TokenStorage>,
        ]);
        assert_eq!(chain.len(), 2);

        let token = create_test_token();
        chain.save_token(&token).await.unwrap();
        assert!(first.has_token().await);
        assert!(second.has_token().await);

        first.clear_token().await.unwrap();
        assert!(chain.has_token().await);
        assert_eq!(chain.load_token().await.unwrap(), token);

        chain.clear_token().await.unwrap();
        assert!(!chain.has_token().await);
        assert!(chain.load_token().await.is_err());
    }

    #[tokio::test]
    async fn test_chained_storage_skips_failing_member() {
        let failing = Arc::new(MockTokenStorage::new().with_token(Token::new("stale")));
        failing.set_should_fail(true);
        let backup = Arc::new(MemoryTokenStorage::new());
        backup.save_token(&create_test_token()).await.unwrap();

        let chain = ChainedTokenStorage::new(vec![failing.clone() as Arc<dyn TokenStorage>, backup]);
        let loaded = chain.load_token().await.unwrap();
        assert_eq!(loaded.access_token, "test-access-token");
        assert_eq!(failing.load_count(), 1);

        assert!(chain.save_token(&create_test_token()).await.is_err());
    }

    #[tokio::test]
    async fn test_create_storage() {
        let dir = tempfile::tempdir().unwrap();

        let memory = create_storage(StorageOptions::memory()).unwrap();
        assert!(!memory.has_token().await);

        let file = create_storage(StorageOptions::file(dir.path().join("t.json"))).unwrap();
        file.save_token(&create_test_token()).await.unwrap();
        assert!(file.has_token().await);

        let encrypted =
            create_storage(StorageOptions::encrypted(dir.path().join("t.enc"), "key")).unwrap();
        encrypted.save_token(&create_test_token()).await.unwrap();
        assert!(encrypted.load_token().await.is_ok());

        let missing_key = create_storage(StorageOptions::encrypted(dir.path().join("x"), ""));
        assert!(matches!(
            missing_key,
            Err(YnabError::Configuration(ConfigurationError::MissingRequired { .. }))
        ));

        assert_eq!("file".parse::<StorageKind>().unwrap(), StorageKind::File);
        assert!("keyring".parse::<StorageKind>().is_err());
    }

    #[test]
    fn test_default_token_path() {
        let path = default_token_path();
        assert!(path.ends_with("token.json") || path.ends_with(FALLBACK_TOKEN_PATH));
    }

    #[tokio::test]
    async fn test_mock_storage() {
        let storage = MockTokenStorage::new();
        storage.save_token(&create_test_token()).await.unwrap();

        assert_eq!(storage.get_save_history().len(), 1);
        assert!(storage.load_token().await.is_ok());
        assert_eq!(storage.load_count(), 1);

        storage.set_should_fail(true);
        assert!(storage.save_token(&create_test_token()).await.is_err());
        assert_eq!(storage.get_save_history().len(), 1);
    }
}
