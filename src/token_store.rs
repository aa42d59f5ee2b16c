use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::config::endpoints::TOKEN_STORAGE_KEY;
use crate::core::LOG_TARGET;
use crate::error::{BridgeError, StorageError};

const STORAGE_FILE: &str = "web-storage.json";

/// Durable string storage keyed by namespace, the desktop counterpart of
/// browser local storage.
pub trait TokenStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// JSON document of key/value strings in the data directory.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORAGE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write_document(&self, doc: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        enforce_owner_only_file(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_document()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut doc = match self.read_document() {
            Ok(doc) => doc,
            Err(StorageError::Format(err)) => {
                tracing::warn!(target = LOG_TARGET, error = %err, path = %self.path.display(), "token storage document corrupt; rewriting it with only the new value");
                HashMap::new()
            }
            Err(err) => return Err(err),
        };
        doc.insert(key.to_string(), value.to_string());
        self.write_document(&doc)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut doc = self.read_document()?;
        if doc.remove(key).is_some() {
            self.write_document(&doc)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn enforce_owner_only_file(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn enforce_owner_only_file(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Process-local storage for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryTokenStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .values
            .lock()
            .insert(key.to_string(), value.to_string());
        storage
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

enum CachedToken {
    Unloaded,
    Loaded(Option<SecretString>),
}

/// Hosted-mode bearer token: cached in memory, persisted through a
/// [`TokenStorage`]. Storage failures degrade to "no token" and are logged.
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    key: String,
    cache: Mutex<CachedToken>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_key(storage, TOKEN_STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn TokenStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            cache: Mutex::new(CachedToken::Unloaded),
        }
    }

    /// Current token. The first call reads storage; the outcome, including
    /// "absent", is cached.
    pub fn get_token(&self) -> Option<String> {
        let mut cache = self.cache.lock();
        if let CachedToken::Unloaded = *cache {
            let loaded = match self.storage.load(&self.key) {
                Ok(raw) => normalize_token(raw.as_deref()),
                Err(err) => {
                    tracing::warn!(target = LOG_TARGET, error = %err, "token storage unreadable; treating as signed out");
                    None
                }
            };
            *cache = CachedToken::Loaded(loaded.map(SecretString::new));
        }
        match &*cache {
            CachedToken::Loaded(Some(secret)) => Some(secret.expose_secret().clone()),
            _ => None,
        }
    }

    /// Replace (or clear, with `None` / blank) the token in cache and storage.
    pub fn set_token(&self, token: Option<&str>) {
        let normalized = normalize_token(token);
        let write = match normalized.as_deref() {
            Some(value) => self.storage.store(&self.key, value),
            None => self.storage.remove(&self.key),
        };
        if let Err(err) = write {
            tracing::warn!(target = LOG_TARGET, error = %err, "token storage write failed; keeping in-memory value only");
        }
        *self.cache.lock() = CachedToken::Loaded(normalized.map(SecretString::new));
    }

    pub fn require_token(&self) -> Result<String, BridgeError> {
        self.get_token().ok_or(BridgeError::AuthenticationRequired)
    }
}

/// Trimmed token, or `None` when nothing is left.
pub fn normalize_token(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStorage {
        inner: MemoryTokenStorage,
        loads: AtomicUsize,
    }

    impl TokenStorage for CountingStorage {
        fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(key)
        }
        fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.store(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    struct DeniedStorage;

    impl TokenStorage for DeniedStorage {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("access denied".into()))
        }
        fn store(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("access denied".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("access denied".into()))
        }
    }

    #[test]
    fn stored_token_is_trimmed() {
        let storage = MemoryTokenStorage::with_value(TOKEN_STORAGE_KEY, "  abc123 \n");
        let store = TokenStore::new(Arc::new(storage));
        assert_eq!(store.get_token().as_deref(), Some("abc123"));
        assert_eq!(store.require_token().unwrap(), "abc123");
    }

    #[test]
    fn blank_token_counts_as_absent() {
        let storage = MemoryTokenStorage::with_value(TOKEN_STORAGE_KEY, "   ");
        let store = TokenStore::new(Arc::new(storage));
        assert_eq!(store.get_token(), None);
        assert!(matches!(
            store.require_token(),
            Err(BridgeError::AuthenticationRequired)
        ));
    }

    #[test]
    fn absence_is_cached_after_first_load() {
        let storage = Arc::new(CountingStorage {
            inner: MemoryTokenStorage::new(),
            loads: AtomicUsize::new(0),
        });
        let store = TokenStore::new(storage.clone());
        assert_eq!(store.get_token(), None);
        assert_eq!(store.get_token(), None);
        assert!(store.require_token().is_err());
        assert_eq!(storage.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_and_clear_reach_storage() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let store = TokenStore::new(storage.clone());

        store.set_token(Some(" next "));
        assert_eq!(store.get_token().as_deref(), Some("next"));
        assert_eq!(
            storage.load(TOKEN_STORAGE_KEY).unwrap().as_deref(),
            Some("next")
        );

        store.set_token(Some(""));
        assert_eq!(store.get_token(), None);
        assert_eq!(storage.load(TOKEN_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn denied_storage_degrades_instead_of_failing() {
        let store = TokenStore::new(Arc::new(DeniedStorage));
        assert_eq!(store.get_token(), None);
        store.set_token(Some("abc"));
        assert_eq!(store.get_token().as_deref(), Some("abc"));
        store.set_token(None);
        assert_eq!(store.get_token(), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = TokenStore::new(Arc::new(FileTokenStorage::in_dir(dir.path())));
        first.set_token(Some("persisted"));

        let reopened = TokenStore::new(Arc::new(FileTokenStorage::in_dir(dir.path())));
        assert_eq!(reopened.get_token().as_deref(), Some("persisted"));

        reopened.set_token(None);
        let again = TokenStore::new(Arc::new(FileTokenStorage::in_dir(dir.path())));
        assert_eq!(again.get_token(), None);
    }

    #[test]
    fn corrupt_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::in_dir(dir.path());
        fs::write(storage.path(), "{not json").unwrap();
        let store = TokenStore::new(Arc::new(storage));
        assert_eq!(store.get_token(), None);
    }

    #[test]
    fn store_rewrites_a_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::in_dir(dir.path());
        fs::write(storage.path(), "{not json").unwrap();

        storage.store(TOKEN_STORAGE_KEY, "fresh").unwrap();
        assert_eq!(
            storage.load(TOKEN_STORAGE_KEY).unwrap().as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn store_does_not_clobber_an_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::in_dir(dir.path());
        // A directory where the document belongs cannot be read as text.
        fs::create_dir(storage.path()).unwrap();

        let err = storage.store(TOKEN_STORAGE_KEY, "fresh").unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(storage.path().is_dir());
    }

    #[test]
    fn file_storage_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::in_dir(dir.path());
        storage.store("other", "keep").unwrap();
        storage.store(TOKEN_STORAGE_KEY, "t").unwrap();
        storage.remove(TOKEN_STORAGE_KEY).unwrap();
        assert_eq!(storage.load("other").unwrap().as_deref(), Some("keep"));
    }
}
