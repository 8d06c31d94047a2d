//! Credential persistence
//!
//! Session data lives in a flat key-value namespace. Two strategies exist:
//! a durable [`FileStore`] that survives process restarts and a
//! session-scoped [`MemoryStore`]. [`SessionStores`] picks one of them at
//! sign-in time and hands the same store to every later call.

use crate::error::{StorageError, StorageResult};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the serialized user profile
pub const USER_KEY: &str = "user";

/// Every key owned by the session. Clearing a session removes exactly these.
pub const AUTH_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Write several entries as one operation.
    async fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Remove the given keys, leaving anything else in the store intact.
    async fn clear(&self, keys: &[&str]) -> StorageResult<()>;
}

/// How long a signed-in session should persist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Survives process restarts
    Durable,
    /// Dropped when the process exits
    Session,
}

impl Durability {
    pub const fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Self::Durable
        } else {
            Self::Session
        }
    }
}

/// Session-scoped store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let mut guard = self.entries.lock().await;
        for (key, value) in entries {
            guard.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn clear(&self, keys: &[&str]) -> StorageResult<()> {
        let mut guard = self.entries.lock().await;
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}

/// Durable store persisted as a JSON object on disk.
///
/// Every operation re-reads the file so that several processes sharing it
/// see each other's writes; the last writer wins. Writes land in a sibling
/// temporary file first and are then renamed over the target.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Default location under the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("panel")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> StorageResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| StorageError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        debug!(path = %self.path.display(), keys = entries.len(), "Wrote session file");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_entries().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set_many(&[(key, value)]).await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut current = self.read_entries().await?;
        for (key, value) in entries {
            current.insert((*key).to_string(), (*value).to_string());
        }
        self.write_entries(&current).await
    }

    /// An unparsable file is reset to an empty object, since the auth keys
    /// it held can no longer be told apart from anything else.
    async fn clear(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut current = match self.read_entries().await {
            Ok(entries) => entries,
            Err(StorageError::Serialization(err)) => {
                warn!(path = %self.path.display(), error = %err, "Resetting corrupt session file");
                return self.write_entries(&BTreeMap::new()).await;
            }
            Err(err) => return Err(err),
        };
        let before = current.len();
        for key in keys {
            current.remove(*key);
        }
        if current.len() == before {
            return Ok(());
        }
        self.write_entries(&current).await
    }
}

struct ActiveStore {
    durability: Durability,
    store: Arc<dyn CredentialStore>,
}

/// The durable and session-scoped stores plus the one currently in use
pub struct SessionStores {
    durable: Arc<dyn CredentialStore>,
    session: Arc<dyn CredentialStore>,
    active: ArcSwap<ActiveStore>,
}

impl SessionStores {
    /// Create from both strategies. The durable store starts out active.
    pub fn new(durable: Arc<dyn CredentialStore>, session: Arc<dyn CredentialStore>) -> Self {
        let active = ArcSwap::from_pointee(ActiveStore {
            durability: Durability::Durable,
            store: durable.clone(),
        });
        Self {
            durable,
            session,
            active,
        }
    }

    /// Durable file store at `path` plus an in-memory session store
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(FileStore::new(path)),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Both strategies in memory; nothing touches disk
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn store(&self, durability: Durability) -> Arc<dyn CredentialStore> {
        match durability {
            Durability::Durable => self.durable.clone(),
            Durability::Session => self.session.clone(),
        }
    }

    /// Make `durability` the strategy used by subsequent reads and writes
    pub fn select(&self, durability: Durability) {
        self.active.store(Arc::new(ActiveStore {
            durability,
            store: self.store(durability),
        }));
    }

    pub fn active(&self) -> Arc<dyn CredentialStore> {
        self.active.load().store.clone()
    }

    pub fn durability(&self) -> Durability {
        self.active.load().durability
    }

    /// Find a persisted user record and activate the store that holds it.
    ///
    /// The session-scoped store is consulted first since anything in it was
    /// written by this process.
    pub async fn restore(&self) -> StorageResult<Option<String>> {
        for durability in [Durability::Session, Durability::Durable] {
            let store = self.store(durability);
            if let Some(user) = store.get(USER_KEY).await? {
                debug!(store = store.name(), "Found persisted session");
                self.select(durability);
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// Remove the auth keys from both strategies.
    ///
    /// Both stores are attempted even if the first fails; the first error
    /// is returned.
    pub async fn clear_all(&self) -> StorageResult<()> {
        let session = self.session.clear(&AUTH_KEYS).await;
        let durable = self.durable.clear(&AUTH_KEYS).await;
        session.and(durable)
    }
}
