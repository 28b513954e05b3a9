//! Asynchronous key-value persistence for the API key, saved templates and
//! ledger snapshots.
//!
//! The core treats storage as an opaque dependency behind [`KeyValueStore`];
//! [`FileStore`] is the bundled JSON-file implementation, and
//! [`SettingsStore`] layers typed accessors over any store.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::error::ChatError;
use crate::ledger::Message;
use crate::templates::Template;

/// Storage key for the API key secret.
pub const API_KEY: &str = "api_key";
/// Storage key for saved message templates.
pub const TEMPLATES_KEY: &str = "message_templates";
/// Storage key for the persisted ledger snapshot.
pub const LEDGER_KEY: &str = "ledger";

/// Asynchronous get/set by string key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), ChatError>;

    async fn remove(&self, key: &str) -> Result<(), ChatError>;
}

/// JSON-file-backed store, by default under the user's home directory.
#[derive(Debug)]
pub struct FileStore {
    entries: RwLock<HashMap<String, String>>,
    file_path: PathBuf,
}

impl FileStore {
    /// Opens the store at the default path (`~/.sidechat/store.json`).
    pub async fn open_default() -> Result<Self, ChatError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ChatError::Io("Could not find home directory".to_string()))?;
        Self::open(home.join(".sidechat").join("store.json")).await
    }

    /// Opens (or creates) the store backed by the file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ChatError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read_to_string(&file_path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            entries: RwLock::new(entries),
            file_path,
        })
    }

    pub fn file_path(&self) -> &std::path::Path {
        &self.file_path
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), ChatError> {
        let contents = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.file_path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), ChatError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.persist(&entries).await
    }
}

/// Typed accessors over a [`KeyValueStore`].
pub struct SettingsStore<S> {
    inner: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Reads the API key, wrapped so it is not exposed in logs.
    pub async fn api_key(&self) -> Result<Option<SecretString>, ChatError> {
        Ok(self.inner.get(API_KEY).await?.map(SecretString::new))
    }

    pub async fn set_api_key(&self, key: &str) -> Result<(), ChatError> {
        self.inner.set(API_KEY, key).await
    }

    pub async fn templates(&self) -> Result<Vec<Template>, ChatError> {
        match self.inner.get(TEMPLATES_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save_templates(&self, templates: &[Template]) -> Result<(), ChatError> {
        let raw = serde_json::to_string(templates)?;
        self.inner.set(TEMPLATES_KEY, &raw).await
    }

    /// The persisted ledger snapshot, empty when none was saved.
    pub async fn ledger_snapshot(&self) -> Result<Vec<Message>, ChatError> {
        match self.inner.get(LEDGER_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save_ledger_snapshot(&self, messages: &[Message]) -> Result<(), ChatError> {
        let raw = serde_json::to_string(messages)?;
        self.inner.set(LEDGER_KEY, &raw).await
    }
}
