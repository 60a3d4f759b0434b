//! Where the bearer token lives between requests.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{
    fmt::Debug,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;
use tracing::warn;

/// Key the token is stored under in a [`FileTokenStore`].
pub const TOKEN_KEY: &str = "auth_token";

#[async_trait]
pub trait TokenStore: Debug + Send + Sync {
    async fn load(&self) -> Result<Option<String>>;

    async fn store(&self, token: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Keeps the token for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.token.read().await.clone())
    }

    async fn store(&self, token: &str) -> Result<()> {
        *self.token.write().await = Some(token.to_owned());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.write().await = None;
        Ok(())
    }
}

/// Persists the token in a JSON object file under [`TOKEN_KEY`].
///
/// Other keys in the file are left untouched.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(entries)?).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        let _guard = self.lock.read().await;

        match self.read_entries().await?.remove(TOKEN_KEY) {
            Some(Value::String(token)) => Ok(Some(token)),
            Some(other) => {
                warn!(path = %self.path.display(), value = %other, "Ignoring non-string token");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(&self, token: &str) -> Result<()> {
        let _guard = self.lock.write().await;

        let mut entries = self.read_entries().await?;
        entries.insert(TOKEN_KEY.to_owned(), Value::String(token.to_owned()));
        self.write_entries(&entries).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.write().await;

        let mut entries = self.read_entries().await?;
        if entries.remove(TOKEN_KEY).is_some() {
            self.write_entries(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::token::{FileTokenStore, MemoryTokenStore, TokenStore};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn memory_store() {
        let store = MemoryTokenStore::default();
        assert_eq!(store.load().await.unwrap(), None);

        store.store("1:abc:def").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("1:abc:def"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("storage.json"));

        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn file_store_persists_under_its_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        FileTokenStore::new(&path).store("1:abc:def").await.unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.load().await.unwrap().as_deref(), Some("1:abc:def"));
        let contents: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(contents, json!({ "theme": "dark", "auth_token": "1:abc:def" }));

        reopened.clear().await.unwrap();
        let contents: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(contents, json!({ "theme": "dark" }));
    }

    #[tokio::test]
    async fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileTokenStore::new(&path).load().await.is_err());
    }
}
