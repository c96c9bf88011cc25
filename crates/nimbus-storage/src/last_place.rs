//! Last viewed place, kept as a small JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

#[async_trait]
pub trait LastPlaceStore: Send + Sync {
    async fn get(&self) -> StorageResult<Option<String>>;

    async fn set(&self, name: &str) -> StorageResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct LastPlaceRecord {
    name: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileLastPlaceStore {
    path: PathBuf,
}

impl FileLastPlaceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LastPlaceStore for FileLastPlaceStore {
    async fn get(&self) -> StorageResult<Option<String>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: LastPlaceRecord = serde_json::from_str(&contents)?;
        Ok(Some(record.name).filter(|name| !name.trim().is_empty()))
    }

    async fn set(&self, name: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let record = LastPlaceRecord {
            name: name.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&self.path, contents).await?;

        tracing::debug!("Saved last place: {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLastPlaceStore::new(dir.path().join("last_place.json"));

        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLastPlaceStore::new(dir.path().join("state").join("last_place.json"));

        store.set("Buenos Aires").await.unwrap();
        store.set("Montevideo").await.unwrap();

        assert_eq!(store.get().await.unwrap().as_deref(), Some("Montevideo"));
    }

    #[tokio::test]
    async fn test_value_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_place.json");

        FileLastPlaceStore::new(&path).set("Nairobi").await.unwrap();

        let reopened = FileLastPlaceStore::new(&path);
        assert_eq!(reopened.get().await.unwrap().as_deref(), Some("Nairobi"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_place.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileLastPlaceStore::new(&path).get().await;

        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
