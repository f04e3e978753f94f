//! JSON-file backed key/value store.

use super::{composite_key, KvStore, KvStoreError, KvStoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// A key/value store persisted as a single JSON object on disk.
///
/// The whole file is rewritten on every `set`. Writes go to a sibling temp
/// file first and are renamed into place.
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> KvStoreResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| KvStoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(KvStoreError::Storage(format!("{}: {}", self.path.display(), e))),
        }
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, org_id: i64, namespace: &str, key: &str) -> KvStoreResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let data = self.read_all().await?;
        Ok(data.get(&composite_key(org_id, namespace, key)).cloned())
    }

    async fn set(
        &self,
        org_id: i64,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> KvStoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all().await?;
        data.insert(composite_key(org_id, namespace, key), value.to_string());

        let content = serde_json::to_string_pretty(&data)
            .map_err(|e| KvStoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KvStoreError::Storage(e.to_string()))?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| KvStoreError::Storage(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| KvStoreError::Storage(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), namespace, key, "Persisted key/value entry");
        Ok(())
    }
}
