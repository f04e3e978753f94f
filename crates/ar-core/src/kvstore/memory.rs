//! In-memory key/value store.

use super::{composite_key, KvStore, KvStoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A key/value store backed by a `HashMap`. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    data: RwLock<HashMap<String, String>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all orgs and namespaces.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, org_id: i64, namespace: &str, key: &str) -> KvStoreResult<Option<String>> {
        let data = self.data.read().await;
        Ok(data.get(&composite_key(org_id, namespace, key)).cloned())
    }

    async fn set(
        &self,
        org_id: i64,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> KvStoreResult<()> {
        let mut data = self.data.write().await;
        data.insert(composite_key(org_id, namespace, key), value.to_string());
        Ok(())
    }
}
