//! Generic key/value persistence.
//!
//! Values are opaque strings addressed by `(org_id, namespace, key)`.
//! [`NamespacedKvStore`] fixes the org and namespace so callers only deal in keys.

mod error;
mod file;
mod memory;

pub use error::{KvStoreError, KvStoreResult};
pub use file::FileKvStore;
pub use memory::InMemoryKvStore;

use async_trait::async_trait;
use std::sync::Arc;

/// A key/value store backend.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Gets a value. Returns `Ok(None)` if the key does not exist.
    async fn get(&self, org_id: i64, namespace: &str, key: &str) -> KvStoreResult<Option<String>>;

    /// Sets a value, replacing any previous one.
    async fn set(
        &self,
        org_id: i64,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> KvStoreResult<()>;
}

/// A key/value store view with a fixed org id and namespace.
#[derive(Clone)]
pub struct NamespacedKvStore {
    store: Arc<dyn KvStore>,
    org_id: i64,
    namespace: String,
}

impl NamespacedKvStore {
    /// Wraps `store`, scoping every access to `org_id` and `namespace`.
    pub fn new(store: Arc<dyn KvStore>, org_id: i64, namespace: impl Into<String>) -> Self {
        Self {
            store,
            org_id,
            namespace: namespace.into(),
        }
    }

    pub fn org_id(&self) -> i64 {
        self.org_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> KvStoreResult<Option<String>> {
        self.store.get(self.org_id, &self.namespace, key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> KvStoreResult<()> {
        self.store.set(self.org_id, &self.namespace, key, value).await
    }
}

impl std::fmt::Debug for NamespacedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedKvStore")
            .field("org_id", &self.org_id)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Builds the flat key used by backends that store everything in one map.
pub(crate) fn composite_key(org_id: i64, namespace: &str, key: &str) -> String {
    format!("{}:{}:{}", org_id, namespace, key)
}
