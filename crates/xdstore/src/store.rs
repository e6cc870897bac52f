//! Key-value storage seam.
//!
//! Both peers receive an explicit map from namespace to store capability at
//! construction. Nothing in the bridge reaches for ambient storage; a
//! namespace missing from the map is an execution failure, not a panic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use xdstore_protocol::{Namespace, Operation};

/// A single named key-value store.
///
/// `write` and `delete` return the previous value under the key, `read` the
/// current one. Backends are free to fail (quota, I/O); the responder
/// converts failures into error responses rather than propagating them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn write(&self, key: &str, value: &str) -> Result<Option<String>, StoreError>;
    async fn delete(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Namespace -> store capability map injected into both peers.
pub type StoreMap = HashMap<Namespace, Arc<dyn KeyValueStore>>;

/// Resolve a namespace and apply an operation to its store.
pub(crate) async fn apply(
    stores: &StoreMap,
    namespace: Namespace,
    op: &Operation,
) -> Result<Option<String>, StoreError> {
    let store = stores
        .get(&namespace)
        .ok_or(StoreError::UnknownNamespace(namespace))?;

    match op {
        Operation::Get { key } => store.read(key).await,
        Operation::Set { key, value } => store.write(key, value).await,
        Operation::Remove { key } => store.delete(key).await,
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Concurrent in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn write(&self, key: &str, value: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.insert(key.to_string(), value.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.remove(key).map(|(_, v)| v))
    }
}

/// A fresh in-memory store for every namespace.
pub fn in_memory_stores() -> StoreMap {
    let mut map: StoreMap = HashMap::new();
    map.insert(Namespace::Local, Arc::new(MemoryStore::new()));
    map.insert(Namespace::Session, Arc::new(MemoryStore::new()));
    map
}
