//! Last-synced version per FHIR resource

use crate::domain::ResourceId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Version of a resource at its last successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceVersion {
    pub resource_id: ResourceId,
    pub last_updated: DateTime<Utc>,
}

/// Version tracking storage
///
/// Reads may run concurrently with each other; writes are exclusive.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn get(&self, resource_id: &ResourceId) -> Option<ResourceVersion>;

    /// Overwrites the entry for `version.resource_id`
    async fn put(&self, version: ResourceVersion);

    /// Writes `new` only if the current entry equals `expected`
    ///
    /// `expected == None` means the entry must be absent. Returns whether the
    /// write happened.
    async fn compare_and_swap(
        &self,
        expected: Option<&ResourceVersion>,
        new: ResourceVersion,
    ) -> bool;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local version map
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    versions: RwLock<HashMap<ResourceId, ResourceVersion>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn get(&self, resource_id: &ResourceId) -> Option<ResourceVersion> {
        self.versions.read().await.get(resource_id).cloned()
    }

    async fn put(&self, version: ResourceVersion) {
        self.versions
            .write()
            .await
            .insert(version.resource_id.clone(), version);
    }

    async fn compare_and_swap(
        &self,
        expected: Option<&ResourceVersion>,
        new: ResourceVersion,
    ) -> bool {
        let mut versions = self.versions.write().await;
        if versions.get(&new.resource_id) != expected {
            return false;
        }
        versions.insert(new.resource_id.clone(), new);
        true
    }

    async fn len(&self) -> usize {
        self.versions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn version(id: &str, hour: u32) -> ResourceVersion {
        ResourceVersion {
            resource_id: ResourceId::new(id).unwrap(),
            last_updated: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryVersionStore::new();
        assert!(store.is_empty().await);

        store.put(version("p-1", 10)).await;
        store.put(version("p-1", 12)).await;
        store.put(version("p-2", 9)).await;

        let id = ResourceId::new("p-1").unwrap();
        assert_eq!(store.get(&id).await, Some(version("p-1", 12)));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = InMemoryVersionStore::new();

        assert!(store.compare_and_swap(None, version("p-1", 10)).await);
        // Entry exists now, so an absent expectation fails
        assert!(!store.compare_and_swap(None, version("p-1", 11)).await);
        assert!(
            !store
                .compare_and_swap(Some(&version("p-1", 9)), version("p-1", 11))
                .await
        );
        assert!(
            store
                .compare_and_swap(Some(&version("p-1", 10)), version("p-1", 11))
                .await
        );

        let id = ResourceId::new("p-1").unwrap();
        assert_eq!(store.get(&id).await, Some(version("p-1", 11)));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryVersionStore::new();
        assert!(store.get(&ResourceId::new("nope").unwrap()).await.is_none());
    }
}
