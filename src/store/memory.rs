//! In-process image store.
//!
//! Used when no database is configured and as the store in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{ImageChanges, ImageRecord, NewImage};

use super::ImageStore;

/// `ImageStore` backed by a map guarded by a tokio `RwLock`.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryImageStore {
    records: Arc<RwLock<HashMap<String, ImageRecord>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Fetch a record by its store id.
    pub async fn get(&self, id: &str) -> Option<ImageRecord> {
        self.records.read().await.get(id).cloned()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ImageRecord>, StoreError> {
        let records = self.records.read().await;
        let mut owned: Vec<ImageRecord> = records
            .values()
            .filter(|r| r.is_owned_by(owner_id))
            .cloned()
            .collect();

        owned.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(owned)
    }

    async fn find_by_upstream_id(
        &self,
        upstream_id: &str,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.upstream_id == upstream_id)
            .cloned())
    }

    async fn insert(&self, image: NewImage) -> Result<ImageRecord, StoreError> {
        let image = image.normalized();
        let mut records = self.records.write().await;

        if records.values().any(|r| r.upstream_id == image.upstream_id) {
            return Err(StoreError::DuplicateUpstreamId(image.upstream_id));
        }

        let now = Utc::now();
        let record = ImageRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: image.owner_id,
            owner_name: image.owner_name,
            upstream_id: image.upstream_id,
            url: image.url,
            description: image.description,
            content_type: image.content_type,
            created_at: now,
            updated_at: now,
        };

        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        changes: &ImageChanges,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(id).map(|record| {
            record.apply(changes, Utc::now());
            record.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}
