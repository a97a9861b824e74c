//! Metadata store for image records.
//!
//! The store is the only stateful collaborator of the gateway. Handlers talk
//! to it through the [`ImageStore`] trait so the backend can be swapped:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Handlers / Ownership Gate        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           ImageStore Trait              │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │MemoryImageStore │    │ PostgresImageStore  │
//! │ (dev / tests)   │    │  (sqlx, pooled)     │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! Each operation on a single record is atomic within its backend. Nothing
//! coordinates two requests that touch the same record, so concurrent updates
//! can overwrite each other (last write wins).

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{ImageChanges, ImageRecord, NewImage};

pub use memory::MemoryImageStore;
pub use postgres::{PostgresConfig, PostgresImageStore, DEFAULT_POOL_SIZE};

/// Persistence for image metadata records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// All records owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ImageRecord>, StoreError>;

    /// Look up a record by the identifier the upstream host assigned.
    async fn find_by_upstream_id(
        &self,
        upstream_id: &str,
    ) -> Result<Option<ImageRecord>, StoreError>;

    /// Insert a new record, assigning its id and timestamps.
    ///
    /// Fails with [`StoreError::DuplicateUpstreamId`] if a record for the same
    /// upstream image already exists.
    async fn insert(&self, image: NewImage) -> Result<ImageRecord, StoreError>;

    /// Apply changes to the mutable fields of a record.
    ///
    /// Returns the updated record, or `None` if no record has this id.
    async fn update(
        &self,
        id: &str,
        changes: &ImageChanges,
    ) -> Result<Option<ImageRecord>, StoreError>;

    /// Remove a record. Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}
