//! Client side of the upstream image host.
//!
//! The upstream service owns the image bytes; the gateway only forwards
//! uploads, replacements and deletions and remembers what the upstream
//! answered. [`ImageHost`] is the seam handlers depend on, with
//! [`HttpImageHost`] as the production implementation.

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::model::ContentType;

pub use client::{HttpImageHost, HttpImageHostConfig, PRIVATE_TOKEN_HEADER};

/// Image payload sent upstream on create and replace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    /// Base64-encoded image bytes
    pub data: String,

    pub content_type: ContentType,
}

/// Partial image payload sent upstream on patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
}

impl ImagePatch {
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.content_type.is_none()
    }
}

/// What the upstream returns for a stored image.
///
/// Only `id` and `imageUrl` are relied on; the rest is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamImage {
    pub id: String,

    pub image_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Operations the gateway performs against the upstream image host.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload a new image.
    async fn create(&self, upload: &ImageUpload) -> Result<UpstreamImage, UpstreamError>;

    /// Read an image's upstream description.
    ///
    /// No API route calls this; records are served from the local store.
    /// It is kept for operators and for checking the upstream in tests.
    async fn fetch(&self, id: &str) -> Result<UpstreamImage, UpstreamError>;

    /// Replace an image's bytes and type.
    async fn replace(&self, id: &str, upload: &ImageUpload) -> Result<(), UpstreamError>;

    /// Partially update an image.
    async fn patch(&self, id: &str, patch: &ImagePatch) -> Result<(), UpstreamError>;

    /// Delete an image.
    async fn delete(&self, id: &str) -> Result<(), UpstreamError>;
}
