//! Image metadata types shared by the store, the upstream client and the API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Content Type
// =============================================================================

/// Image formats accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl ContentType {
    /// The MIME type string, as stored and sent upstream.
    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::Gif => "image/gif",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Png => "image/png",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// Returned when a string is not one of the supported MIME types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownContentType(pub String);

impl fmt::Display for UnknownContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported content type: {}", self.0)
    }
}

impl std::error::Error for UnknownContentType {}

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "image/gif" => Ok(ContentType::Gif),
            "image/jpeg" => Ok(ContentType::Jpeg),
            "image/png" => Ok(ContentType::Png),
            other => Err(UnknownContentType(other.to_string())),
        }
    }
}

// =============================================================================
// Image Record
// =============================================================================

/// Local metadata entry describing an image hosted upstream.
///
/// `owner_id` and `upstream_id` are fixed at creation; the only way to modify
/// a stored record is through [`ImageChanges`], which cannot touch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Store-generated identifier
    pub id: String,

    /// Id of the user that created the image
    pub owner_id: String,

    /// Username of the owner at creation time
    pub owner_name: String,

    /// Identifier assigned by the upstream image host
    pub upstream_id: String,

    /// Public URL of the image bytes, assigned by the upstream host
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub content_type: ContentType,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Whether `user_id` is the owner of this record.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Apply mutable-field changes and bump `updated_at`.
    pub fn apply(&mut self, changes: &ImageChanges, now: DateTime<Utc>) {
        if let Some(description) = &changes.description {
            self.description = normalize_text(description.as_deref());
        }
        if let Some(content_type) = changes.content_type {
            self.content_type = content_type;
        }
        self.updated_at = now;
    }
}

/// Everything needed to insert a new record; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub owner_id: String,
    pub owner_name: String,
    pub upstream_id: String,
    pub url: String,
    pub description: Option<String>,
    pub content_type: ContentType,
}

impl NewImage {
    /// Trim string fields the way they are persisted.
    pub fn normalized(self) -> Self {
        Self {
            owner_id: self.owner_id.trim().to_string(),
            owner_name: self.owner_name.trim().to_string(),
            upstream_id: self.upstream_id.trim().to_string(),
            url: self.url.trim().to_string(),
            description: normalize_text(self.description.as_deref()),
            content_type: self.content_type,
        }
    }
}

/// Changes to the mutable fields of a record.
///
/// `description: Some(None)` clears the description, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageChanges {
    pub description: Option<Option<String>>,
    pub content_type: Option<ContentType>,
}

impl ImageChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.content_type.is_none()
    }
}

/// Trim a text field, mapping blank input to `None`.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
