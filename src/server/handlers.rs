//! HTTP request handlers for the image API.
//!
//! # Endpoints
//!
//! - `GET /api/v1/images` - List the caller's images
//! - `POST /api/v1/images` - Upload an image
//! - `GET /api/v1/images/{id}` - Get one image (owner only)
//! - `PUT /api/v1/images/{id}` - Replace an image (owner only)
//! - `PATCH /api/v1/images/{id}` - Partially update an image (owner only)
//! - `DELETE /api/v1/images/{id}` - Delete an image (owner only)
//! - `GET /api/v1` - API index
//! - `GET /health` - Health check endpoint
//!
//! `{id}` is always the identifier assigned by the upstream image host.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::{Identity, TokenVerifier};
use crate::error::ApiError;
use crate::model::{ContentType, ImageChanges, ImageRecord, NewImage};
use crate::store::ImageStore;
use crate::upstream::{ImageHost, ImagePatch, ImageUpload};

use super::gate::OwnedImage;

/// Path prefix all API routes are mounted under.
pub const API_PREFIX: &str = "/api/v1";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// Built once at startup and handed to the router; handlers receive it via
/// Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Metadata store for image records
    pub store: Arc<dyn ImageStore>,

    /// Upstream image host
    pub host: Arc<dyn ImageHost>,

    /// Access token verifier
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ImageStore>,
        host: Arc<dyn ImageHost>,
        verifier: TokenVerifier,
    ) -> Self {
        Self {
            store,
            host,
            verifier: Arc::new(verifier),
        }
    }
}

// =============================================================================
// Request Bodies
// =============================================================================

/// JSON body extractor that reports malformed or oversized bodies as 400.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Body of `POST /images` and `PUT /images/{id}`.
///
/// Every field is optional at the parsing level so that missing fields are
/// reported as validation errors rather than JSON errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBody {
    /// Base64-encoded image bytes
    pub data: Option<String>,

    /// One of `image/gif`, `image/jpeg`, `image/png`
    pub content_type: Option<String>,

    pub description: Option<String>,
}

/// Body of `PATCH /images/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBody {
    pub data: Option<String>,

    pub content_type: Option<String>,

    /// Absent leaves the description alone, `null` clears it
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
}

/// Deserialize a field that distinguishes "absent" from "null".
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Validation
// =============================================================================

/// Validate base64 image data.
fn validate_data(data: &str) -> Result<(), ApiError> {
    let data = data.trim();
    if data.is_empty() {
        return Err(ApiError::BadRequest("data must not be empty".to_string()));
    }
    BASE64
        .decode(data)
        .map_err(|e| ApiError::BadRequest(format!("data is not valid base64: {e}")))?;
    Ok(())
}

fn parse_content_type(value: &str) -> Result<ContentType, ApiError> {
    value
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))
}

/// Turn a create/replace body into an upstream upload.
///
/// Runs before any upstream call so invalid input never leaves the gateway.
pub fn validate_upload(body: &ImageBody) -> Result<ImageUpload, ApiError> {
    let data = body
        .data
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("data is required".to_string()))?;
    let content_type = body
        .content_type
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("contentType is required".to_string()))?;

    validate_data(data)?;
    let content_type = parse_content_type(content_type)?;

    Ok(ImageUpload {
        data: data.trim().to_string(),
        content_type,
    })
}

/// Split a patch body into the upstream part and the local part.
pub fn validate_patch(body: &PatchBody) -> Result<(ImagePatch, ImageChanges), ApiError> {
    if body.data.is_none() && body.content_type.is_none() && body.description.is_none() {
        return Err(ApiError::BadRequest("patch contains no fields".to_string()));
    }

    if let Some(data) = &body.data {
        validate_data(data)?;
    }
    let content_type = body
        .content_type
        .as_deref()
        .map(parse_content_type)
        .transpose()?;

    let upstream = ImagePatch {
        data: body.data.as_deref().map(|d| d.trim().to_string()),
        content_type,
    };
    let local = ImageChanges {
        description: body.description.clone(),
        content_type,
    };

    Ok((upstream, local))
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body returned for every error condition.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status_code: u16,

    /// Fixed, human-readable message for the status
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The fixed message clients see for this error.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => {
                "The request cannot or will not be processed due to something that is perceived to be a client error (for example, validation error)."
            }
            ApiError::Unauthorized(_) => "Access token invalid or not provided.",
            ApiError::Forbidden => {
                "The request contained valid data and was understood by the server, but the server is refusing action due to the authenticated user not having the necessary permissions for the resource."
            }
            ApiError::NotFound => "The requested resource was not found.",
            ApiError::Internal(_) => "An unexpected condition was encountered.",
        }
    }
}

/// Convert ApiError to HTTP response.
///
/// Internal details are logged, never returned:
/// - 5xx errors are logged at ERROR level
/// - 401/403 at WARN level
/// - 400/404 at DEBUG level
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Internal(detail) => {
                error!(status = status.as_u16(), "Server error: {}", detail);
            }
            ApiError::Unauthorized(_) | ApiError::Forbidden => {
                warn!(status = status.as_u16(), "Access denied: {}", self);
            }
            ApiError::BadRequest(_) | ApiError::NotFound => {
                debug!(status = status.as_u16(), "Client error: {}", self);
            }
        }

        let body = ErrorResponse {
            status_code: status.as_u16(),
            message: self.public_message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List the caller's images, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/images`
///
/// # Response
///
/// - `200 OK`: JSON array of image records
/// - `401 Unauthorized`: Missing or invalid access token
pub async fn list_images(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<ImageRecord>>, ApiError> {
    let images = state.store.list_by_owner(&identity.id).await?;
    debug!(owner = %identity.id, count = images.len(), "Listed images");
    Ok(Json(images))
}

/// Return the record loaded by the ownership gate.
///
/// # Endpoint
///
/// `GET /api/v1/images/{id}`
pub async fn get_image(OwnedImage(record): OwnedImage) -> Json<ImageRecord> {
    Json(record)
}

/// Upload an image and record its metadata.
///
/// # Endpoint
///
/// `POST /api/v1/images`
///
/// # Body
///
/// `{ "data": "<base64>", "contentType": "image/png", "description": "..." }`
///
/// # Response
///
/// - `201 Created`: The new record, with a `Location` header
/// - `400 Bad Request`: Missing or invalid `data` / `contentType`
/// - `500 Internal Server Error`: Upstream or store failure
pub async fn create_image(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<ImageBody>,
) -> Result<Response, ApiError> {
    let upload = validate_upload(&body)?;

    let uploaded = state.host.create(&upload).await?;

    let new_image = NewImage {
        owner_id: identity.id.clone(),
        owner_name: identity.username.clone(),
        upstream_id: uploaded.id.clone(),
        url: uploaded.image_url.clone(),
        description: body.description,
        content_type: upload.content_type,
    };

    let record = match state.store.insert(new_image).await {
        Ok(record) => record,
        Err(err) => {
            // The upstream already holds the image; try not to leave it orphaned.
            match state.host.delete(&uploaded.id).await {
                Ok(()) => warn!(upstream_id = %uploaded.id, "Rolled back upstream image after store failure"),
                Err(e) => error!(upstream_id = %uploaded.id, "Orphaned upstream image, rollback failed: {}", e),
            }
            return Err(err.into());
        }
    };

    info!(
        owner = %record.owner_id,
        upstream_id = %record.upstream_id,
        "Created image"
    );

    let location = format!(
        "{}/images/{}",
        API_PREFIX,
        urlencoding::encode(&record.upstream_id)
    );
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(record),
    )
        .into_response())
}

/// Replace an image's bytes and metadata.
///
/// # Endpoint
///
/// `PUT /api/v1/images/{id}`
///
/// `data` and `contentType` are required; an absent `description` clears it.
pub async fn replace_image(
    State(state): State<AppState>,
    OwnedImage(record): OwnedImage,
    ApiJson(body): ApiJson<ImageBody>,
) -> Result<StatusCode, ApiError> {
    let upload = validate_upload(&body)?;

    state.host.replace(&record.upstream_id, &upload).await?;

    let changes = ImageChanges {
        description: Some(body.description),
        content_type: Some(upload.content_type),
    };
    state
        .store
        .update(&record.id, &changes)
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(upstream_id = %record.upstream_id, "Replaced image");
    Ok(StatusCode::NO_CONTENT)
}

/// Partially update an image.
///
/// # Endpoint
///
/// `PATCH /api/v1/images/{id}`
///
/// The upstream is only contacted when `data` or `contentType` changes.
pub async fn patch_image(
    State(state): State<AppState>,
    OwnedImage(record): OwnedImage,
    ApiJson(body): ApiJson<PatchBody>,
) -> Result<StatusCode, ApiError> {
    let (upstream_patch, changes) = validate_patch(&body)?;

    if !upstream_patch.is_empty() {
        state
            .host
            .patch(&record.upstream_id, &upstream_patch)
            .await?;
    }

    state
        .store
        .update(&record.id, &changes)
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(upstream_id = %record.upstream_id, "Patched image");
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an image upstream, then locally.
///
/// # Endpoint
///
/// `DELETE /api/v1/images/{id}`
///
/// If the upstream delete fails the local record is kept.
pub async fn delete_image(
    State(state): State<AppState>,
    OwnedImage(record): OwnedImage,
) -> Result<StatusCode, ApiError> {
    state.host.delete(&record.upstream_id).await?;

    if !state.store.delete(&record.id).await? {
        debug!(image_id = %record.id, "Record already removed");
    }

    info!(upstream_id = %record.upstream_id, "Deleted image");
    Ok(StatusCode::NO_CONTENT)
}

/// API index listing the available resources.
///
/// # Endpoint
///
/// `GET /api/v1`
pub async fn index_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Image gateway API",
        "version": env!("CARGO_PKG_VERSION"),
        "links": {
            "images": format!("{API_PREFIX}/images"),
        }
    }))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

// =============================================================================
// Tests
// =============================================================================
