//! Ownership gate for single-image routes.
//!
//! [`require_ownership`] runs after the token middleware on every
//! `/images/{id}` route:
//!
//! ```text
//! {id} ──► store.find_by_upstream_id ──► None            ──► 404
//!                                    └─► owner != caller ──► 403
//!                                    └─► owner == caller ──► OwnedImage ──► handler
//! ```
//!
//! The loaded record travels to the handler in the request extensions, so
//! handlers never look it up a second time.

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::Identity;
use crate::error::{ApiError, TokenError};
use crate::model::ImageRecord;

use super::handlers::AppState;

/// A record the authenticated caller has been confirmed to own.
#[derive(Debug, Clone)]
pub struct OwnedImage(pub ImageRecord);

/// Axum middleware that loads the image named by `{id}` and checks ownership.
pub async fn require_ownership(
    State(state): State<AppState>,
    Path(upstream_id): Path<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or(ApiError::Unauthorized(TokenError::MissingHeader))?;

    let record = state
        .store
        .find_by_upstream_id(&upstream_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !record.is_owned_by(&identity.id) {
        warn!(
            user = %identity.id,
            owner = %record.owner_id,
            upstream_id = %upstream_id,
            "Caller does not own image"
        );
        return Err(ApiError::Forbidden);
    }

    request.extensions_mut().insert(OwnedImage(record));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for OwnedImage
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OwnedImage>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("ownership gate did not run".to_string()))
    }
}
