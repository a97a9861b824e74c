//! Bearer token middleware.
//!
//! Every `/images` route sits behind [`require_identity`]. It verifies the
//! `Authorization: Bearer <token>` header and stores the caller's [`Identity`]
//! in the request extensions, where handlers pick it up with the `Identity`
//! extractor. Requests that fail verification never reach a handler.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use image_gateway::server::auth::require_identity;
//!
//! let verifier = Arc::new(TokenVerifier::from_base64_pem(&key, Algorithm::RS256)?);
//! let app = Router::new()
//!     .route("/images", get(list_images))
//!     .route_layer(middleware::from_fn_with_state(verifier, require_identity));
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::{Identity, TokenVerifier};
use crate::error::{ApiError, TokenError};

/// Axum middleware that authenticates the caller.
///
/// Rejects with 401 when the header is missing, malformed, or the token
/// does not verify.
pub async fn require_identity(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| TokenError::MalformedHeader))
            .transpose()?;
        verifier.verify_header(header)?
    };

    debug!(user = %identity.id, "Authenticated request");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Extracts the identity attached by [`require_identity`].
///
/// Used on a route without the middleware, it rejects with 401.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::Unauthorized(TokenError::MissingHeader))
    }
}
