//! Whole-request deadline.
//!
//! A request still running when the deadline passes is dropped and answered
//! with the standard 500 error body.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

/// Axum middleware bounding the time spent on one request.
pub async fn enforce_deadline(
    State(deadline): State<Duration>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tokio::time::timeout(deadline, next.run(request))
        .await
        .map_err(|_| {
            ApiError::Internal(format!(
                "{method} {path} exceeded the {deadline:?} request deadline"
            ))
        })
}
