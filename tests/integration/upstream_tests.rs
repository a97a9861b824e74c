//! Upstream client integration tests.
//!
//! A fake image service runs on a local port and `HttpImageHost` talks to it
//! over real HTTP. Tests verify:
//! - The service credential is sent on every call
//! - Request bodies use the upstream's camelCase shape
//! - Non-2xx answers become errors, 404 is reported as not found
//! - Idempotent calls are retried on 5xx, POST is sent once
//! - Slow answers hit the per-attempt timeout

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use image_gateway::error::UpstreamError;
use image_gateway::model::ContentType;
use image_gateway::upstream::{
    HttpImageHost, HttpImageHostConfig, ImageHost, ImagePatch, ImageUpload, PRIVATE_TOKEN_HEADER,
};

const SERVICE_TOKEN: &str = "service-secret";

// =============================================================================
// Fake Image Service
// =============================================================================

#[derive(Default)]
struct FakeService {
    hits: Mutex<HashMap<String, usize>>,
    tokens: Mutex<Vec<Option<String>>>,
    bodies: Mutex<Vec<Value>>,
}

impl FakeService {
    async fn hit(&self, key: String, headers: &HeaderMap) -> usize {
        self.tokens.lock().await.push(
            headers
                .get(PRIVATE_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        let mut hits = self.hits.lock().await;
        let count = hits.entry(key).or_default();
        *count += 1;
        *count
    }

    async fn hits(&self, key: &str) -> usize {
        self.hits.lock().await.get(key).copied().unwrap_or(0)
    }
}

type Shared = Arc<FakeService>;

async fn create(
    State(service): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    service.hit("POST".to_string(), &headers).await;
    service.bodies.lock().await.push(body.clone());

    if body["contentType"] == "image/gif" {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "id": "up-1",
            "imageUrl": "https://cdn.example.com/up-1.png",
            "contentType": body["contentType"],
            "createdAt": "2024-01-01T00:00:00Z",
        })),
    )
        .into_response()
}

async fn fetch(
    State(service): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    let count = service.hit(format!("GET {id}"), &headers).await;

    match id.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "flaky" if count <= 2 => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK.into_response()
        }
        "garbled" => (StatusCode::OK, "not json").into_response(),
        _ => Json(json!({
            "id": id,
            "imageUrl": format!("https://cdn.example.com/{id}.png"),
        }))
        .into_response(),
    }
}

async fn replace(
    State(service): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    service.hit(format!("PUT {id}"), &headers).await;
    service.bodies.lock().await.push(body);
    StatusCode::NO_CONTENT
}

async fn patch(
    State(service): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    service.hit(format!("PATCH {id}"), &headers).await;
    service.bodies.lock().await.push(body);
    if id == "broken" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn delete(
    State(service): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    let count = service.hit(format!("DELETE {id}"), &headers).await;
    match id.as_str() {
        "broken" => StatusCode::INTERNAL_SERVER_ERROR,
        "forbidden" => StatusCode::FORBIDDEN,
        "missing" => StatusCode::NOT_FOUND,
        // Deleted on the first call, but the answer arrives too late.
        "vanishing" if count == 1 => {
            tokio::time::sleep(Duration::from_millis(400)).await;
            StatusCode::NO_CONTENT
        }
        "vanishing" => StatusCode::NOT_FOUND,
        _ => StatusCode::NO_CONTENT,
    }
}

/// Start the fake service and return its base URL.
async fn start_fake_service() -> (Url, Shared) {
    let service = Shared::default();
    let app = Router::new()
        .route("/v1/images", post(create))
        .route(
            "/v1/images/{id}",
            get(fetch).put(replace).patch(patch).delete(delete),
        )
        .with_state(service.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = Url::parse(&format!("http://{addr}/v1/")).unwrap();
    (base, service)
}

fn client(base: Url) -> HttpImageHost {
    let config = HttpImageHostConfig::new(base, SERVICE_TOKEN)
        .with_timeout(Duration::from_millis(500))
        .with_max_retries(2)
        .with_retry_backoff(Duration::from_millis(10));
    HttpImageHost::new(config).unwrap()
}

fn png_upload() -> ImageUpload {
    ImageUpload {
        data: "iVBORw0KGgo=".to_string(),
        content_type: ContentType::Png,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_create_sends_credential_and_body() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let image = host.create(&png_upload()).await.unwrap();
    assert_eq!(image.id, "up-1");
    assert_eq!(image.image_url, "https://cdn.example.com/up-1.png");
    assert_eq!(image.content_type.as_deref(), Some("image/png"));

    assert_eq!(
        service.tokens.lock().await.clone(),
        vec![Some(SERVICE_TOKEN.to_string())]
    );
    assert_eq!(
        service.bodies.lock().await[0],
        json!({ "data": "iVBORw0KGgo=", "contentType": "image/png" })
    );
}

#[tokio::test]
async fn test_create_is_not_retried() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let upload = ImageUpload {
        data: "R0lGODlh".to_string(),
        content_type: ContentType::Gif,
    };
    let err = host.create(&upload).await.unwrap_err();

    assert!(matches!(
        err,
        UpstreamError::UnexpectedStatus { status: 503, ref body } if body == "busy"
    ));
    assert_eq!(service.hits("POST").await, 1);
}

#[tokio::test]
async fn test_fetch_retries_until_success() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let image = host.fetch("flaky").await.unwrap();
    assert_eq!(image.id, "flaky");
    assert_eq!(service.hits("GET flaky").await, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let err = host.fetch("missing").await.unwrap_err();
    assert!(matches!(err, UpstreamError::NotFound(_)));
    assert_eq!(service.hits("GET missing").await, 1);
}

#[tokio::test]
async fn test_invalid_success_body() {
    let (base, _service) = start_fake_service().await;
    let host = client(base);

    let err = host.fetch("garbled").await.unwrap_err();
    assert!(matches!(err, UpstreamError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let (base, service) = start_fake_service().await;
    let config = HttpImageHostConfig::new(base, SERVICE_TOKEN)
        .with_timeout(Duration::from_millis(100))
        .with_max_retries(0);
    let host = HttpImageHost::new(config).unwrap();

    let err = host.fetch("slow").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Timeout(_)));
    assert_eq!(service.hits("GET slow").await, 1);
}

#[tokio::test]
async fn test_delete_retries_then_fails() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let err = host.delete("broken").await.unwrap_err();
    assert!(matches!(
        err,
        UpstreamError::UnexpectedStatus { status: 500, .. }
    ));
    assert_eq!(service.hits("DELETE broken").await, 3);
}

#[tokio::test]
async fn test_delete_gone_after_timed_out_attempt_succeeds() {
    let (base, service) = start_fake_service().await;
    let config = HttpImageHostConfig::new(base, SERVICE_TOKEN)
        .with_timeout(Duration::from_millis(100))
        .with_max_retries(2)
        .with_retry_backoff(Duration::from_millis(10));
    let host = HttpImageHost::new(config).unwrap();

    host.delete("vanishing").await.unwrap();
    assert_eq!(service.hits("DELETE vanishing").await, 2);
}

#[tokio::test]
async fn test_delete_missing_on_first_attempt_is_not_found() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let err = host.delete("missing").await.unwrap_err();
    assert!(matches!(err, UpstreamError::NotFound(_)));
    assert_eq!(service.hits("DELETE missing").await, 1);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let err = host.delete("forbidden").await.unwrap_err();
    assert!(matches!(
        err,
        UpstreamError::UnexpectedStatus { status: 403, .. }
    ));
    assert_eq!(service.hits("DELETE forbidden").await, 1);
}

#[tokio::test]
async fn test_replace_and_delete_succeed() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    host.replace("up-1", &png_upload()).await.unwrap();
    host.delete("up-1").await.unwrap();

    assert_eq!(service.hits("PUT up-1").await, 1);
    assert_eq!(service.hits("DELETE up-1").await, 1);
}

#[tokio::test]
async fn test_patch_sends_only_present_fields_once() {
    let (base, service) = start_fake_service().await;
    let host = client(base);

    let patch = ImagePatch {
        data: None,
        content_type: Some(ContentType::Jpeg),
    };
    host.patch("up-1", &patch).await.unwrap();
    assert_eq!(
        service.bodies.lock().await[0],
        json!({ "contentType": "image/jpeg" })
    );

    let err = host.patch("broken", &patch).await.unwrap_err();
    assert!(matches!(
        err,
        UpstreamError::UnexpectedStatus { status: 500, .. }
    ));
    assert_eq!(service.hits("PATCH broken").await, 1);
}

#[tokio::test]
async fn test_unreachable_upstream_is_connection_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = HttpImageHostConfig::new(
        Url::parse(&format!("http://{addr}/")).unwrap(),
        SERVICE_TOKEN,
    )
    .with_max_retries(1)
    .with_retry_backoff(Duration::from_millis(1));
    let host = HttpImageHost::new(config).unwrap();

    let err = host.fetch("anything").await.unwrap_err();
    assert!(matches!(err, UpstreamError::Connection(_)));
}
