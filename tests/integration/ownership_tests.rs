//! Ownership integration tests.
//!
//! Only the user recorded as an image's owner may read or change it. A
//! non-owner gets 403 and nothing reaches the upstream or the store.

use axum::http::{Method, StatusCode};
use serde_json::json;

use super::test_utils::{assert_error_body, image_body, TestApp, ALICE, BOB};

const FORBIDDEN_MESSAGE: &str = "The request contained valid data and was understood by the server, but the server is refusing action due to the authenticated user not having the necessary permissions for the resource.";

#[tokio::test]
async fn test_non_owner_is_forbidden_on_every_method() {
    let app = TestApp::new();
    let record = app.seed(ALICE, "alice-img").await;
    let uri = "/api/v1/images/alice-img";

    let attempts = [
        (Method::GET, None),
        (Method::PUT, Some(image_body("image/png", Some("mine now")))),
        (Method::PATCH, Some(json!({ "description": "mine now" }))),
        (Method::DELETE, None),
    ];

    for (method, body) in attempts {
        let (status, _, response) = app.call(method.clone(), uri, Some(BOB), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "method: {method}");
        assert_error_body(&response, StatusCode::FORBIDDEN);
        assert_eq!(response["message"], FORBIDDEN_MESSAGE);
    }

    assert_eq!(app.host.call_count().await, 0);
    assert_eq!(app.store.inner().get(&record.id).await.unwrap(), record);
}

#[tokio::test]
async fn test_owner_is_allowed() {
    let app = TestApp::new();
    app.seed(ALICE, "alice-img").await;

    let (status, _, body) = app
        .call(Method::GET, "/api/v1/images/alice-img", Some(ALICE), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ownerId"], ALICE.id);
}

#[tokio::test]
async fn test_missing_image_is_not_found_for_everyone() {
    let app = TestApp::new();

    for method in [Method::GET, Method::DELETE] {
        let (status, _, _) = app
            .call(method, "/api/v1/images/ghost", Some(BOB), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_invalid_body_from_non_owner_is_still_forbidden() {
    let app = TestApp::new();
    app.seed(ALICE, "alice-img").await;

    let (status, _, _) = app
        .call(
            Method::PUT,
            "/api/v1/images/alice-img",
            Some(BOB),
            Some(json!({ "nonsense": true })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_never_shows_other_users_images() {
    let app = TestApp::new();
    app.seed(ALICE, "alice-img").await;

    let (status, _, body) = app
        .call(Method::GET, "/api/v1/images", Some(BOB), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_owner_cannot_change_owner_or_upstream_id() {
    let app = TestApp::new();
    let record = app.seed(ALICE, "alice-img").await;

    let (status, _, _) = app
        .call(
            Method::PATCH,
            "/api/v1/images/alice-img",
            Some(ALICE),
            Some(json!({
                "description": "updated",
                "ownerId": BOB.id,
                "upstreamId": "stolen",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let updated = app.store.inner().get(&record.id).await.unwrap();
    assert_eq!(updated.owner_id, ALICE.id);
    assert_eq!(updated.upstream_id, "alice-img");
    assert_eq!(updated.description.as_deref(), Some("updated"));
}
