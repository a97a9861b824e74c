//! HTTP server layer for the image gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │            /api/v1/images  ·  /api/v1/images/{id}               │
//! │                                                                 │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌────────────────┐   │
//! │  │   auth   │  │   gate   │  │ handlers │  │ routes/headers │   │
//! │  │ (bearer) │  │ (owner)  │  │ (CRUD)   │  │ (router config)│   │
//! │  └──────────┘  └──────────┘  └──────────┘  └────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                         │
//!          ImageStore (store)        ImageHost (upstream)
//! ```

pub mod auth;
pub mod deadline;
pub mod gate;
pub mod handlers;
pub mod headers;
pub mod routes;

pub use auth::require_identity;
pub use deadline::enforce_deadline;
pub use gate::{require_ownership, OwnedImage};
pub use handlers::{
    create_image, delete_image, get_image, health_handler, list_images, patch_image,
    replace_image, ApiJson, AppState, ErrorResponse, HealthResponse, ImageBody, PatchBody,
    API_PREFIX,
};
pub use headers::{with_security_headers, SECURITY_HEADERS};
pub use routes::{create_router, RouterConfig, DEFAULT_BODY_LIMIT, DEFAULT_REQUEST_TIMEOUT};
