//! reqwest-based client for the upstream image host.
//!
//! # Request Scheme
//!
//! ```text
//! POST   {base}/images        {data, contentType}   -> 2xx + JSON image
//! GET    {base}/images/{id}                         -> 2xx + JSON image
//! PUT    {base}/images/{id}   {data, contentType}   -> 2xx
//! PATCH  {base}/images/{id}   {data?, contentType?} -> 2xx
//! DELETE {base}/images/{id}                         -> 2xx
//! ```
//!
//! Every request carries the service credential in `X-API-Private-Token`.
//! Anything other than a 2xx status is an error. Each attempt is bounded by
//! the client timeout. GET, PUT and DELETE are retried with exponential
//! backoff on transport errors, timeouts, 429 and 5xx; POST and PATCH are
//! sent exactly once. A DELETE whose retry finds the image already gone is
//! treated as done, since an earlier timed-out attempt may have removed it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Method, StatusCode};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::UpstreamError;

use super::{ImageHost, ImagePatch, ImageUpload, UpstreamImage};

/// Header carrying the service-level credential.
pub const PRIVATE_TOKEN_HEADER: &str = "X-API-Private-Token";

/// Default per-attempt deadline.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of retries for idempotent calls.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay before the first retry; doubles on each further retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Upstream error bodies are truncated to this many characters in errors.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for [`HttpImageHost`].
#[derive(Debug, Clone)]
pub struct HttpImageHostConfig {
    /// Base URL of the image service; `images` is appended to it
    pub base_url: Url,

    /// Service credential sent in [`PRIVATE_TOKEN_HEADER`]
    pub private_token: String,

    /// Deadline for a single attempt
    pub timeout: Duration,

    /// Retries after the first attempt for idempotent calls
    pub max_retries: u32,

    /// Initial retry delay
    pub retry_backoff: Duration,
}

impl HttpImageHostConfig {
    /// Create a configuration with default timeout and retry policy.
    pub fn new(base_url: Url, private_token: impl Into<String>) -> Self {
        Self {
            base_url,
            private_token: private_token.into(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    /// Longest an idempotent call can take: every attempt timing out plus
    /// every backoff delay.
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.timeout.saturating_mul(self.max_retries.saturating_add(1));
        (0..self.max_retries).fold(attempts, |total, attempt| {
            total.saturating_add(self.backoff_for(attempt))
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// [`ImageHost`] that talks to the upstream service over HTTP.
#[derive(Clone)]
pub struct HttpImageHost {
    client: Client,
    config: HttpImageHostConfig,
}

impl HttpImageHost {
    /// Create a client with its own connection pool.
    pub fn new(config: HttpImageHostConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// The per-attempt deadline is still applied to every request.
    pub fn with_client(config: HttpImageHostConfig, client: Client) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HttpImageHostConfig {
        &self.config
    }

    /// Build `{base}/images` or `{base}/images/{id}`, percent-encoding the id.
    fn images_url(&self, id: Option<&str>) -> Result<Url, UpstreamError> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                UpstreamError::Connection(format!(
                    "base URL cannot carry a path: {}",
                    self.config.base_url
                ))
            })?;
            segments.pop_if_empty().push("images");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Send a request, retrying when `idempotent` and the failure allows it.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
        idempotent: bool,
    ) -> Result<reqwest::Response, UpstreamError> {
        self.send_counted(method, url, body, idempotent)
            .await
            .map_err(|(err, _)| err)
    }

    /// Like [`send`](Self::send), but failures also report how many attempts
    /// were made.
    async fn send_counted(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
        idempotent: bool,
    ) -> Result<reqwest::Response, (UpstreamError, u32)> {
        let max_retries = if idempotent { self.config.max_retries } else { 0 };
        let mut attempt = 0;

        loop {
            match self.send_once(method.clone(), url.clone(), body.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < max_retries && err.is_retryable() => {
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        method = %method,
                        url = %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Upstream call failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err((err, attempt + 1)),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut request = self
            .client
            .request(method, url.clone())
            .timeout(self.config.timeout)
            .header(PRIVATE_TOKEN_HEADER, &self.config.private_token)
            .header(header::ACCEPT, "application/json");

        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.config.timeout)
            } else {
                UpstreamError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), url = %url, "Upstream call succeeded");
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(url.path().to_string()));
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.chars().count() > MAX_ERROR_BODY {
            body = body.chars().take(MAX_ERROR_BODY).collect();
        }

        Err(UpstreamError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

fn json_body<T: Serialize>(value: &T) -> Result<Bytes, UpstreamError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| UpstreamError::InvalidResponse(format!("failed to encode request: {e}")))
}

async fn parse_image(response: reqwest::Response) -> Result<UpstreamImage, UpstreamError> {
    response
        .json::<UpstreamImage>()
        .await
        .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl ImageHost for HttpImageHost {
    #[instrument(skip(self, upload), fields(content_type = %upload.content_type))]
    async fn create(&self, upload: &ImageUpload) -> Result<UpstreamImage, UpstreamError> {
        let url = self.images_url(None)?;
        let response = self
            .send(Method::POST, url, Some(json_body(upload)?), false)
            .await?;
        parse_image(response).await
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: &str) -> Result<UpstreamImage, UpstreamError> {
        let url = self.images_url(Some(id))?;
        let response = self.send(Method::GET, url, None, true).await?;
        parse_image(response).await
    }

    #[instrument(skip(self, upload), fields(content_type = %upload.content_type))]
    async fn replace(&self, id: &str, upload: &ImageUpload) -> Result<(), UpstreamError> {
        let url = self.images_url(Some(id))?;
        self.send(Method::PUT, url, Some(json_body(upload)?), true)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn patch(&self, id: &str, patch: &ImagePatch) -> Result<(), UpstreamError> {
        let url = self.images_url(Some(id))?;
        self.send(Method::PATCH, url, Some(json_body(patch)?), false)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), UpstreamError> {
        let url = self.images_url(Some(id))?;
        match self.send_counted(Method::DELETE, url, None, true).await {
            Ok(_) => Ok(()),
            Err((UpstreamError::NotFound(path), attempts)) if attempts > 1 => {
                info!(path = %path, attempts, "Image gone on retried delete, treating as deleted");
                Ok(())
            }
            Err((err, _)) => Err(err),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
