use thiserror::Error;

/// Errors raised by the metadata store backends
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Could not reach the database or acquire a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// A record with the same upstream id already exists
    #[error("Duplicate upstream id: {0}")]
    DuplicateUpstreamId(String),

    /// The backend rejected or failed a query
    #[error("Backend error: {0}")]
    Backend(String),

    /// A stored row could not be mapped back to a record
    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateUpstreamId(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Errors raised by the upstream image host client
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The upstream did not answer within the configured deadline
    #[error("Upstream timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The upstream has no image with this id
    #[error("Upstream image not found: {0}")]
    NotFound(String),

    /// The upstream answered with a non-success status
    #[error("Unexpected upstream status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The upstream answered 2xx but the body could not be parsed
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Whether an idempotent call that failed this way may be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Connection(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::UnexpectedStatus { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            UpstreamError::NotFound(_) | UpstreamError::InvalidResponse(_) => false,
        }
    }
}

/// Errors raised while verifying a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// No `Authorization` header on the request
    #[error("Missing authorization header")]
    MissingHeader,

    /// Header present but not of the form `Bearer <token>`
    #[error("Malformed authorization header")]
    MalformedHeader,

    /// Signature, algorithm or claim validation failed
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// The token's `exp` claim is in the past
    #[error("Token expired")]
    Expired,
}

/// Errors raised while loading the verifying key
#[derive(Debug, Clone, Error)]
pub enum KeyError {
    /// The configured key is not valid base64
    #[error("Public key is not valid base64: {0}")]
    Base64(String),

    /// The decoded key is not a PEM public key usable with the algorithm
    #[error("Public key is not a valid PEM key for {algorithm}: {message}")]
    Pem { algorithm: String, message: String },

    /// The configured algorithm is unknown or symmetric
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Startup configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("Invalid {name}: {message}")]
    InvalidUrl { name: &'static str, message: String },

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    /// The request deadline would cut off an upstream call still retrying
    #[error("request timeout {request:?} is shorter than the worst-case upstream call {upstream:?}")]
    RequestTimeoutTooShort {
        request: std::time::Duration,
        upstream: std::time::Duration,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error conditions surfaced by the HTTP API.
///
/// Every variant maps to one fixed status code and message; the payload
/// carried by `BadRequest` and `Internal` is only ever logged.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid access token
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] TokenError),

    /// The caller does not own the resource
    #[error("Forbidden")]
    Forbidden,

    /// The resource does not exist
    #[error("Not found")]
    NotFound,

    /// Anything else, including store and upstream failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(format!("store: {err}"))
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Internal(format!("upstream: {err}"))
    }
}
