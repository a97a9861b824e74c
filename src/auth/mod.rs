//! Access token verification and caller identity.

pub mod token;

pub use token::{
    bearer_token, parse_algorithm, Claims, Identity, TokenVerifier, DEFAULT_TOKEN_ALGORITHM,
};
