//! Authenticated HTTP client with token refresh and error normalization.

mod client;
mod error;
mod refresh;
mod retry;

pub use client::{ApiClient, DEFAULT_TIMEOUT, RequestOptions};
pub use error::{
    ApiError, ErrorKind, NETWORK_ERROR, NETWORK_ERROR_MSG, UNKNOWN_ERROR, error_message,
};
pub use refresh::{REFRESH_PATH, RefreshMode};
pub use retry::{MUTATION_MAX_RETRIES, QUERY_MAX_RETRIES, RetryPolicy};
