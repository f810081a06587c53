pub mod commands;
pub mod config;
pub mod http;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod types;

pub use http::{ApiClient, ApiError, ErrorKind, RefreshMode, RequestOptions, RetryPolicy};
pub use storage::{StorageTier, TokenStore};
