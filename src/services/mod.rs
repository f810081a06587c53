//! Endpoint wrappers built on [`ApiClient`](crate::http::ApiClient).

pub mod auth;
pub mod events;
