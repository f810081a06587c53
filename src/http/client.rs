//! Request pipeline: attach the bearer token, dispatch, decode or normalize.

use log::{debug, warn};
use reqwest::{
    Client, Method, Request, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;

use super::error::ApiError;
use super::refresh::RefreshMode;
use super::retry::{RetryPolicy, with_retry};
use crate::storage::TokenStore;

/// Upper bound for a single request, including the body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call extras layered on top of the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client for the registration backend.
///
/// Every verb goes through the same pipeline: the stored access token is
/// attached, the request is sent, and a 401 triggers at most one token
/// refresh followed by at most one replay. All failures come back as
/// [`ApiError`].
///
/// Retries are off unless a [`RetryPolicy`] is set. GETs follow the query
/// policy, every other verb the mutation policy. A failed replay clears the
/// session, so a retried attempt can never start a second refresh.
pub struct ApiClient {
    pub(super) client: Client,
    pub(super) base_url: String,
    pub(super) tokens: TokenStore,
    pub(super) refresh_mode: RefreshMode,
    pub(super) refresh_gate: tokio::sync::Mutex<()>,
    query_retry: RetryPolicy,
    mutation_retry: RetryPolicy,
}

impl ApiClient {
    /// Creates a client with the default timeout and JSON headers.
    pub fn new(base_url: impl Into<String>, tokens: TokenStore) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("evreg/", env!("EVREG_VERSION")))
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self::with_client(client, base_url, tokens))
    }

    /// Wraps an already configured reqwest Client.
    pub fn with_client(client: Client, base_url: impl Into<String>, tokens: TokenStore) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            tokens,
            refresh_mode: RefreshMode::default(),
            refresh_gate: tokio::sync::Mutex::new(()),
            query_retry: RetryPolicy::none(),
            mutation_retry: RetryPolicy::none(),
        }
    }

    pub fn with_refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.refresh_mode = mode;
        self
    }

    pub fn with_query_retry(mut self, policy: RetryPolicy) -> Self {
        self.query_retry = policy;
        self
    }

    pub fn with_mutation_retry(mut self, policy: RetryPolicy) -> Self {
        self.mutation_retry = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn set_access_token(&self, token: &str) {
        self.tokens.set_access_token(token);
    }

    pub fn clear_access_token(&self) {
        self.tokens.clear_access_token();
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.refresh_token()
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.tokens.set_refresh_token(token);
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    /// Resolves a path against the base URL. Absolute URLs pass through.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::GET, url, None, &options).await
    }

    pub async fn post<T, B>(
        &self,
        url: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.request(Method::POST, url, body, &options).await
    }

    pub async fn put<T, B>(
        &self,
        url: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.request(Method::PUT, url, body, &options).await
    }

    pub async fn patch<T, B>(
        &self,
        url: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json(body)?;
        self.request(Method::PATCH, url, body, &options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::DELETE, url, None, &options).await
    }

    #[tracing::instrument(skip(self, body, options))]
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        let policy = if method == Method::GET {
            &self.query_retry
        } else {
            &self.mutation_retry
        };

        with_retry(policy, url, || {
            self.attempt(method.clone(), url, body.as_ref(), options)
        })
        .await
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        let mut request = self.build(method, url, body, options)?;

        let sent_token = self.tokens.access_token();
        if let Some(token) = &sent_token {
            set_bearer(&mut request, token);
        }

        // JSON bodies are buffered, so this only yields None for streams.
        let replay = request.try_clone();

        debug!("{} {}", request.method(), request.url());

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                return Err(ApiError::from_transport(&e));
            }
        };

        match response.status() {
            status if status.is_success() => decode(response).await,
            StatusCode::UNAUTHORIZED => {
                self.resolve_unauthorized(response, replay, sent_token)
                    .await
            }
            status => {
                debug!("{} answered {}", url, status);
                Err(ApiError::from_response(response).await)
            }
        }
    }

    fn build(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Request, ApiError> {
        let mut builder = self.client.request(method, self.endpoint(url));

        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.build().map_err(ApiError::unknown)
    }

    /// Handles a 401: one refresh, then one replay of the original request.
    async fn resolve_unauthorized<T: DeserializeOwned>(
        &self,
        response: Response,
        replay: Option<Request>,
        sent_token: Option<String>,
    ) -> Result<T, ApiError> {
        let original = ApiError::from_response(response).await;

        let Some(mut replay) = replay else {
            warn!("Request cannot be replayed, dropping session");
            self.tokens.clear_access_token();
            return Err(original);
        };

        if !self.refresh_after_rejection(sent_token.as_deref()).await {
            debug!("Token refresh unavailable, clearing session");
            self.tokens.clear_access_token();
            return Err(original);
        }

        if let Some(token) = self.tokens.access_token() {
            set_bearer(&mut replay, &token);
        }

        debug!("Replaying {} {}", replay.method(), replay.url());

        match self.client.execute(replay).await {
            Ok(response) if response.status().is_success() => decode(response).await,
            Ok(response) => {
                warn!("Replay answered {}, clearing session", response.status());
                self.tokens.clear_access_token();
                Err(ApiError::from_response(response).await)
            }
            Err(e) => {
                warn!("Replay failed: {}", e);
                self.tokens.clear_access_token();
                Err(ApiError::from_transport(&e))
            }
        }
    }
}

fn to_json<B: Serialize + ?Sized>(body: Option<&B>) -> Result<Option<Value>, ApiError> {
    body.map(serde_json::to_value)
        .transpose()
        .map_err(|e| ApiError::unknown(format!("Failed to serialize request body: {}", e)))
}

fn set_bearer(request: &mut Request, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(_) => warn!("Stored access token is not a valid header value, sending without it"),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::from_transport(&e))?;

    let parsed = if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(&bytes)
    };

    parsed.map_err(|e| ApiError::unknown(format!("Failed to parse response: {}", e)))
}
