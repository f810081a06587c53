//! The single failure shape handed to callers of [`ApiClient`](super::ApiClient).

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

pub const NETWORK_ERROR_MSG: &str = "Network error. Please check your internet connection.";
const SERVER_ERROR_MSG: &str = "An error occurred";
const UNEXPECTED_ERROR_MSG: &str = "An unexpected error occurred";

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    /// 401 that could not be recovered by a token refresh.
    AuthExpired,
    /// No response was received (connect failure, timeout).
    NetworkUnavailable,
    /// The server answered with a non-2xx status other than 401.
    ServerRejected,
    #[default]
    Unknown,
}

/// Normalized error: `{success: false, msg, error?, details?}`.
///
/// `kind` and `status` are local metadata and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip)]
    pub kind: ErrorKind,
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ApiError {
    pub fn network() -> Self {
        Self {
            success: false,
            msg: NETWORK_ERROR_MSG.to_string(),
            error: Some(NETWORK_ERROR.to_string()),
            details: None,
            kind: ErrorKind::NetworkUnavailable,
            status: None,
        }
    }

    /// Anything that is neither a server answer nor a missing response.
    pub fn unknown(cause: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            msg: UNEXPECTED_ERROR_MSG.to_string(),
            error: Some(UNKNOWN_ERROR.to_string()),
            details: Some(Value::String(cause.to_string())),
            kind: ErrorKind::Unknown,
            status: None,
        }
    }

    /// Builds the error for a non-2xx answer, keeping whatever `msg`,
    /// `error` and body the server supplied.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let details = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(_) if body.iter().all(u8::is_ascii_whitespace) => None,
            Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
        };

        let field = |name: &str| {
            details
                .as_ref()
                .and_then(|d| d.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let kind = if status == StatusCode::UNAUTHORIZED {
            ErrorKind::AuthExpired
        } else {
            ErrorKind::ServerRejected
        };

        Self {
            success: false,
            msg: field("msg").unwrap_or_else(|| SERVER_ERROR_MSG.to_string()),
            error: Some(field("error").unwrap_or_else(|| UNKNOWN_ERROR.to_string())),
            details,
            kind,
            status: Some(status.as_u16()),
        }
    }

    pub(crate) async fn from_response(response: Response) -> Self {
        let status = response.status();
        match response.bytes().await {
            Ok(body) => Self::from_status(status, &body),
            Err(_) => Self::from_status(status, &[]),
        }
    }

    /// Classifies an error raised by the transport before any response arrived.
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            Self::network()
        } else {
            Self::unknown(error)
        }
    }

    /// The machine-readable error code, if any.
    pub fn code(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_auth_expired(&self) -> bool {
        self.kind == ErrorKind::AuthExpired
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for ApiError {}

/// Extracts a message suitable for showing to a user.
pub fn error_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ApiError>() {
        Some(api_error) => api_error.msg.clone(),
        None => {
            let message = error.to_string();
            if message.is_empty() {
                UNEXPECTED_ERROR_MSG.to_string()
            } else {
                message
            }
        }
    }
}
