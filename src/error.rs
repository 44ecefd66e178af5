//! Classified failures of the remote job service.
//! Every call into the service resolves to one of these variants; the session
//! recovery logic decides what to do purely from `ApiError::kind`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error envelope returned by the job service on non-success responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Rejected,
    Server,
    Network,
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{status}: {message}")]
    NotFound { status: u16, code: String, message: String, details: Option<serde_json::Value> },
    #[error("{status}: {message}")]
    Rejected { status: u16, code: String, message: String, details: Option<serde_json::Value> },
    #[error("{status}: {message}")]
    Server { status: u16, code: String, message: String, details: Option<serde_json::Value> },
    #[error("{message}")]
    Network { message: String },
}

pub type AppResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self {
        ApiError::NotFound { status: 404, code: code.into(), message: msg.into(), details: None }
    }
    pub fn rejected<S: Into<String>>(status: u16, code: S, msg: S) -> Self {
        ApiError::Rejected { status, code: code.into(), message: msg.into(), details: None }
    }
    pub fn server<S: Into<String>>(status: u16, code: S, msg: S) -> Self {
        ApiError::Server { status, code: code.into(), message: msg.into(), details: None }
    }
    pub fn network<S: Into<String>>(msg: S) -> Self {
        ApiError::Network { message: msg.into() }
    }

    /// Classify a non-success response. An unparseable body, or one without a
    /// message, yields the synthesized `Request failed (<status>)` message.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let envelope: ErrorEnvelope = serde_json::from_slice(body).unwrap_or_default();
        let message = if envelope.message.is_empty() {
            format!("Request failed ({})", status)
        } else {
            envelope.message
        };
        let code = if envelope.error.is_empty() { "request_failed".to_string() } else { envelope.error };
        let details = envelope.details;
        match status {
            404 => ApiError::NotFound { status, code, message, details },
            400..=499 => ApiError::Rejected { status, code, message, details },
            _ => ApiError::Server { status, code, message, details },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Rejected { .. } => ErrorKind::Rejected,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Network { .. } => ErrorKind::Network,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Transport status code; `None` when no response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { status, .. }
            | ApiError::Rejected { status, .. }
            | ApiError::Server { status, .. } => Some(*status),
            ApiError::Network { .. } => None,
        }
    }

    pub fn code_str(&self) -> &str {
        match self {
            ApiError::NotFound { code, .. }
            | ApiError::Rejected { code, .. }
            | ApiError::Server { code, .. } => code.as_str(),
            ApiError::Network { .. } => "network_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound { message, .. }
            | ApiError::Rejected { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Network { message } => message.as_str(),
        }
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::NotFound { details, .. }
            | ApiError::Rejected { details, .. }
            | ApiError::Server { details, .. } => details.as_ref(),
            ApiError::Network { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // A body that arrived but did not decode is the service's fault, not the network's
        if err.is_decode() {
            let status = err.status().map(|s| s.as_u16()).unwrap_or(200);
            return ApiError::server(status, "invalid_response".to_string(), format!("invalid response body: {}", err));
        }
        ApiError::Network { message: format!("network failure: {}", err) }
    }
}

/// A request that could not be encoded never reached the service; it carries no
/// status, like a transport failure.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Network { message: format!("failed to encode request: {}", err) }
    }
}
