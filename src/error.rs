//! Error types for the `hmt-engine` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, EngineError>`.
//!
//! [`EngineError`] covers:
//! - **Broker errors** — Structured error responses from the broker's order API
//! - **Store errors** — Error responses from the durable store's REST surface
//! - **HTTP status errors** — Unexpected status codes with response body
//! - **HTTP transport errors** — Network, TLS, timeout failures
//! - **JSON errors** — Deserialization failures
//! - **WebSocket errors** — Feed and realtime connection failures
//! - **Risk rejections** — A trigger blocked by the user's risk limits
//! - **Invalid arguments** — Client-side validation errors

use std::fmt;

/// Error response returned by the upstream broker API.
///
/// The broker replies with `{"status": "error", "message": ..., "error_type": ...}`
/// for rejected requests; `message` carries the human-readable reason that the
/// executor's retry classifier inspects.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BrokerErrorBody {
    /// Reply status, `"error"` for rejections.
    #[serde(default)]
    pub status: Option<String>,
    /// Broker's error category (e.g. `"InputException"`).
    #[serde(default)]
    pub error_type: Option<String>,
    /// Human-readable description of the rejection.
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for BrokerErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.error_type.as_deref().unwrap_or("UnknownError"),
            self.message.as_deref().unwrap_or("No message"),
        )
    }
}

/// All possible errors produced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An error response returned by the broker's REST API.
    #[error("broker error: {0}")]
    Broker(BrokerErrorBody),

    /// An error response returned by the durable store.
    #[error("store error: HTTP {status}: {body}")]
    Store {
        /// The HTTP status code.
        status: reqwest::StatusCode,
        /// The response body text.
        body: String,
    },

    /// The server returned an unexpected HTTP status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: reqwest::StatusCode,
        /// The response body text.
        body: String,
    },

    /// A network or transport-level error from `reqwest`.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to deserialize a JSON body.
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A WebSocket-level error from the feed or the realtime subscription.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An error building or parsing a URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The trigger was blocked by the owning user's risk limits.
    #[error("risk rejection: {0}")]
    Risk(String),

    /// The caller provided an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    /// The human-readable reason persisted when a trigger fails on this error.
    pub fn reason(&self) -> String {
        match self {
            Self::Broker(body) => body
                .message
                .clone()
                .unwrap_or_else(|| body.to_string()),
            other => other.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
