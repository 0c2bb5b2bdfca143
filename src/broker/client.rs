//! HTTP client for the upstream broker REST API.
//!
//! Wraps [`reqwest::Client`] with the broker's token authentication and the
//! response/error handling every endpoint shares. Auth header values are
//! cached at construction time to avoid per-request allocation.

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{BrokerErrorBody, EngineError, Result};

/// Authenticated client for one broker account.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    base_url: String,
    /// Pre-built `Authorization` value: `token {api_key}:{access_token}`.
    auth_header: HeaderValue,
}

impl BrokerClient {
    /// Create a client for the given account credentials.
    pub fn new(
        base_url: impl Into<String>,
        api_key: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(Self::default_headers())
            .timeout(timeout)
            .build()?;

        let auth_header = HeaderValue::from_str(&format!("token {api_key}:{access_token}"))
            .map_err(|_| {
                EngineError::InvalidArgument(
                    "broker credentials contain invalid header characters".into(),
                )
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth_header,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a form-encoded POST and deserialize the JSON response.
    pub async fn post_form<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        form: &B,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "POST (form)");

        let resp = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header.clone())
            .form(form)
            .send()
            .await?;

        self.handle_response(resp).await
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Read a response, returning either the deserialized body or a typed
    /// broker error. Uses `bytes()` + `from_slice()` to skip the UTF-8
    /// validation `text()` would incur.
    async fn handle_response<R: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<R> {
        let status = resp.status();
        let bytes = resp.bytes().await.unwrap_or_default();

        if status.is_success() {
            serde_json::from_slice(&bytes).map_err(EngineError::Json)
        } else {
            let body = String::from_utf8_lossy(&bytes);
            Err(parse_error_body(status, &body))
        }
    }
}

/// Try to parse the broker's JSON error envelope; fall back to a raw HTTP
/// status error.
pub(crate) fn parse_error_body(status: reqwest::StatusCode, body: &str) -> EngineError {
    if let Ok(api_err) = serde_json::from_str::<BrokerErrorBody>(body) {
        if api_err.message.is_some() || api_err.error_type.is_some() {
            return EngineError::Broker(api_err);
        }
    }
    EngineError::HttpStatus {
        status,
        body: body.to_owned(),
    }
}
