//! REST client core for the durable store.
//!
//! The store speaks PostgREST conventions: tables under `/rest/v1/{table}`
//! addressed with query-string filters (`id=eq.{uuid}`), stored procedures
//! under `/rest/v1/rpc/{name}`. The service key authenticates via both the
//! `apikey` header and a bearer token; both values are cached at
//! construction to avoid per-request allocation.
//!
//! Domain methods are added to [`StoreClient`] via `impl` blocks in the
//! sibling modules.

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::constants::store_paths::{REST_PREFIX, RPC_PREFIX};
use crate::error::{EngineError, Result};

/// Authenticated client for the store's REST surface.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    auth_header_apikey: HeaderValue,
    auth_header_bearer: HeaderValue,
}

impl StoreClient {
    /// Create a client from the store URL and service key.
    pub fn new(base_url: impl Into<String>, service_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(Self::default_headers())
            .timeout(timeout)
            .build()?;

        let auth_header_apikey = HeaderValue::from_str(service_key).map_err(|_| {
            EngineError::InvalidArgument("service key contains invalid header characters".into())
        })?;
        let auth_header_bearer =
            HeaderValue::from_str(&format!("Bearer {service_key}")).map_err(|_| {
                EngineError::InvalidArgument(
                    "service key contains invalid header characters".into(),
                )
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            auth_header_apikey,
            auth_header_bearer,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Generic REST helpers
    // -----------------------------------------------------------------------

    /// `GET /rest/v1/{table}?{query}` — rows matching the filter.
    pub async fn select<R: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<R>> {
        let url = format!("{}{REST_PREFIX}/{table}?{query}", self.base_url);
        tracing::debug!(%url, "store GET");

        let resp = self
            .http
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `POST /rest/v1/{table}` — insert, returning the created rows.
    pub async fn insert<B: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<R>> {
        let url = format!("{}{REST_PREFIX}/{table}", self.base_url);
        tracing::debug!(%url, "store POST");

        let resp = self
            .http
            .post(&url)
            .headers(self.auth_headers())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `PATCH /rest/v1/{table}?{query}` — conditional update, returning the
    /// rows that actually changed. An empty result means the filter matched
    /// nothing; conditional transitions rely on that.
    pub async fn update<B: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        body: &B,
    ) -> Result<Vec<R>> {
        let url = format!("{}{REST_PREFIX}/{table}?{query}", self.base_url);
        tracing::debug!(%url, "store PATCH");

        let resp = self
            .http
            .patch(&url)
            .headers(self.auth_headers())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `POST /rest/v1/rpc/{name}` — call a stored procedure.
    pub async fn rpc<B: Serialize, R: DeserializeOwned>(&self, name: &str, args: &B) -> Result<R> {
        let url = format!("{}{RPC_PREFIX}/{name}", self.base_url);
        tracing::debug!(%url, "store RPC");

        let resp = self
            .http
            .post(&url)
            .headers(self.auth_headers())
            .json(args)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// `POST /rest/v1/rpc/{name}` for procedures that return nothing (the
    /// store replies 204 or an empty body).
    pub async fn rpc_void<B: Serialize>(&self, name: &str, args: &B) -> Result<()> {
        let url = format!("{}{RPC_PREFIX}/{name}", self.base_url);
        tracing::debug!(%url, "store RPC (void)");

        let resp = self
            .http
            .post(&url)
            .headers(self.auth_headers())
            .json(args)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(EngineError::Store { status, body })
        }
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("apikey", self.auth_header_apikey.clone());
        headers.insert(header::AUTHORIZATION, self.auth_header_bearer.clone());
        headers
    }

    async fn handle_response<R: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<R> {
        let status = resp.status();
        let bytes = resp.bytes().await.unwrap_or_default();

        if status.is_success() {
            serde_json::from_slice(&bytes).map_err(EngineError::Json)
        } else {
            Err(EngineError::Store {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
    }
}
