//! Thin wrapper around `reqwest` for the PBS REST API
//!
//! - One `reqwest::Client` per process, built from the startup timeout and
//!   TLS policy
//! - Authorization header attached on every call
//! - No retries: transport failures go straight back to the caller
//! - Non-2xx responses are returned as data, the caller decides

use crate::auth::Credential;
use crate::error::CollectError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const DATASTORE_USAGE_API: &str = "/api2/json/status/datastore-usage";
pub const DATASTORE_API: &str = "/api2/json/admin/datastore";
pub const NODE_API: &str = "/api2/json/nodes";

/// Upstream server for one scrape
#[derive(Debug, Clone)]
pub struct Target {
    base: String,
    credential: Credential,
}

impl Target {
    pub fn new(base: impl Into<String>, credential: Credential) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base, credential }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Process-wide transport policy, resolved once at startup.
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub insecure: bool,
}

/// Raw upstream answer: status plus the full body.
#[derive(Debug)]
pub struct ApiResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx answer into `UpstreamStatus`.
    pub fn error_for_status(self) -> Result<Self, CollectError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CollectError::UpstreamStatus {
                code: self.status,
                url: self.url,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CollectError> {
        serde_json::from_str(&self.body).map_err(|e| CollectError::decode(&self.url, e))
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(settings: ClientSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.insecure)
            .build()?;
        Ok(Self { http })
    }

    /// GET `path` on `target`, with optional query pairs.
    pub async fn get(
        &self,
        target: &Target,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, CollectError> {
        let url = target.url(path);
        debug!("Request URL: {} {:?}", url, query);

        let transport = |source: reqwest::Error| CollectError::Transport {
            url: url.clone(),
            source,
        };

        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, target.credential().header_value());
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        debug!("Status code {} returned from endpoint: {}", status, url);
        Ok(ApiResponse { url, status, body })
    }
}
