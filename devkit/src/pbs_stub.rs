/*!
Mock PBS API server for tests without a real Proxmox Backup Server

Serves canned status/body pairs on 127.0.0.1 (ephemeral port) and records
every request it receives, including the Authorization header.
*/

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    /// Held back this long before answering
    pub delay: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Path plus decoded, sorted query (`/a/b?ns=x`)
    pub key: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct StubState {
    routes: Mutex<HashMap<String, MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// In-process stand-in for the PBS REST API
pub struct MockPbs {
    addr: SocketAddr,
    state: Arc<StubState>,
    server: JoinHandle<()>,
}

impl MockPbs {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Result<Self> {
        env_logger::try_init().ok();

        let state = Arc::new(StubState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[MOCK] server stopped: {}", e);
            }
        });

        log::info!("[MOCK] PBS API listening on {}", addr);
        Ok(Self { addr, state, server })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer `key` (path, optionally `?k=v` decoded) with `status` and a raw body.
    pub fn respond<K: Into<String>, B: Into<String>>(&self, key: K, status: u16, body: B) -> &Self {
        self.insert(key.into(), status, body.into(), None)
    }

    /// Like `respond`, but the answer only starts after `delay`.
    pub fn respond_after<K: Into<String>, B: Into<String>>(
        &self,
        key: K,
        delay: Duration,
        status: u16,
        body: B,
    ) -> &Self {
        self.insert(key.into(), status, body.into(), Some(delay))
    }

    fn insert(&self, key: String, status: u16, body: String, delay: Option<Duration>) -> &Self {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(key, MockResponse { status, body, delay });
        self
    }

    /// Answer `key` with 200 and a JSON body.
    pub fn respond_json<K: Into<String>>(&self, key: K, body: &Value) -> &Self {
        self.respond(key, 200, body.to_string())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requested_keys(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.key).collect()
    }

    pub fn request_count(&self, key: &str) -> usize {
        self.requests().iter().filter(|r| r.key == key).count()
    }
}

impl Drop for MockPbs {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// `path?k1=v1&k2=v2` with decoded values sorted by key, or just `path`.
pub fn request_key(path: &str, mut query: Vec<(String, String)>) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    query.sort();
    let pairs: Vec<String> = query.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}?{}", path, pairs.join("&"))
}

async fn handle(
    State(state): State<Arc<StubState>>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let key = request_key(uri.path(), query);
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    log::info!("[MOCK] GET {}", key);
    state.requests.lock().unwrap().push(RecordedRequest {
        key: key.clone(),
        authorization,
    });

    let canned = state.routes.lock().unwrap().get(&key).cloned();
    match canned {
        Some(resp) => {
            if let Some(delay) = resp.delay {
                log::info!("[MOCK] holding {} for {:?}", key, delay);
                tokio::time::sleep(delay).await;
            }
            let status =
                StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, resp.body).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("no mock for {key}")).into_response(),
    }
}
