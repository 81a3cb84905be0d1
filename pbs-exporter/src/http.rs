/**
 * EXPORTER HTTP SURFACE - Scrape endpoint served to Prometheus
 *
 * ROLE :
 * Every GET on the metrics path runs one full collection against the
 * resolved target and answers with the text exposition format.
 *
 * ROUTES :
 * - <metrics path> : scrape (target = fixed endpoint, else ?target=, else local default)
 * - anything else  : static HTML page linking to the metrics path
 *
 * ISOLATION :
 * - No registry is shared between requests: each response renders its own
 * - A failed scrape answers 200 with `pbs_up 0` as its only `pbs_` sample
 * - Process metrics of the exporter itself are added to every response
 *
 * QUERY :
 * - Only the first `target` value counts, repeats are ignored
 */

use crate::client::ApiClient;
use crate::config::Settings;
use crate::metrics;
use crate::scrape::{resolve_target, scrape};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Router};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub client: ApiClient,
}

pub fn build_router(app_state: AppState) -> Router {
    let metrics_path = app_state.settings.metrics_path.clone();
    Router::new()
        .route(&metrics_path, get(get_metrics))
        .fallback(get_index)
        .with_state(app_state)
}

// GET <metrics path>
async fn get_metrics(
    State(app): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let requested = first_param(&params, "target");
    let target = resolve_target(app.settings.endpoint.as_deref(), requested);
    let samples = scrape(&app.client, target, &app.settings.credential).await;

    match metrics::render_scrape(&samples) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

// Everything else
async fn get_index(State(app): State<AppState>) -> Html<String> {
    Html(index_page(&app.settings.metrics_path))
}

fn index_page(metrics_path: &str) -> String {
    format!(
        "<html>
            <head><title>PBS Exporter</title></head>
            <body>
            <h1>Proxmox Backup Server Exporter</h1>
            <p><a href='{metrics_path}'>Metrics</a></p>
            </body>
            </html>"
    )
}
