//! One scrape: resolve the target, run a fresh collector, add `pbs_up`.

use crate::auth::Credential;
use crate::client::{ApiClient, Target};
use crate::collector::Collector;
use crate::metrics::{self, MetricSample};
use tracing::{debug, error};

pub const DEFAULT_TARGET: &str = "http://localhost:8007";

/// Fixed endpoint first, then the `target` query parameter, then the local default.
pub fn resolve_target<'a>(fixed: Option<&'a str>, requested: Option<&'a str>) -> &'a str {
    fixed
        .filter(|f| !f.is_empty())
        .or_else(|| requested.filter(|r| !r.is_empty()))
        .unwrap_or(DEFAULT_TARGET)
}

/// Run one collection against `base` and return the sample set to expose.
///
/// On success this is `pbs_up 1` followed by every collected sample. On
/// any failure it is `pbs_up 0` alone; partial results are dropped with
/// the collector.
pub async fn scrape(client: &ApiClient, base: &str, credential: &Credential) -> Vec<MetricSample> {
    debug!("Using connection endpoint {}", base);
    let collector = Collector::new(client, Target::new(base, credential.clone()));

    match collector.collect().await {
        Ok(samples) => {
            let mut exposed = Vec::with_capacity(samples.len() + 1);
            exposed.push(MetricSample::unlabeled(&metrics::UP, 1.0));
            exposed.extend(samples);
            exposed
        }
        Err(e) => {
            error!("Scrape of {} failed: {}", base, e);
            vec![MetricSample::unlabeled(&metrics::UP, 0.0)]
        }
    }
}
