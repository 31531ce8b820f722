//! Prometheus registry and HTTP metrics for the worker.
//!
//! Pipeline metrics live in `pdfpost_core::metrics` and are registered here
//! alongside the HTTP surface's own metrics and a few gauges refreshed on
//! every scrape.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pdfpost_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pdfpost_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// 1 while the poll loops run.
pub static WORKER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("pdfpost_worker_running", "Whether the worker poll loops are running").unwrap()
});

/// Live claims in the shared store, by pipeline.
pub static LIVE_CLAIMS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("pdfpost_live_claims", "Claims currently held by any worker"),
        &["pipeline"],
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    let mut collectors = pdfpost_core::metrics::all_metrics();
    collectors.push(Box::new(HTTP_REQUEST_DURATION.clone()));
    collectors.push(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    collectors.push(Box::new(WORKER_RUNNING.clone()));
    collectors.push(Box::new(LIVE_CLAIMS.clone()));

    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all registered metrics in the text exposition format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Refresh gauges from current application state.
pub async fn collect_dynamic_metrics(state: &AppState) {
    WORKER_RUNNING.set(i64::from(state.worker().is_running()));

    match state.claims().list().await {
        Ok(claims) => {
            LIVE_CLAIMS.reset();
            for claim in claims {
                LIVE_CLAIMS
                    .with_label_values(&[claim.process_kind.as_str()])
                    .inc();
            }
        }
        Err(e) => warn!("Failed to list claims for metrics: {}", e),
    }
}
