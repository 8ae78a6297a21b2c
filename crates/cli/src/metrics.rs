//! Prometheus registry for the console.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

use plexdl_core::DownloadQueue;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// 1 while a worker loop is draining the queue.
pub static WORKER_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("plexdl_worker_active", "Whether the queue worker is running").unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WORKER_ACTIVE.clone()))
        .unwrap();

    for metric in plexdl_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Refresh gauges derived from live state.
pub async fn collect_dynamic_metrics(queue: &DownloadQueue) {
    let status = queue.status().await;
    WORKER_ACTIVE.set(i64::from(status.worker_active));
    plexdl_core::metrics::QUEUE_DEPTH.set(status.queued as i64);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
