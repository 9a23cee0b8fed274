use std::net::SocketAddr;

use autometrics::prometheus_exporter;
use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref SNAPSHOTS_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("snapshots_published", "Snapshots installed in the cache"),
        &["node_id"]
    )
    .expect("metric can not be created");

    pub static ref PUBLISH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("publish_failures", "Operator publishes rejected or failed"),
        &["reason"]
    )
    .expect("metric can not be created");

    pub static ref PUBLISH_LATENCY_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("publish_latency_ms", "Store write to cache swap latency in ms")
            .buckets(exponential_buckets(0.05, 2.0, 14).expect("valid buckets")),
        &["node_id"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_SESSIONS: IntGauge =
        IntGauge::new("active_discovery_sessions", "Discovery streams currently bound to a node")
            .expect("metric can not be created");

    pub static ref PUSHES_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("discovery_pushes_sent", "Revisions pushed to nodes"),
        &["type_url"]
    )
    .expect("metric can not be created");

    /// `outcome` is one of `ack`, `nack`, `stale`. Types the server does not
    /// serve are counted under `unknown`.
    pub static ref ACK_RESPONSES: IntCounterVec = IntCounterVec::new(
        Opts::new("discovery_ack_responses", "Acknowledgements received from nodes"),
        &["type_url", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref TRANSPORT_FAILURES: IntCounter =
        IntCounter::new("discovery_transport_failures", "Streams torn down on a failed write")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(SNAPSHOTS_PUBLISHED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PUBLISH_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PUBLISH_LATENCY_METRIC.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_SESSIONS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PUSHES_SENT.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACK_RESPONSES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(TRANSPORT_FAILURES.clone()))
        .expect("collector can be registered");
}

/// Serves `/metrics` until the shutdown signal fires.
pub async fn start_server(
    addr: SocketAddr,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (bound, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown_signal.changed().await;
    });
    info!(%bound, "Metrics endpoint listening");
    server.await;
    info!("Metrics endpoint stopped");
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(render_metrics())
}

/// Custom registry followed by the autometrics output.
pub fn render_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    let mut res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };

    res.push_str(&get_metrics_body());
    res
}

/// Export metrics for Prometheus to scrape
pub fn get_metrics_body() -> String {
    let autometrics_response = prometheus_exporter::encode_http_response();
    autometrics_response.into_body()
}
