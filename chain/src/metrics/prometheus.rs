//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed chain metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Chain-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the miner,
/// the chain updater, and the RPC handlers.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Blocks this node mined and appended itself.
    pub blocks_mined: IntCounter,
    /// Block announcements received from peers.
    pub block_updates_received: IntCounter,
    /// Times the committed chain was replaced by a peer's chain.
    pub chain_replacements: IntCounter,
    /// Transactions accepted into the pool.
    pub transactions_received: IntCounter,
    /// Transactions dropped (duplicate token, bad signature).
    pub transactions_rejected: IntCounter,
    /// Wall-clock time of a successful proof-of-work search, in seconds.
    pub proof_search_seconds: Histogram,
    /// Current length of the committed chain.
    pub chain_height: IntGauge,
}

impl ChainMetrics {
    /// Registers chain metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_mined = IntCounter::with_opts(Opts::new(
            "blocks_mined_total",
            "Blocks mined and appended by this node",
        ))?;
        registry.register(Box::new(blocks_mined.clone()))?;

        let block_updates_received = IntCounter::with_opts(Opts::new(
            "block_updates_received_total",
            "Block announcements received from peers",
        ))?;
        registry.register(Box::new(block_updates_received.clone()))?;

        let chain_replacements = IntCounter::with_opts(Opts::new(
            "chain_replacements_total",
            "Times the committed chain was replaced by a longer peer chain",
        ))?;
        registry.register(Box::new(chain_replacements.clone()))?;

        let transactions_received = IntCounter::with_opts(Opts::new(
            "transactions_received_total",
            "Transactions accepted into the pool",
        ))?;
        registry.register(Box::new(transactions_received.clone()))?;

        let transactions_rejected = IntCounter::with_opts(Opts::new(
            "transactions_rejected_total",
            "Transactions dropped for duplicate tokens or bad signatures",
        ))?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let proof_search_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "proof_search_seconds",
                "Time to find a block proof, in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0,
            ]),
        )?;
        registry.register(Box::new(proof_search_seconds.clone()))?;

        let chain_height = IntGauge::with_opts(Opts::new(
            "chain_height",
            "Current length of the committed chain",
        ))?;
        registry.register(Box::new(chain_height.clone()))?;

        Ok(Self {
            blocks_mined,
            block_updates_received,
            chain_replacements,
            transactions_received,
            transactions_rejected,
            proof_search_seconds,
            chain_height,
        })
    }
}

/// Wrapper around a Prometheus registry and the chain metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("votingchain".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn chain_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        metrics.blocks_mined.inc();
        metrics.transactions_received.inc();
        metrics.proof_search_seconds.observe(0.123);
        metrics.chain_height.set(3);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.proof_search_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("proof_search_seconds"));
    }
}
