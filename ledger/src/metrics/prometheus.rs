//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed node metrics, and an async HTTP
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
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Node-level Prometheus metrics.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Current number of transactions sitting in the mempool.
    pub mempool_size: Gauge,
    /// Total number of blocks this node has mined.
    pub blocks_mined: IntCounter,
    /// Current number of peers marked live.
    pub peers_live: Gauge,
    /// Wall-clock time spent mining a single block, in seconds.
    pub block_mine_seconds: Histogram,
    /// Total number of times the consensus loop has replaced the chain
    /// suffix with a peer's longer chain.
    pub chain_replacements: IntCounter,
}

impl NodeMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let mempool_size = Gauge::with_opts(Opts::new(
            "mempool_size",
            "Number of transactions currently in the mempool",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let blocks_mined = IntCounter::with_opts(Opts::new(
            "blocks_mined_total",
            "Total number of blocks mined by this node",
        ))?;
        registry.register(Box::new(blocks_mined.clone()))?;

        let peers_live = Gauge::with_opts(Opts::new(
            "peers_live",
            "Number of peers currently marked live",
        ))?;
        registry.register(Box::new(peers_live.clone()))?;

        let block_mine_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "block_mine_seconds",
                "Time to mine a single block, in seconds",
            )
            .buckets(vec![
                0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0,
            ]),
        )?;
        registry.register(Box::new(block_mine_seconds.clone()))?;

        let chain_replacements = IntCounter::with_opts(Opts::new(
            "chain_replacements_total",
            "Total number of times the local chain suffix was replaced by consensus",
        ))?;
        registry.register(Box::new(chain_replacements.clone()))?;

        Ok(Self {
            mempool_size,
            blocks_mined,
            peers_live,
            block_mine_seconds,
            chain_replacements,
        })
    }
}

/// Wrapper around a Prometheus registry and the node metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ledger".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

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

/// Runs an HTTP server that exposes Prometheus metrics on `GET /metrics`.
/// All other paths return 404.
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
                tracing::warn!("prometheus HTTP server error: {err}");
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
