//! Metrics and instrumentation for the node.
//!
//! Defines Prometheus-compatible gauges/counters/histograms for the
//! mempool, miner, peer manager, and consensus loop, and exposes a small
//! HTTP exporter that serves `/metrics` in Prometheus text format.

pub mod prometheus;

pub use prometheus::{MetricsRegistry, NodeMetrics, run_prometheus_http_server};
