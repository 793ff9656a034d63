// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// Outcome per inbound job: success | errored | invalid
pub static WITHDRAW_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("withdraw_requests_total", "withdraw jobs by outcome"),
        &["outcome"],
    )
    .unwrap()
});

// Per HTTP attempt: ok | retry | failed
pub static UPSTREAM_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("upstream_attempts_total", "Binance withdraw HTTP attempts"),
        &["result"],
    )
    .unwrap()
});

// Latency of a single upstream attempt (milliseconds)
pub static UPSTREAM_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("upstream_latency_ms", "Binance withdraw attempt latency (ms)")
            .buckets(vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]),
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry (re-register errors are ignored)
    for m in [
        REGISTRY.register(Box::new(WITHDRAW_REQUESTS.clone())),
        REGISTRY.register(Box::new(UPSTREAM_ATTEMPTS.clone())),
        REGISTRY.register(Box::new(UPSTREAM_LATENCY_MS.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
