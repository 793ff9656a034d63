// ===============================
// src/main.rs
// ===============================
/*
 # contoh pemakaian lokal
 BINANCE_API_KEY=... BINANCE_API_SECRET=... cargo run --release

 curl -s -XPOST localhost:8080/ -d '{"id":"1","data":{"asset":"btc","address":"<addr>","amount":"0.01"}}'
 curl -s localhost:8080/metrics | grep '^withdraw_requests_total'
*/
/*
=============================================================================
Project : binance_withdraw_adapter — signed Binance withdrawal adapter in Rust
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Accepts oracle job requests, signs Binance withdrawals with
          HMAC-SHA256, calls the withdraw endpoint with retry, and answers
          with a uniform success/error envelope. Exposes Prometheus metrics
          and records JSONL audit events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use binance_withdraw_adapter::config::{self, ConfigError};
use binance_withdraw_adapter::{metrics, recorder, server, Adapter, Requester};

#[tokio::main]
async fn main() {
    // ---- Load config (.env + flags/ENV) ----
    let cfg = match config::load() {
        Ok(c) => c,
        Err(ConfigError::Args(e)) => e.exit(),
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(2);
        }
    };

    // ---- Logging ----
    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Metrics ----
    metrics::init();

    info!(
        rest_url = %cfg.rest_url,
        method = ?cfg.method,
        port = cfg.port,
        retry_max = cfg.retry.max_retries,
        retry_delay_ms = cfg.retry.base_delay.as_millis() as u64,
        timeout_ms = cfg.retry.timeout.as_millis() as u64,
        record_file = ?cfg.record_file,
        "startup config"
    );

    // ---- Transport ----
    let requester = match Requester::new(cfg.method, cfg.retry.clone()) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            std::process::exit(1);
        }
    };
    let mut adapter = Adapter::new(&cfg, requester);

    // ---- Recorder (optional) ----
    if let Some(path) = cfg.record_file.clone() {
        let (rec_tx, rec_rx) = mpsc::channel::<recorder::AuditEvent>(8192);
        tokio::spawn(recorder::run(rec_rx, path));
        adapter = adapter.with_audit(rec_tx);
    }

    // ---- Serve ----
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    if let Err(e) = server::serve(addr, Arc::new(adapter)).await {
        error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}
