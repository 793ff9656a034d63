// ===============================
// src/requester.rs
// ===============================
//
// Transport ke Binance REST:
// - satu SignedRequest dipakai ulang untuk semua retry (timestamp & signature sama)
// - retry: network/timeout, HTTP 429/5xx, dan body yang ditandai RetryPredicate
// - backoff eksponensial + jitter (mirip reconnect loop di feed lama)
//
use std::future::Future;
use std::time::Instant;

use rand::Rng;
use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

use crate::config::{RetryPolicy, WithdrawMethod};
use crate::domain::{SignedRequest, UpstreamResponse};
use crate::metrics::{UPSTREAM_ATTEMPTS, UPSTREAM_LATENCY_MS};
use crate::retry::RetryPredicate;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to upstream failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: Value },
    #[error("upstream reported an error: {body}")]
    Upstream { status: u16, body: Value },
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Upstream { .. } => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Client(_) => false,
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            TransportError::Network(e) => e.status().map(|s| s.as_u16()),
            TransportError::Status { status, .. } | TransportError::Upstream { status, .. } => Some(*status),
            TransportError::Client(_) => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            TransportError::Status { body, .. } | TransportError::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Performs the HTTP call and owns the retry loop; the caller only supplies
/// the body classifier.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        req: &SignedRequest,
        retry_on: RetryPredicate,
    ) -> impl Future<Output = Result<UpstreamResponse, TransportError>> + Send;
}

#[derive(Clone, Debug)]
pub struct Requester {
    http: reqwest::Client,
    method: WithdrawMethod,
    policy: RetryPolicy,
}

impl Requester {
    pub fn new(method: WithdrawMethod, policy: RetryPolicy) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { http, method, policy })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.policy.base_delay.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        let shift = attempt.min(6); // 1,2,4,...,64
        let factor = 1u64 << shift;
        let jitter = rand::thread_rng().gen_range(0..=250);
        Duration::from_millis(base_ms.saturating_mul(factor) + jitter)
    }

    async fn attempt_once(
        &self,
        req: &SignedRequest,
        retry_on: RetryPredicate,
    ) -> Result<UpstreamResponse, TransportError> {
        let url = req.full_url();
        let mut builder = match self.method {
            WithdrawMethod::Get => self.http.get(url),
            WithdrawMethod::Post => self.http.post(url),
        };
        for (name, value) in req.headers.iter() {
            builder = builder.header(*name, value);
        }

        let started = Instant::now();
        let rsp = builder.send().await;
        UPSTREAM_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1000.0);
        let rsp = rsp?;

        let status = rsp.status();
        let text = rsp.text().await?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), body: data });
        }
        if retry_on(&data) {
            return Err(TransportError::Upstream { status: status.as_u16(), body: data });
        }
        Ok(UpstreamResponse { status: status.as_u16(), data })
    }
}

impl Transport for Requester {
    async fn execute(
        &self,
        req: &SignedRequest,
        retry_on: RetryPredicate,
    ) -> Result<UpstreamResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt_once(req, retry_on).await {
                Ok(rsp) => {
                    UPSTREAM_ATTEMPTS.with_label_values(&["ok"]).inc();
                    debug!(attempt = attempt + 1, status = rsp.status, "upstream delivered");
                    return Ok(rsp);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    UPSTREAM_ATTEMPTS.with_label_values(&["retry"]).inc();
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "upstream attempt failed, retrying after delay"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    UPSTREAM_ATTEMPTS.with_label_values(&["failed"]).inc();
                    error!(
                        attempt = attempt + 1,
                        error = %e,
                        is_retryable = e.is_retryable(),
                        "upstream attempt failed, not retrying"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn retryable_classification() {
        let body = json!({});
        assert!(TransportError::Status { status: 503, body: body.clone() }.is_retryable());
        assert!(TransportError::Status { status: 429, body: body.clone() }.is_retryable());
        assert!(!TransportError::Status { status: 400, body: body.clone() }.is_retryable());
        assert!(TransportError::Upstream { status: 200, body }.is_retryable());
        assert!(!TransportError::Client("x".into()).is_retryable());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { base_delay: Duration::from_millis(100), ..RetryPolicy::default() };
        let r = Requester::new(WithdrawMethod::Get, policy).unwrap();
        let d0 = r.backoff(0).as_millis();
        let d3 = r.backoff(3).as_millis();
        let d20 = r.backoff(20).as_millis();
        assert!((100..=350).contains(&d0));
        assert!((800..=1050).contains(&d3));
        assert!((6400..=6650).contains(&d20));
    }

    #[test]
    fn zero_base_delay_means_no_wait() {
        let policy = RetryPolicy { base_delay: Duration::ZERO, ..RetryPolicy::default() };
        let r = Requester::new(WithdrawMethod::Get, policy).unwrap();
        assert_eq!(r.backoff(4), Duration::ZERO);
    }
}
