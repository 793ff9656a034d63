// ===============================
// src/pipeline.rs
// ===============================
//
// Alur satu job (linear):
//   Received -> Validated -> Signed -> Dispatched -> Normalized -> Responded
//
// Validasi gagal -> langsung envelope 400, tanpa signing / network.
// Semua error lain dikonversi jadi envelope di sini; callback dipanggil tepat sekali.
//
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::binance::{timestamp_ms, RequestBuilder};
use crate::config::Config;
use crate::domain::{ResultEnvelope, WithdrawalRequest};
use crate::metrics::WITHDRAW_REQUESTS;
use crate::normalizer::{normalize, normalize_error, validation_error};
use crate::recorder::AuditEvent;
use crate::requester::Transport;
use crate::retry::is_retryable;
use crate::validator::{job_id, validate_withdrawal};

pub struct Adapter<T> {
    builder: RequestBuilder,
    transport: T,
    audit: Option<mpsc::Sender<AuditEvent>>,
}

impl<T: Transport> Adapter<T> {
    pub fn new(cfg: &Config, transport: T) -> Self {
        Self {
            builder: RequestBuilder::new(cfg.rest_url.clone(), cfg.credentials.clone()),
            transport,
            audit: None,
        }
    }

    pub fn with_audit(mut self, tx: mpsc::Sender<AuditEvent>) -> Self {
        self.audit = Some(tx);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn record(&self, ev: AuditEvent) {
        if let Some(tx) = &self.audit {
            // best-effort: full/closed channel never blocks a job
            if let Err(e) = tx.try_send(ev) {
                warn!(error = %e, "audit event dropped");
            }
        }
    }

    /// Runs one inbound job and returns the HTTP status plus envelope.
    pub async fn execute(&self, input: &Value) -> (u16, ResultEnvelope) {
        let envelope = match validate_withdrawal(input) {
            Err(e) => {
                let id = job_id(input);
                warn!(job_id = %id, error = %e, "withdraw job rejected by validation");
                validation_error(&id, &e)
            }
            Ok(validated) => {
                let job_id = validated.job_id.clone();
                let req = WithdrawalRequest::new(&validated, timestamp_ms());
                let signed = self.builder.build(&req);
                info!(
                    job_id = %job_id,
                    asset = %req.asset,
                    endpoint = %req.endpoint,
                    timestamp = req.timestamp,
                    "dispatching withdraw"
                );
                self.record(AuditEvent::dispatched(&job_id, &req, &signed));

                match self.transport.execute(&signed, is_retryable).await {
                    Ok(rsp) => normalize(&job_id, rsp),
                    Err(e) => normalize_error(&job_id, &e),
                }
            }
        };

        let outcome = if envelope.is_success() {
            "success"
        } else if envelope.status_code < 500 {
            "invalid"
        } else {
            "errored"
        };
        WITHDRAW_REQUESTS.with_label_values(&[outcome]).inc();
        info!(job_id = %envelope.job_id, status = envelope.status_code, outcome, "withdraw job done");
        self.record(AuditEvent::completed(&envelope, outcome));

        (envelope.status_code, envelope)
    }

    /// Callback flavour: `callback` is invoked exactly once with the status
    /// code and envelope, whichever branch is taken.
    pub async fn create_request<F>(&self, input: &Value, callback: F)
    where
        F: FnOnce(u16, ResultEnvelope),
    {
        let (status, envelope) = self.execute(input).await;
        callback(status, envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::domain::{SignedRequest, UpstreamResponse};
    use crate::requester::TransportError;
    use crate::retry::RetryPredicate;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeTransport {
        calls: AtomicUsize,
        seen: Mutex<Vec<SignedRequest>>,
        reply: Value,
    }

    impl FakeTransport {
        fn replying(reply: Value) -> Self {
            Self { calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()), reply }
        }
    }

    impl Transport for FakeTransport {
        async fn execute(
            &self,
            req: &SignedRequest,
            retry_on: RetryPredicate,
        ) -> Result<UpstreamResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(req.clone());
            if retry_on(&self.reply) {
                return Err(TransportError::Upstream { status: 200, body: self.reply.clone() });
            }
            Ok(UpstreamResponse { status: 200, data: self.reply.clone() })
        }
    }

    fn adapter(reply: Value) -> Adapter<FakeTransport> {
        let creds = Credentials::new("key", "secret").unwrap();
        let cfg = Config::with_credentials(creds, "https://api.binance.com").unwrap();
        Adapter::new(&cfg, FakeTransport::replying(reply))
    }

    #[tokio::test]
    async fn happy_path_signs_and_normalizes() {
        let a = adapter(json!({"msg": "success", "success": true}));
        let (status, env) = a
            .execute(&json!({"id": "1", "data": {"asset": "btc", "address": "addr1", "amount": "0.5"}}))
            .await;
        assert_eq!(status, 200);
        assert_eq!(env.job_id, "1");
        assert!(env.is_success());

        let seen = a.transport().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "https://api.binance.com/wapi/v3/withdraw.html");
        assert!(seen[0].query_string.starts_with("asset=BTC&address=addr1&amount=0.5&recvWindow=5000&timestamp="));
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_transport() {
        let a = adapter(json!({"msg": "success"}));
        let (status, env) = a.execute(&json!({"id": "5", "data": {"asset": "btc", "amount": "1"}})).await;
        assert_eq!(status, 400);
        assert_eq!(env.job_id, "5");
        assert_eq!(a.transport().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_fires_exactly_once_per_branch() {
        for (input, reply, expected) in [
            (json!({"id": "1", "data": {"asset": "btc", "address": "a", "amount": 1}}), json!({"msg": "ok"}), 200),
            (json!({"id": "1", "data": {}}), json!({"msg": "ok"}), 400),
            (
                json!({"id": "1", "data": {"asset": "btc", "address": "a", "amount": 1}}),
                json!({"Response": "Error", "msg": "nope"}),
                500,
            ),
            (json!({"id": "1", "data": {"asset": "btc", "address": "a", "amount": 1}}), json!({"x": 1}), 500),
        ] {
            let a = adapter(reply);
            let fired = AtomicUsize::new(0);
            a.create_request(&input, |status, env| {
                fired.fetch_add(1, Ordering::SeqCst);
                assert_eq!(status, expected);
                assert_eq!(env.status_code, expected);
            })
            .await;
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn audit_events_are_emitted_without_secrets() {
        let (tx, mut rx) = mpsc::channel(8);
        let a = adapter(json!({"msg": "success"})).with_audit(tx);
        a.execute(&json!({"id": "9", "data": {"asset": "eth", "address": "0xabc", "amount": "2"}})).await;

        let dispatched = rx.recv().await.unwrap();
        let completed = rx.recv().await.unwrap();
        let line = serde_json::to_string(&dispatched).unwrap();
        assert!(line.contains("\"asset\":\"ETH\""));
        assert!(!line.contains("secret"));
        assert!(matches!(completed, AuditEvent::Completed { status_code: 200, .. }));
    }
}
