// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "/wapi/v3/withdraw.html";
pub const RECV_WINDOW_MS: u64 = 5000;
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Withdrawal amount exactly as the caller sent it (no precision handling here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Text(s) => f.write_str(s),
            Amount::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Validated job input, before signing.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalInput {
    pub job_id: String,
    pub asset: String,
    pub address: String,
    pub amount: Amount,
    pub endpoint: Option<String>,
}

/// One logical withdrawal attempt. `timestamp` is captured once and reused for retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub asset: String,
    pub address: String,
    pub amount: String,
    pub endpoint: String,
    pub recv_window: u64,
    pub timestamp: u64,
}

impl WithdrawalRequest {
    pub fn new(input: &WithdrawalInput, timestamp: u64) -> Self {
        Self {
            asset: input.asset.to_ascii_uppercase(),
            address: input.address.clone(),
            amount: input.amount.to_string(),
            endpoint: input
                .endpoint
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            recv_window: RECV_WINDOW_MS,
            timestamp,
        }
    }

    /// The five signed fields, in the order the upstream verifier concatenates them.
    pub fn params(&self) -> [(&'static str, String); 5] {
        [
            ("asset", self.asset.clone()),
            ("address", self.address.clone()),
            ("amount", self.amount.clone()),
            ("recvWindow", self.recv_window.to_string()),
            ("timestamp", self.timestamp.to_string()),
        ]
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// base host + endpoint path, no query
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub query_string: String,
    pub signature: String,
    pub headers: HashMap<&'static str, String>,
}

impl SignedRequest {
    pub fn full_url(&self) -> String {
        format!("{}?{}&signature={}", self.url, self.query_string, self.signature)
    }
}

// Header berisi API key, jadi jangan ikut tercetak
impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().copied().collect();
        f.debug_struct("SignedRequest")
            .field("url", &self.url)
            .field("query_string", &self.query_string)
            .field("signature", &self.signature)
            .field("headers", &header_names)
            .finish()
    }
}

/// What the transport hands back once a response is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Success { data: Value, result: ResultValue },
    Errored { status: &'static str, error: ErrorData },
}

/// The only thing any caller ever gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    #[serde(rename = "jobRunID")]
    pub job_id: String,
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl ResultEnvelope {
    pub fn success(job_id: impl Into<String>, status_code: u16, data: Value, result: ResultValue) -> Self {
        Self {
            job_id: job_id.into(),
            payload: Payload::Success { data, result },
            status_code,
        }
    }

    pub fn errored(job_id: impl Into<String>, status_code: u16, error: ErrorData) -> Self {
        Self {
            job_id: job_id.into(),
            payload: Payload::Errored { status: "errored", error },
            status_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, Payload::Success { .. })
    }

    pub fn result(&self) -> Option<&ResultValue> {
        match &self.payload {
            Payload::Success { result, .. } => Some(result),
            Payload::Errored { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorData> {
        match &self.payload {
            Payload::Errored { error, .. } => Some(error),
            Payload::Success { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "jobRunID": self.job_id, "statusCode": self.status_code })
        })
    }
}
