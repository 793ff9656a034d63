// ===============================
// src/adapters.rs
// ===============================
//
// Adapter tipis untuk event serverless, semuanya memanggil Adapter::execute:
// - handler    : event = job JSON, balikan = envelope JSON saja
// - handler_v2 : event.body = job JSON (string), balikan = {statusCode, body, isBase64Encoded}
//
use serde::Serialize;
use serde_json::Value;

use crate::normalizer::validation_error;
use crate::pipeline::Adapter;
use crate::requester::Transport;
use crate::validator::{ValidationError, DEFAULT_JOB_ID};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub body: String,
    pub is_base64_encoded: bool,
}

/// Event is the job itself; only the envelope body is returned.
pub async fn handler<T: Transport>(adapter: &Adapter<T>, event: &Value) -> Value {
    let (_, env) = adapter.execute(event).await;
    env.to_json()
}

/// Proxy-style event: the job arrives as a JSON string under `body`.
pub async fn handler_v2<T: Transport>(adapter: &Adapter<T>, event: &Value) -> ProxyResponse {
    let parsed = match event.get("body") {
        Some(Value::String(raw)) => {
            serde_json::from_str::<Value>(raw).map_err(|e| ValidationError::MalformedBody(e.to_string()))
        }
        Some(obj @ Value::Object(_)) => Ok(obj.clone()),
        _ => Err(ValidationError::MalformedBody("missing body".to_string())),
    };

    let (status, env) = match parsed {
        Ok(input) => adapter.execute(&input).await,
        Err(e) => {
            let env = validation_error(DEFAULT_JOB_ID, &e);
            (env.status_code, env)
        }
    };

    ProxyResponse { status_code: status, body: env.to_json().to_string(), is_base64_encoded: false }
}
