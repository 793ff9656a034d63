// ===============================
// src/normalizer.rs
// ===============================
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ErrorData, ResultEnvelope, ResultValue, UpstreamResponse};
use crate::requester::TransportError;
use crate::validator::ValidationError;

/// Body field mirrored into the top-level `result`.
pub const RESULT_PATH: &[&str] = &["msg"];

pub const ERROR_STATUS: u16 = 500;
pub const VALIDATION_STATUS: u16 = 400;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizationError {
    #[error("result field `{0}` not found in upstream response")]
    Missing(String),
    #[error("result field `{path}` is not a number or string: {value}")]
    Invalid { path: String, value: Value },
}

fn lookup<'a>(data: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(data, |cur, key| cur.get(*key))
}

/// Only accepts strings that print back identically, so "007", "1e5",
/// over-long decimals and ids past f64 precision stay text.
fn parse_number(s: &str) -> Option<serde_json::Number> {
    let n: serde_json::Number = if let Ok(i) = s.parse::<i64>() {
        i.into()
    } else if let Ok(u) = s.parse::<u64>() {
        u.into()
    } else {
        // non-finite ("NaN", "inf") -> None
        s.parse::<f64>().ok().and_then(serde_json::Number::from_f64)?
    };
    (n.to_string() == s).then_some(n)
}

/// Numbers pass through, numeric strings become numbers, other non-empty
/// strings stay strings. Everything else is rejected.
pub fn extract_result(data: &Value, path: &[&str]) -> Result<ResultValue, NormalizationError> {
    let joined = path.join(".");
    match lookup(data, path) {
        None | Some(Value::Null) => Err(NormalizationError::Missing(joined)),
        Some(Value::Number(n)) => Ok(ResultValue::Number(n.clone())),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(match parse_number(s.trim()) {
            Some(n) => ResultValue::Number(n),
            None => ResultValue::Text(s.clone()),
        }),
        Some(other) => Err(NormalizationError::Invalid { path: joined, value: other.clone() }),
    }
}

/// Delivered response -> success envelope, or a 500 envelope when the result
/// field can't be extracted.
pub fn normalize(job_id: &str, rsp: UpstreamResponse) -> ResultEnvelope {
    match extract_result(&rsp.data, RESULT_PATH) {
        Ok(result) => {
            let mut data = rsp.data;
            if let Value::Object(map) = &mut data {
                map.insert("result".to_string(), serde_json::to_value(&result).unwrap_or(Value::Null));
            }
            ResultEnvelope::success(job_id, rsp.status, data, result)
        }
        Err(e) => ResultEnvelope::errored(
            job_id,
            ERROR_STATUS,
            ErrorData {
                name: "NormalizationError".to_string(),
                message: e.to_string(),
                upstream_status: Some(rsp.status),
                details: Some(rsp.data),
            },
        ),
    }
}

/// Transport failure (after retries) -> 500 envelope carrying the upstream detail.
pub fn normalize_error(job_id: &str, err: &TransportError) -> ResultEnvelope {
    ResultEnvelope::errored(
        job_id,
        ERROR_STATUS,
        ErrorData {
            name: "TransportError".to_string(),
            message: err.to_string(),
            upstream_status: err.upstream_status(),
            details: err.body().cloned(),
        },
    )
}

pub fn validation_error(job_id: &str, err: &ValidationError) -> ResultEnvelope {
    ResultEnvelope::errored(
        job_id,
        VALIDATION_STATUS,
        ErrorData {
            name: "ValidationError".to_string(),
            message: err.to_string(),
            upstream_status: None,
            details: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn msg_is_mirrored_into_result() {
        let env = normalize(
            "1",
            UpstreamResponse { status: 200, data: json!({"msg": "success", "success": true, "id": "7213fea8"}) },
        );
        assert!(env.is_success());
        assert_eq!(env.status_code, 200);
        assert_eq!(env.result(), Some(&ResultValue::Text("success".into())));
        let wire = env.to_json();
        assert_eq!(wire["data"]["result"], "success");
        assert_eq!(wire["result"], "success");
        assert_eq!(wire["jobRunID"], "1");
    }

    #[test]
    fn numeric_strings_become_numbers() {
        assert_eq!(
            extract_result(&json!({"msg": "12.5"}), RESULT_PATH).unwrap(),
            ResultValue::Number(serde_json::Number::from_f64(12.5).unwrap())
        );
        assert_eq!(
            extract_result(&json!({"msg": 3}), RESULT_PATH).unwrap(),
            ResultValue::Number(3.into())
        );
        assert_eq!(
            extract_result(&json!({"msg": "-3"}), RESULT_PATH).unwrap(),
            ResultValue::Number((-3).into())
        );
    }

    #[test]
    fn lossy_numeric_strings_stay_text() {
        for raw in [
            "007",
            "+5",
            "1e5",
            "0.10000000000000000001",
            "123456789012345678901234567890",
            "NaN",
        ] {
            assert_eq!(
                extract_result(&json!({ "msg": raw }), RESULT_PATH).unwrap(),
                ResultValue::Text(raw.to_string()),
                "{raw}"
            );
        }
    }

    #[test]
    fn missing_or_invalid_result_is_an_error_envelope() {
        let env = normalize("9", UpstreamResponse { status: 200, data: json!({"success": true}) });
        assert!(!env.is_success());
        assert_eq!(env.status_code, 500);
        let err = env.error().unwrap();
        assert_eq!(err.name, "NormalizationError");
        assert_eq!(err.upstream_status, Some(200));

        for bad in [json!({"msg": ""}), json!({"msg": true}), json!({"msg": {"a": 1}}), json!("plain text")] {
            let env = normalize("9", UpstreamResponse { status: 200, data: bad });
            assert_eq!(env.status_code, 500);
        }
    }

    #[test]
    fn transport_error_keeps_upstream_detail() {
        let err = TransportError::Upstream {
            status: 200,
            body: json!({"Response": "Error", "msg": "insufficient funds"}),
        };
        let env = normalize_error("2", &err);
        assert_eq!(env.status_code, 500);
        assert_eq!(env.job_id, "2");
        let data = env.error().unwrap();
        assert!(data.message.contains("insufficient funds"));
        assert_eq!(data.details.as_ref().unwrap()["msg"], "insufficient funds");
    }

    #[test]
    fn validation_errors_are_4xx() {
        let env = validation_error("3", &ValidationError::MissingParam("address"));
        assert_eq!(env.status_code, 400);
        assert!(env.error().unwrap().message.contains("address"));
    }
}
