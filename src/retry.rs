// ===============================
// src/retry.rs
// ===============================
use serde_json::Value;

/// Classifier handed to the transport: `true` means "try again".
pub type RetryPredicate = fn(&Value) -> bool;

// Kunci diskriminator status di body upstream
const DISCRIMINATOR_KEYS: [&str; 2] = ["Response", "status"];
const ERROR_MARKER: &str = "Error";

/// True only when the body reports the literal `"Error"` status.
/// Anything else (other values, missing keys, non-objects, null) is not retried.
pub fn is_retryable(body: &Value) -> bool {
    let Some(obj) = body.as_object() else {
        return false;
    };
    DISCRIMINATOR_KEYS
        .iter()
        .any(|k| obj.get(*k).and_then(Value::as_str) == Some(ERROR_MARKER))
}
