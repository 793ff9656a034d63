// ===============================
// src/validator.rs
// ===============================
//
// Validasi input job dari oracle:
// - `id` (string/number) -> job id, default "1"
// - `data` harus object; tiap parameter dicari lewat daftar alias
// - parameter wajib yang kosong/null/hilang -> ValidationError
// - endpoint hanya boleh path di host yang dikonfigurasi
//
use ahash::AHashMap as HashMap;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Amount, WithdrawalInput};

pub const DEFAULT_JOB_ID: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("input must be a JSON object")]
    NotAnObject,
    #[error("`data` must be a JSON object")]
    DataNotAnObject,
    #[error("Required parameter not supplied: {0}")]
    MissingParam(&'static str),
    #[error("parameter {name} must be {expected}")]
    WrongType { name: &'static str, expected: &'static str },
    #[error("invalid JSON body: {0}")]
    MalformedBody(String),
    #[error("endpoint must be a path on the configured host, got {0:?}")]
    BadEndpoint(String),
}

/// One entry of a parameter table.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

pub const WITHDRAW_PARAMS: &[Param] = &[
    Param { name: "asset", aliases: &["asset"], required: true },
    Param { name: "address", aliases: &["address"], required: true },
    Param { name: "amount", aliases: &["amount"], required: true },
    Param { name: "endpoint", aliases: &["endpoint"], required: false },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub job_id: String,
    pub fields: HashMap<&'static str, Value>,
}

impl Validated {
    fn string(&self, name: &'static str) -> Result<Option<String>, ValidationError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ValidationError::WrongType { name, expected: "a string" }),
        }
    }
}

/// Extracts the job id even from input that fails validation, so error
/// envelopes still correlate.
pub fn job_id(input: &Value) -> String {
    match input.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => DEFAULT_JOB_ID.to_string(),
    }
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// The endpoint is appended to the REST base, so it may only be a plain
/// path: leading `/`, no `//`, no userinfo/query/fragment markers, no
/// backslashes or whitespace.
pub fn check_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    let host_safe = endpoint.starts_with('/')
        && !endpoint.contains("//")
        && !endpoint
            .chars()
            .any(|c| matches!(c, '?' | '#' | '@' | '\\') || c.is_whitespace() || c.is_control());
    if host_safe {
        Ok(())
    } else {
        Err(ValidationError::BadEndpoint(endpoint.to_string()))
    }
}

pub fn validate(input: &Value, params: &[Param]) -> Result<Validated, ValidationError> {
    let obj = input.as_object().ok_or(ValidationError::NotAnObject)?;
    let data = match obj.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::Object(m)) => Some(m),
        Some(_) => return Err(ValidationError::DataNotAnObject),
    };

    let mut fields = HashMap::with_capacity(params.len());
    for p in params {
        let found = data.and_then(|d| {
            p.aliases
                .iter()
                .filter_map(|alias| d.get(*alias))
                .find(|v| is_present(v))
        });
        match found {
            Some(v) => {
                fields.insert(p.name, v.clone());
            }
            None if p.required => return Err(ValidationError::MissingParam(p.name)),
            None => {}
        }
    }

    Ok(Validated { job_id: job_id(input), fields })
}

impl TryFrom<Validated> for WithdrawalInput {
    type Error = ValidationError;

    fn try_from(v: Validated) -> Result<Self, Self::Error> {
        let asset = v.string("asset")?.ok_or(ValidationError::MissingParam("asset"))?;
        let address = v.string("address")?.ok_or(ValidationError::MissingParam("address"))?;
        let endpoint = v.string("endpoint")?;
        if let Some(ep) = endpoint.as_deref() {
            check_endpoint(ep)?;
        }
        let amount = match v.fields.get("amount") {
            Some(Value::String(s)) => Amount::Text(s.clone()),
            Some(Value::Number(n)) => Amount::Number(n.clone()),
            Some(_) => {
                return Err(ValidationError::WrongType {
                    name: "amount",
                    expected: "a string or number",
                })
            }
            None => return Err(ValidationError::MissingParam("amount")),
        };

        Ok(WithdrawalInput { job_id: v.job_id, asset, address, amount, endpoint })
    }
}

/// Convenience: raw job JSON -> typed withdrawal input.
pub fn validate_withdrawal(input: &Value) -> Result<WithdrawalInput, ValidationError> {
    validate(input, WITHDRAW_PARAMS)?.try_into()
}
