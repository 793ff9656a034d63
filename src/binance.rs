// ===============================
// src/binance.rs
// ===============================
use ahash::AHashMap as HashMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;
use crate::domain::{SignedRequest, WithdrawalRequest, API_KEY_HEADER};

pub fn timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

pub fn sign_query(secret: &str, query: &str) -> String {
    // HMAC menerima key dengan panjang berapa pun
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC key");
    mac.update(query.as_bytes());
    let sig = mac.finalize().into_bytes();
    hex::encode(sig)
}

/// `k=v&k=v...` in the given order. Values are percent-encoded so the signed
/// string is byte-for-byte the query string that goes on the wire.
pub fn canonical_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs the five withdrawal fields in fixed order:
/// `asset, address, amount, recvWindow, timestamp`.
pub fn sign(
    asset: &str,
    address: &str,
    amount: &str,
    recv_window: u64,
    timestamp: u64,
    secret: &str,
) -> String {
    let query = canonical_query(&[
        ("asset", asset.to_string()),
        ("address", address.to_string()),
        ("amount", amount.to_string()),
        ("recvWindow", recv_window.to_string()),
        ("timestamp", timestamp.to_string()),
    ]);
    sign_query(secret, &query)
}

/// Builds signed withdraw requests against one REST base.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    rest_base: String,
    credentials: Credentials,
}

impl RequestBuilder {
    pub fn new(rest_base: impl Into<String>, credentials: Credentials) -> Self {
        Self { rest_base: rest_base.into(), credentials }
    }

    /// Deterministic: same request (same timestamp) -> same SignedRequest.
    pub fn build(&self, req: &WithdrawalRequest) -> SignedRequest {
        let query: Vec<(&'static str, String)> = req.params().into_iter().collect();
        let query_string = canonical_query(&query);
        let signature = sign_query(self.credentials.api_secret(), &query_string);

        let mut headers = HashMap::new();
        headers.insert(API_KEY_HEADER, self.credentials.api_key().to_string());

        tracing::debug!(%signature, query = %query_string, "withdraw request signed");

        SignedRequest {
            url: format!("{}{}", self.rest_base, req.endpoint),
            query,
            query_string,
            signature,
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, WithdrawalInput, DEFAULT_ENDPOINT};

    const SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    fn builder() -> RequestBuilder {
        let creds = Credentials::new("test-api-key", SECRET).unwrap();
        RequestBuilder::new("https://api.binance.com", creds)
    }

    fn request(timestamp: u64) -> WithdrawalRequest {
        let input = WithdrawalInput {
            job_id: "1".into(),
            asset: "btc".into(),
            address: "addr1".into(),
            amount: Amount::Text("0.5".into()),
            endpoint: None,
        };
        WithdrawalRequest::new(&input, timestamp)
    }

    #[test]
    fn sign_query_matches_binance_doc_vector() {
        // HMAC SHA256 example from the Binance REST docs (SIGNED endpoint security)
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign_query(SECRET, query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn sign_is_deterministic_and_lowercase_hex() {
        let a = sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_000, SECRET);
        let b = sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_000, SECRET);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn changing_any_field_changes_signature() {
        let base = sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_000, SECRET);
        let variants = [
            sign("ETH", "addr1", "0.5", 5000, 1_600_000_000_000, SECRET),
            sign("BTC", "addr2", "0.5", 5000, 1_600_000_000_000, SECRET),
            sign("BTC", "addr1", "0.6", 5000, 1_600_000_000_000, SECRET),
            sign("BTC", "addr1", "0.5", 6000, 1_600_000_000_000, SECRET),
            sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_001, SECRET),
            sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_000, "other-secret"),
        ];
        for v in variants {
            assert_ne!(base, v);
        }
    }

    #[test]
    fn field_order_is_part_of_the_signature() {
        let ordered = sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_000, SECRET);
        let reordered = sign_query(
            SECRET,
            "address=addr1&asset=BTC&amount=0.5&recvWindow=5000&timestamp=1600000000000",
        );
        assert_ne!(ordered, reordered);
        assert_eq!(
            ordered,
            sign_query(
                SECRET,
                "asset=BTC&address=addr1&amount=0.5&recvWindow=5000&timestamp=1600000000000"
            )
        );
    }

    #[test]
    fn build_produces_full_signed_request() {
        let signed = builder().build(&request(1_600_000_000_000));
        assert_eq!(signed.url, format!("https://api.binance.com{DEFAULT_ENDPOINT}"));
        assert_eq!(
            signed.query_string,
            "asset=BTC&address=addr1&amount=0.5&recvWindow=5000&timestamp=1600000000000"
        );
        assert_eq!(
            signed.signature,
            sign("BTC", "addr1", "0.5", 5000, 1_600_000_000_000, SECRET)
        );
        assert_eq!(signed.headers.get(API_KEY_HEADER).map(String::as_str), Some("test-api-key"));
        assert!(signed.full_url().ends_with(&format!("&signature={}", signed.signature)));
    }

    #[test]
    fn rebuild_with_same_timestamp_is_identical() {
        let b = builder();
        let req = request(1_600_000_000_000);
        assert_eq!(b.build(&req), b.build(&req));

        let later = b.build(&request(1_600_000_000_500));
        assert_ne!(later.signature, b.build(&req).signature);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let signed = builder().build(&request(1));
        assert!(!format!("{signed:?}").contains("test-api-key"));
    }
}
