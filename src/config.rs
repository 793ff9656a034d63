// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : binance_withdraw_adapter — signed Binance withdrawal adapter in Rust
Module  : config.rs
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
use std::fmt;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

pub const DEFAULT_REST_URL: &str = "https://api.binance.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is empty")]
    EmptyCredential(&'static str),
    #[error("invalid BINANCE_REST_URL {url}: {source}")]
    BadRestUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("BINANCE_REST_URL must be http(s), got {0}")]
    UnsupportedScheme(String),
    #[error(transparent)]
    Args(#[from] clap::Error),
}

/// HTTP verb used for the withdraw call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum WithdrawMethod {
    #[default]
    Get,
    Post,
}

/// API key + secret. Never printed: Debug is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::EmptyCredential("BINANCE_API_KEY"));
        }
        if api_secret.trim().is_empty() {
            return Err(ConfigError::EmptyCredential("BINANCE_API_SECRET"));
        }
        Ok(Self { api_key, api_secret })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Kebijakan retry untuk transport (dipakai Requester)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            timeout: Duration::from_millis(30_000),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "binance_withdraw_adapter", version, about = "Signed Binance withdrawal adapter")]
pub struct Args {
    #[arg(long, env = "BINANCE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "BINANCE_API_SECRET", hide_env_values = true)]
    pub api_secret: String,

    #[arg(long, env = "BINANCE_REST_URL", default_value = DEFAULT_REST_URL)]
    pub rest_url: String,

    #[arg(long, env = "WITHDRAW_METHOD", value_enum, default_value_t = WithdrawMethod::Get)]
    pub method: WithdrawMethod,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "RETRY_MAX", default_value_t = 3)]
    pub retry_max: u32,

    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,

    #[arg(long, env = "HTTP_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    #[arg(long, env = "RECORD_FILE")]
    pub record_file: Option<String>,

    #[arg(long, env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub rest_url: String,
    pub method: WithdrawMethod,
    pub port: u16,
    pub retry: RetryPolicy,
    pub record_file: Option<String>,
    pub log_filter: String,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let credentials = Credentials::new(args.api_key, args.api_secret)?;
        let rest_url = normalize_rest_url(&args.rest_url)?;

        Ok(Self {
            credentials,
            rest_url,
            method: args.method,
            port: args.port,
            retry: RetryPolicy {
                max_retries: args.retry_max,
                base_delay: Duration::from_millis(args.retry_delay_ms),
                timeout: Duration::from_millis(args.timeout_ms),
            },
            record_file: args.record_file,
            log_filter: args.log_filter,
        })
    }

    /// Config untuk test/embedding: kredensial eksplisit, sisanya default.
    pub fn with_credentials(credentials: Credentials, rest_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            credentials,
            rest_url: normalize_rest_url(rest_url)?,
            method: WithdrawMethod::default(),
            port: 8080,
            retry: RetryPolicy::default(),
            record_file: None,
            log_filter: "info".to_string(),
        })
    }
}

fn normalize_rest_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw.trim()).map_err(|source| ConfigError::BadRestUrl {
        url: raw.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
    // endpoint selalu diawali "/", jadi base tanpa trailing slash
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Resolve configuration once at process start: `.env` first, then flags / ENV.
pub fn load() -> Result<Config, ConfigError> {
    // Pastikan .env dibaca (agar BINANCE_API_KEY, dll ter-load)
    let _ = dotenv();
    let args = Args::try_parse()?;
    Config::from_args(args)
}
