// ===============================
// src/lib.rs
// ===============================
pub mod adapters;
pub mod binance; // signer + request builder for Binance withdraw
pub mod config;
pub mod domain;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod recorder;
pub mod requester; // transport (reqwest + retry loop)
pub mod retry;
pub mod server;
pub mod validator;

pub use config::{Config, Credentials};
pub use domain::ResultEnvelope;
pub use pipeline::Adapter;
pub use requester::{Requester, Transport};
