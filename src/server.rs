// ===============================
// src/server.rs
// ===============================
//
// HTTP entry point (hyper 0.14):
//   POST /         -> job JSON in, envelope JSON out (status = envelope status)
//   GET  /metrics  -> Prometheus text
//   GET  /health   -> "ok"
//
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

use crate::metrics;
use crate::normalizer::validation_error;
use crate::pipeline::Adapter;
use crate::requester::Transport;
use crate::validator::{ValidationError, DEFAULT_JOB_ID};

fn json_response(status: u16, body: &Value) -> Response<Body> {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut rsp = Response::new(Body::from(body.to_string()));
    *rsp.status_mut() = code;
    rsp.headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
    rsp
}

fn text_response(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    let mut rsp = Response::new(body.into());
    *rsp.status_mut() = status;
    if let Ok(v) = hyper::header::HeaderValue::from_str(content_type) {
        rsp.headers_mut().insert(CONTENT_TYPE, v);
    }
    rsp
}

pub async fn handle<T: Transport>(adapter: Arc<Adapter<T>>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/") => {
            let bytes = match hyper::body::to_bytes(req.into_body()).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(?e, "failed to read request body");
                    let env = validation_error(DEFAULT_JOB_ID, &ValidationError::MalformedBody(e.to_string()));
                    return Ok(json_response(env.status_code, &env.to_json()));
                }
            };
            let input = match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => v,
                Err(e) => {
                    let env = validation_error(DEFAULT_JOB_ID, &ValidationError::MalformedBody(e.to_string()));
                    return Ok(json_response(env.status_code, &env.to_json()));
                }
            };
            let (status, env) = adapter.execute(&input).await;
            Ok(json_response(status, &env.to_json()))
        }
        (&Method::GET, "/metrics") => Ok(text_response(
            StatusCode::OK,
            &metrics::content_type(),
            metrics::encode_metrics(),
        )),
        (&Method::GET, "/health") => Ok(text_response(StatusCode::OK, "text/plain", "ok")),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "text/plain", "not found")),
    }
}

pub async fn serve<T>(addr: SocketAddr, adapter: Arc<Adapter<T>>) -> Result<(), hyper::Error>
where
    T: Transport + 'static,
{
    let make_svc = make_service_fn(move |_conn| {
        let adapter = adapter.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(adapter.clone(), req))) }
    });

    info!(%addr, "withdraw adapter listening (POST /, GET /metrics)");
    Server::bind(&addr).serve(make_svc).await
}
