//! Forwarding one request to one backend.
//!
//! # Responsibilities
//! - Rewrite the target to the backend base URL and Host to its authority
//! - Strip hop-by-hop headers in both directions
//! - Bound the whole exchange, body included, by one timeout
//!
//! Responses are buffered in full before they are returned, so a timeout
//! can never leave a half-written response with the client.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderValue, Method, Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::config::ForwardingConfig;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::strip_hop_by_hop;
use crate::registry::BackendDescriptor;
use crate::routing::error::RouteError;

pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_response_bytes: usize,
}

impl Forwarder {
    pub fn new(config: &ForwardingConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            max_response_bytes: config.max_response_bytes,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn forward(
        &self,
        parts: Parts,
        body: Bytes,
        backend: &BackendDescriptor,
        request_id: &str,
    ) -> Result<Response<Body>, RouteError> {
        let failure = |reason: String| RouteError::ForwardingFailure {
            request_id: request_id.to_string(),
            backend_id: backend.id.clone(),
            reason,
        };

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri: Uri = backend
            .url_for(path_and_query)
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| failure(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        let authority =
            HeaderValue::from_str(&backend.authority()).map_err(|e| failure(e.to_string()))?;
        headers.insert(header::HOST, authority);
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(X_REQUEST_ID, value);
        }

        let body = if parts.method == Method::GET || parts.method == Method::HEAD {
            headers.remove(header::CONTENT_LENGTH);
            Body::empty()
        } else {
            Body::from(body)
        };

        let mut request = Request::builder()
            .method(parts.method)
            .uri(uri)
            .body(body)
            .map_err(|e| failure(e.to_string()))?;
        *request.headers_mut() = headers;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| failure(e.to_string()))?;
            let (mut parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
                .await
                .map_err(|e| failure(format!("failed to read response body: {}", e)))?;
            strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::from(bytes)))
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RouteError::ForwardingTimeout {
                request_id: request_id.to_string(),
                backend_id: backend.id.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
