//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from forwarded messages
//! - Map routing errors to status codes and JSON bodies
//!
//! # Design Decisions
//! - Backend timeouts result in 504 Gateway Timeout
//! - Every error body carries the request ID

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::http::request::X_REQUEST_ID;
use crate::routing::RouteError;

const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Remove connection-scoped headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all("connection")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: String,
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_id: Option<&'a str>,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            request_id: self.request_id(),
            backend_id: self.backend_id(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(self.request_id()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_strips_standard_and_named_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-internal"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("x-internal", HeaderValue::from_static("secret"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("content-type"));
    }

    #[test]
    fn test_strips_proxy_connection_and_trailer() {
        let mut headers = HeaderMap::new();
        headers.insert("proxy-connection", HeaderValue::from_static("keep-alive"));
        headers.insert("trailer", HeaderValue::from_static("expires"));
        headers.insert("te", HeaderValue::from_static("trailers"));
        headers.insert("upgrade", HeaderValue::from_static("h2c"));
        headers.insert("proxy-authorization", HeaderValue::from_static("Basic abc"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("proxy-authorization"));
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = RouteError::ForwardingTimeout {
            request_id: "req-9".into(),
            backend_id: "b2".into(),
            timeout_ms: 100,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-9");
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["requestId"], "req-9");
        assert_eq!(json["backendId"], "b2");
        assert!(json["error"].as_str().unwrap().contains("100ms"));
    }

    #[tokio::test]
    async fn test_error_body_without_backend() {
        let response = RouteError::NoHealthyBackends {
            request_id: "req-1".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("backendId").is_none());
    }
}
