//! Admin API for runtime roster and algorithm management.
//!
//! Bound to its own listener, separate from proxied traffic.

pub mod handlers;

use axum::{
    routing::{get, put},
    Router,
};

pub use self::handlers::AdminState;
use self::handlers::*;

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends).post(register_backend))
        .route(
            "/admin/backends/{id}",
            put(update_backend).delete(deregister_backend),
        )
        .route("/admin/algorithm", get(get_algorithm).put(set_algorithm))
        .route("/admin/analytics", get(get_analytics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthCheckConfig, StrategyConfig};
    use crate::health::HttpProber;
    use crate::load_balancer::LoadBalancer;
    use crate::routing::InMemoryAnalytics;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AdminState {
        let balancer = LoadBalancer::new(
            &StrategyConfig::default(),
            &HealthCheckConfig::default(),
            Arc::new(HttpProber::new("/health")),
        )
        .unwrap();
        AdminState {
            balancer: Arc::new(balancer),
            analytics: Arc::new(InMemoryAnalytics::default()),
        }
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_backend_lifecycle() {
        let state = state();
        let app = setup_admin_router(state.clone());

        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/admin/backends",
                r#"{"id":"b1","address":"http://127.0.0.1:3001","specialization":"api"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let duplicate = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/admin/backends",
                r#"{"id":"b1","address":"http://127.0.0.1:3002"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let updated = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/admin/backends/b1",
                r#"{"address":"http://127.0.0.1:4001"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(json(updated).await["baseUrl"], "http://127.0.0.1:4001/");

        let listed = app
            .clone()
            .oneshot(Request::get("/admin/backends").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = json(listed).await;
        assert_eq!(listed[0]["id"], "b1");
        assert_eq!(listed[0]["health"]["status"], "healthy");

        let deleted = app
            .clone()
            .oneshot(
                Request::delete("/admin/backends/b1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = app
            .oneshot(
                Request::delete("/admin/backends/b1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(state.balancer.registry().is_empty());
    }

    #[tokio::test]
    async fn test_algorithm_switch() {
        let state = state();
        let app = setup_admin_router(state.clone());

        let rejected = app
            .clone()
            .oneshot(json_request("PUT", "/admin/algorithm", r#"{"algorithm":"random"}"#))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let accepted = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/admin/algorithm",
                r#"{"algorithm":"least-connections"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);

        let status = app
            .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json(status).await["algorithm"], "least-connections");
    }
}
