//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Dispatch requests to the request router
//! - Run health checks, stats refresh and the admin API alongside
//! - Apply configuration updates from the watcher

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::admin::{self, AdminState};
use crate::config::BalancerConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::load_balancer::{BalancerError, LoadBalancer};
use crate::registry::HttpStatsProvider;
use crate::routing::{InMemoryAnalytics, RequestRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
}

/// HTTP server for the balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    balancer: Arc<LoadBalancer>,
    analytics: Arc<InMemoryAnalytics>,
}

impl HttpServer {
    /// Create a server, registering the configured backends.
    pub fn new(config: BalancerConfig) -> Result<Self, BalancerError> {
        let balancer = Arc::new(LoadBalancer::from_config(&config)?);
        let analytics = Arc::new(InMemoryAnalytics::default());
        let router = RequestRouter::new(balancer, &config.forwarding, &config.classification)
            .with_analytics(analytics.clone());

        Ok(Self::with_router(config, Arc::new(router), analytics))
    }

    /// Create a server around a preassembled router, e.g. one with a predictor.
    pub fn with_router(
        config: BalancerConfig,
        router: Arc<RequestRouter>,
        analytics: Arc<InMemoryAnalytics>,
    ) -> Self {
        let balancer = router.balancer().clone();
        let app = Self::build_router(AppState { router });

        Self {
            router: app,
            config,
            balancer,
            analytics,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn analytics(&self) -> &Arc<InMemoryAnalytics> {
        &self.analytics
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Run the server until shutdown, accepting connections on `listener`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<BalancerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            algorithm = %self.balancer.algorithm(),
            backends = self.balancer.registry().len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            self.balancer.spawn_health_checks(
                Duration::from_millis(self.config.health_check.interval_ms),
                shutdown.resubscribe(),
            );
        }

        if self.config.stats.enabled {
            self.balancer.spawn_stats_refresh(
                Arc::new(HttpStatsProvider::new(&self.config.stats)),
                Duration::from_millis(self.config.stats.interval_ms),
                shutdown.resubscribe(),
            );
        }

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin_app = admin::setup_admin_router(AdminState {
                balancer: self.balancer.clone(),
                analytics: self.analytics.clone(),
            });
            let mut admin_shutdown = shutdown.resubscribe();
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API starting");
            tokio::spawn(async move {
                let result = axum::serve(admin_listener, admin_app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }

        let balancer = self.balancer.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config(&balancer, &config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Apply a reloaded configuration to the running balancer.
pub fn apply_config(balancer: &LoadBalancer, config: &BalancerConfig) {
    if let Err(e) = balancer.set_algorithm(&config.balancer.algorithm) {
        tracing::error!(error = %e, "Failed to apply algorithm from reloaded config");
    }
    match balancer.reconcile(&config.backends) {
        Ok(()) => tracing::info!(
            algorithm = %balancer.algorithm(),
            backends = balancer.registry().len(),
            "Reloaded configuration applied"
        ),
        Err(e) => tracing::error!(error = %e, "Failed to reconcile backends from reloaded config"),
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Proxying request"
    );

    match state.router.route(request, Some(addr), &request_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
