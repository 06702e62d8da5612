//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every handler
//! - Wire up middleware (request ID, tracing, timeout, body limit,
//!   request metrics, per-IP rate limit)
//! - Serve on a listener until the shutdown future resolves

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::handlers;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::ResilienceCore;
use crate::security::{rate_limit_middleware, request_metrics_middleware};

/// HTTP front of the resilience core.
pub struct HttpServer {
    router: Router,
    core: Arc<ResilienceCore>,
}

impl HttpServer {
    pub fn new(core: Arc<ResilienceCore>) -> Self {
        let router = Self::build_router(core.clone());
        Self { router, core }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Request metrics wrap the rate limiter so 429s are counted; the request ID
    /// is set before tracing sees the request. The body limit sits outside the
    /// timeout because `Timeout` needs a `Default` response body.
    #[allow(deprecated)]
    pub fn build_router(core: Arc<ResilienceCore>) -> Router {
        let server = &core.config.server;
        Router::new()
            .route("/health", get(handlers::health))
            .route("/health/summary", get(handlers::health_summary))
            .route("/ping", get(handlers::ping))
            .route("/metrics", get(handlers::metrics))
            .route("/cache/clear", post(handlers::clear_cache))
            .route("/api/{kind}", post(handlers::api))
            .layer(middleware::from_fn_with_state(core.clone(), rate_limit_middleware))
            .layer(middleware::from_fn_with_state(core.clone(), request_metrics_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs))),
            )
            .with_state(core.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            namespace = %self.core.config.cache.namespace,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn core(&self) -> &Arc<ResilienceCore> {
        &self.core
    }
}
