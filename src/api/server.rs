//! HTTP server setup.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve until the shutdown broadcast fires

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::config::schema::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::services::Services;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, services: Arc<Services>) -> Self {
        let router = Self::build_router(config, AppState { services });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/login", post(handlers::login))
            .route("/wallet/{user_id}", get(handlers::wallet))
            .route("/export-request", post(handlers::export_request))
            .route("/export-status/{key}", get(handlers::export_status))
            .route("/withdraw-request", post(handlers::withdraw_request))
            .route("/withdraw-status/{key}", get(handlers::withdraw_status))
            .route("/update-request", post(handlers::update_request))
            .route("/update-status/{key}", get(handlers::update_status))
            .route("/update-metadata", post(handlers::update_metadata))
            .route("/campaigns", get(handlers::list_campaigns))
            .route("/campaign/{id}", get(handlers::get_campaign));

        Router::new()
            .route("/health", get(handlers::health))
            .nest("/api", api)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.max_body_size))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
            )
    }

    /// The router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(Shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
