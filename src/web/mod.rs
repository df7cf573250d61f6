//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::logbook::LogBook;
use crate::pipeline::SortOrdering;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub logs: Arc<LogBook>,
    pub page_size: usize,
    pub sort_ordering: SortOrdering,
    pub segment_concurrency: usize,
}

/// Web server for the dashboard.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(config: &ServerConfig, logs: Arc<LogBook>) -> Self {
        Self {
            port: config.http_port,
            state: AppState {
                logs,
                page_size: config.page_size,
                sort_ordering: config.sort_ordering,
                segment_concurrency: config.segment_concurrency,
            },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        // Pages
        .route("/", get(handlers::handle_dashboard))
        .route("/segments", get(handlers::handle_segments_page))
        // API endpoints
        .route(
            "/api/logs",
            get(handlers::handle_get_logs).delete(handlers::handle_delete_logs),
        )
        .route("/api/logs/refresh", post(handlers::handle_refresh_logs))
        .route("/api/charts/status", get(handlers::handle_status_chart))
        .route("/api/charts/duration", get(handlers::handle_duration_chart))
        .route("/api/segments", get(handlers::handle_get_segments))
        // Static assets
        .route("/favicon.ico", get(handlers::handle_favicon))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
