//! cronboard - job log and customer segment dashboard.
//!
//! Serves a table and charts over cron job logs stored as custom objects,
//! plus a customer segment breakdown.

mod config;
mod logbook;
mod pipeline;
mod segments;
mod source;
mod web;

use config::{ServerConfig, SourceKind};
use logbook::LogBook;
use source::{DataSource, HttpSource, Store};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("cronboard=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting cronboard on port {}...", cfg.http_port);

    let source: Arc<dyn DataSource> = match cfg.source {
        SourceKind::Sqlite => {
            tracing::info!("Using database at {}", cfg.db_path);
            let store = Store::new(&cfg.db_path)?;
            if cfg.seed_demo {
                let seeded = store.seed_demo(&cfg.log_container)?;
                if seeded > 0 {
                    tracing::info!("Seeded {} sample job logs", seeded);
                }
            }
            Arc::new(store)
        }
        SourceKind::Commercetools => {
            let http = cfg.http_source()?;
            tracing::info!(
                "Using commercetools project {} at {} (container {})",
                http.project_key,
                http.api_url,
                http.container
            );
            Arc::new(HttpSource::new(http)?)
        }
    };

    let logs = Arc::new(LogBook::new(source, cfg.display_zone()?));

    // Warm the table; a failure here is reported again on the first request.
    if let Err(e) = logs.reload().await {
        tracing::warn!("Initial log load failed: {}", e);
    }

    let server = Server::new(&cfg, logs);
    server.start().await?;

    Ok(())
}
