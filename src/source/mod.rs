//! Data-access layer.
//!
//! Job logs and customer data live outside the dashboard. Every backend
//! implements [`DataSource`]; the pipeline never knows how requests travel.

mod http;
mod models;
mod store;

pub use http::*;
pub use models::*;
pub use store::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised at the data-access boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("failed to fetch {resource}: {reason}")]
    Fetch {
        resource: &'static str,
        reason: String,
    },
    #[error("failed to delete logs: {0}")]
    Delete(String),
}

impl SourceError {
    pub fn fetch(resource: &'static str, reason: impl ToString) -> Self {
        SourceError::Fetch {
            resource,
            reason: reason.to_string(),
        }
    }
}

/// Typed requests the dashboard issues against its backing store.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// All job log records, in no particular order.
    async fn fetch_logs(&self) -> Result<Vec<LogRecord>, SourceError>;

    /// Delete every stored job log record.
    async fn delete_logs(&self) -> Result<(), SourceError>;

    async fn fetch_customer_groups(&self) -> Result<Vec<CustomerGroup>, SourceError>;

    async fn fetch_customer_count_for_group(&self, group_id: &str) -> Result<u64, SourceError>;

    async fn fetch_total_customer_count(&self) -> Result<u64, SourceError>;
}
