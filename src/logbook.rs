//! Holder for the currently loaded job logs.

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::pipeline::{normalize, Row};
use crate::source::{DataSource, LogRecord, SourceError};

/// One load cycle's worth of records and the rows built from them.
#[derive(Debug)]
pub struct LogSnapshot {
    /// Request token of the reload that produced this snapshot.
    pub token: u64,
    pub loaded_at: DateTime<Utc>,
    pub records: Vec<LogRecord>,
    pub rows: Vec<Row>,
}

/// Outcome of the newest load that has landed.
struct LoadState {
    token: u64,
    outcome: Option<Result<Arc<LogSnapshot>, SourceError>>,
}

/// Loads job logs from a [`DataSource`] and keeps the newest outcome.
///
/// Every reload takes a fresh token; a reload that finishes after a newer one
/// has already landed is discarded. A failed reload replaces the snapshot, so
/// readers see the error until a later reload succeeds.
pub struct LogBook {
    source: Arc<dyn DataSource>,
    zone: FixedOffset,
    next_token: AtomicU64,
    state: RwLock<LoadState>,
}

impl LogBook {
    pub fn new(source: Arc<dyn DataSource>, zone: FixedOffset) -> Self {
        Self {
            source,
            zone,
            next_token: AtomicU64::new(0),
            state: RwLock::new(LoadState {
                token: 0,
                outcome: None,
            }),
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// The latest load outcome, loading first if nothing has been fetched yet.
    pub async fn current(&self) -> Result<Arc<LogSnapshot>, SourceError> {
        if let Some(outcome) = self.state.read().await.outcome.as_ref() {
            return outcome.clone();
        }
        self.reload().await
    }

    /// Fetch and normalize from scratch.
    pub async fn reload(&self) -> Result<Arc<LogSnapshot>, SourceError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;

        let outcome = match self.source.fetch_logs().await {
            Ok(records) => {
                let rows = normalize(&records, self.zone);
                Ok(Arc::new(LogSnapshot {
                    token,
                    loaded_at: Utc::now(),
                    records,
                    rows,
                }))
            }
            Err(e) => Err(e),
        };

        let mut state = self.state.write().await;
        if state.token > token {
            if let Some(newer) = state.outcome.as_ref() {
                tracing::debug!("Discarding stale reload {} (have {})", token, state.token);
                return newer.clone();
            }
        }

        match &outcome {
            Ok(snapshot) => tracing::info!(
                "Loaded {} job logs from {}",
                snapshot.records.len(),
                self.source.name()
            ),
            Err(e) => tracing::error!("Failed to load logs from {}: {}", self.source.name(), e),
        }
        state.token = token;
        state.outcome = Some(outcome.clone());
        outcome
    }

    /// Delete every stored log, then reload.
    ///
    /// A failed delete leaves the loaded snapshot untouched.
    pub async fn delete_all(&self) -> Result<Arc<LogSnapshot>, SourceError> {
        if let Err(e) = self.source.delete_logs().await {
            tracing::error!("Failed to delete logs from {}: {}", self.source.name(), e);
            return Err(e);
        }
        self.reload().await
    }
}
