//! Configuration module for cronboard.
//!
//! Loads configuration from environment variables with sensible defaults.

use chrono::FixedOffset;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::SortOrdering;
use crate::source::HttpSourceConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set when CRONBOARD_SOURCE=commercetools")]
    Missing(&'static str),
    #[error("UTC offset of {0} minutes is out of range")]
    Offset(i32),
}

/// Where job logs and customers are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Sqlite,
    Commercetools,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SourceKind::Sqlite),
            "commercetools" | "ct" => Ok(SourceKind::Commercetools),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    pub source: SourceKind,
    /// Path to the SQLite database file (default: "cronboard.db")
    pub db_path: String,
    /// Fill an empty SQLite database with sample data on startup.
    pub seed_demo: bool,
    pub api_url: String,
    pub project_key: String,
    pub api_token: Option<String>,
    /// Custom-object container holding the job logs.
    pub log_container: String,
    pub request_timeout: Duration,
    /// Default rows per table page.
    pub page_size: usize,
    /// Display timezone offset for row dates and times, in minutes east of UTC.
    pub utc_offset_minutes: i32,
    pub sort_ordering: SortOrdering,
    /// Most customer-count requests in flight at once.
    pub segment_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            source: SourceKind::Sqlite,
            db_path: "cronboard.db".to_string(),
            seed_demo: false,
            api_url: "https://api.europe-west1.gcp.commercetools.com".to_string(),
            project_key: String::new(),
            api_token: None,
            log_container: "cron-job-log".to_string(),
            request_timeout: Duration::from_secs(10),
            page_size: 10,
            utc_offset_minutes: 0,
            sort_ordering: SortOrdering::Lexical,
            segment_concurrency: 8,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `CRONBOARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `CRONBOARD_SOURCE`: `sqlite` or `commercetools` (default: sqlite)
    /// - `CRONBOARD_DB_PATH`: Database file path (default: "cronboard.db")
    /// - `CRONBOARD_SEED_DEMO`: seed an empty database (default: false)
    /// - `CRONBOARD_API_URL`, `CRONBOARD_PROJECT_KEY`, `CRONBOARD_API_TOKEN`
    /// - `CRONBOARD_LOG_CONTAINER`: (default: "cron-job-log")
    /// - `CRONBOARD_REQUEST_TIMEOUT_SECS`: (default: 10)
    /// - `CRONBOARD_PAGE_SIZE`: (default: 10)
    /// - `CRONBOARD_UTC_OFFSET_MINUTES`: (default: 0)
    /// - `CRONBOARD_SORT_ORDERING`: `lexical` or `typed` (default: lexical)
    /// - `CRONBOARD_SEGMENT_CONCURRENCY`: (default: 8)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        parse_into(&lookup, "CRONBOARD_HTTP_PORT", &mut cfg.http_port);
        parse_into(&lookup, "CRONBOARD_SOURCE", &mut cfg.source);
        parse_into(&lookup, "CRONBOARD_SEED_DEMO", &mut cfg.seed_demo);
        parse_into(&lookup, "CRONBOARD_PAGE_SIZE", &mut cfg.page_size);
        parse_into(&lookup, "CRONBOARD_UTC_OFFSET_MINUTES", &mut cfg.utc_offset_minutes);
        parse_into(&lookup, "CRONBOARD_SORT_ORDERING", &mut cfg.sort_ordering);
        parse_into(&lookup, "CRONBOARD_SEGMENT_CONCURRENCY", &mut cfg.segment_concurrency);

        let mut timeout_secs = cfg.request_timeout.as_secs();
        parse_into(&lookup, "CRONBOARD_REQUEST_TIMEOUT_SECS", &mut timeout_secs);
        cfg.request_timeout = Duration::from_secs(timeout_secs.max(1));

        if let Some(v) = lookup("CRONBOARD_DB_PATH") {
            cfg.db_path = v;
        }
        if let Some(v) = lookup("CRONBOARD_API_URL") {
            cfg.api_url = v;
        }
        if let Some(v) = lookup("CRONBOARD_PROJECT_KEY") {
            cfg.project_key = v;
        }
        cfg.api_token = lookup("CRONBOARD_API_TOKEN").filter(|t| !t.is_empty());
        if let Some(v) = lookup("CRONBOARD_LOG_CONTAINER") {
            cfg.log_container = v;
        }

        cfg.page_size = cfg.page_size.max(1);
        cfg.segment_concurrency = cfg.segment_concurrency.max(1);
        cfg
    }

    pub fn display_zone(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Offset(self.utc_offset_minutes))
    }

    pub fn http_source(&self) -> Result<HttpSourceConfig, ConfigError> {
        if self.project_key.is_empty() {
            return Err(ConfigError::Missing("CRONBOARD_PROJECT_KEY"));
        }
        Ok(HttpSourceConfig {
            api_url: self.api_url.clone(),
            project_key: self.project_key.clone(),
            token: self.api_token.clone(),
            container: self.log_container.clone(),
            timeout: self.request_timeout,
        })
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!("Ignoring invalid {}={:?}", key, raw),
        }
    }
}
