//! SQLite-backed data source for local runs.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use super::{DataSource, SourceError};

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Job logs ---

    /// Insert or replace a job log record.
    pub fn add_log(&self, record: &LogRecord) -> Result<(), DbError> {
        let conn = self.conn()?;
        let details = &record.value.details;
        conn.execute(
            "INSERT OR REPLACE INTO job_logs
             (id, key, container, timestamp, status, message, duration_ms, total_orders_processed, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.key,
                record.container,
                record.value.timestamp,
                record.value.status.as_str(),
                record.value.message,
                to_sql_int(details.duration_in_milliseconds),
                details.total_orders_processed.map(to_sql_int),
                details.error,
            ],
        )?;
        Ok(())
    }

    /// Get every job log record in insertion order.
    pub fn get_logs(&self) -> Result<Vec<LogRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, key, container, timestamp, status, message, duration_ms, total_orders_processed, error
             FROM job_logs ORDER BY rowid ASC",
        )?;

        let logs = stmt
            .query_map([], |row| {
                let status: String = row.get(4)?;
                let duration: i64 = row.get(6)?;
                let orders: Option<i64> = row.get(7)?;
                Ok(LogRecord {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    container: row.get(2)?,
                    value: LogValue {
                        timestamp: row.get(3)?,
                        status: LogStatus::from(status),
                        message: row.get(5)?,
                        details: LogDetails {
                            duration_in_milliseconds: from_sql_int(duration),
                            total_orders_processed: orders.map(from_sql_int),
                            error: row.get(8)?,
                        },
                    },
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// Delete all job logs, returning how many were removed.
    pub fn delete_all_logs(&self) -> Result<usize, DbError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM job_logs", [])?)
    }

    // --- Customers ---

    pub fn add_customer_group(&self, group: &CustomerGroup) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO customer_groups (id, name) VALUES (?1, ?2)",
            params![group.id, group.name],
        )?;
        Ok(())
    }

    pub fn add_customer(&self, id: &str, email: &str, group_id: Option<&str>) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO customers (id, email, customer_group_id) VALUES (?1, ?2, ?3)",
            params![id, email, group_id],
        )?;
        Ok(())
    }

    pub fn get_customer_groups(&self) -> Result<Vec<CustomerGroup>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM customer_groups ORDER BY rowid ASC")?;
        let groups = stmt
            .query_map([], |row| {
                Ok(CustomerGroup {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(groups)
    }

    /// Count customers, either all of them or the members of one group.
    pub fn count_customers(&self, group_id: Option<&str>) -> Result<u64, DbError> {
        let conn = self.conn()?;
        let count: i64 = match group_id {
            Some(id) => {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM customer_groups WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Err(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
                }
                conn.query_row(
                    "SELECT COUNT(*) FROM customers WHERE customer_group_id = ?1",
                    params![id],
                    |row| row.get(0),
                )?
            }
            None => conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?,
        };
        Ok(from_sql_int(count))
    }

    /// Fill an empty database with a week of sample runs and a few customers.
    ///
    /// Returns the number of log records written; a database that already
    /// holds logs is left alone.
    pub fn seed_demo(&self, container: &str) -> Result<usize, DbError> {
        if !self.get_logs()?.is_empty() {
            return Ok(0);
        }

        let start = Utc::now() - ChronoDuration::days(7);
        let mut written = 0;
        for i in 0..28u64 {
            let failed = i % 5 == 3;
            let ran_at = start + ChronoDuration::hours(6 * i as i64);
            // Spread durations from seconds up past the half-hour mark.
            let duration = (i * i * 2_357 + 4_000) % 2_100_000;
            let record = LogRecord {
                id: format!("demo-{:02}", i),
                key: format!("order-export-{:02}", i),
                container: container.to_string(),
                value: LogValue {
                    timestamp: ran_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    status: if failed { LogStatus::Failed } else { LogStatus::Success },
                    message: if failed {
                        "Order export failed".to_string()
                    } else {
                        "Order export completed".to_string()
                    },
                    details: LogDetails {
                        duration_in_milliseconds: duration,
                        total_orders_processed: if failed { None } else { Some(i * 3 % 17) },
                        error: failed.then(|| "ERP endpoint timed out".to_string()),
                    },
                },
            };
            self.add_log(&record)?;
            written += 1;
        }

        let groups = [("gold", "Gold", 12), ("silver", "Silver", 20), ("bronze", "Bronze", 9)];
        for (id, name, members) in groups {
            self.add_customer_group(&CustomerGroup {
                id: id.to_string(),
                name: name.to_string(),
            })?;
            for n in 0..members {
                let customer = format!("{}-{}", id, n);
                self.add_customer(&customer, &format!("{}@example.com", customer), Some(id))?;
            }
        }
        for n in 0..15 {
            let customer = format!("guest-{}", n);
            self.add_customer(&customer, &format!("{}@example.com", customer), None)?;
        }

        Ok(written)
    }
}

fn to_sql_int(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn from_sql_int(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

#[async_trait]
impl DataSource for Store {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch_logs(&self) -> Result<Vec<LogRecord>, SourceError> {
        self.get_logs().map_err(|e| SourceError::fetch("job logs", e))
    }

    async fn delete_logs(&self) -> Result<(), SourceError> {
        let removed = self.delete_all_logs().map_err(|e| SourceError::Delete(e.to_string()))?;
        tracing::info!("Deleted {} job logs", removed);
        Ok(())
    }

    async fn fetch_customer_groups(&self) -> Result<Vec<CustomerGroup>, SourceError> {
        self.get_customer_groups()
            .map_err(|e| SourceError::fetch("customer groups", e))
    }

    async fn fetch_customer_count_for_group(&self, group_id: &str) -> Result<u64, SourceError> {
        self.count_customers(Some(group_id))
            .map_err(|e| SourceError::fetch("customer count", e))
    }

    async fn fetch_total_customer_count(&self) -> Result<u64, SourceError> {
        self.count_customers(None)
            .map_err(|e| SourceError::fetch("customer count", e))
    }
}
