//! Normalization of raw log records into display rows.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::source::{LogRecord, LogStatus};

/// Marker written in place of a date or time that could not be parsed.
pub const INVALID_DATE: &str = "Invalid Date";

const DATE_FORMAT: &str = "%-m/%-d/%Y";
const TIME_FORMAT: &str = "%-I:%M:%S %p";

/// Table columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Date,
    Time,
    Status,
    Message,
    Duration,
    TotalOrdersProcessed,
}

/// How a column's values compare under typed ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
    Timestamp,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Date,
        Column::Time,
        Column::Status,
        Column::Message,
        Column::Duration,
        Column::TotalOrdersProcessed,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Time => "time",
            Column::Status => "status",
            Column::Message => "message",
            Column::Duration => "duration",
            Column::TotalOrdersProcessed => "totalOrdersProcessed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Time => "Time",
            Column::Status => "Status",
            Column::Message => "Message",
            Column::Duration => "Duration (ms)",
            Column::TotalOrdersProcessed => "Total Orders Processed",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Date | Column::Time => ColumnKind::Timestamp,
            Column::Duration | Column::TotalOrdersProcessed => ColumnKind::Numeric,
            Column::Status | Column::Message => ColumnKind::Text,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown column: {}", s))
    }
}

/// Flat, display-ready projection of one log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: String,
    pub date: String,
    pub time: String,
    pub status: LogStatus,
    pub message: String,
    #[serde(rename = "durationMs", serialize_with = "as_string")]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_orders_processed: Option<u64>,
    /// Parsed run time, used by typed ordering.
    #[serde(skip)]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

fn as_string<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl Row {
    /// String form of a column, `None` when the row has no value for it.
    pub fn value(&self, column: Column) -> Option<String> {
        match column {
            Column::Date => Some(self.date.clone()),
            Column::Time => Some(self.time.clone()),
            Column::Status => Some(self.status.to_string()),
            Column::Message => Some(self.message.clone()),
            Column::Duration => Some(self.duration_ms.to_string()),
            Column::TotalOrdersProcessed => self.total_orders_processed.map(|n| n.to_string()),
        }
    }
}

/// Build one row per record, in input order.
pub fn normalize(records: &[LogRecord], zone: FixedOffset) -> Vec<Row> {
    records.iter().map(|r| normalize_record(r, zone)).collect()
}

pub fn normalize_record(record: &LogRecord, zone: FixedOffset) -> Row {
    let value = &record.value;
    let timestamp = parse_timestamp(&value.timestamp, zone);

    let (date, time) = match &timestamp {
        Some(ts) => (
            ts.format(DATE_FORMAT).to_string(),
            ts.format(TIME_FORMAT).to_string(),
        ),
        None => {
            tracing::debug!("Unparseable timestamp {:?} on log {}", value.timestamp, record.id);
            (INVALID_DATE.to_string(), INVALID_DATE.to_string())
        }
    };

    // Order counts only mean something for runs that completed.
    let total_orders_processed = if value.status.is_success() {
        value.details.total_orders_processed
    } else {
        None
    };

    Row {
        id: record.id.clone(),
        date,
        time,
        status: value.status.clone(),
        message: value.message.clone(),
        duration_ms: value.details.duration_in_milliseconds,
        total_orders_processed,
        timestamp,
    }
}

/// Format a calendar date exactly as row dates are formatted.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp and shift it into the display zone.
///
/// Accepts RFC 3339, a date-time without offset (read as display-zone local
/// time) and a bare date (read as UTC midnight).
pub fn parse_timestamp(s: &str, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&zone));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return zone.from_local_datetime(&naive).single();
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).with_timezone(&zone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{LogDetails, LogValue};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn record(timestamp: &str, status: &str, orders: Option<u64>) -> LogRecord {
        LogRecord {
            id: "1".to_string(),
            key: "k1".to_string(),
            container: "cron-job-log".to_string(),
            value: LogValue {
                timestamp: timestamp.to_string(),
                status: LogStatus::from(status.to_string()),
                message: "Synced".to_string(),
                details: LogDetails {
                    duration_in_milliseconds: 65000,
                    total_orders_processed: orders,
                    error: None,
                },
            },
        }
    }

    #[test]
    fn test_normalize_success_row() {
        let row = normalize_record(&record("2024-03-05T14:07:09.000Z", "success", Some(7)), utc());
        assert_eq!(row.date, "3/5/2024");
        assert_eq!(row.time, "2:07:09 PM");
        assert_eq!(row.status, LogStatus::Success);
        assert_eq!(row.duration_ms, 65000);
        assert_eq!(row.total_orders_processed, Some(7));
        assert_eq!(row.value(Column::Duration).as_deref(), Some("65000"));
    }

    #[test]
    fn test_orders_dropped_for_failed_runs() {
        let row = normalize_record(&record("2024-03-05T14:07:09Z", "failed", Some(7)), utc());
        assert_eq!(row.total_orders_processed, None);
        assert_eq!(row.value(Column::TotalOrdersProcessed), None);
    }

    #[test]
    fn test_invalid_timestamp_degrades() {
        let rows = normalize(
            &[
                record("not a date", "success", None),
                record("2024-03-05T00:00:00Z", "success", None),
            ],
            utc(),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, INVALID_DATE);
        assert_eq!(rows[0].time, INVALID_DATE);
        assert!(rows[0].timestamp.is_none());
        assert_eq!(rows[1].date, "3/5/2024");
    }

    #[test]
    fn test_display_zone_shifts_date() {
        let zone = FixedOffset::west_opt(5 * 3600).unwrap();
        let row = normalize_record(&record("2024-03-05T02:00:00Z", "success", None), zone);
        assert_eq!(row.date, "3/4/2024");
        assert_eq!(row.time, "9:00:00 PM");
    }

    #[test]
    fn test_row_serializes_duration_as_string() {
        let row = normalize_record(&record("2024-03-05T14:07:09Z", "failed", None), utc());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["durationMs"], "65000");
        assert_eq!(json["status"], "failed");
        assert!(json.get("totalOrdersProcessed").is_none());
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_column_from_str() {
        assert_eq!("totalOrdersProcessed".parse::<Column>().unwrap(), Column::TotalOrdersProcessed);
        assert_eq!("STATUS".parse::<Column>().unwrap(), Column::Status);
        assert!("nope".parse::<Column>().is_err());
    }
}
