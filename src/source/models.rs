//! Wire types shared by every data source.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of a single job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogStatus {
    Success,
    Failed,
    /// Anything else the job wrote; kept verbatim so the row still renders.
    Other(String),
}

impl LogStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
            LogStatus::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LogStatus::Success)
    }
}

impl Default for LogStatus {
    fn default() -> Self {
        LogStatus::Other(String::new())
    }
}

impl From<String> for LogStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "success" => LogStatus::Success,
            "failed" => LogStatus::Failed,
            _ => LogStatus::Other(s),
        }
    }
}

impl From<LogStatus> for String {
    fn from(status: LogStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run details written by the job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDetails {
    #[serde(default)]
    pub duration_in_milliseconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_orders_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of a job log custom object.
///
/// Every field tolerates a missing or mistyped value; a bad record renders
/// with placeholders instead of failing the fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogValue {
    /// ISO-8601 timestamp, kept as written so a malformed one survives loading.
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: LogStatus,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_details")]
    pub details: LogDetails,
}

/// Strings pass through, numbers and booleans are printed, anything else is empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_status<'de, D>(deserializer: D) -> Result<LogStatus, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(LogStatus::from)
}

fn lenient_details<'de, D>(deserializer: D) -> Result<LogDetails, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// A job log record as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub key: String,
    pub container: String,
    #[serde(default)]
    pub value: LogValue,
}

/// A named customer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_log_record() {
        let json = r#"{
            "id": "a1",
            "key": "run-1",
            "container": "cron-job-log",
            "version": 1,
            "value": {
                "timestamp": "2024-03-01T10:15:00.000Z",
                "status": "success",
                "message": "Processed orders",
                "details": { "durationInMilliseconds": 65000, "totalOrdersProcessed": 12 }
            }
        }"#;

        let record: LogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key, "run-1");
        assert_eq!(record.value.status, LogStatus::Success);
        assert_eq!(record.value.details.duration_in_milliseconds, 65000);
        assert_eq!(record.value.details.total_orders_processed, Some(12));
        assert!(record.value.details.error.is_none());
    }

    #[test]
    fn test_malformed_values_degrade_per_record() {
        let json = r#"[
            {"id": "a", "key": "a", "container": "c",
             "value": {"timestamp": "2024-03-01T10:15:00Z", "status": "success", "message": "ok"}},
            {"id": "b", "key": "b", "container": "c",
             "value": {"status": null, "message": 7, "details": "oops"}},
            {"id": "c", "key": "c", "container": "c",
             "value": {"timestamp": 1709287200000, "status": "failed"}},
            {"id": "d", "key": "d", "container": "c"}
        ]"#;

        let records: Vec<LogRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 4);

        assert_eq!(records[1].value.timestamp, "");
        assert_eq!(records[1].value.status, LogStatus::Other(String::new()));
        assert_eq!(records[1].value.message, "7");
        assert_eq!(records[1].value.details, LogDetails::default());

        assert_eq!(records[2].value.timestamp, "1709287200000");
        assert_eq!(records[2].value.status, LogStatus::Failed);

        assert_eq!(records[3].value, LogValue::default());
    }

    #[test]
    fn test_unknown_status_is_kept() {
        let status: LogStatus = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(status, LogStatus::Other("running".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""running""#);
    }
}
