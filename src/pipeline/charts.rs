//! Chart projections over the full, unfiltered row set.

use serde::Serialize;

use super::rows::Row;
use crate::source::LogStatus;

/// Number of one-minute histogram bins before the overflow bin.
pub const MINUTE_BINS: u64 = 30;
pub const OVERFLOW_LABEL: &str = "30+ min";

const MS_PER_MINUTE: u64 = 60_000;

/// Success and failure tallies. Other statuses are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub success: usize,
    pub failed: usize,
}

/// One pie slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSlice {
    pub name: &'static str,
    pub value: usize,
}

impl StatusCounts {
    /// Both slices, always in success-then-failure order, zeros included.
    pub fn slices(&self) -> [StatusSlice; 2] {
        [
            StatusSlice {
                name: "Success",
                value: self.success,
            },
            StatusSlice {
                name: "Failure",
                value: self.failed,
            },
        ]
    }
}

pub fn status_counts(rows: &[Row]) -> StatusCounts {
    rows.iter().fold(StatusCounts::default(), |mut acc, row| {
        match row.status {
            LogStatus::Success => acc.success += 1,
            LogStatus::Failed => acc.failed += 1,
            LogStatus::Other(_) => {}
        }
        acc
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBin {
    pub label: String,
    pub count: usize,
}

/// Execution-time histogram: thirty one-minute bins plus "30+ min".
///
/// Every bin is present even when empty, so the output always has 31 entries.
pub fn duration_histogram(rows: &[Row]) -> Vec<HistogramBin> {
    let mut bins: Vec<HistogramBin> = (0..MINUTE_BINS)
        .map(|m| HistogramBin {
            label: format!("{}-{} min", m, m + 1),
            count: 0,
        })
        .chain(std::iter::once(HistogramBin {
            label: OVERFLOW_LABEL.to_string(),
            count: 0,
        }))
        .collect();

    for row in rows {
        let minutes = row.duration_ms / MS_PER_MINUTE;
        let idx = minutes.min(MINUTE_BINS) as usize;
        bins[idx].count += 1;
    }

    bins
}

/// One point per run for the per-event view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPoint {
    pub formatted_date: String,
    pub duration_seconds: f64,
    pub status: LogStatus,
}

pub fn duration_scatter(rows: &[Row]) -> Vec<ScatterPoint> {
    rows.iter()
        .map(|row| ScatterPoint {
            formatted_date: row.date.clone(),
            duration_seconds: row.duration_ms as f64 / 1000.0,
            status: row.status.clone(),
        })
        .collect()
}
