//! Customer segment aggregation.
//!
//! Named customer groups each carry a member count fetched on its own; the
//! customers outside every group land in a synthetic "Other" segment computed
//! against a separately fetched total.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::source::{CustomerGroup, DataSource, SourceError};

pub const REMAINDER_NAME: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentCount {
    pub name: String,
    pub count: u64,
}

/// Non-blocking problems found while aggregating.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentWarning {
    #[error("customer count for group {group} unavailable: {reason}")]
    GroupCountFailed { group: String, reason: String },
    #[error("group counts add up to {assigned} but only {total} customers exist")]
    Overcounted { assigned: u64, total: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentReport {
    pub per_group: Vec<SegmentCount>,
    pub remainder: SegmentCount,
    pub total: u64,
    pub warnings: Vec<SegmentWarning>,
}

impl SegmentReport {
    /// Chart-ready sequence: the groups in order, then the remainder.
    pub fn distribution(&self) -> Vec<SegmentCount> {
        let mut out = self.per_group.clone();
        out.push(self.remainder.clone());
        out
    }
}

/// Reconcile per-group counts against the global total.
///
/// The remainder never goes negative; an over-counted snapshot clamps it to
/// zero and is reported as a warning.
pub fn aggregate(per_group: Vec<SegmentCount>, total: u64) -> SegmentReport {
    let assigned: u64 = per_group.iter().map(|g| g.count).sum();
    let mut warnings = Vec::new();

    let remainder = match total.checked_sub(assigned) {
        Some(rest) => rest,
        None => {
            let warning = SegmentWarning::Overcounted { assigned, total };
            tracing::warn!("{}", warning);
            warnings.push(warning);
            0
        }
    };

    SegmentReport {
        per_group,
        remainder: SegmentCount {
            name: REMAINDER_NAME.to_string(),
            count: remainder,
        },
        total,
        warnings,
    }
}

/// Fetch groups, their counts and the total, then aggregate.
///
/// Group counts are fetched concurrently, at most `concurrency` at a time. A
/// failed count becomes zero plus a warning; failing to list the groups or
/// to fetch the total is an error.
pub async fn load_segments(
    source: &dyn DataSource,
    concurrency: usize,
) -> Result<SegmentReport, SourceError> {
    let groups = source.fetch_customer_groups().await?;
    tracing::debug!("Fetching customer counts for {} groups", groups.len());

    // `buffered` keeps results in group order.
    let results: Vec<(CustomerGroup, Result<u64, SourceError>)> = stream::iter(groups)
        .map(|group| async move {
            let count = source.fetch_customer_count_for_group(&group.id).await;
            (group, count)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut warnings = Vec::new();
    let per_group = results
        .into_iter()
        .map(|(group, count)| {
            let count = match count {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Failed to fetch customers for group {}: {}", group.id, e);
                    warnings.push(SegmentWarning::GroupCountFailed {
                        group: group.name.clone(),
                        reason: e.to_string(),
                    });
                    0
                }
            };
            SegmentCount {
                name: group.name,
                count,
            }
        })
        .collect();

    let total = source.fetch_total_customer_count().await?;

    let mut report = aggregate(per_group, total);
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    Ok(report)
}
