//! Row ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::rows::{Column, ColumnKind, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

/// How column values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrdering {
    /// Every value compared as its string form, so "10" sorts before "2".
    #[default]
    Lexical,
    /// Numbers numerically, dates and times chronologically, text as text.
    Typed,
}

impl FromStr for SortOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lexical" => Ok(SortOrdering::Lexical),
            "typed" => Ok(SortOrdering::Typed),
            other => Err(format!("unknown sort ordering: {}", other)),
        }
    }
}

/// The single active sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: Column,
    pub direction: Direction,
}

impl Default for SortSpec {
    /// Newest runs first.
    fn default() -> Self {
        Self {
            column: Column::Date,
            direction: Direction::Desc,
        }
    }
}

impl SortSpec {
    /// Header click: the active ascending column flips to descending, any
    /// other click sorts ascending.
    pub fn toggle(self, column: Column) -> Self {
        let direction = if self.column == column && self.direction == Direction::Asc {
            Direction::Desc
        } else {
            Direction::Asc
        };
        Self { column, direction }
    }
}

/// Stable sort; rows with equal keys keep their incoming order.
pub fn sort_rows<'a>(mut rows: Vec<&'a Row>, spec: SortSpec, ordering: SortOrdering) -> Vec<&'a Row> {
    rows.sort_by(|a, b| {
        let ord = compare(a, b, spec.column, ordering);
        match spec.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    });
    rows
}

fn compare(a: &Row, b: &Row, column: Column, ordering: SortOrdering) -> Ordering {
    let kind = match ordering {
        SortOrdering::Lexical => ColumnKind::Text,
        SortOrdering::Typed => column.kind(),
    };

    match kind {
        ColumnKind::Text => lexical_key(a, column).cmp(&lexical_key(b, column)),
        ColumnKind::Numeric => numeric_key(a, column).cmp(&numeric_key(b, column)),
        ColumnKind::Timestamp => match column {
            Column::Time => a.timestamp.map(|t| t.time()).cmp(&b.timestamp.map(|t| t.time())),
            _ => a.timestamp.map(|t| t.date_naive()).cmp(&b.timestamp.map(|t| t.date_naive())),
        },
    }
}

/// Absent values sort as the empty string.
fn lexical_key(row: &Row, column: Column) -> String {
    row.value(column).unwrap_or_default()
}

fn numeric_key(row: &Row, column: Column) -> Option<u64> {
    match column {
        Column::Duration => Some(row.duration_ms),
        Column::TotalOrdersProcessed => row.total_orders_processed,
        _ => row.value(column).and_then(|v| v.parse().ok()),
    }
}
