//! Row filtering.

use chrono::NaiveDate;

use super::rows::{format_date, Column, Row};

/// The single active table filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Free text matched against every column.
    All { term: String },
    /// Substring match on one column.
    Field { column: Column, term: String },
    /// Exact calendar-date match; `None` disables the filter.
    Date { date: Option<NaiveDate> },
}

impl Default for FilterSpec {
    fn default() -> Self {
        FilterSpec::All {
            term: String::new(),
        }
    }
}

impl FilterSpec {
    /// Build a filter from loose request parameters.
    ///
    /// `mode` is one of `all`, `field` or `date` (empty means `all`).
    pub fn parse(
        mode: &str,
        field: Option<&str>,
        term: Option<&str>,
        date: Option<&str>,
    ) -> Result<Self, String> {
        let term = term.unwrap_or_default().to_string();
        match mode.trim() {
            "" | "all" => Ok(FilterSpec::All { term }),
            "field" => {
                let column = field
                    .ok_or_else(|| "field filter needs a field".to_string())?
                    .parse::<Column>()?;
                Ok(FilterSpec::Field { column, term })
            }
            "date" => {
                let date = match date.map(str::trim).filter(|d| !d.is_empty()) {
                    Some(d) => Some(
                        NaiveDate::parse_from_str(d, "%Y-%m-%d")
                            .map_err(|e| format!("invalid date {:?}: {}", d, e))?,
                    ),
                    None => None,
                };
                Ok(FilterSpec::Date { date })
            }
            other => Err(format!("unknown filter mode: {}", other)),
        }
    }
}

/// Keep the rows matching `spec`, preserving their relative order.
pub fn filter_rows<'a>(rows: &'a [Row], spec: &FilterSpec) -> Vec<&'a Row> {
    match spec {
        FilterSpec::All { term } => match needle(term) {
            None => rows.iter().collect(),
            Some(needle) => rows
                .iter()
                .filter(|row| {
                    Column::ALL
                        .into_iter()
                        .any(|c| contains(row.value(c).as_deref(), &needle))
                })
                .collect(),
        },
        FilterSpec::Field { column, term } => match needle(term) {
            None => rows.iter().collect(),
            Some(needle) => rows
                .iter()
                .filter(|row| contains(row.value(*column).as_deref(), &needle))
                .collect(),
        },
        FilterSpec::Date { date: None } => rows.iter().collect(),
        FilterSpec::Date { date: Some(date) } => {
            // Compare formatted strings so the display zone never shifts the day.
            let target = format_date(*date);
            rows.iter().filter(|row| row.date == target).collect()
        }
    }
}

/// Lowercased search term, or `None` when it is blank.
fn needle(term: &str) -> Option<String> {
    if term.trim().is_empty() {
        None
    } else {
        Some(term.to_lowercase())
    }
}

fn contains(value: Option<&str>, needle: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LogStatus;

    fn row(id: &str, date: &str, status: &str, message: &str, orders: Option<u64>) -> Row {
        Row {
            id: id.to_string(),
            date: date.to_string(),
            time: "10:00:00 AM".to_string(),
            status: LogStatus::from(status.to_string()),
            message: message.to_string(),
            duration_ms: 1500,
            total_orders_processed: orders,
            timestamp: None,
        }
    }

    fn sample() -> Vec<Row> {
        vec![
            row("1", "3/1/2024", "success", "Exported orders", Some(12)),
            row("2", "3/1/2024", "failed", "Timeout talking to ERP", None),
            row("3", "3/2/2024", "success", "Exported orders", Some(4)),
            row("4", "3/3/2024", "failed", "Bad credentials", None),
            row("5", "3/3/2024", "success", "Nothing to do", Some(0)),
        ]
    }

    fn ids(rows: &[&Row]) -> Vec<String> {
        rows.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_empty_all_filter_is_identity() {
        let rows = sample();
        let out = filter_rows(&rows, &FilterSpec::default());
        assert_eq!(out.len(), rows.len());
    }

    #[test]
    fn test_all_mode_matches_any_column() {
        let rows = sample();
        let out = filter_rows(&rows, &FilterSpec::All { term: "ERP".to_string() });
        assert_eq!(ids(&out), vec!["2"]);

        // "12" only appears in the order count of the first row.
        let out = filter_rows(&rows, &FilterSpec::All { term: "12".to_string() });
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn test_field_mode_status_preserves_order() {
        let rows = sample();
        let spec = FilterSpec::Field {
            column: Column::Status,
            term: "fail".to_string(),
        };
        let out = filter_rows(&rows, &spec);
        assert_eq!(ids(&out), vec!["2", "4"]);
    }

    #[test]
    fn test_field_mode_absent_value_never_matches() {
        let rows = sample();
        let spec = FilterSpec::Field {
            column: Column::TotalOrdersProcessed,
            term: "0".to_string(),
        };
        // Failed rows have no order count at all.
        assert_eq!(ids(&filter_rows(&rows, &spec)), vec!["5"]);
    }

    #[test]
    fn test_blank_field_term_is_identity() {
        let rows = sample();
        let spec = FilterSpec::Field {
            column: Column::Message,
            term: "   ".to_string(),
        };
        assert_eq!(filter_rows(&rows, &spec).len(), rows.len());
    }

    #[test]
    fn test_date_mode_exact_match() {
        let rows = sample();
        let spec = FilterSpec::Date {
            date: NaiveDate::from_ymd_opt(2024, 3, 3),
        };
        assert_eq!(ids(&filter_rows(&rows, &spec)), vec!["4", "5"]);
        assert_eq!(filter_rows(&rows, &FilterSpec::Date { date: None }).len(), 5);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            FilterSpec::parse("field", Some("status"), Some("fail"), None).unwrap(),
            FilterSpec::Field {
                column: Column::Status,
                term: "fail".to_string()
            }
        );
        assert_eq!(
            FilterSpec::parse("date", None, None, Some("2024-03-03")).unwrap(),
            FilterSpec::Date {
                date: NaiveDate::from_ymd_opt(2024, 3, 3)
            }
        );
        assert_eq!(
            FilterSpec::parse("date", None, None, Some(" ")).unwrap(),
            FilterSpec::Date { date: None }
        );
        assert!(FilterSpec::parse("date", None, None, Some("03/03/2024")).is_err());
        assert!(FilterSpec::parse("field", None, Some("x"), None).is_err());
        assert!(FilterSpec::parse("regex", None, None, None).is_err());
    }
}
