//! HTTP request handlers.

use super::AppState;
use crate::pipeline::{
    duration_histogram, duration_scatter, status_counts, table_view, Column, Direction,
    FilterSpec, HistogramBin, PageSpec, Row, ScatterPoint, SortSpec, StatusCounts, StatusSlice,
    TableQuery,
};
use crate::segments::{load_segments, SegmentCount, SegmentReport};
use crate::source::SourceError;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Upper bound on `per_page`.
const MAX_PAGE_SIZE: usize = 500;

// ============================================================================
// Templates
// ============================================================================

const LAYOUT_TEMPLATE: &str = include_str!("templates/layout.html");
const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");
const SEGMENTS_TEMPLATE: &str = include_str!("templates/segments.html");

fn render_page(title: &str, content: &str) -> Html<String> {
    Html(
        LAYOUT_TEMPLATE
            .replace("{{title}}", title)
            .replace("{{content}}", content),
    )
}

// ============================================================================
// Errors
// ============================================================================

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

/// Upstream failures surface as 502 so the page can swap in its error state.
fn source_error(e: SourceError) -> Response {
    error_response(StatusCode::BAD_GATEWAY, e)
}

// ============================================================================
// Pages
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let columns: Vec<_> = Column::ALL
        .iter()
        .map(|c| json!({ "key": c.key(), "label": c.label() }))
        .collect();
    let columns_json = serde_json::to_string(&columns).unwrap_or_else(|_| "[]".to_string());

    let content = DASHBOARD_TEMPLATE
        .replace("{{columns_json}}", &columns_json)
        .replace("{{page_size}}", &state.page_size.to_string());

    render_page("Cron Job Logs", &content)
}

pub async fn handle_segments_page() -> impl IntoResponse {
    render_page("Customer Segments", SEGMENTS_TEMPLATE)
}

// ============================================================================
// API: Logs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    /// Column header clicked; flips the current `sort`/`order`.
    #[serde(default)]
    pub toggle: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl LogsQuery {
    fn table_query(&self, default_page_size: usize) -> Result<TableQuery, String> {
        let filter = FilterSpec::parse(
            self.mode.as_deref().unwrap_or_default(),
            self.field.as_deref(),
            self.term.as_deref(),
            self.date.as_deref(),
        )?;

        let mut sort = SortSpec::default();
        if let Some(column) = &self.sort {
            sort.column = column.parse()?;
        }
        if let Some(order) = &self.order {
            sort.direction = order.parse()?;
        }
        if let Some(column) = &self.toggle {
            sort = sort.toggle(column.parse()?);
        }

        let per_page = self.per_page.unwrap_or(default_page_size).min(MAX_PAGE_SIZE);
        let page = PageSpec::new(self.page.unwrap_or(1), per_page);

        Ok(TableQuery { filter, sort, page })
    }
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub rows: Vec<Row>,
    /// Filtered row count, before pagination.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub page_count: usize,
    pub sort: Column,
    pub order: Direction,
    pub loaded_at: DateTime<Utc>,
}

pub async fn handle_get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let table = match query.table_query(state.page_size) {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let snapshot = match state.logs.current().await {
        Ok(s) => s,
        Err(e) => return source_error(e),
    };

    let page = table_view(&snapshot.rows, &table, state.sort_ordering);

    Json(LogsResponse {
        rows: page.items,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        page_count: page.page_count,
        sort: table.sort.column,
        order: table.sort.direction,
        loaded_at: snapshot.loaded_at,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub count: usize,
    pub loaded_at: DateTime<Utc>,
}

pub async fn handle_refresh_logs(State(state): State<AppState>) -> Response {
    match state.logs.reload().await {
        Ok(s) => Json(ReloadResponse {
            count: s.rows.len(),
            loaded_at: s.loaded_at,
        })
        .into_response(),
        Err(e) => source_error(e),
    }
}

pub async fn handle_delete_logs(State(state): State<AppState>) -> Response {
    match state.logs.delete_all().await {
        Ok(s) => Json(ReloadResponse {
            count: s.rows.len(),
            loaded_at: s.loaded_at,
        })
        .into_response(),
        Err(e) => source_error(e),
    }
}

// ============================================================================
// API: Charts
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusChartResponse {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub slices: [StatusSlice; 2],
}

pub async fn handle_status_chart(State(state): State<AppState>) -> Response {
    let snapshot = match state.logs.current().await {
        Ok(s) => s,
        Err(e) => return source_error(e),
    };

    let counts = status_counts(&snapshot.rows);
    Json(StatusChartResponse {
        counts,
        slices: counts.slices(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct DurationQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DurationChartResponse {
    Bins { bins: Vec<HistogramBin> },
    Scatter { points: Vec<ScatterPoint> },
}

pub async fn handle_duration_chart(
    State(state): State<AppState>,
    Query(query): Query<DurationQuery>,
) -> Response {
    let mode = query.mode.as_deref().unwrap_or("bins");
    if !["bins", "scatter"].contains(&mode) {
        return error_response(StatusCode::BAD_REQUEST, format!("unknown chart mode: {}", mode));
    }

    let snapshot = match state.logs.current().await {
        Ok(s) => s,
        Err(e) => return source_error(e),
    };

    let body = if mode == "scatter" {
        DurationChartResponse::Scatter {
            points: duration_scatter(&snapshot.rows),
        }
    } else {
        DurationChartResponse::Bins {
            bins: duration_histogram(&snapshot.rows),
        }
    };
    Json(body).into_response()
}

// ============================================================================
// API: Segments
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SegmentsResponse {
    #[serde(flatten)]
    pub report: SegmentReport,
    pub distribution: Vec<SegmentCount>,
}

pub async fn handle_get_segments(State(state): State<AppState>) -> Response {
    let source = state.logs.source().clone();
    match load_segments(source.as_ref(), state.segment_concurrency).await {
        Ok(report) => {
            let distribution = report.distribution();
            Json(SegmentsResponse {
                report,
                distribution,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load customer segments: {}", e);
            source_error(e)
        }
    }
}

// ============================================================================
// Static Assets
// ============================================================================

pub async fn handle_favicon() -> impl IntoResponse {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
        <rect x="10" y="10" width="80" height="80" rx="12" fill="#4CAF50"/>
        <path d="M25 70 L25 45 M42 70 L42 30 M59 70 L59 52 M76 70 L76 38" stroke="white" stroke-width="8"/>
    </svg>"##;

    (
        [(axum::http::header::CONTENT_TYPE, "image/svg+xml")],
        svg
    )
}

#[cfg(test)]
mod tests {
    use super::super::router;
    use super::*;
    use crate::logbook::LogBook;
    use crate::pipeline::SortOrdering;
    use crate::source::{CustomerGroup, LogDetails, LogRecord, LogStatus, LogValue, Store};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use chrono::FixedOffset;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn record(key: &str, ts: &str, status: &str, duration: u64) -> LogRecord {
        LogRecord {
            id: key.to_string(),
            key: key.to_string(),
            container: "cron-job-log".to_string(),
            value: LogValue {
                timestamp: ts.to_string(),
                status: LogStatus::from(status.to_string()),
                message: format!("export {}", key),
                details: LogDetails {
                    duration_in_milliseconds: duration,
                    total_orders_processed: Some(3),
                    error: None,
                },
            },
        }
    }

    fn seeded_state(dir: &TempDir) -> AppState {
        let store = Store::new(dir.path().join("test.db")).unwrap();
        store.add_log(&record("a", "2024-03-01T08:00:00Z", "success", 5000)).unwrap();
        store.add_log(&record("b", "2024-03-02T08:00:00Z", "failed", 65000)).unwrap();
        store.add_log(&record("c", "2024-03-03T08:00:00Z", "success", 1_805_000)).unwrap();

        store
            .add_customer_group(&CustomerGroup {
                id: "g1".to_string(),
                name: "Gold".to_string(),
            })
            .unwrap();
        store.add_customer("c1", "a@example.com", Some("g1")).unwrap();
        store.add_customer("c2", "b@example.com", None).unwrap();

        AppState {
            logs: Arc::new(LogBook::new(Arc::new(store), FixedOffset::east_opt(0).unwrap())),
            page_size: 2,
            sort_ordering: SortOrdering::Lexical,
            segment_concurrency: 4,
        }
    }

    async fn call(state: AppState, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_get_logs_default_sort_and_paging() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(seeded_state(&dir), Method::GET, "/api/logs").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["page_count"], 2);
        assert_eq!(body["sort"], "date");
        assert_eq!(body["order"], "desc");
        let ids: Vec<_> = body["rows"].as_array().unwrap().iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_get_logs_field_filter() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(
            seeded_state(&dir),
            Method::GET,
            "/api/logs?mode=field&field=status&term=FAIL",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["rows"][0]["id"], "b");
        // Failed runs never carry an order count.
        assert!(body["rows"][0].get("totalOrdersProcessed").is_none());
    }

    #[tokio::test]
    async fn test_get_logs_toggle_and_date() {
        let dir = TempDir::new().unwrap();
        let (_, body) = call(
            seeded_state(&dir),
            Method::GET,
            "/api/logs?sort=duration&order=asc&toggle=duration&per_page=10",
        )
        .await;
        assert_eq!(body["order"], "desc");

        let (_, body) = call(seeded_state(&dir), Method::GET, "/api/logs?mode=date&date=2024-03-02").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["rows"][0]["date"], "3/2/2024");
    }

    #[tokio::test]
    async fn test_get_logs_bad_request() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(seeded_state(&dir), Method::GET, "/api/logs?sort=colour").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("colour"));
    }

    #[tokio::test]
    async fn test_charts() {
        let dir = TempDir::new().unwrap();
        let state = seeded_state(&dir);

        let (_, body) = call(state.clone(), Method::GET, "/api/charts/status").await;
        assert_eq!(body["success"], 2);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["slices"][1]["name"], "Failure");

        let (_, body) = call(state.clone(), Method::GET, "/api/charts/duration").await;
        assert_eq!(body["mode"], "bins");
        assert_eq!(body["bins"].as_array().unwrap().len(), 31);
        assert_eq!(body["bins"][30]["count"], 1);

        let (_, body) = call(state.clone(), Method::GET, "/api/charts/duration?mode=scatter").await;
        assert_eq!(body["points"].as_array().unwrap().len(), 3);
        assert!(body["points"][0]["formattedDate"].is_string());

        let (status, _) = call(state, Method::GET, "/api/charts/duration?mode=pie").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_not_served_as_data() {
        let dir = TempDir::new().unwrap();
        let state = seeded_state(&dir);

        let (status, body) = call(state.clone(), Method::GET, "/api/logs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        // Break the backing table out from under the store.
        let conn = rusqlite::Connection::open(dir.path().join("test.db")).unwrap();
        conn.execute_batch("DROP TABLE job_logs").unwrap();

        let (status, _) = call(state.clone(), Method::POST, "/api/logs/refresh").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, body) = call(state.clone(), Method::GET, "/api/logs").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("job logs"));

        let (status, _) = call(state, Method::GET, "/api/charts/status").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_delete_then_refresh() {
        let dir = TempDir::new().unwrap();
        let state = seeded_state(&dir);

        let (status, body) = call(state.clone(), Method::DELETE, "/api/logs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let (status, body) = call(state, Method::POST, "/api/logs/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_segments() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(seeded_state(&dir), Method::GET, "/api/segments").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["per_group"][0], json!({ "name": "Gold", "count": 1 }));
        assert_eq!(body["remainder"], json!({ "name": "Other", "count": 1 }));
        assert_eq!(body["distribution"].as_array().unwrap().len(), 2);
        assert!(body["warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pages_render() {
        let dir = TempDir::new().unwrap();
        let state = seeded_state(&dir);
        for uri in ["/", "/segments"] {
            let response = router(state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let html = String::from_utf8(bytes.to_vec()).unwrap();
            assert!(!html.contains("{{"));
        }
    }
}
