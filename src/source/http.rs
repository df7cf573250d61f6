//! commercetools HTTP API client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::models::*;
use super::{DataSource, SourceError};

/// Page size for listing endpoints; the platform caps `limit` at 500.
const PAGE_LIMIT: u64 = 500;

/// Connection settings for [`HttpSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub api_url: String,
    pub project_key: String,
    pub token: Option<String>,
    pub container: String,
    pub timeout: Duration,
}

/// Paged query response envelope.
#[derive(Debug, Deserialize)]
struct PagedResponse<T> {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// Data source backed by the commercetools platform API.
pub struct HttpSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::fetch("http client", e))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.project_key,
            path
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self
            .authorize(self.client.get(self.url(path)).query(query))
            .send()
            .await
            .map_err(|e| SourceError::fetch(resource, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::fetch(resource, format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::fetch(resource, e))
    }

    /// Walk every page of a listing endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        path: &str,
    ) -> Result<Vec<T>, SourceError> {
        let mut items = Vec::new();
        let mut offset = 0u64;

        loop {
            let page: PagedResponse<T> = self
                .get_json(
                    resource,
                    path,
                    &[
                        ("limit", PAGE_LIMIT.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let fetched = page.results.len() as u64;
            items.extend(page.results);
            offset += fetched;

            let done = match page.total {
                Some(total) => offset >= total,
                None => fetched < PAGE_LIMIT,
            };
            if done || fetched == 0 {
                break;
            }
        }

        Ok(items)
    }

    async fn count_customers(&self, filter: Option<String>) -> Result<u64, SourceError> {
        let mut query = vec![("limit", "0".to_string()), ("withTotal", "true".to_string())];
        if let Some(filter) = filter {
            query.push(("where", filter));
        }

        let page: PagedResponse<serde_json::Value> =
            self.get_json("customer count", "customers", &query).await?;

        page.total
            .ok_or_else(|| SourceError::fetch("customer count", "response has no total"))
    }
}

#[async_trait]
impl DataSource for HttpSource {
    fn name(&self) -> &str {
        "commercetools"
    }

    async fn fetch_logs(&self) -> Result<Vec<LogRecord>, SourceError> {
        let path = format!("custom-objects/{}", self.config.container);
        self.get_all("job logs", &path).await
    }

    async fn delete_logs(&self) -> Result<(), SourceError> {
        let records = self
            .fetch_logs()
            .await
            .map_err(|e| SourceError::Delete(e.to_string()))?;

        for record in &records {
            let path = format!("custom-objects/{}/{}", record.container, record.key);
            let response = self
                .authorize(self.client.delete(self.url(&path)))
                .send()
                .await
                .map_err(|e| SourceError::Delete(e.to_string()))?;

            let status = response.status();
            // Already gone counts as deleted.
            if !status.is_success() && status != StatusCode::NOT_FOUND {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::Delete(format!(
                    "{}/{}: HTTP {}: {}",
                    record.container, record.key, status, body
                )));
            }
        }

        tracing::info!("Deleted {} job logs from {}", records.len(), self.config.container);
        Ok(())
    }

    async fn fetch_customer_groups(&self) -> Result<Vec<CustomerGroup>, SourceError> {
        self.get_all("customer groups", "customer-groups").await
    }

    async fn fetch_customer_count_for_group(&self, group_id: &str) -> Result<u64, SourceError> {
        self.count_customers(Some(format!("customerGroup(id=\"{}\")", group_id)))
            .await
    }

    async fn fetch_total_customer_count(&self) -> Result<u64, SourceError> {
        self.count_customers(None).await
    }
}
