//! Read-only query boundary: group aggregate reports, per-user reports and
//! the group hierarchy lookup.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ReportError, Result};
use crate::models::{GroupDetail, GroupReport, ReportQuery};

#[async_trait]
pub trait ReportSource: Send + Sync + 'static {
    /// Aggregate report for `query.group_id`. With `is_user_report` set the
    /// result carries `user_reports` instead of `day_reports`.
    async fn group_report(&self, query: &ReportQuery) -> Result<GroupReport>;

    /// A group with its immediate subgroups or users.
    async fn group(&self, group_id: &str) -> Result<GroupDetail>;
}

/// `ReportSource` over the attendance REST API.
#[derive(Clone)]
pub struct HttpReportSource {
    client: Client,
    base_url: String,
}

impl HttpReportSource {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?.to_string();

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ReportError::Config(format!("Invalid token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, params = query.len(), "GET");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::FORBIDDEN {
                warn!(%url, "access to report endpoint denied");
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ReportSource for HttpReportSource {
    async fn group_report(&self, query: &ReportQuery) -> Result<GroupReport> {
        if query.group_id.as_deref().map_or(true, str::is_empty) {
            return Err(ReportError::InvalidArgument(
                "group report query requires a group id".to_string(),
            ));
        }
        self.get("/attendance/group-report", &query.to_query_pairs())
            .await
    }

    async fn group(&self, group_id: &str) -> Result<GroupDetail> {
        self.get(&format!("/groups/{}", group_id), &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_base_url() {
        assert!(matches!(
            HttpReportSource::new(&ClientConfig::default()),
            Err(ReportError::Config(_))
        ));
    }

    #[tokio::test]
    async fn rejects_report_queries_without_a_group() {
        let config = ClientConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            token: Some("abc".to_string()),
            timeout_secs: Some(1),
        };
        let source = HttpReportSource::new(&config).unwrap();

        let result = source.group_report(&ReportQuery::default()).await;
        assert!(matches!(result, Err(ReportError::InvalidArgument(_))));
    }
}
