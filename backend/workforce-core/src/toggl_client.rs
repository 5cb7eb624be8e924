// src/toggl_client.rs
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};
use url::Url;

use crate::config::TogglConfig;
use crate::error::{Upstream, UpstreamError};
use crate::source::TimeTrackingSource;
use crate::tracked::{SummaryReport, TrackerClient, TrackerProject, TrackerUser};

pub const TOGGL_API_BASE: &str = "https://api.track.toggl.com/api/v9/";
pub const TOGGL_REPORTS_BASE: &str = "https://api.track.toggl.com/reports/api/v3/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SummaryRequest {
    start_date: String,
    end_date: String,
    grouping: &'static str,
    sub_grouping: &'static str,
    include_time_entry_ids: bool,
}

fn transport(message: impl ToString) -> UpstreamError {
    UpstreamError::Transport {
        upstream: Upstream::TimeTracking,
        message: message.to_string(),
    }
}

/// Plain HTTP access to the time tracker. Spacing, retries and caching live
/// in `CachedTimeTracking`.
pub struct TogglClient {
    http_client: Client,
    auth_header: String,
    workspace_id: String,
    api_base: Url,
    reports_base: Url,
}

impl TogglClient {
    pub fn new(config: TogglConfig) -> Result<Self, UpstreamError> {
        Self::with_base_urls(config, TOGGL_API_BASE, TOGGL_REPORTS_BASE)
    }

    pub fn with_base_urls(
        config: TogglConfig,
        api_base: &str,
        reports_base: &str,
    ) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;
        let credentials = STANDARD.encode(format!("{}:api_token", config.api_token));
        Ok(Self {
            http_client,
            auth_header: format!("Basic {}", credentials),
            workspace_id: config.workspace_id,
            api_base: Url::parse(api_base).map_err(transport)?,
            reports_base: Url::parse(reports_base).map_err(transport)?,
        })
    }

    fn workspace_url(&self, base: &Url, path: &str) -> Result<Url, UpstreamError> {
        base.join(&format!("{}{}", path, self.workspace_id))
            .map_err(transport)
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, UpstreamError> {
        let request = request_builder
            .header(header::AUTHORIZATION, &self.auth_header)
            .header(header::CONTENT_TYPE, "application/json")
            .build()
            .map_err(transport)?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = self.http_client.execute(request).await.map_err(|e| {
            error!("Request for '{}' failed: {}", context_msg, e);
            transport(e)
        })?;
        let status = resp.status();
        info!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        let bytes = resp.bytes().await.map_err(transport)?;
        if !status.is_success() {
            let message = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
            error!(
                "Toggl API error for '{}': Status={}, Message='{}'",
                context_msg, status, message
            );
            return Err(UpstreamError::from_status(
                Upstream::TimeTracking,
                status.as_u16(),
                message,
            ));
        }

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            error!("JSON deserialization failed for '{}': {}", context_msg, e);
            UpstreamError::Decode {
                upstream: Upstream::TimeTracking,
                message: e.to_string(),
            }
        })
    }

    async fn get_workspace<T: DeserializeOwned>(
        &self,
        resource: &str,
    ) -> Result<T, UpstreamError> {
        let mut url = self.workspace_url(&self.api_base, "workspaces/")?;
        url.path_segments_mut()
            .map_err(|_| transport("API base URL cannot carry a path"))?
            .push(resource);
        self.send_and_deserialize(self.http_client.get(url), resource)
            .await
    }
}

#[async_trait]
impl TimeTrackingSource for TogglClient {
    async fn fetch_users(&self) -> Result<Vec<TrackerUser>, UpstreamError> {
        self.get_workspace("users").await
    }

    async fn fetch_projects(&self) -> Result<Vec<TrackerProject>, UpstreamError> {
        // The API answers `null` for a workspace without projects.
        let projects: Option<Vec<TrackerProject>> = self.get_workspace("projects").await?;
        Ok(projects.unwrap_or_default())
    }

    async fn fetch_clients(&self) -> Result<Vec<TrackerClient>, UpstreamError> {
        let clients: Option<Vec<TrackerClient>> = self.get_workspace("clients").await?;
        Ok(clients.unwrap_or_default())
    }

    async fn fetch_summary_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SummaryReport, UpstreamError> {
        let mut url = self.workspace_url(&self.reports_base, "workspace/")?;
        url.path_segments_mut()
            .map_err(|_| transport("reports base URL cannot carry a path"))?
            .extend(["summary", "time_entries"]);
        let body = SummaryRequest {
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
            grouping: "users",
            sub_grouping: "projects",
            include_time_entry_ids: false,
        };
        let context = format!("summary {}..{}", start, end);
        self.send_and_deserialize(self.http_client.post(url).json(&body), &context)
            .await
    }
}
