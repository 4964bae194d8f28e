// src/core/service_client.rs
//! HTTP client for the platform's attachment parse-status endpoint

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

use crate::app_log;
use crate::attachment::{FetchError, StatusSource};
use crate::config::MonitorConfig;
use crate::types::StatusReport;

const ATTACHMENTS_ENDPOINT: &str = "/attachments";
const PARSE_STATUS_SUFFIX: &str = "/parse-status";

#[derive(Debug, Clone)]
pub struct AttachmentClient {
    client: reqwest::Client,
    base_url: String,
}

impl AttachmentClient {
    /// Create new service client with configuration
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        Self::new(
            &config.service_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn status_url(&self, attachment_id: &str) -> String {
        format!(
            "{}{}/{}{}",
            self.base_url, ATTACHMENTS_ENDPOINT, attachment_id, PARSE_STATUS_SUFFIX
        )
    }

    /// Current parse status of one attachment
    pub async fn parse_status(&self, attachment_id: &str) -> Result<StatusReport, FetchError> {
        let url = self.status_url(attachment_id);
        app_log!(trace, "Calling parse status endpoint: {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status.is_success() {
            let response_text = response.text().await?;
            serde_json::from_str::<StatusReport>(&response_text).map_err(|e| {
                app_log!(debug, "Undecodable parse status body: {}", response_text);
                FetchError::Decode(e.to_string())
            })
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            app_log!(error, "Parse status error response {}: {}", status, error_text);
            Err(FetchError::Http {
                status: status.as_u16(),
                body: error_text,
            })
        }
    }
}

impl StatusSource for AttachmentClient {
    fn fetch_status(
        &self,
        attachment_id: &str,
    ) -> impl Future<Output = Result<StatusReport, FetchError>> + Send {
        self.parse_status(attachment_id)
    }
}

/// Trimmed attachment id; rejects empty ids.
pub fn validate_attachment_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        anyhow::bail!("Attachment id must not be empty");
    }
    if id.contains('/') {
        anyhow::bail!("Attachment id must not contain '/': {}", id);
    }
    Ok(id.to_string())
}
