//! HTTP issue tracker client
//!
//! `POST {base}/issues` opens an issue and returns its number;
//! `DELETE {base}/issues/{number}` closes it.

use crate::error::{ProcessError, ProcessResult};
use crate::models::IssueHandle;
use crate::services::collaborators::Notifier;
use async_trait::async_trait;
use reqwest::StatusCode;
use riplink_common::config::EndpointConfig;
use riplink_common::time::millis_to_duration;
use serde::{Deserialize, Serialize};
use tracing::info;

const SERVICE_NAME: &str = "riplink";

#[derive(Debug, Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
    service: &'a str,
}

#[derive(Debug, Deserialize)]
struct IssueCreated {
    number: IssueHandle,
}

fn notifier_error(err: impl std::fmt::Display) -> ProcessError {
    ProcessError::Notifier(err.to_string())
}

/// Notifier collaborator over HTTP
pub struct HttpNotifier {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(endpoint: &EndpointConfig) -> ProcessResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(millis_to_duration(endpoint.timeout_ms))
            .build()
            .map_err(notifier_error)?;

        Ok(Self {
            http_client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Whether a close response means the issue is closed
pub fn close_succeeded(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn open(&self, title: &str, body: &str) -> ProcessResult<IssueHandle> {
        let response = self
            .http_client
            .post(format!("{}/issues", self.base_url))
            .json(&NewIssue {
                title,
                body,
                service: SERVICE_NAME,
            })
            .send()
            .await
            .map_err(notifier_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessError::Notifier(format!("open failed: HTTP {}", status.as_u16())));
        }

        let created: IssueCreated = response.json().await.map_err(notifier_error)?;
        info!(handle = created.number, title, "Opened issue");
        Ok(created.number)
    }

    async fn close(&self, handle: IssueHandle) -> ProcessResult<()> {
        let response = self
            .http_client
            .delete(format!("{}/issues/{}", self.base_url, handle))
            .send()
            .await
            .map_err(notifier_error)?;

        let status = response.status();
        if !close_succeeded(status) {
            return Err(ProcessError::Notifier(format!(
                "close {} failed: HTTP {}",
                handle,
                status.as_u16()
            )));
        }
        info!(handle, "Closed issue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_closed_counts_as_success() {
        assert!(close_succeeded(StatusCode::NO_CONTENT));
        assert!(close_succeeded(StatusCode::NOT_FOUND));
        assert!(close_succeeded(StatusCode::GONE));
        assert!(!close_succeeded(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_client_creation() {
        let notifier = HttpNotifier::new(&EndpointConfig::default());
        assert!(notifier.is_ok());
    }
}
