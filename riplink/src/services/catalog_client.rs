//! HTTP catalog client
//!
//! Talks JSON to the record catalog service:
//! - `GET  {base}/records/{id}`
//! - `PATCH {base}/records/{id}` with `{cd_path, file_path}`
//! - `GET  {base}/folders/{folder}/records`

use crate::error::{ProcessError, ProcessResult};
use crate::models::Record;
use crate::services::collaborators::{catalog_error, Catalog};
use async_trait::async_trait;
use reqwest::StatusCode;
use riplink_common::config::EndpointConfig;
use riplink_common::time::millis_to_duration;
use serde::Serialize;
use tracing::debug;

const USER_AGENT: &str = concat!("riplink/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct UpdatePaths<'a> {
    cd_path: &'a str,
    file_path: &'a str,
}

/// Map a non-success catalog status onto the processing error taxonomy
pub fn status_error(id: i32, status: StatusCode, body: &str) -> ProcessError {
    match status {
        StatusCode::NOT_FOUND => ProcessError::RecordNotFound(id),
        StatusCode::GONE => ProcessError::RecordGone(id),
        StatusCode::BAD_REQUEST => ProcessError::InvalidArgument(format!("record {}: {}", id, body)),
        _ => ProcessError::Catalog(format!("record {}: HTTP {} {}", id, status.as_u16(), body)),
    }
}

/// Catalog collaborator over HTTP
pub struct HttpCatalog {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(endpoint: &EndpointConfig) -> ProcessResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(millis_to_duration(endpoint.timeout_ms))
            .build()
            .map_err(catalog_error)?;

        Ok(Self {
            http_client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn record_url(&self, id: i32) -> String {
        format!("{}/records/{}", self.base_url, id)
    }

    async fn check(id: i32, response: reqwest::Response) -> ProcessResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(id, status, &body))
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn get_record(&self, id: i32) -> ProcessResult<Record> {
        let url = self.record_url(id);
        debug!(record_id = id, url = %url, "Fetching record");

        let response = self.http_client.get(&url).send().await.map_err(catalog_error)?;
        Self::check(id, response)
            .await?
            .json::<Record>()
            .await
            .map_err(catalog_error)
    }

    async fn update_record(&self, id: i32, cd_path: &str, file_path: &str) -> ProcessResult<()> {
        let response = self
            .http_client
            .patch(self.record_url(id))
            .json(&UpdatePaths { cd_path, file_path })
            .send()
            .await
            .map_err(catalog_error)?;
        Self::check(id, response).await?;
        debug!(record_id = id, cd_path, file_path, "Updated record paths");
        Ok(())
    }

    async fn query_by_folder(&self, folder_id: i32) -> ProcessResult<Vec<Record>> {
        let url = format!("{}/folders/{}/records", self.base_url, folder_id);
        let response = self.http_client.get(&url).send().await.map_err(catalog_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProcessError::Catalog(format!(
                "folder {}: HTTP {}",
                folder_id,
                status.as_u16()
            )));
        }
        response.json::<Vec<Record>>().await.map_err(catalog_error)
    }
}
