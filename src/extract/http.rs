//! HTTP implementation of the extraction client, speaking to the CV
//! pipeline service's `/process-attendance` endpoint: multipart image
//! upload in, JSON table out.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{ExtractionClient, ExtractionPayload, RowPayload, into_table};
use crate::errors::ExtractionError;
use crate::table::AttendanceTable;

#[derive(Debug, Clone, Deserialize)]
struct ExtractResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    rows: Vec<RowPayload>,
}

pub struct HttpExtractionClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpExtractionClient {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            endpoint: format!("{}/process-attendance", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn extract(
        &self,
        payload: ExtractionPayload,
    ) -> Result<AttendanceTable, ExtractionError> {
        let part = Part::bytes(payload.bytes.to_vec())
            .file_name(payload.file_name.clone())
            .mime_str(&payload.media_type)
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;
        let form = Form::new().part("image", part);

        debug!(endpoint = %self.endpoint, file = %payload.file_name, "submitting image for extraction");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Service {
                message: format!("HTTP {status}"),
            });
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedPayload(e.to_string()))?;

        if body.status != "success" {
            return Err(ExtractionError::Service {
                message: if body.message.is_empty() {
                    format!("service status '{}'", body.status)
                } else {
                    body.message
                },
            });
        }

        into_table(body.rows)
    }
}
