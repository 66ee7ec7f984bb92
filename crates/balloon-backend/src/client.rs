use std::time::Duration;

use async_trait::async_trait;
use balloon_core::config::BackendConfig;
use balloon_core::{
    BalloonError, DocumentGenerator, DocumentHandle, MappingEntry, Operation, PageSpans,
    PixelPoint, TextResolver,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

#[derive(Deserialize)]
struct NearbyResponse {
    #[serde(default)]
    nearby: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client for the extraction/report service. Cheap to clone; the
/// underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    /// `base_url` without its `/api` segment; spans are served from there
    server_root: String,
    resolve_timeout: Duration,
    generate_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BalloonError> {
        let http = Client::builder()
            .build()
            .map_err(|e| BalloonError::Transport(e.to_string()))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let server_root = base_url
            .strip_suffix("/api")
            .unwrap_or(&base_url)
            .to_string();
        Ok(Self {
            http,
            base_url,
            server_root,
            resolve_timeout: config.resolve_timeout(),
            generate_timeout: config.generate_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Nearby text for a pixel point on the rendered page 1
    #[instrument(skip(self, document), fields(document = document.name(), x = point.x, y = point.y))]
    pub async fn resolve_balloon(
        &self,
        document: &DocumentHandle,
        point: PixelPoint,
    ) -> Result<Vec<String>, BalloonError> {
        let pdf = Part::bytes(document.bytes().to_vec())
            .file_name(document.name().to_string())
            .mime_str("application/pdf")
            .map_err(|e| BalloonError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("pdf", pdf)
            .text("x", point.x.to_string())
            .text("y", point.y.to_string());

        let response = self
            .http
            .post(self.url("resolve-balloon"))
            .multipart(form)
            .timeout(self.resolve_timeout)
            .send()
            .await
            .map_err(|e| request_error(e, Operation::Resolve, self.resolve_timeout))?;
        let body: NearbyResponse = check(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, Operation::Resolve, self.resolve_timeout))?;

        debug!(candidates = body.nearby.len(), "Nearby text resolved");
        Ok(body.nearby)
    }

    /// Fill `template` with the mapping; returns the generated document
    #[instrument(skip(self, mapping), fields(entries = mapping.len()))]
    pub async fn fill_doc_template(
        &self,
        template: &str,
        mapping: &[MappingEntry],
    ) -> Result<Vec<u8>, BalloonError> {
        let balloons = serde_json::to_string(mapping)
            .map_err(|e| BalloonError::Validation(format!("unserializable mapping: {}", e)))?;
        let form = Form::new()
            .text("balloons", balloons)
            .text("template", template.to_string());

        let response = self
            .http
            .post(self.url("fill-doc-template"))
            .multipart(form)
            .timeout(self.generate_timeout)
            .send()
            .await
            .map_err(|e| request_error(e, Operation::Generate, self.generate_timeout))?;
        let bytes = check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| request_error(e, Operation::Generate, self.generate_timeout))?;

        info!(bytes = bytes.len(), "Report generated");
        Ok(bytes.to_vec())
    }

    /// Word spans of page 1 of a document uploaded to the service
    #[instrument(skip(self))]
    pub async fn fetch_spans(&self, pdf: &str) -> Result<PageSpans, BalloonError> {
        let response = self
            .http
            .get(format!("{}/spans", self.server_root))
            .query(&[("pdf", pdf), ("page", "0")])
            .timeout(self.resolve_timeout)
            .send()
            .await
            .map_err(|e| request_error(e, Operation::Resolve, self.resolve_timeout))?;
        let spans: PageSpans = check(response)
            .await?
            .json()
            .await
            .map_err(|e| request_error(e, Operation::Resolve, self.resolve_timeout))?;

        info!(spans = spans.spans.len(), "Fetched page spans");
        Ok(spans)
    }
}

#[async_trait]
impl TextResolver for BackendClient {
    async fn resolve(
        &self,
        document: &DocumentHandle,
        point: PixelPoint,
    ) -> Result<Vec<String>, BalloonError> {
        self.resolve_balloon(document, point).await
    }
}

#[async_trait]
impl DocumentGenerator for BackendClient {
    async fn generate(
        &self,
        template: &str,
        mapping: &[MappingEntry],
    ) -> Result<Vec<u8>, BalloonError> {
        self.fill_doc_template(template, mapping).await
    }
}

fn request_error(err: reqwest::Error, operation: Operation, timeout: Duration) -> BalloonError {
    if err.is_timeout() {
        return BalloonError::Timeout {
            operation,
            ms: timeout.as_millis() as u64,
        };
    }
    if err.is_decode() {
        return BalloonError::Transport(format!("malformed response: {}", err));
    }
    BalloonError::Transport(err.to_string())
}

/// Pass 2xx responses through; turn anything else into `Server` with the
/// service's `{"error": ...}` message when it sent one
async fn check(response: Response) -> Result<Response, BalloonError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    warn!(status = status.as_u16(), %message, "Backend returned an error");
    Err(BalloonError::Server {
        status: status.as_u16(),
        message,
    })
}
