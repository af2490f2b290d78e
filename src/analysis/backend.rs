use std::future::Future;
use std::time::Duration;
use log::{error, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use crate::analysis::pages::{Encoding, Page};
use crate::analysis::params::ParamBundle;
use crate::parsers::settings_parser::Settings;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to connect to the analysis service at {url}: {reason}")]
    Connection { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// One POST to an analysis endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub url: String,
    pub body: ParamBundle,
    pub encoding: Encoding,
    pub timeout: Option<Duration>,
}

impl JobRequest {
    pub fn for_page(page: Page, settings: &Settings, body: ParamBundle) -> Self {
        JobRequest {
            url: page.endpoint(settings),
            body,
            encoding: page.encoding(),
            timeout: Some(page.effective_timeout(settings)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// `200` with a JSON body; `message` and `stdout` are lifted out when present.
    Message {
        message: Option<String>,
        stdout: Option<String>,
        body: Value,
    },
    /// `200` with any other body (ZIP archive or rendered figure).
    Payload(Vec<u8>),
}

impl BackendReply {
    pub fn from_json(body: Value) -> Self {
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };
        BackendReply::Message {
            message: field("message"),
            stdout: field("stdout"),
            body: body.clone(),
        }
    }
}

pub trait AnalysisBackend: Send + Sync {
    fn submit(&self, request: JobRequest) -> impl Future<Output = Result<BackendReply, BackendError>> + Send;

    /// Sends one CSV as `multipart/form-data` (`file` part plus `target_dir` text).
    fn forward_csv(
        &self,
        url: &str,
        file_name: &str,
        bytes: Vec<u8>,
        target_dir: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new() -> Result<Self, BackendError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;
        Ok(HttpBackend { client })
    }
}

fn connection_error(url: &str, e: reqwest::Error) -> BackendError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    error!("Request to {} failed: {}", url, reason);
    BackendError::Connection {
        url: url.to_string(),
        reason,
    }
}

async fn status_error(url: &str, response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error!("{} answered {}: {}", url, status, body);
    BackendError::Status { status, body }
}

impl AnalysisBackend for HttpBackend {
    async fn submit(&self, request: JobRequest) -> Result<BackendReply, BackendError> {
        let url = request.url.as_str();
        info!("POST {} ({:?}, {} params)", url, request.encoding, request.body.len());

        let mut builder = self.client.post(url);
        builder = match request.encoding {
            Encoding::Json => builder.json(&request.body),
            Encoding::Form => builder.form(&request.body.form_pairs()),
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| connection_error(url, e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error(url, response).await);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        let bytes = response.bytes().await.map_err(|e| connection_error(url, e))?;
        if is_json {
            let body = serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
            return Ok(BackendReply::from_json(body));
        }
        Ok(BackendReply::Payload(bytes.to_vec()))
    }

    async fn forward_csv(
        &self,
        url: &str,
        file_name: &str,
        bytes: Vec<u8>,
        target_dir: &str,
    ) -> Result<String, BackendError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| BackendError::Client(e.to_string()))?;
        let form = Form::new().part("file", part).text("target_dir", target_dir.to_string());

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| connection_error(url, e))?;
        if response.status() != StatusCode::OK {
            return Err(status_error(url, response).await);
        }
        response.text().await.map_err(|e| connection_error(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_reply_lifts_message_and_stdout() {
        let reply = BackendReply::from_json(serde_json::json!({
            "message": "Cnetplot completed",
            "stdout": "",
            "files": 3
        }));
        match reply {
            BackendReply::Message { message, stdout, body } => {
                assert_eq!(message.as_deref(), Some("Cnetplot completed"));
                assert_eq!(stdout, None);
                assert_eq!(body["files"], 3);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn status_error_displays_server_text() {
        let error = BackendError::Status {
            status: 500,
            body: "R script failed".to_string(),
        };
        assert_eq!(error.to_string(), "500: R script failed");
    }

    #[test]
    fn request_uses_page_settings() {
        let settings = Settings::default();
        let request = JobRequest::for_page(Page::Heatmap, &settings, ParamBundle::new());
        assert_eq!(request.encoding, Encoding::Form);
        assert_eq!(request.timeout, Some(Duration::from_secs(600)));
        assert!(request.url.ends_with("/api/heatmap/") || std::env::var("FASTAPI_HEATMAP").is_ok());
    }
}
