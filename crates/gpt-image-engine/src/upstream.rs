use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gpt_image_contracts::{
    Background, ImageSize, Moderation, OutputFormat, Quality, ResultItem, UpstreamResult,
    UsageStats,
};
use reqwest::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::Builder as TempFileBuilder;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ImageToolError, Result, UpstreamError};

const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPayload {
    pub prompt: String,
    pub n: u32,
    pub size: ImageSize,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_compression: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation: Option<Moderation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditPayload {
    pub prompt: String,
    pub images: Vec<PathBuf>,
    pub mask: Option<PathBuf>,
    pub n: Option<u32>,
    pub size: Option<ImageSize>,
    pub quality: Option<Quality>,
    pub background: Option<Background>,
    pub user: Option<String>,
}

/// One method per image API operation. Any `error` object in the response is
/// surfaced as [`ImageToolError::Upstream`], whatever the HTTP status.
#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn generate(&self, payload: &GenerationPayload) -> Result<UpstreamResult>;
    async fn edit(&self, payload: &EditPayload) -> Result<UpstreamResult>;
}

#[derive(Debug, Clone)]
pub struct OpenAiImageClient {
    config: ClientConfig,
    http: HttpClient,
    scratch_dir: PathBuf,
}

impl OpenAiImageClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory the raw edit response is buffered in before parsing.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_base)
    }

    async fn file_part(path: &Path, default_name: &str) -> Result<MultipartPart> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| ImageToolError::filesystem("read", path, err))?;
        let file_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or(default_name)
            .to_string();
        let mime = mime_for_path(path).unwrap_or("image/png");
        MultipartPart::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|err| ImageToolError::transport(path.display().to_string(), err))
    }

    fn buffer_response(&self, body: &[u8]) -> Result<Vec<u8>> {
        let mut file = TempFileBuilder::new()
            .prefix("response-")
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)
            .map_err(|err| {
                ImageToolError::filesystem("create response buffer in", &self.scratch_dir, err)
            })?;
        let path = file.path().to_path_buf();
        let written = file
            .write_all(body)
            .and_then(|()| file.flush())
            .map_err(|err| ImageToolError::filesystem("write response buffer", &path, err))
            .and_then(|()| {
                fs::read(&path)
                    .map_err(|err| ImageToolError::filesystem("read response buffer", &path, err))
            });
        if let Err(err) = file.close() {
            warn!("Failed to remove response buffer {}: {err}", path.display());
        }
        written
    }
}

#[async_trait]
impl ImageApi for OpenAiImageClient {
    async fn generate(&self, payload: &GenerationPayload) -> Result<UpstreamResult> {
        let endpoint = self.endpoint("images/generations");
        let mut body =
            serde_json::to_value(payload).map_err(|source| ImageToolError::Parse { source })?;
        if let Value::Object(map) = &mut body {
            map.insert("model".to_string(), Value::String(self.config.model.clone()));
        }

        debug!("POST {endpoint} (n={}, size={})", payload.n, payload.size.as_str());
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ImageToolError::transport(&endpoint, err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ImageToolError::transport(&endpoint, err))?;
        interpret_response(status, &bytes)
    }

    async fn edit(&self, payload: &EditPayload) -> Result<UpstreamResult> {
        let endpoint = self.endpoint("images/edits");
        let mut form = MultipartForm::new()
            .text("model", self.config.model.clone())
            .text("prompt", payload.prompt.clone());
        for image in &payload.images {
            form = form.part("image[]", Self::file_part(image, "image.png").await?);
        }
        if let Some(mask) = &payload.mask {
            form = form.part("mask", Self::file_part(mask, "mask.png").await?);
        }
        if let Some(n) = payload.n {
            form = form.text("n", n.to_string());
        }
        if let Some(size) = payload.size {
            form = form.text("size", size.as_str());
        }
        if let Some(quality) = payload.quality {
            form = form.text("quality", quality.as_str());
        }
        if let Some(background) = payload.background {
            form = form.text("background", background.as_str());
        }
        if let Some(user) = &payload.user {
            form = form.text("user", user.clone());
        }

        debug!("POST {endpoint} ({} image part(s))", payload.images.len());
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| ImageToolError::transport(&endpoint, err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ImageToolError::transport(&endpoint, err))?;
        let buffered = self.buffer_response(&bytes)?;
        interpret_response(status, &buffered)
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    #[serde(default)]
    total_tokens: u64,
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Maps a raw HTTP status and body onto a result set or a typed failure.
pub fn interpret_response(status: StatusCode, body: &[u8]) -> Result<UpstreamResult> {
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(source) if status.is_success() => return Err(ImageToolError::Parse { source }),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            return Err(ImageToolError::Upstream(UpstreamError {
                status: Some(status.as_u16()),
                message: format!(
                    "image API request failed ({}): {}",
                    status.as_u16(),
                    truncate_text(text.trim(), ERROR_BODY_MAX_CHARS)
                ),
                error_type: "api_error".to_string(),
                code: None,
                param: None,
                body: Value::Null,
            }));
        }
    };

    if let Some(err) = extract_error(&parsed, status) {
        error!(
            "Image API returned an error (status {}): {} [{}]",
            status.as_u16(),
            err.message,
            err.error_type
        );
        return Err(ImageToolError::Upstream(err));
    }

    if !status.is_success() {
        return Err(ImageToolError::Upstream(UpstreamError {
            status: Some(status.as_u16()),
            message: format!(
                "image API request failed ({}): {}",
                status.as_u16(),
                truncate_text(&parsed.to_string(), ERROR_BODY_MAX_CHARS)
            ),
            error_type: "api_error".to_string(),
            code: None,
            param: None,
            body: parsed,
        }));
    }

    let response: ImagesResponse =
        serde_json::from_value(parsed).map_err(|source| ImageToolError::Parse { source })?;
    let items = response
        .data
        .into_iter()
        .filter_map(|datum| match (datum.b64_json, datum.url) {
            (Some(b64_json), _) if !b64_json.is_empty() => {
                Some(ResultItem::EmbeddedImage { b64_json })
            }
            (_, Some(url)) if !url.is_empty() => Some(ResultItem::RemoteLink { url }),
            _ => None,
        })
        .collect();
    let usage = response.usage.map(|usage| UsageStats {
        total_tokens: usage.total_tokens,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
    });
    Ok(UpstreamResult { items, usage })
}

fn extract_error(payload: &Value, status: StatusCode) -> Option<UpstreamError> {
    let error = payload.get("error").filter(|value| !value.is_null())?;
    let field = |key: &str| error.get(key).and_then(value_as_text);
    let message = match error {
        Value::String(text) => text.clone(),
        _ => field("message").unwrap_or_else(|| "Unknown API error".to_string()),
    };
    Some(UpstreamError {
        status: (!status.is_success()).then(|| status.as_u16()),
        message,
        error_type: field("type").unwrap_or_else(|| "api_error".to_string()),
        code: field("code").or_else(|| field("status")),
        param: field("param"),
        body: payload.clone(),
    })
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
