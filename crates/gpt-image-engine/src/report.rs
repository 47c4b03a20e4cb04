use std::io;

use serde_json::{json, Map, Value};

use crate::error::{ImageToolError, UpstreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOperation {
    Generate,
    Edit,
}

impl ImageOperation {
    fn headline(self) -> &'static str {
        match self {
            Self::Generate => "Image Generation Failed",
            Self::Edit => "Image Edit Failed",
        }
    }
}

const SUGGEST_PATH: &str = "Verify that the file path is correct and the file exists";
const SUGGEST_PERMISSIONS: &str =
    "Check file permissions, or run with elevated privileges if the location is protected";
const SUGGEST_CONNECTIVITY: &str =
    "Check your network connectivity and that OPENAI_API_KEY is set correctly";
const SUGGEST_INVALID_REQUEST: &str =
    "Check that your image format is supported (PNG, JPEG) and the prompt is valid";
const SUGGEST_AUTHENTICATION: &str =
    "Verify your API key and that it has access to the image model";

/// Classified view of a failed tool call, rendered both as text and as metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: String,
    pub kind: String,
    pub message: String,
    pub details: Option<String>,
    pub suggestion: Option<String>,
    pub raw: String,
}

impl ErrorReport {
    pub fn from_error(err: &ImageToolError) -> Self {
        let message = err.to_string();
        let mut report = Self {
            code: "Unknown".to_string(),
            kind: "Error".to_string(),
            message: message.clone(),
            details: None,
            suggestion: None,
            raw: format!("{err:?}"),
        };

        match err {
            ImageToolError::Upstream(upstream) => {
                if let Some(status) = upstream.status {
                    report.code = status.to_string();
                } else if let Some(code) = &upstream.code {
                    report.code = code.clone();
                }
                report.kind = upstream.error_type.clone();
                report.details = Some(upstream_details(upstream));
            }
            ImageToolError::Transport { source, .. } => {
                if let Some(status) = source.status() {
                    report.code = status.as_u16().to_string();
                }
                report.suggestion = Some(SUGGEST_CONNECTIVITY.to_string());
            }
            ImageToolError::Filesystem { source, path, .. } => {
                report.code = io_code(source.kind()).to_string();
                report.details = Some(format!("Path: {}", path.display()));
            }
            ImageToolError::Validation(validation) => {
                report.code = "invalid_params".to_string();
                report.details = Some(format!("Field: {}", validation.field));
            }
            ImageToolError::Decode { what, .. } => {
                report.details = Some(format!("Input: {what}"));
            }
            ImageToolError::Configuration(_) | ImageToolError::Parse { .. } => {}
        }

        if let Some(nested) = embedded_error(&message) {
            if report.kind == "Error" {
                if let Some(kind) = nested.get("type").and_then(Value::as_str) {
                    report.kind = kind.to_string();
                }
            }
            if let Some(nested_message) = nested.get("message").and_then(Value::as_str) {
                report.details = Some(nested_message.to_string());
            }
        }

        if report.suggestion.is_none() {
            report.suggestion = suggestion_for(err, &report.kind, &message);
        }
        report
    }

    pub fn render(&self, operation: ImageOperation) -> String {
        let mut lines = vec![
            format!("## {}", operation.headline()),
            String::new(),
            format!("**Error {}** ({}): {}", self.code, self.kind, self.message),
        ];
        if let Some(details) = &self.details {
            lines.push(String::new());
            lines.push(format!("**Details:** {details}"));
        }
        if let Some(suggestion) = &self.suggestion {
            lines.push(String::new());
            lines.push(format!("**Suggestion:** {suggestion}"));
        }
        lines.push(String::new());
        lines.push("You can try again with adjusted parameters.".to_string());
        lines.push(String::new());
        lines.push("Raw error:".to_string());
        lines.push("```".to_string());
        lines.push(self.raw.clone());
        lines.push("```".to_string());
        lines.join("\n")
    }

    pub fn to_metadata(&self, operation: ImageOperation) -> Value {
        let mut error = Map::new();
        error.insert("code".to_string(), json!(self.code));
        error.insert("type".to_string(), json!(self.kind));
        error.insert("message".to_string(), json!(self.message));
        error.insert("raw".to_string(), json!(self.raw));
        if operation == ImageOperation::Edit {
            error.insert("details".to_string(), json!(self.details));
            error.insert("suggestion".to_string(), json!(self.suggestion));
        }
        json!({ "error": Value::Object(error) })
    }
}

fn upstream_details(upstream: &UpstreamError) -> String {
    let mut lines = vec![upstream.message.clone()];
    if let Some(param) = &upstream.param {
        lines.push(format!("Parameter: {param}"));
    }
    if let Some(code) = &upstream.code {
        lines.push(format!("Error Code: {code}"));
    }
    lines.push(format!("Error Type: {}", upstream.error_type));
    lines.join("\n")
}

fn suggestion_for(err: &ImageToolError, kind: &str, message: &str) -> Option<String> {
    let lowered = message.to_ascii_lowercase();
    let io_kind = match err {
        ImageToolError::Filesystem { source, .. } => Some(source.kind()),
        _ => None,
    };
    let not_found = io_kind == Some(io::ErrorKind::NotFound) || lowered.contains("no such file");
    let denied =
        io_kind == Some(io::ErrorKind::PermissionDenied) || lowered.contains("permission denied");
    let suggestion = if not_found {
        SUGGEST_PATH
    } else if denied {
        SUGGEST_PERMISSIONS
    } else if kind == "invalid_request_error" {
        SUGGEST_INVALID_REQUEST
    } else if kind == "authentication_error" || lowered.contains("incorrect api key") {
        SUGGEST_AUTHENTICATION
    } else {
        return None;
    };
    Some(suggestion.to_string())
}

fn io_code(kind: io::ErrorKind) -> &'static str {
    match kind {
        io::ErrorKind::NotFound => "ENOENT",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::AlreadyExists => "EEXIST",
        _ => "EIO",
    }
}

/// Best-effort parse of a `{...}` span inside `message`; returns the nested
/// `error` object when there is one, else the parsed object itself.
fn embedded_error(message: &str) -> Option<Value> {
    let start = message.find('{')?;
    let end = message.rfind('}')?;
    if end <= start {
        return None;
    }
    let parsed: Value = serde_json::from_str(&message[start..=end]).ok()?;
    match parsed.get("error") {
        Some(nested @ Value::Object(_)) => Some(nested.clone()),
        _ if parsed.is_object() => Some(parsed),
        _ => None,
    }
}
