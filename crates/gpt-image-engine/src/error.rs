use std::io;
use std::path::PathBuf;

use gpt_image_contracts::ValidationError;
use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = ImageToolError> = std::result::Result<T, E>;

/// Error object reported by the image API, either with a failing status or inline
/// in an otherwise successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
    pub error_type: String,
    pub code: Option<String>,
    pub param: Option<String>,
    pub body: Value,
}

#[derive(Debug, Error)]
pub enum ImageToolError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}", .0.message)]
    Upstream(UpstreamError),

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse image API response: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base64 data for {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: base64::DecodeError,
    },
}

impl ImageToolError {
    pub fn filesystem(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
