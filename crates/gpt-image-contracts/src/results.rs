use serde::{Deserialize, Serialize};

use crate::requests::OutputFormat;

/// One item returned by the image API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultItem {
    EmbeddedImage { b64_json: String },
    RemoteLink { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpstreamResult {
    pub items: Vec<ResultItem>,
    pub usage: Option<UsageStats>,
}

impl UpstreamResult {
    pub fn embedded_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, ResultItem::EmbeddedImage { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactLocation {
    Path { path: String },
    Url { url: String },
}

impl ArtifactLocation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Path { path } => path.as_str(),
            Self::Url { url } => url.as_str(),
        }
    }
}

/// Locally observable outcome of a [`ResultItem`]: a written file or a passthrough link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedArtifact {
    #[serde(flatten)]
    pub location: ArtifactLocation,
    pub format: OutputFormat,
}

impl SavedArtifact {
    pub fn file(path: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            location: ArtifactLocation::Path { path: path.into() },
            format,
        }
    }

    pub fn link(url: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            location: ArtifactLocation::Url { url: url.into() },
            format,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.location, ArtifactLocation::Path { .. })
    }
}
