use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PROMPT_CHARS: usize = 32_000;
pub const MIN_IMAGE_COUNT: u32 = 1;
pub const MAX_IMAGE_COUNT: u32 = 10;
pub const MAX_OUTPUT_COMPRESSION: u32 = 100;

pub const DEFAULT_SIZE: ImageSize = ImageSize::Square;
pub const DEFAULT_QUALITY: Quality = Quality::High;
pub const DEFAULT_IMAGE_COUNT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    Transparent,
    Opaque,
    Auto,
}

impl Background {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Opaque => "opaque",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
    Auto,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ImageSize {
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1536x1024")]
    Landscape,
    #[serde(rename = "1024x1536")]
    Portrait,
    #[serde(rename = "auto")]
    Auto,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1536x1024",
            Self::Portrait => "1024x1536",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Moderation {
    Low,
    Auto,
}

impl Moderation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Auto => "auto",
        }
    }
}

/// Arguments of the `create_image` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    /// Text description of the desired image.
    #[schemars(length(max = 32000))]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    /// Number of images to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 10))]
    pub n: Option<u32>,
    /// Compression level (0-100) for jpeg/webp output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 100))]
    pub output_compression: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
    /// End-user identifier forwarded to the image API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderation: Option<Moderation>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            background: None,
            n: None,
            output_compression: None,
            output_format: None,
            quality: None,
            size: None,
            user: None,
            moderation: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_prompt(&self.prompt)?;
        validate_count(self.n)?;
        if let Some(compression) = self.output_compression {
            if compression > MAX_OUTPUT_COMPRESSION {
                return Err(ValidationError::new(
                    "output_compression",
                    format!("must be between 0 and {MAX_OUTPUT_COMPRESSION}, got {compression}"),
                ));
            }
        }
        Ok(())
    }

    pub fn effective_size(&self) -> ImageSize {
        self.size.unwrap_or(DEFAULT_SIZE)
    }

    pub fn effective_quality(&self) -> Quality {
        self.quality.unwrap_or(DEFAULT_QUALITY)
    }

    pub fn effective_count(&self) -> u32 {
        self.n.unwrap_or(DEFAULT_IMAGE_COUNT)
    }

    pub fn effective_format(&self) -> OutputFormat {
        self.output_format.unwrap_or_default()
    }
}

/// One image (or mask) supplied to `create_image_edit`.
///
/// Either a base64 payload, optionally prefixed with `data:image/<subtype>;base64,`,
/// or a reference to a file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ImageInputRef {
    InlineBase64(String),
    FilePath {
        #[serde(rename = "filePath")]
        file_path: String,
        /// The file holds base64 text rather than raw image bytes.
        #[serde(rename = "isBase64", default)]
        is_base64: bool,
    },
}

impl ImageInputRef {
    pub fn file(path: impl Into<String>) -> Self {
        Self::FilePath {
            file_path: path.into(),
            is_base64: false,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::InlineBase64(_))
    }

    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::InlineBase64(_) => None,
            Self::FilePath { file_path, .. } => Some(file_path.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ImageInputs {
    One(ImageInputRef),
    Many(Vec<ImageInputRef>),
}

impl ImageInputs {
    pub fn as_slice(&self) -> &[ImageInputRef] {
        match self {
            Self::One(input) => std::slice::from_ref(input),
            Self::Many(inputs) => inputs.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Arguments of the `create_image_edit` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EditRequest {
    /// Source image(s): base64 strings or `{ "filePath": ... }` objects.
    pub image: ImageInputs,
    /// Text description of the desired edit.
    #[schemars(length(max = 32000))]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    /// Optional mask marking the regions to edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<ImageInputRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 10))]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl EditRequest {
    pub fn new(image: ImageInputs, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            background: None,
            mask: None,
            n: None,
            quality: None,
            size: None,
            user: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_prompt(&self.prompt)?;
        validate_count(self.n)?;
        if self.image.is_empty() {
            return Err(ValidationError::new(
                "image",
                "at least one source image is required",
            ));
        }
        Ok(())
    }

    pub fn effective_size(&self) -> ImageSize {
        self.size.unwrap_or(DEFAULT_SIZE)
    }

    pub fn effective_quality(&self) -> Quality {
        self.quality.unwrap_or(DEFAULT_QUALITY)
    }

    pub fn effective_count(&self) -> u32 {
        self.n.unwrap_or(DEFAULT_IMAGE_COUNT)
    }
}

fn validate_prompt(prompt: &str) -> Result<(), ValidationError> {
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(ValidationError::new(
            "prompt",
            format!("exceeds maximum length of {MAX_PROMPT_CHARS} characters ({chars})"),
        ));
    }
    Ok(())
}

fn validate_count(n: Option<u32>) -> Result<(), ValidationError> {
    match n {
        Some(n) if !(MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT).contains(&n) => Err(ValidationError::new(
            "n",
            format!("must be between {MIN_IMAGE_COUNT} and {MAX_IMAGE_COUNT}, got {n}"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prompt_at_limit_is_accepted_and_one_over_is_rejected() {
        let at_limit = GenerationRequest::new("a".repeat(MAX_PROMPT_CHARS));
        assert!(at_limit.validate().is_ok());

        let over = GenerationRequest::new("a".repeat(MAX_PROMPT_CHARS + 1));
        let err = over.validate().unwrap_err();
        assert_eq!(err.field, "prompt");

        let edit = EditRequest::new(
            ImageInputs::One(ImageInputRef::file("in.png")),
            "é".repeat(MAX_PROMPT_CHARS + 1),
        );
        assert_eq!(edit.validate().unwrap_err().field, "prompt");
    }

    #[test]
    fn prompt_bound_counts_characters_not_bytes() {
        let request = GenerationRequest::new("é".repeat(MAX_PROMPT_CHARS));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn count_and_compression_ranges_are_enforced() {
        let mut request = GenerationRequest::new("a fox");
        request.n = Some(0);
        assert_eq!(request.validate().unwrap_err().field, "n");
        request.n = Some(11);
        assert_eq!(request.validate().unwrap_err().field, "n");
        request.n = Some(10);
        assert!(request.validate().is_ok());

        request.output_compression = Some(101);
        assert_eq!(request.validate().unwrap_err().field, "output_compression");
        request.output_compression = Some(0);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn generation_defaults_match_tool_contract() {
        let request = GenerationRequest::new("a fox");
        assert_eq!(request.effective_size().as_str(), "1024x1024");
        assert_eq!(request.effective_quality().as_str(), "high");
        assert_eq!(request.effective_count(), 1);
        assert_eq!(request.effective_format(), OutputFormat::Png);
    }

    #[test]
    fn generation_request_parses_tool_arguments() -> anyhow::Result<()> {
        let request: GenerationRequest = serde_json::from_value(json!({
            "prompt": "a lighthouse",
            "size": "1536x1024",
            "quality": "medium",
            "output_format": "webp",
            "background": "transparent",
            "moderation": "low",
            "n": 2
        }))?;
        assert_eq!(request.size, Some(ImageSize::Landscape));
        assert_eq!(request.quality, Some(Quality::Medium));
        assert_eq!(request.effective_format().mime_type(), "image/webp");
        assert_eq!(request.background.map(Background::as_str), Some("transparent"));
        assert_eq!(request.moderation.map(Moderation::as_str), Some("low"));

        let bad_size = serde_json::from_value::<GenerationRequest>(json!({
            "prompt": "a lighthouse",
            "size": "512x512"
        }));
        assert!(bad_size.is_err());
        Ok(())
    }

    #[test]
    fn edit_request_accepts_every_image_shape() -> anyhow::Result<()> {
        let single: EditRequest = serde_json::from_value(json!({
            "image": "aGVsbG8=",
            "prompt": "add a hat"
        }))?;
        assert_eq!(single.image.len(), 1);
        assert!(single.image.as_slice()[0].is_inline());

        let many: EditRequest = serde_json::from_value(json!({
            "image": ["aGVsbG8=", "d29ybGQ="],
            "prompt": "add a hat"
        }))?;
        assert_eq!(many.image.len(), 2);

        let by_path: EditRequest = serde_json::from_value(json!({
            "image": { "filePath": "/tmp/in.png" },
            "prompt": "add a hat",
            "mask": { "filePath": "/tmp/mask.png", "isBase64": true }
        }))?;
        assert_eq!(by_path.image.as_slice()[0].file_path(), Some("/tmp/in.png"));
        assert_eq!(
            by_path.mask,
            Some(ImageInputRef::FilePath {
                file_path: "/tmp/mask.png".to_string(),
                is_base64: true,
            })
        );

        let paths: EditRequest = serde_json::from_value(json!({
            "image": [{ "filePath": "/a.png" }, { "filePath": "/b.png", "isBase64": false }],
            "prompt": "merge"
        }))?;
        assert_eq!(paths.image.len(), 2);
        assert!(paths.validate().is_ok());
        Ok(())
    }

    #[test]
    fn edit_request_rejects_empty_image_list() {
        let request = EditRequest::new(ImageInputs::Many(Vec::new()), "add a hat");
        assert_eq!(request.validate().unwrap_err().field, "image");
    }
}
