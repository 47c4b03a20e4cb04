use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use gpt_image_contracts::OutputFormat;
use tracing::info;

use crate::error::{ImageToolError, Result};

pub const IMAGES_SUBFOLDER: &str = "gpt-images";

/// Standard alphabet that accepts payloads with or without `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Writes decoded images under `<output_dir>/gpt-images/`.
///
/// File names carry a millisecond timestamp; two saves in the same millisecond
/// with the same format land on the same path and the later write wins.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    images_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let images_dir = output_dir.join(IMAGES_SUBFOLDER);
        Self {
            output_dir,
            images_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn save(&self, payload: &str, format: OutputFormat) -> Result<PathBuf> {
        self.save_at(payload, format, Utc::now())
    }

    fn save_at(&self, payload: &str, format: OutputFormat, now: DateTime<Utc>) -> Result<PathBuf> {
        let bytes = decode_image_payload(payload, "generated image")?;
        if !self.images_dir.is_dir() {
            fs::create_dir_all(&self.images_dir).map_err(|err| {
                ImageToolError::filesystem("create images folder", &self.images_dir, err)
            })?;
            info!("Created images folder: {}", self.images_dir.display());
        }

        let path = self.images_dir.join(artifact_file_name(now, format));
        fs::write(&path, bytes)
            .map_err(|err| ImageToolError::filesystem("write image", &path, err))?;
        info!("Image saved to: {}", path.display());
        Ok(path)
    }
}

/// `image-2025-01-02T03-04-05-678Z.png`: ISO-8601 with `:` and `.` replaced by `-`.
pub fn artifact_file_name(now: DateTime<Utc>, format: OutputFormat) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("image-{stamp}.{}", format.as_str())
}

/// Removes every leading `data:image/<subtype>;base64,` prefix.
pub fn strip_data_uri_prefix(payload: &str) -> &str {
    let mut current = payload;
    while let Some(rest) = strip_one_prefix(current) {
        current = rest;
    }
    current
}

fn strip_one_prefix(payload: &str) -> Option<&str> {
    let rest = payload.strip_prefix("data:image/")?;
    let subtype_len = rest
        .bytes()
        .take_while(|byte| byte.is_ascii_alphanumeric() || *byte == b'_')
        .count();
    if subtype_len == 0 {
        return None;
    }
    rest[subtype_len..].strip_prefix(";base64,")
}

pub fn decode_image_payload(payload: &str, what: &str) -> Result<Vec<u8>> {
    let stripped = strip_data_uri_prefix(payload.trim());
    let compact: String = stripped
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64
        .decode(compact.as_bytes())
        .map_err(|source| ImageToolError::Decode {
            what: what.to_string(),
            source,
        })
}
