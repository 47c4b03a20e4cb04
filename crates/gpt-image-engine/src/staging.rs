use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use gpt_image_contracts::ImageInputRef;
use tempfile::{Builder as TempFileBuilder, NamedTempFile};
use tracing::{debug, warn};

use crate::artifacts::decode_image_payload;
use crate::error::{ImageToolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Image,
    Mask,
}

impl InputRole {
    fn prefix(self) -> &'static str {
        match self {
            Self::Image => "image-",
            Self::Mask => "mask-",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Mask => "mask",
        }
    }
}

/// Concrete upload paths for one edit request, plus the temp files that back the
/// inline inputs. Caller-supplied paths are never deleted.
#[derive(Debug)]
pub struct StagedInputs {
    pub images: Vec<PathBuf>,
    pub mask: Option<PathBuf>,
    temp_files: Vec<NamedTempFile>,
}

impl StagedInputs {
    pub fn temp_paths(&self) -> Vec<PathBuf> {
        self.temp_files
            .iter()
            .map(|file| file.path().to_path_buf())
            .collect()
    }

    /// Deletes the temp files. Failures are logged and otherwise ignored.
    pub fn cleanup(self) {
        for file in self.temp_files {
            let path = file.path().to_path_buf();
            match file.close() {
                Ok(()) => debug!("Removed temporary input {}", path.display()),
                Err(err) => warn!("Failed to remove temporary input {}: {err}", path.display()),
            }
        }
    }
}

/// Turns every image/mask input variant into a file path the upload can read.
#[derive(Debug, Clone)]
pub struct InputStager {
    temp_dir: PathBuf,
}

impl Default for InputStager {
    fn default() -> Self {
        Self::new(env::temp_dir())
    }
}

impl InputStager {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn stage(
        &self,
        images: &[ImageInputRef],
        mask: Option<&ImageInputRef>,
    ) -> Result<StagedInputs> {
        let mut staged = StagedInputs {
            images: Vec::with_capacity(images.len()),
            mask: None,
            temp_files: Vec::new(),
        };
        for input in images {
            let path = self.stage_one(input, InputRole::Image, &mut staged.temp_files)?;
            staged.images.push(path);
        }
        if let Some(mask) = mask {
            staged.mask = Some(self.stage_one(mask, InputRole::Mask, &mut staged.temp_files)?);
        }
        Ok(staged)
    }

    fn stage_one(
        &self,
        input: &ImageInputRef,
        role: InputRole,
        temp_files: &mut Vec<NamedTempFile>,
    ) -> Result<PathBuf> {
        match input {
            ImageInputRef::InlineBase64(payload) => {
                let bytes = decode_image_payload(payload, &format!("inline {}", role.label()))?;
                self.write_temp(&bytes, role, temp_files)
            }
            ImageInputRef::FilePath {
                file_path,
                is_base64: false,
            } => Ok(PathBuf::from(file_path)),
            ImageInputRef::FilePath {
                file_path,
                is_base64: true,
            } => {
                let text = fs::read_to_string(file_path)
                    .map_err(|err| ImageToolError::filesystem("read", file_path, err))?;
                let bytes = decode_image_payload(&text, file_path)?;
                self.write_temp(&bytes, role, temp_files)
            }
        }
    }

    fn write_temp(
        &self,
        bytes: &[u8],
        role: InputRole,
        temp_files: &mut Vec<NamedTempFile>,
    ) -> Result<PathBuf> {
        let mut file = TempFileBuilder::new()
            .prefix(role.prefix())
            .suffix(".png")
            .rand_bytes(12)
            .tempfile_in(&self.temp_dir)
            .map_err(|err| {
                ImageToolError::filesystem("create temporary file in", &self.temp_dir, err)
            })?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|err| ImageToolError::filesystem("write temporary file", file.path(), err))?;
        let path = file.path().to_path_buf();
        debug!("Staged inline {} at {}", role.label(), path.display());
        temp_files.push(file);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    use super::*;

    fn entries(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            out.push(entry?.path());
        }
        Ok(out)
    }

    #[test]
    fn inline_inputs_are_written_to_temp_files_and_removed_on_cleanup() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stager = InputStager::new(temp.path());
        let images = vec![
            ImageInputRef::InlineBase64(BASE64.encode(b"one")),
            ImageInputRef::InlineBase64(format!("data:image/png;base64,{}", BASE64.encode(b"two"))),
        ];
        let mask = ImageInputRef::InlineBase64(BASE64.encode(b"mask"));

        let staged = stager.stage(&images, Some(&mask))?;
        assert_eq!(staged.images.len(), 2);
        assert_eq!(fs::read(&staged.images[0])?, b"one");
        assert_eq!(fs::read(&staged.images[1])?, b"two");
        let mask_path = staged.mask.clone().unwrap();
        assert_eq!(fs::read(&mask_path)?, b"mask");
        let mask_name = mask_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(mask_name.starts_with("mask-") && mask_name.ends_with(".png"));
        assert_eq!(entries(temp.path())?.len(), 3);

        staged.cleanup();
        assert!(entries(temp.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn caller_paths_pass_through_and_survive_cleanup() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("source.png");
        fs::write(&source, b"caller bytes")?;
        let stager = InputStager::new(temp.path().join("staging"));

        let images = vec![ImageInputRef::file(source.to_string_lossy())];
        let staged = stager.stage(&images, None)?;
        assert_eq!(staged.images, vec![source.clone()]);
        assert!(staged.temp_paths().is_empty());

        staged.cleanup();
        assert_eq!(fs::read(&source)?, b"caller bytes");
        Ok(())
    }

    #[test]
    fn base64_file_hint_decodes_into_a_temp_copy() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let encoded = temp.path().join("encoded.txt");
        fs::write(&encoded, format!("data:image/png;base64,{}\n", BASE64.encode(b"pixels")))?;
        let stager = InputStager::new(temp.path());

        let mask = ImageInputRef::FilePath {
            file_path: encoded.to_string_lossy().to_string(),
            is_base64: true,
        };
        let staged = stager.stage(&[ImageInputRef::file("/unused.png")], Some(&mask))?;
        let mask_path = staged.mask.clone().unwrap();
        assert_ne!(mask_path, encoded);
        assert_eq!(fs::read(&mask_path)?, b"pixels");

        staged.cleanup();
        assert!(!mask_path.exists());
        assert!(encoded.exists());
        Ok(())
    }

    #[test]
    fn failure_midway_leaves_no_temp_files_behind() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stager = InputStager::new(temp.path());
        let images = vec![
            ImageInputRef::InlineBase64(BASE64.encode(b"fine")),
            ImageInputRef::InlineBase64("%%% not base64 %%%".to_string()),
        ];

        let err = stager.stage(&images, None).unwrap_err();
        assert!(matches!(err, ImageToolError::Decode { .. }));
        assert!(entries(temp.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn unpadded_inline_payload_is_staged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stager = InputStager::new(temp.path());
        let unpadded = BASE64.encode(b"pixel").trim_end_matches('=').to_string();
        assert!(!unpadded.ends_with('='));

        let staged = stager.stage(&[ImageInputRef::InlineBase64(unpadded)], None)?;
        assert_eq!(fs::read(&staged.images[0])?, b"pixel");
        staged.cleanup();
        Ok(())
    }

    #[test]
    fn missing_base64_hint_file_is_a_filesystem_error() {
        let stager = InputStager::default();
        let input = ImageInputRef::FilePath {
            file_path: "/definitely/not/here.b64".to_string(),
            is_base64: true,
        };
        let err = stager.stage(&[input], None).unwrap_err();
        assert!(matches!(err, ImageToolError::Filesystem { .. }));
    }
}
