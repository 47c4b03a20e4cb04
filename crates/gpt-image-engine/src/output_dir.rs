use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::non_empty_env;
use crate::error::{ImageToolError, Result};

pub const OUTPUT_DIR_ENV: &str = "GPT_IMAGE_OUTPUT_DIR";
pub const XDG_PICTURES_ENV: &str = "XDG_PICTURES_DIR";
pub const PRODUCT_SUBFOLDER: &str = "gpt-image-1";
pub const FALLBACK_SUBFOLDER: &str = "generated-images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    UnixLike,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::UnixLike
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDirSource {
    Override,
    Pictures,
    WorkingDirFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputDir {
    pub path: PathBuf,
    pub source: OutputDirSource,
}

/// Picks the directory generated images are written to.
///
/// Order: explicit override, then the platform pictures directory with a
/// product subfolder, then `<cwd>/generated-images` when no home directory is known.
#[derive(Debug, Clone)]
pub struct OutputDirResolver {
    override_dir: Option<String>,
    xdg_pictures: Option<String>,
    platform: Platform,
}

impl OutputDirResolver {
    pub fn new(
        override_dir: Option<String>,
        xdg_pictures: Option<String>,
        platform: Platform,
    ) -> Self {
        Self {
            override_dir: override_dir.filter(|value| !value.trim().is_empty()),
            xdg_pictures: xdg_pictures.filter(|value| !value.trim().is_empty()),
            platform,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            non_empty_env(OUTPUT_DIR_ENV),
            non_empty_env(XDG_PICTURES_ENV),
            Platform::current(),
        )
    }

    pub fn with_override(mut self, override_dir: Option<String>) -> Self {
        if let Some(dir) = override_dir.filter(|value| !value.trim().is_empty()) {
            self.override_dir = Some(dir);
        }
        self
    }

    pub fn resolve(&self) -> ResolvedOutputDir {
        self.resolve_with(dirs::home_dir, || {
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    pub fn resolve_with(
        &self,
        home_dir: impl FnOnce() -> Option<PathBuf>,
        current_dir: impl FnOnce() -> PathBuf,
    ) -> ResolvedOutputDir {
        if let Some(dir) = &self.override_dir {
            return ResolvedOutputDir {
                path: PathBuf::from(dir),
                source: OutputDirSource::Override,
            };
        }

        match home_dir() {
            Some(home) => {
                let pictures = match (self.platform, &self.xdg_pictures) {
                    (Platform::UnixLike, Some(xdg)) => PathBuf::from(xdg),
                    _ => home.join("Pictures"),
                };
                ResolvedOutputDir {
                    path: pictures.join(PRODUCT_SUBFOLDER),
                    source: OutputDirSource::Pictures,
                }
            }
            None => ResolvedOutputDir {
                path: current_dir().join(FALLBACK_SUBFOLDER),
                source: OutputDirSource::WorkingDirFallback,
            },
        }
    }
}

/// Creates `path` and any missing parents. Returns whether anything was created.
pub fn ensure_output_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        info!("Using existing output directory: {}", path.display());
        return Ok(false);
    }
    fs::create_dir_all(path)
        .map_err(|err| ImageToolError::filesystem("create output directory", path, err))?;
    info!("Created output directory: {}", path.display());
    Ok(true)
}
