use std::env;

use crate::error::{ImageToolError, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const API_BASE_ENV: &str = "OPENAI_API_BASE";
pub const MODEL_ENV: &str = "GPT_IMAGE_MODEL";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-image-1";

/// Connection settings for the image API, read once at startup.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = non_empty_env(API_KEY_ENV).ok_or_else(|| {
            ImageToolError::Configuration(format!("{API_KEY_ENV} environment variable is required"))
        })?;
        let mut config = Self::new(api_key);
        if let Some(base) = non_empty_env(API_BASE_ENV) {
            config = config.with_api_base(base);
        }
        if let Some(model) = non_empty_env(MODEL_ENV) {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
