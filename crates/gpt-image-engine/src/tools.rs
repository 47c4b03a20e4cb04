use std::sync::Arc;

use gpt_image_contracts::{
    EditRequest, GenerationRequest, OutputFormat, ResultItem, SavedArtifact, UpstreamResult,
    UsageStats,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::artifacts::{strip_data_uri_prefix, ArtifactStore};
use crate::error::Result;
use crate::staging::InputStager;
use crate::summary::{edit_summary, generation_summary};
use crate::upstream::{EditPayload, GenerationPayload, ImageApi};

/// Edits always come back in this format.
pub const EDIT_OUTPUT_FORMAT: OutputFormat = OutputFormat::Png;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEntry {
    Image { data: String, mime_type: &'static str },
    Text(String),
}

/// Successful tool call: the summary, one entry per result item, and the
/// artifacts those items produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub summary: String,
    pub entries: Vec<OutputEntry>,
    pub saved: Vec<SavedArtifact>,
    pub usage: Option<UsageStats>,
}

impl ToolOutcome {
    /// `{ usage?, savedImages }` for programmatic consumers.
    pub fn metadata(&self) -> Value {
        let mut meta = Map::new();
        if let Some(usage) = &self.usage {
            meta.insert("usage".to_string(), json!(usage));
        }
        meta.insert("savedImages".to_string(), json!(self.saved));
        Value::Object(meta)
    }
}

/// The `create_image` and `create_image_edit` adapters.
#[derive(Clone)]
pub struct ImageTools {
    api: Arc<dyn ImageApi>,
    store: ArtifactStore,
    stager: InputStager,
}

impl ImageTools {
    pub fn new(api: Arc<dyn ImageApi>, store: ArtifactStore, stager: InputStager) -> Self {
        Self { api, store, stager }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn create_image(&self, request: &GenerationRequest) -> Result<ToolOutcome> {
        request.validate()?;
        let format = request.effective_format();
        let payload = GenerationPayload {
            prompt: request.prompt.clone(),
            n: request.effective_count(),
            size: request.effective_size(),
            quality: request.effective_quality(),
            background: request.background,
            output_format: request.output_format,
            output_compression: request.output_compression,
            moderation: request.moderation,
            user: request.user.clone(),
        };

        info!("Generating {} image(s)", payload.n);
        let result = self.api.generate(&payload).await?;
        let usage = result.usage;
        let (entries, saved) = self.collect(result, format)?;
        Ok(ToolOutcome {
            summary: generation_summary(request, &saved, usage.as_ref()),
            entries,
            saved,
            usage,
        })
    }

    pub async fn create_image_edit(&self, request: &EditRequest) -> Result<ToolOutcome> {
        request.validate()?;
        let staged = self
            .stager
            .stage(request.image.as_slice(), request.mask.as_ref())?;
        let payload = EditPayload {
            prompt: request.prompt.clone(),
            images: staged.images.clone(),
            mask: staged.mask.clone(),
            n: request.n,
            size: request.size,
            quality: request.quality,
            background: request.background,
            user: request.user.clone(),
        };

        info!(
            "Editing {} image(s){}",
            payload.images.len(),
            if payload.mask.is_some() { " with mask" } else { "" }
        );
        let outcome = self.api.edit(&payload).await;
        staged.cleanup();
        let result = outcome?;

        let usage = result.usage;
        let (entries, saved) = self.collect(result, EDIT_OUTPUT_FORMAT)?;
        Ok(ToolOutcome {
            summary: edit_summary(request, &saved, usage.as_ref()),
            entries,
            saved,
            usage,
        })
    }

    fn collect(
        &self,
        result: UpstreamResult,
        format: OutputFormat,
    ) -> Result<(Vec<OutputEntry>, Vec<SavedArtifact>)> {
        let mut entries = Vec::with_capacity(result.items.len());
        let mut saved = Vec::with_capacity(result.items.len());
        for item in result.items {
            match item {
                ResultItem::EmbeddedImage { b64_json } => {
                    let path = self.store.save(&b64_json, format)?;
                    saved.push(SavedArtifact::file(path.to_string_lossy(), format));
                    entries.push(OutputEntry::Image {
                        data: strip_data_uri_prefix(b64_json.trim()).to_string(),
                        mime_type: format.mime_type(),
                    });
                }
                ResultItem::RemoteLink { url } => {
                    warn!("Image returned as URL, not downloading: {url}");
                    entries.push(OutputEntry::Text(format!("Image available at URL: {url}")));
                    saved.push(SavedArtifact::link(url, format));
                }
            }
        }
        Ok((entries, saved))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use gpt_image_contracts::{ImageInputRef, ImageInputs, ImageSize};

    use super::*;
    use crate::error::{ImageToolError, UpstreamError};

    /// Records calls and, for edits, which staged files existed mid-call.
    struct FakeApi {
        result: std::result::Result<UpstreamResult, UpstreamError>,
        calls: AtomicUsize,
        seen_generate: Mutex<Option<GenerationPayload>>,
        seen_during_edit: Mutex<Vec<(PathBuf, bool)>>,
    }

    impl FakeApi {
        fn ok(result: UpstreamResult) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(result),
                calls: AtomicUsize::new(0),
                seen_generate: Mutex::new(None),
                seen_during_edit: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err(UpstreamError {
                    status: Some(500),
                    message: "boom".to_string(),
                    error_type: "server_error".to_string(),
                    code: None,
                    param: None,
                    body: Value::Null,
                }),
                calls: AtomicUsize::new(0),
                seen_generate: Mutex::new(None),
                seen_during_edit: Mutex::new(Vec::new()),
            })
        }

        fn respond(&self) -> Result<UpstreamResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(ImageToolError::Upstream)
        }
    }

    #[async_trait]
    impl ImageApi for FakeApi {
        async fn generate(&self, payload: &GenerationPayload) -> Result<UpstreamResult> {
            *self.seen_generate.lock().unwrap() = Some(payload.clone());
            self.respond()
        }

        async fn edit(&self, payload: &EditPayload) -> Result<UpstreamResult> {
            let mut seen = self.seen_during_edit.lock().unwrap();
            for path in payload.images.iter().chain(payload.mask.iter()) {
                seen.push((path.clone(), path.exists()));
            }
            drop(seen);
            self.respond()
        }
    }

    fn tools(api: Arc<FakeApi>, output: &Path, staging: &Path) -> ImageTools {
        ImageTools::new(api, ArtifactStore::new(output), InputStager::new(staging))
    }

    fn embedded(payload: &[u8]) -> ResultItem {
        ResultItem::EmbeddedImage {
            b64_json: BASE64.encode(payload),
        }
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn url_only_response_writes_nothing() -> anyhow::Result<()> {
        let output = tempfile::tempdir()?;
        let staging = tempfile::tempdir()?;
        let api = FakeApi::ok(UpstreamResult {
            items: vec![
                ResultItem::RemoteLink {
                    url: "https://cdn.example/1.png".to_string(),
                },
                ResultItem::RemoteLink {
                    url: "https://cdn.example/2.png".to_string(),
                },
            ],
            usage: None,
        });
        let tools = tools(api, output.path(), staging.path());

        let outcome = tools.create_image(&GenerationRequest::new("a lighthouse")).await?;
        assert_eq!(file_count(output.path()), 0);
        assert!(outcome.saved.iter().all(|artifact| !artifact.is_file()));
        assert_eq!(
            outcome.entries,
            vec![
                OutputEntry::Text("Image available at URL: https://cdn.example/1.png".to_string()),
                OutputEntry::Text("Image available at URL: https://cdn.example/2.png".to_string()),
            ]
        );
        assert_eq!(outcome.metadata()["savedImages"][0]["url"], "https://cdn.example/1.png");
        Ok(())
    }

    #[tokio::test]
    async fn embedded_items_each_yield_one_file_and_one_image_entry() -> anyhow::Result<()> {
        let output = tempfile::tempdir()?;
        let staging = tempfile::tempdir()?;
        let api = FakeApi::ok(UpstreamResult {
            items: vec![embedded(b"first"), embedded(b"second")],
            usage: Some(UsageStats {
                total_tokens: 9,
                input_tokens: 4,
                output_tokens: 5,
            }),
        });
        let tools = tools(api.clone(), output.path(), staging.path());
        let mut request = GenerationRequest::new("two birds");
        request.n = Some(2);
        request.output_format = Some(OutputFormat::Webp);

        let outcome = tools.create_image(&request).await?;
        assert_eq!(outcome.saved.len(), 2);
        for artifact in &outcome.saved {
            assert!(artifact.is_file());
            assert!(artifact.location.as_str().ends_with(".webp"));
            assert!(Path::new(artifact.location.as_str()).starts_with(tools.store().images_dir()));
            assert!(Path::new(artifact.location.as_str()).is_file());
        }
        let images = outcome
            .entries
            .iter()
            .filter(|entry| matches!(entry, OutputEntry::Image { mime_type: "image/webp", .. }))
            .count();
        assert_eq!(images, 2);
        assert_eq!(outcome.metadata()["usage"]["totalTokens"], 9);

        let seen = api.seen_generate.lock().unwrap().clone().unwrap();
        assert_eq!(seen.n, 2);
        assert_eq!(seen.size, ImageSize::Square);
        assert_eq!(seen.output_format, Some(OutputFormat::Webp));
        Ok(())
    }

    #[tokio::test]
    async fn oversized_prompt_is_rejected_without_calling_the_api() -> anyhow::Result<()> {
        let output = tempfile::tempdir()?;
        let staging = tempfile::tempdir()?;
        let api = FakeApi::ok(UpstreamResult::default());
        let tools = tools(api.clone(), output.path(), staging.path());

        let prompt = "x".repeat(32_001);
        let err = tools.create_image(&GenerationRequest::new(prompt.clone())).await.unwrap_err();
        assert!(err.is_validation());
        let edit = EditRequest::new(ImageInputs::One(ImageInputRef::file("/a.png")), prompt);
        assert!(tools.create_image_edit(&edit).await.unwrap_err().is_validation());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn inline_edit_inputs_exist_only_during_the_call() -> anyhow::Result<()> {
        let output = tempfile::tempdir()?;
        let staging = tempfile::tempdir()?;
        let api = FakeApi::ok(UpstreamResult {
            items: vec![embedded(b"edited")],
            usage: None,
        });
        let tools = tools(api.clone(), output.path(), staging.path());
        let mut request = EditRequest::new(
            ImageInputs::One(ImageInputRef::InlineBase64(BASE64.encode(b"source"))),
            "make it blue",
        );
        request.mask = Some(ImageInputRef::InlineBase64(BASE64.encode(b"mask")));

        let outcome = tools.create_image_edit(&request).await?;
        let seen = api.seen_during_edit.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, existed)| *existed));
        assert!(seen.iter().all(|(path, _)| !path.exists()));
        assert_eq!(file_count(staging.path()), 0);
        assert!(outcome.saved[0].location.as_str().ends_with(".png"));
        assert!(outcome.summary.contains("**Mask applied:**"));
        Ok(())
    }

    #[tokio::test]
    async fn inline_edit_inputs_are_removed_when_the_call_fails() -> anyhow::Result<()> {
        let output = tempfile::tempdir()?;
        let staging = tempfile::tempdir()?;
        let caller = staging.path().join("caller.png");
        fs::write(&caller, b"keep me")?;
        let api = FakeApi::failing();
        let tools = tools(api.clone(), output.path(), staging.path());
        let request = EditRequest::new(
            ImageInputs::Many(vec![
                ImageInputRef::InlineBase64(BASE64.encode(b"source")),
                ImageInputRef::file(caller.to_string_lossy()),
            ]),
            "make it blue",
        );

        let err = tools.create_image_edit(&request).await.unwrap_err();
        assert!(matches!(err, ImageToolError::Upstream(_)));
        let seen = api.seen_during_edit.lock().unwrap().clone();
        assert!(seen.iter().all(|(_, existed)| *existed));
        assert_eq!(file_count(staging.path()), 1);
        assert_eq!(fs::read(&caller)?, b"keep me");
        assert_eq!(file_count(output.path()), 0);
        Ok(())
    }
}
