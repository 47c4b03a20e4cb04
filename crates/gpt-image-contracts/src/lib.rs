pub mod requests;
pub mod results;

pub use requests::{
    Background, EditRequest, GenerationRequest, ImageInputRef, ImageInputs, ImageSize, Moderation,
    OutputFormat, Quality, ValidationError, MAX_PROMPT_CHARS,
};
pub use results::{ArtifactLocation, ResultItem, SavedArtifact, UpstreamResult, UsageStats};
