pub mod artifacts;
pub mod config;
pub mod error;
pub mod output_dir;
pub mod report;
pub mod staging;
pub mod summary;
pub mod tools;
pub mod upstream;

pub use artifacts::ArtifactStore;
pub use config::ClientConfig;
pub use error::{ImageToolError, Result, UpstreamError};
pub use output_dir::{ensure_output_dir, OutputDirResolver, ResolvedOutputDir};
pub use report::{ErrorReport, ImageOperation};
pub use staging::InputStager;
pub use tools::{ImageTools, OutputEntry, ToolOutcome};
pub use upstream::{EditPayload, GenerationPayload, ImageApi, OpenAiImageClient};
