use gpt_image_contracts::{EditRequest, GenerationRequest};
use gpt_image_engine::{ImageOperation, ImageTools};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};

use crate::response::into_tool_result;

const INSTRUCTIONS: &str = "Generates and edits images with the gpt-image-1 model. \
Generated files are saved under the configured output directory in `gpt-images/`.";

#[derive(Clone)]
pub struct ImageServer {
    tool_router: ToolRouter<Self>,
    tools: ImageTools,
}

#[tool_router]
impl ImageServer {
    pub fn new(tools: ImageTools) -> Self {
        Self {
            tool_router: Self::tool_router(),
            tools,
        }
    }

    #[tool(description = "Create one or more images from a text prompt using gpt-image-1. \
                          Images are saved to disk and returned inline.")]
    async fn create_image(
        &self,
        Parameters(request): Parameters<GenerationRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_tool_result(
            ImageOperation::Generate,
            self.tools.create_image(&request).await,
        )
    }

    #[tool(description = "Edit one or more source images (base64 or file path) according to \
                          a prompt, optionally restricted by a mask. Output is PNG.")]
    async fn create_image_edit(
        &self,
        Parameters(request): Parameters<EditRequest>,
    ) -> Result<CallToolResult, McpError> {
        into_tool_result(
            ImageOperation::Edit,
            self.tools.create_image_edit(&request).await,
        )
    }
}

#[tool_handler]
impl ServerHandler for ImageServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}
