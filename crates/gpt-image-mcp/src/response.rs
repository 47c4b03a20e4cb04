use gpt_image_engine::{ErrorReport, ImageOperation, ImageToolError, OutputEntry, ToolOutcome};
use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use tracing::error;

/// Maps an adapter result onto the tool response. Argument validation failures
/// become protocol errors; everything else is an error-flagged result.
pub fn into_tool_result(
    operation: ImageOperation,
    outcome: Result<ToolOutcome, ImageToolError>,
) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(outcome) => Ok(success_result(&outcome)),
        Err(ImageToolError::Validation(err)) => {
            Err(McpError::invalid_params(err.to_string(), None))
        }
        Err(err) => {
            error!("Tool call failed: {err}");
            Ok(failure_result(operation, &ErrorReport::from_error(&err)))
        }
    }
}

pub fn success_result(outcome: &ToolOutcome) -> CallToolResult {
    let mut content = Vec::with_capacity(outcome.entries.len() + 1);
    content.push(Content::text(outcome.summary.clone()));
    for entry in &outcome.entries {
        content.push(match entry {
            OutputEntry::Image { data, mime_type } => Content::image(data.clone(), *mime_type),
            OutputEntry::Text(text) => Content::text(text.clone()),
        });
    }
    let mut result = CallToolResult::success(content);
    result.structured_content = Some(outcome.metadata());
    result
}

pub fn failure_result(operation: ImageOperation, report: &ErrorReport) -> CallToolResult {
    let mut result = CallToolResult::error(vec![Content::text(report.render(operation))]);
    result.structured_content = Some(report.to_metadata(operation));
    result
}
