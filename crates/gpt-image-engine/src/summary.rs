use gpt_image_contracts::{
    ArtifactLocation, EditRequest, GenerationRequest, ImageInputRef, SavedArtifact, UsageStats,
};

pub fn generation_summary(
    request: &GenerationRequest,
    saved: &[SavedArtifact],
    usage: Option<&UsageStats>,
) -> String {
    let mut lines = vec![
        "## Image Generated".to_string(),
        String::new(),
        format!("**Prompt:** {}", request.prompt),
        String::new(),
        "### Parameters".to_string(),
        format!("- Size: {}", request.effective_size().as_str()),
        format!("- Quality: {}", request.effective_quality().as_str()),
        format!("- Count: {}", request.effective_count()),
        format!("- Format: {}", request.effective_format().as_str()),
    ];
    if let Some(background) = request.background {
        lines.push(format!("- Background: {}", background.as_str()));
    }
    if let Some(compression) = request.output_compression {
        lines.push(format!("- Compression: {compression}"));
    }
    if let Some(moderation) = request.moderation {
        lines.push(format!("- Moderation: {}", moderation.as_str()));
    }
    push_outputs(&mut lines, saved);
    push_usage(&mut lines, usage);
    lines.join("\n")
}

pub fn edit_summary(
    request: &EditRequest,
    saved: &[SavedArtifact],
    usage: Option<&UsageStats>,
) -> String {
    let mut lines = vec![
        "## Image Edited".to_string(),
        String::new(),
        format!("**Prompt:** {}", request.prompt),
        String::new(),
        "### Source Images".to_string(),
    ];
    for (index, input) in request.image.as_slice().iter().enumerate() {
        lines.push(format!("{}. {}", index + 1, describe_input(input)));
    }
    if let Some(mask) = &request.mask {
        lines.push(String::new());
        lines.push(format!("**Mask applied:** {}", describe_input(mask)));
    }
    lines.push(String::new());
    lines.push("### Parameters".to_string());
    lines.push(format!("- Size: {}", request.effective_size().as_str()));
    lines.push(format!("- Quality: {}", request.effective_quality().as_str()));
    lines.push(format!("- Count: {}", request.effective_count()));
    if let Some(background) = request.background {
        lines.push(format!("- Background: {}", background.as_str()));
    }
    push_outputs(&mut lines, saved);
    push_usage(&mut lines, usage);
    lines.join("\n")
}

fn describe_input(input: &ImageInputRef) -> String {
    match input {
        ImageInputRef::InlineBase64(_) => "inline base64 data".to_string(),
        ImageInputRef::FilePath {
            file_path,
            is_base64: true,
        } => format!("base64 file `{file_path}`"),
        ImageInputRef::FilePath { file_path, .. } => format!("file `{file_path}`"),
    }
}

fn push_outputs(lines: &mut Vec<String>, saved: &[SavedArtifact]) {
    lines.push(String::new());
    lines.push("### Output".to_string());
    if saved.is_empty() {
        lines.push("No images were returned.".to_string());
        return;
    }
    for (index, artifact) in saved.iter().enumerate() {
        let entry = match &artifact.location {
            ArtifactLocation::Path { path } => format!("saved to `{path}`"),
            ArtifactLocation::Url { url } => format!("available at {url}"),
        };
        lines.push(format!("{}. {entry} ({})", index + 1, artifact.format.as_str()));
    }
}

fn push_usage(lines: &mut Vec<String>, usage: Option<&UsageStats>) {
    let Some(usage) = usage else {
        return;
    };
    lines.push(String::new());
    lines.push("### Token Usage".to_string());
    lines.push(format!("- Total: {}", usage.total_tokens));
    lines.push(format!("- Input: {}", usage.input_tokens));
    lines.push(format!("- Output: {}", usage.output_tokens));
}
