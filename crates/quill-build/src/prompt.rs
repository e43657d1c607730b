//! Completion request messages for a build attempt

use crate::file_state::ActiveBuildStreamFileState;
use crate::state::EditStrategy;
use quill_llm::ChatMessage;
use std::fmt::Write;

const STRUCTURED_INSTRUCTIONS: &str = "You apply a planned change to one file. \
Respond only with JSON of the form {\"replacements\":[{\"old\":\"...\",\"new\":\"...\"}]}. \
Each `old` must match exactly one span of the current file, character for character. \
Replacements are applied in order.";

const WHOLE_FILE_INSTRUCTIONS: &str = "You apply a planned change to one file. \
Respond only with the complete new content of the file, with no commentary.";

/// Messages for the next attempt on `file`
///
/// System instructions for the current strategy, the loaded context, the
/// conversation, the edit request and any accumulated feedback.
#[must_use]
pub fn build_messages(file: &ActiveBuildStreamFileState) -> Vec<ChatMessage> {
    let stream = &file.stream;
    let mut messages = Vec::with_capacity(stream.convo.len() + 4);

    let instructions = match (file.strategy, file.is_new_file) {
        (EditStrategy::Structured, false) => STRUCTURED_INSTRUCTIONS,
        _ => WHOLE_FILE_INSTRUCTIONS,
    };
    messages.push(ChatMessage::system(instructions));

    if !stream.model_context.is_empty() {
        let mut context = String::from("Context files:\n");
        for entry in &stream.model_context {
            let _ = write!(context, "\n- {}:\n```\n{}\n```\n", entry.path, entry.body);
        }
        messages.push(ChatMessage::system(context));
    }

    messages.extend(stream.convo.iter().map(quill_llm::ConvoMessage::to_chat_message));

    let mut request = format!("File: {}\n\nChange: {}\n", file.path, file.edit_description);
    if !file.plan_snapshot.description.is_empty() {
        let _ = write!(request, "\nPlan: {}\n", file.plan_snapshot.description);
    }
    match file.pre_build_content() {
        Some(content) => {
            let _ = write!(request, "\nCurrent content:\n```\n{content}\n```\n");
        }
        None => request.push_str("\nThis is a new file.\n"),
    }
    messages.push(ChatMessage::user(request));

    if !file.feedback.is_empty() {
        messages.push(ChatMessage::user(format!(
            "The previous attempt failed:\n\n{}",
            file.feedback.join("\n")
        )));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_state::FileBuildRequest;
    use crate::stream::{ActiveBuildStreamState, ContextFile};
    use quill_llm::{ChatRole, TenantAuth};
    use quill_providers::PlanSettings;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn file(request: FileBuildRequest) -> ActiveBuildStreamFileState {
        let (stream, _rx) = ActiveBuildStreamState::new(
            TenantAuth::new("org", "user"),
            "plan",
            "main",
            PlanSettings::default(),
        );
        let stream = stream.with_context_file(ContextFile::new("README.md", "# demo"));
        ActiveBuildStreamFileState::new(Arc::new(stream), request, None, CancellationToken::new())
    }

    #[test]
    fn structured_prompt_shape() {
        let state = file(FileBuildRequest::edit("src/lib.rs", "m1", "rename a", "fn a() {}"));
        let messages = build_messages(&state);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, STRUCTURED_INSTRUCTIONS);
        assert!(messages[1].content.contains("README.md"));
        assert_eq!(messages[2].role, ChatRole::User);
        assert!(messages[2].content.contains("fn a() {}"));
    }

    #[test]
    fn new_file_uses_whole_file_instructions() {
        let state = file(FileBuildRequest::create("src/new.rs", "m1", "add module"));
        let messages = build_messages(&state);
        assert_eq!(messages[0].content, WHOLE_FILE_INSTRUCTIONS);
        assert!(messages.last().unwrap().content.contains("new file"));
    }

    #[test]
    fn feedback_goes_last() {
        let mut state = file(FileBuildRequest::edit("src/lib.rs", "m1", "x", "fn a() {}"));
        state.feedback.push("line 1: missing `}`".into());
        let messages = build_messages(&state);
        assert!(messages.last().unwrap().content.contains("missing `}`"));
    }
}
