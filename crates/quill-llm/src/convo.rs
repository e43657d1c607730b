//! Conversation messages and summaries

use crate::client::{ChatMessage, ChatRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Markers of what a reply did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConvoMessageFlags {
    /// Context was loaded
    pub did_load_context: bool,
    /// A plan was made
    pub did_make_plan: bool,
    /// The plan was a debugging plan
    pub did_make_debugging_plan: bool,
    /// Code was written
    pub did_write_code: bool,
    /// The plan is complete
    pub did_complete_plan: bool,
}

impl ConvoMessageFlags {
    /// Tags shown on a reply, in display order
    #[must_use]
    pub fn reply_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.did_load_context {
            tags.push("📥 Loaded Context");
        }
        if self.did_make_plan {
            if self.did_make_debugging_plan {
                tags.push("🐞 Made Debug Plan");
            } else {
                tags.push("📋 Made Plan");
            }
        }
        if self.did_write_code {
            tags.push("👨‍💻 Wrote Code");
        }
        if self.did_complete_plan {
            tags.push("🏁");
        }
        tags
    }
}

/// One stored conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvoMessage {
    /// Message id
    pub id: String,
    /// Author
    pub role: ChatRole,
    /// Text
    pub content: String,
    /// Token count of `content`
    pub num_tokens: usize,
    /// Creation time, the summary watermark axis
    pub created_at: DateTime<Utc>,
    /// Reply markers
    #[serde(default)]
    pub flags: ConvoMessageFlags,
}

impl ConvoMessage {
    /// As a chat message
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Summary of a conversation prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvoSummary {
    /// Organization
    pub org_id: String,
    /// Plan
    pub plan_id: String,
    /// Summary text
    pub summary: String,
    /// Tokens of the generated summary
    pub tokens: usize,
    /// Last message covered
    pub latest_convo_message_id: String,
    /// Timestamp of the last message covered
    pub latest_convo_message_created_at: DateTime<Utc>,
    /// Messages folded into the summary
    pub num_messages: usize,
}

/// Messages strictly after a summary's watermark
///
/// With no previous summary every message is returned.
#[must_use]
pub fn messages_after_watermark<'a>(
    convo: &'a [ConvoMessage],
    previous: Option<&ConvoSummary>,
) -> &'a [ConvoMessage] {
    let Some(previous) = previous else {
        return convo;
    };

    match convo
        .iter()
        .position(|m| m.id == previous.latest_convo_message_id)
    {
        Some(index) => &convo[index + 1..],
        None => {
            let start = convo.partition_point(|m| m.created_at <= previous.latest_convo_message_created_at);
            &convo[start..]
        }
    }
}
