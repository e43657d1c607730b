//! Quill LLM
//!
//! Contracts and policies around model calls: the completion client and its
//! base retry wrapper, the retry policy shared with the build state machine,
//! metering hooks, local token counting and plan summarization.
//!
//! # Core Concepts
//!
//! - [`CompletionClient`]: transport collaborator, one call per request
//! - [`create_chat_completion_with_retries`]: rate-limit/transport retries
//! - [`RetryPolicy`]: `base * (attempt + 1)` backoff, check-before-increment
//! - [`ModelHooks`]: metering before (may veto) and after each call
//! - [`PlanSummarizer`]: conversation summary with a monotonic watermark
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_llm::{NoopHooks, PlanSummarizer, PlanSummaryParams};
//!
//! let summarizer = PlanSummarizer::new(client, provider, Arc::new(NoopHooks));
//! let summary = summarizer.summarize(&pack.plan_summary, &params, &cancel).await?;
//! println!("{}", summary.summary);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod client;
mod convo;
mod error;
mod hooks;
mod retry;
mod summary;
mod tokens;

pub use client::{
    create_chat_completion_with_policy, create_chat_completion_with_retries, ChatChoice,
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, CompletionClient, Usage,
    BASE_RETRY_ATTEMPTS, BASE_RETRY_BACKOFF,
};
pub use convo::{messages_after_watermark, ConvoMessage, ConvoMessageFlags, ConvoSummary};
pub use error::{HookError, ModelError, SummaryError};
pub use hooks::{DidSendModelRequest, ModelHooks, NoopHooks, TenantAuth, WillSendModelRequest};
pub use retry::{sleep_unless_cancelled, RetryPolicy};
pub use summary::{
    ConvoSummaryStore, InMemoryConvoSummaryStore, PlanSummarizer, PlanSummaryParams,
    IDENTITY_PROMPT, PLAN_SUMMARY_PROMPT, SUMMARY_HEADER, SUMMARY_PURPOSE,
};
pub use tokens::{count_tokens, count_tokens_all, BYTES_PER_TOKEN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
