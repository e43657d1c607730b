//! Quill Build
//!
//! Applies model-generated edits to files, validates the result and retries
//! with escalating strategies until the file is applied or the budget runs
//! out.
//!
//! # Core Concepts
//!
//! - [`ActiveBuildStreamState`]: read-only context shared by every file of a build
//! - [`ActiveBuildStreamFileState`]: per-file counters, strategy and state history
//! - [`BuildState`]: `Editing → Validating → {Applied | Retry* | Abandoned}`
//! - [`BuildOrchestrator`]: drives files concurrently, one task per file
//! - [`BuildRecordStore`]: persistence of terminal outcomes
//!
//! # Example
//!
//! ```rust,ignore
//! use quill_build::{ActiveBuildStreamState, BuildOrchestrator, FileBuildRequest};
//!
//! let (stream, mut events) = ActiveBuildStreamState::new(auth, "plan-1", "main", settings);
//! let stream = Arc::new(stream.with_client(provider, client));
//!
//! let records = BuildOrchestrator::default()
//!     .build_files(&stream, vec![FileBuildRequest::edit("src/lib.rs", "m1", "add cache", source)])
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod edit;
mod error;
mod file_state;
mod orchestrator;
mod prompt;
mod record;
mod state;
mod stream;

pub use edit::{apply_response, strip_fence, Replacement, StructuredEdit};
pub use error::{BuildError, EditError, StateMachineError, StoreError};
pub use file_state::{ActiveBuildStreamFileState, Escalation, FileBuildRequest, PlanSnapshot};
pub use orchestrator::{BuildOrchestrator, FileBuildHandle, BUILD_PURPOSE};
pub use prompt::build_messages;
pub use record::{BuildRecord, BuildRecordStore, InMemoryBuildRecordStore};
pub use state::{
    allowed_transitions, validate_transition, AbandonReason, BuildOutcome, BuildState,
    EditStrategy, Verification,
};
pub use stream::{ActiveBuildStreamState, BuildEvent, BuildProgress, ContextFile};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
