//! Build record persistence

use crate::error::StoreError;
use crate::file_state::ActiveBuildStreamFileState;
use crate::state::{BuildOutcome, BuildState, EditStrategy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Final outcome of one file's build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Unique build id
    pub build_id: Ulid,
    /// Owning organization
    pub org_id: String,
    /// Plan built
    pub plan_id: String,
    /// Plan branch
    pub branch: String,
    /// Conversation message that produced the edit
    pub convo_message_id: String,
    /// File path
    pub path: String,
    /// Plan revision
    pub plan_revision: u64,
    /// Applied or abandoned
    pub outcome: BuildOutcome,
    /// Strategy of the last attempt
    pub strategy: EditStrategy,
    /// Structured retries used
    pub structured_edit_num_retry: u32,
    /// Whole-file retries used
    pub whole_file_num_retry: u32,
    /// Content was invalid before the edit
    pub pre_build_state_syntax_invalid: bool,
    /// A post-edit syntax check timed out
    pub syntax_check_timed_out: bool,
    /// File was created by this build
    pub is_new_file: bool,
    /// Candidate edits produced
    pub attempts: u32,
    /// States entered in order
    pub history: Vec<BuildState>,
    /// When the build reached its terminal state
    pub finished_at: DateTime<Utc>,
}

impl BuildRecord {
    /// Snapshot a finished file
    #[must_use]
    pub fn from_file_state(file: &ActiveBuildStreamFileState, outcome: BuildOutcome) -> Self {
        Self {
            build_id: file.build_id,
            org_id: file.stream.auth.org_id.clone(),
            plan_id: file.stream.plan_id.clone(),
            branch: file.stream.branch.clone(),
            convo_message_id: file.convo_message_id.clone(),
            path: file.path.clone(),
            plan_revision: file.plan_snapshot.revision,
            outcome,
            strategy: file.strategy,
            structured_edit_num_retry: file.structured_edit_num_retry,
            whole_file_num_retry: file.whole_file_num_retry,
            pre_build_state_syntax_invalid: file.pre_build_state_syntax_invalid,
            syntax_check_timed_out: file.syntax_check_timed_out,
            is_new_file: file.is_new_file,
            attempts: file.attempts,
            history: file.history().to_vec(),
            finished_at: Utc::now(),
        }
    }

    /// Final state
    #[must_use]
    pub fn state(&self) -> BuildState {
        if self.outcome.is_applied() {
            BuildState::Applied
        } else {
            BuildState::Abandoned
        }
    }
}

/// Build record persistence collaborator
#[async_trait]
pub trait BuildRecordStore: Send + Sync {
    /// Insert or replace the record for its build id
    async fn upsert_build_record(&self, record: &BuildRecord) -> Result<(), StoreError>;

    /// Record by build id
    async fn build_record(&self, build_id: Ulid) -> Result<Option<BuildRecord>, StoreError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct InMemoryBuildRecordStore {
    records: DashMap<Ulid, BuildRecord>,
}

impl InMemoryBuildRecordStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No records stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for a plan
    #[must_use]
    pub fn records_for_plan(&self, plan_id: &str) -> Vec<BuildRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|entry| entry.plan_id == plan_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }
}

#[async_trait]
impl BuildRecordStore for InMemoryBuildRecordStore {
    async fn upsert_build_record(&self, record: &BuildRecord) -> Result<(), StoreError> {
        self.records.insert(record.build_id, record.clone());
        Ok(())
    }

    async fn build_record(&self, build_id: Ulid) -> Result<Option<BuildRecord>, StoreError> {
        Ok(self.records.get(&build_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_state::FileBuildRequest;
    use crate::state::{AbandonReason, Verification};
    use crate::stream::ActiveBuildStreamState;
    use quill_llm::TenantAuth;
    use quill_providers::PlanSettings;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn record(path: &str, outcome: BuildOutcome) -> BuildRecord {
        let (stream, _rx) = ActiveBuildStreamState::new(
            TenantAuth::new("org", "user"),
            "plan-1",
            "main",
            PlanSettings::default(),
        );
        let file = ActiveBuildStreamFileState::new(
            Arc::new(stream),
            FileBuildRequest::edit(path, "m1", "x", "fn a() {}"),
            None,
            CancellationToken::new(),
        );
        BuildRecord::from_file_state(&file, outcome)
    }

    #[tokio::test]
    async fn upsert_replaces_by_build_id() {
        let store = InMemoryBuildRecordStore::new();
        let mut rec = record(
            "b.rs",
            BuildOutcome::Abandoned {
                reason: AbandonReason::Cancelled,
                message: "build cancelled".into(),
            },
        );
        store.upsert_build_record(&rec).await.unwrap();
        rec.attempts = 2;
        store.upsert_build_record(&rec).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.build_record(rec.build_id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.state(), BuildState::Abandoned);
    }

    #[tokio::test]
    async fn records_for_plan_sorted_by_path() {
        let store = InMemoryBuildRecordStore::new();
        let applied = BuildOutcome::Applied {
            content: String::new(),
            verification: Verification::Unsupported,
        };
        store.upsert_build_record(&record("z.rs", applied.clone())).await.unwrap();
        store.upsert_build_record(&record("a.rs", applied)).await.unwrap();

        let paths: Vec<_> = store
            .records_for_plan("plan-1")
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["a.rs", "z.rs"]);
        assert!(store.records_for_plan("other").is_empty());
    }
}
