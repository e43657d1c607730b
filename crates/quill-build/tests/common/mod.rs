#![allow(dead_code)]

use quill_build::{ActiveBuildStreamState, BuildEvent, BuildOrchestrator, InMemoryBuildRecordStore};
use quill_llm::{CompletionClient, ModelHooks, TenantAuth};
use quill_providers::{
    BuildConfig, ModelPack, ModelRole, ModelRoleConfig, ModelProvider, PlanSettings,
    ProviderComposite,
};
use quill_syntax::SyntaxValidator;
use quill_test_utils::{fixture_registry, fixture_role};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const EDIT_ANSWER: &str = r#"{"replacements":[{"old":"42","new":"42 +"}]}"#;

pub fn anthropic() -> ProviderComposite {
    ProviderComposite::builtin(ModelProvider::Anthropic)
}

pub fn openrouter() -> ProviderComposite {
    ProviderComposite::builtin(ModelProvider::OpenRouter)
}

pub fn serve(
    provider: ProviderComposite,
    client: Arc<dyn CompletionClient>,
) -> (ProviderComposite, Arc<dyn CompletionClient>) {
    (provider, client)
}

pub fn settings(build: BuildConfig) -> PlanSettings {
    PlanSettings {
        model_pack: ModelPack {
            name: "test-pack".to_string(),
            builder: fixture_role(ModelRole::Builder),
            whole_file_builder: Some(fixture_role(ModelRole::WholeFileBuilder)),
            plan_summary: ModelRoleConfig::new(ModelRole::PlanSummary, "editor"),
        },
        ..PlanSettings::default()
    }
    .with_build_config(build)
}

pub fn fast_build() -> BuildConfig {
    BuildConfig::default().with_retry_base_delay(Duration::from_millis(1))
}

pub fn stream(
    build: BuildConfig,
    clients: Vec<(ProviderComposite, Arc<dyn CompletionClient>)>,
) -> (Arc<ActiveBuildStreamState>, mpsc::UnboundedReceiver<BuildEvent>) {
    let (state, events) = ActiveBuildStreamState::new(
        TenantAuth::new("org-1", "user-1"),
        "plan-1",
        "main",
        settings(build),
    );
    let state = clients
        .into_iter()
        .fold(state, |state, (provider, client)| state.with_client(provider, client));
    (Arc::new(state), events)
}

pub fn orchestrator(
    validator: Arc<dyn SyntaxValidator>,
    hooks: Arc<dyn ModelHooks>,
    records: Arc<InMemoryBuildRecordStore>,
) -> BuildOrchestrator {
    BuildOrchestrator::new(validator, hooks, records).with_registry(Arc::new(fixture_registry()))
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<BuildEvent>) -> Vec<BuildEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
