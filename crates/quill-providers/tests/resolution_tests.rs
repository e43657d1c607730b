use pretty_assertions::assert_eq;
use quill_providers::{
    BaseModel, BaseModelUsesProvider, ModelId, ModelProvider, ModelProviderConfig, ModelPublisher,
    ModelRole, ModelRoleConfig, PlanSettings, ProviderComposite, ProviderRegistry,
    ProviderResolver, MAX_FALLBACK_DEPTH,
};
use std::collections::BTreeSet;

fn key(provider: ModelProvider) -> ProviderComposite {
    ProviderComposite::builtin(provider)
}

/// P1 = Anthropic, P2 = OpenRouter, P3 = OpenAI
fn scenario_registry() -> ProviderRegistry {
    ProviderRegistry::new()
        .with_provider(ModelProviderConfig::new(ModelProvider::Anthropic, "https://p1"))
        .with_provider(ModelProviderConfig::new(ModelProvider::OpenRouter, "https://p2"))
        .with_provider(ModelProviderConfig::new(ModelProvider::OpenAI, "https://p3"))
        .with_model(
            BaseModel::new("r-model", ModelPublisher::Anthropic, 100_000),
            vec![
                BaseModelUsesProvider::new(ModelProvider::Anthropic, "r"),
                BaseModelUsesProvider::new(ModelProvider::OpenRouter, "vendor/r"),
            ],
        )
        .with_model(
            BaseModel::new("f-model", ModelPublisher::OpenAI, 100_000),
            vec![
                BaseModelUsesProvider::new(ModelProvider::OpenRouter, "vendor/f"),
                BaseModelUsesProvider::new(ModelProvider::OpenAI, "f"),
            ],
        )
}

#[test]
fn error_fallback_merges_min_priority_and_publishers() {
    let registry = scenario_registry();
    let role = ModelRoleConfig::new(ModelRole::Builder, "r-model")
        .with_error_fallback(ModelRoleConfig::new(ModelRole::Builder, "f-model"));

    let options = ProviderResolver::new(&registry).resolve(&role, None);

    assert_eq!(options.len(), 3);
    assert_eq!(options.get(&key(ModelProvider::Anthropic)).unwrap().priority, 0);
    assert_eq!(options.get(&key(ModelProvider::OpenAI)).unwrap().priority, 1);

    let p2 = options.get(&key(ModelProvider::OpenRouter)).unwrap();
    assert_eq!(p2.priority, 0);
    assert_eq!(
        p2.publishers,
        BTreeSet::from([ModelPublisher::Anthropic, ModelPublisher::OpenAI])
    );
}

#[test]
fn fallback_slot_does_not_change_merged_values() {
    let registry = scenario_registry();
    let fallback = ModelRoleConfig::new(ModelRole::Builder, "f-model");

    let as_error = ModelRoleConfig::new(ModelRole::Builder, "r-model").with_error_fallback(fallback.clone());
    let as_strong = ModelRoleConfig::new(ModelRole::Builder, "r-model").with_strong_model(fallback);

    let resolver = ProviderResolver::new(&registry);
    assert_eq!(resolver.resolve(&as_error, None), resolver.resolve(&as_strong, None));
}

#[test]
fn model_without_providers_never_visits_fallbacks() {
    let registry = scenario_registry();
    let role = ModelRoleConfig::new(ModelRole::Builder, "unknown-model")
        .with_error_fallback(ModelRoleConfig::new(ModelRole::Builder, "r-model"))
        .with_large_context_fallback(ModelRoleConfig::new(ModelRole::Builder, "f-model"));

    let options = ProviderResolver::new(&registry).resolve(&role, Some(&PlanSettings::default()));
    assert!(options.is_empty());
}

#[test]
fn deep_fallback_chain_is_bounded() {
    let mut registry = ProviderRegistry::new();
    let mut settings = PlanSettings::default();
    for level in 0..MAX_FALLBACK_DEPTH + 4 {
        let model = format!("model-{level}");
        let gateway = format!("gw-{level}");
        registry = registry.with_model(BaseModel::new(model.as_str(), ModelPublisher::Meta, 8_000), vec![]);
        settings = settings
            .with_custom_provider(ModelProviderConfig::custom(gateway.as_str(), "http://gw"))
            .with_custom_uses(model.as_str(), vec![BaseModelUsesProvider::custom(gateway.as_str(), "m")]);
    }

    let mut role = ModelRoleConfig::new(ModelRole::Builder, format!("model-{}", MAX_FALLBACK_DEPTH + 3));
    for level in (0..MAX_FALLBACK_DEPTH + 3).rev() {
        role = ModelRoleConfig::new(ModelRole::Builder, format!("model-{level}")).with_strong_model(role);
    }

    let options = ProviderResolver::new(&registry).resolve(&role, Some(&settings));
    assert_eq!(options.len(), MAX_FALLBACK_DEPTH + 1);
    assert!(options.get(&ProviderComposite::custom(format!("gw-{MAX_FALLBACK_DEPTH}"))).is_some());
    assert!(options
        .get(&ProviderComposite::custom(format!("gw-{}", MAX_FALLBACK_DEPTH + 1)))
        .is_none());
}

#[test]
fn builtin_default_pack_resolves() {
    let settings = PlanSettings::default();
    let options = ProviderResolver::builtin().resolve(&settings.model_pack.builder, Some(&settings));

    // sonnet (anthropic, openrouter) + gemini (google, openrouter) + gpt-4.1 (openai, openrouter)
    assert_eq!(options.len(), 4);
    let openrouter = options.get(&key(ModelProvider::OpenRouter)).unwrap();
    assert_eq!(openrouter.priority, 1);
    assert_eq!(
        openrouter.publishers,
        BTreeSet::from([ModelPublisher::OpenAI, ModelPublisher::Anthropic, ModelPublisher::Google])
    );

    let ranked = options.ranked();
    let first_tier: BTreeSet<_> = ranked
        .iter()
        .filter(|(_, o)| o.priority == 0)
        .map(|(k, _)| k.provider)
        .collect();
    assert_eq!(
        first_tier,
        BTreeSet::from([ModelProvider::OpenAI, ModelProvider::Anthropic, ModelProvider::GoogleAiStudio])
    );
}

#[test]
fn large_context_role_selection_uses_registry_limits() {
    let registry = ProviderRegistry::builtin();
    let pack = PlanSettings::default().model_pack;

    let small = pack.builder.role_for_input_tokens(10_000, registry);
    assert_eq!(small.model_id, ModelId::new("anthropic/claude-sonnet-4"));

    let large = pack.builder.role_for_input_tokens(500_000, registry);
    assert_eq!(large.model_id, ModelId::new("google/gemini-2.5-pro"));
}
