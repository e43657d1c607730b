//! Provider fallback resolution
//!
//! Flattens a role and its fallback tree into one [`ProviderOptions`] set.
//! Resolution is a pure function of the role, the settings and the registry;
//! it never fails. An empty result means no provider can serve the role.

use crate::model::{BaseModelUsesProvider, ModelId, ModelProviderConfig, ProviderComposite};
use crate::options::{ProviderOption, ProviderOptions};
use crate::registry::ProviderRegistry;
use crate::role::{ModelRoleConfig, MAX_FALLBACK_DEPTH};
use crate::settings::PlanSettings;
use std::sync::Arc;

/// Resolves role configs against a registry
#[derive(Debug, Clone, Copy)]
pub struct ProviderResolver<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> ProviderResolver<'a> {
    /// Create resolver over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Resolver over the built-in registry
    #[inline]
    #[must_use]
    pub fn builtin() -> ProviderResolver<'static> {
        ProviderResolver::new(ProviderRegistry::builtin())
    }

    /// Registry in use
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &'a ProviderRegistry {
        self.registry
    }

    /// Resolve a role and its fallbacks
    ///
    /// # Algorithm
    /// 1. Built-in uses for the role's model, then custom uses from settings
    /// 2. No uses at all: empty set, fallbacks are not visited
    /// 3. One option per use whose provider config and base model are known,
    ///    priority = position in the combined list
    /// 4. Error, large-context, large-output and strong-model fallbacks are
    ///    resolved in that order and condensed in
    #[must_use]
    pub fn resolve(&self, role: &ModelRoleConfig, settings: Option<&PlanSettings>) -> ProviderOptions {
        self.resolve_at_depth(role, settings, 0)
    }

    fn resolve_at_depth(
        &self,
        role: &ModelRoleConfig,
        settings: Option<&PlanSettings>,
        depth: usize,
    ) -> ProviderOptions {
        let builtin = self.registry.uses_providers(&role.model_id);
        let custom = settings.map_or(&[][..], |s| s.custom_uses(&role.model_id));

        let uses: Vec<&BaseModelUsesProvider> = builtin.iter().chain(custom).collect();
        if uses.is_empty() {
            tracing::debug!(model = %role.model_id, role = %role.role, "no providers for model");
            return ProviderOptions::new();
        }

        let mut options = ProviderOptions::new();
        for (priority, uses_provider) in uses.into_iter().enumerate() {
            let composite = uses_provider.to_composite();

            let Some(config) = self.provider_config(&composite, settings) else {
                tracing::debug!(
                    model = %role.model_id,
                    provider = %composite,
                    "skipping provider use: provider config missing"
                );
                continue;
            };

            let Some(base_model) = self.registry.base_model(&role.model_id) else {
                tracing::debug!(
                    model = %role.model_id,
                    provider = %composite,
                    "skipping provider use: base model missing"
                );
                continue;
            };

            let option = ProviderOption::new(base_model.publisher, config, priority);
            options = options.condense([(composite, option)].into_iter().collect());
        }

        for (kind, fallback) in role.fallbacks() {
            if depth + 1 > MAX_FALLBACK_DEPTH {
                tracing::warn!(
                    model = %role.model_id,
                    fallback = ?kind,
                    depth,
                    "fallback tree deeper than {MAX_FALLBACK_DEPTH}, ignoring subtree"
                );
                continue;
            }
            options = options.condense(self.resolve_at_depth(fallback, settings, depth + 1));
        }

        options
    }

    /// Name a provider knows a model by
    ///
    /// Falls back to the model id when no use of `composite` is listed.
    #[must_use]
    pub fn model_name(
        &self,
        model_id: &ModelId,
        composite: &ProviderComposite,
        settings: Option<&PlanSettings>,
    ) -> String {
        let custom = settings.map_or(&[][..], |s| s.custom_uses(model_id));
        self.registry
            .uses_providers(model_id)
            .iter()
            .chain(custom)
            .find(|uses| &uses.to_composite() == composite)
            .map_or_else(|| model_id.to_string(), |uses| uses.model_name.clone())
    }

    fn provider_config(
        &self,
        composite: &ProviderComposite,
        settings: Option<&PlanSettings>,
    ) -> Option<Arc<ModelProviderConfig>> {
        if let Some(config) = settings.and_then(|s| s.custom_provider(composite)) {
            return Some(Arc::new(config.clone()));
        }
        self.registry.provider_config(composite).cloned()
    }
}

impl ModelRoleConfig {
    /// Resolve this role against a registry
    #[must_use]
    pub fn provider_options(
        &self,
        settings: Option<&PlanSettings>,
        registry: &ProviderRegistry,
    ) -> ProviderOptions {
        ProviderResolver::new(registry).resolve(self, settings)
    }
}
