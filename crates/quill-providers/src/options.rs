//! Resolved provider options
//!
//! A [`ProviderOptions`] set maps a composite provider identity to the
//! publishers it can serve for the role tree, its configuration, and the best
//! priority any contributing role gave it.
//!
//! # Merge semantics
//!
//! [`ProviderOptions::condense`] is a join: per key it keeps the minimum
//! priority and the union of publishers. Both are commutative, associative
//! and idempotent, so the order in which fallback roles are condensed never
//! changes the merged values.

use crate::model::{ModelProviderConfig, ModelPublisher, ProviderComposite};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One resolved provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOption {
    /// Publishers whose models this provider serves for the role tree
    pub publishers: BTreeSet<ModelPublisher>,
    /// Immutable provider configuration
    pub config: Arc<ModelProviderConfig>,
    /// Preference rank (lower wins)
    pub priority: usize,
}

impl ProviderOption {
    /// Create option for a single publisher
    #[must_use]
    pub fn new(publisher: ModelPublisher, config: Arc<ModelProviderConfig>, priority: usize) -> Self {
        Self {
            publishers: BTreeSet::from([publisher]),
            config,
            priority,
        }
    }

    /// Fold another option for the same key into this one
    fn absorb(&mut self, other: &ProviderOption) {
        self.priority = self.priority.min(other.priority);
        self.publishers.extend(other.publishers.iter().copied());
    }
}

/// Set of resolved providers keyed by composite identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    inner: HashMap<ProviderComposite, ProviderOption>,
}

impl ProviderOptions {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an option
    pub fn insert(&mut self, composite: ProviderComposite, option: ProviderOption) {
        self.inner.insert(composite, option);
    }

    /// Look up an option
    #[inline]
    #[must_use]
    pub fn get(&self, composite: &ProviderComposite) -> Option<&ProviderOption> {
        self.inner.get(composite)
    }

    /// Number of providers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no provider can serve the role
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&ProviderComposite, &ProviderOption)> {
        self.inner.iter()
    }

    /// Merge `other` into this set
    ///
    /// Keys seen for the first time are copied; shared keys take the minimum
    /// priority and the publisher union. The first-seen config is kept, since
    /// configs for one key are identical by construction.
    #[must_use]
    pub fn condense(mut self, other: ProviderOptions) -> Self {
        for (composite, option) in other.inner {
            match self.inner.get_mut(&composite) {
                Some(existing) => existing.absorb(&option),
                None => {
                    self.inner.insert(composite, option);
                }
            }
        }
        self
    }

    /// Merge many sets
    #[must_use]
    pub fn condense_all(self, others: impl IntoIterator<Item = ProviderOptions>) -> Self {
        others.into_iter().fold(self, Self::condense)
    }

    /// Options by ascending priority, ties broken by composite
    #[must_use]
    pub fn ranked(&self) -> Vec<(&ProviderComposite, &ProviderOption)> {
        let mut ranked: Vec<_> = self.inner.iter().collect();
        ranked.sort_by(|(ka, a), (kb, b)| a.priority.cmp(&b.priority).then_with(|| ka.cmp(kb)));
        ranked
    }

    /// Ranked options able to serve a publisher's models
    #[must_use]
    pub fn ranked_for_publisher(
        &self,
        publisher: ModelPublisher,
    ) -> Vec<(&ProviderComposite, &ProviderOption)> {
        self.ranked()
            .into_iter()
            .filter(|(_, option)| option.publishers.contains(&publisher))
            .collect()
    }

    /// API key variables required by these options but not set
    ///
    /// `is_set` reports whether an environment variable is present.
    #[must_use]
    pub fn missing_credentials(&self, is_set: impl Fn(&str) -> bool) -> BTreeSet<String> {
        self.inner
            .values()
            .filter_map(|option| option.config.api_key_env_var.as_deref())
            .filter(|var| !is_set(var))
            .map(str::to_string)
            .collect()
    }
}

impl FromIterator<(ProviderComposite, ProviderOption)> for ProviderOptions {
    fn from_iter<I: IntoIterator<Item = (ProviderComposite, ProviderOption)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(composite, option)| Self {
                inner: HashMap::from([(composite, option)]),
            })
            .fold(Self::new(), Self::condense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelProvider;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn config_for(composite: &ProviderComposite) -> Arc<ModelProviderConfig> {
        Arc::new(ModelProviderConfig {
            provider: composite.provider,
            custom_provider: composite.custom_provider.clone(),
            base_url: format!("https://{composite}.example"),
            api_key_env_var: Some(format!("{}_KEY", composite.provider.as_str().to_uppercase())),
        })
    }

    fn option(provider: ModelProvider, publisher: ModelPublisher, priority: usize) -> (ProviderComposite, ProviderOption) {
        let composite = ProviderComposite::builtin(provider);
        let config = config_for(&composite);
        (composite, ProviderOption::new(publisher, config, priority))
    }

    #[test]
    fn condense_takes_min_priority_and_union() {
        let a: ProviderOptions = [option(ModelProvider::OpenRouter, ModelPublisher::Anthropic, 1)]
            .into_iter()
            .collect();
        let b: ProviderOptions = [option(ModelProvider::OpenRouter, ModelPublisher::OpenAI, 0)]
            .into_iter()
            .collect();

        let merged = a.condense(b);
        let entry = merged
            .get(&ProviderComposite::builtin(ModelProvider::OpenRouter))
            .unwrap();
        assert_eq!(entry.priority, 0);
        assert_eq!(
            entry.publishers,
            BTreeSet::from([ModelPublisher::OpenAI, ModelPublisher::Anthropic])
        );
    }

    #[test]
    fn condense_with_empty_is_identity() {
        let a: ProviderOptions = [option(ModelProvider::OpenAI, ModelPublisher::OpenAI, 2)]
            .into_iter()
            .collect();
        assert_eq!(a.clone().condense(ProviderOptions::new()), a);
        assert_eq!(ProviderOptions::new().condense(a.clone()), a);
    }

    #[test]
    fn ranked_orders_by_priority_then_composite() {
        let set: ProviderOptions = [
            option(ModelProvider::OpenRouter, ModelPublisher::OpenAI, 1),
            option(ModelProvider::OpenAI, ModelPublisher::OpenAI, 1),
            option(ModelProvider::Anthropic, ModelPublisher::Anthropic, 0),
        ]
        .into_iter()
        .collect();

        let order: Vec<_> = set.ranked().into_iter().map(|(k, _)| k.provider).collect();
        assert_eq!(
            order,
            vec![ModelProvider::Anthropic, ModelProvider::OpenAI, ModelProvider::OpenRouter]
        );
    }

    #[test]
    fn ranked_for_publisher_filters() {
        let set: ProviderOptions = [
            option(ModelProvider::OpenAI, ModelPublisher::OpenAI, 0),
            option(ModelProvider::Anthropic, ModelPublisher::Anthropic, 1),
        ]
        .into_iter()
        .collect();

        let anthropic = set.ranked_for_publisher(ModelPublisher::Anthropic);
        assert_eq!(anthropic.len(), 1);
        assert_eq!(anthropic[0].0.provider, ModelProvider::Anthropic);
    }

    #[test]
    fn missing_credentials_lists_unset_vars() {
        let set: ProviderOptions = [
            option(ModelProvider::OpenAI, ModelPublisher::OpenAI, 0),
            option(ModelProvider::Anthropic, ModelPublisher::Anthropic, 1),
        ]
        .into_iter()
        .collect();

        let missing = set.missing_credentials(|var| var == "OPENAI_KEY");
        assert_eq!(missing, BTreeSet::from(["ANTHROPIC_KEY".to_string()]));
    }

    const PROVIDERS: [ModelProvider; 4] = [
        ModelProvider::OpenAI,
        ModelProvider::Anthropic,
        ModelProvider::OpenRouter,
        ModelProvider::Ollama,
    ];

    const PUBLISHERS: [ModelPublisher; 3] = [
        ModelPublisher::OpenAI,
        ModelPublisher::Anthropic,
        ModelPublisher::Google,
    ];

    fn arb_options() -> impl Strategy<Value = ProviderOptions> {
        prop::collection::vec((0..PROVIDERS.len(), 0..PUBLISHERS.len(), 0usize..6), 0..6).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .map(|(p, publ, priority)| option(PROVIDERS[p], PUBLISHERS[publ], priority))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_condense_commutative(a in arb_options(), b in arb_options()) {
            prop_assert_eq!(a.clone().condense(b.clone()), b.condense(a));
        }

        #[test]
        fn prop_condense_associative(a in arb_options(), b in arb_options(), c in arb_options()) {
            let left = a.clone().condense(b.clone()).condense(c.clone());
            let right = a.condense(b.condense(c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_condense_min_and_union(a in arb_options(), b in arb_options()) {
            let merged = a.clone().condense(b.clone());
            for (key, option) in merged.iter() {
                let sources: Vec<_> = [a.get(key), b.get(key)].into_iter().flatten().collect();
                let min = sources.iter().map(|o| o.priority).min().unwrap();
                let union: BTreeSet<_> = sources.iter().flat_map(|o| o.publishers.iter().copied()).collect();
                prop_assert_eq!(option.priority, min);
                prop_assert_eq!(&option.publishers, &union);
            }
            prop_assert_eq!(merged.len(), a.iter().map(|(k, _)| k).chain(b.iter().map(|(k, _)| k)).collect::<BTreeSet<_>>().len());
        }
    }
}
