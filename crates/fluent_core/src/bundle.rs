//! `Bundle` (§3/§4.7): owns a locale chain, a set of parsed resources, a
//! function registry, and an integrity cache behind the crate's own
//! [`crate::rwlock::RwLock`]. This is the one type most callers touch —
//! everything else (parser, resolver, cache, validation) is assembled here
//! into the single `format_pattern` entry point.

use std::sync::Arc;

use ahash::AHashMap;

use crate::{
    ast::{Entry, Pattern, Resource},
    cache::IntegrityCache,
    config::EngineConfig,
    diagnostics::{EngineTracer, NoopTracer},
    error::{FluentError, IntegrityError, ValidationError},
    external::{OtherOnlyPluralRules, PluralRuleProvider},
    fingerprint,
    functions::FunctionRegistry,
    resolver::{self, EntryLookup, ResolverEnv},
    rwlock::RwLock,
    validation::{self, ValidationContext},
    value::FluentValue,
};

/// The mutable half of a `Bundle`'s state, held behind its `RwLock`. Kept as
/// a separate type so read and write access are each a single lock
/// acquisition rather than several.
struct BundleState {
    locale_chain: Vec<String>,
    resources: Vec<Resource>,
    /// `msg:foo` / `term:-bar` -> `(resource index, entry index within that resource)`.
    index: AHashMap<String, (usize, usize)>,
    functions: FunctionRegistry,
    generation: u64,
    frozen: bool,
}

impl EntryLookup for BundleState {
    fn lookup_pattern(&self, qualified_id: &str, attr: Option<&str>) -> Option<&Pattern> {
        let &(resource_idx, entry_idx) = self.index.get(qualified_id)?;
        match &self.resources[resource_idx].entries[entry_idx] {
            Entry::Message(m) => match attr {
                Some(a) => m.attributes.iter().find(|x| x.id.as_str() == a).map(|x| &x.value),
                None => m.value.as_ref(),
            },
            Entry::Term(t) => match attr {
                Some(a) => t.attributes.iter().find(|x| x.id.as_str() == a).map(|x| &x.value),
                None => Some(&t.value),
            },
            Entry::Comment(_) | Entry::Junk(_) => None,
        }
    }
}

/// Owns parsed resources, the function registry, and the integrity cache for
/// one locale chain. Thread-safe: every operation goes through the internal
/// `RwLock`, so a `Bundle` is typically shared behind an `Arc`.
pub struct Bundle {
    state: RwLock<BundleState>,
    cache: IntegrityCache,
    config: EngineConfig,
    plural_rules: Arc<dyn PluralRuleProvider + Send + Sync>,
    tracer: Arc<dyn EngineTracer>,
}

impl Bundle {
    /// A bundle for `locale_chain` with default configuration, the
    /// `OtherOnlyPluralRules` fallback, and a no-op tracer.
    #[must_use]
    pub fn new(locale_chain: Vec<String>) -> Self {
        Self::with_config(locale_chain, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(locale_chain: Vec<String>, config: EngineConfig) -> Self {
        let cache = IntegrityCache::new(config.cache_max_entries(), config.cache_max_bytes(), config.cache_protected_ratio());
        Self {
            state: RwLock::new(BundleState {
                locale_chain,
                resources: Vec::new(),
                index: AHashMap::default(),
                functions: FunctionRegistry::default(),
                generation: 0,
                frozen: false,
            }),
            cache,
            config,
            plural_rules: Arc::new(OtherOnlyPluralRules),
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Swaps in a caller-supplied plural rule table (§6, *plural rules provider*).
    #[must_use]
    pub fn with_plural_rules(mut self, plural_rules: Arc<dyn PluralRuleProvider + Send + Sync>) -> Self {
        self.plural_rules = plural_rules;
        self
    }

    /// Swaps in a caller-supplied tracer (§4.8).
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn EngineTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Adds `resource`'s entries to the bundle's index, bumping `generation`
    /// and discarding the cache (§3: "`generation` increments on any
    /// mutation"). Does not itself validate; call [`validate_resource`] first
    /// if the caller wants a report before committing.
    ///
    /// # Errors
    /// Returns [`IntegrityError::ImmutabilityViolation`] if the bundle has
    /// been [`freeze`](Self::freeze)d.
    pub fn add_resource(&self, resource: Resource) -> Result<(), IntegrityError> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(IntegrityError::ImmutabilityViolation { detail: "cannot add a resource to a frozen Bundle".to_string() });
        }
        let resource_idx = state.resources.len();
        for (entry_idx, entry) in resource.entries.iter().enumerate() {
            if let Some(id) = entry.qualified_id() {
                state.index.insert(id, (resource_idx, entry_idx));
            }
        }
        state.resources.push(resource);
        state.generation += 1;
        drop(state);
        self.cache.clear();
        Ok(())
    }

    /// Registers a caller function, shadowing a built-in of the same name if present.
    ///
    /// # Errors
    /// See [`FunctionRegistry::register`] and the frozen-bundle case above.
    pub fn register_function(&self, name: impl Into<String>, function: Arc<dyn crate::functions::FluentFunction>) -> Result<(), IntegrityError> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(IntegrityError::ImmutabilityViolation { detail: "cannot register a function on a frozen Bundle".to_string() });
        }
        state.functions.register(name, function)?;
        state.generation += 1;
        drop(state);
        self.cache.clear();
        Ok(())
    }

    /// Makes the bundle immutable: no further resources or functions can be
    /// added. Formatting and cache use continue to work.
    pub fn freeze(&self) {
        let mut state = self.state.write();
        state.frozen = true;
        state.functions.freeze();
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    /// Validates `resource` against itself and (optionally) this bundle's
    /// already-registered ids, without committing it (§4.7).
    #[must_use]
    pub fn validate_resource(&self, resource: &Resource) -> Vec<ValidationError> {
        let state = self.state.read();
        let ctx = ValidationContext { known_ids: state.index.keys().cloned().collect(), max_cycles: self.config.max_cycles_per_validation() };
        validation::validate_resource(resource, Some(&ctx))
    }

    /// Validates every resource already committed to this bundle, including
    /// cross-resource duplicate ids and cycles that span more than one
    /// resource (§4.7: "optionally across a cross-resource context").
    #[must_use]
    pub fn validate_all(&self) -> Vec<ValidationError> {
        let state = self.state.read();
        let mut errors = Vec::new();
        for resource in &state.resources {
            errors.extend(validation::validate_resource(resource, None));
        }
        errors
    }

    /// Formats message `entry_id`, optionally scoped to `attr`, against
    /// `args`. Consults the integrity cache first; on a miss, resolves and
    /// writes back. Never panics and never returns an `Err` — integrity races
    /// self-heal by recomputing (see [`Self::format_pattern_checked`] for the
    /// variant that surfaces them instead).
    #[must_use]
    pub fn format_pattern(&self, entry_id: &str, attr: Option<&str>, args: &indexmap::IndexMap<String, FluentValue<'_>>) -> (String, Vec<FluentError>) {
        match self.format_pattern_checked(entry_id, attr, args) {
            Ok(result) => result,
            Err(_) => {
                // A write-once collision or an over-budget fingerprint: bypass
                // the cache for this call and resolve directly rather than
                // surface an integrity error from what is, to this caller,
                // an ordinary format request.
                self.resolve_uncached(entry_id, attr, args)
            }
        }
    }

    /// Same contract as [`Self::format_pattern`], but surfaces integrity
    /// failures (`CacheCorruption`, a fingerprinting failure) instead of
    /// silently recomputing uncached.
    ///
    /// # Errors
    /// See [`IntegrityError`].
    pub fn format_pattern_checked(
        &self,
        entry_id: &str,
        attr: Option<&str>,
        args: &indexmap::IndexMap<String, FluentValue<'_>>,
    ) -> Result<(String, Vec<FluentError>), IntegrityError> {
        let state = self.state.read();
        let owned_args: indexmap::IndexMap<String, FluentValue<'static>> =
            args.iter().map(|(k, v)| (k.clone(), v.clone().into_owned())).collect();
        let key = fingerprint::fingerprint(entry_id, attr, &owned_args, &state.locale_chain, state.generation, self.config.hash_node_budget())?;

        if let Some(cached) = self.cache.get(key) {
            return Ok((cached, Vec::new()));
        }

        let (text, errors) = self.resolve_with_state(&state, entry_id, attr, args);
        if errors.is_empty() {
            self.cache.insert(key, text.clone())?;
        }
        Ok((text, errors))
    }

    fn resolve_uncached(&self, entry_id: &str, attr: Option<&str>, args: &indexmap::IndexMap<String, FluentValue<'_>>) -> (String, Vec<FluentError>) {
        let state = self.state.read();
        self.resolve_with_state(&state, entry_id, attr, args)
    }

    fn resolve_with_state(
        &self,
        state: &BundleState,
        entry_id: &str,
        attr: Option<&str>,
        args: &indexmap::IndexMap<String, FluentValue<'_>>,
    ) -> (String, Vec<FluentError>) {
        let env = ResolverEnv {
            locale_chain: &state.locale_chain,
            functions: &state.functions,
            plural_rules: self.plural_rules.as_ref(),
            config: &self.config,
            tracer: self.tracer.as_ref(),
        };
        resolver::format_pattern(state, &env, entry_id, attr, args)
    }

    /// Discards the cache without bumping generation (the bundle's content
    /// hasn't changed, only the memoized outputs).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    #[must_use]
    pub fn locale_chain(&self) -> Vec<String> {
        self.state.read().locale_chain.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn add(bundle: &Bundle, source: &str) {
        let (resource, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        bundle.add_resource(resource).unwrap();
    }

    #[test]
    fn format_pattern_resolves_a_simple_message() {
        let bundle = Bundle::new(vec!["en".to_string()]);
        add(&bundle, "greet = Hello { $name }\n");
        let mut args = indexmap::IndexMap::new();
        args.insert("name".to_string(), FluentValue::from("World"));
        let (text, errors) = bundle.format_pattern("greet", None, &args);
        assert!(errors.is_empty());
        assert!(text.contains("World"));
    }

    #[test]
    fn repeated_calls_hit_the_cache() {
        let bundle = Bundle::new(vec!["en".to_string()]);
        add(&bundle, "greet = Hello { $name }\n");
        let mut args = indexmap::IndexMap::new();
        args.insert("name".to_string(), FluentValue::from("World"));
        let (first, _) = bundle.format_pattern("greet", None, &args);
        assert_eq!(bundle.cache.len(), 1);
        let (second, _) = bundle.format_pattern("greet", None, &args);
        assert_eq!(first, second);
        assert_eq!(bundle.cache.len(), 1);
    }

    #[test]
    fn adding_a_resource_bumps_generation_and_clears_cache() {
        let bundle = Bundle::new(vec!["en".to_string()]);
        add(&bundle, "greet = Hello\n");
        let _ = bundle.format_pattern("greet", None, &indexmap::IndexMap::new());
        assert_eq!(bundle.cache.len(), 1);
        add(&bundle, "another = Hi\n");
        assert_eq!(bundle.generation(), 2);
        assert_eq!(bundle.cache.len(), 0);
    }

    #[test]
    fn frozen_bundle_rejects_further_mutation() {
        let bundle = Bundle::new(vec!["en".to_string()]);
        add(&bundle, "greet = Hello\n");
        bundle.freeze();
        let (resource, _) = parse("another = Hi\n");
        assert!(bundle.add_resource(resource).is_err());
    }

    #[test]
    fn validate_all_flags_duplicate_across_resources() {
        let bundle = Bundle::new(vec!["en".to_string()]);
        add(&bundle, "foo = one\n");
        add(&bundle, "foo = two\n");
        let errors = bundle.validate_all();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateId { .. })));
    }
}
