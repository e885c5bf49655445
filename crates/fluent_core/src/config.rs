//! `EngineConfig` (§6): every configurable limit and knob in one place,
//! threaded explicitly through a [`crate::bundle::Bundle`] rather than read
//! from a global. There is deliberately no lazily-initialized static here —
//! two `Bundle`s in the same process can run with different limits.

/// Configuration keys and defaults from §6's table, gathered into one struct.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    max_placeable_depth: usize,
    max_entries_per_resource: usize,
    max_pattern_bytes: usize,
    max_resolution_depth: usize,
    max_expansion_bytes: usize,
    max_cycles_per_validation: usize,
    hash_node_budget: usize,
    cache_max_entries: usize,
    cache_max_bytes: usize,
    cache_protected_ratio: f32,
    bidi_isolation: bool,
    strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_placeable_depth: 100,
            max_entries_per_resource: 100_000,
            max_pattern_bytes: 1024 * 1024,
            max_resolution_depth: 100,
            max_expansion_bytes: 10 * 1024 * 1024,
            max_cycles_per_validation: 10_000,
            hash_node_budget: 10_000,
            cache_max_entries: 10_000,
            cache_max_bytes: 100 * 1024 * 1024,
            cache_protected_ratio: 0.8,
            bidi_isolation: true,
            strict: false,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    #[must_use]
    pub fn max_placeable_depth(&self) -> usize {
        self.max_placeable_depth
    }

    #[must_use]
    pub fn max_entries_per_resource(&self) -> usize {
        self.max_entries_per_resource
    }

    #[must_use]
    pub fn max_pattern_bytes(&self) -> usize {
        self.max_pattern_bytes
    }

    #[must_use]
    pub fn max_resolution_depth(&self) -> usize {
        self.max_resolution_depth
    }

    #[must_use]
    pub fn max_expansion_bytes(&self) -> usize {
        self.max_expansion_bytes
    }

    #[must_use]
    pub fn max_cycles_per_validation(&self) -> usize {
        self.max_cycles_per_validation
    }

    #[must_use]
    pub fn hash_node_budget(&self) -> usize {
        self.hash_node_budget
    }

    #[must_use]
    pub fn cache_max_entries(&self) -> usize {
        self.cache_max_entries
    }

    #[must_use]
    pub fn cache_max_bytes(&self) -> usize {
        self.cache_max_bytes
    }

    #[must_use]
    pub fn cache_protected_ratio(&self) -> f32 {
        self.cache_protected_ratio
    }

    #[must_use]
    pub fn bidi_isolation(&self) -> bool {
        self.bidi_isolation
    }

    #[must_use]
    pub fn strict(&self) -> bool {
        self.strict
    }

    #[must_use]
    pub fn parser_limits(&self) -> crate::parser::ParserLimits {
        crate::parser::ParserLimits {
            max_placeable_depth: self.max_placeable_depth,
            max_entries_per_resource: self.max_entries_per_resource,
            max_pattern_bytes: self.max_pattern_bytes,
        }
    }
}

/// Fluent builder for [`EngineConfig`]; every setter takes and returns `Self`
/// by value so calls chain without an intermediate `let mut`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn max_placeable_depth(mut self, value: usize) -> Self {
        self.config.max_placeable_depth = value;
        self
    }

    #[must_use]
    pub fn max_entries_per_resource(mut self, value: usize) -> Self {
        self.config.max_entries_per_resource = value;
        self
    }

    #[must_use]
    pub fn max_pattern_bytes(mut self, value: usize) -> Self {
        self.config.max_pattern_bytes = value;
        self
    }

    #[must_use]
    pub fn max_resolution_depth(mut self, value: usize) -> Self {
        self.config.max_resolution_depth = value;
        self
    }

    #[must_use]
    pub fn max_expansion_bytes(mut self, value: usize) -> Self {
        self.config.max_expansion_bytes = value;
        self
    }

    #[must_use]
    pub fn max_cycles_per_validation(mut self, value: usize) -> Self {
        self.config.max_cycles_per_validation = value;
        self
    }

    #[must_use]
    pub fn hash_node_budget(mut self, value: usize) -> Self {
        self.config.hash_node_budget = value;
        self
    }

    #[must_use]
    pub fn cache_max_entries(mut self, value: usize) -> Self {
        self.config.cache_max_entries = value;
        self
    }

    #[must_use]
    pub fn cache_max_bytes(mut self, value: usize) -> Self {
        self.config.cache_max_bytes = value;
        self
    }

    #[must_use]
    pub fn cache_protected_ratio(mut self, value: f32) -> Self {
        self.config.cache_protected_ratio = value;
        self
    }

    #[must_use]
    pub fn bidi_isolation(mut self, value: bool) -> Self {
        self.config.bidi_isolation = value;
        self
    }

    #[must_use]
    pub fn strict(mut self, value: bool) -> Self {
        self.config.strict = value;
        self
    }

    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::builder().max_resolution_depth(10).bidi_isolation(false).build();
        assert_eq!(config.max_resolution_depth(), 10);
        assert!(!config.bidi_isolation());
        assert_eq!(config.max_placeable_depth(), EngineConfig::default().max_placeable_depth());
    }
}
