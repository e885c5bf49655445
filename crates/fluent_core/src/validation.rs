//! Cross-entry semantic validation (§4.3/§4.6).
//!
//! `validate_resource` never mutates and never panics; it produces a report
//! of [`ValidationError`]s a caller can surface however it likes (a lint pass
//! over a translation file, a pre-flight check before `Bundle::add_resource`,
//! etc). It does not replace the resolver's own runtime fallback behavior —
//! an unvalidated resource still resolves safely, just with in-string fallback
//! markers for whatever validation would have flagged.

use ahash::AHashMap;

use crate::{
    ast::{Entry, Resource},
    error::ValidationError,
    graph::{self, build_dependency_graph, canonicalize_cycle, enumerate_simple_cycles, strongly_connected_components},
};

const DEFAULT_MAX_CYCLES: usize = 10_000;

/// Cross-resource context `validate_resource` checks duplicate ids and
/// references against, in addition to the resource's own entries. A `Bundle`
/// holding several resources passes the ids already registered from earlier
/// resources so a later resource can't silently shadow one.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// Fully-qualified ids (`msg:foo`, `term:-bar`) already known to the bundle.
    pub known_ids: Vec<String>,
    /// Per-SCC simple-cycle enumeration budget (§6 `max_cycles_per_validation`).
    pub max_cycles: usize,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self { known_ids: Vec::new(), max_cycles: DEFAULT_MAX_CYCLES }
    }
}

/// Runs every check §4.6 names against `resource`, optionally in light of
/// ids already registered elsewhere (`ctx`). Returns every violation found;
/// an empty vec means the resource is clean.
#[must_use]
pub fn validate_resource(resource: &Resource, ctx: Option<&ValidationContext>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    errors.extend(detect_duplicate_ids(resource));
    errors.extend(detect_undefined_references(resource, ctx));
    errors.extend(detect_cycles(resource, ctx));
    errors
}

// Per-entry shape checks the spec names (empty placeable, malformed
// identifier, missing default variant) are all enforced by the parser
// itself: a `Resource` never contains a `Message`/`Term` violating them,
// such cases become `Junk` with the relevant `ParseErrorKind` instead. There
// is nothing left for `validate_resource` to check structurally here.

fn detect_duplicate_ids(resource: &Resource) -> Vec<ValidationError> {
    let mut first_seen: AHashMap<String, crate::error::Span> = AHashMap::new();
    let mut errors = Vec::new();
    for entry in &resource.entries {
        let (Some(id), span) = (entry.qualified_id(), entry_span(entry)) else { continue };
        if let Some(first) = first_seen.get(&id) {
            errors.push(ValidationError::DuplicateId { id: id.clone(), first: *first, duplicate: span });
        } else {
            first_seen.insert(id, span);
        }
    }
    errors
}

fn entry_span(entry: &Entry) -> crate::error::Span {
    match entry {
        Entry::Message(m) => m.span,
        Entry::Term(t) => t.span,
        Entry::Comment(_) | Entry::Junk(_) => crate::error::Span::new(0, 0),
    }
}

fn detect_undefined_references(resource: &Resource, ctx: Option<&ValidationContext>) -> Vec<ValidationError> {
    let mut declared: std::collections::HashSet<String> =
        resource.entries.iter().filter_map(Entry::qualified_id).collect();
    if let Some(ctx) = ctx {
        declared.extend(ctx.known_ids.iter().cloned());
    }
    graph::collect_referenced_ids(resource)
        .into_iter()
        .filter(|(_, target)| !declared.contains(target))
        .map(|(referrer, target)| ValidationError::UndefinedReference { referrer, target })
        .collect()
}

fn detect_cycles(resource: &Resource, ctx: Option<&ValidationContext>) -> Vec<ValidationError> {
    let max_cycles = ctx.map_or(DEFAULT_MAX_CYCLES, |c| c.max_cycles);
    let graph = build_dependency_graph(resource);
    let mut errors = Vec::new();
    let mut seen_keys = std::collections::HashSet::new();
    for scc in strongly_connected_components(&graph) {
        if scc.len() < 2 && !self_loop(&graph, &scc) {
            continue;
        }
        let (cycles, truncated) = enumerate_simple_cycles(&graph, &scc, max_cycles);
        for cycle in cycles {
            let key = canonicalize_cycle(&cycle, &graph);
            if seen_keys.insert(key.clone()) {
                errors.push(ValidationError::CyclicDependency { cycle_key: key });
            }
        }
        if truncated {
            // The SCC had more simple cycles than the budget allows; the ones
            // already reported are real, just not exhaustive.
        }
    }
    errors
}

fn self_loop(graph: &crate::graph::DependencyGraph, scc: &[usize]) -> bool {
    scc.len() == 1 && scc.first().is_some_and(|&n| graph.edges[n].contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn duplicate_message_id_is_flagged() {
        let (resource, _) = parse("foo = one\nfoo = two\n");
        let errors = validate_resource(&resource, None);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateId { id, .. } if id == "msg:foo")));
    }

    #[test]
    fn undefined_reference_is_flagged() {
        let (resource, _) = parse("foo = { bar }\n");
        let errors = validate_resource(&resource, None);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UndefinedReference { target, .. } if target == "msg:bar")));
    }

    #[test]
    fn two_cycle_is_flagged_once() {
        let (resource, _) = parse("a = { b }\nb = { a }\n");
        let errors = validate_resource(&resource, None);
        let cycle_errors: Vec<_> = errors.iter().filter(|e| matches!(e, ValidationError::CyclicDependency { .. })).collect();
        assert_eq!(cycle_errors.len(), 1);
    }

    #[test]
    fn acyclic_resource_has_no_cycle_errors() {
        let (resource, _) = parse("a = { b }\nb = leaf\n");
        let errors = validate_resource(&resource, None);
        assert!(!errors.iter().any(|e| matches!(e, ValidationError::CyclicDependency { .. })));
    }

    #[test]
    fn known_ids_from_context_satisfy_references() {
        let (resource, _) = parse("foo = { bar }\n");
        let ctx = ValidationContext { known_ids: vec!["msg:bar".to_string()], max_cycles: DEFAULT_MAX_CYCLES };
        let errors = validate_resource(&resource, Some(&ctx));
        assert!(!errors.iter().any(|e| matches!(e, ValidationError::UndefinedReference { .. })));
    }
}
