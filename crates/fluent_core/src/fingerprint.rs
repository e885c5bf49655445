//! Deterministic cache-key fingerprinting (§4.5).
//!
//! Two `format_pattern` calls with identical `(entry id, attr, canonicalized
//! args, locale chain, bundle generation)` must produce byte-identical cache
//! keys, including across separate process runs — this is what lets the
//! integrity cache's write-once contract actually mean something. We use
//! `std::collections::hash_map::DefaultHasher` directly rather than going
//! through `HashMap`'s `RandomState` (which reseeds per process): constructing
//! a `DefaultHasher` via `::new()`/`::default()` always starts from the same
//! fixed internal keys, so the resulting digest is stable. This mirrors the
//! teacher's own dedicated deterministic-hashing module, though for a
//! different reason — that module chases bit-for-bit parity with another
//! runtime's hash algorithm, while this one only needs *our own* determinism
//! across calls, so the standard library's hasher is sufficient.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use indexmap::IndexMap;

use crate::{error::IntegrityError, value::FluentValue};

/// A 64-bit content-addressed cache key. Collisions are handled, not
/// prevented: the integrity cache detects two distinct write attempts under
/// an equal key producing unequal values and reports
/// [`IntegrityError::CacheCorruption`] rather than silently overwriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(pub u64);

const TAG_NONE: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_DECIMAL: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_DATETIME: u8 = 5;
const TAG_CUSTOM: u8 = 6;

/// Computes the fingerprint for one `format_pattern` call, bounding the
/// number of argument/locale "nodes" hashed by `node_budget`. Exceeding the
/// budget is not an error in resolution — the caller still gets a formatted
/// result — but it is reported so the call can skip the cache for that one
/// invocation ([`IntegrityError::UnhashableArgs`]).
pub fn fingerprint(
    entry_id: &str,
    attr: Option<&str>,
    args: &IndexMap<String, FluentValue<'_>>,
    locale_chain: &[String],
    generation: u64,
    node_budget: usize,
) -> Result<CacheKey, IntegrityError> {
    let mut hasher = DefaultHasher::new();
    entry_id.hash(&mut hasher);
    attr.hash(&mut hasher);
    generation.hash(&mut hasher);

    let mut nodes = 0usize;
    for locale in locale_chain {
        nodes += 1;
        if nodes > node_budget {
            return Err(IntegrityError::UnhashableArgs { node_budget });
        }
        locale.hash(&mut hasher);
    }

    // IndexMap preserves insertion order, but two otherwise-identical calls
    // built their arg maps in whatever order the caller chose; sort by key
    // so insertion order never affects the fingerprint.
    let mut sorted: Vec<(&String, &FluentValue<'_>)> = args.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in sorted {
        nodes += 1;
        if nodes > node_budget {
            return Err(IntegrityError::UnhashableArgs { node_budget });
        }
        name.hash(&mut hasher);
        hash_value(&mut hasher, value);
    }

    Ok(CacheKey(hasher.finish()))
}

fn hash_value(hasher: &mut impl Hasher, value: &FluentValue<'_>) {
    match value {
        FluentValue::None => TAG_NONE.hash(hasher),
        FluentValue::Bool(b) => {
            TAG_BOOL.hash(hasher);
            b.hash(hasher);
        }
        FluentValue::Int(i) => {
            TAG_INT.hash(hasher);
            i.hash(hasher);
        }
        FluentValue::Decimal(d) => {
            TAG_DECIMAL.hash(hasher);
            d.value.to_bits().hash(hasher);
            d.fraction_digits.hash(hasher);
        }
        FluentValue::String(s) => {
            TAG_STRING.hash(hasher);
            s.as_ref().hash(hasher);
        }
        FluentValue::DateTime(dt) => {
            TAG_DATETIME.hash(hasher);
            dt.and_utc().timestamp_nanos_opt().unwrap_or_default().hash(hasher);
        }
        FluentValue::Custom(id) => {
            TAG_CUSTOM.hash(hasher);
            id.0.hash(hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, FluentValue<'static>)]) -> IndexMap<String, FluentValue<'static>> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn identical_calls_fingerprint_identically() {
        let a = args(&[("name", FluentValue::from("Alice")), ("count", FluentValue::from(3i64))]);
        let b = args(&[("count", FluentValue::from(3i64)), ("name", FluentValue::from("Alice"))]);
        let locales = vec!["en".to_string()];
        let k1 = fingerprint("msg:greeting", None, &a, &locales, 0, 1000).unwrap();
        let k2 = fingerprint("msg:greeting", None, &b, &locales, 0, 1000).unwrap();
        assert_eq!(k1, k2, "argument insertion order must not affect the fingerprint");
    }

    #[test]
    fn different_generation_fingerprints_differently() {
        let a = args(&[]);
        let locales = vec!["en".to_string()];
        let k1 = fingerprint("msg:greeting", None, &a, &locales, 0, 1000).unwrap();
        let k2 = fingerprint("msg:greeting", None, &a, &locales, 1, 1000).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn node_budget_is_enforced() {
        let a = args(&[("x", FluentValue::from(1i64)), ("y", FluentValue::from(2i64))]);
        let locales = vec!["en".to_string()];
        let err = fingerprint("msg:a", None, &a, &locales, 0, 1).unwrap_err();
        assert!(matches!(err, IntegrityError::UnhashableArgs { node_budget: 1 }));
    }
}
