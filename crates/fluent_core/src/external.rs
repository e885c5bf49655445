//! Narrow seams for host-supplied collaborators (§4.4, §9).
//!
//! This crate does not ship CLDR plural rule tables, locale-aware number or
//! date formatting, or ISO territory/currency data — those are large,
//! frequently-updated datasets that belong to a caller's own locale stack, not
//! to a parser/resolver core. Instead it defines narrow traits at the seam and
//! ships only the minimal fallback every caller gets for free: English-like
//! "other"-only pluralization and direct-value-to-string formatting.

use std::fmt;

use crate::value::FluentValue;

/// Plural category per CLDR's plural rule categories (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

/// The CLDR plural-rule operands derived from a numeric value and its
/// declared fraction-digit count (the v-operand, §4.4). Only `n` and `v` are
/// modeled; a caller's own `PluralRuleProvider` can recompute the rest
/// (`i`, `f`, `t`, `w`) from these if its rule tables need them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PluralOperands {
    pub n: f64,
    pub v: u8,
}

/// A host-supplied CLDR plural rule table for one locale.
///
/// The core ships [`OtherOnlyPluralRules`] as the default: every cardinal and
/// ordinal selection falls through to `Other`, which is always a valid match
/// since Fluent requires every select expression to declare a default
/// variant (§3, invariant i).
pub trait PluralRuleProvider: fmt::Debug {
    fn cardinal_category(&self, locale: &str, operands: PluralOperands) -> PluralCategory;
    fn ordinal_category(&self, locale: &str, operands: PluralOperands) -> PluralCategory {
        self.cardinal_category(locale, operands)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OtherOnlyPluralRules;

impl PluralRuleProvider for OtherOnlyPluralRules {
    fn cardinal_category(&self, _locale: &str, _operands: PluralOperands) -> PluralCategory {
        PluralCategory::Other
    }
}

/// What a `ValueFormatter` is being asked to render (the three built-in
/// function families, §4.4/§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Number,
    Currency,
    DateTime,
}

/// A host-supplied locale-aware value formatter for `NUMBER`/`DATETIME`
/// built-in functions (§4.4). The core's own fallback,
/// [`PassthroughFormatter`], uses `FluentValue::into_owned_string` untouched —
/// correct but locale-insensitive (no grouping separators, no currency
/// symbols, no calendar localization).
pub trait ValueFormatter: fmt::Debug {
    fn format(&self, kind: FormatKind, locale: &str, value: &FluentValue<'_>, options: &FormatOptions) -> String;
}

/// Named options passed to a formatting function call, e.g.
/// `NUMBER($x, minimumFractionDigits: 2)`.
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub named: Vec<(String, FluentValue<'static>)>,
}

impl FormatOptions {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FluentValue<'static>> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFormatter;

impl ValueFormatter for PassthroughFormatter {
    fn format(&self, _kind: FormatKind, _locale: &str, value: &FluentValue<'_>, _options: &FormatOptions) -> String {
        value.to_string()
    }
}

/// Host-supplied ISO territory/currency/script metadata, used by caller
/// functions that need it (e.g. a `CURRENCY` function deciding a default
/// fraction-digit count per ISO 4217). The core never calls this trait
/// itself — it exists so `FluentValue::Custom` handles have somewhere to be
/// resolved by a caller-registered function, without this crate depending on
/// an ISO data crate.
pub trait IsoDataProvider: fmt::Debug {
    fn currency_fraction_digits(&self, iso_code: &str) -> Option<u8>;
    fn territory_name(&self, locale: &str, territory_code: &str) -> Option<String>;
}

/// Parses caller-supplied numeric strings (e.g. from `FluentValue::String`
/// coerced into a `NUMBER()` call) using locale-aware grouping/decimal
/// separators. The core's fallback, [`StdNumericStringParser`], only accepts
/// the plain ASCII `-?[0-9]+(\.[0-9]+)?` form `std::str::FromStr` handles.
pub trait NumericStringParser: fmt::Debug {
    fn parse(&self, locale: &str, text: &str) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdNumericStringParser;

impl NumericStringParser for StdNumericStringParser {
    fn parse(&self, _locale: &str, text: &str) -> Option<f64> {
        text.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_only_rules_always_match_other() {
        let rules = OtherOnlyPluralRules;
        assert_eq!(rules.cardinal_category("en", PluralOperands { n: 1.0, v: 0 }), PluralCategory::Other);
        assert_eq!(rules.cardinal_category("pl", PluralOperands { n: 2.0, v: 0 }), PluralCategory::Other);
    }

    #[test]
    fn passthrough_formatter_uses_display() {
        let f = PassthroughFormatter;
        let v = FluentValue::from(3i64);
        assert_eq!(f.format(FormatKind::Number, "en", &v, &FormatOptions::default()), "3");
    }
}
