//! The function registry (§4.4): caller-registered `FunctionReference`
//! callees, plus the three built-ins (`NUMBER`, `DATETIME`, `CURRENCY`) every
//! bundle gets for free.
//!
//! A function receives already-resolved positional and named
//! [`FluentValue`]s — it never sees AST; argument expressions are resolved by
//! the caller (`resolver::resolve_expression`) before the function runs. This
//! keeps a function implementation ignorant of scope isolation, depth
//! tracking, and bidi wrapping, which are resolver concerns (§4.4).

use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    error::{FluentError, IntegrityError},
    external::{FormatKind, FormatOptions, ValueFormatter},
    value::FluentValue,
};

pub type FunctionResult<'v> = Result<FluentValue<'v>, String>;

/// A caller-registered or built-in function implementation.
pub trait FluentFunction: fmt::Debug + Send + Sync {
    fn call<'v>(&self, locale: &str, positional: &[FluentValue<'v>], named: &IndexMap<String, FluentValue<'v>>) -> FunctionResult<'v>;
}

/// The set of functions available to a `Bundle` during resolution. Built-ins
/// are seeded by [`FunctionRegistry::with_builtins`]; a caller's own
/// registrations can shadow them (§4.4 notes `NUMBER`/`DATETIME` are "default
/// implementations a caller can override").
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<dyn FluentFunction>>,
    frozen: bool,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins(Arc::new(crate::external::PassthroughFormatter))
    }
}

impl FunctionRegistry {
    /// An empty registry with no functions at all, not even the built-ins.
    #[must_use]
    pub fn empty() -> Self {
        Self { functions: IndexMap::new(), frozen: false }
    }

    /// Seeds `NUMBER`, `DATETIME`, and `CURRENCY` backed by `formatter`.
    #[must_use]
    pub fn with_builtins(formatter: Arc<dyn ValueFormatter>) -> Self {
        let mut registry = Self::empty();
        registry.insert_unchecked("NUMBER", Arc::new(NumberFunction { formatter: Arc::clone(&formatter) }));
        registry.insert_unchecked("DATETIME", Arc::new(DateTimeFunction { formatter: Arc::clone(&formatter) }));
        registry.insert_unchecked("CURRENCY", Arc::new(CurrencyFunction { formatter }));
        registry
    }

    fn insert_unchecked(&mut self, name: impl Into<String>, function: Arc<dyn FluentFunction>) {
        self.functions.insert(name.into(), function);
    }

    /// Registers `function` under `name`, shadowing a built-in of the same
    /// name if present (§4.4: a caller's own registrations can shadow built-ins).
    ///
    /// # Errors
    /// Returns [`IntegrityError::ImmutabilityViolation`] if this registry has
    /// been [`frozen`](Self::freeze).
    pub fn register(&mut self, name: impl Into<String>, function: Arc<dyn FluentFunction>) -> Result<(), IntegrityError> {
        if self.frozen {
            return Err(IntegrityError::ImmutabilityViolation {
                detail: "cannot register a function on a frozen FunctionRegistry".to_string(),
            });
        }
        self.insert_unchecked(name, function);
        Ok(())
    }

    /// Makes this registry immutable: further [`register`](Self::register)
    /// calls fail. Call [`deep_copy`](Self::deep_copy) first if an unfrozen
    /// variant is still needed (§3).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns an unfrozen clone with identical bindings (§3: "deep copy
    /// (returns unfrozen clone with identical bindings)").
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self { functions: self.functions.clone(), frozen: false }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FluentFunction>> {
        self.functions.get(name)
    }

    /// Invokes `name`, translating a missing function or a function-level
    /// failure into the resolver's error taxonomy.
    pub fn call<'v>(
        &self,
        name: &str,
        locale: &str,
        positional: &[FluentValue<'v>],
        named: &IndexMap<String, FluentValue<'v>>,
    ) -> Result<FluentValue<'v>, FluentError> {
        let function = self.get(name).ok_or_else(|| FluentError::UnknownFunction { name: name.to_string() })?;
        function
            .call(locale, positional, named)
            .map_err(|message| FluentError::FunctionError { name: name.to_string(), message })
    }
}

fn to_format_options(named: &IndexMap<String, FluentValue<'_>>) -> FormatOptions {
    FormatOptions { named: named.iter().map(|(k, v)| (k.clone(), v.clone().into_owned())).collect() }
}

#[derive(Debug)]
struct NumberFunction {
    formatter: Arc<dyn ValueFormatter>,
}

impl FluentFunction for NumberFunction {
    fn call<'v>(&self, locale: &str, positional: &[FluentValue<'v>], named: &IndexMap<String, FluentValue<'v>>) -> FunctionResult<'v> {
        let value = positional.first().ok_or_else(|| "NUMBER() requires one positional argument".to_string())?;
        if !value.is_numeric() {
            return Err("NUMBER() argument must be numeric".to_string());
        }
        let formatted = self.formatter.format(FormatKind::Number, locale, value, &to_format_options(named));
        Ok(FluentValue::string(formatted))
    }
}

#[derive(Debug)]
struct DateTimeFunction {
    formatter: Arc<dyn ValueFormatter>,
}

impl FluentFunction for DateTimeFunction {
    fn call<'v>(&self, locale: &str, positional: &[FluentValue<'v>], named: &IndexMap<String, FluentValue<'v>>) -> FunctionResult<'v> {
        let value = positional.first().ok_or_else(|| "DATETIME() requires one positional argument".to_string())?;
        if !matches!(value, FluentValue::DateTime(_)) {
            return Err("DATETIME() argument must be a datetime value".to_string());
        }
        let formatted = self.formatter.format(FormatKind::DateTime, locale, value, &to_format_options(named));
        Ok(FluentValue::string(formatted))
    }
}

#[derive(Debug)]
struct CurrencyFunction {
    formatter: Arc<dyn ValueFormatter>,
}

impl FluentFunction for CurrencyFunction {
    fn call<'v>(&self, locale: &str, positional: &[FluentValue<'v>], named: &IndexMap<String, FluentValue<'v>>) -> FunctionResult<'v> {
        let value = positional.first().ok_or_else(|| "CURRENCY() requires one positional argument".to_string())?;
        if !value.is_numeric() {
            return Err("CURRENCY() argument must be numeric".to_string());
        }
        let formatted = self.formatter.format(FormatKind::Currency, locale, value, &to_format_options(named));
        Ok(FluentValue::string(formatted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_builtin_formats_via_passthrough() {
        let registry = FunctionRegistry::default();
        let result = registry.call("NUMBER", "en", &[FluentValue::from(42i64)], &IndexMap::new()).unwrap();
        assert_eq!(result.into_owned_string(), "42");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let registry = FunctionRegistry::default();
        let err = registry.call("NOPE", "en", &[], &IndexMap::new()).unwrap_err();
        assert!(matches!(err, FluentError::UnknownFunction { .. }));
    }

    #[test]
    fn number_requires_numeric_argument() {
        let registry = FunctionRegistry::default();
        let err = registry.call("NUMBER", "en", &[FluentValue::from("x")], &IndexMap::new()).unwrap_err();
        assert!(matches!(err, FluentError::FunctionError { .. }));
    }
}
