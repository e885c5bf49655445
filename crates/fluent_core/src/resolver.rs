//! The pattern resolver (§4.4): walks a parsed `Pattern`, substituting
//! variables, message/term references, function calls, and select
//! expressions, producing a formatted string plus any errors encountered
//! along the way. Never panics on a well-formed AST — every failure mode
//! (missing variable, dangling reference, cyclic reference, runaway
//! expansion) degrades to an in-string fallback marker and a collected
//! [`FluentError`], mirroring the teacher's "errors are values, not
//! exceptions" convention rather than unwinding.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::{
    ast::{CallArguments, Expression, Pattern, PatternElement, VariantKey},
    config::EngineConfig,
    diagnostics::EngineTracer,
    error::FluentError,
    external::{PluralOperands, PluralRuleProvider},
    functions::FunctionRegistry,
    value::{DecimalValue, FluentValue},
};

const FSI: char = '\u{2068}';
const PDI: char = '\u{2069}';

/// What `Bundle` implements to hand the resolver pattern lookups without the
/// resolver depending on `Bundle`'s own storage layout.
pub trait EntryLookup {
    /// Resolves `qualified_id` (`msg:foo` or `term:-bar`), optionally scoped
    /// to `attr`, to the pattern that should be evaluated. Returns `None` for
    /// an unknown entry, an unknown attribute, or a message with no value and
    /// no matching attribute.
    fn lookup_pattern(&self, qualified_id: &str, attr: Option<&str>) -> Option<&Pattern>;
}

/// Everything the resolver needs besides the AST and the caller's arguments,
/// gathered from the owning `Bundle` for the duration of one `format_pattern` call.
pub struct ResolverEnv<'a> {
    pub locale_chain: &'a [String],
    pub functions: &'a FunctionRegistry,
    pub plural_rules: &'a dyn PluralRuleProvider,
    pub config: &'a EngineConfig,
    pub tracer: &'a dyn EngineTracer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Abort {
    Depth,
    Expansion,
}

struct EvalState<'a> {
    args: &'a IndexMap<String, FluentValue<'static>>,
    depth: usize,
    expansion_bytes: usize,
    visiting: Vec<String>,
    errors: Vec<FluentError>,
}

/// Formats the message `entry_id` (bare, unprefixed — terms are never
/// directly formattable, per §3 invariant iv), optionally a named attribute
/// of it, against `args`. Always returns a string: in non-strict mode it is
/// the best-effort output with fallback markers substituted for whatever
/// went wrong; in strict mode a guard trip discards everything resolved so
/// far for this call.
#[must_use]
pub fn format_pattern(
    lookup: &dyn EntryLookup,
    env: &ResolverEnv<'_>,
    entry_id: &str,
    attr: Option<&str>,
    args: &IndexMap<String, FluentValue<'_>>,
) -> (String, Vec<FluentError>) {
    env.tracer.on_format_start(entry_id);
    let start = std::time::Instant::now();

    let owned_args: IndexMap<String, FluentValue<'static>> =
        args.iter().map(|(k, v)| (k.clone(), v.clone().into_owned())).collect();
    let qualified = format!("msg:{entry_id}");
    let mut state = EvalState { args: &owned_args, depth: 0, expansion_bytes: 0, visiting: Vec::new(), errors: Vec::new() };

    let mut out = String::new();
    let result = match lookup.lookup_pattern(&qualified, attr) {
        Some(pattern) => {
            state.visiting.push(qualified.clone());
            let r = eval_pattern(lookup, env, pattern, &mut state, &mut out);
            state.visiting.pop();
            r
        }
        None => {
            state.errors.push(FluentError::UnknownMessage { id: entry_id.to_string() });
            write_fallback(&mut out, entry_id, attr);
            Ok(())
        }
    };

    if result.is_err() && env.config.strict() {
        out.clear();
    }

    env.tracer.on_format_end(entry_id, start.elapsed(), false);
    (out, state.errors)
}

fn write_fallback(out: &mut String, id: &str, attr: Option<&str>) {
    match attr {
        Some(attr) => {
            let _ = write!(out, "{{{id}.{attr}}}");
        }
        None => {
            let _ = write!(out, "{{{id}}}");
        }
    }
}

fn eval_pattern(
    lookup: &dyn EntryLookup,
    env: &ResolverEnv<'_>,
    pattern: &Pattern,
    state: &mut EvalState<'_>,
    out: &mut String,
) -> Result<(), Abort> {
    for element in &pattern.elements {
        match element {
            PatternElement::Text(text) => append_text(env, state, out, &text.value)?,
            PatternElement::Placeable(placeable) => {
                let value = eval_expression(lookup, env, &placeable.expression, state)?;
                let rendered = value.into_owned_string();
                if env.config.bidi_isolation() && !rendered.is_empty() {
                    append_text(env, state, out, &FSI.to_string())?;
                    append_text(env, state, out, &rendered)?;
                    append_text(env, state, out, &PDI.to_string())?;
                } else {
                    append_text(env, state, out, &rendered)?;
                }
            }
        }
    }
    Ok(())
}

fn append_text(env: &ResolverEnv<'_>, state: &mut EvalState<'_>, out: &mut String, text: &str) -> Result<(), Abort> {
    state.expansion_bytes += text.len();
    if state.expansion_bytes > env.config.max_expansion_bytes() {
        state.errors.push(FluentError::ExpansionBudgetExceeded { limit: env.config.max_expansion_bytes() });
        return Err(Abort::Expansion);
    }
    out.push_str(text);
    Ok(())
}

fn eval_expression(
    lookup: &dyn EntryLookup,
    env: &ResolverEnv<'_>,
    expr: &Expression,
    state: &mut EvalState<'_>,
) -> Result<FluentValue<'static>, Abort> {
    match expr {
        Expression::StringLiteral(s) => Ok(FluentValue::string(s.value.clone())),
        Expression::NumberLiteral(n) => Ok(FluentValue::Decimal(DecimalValue::with_fraction_digits(n.value, n.fraction_digits))),
        Expression::VariableReference { id } => Ok(state.args.get(id.as_str()).cloned().unwrap_or_else(|| {
            state.errors.push(FluentError::UnknownVariable { name: id.as_str().to_string() });
            FluentValue::string(format!("{{${}}}", id.as_str()))
        })),
        Expression::MessageReference { id, attr } => {
            eval_reference(lookup, env, state, "msg", id.as_str(), attr.as_ref().map(crate::ast::Identifier::as_str), None)
        }
        Expression::TermReference { id, attr, args } => {
            let call_args = match args {
                Some(args) => Some(eval_call_arguments(lookup, env, args, state)?),
                None => None,
            };
            eval_reference(lookup, env, state, "term", id.as_str(), attr.as_ref().map(crate::ast::Identifier::as_str), call_args)
        }
        Expression::FunctionReference { id, args } => {
            let (positional, named) = eval_call_arguments(lookup, env, args, state)?;
            match env.functions.call(id.as_str(), locale_of(env), &positional, &named) {
                Ok(value) => Ok(value),
                Err(err) => {
                    let fallback = format!("{{{}()}}", id.as_str());
                    state.errors.push(err);
                    Ok(FluentValue::string(fallback))
                }
            }
        }
        Expression::Select(select) => {
            let selector = eval_expression(lookup, env, &select.selector, state)?;
            let chosen = choose_variant(env, select, &selector);
            let mut buf = String::new();
            eval_pattern(lookup, env, &chosen.value, state, &mut buf)?;
            Ok(FluentValue::string(buf))
        }
    }
}

/// `kind` is `"msg"` or `"term"`; `call_args`, when `Some`, is the term
/// call's own (already-evaluated-in-caller-scope) argument list. Every term
/// reference — with or without explicit call arguments — resolves in a
/// *fresh* scope holding only `call_args`' named arguments (empty if there
/// were none): the caller's `args` are never visible inside a term (§4.4
/// rule 4: term calls are isolated). Message references, by contrast, always
/// share the caller's scope (§4.4 rule 3).
fn eval_reference(
    lookup: &dyn EntryLookup,
    env: &ResolverEnv<'_>,
    state: &mut EvalState<'_>,
    kind: &str,
    id: &str,
    attr: Option<&str>,
    call_args: Option<(Vec<FluentValue<'static>>, IndexMap<String, FluentValue<'static>>)>,
) -> Result<FluentValue<'static>, Abort> {
    let qualified = format!("{kind}:{id}");

    if state.visiting.contains(&qualified) {
        let cycle_key = cycle_key_from(&state.visiting, &qualified);
        state.errors.push(FluentError::CyclicDependency { cycle_key });
        return Ok(FluentValue::string(format!("{{{id}}}")));
    }

    let Some(pattern) = lookup.lookup_pattern(&qualified, attr) else {
        let err = if kind == "term" {
            FluentError::UnknownTerm { id: id.to_string() }
        } else {
            FluentError::UnknownMessage { id: id.to_string() }
        };
        state.errors.push(err);
        return Ok(FluentValue::string(format!("{{{id}}}")));
    };

    state.depth += 1;
    if state.depth > env.config.max_resolution_depth() {
        state.depth -= 1;
        state.errors.push(FluentError::MaxDepthExceeded { limit: env.config.max_resolution_depth() });
        return Err(Abort::Depth);
    }

    state.visiting.push(qualified);

    let result = if kind == "term" {
        // A term call replaces the caller's arg scope wholesale, even when it
        // carries no explicit arguments — the isolated scope is then simply
        // empty, never the caller's. Positional call arguments have no name
        // to bind a `$var` lookup to, so (as in the reference Fluent grammar)
        // only the named ones populate scope.
        let named = call_args.map_or_else(IndexMap::new, |(_positional, named)| named);
        let mut isolated = EvalState { args: &named, depth: state.depth, expansion_bytes: state.expansion_bytes, visiting: state.visiting.clone(), errors: Vec::new() };
        let mut buf = String::new();
        let r = eval_pattern(lookup, env, pattern, &mut isolated, &mut buf);
        state.expansion_bytes = isolated.expansion_bytes;
        state.errors.extend(isolated.errors);
        r.map(|()| buf)
    } else {
        let mut buf = String::new();
        eval_pattern(lookup, env, pattern, state, &mut buf).map(|()| buf)
    };

    state.visiting.pop();
    state.depth -= 1;

    result.map(FluentValue::string)
}

fn cycle_key_from(visiting: &[String], repeated: &str) -> String {
    let start = visiting.iter().position(|v| v == repeated).unwrap_or(0);
    visiting[start..].join("\u{241F}")
}

fn eval_call_arguments(
    lookup: &dyn EntryLookup,
    env: &ResolverEnv<'_>,
    args: &CallArguments,
    state: &mut EvalState<'_>,
) -> Result<(Vec<FluentValue<'static>>, IndexMap<String, FluentValue<'static>>), Abort> {
    let mut positional = Vec::with_capacity(args.positional.len());
    for expr in &args.positional {
        positional.push(eval_expression(lookup, env, expr, state)?);
    }
    let mut named = IndexMap::with_capacity(args.named.len());
    for (id, expr) in &args.named {
        let value = eval_expression(lookup, env, expr, state)?;
        named.insert(id.as_str().to_string(), value);
    }
    Ok((positional, named))
}

fn locale_of(env: &ResolverEnv<'_>) -> &str {
    env.locale_chain.first().map_or("und", String::as_str)
}

fn choose_variant<'s>(
    env: &ResolverEnv<'_>,
    select: &'s crate::ast::SelectExpression,
    selector: &FluentValue<'_>,
) -> &'s crate::ast::Variant {
    if let Some(n) = selector.as_f64() {
        for (i, variant) in select.variants.iter().enumerate() {
            if i == select.default_index {
                continue;
            }
            if let VariantKey::Number(key) = &variant.key {
                if (key.value - n).abs() < f64::EPSILON {
                    return variant;
                }
            }
        }
        let operands = PluralOperands { n, v: selector.v_operand() };
        let category = env.plural_rules.cardinal_category(locale_of(env), operands);
        for (i, variant) in select.variants.iter().enumerate() {
            if i == select.default_index {
                continue;
            }
            if let VariantKey::Identifier(key) = &variant.key {
                if key.as_str().eq_ignore_ascii_case(&category.to_string()) {
                    return variant;
                }
            }
        }
    } else {
        let text = selector.to_string();
        for (i, variant) in select.variants.iter().enumerate() {
            if i == select.default_index {
                continue;
            }
            if let VariantKey::Identifier(key) = &variant.key {
                if key.as_str() == text {
                    return variant;
                }
            }
        }
    }
    select.variants.get(select.default_index).unwrap_or_else(|| {
        select.variants.first().expect("a parsed SelectExpression always has at least one variant")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Resource,
        diagnostics::NoopTracer,
        external::OtherOnlyPluralRules,
        parser::parse,
    };

    struct TestBundle {
        resource: Resource,
    }

    impl EntryLookup for TestBundle {
        fn lookup_pattern(&self, qualified_id: &str, attr: Option<&str>) -> Option<&Pattern> {
            for entry in &self.resource.entries {
                match entry {
                    crate::ast::Entry::Message(m) if format!("msg:{}", m.id.as_str()) == qualified_id => {
                        return match attr {
                            Some(a) => m.attributes.iter().find(|x| x.id.as_str() == a).map(|x| &x.value),
                            None => m.value.as_ref(),
                        };
                    }
                    crate::ast::Entry::Term(t) if format!("term:{}", t.id.as_str()) == qualified_id => {
                        return match attr {
                            Some(a) => t.attributes.iter().find(|x| x.id.as_str() == a).map(|x| &x.value),
                            None => Some(&t.value),
                        };
                    }
                    _ => {}
                }
            }
            None
        }
    }

    fn env<'a>(config: &'a EngineConfig, functions: &'a FunctionRegistry, plural: &'a OtherOnlyPluralRules, locales: &'a [String], tracer: &'a NoopTracer) -> ResolverEnv<'a> {
        ResolverEnv { locale_chain: locales, functions, plural_rules: plural, config, tracer }
    }

    #[test]
    fn variable_reference_substitutes() {
        let (resource, _) = parse("greet = Hello { $name }\n");
        let bundle = TestBundle { resource };
        let config = EngineConfig::default();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let mut args = IndexMap::new();
        args.insert("name".to_string(), FluentValue::from("World"));
        let (text, errors) = format_pattern(&bundle, &e, "greet", None, &args);
        assert_eq!(text, "Hello \u{2068}World\u{2069}");
        assert!(errors.is_empty());
    }

    #[test]
    fn unknown_message_produces_fallback_and_error() {
        let (resource, _) = parse("a = 1\n");
        let bundle = TestBundle { resource };
        let config = EngineConfig::default();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let (text, errors) = format_pattern(&bundle, &e, "missing", None, &IndexMap::new());
        assert_eq!(text, "{missing}");
        assert!(matches!(errors[0], FluentError::UnknownMessage { .. }));
    }

    #[test]
    fn term_reference_is_isolated_from_caller_args() {
        let (resource, _) = parse("-greet = Hi { $name }\nhello = { -greet(name: \"Ada\") } and also { $name }\n");
        let bundle = TestBundle { resource };
        let config = EngineConfig::default();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let mut args = IndexMap::new();
        args.insert("name".to_string(), FluentValue::from("Bob"));
        let (text, _) = format_pattern(&bundle, &e, "hello", None, &args);
        assert!(text.contains("Hi \u{2068}Ada\u{2069}"));
        assert!(text.contains("also \u{2068}Bob\u{2069}"));
    }

    #[test]
    fn no_args_term_reference_does_not_see_caller_scope() {
        let (resource, _) = parse("-t = {$name}\nfoo = { -t }\n");
        let bundle = TestBundle { resource };
        let config = EngineConfig::default();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let mut args = IndexMap::new();
        args.insert("name".to_string(), FluentValue::from("X"));
        let (text, errors) = format_pattern(&bundle, &e, "foo", None, &args);
        assert!(text.contains("{$name}"), "expected an unresolved $name fallback, got {text:?}");
        assert!(!text.contains('X'), "caller's $name=\"X\" must not be visible inside the term, got {text:?}");
        assert!(errors.iter().any(|e| matches!(e, FluentError::UnknownVariable { name } if name == "name")));
    }

    #[test]
    fn cyclic_reference_falls_back_with_error() {
        let (resource, _) = parse("a = { b }\nb = { a }\n");
        let bundle = TestBundle { resource };
        let config = EngineConfig::default();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let (text, errors) = format_pattern(&bundle, &e, "a", None, &IndexMap::new());
        assert!(text.contains('a') || text.contains('b'));
        assert!(errors.iter().any(|e| matches!(e, FluentError::CyclicDependency { .. })));
    }

    #[test]
    fn select_falls_through_to_default_variant() {
        let source = "brand-description = { $platform ->\n    [web] Visit { -brand-name } Online\n    *[other] Desktop { -brand-name }\n}\n-brand-name = Fluent\n";
        let (resource, _) = parse(source);
        let bundle = TestBundle { resource };
        let config = EngineConfig::default();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let mut args = IndexMap::new();
        args.insert("platform".to_string(), FluentValue::from("linux"));
        let (text, errors) = format_pattern(&bundle, &e, "brand-description", None, &args);
        assert!(text.contains("Desktop"));
        assert!(text.contains("Fluent"));
        assert!(errors.is_empty());
    }

    #[test]
    fn expansion_budget_truncates_billion_laughs() {
        let mut source = String::from("l0 = x\n");
        for n in 1..=20 {
            source.push_str(&format!("l{n} = {{ l{} }}{{ l{} }}\n", n - 1, n - 1));
        }
        let (resource, _) = parse(&source);
        let bundle = TestBundle { resource };
        let config = EngineConfig::builder().max_expansion_bytes(1024).build();
        let functions = FunctionRegistry::default();
        let plural = OtherOnlyPluralRules;
        let locales = vec!["en".to_string()];
        let tracer = NoopTracer;
        let e = env(&config, &functions, &plural, &locales, &tracer);
        let (text, errors) = format_pattern(&bundle, &e, "l20", None, &IndexMap::new());
        assert!(text.len() < 4096, "expansion guard should keep output small, got {} bytes", text.len());
        assert!(errors.iter().any(|e| matches!(e, FluentError::ExpansionBudgetExceeded { .. })));
    }
}
