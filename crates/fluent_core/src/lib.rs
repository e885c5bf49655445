#![doc = include_str!("../../../README.md")]
#![expect(clippy::module_name_repetitions, reason = "Cache/Error/Config names mirror their module")]

mod ast;
mod bundle;
mod cache;
mod config;
mod diagnostics;
mod error;
mod external;
mod fingerprint;
mod functions;
mod graph;
mod lexer;
mod parser;
mod resolver;
mod rwlock;
mod serializer;
mod validation;
mod value;

pub use crate::{
    ast::{
        Attribute, CallArguments, Comment, CommentLevel, Entry, Expression, Identifier, Junk, Message,
        NumberLiteral, Pattern, PatternElement, Placeable, Resource, SelectExpression, StringLiteral, Term,
        TextElement, Variant, VariantKey,
    },
    bundle::Bundle,
    cache::{CacheOutcome, IntegrityCache},
    config::{EngineConfig, EngineConfigBuilder},
    diagnostics::{DiagnosticsReport, DiagnosticsTracer, EngineTracer, NoopTracer, WallTimePercentiles},
    error::{ConcurrencyError, FluentError, ParseError, ParseErrorKind, Span, ValidationError, IntegrityError},
    external::{
        FormatKind, FormatOptions, IsoDataProvider, NumericStringParser, OtherOnlyPluralRules, PluralCategory,
        PluralOperands, PluralRuleProvider, PassthroughFormatter, StdNumericStringParser, ValueFormatter,
    },
    fingerprint::{fingerprint, CacheKey},
    functions::{FluentFunction, FunctionRegistry},
    graph::{build_dependency_graph, collect_referenced_ids, DependencyGraph},
    parser::{parse, parse_with_limits, ParserLimits},
    resolver::{format_pattern, EntryLookup, ResolverEnv},
    serializer::{serialize, serialize_entry},
    validation::{validate_resource, ValidationContext},
    value::{CustomValueId, DecimalValue, FluentValue},
};
