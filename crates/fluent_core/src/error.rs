//! Error taxonomy for every fallible surface in this crate.
//!
//! Every error type here is owned, `Clone`, and carries no reference back into
//! a live parser/resolver frame — once an error is returned it can outlive the
//! call that produced it. None of these types use `thiserror`; `Display` and
//! `std::error::Error` are implemented by hand, matching the rest of the
//! taxonomy's manual style.

use std::fmt;

/// A byte range into the (CRLF-normalized) source buffer an entry was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.try_into().unwrap_or(u32::MAX),
            end: end.try_into().unwrap_or(u32::MAX),
        }
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Syntax-level parse error kinds (§7, *Syntax*).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ParseErrorKind {
    UnexpectedToken { found: String, expected: &'static str },
    UnclosedBrace,
    UnclosedStringLiteral,
    InvalidEscape { text: String },
    InvalidUnicodeScalar { code_point: u32 },
    MissingDefaultVariant,
    ExpectedIdentifier,
    ExpectedValue,
    EmptyPattern,
    /// A configured DoS bound (depth, entry count, or pattern byte length) was exceeded.
    LimitExceeded { limit_name: &'static str, limit: usize },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken { found, expected } => {
                write!(f, "unexpected token {found:?}, expected {expected}")
            }
            Self::UnclosedBrace => write!(f, "unclosed brace"),
            Self::UnclosedStringLiteral => write!(f, "unclosed string literal"),
            Self::InvalidEscape { text } => write!(f, "invalid escape sequence: {text}"),
            Self::InvalidUnicodeScalar { code_point } => {
                write!(f, "invalid unicode scalar value: U+{code_point:06X}")
            }
            Self::MissingDefaultVariant => write!(f, "select expression has no default variant"),
            Self::ExpectedIdentifier => write!(f, "expected an identifier"),
            Self::ExpectedValue => write!(f, "expected a value"),
            Self::EmptyPattern => write!(f, "pattern must not be empty"),
            Self::LimitExceeded { limit_name, limit } => {
                write!(f, "limit exceeded: {limit_name} > {limit}")
            }
        }
    }
}

/// A single parse error, scoped to a span of the source buffer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.kind, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

/// Cross-entry semantic errors produced by `validate_resource` (§7, *Validation*).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ValidationError {
    DuplicateId { id: String, first: Span, duplicate: Span },
    UndefinedReference { referrer: String, target: String },
    CyclicDependency { cycle_key: String },
    InvalidIdentifier { text: String, span: Span },
    EmptyPlaceable { span: Span },
    MissingDefaultVariant { entry: String, span: Span },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id, .. } => write!(f, "duplicate entry id: {id}"),
            Self::UndefinedReference { referrer, target } => {
                write!(f, "{referrer} references undefined entry {target}")
            }
            Self::CyclicDependency { cycle_key } => write!(f, "cyclic dependency: {cycle_key}"),
            Self::InvalidIdentifier { text, .. } => write!(f, "invalid identifier: {text}"),
            Self::EmptyPlaceable { .. } => write!(f, "empty placeable"),
            Self::MissingDefaultVariant { entry, .. } => {
                write!(f, "{entry} has a select expression with no default variant")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Resolution-time errors (§7, *Resolution*). These are collected, not thrown;
/// `format_pattern` always returns a formatted string alongside a `Vec` of these.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FluentError {
    UnknownMessage { id: String },
    UnknownTerm { id: String },
    UnknownVariable { name: String },
    UnknownFunction { name: String },
    FunctionError { name: String, message: String },
    MaxDepthExceeded { limit: usize },
    ExpansionBudgetExceeded { limit: usize },
    CyclicDependency { cycle_key: String },
    /// A select expression's numeric selector could not be reconciled with any
    /// variant key and the entry had no default variant (should not happen for
    /// a validated resource, but the resolver never trusts validation ran).
    NoMatchingVariant { entry: String },
}

impl fmt::Display for FluentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessage { id } => write!(f, "unknown message: {id}"),
            Self::UnknownTerm { id } => write!(f, "unknown term: {id}"),
            Self::UnknownVariable { name } => write!(f, "unknown variable: ${name}"),
            Self::UnknownFunction { name } => write!(f, "unknown function: {name}"),
            Self::FunctionError { name, message } => write!(f, "{name}() failed: {message}"),
            Self::MaxDepthExceeded { limit } => {
                write!(f, "maximum resolution depth exceeded: {limit}")
            }
            Self::ExpansionBudgetExceeded { limit } => {
                write!(f, "expansion budget exceeded: {limit} bytes")
            }
            Self::CyclicDependency { cycle_key } => write!(f, "cyclic dependency: {cycle_key}"),
            Self::NoMatchingVariant { entry } => {
                write!(f, "{entry}: no variant matched and no default was present")
            }
        }
    }
}

impl std::error::Error for FluentError {}

/// Integrity-cache errors (§7, *Integrity*). These always surface to the
/// caller; a result is never silently cached when one of these is produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum IntegrityError {
    /// Two concurrent computations for the same key produced byte-unequal results.
    CacheCorruption { key_summary: String },
    /// A write lost a race it should have won under the write-once contract.
    WriteConflict { key_summary: String },
    /// A supposedly-immutable `Resource` or `Bundle` component was observed to change.
    ImmutabilityViolation { detail: String },
    /// The eviction or admission bookkeeping became internally inconsistent.
    FormattingIntegrity { detail: String },
    /// Argument canonicalization exceeded `hash_node_budget`; caching was bypassed
    /// for this call (not a hard failure, but surfaced so callers can observe it).
    UnhashableArgs { node_budget: usize },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheCorruption { key_summary } => {
                write!(f, "cache corruption detected for {key_summary}")
            }
            Self::WriteConflict { key_summary } => {
                write!(f, "write-once conflict for {key_summary}")
            }
            Self::ImmutabilityViolation { detail } => write!(f, "immutability violation: {detail}"),
            Self::FormattingIntegrity { detail } => write!(f, "cache integrity violation: {detail}"),
            Self::UnhashableArgs { node_budget } => {
                write!(f, "argument structure exceeded hash node budget of {node_budget}; not cached")
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Concurrency errors from the `RwLock` (§7, *Concurrency*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyError {
    /// A reader attempted to upgrade to a writer; always rejected, even for a
    /// lone reentrant reader.
    UpgradeRejected,
    /// `try_acquire` did not obtain the lock before its deadline.
    Timeout,
}

impl fmt::Display for ConcurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpgradeRejected => write!(f, "read-to-write lock upgrade is forbidden"),
            Self::Timeout => write!(f, "timed lock acquisition expired"),
        }
    }
}

impl std::error::Error for ConcurrencyError {}
