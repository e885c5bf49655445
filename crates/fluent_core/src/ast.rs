//! The Fluent AST.
//!
//! Every type here is immutable once a `Resource` has been returned from
//! [`crate::parser::parse`] (§3, invariant iii): there is no mutation API on
//! any of these types, only construction during parsing and read access
//! during validation/resolution/serialization.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{ParseError, Span};

/// An ASCII identifier matching `[A-Za-z][A-Za-z0-9_-]*`.
///
/// Term identifiers carry the leading `-` that distinguishes them in source;
/// callers comparing identifiers across message/term namespaces should use
/// [`Identifier::is_term`] rather than inspecting the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Identifier(pub String);

impl Identifier {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_term(&self) -> bool {
        self.0.starts_with('-')
    }

    /// Returns true if `text` is a syntactically valid Fluent identifier body
    /// (not counting a leading `-` term marker, which is stripped by the caller).
    #[must_use]
    pub fn is_valid_body(text: &str) -> bool {
        let mut chars = text.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

/// One of `#`, `##`, `###` — message, group, or resource level comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CommentLevel {
    Message = 1,
    Group = 2,
    Resource = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Comment {
    pub level: CommentLevel,
    /// Joined comment-line text, `\n`-separated, `#` markers and exactly one
    /// leading space already stripped.
    pub text: String,
}

/// A single literal run of text within a pattern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextElement {
    pub value: String,
}

/// A `{ expression }` embedded in a pattern.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Placeable {
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PatternElement {
    Text(TextElement),
    Placeable(Placeable),
}

/// A non-empty ordered sequence of pattern elements. Whitespace is normalized
/// per Fluent 1.0 at parse time: common leading indent is stripped, and a
/// single trailing newline is folded away.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pattern {
    pub elements: Vec<PatternElement>,
}

impl Pattern {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self { elements: vec![PatternElement::Text(TextElement { value: value.into() })] }
    }
}

/// Named or positional call arguments. Named keys are unique per call
/// (enforced at parse time); both the positional list and the named map
/// preserve source order.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct CallArguments {
    pub positional: Vec<Expression>,
    pub named: IndexMap<Identifier, Expression>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VariantKey {
    Identifier(Identifier),
    Number(NumberLiteral),
}

impl VariantKey {
    #[must_use]
    pub fn as_key_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Identifier(id) => std::borrow::Cow::Borrowed(id.as_str()),
            Self::Number(n) => std::borrow::Cow::Owned(n.raw.clone()),
        }
    }
}

/// `{ [key] pattern }` or the default `{ *[key] pattern }` arm of a select.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Variant {
    pub key: VariantKey,
    pub value: Pattern,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NumberLiteral {
    pub raw: String,
    pub value: f64,
    pub fraction_digits: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StringLiteral {
    /// Already unescaped.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SelectExpression {
    pub selector: Box<Expression>,
    pub variants: SmallVec<[Variant; 4]>,
    /// Index into `variants` of the (exactly one) default arm. A `Resource`
    /// returned from `parse` always has this populated: the parser refuses to
    /// build a `SelectExpression` node without exactly one default, emitting
    /// `MissingDefaultVariant` and Junk instead (§3, invariant i).
    pub default_index: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expression {
    StringLiteral(StringLiteral),
    NumberLiteral(NumberLiteral),
    VariableReference { id: Identifier },
    MessageReference { id: Identifier, attr: Option<Identifier> },
    TermReference { id: Identifier, attr: Option<Identifier>, args: Option<CallArguments> },
    FunctionReference { id: Identifier, args: CallArguments },
    Select(SelectExpression),
}

/// `attr = pattern` under a `Message`/`Term`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
    pub id: Identifier,
    pub value: Pattern,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: Identifier,
    pub value: Option<Pattern>,
    pub attributes: Vec<Attribute>,
    pub comment: Option<Comment>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Term {
    pub id: Identifier,
    pub value: Pattern,
    pub attributes: Vec<Attribute>,
    pub comment: Option<Comment>,
    pub span: Span,
}

/// A source span the parser could not parse, with the diagnostics collected
/// while trying. Junk preserves the raw text so the serializer can reproduce
/// it verbatim (§3, invariant ii; §4.2).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Junk {
    pub span: Span,
    pub raw: String,
    pub annotations: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Entry {
    Message(Message),
    Term(Term),
    Comment(Comment),
    Junk(Junk),
}

impl Entry {
    /// The fully-qualified node id used in the dependency graph (§4.3):
    /// `msg:foo` or `term:-bar`. Standalone comments and Junk contribute no node.
    #[must_use]
    pub fn qualified_id(&self) -> Option<String> {
        match self {
            Self::Message(m) => Some(format!("msg:{}", m.id.as_str())),
            Self::Term(t) => Some(format!("term:{}", t.id.as_str())),
            Self::Comment(_) | Self::Junk(_) => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&Identifier> {
        match self {
            Self::Message(m) => Some(&m.id),
            Self::Term(t) => Some(&t.id),
            Self::Comment(_) | Self::Junk(_) => None,
        }
    }
}

/// An ordered sequence of entries produced by one [`crate::parser::parse`]
/// invocation. Immutable once returned (§3, invariant iii).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Resource {
    pub entries: Vec<Entry>,
}

impl Resource {
    #[must_use]
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Message(m) => Some(m),
            _ => None,
        })
    }

    #[must_use]
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Term(t) => Some(t),
            _ => None,
        })
    }

    #[must_use]
    pub fn junk(&self) -> impl Iterator<Item = &Junk> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Junk(j) => Some(j),
            _ => None,
        })
    }
}
