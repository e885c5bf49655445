//! `FluentValue`: the dynamic argument/result type threaded through the resolver.
//!
//! Mirrors the shape of a runtime value in a tagged-union style rather than a
//! trait object: small scalars are stored inline, and `Custom` is an opaque
//! handle the core never inspects — it only moves it between the caller's
//! argument map and caller-registered functions.

use std::{borrow::Cow, fmt};

use chrono::NaiveDateTime;

/// Declared fraction-digit count for a number (the CLDR v-operand, §4.4).
///
/// This is a *formatting declaration*, not an intrinsic property of the
/// number: `1.50` and `1.5` are the same value but declare `v=2` and `v=1`
/// respectively, and plural-category selection is sensitive to that.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct DecimalValue {
    pub value: f64,
    /// `None` means "infer from the literal's textual representation."
    pub fraction_digits: Option<u8>,
}

impl DecimalValue {
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self { value, fraction_digits: None }
    }

    #[must_use]
    pub fn with_fraction_digits(value: f64, fraction_digits: u8) -> Self {
        Self { value, fraction_digits: Some(fraction_digits) }
    }

    /// The v-operand used for CLDR plural rule matching.
    #[must_use]
    pub fn v_operand(&self) -> u8 {
        if let Some(v) = self.fraction_digits {
            return v;
        }
        // Infer from the shortest round-tripping decimal representation.
        let mut buf = ryu::Buffer::new();
        let printed = buf.format(self.value);
        match printed.split_once('.') {
            Some((_, frac)) => frac.trim_end_matches('0').len().min(u8::MAX as usize) as u8,
            None => 0,
        }
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fraction_digits {
            Some(digits) => write!(f, "{:.*}", digits as usize, self.value),
            None => {
                let mut buf = ryu::Buffer::new();
                write!(f, "{}", buf.format(self.value))
            }
        }
    }
}

/// Opaque handle for caller-owned values the core does not interpret.
///
/// This is the seam through which richer host objects (territory records,
/// currency metadata, user structs) flow through argument maps without this
/// crate depending on the crates that define them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CustomValueId(pub u64);

/// The dynamic value type for variables, function arguments, and function
/// return values.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum FluentValue<'v> {
    None,
    Bool(bool),
    Int(i64),
    Decimal(DecimalValue),
    String(Cow<'v, str>),
    DateTime(NaiveDateTime),
    Custom(CustomValueId),
}

impl<'v> FluentValue<'v> {
    #[must_use]
    pub fn string(s: impl Into<Cow<'v, str>>) -> Self {
        Self::String(s.into())
    }

    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Decimal(DecimalValue::new(value))
    }

    /// True for the variants eligible for CLDR plural-category matching.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Decimal(_))
    }

    /// Numeric magnitude used for plural rule selection, if this value is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Decimal(d) => Some(d.value),
            _ => None,
        }
    }

    /// The v-operand (declared fraction digit count) used by plural rule selection.
    #[must_use]
    pub fn v_operand(&self) -> u8 {
        match self {
            Self::Decimal(d) => d.v_operand(),
            _ => 0,
        }
    }

    /// Converts this value into its display form, the way an un-annotated
    /// placeable substitutes it into a pattern (before any `NUMBER`/`DATETIME`
    /// function call has been applied).
    #[must_use]
    pub fn into_owned_string(self) -> String {
        match self {
            Self::None => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::String(s) => s.into_owned(),
            Self::DateTime(dt) => dt.format("%+").to_string(),
            Self::Custom(id) => format!("{{custom:{}}}", id.0),
        }
    }

    #[must_use]
    pub fn into_owned(self) -> FluentValue<'static> {
        match self {
            Self::None => FluentValue::None,
            Self::Bool(b) => FluentValue::Bool(b),
            Self::Int(i) => FluentValue::Int(i),
            Self::Decimal(d) => FluentValue::Decimal(d),
            Self::String(s) => FluentValue::String(Cow::Owned(s.into_owned())),
            Self::DateTime(dt) => FluentValue::DateTime(dt),
            Self::Custom(id) => FluentValue::Custom(id),
        }
    }
}

impl fmt::Display for FluentValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%+")),
            Self::Custom(id) => write!(f, "{{custom:{}}}", id.0),
        }
    }
}

impl<'v> From<&'v str> for FluentValue<'v> {
    fn from(s: &'v str) -> Self {
        Self::String(Cow::Borrowed(s))
    }
}

impl From<String> for FluentValue<'static> {
    fn from(s: String) -> Self {
        Self::String(Cow::Owned(s))
    }
}

impl From<i64> for FluentValue<'_> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FluentValue<'_> {
    fn from(f: f64) -> Self {
        Self::number(f)
    }
}

impl From<bool> for FluentValue<'_> {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
