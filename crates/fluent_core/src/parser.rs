//! The recoverable FTL parser (§4.1).
//!
//! `parse` never fails outright: every entry that cannot be parsed becomes a
//! [`Junk`] node carrying the raw span and the diagnostics collected while
//! trying, and parsing resumes at the next entry boundary. DoS bounds (§4.1,
//! §6) are enforced per-entry so one oversized or maliciously deep entry
//! cannot blow the stack or consume unbounded memory; it simply becomes Junk
//! with a `LimitExceeded` annotation and the parser moves on.

use std::collections::HashSet;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    ast::{
        Attribute, CallArguments, Comment, CommentLevel, Entry, Expression, Identifier, Junk, Message,
        NumberLiteral, Pattern, PatternElement, Resource, SelectExpression, StringLiteral, TextElement, Term,
        Variant, VariantKey,
    },
    error::{ParseError, ParseErrorKind, Span},
    lexer::{normalize_line_endings, Cursor},
};

/// DoS bounds enforced while parsing a single entry (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_placeable_depth: usize,
    pub max_entries_per_resource: usize,
    pub max_pattern_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_placeable_depth: 100,
            max_entries_per_resource: 100_000,
            max_pattern_bytes: 1024 * 1024,
        }
    }
}

/// Parses `source` with the default [`ParserLimits`].
#[must_use]
pub fn parse(source: &str) -> (Resource, Vec<ParseError>) {
    parse_with_limits(source, ParserLimits::default())
}

/// Parses `source`, normalizing CRLF/CR line endings first (§6), under `limits`.
#[must_use]
pub fn parse_with_limits(source: &str, limits: ParserLimits) -> (Resource, Vec<ParseError>) {
    let normalized = normalize_line_endings(source);
    let mut parser = Parser { cursor: Cursor::new(&normalized), limits, resource_errors: Vec::new() };
    let resource = parser.parse_resource();
    (resource, parser.resource_errors)
}

type EntryResult<T> = Result<T, Vec<ParseError>>;

struct Parser<'a> {
    cursor: Cursor<'a>,
    limits: ParserLimits,
    /// Errors attached to the *resource* as a whole rather than to one entry
    /// (currently just `max_entries_per_resource`).
    resource_errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn parse_resource(&mut self) -> Resource {
        let mut entries = Vec::new();
        loop {
            self.cursor.skip_blank_block();
            if self.cursor.is_eof() {
                break;
            }
            if entries.len() >= self.limits.max_entries_per_resource {
                let start = self.cursor.pos();
                self.resource_errors.push(ParseError::new(
                    ParseErrorKind::LimitExceeded {
                        limit_name: "max_entries_per_resource",
                        limit: self.limits.max_entries_per_resource,
                    },
                    Span::new(start, self.cursor.source().len()),
                ));
                break;
            }
            entries.push(self.parse_entry());
        }
        Resource { entries }
    }

    fn parse_entry(&mut self) -> Entry {
        let start = self.cursor.pos();
        if self.cursor.peek() == Some('#') {
            let comment = self.parse_comment_block();
            let attaches = comment.level == CommentLevel::Message
                && matches!(self.cursor.peek(), Some(c) if c == '-' || c.is_ascii_alphabetic());
            if !attaches {
                return Entry::Comment(comment);
            }
            return self.parse_message_or_term(Some(comment), start);
        }
        self.parse_message_or_term(None, start)
    }

    fn parse_message_or_term(&mut self, comment: Option<Comment>, start: usize) -> Entry {
        let is_term = self.cursor.peek() == Some('-');
        let result = if is_term {
            self.parse_term_body(comment, start).map(Entry::Term)
        } else {
            self.parse_message_body(comment, start).map(Entry::Message)
        };
        match result {
            Ok(entry) => entry,
            Err(annotations) => {
                self.cursor.recover_to_next_entry();
                let raw = self.cursor.slice_from(start).to_string();
                Entry::Junk(Junk { span: Span::new(start, self.cursor.pos()), raw, annotations })
            }
        }
    }

    fn parse_comment_block(&mut self) -> Comment {
        let marker_len = self.count_hashes();
        let level = match marker_len {
            1 => CommentLevel::Message,
            2 => CommentLevel::Group,
            _ => CommentLevel::Resource,
        };
        let mut lines = Vec::new();
        loop {
            self.cursor.eat_str(&"#".repeat(marker_len));
            self.cursor.eat_char(' ');
            let line_start = self.cursor.pos();
            while !matches!(self.cursor.peek(), Some('\n') | None) {
                self.cursor.advance();
            }
            lines.push(self.cursor.slice_from(line_start).to_string());
            if !self.cursor.eat_char('\n') {
                break;
            }
            if self.peek_hashes() != marker_len {
                break;
            }
        }
        Comment { level, text: lines.join("\n") }
    }

    fn count_hashes(&self) -> usize {
        self.peek_hashes()
    }

    /// Number of leading `#` at the cursor (capped at 3), only counted as a
    /// comment marker if immediately followed by a space, newline, or EOF.
    fn peek_hashes(&self) -> usize {
        let mut n = 0;
        while n < 3 && self.cursor.peek_at(n) == Some('#') {
            n += 1;
        }
        if n == 0 {
            return 0;
        }
        match self.cursor.peek_at(n) {
            None | Some(' ' | '\n') => n,
            _ => 0,
        }
    }

    fn parse_message_body(&mut self, comment: Option<Comment>, start: usize) -> EntryResult<Message> {
        let id = self.parse_plain_identifier()?;
        self.cursor.skip_blank_inline();
        self.expect_char('=')?;
        self.cursor.skip_blank_inline();
        let pattern_start = self.cursor.pos();
        let value = self.parse_pattern(0, false, 0)?;
        self.check_pattern_bytes(pattern_start)?;
        let attributes = self.parse_attributes()?;
        if value.is_none() && attributes.is_empty() {
            return Err(vec![ParseError::new(ParseErrorKind::ExpectedValue, Span::new(start, self.cursor.pos()))]);
        }
        Ok(Message { id, value, attributes, comment, span: Span::new(start, self.cursor.pos()) })
    }

    fn parse_term_body(&mut self, comment: Option<Comment>, start: usize) -> EntryResult<Term> {
        let id = self.parse_term_identifier()?;
        self.cursor.skip_blank_inline();
        self.expect_char('=')?;
        self.cursor.skip_blank_inline();
        let pattern_start = self.cursor.pos();
        let value = self
            .parse_pattern(0, false, 0)?
            .ok_or_else(|| vec![ParseError::new(ParseErrorKind::ExpectedValue, Span::new(start, self.cursor.pos()))])?;
        self.check_pattern_bytes(pattern_start)?;
        let attributes = self.parse_attributes()?;
        Ok(Term { id, value, attributes, comment, span: Span::new(start, self.cursor.pos()) })
    }

    fn check_pattern_bytes(&self, pattern_start: usize) -> EntryResult<()> {
        let len = self.cursor.pos() - pattern_start;
        if len > self.limits.max_pattern_bytes {
            return Err(vec![ParseError::new(
                ParseErrorKind::LimitExceeded { limit_name: "max_pattern_bytes", limit: self.limits.max_pattern_bytes },
                Span::new(pattern_start, self.cursor.pos()),
            )]);
        }
        Ok(())
    }

    fn parse_attributes(&mut self) -> EntryResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        loop {
            let snapshot = self.cursor;
            self.cursor.skip_blank_block();
            let indent = self.cursor.skip_blank_inline();
            if indent == 0 || self.cursor.peek() != Some('.') {
                self.cursor = snapshot;
                break;
            }
            self.cursor.advance(); // '.'
            let id = self.parse_plain_identifier()?;
            self.cursor.skip_blank_inline();
            self.expect_char('=')?;
            self.cursor.skip_blank_inline();
            let pattern_start = self.cursor.pos();
            let value = self.parse_pattern(indent, false, 0)?.ok_or_else(|| {
                vec![ParseError::new(ParseErrorKind::ExpectedValue, Span::new(pattern_start, self.cursor.pos()))]
            })?;
            self.check_pattern_bytes(pattern_start)?;
            attributes.push(Attribute { id, value });
        }
        Ok(attributes)
    }

    fn parse_plain_identifier(&mut self) -> EntryResult<Identifier> {
        let start = self.cursor.pos();
        self.consume_identifier_body()?;
        Ok(Identifier(self.cursor.slice_from(start).to_string()))
    }

    fn parse_term_identifier(&mut self) -> EntryResult<Identifier> {
        let start = self.cursor.pos();
        self.expect_char('-')?;
        self.consume_identifier_body()?;
        Ok(Identifier(self.cursor.slice_from(start).to_string()))
    }

    fn consume_identifier_body(&mut self) -> EntryResult<()> {
        match self.cursor.peek() {
            Some(c) if c.is_ascii_alphabetic() => {
                self.cursor.advance();
            }
            _ => return Err(vec![ParseError::new(ParseErrorKind::ExpectedIdentifier, self.here())]),
        }
        while matches!(self.cursor.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            self.cursor.advance();
        }
        Ok(())
    }

    fn expect_char(&mut self, c: char) -> EntryResult<()> {
        if self.cursor.eat_char(c) {
            Ok(())
        } else {
            Err(vec![ParseError::new(
                ParseErrorKind::UnexpectedToken {
                    found: self.cursor.peek().map_or_else(|| "EOF".to_string(), |c| c.to_string()),
                    expected: match c {
                        '=' => "'='",
                        ')' => "')'",
                        '}' => "'}'",
                        '-' => "'-'",
                        _ => "a character",
                    },
                },
                self.here(),
            )])
        }
    }

    fn here(&self) -> Span {
        Span::new(self.cursor.pos(), self.cursor.pos())
    }

    // ---------------------------------------------------------------
    // Pattern parsing
    // ---------------------------------------------------------------

    /// Parses a pattern whose first line starts at the current cursor
    /// position (right after `=`/`[key]`) and whose continuation lines must
    /// be indented strictly more than `base_col`. When `stop_at_close_brace`
    /// is set (select-variant patterns), a top-level `}` also ends the
    /// pattern without being consumed — this is what makes single-line
    /// `{ $x -> [a] A *[b] B }` selects parse correctly.
    fn parse_pattern(&mut self, base_col: usize, stop_at_close_brace: bool, depth: usize) -> EntryResult<Option<Pattern>> {
        let common_indent = self.measure_common_indent(base_col, stop_at_close_brace);

        let mut elements: Vec<PatternElement> = Vec::new();
        let mut any_emitted = false;
        let mut blank_run = 0usize;

        let first_is_blank = self.line_is_blank_ahead(stop_at_close_brace);
        if first_is_blank {
            self.cursor.skip_blank_inline();
        } else {
            self.parse_line_into(&mut elements, depth, stop_at_close_brace)?;
            any_emitted = true;
        }
        let mut continuing = self.cursor.eat_char('\n');

        while continuing {
            let line_start_snapshot = self.cursor;
            let indent_len = self.cursor.skip_blank_inline();
            if indent_len <= base_col {
                self.cursor = line_start_snapshot;
                break;
            }
            if stop_at_close_brace && self.cursor.peek() == Some('}') {
                self.cursor = line_start_snapshot;
                break;
            }
            if matches!(self.cursor.peek(), Some('\n') | None) {
                blank_run += 1;
                continuing = self.cursor.eat_char('\n');
                if !continuing {
                    break;
                }
                continue;
            }
            if any_emitted {
                elements.push(PatternElement::Text(TextElement { value: "\n".repeat(1 + blank_run) }));
            }
            blank_run = 0;
            let extra_indent = indent_len.saturating_sub(common_indent);
            if extra_indent > 0 {
                elements.push(PatternElement::Text(TextElement { value: " ".repeat(extra_indent) }));
            }
            self.parse_line_into(&mut elements, depth, stop_at_close_brace)?;
            any_emitted = true;
            continuing = self.cursor.eat_char('\n');
        }

        if !any_emitted {
            return Ok(None);
        }
        Ok(Some(Pattern { elements: merge_adjacent_text(elements) }))
    }

    /// True if, from the current position, the rest of the line (up to a
    /// top-level `}` when `stop_at_close_brace`) contains only blank-inline
    /// characters.
    fn line_is_blank_ahead(&self, stop_at_close_brace: bool) -> bool {
        let mut c = self.cursor;
        loop {
            match c.peek() {
                Some(' ' | '\t') => {
                    c.advance();
                }
                Some('\n') | None => return true,
                Some('}') if stop_at_close_brace => return true,
                Some(_) => return false,
            }
        }
    }

    /// Scans ahead (without mutating `self.cursor`) over every continuation
    /// line belonging to this pattern to compute the minimum indentation
    /// among non-blank lines, tracking placeable brace depth and string
    /// literal state so embedded multi-line constructs don't get mistaken
    /// for pattern continuation lines.
    fn measure_common_indent(&self, base_col: usize, stop_at_close_brace: bool) -> usize {
        let mut c = self.cursor;
        skip_raw_line(&mut c, stop_at_close_brace);
        let mut min_indent: Option<usize> = None;
        while c.eat_char('\n') {
            let mut probe = c;
            let mut indent = 0usize;
            while matches!(probe.peek(), Some(' ' | '\t')) {
                probe.advance();
                indent += 1;
            }
            if indent <= base_col {
                break;
            }
            if stop_at_close_brace && probe.peek() == Some('}') {
                break;
            }
            if matches!(probe.peek(), Some('\n') | None) {
                c = probe;
                continue;
            }
            min_indent = Some(min_indent.map_or(indent, |m: usize| m.min(indent)));
            c = probe;
            skip_raw_line(&mut c, stop_at_close_brace);
        }
        min_indent.unwrap_or(0)
    }

    /// Parses the remainder of the current line (text interleaved with
    /// placeables) into `elements`, stopping before a top-level `\n`, a
    /// top-level `}` (if `stop_at_close_brace`), or EOF.
    fn parse_line_into(
        &mut self,
        elements: &mut Vec<PatternElement>,
        depth: usize,
        stop_at_close_brace: bool,
    ) -> EntryResult<()> {
        let mut buf = String::new();
        loop {
            match self.cursor.peek() {
                None => break,
                Some('\n') => break,
                Some('}') if stop_at_close_brace => break,
                Some('{') => {
                    if !buf.is_empty() {
                        elements.push(PatternElement::Text(TextElement { value: std::mem::take(&mut buf) }));
                    }
                    let placeable = self.parse_placeable(depth)?;
                    elements.push(PatternElement::Placeable(placeable));
                }
                Some(c) => {
                    buf.push(c);
                    self.cursor.advance();
                }
            }
        }
        if !buf.is_empty() {
            elements.push(PatternElement::Text(TextElement { value: buf }));
        }
        Ok(())
    }

    fn parse_placeable(&mut self, depth: usize) -> EntryResult<crate::ast::Placeable> {
        if depth >= self.limits.max_placeable_depth {
            return Err(vec![ParseError::new(
                ParseErrorKind::LimitExceeded {
                    limit_name: "max_placeable_depth",
                    limit: self.limits.max_placeable_depth,
                },
                self.here(),
            )]);
        }
        self.expect_char('{')?;
        self.skip_any_blank();
        let expression = self.parse_expression(depth + 1)?;
        self.skip_any_blank();
        self.expect_char('}')?;
        Ok(crate::ast::Placeable { expression })
    }

    /// Skips spaces, tabs, and newlines — used inside a placeable, where
    /// whitespace is not structurally significant the way it is in patterns.
    fn skip_any_blank(&mut self) {
        while matches!(self.cursor.peek(), Some(' ' | '\t' | '\n')) {
            self.cursor.advance();
        }
    }

    fn parse_expression(&mut self, depth: usize) -> EntryResult<Expression> {
        let selector = self.parse_inline_expression(depth)?;
        let snapshot = self.cursor;
        self.skip_any_blank();
        if self.cursor.eat_str("->") {
            let variants = self.parse_select_tail(depth)?;
            return Ok(Expression::Select(SelectExpression {
                selector: Box::new(selector),
                variants: variants.0,
                default_index: variants.1,
            }));
        }
        self.cursor = snapshot;
        Ok(selector)
    }

    fn parse_select_tail(&mut self, depth: usize) -> EntryResult<(SmallVec<[Variant; 4]>, usize)> {
        let mut variants: SmallVec<[Variant; 4]> = SmallVec::new();
        let mut default_index: Option<usize> = None;
        loop {
            let snapshot = self.cursor;
            self.cursor.skip_blank_block();
            let indent = self.cursor.skip_blank_inline();
            if indent == 0 && variants.is_empty() {
                // no indented variant at all — fall through to the braces-are-unbalanced error below
            }
            let is_default = self.cursor.eat_char('*');
            if self.cursor.peek() != Some('[') {
                self.cursor = snapshot;
                break;
            }
            self.cursor.advance(); // '['
            let key = self.parse_variant_key()?;
            self.expect_char(']')?;
            self.cursor.skip_blank_inline();
            let pattern_start = self.cursor.pos();
            let value = self.parse_pattern(indent, true, depth)?.unwrap_or_else(|| Pattern::text(String::new()));
            self.check_pattern_bytes(pattern_start)?;
            if is_default {
                if default_index.is_some() {
                    // a second default is a syntax error: more than one default variant.
                    return Err(vec![ParseError::new(ParseErrorKind::MissingDefaultVariant, self.here())]);
                }
                default_index = Some(variants.len());
            }
            variants.push(Variant { key, value, default: is_default });
        }
        let default_index = default_index.ok_or_else(|| {
            vec![ParseError::new(ParseErrorKind::MissingDefaultVariant, self.here())]
        })?;
        if variants.is_empty() {
            return Err(vec![ParseError::new(ParseErrorKind::ExpectedValue, self.here())]);
        }
        Ok((variants, default_index))
    }

    fn parse_variant_key(&mut self) -> EntryResult<VariantKey> {
        match self.cursor.peek() {
            Some(c) if c.is_ascii_digit() || c == '-' => Ok(VariantKey::Number(self.parse_number_literal()?)),
            Some(c) if c.is_ascii_alphabetic() => {
                Ok(VariantKey::Identifier(self.parse_plain_identifier()?))
            }
            _ => Err(vec![ParseError::new(ParseErrorKind::ExpectedIdentifier, self.here())]),
        }
    }

    fn parse_inline_expression(&mut self, depth: usize) -> EntryResult<Expression> {
        match self.cursor.peek() {
            Some('"') => Ok(Expression::StringLiteral(self.parse_string_literal()?)),
            Some('$') => {
                self.cursor.advance();
                let id = self.parse_plain_identifier()?;
                Ok(Expression::VariableReference { id })
            }
            Some('-') if matches!(self.cursor.peek_at(1), Some(c) if c.is_ascii_alphabetic()) => {
                let id = self.parse_term_identifier()?;
                let attr = self.try_parse_attr_access()?;
                self.cursor.skip_blank_inline();
                let args = if self.cursor.peek() == Some('(') {
                    Some(self.parse_call_arguments(depth)?)
                } else {
                    None
                };
                Ok(Expression::TermReference { id, attr, args })
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                Ok(Expression::NumberLiteral(self.parse_number_literal()?))
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let id = self.parse_plain_identifier()?;
                if self.cursor.peek() == Some('(') {
                    let args = self.parse_call_arguments(depth)?;
                    Ok(Expression::FunctionReference { id, args })
                } else {
                    let attr = self.try_parse_attr_access()?;
                    Ok(Expression::MessageReference { id, attr })
                }
            }
            _ => Err(vec![ParseError::new(ParseErrorKind::ExpectedValue, self.here())]),
        }
    }

    fn try_parse_attr_access(&mut self) -> EntryResult<Option<Identifier>> {
        if self.cursor.peek() == Some('.') {
            self.cursor.advance();
            Ok(Some(self.parse_plain_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn parse_call_arguments(&mut self, depth: usize) -> EntryResult<CallArguments> {
        self.expect_char('(')?;
        self.skip_any_blank();
        let mut positional = Vec::new();
        let mut named = IndexMap::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        while self.cursor.peek() != Some(')') {
            if self.cursor.peek().is_none() {
                return Err(vec![ParseError::new(
                    ParseErrorKind::UnexpectedToken { found: "EOF".to_string(), expected: "')'" },
                    self.here(),
                )]);
            }
            let snapshot = self.cursor;
            let maybe_name = self.try_parse_named_arg_name();
            if let Some(name) = maybe_name {
                if !seen_names.insert(name.as_str().to_string()) {
                    return Err(vec![ParseError::new(
                        ParseErrorKind::UnexpectedToken { found: name.as_str().to_string(), expected: "a unique named argument" },
                        self.here(),
                    )]);
                }
                self.skip_any_blank();
                let value = self.parse_inline_expression(depth)?;
                named.insert(name, value);
            } else {
                self.cursor = snapshot;
                let value = self.parse_inline_expression(depth)?;
                positional.push(value);
            }
            self.skip_any_blank();
            if self.cursor.eat_char(',') {
                self.skip_any_blank();
            } else {
                break;
            }
        }
        self.expect_char(')')?;
        Ok(CallArguments { positional, named })
    }

    /// Tries to parse `identifier blank* ':'` as the start of a named
    /// argument. Returns `None` (without committing the cursor) if the
    /// lookahead doesn't match, letting the caller retry as a positional
    /// expression instead.
    fn try_parse_named_arg_name(&mut self) -> Option<Identifier> {
        if !matches!(self.cursor.peek(), Some(c) if c.is_ascii_alphabetic()) {
            return None;
        }
        let snapshot = self.cursor;
        let Ok(id) = self.parse_plain_identifier() else {
            self.cursor = snapshot;
            return None;
        };
        self.skip_any_blank();
        if self.cursor.eat_char(':') {
            Some(id)
        } else {
            self.cursor = snapshot;
            None
        }
    }

    fn parse_number_literal(&mut self) -> EntryResult<NumberLiteral> {
        let start = self.cursor.pos();
        self.cursor.eat_char('-');
        if !matches!(self.cursor.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(vec![ParseError::new(ParseErrorKind::ExpectedValue, self.here())]);
        }
        while matches!(self.cursor.peek(), Some(c) if c.is_ascii_digit()) {
            self.cursor.advance();
        }
        let mut fraction_digits = 0u8;
        if self.cursor.peek() == Some('.') && matches!(self.cursor.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.cursor.advance();
            let frac_start = self.cursor.pos();
            while matches!(self.cursor.peek(), Some(c) if c.is_ascii_digit()) {
                self.cursor.advance();
            }
            fraction_digits = (self.cursor.pos() - frac_start).min(u8::MAX as usize) as u8;
        }
        let raw = self.cursor.slice_from(start).to_string();
        let value: f64 = raw.parse().map_err(|_| {
            vec![ParseError::new(ParseErrorKind::ExpectedValue, Span::new(start, self.cursor.pos()))]
        })?;
        Ok(NumberLiteral { raw, value, fraction_digits })
    }

    fn parse_string_literal(&mut self) -> EntryResult<StringLiteral> {
        let quote_span_start = self.cursor.pos();
        self.expect_char('"')?;
        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    return Err(vec![ParseError::new(
                        ParseErrorKind::UnclosedStringLiteral,
                        Span::new(quote_span_start, self.cursor.pos()),
                    )]);
                }
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    let esc_start = self.cursor.pos();
                    self.cursor.advance();
                    match self.cursor.peek() {
                        Some('\\') => {
                            value.push('\\');
                            self.cursor.advance();
                        }
                        Some('"') => {
                            value.push('"');
                            self.cursor.advance();
                        }
                        Some('u') => {
                            self.cursor.advance();
                            self.expect_char('{').map_err(|_| {
                                vec![ParseError::new(
                                    ParseErrorKind::InvalidEscape { text: "\\u".to_string() },
                                    Span::new(esc_start, self.cursor.pos()),
                                )]
                            })?;
                            let hex_start = self.cursor.pos();
                            while matches!(self.cursor.peek(), Some(c) if c.is_ascii_hexdigit()) {
                                self.cursor.advance();
                            }
                            let hex = self.cursor.slice_from(hex_start);
                            let hex_len = hex.len();
                            let code_point = u32::from_str_radix(hex, 16).ok();
                            if !(4..=6).contains(&hex_len) {
                                return Err(vec![ParseError::new(
                                    ParseErrorKind::InvalidEscape { text: format!("\\u{{{hex}}}") },
                                    Span::new(esc_start, self.cursor.pos()),
                                )]);
                            }
                            self.expect_char('}').map_err(|_| {
                                vec![ParseError::new(
                                    ParseErrorKind::InvalidEscape { text: format!("\\u{{{hex}") },
                                    Span::new(esc_start, self.cursor.pos()),
                                )]
                            })?;
                            let cp = code_point.ok_or_else(|| {
                                vec![ParseError::new(
                                    ParseErrorKind::InvalidEscape { text: format!("\\u{{{hex}}}") },
                                    Span::new(esc_start, self.cursor.pos()),
                                )]
                            })?;
                            if cp > 0x0010_FFFF || (0xD800..=0xDFFF).contains(&cp) {
                                return Err(vec![ParseError::new(
                                    ParseErrorKind::InvalidUnicodeScalar { code_point: cp },
                                    Span::new(esc_start, self.cursor.pos()),
                                )]);
                            }
                            let c = char::from_u32(cp).ok_or_else(|| {
                                vec![ParseError::new(
                                    ParseErrorKind::InvalidUnicodeScalar { code_point: cp },
                                    Span::new(esc_start, self.cursor.pos()),
                                )]
                            })?;
                            value.push(c);
                        }
                        other => {
                            return Err(vec![ParseError::new(
                                ParseErrorKind::InvalidEscape { text: other.map_or_else(String::new, String::from) },
                                Span::new(esc_start, self.cursor.pos()),
                            )]);
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.cursor.advance();
                }
            }
        }
        Ok(StringLiteral { value })
    }
}

/// Raw (structure-unaware) scan to the end of the current top-level line,
/// tracking placeable brace depth and string-literal state so that embedded
/// multi-line constructs (nested selects, multi-line call arguments) are
/// skipped over rather than mistaken for pattern-line boundaries.
fn skip_raw_line(c: &mut Cursor<'_>, stop_at_close_brace: bool) {
    let mut depth = 0i32;
    let mut in_string = false;
    loop {
        match c.peek() {
            None => return,
            Some('\n') if depth == 0 => return,
            Some('}') if depth == 0 && stop_at_close_brace && !in_string => return,
            Some('\\') if in_string => {
                c.advance();
                c.advance();
            }
            Some('"') => {
                in_string = !in_string;
                c.advance();
            }
            Some('{') if !in_string => {
                depth += 1;
                c.advance();
            }
            Some('}') if !in_string => {
                depth -= 1;
                c.advance();
            }
            Some(_) => {
                c.advance();
            }
        }
    }
}

fn merge_adjacent_text(elements: Vec<PatternElement>) -> Vec<PatternElement> {
    let mut out: Vec<PatternElement> = Vec::with_capacity(elements.len());
    for el in elements {
        if let (Some(PatternElement::Text(prev)), PatternElement::Text(cur)) = (out.last_mut(), &el) {
            prev.value.push_str(&cur.value);
            continue;
        }
        out.push(el);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_message() {
        let (res, errors) = parse("hello = Hi there\n");
        assert!(errors.is_empty());
        let msgs: Vec<_> = res.messages().collect();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id.as_str(), "hello");
    }

    #[test]
    fn parses_term_with_dash_id() {
        let (res, errors) = parse("-brand = Fluent\n");
        assert!(errors.is_empty());
        let terms: Vec<_> = res.terms().collect();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].id.as_str(), "-brand");
    }

    #[test]
    fn unterminated_brace_becomes_junk() {
        let (res, _errors) = parse("broken = { $x\nnext = ok\n");
        assert_eq!(res.junk().count(), 1);
        let msgs: Vec<_> = res.messages().collect();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id.as_str(), "next");
    }

    #[test]
    fn select_requires_default_variant() {
        let (res, _errors) =
            parse("broken = { $x ->\n    [a] A\n    [b] B\n}\nnext = ok\n");
        assert_eq!(res.junk().count(), 1);
    }

    #[test]
    fn deep_placeable_nesting_becomes_junk_not_stack_overflow() {
        let mut src = String::from("deep = ");
        for _ in 0..200 {
            src.push_str("{ FOO(");
        }
        src.push_str("1");
        for _ in 0..200 {
            src.push(')');
            src.push_str(" }");
        }
        src.push('\n');
        let (res, _errors) = parse(&src);
        assert_eq!(res.junk().count(), 1);
    }
}
