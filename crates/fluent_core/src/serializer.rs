//! The canonical serializer.
//!
//! `serialize` is the formatting half of the roundtrip fixed-point law (§3):
//! `serialize(parse(serialize(parse(x)))) == serialize(parse(x))`. It does not
//! attempt to preserve the caller's original formatting choices (blank-line
//! counts between entries, single- vs. multi-line pattern layout) — only that
//! whatever canonical layout it picks reparses back to an identical AST.

use crate::ast::{Attribute, Comment, Entry, Expression, Message, Pattern, PatternElement, Resource, Term};

const ENTRY_BASE_INDENT: usize = 4;

/// Serializes a full resource: one entry per block, blocks separated by a
/// single blank line.
#[must_use]
pub fn serialize(resource: &Resource) -> String {
    let mut out = String::new();
    for (i, entry) in resource.entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        serialize_entry(entry, &mut out);
    }
    out
}

/// Serializes a single entry, including its trailing newline.
pub fn serialize_entry(entry: &Entry, out: &mut String) {
    match entry {
        Entry::Message(m) => serialize_message(m, out),
        Entry::Term(t) => serialize_term(t, out),
        Entry::Comment(c) => {
            serialize_comment(c, out);
            out.push('\n');
        }
        Entry::Junk(j) => out.push_str(&j.raw),
    }
}

fn serialize_comment(comment: &Comment, out: &mut String) {
    let marker = "#".repeat(comment.level as usize);
    for (i, line) in comment.text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&marker);
        if !line.is_empty() {
            out.push(' ');
            out.push_str(line);
        }
    }
}

fn serialize_message(m: &Message, out: &mut String) {
    if let Some(c) = &m.comment {
        serialize_comment(c, out);
        out.push('\n');
    }
    out.push_str(m.id.as_str());
    out.push_str(" =");
    if let Some(value) = &m.value {
        out.push(' ');
        serialize_pattern(value, ENTRY_BASE_INDENT, out);
    }
    out.push('\n');
    serialize_attributes(&m.attributes, out);
}

fn serialize_term(t: &Term, out: &mut String) {
    if let Some(c) = &t.comment {
        serialize_comment(c, out);
        out.push('\n');
    }
    out.push_str(t.id.as_str());
    out.push_str(" = ");
    serialize_pattern(&t.value, ENTRY_BASE_INDENT, out);
    out.push('\n');
    serialize_attributes(&t.attributes, out);
}

fn serialize_attributes(attributes: &[Attribute], out: &mut String) {
    for attr in attributes {
        out.push_str("    .");
        out.push_str(attr.id.as_str());
        out.push_str(" = ");
        serialize_pattern(&attr.value, ENTRY_BASE_INDENT * 2, out);
        out.push('\n');
    }
}

fn serialize_pattern(pattern: &Pattern, continuation_indent: usize, out: &mut String) {
    for element in &pattern.elements {
        match element {
            PatternElement::Text(t) => serialize_text(&t.value, continuation_indent, out),
            PatternElement::Placeable(p) => {
                out.push_str("{ ");
                serialize_expression(&p.expression, continuation_indent, out);
                out.push_str(" }");
            }
        }
    }
}

/// Escapes a literal `{` (the one character with syntactic meaning in plain
/// pattern text) as a placeable, and re-indents embedded newlines to
/// `continuation_indent`. Parsed patterns never contain a literal `{` in a
/// `TextElement` (the parser would have read it as a placeable start), but
/// the AST can be built by hand, so the serializer stays defensive here.
fn serialize_text(value: &str, continuation_indent: usize, out: &mut String) {
    for c in value.chars() {
        match c {
            '\n' => {
                out.push('\n');
                out.push_str(&" ".repeat(continuation_indent));
            }
            '{' => out.push_str("{ \"{\" }"),
            other => out.push(other),
        }
    }
}

fn escape_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

fn serialize_expression(expr: &Expression, continuation_indent: usize, out: &mut String) {
    match expr {
        Expression::StringLiteral(s) => {
            out.push('"');
            out.push_str(&escape_string_literal(&s.value));
            out.push('"');
        }
        Expression::NumberLiteral(n) => out.push_str(&n.raw),
        Expression::VariableReference { id } => {
            out.push('$');
            out.push_str(id.as_str());
        }
        Expression::MessageReference { id, attr } => {
            out.push_str(id.as_str());
            if let Some(attr) = attr {
                out.push('.');
                out.push_str(attr.as_str());
            }
        }
        Expression::TermReference { id, attr, args } => {
            out.push_str(id.as_str());
            if let Some(attr) = attr {
                out.push('.');
                out.push_str(attr.as_str());
            }
            if let Some(args) = args {
                out.push('(');
                serialize_call_arguments(args, continuation_indent, out);
                out.push(')');
            }
        }
        Expression::FunctionReference { id, args } => {
            out.push_str(id.as_str());
            out.push('(');
            serialize_call_arguments(args, continuation_indent, out);
            out.push(')');
        }
        Expression::Select(sel) => {
            serialize_expression(&sel.selector, continuation_indent, out);
            out.push_str(" ->\n");
            for (i, variant) in sel.variants.iter().enumerate() {
                out.push_str(&" ".repeat(continuation_indent));
                out.push(if i == sel.default_index { '*' } else { ' ' });
                out.push('[');
                out.push_str(&variant.key.as_key_text());
                out.push_str("] ");
                serialize_pattern(&variant.value, continuation_indent + ENTRY_BASE_INDENT, out);
                out.push('\n');
            }
            out.push_str(&" ".repeat(continuation_indent.saturating_sub(ENTRY_BASE_INDENT)));
        }
    }
}

fn serialize_call_arguments(args: &crate::ast::CallArguments, continuation_indent: usize, out: &mut String) {
    let mut first = true;
    for positional in &args.positional {
        if !first {
            out.push_str(", ");
        }
        first = false;
        serialize_expression(positional, continuation_indent, out);
    }
    for (name, value) in &args.named {
        if !first {
            out.push_str(", ");
        }
        first = false;
        out.push_str(name.as_str());
        out.push_str(": ");
        serialize_expression(value, continuation_indent, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn roundtrip_is_fixed_point(source: &str) {
        let (res1, errs1) = parse(source);
        assert!(errs1.is_empty(), "unexpected parse errors for {source:?}: {errs1:?}");
        let out1 = serialize(&res1);
        let (res2, errs2) = parse(&out1);
        assert!(errs2.is_empty(), "reparse of serialized output failed: {errs2:?}");
        let out2 = serialize(&res2);
        assert_eq!(out1, out2, "serializer is not a fixed point for {source:?}");
        assert_eq!(res1, res2);
    }

    #[test]
    fn simple_message_is_fixed_point() {
        roundtrip_is_fixed_point("hello = Hi there\n");
    }

    #[test]
    fn message_with_attributes_is_fixed_point() {
        roundtrip_is_fixed_point("login-button = Log in\n    .tooltip = Click to log in\n    .accesskey = L\n");
    }

    #[test]
    fn select_expression_is_fixed_point() {
        roundtrip_is_fixed_point(
            "emails =\n    { $count ->\n        [one] You have one email\n       *[other] You have { $count } emails\n    }\n",
        );
    }

    #[test]
    fn term_reference_with_args_is_fixed_point() {
        roundtrip_is_fixed_point("-brand = { $case ->\n       *[nominative] Firefox\n        [genitive] Firefox's\n    }\nwelcome = Welcome to { -brand(case: \"genitive\") }\n");
    }

    #[test]
    fn comment_and_multiline_pattern_is_fixed_point() {
        roundtrip_is_fixed_point("# A greeting\n# spanning two lines\ngreeting =\n    Hello,\n    world!\n");
    }
}
