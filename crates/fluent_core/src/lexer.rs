//! A byte-index cursor over (already CRLF-normalized) FTL source text.
//!
//! This is not a separate tokenization pass producing a token stream; Fluent's
//! grammar is whitespace- and column-significant enough that a direct
//! character cursor, consulted by the recursive-descent parser in
//! [`crate::parser`], reads more directly than an intermediate token stream
//! would. `Cursor` only knows about *characters*; all grammar decisions live
//! in the parser.

/// A cheap, `Copy`-able cursor into a source buffer. Cloning/copying a cursor
/// is how the parser implements lookahead and backtracking: try a production
/// against a copy, keep the copy's position only if the production succeeded.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    #[must_use]
    pub fn source(&self) -> &'a str {
        self.source
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    #[must_use]
    pub fn peek_at(&self, offset_chars: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(offset_chars)
    }

    /// Returns true if the remaining input starts with `s`.
    #[must_use]
    pub fn starts_with(&self, s: &str) -> bool {
        self.source[self.pos..].starts_with(s)
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Advances past `s` if the remaining input starts with it; returns whether it did.
    pub fn eat_str(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    pub fn eat_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes ASCII horizontal whitespace (space/tab) only — never newlines.
    /// Returns the number of characters consumed.
    pub fn skip_blank_inline(&mut self) -> usize {
        let mut n = 0;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
            n += 1;
        }
        n
    }

    /// Consumes runs of blank-inline-then-newline (blank lines), i.e. Fluent's
    /// `blank_block`. Returns the number of newlines consumed.
    pub fn skip_blank_block(&mut self) -> usize {
        let mut newlines = 0;
        loop {
            let mark = self.pos;
            self.skip_blank_inline();
            if self.eat_char('\n') {
                newlines += 1;
            } else {
                self.pos = mark;
                break;
            }
        }
        newlines
    }

    /// True at the very start of source, or immediately after a `\n`.
    #[must_use]
    pub fn at_line_start(&self) -> bool {
        self.pos == 0 || self.source.as_bytes().get(self.pos - 1) == Some(&b'\n')
    }

    /// Byte slice from `start` to the current position.
    #[must_use]
    pub fn slice_from(&self, start: usize) -> &'a str {
        &self.source[start..self.pos]
    }

    /// Skips to just past the next entry boundary: a `\n` followed by either
    /// EOF, a `#`, a `-`, or an ASCII letter at column 0. Used by the parser's
    /// error-recovery path (§4.1). Does not consume the boundary marker itself.
    pub fn recover_to_next_entry(&mut self) {
        loop {
            match self.advance() {
                None => return,
                Some('\n') => {
                    if self.is_eof() {
                        return;
                    }
                    match self.peek() {
                        Some(c) if c == '#' || c == '-' || c.is_ascii_alphabetic() => return,
                        _ => {}
                    }
                }
                Some(_) => {}
            }
        }
    }
}

/// Normalizes CRLF and lone CR to LF, per §6.
#[must_use]
pub fn normalize_line_endings(source: &str) -> String {
    if !source.as_bytes().contains(&b'\r') {
        return source.to_string();
    }
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_crlf_and_lone_cr() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(normalize_line_endings("no newlines"), "no newlines");
    }

    #[test]
    fn cursor_tracks_line_start() {
        let mut c = Cursor::new("ab\ncd");
        assert!(c.at_line_start());
        c.advance();
        assert!(!c.at_line_start());
        c.advance();
        c.advance();
        assert!(c.at_line_start());
    }

    #[test]
    fn skip_blank_block_counts_newlines() {
        let mut c = Cursor::new("  \n\t\n  x");
        let n = c.skip_blank_block();
        assert_eq!(n, 2);
        assert_eq!(c.peek(), Some(' '));
    }
}
