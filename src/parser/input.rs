//! Low-level input handling for the tokenizer.
//!
//! [`ParserInput`] wraps the raw bytes and tracks the position (line, column,
//! byte offset) while providing the scanning primitives the tokenizer needs:
//! peeking, advancing, lookahead, whitespace skipping and name scanning.

use crate::error::{SourceLocation, SyntaxError};

/// Maximum length (in bytes) of a tag or attribute name.
pub(crate) const MAX_NAME_LENGTH: usize = 50_000;

/// Maximum element nesting depth.
pub(crate) const MAX_DEPTH: usize = 256;

/// Returns `true` if `c` may start a tag or attribute name.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` may appear after the first character of a name.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Cursor over the input text.
pub(crate) struct ParserInput<'a> {
    /// The input bytes (valid UTF-8).
    input: &'a [u8],
    /// Current byte offset in `input`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based, in characters).
    column: u32,
}

impl<'a> ParserInput<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    // -- Position queries --

    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the text between two byte offsets.
    ///
    /// Offsets always come from this cursor, so they sit on character
    /// boundaries.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.input[start..end]).unwrap_or_default()
    }

    // -- Peek --

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.char_at(0)
    }

    /// Returns the character starting `offset` bytes ahead.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        let start = self.pos + offset;
        let first = *self.input.get(start)?;
        let end = (start + utf8_len(first)).min(self.input.len());
        std::str::from_utf8(&self.input[start..end])
            .ok()
            .and_then(|s| s.chars().next())
    }

    // -- Advance --

    /// Advances by `count` bytes, updating line and column.
    ///
    /// Continuation bytes of multi-byte characters do not count as columns.
    pub fn advance(&mut self, count: usize) {
        let end = (self.pos + count).min(self.input.len());
        while self.pos < end {
            let b = self.input[self.pos];
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if b & 0xC0 != 0x80 {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    pub fn advance_char(&mut self, ch: char) {
        self.advance(ch.len_utf8());
    }

    // -- Lookahead --

    pub fn looking_at(&self, s: &[u8]) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Case-insensitive (ASCII) lookahead.
    pub fn looking_at_ci(&self, expected: &[u8]) -> bool {
        self.input
            .get(self.pos..self.pos + expected.len())
            .is_some_and(|window| window.eq_ignore_ascii_case(expected))
    }

    // -- Whitespace --

    /// Skips whitespace. Returns `true` if any was consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_whitespace) {
            self.advance(1);
        }
        self.pos > start
    }

    // -- Scanning --

    /// Consumes bytes while `pred` holds and returns them.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.advance(1);
        }
        self.slice(start, self.pos)
    }

    /// Consumes input up to (not including) `delimiter`.
    ///
    /// Returns `None` and consumes nothing when the delimiter never occurs.
    pub fn take_until(&mut self, delimiter: &[u8]) -> Option<&'a str> {
        let start = self.pos;
        let offset = self.input[start..]
            .windows(delimiter.len())
            .position(|window| window == delimiter)?;
        self.advance(offset);
        Some(self.slice(start, self.pos))
    }

    /// Scans a tag or attribute name.
    pub fn parse_name(&mut self) -> Result<&'a str, SyntaxError> {
        let start = self.pos;
        let first = self
            .peek_char()
            .ok_or_else(|| self.fatal("expected name, found end of input"))?;
        if !is_name_start_char(first) {
            return Err(self.fatal(format!("invalid name start character: '{first}'")));
        }
        self.advance_char(first);
        while let Some(ch) = self.peek_char() {
            if !is_name_char(ch) {
                break;
            }
            self.advance_char(ch);
        }
        let len = self.pos - start;
        if len > MAX_NAME_LENGTH {
            return Err(self.fatal(format!(
                "name length ({len}) exceeds maximum ({MAX_NAME_LENGTH})"
            )));
        }
        Ok(self.slice(start, self.pos))
    }

    /// Builds a syntax error at the current position.
    pub fn fatal(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(message, self.location())
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}
