//! Markup tokenizer.
//!
//! Scans the input text into a flat sequence of [`Token`]s. The tree builder
//! consumes the sequence afterwards; the tokenizer itself only keeps the
//! stack of open tag names it needs to check nesting and to know whether it
//! is inside an `xml:space="preserve"` scope.
//!
//! Malformed markup is reported in-band as a [`Token::Error`] and scanning
//! stops. A failure while a [`ScanState`] is open (currently: while the
//! attributes of a start tag are scanned) aborts the scan instead and leaves
//! the state on the stack, so the caller can say where it happened.

use crate::error::{SourceLocation, SyntaxError};

use super::input::{is_name_start_char, is_whitespace, ParserInput, MAX_DEPTH};
use super::Mode;

/// A tokenizer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Body of the `<?xml ...?>` declaration, after the `xml` target.
    Declaration(String),
    /// Body of `<!DOCTYPE ...>`, after the keyword.
    Doctype(String),
    /// A processing instruction with its target and unparsed remainder.
    Instruction { name: String, raw: String },
    /// A start tag (or the start of an empty-element tag).
    TagOpen(String),
    /// An end tag, or the end of an empty-element tag.
    TagClose(String),
    /// An attribute of the most recently opened tag. The value is raw.
    TagAttribute { name: String, value: String },
    /// Character data, entity references undecoded.
    Text(String),
    /// The content of a CDATA section.
    CData(String),
    /// The content of a comment.
    Comment(String),
    /// Malformed markup. Always the last token.
    Error {
        message: String,
        location: SourceLocation,
    },
}

/// Diagnostic state pushed while a construct is being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Scanning the attributes of a start tag that began at this location.
    ParseAttribute(SourceLocation),
}

/// Tokenizes `input`, appending to `tokens`.
///
/// # Errors
///
/// Returns the underlying error when scanning fails while a diagnostic state
/// is open; that state is left on top of `states`. Every other failure is
/// reported as a trailing [`Token::Error`].
pub fn tokenize(
    input: &str,
    mode: Mode,
    tokens: &mut Vec<Token>,
    states: &mut Vec<ScanState>,
) -> Result<(), SyntaxError> {
    let mut tokenizer = Tokenizer {
        input: ParserInput::new(input),
        html: mode == Mode::Html,
        open: Vec::new(),
        tokens,
        states,
    };
    match tokenizer.run() {
        Ok(()) => Ok(()),
        Err(err) if tokenizer.states.is_empty() => {
            let location = err.location.unwrap_or_else(|| tokenizer.input.location());
            tokenizer.tokens.push(Token::Error {
                message: err.message,
                location,
            });
            Ok(())
        }
        Err(err) => Err(err),
    }
}

struct OpenTag {
    name: String,
    preserve: bool,
}

struct Tokenizer<'a, 't> {
    input: ParserInput<'a>,
    html: bool,
    open: Vec<OpenTag>,
    tokens: &'t mut Vec<Token>,
    states: &'t mut Vec<ScanState>,
}

impl Tokenizer<'_, '_> {
    fn run(&mut self) -> Result<(), SyntaxError> {
        while !self.input.at_end() {
            if self.input.looking_at(b"<?") {
                self.scan_instruction()?;
            } else if self.input.looking_at(b"<!--") {
                self.scan_comment()?;
            } else if self.input.looking_at(b"<![CDATA[") {
                self.scan_cdata()?;
            } else if self.input.looking_at_ci(b"<!DOCTYPE") {
                self.scan_doctype()?;
            } else if self.input.looking_at(b"</") {
                self.scan_end_tag()?;
            } else if self.input.looking_at(b"<") && self.starts_tag() {
                self.scan_start_tag()?;
            } else {
                self.scan_text()?;
            }
        }
        self.finish()
    }

    /// A '<' that cannot begin a tag is plain text in html mode.
    fn starts_tag(&self) -> bool {
        !self.html || self.input.char_at(1).is_some_and(is_name_start_char)
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    fn preserved(&self) -> bool {
        self.open.last().is_some_and(|tag| tag.preserve)
    }

    fn emit(&mut self, token: Token) {
        self.tokens.push(token);
    }

    fn scan_text(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        let start = self.input.pos();
        if self.input.looking_at(b"<") {
            self.input.advance(1);
        }
        while self.input.peek().is_some_and(|b| b != b'<') {
            self.input.advance(1);
        }
        let text = self.input.slice(start, self.input.pos());
        let blank = text.bytes().all(is_whitespace);

        if self.depth() == 0 {
            if blank {
                return Ok(());
            }
            if self.html {
                log::debug!("html mode: ignoring text outside of the root element at {location}");
                return Ok(());
            }
            return Err(SyntaxError::at(
                "text outside of the root element",
                location,
            ));
        }
        if blank && !self.preserved() {
            return Ok(());
        }
        self.emit(Token::Text(text.to_string()));
        Ok(())
    }

    fn scan_comment(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        self.input.advance(4);
        let content = self
            .input
            .take_until(b"-->")
            .ok_or_else(|| SyntaxError::at("unterminated comment", location))?;
        self.input.advance(3);
        self.emit(Token::Comment(content.to_string()));
        Ok(())
    }

    fn scan_cdata(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        self.input.advance(9);
        let content = self
            .input
            .take_until(b"]]>")
            .ok_or_else(|| SyntaxError::at("unterminated CDATA section", location))?;
        self.input.advance(3);
        if self.depth() == 0 {
            if self.html {
                log::debug!("html mode: ignoring CDATA outside of the root element at {location}");
                return Ok(());
            }
            return Err(SyntaxError::at(
                "CDATA section outside of the root element",
                location,
            ));
        }
        self.emit(Token::CData(content.to_string()));
        Ok(())
    }

    fn scan_instruction(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        self.input.advance(2);
        let body = self
            .input
            .take_until(b"?>")
            .ok_or_else(|| SyntaxError::at("unterminated processing instruction", location))?;
        self.input.advance(2);

        let split = body.find(|c: char| c.is_ascii_whitespace()).unwrap_or(body.len());
        let (name, rest) = body.split_at(split);
        if name.is_empty() {
            return Err(SyntaxError::at(
                "processing instruction without a target",
                location,
            ));
        }
        let rest = rest.trim();
        if name == "xml" {
            self.emit(Token::Declaration(rest.to_string()));
        } else {
            self.emit(Token::Instruction {
                name: name.to_string(),
                raw: rest.to_string(),
            });
        }
        Ok(())
    }

    fn scan_doctype(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        self.input.advance(9);
        let start = self.input.pos();
        let mut brackets = 0usize;
        let mut quote: Option<u8> = None;
        loop {
            let b = self
                .input
                .peek()
                .ok_or_else(|| SyntaxError::at("unterminated doctype declaration", location))?;
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => brackets += 1,
                (None, b']') => brackets = brackets.saturating_sub(1),
                (None, b'>') if brackets == 0 => break,
                _ => {}
            }
            self.input.advance(1);
        }
        let body = self.input.slice(start, self.input.pos()).trim().to_string();
        self.input.advance(1);
        self.emit(Token::Doctype(body));
        Ok(())
    }

    fn scan_start_tag(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        if self.depth() >= MAX_DEPTH {
            return Err(SyntaxError::at(
                format!("maximum nesting depth exceeded ({MAX_DEPTH})"),
                location,
            ));
        }
        self.input.advance(1);
        let name = self.input.parse_name()?.to_string();
        self.emit(Token::TagOpen(name.clone()));

        self.states.push(ScanState::ParseAttribute(location));
        let mut preserve = self.preserved();
        let self_closing = loop {
            let spaced = self.input.skip_whitespace();
            match self.input.peek() {
                None => return Err(self.input.fatal(format!("unexpected end of input in <{name}>"))),
                Some(b'>') => {
                    self.input.advance(1);
                    break false;
                }
                Some(b'/') if self.input.looking_at(b"/>") => {
                    self.input.advance(2);
                    break true;
                }
                Some(_) if !spaced && !self.html => {
                    return Err(self
                        .input
                        .fatal(format!("whitespace required between attributes of <{name}>")));
                }
                Some(_) => {
                    if self.html && !self.input.peek_char().is_some_and(is_name_start_char) {
                        if let Some(ch) = self.input.peek_char() {
                            log::debug!("html mode: skipping '{ch}' in <{name}>");
                            self.input.advance_char(ch);
                        }
                        continue;
                    }
                    let (attribute, value) = self.scan_attribute()?;
                    if attribute == "xml:space" {
                        match value.as_str() {
                            "preserve" => preserve = true,
                            "default" => preserve = false,
                            _ => {}
                        }
                    }
                    self.emit(Token::TagAttribute {
                        name: attribute,
                        value,
                    });
                }
            }
        };
        self.states.pop();

        if self_closing {
            self.emit(Token::TagClose(name));
        } else {
            self.open.push(OpenTag { name, preserve });
        }
        Ok(())
    }

    fn scan_attribute(&mut self) -> Result<(String, String), SyntaxError> {
        let name = self.input.parse_name()?.to_string();
        self.input.skip_whitespace();
        if self.input.peek() != Some(b'=') {
            if self.html {
                return Ok((name, String::new()));
            }
            return Err(self.input.fatal(format!("attribute '{name}' has no value")));
        }
        self.input.advance(1);
        self.input.skip_whitespace();

        match self.input.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.input.advance(1);
                let value = self
                    .input
                    .take_until(&[quote])
                    .ok_or_else(|| self.input.fatal(format!("unterminated value for attribute '{name}'")))?;
                self.input.advance(1);
                Ok((name, value.to_string()))
            }
            Some(_) if self.html => {
                let value = self.input.take_while(|b| !is_whitespace(b) && b != b'>');
                Ok((name, value.to_string()))
            }
            _ => Err(self
                .input
                .fatal(format!("value of attribute '{name}' must be quoted"))),
        }
    }

    fn scan_end_tag(&mut self) -> Result<(), SyntaxError> {
        let location = self.input.location();
        self.input.advance(2);
        let name = self.input.parse_name()?.to_string();
        self.input.skip_whitespace();
        if self.input.peek() != Some(b'>') {
            return Err(self.input.fatal(format!("expected '>' to end </{name}")));
        }
        self.input.advance(1);

        let Some(current) = self.open.last() else {
            if self.html {
                log::debug!("html mode: ignoring stray </{name}> at {location}");
                return Ok(());
            }
            return Err(SyntaxError::at(
                format!("unexpected closing tag </{name}>"),
                location,
            ));
        };
        if current.name != name {
            if !self.html {
                return Err(SyntaxError::at(
                    format!("expected </{}>, found </{name}>", current.name),
                    location,
                ));
            }
            log::debug!(
                "html mode: </{name}> at {location} closes <{}>",
                current.name
            );
        }
        if let Some(tag) = self.open.pop() {
            self.emit(Token::TagClose(tag.name));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SyntaxError> {
        if self.open.is_empty() {
            return Ok(());
        }
        if !self.html {
            let name = self.open.last().map(|tag| tag.name.clone()).unwrap_or_default();
            return Err(self.input.fatal(format!("unclosed tag <{name}>")));
        }
        while let Some(tag) = self.open.pop() {
            log::debug!("html mode: closing unclosed <{}> at end of input", tag.name);
            self.emit(Token::TagClose(tag.name));
        }
        Ok(())
    }
}
