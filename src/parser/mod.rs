//! XML parser.
//!
//! Parsing runs in three passes over fully materialized data:
//!
//! 1. the [tokenizer](tokenizer) scans the text into a flat token sequence;
//! 2. the tree builder replays the tokens into a raw [`Document`];
//! 3. the [postprocessor](crate::postprocess) cleans, revives and flattens the
//!    tree into a [`Value`].
//!
//! [`build_tree`] stops after the second pass for callers that need the raw
//! tree (parent links, node names, leaf order).

mod builder;
pub(crate) mod input;
pub mod tokenizer;

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, SyntaxError};
use crate::tree::{Document, NodeId};
use crate::value::Value;

pub use tokenizer::{tokenize, ScanState, Token};

/// Tokenizer strictness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Well-formedness is enforced.
    #[default]
    Xml,
    /// Unquoted and valueless attributes, mismatched or missing end tags and
    /// stray text outside the root element are tolerated.
    Html,
}

/// What to remove from the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    /// Drop every attribute.
    pub attributes: bool,
    /// Drop comments.
    pub comments: bool,
    /// Drop the `#doctype` entry.
    pub doctype: bool,
    /// Drop the `#instructions` entry.
    pub instructions: bool,
    /// With `instructions`, also drop top-level elements named like one of
    /// the removed instructions.
    pub instruction_collisions: bool,
}

impl CleanOptions {
    #[must_use]
    pub fn attributes(mut self, yes: bool) -> Self {
        self.attributes = yes;
        self
    }

    #[must_use]
    pub fn comments(mut self, yes: bool) -> Self {
        self.comments = yes;
        self
    }

    #[must_use]
    pub fn doctype(mut self, yes: bool) -> Self {
        self.doctype = yes;
        self
    }

    #[must_use]
    pub fn instructions(mut self, yes: bool) -> Self {
        self.instructions = yes;
        self
    }

    #[must_use]
    pub fn instruction_collisions(mut self, yes: bool) -> Self {
        self.instruction_collisions = yes;
        self
    }
}

/// How structurally trivial nodes are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    /// A node holding only attributes becomes a plain object without `@`
    /// prefixes. Defaults to `false`.
    pub attributes: bool,
    /// A node holding only `#text` becomes that text. Defaults to `true`.
    pub text: bool,
    /// A node holding nothing becomes `null`. Defaults to `true`.
    pub empty: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            attributes: false,
            text: true,
            empty: true,
        }
    }
}

impl FlattenOptions {
    #[must_use]
    pub fn attributes(mut self, yes: bool) -> Self {
        self.attributes = yes;
        self
    }

    #[must_use]
    pub fn text(mut self, yes: bool) -> Self {
        self.text = yes;
        self
    }

    #[must_use]
    pub fn empty(mut self, yes: bool) -> Self {
        self.empty = yes;
        self
    }
}

/// Arguments handed to a custom [`Reviver`].
///
/// For an attribute or a text value, `key` is the attribute name (with its
/// `@` prefix) or `#text`, and `value` is the value after the built-in
/// revivals. For a node, both are `None`.
#[derive(Clone, Copy)]
pub struct ReviveArgs<'a> {
    /// The node name (`~xml` for the document).
    pub name: &'a str,
    pub key: Option<&'a str>,
    pub value: Option<&'a Value>,
    /// The node being processed, in `document`.
    pub node: NodeId,
    pub document: &'a Document,
}

impl fmt::Debug for ReviveArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviveArgs")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// A custom reviver.
///
/// Returning `None` deletes the attribute or text value, or discards the
/// whole node when called for a node. Any other return value replaces the
/// revived value (it is ignored for nodes).
pub type Reviver = Arc<dyn Fn(ReviveArgs<'_>) -> Option<Value> + Send + Sync>;

/// How raw strings are turned into values.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviveOptions {
    /// Trim attribute and text values, except text in an `xml:space="preserve"`
    /// scope. Defaults to `true`.
    pub trim: bool,
    /// Decode character references and the five predefined entities.
    /// Defaults to `true`.
    pub entities: bool,
    /// Turn `true`/`false` (any case) into booleans.
    pub booleans: bool,
    /// Turn finite numeric strings into numbers. The document's `@version`
    /// always stays a string.
    pub numbers: bool,
    /// Runs last, for every attribute, text value and node.
    #[serde(skip)]
    pub custom: Option<Reviver>,
}

impl Default for ReviveOptions {
    fn default() -> Self {
        Self {
            trim: true,
            entities: true,
            booleans: false,
            numbers: false,
            custom: None,
        }
    }
}

impl fmt::Debug for ReviveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviveOptions")
            .field("trim", &self.trim)
            .field("entities", &self.entities)
            .field("booleans", &self.booleans)
            .field("numbers", &self.numbers)
            .field("custom", &self.custom.as_ref().map(|_| "..."))
            .finish()
    }
}

impl ReviveOptions {
    #[must_use]
    pub fn trim(mut self, yes: bool) -> Self {
        self.trim = yes;
        self
    }

    #[must_use]
    pub fn entities(mut self, yes: bool) -> Self {
        self.entities = yes;
        self
    }

    #[must_use]
    pub fn booleans(mut self, yes: bool) -> Self {
        self.booleans = yes;
        self
    }

    #[must_use]
    pub fn numbers(mut self, yes: bool) -> Self {
        self.numbers = yes;
        self
    }

    /// Installs a custom reviver.
    #[must_use]
    pub fn custom(
        mut self,
        reviver: impl Fn(ReviveArgs<'_>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.custom = Some(Arc::new(reviver));
        self
    }
}

/// Parse options.
///
/// ```
/// use xmlshape::parser::{FlattenOptions, Mode, ParseOptions, ReviveOptions};
///
/// let opts = ParseOptions::default()
///     .mode(Mode::Html)
///     .flatten(FlattenOptions::default().attributes(true))
///     .revive(ReviveOptions::default().numbers(true));
/// assert!(opts.flatten.text);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub clean: CleanOptions,
    pub flatten: FlattenOptions,
    pub revive: ReviveOptions,
    pub mode: Mode,
}

impl ParseOptions {
    #[must_use]
    pub fn clean(mut self, clean: CleanOptions) -> Self {
        self.clean = clean;
        self
    }

    #[must_use]
    pub fn flatten(mut self, flatten: FlattenOptions) -> Self {
        self.flatten = flatten;
        self
    }

    #[must_use]
    pub fn revive(mut self, revive: ReviveOptions) -> Self {
        self.revive = revive;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns [`Error::Syntax`] for malformed markup and for documents without
/// exactly one root element.
///
/// # Examples
///
/// ```
/// let value = xmlshape::parse_str("<root><a>1</a><a>2</a></root>").unwrap();
/// assert_eq!(value["root"]["a"][1].as_str(), Some("2"));
/// ```
pub fn parse_str(input: &str) -> Result<Value, Error> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// # Errors
///
/// Returns [`Error::Syntax`] for malformed markup and for documents without
/// exactly one root element, and [`Error::Eval`] if the tokenizer fails
/// outside of any diagnostic state.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Value, Error> {
    log::debug!("parsing {} bytes in {:?} mode", input.len(), options.mode);
    let mut doc = build_tree(input, options.mode)?;
    Ok(crate::postprocess::postprocess(&mut doc, options))
}

/// Parses raw bytes, detecting their encoding first.
///
/// # Errors
///
/// As [`parse_str_with_options`]; undecodable input is an [`Error::Eval`].
pub fn parse_bytes_with_options(bytes: &[u8], options: &ParseOptions) -> Result<Value, Error> {
    let text = crate::encoding::decode_to_utf8(bytes)?;
    parse_str_with_options(&text, options)
}

/// Drains `reader` and parses its content.
///
/// # Errors
///
/// As [`parse_bytes_with_options`]; read failures are an [`Error::Eval`].
pub fn parse_reader_with_options<R: Read>(
    mut reader: R,
    options: &ParseOptions,
) -> Result<Value, Error> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| Error::Eval(format!("failed to read input: {err}")))?;
    parse_bytes_with_options(&bytes, options)
}

/// Tokenizes `input` and builds the raw document tree.
///
/// # Errors
///
/// As [`parse_str_with_options`].
pub fn build_tree(input: &str, mode: Mode) -> Result<Document, Error> {
    let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
    let mut tokens = Vec::new();
    let mut states = Vec::new();
    if let Err(err) = tokenize(input, mode, &mut tokens, &mut states) {
        return Err(match states.last() {
            Some(ScanState::ParseAttribute(start)) => SyntaxError {
                message: format!(
                    "failed to parse attribute around position {start}: {}",
                    err.message
                ),
                location: err.location,
            }
            .into(),
            None => Error::Eval(err.to_string()),
        });
    }
    log::debug!("tokenized {} tokens", tokens.len());
    builder::build(&tokens)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let opts = ParseOptions::default();
        assert_eq!(opts.clean, CleanOptions::default());
        assert!(!opts.flatten.attributes && opts.flatten.text && opts.flatten.empty);
        assert!(opts.revive.trim && opts.revive.entities);
        assert!(!opts.revive.booleans && !opts.revive.numbers);
        assert!(opts.revive.custom.is_none());
        assert_eq!(opts.mode, Mode::Xml);
    }

    #[test]
    fn test_options_from_json() {
        let opts: ParseOptions = serde_json::from_str(
            r#"{"clean": {"comments": true}, "flatten": {"empty": false}, "mode": "html"}"#,
        )
        .unwrap();
        assert!(opts.clean.comments);
        assert!(!opts.clean.doctype);
        assert!(opts.flatten.text);
        assert!(!opts.flatten.empty);
        assert!(opts.revive.trim);
        assert_eq!(opts.mode, Mode::Html);
    }

    #[test]
    fn test_build_tree_keeps_parents() {
        let doc = build_tree("<root><child><grand-child/></child></root>", Mode::Xml).unwrap();
        let root = doc.root_element().unwrap();
        let child = doc.members(root).unwrap()["child"].ids()[0];
        let grand = doc.members(child).unwrap()["grand-child"].ids()[0];
        assert_eq!(doc.node_name(grand), "grand-child");
        assert_eq!(doc.parent(grand), Some(child));
        assert_eq!(doc.parent(child), Some(root));
        assert_eq!(doc.parent(root), Some(doc.root()));
        assert_eq!(doc.parent(doc.root()), None);
    }

    #[test]
    fn test_build_tree_strips_bom() {
        let doc = build_tree("\u{FEFF}<root/>", Mode::Xml).unwrap();
        assert!(doc.root_element().is_some());
    }

    #[test]
    fn test_attribute_failure_message() {
        let err = build_tree("<root>\n  <child test=hey></child>\n</root>", Mode::Xml).unwrap_err();
        assert!(err.is_syntax());
        let message = err.to_string();
        assert!(message.contains("failed to parse attribute around position 2:3"), "{message}");
    }

    #[test]
    fn test_parse_bytes_utf8_with_bom() {
        let value =
            parse_bytes_with_options(b"\xEF\xBB\xBF<root>ok</root>", &ParseOptions::default())
                .unwrap();
        assert_eq!(value["root"], Value::from("ok"));
    }

    #[test]
    fn test_parse_bytes_utf16() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<root>\u{e9}t\u{e9}</root>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let value = parse_bytes_with_options(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(value["root"], Value::from("\u{e9}t\u{e9}"));
    }

    #[test]
    fn test_parse_reader() {
        let input: &[u8] = b"<note><to>Tove</to></note>";
        let value = parse_reader_with_options(input, &ParseOptions::default()).unwrap();
        assert_eq!(value["note"]["to"], Value::from("Tove"));
    }

    #[test]
    fn test_parse_reader_failure_is_eval() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "stream closed"))
            }
        }
        let err = parse_reader_with_options(Broken, &ParseOptions::default()).unwrap_err();
        assert!(err.is_eval());
        assert!(err.to_string().contains("stream closed"));
    }
}
