//! XML serializer.
//!
//! Writes a [`Value`] shaped like the parser's output back to XML text.
//! Besides raw node objects it accepts the flattened shapes: a scalar is an
//! element's text, `null` an empty element and an array a run of same-name
//! siblings.

use std::fmt::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::escape::{escape, Context};
use crate::error::Error;
use crate::parser::input::is_name_start_char;
use crate::value::{Map, Value};

/// Layout of the produced text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Indentation unit. An empty string minifies the output: no newlines
    /// and no indentation at all. Defaults to two spaces.
    pub indent: String,
    /// Text longer than this (minus the current indentation width) is moved
    /// to its own line. Defaults to 128.
    pub breakline: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            breakline: 128,
        }
    }
}

impl FormatOptions {
    #[must_use]
    pub fn indent(mut self, indent: &str) -> Self {
        indent.clone_into(&mut self.indent);
        self
    }

    #[must_use]
    pub fn breakline(mut self, breakline: usize) -> Self {
        self.breakline = breakline;
        self
    }
}

/// Arguments handed to a custom [`Replacer`].
///
/// For an attribute or a text value, `key` is the attribute name (with its
/// `@` prefix) or `#text`, and `value` is the escaped value about to be
/// written. For a node, both are `None`.
#[derive(Debug, Clone, Copy)]
pub struct ReplaceArgs<'a> {
    /// The element name; `~xml` for the prolog and `~doctype` for the
    /// doctype.
    pub name: &'a str,
    pub key: Option<&'a str>,
    pub value: Option<&'a str>,
    /// The value being written.
    pub node: &'a Value,
}

/// A custom replacer.
///
/// Returning `None` omits the attribute, the text or the whole node. Any
/// other return value is written in place of the value (it is ignored for
/// nodes).
pub type Replacer = Arc<dyn Fn(ReplaceArgs<'_>) -> Option<Value> + Send + Sync>;

/// How values are rewritten before being written.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaceOptions {
    /// Escape all five predefined entities everywhere, not only the ones
    /// that would break the markup.
    pub entities: bool,
    /// Runs after escaping, for every attribute, text value and node.
    #[serde(skip)]
    pub custom: Option<Replacer>,
}

impl std::fmt::Debug for ReplaceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaceOptions")
            .field("entities", &self.entities)
            .field("custom", &self.custom.as_ref().map(|_| "..."))
            .finish()
    }
}

impl ReplaceOptions {
    #[must_use]
    pub fn entities(mut self, yes: bool) -> Self {
        self.entities = yes;
        self
    }

    /// Installs a custom replacer.
    #[must_use]
    pub fn custom(
        mut self,
        replacer: impl Fn(ReplaceArgs<'_>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.custom = Some(Arc::new(replacer));
        self
    }
}

/// Options controlling [`stringify_with_options`].
///
/// ```
/// use xmlshape::serial::{FormatOptions, StringifyOptions};
///
/// let opts = StringifyOptions::default().format(FormatOptions::default().indent(""));
/// assert_eq!(opts.format.breakline, 128);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StringifyOptions {
    pub format: FormatOptions,
    pub replace: ReplaceOptions,
}

impl StringifyOptions {
    #[must_use]
    pub fn format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn replace(mut self, replace: ReplaceOptions) -> Self {
        self.replace = replace;
        self
    }
}

/// Marks `text` as a CDATA section for [`stringify`].
///
/// ```
/// use xmlshape::{cdata, stringify, Map, Value};
///
/// let doc = Value::Object(Map::from([("string".to_string(), cdata("hello <world>"))]));
/// assert_eq!(stringify(&doc).unwrap(), "<string><![CDATA[hello <world>]]></string>");
/// ```
#[must_use]
pub fn cdata(text: impl Into<String>) -> Value {
    Value::CData(text.into())
}

/// Marks `text` as a comment for [`stringify`].
#[must_use]
pub fn comment(text: impl Into<String>) -> Value {
    Value::Comment(text.into())
}

/// Serializes a document value with default options.
///
/// # Errors
///
/// Returns [`Error::Syntax`] unless the document has exactly one root element.
///
/// # Examples
///
/// ```
/// let doc = xmlshape::parse_str("<root><a>1</a><a>2</a></root>").unwrap();
/// let xml = xmlshape::stringify(&doc).unwrap();
/// assert_eq!(xml, "<root>\n  <a>1</a>\n  <a>2</a>\n</root>");
/// ```
pub fn stringify(document: &Value) -> Result<String, Error> {
    stringify_with_options(document, &StringifyOptions::default())
}

/// Serializes a document value.
///
/// The prolog is written from the document's `@` attributes, followed by
/// `#instructions`, `#doctype`, document-level `#comments` and the single
/// root element. The output is trimmed.
///
/// # Errors
///
/// Returns [`Error::Syntax`] unless the document has exactly one root element.
pub fn stringify_with_options(document: &Value, options: &StringifyOptions) -> Result<String, Error> {
    let empty = Map::new();
    let map = document.as_object().unwrap_or(&empty);
    let mut roots = children(map).into_iter();
    let root = roots
        .next()
        .ok_or_else(|| Error::syntax("no root node detected"))?;
    if roots.next().is_some() {
        return Err(Error::syntax("multiple root node detected"));
    }
    log::debug!("stringifying <{}> with {:?}", root.name, options.format);

    let mut writer = Writer {
        options,
        out: String::new(),
    };
    writer.instruction("~xml", "xml", document, map);
    writer.instructions(map);
    if let Some(doctype) = map.get("#doctype") {
        writer.doctype(doctype);
    }
    let indent = options.format.indent.as_str();
    writer.comments(map, 0, indent);
    writer.element(&root, 0, indent);
    Ok(writer.out.trim().to_string())
}

/// A node to write, as found under a key of its parent.
#[derive(Debug, Clone, Copy)]
struct Child<'v> {
    name: &'v str,
    value: &'v Value,
}

/// Returns `true` for keys naming child elements rather than attributes or
/// metadata. Keys that cannot start a tag name are skipped.
fn is_child_key(key: &str) -> bool {
    key.chars().next().is_some_and(is_name_start_char)
}

/// Lists the child elements of `map`, arrays expanded into siblings.
fn children(map: &Map) -> Vec<Child<'_>> {
    map.iter()
        .filter(|(key, _)| is_child_key(key))
        .flat_map(|(key, value)| {
            let values: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            values.into_iter().map(move |value| Child { name: key, value })
        })
        .collect()
}

/// The kind of a text payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Text,
    CData,
    Comment,
}

impl Leaf {
    fn of(value: &Value) -> Self {
        match value {
            Value::CData(_) => Self::CData,
            Value::Comment(_) => Self::Comment,
            _ => Self::Text,
        }
    }
}

struct Writer<'o> {
    options: &'o StringifyOptions,
    out: String,
}

impl Writer<'_> {
    fn newline(&mut self, indent: &str) {
        if !indent.is_empty() {
            self.out.push('\n');
        }
    }

    /// Runs the custom replacer's node hook. Returns `false` to skip the node.
    fn keep_node(&self, name: &str, node: &Value) -> bool {
        let Some(custom) = &self.options.replace.custom else {
            return true;
        };
        let keep = custom(ReplaceArgs {
            name,
            key: None,
            value: None,
            node,
        })
        .is_some();
        if !keep {
            log::debug!("replacer dropped <{name}>");
        }
        keep
    }

    /// Escapes `raw` and passes it through the custom replacer.
    fn replace(
        &self,
        name: &str,
        key: &str,
        raw: &str,
        context: Option<Context>,
        node: &Value,
    ) -> Option<String> {
        let all = self.options.replace.entities;
        let value = match context {
            Some(context) => escape(raw, context, all),
            None => raw.to_string(),
        };
        match &self.options.replace.custom {
            Some(custom) => custom(ReplaceArgs {
                name,
                key: Some(key),
                value: Some(&value),
                node,
            })
            .map(|value| value.to_text()),
            None => Some(value),
        }
    }

    /// Collects the `@` entries of `map` as escaped name/value pairs.
    fn attributes(&self, name: &str, map: &Map, node: &Value) -> Vec<(String, String)> {
        map.iter()
            .filter_map(|(key, value)| {
                let attribute = key.strip_prefix('@')?;
                let value = self.replace(
                    name,
                    key,
                    &value.to_text(),
                    Some(Context::Attribute),
                    node,
                )?;
                Some((attribute.to_string(), value))
            })
            .collect()
    }

    fn write_attributes(&mut self, attributes: &[(String, String)]) {
        for (name, value) in attributes {
            let _ = write!(self.out, " {name}=\"{value}\"");
        }
    }

    /// Renders a text payload, wrapped as CDATA or a comment if tagged so.
    fn text(&self, name: &str, value: &Value, node: &Value) -> Option<String> {
        let leaf = Leaf::of(value);
        let context = (leaf == Leaf::Text).then_some(Context::Text);
        let text = self.replace(name, "#text", &value.to_text(), context, node)?;
        Some(match leaf {
            Leaf::Text => text,
            Leaf::CData => format!("<![CDATA[{text}]]>"),
            Leaf::Comment => format!("<!--{text}-->"),
        })
    }

    /// Writes `<?target ...?>` unless no attribute survives. `name` is the
    /// name the replacer sees.
    fn instruction(&mut self, name: &str, target: &str, node: &Value, map: &Map) {
        let attributes = self.attributes(name, map, node);
        if attributes.is_empty() {
            return;
        }
        let _ = write!(self.out, "<?{target}");
        self.write_attributes(&attributes);
        self.out.push_str("?>");
        let options = self.options;
        self.newline(&options.format.indent);
    }

    fn instructions(&mut self, map: &Map) {
        let Some(Value::Object(instructions)) = map.get("#instructions") else {
            return;
        };
        for child in children(instructions) {
            if let Value::Object(attributes) = child.value {
                self.instruction(child.name, child.name, child.value, attributes);
            }
        }
    }

    fn doctype(&mut self, doctype: &Value) {
        let Value::Object(map) = doctype else {
            return;
        };
        let attributes = self.attributes("~doctype", map, doctype);
        let elements: Vec<(&str, String)> = children(map)
            .into_iter()
            .filter_map(|child| {
                let model = self.text(child.name, child.value, child.value)?;
                Some((child.name, model))
            })
            .collect();
        if attributes.is_empty() && elements.is_empty() {
            return;
        }

        let options = self.options;
        let indent = options.format.indent.as_str();
        self.out.push_str("<!DOCTYPE");
        for (name, _) in &attributes {
            let bare = name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
            if bare {
                let _ = write!(self.out, " {name}");
            } else {
                let _ = write!(self.out, " \"{name}\"");
            }
        }
        if !elements.is_empty() {
            if indent.is_empty() {
                self.out.push_str(" [");
            } else {
                let _ = write!(self.out, "\n{indent}[\n");
            }
            for (name, model) in &elements {
                let _ = write!(self.out, "{indent}<!ELEMENT {name} ({model})>");
                self.newline(indent);
            }
            self.out.push_str(indent);
            self.out.push(']');
            self.newline(indent);
        }
        self.out.push('>');
        self.newline(indent);
    }

    /// Writes the `#comments` of `map` one per line at `depth`.
    fn comments(&mut self, map: &Map, depth: usize, indent: &str) {
        for comment in comment_texts(map) {
            let _ = write!(self.out, "{}<!--{comment}-->", indent.repeat(depth));
            self.newline(indent);
        }
    }

    /// Writes one element at `depth`.
    ///
    /// `indent` is the indentation in effect where the element sits. Inside
    /// an `xml:space="preserve"` scope it is empty, so nothing is added to
    /// the element's content; `xml:space="default"` restores the configured
    /// indentation.
    fn element(&mut self, child: &Child<'_>, depth: usize, indent: &str) {
        let Child { name, value } = *child;
        if !self.keep_node(name, value) {
            return;
        }

        let empty = Map::new();
        let map = match value {
            Value::Object(map) => map,
            _ => &empty,
        };
        let attributes = self.attributes(name, map, value);
        let text = match value {
            Value::Object(map) => map.get("#text").and_then(|text| self.text(name, text, value)),
            Value::Null => None,
            scalar => self.text(name, scalar, value),
        }
        .filter(|text| !text.is_empty());
        let comments = comment_texts(map);
        let elements = children(map);

        let options = self.options;
        let inner = match map.get("@xml:space").and_then(Value::as_str) {
            Some("preserve") => "",
            Some("default") => options.format.indent.as_str(),
            _ => indent,
        };

        let _ = write!(self.out, "{}<{name}", indent.repeat(depth));
        self.write_attributes(&attributes);

        if text.is_none() && comments.is_empty() && elements.is_empty() {
            self.out.push_str("/>");
            self.newline(indent);
            return;
        }

        let text_width = text.as_ref().map_or(0, |text| text.chars().count());
        let block = !inner.is_empty()
            && (!elements.is_empty()
                || !comments.is_empty()
                || text_width + inner.len() * depth > options.format.breakline);

        self.out.push('>');
        if block {
            self.out.push('\n');
            let pad = inner.repeat(depth + 1);
            if let Some(text) = &text {
                let _ = writeln!(self.out, "{pad}{text}");
            }
            for comment in &comments {
                let _ = writeln!(self.out, "{pad}<!--{comment}-->");
            }
            for element in &elements {
                self.element(element, depth + 1, inner);
            }
            self.out.push_str(&inner.repeat(depth));
        } else {
            if let Some(text) = &text {
                self.out.push_str(text);
            }
            for comment in &comments {
                let _ = write!(self.out, "<!--{comment}-->");
            }
            for element in &elements {
                self.element(element, depth + 1, inner);
            }
        }
        let _ = write!(self.out, "</{name}>");
        self.newline(indent);
    }
}

/// Returns the `#comments` entries of `map`.
fn comment_texts(map: &Map) -> Vec<String> {
    match map.get("#comments") {
        Some(Value::Array(items)) => items.iter().map(Value::to_text).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.to_text()],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn value(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn minified() -> StringifyOptions {
        StringifyOptions::default().format(FormatOptions::default().indent(""))
    }

    #[test]
    fn test_flattened_shapes() {
        let doc = value(json!({
            "root": {
                "text": "hello",
                "array": ["world", "monde"],
                "number": 42,
                "boolean": true,
                "empty": null,
                "complex": { "@attribute": "value", "#text": "content" }
            }
        }));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<root>\n  <text>hello</text>\n  <array>world</array>\n  <array>monde</array>\n  \
             <number>42</number>\n  <boolean>true</boolean>\n  <empty/>\n  \
             <complex attribute=\"value\">content</complex>\n</root>"
        );
    }

    #[test]
    fn test_minified() {
        let doc = value(json!({ "foo": { "bar": "baz", "@a": 1 } }));
        assert_eq!(
            stringify_with_options(&doc, &minified()).unwrap(),
            "<foo a=\"1\"><bar>baz</bar></foo>"
        );
    }

    #[test]
    fn test_prolog_and_instructions() {
        let doc = value(json!({
            "@version": "1.0",
            "@encoding": "UTF-8",
            "#instructions": {
                "xml-stylesheet": { "@href": "styles.xsl", "@type": "text/xsl" },
                "empty": null
            },
            "root": null
        }));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <?xml-stylesheet href=\"styles.xsl\" type=\"text/xsl\"?>\n<root/>"
        );
    }

    #[test]
    fn test_doctype() {
        let doc = value(json!({
            "#doctype": { "@type": "", "@quoted attribute": "", "element": "value" },
            "root": null
        }));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<!DOCTYPE type \"quoted attribute\"\n  [\n  <!ELEMENT element (value)>\n  ]\n>\n<root/>"
        );
        assert_eq!(
            stringify_with_options(&doc, &minified()).unwrap(),
            "<!DOCTYPE type \"quoted attribute\" [<!ELEMENT element (value)>]><root/>"
        );
    }

    #[test]
    fn test_breakline() {
        let doc = value(json!({ "root": { "text": "0123456789" } }));
        let opts = StringifyOptions::default().format(FormatOptions::default().breakline(12));
        assert_eq!(
            stringify_with_options(&doc, &opts).unwrap(),
            "<root>\n  <text>0123456789</text>\n</root>"
        );
        let opts = StringifyOptions::default().format(FormatOptions::default().breakline(11));
        assert_eq!(
            stringify_with_options(&doc, &opts).unwrap(),
            "<root>\n  <text>\n    0123456789\n  </text>\n</root>"
        );
    }

    #[test]
    fn test_preserve_scope_is_never_broken() {
        let doc = value(json!({
            "text": {
                "@xml:space": "preserve",
                "#text": " hello ",
                "b": { "i": "world" }
            }
        }));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<text xml:space=\"preserve\"> hello <b><i>world</i></b></text>"
        );
    }

    #[test]
    fn test_comments_are_written_back() {
        let doc = value(json!({
            "#comments": ["top"],
            "root": { "#comments": ["first", "second"], "a": "x" }
        }));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<!--top-->\n<root>\n  <!--first-->\n  <!--second-->\n  <a>x</a>\n</root>"
        );
    }

    #[test]
    fn test_cdata_and_comment_leaves() {
        let mut nested = Map::new();
        nested.insert("string".to_string(), cdata("hello <world>"));
        nested.insert("note".to_string(), comment("a & b"));
        let doc = Value::Object(Map::from([("nested".to_string(), Value::Object(nested))]));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<nested>\n  <string><![CDATA[hello <world>]]></string>\n  <note><!--a & b--></note>\n</nested>"
        );
    }

    #[test]
    fn test_keys_that_cannot_start_a_tag_are_skipped() {
        let doc = value(json!({ "root": { "1x": "a", "-y": "b", "ok": "c", "_z": "d" } }));
        assert_eq!(
            stringify(&doc).unwrap(),
            "<root>\n  <ok>c</ok>\n  <_z>d</_z>\n</root>"
        );
        let err = stringify(&value(json!({ "1x": "a" }))).unwrap_err();
        assert!(err.to_string().contains("no root node"));
    }

    #[test]
    fn test_root_count() {
        let err = stringify(&value(json!({}))).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("no root node"));
        let err = stringify(&value(json!({ "root": null, "garbage": null }))).unwrap_err();
        assert!(err.to_string().contains("multiple root node"));
        let err = stringify(&value(json!({ "root": [1, 2] }))).unwrap_err();
        assert!(err.is_syntax());
        assert!(stringify(&Value::Null).is_err());
    }
}
