//! Tree builder.
//!
//! Replays a token sequence against a stack of open nodes and produces the
//! raw [`Document`]. The stack starts with the document node; a second
//! top-level element is rejected.

use crate::error::{Error, SyntaxError};
use crate::tree::{Attribute, Document, Members, NodeId, NodeKind};

use super::tokenizer::Token;

/// Builds a document from a complete token sequence.
pub(crate) fn build(tokens: &[Token]) -> Result<Document, Error> {
    if let Some(Token::Error { message, location }) =
        tokens.iter().find(|token| matches!(token, Token::Error { .. }))
    {
        return Err(SyntaxError::at(message.clone(), *location).into());
    }

    let mut builder = TreeBuilder::new();
    for token in tokens {
        builder.apply(token)?;
    }
    let doc = builder.doc;
    if doc.root_element().is_none() {
        return Err(Error::syntax("empty document or no root node detected"));
    }
    log::debug!("built tree of {} nodes from {} tokens", doc.len(), tokens.len());
    Ok(doc)
}

struct TreeBuilder {
    doc: Document,
    stack: Vec<NodeId>,
    has_root: bool,
}

impl TreeBuilder {
    fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            stack: vec![root],
            has_root: false,
        }
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn apply(&mut self, token: &Token) -> Result<(), Error> {
        match token {
            Token::Declaration(raw) => self.declaration(raw),
            Token::Doctype(raw) => self.doctype(raw),
            Token::Instruction { name, raw } => self.instruction(name, raw),
            Token::TagOpen(name) => {
                if self.stack.len() == 1 {
                    if self.has_root {
                        return Err(Error::syntax("multiple root node detected"));
                    }
                    self.has_root = true;
                }
                let id = self.doc.append_element(self.current(), name);
                self.stack.push(id);
            }
            Token::TagClose(_) => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
            }
            Token::TagAttribute { name, value } => {
                self.doc.set_attribute(self.current(), name, value);
            }
            Token::Text(content) => self.leaf(NodeKind::Text {
                content: content.clone(),
            }),
            Token::CData(content) => self.leaf(NodeKind::CData {
                content: content.clone(),
            }),
            Token::Comment(content) => self.leaf(NodeKind::Comment {
                content: content.clone(),
            }),
            Token::Error { message, location } => {
                return Err(SyntaxError::at(message.clone(), *location).into());
            }
        }
        Ok(())
    }

    fn leaf(&mut self, kind: NodeKind) {
        let id = self.doc.create_node(kind);
        self.doc.append_child(self.current(), id);
    }

    fn declaration(&mut self, raw: &str) {
        for Attribute { name, value } in pseudo_attributes(raw) {
            match name.as_str() {
                "version" if is_version(&value) => self.doc.version = Some(value),
                "encoding" if is_encoding_name(&value) => self.doc.encoding = Some(value),
                "standalone" if matches!(value.as_str(), "yes" | "no") => {
                    self.doc.standalone = Some(value);
                }
                _ => {}
            }
        }
    }

    fn doctype(&mut self, raw: &str) {
        let (attributes, elements) = parse_doctype(raw);
        let id = self
            .doc
            .create_node(NodeKind::Doctype { attributes, elements });
        self.doc.append_child(self.doc.root(), id);
        self.doc.doctype = Some(id);
    }

    fn instruction(&mut self, name: &str, raw: &str) {
        let id = self.doc.create_node(NodeKind::Instruction {
            name: name.to_string(),
            attributes: pseudo_attributes(raw),
        });
        self.doc.append_child(self.doc.root(), id);
        match self.doc.instructions.get_mut(name) {
            Some(existing) => existing.push(id),
            None => {
                self.doc
                    .instructions
                    .insert(name.to_string(), Members::One(id));
            }
        }
    }
}

/// `1.` followed by at least one digit.
fn is_version(value: &str) -> bool {
    value
        .strip_prefix("1.")
        .is_some_and(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()))
}

/// `[A-Za-z][A-Za-z0-9._-]*`
fn is_encoding_name(value: &str) -> bool {
    let mut bytes = value.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

fn is_pseudo_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_pseudo_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':')
}

/// Extracts `name="value"` pairs from declaration and instruction bodies.
///
/// Anything that does not have that shape is skipped. A later occurrence of
/// a name replaces the earlier one.
pub(crate) fn pseudo_attributes(raw: &str) -> Vec<Attribute> {
    let bytes = raw.as_bytes();
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match pseudo_attribute_at(raw, i) {
            Some((attribute, end)) => {
                match attributes.iter_mut().find(|a| a.name == attribute.name) {
                    Some(existing) => existing.value = attribute.value,
                    None => attributes.push(attribute),
                }
                i = end;
            }
            None => i += 1,
        }
    }
    attributes
}

fn pseudo_attribute_at(raw: &str, start: usize) -> Option<(Attribute, usize)> {
    let bytes = raw.as_bytes();
    if !is_pseudo_name_start(bytes[start]) {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len() && is_pseudo_name_char(bytes[i]) {
        i += 1;
    }
    let name = &raw[start..i];
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i += 1;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let quote = *bytes.get(i).filter(|b| matches!(b, b'"' | b'\''))?;
    let value_start = i + 1;
    let len = bytes[value_start..].iter().position(|&b| b == quote)?;
    let value = &raw[value_start..value_start + len];
    Some((Attribute::new(name, value), value_start + len + 1))
}

/// Splits a doctype body into its tokens and `<!ELEMENT>` entries.
///
/// `note SYSTEM "note.dtd" [<!ELEMENT to (#PCDATA)>]` yields the attributes
/// `note`, `SYSTEM` and `note.dtd` (all with empty values) and the element
/// `("to", "#PCDATA")`.
pub(crate) fn parse_doctype(raw: &str) -> (Vec<Attribute>, Vec<(String, String)>) {
    let (head, subset, tail) = match (raw.find('['), raw.rfind(']')) {
        (Some(open), Some(close)) if open < close => {
            (&raw[..open], Some(&raw[open + 1..close]), &raw[close + 1..])
        }
        _ => (raw, None, ""),
    };

    let mut attributes: Vec<Attribute> = Vec::new();
    for name in doctype_tokens(head).into_iter().chain(doctype_tokens(tail)) {
        if !attributes.iter().any(|attr| attr.name == name) {
            attributes.push(Attribute::new(name, ""));
        }
    }
    let elements = subset.map(element_declarations).unwrap_or_default();
    (attributes, elements)
}

/// Bare words and quoted strings, in order.
fn doctype_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while let Some(first) = rest.chars().next() {
        if first == '"' || first == '\'' {
            let body = &rest[1..];
            let Some(len) = body.find(first) else {
                tokens.extend(body.split_whitespace());
                break;
            };
            tokens.push(&body[..len]);
            rest = &body[len + 1..];
        } else {
            let len = rest
                .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
                .unwrap_or(rest.len());
            tokens.push(&rest[..len]);
            rest = &rest[len..];
        }
        rest = rest.trim_start();
    }
    tokens
}

/// Collects `<!ELEMENT name (model)>` declarations. Parentheses in the
/// content model may nest; the outer pair is stripped.
fn element_declarations(subset: &str) -> Vec<(String, String)> {
    const KEYWORD: &str = "<!ELEMENT";
    let mut elements = Vec::new();
    let mut rest = subset;
    while let Some(at) = rest.find(KEYWORD) {
        rest = &rest[at + KEYWORD.len()..];
        if let Some((name, model, consumed)) = element_declaration(rest) {
            elements.push((name.to_string(), model.to_string()));
            rest = &rest[consumed..];
        }
    }
    elements
}

fn element_declaration(text: &str) -> Option<(&str, &str, usize)> {
    let after_keyword = text.trim_start();
    if after_keyword.len() == text.len() {
        return None;
    }
    let name_len = after_keyword
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
        .unwrap_or(after_keyword.len());
    if name_len == 0 {
        return None;
    }
    let name = &after_keyword[..name_len];
    let model = after_keyword[name_len..].trim_start();
    if model.len() == after_keyword.len() - name_len || !model.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in model.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let consumed = text.len() - model.len() + i + 1;
                    return Some((name, &model[1..i], consumed));
                }
            }
            _ => {}
        }
    }
    None
}
