//! Turns a raw [`Document`] into the user-facing [`Value`].
//!
//! The tree is first cleaned and its leaves trimmed in place. A read-only
//! walk then builds one object per node:
//!
//! 1. attributes (`@name`), each revived, or all dropped by `clean.attributes`;
//! 2. child elements, processed recursively, same-name siblings as arrays;
//! 3. `#text`, present when the node has a non-blank text or CDATA leaf;
//! 4. `#comments`, present when the node has comment leaves;
//! 5. the custom reviver's node hook, which may discard the node;
//! 6. flattening of trivial objects into strings, plain maps or `null`.

mod revive;

pub use revive::{decode_entities, parse_number};

use crate::parser::{ParseOptions, ReviveArgs};
use crate::tree::{Document, Members, NodeId, NodeKind};
use crate::value::{Map, Value};

/// Cleans, revives and flattens `doc`.
///
/// Returns `Value::Null` if the custom reviver discards the document itself.
pub(crate) fn postprocess(doc: &mut Document, options: &ParseOptions) -> Value {
    clean(doc, options);
    if options.revive.trim {
        trim_leaves(doc);
    }
    let doc: &Document = doc;
    let processor = Processor { doc, options };
    processor.node(doc.root()).unwrap_or(Value::Null)
}

fn clean(doc: &mut Document, options: &ParseOptions) {
    let clean = &options.clean;
    if clean.instructions && clean.instruction_collisions && !doc.instructions.is_empty() {
        let names: Vec<String> = doc.instructions.keys().cloned().collect();
        log::debug!("dropping top-level elements named like instructions {names:?}");
        let root = doc.root();
        doc.retain_children(root, |doc, child| {
            !matches!(doc.node(child).kind, NodeKind::Element { .. })
                || !names.iter().any(|name| name == doc.node_name(child))
        });
    }
    if clean.comments {
        let parents: Vec<NodeId> = doc
            .node_ids()
            .filter(|&id| !doc.children(id).is_empty())
            .collect();
        for id in parents {
            doc.retain_children(id, |doc, child| {
                !matches!(doc.node(child).kind, NodeKind::Comment { .. })
            });
        }
    }
}

/// Trims every leaf outside a preserve scope.
fn trim_leaves(doc: &mut Document) {
    let leaves: Vec<(NodeId, String)> = doc
        .node_ids()
        .filter(|&id| !doc.is_preserved(id))
        .filter_map(|id| {
            let content = doc.node(id).kind.leaf_content()?;
            let trimmed = content.trim();
            (trimmed.len() != content.len()).then(|| (id, trimmed.to_string()))
        })
        .collect();
    for (id, trimmed) in leaves {
        doc.set_leaf_content(id, trimmed);
    }
}

struct Processor<'a> {
    doc: &'a Document,
    options: &'a ParseOptions,
}

impl Processor<'_> {
    fn node(&self, id: NodeId) -> Option<Value> {
        let map = match &self.doc.node(id).kind {
            NodeKind::Document => self.document_entries(id),
            NodeKind::Element { members, .. } => {
                let mut map = self.attribute_entries(id);
                let children = self.member_entries(members.iter());
                self.text_entries(id, &mut map);
                map.extend(children);
                map
            }
            NodeKind::Instruction { .. } => self.attribute_entries(id),
            NodeKind::Doctype { elements, .. } => {
                let mut map = self.attribute_entries(id);
                for (name, model) in elements {
                    map.insert(name.clone(), Value::String(model.clone()));
                }
                map
            }
            NodeKind::Text { .. } | NodeKind::CData { .. } | NodeKind::Comment { .. } => {
                return None;
            }
        };

        if let Some(custom) = &self.options.revive.custom {
            let args = ReviveArgs {
                name: self.doc.node_name(id),
                key: None,
                value: None,
                node: id,
                document: self.doc,
            };
            if custom(args).is_none() {
                log::debug!("reviver discarded <{}>", self.doc.node_name(id));
                return None;
            }
        }
        Some(self.flatten(map))
    }

    fn document_entries(&self, id: NodeId) -> Map {
        let doc = self.doc;
        let clean = &self.options.clean;
        let mut map = Map::new();

        if !clean.attributes {
            let declaration = [
                ("@version", &doc.version),
                ("@encoding", &doc.encoding),
                ("@standalone", &doc.standalone),
            ];
            for (key, value) in declaration {
                if let Some(raw) = value {
                    self.insert_revived(&mut map, id, key, raw, self.options.revive.trim);
                }
            }
        }

        if !clean.doctype {
            if let Some(doctype) = doc.doctype.and_then(|doctype| self.node(doctype)) {
                map.insert("#doctype".to_string(), doctype);
            }
        }

        if !clean.instructions {
            let instructions = self.member_entries(doc.instructions.iter());
            if !instructions.is_empty() {
                map.insert("#instructions".to_string(), Value::Object(instructions));
            }
        }

        self.comment_entries(id, &mut map);

        for &child in doc.children(id) {
            if matches!(doc.node(child).kind, NodeKind::Element { .. }) {
                if let Some(value) = self.node(child) {
                    map.insert(doc.node_name(child).to_string(), value);
                }
            }
        }
        map
    }

    fn attribute_entries(&self, id: NodeId) -> Map {
        let mut map = Map::new();
        if self.options.clean.attributes {
            return map;
        }
        for attribute in self.doc.attributes(id) {
            let key = format!("@{}", attribute.name);
            self.insert_revived(&mut map, id, &key, &attribute.value, self.options.revive.trim);
        }
        map
    }

    /// Processes grouped nodes. A group whose nodes were all discarded is
    /// left out; a promoted group stays an array.
    fn member_entries<'m>(&self, groups: impl Iterator<Item = (&'m String, &'m Members)>) -> Map {
        let mut map = Map::new();
        for (name, group) in groups {
            let value = match group {
                Members::One(id) => self.node(*id),
                Members::Many(ids) => {
                    let items: Vec<Value> = ids.iter().filter_map(|&id| self.node(id)).collect();
                    (!items.is_empty()).then_some(Value::Array(items))
                }
            };
            if let Some(value) = value {
                map.insert(name.clone(), value);
            }
        }
        map
    }

    fn text_entries(&self, id: NodeId, map: &mut Map) {
        if self.doc.has_text(id) {
            let trim = self.options.revive.trim && !self.doc.is_preserved(id);
            let text = self.doc.text(id);
            self.insert_revived(map, id, "#text", &text, trim);
        }
        self.comment_entries(id, map);
    }

    fn comment_entries(&self, id: NodeId, map: &mut Map) {
        let comments = self.doc.comments(id);
        if !comments.is_empty() {
            map.insert(
                "#comments".to_string(),
                Value::Array(comments.into_iter().map(Value::from).collect()),
            );
        }
    }

    /// Revives `raw` and stores it under `key` unless the custom reviver
    /// deletes it.
    fn insert_revived(&self, map: &mut Map, id: NodeId, key: &str, raw: &str, trim: bool) {
        let options = &self.options.revive;
        let is_version = key == "@version" && id == self.doc.root();
        let value = revive::revive(raw, trim, options, !is_version);
        let value = match &options.custom {
            Some(custom) => custom(ReviveArgs {
                name: self.doc.node_name(id),
                key: Some(key),
                value: Some(&value),
                node: id,
                document: self.doc,
            }),
            None => Some(value),
        };
        if let Some(value) = value {
            map.insert(key.to_string(), value);
        }
    }

    fn flatten(&self, mut map: Map) -> Value {
        let flatten = &self.options.flatten;
        if flatten.text && map.len() == 1 {
            if let Some(text) = map.shift_remove("#text") {
                return text;
            }
        }
        if flatten.attributes && !map.is_empty() && map.keys().all(|key| key.starts_with('@')) {
            return Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key[1..].to_string(), value))
                    .collect(),
            );
        }
        if map.is_empty() {
            return if flatten.empty {
                Value::Null
            } else if flatten.text {
                Value::String(String::new())
            } else {
                Value::Object(Map::from([("#text".to_string(), Value::String(String::new()))]))
            };
        }
        Value::Object(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{build_tree, CleanOptions, FlattenOptions, Mode, ReviveOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(input: &str, options: &ParseOptions) -> Value {
        let mut doc = build_tree(input, options.mode).unwrap();
        postprocess(&mut doc, options)
    }

    #[test]
    fn test_trim_pass_respects_preserve() {
        let mut doc = build_tree(
            "<r><a> x </a><b xml:space=\"preserve\"> y </b></r>",
            Mode::Xml,
        )
        .unwrap();
        trim_leaves(&mut doc);
        let root = doc.root_element().unwrap();
        let members = doc.members(root).unwrap();
        assert_eq!(doc.text(members["a"].ids()[0]), "x");
        assert_eq!(doc.text(members["b"].ids()[0]), " y ");
    }

    #[test]
    fn test_preserve_scope_reaches_nested_elements() {
        let value = run(
            "<text xml:space=\"preserve\"> hello<b> the</b>  world </text>",
            &ParseOptions::default(),
        );
        assert_eq!(
            value,
            json!({ "text": { "@xml:space": "preserve", "#text": " hello the  world ", "b": " the" } })
        );
    }

    #[test]
    fn test_key_order() {
        let value = run(
            "<r id=\"1\"><!--c--><child/>text</r>",
            &ParseOptions::default(),
        );
        let keys: Vec<&str> = value["r"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["@id", "#text", "#comments", "child"]);
    }

    #[test]
    fn test_clean_comments_everywhere() {
        let options = ParseOptions::default().clean(CleanOptions::default().comments(true));
        let value = run("<!--top--><r><!--a--><b><!--b-->x</b></r>", &options);
        assert_eq!(value, json!({ "r": { "b": "x" } }));
    }

    #[test]
    fn test_instruction_collisions() {
        let input = "<?r a=\"1\"?><r>x</r>";
        let only_instructions =
            ParseOptions::default().clean(CleanOptions::default().instructions(true));
        assert_eq!(run(input, &only_instructions), json!({ "r": "x" }));

        let with_collisions = ParseOptions::default().clean(
            CleanOptions::default()
                .instructions(true)
                .instruction_collisions(true),
        );
        assert_eq!(run(input, &with_collisions), Value::Null);
    }

    #[test]
    fn test_array_members_drop_discarded_entries() {
        let options = ParseOptions::default().revive(ReviveOptions::default().custom(|args| {
            if args.key.is_none() && args.document.text(args.node) == "drop" {
                return None;
            }
            Some(args.value.cloned().unwrap_or_default())
        }));
        let value = run("<r><i>drop</i><i>keep</i><j>drop</j><j>drop</j></r>", &options);
        assert_eq!(value, json!({ "r": { "i": ["keep"] } }));
    }

    #[test]
    fn test_discarded_document_is_null() {
        let options = ParseOptions::default().revive(ReviveOptions::default().custom(|args| {
            (args.name != "~xml").then(|| args.value.cloned().unwrap_or_default())
        }));
        assert_eq!(run("<r/>", &options), Value::Null);
    }

    #[test]
    fn test_flatten_empty_variants() {
        let input = "<r><e/></r>";
        let text_only = ParseOptions::default().flatten(FlattenOptions::default().empty(false));
        assert_eq!(run(input, &text_only), json!({ "r": { "e": "" } }));
        let none = ParseOptions::default().flatten(
            FlattenOptions::default().empty(false).text(false),
        );
        assert_eq!(
            run(input, &none),
            json!({ "r": { "e": { "#text": "" } } })
        );
    }
}
