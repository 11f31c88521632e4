//! Arena-based raw document tree.
//!
//! The tree builder produces a [`Document`]: every node lives in a
//! contiguous `Vec<NodeData>` and is referenced by [`NodeId`], a newtype over
//! `NonZeroU32`. Parent links are plain ids, so upward lookups (inherited
//! `xml:space`, `~parent`) never hold ownership.
//!
//! Same-name children are grouped in [`Members`], which starts as a single
//! id and is promoted to a list on the second occurrence. The postprocessor
//! turns that grouping into the final scalar-or-array shape.

mod node;

pub use node::{Members, NodeKind};

use std::num::NonZeroU32;

use indexmap::IndexMap;

/// A typed index into the document's node arena.
///
/// `Option<NodeId>` has the same size as `NodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from an arena index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0 or does not fit in a `u32`.
    #[allow(clippy::expect_used)]
    fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).expect("node arena exceeds u32::MAX entries");
        Self(NonZeroU32::new(raw).expect("NodeId index must be non-zero"))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node in the arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node. Only the document node has none.
    pub parent: Option<NodeId>,
    /// Children in document order: elements and leaves, interleaved.
    pub children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// An attribute (or pseudo-attribute) as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute name, including any prefix (e.g. `xml:space`).
    pub name: String,
    /// The raw value. Entity references are left for revival.
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A raw XML document.
///
/// # Examples
///
/// ```
/// use xmlshape::parser::{build_tree, Mode};
///
/// let doc = build_tree("<root><child>Hello</child></root>", Mode::Xml).unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), "root");
/// assert_eq!(doc.text(root), "Hello");
/// ```
#[derive(Debug)]
pub struct Document {
    /// The node arena. Index 0 is an unused placeholder.
    nodes: Vec<NodeData>,
    root: NodeId,
    /// `version` from the XML declaration, when it matches `1.<digits>`.
    pub version: Option<String>,
    /// `encoding` from the XML declaration.
    pub encoding: Option<String>,
    /// `standalone` from the XML declaration (`yes` or `no`).
    pub standalone: Option<String>,
    /// The `<!DOCTYPE>` node, if any.
    pub doctype: Option<NodeId>,
    /// Processing instructions grouped by target, in order of first appearance.
    pub instructions: IndexMap<String, Members>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document holding only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            version: None,
            encoding: None,
            standalone: None,
            doctype: None,
            instructions: IndexMap::new(),
        }
    }

    /// Returns the document node (not the root element).
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the top-level element, if one was parsed.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&id| matches!(self.node(id).kind, NodeKind::Element { .. }))
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Number of nodes in the arena, the document node included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Iterates over every node id, the document node first.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (1..self.nodes.len()).map(NodeId::from_index)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root_element().is_none()
    }

    /// Returns the name of a node.
    ///
    /// Elements and instructions use their tag name; the other kinds use a
    /// reserved `~` name: `~xml` for the document, `~doctype`, `~text`,
    /// `~cdata` and `~comment`.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> &str {
        match &self.node(id).kind {
            NodeKind::Document => "~xml",
            NodeKind::Element { name, .. } | NodeKind::Instruction { name, .. } => name,
            NodeKind::Doctype { .. } => "~doctype",
            NodeKind::Text { .. } => "~text",
            NodeKind::CData { .. } => "~cdata",
            NodeKind::Comment { .. } => "~comment",
        }
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Returns the attributes of an element, instruction or doctype.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. }
            | NodeKind::Instruction { attributes, .. }
            | NodeKind::Doctype { attributes, .. } => attributes,
            _ => &[],
        }
    }

    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Returns the child elements of an element grouped by tag name.
    #[must_use]
    pub fn members(&self, id: NodeId) -> Option<&IndexMap<String, Members>> {
        match &self.node(id).kind {
            NodeKind::Element { members, .. } => Some(members),
            _ => None,
        }
    }

    /// Returns `true` if `id` is inside an `xml:space="preserve"` scope.
    ///
    /// Leaves answer for their parent element. The nearest `xml:space`
    /// attribute wins, so `xml:space="default"` ends an outer preserve scope.
    #[must_use]
    pub fn is_preserved(&self, id: NodeId) -> bool {
        let mut current = if self.node(id).kind.is_leaf() {
            self.parent(id)
        } else {
            Some(id)
        };
        while let Some(node) = current {
            match self.attribute(node, "xml:space") {
                Some("preserve") => return true,
                Some("default") => return false,
                _ => current = self.parent(node),
            }
        }
        false
    }

    /// Returns the derived text of a node.
    ///
    /// Text and CDATA leaves are collected along with the derived text of
    /// child elements; comments are skipped. Outside a preserve scope empty
    /// fragments are dropped and the rest joined with a single space. Inside
    /// one fragments are concatenated as-is, with a space inserted at a
    /// text/element boundary when neither side already has one.
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        let fragments = self.children(id).iter().filter_map(|&child| {
            match &self.node(child).kind {
                NodeKind::Text { content } | NodeKind::CData { content } => {
                    Some((true, content.clone()))
                }
                NodeKind::Element { .. } => Some((false, self.text(child))),
                _ => None,
            }
        });

        if !self.is_preserved(id) {
            return fragments
                .map(|(_, text)| text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }

        let mut text = String::new();
        let mut previous: Option<(bool, String)> = None;
        for (is_leaf, fragment) in fragments {
            if let Some((was_leaf, last)) = &previous {
                if *was_leaf != is_leaf && !last.ends_with(' ') && !fragment.starts_with(' ') {
                    text.push(' ');
                }
            }
            text.push_str(&fragment);
            previous = Some((is_leaf, fragment));
        }
        text
    }

    /// Returns `true` if the node has a direct text or CDATA leaf worth
    /// exposing: non-blank, or non-empty inside a preserve scope.
    #[must_use]
    pub fn has_text(&self, id: NodeId) -> bool {
        let preserved = self.is_preserved(id);
        self.children(id).iter().any(|&child| match &self.node(child).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => {
                !content.trim().is_empty() || (preserved && !content.is_empty())
            }
            _ => false,
        })
    }

    /// Returns the comments directly under a node, in document order.
    #[must_use]
    pub fn comments(&self, id: NodeId) -> Vec<&str> {
        self.children(id)
            .iter()
            .filter_map(|&child| match &self.node(child).kind {
                NodeKind::Comment { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    // -- Mutation (tree building) --

    /// Allocates a detached node.
    pub(crate) fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    /// Appends `child` as the last child of `parent`.
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Creates an element under `parent` and registers it by name.
    pub(crate) fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.create_node(NodeKind::Element {
            name: name.to_string(),
            attributes: Vec::new(),
            members: IndexMap::new(),
        });
        self.append_child(parent, id);
        if let NodeKind::Element { members, .. } = &mut self.node_mut(parent).kind {
            match members.get_mut(name) {
                Some(existing) => existing.push(id),
                None => {
                    members.insert(name.to_string(), Members::One(id));
                }
            }
        }
        id
    }

    /// Sets an attribute, replacing an earlier one with the same name.
    pub(crate) fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            match attributes.iter_mut().find(|attr| attr.name == name) {
                Some(attr) => value.clone_into(&mut attr.value),
                None => attributes.push(Attribute::new(name, value)),
            }
        }
    }

    /// Removes every direct child matching `predicate`.
    ///
    /// Removed elements are also dropped from their parent's members.
    pub(crate) fn retain_children(&mut self, id: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) {
        let (keep, dropped): (Vec<NodeId>, Vec<NodeId>) = self
            .children(id)
            .iter()
            .partition(|&&child| predicate(self, child));
        if dropped.is_empty() {
            return;
        }
        self.node_mut(id).children = keep;
        if let NodeKind::Element { members, .. } = &mut self.nodes[id.as_index()].kind {
            members.retain(|_, group| {
                let ids: Vec<NodeId> = group
                    .ids()
                    .iter()
                    .copied()
                    .filter(|member| !dropped.contains(member))
                    .collect();
                match ids.len() {
                    0 => false,
                    _ if !group.is_many() => true,
                    _ => {
                        *group = Members::Many(ids);
                        true
                    }
                }
            });
        }
        for child in dropped {
            self.node_mut(child).parent = None;
        }
    }

    /// Overwrites the payload of a text, CDATA or comment leaf.
    pub(crate) fn set_leaf_content(&mut self, id: NodeId, text: String) {
        if let NodeKind::Text { content } | NodeKind::CData { content } | NodeKind::Comment { content } =
            &mut self.node_mut(id).kind
        {
            *content = text;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(doc: &mut Document, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = doc.create_node(kind);
        doc.append_child(parent, id);
        id
    }

    fn text(doc: &mut Document, parent: NodeId, content: &str) -> NodeId {
        leaf(
            doc,
            parent,
            NodeKind::Text {
                content: content.to_string(),
            },
        )
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.node_name(doc.root()), "~xml");
        assert_eq!(doc.parent(doc.root()), None);
    }

    #[test]
    fn test_same_name_members_are_promoted() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "root");
        let first = doc.append_element(root, "child");
        assert_eq!(doc.members(root).unwrap()["child"], Members::One(first));
        let second = doc.append_element(root, "child");
        let other = doc.append_element(root, "other");
        let members = doc.members(root).unwrap();
        assert_eq!(members["child"], Members::Many(vec![first, second]));
        assert_eq!(members["other"].ids(), &[other]);
        assert_eq!(doc.children(root), &[first, second, other]);
        assert_eq!(doc.parent(second), Some(root));
    }

    #[test]
    fn test_set_attribute_overwrites() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "root");
        doc.set_attribute(root, "a", "1");
        doc.set_attribute(root, "b", "2");
        doc.set_attribute(root, "a", "3");
        assert_eq!(
            doc.attributes(root),
            &[Attribute::new("a", "3"), Attribute::new("b", "2")]
        );
        assert_eq!(doc.attribute(root, "b"), Some("2"));
        assert_eq!(doc.attribute(root, "c"), None);
    }

    #[test]
    fn test_text_joins_fragments() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "root");
        text(&mut doc, root, "some");
        let b = doc.append_element(root, "b");
        text(&mut doc, b, "bold");
        text(&mut doc, root, "");
        leaf(
            &mut doc,
            root,
            NodeKind::Comment {
                content: "ignored".to_string(),
            },
        );
        text(&mut doc, root, "text");
        assert_eq!(doc.text(root), "some bold text");
        assert_eq!(doc.comments(root), vec!["ignored"]);
    }

    #[test]
    fn test_text_in_preserve_scope() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "text");
        doc.set_attribute(root, "xml:space", "preserve");
        text(&mut doc, root, " hello");
        let b = doc.append_element(root, "b");
        text(&mut doc, b, "the");
        text(&mut doc, root, "  world ");
        assert!(doc.is_preserved(b));
        assert_eq!(doc.text(root), " hello the  world ");
    }

    #[test]
    fn test_preserve_scope_reset_by_default() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "root");
        doc.set_attribute(root, "xml:space", "preserve");
        let inner = doc.append_element(root, "inner");
        doc.set_attribute(inner, "xml:space", "default");
        let leaf = text(&mut doc, inner, " x ");
        assert!(doc.is_preserved(root));
        assert!(!doc.is_preserved(inner));
        assert!(!doc.is_preserved(leaf));
    }

    #[test]
    fn test_has_text() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "root");
        text(&mut doc, root, "   ");
        assert!(!doc.has_text(root));
        doc.set_attribute(root, "xml:space", "preserve");
        assert!(doc.has_text(root));
    }

    #[test]
    fn test_retain_children_updates_members() {
        let mut doc = Document::new();
        let root = doc.append_element(doc.root(), "root");
        let a = doc.append_element(root, "a");
        let b1 = doc.append_element(root, "b");
        let b2 = doc.append_element(root, "b");
        doc.retain_children(root, |doc, id| doc.node_name(id) != "a" && id != b1);
        assert_eq!(doc.children(root), &[b2]);
        let members = doc.members(root).unwrap();
        assert!(!members.contains_key("a"));
        assert_eq!(members["b"], Members::Many(vec![b2]));
        assert_eq!(doc.parent(a), None);
    }
}
