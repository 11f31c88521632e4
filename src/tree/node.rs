//! Node type definitions.
//!
//! The `NodeKind` enum carries the payload of each node in the raw document
//! tree. Navigation links (parent, children) live in `NodeData`.

use indexmap::IndexMap;

use super::{Attribute, NodeId};

/// The kind of a node and its associated data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The synthetic document root. There is exactly one per `Document`.
    Document,

    /// An element, e.g. `<item id="1">`.
    Element {
        /// The tag name, case-sensitive.
        name: String,
        /// Attributes in document order. Names are unique.
        attributes: Vec<Attribute>,
        /// Child elements grouped by tag name, in order of first appearance.
        members: IndexMap<String, Members>,
    },

    /// A processing instruction such as `<?xml-stylesheet href="a.css"?>`.
    Instruction {
        /// The instruction target.
        name: String,
        /// Pseudo-attributes found in the instruction body.
        attributes: Vec<Attribute>,
    },

    /// The `<!DOCTYPE ...>` declaration.
    Doctype {
        /// Bare and quoted tokens of the declaration, each with an empty value.
        attributes: Vec<Attribute>,
        /// `<!ELEMENT name (model)>` entries as `(name, model)` pairs.
        elements: Vec<(String, String)>,
    },

    /// Character data.
    Text {
        /// Raw text; entity references are decoded later, by revival.
        content: String,
    },

    /// A `<![CDATA[...]]>` section.
    CData {
        /// The section content, without delimiters.
        content: String,
    },

    /// A `<!-- ... -->` comment.
    Comment {
        /// The comment text, without delimiters.
        content: String,
    },
}

impl NodeKind {
    /// Returns `true` for text, CDATA and comment leaves.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Text { .. } | Self::CData { .. } | Self::Comment { .. }
        )
    }

    /// Returns the payload of a leaf.
    #[must_use]
    pub fn leaf_content(&self) -> Option<&str> {
        match self {
            Self::Text { content } | Self::CData { content } | Self::Comment { content } => {
                Some(content)
            }
            _ => None,
        }
    }
}

/// One node, or several nodes that share a name.
///
/// A name maps to `One` until it is seen a second time, at which point it is
/// promoted to `Many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Members {
    One(NodeId),
    Many(Vec<NodeId>),
}

impl Members {
    /// Adds `id`, promoting `One` to `Many`.
    pub fn push(&mut self, id: NodeId) {
        match self {
            Self::One(first) => *self = Self::Many(vec![*first, id]),
            Self::Many(ids) => ids.push(id),
        }
    }

    /// Returns the members in insertion order.
    #[must_use]
    pub fn ids(&self) -> &[NodeId] {
        match self {
            Self::One(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids,
        }
    }

    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }
}
