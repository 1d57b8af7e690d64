//! Owned, serializable model nodes.
//!
//! These are the payload of insert operations and the result of
//! snapshotting a subtree. Inside a document nodes live in the arena
//! ([`crate::Tree`]); a `Node` is detached data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Attributes = BTreeMap<String, Value>;

/// Name reported for text items by the differ and conversion events
pub const TEXT_NAME: &str = "$text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub data: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Node::Element(ElementNode {
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        })
    }

    pub fn text(data: impl Into<String>) -> Self {
        Node::Text(TextNode {
            data: data.into(),
            attributes: Attributes::new(),
        })
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes_mut().insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes_mut().extend(attributes);
        self
    }

    /// Append a child. Has no effect on text nodes.
    pub fn with_child(mut self, child: Node) -> Self {
        if let Node::Element(element) = &mut self {
            element.children.push(child);
        }
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        if let Node::Element(element) = &mut self {
            element.children.extend(children);
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Element(element) => &element.name,
            Node::Text(_) => TEXT_NAME,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Node::Element(element) => &element.attributes,
            Node::Text(text) => &text.attributes,
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            Node::Element(element) => &mut element.attributes,
            Node::Text(text) => &mut text.attributes,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(element) => &element.children,
            Node::Text(_) => &[],
        }
    }

    /// Number of offsets the node occupies in its parent
    pub fn offset_size(&self) -> usize {
        match self {
            Node::Element(_) => 1,
            Node::Text(text) => text.data.chars().count(),
        }
    }
}

pub fn offset_size_of(nodes: &[Node]) -> usize {
    nodes.iter().map(Node::offset_size).sum()
}

/// Drop empty text nodes and merge adjacent texts with equal attributes,
/// recursively.
pub fn normalize_nodes(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());

    for node in nodes {
        match node {
            Node::Text(text) if text.data.is_empty() => {}
            Node::Text(text) => {
                if let Some(Node::Text(previous)) = out.last_mut() {
                    if previous.attributes == text.attributes {
                        previous.data.push_str(&text.data);
                        continue;
                    }
                }
                out.push(Node::Text(text));
            }
            Node::Element(mut element) => {
                element.children = normalize_nodes(std::mem::take(&mut element.children));
                out.push(Node::Element(element));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_size_counts_characters() {
        let nodes = vec![Node::text("żółw"), Node::element("paragraph"), Node::text("ab")];
        assert_eq!(offset_size_of(&nodes), 7);
    }

    #[test]
    fn test_normalize_merges_equal_texts() {
        let nodes = vec![
            Node::text("a"),
            Node::text(""),
            Node::text("b"),
            Node::text("c").with_attribute("bold", true),
            Node::element("paragraph").with_children([Node::text("x"), Node::text("y")]),
        ];
        let normalized = normalize_nodes(nodes);

        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0], Node::text("ab"));
        assert_eq!(normalized[2].children(), &[Node::text("xy")]);
    }

    #[test]
    fn test_serde_shape() {
        let node = Node::element("paragraph").with_child(Node::text("foo").with_attribute("bold", true));
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["type"], "element");
        assert_eq!(json["children"][0]["attributes"]["bold"], true);

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
