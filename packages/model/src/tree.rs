//! # Model tree arena
//!
//! Every element and text node of a document lives in one arena and is
//! addressed by a [`NodeId`]. Parent links are plain handles, so the tree has
//! no reference cycles and snapshots are cheap to take.
//!
//! Offsets inside a parent count one per element and one per character of a
//! text node. The mutation primitives below keep two invariants after every
//! call: no empty text node exists, and no two sibling text nodes carry the
//! same attribute set.
//!
//! Text nodes that disappear in a merge give their slot back to the arena;
//! the next allocation reuses it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Attributes, ElementNode, Node, TextNode, TEXT_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element { name: String, children: Vec<NodeId> },
    Text { data: String, len: usize },
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    attributes: Attributes,
    kind: NodeKind,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<NodeData>,
    free: Vec<NodeId>,
}

/// Byte index of the `chars`-th character of `s`
pub(crate) fn char_byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, attributes: Attributes, kind: NodeKind) -> NodeId {
        let data = NodeData {
            parent: None,
            attributes,
            kind,
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = data;
            return id;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    /// Give a detached text node's slot back
    fn release(&mut self, id: NodeId) {
        let data = self.data_mut(id);
        data.parent = None;
        data.attributes = Attributes::new();
        data.kind = NodeKind::Text {
            data: String::new(),
            len: 0,
        };
        self.free.push(id);
    }

    /// Slots in the arena, in use or free
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub fn create_element(&mut self, name: impl Into<String>, attributes: Attributes) -> NodeId {
        self.alloc(
            attributes,
            NodeKind::Element {
                name: name.into(),
                children: Vec::new(),
            },
        )
    }

    pub fn create_text(&mut self, data: impl Into<String>, attributes: Attributes) -> NodeId {
        let data = data.into();
        let len = data.chars().count();
        self.alloc(attributes, NodeKind::Text { data, len })
    }

    /// Materialize an owned node (and its subtree) in the arena
    pub fn create_from(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Text(text) => self.create_text(text.data.clone(), text.attributes.clone()),
            Node::Element(element) => {
                let id = self.create_element(element.name.clone(), element.attributes.clone());
                let children: Vec<NodeId> = element.children.iter().map(|c| self.create_from(c)).collect();
                for &child in &children {
                    self.data_mut(child).parent = Some(id);
                }
                if let NodeKind::Element { children: slot, .. } = &mut self.data_mut(id).kind {
                    *slot = children;
                }
                id
            }
        }
    }

    /// Owned snapshot of a subtree
    pub fn to_node(&self, id: NodeId) -> Node {
        let data = self.data(id);
        match &data.kind {
            NodeKind::Text { data: text, .. } => Node::Text(TextNode {
                data: text.clone(),
                attributes: data.attributes.clone(),
            }),
            NodeKind::Element { name, children } => Node::Element(ElementNode {
                name: name.clone(),
                attributes: data.attributes.clone(),
                children: children.iter().map(|&c| self.to_node(c)).collect(),
            }),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Text { .. })
    }

    /// Element name, `None` for text nodes
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text { .. } => None,
        }
    }

    /// Element name or `$text`
    pub fn item_name(&self, id: NodeId) -> &str {
        self.name(id).unwrap_or(TEXT_NAME)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Text { data, .. } => Some(data),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &Attributes {
        &self.data(id).attributes
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.data(id).attributes.get(key)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.data(id).kind {
            NodeKind::Element { children, .. } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    pub fn offset_size(&self, id: NodeId) -> usize {
        match &self.data(id).kind {
            NodeKind::Element { .. } => 1,
            NodeKind::Text { len, .. } => *len,
        }
    }

    pub fn max_offset(&self, id: NodeId) -> usize {
        self.children(id).iter().map(|&c| self.offset_size(c)).sum()
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Offset of the node in its parent
    pub fn start_offset(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let mut offset = 0;
        for &child in self.children(parent) {
            if child == id {
                return Some(offset);
            }
            offset += self.offset_size(child);
        }
        None
    }

    /// Child containing `offset` as `(index, child, child start offset)`
    pub fn child_at_offset(&self, parent: NodeId, offset: usize) -> Option<(usize, NodeId, usize)> {
        let mut start = 0;
        for (index, &child) in self.children(parent).iter().enumerate() {
            let end = start + self.offset_size(child);
            if offset < end {
                return Some((index, child, start));
            }
            start = end;
        }
        None
    }

    /// Index of the child containing `offset`, or the child count at the end
    pub fn offset_to_index(&self, parent: NodeId, offset: usize) -> usize {
        self.child_at_offset(parent, offset)
            .map(|(index, _, _)| index)
            .unwrap_or_else(|| self.children(parent).len())
    }

    /// Node starting exactly at `offset`
    pub fn node_after(&self, parent: NodeId, offset: usize) -> Option<NodeId> {
        match self.child_at_offset(parent, offset) {
            Some((_, child, start)) if start == offset => Some(child),
            _ => None,
        }
    }

    /// Node ending exactly at `offset`
    pub fn node_before(&self, parent: NodeId, offset: usize) -> Option<NodeId> {
        if offset == 0 {
            return None;
        }
        match self.child_at_offset(parent, offset - 1) {
            Some((_, child, start)) if start + self.offset_size(child) == offset => Some(child),
            _ => None,
        }
    }

    /// Text node that `offset` falls strictly inside of
    pub fn text_node_at(&self, parent: NodeId, offset: usize) -> Option<NodeId> {
        match self.child_at_offset(parent, offset) {
            Some((_, child, start)) if start < offset && self.is_text(child) => Some(child),
            _ => None,
        }
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Ancestors from the root down to the parent
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors.reverse();
        ancestors
    }

    /// Whether `ancestor` strictly contains `node`
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Offset path from the root. Empty for a root.
    pub fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(offset) = self.start_offset(current) {
            path.push(offset);
            current = match self.parent(current) {
                Some(parent) => parent,
                None => break,
            };
        }
        path.reverse();
        path
    }

    /// Element reached by following `parent_path` from `root`
    pub fn resolve_parent(&self, root: NodeId, parent_path: &[usize]) -> Option<NodeId> {
        let mut node = root;
        for &offset in parent_path {
            let (_, child, start) = self.child_at_offset(node, offset)?;
            if start != offset || !self.is_element(child) {
                return None;
            }
            node = child;
        }
        Some(node)
    }

    /// Pre-order descendants, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub(crate) fn set_name(&mut self, id: NodeId, new_name: &str) {
        if let NodeKind::Element { name, .. } = &mut self.data_mut(id).kind {
            *name = new_name.to_string();
        }
    }

    pub(crate) fn set_node_attribute(&mut self, id: NodeId, key: &str, value: Option<&Value>) {
        let attributes = &mut self.data_mut(id).attributes;
        match value {
            Some(value) => {
                attributes.insert(key.to_string(), value.clone());
            }
            None => {
                attributes.remove(key);
            }
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match &mut self.data_mut(id).kind {
            NodeKind::Element { children, .. } => Some(children),
            NodeKind::Text { .. } => None,
        }
    }

    /// Make `offset` fall on a node boundary, splitting a text node if
    /// needed. Returns the index of the first child starting at `offset`.
    pub(crate) fn split_text_at(&mut self, parent: NodeId, offset: usize) -> usize {
        let Some((index, child, start)) = self.child_at_offset(parent, offset) else {
            return self.children(parent).len();
        };
        if start == offset {
            return index;
        }

        let cut = offset - start;
        let attributes = self.data(child).attributes.clone();
        let tail = match &mut self.data_mut(child).kind {
            NodeKind::Text { data, len } => {
                let byte = char_byte_index(data, cut);
                *len = cut;
                data.split_off(byte)
            }
            NodeKind::Element { .. } => return index,
        };

        let new_text = self.create_text(tail, attributes);
        self.data_mut(new_text).parent = Some(parent);
        if let Some(children) = self.children_mut(parent) {
            children.insert(index + 1, new_text);
        }
        index + 1
    }

    /// Merge the children at `index - 1` and `index` if both are texts with
    /// equal attributes
    fn merge_texts_at(&mut self, parent: NodeId, index: usize) {
        if index == 0 {
            return;
        }
        let children = self.children(parent);
        let (Some(&left), Some(&right)) = (children.get(index - 1), children.get(index)) else {
            return;
        };
        if !self.is_text(left) || !self.is_text(right) || self.attributes(left) != self.attributes(right) {
            return;
        }

        let (right_data, right_len) = match &self.data(right).kind {
            NodeKind::Text { data, len } => (data.clone(), *len),
            NodeKind::Element { .. } => return,
        };
        if let NodeKind::Text { data, len } = &mut self.data_mut(left).kind {
            data.push_str(&right_data);
            *len += right_len;
        }
        if let Some(children) = self.children_mut(parent) {
            children.remove(index);
        }
        self.release(right);
    }

    /// Insert detached nodes at `offset` of `parent`
    pub(crate) fn insert_nodes(&mut self, parent: NodeId, offset: usize, nodes: Vec<NodeId>) {
        let (nodes, empty): (Vec<NodeId>, Vec<NodeId>) = nodes
            .into_iter()
            .partition(|&id| self.is_element(id) || self.offset_size(id) > 0);
        for id in empty {
            self.release(id);
        }
        if nodes.is_empty() {
            return;
        }

        let index = self.split_text_at(parent, offset);
        let count = nodes.len();
        for &node in &nodes {
            self.data_mut(node).parent = Some(parent);
        }
        if let Some(children) = self.children_mut(parent) {
            children.splice(index..index, nodes);
        }

        for i in (index..=index + count).rev() {
            self.merge_texts_at(parent, i);
        }
    }

    /// Detach the nodes between two offsets of `parent`
    pub(crate) fn remove_range(&mut self, parent: NodeId, start: usize, end: usize) -> Vec<NodeId> {
        if start >= end {
            return Vec::new();
        }
        let start_index = self.split_text_at(parent, start);
        let end_index = self.split_text_at(parent, end);

        let removed: Vec<NodeId> = match self.children_mut(parent) {
            Some(children) => children.drain(start_index..end_index).collect(),
            None => Vec::new(),
        };
        for &node in &removed {
            self.data_mut(node).parent = None;
        }

        self.merge_texts_at(parent, start_index);
        removed
    }

    /// Set (or remove, for `None`) an attribute on every node between two
    /// offsets of `parent`
    pub(crate) fn set_range_attribute(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        key: &str,
        value: Option<&Value>,
    ) {
        if start >= end {
            return;
        }
        let start_index = self.split_text_at(parent, start);
        let end_index = self.split_text_at(parent, end);

        let targets: Vec<NodeId> = self.children(parent)[start_index..end_index].to_vec();
        for node in targets {
            self.set_node_attribute(node, key, value);
        }

        for i in (start_index..=end_index).rev() {
            self.merge_texts_at(parent, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("bold".into(), Value::Bool(true));
        attributes
    }

    fn paragraph_with(tree: &mut Tree, texts: &[(&str, Attributes)]) -> NodeId {
        let paragraph = tree.create_element("paragraph", Attributes::new());
        let ids = texts
            .iter()
            .map(|(data, attrs)| tree.create_text(*data, attrs.clone()))
            .collect();
        tree.insert_nodes(paragraph, 0, ids);
        paragraph
    }

    fn texts(tree: &Tree, parent: NodeId) -> Vec<String> {
        tree.children(parent)
            .iter()
            .map(|&c| tree.text(c).unwrap_or("<element>").to_string())
            .collect()
    }

    #[test]
    fn test_insert_merges_equal_texts() {
        let mut tree = Tree::new();
        let paragraph = paragraph_with(&mut tree, &[("foo", Attributes::new())]);
        let text = tree.create_text("X", Attributes::new());
        tree.insert_nodes(paragraph, 1, vec![text]);

        assert_eq!(texts(&tree, paragraph), vec!["fXoo"]);
        assert_eq!(tree.max_offset(paragraph), 4);
    }

    #[test]
    fn test_insert_inside_text_with_other_attributes_splits() {
        let mut tree = Tree::new();
        let paragraph = paragraph_with(&mut tree, &[("foo", Attributes::new())]);
        let text = tree.create_text("X", bold());
        tree.insert_nodes(paragraph, 2, vec![text]);

        assert_eq!(texts(&tree, paragraph), vec!["fo", "X", "o"]);
    }

    #[test]
    fn test_remove_range_merges_remaining_texts() {
        let mut tree = Tree::new();
        let paragraph = paragraph_with(&mut tree, &[("ab", Attributes::new()), ("X", bold()), ("cd", Attributes::new())]);
        let removed = tree.remove_range(paragraph, 2, 3);

        assert_eq!(removed.len(), 1);
        assert_eq!(tree.parent(removed[0]), None);
        assert_eq!(texts(&tree, paragraph), vec!["abcd"]);
    }

    #[test]
    fn test_set_range_attribute_splits_and_merges() {
        let mut tree = Tree::new();
        let paragraph = paragraph_with(&mut tree, &[("abcd", Attributes::new())]);
        tree.set_range_attribute(paragraph, 1, 3, "bold", Some(&Value::Bool(true)));
        assert_eq!(texts(&tree, paragraph), vec!["a", "bc", "d"]);

        tree.set_range_attribute(paragraph, 0, 4, "bold", None);
        assert_eq!(texts(&tree, paragraph), vec!["abcd"]);
    }

    #[test]
    fn test_paths_and_resolution() {
        let mut tree = Tree::new();
        let root = tree.create_element("$root", Attributes::new());
        let first = paragraph_with(&mut tree, &[("foo", Attributes::new())]);
        let second = paragraph_with(&mut tree, &[("bar", Attributes::new())]);
        tree.insert_nodes(root, 0, vec![first, second]);

        let bar = tree.children(second)[0];
        assert_eq!(tree.path(bar), vec![1, 0]);
        assert_eq!(tree.resolve_parent(root, &[1]), Some(second));
        assert_eq!(tree.resolve_parent(root, &[1, 0]), None);
        assert_eq!(tree.node_after(second, 0), Some(bar));
        assert_eq!(tree.text_node_at(second, 1), Some(bar));
        assert_eq!(tree.node_before(second, 3), Some(bar));
        assert!(tree.is_ancestor_of(root, bar));
        assert_eq!(tree.descendants(root), vec![first, tree.children(first)[0], second, bar]);
    }

    #[test]
    fn test_merged_text_slots_are_reused() {
        let mut tree = Tree::new();
        let paragraph = paragraph_with(&mut tree, &[("a", Attributes::new())]);
        let before = tree.allocated();

        for i in 1..=50 {
            let text = tree.create_text("x", Attributes::new());
            tree.insert_nodes(paragraph, i, vec![text]);
        }
        let empty = tree.create_text("", Attributes::new());
        tree.insert_nodes(paragraph, 0, vec![empty]);

        assert_eq!(tree.max_offset(paragraph), 51);
        assert_eq!(texts(&tree, paragraph).len(), 1);
        assert_eq!(tree.allocated(), before + 1);
    }

    #[test]
    fn test_round_trip_through_owned_nodes() {
        let mut tree = Tree::new();
        let node = Node::element("paragraph").with_child(Node::text("foo").with_attribute("bold", true));
        let id = tree.create_from(&node);

        assert_eq!(tree.to_node(id), node);
        assert_eq!(tree.max_offset(id), 3);
    }
}
