//! # In-memory DOM
//!
//! Stands in for the browser DOM: an arena of elements, texts, comments and
//! fragments the renderer patches, plus the DOM selection. Serializes to and
//! parses from HTML.

use std::collections::BTreeMap;

use folio_common::{decode_entities, escape_attribute, escape_text, tokenize, MarkupToken};

use crate::errors::HtmlError;

/// Elements that never have children or an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomNodeId(u32);

#[derive(Debug, Clone, PartialEq)]
pub enum DomNodeKind {
    Element {
        name: String,
        attributes: BTreeMap<String, String>,
        children: Vec<DomNodeId>,
    },
    Text(String),
    Comment(String),
    Fragment(Vec<DomNodeId>),
}

#[derive(Debug, Clone)]
struct DomNode {
    parent: Option<DomNodeId>,
    kind: DomNodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPosition {
    pub node: DomNodeId,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomSelection {
    pub anchor: Option<DomPosition>,
    pub focus: Option<DomPosition>,
    /// Label of the hidden container used for a fake selection
    pub fake_label: Option<String>,
}

impl DomSelection {
    pub fn is_collapsed(&self) -> bool {
        self.anchor.is_some() && self.anchor == self.focus
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomTree {
    nodes: Vec<DomNode>,
    pub selection: DomSelection,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: DomNodeKind) -> DomNodeId {
        let id = DomNodeId(self.nodes.len() as u32);
        self.nodes.push(DomNode { parent: None, kind });
        id
    }

    pub fn create_element(&mut self, name: &str) -> DomNodeId {
        self.alloc(DomNodeKind::Element {
            name: name.to_string(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        })
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> DomNodeId {
        self.alloc(DomNodeKind::Text(data.into()))
    }

    pub fn create_comment(&mut self, data: &str) -> DomNodeId {
        self.alloc(DomNodeKind::Comment(data.to_string()))
    }

    pub fn create_fragment(&mut self) -> DomNodeId {
        self.alloc(DomNodeKind::Fragment(Vec::new()))
    }

    pub fn kind(&self, id: DomNodeId) -> &DomNodeKind {
        &self.nodes[id.0 as usize].kind
    }

    pub fn name(&self, id: DomNodeId) -> Option<&str> {
        match self.kind(id) {
            DomNodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: DomNodeId) -> bool {
        matches!(self.kind(id), DomNodeKind::Element { .. })
    }

    pub fn is_text(&self, id: DomNodeId) -> bool {
        matches!(self.kind(id), DomNodeKind::Text(_))
    }

    pub fn text(&self, id: DomNodeId) -> Option<&str> {
        match self.kind(id) {
            DomNodeKind::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: DomNodeId, data: impl Into<String>) {
        if let DomNodeKind::Text(text) = &mut self.nodes[id.0 as usize].kind {
            *text = data.into();
        }
    }

    pub fn attributes(&self, id: DomNodeId) -> Option<&BTreeMap<String, String>> {
        match self.kind(id) {
            DomNodeKind::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn attribute(&self, id: DomNodeId, key: &str) -> Option<&str> {
        self.attributes(id)?.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: DomNodeId, key: &str, value: &str) {
        if let DomNodeKind::Element { attributes, .. } = &mut self.nodes[id.0 as usize].kind {
            attributes.insert(key.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, id: DomNodeId, key: &str) {
        if let DomNodeKind::Element { attributes, .. } = &mut self.nodes[id.0 as usize].kind {
            attributes.remove(key);
        }
    }

    pub fn children(&self, id: DomNodeId) -> &[DomNodeId] {
        match self.kind(id) {
            DomNodeKind::Element { children, .. } | DomNodeKind::Fragment(children) => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self, id: DomNodeId) -> Option<&mut Vec<DomNodeId>> {
        match &mut self.nodes[id.0 as usize].kind {
            DomNodeKind::Element { children, .. } | DomNodeKind::Fragment(children) => Some(children),
            _ => None,
        }
    }

    pub fn parent(&self, id: DomNodeId) -> Option<DomNodeId> {
        self.nodes[id.0 as usize].parent
    }

    pub fn index_in_parent(&self, id: DomNodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn insert_child(&mut self, parent: DomNodeId, index: usize, node: DomNodeId) {
        self.remove(node);
        self.nodes[node.0 as usize].parent = Some(parent);
        if let Some(children) = self.children_mut(parent) {
            let index = index.min(children.len());
            children.insert(index, node);
        }
    }

    pub fn append_child(&mut self, parent: DomNodeId, node: DomNodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, node);
    }

    /// Detach a node from its parent
    pub fn remove(&mut self, node: DomNodeId) {
        if let Some(parent) = self.parent(node) {
            if let Some(children) = self.children_mut(parent) {
                children.retain(|&child| child != node);
            }
            self.nodes[node.0 as usize].parent = None;
        }
    }

    /// Replace all children of a node with the given list
    pub fn set_children(&mut self, parent: DomNodeId, nodes: Vec<DomNodeId>) {
        for child in self.children(parent).to_vec() {
            self.nodes[child.0 as usize].parent = None;
        }
        for &node in &nodes {
            self.remove(node);
            self.nodes[node.0 as usize].parent = Some(parent);
        }
        if let Some(children) = self.children_mut(parent) {
            *children = nodes;
        }
    }

    pub fn descendants(&self, id: DomNodeId) -> Vec<DomNodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<DomNodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn ancestors(&self, id: DomNodeId) -> Vec<DomNodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors
    }

    /// Markup of a node including itself
    pub fn outer_html(&self, id: DomNodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// Markup of the children of a node
    pub fn inner_html(&self, id: DomNodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: DomNodeId, out: &mut String) {
        match self.kind(id) {
            DomNodeKind::Text(data) => out.push_str(&escape_text(data)),
            DomNodeKind::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
            DomNodeKind::Fragment(children) => {
                for &child in children {
                    self.write_html(child, out);
                }
            }
            DomNodeKind::Element {
                name,
                attributes,
                children,
            } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(name) {
                    return;
                }
                for &child in children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    /// Parse markup into a new fragment.
    ///
    /// Void elements close themselves. An end tag closes the nearest open
    /// element of that name; end tags with no open element are ignored and
    /// elements left open at the end are closed.
    pub fn parse_html(&mut self, source: &str) -> Result<DomNodeId, HtmlError> {
        let fragment = self.create_fragment();
        let mut stack: Vec<(DomNodeId, String)> = vec![(fragment, String::new())];

        for spanned in tokenize(source)? {
            let parent = stack.last().map(|(node, _)| *node).unwrap_or(fragment);
            match spanned.token {
                MarkupToken::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let name = name.to_ascii_lowercase();
                    let element = self.create_element(&name);
                    for attribute in attributes {
                        let value = attribute.value.map(decode_entities).unwrap_or_default();
                        self.set_attribute(element, &attribute.name.to_ascii_lowercase(), &value);
                    }
                    self.append_child(parent, element);
                    if !self_closing && !is_void_element(&name) {
                        stack.push((element, name));
                    }
                }
                MarkupToken::EndTag { name } => {
                    let name = name.to_ascii_lowercase();
                    if let Some(index) = stack.iter().rposition(|(_, open)| *open == name) {
                        if index > 0 {
                            stack.truncate(index);
                        }
                    }
                }
                MarkupToken::Text(text) => {
                    let text = self.create_text(decode_entities(text).into_owned());
                    self.append_child(parent, text);
                }
                MarkupToken::Comment(data) => {
                    let comment = self.create_comment(data);
                    self.append_child(parent, comment);
                }
            }
        }
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let mut dom = DomTree::new();
        let fragment = dom
            .parse_html("<P class=\"a\">foo<br>b&amp;r<!-- c --></p><hr/>")
            .unwrap();
        assert_eq!(dom.children(fragment).len(), 2);
        assert_eq!(
            dom.inner_html(fragment),
            "<p class=\"a\">foo<br>b&amp;r<!-- c --></p><hr>"
        );
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let mut dom = DomTree::new();
        let fragment = dom.parse_html("<p><b>x</p></i>y").unwrap();
        assert_eq!(dom.inner_html(fragment), "<p><b>x</b></p>y");
    }

    #[test]
    fn test_set_children_reparents() {
        let mut dom = DomTree::new();
        let a = dom.create_element("p");
        let b = dom.create_element("p");
        let text = dom.create_text("x");
        dom.append_child(a, text);
        dom.set_children(b, vec![text]);
        assert!(dom.children(a).is_empty());
        assert_eq!(dom.parent(text), Some(b));
    }
}
