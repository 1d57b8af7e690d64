//! # View tree
//!
//! The editing view is a tree of a single element type tagged with a
//! category. The category decides how the writer treats an element:
//!
//! - `Container`: block-like, never split by attribute breaking
//! - `Attribute`: inline formatting (`<strong>`), split and merged freely;
//!   similar siblings are merged into one
//! - `Empty`: no children allowed (`<img>`)
//! - `Ui`: editor chrome, ignored when mapping positions
//! - `Raw`: markup rendered verbatim, opaque to the editor
//! - `Editable` / `Root`: editable regions and root editables
//!
//! Nodes live in an arena addressed by [`ViewNodeId`]. Every mutation marks
//! what it touched as dirty so the renderer only looks at those nodes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewNodeId(u32);

impl ViewNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementCategory {
    Container,
    Attribute,
    Empty,
    Ui,
    Raw,
    Editable,
    Root,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Container => "container",
            ElementCategory::Attribute => "attribute",
            ElementCategory::Empty => "empty",
            ElementCategory::Ui => "ui",
            ElementCategory::Raw => "raw",
            ElementCategory::Editable => "editable",
            ElementCategory::Root => "root",
        }
    }

    /// Categories that hold editable block content
    pub fn is_container_like(&self) -> bool {
        matches!(
            self,
            ElementCategory::Container | ElementCategory::Editable | ElementCategory::Root
        )
    }

    /// Categories that cannot have children added by the writer
    pub fn is_leaf(&self) -> bool {
        matches!(self, ElementCategory::Empty | ElementCategory::Ui | ElementCategory::Raw)
    }
}

/// Default priority of attribute elements
pub const DEFAULT_PRIORITY: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewElement {
    pub name: String,
    pub category: ElementCategory,
    pub attributes: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
    pub styles: BTreeMap<String, String>,

    /// Nesting order of attribute elements; lower priority wraps higher
    pub priority: i32,

    /// Attribute elements with an id only merge with elements of that id
    pub id: Option<String>,

    /// Markup of raw and UI elements
    pub html: Option<String>,

    /// Editor-only data, never rendered
    pub custom_properties: BTreeMap<String, Value>,
}

impl ViewElement {
    pub fn new(name: impl Into<String>, category: ElementCategory) -> Self {
        Self {
            name: name.into(),
            category,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            styles: BTreeMap::new(),
            priority: DEFAULT_PRIORITY,
            id: None,
            html: None,
            custom_properties: BTreeMap::new(),
        }
    }

    /// Set an attribute; `class` and `style` are split into their parts
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match key {
            "class" => {
                self.classes = value.split_whitespace().map(str::to_string).collect();
            }
            "style" => {
                self.styles = parse_styles(value);
            }
            _ => {
                self.attributes.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn remove_attribute(&mut self, key: &str) {
        match key {
            "class" => self.classes.clear(),
            "style" => self.styles.clear(),
            _ => {
                self.attributes.remove(key);
            }
        }
    }

    /// Attribute value as written in markup
    pub fn attribute(&self, key: &str) -> Option<String> {
        match key {
            "class" if !self.classes.is_empty() => Some(self.class_value()),
            "style" if !self.styles.is_empty() => Some(self.style_value()),
            "class" | "style" => None,
            _ => self.attributes.get(key).cloned(),
        }
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// All attributes as written in markup, `class` and `style` included
    pub fn all_attributes(&self) -> BTreeMap<String, String> {
        let mut all = self.attributes.clone();
        if !self.classes.is_empty() {
            all.insert("class".to_string(), self.class_value());
        }
        if !self.styles.is_empty() {
            all.insert("style".to_string(), self.style_value());
        }
        all
    }

    pub fn class_value(&self) -> String {
        self.classes.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    pub fn style_value(&self) -> String {
        self.styles
            .iter()
            .map(|(key, value)| format!("{key}:{value};"))
            .collect::<Vec<_>>()
            .join("")
    }

    /// Attribute elements that can be merged into one
    pub fn is_similar(&self, other: &ViewElement) -> bool {
        self.category == ElementCategory::Attribute
            && other.category == ElementCategory::Attribute
            && self.name == other.name
            && self.priority == other.priority
            && self.id == other.id
            && self.attributes == other.attributes
            && self.classes == other.classes
            && self.styles == other.styles
    }

    /// Identity used to order attribute elements of equal priority
    pub fn identity(&self) -> String {
        format!(
            "{}{}{}{}",
            self.name,
            self.attributes
                .iter()
                .map(|(k, v)| format!(" {k}=\"{v}\""))
                .collect::<String>(),
            self.class_value(),
            self.style_value()
        )
    }
}

pub fn parse_styles(value: &str) -> BTreeMap<String, String> {
    value
        .split(';')
        .filter_map(|declaration| {
            let (key, value) = declaration.split_once(':')?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone)]
enum ViewNodeKind {
    Element {
        element: ViewElement,
        children: Vec<ViewNodeId>,
    },
    Text(String),
    Fragment(Vec<ViewNodeId>),
}

#[derive(Debug, Clone)]
struct ViewNodeData {
    parent: Option<ViewNodeId>,
    kind: ViewNodeKind,
}

/// Nodes touched since the last render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtyNodes {
    pub children: BTreeSet<ViewNodeId>,
    pub attributes: BTreeSet<ViewNodeId>,
    pub texts: BTreeSet<ViewNodeId>,
}

impl DirtyNodes {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.attributes.is_empty() && self.texts.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewTree {
    nodes: Vec<ViewNodeData>,
    dirty: DirtyNodes,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: ViewNodeKind) -> ViewNodeId {
        let id = ViewNodeId(self.nodes.len() as u32);
        self.nodes.push(ViewNodeData { parent: None, kind });
        id
    }

    fn data(&self, id: ViewNodeId) -> &ViewNodeData {
        &self.nodes[id.index()]
    }

    fn data_mut(&mut self, id: ViewNodeId) -> &mut ViewNodeData {
        &mut self.nodes[id.index()]
    }

    pub fn create(&mut self, element: ViewElement) -> ViewNodeId {
        self.alloc(ViewNodeKind::Element {
            element,
            children: Vec::new(),
        })
    }

    pub fn create_element<'a>(
        &mut self,
        name: &str,
        category: ElementCategory,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> ViewNodeId {
        let mut element = ViewElement::new(name, category);
        for (key, value) in attributes {
            element.set_attribute(key, value);
        }
        self.create(element)
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> ViewNodeId {
        self.alloc(ViewNodeKind::Text(data.into()))
    }

    pub fn create_fragment(&mut self) -> ViewNodeId {
        self.alloc(ViewNodeKind::Fragment(Vec::new()))
    }

    pub fn element(&self, id: ViewNodeId) -> Option<&ViewElement> {
        match &self.data(id).kind {
            ViewNodeKind::Element { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Mutable element access; marks its attributes dirty
    pub(crate) fn element_mut(&mut self, id: ViewNodeId) -> Option<&mut ViewElement> {
        if self.is_element(id) {
            self.dirty.attributes.insert(id);
        }
        match &mut self.data_mut(id).kind {
            ViewNodeKind::Element { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: ViewNodeId) -> bool {
        matches!(self.data(id).kind, ViewNodeKind::Element { .. })
    }

    pub fn is_text(&self, id: ViewNodeId) -> bool {
        matches!(self.data(id).kind, ViewNodeKind::Text(_))
    }

    pub fn is_fragment(&self, id: ViewNodeId) -> bool {
        matches!(self.data(id).kind, ViewNodeKind::Fragment(_))
    }

    pub fn text(&self, id: ViewNodeId) -> Option<&str> {
        match &self.data(id).kind {
            ViewNodeKind::Text(data) => Some(data),
            _ => None,
        }
    }

    pub fn name(&self, id: ViewNodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    pub fn category(&self, id: ViewNodeId) -> Option<ElementCategory> {
        self.element(id).map(|element| element.category)
    }

    pub fn is_category(&self, id: ViewNodeId, category: ElementCategory) -> bool {
        self.category(id) == Some(category)
    }

    pub fn is_attribute_element(&self, id: ViewNodeId) -> bool {
        self.is_category(id, ElementCategory::Attribute)
    }

    pub fn children(&self, id: ViewNodeId) -> &[ViewNodeId] {
        match &self.data(id).kind {
            ViewNodeKind::Element { children, .. } | ViewNodeKind::Fragment(children) => children,
            ViewNodeKind::Text(_) => &[],
        }
    }

    fn children_mut(&mut self, id: ViewNodeId) -> Option<&mut Vec<ViewNodeId>> {
        match &mut self.data_mut(id).kind {
            ViewNodeKind::Element { children, .. } | ViewNodeKind::Fragment(children) => Some(children),
            ViewNodeKind::Text(_) => None,
        }
    }

    pub fn child_count(&self, id: ViewNodeId) -> usize {
        self.children(id).len()
    }

    pub fn is_empty(&self, id: ViewNodeId) -> bool {
        self.max_offset(id) == 0
    }

    /// Character count of a text, child count otherwise
    pub fn max_offset(&self, id: ViewNodeId) -> usize {
        match &self.data(id).kind {
            ViewNodeKind::Text(data) => data.chars().count(),
            _ => self.child_count(id),
        }
    }

    pub fn parent(&self, id: ViewNodeId) -> Option<ViewNodeId> {
        self.data(id).parent
    }

    pub fn index_in_parent(&self, id: ViewNodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Ancestors from the top down, not including `id`
    pub fn ancestors(&self, id: ViewNodeId) -> Vec<ViewNodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors.reverse();
        ancestors
    }

    pub fn root_of(&self, id: ViewNodeId) -> ViewNodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    pub fn is_ancestor_of(&self, ancestor: ViewNodeId, node: ViewNodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Closest ancestor (or self) that is not an attribute element or text
    pub fn container_of(&self, id: ViewNodeId) -> ViewNodeId {
        let mut current = id;
        while self.is_text(current) || self.is_attribute_element(current) {
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    pub fn descendants(&self, id: ViewNodeId) -> Vec<ViewNodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<ViewNodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of a subtree
    pub fn text_content(&self, id: ViewNodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.children(id).iter().map(|&child| self.text_content(child)).collect()
    }

    /// Shallow copy of an element, without children
    pub fn clone_element(&mut self, id: ViewNodeId) -> Option<ViewNodeId> {
        let element = self.element(id)?.clone();
        Some(self.create(element))
    }

    /// Deep copy of a subtree
    pub fn clone_deep(&mut self, id: ViewNodeId) -> ViewNodeId {
        let copy = match &self.data(id).kind {
            ViewNodeKind::Text(data) => return self.create_text(data.clone()),
            ViewNodeKind::Element { element, .. } => {
                let element = element.clone();
                self.create(element)
            }
            ViewNodeKind::Fragment(_) => self.create_fragment(),
        };
        let children: Vec<ViewNodeId> = self.children(id).to_vec();
        let copies: Vec<ViewNodeId> = children.into_iter().map(|child| self.clone_deep(child)).collect();
        self.insert_children(copy, 0, copies);
        copy
    }

    pub fn is_similar(&self, a: ViewNodeId, b: ViewNodeId) -> bool {
        match (self.element(a), self.element(b)) {
            (Some(a), Some(b)) => a.is_similar(b),
            _ => false,
        }
    }

    pub(crate) fn insert_children(&mut self, parent: ViewNodeId, index: usize, nodes: Vec<ViewNodeId>) {
        for &node in &nodes {
            if let Some(old_parent) = self.parent(node) {
                self.detach(old_parent, node);
            }
            self.data_mut(node).parent = Some(parent);
        }
        if let Some(children) = self.children_mut(parent) {
            let index = index.min(children.len());
            children.splice(index..index, nodes);
        }
        self.dirty.children.insert(parent);
    }

    pub(crate) fn append_child(&mut self, parent: ViewNodeId, node: ViewNodeId) {
        let index = self.child_count(parent);
        self.insert_children(parent, index, vec![node]);
    }

    fn detach(&mut self, parent: ViewNodeId, node: ViewNodeId) {
        if let Some(children) = self.children_mut(parent) {
            children.retain(|&child| child != node);
        }
        self.data_mut(node).parent = None;
        self.dirty.children.insert(parent);
    }

    pub(crate) fn remove_children(&mut self, parent: ViewNodeId, index: usize, count: usize) -> Vec<ViewNodeId> {
        let removed: Vec<ViewNodeId> = match self.children_mut(parent) {
            Some(children) => {
                let end = (index + count).min(children.len());
                let index = index.min(end);
                children.drain(index..end).collect()
            }
            None => Vec::new(),
        };
        for &node in &removed {
            self.data_mut(node).parent = None;
        }
        self.dirty.children.insert(parent);
        removed
    }

    pub(crate) fn remove_node(&mut self, node: ViewNodeId) {
        if let Some(parent) = self.parent(node) {
            self.detach(parent, node);
        }
    }

    pub(crate) fn set_text(&mut self, id: ViewNodeId, data: String) {
        if let ViewNodeKind::Text(text) = &mut self.data_mut(id).kind {
            *text = data;
            self.dirty.texts.insert(id);
        }
    }

    pub fn dirty(&self) -> &DirtyNodes {
        &self.dirty
    }

    /// Take everything marked since the last call
    pub fn take_dirty(&mut self) -> DirtyNodes {
        std::mem::take(&mut self.dirty)
    }

    /// Mark a subtree so the next render reconciles it from scratch
    pub fn mark_to_sync(&mut self, id: ViewNodeId) {
        if self.is_text(id) {
            self.dirty.texts.insert(id);
        } else {
            self.dirty.children.insert(id);
            self.dirty.attributes.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_and_style_are_split() {
        let mut element = ViewElement::new("p", ElementCategory::Container);
        element.set_attribute("class", "b a");
        element.set_attribute("style", "color: red; margin:0");
        assert_eq!(element.attribute("class").as_deref(), Some("a b"));
        assert_eq!(element.styles.get("color").map(String::as_str), Some("red"));
        assert_eq!(element.attribute("style").as_deref(), Some("color:red;margin:0;"));
        assert_eq!(element.all_attributes().len(), 2);
    }

    #[test]
    fn test_insert_marks_dirty_and_reparents() {
        let mut tree = ViewTree::new();
        let a = tree.create_element("p", ElementCategory::Container, []);
        let b = tree.create_element("p", ElementCategory::Container, []);
        let text = tree.create_text("foo");

        tree.append_child(a, text);
        assert_eq!(tree.parent(text), Some(a));
        tree.append_child(b, text);
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[text]);

        let dirty = tree.take_dirty();
        assert!(dirty.children.contains(&a) && dirty.children.contains(&b));
        assert!(tree.dirty().is_empty());
    }

    #[test]
    fn test_similar_attribute_elements() {
        let mut tree = ViewTree::new();
        let a = tree.create_element("strong", ElementCategory::Attribute, []);
        let b = tree.create_element("strong", ElementCategory::Attribute, []);
        let c = tree.create_element("strong", ElementCategory::Attribute, [("class", "x")]);
        assert!(tree.is_similar(a, b));
        assert!(!tree.is_similar(a, c));
    }

    #[test]
    fn test_clone_deep() {
        let mut tree = ViewTree::new();
        let p = tree.create_element("p", ElementCategory::Container, [("class", "x")]);
        let text = tree.create_text("ab");
        tree.append_child(p, text);
        let copy = tree.clone_deep(p);
        assert_ne!(copy, p);
        assert_eq!(tree.text_content(copy), "ab");
        assert!(tree.element(copy).unwrap().classes.contains("x"));
    }
}
