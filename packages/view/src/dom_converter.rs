//! # DOM converter
//!
//! Translates between the view and the in-memory DOM and keeps the bindings
//! between view nodes and the DOM nodes rendered for them.
//!
//! ## Whitespace
//!
//! Text in the view holds plain spaces. On the way to the DOM, spaces that a
//! browser would collapse (at block edges, after another space) become
//! non-breaking spaces. On the way back, whitespace runs collapse to one
//! space, spaces at block edges are trimmed and the non-breaking spaces
//! written by the first step turn back into plain spaces.
//!
//! ## Fillers
//!
//! An empty container renders a block filler so it keeps its height: a
//! `<br data-cke-filler="true">` in the editing DOM, a `&nbsp;` in data.
//! A collapsed caret with no text next to it gets an inline filler text node
//! made of seven word joiners. Fillers never reach the view.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dom::{is_void_element, DomNodeId, DomNodeKind, DomPosition, DomTree};
use crate::node::{ElementCategory, ViewNodeId, ViewTree};
use crate::position::ViewPosition;

pub const INLINE_FILLER_LENGTH: usize = 7;
pub const INLINE_FILLER: &str = "\u{2060}\u{2060}\u{2060}\u{2060}\u{2060}\u{2060}\u{2060}";
pub const BLOCK_FILLER_ATTRIBUTE: &str = "data-cke-filler";
const NBSP: char = '\u{a0}';

/// Block-level HTML elements; whitespace never crosses their edges
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "center", "dd", "details", "dir", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup",
    "hr", "legend", "li", "main", "menu", "nav", "ol", "p", "pre", "section", "summary", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

pub fn is_block_element(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

pub fn starts_with_inline_filler(text: &str) -> bool {
    text.starts_with(INLINE_FILLER)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockFillerMode {
    #[default]
    Br,
    Nbsp,
}

/// Offset inside a view element where a block filler goes, if it needs one
pub fn filler_offset(tree: &ViewTree, element: ViewNodeId) -> Option<usize> {
    let category = tree.category(element)?;
    let children = tree.children(element);

    if category.is_container_like() {
        if let Some(&last) = children.last() {
            if tree.name(last) == Some("br") {
                return Some(children.len());
            }
        }
        return children
            .iter()
            .all(|&child| tree.is_category(child, ElementCategory::Ui))
            .then_some(children.len());
    }

    if category == ElementCategory::Attribute {
        if non_ui_count(tree, element) > 0 {
            return None;
        }
        let mut parent = tree.parent(element);
        while let Some(node) = parent {
            if !tree.is_attribute_element(node) {
                break;
            }
            if non_ui_count(tree, node) > 1 {
                return None;
            }
            parent = tree.parent(node);
        }
        let container = parent?;
        if non_ui_count(tree, container) > 1 {
            return None;
        }
        return Some(children.len());
    }
    None
}

fn non_ui_count(tree: &ViewTree, element: ViewNodeId) -> usize {
    tree.children(element)
        .iter()
        .filter(|&&child| !tree.is_category(child, ElementCategory::Ui))
        .count()
}

/// Inline content of a block collected while reading DOM text
enum InlineItem {
    Text(DomNodeId, String),
    Object { line_break: bool },
}

#[derive(Debug, Default)]
pub struct DomConverter {
    pub block_filler_mode: BlockFillerMode,
    view_to_dom: HashMap<ViewNodeId, DomNodeId>,
    dom_to_view: HashMap<DomNodeId, ViewNodeId>,
}

impl DomConverter {
    pub fn new(block_filler_mode: BlockFillerMode) -> Self {
        Self {
            block_filler_mode,
            ..Self::default()
        }
    }

    pub fn bind(&mut self, view: ViewNodeId, dom: DomNodeId) {
        self.view_to_dom.insert(view, dom);
        self.dom_to_view.insert(dom, view);
    }

    /// Drop bindings of a DOM node and its descendants
    pub fn unbind(&mut self, dom: &DomTree, node: DomNodeId) {
        let mut nodes = dom.descendants(node);
        nodes.push(node);
        for node in nodes {
            if let Some(view) = self.dom_to_view.remove(&node) {
                if self.view_to_dom.get(&view) == Some(&node) {
                    self.view_to_dom.remove(&view);
                }
            }
        }
    }

    pub fn map_view_to_dom(&self, view: ViewNodeId) -> Option<DomNodeId> {
        self.view_to_dom.get(&view).copied()
    }

    pub fn map_dom_to_view(&self, dom: DomNodeId) -> Option<ViewNodeId> {
        self.dom_to_view.get(&dom).copied()
    }

    pub fn create_block_filler(&self, dom: &mut DomTree) -> DomNodeId {
        match self.block_filler_mode {
            BlockFillerMode::Br => {
                let br = dom.create_element("br");
                dom.set_attribute(br, BLOCK_FILLER_ATTRIBUTE, "true");
                br
            }
            BlockFillerMode::Nbsp => dom.create_text(NBSP.to_string()),
        }
    }

    /// A `<br>` filler, or a lone `&nbsp;` filling a block element
    pub fn is_block_filler(&self, dom: &DomTree, node: DomNodeId) -> bool {
        if dom.name(node) == Some("br") {
            return dom.attribute(node, BLOCK_FILLER_ATTRIBUTE).is_some();
        }
        if dom.text(node) != Some("\u{a0}") {
            return false;
        }
        dom.parent(node).is_some_and(|parent| {
            dom.children(parent).len() == 1 && dom.name(parent).is_some_and(is_block_element)
        })
    }

    /// Create the DOM subtree for a view node
    pub fn view_to_dom(&mut self, view: &ViewTree, node: ViewNodeId, dom: &mut DomTree, bind: bool) -> DomNodeId {
        if view.is_text(node) {
            let text = dom.create_text(self.text_data(view, node));
            if bind {
                self.bind(node, text);
            }
            return text;
        }
        if view.is_fragment(node) {
            let fragment = dom.create_fragment();
            for &child in view.children(node) {
                let child = self.view_to_dom(view, child, dom, bind);
                dom.append_child(fragment, child);
            }
            return fragment;
        }

        let Some(element) = view.element(node) else {
            return dom.create_fragment();
        };
        let dom_element = dom.create_element(&element.name);
        for (key, value) in element.all_attributes() {
            dom.set_attribute(dom_element, &key, &value);
        }
        if bind {
            self.bind(node, dom_element);
        }

        if matches!(element.category, ElementCategory::Ui | ElementCategory::Raw) {
            if let Some(html) = &element.html {
                match dom.parse_html(html) {
                    Ok(fragment) => {
                        for child in dom.children(fragment).to_vec() {
                            dom.append_child(dom_element, child);
                        }
                    }
                    Err(error) => warn!(element = %element.name, %error, "skipping unparsable markup"),
                }
            }
            return dom_element;
        }

        for &child in view.children(node) {
            let child = self.view_to_dom(view, child, dom, bind);
            dom.append_child(dom_element, child);
        }
        if filler_offset(view, node).is_some() {
            let filler = self.create_block_filler(dom);
            dom.append_child(dom_element, filler);
        }
        dom_element
    }

    /// Data of a view text as written to the DOM
    pub fn text_data(&self, view: &ViewTree, text: ViewNodeId) -> String {
        let mut data = view.text(text).unwrap_or_default().to_string();
        let in_pre = view.ancestors(text).iter().any(|&ancestor| view.name(ancestor) == Some("pre"));
        if in_pre || data.is_empty() {
            return data;
        }

        if data.starts_with(' ') {
            let previous = touching_inline_node(view, text, false);
            let previous_ends_with_space = previous
                .and_then(|node| view.text(node))
                .is_some_and(|previous| previous.ends_with(' '));
            if previous.is_none() || previous_ends_with_space {
                data.replace_range(0..1, "\u{a0}");
            }
        }

        if data.ends_with(' ') {
            let next = touching_inline_node(view, text, true);
            let next_starts_with_space = next
                .and_then(|node| view.text(node))
                .is_some_and(|next| next.starts_with(' '));
            let before_last_is_space = data[..data.len() - 1].ends_with(' ');
            if before_last_is_space || next.is_none() || next_starts_with_space {
                data.replace_range(data.len() - 1.., "\u{a0}");
            }
        }

        data.replace("  ", " \u{a0}")
    }

    pub fn view_position_to_dom(&self, view: &ViewTree, dom: &DomTree, position: ViewPosition) -> Option<DomPosition> {
        if view.is_text(position.parent) {
            let node = self.map_view_to_dom(position.parent)?;
            let shift = if dom.text(node).is_some_and(starts_with_inline_filler) {
                INLINE_FILLER_LENGTH
            } else {
                0
            };
            return Some(DomPosition {
                node,
                offset: position.offset + shift,
            });
        }

        let dom_parent = self.map_view_to_dom(position.parent)?;
        if position.offset == 0 {
            if let Some(&first) = dom.children(dom_parent).first() {
                if dom.text(first).is_some_and(starts_with_inline_filler) {
                    return Some(DomPosition {
                        node: first,
                        offset: INLINE_FILLER_LENGTH,
                    });
                }
            }
            return Some(DomPosition {
                node: dom_parent,
                offset: 0,
            });
        }

        let dom_before = self.map_view_to_dom(position.node_before(view)?)?;
        if let Some(text) = dom.text(dom_before) {
            return Some(DomPosition {
                node: dom_before,
                offset: text.chars().count(),
            });
        }
        let index = dom.index_in_parent(dom_before)?;
        Some(DomPosition {
            node: dom_parent,
            offset: index + 1,
        })
    }

    /// Build a view subtree from DOM content. Fillers, comments and text
    /// that collapses to nothing produce no view nodes.
    pub fn dom_to_view(&self, dom: &DomTree, node: DomNodeId, view: &mut ViewTree) -> Option<ViewNodeId> {
        let mut texts = HashMap::new();
        let mut run = Vec::new();
        self.collect_inline(dom, node, false, &mut run, &mut texts);
        flush_inline(&mut run, &mut texts);
        self.build_view(dom, node, view, &texts)
    }

    fn build_view(
        &self,
        dom: &DomTree,
        node: DomNodeId,
        view: &mut ViewTree,
        texts: &HashMap<DomNodeId, String>,
    ) -> Option<ViewNodeId> {
        match dom.kind(node) {
            DomNodeKind::Comment(_) => None,
            DomNodeKind::Text(_) => {
                let data = texts.get(&node)?.replace('\u{2060}', "");
                (!data.is_empty()).then(|| view.create_text(data))
            }
            DomNodeKind::Fragment(children) => {
                let fragment = view.create_fragment();
                for &child in children {
                    if let Some(child) = self.build_view(dom, child, view, texts) {
                        view.append_child(fragment, child);
                    }
                }
                Some(fragment)
            }
            DomNodeKind::Element {
                name,
                attributes,
                children,
            } => {
                if self.is_block_filler(dom, node) {
                    return None;
                }
                let category = if is_void_element(name) {
                    ElementCategory::Empty
                } else if is_block_element(name) {
                    ElementCategory::Container
                } else {
                    ElementCategory::Attribute
                };
                let element = view.create_element(
                    name,
                    category,
                    attributes.iter().map(|(key, value)| (key.as_str(), value.as_str())),
                );
                for &child in children {
                    if let Some(child) = self.build_view(dom, child, view, texts) {
                        view.append_child(element, child);
                    }
                }
                Some(element)
            }
        }
    }

    fn collect_inline(
        &self,
        dom: &DomTree,
        node: DomNodeId,
        in_pre: bool,
        run: &mut Vec<InlineItem>,
        texts: &mut HashMap<DomNodeId, String>,
    ) {
        for &child in dom.children(node) {
            match dom.kind(child) {
                DomNodeKind::Text(data) => {
                    if in_pre {
                        texts.insert(child, data.clone());
                    } else if !self.is_block_filler(dom, child) {
                        run.push(InlineItem::Text(child, collapse_whitespace(data)));
                    }
                }
                DomNodeKind::Element { name, .. } => {
                    if is_block_element(name) {
                        flush_inline(run, texts);
                        self.collect_inline(dom, child, in_pre || name == "pre", run, texts);
                        flush_inline(run, texts);
                    } else if is_void_element(name) {
                        if !self.is_block_filler(dom, child) {
                            run.push(InlineItem::Object {
                                line_break: name == "br",
                            });
                        }
                    } else {
                        self.collect_inline(dom, child, in_pre, run, texts);
                    }
                }
                DomNodeKind::Fragment(_) => self.collect_inline(dom, child, in_pre, run, texts),
                DomNodeKind::Comment(_) => {}
            }
        }
    }
}

fn collapse_whitespace(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    let mut in_space = false;
    for ch in data.chars() {
        if matches!(ch, ' ' | '\n' | '\t' | '\r') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Trim and normalize the texts of one inline run
fn flush_inline(run: &mut Vec<InlineItem>, texts: &mut HashMap<DomNodeId, String>) {
    enum Previous {
        Start,
        Object { line_break: bool },
        Text { ends_with_space: bool },
    }

    let mut previous = Previous::Start;
    let count = run.len();
    for (index, item) in run.drain(..).enumerate() {
        match item {
            InlineItem::Object { line_break } => previous = Previous::Object { line_break },
            InlineItem::Text(node, mut data) => {
                let trim_start = match previous {
                    Previous::Start => true,
                    Previous::Object { line_break } => line_break,
                    Previous::Text { ends_with_space } => ends_with_space,
                };
                let trim_end = index + 1 == count;

                if trim_start && data.starts_with(' ') {
                    data.remove(0);
                }
                if trim_end && data.ends_with(' ') {
                    data.pop();
                }
                data = data.replace(" \u{a0}", "  ").replace("\u{a0} ", "  ");
                if trim_start && data.starts_with(NBSP) {
                    data.replace_range(0..NBSP.len_utf8(), " ");
                }
                if trim_end && data.ends_with(NBSP) {
                    data.replace_range(data.len() - NBSP.len_utf8().., " ");
                }

                if !data.is_empty() {
                    previous = Previous::Text {
                        ends_with_space: data.ends_with(' '),
                    };
                }
                texts.insert(node, data);
            }
        }
    }
}

/// Closest text or inline leaf in the same container, walking forward or
/// backward from a text node
fn touching_inline_node(tree: &ViewTree, text: ViewNodeId, forward: bool) -> Option<ViewNodeId> {
    let container = tree.container_of(text);
    let inline: Vec<ViewNodeId> = tree
        .descendants(container)
        .into_iter()
        .filter(|&node| {
            tree.is_text(node)
                || tree
                    .category(node)
                    .is_some_and(|category| matches!(category, ElementCategory::Empty | ElementCategory::Raw))
        })
        .collect();
    let index = inline.iter().position(|&node| node == text)?;
    if forward {
        inline.get(index + 1).copied()
    } else {
        index.checked_sub(1).and_then(|previous| inline.get(previous).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tree: &mut ViewTree, texts: &[&str]) -> (ViewNodeId, Vec<ViewNodeId>) {
        let p = tree.create_element("p", ElementCategory::Container, []);
        let ids = texts
            .iter()
            .map(|data| {
                let text = tree.create_text(*data);
                tree.append_child(p, text);
                text
            })
            .collect();
        (p, ids)
    }

    #[test]
    fn test_spaces_at_edges_become_nbsp() {
        let mut tree = ViewTree::new();
        let (_, ids) = paragraph(&mut tree, &[" foo  bar "]);
        let converter = DomConverter::default();
        assert_eq!(converter.text_data(&tree, ids[0]), "\u{a0}foo \u{a0}bar\u{a0}");
    }

    #[test]
    fn test_space_between_texts_is_kept() {
        let mut tree = ViewTree::new();
        let (_, ids) = paragraph(&mut tree, &["foo ", "bar"]);
        let converter = DomConverter::default();
        assert_eq!(converter.text_data(&tree, ids[0]), "foo ");
    }

    #[test]
    fn test_empty_container_gets_filler() {
        let mut tree = ViewTree::new();
        let (p, _) = paragraph(&mut tree, &[]);
        let mut dom = DomTree::new();
        let mut converter = DomConverter::new(BlockFillerMode::Br);
        let node = converter.view_to_dom(&tree, p, &mut dom, true);
        assert_eq!(dom.outer_html(node), "<p><br data-cke-filler=\"true\"></p>");
        assert_eq!(converter.map_view_to_dom(p), Some(node));

        let mut converter = DomConverter::new(BlockFillerMode::Nbsp);
        let node = converter.view_to_dom(&tree, p, &mut dom, false);
        assert_eq!(dom.outer_html(node), "<p>&nbsp;</p>");
    }

    #[test]
    fn test_dom_whitespace_is_collapsed() {
        let mut dom = DomTree::new();
        let fragment = dom
            .parse_html("<p>\n  foo   <b> bar</b>\n</p><p>&nbsp;</p><p>a&nbsp;</p>")
            .unwrap();
        let converter = DomConverter::default();
        let mut view = ViewTree::new();
        let root = converter.dom_to_view(&dom, fragment, &mut view).unwrap();

        let blocks = view.children(root).to_vec();
        assert_eq!(blocks.len(), 3);
        let first = view.children(blocks[0]).to_vec();
        assert_eq!(view.text(first[0]), Some("foo "));
        assert_eq!(view.text_content(first[1]), "bar");
        assert!(view.children(blocks[1]).is_empty());
        assert_eq!(view.text_content(blocks[2]), "a ");
    }
}
