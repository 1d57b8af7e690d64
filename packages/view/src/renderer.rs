//! # Renderer
//!
//! Brings the DOM in line with the view after a change. Only nodes the view
//! writer marked dirty are visited:
//!
//! 1. attributes of dirty elements are copied over
//! 2. children of dirty elements are reconciled with a sequence diff over
//!    node identity, reusing bound DOM nodes and creating the rest
//! 3. texts of dirty nodes (and of containers whose children changed, since
//!    space handling depends on neighbours) are rewritten when they differ
//! 4. the inline filler is placed where a collapsed caret has no text to
//!    sit in, and the DOM selection is set from the view selection

use std::collections::{BTreeSet, HashSet};

use similar::{capture_diff_slices, Algorithm, DiffOp};
use tracing::{debug, trace};

use crate::document::ViewDocument;
use crate::dom::{DomNodeId, DomPosition, DomSelection, DomTree};
use crate::dom_converter::{filler_offset, starts_with_inline_filler, DomConverter, INLINE_FILLER, INLINE_FILLER_LENGTH};
use crate::node::{ElementCategory, ViewNodeId, ViewTree};
use crate::position::{ViewPosition, ViewSelection};

/// Counts of DOM mutations made by one render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub inserted: usize,
    pub removed: usize,
    pub texts_updated: usize,
    pub attributes_updated: usize,
}

#[derive(Debug, Default)]
pub struct Renderer {
    inline_filler: Option<DomNodeId>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// DOM text node currently holding the inline filler
    pub fn inline_filler(&self) -> Option<DomNodeId> {
        self.inline_filler
    }

    pub fn render(&mut self, document: &mut ViewDocument, dom: &mut DomTree, converter: &mut DomConverter) -> RenderStats {
        let dirty = document.tree.take_dirty();
        let tree = &document.tree;
        let mut stats = RenderStats::default();

        self.remove_inline_filler(dom);

        for &element in &dirty.attributes {
            update_attributes(tree, element, dom, converter, &mut stats);
        }

        let mut texts: BTreeSet<ViewNodeId> = dirty.texts;
        for &element in &dirty.children {
            if converter.map_view_to_dom(element).is_none() {
                continue;
            }
            update_children(tree, element, dom, converter, &mut stats);
            let container = tree.container_of(element);
            texts.extend(tree.descendants(container).into_iter().filter(|&node| tree.is_text(node)));
        }

        for text in texts {
            let Some(dom_text) = converter.map_view_to_dom(text) else {
                continue;
            };
            let expected = converter.text_data(tree, text);
            if dom.text(dom_text) != Some(expected.as_str()) {
                dom.set_text(dom_text, expected);
                stats.texts_updated += 1;
            }
        }

        let filler_position = self.add_inline_filler(tree, &document.selection, dom, converter);
        update_selection(tree, &document.selection, filler_position, dom, converter);

        debug!(
            inserted = stats.inserted,
            removed = stats.removed,
            texts = stats.texts_updated,
            attributes = stats.attributes_updated,
            "rendered"
        );
        stats
    }

    fn remove_inline_filler(&mut self, dom: &mut DomTree) {
        let Some(filler) = self.inline_filler.take() else {
            return;
        };
        let Some(data) = dom.text(filler) else {
            return;
        };
        if data == INLINE_FILLER {
            dom.remove(filler);
        } else if starts_with_inline_filler(data) {
            let rest = data[INLINE_FILLER.len()..].to_string();
            dom.set_text(filler, rest);
        }
    }

    fn add_inline_filler(
        &mut self,
        tree: &ViewTree,
        selection: &ViewSelection,
        dom: &mut DomTree,
        converter: &DomConverter,
    ) -> Option<DomPosition> {
        let position = needs_inline_filler(tree, selection)?;
        let at = converter.view_position_to_dom(tree, dom, position)?;
        if dom.is_text(at.node) {
            return None;
        }
        let filler = dom.create_text(INLINE_FILLER);
        dom.insert_child(at.node, at.offset, filler);
        self.inline_filler = Some(filler);
        trace!(?position, "inline filler added");
        Some(DomPosition {
            node: filler,
            offset: INLINE_FILLER_LENGTH,
        })
    }
}

fn update_attributes(
    tree: &ViewTree,
    element: ViewNodeId,
    dom: &mut DomTree,
    converter: &DomConverter,
    stats: &mut RenderStats,
) {
    let (Some(view_element), Some(dom_element)) = (tree.element(element), converter.map_view_to_dom(element)) else {
        return;
    };
    let expected = view_element.all_attributes();
    let Some(actual) = dom.attributes(dom_element).cloned() else {
        return;
    };
    if actual == expected {
        return;
    }
    for key in actual.keys() {
        if !expected.contains_key(key) {
            dom.remove_attribute(dom_element, key);
        }
    }
    for (key, value) in &expected {
        if actual.get(key) != Some(value) {
            dom.set_attribute(dom_element, key, value);
        }
    }
    stats.attributes_updated += 1;
}

fn update_children(
    tree: &ViewTree,
    element: ViewNodeId,
    dom: &mut DomTree,
    converter: &mut DomConverter,
    stats: &mut RenderStats,
) {
    let Some(dom_element) = converter.map_view_to_dom(element) else {
        return;
    };
    if matches!(tree.category(element), Some(ElementCategory::Ui | ElementCategory::Raw)) {
        return;
    }

    let actual: Vec<DomNodeId> = dom.children(dom_element).to_vec();
    let mut expected: Vec<DomNodeId> = Vec::with_capacity(actual.len());
    for &child in tree.children(element) {
        let node = match converter.map_view_to_dom(child) {
            Some(node) => node,
            None => converter.view_to_dom(tree, child, dom, true),
        };
        expected.push(node);
    }
    if let Some(offset) = filler_offset(tree, element) {
        let filler = actual
            .iter()
            .copied()
            .find(|&node| converter.is_block_filler(dom, node))
            .unwrap_or_else(|| converter.create_block_filler(dom));
        expected.insert(offset.min(expected.len()), filler);
    }

    for op in capture_diff_slices(Algorithm::Myers, &actual, &expected) {
        match op {
            DiffOp::Equal { .. } => {}
            DiffOp::Delete { old_len, .. } => stats.removed += old_len,
            DiffOp::Insert { new_len, .. } => stats.inserted += new_len,
            DiffOp::Replace { old_len, new_len, .. } => {
                stats.removed += old_len;
                stats.inserted += new_len;
            }
        }
    }

    let kept: HashSet<DomNodeId> = expected.iter().copied().collect();
    for node in actual {
        if !kept.contains(&node) {
            converter.unbind(dom, node);
        }
    }
    dom.set_children(dom_element, expected);
}

/// Caret position that needs an inline filler: collapsed, in an element,
/// no text on either side and not where the block filler already is
fn needs_inline_filler(tree: &ViewTree, selection: &ViewSelection) -> Option<ViewPosition> {
    if selection.range_count() != 1 || !selection.is_collapsed() || selection.is_fake() {
        return None;
    }
    let position = selection.first_position()?;
    if !tree.is_element(position.parent) || selection.editable_element(tree).is_none() {
        return None;
    }
    if filler_offset(tree, position.parent) == Some(position.offset) {
        return None;
    }
    let text_before = position.node_before(tree).is_some_and(|node| tree.is_text(node));
    let text_after = position.node_after(tree).is_some_and(|node| tree.is_text(node));
    (!text_before && !text_after).then_some(position)
}

fn update_selection(
    tree: &ViewTree,
    selection: &ViewSelection,
    filler_position: Option<DomPosition>,
    dom: &mut DomTree,
    converter: &DomConverter,
) {
    if selection.is_fake() {
        dom.selection = DomSelection {
            anchor: None,
            focus: None,
            fake_label: Some(selection.fake_label().unwrap_or_default().to_string()),
        };
        return;
    }
    if let Some(position) = filler_position {
        dom.selection = DomSelection {
            anchor: Some(position),
            focus: Some(position),
            fake_label: None,
        };
        return;
    }
    let anchor = selection
        .anchor()
        .and_then(|position| converter.view_position_to_dom(tree, dom, position));
    let focus = selection
        .focus()
        .and_then(|position| converter.view_position_to_dom(tree, dom, position));
    dom.selection = DomSelection {
        anchor,
        focus,
        fake_label: None,
    };
}
