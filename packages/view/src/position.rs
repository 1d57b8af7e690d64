//! View positions, ranges and selection.
//!
//! A view position is a parent plus an offset. Inside a text node the offset
//! counts characters; elsewhere it counts children.

use std::cmp::Ordering;

use crate::errors::{ViewError, ViewResult};
use crate::node::{ViewNodeId, ViewTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewPosition {
    pub parent: ViewNodeId,
    pub offset: usize,
}

impl ViewPosition {
    pub fn new(parent: ViewNodeId, offset: usize) -> Self {
        Self { parent, offset }
    }

    pub fn at(tree: &ViewTree, parent: ViewNodeId, offset: usize) -> ViewResult<Self> {
        let max = tree.max_offset(parent);
        if offset > max {
            return Err(ViewError::OffsetOutOfBounds { node: parent, offset });
        }
        Ok(Self { parent, offset })
    }

    pub fn at_end(tree: &ViewTree, parent: ViewNodeId) -> Self {
        Self {
            parent,
            offset: tree.max_offset(parent),
        }
    }

    pub fn before(tree: &ViewTree, node: ViewNodeId) -> ViewResult<Self> {
        let parent = tree.parent(node).ok_or(ViewError::NoParent(node))?;
        let offset = tree.index_in_parent(node).ok_or(ViewError::NoParent(node))?;
        Ok(Self { parent, offset })
    }

    pub fn after(tree: &ViewTree, node: ViewNodeId) -> ViewResult<Self> {
        let position = Self::before(tree, node)?;
        Ok(Self {
            offset: position.offset + 1,
            ..position
        })
    }

    pub fn shifted(self, by: usize) -> Self {
        Self {
            offset: self.offset + by,
            ..self
        }
    }

    pub fn is_in_text(&self, tree: &ViewTree) -> bool {
        tree.is_text(self.parent)
    }

    pub fn node_before(&self, tree: &ViewTree) -> Option<ViewNodeId> {
        if tree.is_text(self.parent) || self.offset == 0 {
            return None;
        }
        tree.children(self.parent).get(self.offset - 1).copied()
    }

    pub fn node_after(&self, tree: &ViewTree) -> Option<ViewNodeId> {
        if tree.is_text(self.parent) {
            return None;
        }
        tree.children(self.parent).get(self.offset).copied()
    }

    pub fn is_at_start(&self) -> bool {
        self.offset == 0
    }

    pub fn is_at_end(&self, tree: &ViewTree) -> bool {
        self.offset == tree.max_offset(self.parent)
    }

    /// Offsets from the tree root down to this position
    pub fn path(&self, tree: &ViewTree) -> Vec<usize> {
        let mut path: Vec<usize> = Vec::new();
        let mut node = self.parent;
        while let Some(index) = tree.index_in_parent(node) {
            path.push(index);
            node = match tree.parent(node) {
                Some(parent) => parent,
                None => break,
            };
        }
        path.reverse();
        path.push(self.offset);
        path
    }

    /// Document order of two positions in the same tree. A position inside
    /// a text node sorts between the positions around that node.
    pub fn compare(&self, tree: &ViewTree, other: &ViewPosition) -> Ordering {
        self.path(tree).cmp(&other.path(tree))
    }

    /// Move a position sitting inside a text node to its start or end edge
    /// when it is at one, so it points between nodes
    pub fn leave_text_edge(self, tree: &ViewTree) -> ViewResult<Self> {
        if !tree.is_text(self.parent) {
            return Ok(self);
        }
        if self.offset == 0 {
            Self::before(tree, self.parent)
        } else if self.offset == tree.max_offset(self.parent) {
            Self::after(tree, self.parent)
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewRange {
    pub start: ViewPosition,
    pub end: ViewPosition,
}

impl ViewRange {
    pub fn new(start: ViewPosition, end: ViewPosition) -> Self {
        Self { start, end }
    }

    pub fn collapsed(position: ViewPosition) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn on(tree: &ViewTree, node: ViewNodeId) -> ViewResult<Self> {
        Ok(Self::new(ViewPosition::before(tree, node)?, ViewPosition::after(tree, node)?))
    }

    pub fn inside(tree: &ViewTree, element: ViewNodeId) -> Self {
        Self::new(ViewPosition::new(element, 0), ViewPosition::at_end(tree, element))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn is_flat(&self) -> bool {
        self.start.parent == self.end.parent
    }

    pub fn contains_position(&self, tree: &ViewTree, position: &ViewPosition) -> bool {
        self.start.compare(tree, position) == Ordering::Less && position.compare(tree, &self.end) == Ordering::Less
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSelection {
    ranges: Vec<ViewRange>,
    backward: bool,
    /// Selection drawn by the editor (a selected widget) instead of the DOM
    fake: bool,
    fake_label: Option<String>,
}

impl ViewSelection {
    pub fn new(ranges: Vec<ViewRange>, backward: bool) -> Self {
        Self {
            ranges,
            backward,
            ..Self::default()
        }
    }

    pub fn set(&mut self, ranges: Vec<ViewRange>, backward: bool) {
        self.ranges = ranges;
        self.backward = backward;
        self.fake = false;
        self.fake_label = None;
    }

    pub fn set_fake(&mut self, label: Option<String>) {
        self.fake = true;
        self.fake_label = label;
    }

    pub fn clear(&mut self) {
        self.set(Vec::new(), false);
    }

    pub fn ranges(&self) -> &[ViewRange] {
        &self.ranges
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_backward(&self) -> bool {
        self.backward
    }

    pub fn is_fake(&self) -> bool {
        self.fake
    }

    pub fn fake_label(&self) -> Option<&str> {
        self.fake_label.as_deref()
    }

    pub fn is_collapsed(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_collapsed()
    }

    pub fn first_range(&self) -> Option<&ViewRange> {
        self.ranges.first()
    }

    pub fn first_position(&self) -> Option<ViewPosition> {
        self.ranges.first().map(|range| range.start)
    }

    pub fn anchor(&self) -> Option<ViewPosition> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.end } else { range.start })
    }

    pub fn focus(&self) -> Option<ViewPosition> {
        let range = self.ranges.last()?;
        Some(if self.backward { range.start } else { range.end })
    }

    /// Editable element holding the selection
    pub fn editable_element(&self, tree: &ViewTree) -> Option<ViewNodeId> {
        let position = self.first_position()?;
        let mut node = position.parent;
        loop {
            if matches!(
                tree.category(node),
                Some(crate::node::ElementCategory::Editable | crate::node::ElementCategory::Root)
            ) {
                return Some(node);
            }
            node = tree.parent(node)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ElementCategory;

    #[test]
    fn test_compare_through_text() {
        let mut tree = ViewTree::new();
        let p = tree.create_element("p", ElementCategory::Container, []);
        let text = tree.create_text("abc");
        let img = tree.create_element("img", ElementCategory::Empty, []);
        tree.append_child(p, text);
        tree.append_child(p, img);

        let in_text = ViewPosition::new(text, 2);
        let before_img = ViewPosition::new(p, 1);
        let start = ViewPosition::new(p, 0);
        assert_eq!(start.compare(&tree, &in_text), Ordering::Less);
        assert_eq!(in_text.compare(&tree, &before_img), Ordering::Less);
        assert_eq!(before_img.node_after(&tree), Some(img));
        assert_eq!(before_img.node_before(&tree), Some(text));
    }

    #[test]
    fn test_leave_text_edge() {
        let mut tree = ViewTree::new();
        let p = tree.create_element("p", ElementCategory::Container, []);
        let text = tree.create_text("ab");
        tree.append_child(p, text);

        assert_eq!(ViewPosition::new(text, 2).leave_text_edge(&tree).unwrap(), ViewPosition::new(p, 1));
        assert_eq!(ViewPosition::new(text, 1).leave_text_edge(&tree).unwrap(), ViewPosition::new(text, 1));
    }

    #[test]
    fn test_selection_direction() {
        let mut tree = ViewTree::new();
        let p = tree.create_element("p", ElementCategory::Container, []);
        let range = ViewRange::new(ViewPosition::new(p, 0), ViewPosition::new(p, 0));
        let selection = ViewSelection::new(vec![range], true);
        assert!(selection.is_collapsed());
        assert_eq!(selection.anchor(), Some(range.end));
    }
}
