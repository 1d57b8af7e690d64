//! # Mapper
//!
//! Binds model elements to the view elements they were converted to and
//! translates positions between the two trees.
//!
//! ## Design
//!
//! Only elements are bound. A model offset inside a bound element is found
//! by walking the view children and summing their model length:
//!
//! - a bound element counts 1
//! - a text counts its characters
//! - UI, raw and unbound empty elements count 0
//! - anything else (attribute elements, fragments) counts its children
//!
//! Because the walk reads the view, a position in the current model can be
//! mapped while the view is still being brought up to date, as long as the
//! parts already converted agree with the model.

use std::collections::HashMap;

use folio_model::{Document, NodeId, Position, Range};
use folio_view::{ElementCategory, ViewNodeId, ViewPosition, ViewRange, ViewTree};
use tracing::trace;

use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, Default)]
pub struct Mapper {
    model_to_view: HashMap<NodeId, ViewNodeId>,
    view_to_model: HashMap<ViewNodeId, NodeId>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_elements(&mut self, model: NodeId, view: ViewNodeId) {
        self.model_to_view.insert(model, view);
        self.view_to_model.insert(view, model);
    }

    /// Unbind a view element and its descendants. A model element already
    /// bound to a newer view element keeps that binding.
    pub fn unbind_view_element(&mut self, tree: &ViewTree, view: ViewNodeId) {
        for node in std::iter::once(view).chain(tree.descendants(view)) {
            if let Some(model) = self.view_to_model.remove(&node) {
                if self.model_to_view.get(&model) == Some(&node) {
                    self.model_to_view.remove(&model);
                }
            }
        }
    }

    pub fn unbind_model_element(&mut self, model: NodeId) {
        if let Some(view) = self.model_to_view.remove(&model) {
            self.view_to_model.remove(&view);
        }
    }

    pub fn clear(&mut self) {
        self.model_to_view.clear();
        self.view_to_model.clear();
    }

    pub fn to_view_element(&self, model: NodeId) -> Option<ViewNodeId> {
        self.model_to_view.get(&model).copied()
    }

    pub fn to_model_element(&self, view: ViewNodeId) -> Option<NodeId> {
        self.view_to_model.get(&view).copied()
    }

    /// Number of model offsets a view node stands for
    pub fn model_length(&self, tree: &ViewTree, node: ViewNodeId) -> usize {
        if self.view_to_model.contains_key(&node) {
            return 1;
        }
        if let Some(text) = tree.text(node) {
            return text.chars().count();
        }
        match tree.category(node) {
            Some(ElementCategory::Ui | ElementCategory::Raw | ElementCategory::Empty) => 0,
            _ => tree
                .children(node)
                .iter()
                .map(|&child| self.model_length(tree, child))
                .sum(),
        }
    }

    pub fn to_view_position(&self, document: &Document, tree: &ViewTree, position: &Position) -> EngineResult<ViewPosition> {
        let parent = document.parent_of(position)?;
        self.to_view_position_in(tree, parent, position.offset())
    }

    /// View position for an offset in a model element
    pub fn to_view_position_in(&self, tree: &ViewTree, model_parent: NodeId, offset: usize) -> EngineResult<ViewPosition> {
        let view_parent = self
            .to_view_element(model_parent)
            .ok_or_else(|| EngineError::Mapping(format!("model element {model_parent:?}")))?;
        self.find_position_in(tree, view_parent, offset)
    }

    /// Position in `view_parent` that stands for model offset `expected`
    pub fn find_position_in(&self, tree: &ViewTree, view_parent: ViewNodeId, expected: usize) -> EngineResult<ViewPosition> {
        if tree.is_text(view_parent) {
            return Ok(ViewPosition::new(view_parent, expected));
        }

        let children = tree.children(view_parent);
        let mut model_offset = 0;
        let mut view_offset = 0;
        let mut last = None;
        while model_offset < expected {
            let child = *children
                .get(view_offset)
                .ok_or_else(|| EngineError::Mapping(format!("model offset {expected} in {view_parent:?}")))?;
            model_offset += self.model_length(tree, child);
            view_offset += 1;
            last = Some(child);
        }

        match last {
            Some(child) if model_offset > expected => {
                let inner = expected - (model_offset - self.model_length(tree, child));
                self.find_position_in(tree, child, inner)
            }
            _ => Ok(move_to_text(tree, ViewPosition::new(view_parent, view_offset))),
        }
    }

    pub fn to_view_range(&self, document: &Document, tree: &ViewTree, range: &Range) -> EngineResult<ViewRange> {
        let start = self.to_view_position(document, tree, &range.start)?;
        if range.is_collapsed() {
            return Ok(ViewRange::collapsed(start));
        }
        let end = self.to_view_position(document, tree, &range.end)?;
        Ok(ViewRange::new(start, end))
    }

    /// Closest bound view element holding the position
    pub fn find_mapped_view_ancestor(&self, tree: &ViewTree, position: ViewPosition) -> Option<ViewNodeId> {
        let mut current = Some(position.parent);
        while let Some(node) = current {
            if self.view_to_model.contains_key(&node) {
                return Some(node);
            }
            current = tree.parent(node);
        }
        None
    }

    pub fn to_model_position(&self, document: &Document, tree: &ViewTree, position: ViewPosition) -> EngineResult<Position> {
        let block = self
            .find_mapped_view_ancestor(tree, position)
            .ok_or_else(|| EngineError::Mapping(format!("view position in {:?}", position.parent)))?;
        let model_parent = self
            .to_model_element(block)
            .ok_or_else(|| EngineError::Mapping(format!("view element {block:?}")))?;
        let offset = self.to_model_offset(tree, position.parent, position.offset, block);
        trace!(?position, offset, "view position mapped to model");
        Ok(document.position_at(model_parent, offset)?)
    }

    pub fn to_model_range(&self, document: &Document, tree: &ViewTree, range: &ViewRange) -> EngineResult<Range> {
        let start = self.to_model_position(document, tree, range.start)?;
        let end = self.to_model_position(document, tree, range.end)?;
        Ok(Range::new(start, end))
    }

    fn to_model_offset(&self, tree: &ViewTree, parent: ViewNodeId, offset: usize, block: ViewNodeId) -> usize {
        if parent != block {
            let (Some(grand_parent), Some(index)) = (tree.parent(parent), tree.index_in_parent(parent)) else {
                return 0;
            };
            return self.to_model_offset(tree, grand_parent, index, block) + self.to_model_offset(tree, parent, offset, parent);
        }
        if tree.is_text(parent) {
            return offset;
        }
        tree.children(parent)
            .iter()
            .take(offset)
            .map(|&child| self.model_length(tree, child))
            .sum()
    }
}

/// Prefer a position at the edge of an adjacent text node
fn move_to_text(tree: &ViewTree, position: ViewPosition) -> ViewPosition {
    if let Some(before) = position.node_before(tree) {
        if let Some(text) = tree.text(before) {
            return ViewPosition::new(before, text.chars().count());
        }
    }
    if let Some(after) = position.node_after(tree) {
        if tree.is_text(after) {
            return ViewPosition::new(after, 0);
        }
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::dev_utils::set_data;
    use folio_model::{Model, SchemaItemDefinition};
    use folio_view::dev_utils::parse;

    /// Model `<paragraph>foo<$text bold="true">bar</$text></paragraph>` next
    /// to view `<p>foo<strong>bar</strong></p>`, bound at root and paragraph
    fn fixture() -> (Model, ViewTree, ViewNodeId, Mapper) {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        model.document_mut().create_root("main", "$root").unwrap();
        set_data(&mut model, "main", "<paragraph>foo<$text bold=\"true\">bar</$text></paragraph>").unwrap();

        let mut tree = ViewTree::new();
        let (fragment, _) = parse(&mut tree, "<p>foo<strong>bar</strong></p>").unwrap();
        let p = tree.children(fragment)[0];

        let document = model.document();
        let root = document.get_root("main").unwrap();
        let paragraph = document.tree().children(root)[0];
        let mut mapper = Mapper::new();
        mapper.bind_elements(root, fragment);
        mapper.bind_elements(paragraph, p);
        (model, tree, p, mapper)
    }

    #[test]
    fn test_model_to_view_positions() {
        let (model, tree, p, mapper) = fixture();
        let document = model.document();
        let foo = tree.children(p)[0];
        let strong = tree.children(p)[1];
        let bar = tree.children(strong)[0];

        let at = |offset| mapper.to_view_position(document, &tree, &Position::new("main", vec![0, offset])).unwrap();
        assert_eq!(at(0), ViewPosition::new(foo, 0));
        assert_eq!(at(3), ViewPosition::new(foo, 3));
        assert_eq!(at(4), ViewPosition::new(bar, 1));
        assert_eq!(at(6), ViewPosition::new(p, 2));

        let root_position = mapper
            .to_view_position(document, &tree, &Position::new("main", vec![1]))
            .unwrap();
        assert_eq!(root_position.offset, 1);
    }

    #[test]
    fn test_view_to_model_positions() {
        let (model, tree, p, mapper) = fixture();
        let document = model.document();
        let strong = tree.children(p)[1];
        let bar = tree.children(strong)[0];

        let position = mapper
            .to_model_position(document, &tree, ViewPosition::new(bar, 2))
            .unwrap();
        assert_eq!(position.path, vec![0, 5]);

        let position = mapper
            .to_model_position(document, &tree, ViewPosition::new(p, 2))
            .unwrap();
        assert_eq!(position.path, vec![0, 6]);
    }

    #[test]
    fn test_model_length_and_unbinding() {
        let (_model, tree, p, mut mapper) = fixture();
        assert_eq!(mapper.model_length(&tree, p), 1);
        assert_eq!(mapper.model_length(&tree, tree.children(p)[1]), 3);

        let bound = mapper.to_model_element(p).unwrap();
        mapper.unbind_view_element(&tree, p);
        assert_eq!(mapper.to_view_element(bound), None);
        assert_eq!(mapper.model_length(&tree, p), 6);
    }
}
