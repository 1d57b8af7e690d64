//! # Writer
//!
//! The only way to change a document inside a change block. Every method
//! turns its arguments into operations stamped with the current document
//! version, applies them and records them in the block's batch.
//!
//! Compound changes (split, merge, wrap, unwrap, remove of a non-flat range)
//! are expressed as several basic operations so undo and transformation only
//! ever deal with the operation kinds the document knows.

use serde_json::Value;
use tracing::trace;

use crate::batch::{Batch, BatchType};
use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use crate::model::Model;
use crate::node::{normalize_nodes, offset_size_of, Attributes, Node};
use crate::operation::{Operation, OperationKind};
use crate::position::{Position, Stickiness};
use crate::range::Range;
use crate::schema::Schema;
use crate::tree::NodeId;
use crate::walker::{TreeWalker, WalkerOptions};

/// Outcome of [`Writer::split`]
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    /// Between the last pair of split elements
    pub position: Position,
    /// From the end of the first split part to the start of the first copy
    pub range: Range,
}

pub struct Writer<'m> {
    model: &'m mut Model,
    batch: Batch,
}

impl<'m> Writer<'m> {
    pub(crate) fn new(model: &'m mut Model, batch: Batch) -> Self {
        Self { model, batch }
    }

    pub(crate) fn into_batch(self) -> Batch {
        self.batch
    }

    pub fn document(&self) -> &Document {
        &self.model.document
    }

    pub fn schema(&self) -> &Schema {
        &self.model.schema
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn batch_type(&self) -> BatchType {
        self.batch.batch_type
    }

    /// Apply an operation in this batch. `NoOp`s are skipped.
    pub fn apply_operation(&mut self, operation: Operation) -> ModelResult<()> {
        if operation.is_no_op() {
            return Ok(());
        }
        let operation = operation.with_base_version(self.model.document.version());
        self.model.document.apply_operation(&operation)?;
        self.batch.push(operation);
        Ok(())
    }

    /// Record that operations applied on `reverting` versions undid the
    /// ones applied on `original` versions
    pub fn mark_reverted(&mut self, original: impl IntoIterator<Item = u64>, reverting: impl IntoIterator<Item = u64>) {
        self.model.document.history_mut().mark_reverted(original, reverting);
    }

    /// Run a nested block inline, in this batch
    pub fn change<R>(&mut self, block: impl FnOnce(&mut Writer<'_>) -> ModelResult<R>) -> ModelResult<R> {
        block(self)
    }

    /// Queue a block to run after the outermost block closes
    pub fn enqueue_change(
        &mut self,
        batch_type: BatchType,
        block: impl for<'w> FnOnce(&mut Writer<'w>) -> ModelResult<()> + 'static,
    ) {
        self.model.pending.push_back((batch_type, Box::new(block)));
    }

    pub fn insert(&mut self, nodes: Vec<Node>, position: &Position) -> ModelResult<Range> {
        let nodes = normalize_nodes(nodes);
        let how_many = offset_size_of(&nodes);
        let position = plain(position);
        if nodes.is_empty() {
            return Ok(Range::collapsed(position));
        }
        self.apply_operation(Operation::insert(position.clone(), nodes))?;
        Ok(Range::from_position_and_shift(&position, how_many))
    }

    pub fn insert_text(&mut self, text: &str, attributes: Attributes, position: &Position) -> ModelResult<Range> {
        self.insert(vec![Node::text(text).with_attributes(attributes)], position)
    }

    pub fn insert_element(&mut self, name: &str, attributes: Attributes, position: &Position) -> ModelResult<NodeId> {
        self.insert(vec![Node::element(name).with_attributes(attributes)], position)?;
        self.document()
            .node_after(position)
            .ok_or(ModelError::NotAnElement)
    }

    pub fn append(&mut self, nodes: Vec<Node>, parent: NodeId) -> ModelResult<Range> {
        let position = self.document().position_at_end(parent)?;
        self.insert(nodes, &position)
    }

    pub fn set_attribute(&mut self, key: &str, value: Value, range: &Range) -> ModelResult<()> {
        self.change_attribute(key, Some(value), range)
    }

    pub fn remove_attribute(&mut self, key: &str, range: &Range) -> ModelResult<()> {
        self.change_attribute(key, None, range)
    }

    pub fn set_attributes(&mut self, attributes: &Attributes, range: &Range) -> ModelResult<()> {
        for (key, value) in attributes {
            self.change_attribute(key, Some(value.clone()), range)?;
        }
        Ok(())
    }

    pub fn set_attribute_on(&mut self, key: &str, value: Value, node: NodeId) -> ModelResult<()> {
        let range = self.document().range_on(node)?;
        self.change_attribute(key, Some(value), &range)
    }

    pub fn remove_attribute_on(&mut self, key: &str, node: NodeId) -> ModelResult<()> {
        let range = self.document().range_on(node)?;
        self.change_attribute(key, None, &range)
    }

    /// Remove every attribute from the items of the range
    pub fn clear_attributes(&mut self, range: &Range) -> ModelResult<()> {
        let mut keys: Vec<String> = Vec::new();
        {
            let document = self.document();
            for value in TreeWalker::new(document, WalkerOptions::items_of(range))? {
                for key in value.item.attributes(document.tree()).keys() {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        for key in keys {
            self.change_attribute(&key, None, range)?;
        }
        Ok(())
    }

    fn change_attribute(&mut self, key: &str, value: Option<Value>, range: &Range) -> ModelResult<()> {
        let flat_ranges = range.minimal_flat_ranges(self.document())?;

        for flat in flat_ranges {
            // Contiguous runs of items sharing the same old value.
            let mut runs: Vec<(Position, Position, Option<Value>)> = Vec::new();
            {
                let document = self.document();
                let walker = TreeWalker::new(document, WalkerOptions::items_of(&flat).shallow())?;
                for step in walker {
                    let old = step.item.attributes(document.tree()).get(key).cloned();
                    if old == value {
                        continue;
                    }
                    match runs.last_mut() {
                        Some((_, end, run_old)) if *end == step.previous_position && *run_old == old => {
                            *end = step.next_position.clone();
                        }
                        _ => runs.push((step.previous_position.clone(), step.next_position.clone(), old)),
                    }
                }
            }

            for (start, end, old) in runs {
                self.apply_operation(Operation::attribute(Range::new(start, end), key, old, value.clone()))?;
            }
        }
        Ok(())
    }

    /// Move a flat range to `target` (expressed before the move)
    pub fn move_range(&mut self, range: &Range, target: &Position) -> ModelResult<()> {
        if !range.is_flat() {
            return Err(ModelError::RangeNotFlat);
        }
        if range.is_collapsed() {
            return Ok(());
        }
        self.apply_operation(Operation::move_range(
            plain(&range.start),
            range.flat_len(),
            plain(target),
        ))
    }

    /// Move the content of a range to the graveyard
    pub fn remove(&mut self, range: &Range) -> ModelResult<()> {
        let parts = range.minimal_flat_ranges(self.document())?;
        // Last part first, so earlier parts keep their positions.
        for part in parts.into_iter().rev() {
            self.apply_operation(Operation::remove(plain(&part.start), part.flat_len()))?;
        }
        Ok(())
    }

    pub fn remove_node(&mut self, node: NodeId) -> ModelResult<()> {
        let range = self.document().range_on(node)?;
        self.remove(&range)
    }

    pub fn rename(&mut self, element: NodeId, new_name: &str) -> ModelResult<()> {
        let document = self.document();
        if !document.tree().is_element(element) || document.is_root(element) {
            return Err(ModelError::NotAnElement);
        }
        let old_name = document.tree().item_name(element).to_string();
        if old_name == new_name {
            return Ok(());
        }
        let position = document.position_before(element)?;
        self.apply_operation(Operation::rename(position, old_name, new_name))
    }

    /// Split the parent of `position` (and its ancestors up to `limit`)
    /// into two elements each
    pub fn split(&mut self, position: &Position, limit: Option<NodeId>) -> ModelResult<SplitResult> {
        let mut split_element = self.document().parent_of(position)?;
        let mut position = plain(position);

        if limit == Some(split_element) {
            return Ok(SplitResult {
                range: Range::collapsed(position.clone()),
                position,
            });
        }

        let mut first_split: Option<(NodeId, NodeId)> = None;

        loop {
            let document = self.document();
            if document.is_root(split_element) {
                return Err(ModelError::InvalidSplit("element to split has no parent"));
            }

            let tree = document.tree();
            let copy = Node::element(tree.item_name(split_element)).with_attributes(tree.attributes(split_element).clone());
            let how_many = tree.max_offset(split_element).saturating_sub(position.offset());
            let parent = tree.parent(split_element);
            let after = document.position_after(split_element)?;

            self.apply_operation(Operation::insert(after.clone(), vec![copy]))?;
            let copy_id = self
                .document()
                .node_after(&after)
                .ok_or(ModelError::InvalidSplit("copy was not inserted"))?;

            if how_many > 0 {
                let mut target_path = after.path.clone();
                target_path.push(0);
                self.apply_operation(Operation::move_range(
                    position.clone(),
                    how_many,
                    Position::new(after.root.clone(), target_path),
                ))?;
            }

            first_split.get_or_insert((split_element, copy_id));
            position = after;

            match (limit, parent) {
                (None, _) => break,
                (Some(limit), Some(parent)) if parent == limit => break,
                (Some(_), Some(parent)) => split_element = parent,
                (Some(_), None) => return Err(ModelError::InvalidSplit("limit element is not an ancestor")),
            }
        }

        let (first, first_copy) = first_split.ok_or(ModelError::InvalidSplit("nothing was split"))?;
        let document = self.document();
        let range = Range::new(document.position_at_end(first)?, document.position_at(first_copy, 0)?);
        trace!(position = ?position.path, "split");
        Ok(SplitResult { position, range })
    }

    /// Merge the elements before and after `position`: the content of the
    /// second moves to the end of the first, then the second is removed
    pub fn merge(&mut self, position: &Position) -> ModelResult<()> {
        let document = self.document();
        let tree = document.tree();
        let (Some(before), Some(after)) = (document.node_before(position), document.node_after(position)) else {
            return Err(ModelError::InvalidMerge("no element before or after the position"));
        };
        if !tree.is_element(before) || !tree.is_element(after) {
            return Err(ModelError::InvalidMerge("nodes around the position are not elements"));
        }

        let target = document.position_at_end(before)?;
        let content = document.range_in(after)?;
        if !content.is_collapsed() {
            self.move_range(&content, &target)?;
        }
        let emptied = self.document().range_on(after)?;
        self.remove(&emptied)
    }

    /// Wrap a flat range in a new, empty element
    pub fn wrap(&mut self, range: &Range, element: Node) -> ModelResult<NodeId> {
        if !range.is_flat() {
            return Err(ModelError::InvalidWrap("range to wrap is not flat"));
        }
        if !element.is_element() || !element.children().is_empty() {
            return Err(ModelError::InvalidWrap("wrapping element must be an empty element"));
        }

        let insert_at = plain(&range.end);
        self.insert(vec![element], &insert_at)?;
        let wrapper = self
            .document()
            .node_after(&insert_at)
            .ok_or(ModelError::InvalidWrap("wrapper was not inserted"))?;

        if !range.is_collapsed() {
            let mut target_path = insert_at.path.clone();
            target_path.push(0);
            self.apply_operation(Operation::move_range(
                plain(&range.start),
                range.flat_len(),
                Position::new(insert_at.root.clone(), target_path),
            ))?;
        }
        Ok(wrapper)
    }

    /// Replace an element with its content
    pub fn unwrap(&mut self, element: NodeId) -> ModelResult<()> {
        let document = self.document();
        if !document.tree().is_element(element) || document.is_root(element) {
            return Err(ModelError::NotAnElement);
        }
        let content = document.range_in(element)?;
        let before = document.position_before(element)?;
        if !content.is_collapsed() {
            self.move_range(&content, &before)?;
        }
        let emptied = self.document().range_on(element)?;
        self.remove(&emptied)
    }

    pub fn add_marker(&mut self, name: &str, range: Range, using_operation: bool, affects_data: bool) -> ModelResult<()> {
        if self.document().markers().has(name) {
            return Err(ModelError::MarkerExists(name.to_string()));
        }
        if using_operation {
            self.apply_operation(Operation::marker(name, None, Some(range), affects_data))
        } else {
            self.model.document.set_marker_directly(name, Some(range), affects_data);
            Ok(())
        }
    }

    pub fn update_marker(&mut self, name: &str, range: Range) -> ModelResult<()> {
        let marker = self
            .document()
            .markers()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::MarkerNotFound(name.to_string()))?;
        if marker.managed_using_operations {
            self.apply_operation(Operation::marker(name, Some(marker.range), Some(range), marker.affects_data))
        } else {
            self.model
                .document
                .set_marker_directly(name, Some(range), marker.affects_data);
            Ok(())
        }
    }

    pub fn remove_marker(&mut self, name: &str) -> ModelResult<()> {
        let marker = self
            .document()
            .markers()
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::MarkerNotFound(name.to_string()))?;
        if marker.managed_using_operations {
            self.apply_operation(Operation::marker(name, Some(marker.range), None, marker.affects_data))
        } else {
            self.model.document.set_marker_directly(name, None, marker.affects_data);
            Ok(())
        }
    }

    pub fn set_selection(&mut self, ranges: Vec<Range>, backward: bool) {
        self.model.document.selection_mut().set_ranges(ranges, backward);
    }

    pub fn set_selection_at(&mut self, position: Position) {
        self.set_selection(vec![Range::collapsed(plain(&position))], false);
    }

    pub fn set_selection_in(&mut self, element: NodeId) -> ModelResult<()> {
        let range = self.document().range_in(element)?;
        self.set_selection(vec![range], false);
        Ok(())
    }

    pub fn set_selection_on(&mut self, node: NodeId) -> ModelResult<()> {
        let range = self.document().range_on(node)?;
        self.set_selection(vec![range], false);
        Ok(())
    }

    /// Move the selection without dropping stored attributes
    pub(crate) fn fix_selection(&mut self, ranges: Vec<Range>) {
        self.model.document.selection_mut().replace_ranges(ranges);
    }

    pub fn set_selection_attribute(&mut self, key: &str, value: Value) {
        self.model
            .document
            .selection_mut()
            .store_attribute(key, Some(value));
    }

    pub fn remove_selection_attribute(&mut self, key: &str) {
        self.model.document.selection_mut().store_attribute(key, None);
    }

    pub fn clear_selection_attributes(&mut self) {
        self.model.document.selection_mut().clear_stored_attributes();
    }

    /// Add a root, or re-attach a detached one
    pub fn add_root(&mut self, name: &str, element_name: &str) -> ModelResult<NodeId> {
        self.apply_operation(Operation::new(OperationKind::Root {
            root_name: name.to_string(),
            element_name: element_name.to_string(),
            is_add: true,
        }))?;
        self.document().get_root(name)
    }

    /// Empty a root, drop its markers, then detach it
    pub fn detach_root(&mut self, name: &str) -> ModelResult<()> {
        let content = self.document().range_in_root(name)?;
        if !content.is_collapsed() {
            self.remove(&content)?;
        }

        let markers: Vec<String> = self
            .document()
            .markers()
            .iter()
            .filter(|marker| marker.range.root() == name)
            .map(|marker| marker.name.clone())
            .collect();
        for marker in markers {
            self.remove_marker(&marker)?;
        }

        let element_name = self
            .document()
            .root_info(name)
            .map(|info| info.element_name.clone())
            .unwrap_or_default();
        self.apply_operation(Operation::new(OperationKind::Root {
            root_name: name.to_string(),
            element_name,
            is_add: false,
        }))
    }
}

fn plain(position: &Position) -> Position {
    position.clone().with_stickiness(Stickiness::ToNone)
}
