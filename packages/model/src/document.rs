//! # Document
//!
//! Owns the node arena, the named roots (plus the hidden graveyard), the
//! markers, the selection, the operation history and the differ.
//!
//! ## Applying operations
//!
//! [`Document::apply_operation`] is the only way content changes once a
//! document is in use:
//!
//! 1. the operation's `base_version` must equal the document version
//! 2. the differ snapshots every parent the operation touches
//! 3. the operation is validated and executed on the arena
//! 4. the version is bumped and the operation recorded in the history
//! 5. markers and the selection follow the change
//!
//! A failed validation leaves the document untouched.

use std::collections::BTreeMap;

use tracing::trace;

use crate::differ::{ChangeSet, DiffEntry, Differ};
use crate::errors::{ModelError, ModelResult};
use crate::history::History;
use crate::markers::MarkerCollection;
use crate::operation::{Operation, OperationKind};
use crate::position::Position;
use crate::range::Range;
use crate::selection::DocumentSelection;
use crate::tree::{NodeId, Tree};

/// Root holding removed content
pub const GRAVEYARD: &str = "$graveyard";

/// Element name of roots created without an explicit one
pub const DEFAULT_ROOT_ELEMENT: &str = "$root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootInfo {
    pub id: NodeId,
    pub element_name: String,
    pub attached: bool,
}

#[derive(Debug)]
pub struct Document {
    tree: Tree,
    roots: BTreeMap<String, RootInfo>,
    root_order: Vec<String>,
    version: u64,
    history: History,
    markers: MarkerCollection,
    selection: DocumentSelection,
    differ: Differ,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut tree = Tree::new();
        let graveyard = tree.create_element(DEFAULT_ROOT_ELEMENT, Default::default());
        let mut roots = BTreeMap::new();
        roots.insert(
            GRAVEYARD.to_string(),
            RootInfo {
                id: graveyard,
                element_name: DEFAULT_ROOT_ELEMENT.to_string(),
                attached: true,
            },
        );

        Self {
            tree,
            roots,
            root_order: Vec::new(),
            version: 0,
            history: History::default(),
            markers: MarkerCollection::default(),
            selection: DocumentSelection::default(),
            differ: Differ::default(),
        }
    }

    /// Create an attached root directly, outside of the operation log
    pub fn create_root(&mut self, name: &str, element_name: &str) -> ModelResult<NodeId> {
        if self.roots.contains_key(name) {
            return Err(ModelError::DuplicateRoot(name.to_string()));
        }
        let id = self.tree.create_element(element_name, Default::default());
        self.roots.insert(
            name.to_string(),
            RootInfo {
                id,
                element_name: element_name.to_string(),
                attached: true,
            },
        );
        self.root_order.push(name.to_string());
        Ok(id)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    pub fn selection(&self) -> &DocumentSelection {
        &self.selection
    }

    pub(crate) fn selection_mut(&mut self) -> &mut DocumentSelection {
        &mut self.selection
    }

    pub fn differ(&self) -> &Differ {
        &self.differ
    }

    /// Attached root by name, graveyard included
    pub fn root(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).filter(|info| info.attached).map(|info| info.id)
    }

    pub fn get_root(&self, name: &str) -> ModelResult<NodeId> {
        self.root(name).ok_or_else(|| ModelError::RootNotFound(name.to_string()))
    }

    pub fn graveyard(&self) -> NodeId {
        self.roots[GRAVEYARD].id
    }

    pub fn root_info(&self, name: &str) -> Option<&RootInfo> {
        self.roots.get(name)
    }

    /// Names of attached roots in creation order
    pub fn root_names(&self) -> Vec<String> {
        self.root_order
            .iter()
            .filter(|name| self.roots.get(*name).is_some_and(|info| info.attached))
            .cloned()
            .collect()
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.roots.get(name).is_some_and(|info| info.attached)
    }

    /// Name of the root `node` belongs to, even when detached
    pub fn root_name_of(&self, node: NodeId) -> Option<&str> {
        let root = self.tree.root_of(node);
        self.roots
            .iter()
            .find(|(_, info)| info.id == root)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.roots.values().any(|info| info.id == node)
    }

    /// Name used in schema contexts: the element name, `$text` for text
    pub fn schema_name_of(&self, node: NodeId) -> String {
        self.tree.item_name(node).to_string()
    }

    /// Closest element containing both nodes (inclusive)
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut a_chain = self.tree.ancestors(a);
        a_chain.push(a);
        let mut b_chain = self.tree.ancestors(b);
        b_chain.push(b);

        a_chain
            .iter()
            .zip(b_chain.iter())
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| *x)
    }

    /// Element a position points into
    pub fn parent_of(&self, position: &Position) -> ModelResult<NodeId> {
        let root = self
            .roots
            .get(&position.root)
            .ok_or_else(|| ModelError::RootNotFound(position.root.clone()))?;
        self.tree
            .resolve_parent(root.id, position.parent_path())
            .ok_or_else(|| ModelError::InvalidPath {
                root: position.root.clone(),
                path: position.path.clone(),
            })
    }

    /// Parent of a position whose offset must also be in bounds
    fn checked_parent_of(&self, position: &Position) -> ModelResult<NodeId> {
        let parent = self.parent_of(position)?;
        let max = self.tree.max_offset(parent);
        if position.offset() > max {
            return Err(ModelError::OffsetOutOfBounds {
                offset: position.offset(),
                max,
            });
        }
        Ok(parent)
    }

    pub fn position_at(&self, parent: NodeId, offset: usize) -> ModelResult<Position> {
        let root = self.root_name_of(parent).ok_or(ModelError::NotAnElement)?;
        let mut path = self.tree.path(parent);
        path.push(offset);
        Ok(Position::new(root, path))
    }

    pub fn position_at_end(&self, parent: NodeId) -> ModelResult<Position> {
        self.position_at(parent, self.tree.max_offset(parent))
    }

    pub fn position_before(&self, node: NodeId) -> ModelResult<Position> {
        let parent = self.tree.parent(node).ok_or(ModelError::NotAnElement)?;
        let offset = self.tree.start_offset(node).unwrap_or(0);
        self.position_at(parent, offset)
    }

    pub fn position_after(&self, node: NodeId) -> ModelResult<Position> {
        Ok(self.position_before(node)?.shifted_by(self.tree.offset_size(node) as isize))
    }

    pub fn range_in(&self, element: NodeId) -> ModelResult<Range> {
        Ok(Range::new(self.position_at(element, 0)?, self.position_at_end(element)?))
    }

    pub fn range_on(&self, node: NodeId) -> ModelResult<Range> {
        Ok(Range::new(self.position_before(node)?, self.position_after(node)?))
    }

    pub fn range_in_root(&self, name: &str) -> ModelResult<Range> {
        self.range_in(self.get_root(name)?)
    }

    pub fn node_after(&self, position: &Position) -> Option<NodeId> {
        let parent = self.parent_of(position).ok()?;
        self.tree.node_after(parent, position.offset())
    }

    pub fn node_before(&self, position: &Position) -> Option<NodeId> {
        let parent = self.parent_of(position).ok()?;
        self.tree.node_before(parent, position.offset())
    }

    /// Text node the position falls strictly inside of
    pub fn text_node_at(&self, position: &Position) -> Option<NodeId> {
        let parent = self.parent_of(position).ok()?;
        self.tree.text_node_at(parent, position.offset())
    }

    /// Whether the root has no content
    pub fn is_root_empty(&self, name: &str) -> bool {
        self.root(name).map_or(true, |root| self.tree.is_empty(root))
    }

    /// Structural changes buffered since the last flush
    pub fn changes(&self) -> Vec<DiffEntry> {
        self.differ.changes(self)
    }

    /// Take every buffered change and reset the differ
    pub fn flush_changes(&mut self) -> ChangeSet {
        let set = ChangeSet {
            changes: self.differ.changes(self),
            markers_to_remove: self.differ.markers_to_remove(),
            markers_to_add: self.differ.markers_to_add(),
            root_changes: self.differ.root_changes(),
        };
        self.differ.reset();
        set
    }

    /// Apply an operation stamped with the current version. Writers stamp
    /// the operations they create; anything else must carry its own.
    pub fn apply_operation(&mut self, operation: &Operation) -> ModelResult<()> {
        let Some(base_version) = operation.base_version else {
            return Err(ModelError::MissingBaseVersion { document: self.version });
        };
        if base_version != self.version {
            return Err(ModelError::VersionMismatch {
                operation: base_version,
                document: self.version,
            });
        }

        trace!(
            version = self.version,
            kind = operation.type_name(),
            "applying operation"
        );

        self.validate(&operation.kind)?;
        self.snapshot_parents(&operation.kind)?;
        self.execute(&operation.kind)?;

        let mut recorded = operation.clone();
        recorded.base_version = Some(self.version);
        self.version += 1;

        self.update_markers(&recorded);
        self.update_selection(&recorded);
        self.history.push(recorded);

        Ok(())
    }

    fn validate(&self, kind: &OperationKind) -> ModelResult<()> {
        match kind {
            OperationKind::Insert { position, .. } => {
                self.checked_parent_of(position)?;
            }
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => {
                let source_parent = self.checked_parent_of(source_position)?;
                let target_parent = self.checked_parent_of(target_position)?;
                let max = self.tree.max_offset(source_parent);
                if source_position.offset() + how_many > max {
                    return Err(ModelError::OffsetOutOfBounds {
                        offset: source_position.offset() + how_many,
                        max,
                    });
                }
                if source_parent == target_parent {
                    let inside = target_position.offset() > source_position.offset()
                        && target_position.offset() < source_position.offset() + how_many;
                    if inside {
                        return Err(ModelError::MoveIntoItself);
                    }
                } else if target_position
                    .transformed_by_deletion(source_position, *how_many)
                    .is_none()
                {
                    return Err(ModelError::MoveIntoItself);
                }
            }
            OperationKind::Attribute {
                range,
                key,
                old_value,
                ..
            } => {
                if !range.is_flat() {
                    return Err(ModelError::RangeNotFlat);
                }
                let parent = self.checked_parent_of(&range.start)?;
                let max = self.tree.max_offset(parent);
                if range.end.offset() > max {
                    return Err(ModelError::OffsetOutOfBounds {
                        offset: range.end.offset(),
                        max,
                    });
                }
                let mut offset = range.start.offset();
                while offset < range.end.offset() {
                    let Some((_, child, start)) = self.tree.child_at_offset(parent, offset) else {
                        break;
                    };
                    if self.tree.attribute(child, key) != old_value.as_ref() {
                        return Err(ModelError::WrongOldValue { key: key.clone() });
                    }
                    offset = start + self.tree.offset_size(child);
                }
            }
            OperationKind::Rename {
                position, old_name, ..
            } => {
                let parent = self.checked_parent_of(position)?;
                let element = self
                    .tree
                    .node_after(parent, position.offset())
                    .filter(|&node| self.tree.is_element(node))
                    .ok_or(ModelError::NotAnElement)?;
                let found = self.tree.item_name(element);
                if found != old_name {
                    return Err(ModelError::WrongElementName {
                        expected: old_name.clone(),
                        found: found.to_string(),
                    });
                }
            }
            OperationKind::Root { root_name, is_add, .. } => match (self.roots.get(root_name), is_add) {
                (Some(info), true) if info.attached => {
                    return Err(ModelError::DuplicateRoot(root_name.clone()));
                }
                (None, false) => return Err(ModelError::RootNotFound(root_name.clone())),
                _ => {}
            },
            OperationKind::Marker { .. } | OperationKind::NoOp => {}
        }
        Ok(())
    }

    fn snapshot_parents(&mut self, kind: &OperationKind) -> ModelResult<()> {
        let parents: Vec<NodeId> = match kind {
            OperationKind::Insert { position, .. } => vec![self.parent_of(position)?],
            OperationKind::Move {
                source_position,
                target_position,
                ..
            } => vec![self.parent_of(source_position)?, self.parent_of(target_position)?],
            OperationKind::Attribute { range, .. } => vec![self.parent_of(&range.start)?],
            OperationKind::Rename { position, .. } => vec![self.parent_of(position)?],
            _ => Vec::new(),
        };
        for parent in parents {
            self.differ.snapshot_parent(&self.tree, parent);
        }
        Ok(())
    }

    fn execute(&mut self, kind: &OperationKind) -> ModelResult<()> {
        match kind {
            OperationKind::Insert { position, nodes } => {
                let parent = self.parent_of(position)?;
                let ids: Vec<NodeId> = nodes.iter().map(|node| self.tree.create_from(node)).collect();
                self.tree.insert_nodes(parent, position.offset(), ids);
            }
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => {
                let source_parent = self.parent_of(source_position)?;
                let target_parent = self.parent_of(target_position)?;
                let start = source_position.offset();
                let moved = self.tree.remove_range(source_parent, start, start + how_many);

                let mut target_offset = target_position.offset();
                if source_parent == target_parent && target_offset > start {
                    target_offset -= how_many;
                }
                self.tree.insert_nodes(target_parent, target_offset, moved);
            }
            OperationKind::Attribute {
                range, key, new_value, ..
            } => {
                let parent = self.parent_of(&range.start)?;
                self.tree.set_range_attribute(
                    parent,
                    range.start.offset(),
                    range.end.offset(),
                    key,
                    new_value.as_ref(),
                );
            }
            OperationKind::Rename { position, new_name, .. } => {
                let parent = self.parent_of(position)?;
                if let Some(element) = self.tree.node_after(parent, position.offset()) {
                    self.tree.set_name(element, new_name);
                }
            }
            OperationKind::Marker {
                name,
                old_range,
                new_range,
                affects_data,
            } => {
                match new_range {
                    Some(range) => {
                        self.markers.set(name, range.clone(), true, *affects_data);
                    }
                    None => {
                        self.markers.remove(name);
                    }
                }
                self.differ
                    .buffer_marker_change(name, old_range.clone(), new_range.clone(), *affects_data);
            }
            OperationKind::Root {
                root_name,
                element_name,
                is_add,
            } => {
                let was_attached = self.is_attached(root_name);
                match self.roots.get_mut(root_name) {
                    Some(info) => info.attached = *is_add,
                    None => {
                        self.create_root(root_name, element_name)?;
                    }
                }
                self.differ.buffer_root_change(root_name, was_attached, *is_add);
            }
            OperationKind::NoOp => {}
        }
        Ok(())
    }

    /// Change a marker that is not managed using operations
    pub(crate) fn set_marker_directly(&mut self, name: &str, range: Option<Range>, affects_data: bool) {
        let old_range = self.markers.get(name).map(|marker| marker.range.clone());
        match &range {
            Some(range) => {
                self.markers.set(name, range.clone(), false, affects_data);
            }
            None => {
                self.markers.remove(name);
            }
        }
        self.differ.buffer_marker_change(name, old_range, range, affects_data);
    }

    /// Keep markers over the content they were placed on
    fn update_markers(&mut self, operation: &Operation) {
        if !matches!(operation.kind, OperationKind::Insert { .. } | OperationKind::Move { .. }) {
            return;
        }

        let names: Vec<String> = self.markers.names().map(str::to_string).collect();
        for name in names {
            let Some(marker) = self.markers.get(&name).cloned() else {
                continue;
            };
            let transformed = Range::span(&marker.range.transformed_by_operation(operation));
            match transformed {
                Some(range) if range.root() != GRAVEYARD => {
                    if range != marker.range {
                        self.markers
                            .set(&name, range.clone(), marker.managed_using_operations, marker.affects_data);
                        self.differ.buffer_marker_change(
                            &name,
                            Some(marker.range.clone()),
                            Some(range),
                            marker.affects_data,
                        );
                    }
                }
                _ => {
                    trace!(marker = %name, "marker removed with its content");
                    self.markers.remove(&name);
                    self.differ
                        .buffer_marker_change(&name, Some(marker.range.clone()), None, marker.affects_data);
                }
            }
        }
    }

    /// Transform the selection; ranges that ended up in the graveyard
    /// collapse where their content was removed
    fn update_selection(&mut self, operation: &Operation) {
        if self.selection.ranges().is_empty() {
            return;
        }
        let fallback = match &operation.kind {
            OperationKind::Move { source_position, .. } => Some(source_position.clone()),
            _ => None,
        };

        let ranges: Vec<Range> = self
            .selection
            .ranges()
            .iter()
            .filter_map(|range| {
                let transformed = if range.is_collapsed() {
                    Some(Range::collapsed(range.start.transformed_by_operation(operation)))
                } else {
                    Range::span(&range.transformed_by_operation(operation))
                };
                match transformed {
                    Some(range) if range.root() != GRAVEYARD => Some(range),
                    _ => fallback.clone().map(Range::collapsed),
                }
            })
            .collect();

        self.selection.replace_ranges(ranges);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::operation::graveyard_position;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn apply(doc: &mut Document, operation: Operation) -> ModelResult<()> {
        let version = doc.version();
        doc.apply_operation(&operation.with_base_version(version))
    }

    fn document() -> Document {
        let mut document = Document::new();
        document.create_root("main", DEFAULT_ROOT_ELEMENT).unwrap();
        document
    }

    #[test]
    fn test_duplicate_and_missing_roots() {
        let mut doc = document();
        assert_eq!(
            doc.create_root("main", "$root").unwrap_err().code(),
            "model-document-createroot-name-exists"
        );
        assert!(matches!(doc.get_root("other"), Err(ModelError::RootNotFound(_))));
        assert_eq!(doc.root_names(), vec!["main".to_string()]);
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let mut doc = document();
        let op = Operation::insert(pos(&[0]), vec![Node::element("paragraph")]).with_base_version(3);
        let err = doc.apply_operation(&op).unwrap_err();
        assert_eq!(err.code(), "model-document-applyoperation-wrong-version");
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_operation_without_version_is_rejected() {
        let mut doc = document();
        let op: Operation = serde_json::from_value(serde_json::json!({
            "kind": {
                "type": "insert",
                "position": { "root": "main", "path": [0] },
                "nodes": [{ "type": "element", "name": "paragraph" }]
            }
        }))
        .unwrap();
        assert_eq!(op.base_version, None);

        let err = doc.apply_operation(&op).unwrap_err();
        assert_eq!(err, ModelError::MissingBaseVersion { document: 0 });
        assert_eq!(err.code(), "model-document-applyoperation-no-version");
        assert!(doc.is_root_empty("main"));
        assert!(doc.history().is_empty());
    }

    #[test]
    fn test_insert_then_reversed_restores_content() {
        let mut doc = document();
        let op = Operation::insert(
            pos(&[0]),
            vec![Node::element("paragraph").with_child(Node::text("abc"))],
        )
        .with_base_version(0);
        doc.apply_operation(&op).unwrap();
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.tree().max_offset(doc.get_root("main").unwrap()), 1);

        doc.apply_operation(&op.reversed()).unwrap();
        assert_eq!(doc.version(), 2);
        assert!(doc.is_root_empty("main"));
        assert_eq!(doc.tree().max_offset(doc.graveyard()), 1);
        assert_eq!(doc.history().len(), 2);
    }

    #[test]
    fn test_typing_keeps_the_arena_bounded() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(pos(&[0]), vec![Node::element("paragraph")])).unwrap();
        let before = doc.tree().allocated();

        for offset in 0..200 {
            apply(&mut doc, Operation::insert(pos(&[0, offset]), vec![Node::text("x")])).unwrap();
        }

        assert_eq!(doc.tree().max_offset(doc.get_root("main").unwrap()), 1);
        assert!(doc.tree().allocated() <= before + 2, "arena grew to {}", doc.tree().allocated());
    }

    #[test]
    fn test_move_into_itself_is_rejected() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(pos(&[0]), vec![Node::element("quote")]))
            .unwrap();
        let op = Operation::move_range(pos(&[0]), 1, pos(&[0, 0]));
        assert_eq!(apply(&mut doc, op).unwrap_err(), ModelError::MoveIntoItself);
    }

    #[test]
    fn test_attribute_checks_old_value() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(
            pos(&[0]),
            vec![Node::element("paragraph").with_child(Node::text("abc"))],
        ))
        .unwrap();

        let range = Range::new(pos(&[0, 0]), pos(&[0, 2]));
        let wrong = Operation::attribute(range.clone(), "bold", Some(false.into()), Some(true.into()));
        assert_eq!(
            apply(&mut doc, wrong).unwrap_err().code(),
            "attribute-operation-wrong-old-value"
        );

        let right = Operation::attribute(range, "bold", None, Some(true.into()));
        apply(&mut doc, right).unwrap();
        let paragraph = doc.node_after(&pos(&[0])).unwrap();
        assert_eq!(doc.tree().children(paragraph).len(), 2);
    }

    #[test]
    fn test_marker_removed_with_its_content() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(
            pos(&[0]),
            vec![Node::element("paragraph").with_child(Node::text("abcd"))],
        ))
        .unwrap();
        let range = Range::new(pos(&[0, 1]), pos(&[0, 3]));
        apply(&mut doc, Operation::marker("comment:1", None, Some(range), true))
            .unwrap();
        assert!(doc.markers().has("comment:1"));

        apply(&mut doc, Operation::move_range(pos(&[0]), 1, graveyard_position()))
            .unwrap();
        assert!(!doc.markers().has("comment:1"));
    }

    #[test]
    fn test_selection_leaves_removed_content() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(
            pos(&[0]),
            vec![Node::element("paragraph").with_child(Node::text("abcd"))],
        ))
        .unwrap();
        doc.selection_mut()
            .set_ranges(vec![Range::collapsed(pos(&[0, 2]))], false);

        apply(&mut doc, Operation::remove(pos(&[0, 1]), 3)).unwrap();
        assert_eq!(doc.selection().first_position().unwrap().path, vec![0, 1]);
    }

    #[test]
    fn test_common_ancestor() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(
            pos(&[0]),
            vec![
                Node::element("quote")
                    .with_child(Node::element("paragraph"))
                    .with_child(Node::element("paragraph")),
            ],
        ))
        .unwrap();
        let quote = doc.node_after(&pos(&[0])).unwrap();
        let first = doc.node_after(&pos(&[0, 0])).unwrap();
        let second = doc.node_after(&pos(&[0, 1])).unwrap();
        assert_eq!(doc.common_ancestor(first, second), Some(quote));
        assert_eq!(doc.position_after(second).unwrap().path, vec![0, 2]);
    }
}
