//! # Differ
//!
//! Collects what changed in the document since the last flush, in a form
//! the downcast conversion can replay on the view.
//!
//! ## Design
//!
//! Before an operation touches a parent element for the first time, the
//! differ snapshots that parent's children: one item per element (keyed by
//! node handle and name) and one item per character. When changes are
//! requested, each snapshot is compared with the current children using a
//! Myers diff:
//!
//! - deleted items become `Remove` entries, inserted ones `Insert` entries
//! - equal items whose attributes differ become `Attribute` entries
//! - consecutive characters collapse into one `$text` entry, so typing
//!   "abc" in three operations still yields a single insert
//!
//! Entry positions are sequential: within a parent, each entry's offset
//! accounts for the entries before it, so a consumer applies them in order.
//! A renamed element shows up as a remove plus an insert. Parents that are
//! now in the graveyard, detached, or inside content reported as inserted
//! are skipped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::document::{Document, GRAVEYARD};
use crate::node::{Attributes, TEXT_NAME};
use crate::position::Position;
use crate::range::Range;
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DiffEntry {
    Insert {
        parent: NodeId,
        position: Position,
        length: usize,
        name: String,
    },
    Remove {
        parent: NodeId,
        position: Position,
        length: usize,
        name: String,
    },
    Attribute {
        parent: NodeId,
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

impl DiffEntry {
    pub fn parent(&self) -> NodeId {
        match self {
            DiffEntry::Insert { parent, .. } | DiffEntry::Remove { parent, .. } | DiffEntry::Attribute { parent, .. } => {
                *parent
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DiffEntry::Insert { .. } => "insert",
            DiffEntry::Remove { .. } => "remove",
            DiffEntry::Attribute { .. } => "attribute",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerChange {
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
    pub affects_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootChange {
    pub name: String,
    pub was_attached: bool,
    pub is_attached: bool,
}

/// Everything a consumer needs to bring its view up to date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub changes: Vec<DiffEntry>,
    pub markers_to_remove: Vec<(String, Range)>,
    pub markers_to_add: Vec<(String, Range)>,
    pub root_changes: Vec<RootChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
            && self.markers_to_remove.is_empty()
            && self.markers_to_add.is_empty()
            && self.root_changes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum SnapshotKey {
    Element(NodeId, String),
    Char(char),
}

#[derive(Debug, Clone)]
struct SnapshotItem {
    key: SnapshotKey,
    attributes: Attributes,
}

#[derive(Debug, Default)]
pub struct Differ {
    snapshots: BTreeMap<NodeId, Vec<SnapshotItem>>,
    marker_changes: BTreeMap<String, MarkerChange>,
    root_changes: BTreeMap<String, RootChange>,
}

fn capture(tree: &Tree, parent: NodeId) -> Vec<SnapshotItem> {
    let mut items = Vec::with_capacity(tree.max_offset(parent));
    for &child in tree.children(parent) {
        let attributes = tree.attributes(child);
        match tree.text(child) {
            Some(data) => items.extend(data.chars().map(|c| SnapshotItem {
                key: SnapshotKey::Char(c),
                attributes: attributes.clone(),
            })),
            None => items.push(SnapshotItem {
                key: SnapshotKey::Element(child, tree.item_name(child).to_string()),
                attributes: attributes.clone(),
            }),
        }
    }
    items
}

impl Differ {
    pub(crate) fn snapshot_parent(&mut self, tree: &Tree, parent: NodeId) {
        self.snapshots.entry(parent).or_insert_with(|| capture(tree, parent));
    }

    /// Keep the first old range and the latest new range of a marker
    pub(crate) fn buffer_marker_change(
        &mut self,
        name: &str,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    ) {
        self.marker_changes
            .entry(name.to_string())
            .and_modify(|change| {
                change.new_range = new_range.clone();
                change.affects_data = affects_data;
            })
            .or_insert(MarkerChange {
                old_range,
                new_range,
                affects_data,
            });
    }

    pub(crate) fn buffer_root_change(&mut self, name: &str, was_attached: bool, is_attached: bool) {
        self.root_changes
            .entry(name.to_string())
            .and_modify(|change| change.is_attached = is_attached)
            .or_insert(RootChange {
                name: name.to_string(),
                was_attached,
                is_attached,
            });
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.marker_changes.is_empty() && self.root_changes.is_empty()
    }

    pub fn marker_changes(&self) -> impl Iterator<Item = (&str, &MarkerChange)> {
        self.marker_changes.iter().map(|(name, change)| (name.as_str(), change))
    }

    pub fn markers_to_remove(&self) -> Vec<(String, Range)> {
        self.marker_changes
            .iter()
            .filter(|(_, change)| change.old_range != change.new_range)
            .filter_map(|(name, change)| change.old_range.clone().map(|range| (name.clone(), range)))
            .collect()
    }

    pub fn markers_to_add(&self) -> Vec<(String, Range)> {
        self.marker_changes
            .iter()
            .filter(|(_, change)| change.old_range != change.new_range)
            .filter_map(|(name, change)| change.new_range.clone().map(|range| (name.clone(), range)))
            .collect()
    }

    /// Root attach state changes that did not cancel out
    pub fn root_changes(&self) -> Vec<RootChange> {
        self.root_changes
            .values()
            .filter(|change| change.was_attached != change.is_attached)
            .cloned()
            .collect()
    }

    /// Whether the buffered changes affect the data output
    pub fn has_data_changes(&self, document: &Document) -> bool {
        !self.changes(document).is_empty()
            || !self.root_changes().is_empty()
            || self
                .marker_changes
                .values()
                .any(|change| change.affects_data && change.old_range != change.new_range)
    }

    pub(crate) fn reset(&mut self) {
        self.snapshots.clear();
        self.marker_changes.clear();
        self.root_changes.clear();
    }

    pub fn changes(&self, document: &Document) -> Vec<DiffEntry> {
        let tree = document.tree();

        let mut parents: Vec<(String, Vec<usize>, NodeId)> = self
            .snapshots
            .keys()
            .filter_map(|&parent| {
                let root = document.root_name_of(parent)?;
                if root == GRAVEYARD || !document.is_attached(root) {
                    return None;
                }
                Some((root.to_string(), tree.path(parent), parent))
            })
            .collect();
        parents.sort();

        let mut inserted: BTreeSet<NodeId> = BTreeSet::new();
        let mut entries = Vec::new();

        for (root, path, parent) in parents {
            let inside_inserted = inserted.contains(&parent)
                || tree.ancestors(parent).iter().any(|ancestor| inserted.contains(ancestor));
            if inside_inserted {
                continue;
            }

            let old = &self.snapshots[&parent];
            let new = capture(tree, parent);
            let mut diff = ParentDiff {
                parent,
                root: &root,
                path: &path,
                entries: &mut entries,
                inserted: &mut inserted,
                offset: 0,
            };
            diff.run(old, &new);
        }

        entries
    }
}

/// Diff of one parent's snapshot against its current children
struct ParentDiff<'a> {
    parent: NodeId,
    root: &'a str,
    path: &'a [usize],
    entries: &'a mut Vec<DiffEntry>,
    inserted: &'a mut BTreeSet<NodeId>,
    offset: usize,
}

impl ParentDiff<'_> {
    fn position(&self, offset: usize) -> Position {
        let mut path = self.path.to_vec();
        path.push(offset);
        Position::new(self.root, path)
    }

    fn run(&mut self, old: &[SnapshotItem], new: &[SnapshotItem]) {
        let old_keys: Vec<SnapshotKey> = old.iter().map(|item| item.key.clone()).collect();
        let new_keys: Vec<SnapshotKey> = new.iter().map(|item| item.key.clone()).collect();

        for op in capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
            match op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                    len,
                } => {
                    self.attributes(&old[old_index..old_index + len], &new[new_index..new_index + len]);
                    self.offset += len;
                }
                DiffOp::Delete {
                    old_index, old_len, ..
                } => self.removed(&old[old_index..old_index + old_len]),
                DiffOp::Insert {
                    new_index, new_len, ..
                } => self.inserted(&new[new_index..new_index + new_len]),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    self.removed(&old[old_index..old_index + old_len]);
                    self.inserted(&new[new_index..new_index + new_len]);
                }
            }
        }
    }

    fn removed(&mut self, items: &[SnapshotItem]) {
        for (length, name) in runs(items) {
            let position = self.position(self.offset);
            self.entries.push(DiffEntry::Remove {
                parent: self.parent,
                position,
                length,
                name,
            });
        }
    }

    fn inserted(&mut self, items: &[SnapshotItem]) {
        for item in items {
            if let SnapshotKey::Element(id, _) = &item.key {
                self.inserted.insert(*id);
            }
        }
        for (length, name) in runs(items) {
            let position = self.position(self.offset);
            self.entries.push(DiffEntry::Insert {
                parent: self.parent,
                position,
                length,
                name,
            });
            self.offset += length;
        }
    }

    /// Attribute entries over a run of equal items, merged per key while
    /// the old and new values stay the same
    fn attributes(&mut self, old: &[SnapshotItem], new: &[SnapshotItem]) {
        type Open = (usize, Option<Value>, Option<Value>);
        let mut open: BTreeMap<String, Open> = BTreeMap::new();

        for (i, (before, after)) in old.iter().zip(new.iter()).enumerate() {
            let offset = self.offset + i;
            let keys: BTreeSet<&String> = before.attributes.keys().chain(after.attributes.keys()).collect();
            let mut current: BTreeMap<String, (Option<Value>, Option<Value>)> = BTreeMap::new();
            for key in keys {
                let old_value = before.attributes.get(key).cloned();
                let new_value = after.attributes.get(key).cloned();
                if old_value != new_value {
                    current.insert(key.clone(), (old_value, new_value));
                }
            }

            let closing: Vec<String> = open
                .iter()
                .filter(|(key, (_, old_value, new_value))| {
                    current
                        .get(*key)
                        .map_or(true, |(o, n)| o != old_value || n != new_value)
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in closing {
                if let Some(entry) = open.remove(&key) {
                    self.close_attribute(key, entry, offset);
                }
            }

            for (key, (old_value, new_value)) in current {
                open.entry(key).or_insert((offset, old_value, new_value));
            }
        }

        let end = self.offset + old.len();
        for (key, entry) in std::mem::take(&mut open) {
            self.close_attribute(key, entry, end);
        }
    }

    fn close_attribute(&mut self, key: String, (start, old_value, new_value): (usize, Option<Value>, Option<Value>), end: usize) {
        let range = Range::new(self.position(start), self.position(end));
        self.entries.push(DiffEntry::Attribute {
            parent: self.parent,
            range,
            key,
            old_value,
            new_value,
        });
    }
}

/// Split items into `(length, name)` runs: characters group together,
/// elements stand alone
fn runs(items: &[SnapshotItem]) -> Vec<(usize, String)> {
    let mut runs: Vec<(usize, String)> = Vec::new();
    for item in items {
        match &item.key {
            SnapshotKey::Char(_) => match runs.last_mut() {
                Some((length, name)) if name == TEXT_NAME => *length += 1,
                _ => runs.push((1, TEXT_NAME.to_string())),
            },
            SnapshotKey::Element(_, name) => runs.push((1, name.clone())),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::operation::Operation;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn apply(doc: &mut Document, operation: Operation) {
        let version = doc.version();
        doc.apply_operation(&operation.with_base_version(version)).unwrap();
    }

    fn document() -> Document {
        let mut document = Document::new();
        document.create_root("main", "$root").unwrap();
        apply(
            &mut document,
            Operation::insert(pos(&[0]), vec![Node::element("paragraph").with_child(Node::text("foo"))]),
        );
        document.flush_changes();
        document
    }

    fn summary(entries: &[DiffEntry]) -> Vec<(String, Vec<usize>, usize)> {
        entries
            .iter()
            .map(|entry| match entry {
                DiffEntry::Insert {
                    position, length, name, ..
                } => (format!("insert:{name}"), position.path.clone(), *length),
                DiffEntry::Remove {
                    position, length, name, ..
                } => (format!("remove:{name}"), position.path.clone(), *length),
                DiffEntry::Attribute { range, key, .. } => {
                    (format!("attribute:{key}"), range.start.path.clone(), range.flat_len())
                }
            })
            .collect()
    }

    #[test]
    fn test_typing_coalesces_into_one_insert() {
        let mut doc = document();
        for (i, c) in "abc".chars().enumerate() {
            let op = Operation::insert(pos(&[0, 3 + i]), vec![Node::text(c.to_string())]);
            apply(&mut doc, op);
        }
        assert_eq!(summary(&doc.changes()), vec![("insert:$text".to_string(), vec![0, 3], 3)]);
    }

    #[test]
    fn test_move_reports_remove_and_insert() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(pos(&[1]), vec![Node::element("paragraph")]));
        doc.flush_changes();

        apply(&mut doc, Operation::move_range(pos(&[0, 1]), 2, pos(&[1, 0])));
        assert_eq!(
            summary(&doc.changes()),
            vec![
                ("remove:$text".to_string(), vec![0, 1], 2),
                ("insert:$text".to_string(), vec![1, 0], 2),
            ]
        );
    }

    #[test]
    fn test_attribute_change_and_rename() {
        let mut doc = document();
        let range = Range::new(pos(&[0, 0]), pos(&[0, 2]));
        apply(&mut doc, Operation::attribute(range, "bold", None, Some(true.into())));
        apply(&mut doc, Operation::rename(pos(&[0]), "paragraph", "heading1"));

        assert_eq!(
            summary(&doc.changes()),
            vec![
                ("remove:paragraph".to_string(), vec![0], 1),
                ("insert:heading1".to_string(), vec![0], 1),
            ]
        );
    }

    #[test]
    fn test_content_of_inserted_element_is_not_reported_twice() {
        let mut doc = document();
        apply(&mut doc, Operation::insert(pos(&[1]), vec![Node::element("paragraph")]));
        apply(&mut doc, Operation::insert(pos(&[1, 0]), vec![Node::text("bar")]));
        assert_eq!(summary(&doc.changes()), vec![("insert:paragraph".to_string(), vec![1], 1)]);
    }

    #[test]
    fn test_flush_resets_and_markers_are_buffered() {
        let mut doc = document();
        let range = Range::new(pos(&[0, 0]), pos(&[0, 1]));
        apply(&mut doc, Operation::marker("comment:1", None, Some(range.clone()), true));
        let set = doc.flush_changes();
        assert_eq!(set.markers_to_add, vec![("comment:1".to_string(), range)]);
        assert!(set.markers_to_remove.is_empty());
        assert!(doc.flush_changes().is_empty());
    }
}
