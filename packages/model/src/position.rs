//! # Positions
//!
//! A position is a root name plus a path of offsets. All but the last
//! segment walk down through elements; the last one is the offset inside the
//! parent, counting one per character of text.
//!
//! Positions are plain values: they hold no reference to the tree, so they
//! can be stored in operations, transformed and compared without a document.
//! Transformation functions follow the operations applied to the document
//! and are the building block of operational transformation, marker and
//! selection tracking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::operation::{Operation, OperationKind};

/// How a position reacts to content inserted exactly at it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stickiness {
    /// Moves after the inserted content
    #[default]
    ToNone,
    /// Sticks to the node after it
    ToNext,
    /// Sticks to the node before it, staying before inserted content
    ToPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Before,
    After,
    Same,
    Different,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub root: String,
    pub path: Vec<usize>,
    #[serde(default, skip_serializing_if = "is_default_stickiness")]
    pub stickiness: Stickiness,
}

fn is_default_stickiness(stickiness: &Stickiness) -> bool {
    *stickiness == Stickiness::ToNone
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.path == other.path
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root.hash(state);
        self.path.hash(state);
    }
}

/// Result of comparing two offset arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayRelation {
    Same,
    /// The first array is a proper prefix of the second
    Prefix,
    /// The first array extends the second
    Extension,
    /// Index of the first differing item
    Differ(usize),
}

pub(crate) fn compare_arrays(a: &[usize], b: &[usize]) -> ArrayRelation {
    let common = a.len().min(b.len());
    for i in 0..common {
        if a[i] != b[i] {
            return ArrayRelation::Differ(i);
        }
    }
    match a.len().cmp(&b.len()) {
        Ordering::Equal => ArrayRelation::Same,
        Ordering::Less => ArrayRelation::Prefix,
        Ordering::Greater => ArrayRelation::Extension,
    }
}

impl Position {
    /// # Panics
    ///
    /// Panics if `path` is empty; a position always has an offset.
    pub fn new(root: impl Into<String>, path: Vec<usize>) -> Self {
        assert!(!path.is_empty(), "position path cannot be empty");
        Self {
            root: root.into(),
            path,
            stickiness: Stickiness::ToNone,
        }
    }

    pub fn with_stickiness(mut self, stickiness: Stickiness) -> Self {
        self.stickiness = stickiness;
        self
    }

    pub fn offset(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }

    pub fn set_offset(&mut self, offset: usize) {
        if let Some(last) = self.path.last_mut() {
            *last = offset;
        }
    }

    pub fn parent_path(&self) -> &[usize] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn has_same_parent_as(&self, other: &Position) -> bool {
        self.root == other.root && self.parent_path() == other.parent_path()
    }

    /// Tree-order comparison. Positions in different roots are `Different`.
    pub fn compare(&self, other: &Position) -> PositionRelation {
        if self.root != other.root {
            return PositionRelation::Different;
        }
        match compare_arrays(&self.path, &other.path) {
            ArrayRelation::Same => PositionRelation::Same,
            ArrayRelation::Prefix => PositionRelation::Before,
            ArrayRelation::Extension => PositionRelation::After,
            ArrayRelation::Differ(i) => {
                if self.path[i] < other.path[i] {
                    PositionRelation::Before
                } else {
                    PositionRelation::After
                }
            }
        }
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare(other) == PositionRelation::Before
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare(other) == PositionRelation::After
    }

    /// Common prefix of both paths (empty for different roots)
    pub fn common_path(&self, other: &Position) -> Vec<usize> {
        if self.root != other.root {
            return Vec::new();
        }
        match compare_arrays(&self.path, &other.path) {
            ArrayRelation::Same => self.path.clone(),
            ArrayRelation::Prefix => self.path.clone(),
            ArrayRelation::Extension => other.path.clone(),
            ArrayRelation::Differ(i) => self.path[..i].to_vec(),
        }
    }

    /// Same parent, offset moved by `shift` (clamped at zero)
    pub fn shifted_by(&self, shift: isize) -> Position {
        let mut shifted = self.clone();
        let offset = self.offset() as isize + shift;
        shifted.set_offset(offset.max(0) as usize);
        shifted
    }

    /// Position after `how_many` offsets were inserted at `at`
    pub fn transformed_by_insertion(&self, at: &Position, how_many: usize) -> Position {
        let mut transformed = self.clone();
        if self.root != at.root || how_many == 0 {
            return transformed;
        }

        match compare_arrays(at.parent_path(), self.parent_path()) {
            ArrayRelation::Same => {
                let shift = at.offset() < self.offset()
                    || (at.offset() == self.offset() && self.stickiness != Stickiness::ToPrevious);
                if shift {
                    transformed.set_offset(self.offset() + how_many);
                }
            }
            ArrayRelation::Prefix => {
                let i = at.path.len() - 1;
                if at.offset() <= self.path[i] {
                    transformed.path[i] += how_many;
                }
            }
            _ => {}
        }

        transformed
    }

    /// Position after `how_many` offsets were removed at `at`. `None` when
    /// the position was inside the removed part.
    pub fn transformed_by_deletion(&self, at: &Position, how_many: usize) -> Option<Position> {
        let mut transformed = self.clone();
        if self.root != at.root {
            return Some(transformed);
        }

        match compare_arrays(at.parent_path(), self.parent_path()) {
            ArrayRelation::Same => {
                if at.offset() < self.offset() {
                    if at.offset() + how_many > self.offset() {
                        return None;
                    }
                    transformed.set_offset(self.offset() - how_many);
                }
            }
            ArrayRelation::Prefix => {
                let i = at.path.len() - 1;
                if at.offset() <= self.path[i] {
                    if at.offset() + how_many > self.path[i] {
                        return None;
                    }
                    transformed.path[i] -= how_many;
                }
            }
            _ => {}
        }

        Some(transformed)
    }

    /// Position after a move of `how_many` offsets from `source` to `target`,
    /// where `target` is expressed before the move.
    pub fn transformed_by_move(&self, source: &Position, target: &Position, how_many: usize) -> Position {
        let target = target
            .transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        let removed = self.transformed_by_deletion(source, how_many);
        let sticks_into_moved = (source == self && self.stickiness == Stickiness::ToNext)
            || (source.shifted_by(how_many as isize) == *self && self.stickiness == Stickiness::ToPrevious);

        match removed {
            Some(position) if !sticks_into_moved => position.transformed_by_insertion(&target, how_many),
            _ => self.combined(source, &target),
        }
    }

    /// Re-root a position that was inside a range starting at `source` so it
    /// points into the same place relative to `target`.
    pub fn combined(&self, source: &Position, target: &Position) -> Position {
        let i = source.path.len() - 1;
        let mut combined = target.clone();
        combined.stickiness = self.stickiness;

        let relative = self.path.get(i).copied().unwrap_or(0).saturating_sub(source.offset());
        combined.set_offset(combined.offset() + relative);
        if self.path.len() > i + 1 {
            combined.path.extend_from_slice(&self.path[i + 1..]);
        }

        combined
    }

    pub fn transformed_by_operation(&self, operation: &Operation) -> Position {
        match &operation.kind {
            OperationKind::Insert { position, nodes } => {
                self.transformed_by_insertion(position, crate::node::offset_size_of(nodes))
            }
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => self.transformed_by_move(source_position, target_position, *how_many),
            _ => self.clone(),
        }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            PositionRelation::Before => Some(Ordering::Less),
            PositionRelation::After => Some(Ordering::Greater),
            PositionRelation::Same => Some(Ordering::Equal),
            PositionRelation::Different => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    #[test]
    fn test_compare_is_total_within_root() {
        let positions = [pos(&[0]), pos(&[0, 2]), pos(&[1]), pos(&[1, 0, 5]), pos(&[2])];
        for (i, a) in positions.iter().enumerate() {
            for (j, b) in positions.iter().enumerate() {
                let expected = match i.cmp(&j) {
                    Ordering::Less => PositionRelation::Before,
                    Ordering::Equal => PositionRelation::Same,
                    Ordering::Greater => PositionRelation::After,
                };
                assert_eq!(a.compare(b), expected, "{:?} vs {:?}", a.path, b.path);
            }
        }
        assert_eq!(pos(&[0]).compare(&Position::new("other", vec![0])), PositionRelation::Different);
    }

    #[test]
    fn test_insertion_respects_stickiness() {
        let at = pos(&[1, 2]);
        assert_eq!(pos(&[1, 2]).transformed_by_insertion(&at, 3).path, vec![1, 5]);
        assert_eq!(
            pos(&[1, 2])
                .with_stickiness(Stickiness::ToPrevious)
                .transformed_by_insertion(&at, 3)
                .path,
            vec![1, 2]
        );
        assert_eq!(pos(&[1, 1]).transformed_by_insertion(&at, 3).path, vec![1, 1]);
        // Insertion before an ancestor shifts the ancestor segment.
        assert_eq!(pos(&[2, 4]).transformed_by_insertion(&pos(&[1]), 2).path, vec![4, 4]);
    }

    #[test]
    fn test_deletion() {
        let at = pos(&[0, 1]);
        assert_eq!(pos(&[0, 5]).transformed_by_deletion(&at, 2).unwrap().path, vec![0, 3]);
        assert!(pos(&[0, 2]).transformed_by_deletion(&at, 2).is_none());
        assert_eq!(pos(&[0, 3]).transformed_by_deletion(&at, 2).unwrap().path, vec![0, 1]);
        assert!(pos(&[1, 0]).transformed_by_deletion(&pos(&[1]), 1).is_none());
    }

    #[test]
    fn test_move_carries_inner_positions() {
        // Move two paragraphs [1]..[3] to the end of the root at offset 5.
        let source = pos(&[1]);
        let target = pos(&[5]);
        assert_eq!(pos(&[2, 3]).transformed_by_move(&source, &target, 2).path, vec![4, 3]);
        assert_eq!(pos(&[4]).transformed_by_move(&source, &target, 2).path, vec![2]);
        assert_eq!(pos(&[0, 1]).transformed_by_move(&source, &target, 2).path, vec![0, 1]);
    }

    #[test]
    fn test_move_to_graveyard() {
        let source = pos(&[0, 2]);
        let target = Position::new("$graveyard", vec![0]);
        let inside = pos(&[0, 3]).transformed_by_move(&source, &target, 2);
        assert_eq!(inside.root, "$graveyard");
        assert_eq!(inside.path, vec![1]);
    }

    #[test]
    fn test_shifted_by_clamps() {
        assert_eq!(pos(&[0, 2]).shifted_by(-5).path, vec![0, 0]);
    }
}
