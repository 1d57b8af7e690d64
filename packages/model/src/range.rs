//! # Ranges
//!
//! A range is an ordered pair of positions in one root. Constructing a range
//! sets the boundary stickiness so that content inserted exactly at a
//! boundary stays outside: the start sticks to the next node and the end to
//! the previous one.

use serde::{Deserialize, Serialize};

use crate::errors::ModelResult;
use crate::operation::{Operation, OperationKind};
use crate::position::{Position, Stickiness};
use crate::document::Document;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Create a range; boundaries are swapped if given in reverse order
    pub fn new(start: Position, end: Position) -> Self {
        let (mut start, mut end) = if end.is_before(&start) { (end, start) } else { (start, end) };
        if start == end {
            start.stickiness = Stickiness::ToNone;
            end.stickiness = Stickiness::ToNone;
        } else {
            start.stickiness = Stickiness::ToNext;
            end.stickiness = Stickiness::ToPrevious;
        }
        Self { start, end }
    }

    pub fn collapsed(position: Position) -> Self {
        Self::new(position.clone(), position)
    }

    pub fn from_position_and_shift(position: &Position, shift: usize) -> Self {
        Self::new(position.clone(), position.shifted_by(shift as isize))
    }

    pub fn root(&self) -> &str {
        &self.start.root
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn is_flat(&self) -> bool {
        self.start.has_same_parent_as(&self.end)
    }

    /// Offset distance for flat ranges
    pub fn flat_len(&self) -> usize {
        self.end.offset().saturating_sub(self.start.offset())
    }

    /// Whether the position is strictly inside the range
    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    pub fn contains_range(&self, other: &Range, loose: bool) -> bool {
        let loose = loose && !other.is_collapsed();
        let contains_start = self.contains_position(&other.start) || (loose && self.start == other.start);
        let contains_end = self.contains_position(&other.end) || (loose && self.end == other.end);
        contains_start && contains_end
    }

    pub fn is_intersecting(&self, other: &Range) -> bool {
        self.start.is_before(&other.end) && self.end.is_after(&other.start)
    }

    pub fn intersection(&self, other: &Range) -> Option<Range> {
        if !self.is_intersecting(other) {
            return None;
        }
        let start = if self.start.is_after(&other.start) { &self.start } else { &other.start };
        let end = if self.end.is_before(&other.end) { &self.end } else { &other.end };
        Some(Range::new(start.clone(), end.clone()))
    }

    /// Parts of this range not covered by `other`, in order
    pub fn difference(&self, other: &Range) -> Vec<Range> {
        if !self.is_intersecting(other) {
            return vec![self.clone()];
        }
        let mut parts = Vec::new();
        if self.contains_position(&other.start) {
            parts.push(Range::new(self.start.clone(), other.start.clone()));
        }
        if self.contains_position(&other.end) {
            parts.push(Range::new(other.end.clone(), self.end.clone()));
        }
        parts
    }

    /// Join contiguous ranges around the first one. The first range is the
    /// reference: ranges not touching it (directly or through others) are
    /// dropped.
    pub fn span(ranges: &[Range]) -> Option<Range> {
        let reference = ranges.first()?.clone();
        let mut sorted: Vec<Range> = ranges.to_vec();
        sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
        let index = sorted.iter().position(|r| *r == reference).unwrap_or(0);

        let mut start = reference.start.clone();
        let mut end = reference.end.clone();
        for range in sorted[..index].iter().rev() {
            if range.end == start {
                start = range.start.clone();
            } else {
                break;
            }
        }
        for range in &sorted[index + 1..] {
            if range.start == end {
                end = range.end.clone();
            } else {
                break;
            }
        }

        Some(Range::new(start, end))
    }

    /// Range after an insertion. With `spread`, an insertion strictly inside
    /// the range at its own level splits it into two parts that exclude the
    /// inserted content.
    pub fn transformed_by_insertion(&self, at: &Position, how_many: usize, spread: bool) -> Vec<Range> {
        if spread && self.contains_position(at) && at.parent_path() == self.start.parent_path() {
            return vec![
                Range::new(self.start.clone(), at.clone()),
                Range::new(
                    at.shifted_by(how_many as isize),
                    self.end.transformed_by_insertion(at, how_many),
                ),
            ];
        }

        vec![self.with_boundaries(
            self.start.transformed_by_insertion(at, how_many),
            self.end.transformed_by_insertion(at, how_many),
        )]
    }

    /// Range after a move. The result may hold several ranges when the move
    /// took a part of this range elsewhere: the parts that stayed first,
    /// then the moved part.
    pub fn transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        if self.is_collapsed() {
            let position = self.start.transformed_by_move(source, target, how_many);
            return vec![Range::collapsed(position)];
        }

        let move_range = Range::from_position_and_shift(source, how_many);
        let insert_position = target
            .transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        // A part of the range moved towards the range itself: keep it whole.
        if self.contains_position(target)
            && !spread
            && (move_range.contains_position(&self.start) || move_range.contains_position(&self.end))
        {
            let start = self.start.transformed_by_move(source, target, how_many);
            let end = self.end.transformed_by_move(source, target, how_many);
            return vec![Range::new(start, end)];
        }

        let differences = self.difference(&move_range);
        let common = self.intersection(&move_range);
        let deleted = |position: &Position| {
            position
                .transformed_by_deletion(source, how_many)
                .unwrap_or_else(|| position.clone())
        };

        let difference = match differences.len() {
            1 => Some(Range::new(deleted(&differences[0].start), deleted(&differences[0].end))),
            2 => Some(Range::new(self.start.clone(), deleted(&self.end))),
            _ => None,
        };

        let mut result = match &difference {
            Some(difference) => {
                difference.transformed_by_insertion(&insert_position, how_many, common.is_some() || spread)
            }
            None => Vec::new(),
        };

        if let Some(common) = common {
            let moved = Range::new(
                common.start.combined(&move_range.start, &insert_position),
                common.end.combined(&move_range.start, &insert_position),
            );
            if result.len() == 2 {
                result.insert(1, moved);
            } else {
                result.push(moved);
            }
        }

        result
    }

    pub fn transformed_by_operation(&self, operation: &Operation) -> Vec<Range> {
        match &operation.kind {
            OperationKind::Insert { position, nodes } => {
                self.transformed_by_insertion(position, crate::node::offset_size_of(nodes), false)
            }
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => self.transformed_by_move(source_position, target_position, *how_many, false),
            _ => vec![self.clone()],
        }
    }

    fn with_boundaries(&self, start: Position, end: Position) -> Range {
        let mut range = self.clone();
        range.start = start;
        range.end = end;
        if range.end.is_before(&range.start) {
            return Range::new(range.start, range.end);
        }
        range
    }

    /// Smallest set of flat ranges covering exactly this range
    pub fn minimal_flat_ranges(&self, document: &Document) -> ModelResult<Vec<Range>> {
        let mut ranges = Vec::new();
        let diff_at = self.start.common_path(&self.end).len();
        let mut position = self.start.clone();
        position.stickiness = Stickiness::ToNone;

        // Go up from the start
        while position.path.len() > diff_at + 1 {
            let parent = document.parent_of(&position)?;
            let how_many = document.tree().max_offset(parent).saturating_sub(position.offset());
            if how_many != 0 {
                ranges.push(Range::from_position_and_shift(&position, how_many));
            }
            position.path.pop();
            let offset = position.offset() + 1;
            position.set_offset(offset);
        }

        // Go down to the end
        while position.path.len() <= self.end.path.len() {
            let offset = self.end.path[position.path.len() - 1];
            let how_many = offset.saturating_sub(position.offset());
            if how_many != 0 {
                ranges.push(Range::from_position_and_shift(&position, how_many));
            }
            position.set_offset(offset);
            position.path.push(0);
        }

        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn range(start: &[usize], end: &[usize]) -> Range {
        Range::new(pos(start), pos(end))
    }

    fn paths(ranges: &[Range]) -> Vec<(Vec<usize>, Vec<usize>)> {
        ranges.iter().map(|r| (r.start.path.clone(), r.end.path.clone())).collect()
    }

    #[test]
    fn test_boundary_stickiness() {
        let r = range(&[0, 1], &[0, 4]);
        assert_eq!(r.start.stickiness, Stickiness::ToNext);
        assert_eq!(r.end.stickiness, Stickiness::ToPrevious);

        // Content inserted at a boundary stays outside.
        let at_start = r.transformed_by_insertion(&pos(&[0, 1]), 2, false);
        assert_eq!(paths(&at_start), vec![(vec![0, 3], vec![0, 6])]);
        let at_end = r.transformed_by_insertion(&pos(&[0, 4]), 2, false);
        assert_eq!(paths(&at_end), vec![(vec![0, 1], vec![0, 4])]);
    }

    #[test]
    fn test_spread_insertion_splits() {
        let r = range(&[0, 1], &[0, 4]);
        let parts = r.transformed_by_insertion(&pos(&[0, 2]), 3, true);
        assert_eq!(paths(&parts), vec![(vec![0, 1], vec![0, 2]), (vec![0, 5], vec![0, 7])]);
    }

    #[test]
    fn test_intersection_and_difference() {
        let a = range(&[0], &[4]);
        let b = range(&[2], &[6]);
        assert_eq!(a.intersection(&b), Some(range(&[2], &[4])));
        assert_eq!(paths(&a.difference(&b)), vec![(vec![0], vec![2])]);
        assert_eq!(paths(&b.difference(&range(&[3], &[4]))), vec![(vec![2], vec![3]), (vec![4], vec![6])]);
        assert!(range(&[0], &[1]).intersection(&range(&[1], &[2])).is_none());
    }

    #[test]
    fn test_move_of_inner_part_elsewhere() {
        // Range [0,1]-[0,5]; move [0,2]-[0,4] to [1,0].
        let r = range(&[0, 1], &[0, 5]);
        let parts = r.transformed_by_move(&pos(&[0, 2]), &pos(&[1, 0]), 2, false);
        assert_eq!(paths(&parts), vec![(vec![0, 1], vec![0, 3]), (vec![1, 0], vec![1, 2])]);
        assert_eq!(Range::span(&parts), Some(range(&[0, 1], &[0, 3])));
    }

    #[test]
    fn test_move_of_whole_range() {
        let r = range(&[0, 1], &[0, 3]);
        let parts = r.transformed_by_move(&pos(&[0, 0]), &Position::new("$graveyard", vec![0]), 4, false);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].root(), "$graveyard");
        assert_eq!(parts[0].start.path, vec![1]);
        assert_eq!(parts[0].end.path, vec![3]);
    }

    #[test]
    fn test_contains_range() {
        let r = range(&[0], &[4]);
        assert!(r.contains_range(&range(&[1], &[2]), false));
        assert!(!r.contains_range(&range(&[0], &[2]), false));
        assert!(r.contains_range(&range(&[0], &[2]), true));
    }
}
