//! # Operational transformation
//!
//! `transform(a, b, context)` rewrites `a` so it can be applied after `b`,
//! where both were created against the same document version. The result
//! is a list: a move whose source overlaps another move is split into
//! several moves, and an operation cancelled by `b` becomes a single `NoOp`.
//!
//! `context.a_is_strong` breaks ties (two insertions at one position, two
//! renames of one element, two changes of one marker). For convergence the
//! two directions of a pair must be transformed with opposite strengths.
//!
//! ## Moves
//!
//! A move that puts a range back where it is changes nothing and is treated
//! as `NoOp` on both sides. Two moves that share nodes, or where one targets
//! the other's range, conflict. The weaker one is rebased on the stronger
//! one. The stronger one is rewritten to revert the weaker move, apply itself
//! and replay the rebased weaker move, so both orders end in the same tree.
//! A remove keeps every node it targeted, wherever the other move put them.

use std::collections::VecDeque;

use tracing::trace;

use crate::document::GRAVEYARD;
use crate::node::offset_size_of;
use crate::operation::{Operation, OperationKind};
use crate::position::{Position, Stickiness};
use crate::range::Range;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformContext {
    pub a_is_strong: bool,
}

impl TransformContext {
    pub fn strong() -> Self {
        Self { a_is_strong: true }
    }

    pub fn weak() -> Self {
        Self { a_is_strong: false }
    }
}

/// Transform `a` by `b`
pub fn transform(a: &Operation, b: &Operation, context: &TransformContext) -> Vec<Operation> {
    let kinds = transform_kind(a, b, context.a_is_strong);
    let version = b.base_version.map(|v| v + 1).or(a.base_version);

    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Operation {
            base_version: version.map(|v| v + i as u64),
            kind,
        })
        .collect()
}

/// Transform two concurrent sequences against each other. Returns
/// `(a', b')` such that applying `b` then `a'` equals applying `a` then
/// `b'` for the documented conflict classes.
pub fn transform_sets(a: Vec<Operation>, b: Vec<Operation>, a_is_strong: bool) -> (Vec<Operation>, Vec<Operation>) {
    let mut b = b;
    let mut a_out = Vec::with_capacity(a.len());

    for op in a {
        let (pieces, transformed_b) = transform_against_set(op, b, a_is_strong);
        a_out.extend(pieces);
        b = transformed_b;
    }

    (a_out, b)
}

fn transform_against_set(op: Operation, set: Vec<Operation>, strong: bool) -> (Vec<Operation>, Vec<Operation>) {
    let mut pieces = vec![op];
    let mut set_out = Vec::with_capacity(set.len());

    for other in set {
        if pieces.len() == 1 {
            let piece = &pieces[0];
            let transformed_other = transform(&other, piece, &TransformContext { a_is_strong: !strong });
            pieces = transform(piece, &other, &TransformContext { a_is_strong: strong });
            set_out.extend(transformed_other);
        } else {
            let (other_pieces, transformed_pieces) = transform_against_set(other, pieces, !strong);
            set_out.extend(other_pieces);
            pieces = transformed_pieces;
        }
    }

    (pieces, set_out)
}

fn plain(position: &Position) -> Position {
    position.clone().with_stickiness(Stickiness::ToNone)
}

fn transform_kind(a: &Operation, b: &Operation, strong: bool) -> Vec<OperationKind> {
    use OperationKind::*;

    if MoveSpan::of(&b.kind).is_some_and(|span| span.is_in_place()) {
        return vec![a.kind.clone()];
    }
    if MoveSpan::of(&a.kind).is_some_and(|span| span.is_in_place()) {
        return vec![NoOp];
    }

    match (&a.kind, &b.kind) {
        (NoOp, _) => vec![NoOp],
        (_, NoOp) => vec![a.kind.clone()],

        (Insert { position, nodes }, Insert { position: at, nodes: inserted }) => {
            let position = if position == at && strong {
                position.clone()
            } else {
                position.transformed_by_insertion(at, offset_size_of(inserted))
            };
            vec![Insert {
                position: plain(&position),
                nodes: nodes.clone(),
            }]
        }
        (
            Insert { position, nodes },
            Move {
                source_position,
                how_many,
                target_position,
            },
        ) => vec![Insert {
            position: plain(&position.transformed_by_move(source_position, target_position, *how_many)),
            nodes: nodes.clone(),
        }],
        (Insert { .. }, _) => vec![a.kind.clone()],

        (
            Move {
                source_position,
                how_many,
                target_position,
            },
            Insert { position: at, nodes },
        ) => move_by_insert(source_position, *how_many, target_position, at, offset_size_of(nodes)),
        (Move { .. }, Move { .. }) => match (MoveSpan::of(&a.kind), MoveSpan::of(&b.kind)) {
            (Some(a_span), Some(b_span)) => move_by_move(a_span, b_span, strong),
            _ => vec![a.kind.clone()],
        },
        (Move { .. }, _) => vec![a.kind.clone()],

        (
            Attribute {
                range,
                key,
                old_value,
                new_value,
            },
            Insert { position: at, nodes },
        ) => attribute_parts(
            range.transformed_by_insertion(at, offset_size_of(nodes), true),
            key,
            old_value,
            new_value,
        ),
        (
            Attribute {
                range,
                key,
                old_value,
                new_value,
            },
            Move {
                source_position,
                how_many,
                target_position,
            },
        ) => {
            let nested_in_range = source_position.parent_path().len() > range.start.parent_path().len()
                && range.contains_position(source_position);
            let parts = if nested_in_range {
                let insert_at = target_position
                    .transformed_by_deletion(source_position, *how_many)
                    .unwrap_or_else(|| target_position.clone());
                range.transformed_by_insertion(&insert_at, *how_many, true)
            } else {
                range.transformed_by_move(source_position, target_position, *how_many, true)
            };
            attribute_parts(parts, key, old_value, new_value)
        }
        (
            Attribute {
                range,
                key,
                old_value,
                new_value,
            },
            Attribute {
                range: b_range,
                key: b_key,
                new_value: b_new_value,
                ..
            },
        ) => {
            let overlaps = key == b_key
                && range.start.has_same_parent_as(&b_range.start)
                && range.is_intersecting(b_range);
            if !overlaps {
                return vec![a.kind.clone()];
            }

            let mut result: Vec<OperationKind> = range
                .difference(b_range)
                .into_iter()
                .map(|part| Attribute {
                    range: part,
                    key: key.clone(),
                    old_value: old_value.clone(),
                    new_value: new_value.clone(),
                })
                .collect();

            if strong {
                if let Some(common) = range.intersection(b_range) {
                    result.push(Attribute {
                        range: common,
                        key: key.clone(),
                        old_value: b_new_value.clone(),
                        new_value: new_value.clone(),
                    });
                }
            }

            non_empty(result)
        }
        (Attribute { .. }, _) => vec![a.kind.clone()],

        (
            Rename {
                position,
                old_name,
                new_name,
            },
            Insert { position: at, nodes },
        ) => vec![Rename {
            position: plain(&position.transformed_by_insertion(at, offset_size_of(nodes))),
            old_name: old_name.clone(),
            new_name: new_name.clone(),
        }],
        (
            Rename {
                position,
                old_name,
                new_name,
            },
            Move {
                source_position,
                how_many,
                target_position,
            },
        ) => {
            let moved_with_range = position.has_same_parent_as(source_position)
                && position.offset() >= source_position.offset()
                && position.offset() < source_position.offset() + how_many;
            let position = if moved_with_range {
                let insert_at = target_position
                    .transformed_by_deletion(source_position, *how_many)
                    .unwrap_or_else(|| target_position.clone());
                position.combined(source_position, &insert_at)
            } else {
                position.transformed_by_move(source_position, target_position, *how_many)
            };
            vec![Rename {
                position: plain(&position),
                old_name: old_name.clone(),
                new_name: new_name.clone(),
            }]
        }
        (
            Rename {
                position, new_name, ..
            },
            Rename {
                position: b_position,
                new_name: b_new_name,
                ..
            },
        ) => {
            if position != b_position {
                vec![a.kind.clone()]
            } else if strong {
                vec![Rename {
                    position: position.clone(),
                    old_name: b_new_name.clone(),
                    new_name: new_name.clone(),
                }]
            } else {
                vec![NoOp]
            }
        }
        (Rename { .. }, _) => vec![a.kind.clone()],

        (
            Marker {
                name,
                old_range,
                new_range,
                affects_data,
            },
            Insert { .. } | Move { .. },
        ) => {
            let transform_range = |range: &Option<Range>| {
                range
                    .as_ref()
                    .and_then(|r| Range::span(&r.transformed_by_operation(b)))
            };
            vec![Marker {
                name: name.clone(),
                old_range: transform_range(old_range),
                new_range: transform_range(new_range),
                affects_data: *affects_data,
            }]
        }
        (
            Marker {
                name,
                new_range,
                affects_data,
                ..
            },
            Marker {
                name: b_name,
                new_range: b_new_range,
                ..
            },
        ) => {
            if name != b_name {
                vec![a.kind.clone()]
            } else if strong {
                vec![Marker {
                    name: name.clone(),
                    old_range: b_new_range.clone(),
                    new_range: new_range.clone(),
                    affects_data: *affects_data,
                }]
            } else {
                vec![NoOp]
            }
        }
        (Marker { .. }, _) => vec![a.kind.clone()],

        (
            Root {
                root_name, is_add, ..
            },
            Root {
                root_name: b_root_name,
                is_add: b_is_add,
                ..
            },
        ) => {
            if root_name != b_root_name {
                vec![a.kind.clone()]
            } else if is_add == b_is_add || !strong {
                vec![NoOp]
            } else {
                vec![a.kind.clone()]
            }
        }
        (Root { .. }, _) => vec![a.kind.clone()],
    }
}

fn non_empty(kinds: Vec<OperationKind>) -> Vec<OperationKind> {
    if kinds.is_empty() {
        vec![OperationKind::NoOp]
    } else {
        kinds
    }
}

fn attribute_parts(
    parts: Vec<Range>,
    key: &str,
    old_value: &Option<serde_json::Value>,
    new_value: &Option<serde_json::Value>,
) -> Vec<OperationKind> {
    non_empty(
        parts
            .into_iter()
            .filter(|part| !part.is_collapsed() && part.is_flat())
            .map(|range| OperationKind::Attribute {
                range,
                key: key.to_string(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            })
            .collect(),
    )
}

fn move_by_insert(
    source: &Position,
    how_many: usize,
    target: &Position,
    at: &Position,
    inserted: usize,
) -> Vec<OperationKind> {
    // Content inserted strictly inside the moved range travels with it.
    let range = Range::from_position_and_shift(source, how_many);
    let range = range
        .transformed_by_insertion(at, inserted, false)
        .into_iter()
        .next()
        .unwrap_or(range);

    // Moved content lands before content inserted at the same place.
    let target = if target == at {
        target.clone()
    } else {
        target.transformed_by_insertion(at, inserted)
    };

    vec![OperationKind::Move {
        source_position: plain(&range.start),
        how_many: range.flat_len(),
        target_position: plain(&target),
    }]
}

/// Borrowed fields of a move
#[derive(Debug, Clone, Copy)]
struct MoveSpan<'a> {
    source: &'a Position,
    how_many: usize,
    target: &'a Position,
}

impl<'a> MoveSpan<'a> {
    fn of(kind: &'a OperationKind) -> Option<Self> {
        match kind {
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => Some(Self {
                source: source_position,
                how_many: *how_many,
                target: target_position,
            }),
            _ => None,
        }
    }

    fn range(&self) -> Range {
        Range::from_position_and_shift(self.source, self.how_many)
    }

    fn is_remove(&self) -> bool {
        self.target.root == GRAVEYARD && self.source.root != GRAVEYARD
    }

    /// Moves nothing, or puts the range right back where it is
    fn is_in_place(&self) -> bool {
        self.how_many == 0
            || (self.target.has_same_parent_as(self.source)
                && (self.target.offset() == self.source.offset()
                    || self.target.offset() == self.source.offset() + self.how_many))
    }

    /// Where the moved nodes start once they are applied
    fn insert_position(&self) -> Position {
        self.target
            .transformed_by_deletion(self.source, self.how_many)
            .unwrap_or_else(|| self.target.clone())
    }

    /// Shares nodes with `other`, or one targets the other's range
    fn conflicts_with(&self, other: &MoveSpan<'_>) -> bool {
        let range = self.range();
        let other_range = other.range();
        range.is_intersecting(&other_range)
            || range.contains_position(other.target)
            || other_range.contains_position(self.target)
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Move {
            source_position: plain(self.source),
            how_many: self.how_many,
            target_position: plain(self.target),
        }
    }

    fn reversed(&self) -> OperationKind {
        Operation::new(self.kind()).reversed().kind
    }

    /// Target once `other` was applied
    fn target_after(&self, other: &MoveSpan<'_>, strong: bool) -> Position {
        // Removing the content around a target leaves the target where that
        // content was.
        if other.is_remove()
            && self.target.has_same_parent_as(other.source)
            && other.range().contains_position(self.target)
        {
            return plain(other.source);
        }

        match self.target.transformed_by_deletion(other.source, other.how_many) {
            Some(position) if strong && position == other.insert_position() => position,
            _ => self.target.transformed_by_move(other.source, other.target, other.how_many),
        }
    }
}

fn move_by_move(a: MoveSpan<'_>, b: MoveSpan<'_>, strong: bool) -> Vec<OperationKind> {
    if (a.is_remove() && b.is_remove()) || !a.conflicts_with(&b) {
        return rebase_move(a, b, strong);
    }

    if strong {
        trace!(a = ?a.range(), b = ?b.range(), "conflicting moves, replaying the weaker one");
        let mut result = vec![b.reversed(), a.kind()];
        result.extend(
            rebase_move(b, a, false)
                .into_iter()
                .filter(|kind| !matches!(kind, OperationKind::NoOp)),
        );
        result
    } else {
        rebase_move(a, b, false)
    }
}

/// `x` expressed after `y`: the nodes of `x` that are still its to move,
/// sent to its target as `y` left it
fn rebase_move(x: MoveSpan<'_>, y: MoveSpan<'_>, strong: bool) -> Vec<OperationKind> {
    let range = x.range();
    let y_range = y.range();
    let y_insert = y.insert_position();
    let keeps_common = x.is_remove() && !y.is_remove();
    // Nodes moved into the range travel with it, unless the range is removed.
    let spread = x.is_remove() || !range.contains_position(y.target);
    let after_deletion = |position: &Position| {
        position
            .transformed_by_deletion(y.source, y.how_many)
            .unwrap_or_else(|| position.clone())
    };
    let moved_by_y = |position: &Position| position.transformed_by_move(y.source, y.target, y.how_many);

    let mut parts: Vec<Range> = Vec::new();
    if range.start.has_same_parent_as(&y_range.start) {
        match range.intersection(&y_range) {
            Some(common) => {
                let mut before = Vec::new();
                let mut after = Vec::new();
                for difference in range.difference(&y_range) {
                    let is_before = difference.start.is_before(&common.start);
                    let shifted = Range::new(after_deletion(&difference.start), after_deletion(&difference.end));
                    let transformed = shifted.transformed_by_insertion(&y_insert, y.how_many, spread);
                    if is_before {
                        before.extend(transformed);
                    } else {
                        after.extend(transformed);
                    }
                }

                parts.extend(before);
                if keeps_common {
                    parts.push(Range::new(
                        common.start.combined(y.source, &y_insert),
                        common.end.combined(y.source, &y_insert),
                    ));
                }
                parts.extend(after);
            }
            None => {
                let shifted = Range::new(after_deletion(&range.start), after_deletion(&range.end));
                parts.extend(shifted.transformed_by_insertion(&y_insert, y.how_many, spread));
            }
        }
    } else if y_range.contains_position(&range.start) {
        // The nodes sit inside elements moved by `y`.
        if y.is_remove() {
            return vec![OperationKind::NoOp];
        }
        parts.push(Range::new(moved_by_y(&range.start), moved_by_y(&range.end)));
    } else {
        let start = moved_by_y(&range.start);
        let end = moved_by_y(&range.end);
        if start.has_same_parent_as(&end) && !end.is_before(&start) {
            parts.push(Range::new(start, end));
        }
        // `y` took nodes out of removed elements: remove them where they went.
        if keeps_common && range.contains_position(y.source) && !range.contains_position(y.target) {
            parts.push(Range::from_position_and_shift(&y_insert, y.how_many));
        }
    }

    sequence_moves(parts, x.target_after(&y, strong))
}

/// Turn transformed source parts into consecutive moves that place the
/// parts next to each other, in order, at `target`
fn sequence_moves(parts: Vec<Range>, target: Position) -> Vec<OperationKind> {
    let mut result = Vec::new();
    let mut target = target;
    let mut pending: VecDeque<Range> = parts.into();

    while let Some(part) = pending.pop_front() {
        let how_many = part.flat_len();
        if how_many == 0 || !part.is_flat() {
            continue;
        }

        let source = plain(&part.start);
        let Some(moved_start) = target.transformed_by_deletion(&source, how_many) else {
            // The target lies inside the part: a cross-nesting conflict.
            continue;
        };

        for remaining in pending.iter_mut() {
            let start = remaining.start.transformed_by_move(&source, &target, how_many);
            let end = remaining.end.transformed_by_move(&source, &target, how_many);
            *remaining = Range::new(start, end);
        }

        result.push(OperationKind::Move {
            source_position: source,
            how_many,
            target_position: plain(&target),
        });
        target = moved_start.shifted_by(how_many as isize);
    }

    non_empty(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::operation::graveyard_position;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn insert(path: &[usize], text: &str) -> Operation {
        Operation::insert(pos(path), vec![Node::text(text)]).with_base_version(0)
    }

    #[test]
    fn test_insert_tie_breaks_by_strength() {
        let a = insert(&[0, 1], "a");
        let b = insert(&[0, 1], "bb");

        let strong = transform(&a, &b, &TransformContext::strong());
        let weak = transform(&a, &b, &TransformContext::weak());

        assert_eq!(strong[0].base_version, Some(1));
        assert!(matches!(&strong[0].kind, OperationKind::Insert { position, .. } if position.path == vec![0, 1]));
        assert!(matches!(&weak[0].kind, OperationKind::Insert { position, .. } if position.path == vec![0, 3]));
    }

    #[test]
    fn test_anything_by_noop_is_identity() {
        let a = insert(&[0, 1], "a");
        let result = transform(&a, &Operation::no_op(), &TransformContext::weak());
        assert_eq!(result[0].kind, a.kind);

        let noop = transform(&Operation::no_op(), &a, &TransformContext::strong());
        assert!(noop[0].is_no_op());
    }

    #[test]
    fn test_remove_by_overlapping_remove_drops_common_part() {
        // a removes [0,1]..[0,5], b removes [0,3]..[0,7].
        let a = Operation::remove(pos(&[0, 1]), 4).with_base_version(0);
        let b = Operation::remove(pos(&[0, 3]), 4).with_base_version(0);

        for context in [TransformContext::strong(), TransformContext::weak()] {
            let result = transform(&a, &b, &context);
            assert_eq!(result.len(), 1);
            let OperationKind::Move {
                source_position,
                how_many,
                ..
            } = &result[0].kind
            else {
                panic!("expected move");
            };
            assert_eq!(source_position.path, vec![0, 1]);
            assert_eq!(*how_many, 2);
        }
    }

    fn move_kind(source: &[usize], how_many: usize, target: &[usize]) -> OperationKind {
        OperationKind::Move {
            source_position: pos(source),
            how_many,
            target_position: pos(target),
        }
    }

    #[test]
    fn test_overlapping_moves_strong_side_replays_weak_side() {
        // a moves [0,0]..[0,4] to [1,0]; b moves [0,2]..[0,6] to [2,0].
        let a = Operation::move_range(pos(&[0, 0]), 4, pos(&[1, 0])).with_base_version(0);
        let b = Operation::move_range(pos(&[0, 2]), 4, pos(&[2, 0])).with_base_version(0);

        let strong = transform(&a, &b, &TransformContext::strong());
        let kinds: Vec<OperationKind> = strong.iter().map(|op| op.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                move_kind(&[2, 0], 4, &[0, 2]),
                a.kind.clone(),
                move_kind(&[0, 0], 2, &[2, 0]),
            ]
        );
        assert_eq!(strong[2].base_version, Some(3));

        // The weak side only moves what b left behind.
        let weak = transform(&a, &b, &TransformContext::weak());
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].kind, move_kind(&[0, 0], 2, &[1, 0]));

        // The other direction, transformed weak, matches the tail of the
        // strong rewrite.
        let other = transform(&b, &a, &TransformContext::weak());
        assert_eq!(other[0].kind, move_kind(&[0, 0], 2, &[2, 0]));
    }

    #[test]
    fn test_cross_nesting_moves_keep_strong_side() {
        // a moves [0]..[1] into [2,0]; b moves [2]..[3] into [0,0].
        let a = Operation::move_range(pos(&[0]), 1, pos(&[2, 0])).with_base_version(0);
        let b = Operation::move_range(pos(&[2]), 1, pos(&[0, 0])).with_base_version(0);

        let strong = transform(&a, &b, &TransformContext::strong());
        let kinds: Vec<OperationKind> = strong.iter().map(|op| op.kind.clone()).collect();
        assert_eq!(kinds, vec![move_kind(&[0, 0], 1, &[2]), a.kind.clone()]);

        assert!(transform(&b, &a, &TransformContext::weak())[0].is_no_op());
    }

    #[test]
    fn test_in_place_move_is_noop_both_ways() {
        let still = Operation::move_range(pos(&[0, 2]), 2, pos(&[0, 4])).with_base_version(0);
        let other = Operation::move_range(pos(&[0, 0]), 3, pos(&[1, 0])).with_base_version(0);

        assert!(transform(&still, &other, &TransformContext::strong())[0].is_no_op());
        assert_eq!(transform(&other, &still, &TransformContext::weak())[0].kind, other.kind);
    }

    #[test]
    fn test_remove_keeps_nodes_moved_out_of_it() {
        // a removes [0,0]..[0,4]; b moves [0,2]..[0,6] to [1,0].
        let a = Operation::remove(pos(&[0, 0]), 4).with_base_version(0);
        let b = Operation::move_range(pos(&[0, 2]), 4, pos(&[1, 0])).with_base_version(0);

        let weak = transform(&a, &b, &TransformContext::weak());
        let removed: Vec<(Vec<usize>, usize)> = weak
            .iter()
            .map(|op| match &op.kind {
                OperationKind::Move {
                    source_position,
                    how_many,
                    target_position,
                } => {
                    assert_eq!(target_position.root, GRAVEYARD);
                    (source_position.path.clone(), *how_many)
                }
                _ => panic!("expected move"),
            })
            .collect();
        let total: usize = removed.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 4);
        assert_eq!(removed[0], (vec![0, 0], 2));

        // Moving the removed nodes is lost when b comes second.
        let other = transform(&b, &a, &TransformContext::weak());
        let moved: usize = other.iter().map(Operation::how_many).sum();
        assert_eq!(moved, 2);
    }

    #[test]
    fn test_attribute_spread_over_insertion() {
        let range = Range::new(pos(&[0, 0]), pos(&[0, 4]));
        let a = Operation::attribute(range, "bold", None, Some(true.into())).with_base_version(0);
        let b = insert(&[0, 2], "xyz");

        let result = transform(&a, &b, &TransformContext::weak());
        assert_eq!(result.len(), 2);
        let ranges: Vec<(usize, usize)> = result
            .iter()
            .map(|op| match &op.kind {
                OperationKind::Attribute { range, .. } => (range.start.offset(), range.end.offset()),
                _ => panic!("expected attribute"),
            })
            .collect();
        assert_eq!(ranges, vec![(0, 2), (5, 7)]);
    }

    #[test]
    fn test_attribute_conflict_on_same_key() {
        let range = Range::new(pos(&[0, 0]), pos(&[0, 4]));
        let other = Range::new(pos(&[0, 2]), pos(&[0, 6]));
        let a = Operation::attribute(range, "bold", None, Some(true.into())).with_base_version(0);
        let b = Operation::attribute(other, "bold", None, Some(false.into())).with_base_version(0);

        let strong = transform(&a, &b, &TransformContext::strong());
        assert_eq!(strong.len(), 2);
        assert!(matches!(
            &strong[1].kind,
            OperationKind::Attribute { old_value: Some(v), .. } if *v == serde_json::Value::Bool(false)
        ));

        let weak = transform(&a, &b, &TransformContext::weak());
        assert_eq!(weak.len(), 1);
    }

    #[test]
    fn test_rename_of_removed_element_follows_it_to_graveyard() {
        let a = Operation::rename(pos(&[1]), "paragraph", "heading1").with_base_version(0);
        let b = Operation::remove(pos(&[0]), 2).with_base_version(0);
        let result = transform(&a, &b, &TransformContext::weak());
        let OperationKind::Rename { position, .. } = &result[0].kind else {
            panic!("expected rename");
        };
        assert_eq!(position.root, GRAVEYARD);
        assert_eq!(position.path, vec![1]);
        assert_eq!(graveyard_position().path, vec![0]);
    }

    #[test]
    fn test_rename_and_marker_conflicts() {
        let a = Operation::rename(pos(&[1]), "paragraph", "heading1").with_base_version(0);
        let b = Operation::rename(pos(&[1]), "paragraph", "heading2").with_base_version(0);
        assert!(transform(&a, &b, &TransformContext::weak())[0].is_no_op());
        assert!(matches!(
            &transform(&a, &b, &TransformContext::strong())[0].kind,
            OperationKind::Rename { old_name, .. } if old_name == "heading2"
        ));

        let m1 = Operation::marker("comment:1", None, Some(Range::new(pos(&[0, 0]), pos(&[0, 1]))), false);
        let m2 = Operation::marker("comment:1", None, Some(Range::new(pos(&[0, 2]), pos(&[0, 3]))), false);
        assert!(transform(&m1, &m2, &TransformContext::weak())[0].is_no_op());
    }

    #[test]
    fn test_transform_sets_handles_split_pieces() {
        let a = vec![Operation::remove(pos(&[0, 0]), 4).with_base_version(0)];
        let b = vec![
            Operation::remove(pos(&[0, 1]), 2).with_base_version(0),
            insert(&[0, 1], "X").with_base_version(1),
        ];

        let (a_prime, b_prime) = transform_sets(a, b, true);
        // a now removes the two characters b left behind; "X" survives.
        let total: usize = a_prime.iter().map(Operation::how_many).sum();
        assert_eq!(total, 2);
        assert!(b_prime[0].is_no_op());
        assert!(b_prime.iter().any(|op| op.type_name() == "insert"));
    }
}
