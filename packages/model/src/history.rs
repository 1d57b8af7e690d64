//! Operation history.
//!
//! Every applied operation is kept with its base version, so the operation
//! applied on version `v` sits at index `v`. Undo records which operations
//! reverted which; pairs that cancel out are skipped when later undo steps
//! transform against the history. A skipped pair still leaves its nodes in
//! the graveyard, so it is replaced by the graveyard shifts it caused.

use std::collections::BTreeSet;

use crate::document::GRAVEYARD;
use crate::operation::{Operation, OperationKind};
use crate::position::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RevertPair {
    original: BTreeSet<u64>,
    reverting: BTreeSet<u64>,
}

/// Offsets added to or taken from the graveyard by an operation
#[derive(Debug, Clone, PartialEq)]
pub enum GraveyardShift {
    Inserted { at: Position, how_many: usize },
    Removed { at: Position, how_many: usize },
}

impl GraveyardShift {
    /// Shifts caused by an operation, in the order they happened
    pub fn of(operation: &Operation) -> Vec<GraveyardShift> {
        match &operation.kind {
            OperationKind::Insert { position, .. } if position.root == GRAVEYARD => vec![GraveyardShift::Inserted {
                at: position.clone(),
                how_many: operation.how_many(),
            }],
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => {
                let mut shifts = Vec::new();
                if source_position.root == GRAVEYARD {
                    shifts.push(GraveyardShift::Removed {
                        at: source_position.clone(),
                        how_many: *how_many,
                    });
                }
                if target_position.root == GRAVEYARD {
                    let at = target_position
                        .transformed_by_deletion(source_position, *how_many)
                        .unwrap_or_else(|| target_position.clone());
                    shifts.push(GraveyardShift::Inserted { at, how_many: *how_many });
                }
                shifts
            }
            _ => Vec::new(),
        }
    }

    pub fn apply(&self, position: &Position) -> Position {
        match self {
            GraveyardShift::Inserted { at, how_many } => position.transformed_by_insertion(at, *how_many),
            GraveyardShift::Removed { at, how_many } => position
                .transformed_by_deletion(at, *how_many)
                .unwrap_or_else(|| at.clone().with_stickiness(position.stickiness)),
        }
    }
}

/// What an undo step is transformed against, in history order
#[derive(Debug, Clone, PartialEq)]
pub enum TransformStep {
    Operation(Operation),
    Graveyard(GraveyardShift),
}

#[derive(Debug, Clone, Default)]
pub struct History {
    operations: Vec<Operation>,
    reverted: Vec<RevertPair>,
}

impl History {
    pub(crate) fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operation(&self, version: u64) -> Option<&Operation> {
        self.operations.get(version as usize)
    }

    /// Operations applied on versions `from..to`
    pub fn operations(&self, from: u64, to: u64) -> &[Operation] {
        let end = (to as usize).min(self.operations.len());
        let start = (from as usize).min(end);
        &self.operations[start..end]
    }

    pub fn operations_since(&self, from: u64) -> &[Operation] {
        self.operations(from, self.operations.len() as u64)
    }

    /// Record that the operations applied on `reverting` versions undid the
    /// ones applied on `original` versions
    pub fn mark_reverted(&mut self, original: impl IntoIterator<Item = u64>, reverting: impl IntoIterator<Item = u64>) {
        let pair = RevertPair {
            original: original.into_iter().collect(),
            reverting: reverting.into_iter().collect(),
        };
        if !pair.original.is_empty() {
            self.reverted.push(pair);
        }
    }

    pub fn is_undone(&self, version: u64) -> bool {
        self.reverted.iter().any(|pair| pair.original.contains(&version))
    }

    pub fn is_undoing(&self, version: u64) -> bool {
        self.reverted.iter().any(|pair| pair.reverting.contains(&version))
    }

    /// Operations since `from` to transform an undo step against. A pair of
    /// an operation group and the group reverting it, both after `from`,
    /// cancels out and is left out. Pairs are taken in the order they were
    /// recorded; a group already left out cannot cancel another one.
    pub fn operations_for_transform(&self, from: u64) -> Vec<Operation> {
        self.steps_for_transform(from)
            .into_iter()
            .filter_map(|step| match step {
                TransformStep::Operation(operation) => Some(operation),
                TransformStep::Graveyard(_) => None,
            })
            .collect()
    }

    /// Like [`History::operations_for_transform`], with every left out
    /// operation replaced by its graveyard shifts
    pub fn steps_for_transform(&self, from: u64) -> Vec<TransformStep> {
        let skipped = self.cancelled_since(from);

        self.operations_since(from)
            .iter()
            .flat_map(|operation| {
                let cancelled = operation
                    .base_version
                    .is_some_and(|version| skipped.contains(&version));
                if cancelled {
                    GraveyardShift::of(operation)
                        .into_iter()
                        .map(TransformStep::Graveyard)
                        .collect()
                } else {
                    vec![TransformStep::Operation(operation.clone())]
                }
            })
            .collect()
    }

    fn cancelled_since(&self, from: u64) -> BTreeSet<u64> {
        let mut skipped: BTreeSet<u64> = BTreeSet::new();

        for pair in &self.reverted {
            // Nothing was applied to undo the group: its effects stay.
            if pair.reverting.is_empty() {
                continue;
            }
            let after_from = pair.original.first().is_some_and(|&first| first >= from);
            let untouched = pair.original.is_disjoint(&skipped) && pair.reverting.is_disjoint(&skipped);
            if after_from && untouched {
                skipped.extend(pair.original.iter().copied());
                skipped.extend(pair.reverting.iter().copied());
            }
        }

        skipped
    }
}
