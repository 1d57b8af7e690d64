//! # Undo Manager
//!
//! Undo and redo steps built from model batches.
//!
//! ## Design
//!
//! - Every closed undoable, local batch becomes an undo step; consecutive
//!   typing batches share one step
//! - Undo reverses the step's operations, last first. Each reversed operation
//!   is transformed (as the stronger side) against everything applied since
//!   the original, minus operation groups that already cancelled out, and
//!   the pair is recorded in the history so later steps can skip it
//! - Groups that cancelled out still moved nodes around the graveyard; the
//!   reversed operation follows those shifts instead
//! - The undo batch becomes a redo step; redo undoes it the same way
//! - New steps clear the redo stack; the undo stack keeps `max_levels` steps
//! - Transformed operations that collapse to `NoOp` are skipped
//!
//! ```rust,ignore
//! let mut undo = UndoManager::new();
//! model.change(|writer| writer.insert_text("a", Attributes::new(), &position).map(|_| ()))?;
//! for batch in model.take_closed_batches() {
//!     undo.record(batch);
//! }
//! undo.undo(&mut model)?;
//! ```

use folio_model::{
    transform_sets, Batch, BatchType, Model, ModelResult, Operation, TransformStep, Writer, GRAVEYARD,
};
use tracing::{debug, trace};

use crate::errors::EngineResult;

/// Batches undone or redone together
#[derive(Debug, Clone)]
pub struct UndoStep {
    pub batches: Vec<Batch>,
}

impl UndoStep {
    fn is_typing(&self) -> bool {
        self.batches.iter().all(|batch| batch.batch_type.is_typing)
    }

    /// First version after the step's operations
    fn end_version(&self) -> Option<u64> {
        self.batches
            .iter()
            .flat_map(|batch| batch.versions())
            .max()
            .map(|version| version + 1)
    }
}

#[derive(Debug)]
pub struct UndoManager {
    /// Most recent last
    undo_stack: Vec<UndoStep>,

    /// Most recent last
    redo_stack: Vec<UndoStep>,

    /// 0 = unlimited
    max_levels: usize,

    /// The last recorded batch was typing and may be extended
    extend_typing: bool,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoManager {
    /// Undo manager keeping 100 steps
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            extend_typing: false,
        }
    }

    /// Record a closed batch. Batches that are not undoable, not local or
    /// produced by undo itself are ignored.
    pub fn record(&mut self, batch: Batch) {
        let batch_type = batch.batch_type;
        if !batch_type.is_undoable || !batch_type.is_local || batch_type.is_undo || batch.is_empty() {
            return;
        }

        if batch_type.is_typing && self.extend_typing {
            if let Some(step) = self.undo_stack.last_mut().filter(|step| step.is_typing()) {
                trace!(batch = batch.id, "typing batch joins the last undo step");
                step.batches.push(batch);
                self.redo_stack.clear();
                return;
            }
        }

        self.extend_typing = batch_type.is_typing;
        self.push_step(UndoStep { batches: vec![batch] });
        self.redo_stack.clear();
    }

    fn push_step(&mut self, step: UndoStep) {
        self.undo_stack.push(step);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the most recent step
    pub fn undo(&mut self, model: &mut Model) -> EngineResult<bool> {
        let Some(step) = self.undo_stack.pop() else {
            return Ok(false);
        };
        self.extend_typing = false;
        let batches = self.revert(model, &step)?;
        debug!(batches = step.batches.len(), "undo");
        self.redo_stack.push(UndoStep { batches });
        Ok(true)
    }

    /// Redo the most recently undone step
    pub fn redo(&mut self, model: &mut Model) -> EngineResult<bool> {
        let Some(step) = self.redo_stack.pop() else {
            return Ok(false);
        };
        self.extend_typing = false;
        let batches = self.revert(model, &step)?;
        debug!(batches = step.batches.len(), "redo");
        self.push_step(UndoStep { batches });
        Ok(true)
    }

    /// Apply the reverse of a step in one undo batch. Returns the undo
    /// batches; other batches closed on the way are recorded as usual.
    fn revert(&mut self, model: &mut Model, step: &UndoStep) -> EngineResult<Vec<Batch>> {
        let later = step
            .end_version()
            .map(|version| model.document().history().operations_for_transform(version))
            .unwrap_or_default();

        model.change_with(BatchType::undo(), |writer| {
            for batch in step.batches.iter().rev() {
                for operation in batch.operations.iter().rev() {
                    revert_operation(writer, operation)?;
                }
            }
            if let Some(first) = step.batches.first() {
                restore_selection(writer, first, &later);
            }
            Ok(())
        })?;

        let mut reverting = Vec::new();
        for batch in model.take_closed_batches() {
            if batch.batch_type.is_undo {
                reverting.push(batch);
            } else {
                self.record(batch);
            }
        }
        Ok(reverting)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.extend_typing = false;
    }
}

fn revert_operation(writer: &mut Writer<'_>, operation: &Operation) -> ModelResult<()> {
    let Some(version) = operation.base_version else {
        return Ok(());
    };

    let mut reversed = vec![operation.reversed()];
    for step in writer.document().history().steps_for_transform(version + 1) {
        reversed = match step {
            TransformStep::Operation(applied) => transform_sets(reversed, vec![applied], true).0,
            TransformStep::Graveyard(shift) => reversed
                .iter()
                .map(|piece| piece.map_positions(|position| shift.apply(position)))
                .collect(),
        };
    }

    let mut applied = Vec::new();
    for reverting in reversed {
        if reverting.is_no_op() {
            continue;
        }
        applied.push(writer.document().version());
        writer.apply_operation(reverting)?;
    }
    trace!(version, pieces = applied.len(), "operation reverted");
    writer.mark_reverted([version], applied);
    Ok(())
}

/// Put back the selection a batch started with, moved by what happened
/// after the step
fn restore_selection(writer: &mut Writer<'_>, batch: &Batch, later: &[Operation]) {
    let document = writer.document();
    let mut ranges = Vec::new();
    for range in &batch.selection_before {
        let mut current = vec![range.clone()];
        for operation in later {
            current = current
                .iter()
                .flat_map(|range| range.transformed_by_operation(operation))
                .collect();
        }
        let valid = current.into_iter().find(|range| {
            range.root() != GRAVEYARD
                && [&range.start, &range.end].into_iter().all(|position| {
                    document
                        .parent_of(position)
                        .is_ok_and(|parent| position.offset() <= document.tree().max_offset(parent))
                })
        });
        ranges.extend(valid);
    }
    if !ranges.is_empty() {
        writer.set_selection(ranges, batch.selection_before_backward);
    }
}
