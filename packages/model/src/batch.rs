//! # Batches
//!
//! A batch groups the operations of one logical action (typing a word,
//! pressing enter, undoing a step). The undo manager works on batches, never
//! on single operations.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;
use crate::range::Range;

/// How a batch takes part in undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchType {
    /// Recorded by the undo manager
    pub is_undoable: bool,

    /// Created by this editor instance rather than received from elsewhere
    pub is_local: bool,

    /// Produced by undo or redo
    pub is_undo: bool,

    /// Produced by typing; consecutive typing batches form one undo step
    pub is_typing: bool,
}

impl Default for BatchType {
    fn default() -> Self {
        Self {
            is_undoable: true,
            is_local: true,
            is_undo: false,
            is_typing: false,
        }
    }
}

impl BatchType {
    pub fn not_undoable() -> Self {
        Self {
            is_undoable: false,
            ..Self::default()
        }
    }

    pub fn undo() -> Self {
        Self {
            is_undo: true,
            ..Self::default()
        }
    }

    pub fn typing() -> Self {
        Self {
            is_typing: true,
            ..Self::default()
        }
    }
}

/// Operations of one change block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: u64,

    pub batch_type: BatchType,

    /// Operations in application order
    pub operations: Vec<Operation>,

    /// Selection when the batch opened, restored on undo
    pub selection_before: Vec<Range>,

    pub selection_before_backward: bool,
}

impl Batch {
    pub fn new(id: u64, batch_type: BatchType) -> Self {
        Self {
            id,
            batch_type,
            operations: Vec::new(),
            selection_before: Vec::new(),
            selection_before_backward: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Version the first operation was applied on
    pub fn base_version(&self) -> Option<u64> {
        self.operations.iter().find_map(|op| op.base_version)
    }

    /// Versions of every operation in the batch
    pub fn versions(&self) -> Vec<u64> {
        self.operations.iter().filter_map(|op| op.base_version).collect()
    }

    pub(crate) fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_types() {
        assert!(BatchType::default().is_undoable);
        assert!(!BatchType::not_undoable().is_undoable);
        assert!(BatchType::undo().is_undo);
        assert!(BatchType::typing().is_typing && BatchType::typing().is_undoable);
    }

    #[test]
    fn test_versions() {
        let mut batch = Batch::new(1, BatchType::default());
        assert_eq!(batch.base_version(), None);
        batch.push(Operation::no_op().with_base_version(4));
        batch.push(Operation::no_op().with_base_version(5));
        assert_eq!(batch.base_version(), Some(4));
        assert_eq!(batch.versions(), vec![4, 5]);
    }
}
