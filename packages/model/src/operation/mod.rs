//! # Operations
//!
//! Every change to a document is an operation. Operations are plain,
//! serializable values: they address content by positions, never by node
//! handles, which is what makes them reversible and transformable.
//!
//! ## Kinds
//!
//! - `Insert` places owned nodes at a position
//! - `Move` relocates a flat range. Remove is a move into the graveyard root,
//!   reinsert a move out of it
//! - `Attribute` changes one key on every node of a flat range
//! - `Rename` changes an element's name
//! - `Marker` creates, changes or removes a named range
//! - `Root` attaches or detaches a root
//! - `NoOp` does nothing; transformation produces it for conflicts that
//!   cancel an operation out
//!
//! `base_version` is the document version the operation expects to be
//! applied on. The document refuses operations with a different version.

mod transform;

pub use transform::{transform, transform_sets, TransformContext};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::GRAVEYARD;
use crate::node::{offset_size_of, Node};
use crate::position::Position;
use crate::range::Range;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub base_version: Option<u64>,
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OperationKind {
    Insert {
        position: Position,
        nodes: Vec<Node>,
    },
    /// `target_position` is expressed in the document state before the move
    Move {
        source_position: Position,
        how_many: usize,
        target_position: Position,
    },
    Attribute {
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    Rename {
        position: Position,
        old_name: String,
        new_name: String,
    },
    Marker {
        name: String,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    },
    Root {
        root_name: String,
        element_name: String,
        is_add: bool,
    },
    NoOp,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            base_version: None,
            kind,
        }
    }

    pub fn with_base_version(mut self, version: u64) -> Self {
        self.base_version = Some(version);
        self
    }

    pub fn insert(position: Position, nodes: Vec<Node>) -> Self {
        Self::new(OperationKind::Insert { position, nodes })
    }

    pub fn move_range(source_position: Position, how_many: usize, target_position: Position) -> Self {
        Self::new(OperationKind::Move {
            source_position,
            how_many,
            target_position,
        })
    }

    /// Move into the graveyard
    pub fn remove(source_position: Position, how_many: usize) -> Self {
        Self::move_range(source_position, how_many, graveyard_position())
    }

    pub fn attribute(range: Range, key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self::new(OperationKind::Attribute {
            range,
            key: key.into(),
            old_value,
            new_value,
        })
    }

    pub fn rename(position: Position, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self::new(OperationKind::Rename {
            position,
            old_name: old_name.into(),
            new_name: new_name.into(),
        })
    }

    pub fn marker(name: impl Into<String>, old_range: Option<Range>, new_range: Option<Range>, affects_data: bool) -> Self {
        Self::new(OperationKind::Marker {
            name: name.into(),
            old_range,
            new_range,
            affects_data,
        })
    }

    pub fn no_op() -> Self {
        Self::new(OperationKind::NoOp)
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, OperationKind::NoOp)
    }

    /// Human readable kind; moves report `remove` and `reinsert` when they
    /// touch the graveyard
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            OperationKind::Insert { .. } => "insert",
            OperationKind::Move {
                source_position,
                target_position,
                ..
            } => {
                if target_position.root == GRAVEYARD {
                    "remove"
                } else if source_position.root == GRAVEYARD {
                    "reinsert"
                } else {
                    "move"
                }
            }
            OperationKind::Attribute { .. } => "attribute",
            OperationKind::Rename { .. } => "rename",
            OperationKind::Marker { .. } => "marker",
            OperationKind::Root { .. } => "root",
            OperationKind::NoOp => "noop",
        }
    }

    /// Offsets inserted or moved by the operation
    pub fn how_many(&self) -> usize {
        match &self.kind {
            OperationKind::Insert { nodes, .. } => offset_size_of(nodes),
            OperationKind::Move { how_many, .. } => *how_many,
            _ => 0,
        }
    }

    /// Operation undoing this one, expected right after it was applied
    pub fn reversed(&self) -> Operation {
        let kind = match &self.kind {
            OperationKind::Insert { position, nodes } => OperationKind::Move {
                source_position: position.clone(),
                how_many: offset_size_of(nodes),
                target_position: graveyard_position(),
            },
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => {
                let moved_start = target_position
                    .transformed_by_deletion(source_position, *how_many)
                    .unwrap_or_else(|| target_position.clone());
                OperationKind::Move {
                    source_position: moved_start.clone(),
                    how_many: *how_many,
                    target_position: source_position.transformed_by_insertion(&moved_start, *how_many),
                }
            }
            OperationKind::Attribute {
                range,
                key,
                old_value,
                new_value,
            } => OperationKind::Attribute {
                range: range.clone(),
                key: key.clone(),
                old_value: new_value.clone(),
                new_value: old_value.clone(),
            },
            OperationKind::Rename {
                position,
                old_name,
                new_name,
            } => OperationKind::Rename {
                position: position.clone(),
                old_name: new_name.clone(),
                new_name: old_name.clone(),
            },
            OperationKind::Marker {
                name,
                old_range,
                new_range,
                affects_data,
            } => OperationKind::Marker {
                name: name.clone(),
                old_range: new_range.clone(),
                new_range: old_range.clone(),
                affects_data: *affects_data,
            },
            OperationKind::Root {
                root_name,
                element_name,
                is_add,
            } => OperationKind::Root {
                root_name: root_name.clone(),
                element_name: element_name.clone(),
                is_add: !is_add,
            },
            OperationKind::NoOp => OperationKind::NoOp,
        };

        Operation {
            base_version: self.base_version.map(|v| v + 1),
            kind,
        }
    }

    /// The same operation with every position passed through `map`
    pub fn map_positions(&self, map: impl Fn(&Position) -> Position) -> Operation {
        let map_range = |range: &Range| Range {
            start: map(&range.start),
            end: map(&range.end),
        };
        let kind = match &self.kind {
            OperationKind::Insert { position, nodes } => OperationKind::Insert {
                position: map(position),
                nodes: nodes.clone(),
            },
            OperationKind::Move {
                source_position,
                how_many,
                target_position,
            } => OperationKind::Move {
                source_position: map(source_position),
                how_many: *how_many,
                target_position: map(target_position),
            },
            OperationKind::Attribute {
                range,
                key,
                old_value,
                new_value,
            } => OperationKind::Attribute {
                range: map_range(range),
                key: key.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            },
            OperationKind::Rename {
                position,
                old_name,
                new_name,
            } => OperationKind::Rename {
                position: map(position),
                old_name: old_name.clone(),
                new_name: new_name.clone(),
            },
            OperationKind::Marker {
                name,
                old_range,
                new_range,
                affects_data,
            } => OperationKind::Marker {
                name: name.clone(),
                old_range: old_range.as_ref().map(map_range),
                new_range: new_range.as_ref().map(map_range),
                affects_data: *affects_data,
            },
            OperationKind::Root { .. } | OperationKind::NoOp => self.kind.clone(),
        };

        Operation {
            base_version: self.base_version,
            kind,
        }
    }
}

/// Start of the graveyard root, where removed content is parked
pub fn graveyard_position() -> Position {
    Position::new(GRAVEYARD, vec![0])
}
