//! # Folio Model
//!
//! The document model of the Folio editing engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: change blocks, post-fixers, observers│
//! │  - writer turns calls into operations       │
//! │  - batches group one logical action         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ document: versioned tree of named roots     │
//! │  - applies operations, keeps history        │
//! │  - moves markers and selection along        │
//! │  - differ reports what changed              │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ consumers (conversion, undo) read the diff  │
//! │ and transform operations against history    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Operations are the only mutation**: everything a writer does is
//!    recorded, reversible and transformable
//! 2. **Positions are paths**: a root name plus offsets, valid while the
//!    tree they point into does not change under them
//! 3. **Text is offsets**: each character counts as one offset; sibling text
//!    nodes with equal attributes are always merged
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_model::{Attributes, Model, Position};
//!
//! let mut model = Model::new();
//! model.document_mut().create_root("main", "$root")?;
//! model.change(|writer| {
//!     let paragraph = writer.insert_element("paragraph", Attributes::new(), &Position::new("main", vec![0]))?;
//!     let start = writer.document().position_at(paragraph, 0)?;
//!     writer.insert_text("Hello", Attributes::new(), &start)?;
//!     Ok(())
//! })?;
//! ```

mod batch;
mod differ;
mod document;
mod errors;
mod history;
mod markers;
mod model;
mod node;
mod operation;
mod position;
mod post_fixer;
mod range;
mod schema;
mod selection;
mod tree;
mod walker;
mod writer;

pub mod content;
pub mod dev_utils;

pub use batch::{Batch, BatchType};
pub use differ::{ChangeSet, DiffEntry, Differ, MarkerChange, RootChange};
pub use document::{Document, RootInfo, DEFAULT_ROOT_ELEMENT, GRAVEYARD};
pub use errors::{ModelError, ModelResult};
pub use history::{GraveyardShift, History, TransformStep};
pub use markers::{Marker, MarkerCollection};
pub use model::{ChangeBlock, ChangeEvent, ChangeObserver, Model};
pub use node::{normalize_nodes, offset_size_of, Attributes, ElementNode, Node, TextNode, TEXT_NAME};
pub use operation::{graveyard_position, transform, transform_sets, Operation, OperationKind, TransformContext};
pub use position::{Position, PositionRelation, Stickiness};
pub use post_fixer::{AutoParagraphEmptyRoots, PostFixer, RemoveDisallowedAttributes, SelectionFixer};
pub use range::Range;
pub use schema::{Schema, SchemaItemDefinition};
pub use selection::DocumentSelection;
pub use tree::{NodeId, Tree};
pub use walker::{Item, TextProxy, TreeWalker, WalkerOptions, WalkerValue, WalkerValueType};
pub use writer::{SplitResult, Writer};

// Attribute values are plain JSON.
pub use serde_json::Value;
