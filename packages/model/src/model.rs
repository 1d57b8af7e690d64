//! # Model
//!
//! Entry point for changing a document. All changes run inside change
//! blocks:
//!
//! ```rust,ignore
//! model.change(|writer| {
//!     let paragraph = writer.insert_element("paragraph", Attributes::new(), &position)?;
//!     writer.insert_text("foo", Attributes::new(), &writer.document().position_at(paragraph, 0)?)?;
//!     Ok(())
//! })?;
//! ```
//!
//! ## Design
//!
//! - `change` opens a block with a fresh batch; nested blocks go through
//!   [`Writer::change`] and run inline in the same batch
//! - `enqueue_change` queues a block; queued blocks run in order after the
//!   current block closes, each in its own batch
//! - closing a block runs the post-fixers until none reports a change, then
//!   notifies every observer once
//! - a failing block is abandoned; operations it already applied stay
//!
//! The differ keeps accumulating until a consumer calls
//! [`Model::flush_changes`], so several blocks can be converted at once.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, warn};

use crate::batch::{Batch, BatchType};
use crate::differ::ChangeSet;
use crate::document::Document;
use crate::errors::ModelResult;
use crate::post_fixer::PostFixer;
use crate::schema::Schema;
use crate::writer::Writer;

/// A queued change block
pub type ChangeBlock = Box<dyn for<'w> FnOnce(&mut Writer<'w>) -> ModelResult<()>>;

/// Listener notified once per closed change block
pub type ChangeObserver = Box<dyn FnMut(&ChangeEvent)>;

/// Upper bound on post-fixer rounds per block
const MAX_POST_FIXER_ROUNDS: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub batch_id: u64,
    pub batch_type: BatchType,
    pub operations: usize,
    pub version: u64,
}

pub struct Model {
    pub(crate) document: Document,
    pub(crate) schema: Schema,
    pub(crate) pending: VecDeque<(BatchType, ChangeBlock)>,
    post_fixers: Vec<Box<dyn PostFixer>>,
    observers: Vec<ChangeObserver>,
    closed_batches: Vec<Batch>,
    next_batch_id: u64,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("document", &self.document)
            .field("post_fixers", &self.post_fixers)
            .field("pending", &self.pending.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self::with_schema(Schema::new())
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            document: Document::new(),
            schema,
            pending: VecDeque::new(),
            post_fixers: Vec::new(),
            observers: Vec::new(),
            closed_batches: Vec::new(),
            next_batch_id: 1,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct document access, for building fixtures outside change blocks
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub fn register_post_fixer(&mut self, fixer: Box<dyn PostFixer>) {
        self.post_fixers.push(fixer);
    }

    pub fn on_change(&mut self, observer: ChangeObserver) {
        self.observers.push(observer);
    }

    pub fn change<R>(&mut self, block: impl FnOnce(&mut Writer<'_>) -> ModelResult<R>) -> ModelResult<R> {
        self.change_with(BatchType::default(), block)
    }

    pub fn change_with<R>(
        &mut self,
        batch_type: BatchType,
        block: impl FnOnce(&mut Writer<'_>) -> ModelResult<R>,
    ) -> ModelResult<R> {
        match self.run_block(batch_type, block) {
            Ok(value) => {
                self.drain_pending()?;
                Ok(value)
            }
            Err(err) => {
                self.pending.clear();
                Err(err)
            }
        }
    }

    /// Queue a block. With no block open it runs right away.
    pub fn enqueue_change(
        &mut self,
        batch_type: BatchType,
        block: impl for<'w> FnOnce(&mut Writer<'w>) -> ModelResult<()> + 'static,
    ) -> ModelResult<()> {
        self.pending.push_back((batch_type, Box::new(block)));
        self.drain_pending()
    }

    fn drain_pending(&mut self) -> ModelResult<()> {
        while let Some((batch_type, block)) = self.pending.pop_front() {
            if let Err(err) = self.run_block(batch_type, block) {
                self.pending.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    fn run_block<R>(
        &mut self,
        batch_type: BatchType,
        block: impl FnOnce(&mut Writer<'_>) -> ModelResult<R>,
    ) -> ModelResult<R> {
        let mut batch = Batch::new(self.next_batch_id, batch_type);
        self.next_batch_id += 1;
        batch.selection_before = self.document.selection().ranges().to_vec();
        batch.selection_before_backward = self.document.selection().is_backward();

        let post_fixers = std::mem::take(&mut self.post_fixers);
        let (result, batch) = {
            let mut writer = Writer::new(self, batch);
            let result = block(&mut writer).and_then(|value| {
                run_post_fixers(&mut writer, &post_fixers)?;
                Ok(value)
            });
            (result, writer.into_batch())
        };
        let added = std::mem::replace(&mut self.post_fixers, post_fixers);
        self.post_fixers.extend(added);

        self.close_batch(batch);
        result
    }

    fn close_batch(&mut self, batch: Batch) {
        debug!(
            batch = batch.id,
            operations = batch.operations.len(),
            version = self.document.version(),
            "change block closed"
        );

        let event = ChangeEvent {
            batch_id: batch.id,
            batch_type: batch.batch_type,
            operations: batch.operations.len(),
            version: self.document.version(),
        };
        for observer in &mut self.observers {
            observer(&event);
        }

        if !batch.is_empty() {
            self.closed_batches.push(batch);
        }
    }

    /// Batches closed since the last call, oldest first
    pub fn take_closed_batches(&mut self) -> Vec<Batch> {
        std::mem::take(&mut self.closed_batches)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take everything the differ buffered
    pub fn flush_changes(&mut self) -> ChangeSet {
        self.document.flush_changes()
    }
}

fn run_post_fixers(writer: &mut Writer<'_>, fixers: &[Box<dyn PostFixer>]) -> ModelResult<()> {
    for _ in 0..MAX_POST_FIXER_ROUNDS {
        let mut changed = false;
        for fixer in fixers {
            if fixer.fix(writer)? {
                debug!(fixer = fixer.name(), "post-fixer changed the document");
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
    }
    warn!(rounds = MAX_POST_FIXER_ROUNDS, "post-fixers did not settle");
    Ok(())
}
