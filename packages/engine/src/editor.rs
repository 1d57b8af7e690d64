//! # Editor
//!
//! Ties the model, conversion, controllers, commands and undo together.
//!
//! Every outermost change goes through the same steps once it closes:
//!
//! 1. closed batches are handed to the undo manager
//! 2. the differ's changes are converted into the editing view, which
//!    renders once
//! 3. every command refreshes its state

use std::collections::BTreeSet;

use folio_model::content::DEFAULT_PARAGRAPH;
use folio_model::{
    AutoParagraphEmptyRoots, BatchType, Model, ModelResult, RemoveDisallowedAttributes, SelectionFixer, Value,
    Writer, DEFAULT_ROOT_ELEMENT,
};
use folio_view::ViewRange;
use tracing::{debug, info, instrument};

use crate::commands::{CommandCollection, CommandContext};
use crate::config::EditorConfig;
use crate::controller::{DataController, EditingController};
use crate::conversion::Conversion;
use crate::errors::{EngineError, EngineResult};
use crate::plugins::{core_plugins, Plugin};
use crate::undo::UndoManager;

/// Command lock used by read-only mode
pub const READ_ONLY_LOCK: &str = "readOnlyMode";

#[derive(Debug)]
pub struct Editor {
    pub model: Model,

    /// Converter registries; plugins add to them during init
    pub conversion: Conversion,

    pub editing: EditingController,
    pub data: DataController,
    pub commands: CommandCollection,
    pub undo: UndoManager,
    pub config: EditorConfig,

    /// Names of initialized plugins, in order
    plugins: Vec<&'static str>,

    /// Read-only mode lock ids
    read_only_locks: BTreeSet<String>,
}

impl Editor {
    /// Editor with the core plugins
    pub fn new(config: EditorConfig) -> EngineResult<Self> {
        let plugins = core_plugins(config.unknown_content);
        Self::with_plugins(config, plugins)
    }

    #[instrument(level = "debug", skip_all, fields(roots = ?config.roots))]
    pub fn with_plugins(config: EditorConfig, plugins: Vec<Box<dyn Plugin>>) -> EngineResult<Self> {
        let mut editor = Self {
            model: Model::new(),
            conversion: Conversion::new(),
            editing: EditingController::new(config.block_filler),
            data: DataController::default(),
            commands: CommandCollection::new(),
            undo: UndoManager::with_max_levels(config.undo_steps),
            config,
            plugins: Vec::new(),
            read_only_locks: BTreeSet::new(),
        };

        for plugin in &plugins {
            plugin.init(&mut editor)?;
            debug!(plugin = plugin.name(), "plugin initialized");
            editor.plugins.push(plugin.name());
        }
        editor
            .conversion
            .upcast
            .handle_unknown_content(editor.config.unknown_content);

        if editor.config.auto_paragraph {
            editor
                .model
                .register_post_fixer(Box::new(AutoParagraphEmptyRoots::new(DEFAULT_PARAGRAPH)));
        }
        editor.model.register_post_fixer(Box::new(RemoveDisallowedAttributes));
        editor.model.register_post_fixer(Box::new(SelectionFixer));

        let roots = editor.config.roots.clone();
        for root in &roots {
            editor.model.document_mut().create_root(root, DEFAULT_ROOT_ELEMENT)?;
            editor.editing.attach_root(&editor.model, root)?;
        }
        for root in &roots {
            let data = editor.config.initial_data.get(root).cloned().unwrap_or_default();
            editor.set_data(root, &data)?;
        }

        info!(roots = roots.len(), plugins = editor.plugins.len(), "editor ready");
        Ok(editor)
    }

    pub fn plugin_names(&self) -> &[&'static str] {
        &self.plugins
    }

    pub fn root_names(&self) -> Vec<String> {
        self.model.document().root_names()
    }

    /// Run a model change block, then update the view and command states.
    /// A failing block still has its applied operations converted.
    pub fn change<R>(&mut self, block: impl FnOnce(&mut Writer<'_>) -> ModelResult<R>) -> EngineResult<R> {
        let result = self.model.change(block);
        self.after_change()?;
        Ok(result?)
    }

    /// Execute a command. Returns `false` when the command is disabled.
    pub fn execute(&mut self, name: &str, args: &Value) -> EngineResult<bool> {
        let mut context = CommandContext {
            model: &mut self.model,
            undo: &mut self.undo,
        };
        let result = self.commands.execute(name, &mut context, args);
        self.after_change()?;
        result
    }

    fn after_change(&mut self) -> EngineResult<()> {
        for batch in self.model.take_closed_batches() {
            self.undo.record(batch);
        }
        let changes = self.model.flush_changes();
        self.editing
            .convert(&self.model, &changes, &self.conversion.editing_downcast)?;
        self.commands.refresh_all(&self.model, &self.undo);
        Ok(())
    }

    /// Replace a root's content with parsed data. Not undoable; clears the
    /// undo and redo stacks.
    #[instrument(level = "debug", skip(self, data))]
    pub fn set_data(&mut self, root: &str, data: &str) -> EngineResult<()> {
        let context = self
            .model
            .document()
            .root_info(root)
            .map(|info| info.element_name.clone())
            .ok_or_else(|| EngineError::UnknownRoot(root.to_string()))?;
        let nodes = self
            .data
            .to_model(&self.model, data, &context, &self.conversion.upcast)?;

        let result = self.model.change_with(BatchType::not_undoable(), |writer| {
            let content = writer.document().range_in_root(root)?;
            if !content.is_collapsed() {
                writer.remove(&content)?;
            }
            if !nodes.is_empty() {
                let start = writer.document().range_in_root(root)?.start;
                writer.insert(nodes, &start)?;
            }
            Ok(())
        });
        self.undo.clear();
        self.after_change()?;
        Ok(result?)
    }

    pub fn get_data(&self, root: &str) -> EngineResult<String> {
        self.data.get(&self.model, root, &self.conversion.data_downcast)
    }

    /// Editing DOM of a root
    pub fn dom_html(&self, root: &str) -> Option<String> {
        self.editing.dom_html(root)
    }

    /// Select what the user selected in the editing view
    pub fn set_view_selection(&mut self, ranges: &[ViewRange], backward: bool) -> EngineResult<()> {
        let ranges = self.editing.to_model_ranges(&self.model, ranges)?;
        self.change(|writer| {
            writer.set_selection(ranges, backward);
            Ok(())
        })
    }

    pub fn add_root(&mut self, name: &str) -> EngineResult<()> {
        self.change(|writer| writer.add_root(name, DEFAULT_ROOT_ELEMENT).map(|_| ()))
    }

    pub fn detach_root(&mut self, name: &str) -> EngineResult<()> {
        self.change(|writer| writer.detach_root(name))
    }

    /// Lock the editor. Data commands stay disabled until every lock is
    /// released.
    pub fn enable_read_only_mode(&mut self, lock_id: &str) {
        let was_read_only = self.is_read_only();
        self.read_only_locks.insert(lock_id.to_string());
        if !was_read_only {
            self.commands.lock_data_commands(READ_ONLY_LOCK);
            self.editing.view.set_read_only(true);
        }
    }

    pub fn disable_read_only_mode(&mut self, lock_id: &str) {
        if !self.read_only_locks.remove(lock_id) || self.is_read_only() {
            return;
        }
        self.commands.unlock_data_commands(READ_ONLY_LOCK);
        self.editing.view.set_read_only(false);
    }

    pub fn is_read_only(&self) -> bool {
        !self.read_only_locks.is_empty()
    }
}
