//! # Commands
//!
//! Named, stateful editing actions. A command knows whether it can run
//! right now (`is_enabled`) and what it would show in a toolbar (`value`,
//! e.g. whether the selection is bold). The editor refreshes every command
//! after each change.
//!
//! ```rust,ignore
//! editor.execute("insertText", &json!({ "text": "foo" }))?;
//! editor.execute("heading", &json!({ "value": "heading1" }))?;
//! ```
//!
//! Disabled commands do nothing when executed. Commands can be disabled
//! from outside with locks (`force_disabled`); read-only mode locks every
//! command that changes data.

mod attribute;
mod block;
mod history;
mod typing;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use folio_model::{Model, Value};
use tracing::{debug, trace};

use crate::errors::{CommandError, EngineResult};
use crate::undo::UndoManager;

pub use attribute::AttributeCommand;
pub use block::{
    AlignmentCommand, HeadingCommand, HorizontalLineCommand, ParagraphCommand, ALIGNMENT, DEFAULT_ALIGNMENT, HORIZONTAL_LINE,
};
pub use history::{RedoCommand, UndoCommand};
pub use typing::{DeleteCommand, DeleteDirection, EnterCommand, InsertTextCommand};

/// What a command may touch while executing
pub struct CommandContext<'a> {
    pub model: &'a mut Model,
    pub undo: &'a mut UndoManager,
}

/// State shared by every command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandState {
    /// Result of the last refresh
    pub is_enabled: bool,
    pub value: Option<Value>,
    locks: BTreeSet<String>,
}

impl Default for CommandState {
    fn default() -> Self {
        Self {
            is_enabled: true,
            value: None,
            locks: BTreeSet::new(),
        }
    }
}

impl CommandState {
    /// Enabled by the last refresh and not locked
    pub fn is_enabled(&self) -> bool {
        self.is_enabled && self.locks.is_empty()
    }

    pub fn force_disabled(&mut self, lock: &str) {
        self.locks.insert(lock.to_string());
    }

    pub fn clear_force_disabled(&mut self, lock: &str) {
        self.locks.remove(lock);
    }
}

pub trait Command: fmt::Debug {
    fn state(&self) -> &CommandState;

    fn state_mut(&mut self) -> &mut CommandState;

    /// Recompute `is_enabled` and `value` for the current document
    fn refresh(&mut self, model: &Model, undo: &UndoManager);

    fn execute(&mut self, context: &mut CommandContext<'_>, args: &Value) -> EngineResult<()>;

    /// Whether executing changes the document; such commands are disabled
    /// in read-only mode
    fn affects_data(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    fn value(&self) -> Option<&Value> {
        self.state().value.as_ref()
    }
}

/// Commands of one editor by name
#[derive(Debug, Default)]
pub struct CommandCollection {
    commands: BTreeMap<String, Box<dyn Command>>,
}

impl CommandCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, command: Box<dyn Command>) -> Result<(), CommandError> {
        if self.commands.contains_key(name) {
            return Err(CommandError::Duplicate(name.to_string()));
        }
        self.commands.insert(name.to_string(), command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|command| command.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Command>> {
        self.commands.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Run a command if it is enabled. Returns whether it ran.
    pub fn execute(&mut self, name: &str, context: &mut CommandContext<'_>, args: &Value) -> EngineResult<bool> {
        let command = self
            .commands
            .get_mut(name)
            .ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        if !command.is_enabled() {
            debug!(command = name, "disabled command not executed");
            return Ok(false);
        }
        trace!(command = name, %args, "execute");
        command.execute(context, args)?;
        Ok(true)
    }

    pub fn refresh_all(&mut self, model: &Model, undo: &UndoManager) {
        for command in self.commands.values_mut() {
            command.refresh(model, undo);
        }
    }

    /// Lock every command that changes data
    pub fn lock_data_commands(&mut self, lock: &str) {
        for command in self.commands.values_mut().filter(|command| command.affects_data()) {
            command.state_mut().force_disabled(lock);
        }
    }

    pub fn unlock_data_commands(&mut self, lock: &str) {
        for command in self.commands.values_mut() {
            command.state_mut().clear_force_disabled(lock);
        }
    }
}

/// String argument of a command, `args[key]`
pub(crate) fn string_arg<'v>(command: &str, args: &'v Value, key: &str) -> Result<&'v str, CommandError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CommandError::InvalidArgument {
            command: command.to_string(),
            message: format!("expected a string `{key}`"),
        })
}
