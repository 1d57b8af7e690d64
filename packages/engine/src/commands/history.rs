use folio_model::{Model, Value};

use super::{Command, CommandContext, CommandState};
use crate::errors::EngineResult;
use crate::undo::UndoManager;

/// `undo`: revert the most recent undo step
#[derive(Debug, Default)]
pub struct UndoCommand {
    state: CommandState,
}

impl UndoCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for UndoCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, _model: &Model, undo: &UndoManager) {
        self.state.is_enabled = undo.can_undo();
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, _args: &Value) -> EngineResult<()> {
        context.undo.undo(context.model)?;
        Ok(())
    }
}

/// `redo`: re-apply the most recently undone step
#[derive(Debug, Default)]
pub struct RedoCommand {
    state: CommandState,
}

impl RedoCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for RedoCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, _model: &Model, undo: &UndoManager) {
        self.state.is_enabled = undo.can_redo();
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, _args: &Value) -> EngineResult<()> {
        context.undo.redo(context.model)?;
        Ok(())
    }
}
