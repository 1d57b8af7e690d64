//! Commands acting on whole blocks.

use folio_model::content::{insert_content, selected_blocks, DEFAULT_PARAGRAPH};
use folio_model::{Attributes, Document, Model, ModelResult, Node, NodeId, Schema, Value, Writer, TEXT_NAME};
use tracing::trace;

use super::{string_arg, Command, CommandContext, CommandState};
use crate::errors::{CommandError, EngineResult};
use crate::undo::UndoManager;

pub const ALIGNMENT: &str = "alignment";
pub const DEFAULT_ALIGNMENT: &str = "left";
pub const HORIZONTAL_LINE: &str = "horizontalLine";

/// Selected blocks that could be renamed, objects excluded
fn renameable_blocks(document: &Document, schema: &Schema) -> Vec<NodeId> {
    selected_blocks(document, schema)
        .unwrap_or_default()
        .into_iter()
        .filter(|&block| !schema.is_object(document.tree().item_name(block)))
        .collect()
}

fn can_become(document: &Document, schema: &Schema, block: NodeId, name: &str) -> bool {
    document
        .tree()
        .parent(block)
        .is_some_and(|parent| schema.check_child_in(document, parent, name))
}

fn rename_blocks(writer: &mut Writer<'_>, name: &str) -> ModelResult<()> {
    for block in renameable_blocks(writer.document(), writer.schema()) {
        let document = writer.document();
        if document.tree().item_name(block) == name || !can_become(document, writer.schema(), block, name) {
            continue;
        }
        trace!(from = document.tree().item_name(block), to = name, "block renamed");
        writer.rename(block, name)?;
    }
    Ok(())
}

/// `paragraph`: turn the selected blocks into paragraphs
#[derive(Debug, Default)]
pub struct ParagraphCommand {
    state: CommandState,
}

impl ParagraphCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for ParagraphCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        let document = model.document();
        let blocks = renameable_blocks(document, model.schema());
        self.state.is_enabled = blocks
            .iter()
            .any(|&block| can_become(document, model.schema(), block, DEFAULT_PARAGRAPH));
        let value = blocks
            .first()
            .is_some_and(|&block| document.tree().item_name(block) == DEFAULT_PARAGRAPH);
        self.state.value = Some(Value::Bool(value));
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, _args: &Value) -> EngineResult<()> {
        context.model.change(|writer| rename_blocks(writer, DEFAULT_PARAGRAPH))?;
        Ok(())
    }
}

/// `heading { value }`: turn the selected blocks into one of the heading
/// elements. The value is the heading's model name, or `false` when the
/// first selected block is no heading.
#[derive(Debug)]
pub struct HeadingCommand {
    state: CommandState,
    options: Vec<String>,
}

impl HeadingCommand {
    pub fn new(options: impl IntoIterator<Item = String>) -> Self {
        Self {
            state: CommandState::default(),
            options: options.into_iter().collect(),
        }
    }
}

impl Command for HeadingCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        let document = model.document();
        let blocks = renameable_blocks(document, model.schema());
        self.state.is_enabled = self.options.first().is_some_and(|heading| {
            blocks
                .iter()
                .any(|&block| can_become(document, model.schema(), block, heading))
        });
        let value = blocks
            .first()
            .map(|&block| document.tree().item_name(block))
            .filter(|name| self.options.iter().any(|option| option == name))
            .map(|name| Value::String(name.to_string()))
            .unwrap_or(Value::Bool(false));
        self.state.value = Some(value);
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, args: &Value) -> EngineResult<()> {
        let heading = string_arg("heading", args, "value")?;
        if !self.options.iter().any(|option| option == heading) {
            return Err(CommandError::InvalidArgument {
                command: "heading".to_string(),
                message: format!("unknown heading `{heading}`"),
            }
            .into());
        }
        context.model.change(|writer| rename_blocks(writer, heading))?;
        Ok(())
    }
}

/// `alignment { value }`: set the `alignment` attribute of the selected
/// blocks. The default alignment removes the attribute.
#[derive(Debug)]
pub struct AlignmentCommand {
    state: CommandState,
    options: Vec<String>,
}

impl AlignmentCommand {
    pub fn new(options: impl IntoIterator<Item = String>) -> Self {
        Self {
            state: CommandState::default(),
            options: options.into_iter().collect(),
        }
    }
}

fn alignable_blocks(document: &Document, schema: &Schema) -> Vec<NodeId> {
    renameable_blocks(document, schema)
        .into_iter()
        .filter(|&block| schema.check_attribute(document.tree().item_name(block), ALIGNMENT))
        .collect()
}

impl Command for AlignmentCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        let document = model.document();
        let blocks = alignable_blocks(document, model.schema());
        self.state.is_enabled = !blocks.is_empty();
        let value = blocks
            .first()
            .and_then(|&block| document.tree().attribute(block, ALIGNMENT))
            .cloned()
            .unwrap_or_else(|| Value::String(DEFAULT_ALIGNMENT.to_string()));
        self.state.value = Some(value);
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, args: &Value) -> EngineResult<()> {
        let alignment = match args.get("value") {
            None | Some(Value::Null) => DEFAULT_ALIGNMENT,
            Some(_) => string_arg("alignment", args, "value")?,
        };
        if !self.options.iter().any(|option| option == alignment) {
            return Err(CommandError::InvalidArgument {
                command: "alignment".to_string(),
                message: format!("unsupported alignment `{alignment}`"),
            }
            .into());
        }

        context.model.change(|writer| {
            for block in alignable_blocks(writer.document(), writer.schema()) {
                if alignment == DEFAULT_ALIGNMENT {
                    writer.remove_attribute_on(ALIGNMENT, block)?;
                } else {
                    writer.set_attribute_on(ALIGNMENT, Value::String(alignment.to_string()), block)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// `horizontalLine`: insert a horizontal line at the selection and continue
/// in the paragraph after it
#[derive(Debug, Default)]
pub struct HorizontalLineCommand {
    state: CommandState,
}

impl HorizontalLineCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for HorizontalLineCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        let document = model.document();
        self.state.is_enabled = document.selection().first_position().is_some_and(|position| {
            !document.selection().is_in_graveyard()
                && model
                    .schema()
                    .find_allowed_parent(document, position, HORIZONTAL_LINE)
                    .is_some()
        });
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, _args: &Value) -> EngineResult<()> {
        context.model.change(|writer| {
            insert_content(writer, vec![Node::element(HORIZONTAL_LINE)], None)?;
            let Some(caret) = writer.document().selection().first_position().cloned() else {
                return Ok(());
            };

            let document = writer.document();
            let next = document
                .node_after(&caret)
                .filter(|&node| document.tree().is_element(node))
                .filter(|&node| writer.schema().check_child_in(document, node, TEXT_NAME));
            let target = match next {
                Some(block) => block,
                None => writer.insert_element(DEFAULT_PARAGRAPH, Attributes::new(), &caret)?,
            };
            let start = writer.document().position_at(target, 0)?;
            writer.set_selection_at(start);
            Ok(())
        })?;
        Ok(())
    }
}
