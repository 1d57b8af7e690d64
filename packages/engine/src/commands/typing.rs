//! Typing, deleting and splitting blocks.

use folio_model::content::{delete_content, DeleteOptions, DEFAULT_PARAGRAPH};
use folio_model::{BatchType, Model, ModelResult, NodeId, Position, Range, Value, Writer, TEXT_NAME};
use tracing::trace;

use super::{string_arg, Command, CommandContext, CommandState};
use crate::errors::EngineResult;
use crate::undo::UndoManager;

fn has_selection(model: &Model) -> bool {
    let selection = model.document().selection();
    selection.range_count() > 0 && !selection.is_in_graveyard()
}

/// `insertText { text }`: replace the selection with text carrying the
/// selection attributes
#[derive(Debug, Default)]
pub struct InsertTextCommand {
    state: CommandState,
}

impl InsertTextCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for InsertTextCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        self.state.is_enabled = has_selection(model);
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, args: &Value) -> EngineResult<()> {
        let text = string_arg("insertText", args, "text")?.to_string();
        context.model.change_with(BatchType::typing(), |writer| {
            if !writer.document().selection().is_collapsed() {
                delete_content(writer, &DeleteOptions::default())?;
            }
            let document = writer.document();
            let Some(position) = document.selection().first_position().cloned() else {
                return Ok(());
            };
            if text.is_empty() || !writer.schema().check_child_at(document, &position, TEXT_NAME) {
                return Ok(());
            }
            let attributes = document
                .selection()
                .attributes(document)
                .into_iter()
                .filter(|(key, _)| writer.schema().check_attribute(TEXT_NAME, key))
                .collect();

            let range = writer.insert_text(&text, attributes, &position)?;
            writer.set_selection_at(range.end);
            Ok(())
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDirection {
    Backward,
    Forward,
}

/// `delete` and `deleteForward`: remove the selection, or one character
/// next to the caret, merging blocks at their edges
#[derive(Debug)]
pub struct DeleteCommand {
    state: CommandState,
    direction: DeleteDirection,
}

impl DeleteCommand {
    pub fn new(direction: DeleteDirection) -> Self {
        Self {
            state: CommandState::default(),
            direction,
        }
    }
}

impl Command for DeleteCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        self.state.is_enabled = has_selection(model);
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, _args: &Value) -> EngineResult<()> {
        let direction = self.direction;
        context.model.change_with(BatchType::typing(), |writer| {
            let selection = writer.document().selection();
            if !selection.is_collapsed() {
                return delete_content(writer, &DeleteOptions::default());
            }
            let Some(caret) = selection.first_position().cloned() else {
                return Ok(());
            };

            let document = writer.document();
            let parent = document.parent_of(&caret)?;
            let offset = caret.offset();
            let max_offset = document.tree().max_offset(parent);
            match direction {
                DeleteDirection::Backward if offset > 0 => {
                    let start = document.position_at(parent, offset - 1)?;
                    writer.remove(&Range::new(start.clone(), caret))?;
                    writer.set_selection_at(start);
                    Ok(())
                }
                DeleteDirection::Forward if offset < max_offset => {
                    let end = document.position_at(parent, offset + 1)?;
                    writer.remove(&Range::new(caret.clone(), end))?;
                    writer.set_selection_at(caret);
                    Ok(())
                }
                _ => merge_at_block_edge(writer, parent, direction),
            }
        })?;
        Ok(())
    }
}

/// Caret at the edge of a block: merge it with its neighbour, or remove a
/// neighbouring object
fn merge_at_block_edge(writer: &mut Writer<'_>, block: NodeId, direction: DeleteDirection) -> ModelResult<()> {
    let document = writer.document();
    let schema = writer.schema();
    let tree = document.tree();
    if document.is_root(block) || schema.is_limit(tree.item_name(block)) {
        return Ok(());
    }

    let boundary = match direction {
        DeleteDirection::Backward => document.position_before(block)?,
        DeleteDirection::Forward => document.position_after(block)?,
    };
    let neighbour = match direction {
        DeleteDirection::Backward => document.node_before(&boundary),
        DeleteDirection::Forward => document.node_after(&boundary),
    };
    let Some(neighbour) = neighbour.filter(|&node| tree.is_element(node)) else {
        return Ok(());
    };

    let neighbour_name = tree.item_name(neighbour);
    if schema.is_object(neighbour_name) {
        trace!(object = neighbour_name, "object next to the caret removed");
        writer.remove_node(neighbour)?;
        let caret = writer.document().position_at(block, 0)?;
        writer.set_selection_at(caret);
        return Ok(());
    }
    if !schema.is_block(neighbour_name) || schema.is_limit(neighbour_name) {
        return Ok(());
    }

    let (first, caret_offset) = match direction {
        DeleteDirection::Backward => (neighbour, tree.max_offset(neighbour)),
        DeleteDirection::Forward => (block, tree.max_offset(block)),
    };
    // An empty first block goes away instead of taking the other one's content.
    if direction == DeleteDirection::Backward && tree.is_empty(neighbour) && !tree.is_empty(block) {
        writer.remove_node(neighbour)?;
        let caret = writer.document().position_at(block, 0)?;
        writer.set_selection_at(caret);
        return Ok(());
    }

    writer.merge(&boundary)?;
    let caret = writer.document().position_at(first, caret_offset)?;
    writer.set_selection_at(caret);
    Ok(())
}

/// `enter`: split the block at the caret
#[derive(Debug, Default)]
pub struct EnterCommand {
    state: CommandState,
    /// Blocks that continue as a paragraph when split at their end
    paragraph_after: Vec<String>,
}

impl EnterCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paragraph_after(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.paragraph_after.extend(names);
        self
    }
}

impl Command for EnterCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        self.state.is_enabled = has_selection(model);
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, _args: &Value) -> EngineResult<()> {
        let paragraph_after = &self.paragraph_after;
        context.model.change(|writer| {
            if !writer.document().selection().is_collapsed() {
                delete_content(writer, &DeleteOptions::default())?;
            }
            let Some(caret) = writer.document().selection().first_position().cloned() else {
                return Ok(());
            };
            let document = writer.document();
            let block = document.parent_of(&caret)?;
            let name = document.tree().item_name(block).to_string();
            if document.is_root(block) || writer.schema().is_limit(&name) {
                return Ok(());
            }
            let at_end = caret.offset() == document.tree().max_offset(block);

            let split = writer.split(&caret, None)?;
            let copy = writer.document().parent_of(&split.range.end)?;
            if at_end && paragraph_after.contains(&name) && allows_paragraph(writer, &split.position) {
                writer.rename(copy, DEFAULT_PARAGRAPH)?;
                let range = writer.document().range_on(copy)?;
                writer.clear_attributes(&range)?;
            }
            writer.set_selection_at(split.range.end);
            Ok(())
        })?;
        Ok(())
    }
}

fn allows_paragraph(writer: &Writer<'_>, position: &Position) -> bool {
    writer
        .schema()
        .check_child_at(writer.document(), position, DEFAULT_PARAGRAPH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::dev_utils::{get_data, set_data};
    use folio_model::SchemaItemDefinition;
    use serde_json::json;

    fn model(data: &str) -> Model {
        let mut model = Model::new();
        let schema = model.schema_mut();
        schema.register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        schema.register("heading1", SchemaItemDefinition::default().inherit_all_from("$block"));
        schema.register("horizontalLine", SchemaItemDefinition::default().inherit_all_from("$blockObject"));
        schema.extend("$text", SchemaItemDefinition::default().allow_attributes(&["bold"]));
        model.document_mut().create_root("main", "$root").unwrap();
        set_data(&mut model, "main", data).unwrap();
        model
    }

    fn run(model: &mut Model, command: &mut dyn Command, args: Value) -> String {
        let mut undo = UndoManager::new();
        let mut context = CommandContext { model, undo: &mut undo };
        command.execute(&mut context, &args).unwrap();
        get_data(model, "main", true).unwrap()
    }

    #[test]
    fn test_insert_text_replaces_selection_and_keeps_attributes() {
        let mut model = model("<paragraph>f[oo]<$text bold=\"true\">bar</$text></paragraph>");
        let mut command = InsertTextCommand::new();
        assert_eq!(
            run(&mut model, &mut command, json!({ "text": "x" })),
            "<paragraph>fx[]<$text bold=\"true\">bar</$text></paragraph>"
        );

        let mut model = self::model("<paragraph><$text bold=\"true\">a[]</$text></paragraph>");
        assert_eq!(
            run(&mut model, &mut command, json!({ "text": "b" })),
            "<paragraph><$text bold=\"true\">ab</$text>[]</paragraph>"
        );
    }

    #[test]
    fn test_insert_text_requires_text_argument() {
        let mut model = model("<paragraph>[]</paragraph>");
        let mut undo = UndoManager::new();
        let mut context = CommandContext {
            model: &mut model,
            undo: &mut undo,
        };
        let err = InsertTextCommand::new()
            .execute(&mut context, &json!({}))
            .unwrap_err();
        assert_eq!(err.code(), "command-invalid-argument");
    }

    #[test]
    fn test_delete_characters() {
        let mut model = model("<paragraph>fo[]o</paragraph>");
        let mut backward = DeleteCommand::new(DeleteDirection::Backward);
        assert_eq!(run(&mut model, &mut backward, json!({})), "<paragraph>f[]o</paragraph>");

        let mut forward = DeleteCommand::new(DeleteDirection::Forward);
        assert_eq!(run(&mut model, &mut forward, json!({})), "<paragraph>f[]</paragraph>");
    }

    #[test]
    fn test_delete_merges_blocks() {
        let mut model = model("<paragraph>foo</paragraph><paragraph>[]bar</paragraph>");
        let mut backward = DeleteCommand::new(DeleteDirection::Backward);
        assert_eq!(run(&mut model, &mut backward, json!({})), "<paragraph>foo[]bar</paragraph>");

        let mut model = self::model("<paragraph>foo[]</paragraph><paragraph>bar</paragraph>");
        let mut forward = DeleteCommand::new(DeleteDirection::Forward);
        assert_eq!(run(&mut model, &mut forward, json!({})), "<paragraph>foo[]bar</paragraph>");
    }

    #[test]
    fn test_delete_removes_object_before_block() {
        let mut model = model("<horizontalLine></horizontalLine><paragraph>[]foo</paragraph>");
        let mut backward = DeleteCommand::new(DeleteDirection::Backward);
        assert_eq!(run(&mut model, &mut backward, json!({})), "<paragraph>[]foo</paragraph>");
    }

    #[test]
    fn test_delete_selection_across_blocks() {
        let mut model = model("<paragraph>f[oo</paragraph><paragraph>ba]r</paragraph>");
        let mut backward = DeleteCommand::new(DeleteDirection::Backward);
        assert_eq!(run(&mut model, &mut backward, json!({})), "<paragraph>f[]r</paragraph>");
    }

    #[test]
    fn test_enter_splits_block() {
        let mut model = model("<paragraph>fo[]o</paragraph>");
        let mut enter = EnterCommand::new();
        assert_eq!(
            run(&mut model, &mut enter, json!({})),
            "<paragraph>fo</paragraph><paragraph>[]o</paragraph>"
        );
    }

    #[test]
    fn test_enter_at_heading_end_starts_paragraph() {
        let mut model = model("<heading1>Title[]</heading1>");
        let mut enter = EnterCommand::new().with_paragraph_after(["heading1".to_string()]);
        assert_eq!(
            run(&mut model, &mut enter, json!({})),
            "<heading1>Title</heading1><paragraph>[]</paragraph>"
        );

        let mut model = self::model("<heading1>Ti[]tle</heading1>");
        assert_eq!(
            run(&mut model, &mut enter, json!({})),
            "<heading1>Ti</heading1><heading1>[]tle</heading1>"
        );
    }
}
