use folio_model::{Document, DocumentSelection, Model, ModelResult, Schema, TreeWalker, Value, WalkerOptions};

use super::{Command, CommandContext, CommandState};
use crate::errors::{CommandError, EngineResult};
use crate::undo::UndoManager;

/// Toggles a boolean text attribute such as `bold` or `italic`.
///
/// On a collapsed selection the attribute goes to the selection so the next
/// typed text picks it up. Otherwise it is set on every selected item that
/// allows it. `{ "forceValue": true }` sets instead of toggling.
#[derive(Debug)]
pub struct AttributeCommand {
    state: CommandState,
    key: String,
}

impl AttributeCommand {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            state: CommandState::default(),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Command for AttributeCommand {
    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    fn refresh(&mut self, model: &Model, _undo: &UndoManager) {
        let document = model.document();
        let selection = document.selection();
        self.state.is_enabled = selection.range_count() > 0
            && !selection.is_in_graveyard()
            && model.schema().check_attribute_in_selection(document, selection, &self.key);
        let value = selection_has_attribute(document, model.schema(), selection, &self.key).unwrap_or(false);
        self.state.value = Some(Value::Bool(value));
    }

    fn execute(&mut self, context: &mut CommandContext<'_>, args: &Value) -> EngineResult<()> {
        let force = match args.get("forceValue") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(force)) => Some(*force),
            Some(other) => {
                return Err(CommandError::InvalidArgument {
                    command: self.key.clone(),
                    message: format!("`forceValue` must be a boolean, got {other}"),
                }
                .into())
            }
        };
        let current = matches!(self.state.value, Some(Value::Bool(true)));
        let set = force.unwrap_or(!current);
        let key = self.key.as_str();

        context.model.change(|writer| {
            let selection = writer.document().selection();
            if selection.is_collapsed() {
                if set {
                    writer.set_selection_attribute(key, Value::Bool(true));
                } else {
                    writer.remove_selection_attribute(key);
                }
                return Ok(());
            }

            let ranges = selection.ranges().to_vec();
            let valid = writer.schema().get_valid_ranges(writer.document(), &ranges, key)?;
            for range in valid {
                if set {
                    writer.set_attribute(key, Value::Bool(true), &range)?;
                } else {
                    writer.remove_attribute(key, &range)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Collapsed: the selection's own attributes. Otherwise the first selected
/// item that allows the attribute decides.
fn selection_has_attribute(
    document: &Document,
    schema: &Schema,
    selection: &DocumentSelection,
    key: &str,
) -> ModelResult<bool> {
    if selection.is_collapsed() {
        return Ok(selection.has_attribute(document, key));
    }
    for range in selection.ranges() {
        for value in TreeWalker::new(document, WalkerOptions::items_of(range))? {
            if schema.check_attribute_on(document, &value.item, key) {
                return Ok(value.item.attributes(document.tree()).contains_key(key));
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::dev_utils::{get_data, set_data};
    use folio_model::SchemaItemDefinition;
    use serde_json::json;

    fn model(data: &str) -> Model {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        model
            .schema_mut()
            .extend("$text", SchemaItemDefinition::default().allow_attributes(&["bold"]));
        model.document_mut().create_root("main", "$root").unwrap();
        set_data(&mut model, "main", data).unwrap();
        model
    }

    fn run(model: &mut Model, command: &mut AttributeCommand, args: serde_json::Value) {
        let mut undo = UndoManager::new();
        command.refresh(model, &undo);
        let mut context = CommandContext { model, undo: &mut undo };
        command.execute(&mut context, &args).unwrap();
        command.refresh(model, &undo);
    }

    #[test]
    fn test_toggle_on_range() {
        let mut model = model("<paragraph>f[oo]</paragraph>");
        let mut bold = AttributeCommand::new("bold");
        bold.refresh(&model, &UndoManager::new());
        assert!(bold.is_enabled());
        assert_eq!(bold.value(), Some(&json!(false)));

        run(&mut model, &mut bold, json!({}));
        assert_eq!(
            get_data(&model, "main", false).unwrap(),
            "<paragraph>f<$text bold=\"true\">oo</$text></paragraph>"
        );
        assert_eq!(bold.value(), Some(&json!(true)));

        run(&mut model, &mut bold, json!({}));
        assert_eq!(get_data(&model, "main", false).unwrap(), "<paragraph>foo</paragraph>");
    }

    #[test]
    fn test_collapsed_selection_stores_attribute() {
        let mut model = model("<paragraph>foo[]</paragraph>");
        let mut bold = AttributeCommand::new("bold");
        run(&mut model, &mut bold, json!({ "forceValue": true }));
        assert!(model.document().selection().has_attribute(model.document(), "bold"));
        assert_eq!(bold.value(), Some(&json!(true)));
        assert_eq!(get_data(&model, "main", false).unwrap(), "<paragraph>foo</paragraph>");
    }

    #[test]
    fn test_disabled_where_schema_disallows() {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        model.document_mut().create_root("main", "$root").unwrap();
        set_data(&mut model, "main", "<paragraph>f[oo]</paragraph>").unwrap();

        let mut bold = AttributeCommand::new("bold");
        bold.refresh(&model, &UndoManager::new());
        assert!(!bold.is_enabled());
    }
}
