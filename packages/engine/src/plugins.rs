//! # Plugins
//!
//! Features register their schema items, converters and commands on an
//! editor before its roots are created. The core set below is enough to
//! round-trip the usual rich-text markup.
//!
//! | plugin            | model                         | view                         | commands                     |
//! |-------------------|-------------------------------|------------------------------|------------------------------|
//! | paragraph         | `paragraph`                   | `<p>`                        | `paragraph`                  |
//! | basic styles      | `bold`, `italic`, `underline` | `<strong>`, `<i>`, `<u>`     | same names                   |
//! | heading           | configured heading elements   | configured `<hN>`            | `heading`                    |
//! | alignment         | `alignment` on blocks         | `text-align` style           | `alignment`                  |
//! | horizontal line   | `horizontalLine` object       | `<hr>`, widget when editing  | `horizontalLine`             |
//! | typing            |                               |                              | `insertText`, `delete`, `deleteForward`, `enter` |
//! | undo              |                               |                              | `undo`, `redo`               |
//! | highlight         | `highlight:*` markers         | `<span class="highlight">`   |                              |
//! | html support      | `htmlElement`                 | any unknown block element    |                              |

use std::fmt;

use folio_model::content::DEFAULT_PARAGRAPH;
use folio_model::{SchemaItemDefinition, Value, TEXT_NAME};
use folio_view::{ElementCategory, MatcherPattern, ValuePattern, ViewElement, ViewPosition};
use tracing::warn;

use crate::commands::{
    AlignmentCommand, AttributeCommand, DeleteCommand, DeleteDirection, EnterCommand, HeadingCommand,
    HorizontalLineCommand, InsertTextCommand, ParagraphCommand, RedoCommand, UndoCommand, ALIGNMENT,
    DEFAULT_ALIGNMENT, HORIZONTAL_LINE,
};
use crate::config::UnknownContentPolicy;
use crate::conversion::{HighlightDescriptor, ViewAttribute, HTML_ELEMENT};
use crate::editor::Editor;
use crate::errors::EngineResult;

pub const HIGHLIGHT_GROUP: &str = "highlight";

pub trait Plugin: fmt::Debug {
    fn name(&self) -> &'static str;

    fn init(&self, editor: &mut Editor) -> EngineResult<()>;
}

/// Core plugins for a configuration
pub fn core_plugins(policy: UnknownContentPolicy) -> Vec<Box<dyn Plugin>> {
    let mut plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(ParagraphPlugin),
        Box::new(BasicStylesPlugin),
        Box::new(HeadingPlugin),
        Box::new(AlignmentPlugin),
        Box::new(HorizontalLinePlugin),
        Box::new(TypingPlugin),
        Box::new(UndoPlugin),
        Box::new(HighlightPlugin),
    ];
    if policy == UnknownContentPolicy::Preserve {
        plugins.push(Box::new(HtmlSupportPlugin));
    }
    plugins
}

#[derive(Debug)]
pub struct ParagraphPlugin;

impl Plugin for ParagraphPlugin {
    fn name(&self) -> &'static str {
        "Paragraph"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        editor
            .model
            .schema_mut()
            .register(DEFAULT_PARAGRAPH, SchemaItemDefinition::default().inherit_all_from("$block"));
        editor.conversion.for_downcast().element_to_element(DEFAULT_PARAGRAPH, "p");
        editor
            .conversion
            .for_upcast()
            .element_to_element(MatcherPattern::name("p"), DEFAULT_PARAGRAPH);
        editor.commands.add("paragraph", Box::new(ParagraphCommand::new()))?;
        Ok(())
    }
}

/// `bold`, `italic` and `underline` text attributes
#[derive(Debug)]
pub struct BasicStylesPlugin;

impl BasicStylesPlugin {
    const STYLES: [(&'static str, &'static str, &'static [&'static str]); 3] = [
        ("bold", "strong", &["strong", "b"]),
        ("italic", "i", &["i", "em"]),
        ("underline", "u", &["u"]),
    ];
}

impl Plugin for BasicStylesPlugin {
    fn name(&self) -> &'static str {
        "BasicStyles"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        for (key, view, upcast_names) in Self::STYLES {
            editor
                .model
                .schema_mut()
                .extend(TEXT_NAME, SchemaItemDefinition::default().allow_attributes(&[key]));
            editor
                .conversion
                .for_downcast()
                .attribute_to_element(key, move |value| (value == &Value::Bool(true)).then(|| view.into()));
            editor
                .conversion
                .for_upcast()
                .element_to_attribute(MatcherPattern::names(upcast_names), key, |_| Value::Bool(true));
            editor.commands.add(key, Box::new(AttributeCommand::new(key)))?;
        }

        editor.conversion.for_upcast().element_to_attribute(
            MatcherPattern::name("span").with_style("font-weight", ValuePattern::OneOf(vec!["bold".into(), "700".into()])),
            "bold",
            |_| Value::Bool(true),
        );
        Ok(())
    }
}

/// Headings from the editor configuration
#[derive(Debug)]
pub struct HeadingPlugin;

impl Plugin for HeadingPlugin {
    fn name(&self) -> &'static str {
        "Heading"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        let headings = editor.config.headings.clone();
        for heading in &headings {
            editor
                .model
                .schema_mut()
                .register(&heading.model, SchemaItemDefinition::default().inherit_all_from("$block"));
            editor
                .conversion
                .for_downcast()
                .element_to_element(&heading.model, heading.view.as_str());
            editor
                .conversion
                .for_upcast()
                .element_to_element(MatcherPattern::name(&heading.view), &heading.model);
        }
        let options = headings.into_iter().map(|heading| heading.model);
        editor.commands.add("heading", Box::new(HeadingCommand::new(options)))?;
        Ok(())
    }
}

/// `alignment` attribute on blocks, written as a `text-align` style. `left`
/// is the default and has no view.
#[derive(Debug)]
pub struct AlignmentPlugin;

impl Plugin for AlignmentPlugin {
    fn name(&self) -> &'static str {
        "Alignment"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        let options = editor.config.alignments.clone();
        editor
            .model
            .schema_mut()
            .extend("$block", SchemaItemDefinition::default().allow_attributes(&[ALIGNMENT]));

        editor.conversion.for_downcast().attribute_to_attribute(ALIGNMENT, |value| {
            value
                .as_str()
                .filter(|alignment| *alignment != DEFAULT_ALIGNMENT)
                .map(|alignment| ViewAttribute::Style("text-align".to_string(), alignment.to_string()))
        });

        let allowed = options.clone();
        editor.conversion.for_upcast().attribute_to_attribute(
            MatcherPattern::default().with_style("text-align", ValuePattern::OneOf(options.clone())),
            ALIGNMENT,
            move |element| {
                element
                    .styles
                    .get("text-align")
                    .filter(|alignment| allowed.contains(alignment) && alignment.as_str() != DEFAULT_ALIGNMENT)
                    .map(|alignment| Value::String(alignment.clone()))
            },
        );
        editor.commands.add("alignment", Box::new(AlignmentCommand::new(options)))?;
        Ok(())
    }
}

/// `horizontalLine` block object. The editing view wraps the `<hr>` in a
/// non-editable widget container.
#[derive(Debug)]
pub struct HorizontalLinePlugin;

impl Plugin for HorizontalLinePlugin {
    fn name(&self) -> &'static str {
        "HorizontalLine"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        editor
            .model
            .schema_mut()
            .register(HORIZONTAL_LINE, SchemaItemDefinition::default().inherit_all_from("$blockObject"));

        editor
            .conversion
            .for_data_downcast()
            .element_to_element_with(HORIZONTAL_LINE, |_, writer| writer.create_empty_element("hr", []));
        editor
            .conversion
            .for_editing_downcast()
            .element_to_element_with(HORIZONTAL_LINE, |_, writer| {
                let widget = writer.create_container_element(
                    "div",
                    [("class", "ck-widget ck-horizontal-line"), ("contenteditable", "false")],
                );
                let line = writer.create_empty_element("hr", []);
                if let Err(err) = writer.insert(ViewPosition::new(widget, 0), vec![line]) {
                    warn!(%err, "horizontal line widget left empty");
                }
                widget
            });
        editor
            .conversion
            .for_upcast()
            .element_to_element(MatcherPattern::name("hr"), HORIZONTAL_LINE);
        editor
            .commands
            .add("horizontalLine", Box::new(HorizontalLineCommand::new()))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct TypingPlugin;

impl Plugin for TypingPlugin {
    fn name(&self) -> &'static str {
        "Typing"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        let headings = editor.config.headings.iter().map(|heading| heading.model.clone());
        let enter = EnterCommand::new().with_paragraph_after(headings.collect::<Vec<_>>());

        editor.commands.add("insertText", Box::new(InsertTextCommand::new()))?;
        editor
            .commands
            .add("delete", Box::new(DeleteCommand::new(DeleteDirection::Backward)))?;
        editor
            .commands
            .add("deleteForward", Box::new(DeleteCommand::new(DeleteDirection::Forward)))?;
        editor.commands.add("enter", Box::new(enter))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct UndoPlugin;

impl Plugin for UndoPlugin {
    fn name(&self) -> &'static str {
        "Undo"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        editor.commands.add("undo", Box::new(UndoCommand::new()))?;
        editor.commands.add("redo", Box::new(RedoCommand::new()))?;
        Ok(())
    }
}

/// `highlight:<id>` markers shown as highlighted spans in the editing view
#[derive(Debug)]
pub struct HighlightPlugin;

impl Plugin for HighlightPlugin {
    fn name(&self) -> &'static str {
        "Highlight"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        editor
            .conversion
            .for_editing_downcast()
            .marker_to_highlight(HIGHLIGHT_GROUP, HighlightDescriptor::new("highlight"));
        Ok(())
    }
}

/// Keeps unknown block elements as `htmlElement` and writes them back with
/// their original name and attributes
#[derive(Debug)]
pub struct HtmlSupportPlugin;

impl Plugin for HtmlSupportPlugin {
    fn name(&self) -> &'static str {
        "HtmlSupport"
    }

    fn init(&self, editor: &mut Editor) -> EngineResult<()> {
        editor.model.schema_mut().register(
            HTML_ELEMENT,
            SchemaItemDefinition::default()
                .allow_where("$block")
                .allow_content_of("$root")
                .allow_attributes(&["htmlName", "htmlAttributes"]),
        );
        editor
            .conversion
            .for_downcast()
            .element_to_element_with(HTML_ELEMENT, |attributes, writer| {
                let name = attributes
                    .get("htmlName")
                    .and_then(Value::as_str)
                    .unwrap_or("div");
                let mut element = ViewElement::new(name, ElementCategory::Container);
                if let Some(Value::Object(html_attributes)) = attributes.get("htmlAttributes") {
                    for (key, value) in html_attributes {
                        if let Some(value) = value.as_str() {
                            element.set_attribute(key, value);
                        }
                    }
                }
                writer.create_element(element)
            });
        Ok(())
    }
}
