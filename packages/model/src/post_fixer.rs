//! # Post-fixers
//!
//! Fixers run when a change block closes and repair what the block left
//! inconsistent. Each one reports whether it changed the document; the model
//! keeps running all of them until a round changes nothing.
//!
//! ## Design
//!
//! - fixers only look at what the differ reports, never the whole tree
//! - a fixer must be idempotent: running it on its own output changes nothing
//! - selection repairs do not count as document changes

use tracing::debug;

use crate::differ::DiffEntry;
use crate::errors::ModelResult;
use crate::node::{Attributes, TEXT_NAME};
use crate::position::Position;
use crate::range::Range;
use crate::walker::{Item, TreeWalker, WalkerOptions};
use crate::writer::Writer;

/// Repair step run at block close
pub trait PostFixer: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Fix the document; `true` when anything changed
    fn fix(&self, writer: &mut Writer<'_>) -> ModelResult<bool>;
}

/// Put a paragraph into every attached root left empty
#[derive(Debug)]
pub struct AutoParagraphEmptyRoots {
    pub paragraph: String,
}

impl AutoParagraphEmptyRoots {
    pub fn new(paragraph: impl Into<String>) -> Self {
        Self {
            paragraph: paragraph.into(),
        }
    }
}

impl PostFixer for AutoParagraphEmptyRoots {
    fn name(&self) -> &'static str {
        "auto-paragraph-empty-roots"
    }

    fn fix(&self, writer: &mut Writer<'_>) -> ModelResult<bool> {
        let document = writer.document();
        let empty_roots: Vec<_> = document
            .root_names()
            .into_iter()
            .filter(|name| document.is_root_empty(name))
            .filter_map(|name| document.root(&name))
            .filter(|root| writer.schema().check_child_in(document, *root, &self.paragraph))
            .collect();

        if empty_roots.is_empty() {
            return Ok(false);
        }

        for root in empty_roots {
            let position = writer.document().position_at(root, 0)?;
            writer.insert_element(&self.paragraph, Attributes::new(), &position)?;
            debug!(paragraph = %self.paragraph, "filled empty root");
        }
        Ok(true)
    }
}

/// Drop attributes the schema does not allow on the item carrying them
#[derive(Debug, Default)]
pub struct RemoveDisallowedAttributes;

impl PostFixer for RemoveDisallowedAttributes {
    fn name(&self) -> &'static str {
        "remove-disallowed-attributes"
    }

    fn fix(&self, writer: &mut Writer<'_>) -> ModelResult<bool> {
        let mut to_remove: Vec<(Range, String)> = Vec::new();
        {
            let document = writer.document();
            let schema = writer.schema();
            for entry in document.changes() {
                let range = match &entry {
                    DiffEntry::Insert { position, length, .. } => Range::from_position_and_shift(position, *length),
                    DiffEntry::Attribute { range, .. } => range.clone(),
                    DiffEntry::Remove { .. } => continue,
                };
                for value in TreeWalker::new(document, WalkerOptions::items_of(&range))? {
                    let name = value.item.name(document.tree());
                    for key in value.item.attributes(document.tree()).keys() {
                        if !schema.check_attribute(name, key) {
                            let item_range = Range::new(value.previous_position.clone(), value.next_position.clone());
                            to_remove.push((item_range, key.clone()));
                        }
                    }
                }
            }
        }

        if to_remove.is_empty() {
            return Ok(false);
        }
        for (range, key) in to_remove {
            writer.remove_attribute(&key, &range)?;
        }
        Ok(true)
    }
}

/// Move collapsed carets and range boundaries to the nearest place that
/// accepts text
#[derive(Debug, Default)]
pub struct SelectionFixer;

impl PostFixer for SelectionFixer {
    fn name(&self) -> &'static str {
        "selection"
    }

    fn fix(&self, writer: &mut Writer<'_>) -> ModelResult<bool> {
        let document = writer.document();
        let schema = writer.schema();
        let ranges = document.selection().ranges().to_vec();
        if ranges.is_empty() {
            // Default caret: first text position of the first root.
            let Some(root) = document.root_names().into_iter().next() else {
                return Ok(false);
            };
            let candidates = candidate_positions(writer, &root)?;
            if let Some(first) = candidates
                .iter()
                .find(|position| schema.check_child_at(document, position, TEXT_NAME))
                .cloned()
            {
                writer.fix_selection(vec![Range::collapsed(first)]);
            }
            return Ok(false);
        }

        let mut fixed = Vec::with_capacity(ranges.len());
        let mut changed = false;
        for range in ranges {
            if !document.is_attached(range.root()) {
                continue;
            }
            let text_allowed = |position: &Position| schema.check_child_at(document, position, TEXT_NAME);

            if range.is_collapsed() {
                if text_allowed(&range.start) {
                    fixed.push(range);
                    continue;
                }
                let candidates = candidate_positions(writer, range.root())?;
                let nearest = nearest_after(&candidates, &range.start, &text_allowed)
                    .or_else(|| nearest_before(&candidates, &range.start, &text_allowed));
                if let Some(position) = nearest {
                    fixed.push(Range::collapsed(position));
                    changed = true;
                } else {
                    fixed.push(range);
                }
                continue;
            }

            if selects_single_object(writer, &range)? || (text_allowed(&range.start) && text_allowed(&range.end)) {
                fixed.push(range);
                continue;
            }

            let candidates = candidate_positions(writer, range.root())?;
            let start = if text_allowed(&range.start) {
                Some(range.start.clone())
            } else {
                nearest_after(&candidates, &range.start, &text_allowed)
            };
            let end = if text_allowed(&range.end) {
                Some(range.end.clone())
            } else {
                nearest_before(&candidates, &range.end, &text_allowed)
            };
            match (start, end) {
                (Some(start), Some(end)) if start <= end => {
                    fixed.push(Range::new(start, end));
                    changed = true;
                }
                _ => fixed.push(range),
            }
        }

        if changed {
            debug!(ranges = fixed.len(), "selection moved to a text position");
            writer.fix_selection(fixed);
        }
        Ok(false)
    }
}

/// Every boundary position the walker passes in a root, in order
fn candidate_positions(writer: &Writer<'_>, root: &str) -> ModelResult<Vec<Position>> {
    let document = writer.document();
    let range = document.range_in_root(root)?;
    let mut positions = vec![range.start.clone()];
    for value in TreeWalker::new(document, WalkerOptions::within(&range))? {
        positions.push(value.next_position);
    }
    Ok(positions)
}

fn nearest_after(candidates: &[Position], from: &Position, allowed: &impl Fn(&Position) -> bool) -> Option<Position> {
    candidates.iter().find(|p| *p >= from && allowed(p)).cloned()
}

fn nearest_before(candidates: &[Position], from: &Position, allowed: &impl Fn(&Position) -> bool) -> Option<Position> {
    candidates.iter().rev().find(|p| *p <= from && allowed(p)).cloned()
}

fn selects_single_object(writer: &Writer<'_>, range: &Range) -> ModelResult<bool> {
    let document = writer.document();
    let mut items = TreeWalker::new(document, WalkerOptions::items_of(range).shallow())?;
    let (Some(first), None) = (items.next(), items.next()) else {
        return Ok(false);
    };
    Ok(match first.item {
        Item::Element(element) => writer.schema().is_object(&document.schema_name_of(element)),
        Item::Text(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::dev_utils::{get_data, set_data};
    use crate::model::Model;
    use crate::schema::SchemaItemDefinition;

    fn model() -> Model {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        model
            .schema_mut()
            .register("horizontalLine", SchemaItemDefinition::default().inherit_all_from("$blockObject"));
        model
            .schema_mut()
            .extend(TEXT_NAME, SchemaItemDefinition::default().allow_attributes(&["bold"]));
        model.document_mut().create_root("main", "$root").unwrap();
        model
    }

    #[test]
    fn test_auto_paragraph_fills_emptied_root() {
        let mut model = model();
        set_data(&mut model, "main", "<paragraph>foo</paragraph>").unwrap();
        model.register_post_fixer(Box::new(AutoParagraphEmptyRoots::new("paragraph")));

        model
            .change(|writer| {
                let content = writer.document().range_in_root("main")?;
                writer.remove(&content)
            })
            .unwrap();

        assert_eq!(get_data(&model, "main", false).unwrap(), "<paragraph></paragraph>");
    }

    #[test]
    fn test_disallowed_attribute_is_removed() {
        let mut model = model();
        set_data(&mut model, "main", "<paragraph>foo</paragraph>").unwrap();
        model.register_post_fixer(Box::new(RemoveDisallowedAttributes));

        model
            .change(|writer| {
                let range = Range::new(Position::new("main", vec![0, 0]), Position::new("main", vec![0, 3]));
                writer.set_attribute("bold", Value::Bool(true), &range)?;
                writer.set_attribute("linkHref", Value::from("x"), &range)
            })
            .unwrap();

        assert_eq!(
            get_data(&model, "main", false).unwrap(),
            "<paragraph><$text bold=\"true\">foo</$text></paragraph>"
        );
    }

    #[test]
    fn test_selection_moves_into_text_position() {
        let mut model = model();
        set_data(&mut model, "main", "<horizontalLine></horizontalLine><paragraph>foo</paragraph>").unwrap();
        model.register_post_fixer(Box::new(SelectionFixer));

        model
            .change(|writer| {
                writer.set_selection_at(Position::new("main", vec![0]));
                Ok(())
            })
            .unwrap();

        assert_eq!(get_data(&model, "main", true).unwrap(), "<horizontalLine></horizontalLine><paragraph>[]foo</paragraph>");
    }

    #[test]
    fn test_selected_object_is_kept() {
        let mut model = model();
        set_data(&mut model, "main", "[<horizontalLine></horizontalLine>]<paragraph>foo</paragraph>").unwrap();
        model.register_post_fixer(Box::new(SelectionFixer));

        model.change(|_| Ok(())).unwrap();

        assert_eq!(
            get_data(&model, "main", true).unwrap(),
            "[<horizontalLine></horizontalLine>]<paragraph>foo</paragraph>"
        );
    }
}
