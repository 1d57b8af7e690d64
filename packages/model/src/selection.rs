//! Document selection.
//!
//! Ranges plus a direction flag. Attributes of a collapsed selection are read
//! from the surrounding text unless explicitly stored (the bold caret before
//! anything is typed); stored values are dropped when the selection is set
//! anew.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::document::{Document, GRAVEYARD};
use crate::node::Attributes;
use crate::position::Position;
use crate::range::Range;
use crate::tree::NodeId;
use crate::walker::{Item, TreeWalker, WalkerOptions};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSelection {
    ranges: Vec<Range>,
    backward: bool,
    /// `None` marks an attribute explicitly removed
    stored: BTreeMap<String, Option<Value>>,
}

impl DocumentSelection {
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_backward(&self) -> bool {
        self.backward && !self.is_collapsed()
    }

    pub fn is_collapsed(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_collapsed()
    }

    pub fn first_range(&self) -> Option<&Range> {
        self.ranges
            .iter()
            .min_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn last_range(&self) -> Option<&Range> {
        self.ranges
            .iter()
            .max_by(|a, b| a.end.partial_cmp(&b.end).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn first_position(&self) -> Option<&Position> {
        self.first_range().map(|range| &range.start)
    }

    pub fn last_position(&self) -> Option<&Position> {
        self.last_range().map(|range| &range.end)
    }

    pub fn anchor(&self) -> Option<&Position> {
        if self.backward {
            self.last_position()
        } else {
            self.first_position()
        }
    }

    pub fn focus(&self) -> Option<&Position> {
        if self.backward {
            self.first_position()
        } else {
            self.last_position()
        }
    }

    pub fn is_in_graveyard(&self) -> bool {
        self.ranges.iter().any(|range| range.root() == GRAVEYARD)
    }

    pub(crate) fn set_ranges(&mut self, ranges: Vec<Range>, backward: bool) {
        self.ranges = ranges;
        self.backward = backward;
        self.stored.clear();
    }

    /// Replace ranges after a document change, keeping stored attributes
    pub(crate) fn replace_ranges(&mut self, ranges: Vec<Range>) {
        self.ranges = ranges;
    }

    pub(crate) fn store_attribute(&mut self, key: &str, value: Option<Value>) {
        self.stored.insert(key.to_string(), value);
    }

    pub(crate) fn clear_stored_attributes(&mut self) {
        self.stored.clear();
    }

    pub fn stored_attribute(&self, key: &str) -> Option<&Option<Value>> {
        self.stored.get(key)
    }

    /// Effective attributes: surrounding text overridden by stored values
    pub fn attributes(&self, document: &Document) -> Attributes {
        let mut attributes = self.surrounding_attributes(document);
        for (key, value) in &self.stored {
            match value {
                Some(value) => {
                    attributes.insert(key.clone(), value.clone());
                }
                None => {
                    attributes.remove(key);
                }
            }
        }
        attributes
    }

    pub fn attribute(&self, document: &Document, key: &str) -> Option<Value> {
        self.attributes(document).remove(key)
    }

    pub fn has_attribute(&self, document: &Document, key: &str) -> bool {
        self.attribute(document, key).is_some()
    }

    fn surrounding_attributes(&self, document: &Document) -> Attributes {
        let Some(range) = self.first_range() else {
            return Attributes::new();
        };
        let tree = document.tree();

        if range.is_collapsed() {
            let position = &range.start;
            let text_attributes = |node: Option<NodeId>| {
                node.filter(|&id| tree.is_text(id))
                    .map(|id| tree.attributes(id).clone())
            };
            return text_attributes(document.text_node_at(position))
                .or_else(|| text_attributes(document.node_before(position)))
                .or_else(|| text_attributes(document.node_after(position)))
                .unwrap_or_default();
        }

        TreeWalker::new(document, WalkerOptions::items_of(range))
            .ok()
            .and_then(|mut walker| {
                walker.find_map(|value| match &value.item {
                    Item::Text(proxy) => Some(proxy.attributes(tree).clone()),
                    Item::Element(_) => None,
                })
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_utils::parse_into;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn document(data: &str) -> Document {
        let mut document = Document::new();
        document.create_root("main", "$root").unwrap();
        parse_into(&mut document, "main", data).unwrap();
        document
    }

    #[test]
    fn test_collapsed_attributes_come_from_text_before() {
        let doc = document("<paragraph>ab<$text bold=\"true\">cd</$text></paragraph>");
        let mut selection = DocumentSelection::default();

        selection.set_ranges(vec![Range::collapsed(pos(&[0, 4]))], false);
        assert!(selection.has_attribute(&doc, "bold"));

        selection.set_ranges(vec![Range::collapsed(pos(&[0, 2]))], false);
        assert!(!selection.has_attribute(&doc, "bold"));

        selection.set_ranges(vec![Range::collapsed(pos(&[0, 3]))], false);
        assert!(selection.has_attribute(&doc, "bold"));
    }

    #[test]
    fn test_stored_attributes_override_and_reset() {
        let doc = document("<paragraph>ab</paragraph>");
        let mut selection = DocumentSelection::default();
        selection.set_ranges(vec![Range::collapsed(pos(&[0, 1]))], false);

        selection.store_attribute("italic", Some(Value::Bool(true)));
        assert_eq!(selection.attribute(&doc, "italic"), Some(Value::Bool(true)));

        selection.replace_ranges(vec![Range::collapsed(pos(&[0, 2]))]);
        assert!(selection.has_attribute(&doc, "italic"));

        selection.set_ranges(vec![Range::collapsed(pos(&[0, 0]))], false);
        assert!(!selection.has_attribute(&doc, "italic"));
    }

    #[test]
    fn test_anchor_and_focus_follow_direction() {
        let mut selection = DocumentSelection::default();
        selection.set_ranges(vec![Range::new(pos(&[0, 1]), pos(&[0, 3]))], true);
        assert!(selection.is_backward());
        assert_eq!(selection.anchor().unwrap().path, vec![0, 3]);
        assert_eq!(selection.focus().unwrap().path, vec![0, 1]);
    }
}
