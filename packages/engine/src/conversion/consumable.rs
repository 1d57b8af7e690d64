//! Consumables record which parts of the input a converter has already
//! handled, so two converters never convert the same thing.

use std::collections::{BTreeMap, BTreeSet};

use folio_model::{Item, NodeId};
use folio_view::{MatchResult, ViewNodeId, ViewTree};

/// Identity of a model item in the model consumable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsumableItem {
    Element(NodeId),
    /// Part of a text node, by character offsets
    Text { node: NodeId, start: usize, end: usize },
    /// The document selection (for selection attributes)
    Selection,
    /// A marker range, by marker name
    Marker(String),
}

impl From<&Item> for ConsumableItem {
    fn from(item: &Item) -> Self {
        match item {
            Item::Element(id) => ConsumableItem::Element(*id),
            Item::Text(proxy) => ConsumableItem::Text {
                node: proxy.text_node,
                start: proxy.offset_in_text,
                end: proxy.offset_in_text + proxy.len(),
            },
        }
    }
}

/// Model side: `(item, type)` pairs such as `(paragraph, "insert")` or
/// `(text, "attribute:bold")`
#[derive(Debug, Clone, Default)]
pub struct ModelConsumable {
    values: BTreeMap<(ConsumableItem, String), bool>,
}

impl ModelConsumable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: impl Into<ConsumableItem>, kind: &str) {
        self.values.insert((item.into(), kind.to_string()), true);
    }

    /// Consume a pair; false when it was never added or is already consumed
    pub fn consume(&mut self, item: impl Into<ConsumableItem>, kind: &str) -> bool {
        match self.values.get_mut(&(item.into(), kind.to_string())) {
            Some(available) if *available => {
                *available = false;
                true
            }
            _ => false,
        }
    }

    /// `None` when the pair was never added
    pub fn test(&self, item: impl Into<ConsumableItem>, kind: &str) -> Option<bool> {
        self.values.get(&(item.into(), kind.to_string())).copied()
    }

    pub fn revert(&mut self, item: impl Into<ConsumableItem>, kind: &str) -> Option<bool> {
        let value = self.values.get_mut(&(item.into(), kind.to_string()))?;
        let was_consumed = !*value;
        *value = true;
        Some(was_consumed)
    }
}

impl From<Item> for ConsumableItem {
    fn from(item: Item) -> Self {
        ConsumableItem::from(&item)
    }
}

#[derive(Debug, Clone, Default)]
struct ElementConsumables {
    name: bool,
    attributes: BTreeSet<String>,
    classes: BTreeSet<String>,
    styles: BTreeSet<String>,
}

/// View side: per element, its name and each attribute, class and style
#[derive(Debug, Clone, Default)]
pub struct ViewConsumable {
    items: BTreeMap<ViewNodeId, ElementConsumables>,
}

impl ViewConsumable {
    /// Everything in a subtree, the root included
    pub fn from_tree(tree: &ViewTree, root: ViewNodeId) -> Self {
        let mut consumable = Self::default();
        for node in std::iter::once(root).chain(tree.descendants(root)) {
            let mut entry = ElementConsumables {
                name: true,
                ..ElementConsumables::default()
            };
            if let Some(element) = tree.element(node) {
                entry.attributes = element.attributes.keys().cloned().collect();
                entry.classes = element.classes.iter().cloned().collect();
                entry.styles = element.styles.keys().cloned().collect();
            }
            consumable.items.insert(node, entry);
        }
        consumable
    }

    /// Whether every part of a match is still available
    pub fn test(&self, node: ViewNodeId, parts: &MatchResult) -> bool {
        let Some(entry) = self.items.get(&node) else {
            return false;
        };
        (!parts.name || entry.name)
            && parts.attributes.iter().all(|key| entry.attributes.contains(key))
            && parts.classes.iter().all(|class| entry.classes.contains(class))
            && parts.styles.iter().all(|style| entry.styles.contains(style))
    }

    pub fn consume(&mut self, node: ViewNodeId, parts: &MatchResult) -> bool {
        if !self.test(node, parts) {
            return false;
        }
        let Some(entry) = self.items.get_mut(&node) else {
            return false;
        };
        if parts.name {
            entry.name = false;
        }
        for key in &parts.attributes {
            entry.attributes.remove(key);
        }
        for class in &parts.classes {
            entry.classes.remove(class);
        }
        for style in &parts.styles {
            entry.styles.remove(style);
        }
        true
    }

    pub fn test_name(&self, node: ViewNodeId) -> bool {
        self.items.get(&node).is_some_and(|entry| entry.name)
    }

    pub fn consume_name(&mut self, node: ViewNodeId) -> bool {
        match self.items.get_mut(&node) {
            Some(entry) if entry.name => {
                entry.name = false;
                true
            }
            _ => false,
        }
    }
}
