//! # Schema
//!
//! Declares which elements may appear where and which attributes they may
//! carry. Item definitions reference each other (`allow_where`,
//! `allow_content_of`, `allow_attributes_of`, `inherit_all_from`); every
//! registration recompiles the definitions into flat rule sets so checks are
//! set lookups.
//!
//! A schema context is the list of element names from a root down to a
//! parent; a root's name in the context is its element name (`$root` by
//! default).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::{Document, GRAVEYARD};
use crate::errors::ModelResult;
use crate::node::TEXT_NAME;
use crate::position::Position;
use crate::range::Range;
use crate::selection::DocumentSelection;
use crate::tree::NodeId;
use crate::walker::{Item, TreeWalker, WalkerOptions};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaItemDefinition {
    pub allow_in: Vec<String>,
    pub allow_children: Vec<String>,
    pub allow_where: Vec<String>,
    pub allow_content_of: Vec<String>,
    pub allow_attributes: Vec<String>,
    pub allow_attributes_of: Vec<String>,
    pub inherit_all_from: Option<String>,
    pub is_block: bool,
    pub is_inline: bool,
    pub is_object: bool,
    pub is_limit: bool,
    pub is_content: bool,
}

impl SchemaItemDefinition {
    pub fn allow_in(mut self, parents: &[&str]) -> Self {
        self.allow_in.extend(parents.iter().map(|p| p.to_string()));
        self
    }

    pub fn allow_where(mut self, item: &str) -> Self {
        self.allow_where.push(item.to_string());
        self
    }

    pub fn allow_content_of(mut self, item: &str) -> Self {
        self.allow_content_of.push(item.to_string());
        self
    }

    pub fn allow_children(mut self, children: &[&str]) -> Self {
        self.allow_children.extend(children.iter().map(|c| c.to_string()));
        self
    }

    pub fn allow_attributes(mut self, keys: &[&str]) -> Self {
        self.allow_attributes.extend(keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn allow_attributes_of(mut self, item: &str) -> Self {
        self.allow_attributes_of.push(item.to_string());
        self
    }

    pub fn inherit_all_from(mut self, item: &str) -> Self {
        self.inherit_all_from = Some(item.to_string());
        self
    }

    pub fn block(mut self) -> Self {
        self.is_block = true;
        self
    }

    pub fn inline(mut self) -> Self {
        self.is_inline = true;
        self
    }

    pub fn object(mut self) -> Self {
        self.is_object = true;
        self
    }

    pub fn limit(mut self) -> Self {
        self.is_limit = true;
        self
    }

    pub fn content(mut self) -> Self {
        self.is_content = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct CompiledItem {
    allow_in: BTreeSet<String>,
    allow_attributes: BTreeSet<String>,
    is_block: bool,
    is_inline: bool,
    is_object: bool,
    is_limit: bool,
    is_content: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    definitions: BTreeMap<String, Vec<SchemaItemDefinition>>,
    compiled: BTreeMap<String, CompiledItem>,
}

impl Schema {
    /// Empty schema without base items
    pub fn empty() -> Self {
        Self::default()
    }

    /// Schema with the generic base items registered
    pub fn new() -> Self {
        let mut schema = Self::default();
        schema.register("$root", SchemaItemDefinition::default().limit());
        schema.register("$container", SchemaItemDefinition::default().allow_in(&["$root", "$container"]));
        schema.register(
            "$block",
            SchemaItemDefinition::default().allow_in(&["$root", "$container"]).block(),
        );
        schema.register(
            "$blockObject",
            SchemaItemDefinition::default().allow_where("$block").block().object(),
        );
        schema.register(
            "$inlineObject",
            SchemaItemDefinition::default()
                .allow_where("$text")
                .allow_attributes_of("$text")
                .inline()
                .object(),
        );
        schema.register(
            TEXT_NAME,
            SchemaItemDefinition::default().allow_in(&["$block"]).inline().content(),
        );
        schema.register(
            "$documentFragment",
            SchemaItemDefinition::default()
                .allow_content_of("$root")
                .allow_children(&[TEXT_NAME])
                .limit(),
        );
        schema
    }

    /// Register a new item. Registering an existing name extends it.
    pub fn register(&mut self, name: &str, definition: SchemaItemDefinition) {
        self.definitions.entry(name.to_string()).or_default().push(definition);
        self.compile();
    }

    pub fn extend(&mut self, name: &str, definition: SchemaItemDefinition) {
        self.register(name, definition);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.compiled.contains_key(name)
    }

    fn compile(&mut self) {
        // Base rules, with inherit_all_from expanded.
        let mut merged: BTreeMap<String, SchemaItemDefinition> = BTreeMap::new();
        for (name, definitions) in &self.definitions {
            let mut item = SchemaItemDefinition::default();
            for definition in definitions {
                item.allow_in.extend(definition.allow_in.iter().cloned());
                item.allow_children.extend(definition.allow_children.iter().cloned());
                item.allow_where.extend(definition.allow_where.iter().cloned());
                item.allow_content_of.extend(definition.allow_content_of.iter().cloned());
                item.allow_attributes.extend(definition.allow_attributes.iter().cloned());
                item.allow_attributes_of.extend(definition.allow_attributes_of.iter().cloned());
                item.is_block |= definition.is_block;
                item.is_inline |= definition.is_inline;
                item.is_object |= definition.is_object;
                item.is_limit |= definition.is_limit;
                item.is_content |= definition.is_content;
                if let Some(parent) = &definition.inherit_all_from {
                    item.allow_where.push(parent.clone());
                    item.allow_content_of.push(parent.clone());
                    item.allow_attributes_of.push(parent.clone());
                    item.inherit_all_from = Some(parent.clone());
                }
            }
            merged.insert(name.clone(), item);
        }

        let mut compiled: BTreeMap<String, CompiledItem> = merged
            .iter()
            .map(|(name, item)| {
                (
                    name.clone(),
                    CompiledItem {
                        allow_in: item.allow_in.iter().cloned().collect(),
                        allow_attributes: item.allow_attributes.iter().cloned().collect(),
                        is_block: item.is_block,
                        is_inline: item.is_inline,
                        is_object: item.is_object,
                        is_limit: item.is_limit,
                        is_content: item.is_content,
                    },
                )
            })
            .collect();

        // Type flags from inherit_all_from.
        for (name, item) in &merged {
            if let Some(parent) = &item.inherit_all_from {
                if let Some(source) = merged.get(parent) {
                    if let Some(target) = compiled.get_mut(name) {
                        target.is_block |= source.is_block;
                        target.is_inline |= source.is_inline;
                        target.is_object |= source.is_object;
                    }
                }
            }
        }

        for (name, item) in &merged {
            for child in &item.allow_children {
                if let Some(child_rules) = compiled.get_mut(child) {
                    child_rules.allow_in.insert(name.clone());
                }
            }
        }

        // Cross references settle in at most one pass per item.
        for _ in 0..=merged.len() {
            let mut changed = false;

            for (name, item) in &merged {
                for source in &item.allow_content_of {
                    let hosts: Vec<String> = compiled
                        .iter()
                        .filter(|(_, rules)| rules.allow_in.contains(source))
                        .map(|(host, _)| host.clone())
                        .collect();
                    for host in hosts {
                        if let Some(rules) = compiled.get_mut(&host) {
                            changed |= rules.allow_in.insert(name.clone());
                        }
                    }
                }

                for source in &item.allow_where {
                    let parents = compiled.get(source).map(|r| r.allow_in.clone()).unwrap_or_default();
                    if let Some(rules) = compiled.get_mut(name) {
                        for parent in parents {
                            changed |= rules.allow_in.insert(parent);
                        }
                    }
                }

                for source in &item.allow_attributes_of {
                    let attributes = compiled
                        .get(source)
                        .map(|r| r.allow_attributes.clone())
                        .unwrap_or_default();
                    if let Some(rules) = compiled.get_mut(name) {
                        for attribute in attributes {
                            changed |= rules.allow_attributes.insert(attribute);
                        }
                    }
                }
            }

            if !changed {
                break;
            }
        }

        self.compiled = compiled;
    }

    pub fn is_block(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|r| r.is_block)
    }

    pub fn is_inline(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|r| r.is_inline)
    }

    pub fn is_object(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|r| r.is_object)
    }

    /// Objects are limits too
    pub fn is_limit(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|r| r.is_limit || r.is_object)
    }

    pub fn is_content(&self, name: &str) -> bool {
        self.compiled.get(name).is_some_and(|r| r.is_content || r.is_object)
    }

    /// Whether `child` may be placed in the last item of `context`
    pub fn check_child(&self, context: &[String], child: &str) -> bool {
        let (Some(parent), Some(rules)) = (context.last(), self.compiled.get(child)) else {
            return false;
        };
        rules.allow_in.contains(parent)
    }

    pub fn check_attribute(&self, item: &str, key: &str) -> bool {
        self.compiled
            .get(item)
            .is_some_and(|rules| rules.allow_attributes.contains(key))
    }

    /// Context names from the root down to `node` (inclusive)
    pub fn context_of(&self, document: &Document, node: NodeId) -> Vec<String> {
        let tree = document.tree();
        let mut context: Vec<String> = tree
            .ancestors(node)
            .into_iter()
            .chain(std::iter::once(node))
            .map(|id| document.schema_name_of(id))
            .collect();
        if context.is_empty() {
            context.push(document.schema_name_of(node));
        }
        context
    }

    pub fn check_child_at(&self, document: &Document, position: &Position, child: &str) -> bool {
        match document.parent_of(position) {
            Ok(parent) => self.check_child(&self.context_of(document, parent), child),
            Err(_) => false,
        }
    }

    pub fn check_child_in(&self, document: &Document, parent: NodeId, child: &str) -> bool {
        self.check_child(&self.context_of(document, parent), child)
    }

    pub fn check_attribute_on(&self, document: &Document, item: &Item, key: &str) -> bool {
        self.check_attribute(item.name(document.tree()), key)
    }

    /// Closest ancestor of the position (inclusive of its parent) that
    /// accepts `child`, not crossing limit elements
    pub fn find_allowed_parent(&self, document: &Document, position: &Position, child: &str) -> Option<NodeId> {
        let mut parent = document.parent_of(position).ok()?;
        loop {
            if self.check_child_in(document, parent, child) {
                return Some(parent);
            }
            if self.is_limit(&document.schema_name_of(parent)) {
                return None;
            }
            parent = document.tree().parent(parent)?;
        }
    }

    /// Nearest common limit ancestor of the selection (or its root)
    pub fn get_limit_element(&self, document: &Document, selection: &DocumentSelection) -> Option<NodeId> {
        let mut element: Option<NodeId> = None;
        for range in selection.ranges() {
            let start = document.parent_of(&range.start).ok()?;
            let end = document.parent_of(&range.end).ok()?;
            let common = document.common_ancestor(start, end)?;
            let limit = self.closest_limit(document, common);
            element = match element {
                None => Some(limit),
                Some(current) => Some(self.closest_limit(document, document.common_ancestor(current, limit)?)),
            };
        }
        element
    }

    fn closest_limit(&self, document: &Document, node: NodeId) -> NodeId {
        let tree = document.tree();
        let mut current = node;
        loop {
            if self.is_limit(&document.schema_name_of(current)) {
                return current;
            }
            match tree.parent(current) {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Subranges where every item accepts the attribute
    pub fn get_valid_ranges(&self, document: &Document, ranges: &[Range], key: &str) -> ModelResult<Vec<Range>> {
        let mut valid = Vec::new();
        for range in ranges {
            for flat in range.minimal_flat_ranges(document)? {
                self.collect_valid_ranges(document, &flat, key, &mut valid)?;
            }
        }
        Ok(valid)
    }

    fn collect_valid_ranges(
        &self,
        document: &Document,
        range: &Range,
        key: &str,
        out: &mut Vec<Range>,
    ) -> ModelResult<()> {
        let mut start = range.start.clone();
        let mut end = range.start.clone();
        let mut nested: Vec<Range> = Vec::new();

        for value in TreeWalker::new(document, WalkerOptions::items_of(range).shallow())? {
            if let Item::Element(element) = &value.item {
                nested.push(document.range_in(*element)?);
            }
            if !self.check_attribute_on(document, &value.item, key) {
                if start != end {
                    out.push(Range::new(start.clone(), end.clone()));
                }
                start = value.next_position.clone();
            }
            end = value.next_position.clone();
        }
        if start != end {
            out.push(Range::new(start, end));
        }

        // Elements are walked shallowly; their content is checked on its own.
        for inner in nested {
            if !inner.is_collapsed() {
                self.collect_valid_ranges(document, &inner, key, out)?;
            }
        }
        Ok(())
    }

    /// Whether the selection (its caret context or any selected item) allows
    /// the attribute
    pub fn check_attribute_in_selection(&self, document: &Document, selection: &DocumentSelection, key: &str) -> bool {
        if selection.is_collapsed() {
            let Some(position) = selection.first_position() else {
                return false;
            };
            return self.check_child_at(document, position, TEXT_NAME) && self.check_attribute(TEXT_NAME, key);
        }

        selection.ranges().iter().any(|range| {
            TreeWalker::new(document, WalkerOptions::items_of(range))
                .map(|walker| walker.into_iter().any(|v| self.check_attribute_on(document, &v.item, key)))
                .unwrap_or(false)
        })
    }

    /// Whether the position sits in the graveyard
    pub fn is_in_graveyard(position: &Position) -> bool {
        position.root == GRAVEYARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        schema.register("blockQuote", SchemaItemDefinition::default().inherit_all_from("$container"));
        schema.register(
            "image",
            SchemaItemDefinition::default()
                .inherit_all_from("$inlineObject")
                .allow_attributes(&["src"]),
        );
        schema.extend(TEXT_NAME, SchemaItemDefinition::default().allow_attributes(&["bold"]));
        schema
    }

    #[test]
    fn test_inherit_all_from_block() {
        let schema = schema();
        assert!(schema.check_child(&context(&["$root"]), "paragraph"));
        assert!(schema.check_child(&context(&["$root", "paragraph"]), TEXT_NAME));
        assert!(!schema.check_child(&context(&["$root", "paragraph"]), "paragraph"));
        assert!(schema.is_block("paragraph"));
    }

    #[test]
    fn test_allow_where_follows_containers() {
        let schema = schema();
        assert!(schema.check_child(&context(&["$root", "blockQuote"]), "paragraph"));
        assert!(schema.check_child(&context(&["$root", "blockQuote"]), "blockQuote"));
        assert!(!schema.check_child(&context(&["$root"]), TEXT_NAME));
    }

    #[test]
    fn test_inline_objects_and_attributes() {
        let schema = schema();
        assert!(schema.check_child(&context(&["$root", "paragraph"]), "image"));
        assert!(schema.is_object("image"));
        assert!(schema.is_limit("image"));
        assert!(schema.check_attribute("image", "src"));
        // Attributes of $text are inherited through $inlineObject.
        assert!(schema.check_attribute("image", "bold"));
        assert!(!schema.check_attribute("paragraph", "bold"));
    }

    #[test]
    fn test_document_fragment_accepts_root_content_and_text() {
        let schema = schema();
        assert!(schema.check_child(&context(&["$documentFragment"]), "paragraph"));
        assert!(schema.check_child(&context(&["$documentFragment"]), TEXT_NAME));
    }
}
