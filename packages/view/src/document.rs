//! The editing view document: the view tree with its named root editables
//! and the view selection.

use std::collections::BTreeMap;

use crate::errors::{ViewError, ViewResult};
use crate::node::{ElementCategory, ViewNodeId, ViewTree};
use crate::position::ViewSelection;

#[derive(Debug, Clone, Default)]
pub struct ViewDocument {
    pub tree: ViewTree,
    pub selection: ViewSelection,
    roots: BTreeMap<String, ViewNodeId>,
    root_order: Vec<String>,
    pub is_read_only: bool,
    pub is_focused: bool,
}

impl ViewDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the root editable for a model root
    pub fn create_root(&mut self, name: &str, element_name: &str) -> ViewResult<ViewNodeId> {
        if self.roots.contains_key(name) {
            return Err(ViewError::DuplicateRoot(name.to_string()));
        }
        let root = self.tree.create_element(element_name, ElementCategory::Root, []);
        if let Some(element) = self.tree.element_mut(root) {
            element.attributes.insert("contenteditable".to_string(), "true".to_string());
        }
        self.roots.insert(name.to_string(), root);
        self.root_order.push(name.to_string());
        Ok(root)
    }

    pub fn root(&self, name: &str) -> Option<ViewNodeId> {
        self.roots.get(name).copied()
    }

    pub fn get_root(&self, name: &str) -> ViewResult<ViewNodeId> {
        self.root(name).ok_or_else(|| ViewError::RootNotFound(name.to_string()))
    }

    pub fn root_names(&self) -> &[String] {
        &self.root_order
    }

    pub fn root_name_of(&self, node: ViewNodeId) -> Option<&str> {
        let root = self.tree.root_of(node);
        self.roots
            .iter()
            .find(|(_, id)| **id == root)
            .map(|(name, _)| name.as_str())
    }

    pub fn remove_root(&mut self, name: &str) -> ViewResult<ViewNodeId> {
        let root = self
            .roots
            .remove(name)
            .ok_or_else(|| ViewError::RootNotFound(name.to_string()))?;
        self.root_order.retain(|root_name| root_name != name);
        Ok(root)
    }
}
