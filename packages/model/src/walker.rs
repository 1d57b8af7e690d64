//! Lazy forward iteration over a document subtree.
//!
//! The walker yields element starts, element ends and text proxies in tree
//! order. It holds only a position and a parent handle, so it is cheap to
//! re-create from the same range.

use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use crate::node::{Attributes, TEXT_NAME};
use crate::position::Position;
use crate::range::Range;
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerValueType {
    ElementStart,
    ElementEnd,
    Text,
}

/// A part of a text node, possibly the whole node
#[derive(Debug, Clone, PartialEq)]
pub struct TextProxy {
    pub text_node: NodeId,
    pub offset_in_text: usize,
    pub data: String,
}

impl TextProxy {
    pub fn len(&self) -> usize {
        self.data.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn attributes<'t>(&self, tree: &'t Tree) -> &'t Attributes {
        tree.attributes(self.text_node)
    }

    /// Offset of the proxy start in the text node's parent
    pub fn start_offset(&self, tree: &Tree) -> usize {
        tree.start_offset(self.text_node).unwrap_or(0) + self.offset_in_text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Element(NodeId),
    Text(TextProxy),
}

impl Item {
    pub fn name<'t>(&self, tree: &'t Tree) -> &'t str {
        match self {
            Item::Element(id) => tree.item_name(*id),
            Item::Text(_) => TEXT_NAME,
        }
    }

    pub fn attributes<'t>(&self, tree: &'t Tree) -> &'t Attributes {
        match self {
            Item::Element(id) => tree.attributes(*id),
            Item::Text(proxy) => proxy.attributes(tree),
        }
    }

    pub fn offset_size(&self) -> usize {
        match self {
            Item::Element(_) => 1,
            Item::Text(proxy) => proxy.len(),
        }
    }

    pub fn as_element(&self) -> Option<NodeId> {
        match self {
            Item::Element(id) => Some(*id),
            Item::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkerValue {
    pub kind: WalkerValueType,
    pub item: Item,
    pub previous_position: Position,
    pub next_position: Position,
    pub length: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WalkerOptions {
    pub boundaries: Option<Range>,
    pub start_position: Option<Position>,
    /// Yield one proxy per character
    pub single_characters: bool,
    /// Do not enter elements
    pub shallow: bool,
    pub ignore_element_end: bool,
}

impl WalkerOptions {
    pub fn within(range: &Range) -> Self {
        Self {
            boundaries: Some(range.clone()),
            ..Self::default()
        }
    }

    pub fn items_of(range: &Range) -> Self {
        Self {
            boundaries: Some(range.clone()),
            ignore_element_end: true,
            ..Self::default()
        }
    }

    pub fn shallow(mut self) -> Self {
        self.shallow = true;
        self
    }
}

pub struct TreeWalker<'a> {
    document: &'a Document,
    options: WalkerOptions,
    position: Position,
    parent: Option<NodeId>,
    boundary_end_parent: Option<NodeId>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(document: &'a Document, options: WalkerOptions) -> ModelResult<Self> {
        let start = options
            .start_position
            .clone()
            .or_else(|| options.boundaries.as_ref().map(|b| b.start.clone()))
            .ok_or_else(|| ModelError::InvalidPath {
                root: String::new(),
                path: Vec::new(),
            })?;

        let parent = document.parent_of(&start)?;
        let boundary_end_parent = match &options.boundaries {
            Some(boundaries) => Some(document.parent_of(&boundaries.end)?),
            None => None,
        };

        Ok(Self {
            document,
            options,
            position: start,
            parent: Some(parent),
            boundary_end_parent,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    fn reached_end(&self, parent: NodeId, offset: usize) -> bool {
        match &self.options.boundaries {
            Some(boundaries) => self.boundary_end_parent == Some(parent) && offset >= boundaries.end.offset(),
            None => false,
        }
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = WalkerValue;

    fn next(&mut self) -> Option<WalkerValue> {
        let document = self.document;
        let tree = document.tree();

        loop {
            let parent = self.parent?;
            let offset = self.position.offset();
            let previous_position = self.position.clone();

            if self.reached_end(parent, offset) {
                self.parent = None;
                return None;
            }

            let node = tree
                .text_node_at(parent, offset)
                .or_else(|| tree.node_after(parent, offset));

            match node {
                Some(node) if tree.is_element(node) => {
                    if self.options.shallow {
                        self.position.set_offset(offset + 1);
                        let past_end = self
                            .options
                            .boundaries
                            .as_ref()
                            .is_some_and(|b| b.end.is_before(&self.position));
                        if past_end {
                            self.parent = None;
                            return None;
                        }
                    } else {
                        self.position.path.push(0);
                        self.parent = Some(node);
                    }
                    return Some(WalkerValue {
                        kind: WalkerValueType::ElementStart,
                        item: Item::Element(node),
                        previous_position,
                        next_position: self.position.clone(),
                        length: 1,
                    });
                }
                Some(node) => {
                    let node_start = tree.start_offset(node).unwrap_or(0);
                    let mut end = if self.options.single_characters {
                        offset + 1
                    } else {
                        node_start + tree.offset_size(node)
                    };
                    if let Some(boundaries) = &self.options.boundaries {
                        if self.boundary_end_parent == Some(parent) && boundaries.end.offset() < end {
                            end = boundaries.end.offset();
                        }
                    }

                    let offset_in_text = offset - node_start;
                    let length = end - offset;
                    let data: String = tree
                        .text(node)
                        .unwrap_or_default()
                        .chars()
                        .skip(offset_in_text)
                        .take(length)
                        .collect();

                    self.position.set_offset(end);
                    return Some(WalkerValue {
                        kind: WalkerValueType::Text,
                        item: Item::Text(TextProxy {
                            text_node: node,
                            offset_in_text,
                            data,
                        }),
                        previous_position,
                        next_position: self.position.clone(),
                        length,
                    });
                }
                None => {
                    // End of the parent: leave it, or stop at the end of a root.
                    let Some(grand_parent) = tree.parent(parent) else {
                        self.parent = None;
                        return None;
                    };
                    self.position.path.pop();
                    let parent_offset = self.position.offset();
                    self.position.set_offset(parent_offset + 1);
                    self.parent = Some(grand_parent);

                    if self.options.ignore_element_end {
                        continue;
                    }
                    return Some(WalkerValue {
                        kind: WalkerValueType::ElementEnd,
                        item: Item::Element(parent),
                        previous_position,
                        next_position: self.position.clone(),
                        length: 0,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_utils::parse_into;

    fn document(data: &str) -> Document {
        let mut document = Document::new();
        document.create_root("main", "$root").unwrap();
        parse_into(&mut document, "main", data).unwrap();
        document
    }

    fn describe(document: &Document, options: WalkerOptions) -> Vec<String> {
        let tree = document.tree();
        TreeWalker::new(document, options)
            .unwrap()
            .map(|value| match (value.kind, &value.item) {
                (WalkerValueType::ElementStart, item) => format!("<{}>", item.name(tree)),
                (WalkerValueType::ElementEnd, item) => format!("</{}>", item.name(tree)),
                (WalkerValueType::Text, Item::Text(proxy)) => proxy.data.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_walks_whole_root() {
        let doc = document("<paragraph>foo<$text bold=\"true\">bar</$text></paragraph><paragraph></paragraph>");
        let range = doc.range_in_root("main").unwrap();
        assert_eq!(
            describe(&doc, WalkerOptions::within(&range)),
            vec!["<paragraph>", "foo", "bar", "</paragraph>", "<paragraph>", "</paragraph>"]
        );
    }

    #[test]
    fn test_range_inside_one_text_yields_substring() {
        let doc = document("<paragraph>abcdef</paragraph>");
        let range = Range::new(Position::new("main", vec![0, 1]), Position::new("main", vec![0, 4]));
        assert_eq!(describe(&doc, WalkerOptions::within(&range)), vec!["bcd"]);
    }

    #[test]
    fn test_shallow_single_characters_and_ignore_end() {
        let doc = document("<paragraph>ab</paragraph><paragraph>c</paragraph>");
        let range = doc.range_in_root("main").unwrap();
        assert_eq!(
            describe(&doc, WalkerOptions::within(&range).shallow()),
            vec!["<paragraph>", "<paragraph>"]
        );

        let options = WalkerOptions {
            single_characters: true,
            ..WalkerOptions::items_of(&range)
        };
        assert_eq!(describe(&doc, options), vec!["<paragraph>", "a", "b", "<paragraph>", "c"]);
    }

    #[test]
    fn test_walker_is_restartable() {
        let doc = document("<paragraph>ab</paragraph>");
        let range = doc.range_in_root("main").unwrap();
        let first = describe(&doc, WalkerOptions::within(&range));
        let second = describe(&doc, WalkerOptions::within(&range));
        assert_eq!(first, second);
    }
}
