//! # Downcast writer
//!
//! The only way conversion changes the view. Beyond plain tree edits it
//! keeps attribute elements normalized:
//!
//! - inserting or removing content breaks attribute elements at the
//!   boundaries up to the closest container, so content never lands inside
//!   formatting it was not wrapped with
//! - after each change, similar attribute elements and text nodes that end
//!   up next to each other are merged
//! - wrapping nests attribute elements by priority: a lower priority element
//!   always ends up outside a higher priority one
//!
//! ```text
//! <p>f<strong>o{o</strong>b}ar</p>   wrap with <em>
//! <p>f<strong>o</strong><em><strong>o</strong>b</em>ar</p>
//! ```

use std::cmp::Ordering;

use serde_json::Value;
use tracing::trace;

use crate::errors::{ViewError, ViewResult};
use crate::node::{ElementCategory, ViewElement, ViewNodeId, ViewTree};
use crate::position::{ViewPosition, ViewRange, ViewSelection};

/// Name of the placeholder used while wrapping a collapsed position
const FAKE_ELEMENT: &str = "$wrap-position";

pub struct DowncastWriter<'a> {
    tree: &'a mut ViewTree,
    selection: &'a mut ViewSelection,
}

impl<'a> DowncastWriter<'a> {
    pub fn new(tree: &'a mut ViewTree, selection: &'a mut ViewSelection) -> Self {
        Self { tree, selection }
    }

    pub fn tree(&self) -> &ViewTree {
        self.tree
    }

    pub fn selection(&self) -> &ViewSelection {
        self.selection
    }

    pub fn create_container_element<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
    ) -> ViewNodeId {
        self.tree.create_element(name, ElementCategory::Container, attributes)
    }

    pub fn create_attribute_element<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
    ) -> ViewNodeId {
        self.tree.create_element(name, ElementCategory::Attribute, attributes)
    }

    /// Attribute element with an explicit priority and optional id
    pub fn create_attribute_element_with<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
        priority: i32,
        id: Option<&str>,
    ) -> ViewNodeId {
        let element = self.tree.create_element(name, ElementCategory::Attribute, attributes);
        if let Some(data) = self.tree.element_mut(element) {
            data.priority = priority;
            data.id = id.map(str::to_string);
        }
        element
    }

    pub fn create_empty_element<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
    ) -> ViewNodeId {
        self.tree.create_element(name, ElementCategory::Empty, attributes)
    }

    pub fn create_ui_element<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
        html: Option<&str>,
    ) -> ViewNodeId {
        let element = self.tree.create_element(name, ElementCategory::Ui, attributes);
        if let Some(data) = self.tree.element_mut(element) {
            data.html = html.map(str::to_string);
        }
        element
    }

    pub fn create_raw_element<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
        html: &str,
    ) -> ViewNodeId {
        let element = self.tree.create_element(name, ElementCategory::Raw, attributes);
        if let Some(data) = self.tree.element_mut(element) {
            data.html = Some(html.to_string());
        }
        element
    }

    pub fn create_editable_element<'k>(
        &mut self,
        name: &str,
        attributes: impl IntoIterator<Item = (&'k str, &'k str)>,
    ) -> ViewNodeId {
        let element = self.tree.create_element(name, ElementCategory::Editable, attributes);
        if let Some(data) = self.tree.element_mut(element) {
            data.attributes.insert("contenteditable".to_string(), "true".to_string());
        }
        element
    }

    /// Create an element from a prepared description of any category
    pub fn create_element(&mut self, element: ViewElement) -> ViewNodeId {
        self.tree.create(element)
    }

    pub fn create_text(&mut self, data: &str) -> ViewNodeId {
        self.tree.create_text(data)
    }

    pub fn create_fragment(&mut self) -> ViewNodeId {
        self.tree.create_fragment()
    }

    pub fn position_at(&self, parent: ViewNodeId, offset: usize) -> ViewResult<ViewPosition> {
        ViewPosition::at(self.tree, parent, offset)
    }

    pub fn position_before(&self, node: ViewNodeId) -> ViewResult<ViewPosition> {
        ViewPosition::before(self.tree, node)
    }

    pub fn position_after(&self, node: ViewNodeId) -> ViewResult<ViewPosition> {
        ViewPosition::after(self.tree, node)
    }

    pub fn range_on(&self, node: ViewNodeId) -> ViewResult<ViewRange> {
        ViewRange::on(self.tree, node)
    }

    pub fn range_in(&self, element: ViewNodeId) -> ViewRange {
        ViewRange::inside(self.tree, element)
    }

    pub fn set_attribute(&mut self, key: &str, value: &str, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            data.set_attribute(key, value);
        }
    }

    pub fn remove_attribute(&mut self, key: &str, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            data.remove_attribute(key);
        }
    }

    pub fn add_class(&mut self, class: &str, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            data.classes.extend(class.split_whitespace().map(str::to_string));
        }
    }

    pub fn remove_class(&mut self, class: &str, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            for name in class.split_whitespace() {
                data.classes.remove(name);
            }
        }
    }

    pub fn set_style(&mut self, property: &str, value: &str, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            data.styles.insert(property.to_string(), value.to_string());
        }
    }

    pub fn remove_style(&mut self, property: &str, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            data.styles.remove(property);
        }
    }

    pub fn set_custom_property(&mut self, key: &str, value: Value, element: ViewNodeId) {
        if let Some(data) = self.tree.element_mut(element) {
            data.custom_properties.insert(key.to_string(), value);
        }
    }

    pub fn set_selection(&mut self, ranges: Vec<ViewRange>, backward: bool) {
        self.selection.set(ranges, backward);
    }

    pub fn set_fake_selection(&mut self, ranges: Vec<ViewRange>, label: Option<&str>) {
        self.selection.set(ranges, false);
        self.selection.set_fake(label.map(str::to_string));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Insert nodes at a position, breaking attribute elements around it
    pub fn insert(&mut self, position: ViewPosition, nodes: Vec<ViewNodeId>) -> ViewResult<ViewRange> {
        let container = self.tree.container_of(position.parent);
        for &node in &nodes {
            let allowed_in_attribute = self.tree.is_text(node)
                || matches!(
                    self.tree.category(node),
                    Some(ElementCategory::Attribute | ElementCategory::Empty | ElementCategory::Ui | ElementCategory::Raw)
                );
            if self.tree.is_attribute_element(container) && !allowed_in_attribute {
                return Err(ViewError::InvalidInsert(node));
            }
        }

        let insertion = self.break_attributes(position, true)?;
        let length = nodes.len();
        self.tree.insert_children(insertion.parent, insertion.offset, nodes);
        let mut end = insertion.shifted(length);

        let start = self.merge_attributes(insertion)?;
        if length == 0 {
            return Ok(ViewRange::collapsed(start));
        }
        if start != insertion {
            end.offset -= 1;
        }
        let end = self.merge_attributes(end)?;
        Ok(ViewRange::new(start, end))
    }

    /// Remove the content of a range inside one container; returns the
    /// removed top-level nodes
    pub fn remove(&mut self, range: ViewRange) -> ViewResult<Vec<ViewNodeId>> {
        self.validate_container(&range)?;
        if range.is_collapsed() {
            return Ok(Vec::new());
        }
        let broken = self.break_attributes_range(range, true)?;
        let count = broken.end.offset - broken.start.offset;
        let removed = self
            .tree
            .remove_children(broken.start.parent, broken.start.offset, count);
        self.merge_attributes(broken.start)?;
        Ok(removed)
    }

    /// Remove a single node
    pub fn remove_node(&mut self, node: ViewNodeId) -> ViewResult<Vec<ViewNodeId>> {
        let range = self.range_on(node)?;
        self.remove(range)
    }

    pub fn move_range(&mut self, source: ViewRange, target: ViewPosition) -> ViewResult<ViewRange> {
        let nodes;
        let mut target = target;
        if target.compare(self.tree, &source.end) == Ordering::Greater {
            target = self.break_attributes(target, true)?;
            let parent = target.parent;
            let count_before = self.tree.child_count(parent);
            let source = self.break_attributes_range(source, true)?;
            nodes = self.remove(source)?;
            let count_after = self.tree.child_count(parent);
            target.offset = (target.offset + count_after).saturating_sub(count_before);
        } else {
            nodes = self.remove(source)?;
        }
        self.insert(target, nodes)
    }

    /// Replace an element with a new one of another name, keeping
    /// children and attributes
    pub fn rename(&mut self, new_name: &str, element: ViewNodeId) -> ViewResult<ViewNodeId> {
        let mut data: ViewElement = self
            .tree
            .element(element)
            .cloned()
            .ok_or(ViewError::NotAnAttributeElement("rename"))?;
        data.name = new_name.to_string();
        let renamed = self.tree.create(data);

        let position = self.position_before(element)?;
        let children = self.tree.children(element).to_vec();
        self.tree.insert_children(renamed, 0, children);
        self.tree.remove_node(element);
        self.tree.insert_children(position.parent, position.offset, vec![renamed]);
        Ok(renamed)
    }

    /// Wrap a range in an attribute element. A collapsed range creates an
    /// empty attribute element (or reuses a similar neighbour) and returns
    /// the position inside it.
    pub fn wrap(&mut self, range: ViewRange, attribute: ViewNodeId) -> ViewResult<ViewRange> {
        if !self.tree.is_attribute_element(attribute) {
            return Err(ViewError::NotAnAttributeElement("wrap"));
        }
        self.validate_container(&range)?;

        if range.is_collapsed() {
            let position = self.wrap_position(range.start, attribute)?;
            return Ok(ViewRange::collapsed(position));
        }

        let broken = self.break_attributes_range(range, true)?;
        let wrapped = self.wrap_children(broken.start.parent, broken.start.offset, broken.end.offset, attribute)?;
        let start = self.merge_attributes(wrapped.start)?;
        let mut end = wrapped.end;
        if start != wrapped.start {
            end.offset -= 1;
        }
        let end = self.merge_attributes(end)?;
        Ok(ViewRange::new(start, end))
    }

    fn wrap_position(&mut self, position: ViewPosition, attribute: ViewNodeId) -> ViewResult<ViewPosition> {
        if self.tree.is_similar(position.parent, attribute) {
            return Ok(self.move_into_text(position));
        }
        let position = if self.tree.is_text(position.parent) {
            self.break_text_node(position)?
        } else {
            position
        };

        let mut fake = ViewElement::new(FAKE_ELEMENT, ElementCategory::Attribute);
        fake.priority = i32::MAX;
        let fake = self.tree.create(fake);
        self.tree.insert_children(position.parent, position.offset, vec![fake]);
        self.wrap(ViewRange::new(position, position.shifted(1)), attribute)?;

        let at = ViewPosition::before(self.tree, fake)?;
        self.tree.remove_node(fake);

        match (at.node_before(self.tree), at.node_after(self.tree)) {
            (Some(before), Some(after)) if self.tree.is_text(before) && self.tree.is_text(after) => {
                Ok(self.merge_text_nodes(before, after))
            }
            _ => Ok(self.move_into_text(at)),
        }
    }

    fn wrap_children(
        &mut self,
        parent: ViewNodeId,
        start_offset: usize,
        end_offset: usize,
        wrapper: ViewNodeId,
    ) -> ViewResult<ViewRange> {
        let mut end_offset = end_offset;
        let mut wrap_positions: Vec<ViewPosition> = Vec::new();

        for i in start_offset..end_offset {
            let Some(&child) = self.tree.children(parent).get(i) else {
                break;
            };
            let is_attribute = self.tree.is_attribute_element(child);

            if is_attribute && self.tree.is_similar(child, wrapper) {
                wrap_positions.push(ViewPosition::new(parent, i));
            } else if !is_attribute || self.should_be_outside(wrapper, child) {
                let clone = self
                    .tree
                    .clone_element(wrapper)
                    .ok_or(ViewError::NotAnAttributeElement("wrap"))?;
                self.tree.remove_node(child);
                self.tree.append_child(clone, child);
                self.tree.insert_children(parent, i, vec![clone]);
                wrap_positions.push(ViewPosition::new(parent, i));
            } else {
                let count = self.tree.child_count(child);
                self.wrap_children(child, 0, count, wrapper)?;
            }
        }

        let mut offset_change = 0;
        for mut position in wrap_positions {
            position.offset -= offset_change;
            if position.offset == start_offset {
                continue;
            }
            let merged = self.merge_attributes(position)?;
            if merged != position {
                offset_change += 1;
                end_offset -= 1;
            }
        }

        Ok(ViewRange::new(
            ViewPosition::new(parent, start_offset),
            ViewPosition::new(parent, end_offset),
        ))
    }

    /// Lower priority goes outside; equal priorities order by identity
    fn should_be_outside(&self, a: ViewNodeId, b: ViewNodeId) -> bool {
        let (Some(a), Some(b)) = (self.tree.element(a), self.tree.element(b)) else {
            return false;
        };
        match a.priority.cmp(&b.priority) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a.identity() < b.identity(),
        }
    }

    /// Remove every attribute element similar to `attribute` from a range
    pub fn unwrap(&mut self, range: ViewRange, attribute: ViewNodeId) -> ViewResult<ViewRange> {
        if !self.tree.is_attribute_element(attribute) {
            return Err(ViewError::NotAnAttributeElement("unwrap"));
        }
        self.validate_container(&range)?;
        if range.is_collapsed() {
            return Ok(range);
        }

        let broken = self.break_attributes_range(range, true)?;
        let unwrapped = self.unwrap_children(broken.start.parent, broken.start.offset, broken.end.offset, attribute)?;
        let start = self.merge_attributes(unwrapped.start)?;
        let mut end = unwrapped.end;
        if start != unwrapped.start {
            end.offset -= 1;
        }
        let end = self.merge_attributes(end)?;
        Ok(ViewRange::new(start, end))
    }

    fn unwrap_children(
        &mut self,
        parent: ViewNodeId,
        start_offset: usize,
        end_offset: usize,
        attribute: ViewNodeId,
    ) -> ViewResult<ViewRange> {
        let mut end_offset = end_offset;
        let mut i = start_offset;
        let mut unwrap_positions: Vec<ViewPosition> = Vec::new();

        while i < end_offset {
            let Some(&child) = self.tree.children(parent).get(i) else {
                break;
            };
            if !self.tree.is_attribute_element(child) {
                i += 1;
                continue;
            }
            if self.tree.is_similar(child, attribute) {
                let children = self.tree.children(child).to_vec();
                let count = children.len();
                self.tree.remove_node(child);
                self.tree.insert_children(parent, i, children);
                unwrap_positions.push(ViewPosition::new(parent, i));
                unwrap_positions.push(ViewPosition::new(parent, i + count));
                i += count;
                end_offset = (end_offset + count).saturating_sub(1);
                continue;
            }
            let count = self.tree.child_count(child);
            self.unwrap_children(child, 0, count, attribute)?;
            i += 1;
        }

        let mut offset_change = 0;
        for mut position in unwrap_positions {
            position.offset -= offset_change;
            if position.offset == start_offset || position.offset == end_offset {
                continue;
            }
            let merged = self.merge_attributes(position)?;
            if merged != position {
                offset_change += 1;
                end_offset -= 1;
            }
        }

        Ok(ViewRange::new(
            ViewPosition::new(parent, start_offset),
            ViewPosition::new(parent, end_offset),
        ))
    }

    /// Split attribute elements (and a text node) at a position up to the
    /// closest container; returns the position in that container
    pub fn break_attributes(&mut self, position: ViewPosition, force_split_text: bool) -> ViewResult<ViewPosition> {
        let mut position = position;
        loop {
            let parent = position.parent;

            if self.tree.is_text(parent) {
                let text_parent = self.tree.parent(parent).ok_or(ViewError::NoParent(parent))?;
                if !force_split_text && self.is_container_or_fragment(text_parent) {
                    return Ok(position);
                }
                position = self.break_text_node(position)?;
                continue;
            }
            if self.is_container_or_fragment(parent) {
                return Ok(position);
            }
            if self.tree.category(parent).is_some_and(|category| category.is_leaf()) {
                return Err(ViewError::CannotBreakContainer);
            }

            let grand_parent = self.tree.parent(parent).ok_or(ViewError::NoParent(parent))?;
            let index = self.tree.index_in_parent(parent).ok_or(ViewError::NoParent(parent))?;
            let length = self.tree.child_count(parent);

            if position.offset == length {
                position = ViewPosition::new(grand_parent, index + 1);
            } else if position.offset == 0 {
                position = ViewPosition::new(grand_parent, index);
            } else {
                let clone = self
                    .tree
                    .clone_element(parent)
                    .ok_or(ViewError::CannotBreakContainer)?;
                self.tree.insert_children(grand_parent, index + 1, vec![clone]);
                let moved = self.tree.remove_children(parent, position.offset, length - position.offset);
                self.tree.insert_children(clone, 0, moved);
                position = ViewPosition::new(grand_parent, index + 1);
            }
        }
    }

    fn break_attributes_range(&mut self, range: ViewRange, force_split_text: bool) -> ViewResult<ViewRange> {
        self.validate_container(&range)?;
        if range.is_collapsed() {
            let position = self.break_attributes(range.start, force_split_text)?;
            return Ok(ViewRange::collapsed(position));
        }

        let mut end = self.break_attributes(range.end, force_split_text)?;
        let count = self.tree.child_count(end.parent);
        let start = self.break_attributes(range.start, force_split_text)?;
        end.offset += self.tree.child_count(end.parent) - count;
        Ok(ViewRange::new(start, end))
    }

    /// Merge similar attribute elements and texts meeting at a position.
    /// An empty attribute element holding the position is removed.
    pub fn merge_attributes(&mut self, position: ViewPosition) -> ViewResult<ViewPosition> {
        let parent = position.parent;
        if self.tree.is_text(parent) {
            return Ok(position);
        }

        if self.tree.is_attribute_element(parent) && self.tree.child_count(parent) == 0 {
            let grand_parent = self.tree.parent(parent).ok_or(ViewError::NoParent(parent))?;
            let index = self.tree.index_in_parent(parent).ok_or(ViewError::NoParent(parent))?;
            self.tree.remove_node(parent);
            return self.merge_attributes(ViewPosition::new(grand_parent, index));
        }

        let (Some(before), Some(after)) = (position.node_before(self.tree), position.node_after(self.tree)) else {
            return Ok(position);
        };

        if self.tree.is_text(before) && self.tree.is_text(after) {
            return Ok(self.merge_text_nodes(before, after));
        }
        if self.tree.is_similar(before, after) {
            let count = self.tree.child_count(before);
            let children = self.tree.children(after).to_vec();
            self.tree.insert_children(before, count, children);
            self.tree.remove_node(after);
            trace!(element = ?before, "merged attribute elements");
            return self.merge_attributes(ViewPosition::new(before, count));
        }
        Ok(position)
    }

    fn merge_text_nodes(&mut self, first: ViewNodeId, second: ViewNodeId) -> ViewPosition {
        let head = self.tree.text(first).unwrap_or_default().to_string();
        let tail = self.tree.text(second).unwrap_or_default();
        let offset = head.chars().count();
        let merged = head + tail;
        self.tree.set_text(first, merged);
        self.tree.remove_node(second);
        ViewPosition::new(first, offset)
    }

    /// Split a text node at a position inside it; returns the position
    /// between the parts in the text's parent
    fn break_text_node(&mut self, position: ViewPosition) -> ViewResult<ViewPosition> {
        let text = position.parent;
        let parent = self.tree.parent(text).ok_or(ViewError::NoParent(text))?;
        let index = self.tree.index_in_parent(text).ok_or(ViewError::NoParent(text))?;
        let data = self.tree.text(text).unwrap_or_default().to_string();
        let length = data.chars().count();

        if position.offset == 0 {
            return Ok(ViewPosition::new(parent, index));
        }
        if position.offset >= length {
            return Ok(ViewPosition::new(parent, index + 1));
        }

        let split_at = data
            .char_indices()
            .nth(position.offset)
            .map(|(byte, _)| byte)
            .unwrap_or(data.len());
        let (head, tail) = data.split_at(split_at);
        let tail = self.tree.create_text(tail);
        self.tree.set_text(text, head.to_string());
        self.tree.insert_children(parent, index + 1, vec![tail]);
        Ok(ViewPosition::new(parent, index + 1))
    }

    /// Prefer a position inside an adjacent text node over one between nodes
    fn move_into_text(&self, position: ViewPosition) -> ViewPosition {
        if let Some(before) = position.node_before(self.tree) {
            if let Some(text) = self.tree.text(before) {
                return ViewPosition::new(before, text.chars().count());
            }
        }
        if let Some(after) = position.node_after(self.tree) {
            if self.tree.is_text(after) {
                return ViewPosition::new(after, 0);
            }
        }
        position
    }

    fn is_container_or_fragment(&self, node: ViewNodeId) -> bool {
        self.tree.is_fragment(node)
            || self
                .tree
                .category(node)
                .is_some_and(|category| category.is_container_like())
    }

    fn validate_container(&self, range: &ViewRange) -> ViewResult<()> {
        let start = self.tree.container_of(range.start.parent);
        let end = self.tree.container_of(range.end.parent);
        if start != end {
            return Err(ViewError::RangeNotFlat);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_utils::stringify;

    struct Fixture {
        tree: ViewTree,
        selection: ViewSelection,
        p: ViewNodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tree = ViewTree::new();
            let p = tree.create_element("p", ElementCategory::Container, []);
            Self {
                tree,
                selection: ViewSelection::default(),
                p,
            }
        }

        fn writer(&mut self) -> DowncastWriter<'_> {
            DowncastWriter::new(&mut self.tree, &mut self.selection)
        }

        fn html(&self) -> String {
            stringify(&self.tree, self.p, &Default::default())
        }
    }

    #[test]
    fn test_insert_merges_texts() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let foo = writer.create_text("foo");
        writer.insert(ViewPosition::new(p, 0), vec![foo]).unwrap();
        let bar = writer.create_text("bar");
        let range = writer.insert(ViewPosition::new(foo, 3), vec![bar]).unwrap();

        assert_eq!(range.start, ViewPosition::new(foo, 3));
        assert_eq!(f.html(), "<p>foobar</p>");
        assert_eq!(f.tree.child_count(p), 1);
    }

    #[test]
    fn test_wrap_and_merge_neighbours() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let text = writer.create_text("foobar");
        writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();

        let strong = writer.create_attribute_element("strong", []);
        writer
            .wrap(ViewRange::new(ViewPosition::new(text, 1), ViewPosition::new(text, 3)), strong)
            .unwrap();
        assert_eq!(f.html(), "<p>f<strong>oo</strong>bar</p>");

        let mut writer = f.writer();
        let strong = writer.create_attribute_element("strong", []);
        writer
            .wrap(ViewRange::new(ViewPosition::new(p, 2), ViewPosition::new(p, 3)), strong)
            .unwrap();
        assert_eq!(f.html(), "<p>f<strong>oobar</strong></p>");
    }

    #[test]
    fn test_wrap_orders_by_priority() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let text = writer.create_text("abc");
        writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();

        let em = writer.create_attribute_element_with("em", [], 20, None);
        writer.wrap(ViewRange::inside(writer.tree(), p), em).unwrap();
        let link = writer.create_attribute_element_with("a", [("href", "x")], 5, None);
        writer.wrap(ViewRange::inside(writer.tree(), p), link).unwrap();

        assert_eq!(f.html(), "<p><a href=\"x\"><em>abc</em></a></p>");
    }

    #[test]
    fn test_unwrap_restores_text() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let text = writer.create_text("foobar");
        writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();
        let strong = writer.create_attribute_element("strong", []);
        writer
            .wrap(ViewRange::new(ViewPosition::new(text, 0), ViewPosition::new(text, 6)), strong)
            .unwrap();

        let strong = writer.create_attribute_element("strong", []);
        let inner = writer.tree().children(p)[0];
        let inner_text = writer.tree().children(inner)[0];
        writer
            .unwrap(
                ViewRange::new(ViewPosition::new(inner_text, 2), ViewPosition::new(inner_text, 4)),
                strong,
            )
            .unwrap();
        assert_eq!(f.html(), "<p><strong>fo</strong>ob<strong>ar</strong></p>");
    }

    #[test]
    fn test_insert_breaks_attribute_elements() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let text = writer.create_text("abcd");
        writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();
        let strong = writer.create_attribute_element("strong", []);
        writer.wrap(ViewRange::inside(writer.tree(), p), strong).unwrap();

        let strong_node = writer.tree().children(p)[0];
        let inner_text = writer.tree().children(strong_node)[0];
        let img = writer.create_empty_element("img", []);
        writer.insert(ViewPosition::new(inner_text, 2), vec![img]).unwrap();
        assert_eq!(f.html(), "<p><strong>ab</strong><img></img><strong>cd</strong></p>");

        let mut writer = f.writer();
        let img_range = writer.range_on(img).unwrap();
        writer.remove(img_range).unwrap();
        assert_eq!(f.html(), "<p><strong>abcd</strong></p>");
    }

    #[test]
    fn test_wrap_collapsed_position_creates_empty_element() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let text = writer.create_text("ab");
        writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();
        let strong = writer.create_attribute_element("strong", []);
        let range = writer.wrap(ViewRange::collapsed(ViewPosition::new(text, 1)), strong).unwrap();

        assert_eq!(f.html(), "<p>a<strong></strong>b</p>");
        let strong_node = f.tree.children(p)[1];
        assert_eq!(range.start, ViewPosition::new(strong_node, 0));

        let mut writer = f.writer();
        writer.merge_attributes(range.start).unwrap();
        assert_eq!(f.html(), "<p>ab</p>");
    }

    #[test]
    fn test_range_across_containers_is_rejected() {
        let mut f = Fixture::new();
        let p = f.p;
        let mut writer = f.writer();
        let other = writer.create_container_element("p", []);
        let err = writer
            .remove(ViewRange::new(ViewPosition::new(p, 0), ViewPosition::new(other, 0)))
            .unwrap_err();
        assert_eq!(err.code(), "view-writer-invalid-range-container");
    }
}
