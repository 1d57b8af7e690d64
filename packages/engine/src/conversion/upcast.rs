//! # Upcast dispatcher
//!
//! Converts a view fragment into model nodes, top-down.
//!
//! ## Design
//!
//! Conversion happens in a scratch model whose root stands for the place the
//! result will go, so the schema can be checked while converting:
//!
//! ```text
//! view fragment ──► element:<name> / text / documentFragment events
//!                       │
//!                       ▼
//!                scratch model root ($root context) ──► Vec<Node>
//! ```
//!
//! An element converter claims its view element through the
//! [`ViewConsumable`], inserts a model element with [`UpcastApi::safe_insert`]
//! and converts the children inside it. When the schema does not allow the
//! element at the cursor, `safe_insert` splits ancestors up to the closest
//! one that does. Parts created by splitting are tracked so a converter can
//! report the whole result ([`UpcastApi::get_split_parts`]), and the ones
//! left empty are removed when conversion ends.
//!
//! Text and inline content not allowed where it lands is wrapped in an
//! automatic paragraph. Consecutive automatic paragraphs share one element.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use folio_model::content::DEFAULT_PARAGRAPH;
use folio_model::{
    Attributes, BatchType, Model, ModelError, Node, NodeId, Position, Range, Schema, Value, Writer, GRAVEYARD, TEXT_NAME,
};
use folio_view::{is_block_element, ViewNodeId, ViewTree};
use tracing::{debug, trace};

use super::consumable::ViewConsumable;
use super::{ListenerList, Priority};
use crate::config::UnknownContentPolicy;
use crate::errors::EngineResult;

/// Name of the scratch root conversion happens in
pub const FRAGMENT_ROOT: &str = "$fragment";

/// Model element keeping unknown block markup
pub const HTML_ELEMENT: &str = "htmlElement";

/// Input and output of one upcast event
#[derive(Debug, Clone, PartialEq)]
pub struct UpcastData {
    pub view_item: ViewNodeId,
    /// Where the converted content goes; converters move it past their result
    pub model_cursor: Position,
    /// What the converter produced, if anything
    pub model_range: Option<Range>,
}

pub type UpcastHandler = Rc<dyn Fn(&mut UpcastData, &mut UpcastApi<'_, '_>) -> EngineResult<()>>;

pub struct UpcastApi<'a, 'w> {
    pub view: &'a ViewTree,
    pub writer: &'a mut Writer<'w>,
    pub consumable: ViewConsumable,
    dispatcher: &'a UpcastDispatcher,
    split_parts: HashMap<NodeId, Vec<NodeId>>,
    cursor_parents: HashMap<NodeId, NodeId>,
    auto_paragraphs: BTreeSet<NodeId>,
}

impl<'a, 'w> UpcastApi<'a, 'w> {
    fn new(view: &'a ViewTree, writer: &'a mut Writer<'w>, consumable: ViewConsumable, dispatcher: &'a UpcastDispatcher) -> Self {
        Self {
            view,
            writer,
            consumable,
            dispatcher,
            split_parts: HashMap::new(),
            cursor_parents: HashMap::new(),
            auto_paragraphs: BTreeSet::new(),
        }
    }

    /// Fire the event for one view node; returns the produced range and
    /// the cursor after it
    pub fn convert_item(&mut self, item: ViewNodeId, cursor: &Position) -> EngineResult<(Option<Range>, Position)> {
        let mut data = UpcastData {
            view_item: item,
            model_cursor: cursor.clone(),
            model_range: None,
        };
        let event = if self.view.is_fragment(item) {
            "documentFragment".to_string()
        } else if self.view.is_text(item) {
            "text".to_string()
        } else {
            format!("element:{}", self.view.name(item).unwrap_or_default())
        };

        let dispatcher = self.dispatcher;
        dispatcher.fire(&event, &mut data, self)?;
        Ok((data.model_range, data.model_cursor))
    }

    /// Convert the children of a view element one after another
    pub fn convert_children(&mut self, element: ViewNodeId, cursor: &Position) -> EngineResult<(Range, Position)> {
        let start = cursor.clone();
        let mut next = cursor.clone();
        let mut end = cursor.clone();
        for child in self.view.children(element).to_vec() {
            let (range, cursor) = self.convert_item(child, &next)?;
            if let Some(range) = range {
                end = range.end;
                next = cursor;
            }
        }
        Ok((Range::new(start, end), next))
    }

    /// Insert an element, splitting ancestors or wrapping it in a paragraph
    /// when the schema asks for it. `None` when it fits nowhere.
    pub fn safe_insert(&mut self, node: Node, position: &Position) -> EngineResult<Option<NodeId>> {
        let name = node.name().to_string();
        let (position, cursor_parent) = match self.split_to_allowed_parent(&name, position)? {
            Some(split) => split,
            None if self.is_paragraphable(position, &name) => (self.wrap_in_paragraph(position)?.0, None),
            None => {
                debug!(element = %name, "no allowed parent, element dropped");
                return Ok(None);
            }
        };

        let range = self.writer.insert(vec![node], &position)?;
        let element = self
            .writer
            .document()
            .node_after(&range.start)
            .ok_or(ModelError::NotAnElement)?;
        if let Some(parent) = cursor_parent {
            self.cursor_parents.insert(element, parent);
        }
        Ok(Some(element))
    }

    /// Position where `name` may be inserted, splitting the cursor's
    /// ancestors when needed. The second value is the element conversion
    /// continues in after a split.
    pub fn split_to_allowed_parent(
        &mut self,
        name: &str,
        position: &Position,
    ) -> EngineResult<Option<(Position, Option<NodeId>)>> {
        let document = self.writer.document();
        let Some(allowed) = self.writer.schema().find_allowed_parent(document, position, name) else {
            return Ok(None);
        };
        if document.parent_of(position)? == allowed {
            return Ok(Some((position.clone(), None)));
        }

        let split = self.writer.split(position, Some(allowed))?;
        let document = self.writer.document();
        let tree = document.tree();
        let mut original = document.parent_of(&split.range.start)?;
        let mut pairs = Vec::new();
        loop {
            let after = document.position_after(original)?;
            if let Some(copy) = document.node_after(&after) {
                pairs.push((original, copy));
            }
            match tree.parent(original) {
                Some(parent) if parent != allowed => original = parent,
                _ => break,
            }
        }
        let cursor_parent = document.parent_of(&split.range.end)?;

        for (original, copy) in pairs {
            self.register_split_pair(original, copy);
        }
        trace!(element = name, "split to allowed parent");
        Ok(Some((split.position, Some(cursor_parent))))
    }

    fn register_split_pair(&mut self, original: NodeId, copy: NodeId) {
        let mut parts = self.get_split_parts(original);
        parts.push(copy);
        for &part in &parts {
            self.split_parts.insert(part, parts.clone());
        }
    }

    /// Every element an element was split into, the element first
    pub fn get_split_parts(&self, element: NodeId) -> Vec<NodeId> {
        self.split_parts
            .get(&element)
            .cloned()
            .unwrap_or_else(|| vec![element])
    }

    /// Point `data` at a converted element (all its split parts) and at the
    /// cursor conversion continues from
    pub fn update_conversion_result(&self, element: NodeId, data: &mut UpcastData) -> EngineResult<()> {
        let document = self.writer.document();
        let parts = self.get_split_parts(element);
        let first = parts.first().copied().unwrap_or(element);
        let last = parts.last().copied().unwrap_or(element);
        let range = Range::new(document.position_before(first)?, document.position_after(last)?);

        data.model_cursor = match self.cursor_parents.get(&element) {
            Some(&parent) => document.position_at(parent, 0)?,
            None => range.end.clone(),
        };
        data.model_range = Some(range);
        Ok(())
    }

    /// Whether `name` could go into a paragraph placed at the position
    pub fn is_paragraphable(&self, position: &Position, name: &str) -> bool {
        let document = self.writer.document();
        let schema = self.writer.schema();
        if !schema.is_registered(DEFAULT_PARAGRAPH) {
            return false;
        }
        let Ok(parent) = document.parent_of(position) else {
            return false;
        };
        let mut context = schema.context_of(document, parent);
        if !schema.check_child(&context, DEFAULT_PARAGRAPH) {
            return false;
        }
        context.push(DEFAULT_PARAGRAPH.to_string());
        schema.check_child(&context, name)
    }

    /// Position inside an automatic paragraph at the position; reuses the
    /// one right before it
    fn wrap_in_paragraph(&mut self, position: &Position) -> EngineResult<(Position, NodeId)> {
        let document = self.writer.document();
        if let Some(before) = document.node_before(position) {
            if self.auto_paragraphs.contains(&before) {
                return Ok((document.position_at_end(before)?, before));
            }
        }
        let paragraph = self
            .writer
            .insert_element(DEFAULT_PARAGRAPH, Attributes::new(), position)?;
        self.auto_paragraphs.insert(paragraph);
        Ok((self.writer.document().position_at(paragraph, 0)?, paragraph))
    }

    /// Insert text at the cursor, in an automatic paragraph if needed
    pub fn insert_text(&mut self, text: &str, cursor: &Position) -> EngineResult<Option<(Range, Position)>> {
        let document = self.writer.document();
        if self.writer.schema().check_child_at(document, cursor, TEXT_NAME) {
            let range = self.writer.insert_text(text, Attributes::new(), cursor)?;
            let next = range.end.clone();
            return Ok(Some((range, next)));
        }
        if text.trim().is_empty() || !self.is_paragraphable(cursor, TEXT_NAME) {
            return Ok(None);
        }

        let (inside, paragraph) = self.wrap_in_paragraph(cursor)?;
        let range = self.writer.insert_text(text, Attributes::new(), &inside)?;
        let next = self.writer.document().position_after(paragraph)?;
        Ok(Some((range, next)))
    }

    fn remove_empty_split_parts(&mut self) -> EngineResult<()> {
        let candidates: BTreeSet<NodeId> = self.split_parts.keys().copied().collect();
        loop {
            let document = self.writer.document();
            let tree = document.tree();
            let empty: Vec<NodeId> = candidates
                .iter()
                .copied()
                .filter(|&node| tree.is_element(node) && tree.is_empty(node))
                .filter(|&node| document.root_name_of(node).is_some_and(|root| root != GRAVEYARD))
                .filter(|&node| !document.is_root(node))
                .collect();
            if empty.is_empty() {
                return Ok(());
            }
            for node in empty {
                self.writer.remove_node(node)?;
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct UpcastDispatcher {
    listeners: ListenerList<UpcastHandler>,
}

impl fmt::Debug for UpcastDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpcastDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl UpcastDispatcher {
    /// Dispatcher with the fragment and text converters
    pub fn new() -> Self {
        let mut dispatcher = Self::default();
        dispatcher.on("documentFragment", Priority::LOWEST, convert_fragment);
        dispatcher.on("text", Priority::LOWEST, convert_text);
        dispatcher
    }

    pub fn on(
        &mut self,
        event: &str,
        priority: Priority,
        handler: impl Fn(&mut UpcastData, &mut UpcastApi<'_, '_>) -> EngineResult<()> + 'static,
    ) {
        self.listeners.add(event, priority, Rc::new(handler));
    }

    pub(crate) fn add_handler(&mut self, event: &str, priority: Priority, handler: UpcastHandler) {
        self.listeners.add(event, priority, handler);
    }

    /// Register what happens to elements no converter claimed
    pub fn handle_unknown_content(&mut self, policy: UnknownContentPolicy) {
        self.on("element", Priority::LOWEST, move |data, api| convert_unknown(policy, data, api));
    }

    pub fn fire(&self, name: &str, data: &mut UpcastData, api: &mut UpcastApi<'_, '_>) -> EngineResult<()> {
        trace!(event = name, "upcast");
        for handler in self.listeners.matching(name) {
            handler(data, api)?;
        }
        Ok(())
    }

    /// Convert a view node into model nodes that fit into an element named
    /// `context` (usually `$root`)
    pub fn convert(&self, view: &ViewTree, node: ViewNodeId, schema: &Schema, context: &str) -> EngineResult<Vec<Node>> {
        let mut model = Model::with_schema(schema.clone());
        model.document_mut().create_root(FRAGMENT_ROOT, context)?;

        let mut failure = None;
        model.change_with(BatchType::not_undoable(), |writer| {
            let consumable = ViewConsumable::from_tree(view, node);
            let mut api = UpcastApi::new(view, writer, consumable, self);
            let start = Position::new(FRAGMENT_ROOT, vec![0]);
            let result = api
                .convert_item(node, &start)
                .and_then(|_| api.remove_empty_split_parts());
            if let Err(err) = result {
                failure = Some(err);
            }
            Ok(())
        })?;
        if let Some(err) = failure {
            return Err(err);
        }

        let document = model.document();
        let root = document.get_root(FRAGMENT_ROOT)?;
        let tree = document.tree();
        let nodes: Vec<Node> = tree.children(root).iter().map(|&child| tree.to_node(child)).collect();
        debug!(nodes = nodes.len(), "view upcast");
        Ok(nodes)
    }
}

fn convert_fragment(data: &mut UpcastData, api: &mut UpcastApi<'_, '_>) -> EngineResult<()> {
    if data.model_range.is_some() {
        return Ok(());
    }
    let (range, cursor) = api.convert_children(data.view_item, &data.model_cursor)?;
    data.model_range = Some(range);
    data.model_cursor = cursor;
    Ok(())
}

fn convert_text(data: &mut UpcastData, api: &mut UpcastApi<'_, '_>) -> EngineResult<()> {
    if data.model_range.is_some() || !api.consumable.test_name(data.view_item) {
        return Ok(());
    }
    let Some(text) = api.view.text(data.view_item).filter(|text| !text.is_empty()) else {
        return Ok(());
    };
    if let Some((range, cursor)) = api.insert_text(text, &data.model_cursor)? {
        api.consumable.consume_name(data.view_item);
        data.model_range = Some(range);
        data.model_cursor = cursor;
    }
    Ok(())
}

fn convert_unknown(policy: UnknownContentPolicy, data: &mut UpcastData, api: &mut UpcastApi<'_, '_>) -> EngineResult<()> {
    let item = data.view_item;
    if !api.consumable.test_name(item) {
        return Ok(());
    }
    if data.model_range.is_some() {
        api.consumable.consume_name(item);
        return Ok(());
    }
    let view = api.view;
    let Some(element) = view.element(item) else {
        return Ok(());
    };
    trace!(element = %element.name, ?policy, "unknown view element");

    match policy {
        UnknownContentPolicy::Drop => {
            api.consumable.consume_name(item);
        }
        UnknownContentPolicy::Preserve if is_block_element(&element.name) => {
            let attributes: serde_json::Map<String, Value> = element
                .all_attributes()
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            let node = Node::element(HTML_ELEMENT)
                .with_attribute("htmlName", element.name.clone())
                .with_attribute("htmlAttributes", Value::Object(attributes));
            let Some(model_element) = api.safe_insert(node, &data.model_cursor)? else {
                return Ok(());
            };
            api.consumable.consume_name(item);
            let inside = api.writer.document().position_at(model_element, 0)?;
            api.convert_children(item, &inside)?;
            api.update_conversion_result(model_element, data)?;
        }
        UnknownContentPolicy::Unwrap | UnknownContentPolicy::Preserve => {
            api.consumable.consume_name(item);
            let (range, cursor) = api.convert_children(item, &data.model_cursor)?;
            data.model_range = Some(range);
            data.model_cursor = cursor;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::dev_utils::stringify_nodes;
    use folio_model::SchemaItemDefinition;
    use folio_view::{DataProcessor, HtmlDataProcessor, MatcherPattern};

    use crate::conversion::UpcastHelpers;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        schema.register(
            "blockQuote",
            SchemaItemDefinition::default().allow_where("$container").allow_content_of("$root"),
        );
        schema.register(
            HTML_ELEMENT,
            SchemaItemDefinition::default()
                .allow_where("$block")
                .allow_content_of("$root")
                .allow_attributes(&["htmlName", "htmlAttributes"]),
        );
        schema
    }

    fn dispatcher(policy: UnknownContentPolicy) -> UpcastDispatcher {
        let mut dispatcher = UpcastDispatcher::new();
        dispatcher.handle_unknown_content(policy);
        let mut helpers = UpcastHelpers::new(&mut dispatcher);
        helpers.element_to_element(MatcherPattern::name("p"), "paragraph");
        helpers.element_to_element(MatcherPattern::name("blockquote"), "blockQuote");
        dispatcher
    }

    fn upcast(dispatcher: &UpcastDispatcher, html: &str) -> String {
        let mut tree = ViewTree::new();
        let fragment = HtmlDataProcessor::new().to_view(&mut tree, html).unwrap();
        let nodes = dispatcher.convert(&tree, fragment, &schema(), "$root").unwrap();
        stringify_nodes(&nodes)
    }

    #[test]
    fn test_text_outside_blocks_is_auto_paragraphed() {
        let dispatcher = dispatcher(UnknownContentPolicy::Unwrap);
        assert_eq!(
            upcast(&dispatcher, "foo<p>bar</p>baz"),
            "<paragraph>foo</paragraph><paragraph>bar</paragraph><paragraph>baz</paragraph>"
        );
    }

    #[test]
    fn test_consecutive_inline_content_shares_a_paragraph() {
        let dispatcher = dispatcher(UnknownContentPolicy::Unwrap);
        assert_eq!(upcast(&dispatcher, "foo<span>bar</span>"), "<paragraph>foobar</paragraph>");
    }

    #[test]
    fn test_block_inside_paragraph_splits_it() {
        let dispatcher = dispatcher(UnknownContentPolicy::Unwrap);
        assert_eq!(
            upcast(&dispatcher, "<p>foo<blockquote><p>bar</p></blockquote>baz</p>"),
            "<paragraph>foo</paragraph><blockQuote><paragraph>bar</paragraph></blockQuote><paragraph>baz</paragraph>"
        );
    }

    #[test]
    fn test_empty_split_parts_are_removed() {
        let dispatcher = dispatcher(UnknownContentPolicy::Unwrap);
        assert_eq!(
            upcast(&dispatcher, "<p><blockquote><p>bar</p></blockquote></p>"),
            "<blockQuote><paragraph>bar</paragraph></blockQuote>"
        );
    }

    #[test]
    fn test_unknown_content_policies() {
        let html = "<p>a</p><section><p>b</p></section>";

        let dropped = dispatcher(UnknownContentPolicy::Drop);
        assert_eq!(upcast(&dropped, html), "<paragraph>a</paragraph>");

        let unwrapped = dispatcher(UnknownContentPolicy::Unwrap);
        assert_eq!(upcast(&unwrapped, html), "<paragraph>a</paragraph><paragraph>b</paragraph>");

        let preserved = dispatcher(UnknownContentPolicy::Preserve);
        let model = upcast(&preserved, html);
        assert!(model.starts_with("<paragraph>a</paragraph><htmlElement"));
        assert!(model.contains("htmlName=\"section\""));
        assert!(model.ends_with("<paragraph>b</paragraph></htmlElement>"));
    }
}
