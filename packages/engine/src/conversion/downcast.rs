//! # Downcast dispatcher
//!
//! Replays model changes on a view tree by firing events that converters
//! listen to.
//!
//! ## Events
//!
//! - `insert:<name>` for every item of inserted content, elements before
//!   their children
//! - `attribute:<key>:<name>` for every attribute of inserted items and for
//!   attribute changes; `<name>` is `$text` for the selection too
//! - `remove:<name>` for removed content
//! - `addMarker:<name>` / `removeMarker:<name>` for marker ranges
//!
//! Before anything is fired for a change, every `(item, event)` pair it
//! covers is added to the [`ModelConsumable`]. A converter consumes the pair
//! it handles, so a more specific converter registered with higher priority
//! keeps the generic one from converting the same item again.

use std::fmt;
use std::rc::Rc;

use folio_model::{
    ChangeSet, DiffEntry, Document, Item, NodeId, Position, Range, Schema, TreeWalker, Value, WalkerOptions, GRAVEYARD,
};
use folio_view::{DowncastWriter, ViewNodeId, ViewPosition, ViewRange};
use tracing::{debug, trace};

use super::consumable::{ConsumableItem, ModelConsumable};
use super::mapper::Mapper;
use super::{ListenerList, Priority};
use crate::errors::EngineResult;

/// What an attribute event is about
#[derive(Debug, Clone, PartialEq)]
pub enum DowncastItem {
    Item(Item),
    /// The collapsed document selection; converted at the view caret
    Selection,
}

impl From<&DowncastItem> for ConsumableItem {
    fn from(item: &DowncastItem) -> Self {
        match item {
            DowncastItem::Item(item) => ConsumableItem::from(item),
            DowncastItem::Selection => ConsumableItem::Selection,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DowncastEvent {
    Insert {
        item: Item,
        range: Range,
    },
    Remove {
        parent: NodeId,
        position: Position,
        length: usize,
        name: String,
    },
    Attribute {
        item: DowncastItem,
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    AddMarker {
        marker_name: String,
        range: Range,
    },
    RemoveMarker {
        marker_name: String,
        range: Range,
    },
}

pub type DowncastHandler = Rc<dyn Fn(&DowncastEvent, &mut DowncastApi<'_>) -> EngineResult<()>>;

/// Everything a downcast converter works with
pub struct DowncastApi<'a> {
    pub document: &'a Document,
    pub schema: &'a Schema,
    pub writer: DowncastWriter<'a>,
    pub mapper: &'a mut Mapper,
    pub consumable: ModelConsumable,
    /// Converting for the data pipeline rather than the editing view
    pub is_data: bool,
    selection_caret: Option<ViewPosition>,
}

impl<'a> DowncastApi<'a> {
    pub fn new(
        document: &'a Document,
        schema: &'a Schema,
        writer: DowncastWriter<'a>,
        mapper: &'a mut Mapper,
        is_data: bool,
    ) -> Self {
        Self {
            document,
            schema,
            writer,
            mapper,
            consumable: ModelConsumable::new(),
            is_data,
            selection_caret: None,
        }
    }

    pub fn to_view_position(&self, position: &Position) -> EngineResult<ViewPosition> {
        self.mapper.to_view_position(self.document, self.writer.tree(), position)
    }

    pub fn to_view_range(&self, range: &Range) -> EngineResult<ViewRange> {
        self.mapper.to_view_range(self.document, self.writer.tree(), range)
    }

    pub fn view_element(&self, model: NodeId) -> Option<ViewNodeId> {
        self.mapper.to_view_element(model)
    }

    /// Where the collapsed selection is being converted
    pub fn selection_caret(&self) -> Option<ViewPosition> {
        self.selection_caret
    }

    pub fn set_selection_caret(&mut self, caret: ViewPosition) {
        self.selection_caret = Some(caret);
    }
}

#[derive(Clone, Default)]
pub struct DowncastDispatcher {
    listeners: ListenerList<DowncastHandler>,
}

impl fmt::Debug for DowncastDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DowncastDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl DowncastDispatcher {
    /// Dispatcher with the text insertion and removal converters every
    /// pipeline needs
    pub fn new() -> Self {
        let mut dispatcher = Self::default();
        dispatcher.on("insert:$text", Priority::LOWEST, insert_text);
        dispatcher.on("remove", Priority::LOW, remove_content);
        dispatcher
    }

    pub fn on(
        &mut self,
        event: &str,
        priority: Priority,
        handler: impl Fn(&DowncastEvent, &mut DowncastApi<'_>) -> EngineResult<()> + 'static,
    ) {
        self.listeners.add(event, priority, Rc::new(handler));
    }

    pub(crate) fn add_handler(&mut self, event: &str, priority: Priority, handler: DowncastHandler) {
        self.listeners.add(event, priority, handler);
    }

    pub fn fire(&self, name: &str, event: &DowncastEvent, api: &mut DowncastApi<'_>) -> EngineResult<()> {
        trace!(event = name, "downcast");
        for handler in self.listeners.matching(name) {
            handler(event, api)?;
        }
        Ok(())
    }

    /// Convert everything the differ buffered
    pub fn convert_changes(&self, changes: &ChangeSet, api: &mut DowncastApi<'_>) -> EngineResult<()> {
        for (name, range) in &changes.markers_to_remove {
            self.convert_marker_remove(name, range, api)?;
        }

        for entry in &changes.changes {
            if api.mapper.to_view_element(entry.parent()).is_none() {
                trace!(entry = entry.type_name(), "change in unconverted parent skipped");
                continue;
            }
            match entry {
                DiffEntry::Insert { position, length, .. } => {
                    self.convert_insert(&Range::from_position_and_shift(position, *length), api)?;
                }
                DiffEntry::Remove {
                    parent,
                    position,
                    length,
                    name,
                } => {
                    let event = DowncastEvent::Remove {
                        parent: *parent,
                        position: position.clone(),
                        length: *length,
                        name: name.clone(),
                    };
                    self.fire(&format!("remove:{name}"), &event, api)?;
                }
                DiffEntry::Attribute {
                    range,
                    key,
                    old_value,
                    new_value,
                    ..
                } => {
                    self.convert_attribute(range, key, old_value, new_value, api)?;
                }
            }
        }

        for (name, range) in &changes.markers_to_add {
            self.convert_marker_add(name, range, api)?;
        }
        debug!(
            changes = changes.changes.len(),
            markers = changes.markers_to_add.len(),
            "changes converted"
        );
        Ok(())
    }

    /// Convert content of the current model found in a range
    pub fn convert_insert(&self, range: &Range, api: &mut DowncastApi<'_>) -> EngineResult<()> {
        let document = api.document;
        let tree = document.tree();
        let mut items = Vec::new();
        for value in TreeWalker::new(document, WalkerOptions::items_of(range))? {
            let item_range = match &value.item {
                Item::Element(element) => document.range_on(*element)?,
                Item::Text(_) => Range::new(value.previous_position.clone(), value.next_position.clone()),
            };
            items.push((value.item, item_range));
        }

        for (item, _) in &items {
            api.consumable.add(item, "insert");
            for key in item.attributes(tree).keys() {
                api.consumable.add(item, &format!("attribute:{key}"));
            }
        }

        for (item, item_range) in items {
            let name = item.name(tree);
            let event = DowncastEvent::Insert {
                item: item.clone(),
                range: item_range.clone(),
            };
            self.fire(&format!("insert:{name}"), &event, api)?;

            for (key, value) in item.attributes(tree) {
                let event = DowncastEvent::Attribute {
                    item: DowncastItem::Item(item.clone()),
                    range: item_range.clone(),
                    key: key.clone(),
                    old_value: None,
                    new_value: Some(value.clone()),
                };
                self.fire(&format!("attribute:{key}:{name}"), &event, api)?;
            }
        }
        Ok(())
    }

    fn convert_attribute(
        &self,
        range: &Range,
        key: &str,
        old_value: &Option<Value>,
        new_value: &Option<Value>,
        api: &mut DowncastApi<'_>,
    ) -> EngineResult<()> {
        let document = api.document;
        let mut items = Vec::new();
        for value in TreeWalker::new(document, WalkerOptions::items_of(range).shallow())? {
            let item_range = Range::new(value.previous_position.clone(), value.next_position.clone());
            items.push((value.item, item_range));
        }

        let kind = format!("attribute:{key}");
        for (item, _) in &items {
            api.consumable.add(item, &kind);
        }
        for (item, item_range) in items {
            let name = item.name(document.tree());
            let event = DowncastEvent::Attribute {
                item: DowncastItem::Item(item.clone()),
                range: item_range,
                key: key.to_string(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            };
            self.fire(&format!("attribute:{key}:{name}"), &event, api)?;
        }
        Ok(())
    }

    fn convert_marker_add(&self, name: &str, range: &Range, api: &mut DowncastApi<'_>) -> EngineResult<()> {
        if !is_convertible_marker_range(api, range) {
            return Ok(());
        }
        let kind = format!("addMarker:{name}");
        api.consumable.add(ConsumableItem::Marker(name.to_string()), &kind);
        let event = DowncastEvent::AddMarker {
            marker_name: name.to_string(),
            range: range.clone(),
        };
        self.fire(&kind, &event, api)
    }

    fn convert_marker_remove(&self, name: &str, range: &Range, api: &mut DowncastApi<'_>) -> EngineResult<()> {
        if !is_convertible_marker_range(api, range) {
            return Ok(());
        }
        let kind = format!("removeMarker:{name}");
        api.consumable.add(ConsumableItem::Marker(name.to_string()), &kind);
        let event = DowncastEvent::RemoveMarker {
            marker_name: name.to_string(),
            range: range.clone(),
        };
        self.fire(&kind, &event, api)
    }

    /// Convert the document selection into the view selection. A collapsed
    /// selection breaks attribute elements at the caret so selection
    /// attributes can wrap it in fresh ones.
    pub fn convert_selection(&self, api: &mut DowncastApi<'_>) -> EngineResult<()> {
        let selection = api.document.selection();
        if selection.range_count() == 0 || selection.is_in_graveyard() {
            api.writer.clear_selection();
            return Ok(());
        }

        if !selection.is_collapsed() {
            let ranges = selection
                .ranges()
                .iter()
                .map(|range| api.to_view_range(range))
                .collect::<EngineResult<Vec<_>>>()?;
            api.writer.set_selection(ranges, selection.is_backward());
            return Ok(());
        }

        let Some(position) = selection.first_position().cloned() else {
            return Ok(());
        };
        let view_position = api.to_view_position(&position)?;
        let caret = api.writer.break_attributes(view_position, false)?;
        api.set_selection_caret(caret);

        for (key, value) in selection.attributes(api.document) {
            let kind = format!("attribute:{key}");
            api.consumable.add(ConsumableItem::Selection, &kind);
            let event = DowncastEvent::Attribute {
                item: DowncastItem::Selection,
                range: Range::collapsed(position.clone()),
                key: key.clone(),
                old_value: None,
                new_value: Some(value),
            };
            self.fire(&format!("attribute:{key}:$text"), &event, api)?;
        }

        let caret = api.selection_caret().unwrap_or(caret);
        api.writer.set_selection(vec![ViewRange::collapsed(caret)], false);
        Ok(())
    }
}

fn is_convertible_marker_range(api: &DowncastApi<'_>, range: &Range) -> bool {
    let root = range.root();
    root != GRAVEYARD
        && api
            .document
            .root(root)
            .is_some_and(|root| api.mapper.to_view_element(root).is_some())
}

fn insert_text(event: &DowncastEvent, api: &mut DowncastApi<'_>) -> EngineResult<()> {
    let DowncastEvent::Insert { item, range } = event else {
        return Ok(());
    };
    let Item::Text(proxy) = item else {
        return Ok(());
    };
    if !api.consumable.consume(item, "insert") {
        return Ok(());
    }
    let position = api.to_view_position(&range.start)?;
    let text = api.writer.create_text(&proxy.data);
    api.writer.insert(position, vec![text])?;
    Ok(())
}

fn remove_content(event: &DowncastEvent, api: &mut DowncastApi<'_>) -> EngineResult<()> {
    let DowncastEvent::Remove {
        parent,
        position,
        length,
        ..
    } = event
    else {
        return Ok(());
    };
    let Some(view_parent) = api.mapper.to_view_element(*parent) else {
        return Ok(());
    };
    let offset = position.offset();
    let start = api.mapper.find_position_in(api.writer.tree(), view_parent, offset)?;
    let end = api
        .mapper
        .find_position_in(api.writer.tree(), view_parent, offset + length)?;

    let removed = api.writer.remove(ViewRange::new(start, end))?;
    for node in removed {
        api.mapper.unbind_view_element(api.writer.tree(), node);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use folio_model::dev_utils::set_data;
    use folio_model::{Model, SchemaItemDefinition};
    use folio_view::dev_utils::{stringify, StringifyOptions};
    use folio_view::{ViewSelection, ViewTree};

    fn model(data: &str) -> Model {
        let mut model = Model::new();
        model
            .schema_mut()
            .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
        model.schema_mut().extend("$text", SchemaItemDefinition::default().allow_attributes(&["bold"]));
        model.document_mut().create_root("main", "$root").unwrap();
        set_data(&mut model, "main", data).unwrap();
        model.flush_changes();
        model
    }

    fn paragraph_dispatcher() -> DowncastDispatcher {
        let mut dispatcher = DowncastDispatcher::new();
        dispatcher.on("insert:paragraph", Priority::NORMAL, |event, api| {
            let DowncastEvent::Insert { item, range } = event else {
                return Ok(());
            };
            if !api.consumable.consume(item, "insert") {
                return Ok(());
            }
            let position = api.to_view_position(&range.start)?;
            let p = api.writer.create_container_element("p", []);
            if let Some(element) = item.as_element() {
                api.mapper.bind_elements(element, p);
            }
            api.writer.insert(position, vec![p])?;
            Ok(())
        });
        dispatcher
    }

    struct Fixture {
        tree: ViewTree,
        selection: ViewSelection,
        root: ViewNodeId,
        mapper: Mapper,
    }

    impl Fixture {
        fn new(model: &Model) -> Self {
            let mut tree = ViewTree::new();
            let root = tree.create_fragment();
            let mut mapper = Mapper::new();
            mapper.bind_elements(model.document().get_root("main").unwrap(), root);
            Self {
                tree,
                selection: ViewSelection::default(),
                root,
                mapper,
            }
        }

        fn run(&mut self, model: &Model, block: impl FnOnce(&mut DowncastApi<'_>) -> EngineResult<()>) {
            let writer = DowncastWriter::new(&mut self.tree, &mut self.selection);
            let mut api = DowncastApi::new(model.document(), model.schema(), writer, &mut self.mapper, false);
            block(&mut api).unwrap();
        }

        fn html(&self) -> String {
            stringify(&self.tree, self.root, &StringifyOptions::default())
        }
    }

    #[test]
    fn test_insert_converts_elements_then_text() {
        let model = model("<paragraph>foo</paragraph><paragraph>bar</paragraph>");
        let dispatcher = paragraph_dispatcher();
        let mut fixture = Fixture::new(&model);
        let range = model.document().range_in_root("main").unwrap();

        fixture.run(&model, |api| dispatcher.convert_insert(&range, api));
        assert_eq!(fixture.html(), "<p>foo</p><p>bar</p>");
    }

    #[test]
    fn test_changes_replayed_on_view() {
        let mut model = model("<paragraph>foo</paragraph><paragraph>bar</paragraph>");
        let dispatcher = paragraph_dispatcher();
        let mut fixture = Fixture::new(&model);
        let range = model.document().range_in_root("main").unwrap();
        fixture.run(&model, |api| dispatcher.convert_insert(&range, api));

        model
            .change(|writer| {
                writer.insert_text("x", Default::default(), &Position::new("main", vec![0, 1]))?;
                let root = writer.document().get_root("main")?;
                let second = writer.document().tree().children(root)[1];
                writer.remove_node(second)
            })
            .unwrap();
        let changes = model.flush_changes();
        fixture.run(&model, |api| dispatcher.convert_changes(&changes, api));
        assert_eq!(fixture.html(), "<p>fxoo</p>");
    }

    #[test]
    fn test_consumed_items_are_converted_once() {
        let model = model("<paragraph>foo</paragraph>");
        let mut dispatcher = paragraph_dispatcher();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        dispatcher.on("insert", Priority::LOWEST, move |event, api| {
            if let DowncastEvent::Insert { item, .. } = event {
                log.borrow_mut().push(api.consumable.test(item, "insert"));
            }
            Ok(())
        });

        let mut fixture = Fixture::new(&model);
        let range = model.document().range_in_root("main").unwrap();
        fixture.run(&model, |api| dispatcher.convert_insert(&range, api));

        // Both the paragraph and its text were consumed by earlier listeners.
        assert_eq!(*seen.borrow(), vec![Some(false), Some(false)]);
    }
}
