//! Converter builders for the common model/view pairings.
//!
//! ```rust,ignore
//! conversion.for_downcast().attribute_to_element("bold", |_| Some("strong".into()));
//! conversion.for_upcast().element_to_attribute(MatcherPattern::name("strong"), "bold", |_| Value::Bool(true));
//! ```

use std::collections::BTreeMap;
use std::rc::Rc;

use folio_model::{Attributes, Item, Node, Range, TreeWalker, Value, WalkerOptions, Writer};
use folio_view::{
    DowncastWriter, ElementCategory, MatchResult, Matcher, MatcherPattern, ValuePattern, ViewElement, ViewNodeId,
    ViewRange, DEFAULT_PRIORITY,
};

use super::consumable::ConsumableItem;
use super::downcast::{DowncastApi, DowncastDispatcher, DowncastEvent, DowncastHandler, DowncastItem};
use super::upcast::{UpcastApi, UpcastData, UpcastDispatcher, UpcastHandler};
use super::Priority;
use crate::errors::EngineResult;

/// View element description used by downcast helpers and as an upcast
/// pattern
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementDefinition {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: Vec<String>,
    pub styles: BTreeMap<String, String>,
    pub priority: Option<i32>,
}

impl ElementDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn to_view_element(&self, category: ElementCategory) -> ViewElement {
        let mut element = ViewElement::new(self.name.clone(), category);
        element.attributes = self.attributes.clone();
        element.classes = self.classes.iter().cloned().collect();
        element.styles = self.styles.clone();
        element.priority = self.priority.unwrap_or(DEFAULT_PRIORITY);
        element
    }

    /// Pattern matching elements this definition would create
    pub fn matcher_pattern(&self) -> MatcherPattern {
        let mut pattern = MatcherPattern::name(&self.name);
        for (key, value) in &self.attributes {
            pattern = pattern.with_attribute(key, ValuePattern::from(value.as_str()));
        }
        for class in &self.classes {
            pattern = pattern.with_class(class);
        }
        for (property, value) in &self.styles {
            pattern = pattern.with_style(property, ValuePattern::from(value.as_str()));
        }
        pattern
    }
}

impl From<&str> for ElementDefinition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One attribute, class or style of a view element
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAttribute {
    Attribute(String, String),
    Class(String),
    Style(String, String),
}

impl ViewAttribute {
    fn set(&self, writer: &mut DowncastWriter<'_>, element: ViewNodeId) {
        match self {
            ViewAttribute::Attribute(key, value) => writer.set_attribute(key, value, element),
            ViewAttribute::Class(class) => writer.add_class(class, element),
            ViewAttribute::Style(property, value) => writer.set_style(property, value, element),
        }
    }

    fn remove(&self, writer: &mut DowncastWriter<'_>, element: ViewNodeId) {
        match self {
            ViewAttribute::Attribute(key, _) => writer.remove_attribute(key, element),
            ViewAttribute::Class(class) => writer.remove_class(class, element),
            ViewAttribute::Style(property, _) => writer.remove_style(property, element),
        }
    }
}

/// How marker ranges show up in the editing view
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightDescriptor {
    pub classes: Vec<String>,
    pub priority: i32,
}

impl HighlightDescriptor {
    pub fn new(class: &str) -> Self {
        Self {
            classes: vec![class.to_string()],
            priority: DEFAULT_PRIORITY,
        }
    }

    fn view_element(&self, marker_name: &str) -> ViewElement {
        let mut element = ViewElement::new("span", ElementCategory::Attribute);
        element.classes = self.classes.iter().cloned().collect();
        element.priority = self.priority;
        element.id = Some(marker_name.to_string());
        element
    }
}

pub struct DowncastHelpers<'a> {
    dispatchers: Vec<&'a mut DowncastDispatcher>,
}

impl<'a> DowncastHelpers<'a> {
    pub fn new(dispatchers: Vec<&'a mut DowncastDispatcher>) -> Self {
        Self { dispatchers }
    }

    fn add(&mut self, event: &str, priority: Priority, handler: DowncastHandler) {
        for dispatcher in self.dispatchers.iter_mut() {
            dispatcher.add_handler(event, priority, handler.clone());
        }
    }

    /// Model element to a container element
    pub fn element_to_element(&mut self, model: &str, view: impl Into<ElementDefinition>) -> &mut Self {
        let definition = view.into();
        self.element_to_element_with(model, move |_, writer| {
            writer.create_element(definition.to_view_element(ElementCategory::Container))
        })
    }

    /// Model element to whatever view element `creator` makes from its
    /// attributes
    pub fn element_to_element_with(
        &mut self,
        model: &str,
        creator: impl Fn(&Attributes, &mut DowncastWriter<'_>) -> ViewNodeId + 'static,
    ) -> &mut Self {
        let handler: DowncastHandler = Rc::new(move |event, api| {
            let DowncastEvent::Insert { item, range } = event else {
                return Ok(());
            };
            let Some(element) = item.as_element() else {
                return Ok(());
            };
            if !api.consumable.consume(item, "insert") {
                return Ok(());
            }
            let position = api.to_view_position(&range.start)?;
            let attributes = api.document.tree().attributes(element);
            let view_element = creator(attributes, &mut api.writer);
            api.mapper.bind_elements(element, view_element);
            api.writer.insert(position, vec![view_element])?;
            Ok(())
        });
        self.add(&format!("insert:{model}"), Priority::NORMAL, handler);
        self
    }

    /// Model attribute on text to an attribute element wrapping it.
    /// `view` returns `None` for values that have no view.
    pub fn attribute_to_element(
        &mut self,
        key: &str,
        view: impl Fn(&Value) -> Option<ElementDefinition> + 'static,
    ) -> &mut Self {
        let handler: DowncastHandler = Rc::new(move |event, api| {
            let DowncastEvent::Attribute {
                item,
                range,
                key,
                old_value,
                new_value,
            } = event
            else {
                return Ok(());
            };
            let old = old_value.as_ref().and_then(&view);
            let new = new_value.as_ref().and_then(&view);
            if old.is_none() && new.is_none() {
                return Ok(());
            }
            if !api.consumable.consume(item, &format!("attribute:{key}")) {
                return Ok(());
            }
            wrap_attribute(api, item, range, old, new)
        });
        self.add(&format!("attribute:{key}"), Priority::NORMAL, handler);
        self
    }

    /// Model attribute on an element to an attribute, class or style of its
    /// view element
    pub fn attribute_to_attribute(
        &mut self,
        key: &str,
        view: impl Fn(&Value) -> Option<ViewAttribute> + 'static,
    ) -> &mut Self {
        let handler: DowncastHandler = Rc::new(move |event, api| {
            let DowncastEvent::Attribute {
                item: DowncastItem::Item(Item::Element(element)),
                key,
                old_value,
                new_value,
                ..
            } = event
            else {
                return Ok(());
            };
            let Some(view_element) = api.view_element(*element) else {
                return Ok(());
            };
            let consumable = ConsumableItem::Element(*element);
            if !api.consumable.consume(consumable, &format!("attribute:{key}")) {
                return Ok(());
            }
            if let Some(old) = old_value.as_ref().and_then(&view) {
                old.remove(&mut api.writer, view_element);
            }
            if let Some(new) = new_value.as_ref().and_then(&view) {
                new.set(&mut api.writer, view_element);
            }
            Ok(())
        });
        self.add(&format!("attribute:{key}"), Priority::NORMAL, handler);
        self
    }

    /// Markers of a group (`comment` matches `comment:1`) to spans
    /// around the text they cover
    pub fn marker_to_highlight(&mut self, group: &str, descriptor: HighlightDescriptor) -> &mut Self {
        let descriptor = Rc::new(descriptor);

        let add = descriptor.clone();
        let add_handler: DowncastHandler = Rc::new(move |event, api| {
            let DowncastEvent::AddMarker { marker_name, range } = event else {
                return Ok(());
            };
            let item = ConsumableItem::Marker(marker_name.clone());
            if !api.consumable.consume(item, &format!("addMarker:{marker_name}")) {
                return Ok(());
            }
            for text_range in text_ranges(api, range)? {
                let view_range = api.to_view_range(&text_range)?;
                let span = api.writer.create_element(add.view_element(marker_name));
                api.writer.wrap(view_range, span)?;
            }
            Ok(())
        });
        self.add(&format!("addMarker:{group}"), Priority::NORMAL, add_handler);

        let remove = descriptor;
        let remove_handler: DowncastHandler = Rc::new(move |event, api| {
            let DowncastEvent::RemoveMarker { marker_name, range } = event else {
                return Ok(());
            };
            let item = ConsumableItem::Marker(marker_name.clone());
            if !api.consumable.consume(item, &format!("removeMarker:{marker_name}")) {
                return Ok(());
            }
            let Some(view_root) = api.document.root(range.root()).and_then(|root| api.view_element(root)) else {
                return Ok(());
            };
            let tree = api.writer.tree();
            let spans: Vec<ViewNodeId> = tree
                .descendants(view_root)
                .into_iter()
                .filter(|&node| {
                    tree.element(node).is_some_and(|element| {
                        element.category == ElementCategory::Attribute && element.id.as_deref() == Some(marker_name)
                    })
                })
                .collect();
            for span in spans {
                if !api.writer.tree().is_ancestor_of(view_root, span) {
                    continue;
                }
                let span_range = api.writer.range_on(span)?;
                let template = api.writer.create_element(remove.view_element(marker_name));
                api.writer.unwrap(span_range, template)?;
            }
            Ok(())
        });
        self.add(&format!("removeMarker:{group}"), Priority::NORMAL, remove_handler);
        self
    }
}

fn wrap_attribute(
    api: &mut DowncastApi<'_>,
    item: &DowncastItem,
    range: &Range,
    old: Option<ElementDefinition>,
    new: Option<ElementDefinition>,
) -> EngineResult<()> {
    let model_item = match item {
        DowncastItem::Selection => {
            let (Some(definition), Some(caret)) = (new, api.selection_caret()) else {
                return Ok(());
            };
            let element = api
                .writer
                .create_element(definition.to_view_element(ElementCategory::Attribute));
            let inside = api.writer.wrap(ViewRange::collapsed(caret), element)?;
            api.set_selection_caret(inside.start);
            return Ok(());
        }
        DowncastItem::Item(model_item) => model_item,
    };

    let mut view_range = match model_item {
        Item::Text(_) => api.to_view_range(range)?,
        Item::Element(element) => match api.view_element(*element) {
            Some(view_element) => api.writer.range_on(view_element)?,
            None => return Ok(()),
        },
    };
    if let Some(definition) = old {
        let element = api
            .writer
            .create_element(definition.to_view_element(ElementCategory::Attribute));
        view_range = api.writer.unwrap(view_range, element)?;
    }
    if let Some(definition) = new {
        let element = api
            .writer
            .create_element(definition.to_view_element(ElementCategory::Attribute));
        api.writer.wrap(view_range, element)?;
    }
    Ok(())
}

/// Ranges of the text a model range covers, one per text node part
fn text_ranges(api: &DowncastApi<'_>, range: &Range) -> EngineResult<Vec<Range>> {
    if range.is_collapsed() {
        return Ok(Vec::new());
    }
    let mut ranges = Vec::new();
    for value in TreeWalker::new(api.document, WalkerOptions::items_of(range))? {
        if let Item::Text(_) = value.item {
            ranges.push(Range::new(value.previous_position, value.next_position));
        }
    }
    Ok(ranges)
}

pub struct UpcastHelpers<'a> {
    dispatcher: &'a mut UpcastDispatcher,
}

impl<'a> UpcastHelpers<'a> {
    pub fn new(dispatcher: &'a mut UpcastDispatcher) -> Self {
        Self { dispatcher }
    }

    fn add(&mut self, pattern: &MatcherPattern, priority: Priority, handler: UpcastHandler) {
        match Matcher::new(vec![pattern.clone()]).element_names() {
            Some(names) => {
                for name in names {
                    self.dispatcher
                        .add_handler(&format!("element:{name}"), priority, handler.clone());
                }
            }
            None => self.dispatcher.add_handler("element", priority, handler),
        }
    }

    /// Matching view elements to a model element holding their converted
    /// children
    pub fn element_to_element(&mut self, pattern: MatcherPattern, model: &str) -> &mut Self {
        let model = model.to_string();
        self.element_to_element_with(pattern, move |_| Node::element(model.clone()))
    }

    pub fn element_to_element_with(
        &mut self,
        pattern: MatcherPattern,
        model: impl Fn(&ViewElement) -> Node + 'static,
    ) -> &mut Self {
        let matcher = Matcher::new(vec![pattern.clone()]);
        let handler: UpcastHandler = Rc::new(move |data, api| {
            let view = api.view;
            let Some(view_element) = view.element(data.view_item) else {
                return Ok(());
            };
            let Some(parts) = matched(&matcher, data, api) else {
                return Ok(());
            };
            let Some(element) = api.safe_insert(model(view_element), &data.model_cursor)? else {
                return Ok(());
            };
            api.consumable.consume(data.view_item, &parts);
            let inside = api.writer.document().position_at(element, 0)?;
            api.convert_children(data.view_item, &inside)?;
            api.update_conversion_result(element, data)
        });
        self.add(&pattern, Priority::NORMAL, handler);
        self
    }

    /// Matching view elements to a model attribute set on the content they
    /// wrap (`<strong>` to `bold`)
    pub fn element_to_attribute(
        &mut self,
        pattern: MatcherPattern,
        key: &str,
        value: impl Fn(&ViewElement) -> Value + 'static,
    ) -> &mut Self {
        let matcher = Matcher::new(vec![pattern.clone()]);
        let key = key.to_string();
        let handler: UpcastHandler = Rc::new(move |data, api| {
            let view = api.view;
            let Some(view_element) = view.element(data.view_item) else {
                return Ok(());
            };
            let Some(parts) = matched(&matcher, data, api) else {
                return Ok(());
            };
            if data.model_range.is_none() {
                let (range, cursor) = api.convert_children(data.view_item, &data.model_cursor)?;
                data.model_range = Some(range);
                data.model_cursor = cursor;
            }
            let Some(range) = data.model_range.clone() else {
                return Ok(());
            };
            if set_on_items(api.writer, &range, &key, value(view_element), false)? {
                api.consumable.consume(data.view_item, &parts);
            }
            Ok(())
        });
        self.add(&pattern, Priority::LOW, handler);
        self
    }

    /// Part of a matching view element (an attribute, class or style) to an
    /// attribute of the model element it was converted to
    pub fn attribute_to_attribute(
        &mut self,
        pattern: MatcherPattern,
        key: &str,
        value: impl Fn(&ViewElement) -> Option<Value> + 'static,
    ) -> &mut Self {
        let matcher = Matcher::new(vec![pattern.clone()]);
        let key = key.to_string();
        let handler: UpcastHandler = Rc::new(move |data, api| {
            let view = api.view;
            let (Some(view_element), Some(range)) = (view.element(data.view_item), data.model_range.clone()) else {
                return Ok(());
            };
            let Some((result, _)) = matcher.match_node(view, data.view_item) else {
                return Ok(());
            };
            let parts = MatchResult { name: false, ..result };
            if !api.consumable.test(data.view_item, &parts) {
                return Ok(());
            }
            let Some(value) = value(view_element) else {
                return Ok(());
            };
            if set_on_items(api.writer, &range, &key, value, true)? {
                api.consumable.consume(data.view_item, &parts);
            }
            Ok(())
        });
        self.add(&pattern, Priority::LOW, handler);
        self
    }
}

/// Matched parts of the event's view element, if all still unconsumed
fn matched(matcher: &Matcher, data: &UpcastData, api: &UpcastApi<'_, '_>) -> Option<MatchResult> {
    let (result, _) = matcher.match_node(api.view, data.view_item)?;
    api.consumable.test(data.view_item, &result).then_some(result)
}

/// Set an attribute on the items of a range that allow it and do not have
/// it yet; `shallow` only looks at the top-level items. Returns whether
/// anything was set.
fn set_on_items(writer: &mut Writer<'_>, range: &Range, key: &str, value: Value, shallow: bool) -> EngineResult<bool> {
    let options = if shallow {
        WalkerOptions::items_of(range).shallow()
    } else {
        WalkerOptions::items_of(range)
    };

    let document = writer.document();
    let tree = document.tree();
    let schema = writer.schema();
    let mut targets = Vec::new();
    for walked in TreeWalker::new(document, options)? {
        let item = &walked.item;
        if !schema.check_attribute(item.name(tree), key) || item.attributes(tree).contains_key(key) {
            continue;
        }
        let item_range = match item {
            Item::Element(element) => document.range_on(*element)?,
            Item::Text(_) => Range::new(walked.previous_position.clone(), walked.next_position.clone()),
        };
        targets.push(item_range);
    }

    let changed = !targets.is_empty();
    for target in targets {
        writer.set_attribute(key, value.clone(), &target)?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnknownContentPolicy;
    use folio_model::dev_utils::stringify_nodes;
    use folio_model::{Schema, SchemaItemDefinition};
    use folio_view::{DataProcessor, HtmlDataProcessor, ViewTree};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.register(
            "paragraph",
            SchemaItemDefinition::default()
                .inherit_all_from("$block")
                .allow_attributes(&["alignment"]),
        );
        schema.extend("$text", SchemaItemDefinition::default().allow_attributes(&["bold"]));
        schema
    }

    fn upcast(html: &str) -> String {
        let mut dispatcher = UpcastDispatcher::new();
        dispatcher.handle_unknown_content(UnknownContentPolicy::Unwrap);
        UpcastHelpers::new(&mut dispatcher)
            .element_to_element(MatcherPattern::name("p"), "paragraph")
            .element_to_attribute(MatcherPattern::names(&["strong", "b"]), "bold", |_| Value::Bool(true))
            .attribute_to_attribute(
                MatcherPattern::name("p").with_style("text-align", ValuePattern::Any),
                "alignment",
                |element| element.styles.get("text-align").map(|value| Value::from(value.as_str())),
            );

        let mut tree = ViewTree::new();
        let fragment = HtmlDataProcessor::new().to_view(&mut tree, html).unwrap();
        let nodes = dispatcher.convert(&tree, fragment, &schema(), "$root").unwrap();
        stringify_nodes(&nodes)
    }

    #[test]
    fn test_element_to_attribute_upcast() {
        assert_eq!(
            upcast("<p>foo<strong>bar</strong></p>"),
            "<paragraph>foo<$text bold=\"true\">bar</$text></paragraph>"
        );
        assert_eq!(upcast("<p><b>x</b></p>"), "<paragraph><$text bold=\"true\">x</$text></paragraph>");
    }

    #[test]
    fn test_attribute_to_attribute_upcast() {
        assert_eq!(
            upcast("<p style=\"text-align:right\">x</p>"),
            "<paragraph alignment=\"right\">x</paragraph>"
        );
    }

    #[test]
    fn test_element_definition_pattern() {
        let definition = ElementDefinition::new("span")
            .with_class("marker")
            .with_style("color", "red")
            .with_priority(5);
        let element = definition.to_view_element(ElementCategory::Attribute);
        assert_eq!(element.priority, 5);
        assert!(element.classes.contains("marker"));

        let pattern = definition.matcher_pattern();
        assert_eq!(pattern.classes, vec!["marker".to_string()]);
        assert_eq!(pattern.styles.len(), 1);
    }
}
