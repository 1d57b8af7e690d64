//! String form of view trees for tests and debugging.
//!
//! ```text
//! <p>f{oo<strong>ba}r</strong></p>
//! ```
//!
//! `{` `}` mark selection boundaries inside text, `[` `]` between nodes.
//! With `show_type` element names carry their category
//! (`<container:p>`); with `show_priority` attribute elements carry a
//! `view-priority` attribute.

use std::collections::BTreeMap;

use folio_common::{decode_entities, tokenize, MarkupToken};

use crate::document::ViewDocument;
use crate::dom::is_void_element;
use crate::errors::{ViewError, ViewResult};
use crate::node::{ElementCategory, ViewElement, ViewNodeId, ViewTree};
use crate::position::{ViewPosition, ViewRange, ViewSelection};

const INLINE_ELEMENTS: &[&str] = &[
    "a", "b", "code", "em", "i", "mark", "s", "small", "span", "strong", "sub", "sup", "u",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct StringifyOptions<'a> {
    pub show_type: bool,
    pub show_priority: bool,
    pub selection: Option<&'a ViewSelection>,
}

/// Content of a root editable, optionally with the document selection
pub fn get_data(document: &ViewDocument, root_name: &str, with_selection: bool) -> ViewResult<String> {
    let root = document.get_root(root_name)?;
    let options = StringifyOptions {
        selection: with_selection.then_some(&document.selection),
        ..StringifyOptions::default()
    };
    let markers = Markers::new(options.selection);
    let mut out = String::new();
    write_children(&document.tree, root, &options, &markers, &mut out);
    Ok(out)
}

pub fn stringify(tree: &ViewTree, node: ViewNodeId, options: &StringifyOptions<'_>) -> String {
    let markers = Markers::new(options.selection);
    let mut out = String::new();
    if tree.is_fragment(node) {
        write_children(tree, node, options, &markers, &mut out);
    } else {
        write_node(tree, node, options, &markers, &mut out);
    }
    out
}

/// Selection boundaries grouped by the position they sit at
struct Markers {
    at: BTreeMap<(ViewNodeId, usize), Vec<Boundary>>,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    End,
    Collapsed,
    Start,
}

impl Markers {
    fn new(selection: Option<&ViewSelection>) -> Self {
        let mut at: BTreeMap<(ViewNodeId, usize), Vec<Boundary>> = BTreeMap::new();
        for range in selection.map(|selection| selection.ranges()).unwrap_or_default() {
            if range.is_collapsed() {
                at.entry((range.start.parent, range.start.offset))
                    .or_default()
                    .push(Boundary::Collapsed);
            } else {
                at.entry((range.start.parent, range.start.offset))
                    .or_default()
                    .push(Boundary::Start);
                at.entry((range.end.parent, range.end.offset))
                    .or_default()
                    .push(Boundary::End);
            }
        }
        for boundaries in at.values_mut() {
            boundaries.sort();
        }
        Self { at }
    }

    fn write(&self, parent: ViewNodeId, offset: usize, in_text: bool, out: &mut String) {
        let Some(boundaries) = self.at.get(&(parent, offset)) else {
            return;
        };
        let (open, close) = if in_text { ('{', '}') } else { ('[', ']') };
        for boundary in boundaries {
            match boundary {
                Boundary::End => out.push(close),
                Boundary::Collapsed => {
                    out.push(open);
                    out.push(close);
                }
                Boundary::Start => out.push(open),
            }
        }
    }
}

fn write_children(tree: &ViewTree, parent: ViewNodeId, options: &StringifyOptions<'_>, markers: &Markers, out: &mut String) {
    let children = tree.children(parent);
    for (offset, &child) in children.iter().enumerate() {
        markers.write(parent, offset, false, out);
        write_node(tree, child, options, markers, out);
    }
    markers.write(parent, children.len(), false, out);
}

fn write_node(tree: &ViewTree, node: ViewNodeId, options: &StringifyOptions<'_>, markers: &Markers, out: &mut String) {
    if let Some(text) = tree.text(node) {
        for (offset, ch) in text.chars().enumerate() {
            markers.write(node, offset, true, out);
            out.push(ch);
        }
        markers.write(node, text.chars().count(), true, out);
        return;
    }
    let Some(element) = tree.element(node) else {
        write_children(tree, node, options, markers, out);
        return;
    };

    let tag = if options.show_type {
        format!("{}:{}", element.category.as_str(), element.name)
    } else {
        element.name.clone()
    };
    out.push('<');
    out.push_str(&tag);
    let mut attributes = element.all_attributes();
    if options.show_priority && element.category == ElementCategory::Attribute {
        attributes.insert("view-priority".to_string(), element.priority.to_string());
    }
    for (key, value) in attributes {
        out.push_str(&format!(" {key}=\"{value}\""));
    }
    out.push('>');
    if let Some(html) = &element.html {
        out.push_str(html);
    }
    write_children(tree, node, options, markers, out);
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

/// Parse the string form into a fragment. Inline formatting names become
/// attribute elements, void names empty elements, the rest containers.
/// Returns the fragment and the selection range when markers are present.
pub fn parse(tree: &mut ViewTree, data: &str) -> ViewResult<(ViewNodeId, Option<ViewRange>)> {
    let fragment = tree.create_fragment();
    let mut stack: Vec<ViewNodeId> = vec![fragment];
    let mut start: Option<ViewPosition> = None;
    let mut end: Option<ViewPosition> = None;

    for spanned in tokenize(data).map_err(|error| ViewError::Html(error.into()))? {
        let parent = stack.last().copied().unwrap_or(fragment);
        match spanned.token {
            MarkupToken::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let category = if is_void_element(name) {
                    ElementCategory::Empty
                } else if INLINE_ELEMENTS.contains(&name) {
                    ElementCategory::Attribute
                } else {
                    ElementCategory::Container
                };
                let mut element = ViewElement::new(name, category);
                for attribute in attributes {
                    let value = attribute.value.map(decode_entities).unwrap_or_default();
                    match attribute.name {
                        "view-priority" => element.priority = value.parse().unwrap_or(element.priority),
                        key => element.set_attribute(key, &value),
                    }
                }
                let node = tree.create(element);
                tree.append_child(parent, node);
                if !self_closing && category != ElementCategory::Empty {
                    stack.push(node);
                }
            }
            MarkupToken::EndTag { name } => {
                if stack.len() > 1 && tree.name(parent) == Some(name) {
                    stack.pop();
                }
            }
            MarkupToken::Text(text) => {
                let mut pending = String::new();
                let mut text_markers: Vec<(char, usize)> = Vec::new();
                for ch in decode_entities(text).chars() {
                    match ch {
                        '[' | ']' => {
                            flush_text(tree, parent, &mut pending, &mut text_markers, &mut start, &mut end);
                            let position = ViewPosition::new(parent, tree.child_count(parent));
                            if ch == '[' {
                                start = Some(position);
                            } else {
                                end = Some(position);
                            }
                        }
                        '{' | '}' => text_markers.push((ch, pending.chars().count())),
                        _ => pending.push(ch),
                    }
                }
                flush_text(tree, parent, &mut pending, &mut text_markers, &mut start, &mut end);
            }
            MarkupToken::Comment(_) => {}
        }
    }

    let range = match (start, end) {
        (Some(start), Some(end)) => Some(ViewRange::new(start, end)),
        (Some(position), None) | (None, Some(position)) => Some(ViewRange::collapsed(position)),
        (None, None) => None,
    };
    Ok((fragment, range))
}

fn flush_text(
    tree: &mut ViewTree,
    parent: ViewNodeId,
    pending: &mut String,
    text_markers: &mut Vec<(char, usize)>,
    start: &mut Option<ViewPosition>,
    end: &mut Option<ViewPosition>,
) {
    if pending.is_empty() {
        // Markers around no text fall back to element positions
        for (marker, _) in text_markers.drain(..) {
            let position = ViewPosition::new(parent, tree.child_count(parent));
            if marker == '{' {
                *start = Some(position);
            } else {
                *end = Some(position);
            }
        }
        return;
    }
    let text = tree.create_text(std::mem::take(pending));
    tree.append_child(parent, text);
    for (marker, offset) in text_markers.drain(..) {
        let position = ViewPosition::new(text, offset);
        if marker == '{' {
            *start = Some(position);
        } else {
            *end = Some(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stringify_with_types_and_selection() {
        let mut tree = ViewTree::new();
        let (fragment, range) = parse(&mut tree, "<p>f{oo<strong>b}ar</strong></p>").unwrap();
        let selection = ViewSelection::new(range.into_iter().collect(), false);

        let plain = stringify(
            &tree,
            fragment,
            &StringifyOptions {
                selection: Some(&selection),
                ..StringifyOptions::default()
            },
        );
        assert_eq!(plain, "<p>f{oo<strong>b}ar</strong></p>");

        let typed = stringify(
            &tree,
            fragment,
            &StringifyOptions {
                show_type: true,
                show_priority: true,
                selection: None,
            },
        );
        assert_eq!(
            typed,
            "<container:p>foo<attribute:strong view-priority=\"10\">bar</attribute:strong></container:p>"
        );
    }

    #[test]
    fn test_collapsed_selection_between_nodes() {
        let mut tree = ViewTree::new();
        let (fragment, range) = parse(&mut tree, "<p><img></img>[]</p>").unwrap();
        let range = range.unwrap();
        assert!(range.is_collapsed());
        let selection = ViewSelection::new(vec![range], false);
        let out = stringify(
            &tree,
            fragment,
            &StringifyOptions {
                selection: Some(&selection),
                ..StringifyOptions::default()
            },
        );
        assert_eq!(out, "<p><img></img>[]</p>");
    }
}
