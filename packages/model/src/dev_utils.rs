//! # Model dev-utils
//!
//! String form of model content for fixtures and assertions:
//!
//! ```text
//! <paragraph>fo[o<$text bold="true">ba]r</$text></paragraph>
//! ```
//!
//! Elements are written as tags, text with attributes as `<$text>` runs and
//! the selection as `[` `]` (`[]` when collapsed). Attribute values are read
//! as JSON when they parse as JSON and as strings otherwise.

use serde_json::Value;

use folio_common::{decode_entities, escape_attribute, escape_text, tokenize, MarkupToken};

use crate::batch::BatchType;
use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use crate::model::Model;
use crate::node::{normalize_nodes, Attributes, Node, TEXT_NAME};
use crate::position::Position;
use crate::range::Range;
use crate::tree::NodeId;

struct Frame {
    name: String,
    attributes: Attributes,
    children: Vec<Node>,
    /// Offset size of `children` so far
    offset: usize,
    /// Offset of this element in its parent
    index_in_parent: usize,
}

impl Frame {
    fn new(name: &str, attributes: Attributes, index_in_parent: usize) -> Self {
        Self {
            name: name.to_string(),
            attributes,
            children: Vec::new(),
            offset: 0,
            index_in_parent,
        }
    }

    fn push(&mut self, node: Node) {
        self.offset += node.offset_size();
        self.children.push(node);
    }
}

/// Parse the string form into top-level nodes plus the selection, if any,
/// as a range in `root`
pub fn parse(data: &str, root: &str) -> ModelResult<(Vec<Node>, Option<Range>)> {
    let tokens = tokenize(data)?;
    let mut stack = vec![Frame::new("", Attributes::new(), 0)];
    let mut text_attributes: Option<Attributes> = None;
    let mut start: Option<Vec<usize>> = None;
    let mut end: Option<Vec<usize>> = None;

    let current_path = |stack: &[Frame]| -> Vec<usize> {
        let mut path: Vec<usize> = stack.iter().skip(1).map(|frame| frame.index_in_parent).collect();
        path.push(stack.last().map(|frame| frame.offset).unwrap_or(0));
        path
    };

    for spanned in tokens {
        match spanned.token {
            MarkupToken::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let attributes: Attributes = attributes
                    .into_iter()
                    .map(|attr| (attr.name.to_string(), parse_value(attr.value.unwrap_or("true"))))
                    .collect();
                if name == TEXT_NAME {
                    text_attributes = Some(attributes);
                    continue;
                }
                let offset = stack.last().map(|frame| frame.offset).unwrap_or(0);
                let frame = Frame::new(name, attributes, offset);
                if self_closing {
                    close_frame(&mut stack, frame);
                } else {
                    stack.push(frame);
                }
            }
            MarkupToken::EndTag { name } => {
                if name == TEXT_NAME {
                    text_attributes = None;
                    continue;
                }
                if stack.len() < 2 || stack.last().map(|frame| frame.name.as_str()) != Some(name) {
                    return Err(ModelError::Parse(format!("unexpected closing tag `{name}`")));
                }
                if let Some(frame) = stack.pop() {
                    close_frame(&mut stack, frame);
                }
            }
            MarkupToken::Text(raw) => {
                let text = decode_entities(raw);
                let mut run = String::new();
                for ch in text.chars() {
                    if ch != '[' && ch != ']' {
                        run.push(ch);
                        continue;
                    }
                    flush_text(&mut stack, &mut run, &text_attributes);
                    let path = current_path(&stack);
                    let slot = if ch == '[' { &mut start } else { &mut end };
                    if slot.replace(path).is_some() {
                        return Err(ModelError::Parse(format!("selection boundary `{ch}` used twice")));
                    }
                }
                flush_text(&mut stack, &mut run, &text_attributes);
            }
            MarkupToken::Comment(_) => {}
        }
    }

    if stack.len() != 1 {
        return Err(ModelError::Parse("unclosed element".to_string()));
    }
    let nodes = stack.pop().map(|frame| normalize_nodes(frame.children)).unwrap_or_default();

    let selection = match (start, end) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(Range::new(Position::new(root, start), Position::new(root, end))),
        _ => return Err(ModelError::Parse("selection needs both `[` and `]`".to_string())),
    };
    Ok((nodes, selection))
}

fn close_frame(stack: &mut [Frame], frame: Frame) {
    let node = Node::element(frame.name)
        .with_attributes(frame.attributes)
        .with_children(normalize_nodes(frame.children));
    if let Some(parent) = stack.last_mut() {
        parent.push(node);
    }
}

fn flush_text(stack: &mut [Frame], run: &mut String, attributes: &Option<Attributes>) {
    if run.is_empty() {
        return;
    }
    let node = Node::text(std::mem::take(run)).with_attributes(attributes.clone().unwrap_or_default());
    if let Some(frame) = stack.last_mut() {
        frame.push(node);
    }
}

fn parse_value(raw: &str) -> Value {
    let raw = decode_entities(raw);
    serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.into_owned()))
}

fn write_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace the content of `root` without going through operations. Meant for
/// documents built outside a model.
pub fn parse_into(document: &mut Document, root: &str, data: &str) -> ModelResult<Option<Range>> {
    let (nodes, selection) = parse(data, root)?;
    let root_id = document.get_root(root)?;

    let tree = document.tree_mut();
    let max = tree.max_offset(root_id);
    tree.remove_range(root_id, 0, max);
    let ids: Vec<NodeId> = nodes.iter().map(|node| tree.create_from(node)).collect();
    tree.insert_nodes(root_id, 0, ids);

    if let Some(range) = &selection {
        document.selection_mut().set_ranges(vec![range.clone()], false);
    }
    Ok(selection)
}

/// Replace the content of `root` in a not-undoable batch and set the
/// selection found in `data`
pub fn set_data(model: &mut Model, root: &str, data: &str) -> ModelResult<()> {
    let (nodes, selection) = parse(data, root)?;
    model.change_with(BatchType::not_undoable(), |writer| {
        let content = writer.document().range_in_root(root)?;
        if !content.is_collapsed() {
            writer.remove(&content)?;
        }
        let start = writer.document().range_in_root(root)?.start;
        writer.insert(nodes, &start)?;
        writer.set_selection(selection.into_iter().collect(), false);
        Ok(())
    })
}

/// String form of a root's content
pub fn get_data(model: &Model, root: &str, with_selection: bool) -> ModelResult<String> {
    stringify(model.document(), root, with_selection)
}

pub fn stringify(document: &Document, root: &str, with_selection: bool) -> ModelResult<String> {
    let root_id = document.get_root(root)?;
    let ranges: Vec<Range> = if with_selection {
        document
            .selection()
            .ranges()
            .iter()
            .filter(|range| range.root() == root)
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let mut out = String::new();
    let mut path = Vec::new();
    write_children(document, root_id, &ranges, &mut path, &mut out);
    Ok(out)
}

/// Stringify detached nodes, such as a fragment produced by upcasting
pub fn stringify_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(_) if node.attributes().is_empty() => out.push_str(&escape_text(text_of(node))),
        Node::Text(_) => {
            write_open(TEXT_NAME, node.attributes(), out);
            out.push_str(&escape_text(text_of(node)));
            out.push_str("</$text>");
        }
        Node::Element(_) => {
            write_open(node.name(), node.attributes(), out);
            for child in node.children() {
                write_node(child, out);
            }
            out.push_str(&format!("</{}>", node.name()));
        }
    }
}

fn text_of(node: &Node) -> &str {
    match node {
        Node::Text(text) => &text.data,
        Node::Element(_) => "",
    }
}

fn write_open(name: &str, attributes: &Attributes, out: &mut String) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attributes {
        out.push_str(&format!(" {}=\"{}\"", key, escape_attribute(&write_value(value))));
    }
    out.push('>');
}

fn marks_at(ranges: &[Range], path: &[usize]) -> &'static str {
    for range in ranges {
        let at_start = range.start.path == path;
        let at_end = range.end.path == path;
        match (at_start, at_end) {
            (true, true) => return "[]",
            (true, false) => return "[",
            (false, true) => return "]",
            _ => {}
        }
    }
    ""
}

fn write_children(document: &Document, parent: NodeId, ranges: &[Range], path: &mut Vec<usize>, out: &mut String) {
    let tree = document.tree();
    let mut offset = 0;

    for &child in tree.children(parent) {
        path.push(offset);
        out.push_str(marks_at(ranges, path));
        path.pop();

        if let Some(data) = tree.text(child) {
            let attributes = tree.attributes(child);
            if !attributes.is_empty() {
                write_open(TEXT_NAME, attributes, out);
            }
            for (i, ch) in data.chars().enumerate() {
                if i > 0 {
                    path.push(offset + i);
                    out.push_str(marks_at(ranges, path));
                    path.pop();
                }
                let mut buf = [0u8; 4];
                out.push_str(&escape_text(ch.encode_utf8(&mut buf)));
            }
            if !attributes.is_empty() {
                out.push_str("</$text>");
            }
        } else {
            let name = tree.item_name(child);
            write_open(name, tree.attributes(child), out);
            path.push(offset);
            write_children(document, child, ranges, path, out);
            path.pop();
            out.push_str(&format!("</{name}>"));
        }
        offset += tree.offset_size(child);
    }

    path.push(offset);
    out.push_str(marks_at(ranges, path));
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Document {
        let mut document = Document::new();
        document.create_root("main", "$root").unwrap();
        document
    }

    #[test]
    fn test_parse_and_stringify_with_selection() {
        let mut doc = document();
        let data = "<paragraph>fo[o<$text bold=\"true\">ba]r</$text></paragraph>";
        let selection = parse_into(&mut doc, "main", data).unwrap().unwrap();
        assert_eq!(selection.start.path, vec![0, 2]);
        assert_eq!(selection.end.path, vec![0, 5]);
        assert_eq!(stringify(&doc, "main", true).unwrap(), data);
    }

    #[test]
    fn test_collapsed_selection_between_elements() {
        let mut doc = document();
        parse_into(&mut doc, "main", "<paragraph>a</paragraph>[]<paragraph></paragraph>").unwrap();
        assert_eq!(doc.selection().first_position().unwrap().path, vec![1]);
        assert_eq!(
            stringify(&doc, "main", true).unwrap(),
            "<paragraph>a</paragraph>[]<paragraph></paragraph>"
        );
    }

    #[test]
    fn test_attribute_values() {
        let (nodes, _) = parse("<image width=\"120\" alt=\"a &amp; b\"></image>", "main").unwrap();
        assert_eq!(nodes[0].attributes()["width"], Value::from(120));
        assert_eq!(nodes[0].attributes()["alt"], Value::from("a & b"));
        assert_eq!(stringify_nodes(&nodes), "<image alt=\"a &amp; b\" width=\"120\"></image>");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("<paragraph>foo", "main").is_err());
        assert!(parse("<paragraph>foo</heading1>", "main").is_err());
        assert!(parse("<paragraph>f[oo</paragraph>", "main").is_err());
    }
}
