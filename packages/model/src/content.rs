//! # Content helpers
//!
//! Selection-driven editing built on the writer: deleting a selection with
//! block merging, inserting a fragment at the caret and listing selected
//! blocks. Commands use these instead of talking to the writer directly.

use tracing::trace;

use crate::document::Document;
use crate::errors::ModelResult;
use crate::node::{Attributes, Node, TEXT_NAME};
use crate::position::{Position, Stickiness};
use crate::range::Range;
use crate::schema::Schema;
use crate::tree::NodeId;
use crate::walker::{Item, TreeWalker, WalkerOptions};
use crate::writer::Writer;

/// Name of the element used to fill emptied limit elements
pub const DEFAULT_PARAGRAPH: &str = "paragraph";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Keep the blocks at both ends of the selection apart
    pub leave_unmerged: bool,

    /// Do not put a paragraph where the caret cannot hold text
    pub do_not_auto_paragraph: bool,
}

/// Delete the content of the first selection range and collapse the
/// selection at its start
pub fn delete_content(writer: &mut Writer<'_>, options: &DeleteOptions) -> ModelResult<()> {
    let Some(range) = writer.document().selection().first_range().cloned() else {
        return Ok(());
    };
    if range.is_collapsed() {
        return Ok(());
    }

    let start_parent = writer.document().parent_of(&range.start)?;
    let end_parent = writer.document().parent_of(&range.end)?;
    let start = range.start.clone().with_stickiness(Stickiness::ToPrevious);

    writer.remove(&range)?;

    if !options.leave_unmerged && start_parent != end_parent {
        merge_branches(writer, start_parent, end_parent)?;
    }

    // Removals all happened after the start, so it still points to the same place.
    let mut caret = start.with_stickiness(Stickiness::ToNone);
    if !options.do_not_auto_paragraph && !writer.schema().check_child_at(writer.document(), &caret, TEXT_NAME) {
        if let Some(paragraph) = auto_paragraph(writer, &caret)? {
            caret = writer.document().position_at(paragraph, 0)?;
        }
    }

    writer.set_selection_at(caret);
    Ok(())
}

/// Merge the element the removal ended in into the one it started in, then
/// drop ancestors of the former left empty
fn merge_branches(writer: &mut Writer<'_>, start_parent: NodeId, end_parent: NodeId) -> ModelResult<()> {
    let document = writer.document();
    let schema = writer.schema();
    let tree = document.tree();

    if document.is_root(start_parent) || document.is_root(end_parent) {
        return Ok(());
    }
    if schema.is_limit(tree.item_name(start_parent)) || schema.is_limit(tree.item_name(end_parent)) {
        return Ok(());
    }
    if tree.is_ancestor_of(start_parent, end_parent) || tree.is_ancestor_of(end_parent, start_parent) {
        return Ok(());
    }
    let children_fit = tree
        .children(end_parent)
        .iter()
        .all(|child| schema.check_child_in(document, start_parent, &document.schema_name_of(*child)));
    if !children_fit {
        return Ok(());
    }

    let content = document.range_in(end_parent)?;
    let target = document.position_at_end(start_parent)?;
    if !content.is_collapsed() {
        writer.move_range(&content, &target)?;
    }

    let mut node = end_parent;
    loop {
        let tree = writer.document().tree();
        let parent = tree.parent(node);
        writer.remove_node(node)?;
        let tree = writer.document().tree();
        match parent {
            Some(parent)
                if !writer.document().is_root(parent)
                    && tree.is_empty(parent)
                    && !tree.is_ancestor_of(parent, start_parent) =>
            {
                node = parent
            }
            _ => break,
        }
    }
    trace!("merged blocks after deletion");
    Ok(())
}

/// Insert a paragraph at the closest place that accepts one
fn auto_paragraph(writer: &mut Writer<'_>, position: &Position) -> ModelResult<Option<NodeId>> {
    if !writer.schema().check_child_at(writer.document(), position, DEFAULT_PARAGRAPH) {
        return Ok(None);
    }
    let id = writer.insert_element(DEFAULT_PARAGRAPH, Attributes::new(), position)?;
    Ok(Some(id))
}

/// Insert nodes at `position` (or the selection) and put the caret after
/// them. Block content splits the block at the position; the first and last
/// inserted blocks merge with the halves around them.
pub fn insert_content(writer: &mut Writer<'_>, nodes: Vec<Node>, position: Option<Position>) -> ModelResult<Range> {
    let position = match position {
        Some(position) => position,
        None => {
            if !writer.document().selection().is_collapsed() {
                delete_content(writer, &DeleteOptions::default())?;
            }
            match writer.document().selection().first_position() {
                Some(position) => position.clone(),
                None => {
                    let root = first_root(writer)?;
                    writer.document().range_in_root(&root)?.start
                }
            }
        }
    };

    let schema = writer.schema();
    let all_inline = nodes
        .iter()
        .all(|node| !node.is_element() || schema.is_inline(node.name()));

    if all_inline {
        let range = writer.insert(nodes, &position)?;
        writer.set_selection_at(range.end.clone());
        return Ok(range);
    }

    insert_blocks(writer, nodes, position)
}

fn first_root(writer: &Writer<'_>) -> ModelResult<String> {
    writer
        .document()
        .root_names()
        .into_iter()
        .next()
        .ok_or_else(|| crate::errors::ModelError::RootNotFound(String::new()))
}

fn insert_blocks(writer: &mut Writer<'_>, nodes: Vec<Node>, position: Position) -> ModelResult<Range> {
    let parent = writer.document().parent_of(&position)?;
    let parent_is_block = !writer.document().is_root(parent)
        && writer.schema().is_block(writer.document().tree().item_name(parent));

    if !parent_is_block {
        let range = writer.insert(nodes, &position)?;
        let caret = block_caret(writer, &range)?;
        writer.set_selection_at(caret);
        return Ok(range);
    }

    let split = writer.split(&position, None)?;
    let insert_at = split.position;
    let before = writer.document().node_before(&insert_at);
    let after = writer.document().node_after(&insert_at);

    let range = writer.insert(nodes, &insert_at)?;
    let first = writer.document().node_after(&range.start);
    let last = writer.document().node_before(&range.end);
    let mut caret = block_caret(writer, &range)?.with_stickiness(Stickiness::ToPrevious);
    let mark = writer.batch().operations.len();

    match (mergeable(writer, last), after) {
        (Some(last), Some(_)) => {
            let at = writer.document().position_after(last)?;
            writer.merge(&at)?;
        }
        (None, Some(after)) if writer.document().tree().is_empty(after) => writer.remove_node(after)?,
        _ => {}
    }
    match (mergeable(writer, first), before) {
        (Some(first), Some(_)) => {
            let at = writer.document().position_before(first)?;
            writer.merge(&at)?;
        }
        (None, Some(before)) if writer.document().tree().is_empty(before) => writer.remove_node(before)?,
        _ => {}
    }

    for operation in &writer.batch().operations[mark..] {
        caret = caret.transformed_by_operation(operation);
    }
    let caret = caret.with_stickiness(Stickiness::ToNone);
    writer.set_selection_at(caret.clone());
    Ok(Range::collapsed(caret))
}

/// Blocks that can absorb the content next to them
fn mergeable(writer: &Writer<'_>, node: Option<NodeId>) -> Option<NodeId> {
    node.filter(|id| {
        let name = writer.document().tree().item_name(*id);
        writer.schema().is_block(name) && !writer.schema().is_object(name)
    })
}

/// End of the last inserted block's content, or right after the range
fn block_caret(writer: &Writer<'_>, range: &Range) -> ModelResult<Position> {
    let document = writer.document();
    match document.node_before(&range.end) {
        Some(last) if document.tree().is_element(last) && !writer.schema().is_object(document.tree().item_name(last)) => {
            document.position_at_end(last)
        }
        _ => Ok(range.end.clone()),
    }
}

/// Blocks touched by the selection, in document order, without nesting
/// blocks inside blocks already listed
pub fn get_selected_blocks(writer: &Writer<'_>) -> ModelResult<Vec<NodeId>> {
    selected_blocks(writer.document(), writer.schema())
}

/// [`get_selected_blocks`] outside a change block
pub fn selected_blocks(document: &Document, schema: &Schema) -> ModelResult<Vec<NodeId>> {
    let mut blocks: Vec<NodeId> = Vec::new();

    let push = |blocks: &mut Vec<NodeId>, node: NodeId| {
        let is_block = schema.is_block(document.tree().item_name(node)) && !document.is_root(node);
        let nested = blocks.iter().any(|block| document.tree().is_ancestor_of(*block, node));
        if is_block && !nested && !blocks.contains(&node) {
            blocks.push(node);
        }
    };

    for range in document.selection().ranges() {
        let start_block = closest_block(document, schema, &range.start)?;
        if let Some(block) = start_block {
            push(&mut blocks, block);
        }
        for value in TreeWalker::new(document, WalkerOptions::items_of(range))? {
            match value.item {
                Item::Element(element) if value.next_position != range.end => push(&mut blocks, element),
                _ => {}
            }
        }
        // A range ending at the very start of a block does not select it.
        if let Some(block) = closest_block(document, schema, &range.end)? {
            let at_block_start = range.end.offset() == 0 && !range.is_collapsed();
            if !at_block_start || start_block == Some(block) {
                push(&mut blocks, block);
            }
        }
    }
    Ok(blocks)
}

fn closest_block(document: &Document, schema: &Schema, position: &Position) -> ModelResult<Option<NodeId>> {
    let mut node = document.parent_of(position)?;
    loop {
        if document.is_root(node) {
            return Ok(None);
        }
        if schema.is_block(document.tree().item_name(node)) {
            return Ok(Some(node));
        }
        match document.tree().parent(node) {
            Some(parent) => node = parent,
            None => return Ok(None),
        }
    }
}

/// Whether a range holds anything worth keeping: text, or an object
pub fn has_content(writer: &Writer<'_>, range: &Range) -> ModelResult<bool> {
    let document = writer.document();
    for value in TreeWalker::new(document, WalkerOptions::items_of(range))? {
        match value.item {
            Item::Text(_) => return Ok(true),
            Item::Element(element) if writer.schema().is_content(document.tree().item_name(element)) => {
                return Ok(true)
            }
            Item::Element(_) => {}
        }
    }
    Ok(false)
}
