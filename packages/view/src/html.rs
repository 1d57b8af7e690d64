//! Data processors turn the editor's data format into a view fragment and
//! back. HTML is the built-in format.

use tracing::trace;

use crate::dom::DomTree;
use crate::dom_converter::{BlockFillerMode, DomConverter};
use crate::errors::ViewResult;
use crate::node::{ViewNodeId, ViewTree};

pub trait DataProcessor: std::fmt::Debug {
    /// Parse data into a new view fragment in `tree`
    fn to_view(&self, tree: &mut ViewTree, data: &str) -> ViewResult<ViewNodeId>;

    /// Serialize a view fragment
    fn to_data(&self, tree: &ViewTree, fragment: ViewNodeId) -> String;
}

/// Reads and writes HTML. Empty blocks are written with a `&nbsp;` filler.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDataProcessor;

impl HtmlDataProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DataProcessor for HtmlDataProcessor {
    fn to_view(&self, tree: &mut ViewTree, data: &str) -> ViewResult<ViewNodeId> {
        let mut dom = DomTree::new();
        let fragment = dom.parse_html(data)?;
        let converter = DomConverter::new(BlockFillerMode::Nbsp);
        let view = match converter.dom_to_view(&dom, fragment, tree) {
            Some(view) => view,
            None => tree.create_fragment(),
        };
        trace!(length = data.len(), "html parsed");
        Ok(view)
    }

    fn to_data(&self, tree: &ViewTree, fragment: ViewNodeId) -> String {
        let mut dom = DomTree::new();
        let mut converter = DomConverter::new(BlockFillerMode::Nbsp);
        let node = converter.view_to_dom(tree, fragment, &mut dom, false);
        if tree.is_fragment(fragment) {
            dom.inner_html(node)
        } else {
            dom.outer_html(node)
        }
    }
}
