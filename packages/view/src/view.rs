//! The editing view controller: owns the view document, the DOM it renders
//! into and the converter binding them.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::document::ViewDocument;
use crate::dom::{DomNodeId, DomTree};
use crate::dom_converter::{BlockFillerMode, DomConverter};
use crate::errors::ViewResult;
use crate::node::ViewNodeId;
use crate::renderer::{RenderStats, Renderer};
use crate::writer::DowncastWriter;

#[derive(Debug)]
pub struct View {
    pub document: ViewDocument,
    pub dom: DomTree,
    pub converter: DomConverter,
    renderer: Renderer,
    dom_roots: BTreeMap<String, DomNodeId>,
    render_count: usize,
}

impl Default for View {
    fn default() -> Self {
        Self::new(BlockFillerMode::Br)
    }
}

impl View {
    pub fn new(block_filler_mode: BlockFillerMode) -> Self {
        Self {
            document: ViewDocument::new(),
            dom: DomTree::new(),
            converter: DomConverter::new(block_filler_mode),
            renderer: Renderer::new(),
            dom_roots: BTreeMap::new(),
            render_count: 0,
        }
    }

    /// Create a view root and the DOM element it renders into
    pub fn create_root(&mut self, name: &str, element_name: &str) -> ViewResult<ViewNodeId> {
        let root = self.document.create_root(name, element_name)?;
        let dom_root = self
            .converter
            .view_to_dom(&self.document.tree, root, &mut self.dom, true);
        self.dom_roots.insert(name.to_string(), dom_root);
        debug!(root = name, "view root attached");
        Ok(root)
    }

    pub fn detach_root(&mut self, name: &str) -> ViewResult<()> {
        self.document.remove_root(name)?;
        if let Some(dom_root) = self.dom_roots.remove(name) {
            self.converter.unbind(&self.dom, dom_root);
        }
        Ok(())
    }

    pub fn dom_root(&self, name: &str) -> Option<DomNodeId> {
        self.dom_roots.get(name).copied()
    }

    /// Markup of a DOM root's content
    pub fn dom_html(&self, name: &str) -> Option<String> {
        self.dom_root(name).map(|root| self.dom.inner_html(root))
    }

    /// Run a block against the view writer and render once it returns
    pub fn change<R>(&mut self, block: impl FnOnce(&mut DowncastWriter<'_>) -> R) -> R {
        let result = {
            let mut writer = DowncastWriter::new(&mut self.document.tree, &mut self.document.selection);
            block(&mut writer)
        };
        self.force_render();
        result
    }

    #[instrument(level = "trace", skip(self))]
    pub fn force_render(&mut self) -> RenderStats {
        self.render_count += 1;
        self.renderer
            .render(&mut self.document, &mut self.dom, &mut self.converter)
    }

    /// Number of renders performed so far
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.document.is_read_only = read_only;
        let value = if read_only { "false" } else { "true" };
        let roots: Vec<ViewNodeId> = self
            .document
            .root_names()
            .iter()
            .filter_map(|name| self.document.root(name))
            .collect();
        self.change(|writer| {
            for root in roots {
                writer.set_attribute("contenteditable", value, root);
            }
        });
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.document.is_focused = focused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ViewPosition;

    #[test]
    fn test_change_renders_once() {
        let mut view = View::default();
        let root = view.create_root("main", "div").unwrap();
        view.change(|writer| {
            let p = writer.create_container_element("p", []);
            let text = writer.create_text("a");
            writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();
            writer.insert(ViewPosition::new(root, 0), vec![p]).unwrap();
        });
        assert_eq!(view.render_count(), 1);
        assert_eq!(view.dom_html("main").unwrap(), "<p>a</p>");

        view.set_read_only(true);
        let dom_root = view.dom_root("main").unwrap();
        assert_eq!(view.dom.attribute(dom_root, "contenteditable"), Some("false"));
    }
}
