use folio_model::{ChangeSet, Model, Range, RootChange};
use folio_view::{BlockFillerMode, DowncastWriter, RenderStats, View, ViewNodeId, ViewRange};
use tracing::{debug, instrument};

use crate::conversion::{DowncastApi, DowncastDispatcher, Mapper};
use crate::errors::EngineResult;

/// View element editable roots render as
pub const VIEW_ROOT_ELEMENT: &str = "div";

/// Keeps the editing view in sync with the model
#[derive(Debug)]
pub struct EditingController {
    pub view: View,
    pub mapper: Mapper,
}

impl EditingController {
    pub fn new(block_filler: BlockFillerMode) -> Self {
        Self {
            view: View::new(block_filler),
            mapper: Mapper::new(),
        }
    }

    /// Create the view root for a model root and bind the two. The root's
    /// current content is not converted.
    pub fn attach_root(&mut self, model: &Model, name: &str) -> EngineResult<ViewNodeId> {
        let model_root = model.document().get_root(name)?;
        let view_root = match self.view.document.root(name) {
            Some(view_root) => view_root,
            None => self.view.create_root(name, VIEW_ROOT_ELEMENT)?,
        };
        self.mapper.bind_elements(model_root, view_root);
        Ok(view_root)
    }

    pub fn detach_root(&mut self, name: &str) -> EngineResult<()> {
        if let Some(view_root) = self.view.document.root(name) {
            self.mapper.unbind_view_element(&self.view.document.tree, view_root);
            self.view.detach_root(name)?;
        }
        Ok(())
    }

    fn apply_root_change(&mut self, model: &Model, change: &RootChange) -> EngineResult<Option<ViewNodeId>> {
        match (change.was_attached, change.is_attached) {
            (false, true) => self.attach_root(model, &change.name).map(Some),
            (true, false) => self.detach_root(&change.name).map(|_| None),
            _ => Ok(None),
        }
    }

    /// Convert flushed model changes and the model selection into the view,
    /// then render once
    #[instrument(level = "debug", skip_all, fields(changes = changes.changes.len()))]
    pub fn convert(&mut self, model: &Model, changes: &ChangeSet, dispatcher: &DowncastDispatcher) -> EngineResult<RenderStats> {
        let mut attached = Vec::new();
        for change in &changes.root_changes {
            if let Some(view_root) = self.apply_root_change(model, change)? {
                attached.push((change.name.clone(), view_root));
            }
        }

        let document = model.document();
        let view_document = &mut self.view.document;
        let old_caret = view_document
            .selection
            .is_collapsed()
            .then(|| view_document.selection.first_position())
            .flatten();
        let mut writer = DowncastWriter::new(&mut view_document.tree, &mut view_document.selection);
        // Attribute elements left empty around the previous caret go away.
        if let Some(caret) = old_caret {
            writer.merge_attributes(caret)?;
        }

        let mut api = DowncastApi::new(document, model.schema(), writer, &mut self.mapper, false);
        dispatcher.convert_changes(changes, &mut api)?;
        for (name, view_root) in attached {
            if api.writer.tree().child_count(view_root) == 0 && !document.is_root_empty(&name) {
                dispatcher.convert_insert(&document.range_in_root(&name)?, &mut api)?;
            }
        }
        dispatcher.convert_selection(&mut api)?;

        let stats = self.view.force_render();
        debug!(?stats, "editing view rendered");
        Ok(stats)
    }

    /// Convert a whole root from scratch, replacing what the view shows
    pub fn convert_root(&mut self, model: &Model, name: &str, dispatcher: &DowncastDispatcher) -> EngineResult<RenderStats> {
        let document = model.document();
        let view_root = self.attach_root(model, name)?;
        let view_document = &mut self.view.document;
        let mut writer = DowncastWriter::new(&mut view_document.tree, &mut view_document.selection);
        let content = ViewRange::inside(writer.tree(), view_root);
        for node in writer.remove(content)? {
            self.mapper.unbind_view_element(writer.tree(), node);
        }

        let mut api = DowncastApi::new(document, model.schema(), writer, &mut self.mapper, false);
        dispatcher.convert_insert(&document.range_in_root(name)?, &mut api)?;
        dispatcher.convert_selection(&mut api)?;
        Ok(self.view.force_render())
    }

    /// Map view ranges, e.g. a selection made in the DOM, to model ranges
    pub fn to_model_ranges(&self, model: &Model, ranges: &[ViewRange]) -> EngineResult<Vec<Range>> {
        ranges
            .iter()
            .map(|range| {
                self.mapper
                    .to_model_range(model.document(), &self.view.document.tree, range)
            })
            .collect()
    }

    pub fn dom_html(&self, root: &str) -> Option<String> {
        self.view.dom_html(root)
    }
}
