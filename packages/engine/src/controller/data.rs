use folio_model::{Model, Node};
use folio_view::{DataProcessor, DowncastWriter, HtmlDataProcessor, ViewSelection, ViewTree};
use tracing::{debug, instrument};

use crate::conversion::{DowncastApi, DowncastDispatcher, Mapper, UpcastDispatcher};
use crate::errors::{EngineError, EngineResult};

/// Converts between model roots and data strings
#[derive(Debug)]
pub struct DataController {
    processor: Box<dyn DataProcessor>,
}

impl Default for DataController {
    fn default() -> Self {
        Self::new(Box::new(HtmlDataProcessor::new()))
    }
}

impl DataController {
    pub fn new(processor: Box<dyn DataProcessor>) -> Self {
        Self { processor }
    }

    /// Data of one root. Runs the data pipeline on a fresh view so the
    /// editing view is not involved.
    #[instrument(level = "debug", skip(self, model, dispatcher))]
    pub fn get(&self, model: &Model, root: &str, dispatcher: &DowncastDispatcher) -> EngineResult<String> {
        let document = model.document();
        let model_root = document
            .root(root)
            .ok_or_else(|| EngineError::UnknownRoot(root.to_string()))?;
        if document.is_root_empty(root) {
            return Ok(String::new());
        }

        let mut tree = ViewTree::new();
        let mut selection = ViewSelection::default();
        let fragment = tree.create_fragment();
        let mut mapper = Mapper::new();
        mapper.bind_elements(model_root, fragment);

        let writer = DowncastWriter::new(&mut tree, &mut selection);
        let mut api = DowncastApi::new(document, model.schema(), writer, &mut mapper, true);
        dispatcher.convert_insert(&document.range_in_root(root)?, &mut api)?;

        let data = self.processor.to_data(&tree, fragment);
        debug!(length = data.len(), "data produced");
        Ok(data)
    }

    /// Parse data into model nodes allowed in the context element
    #[instrument(level = "debug", skip(self, model, dispatcher, data))]
    pub fn to_model(&self, model: &Model, data: &str, context: &str, dispatcher: &UpcastDispatcher) -> EngineResult<Vec<Node>> {
        let mut tree = ViewTree::new();
        let fragment = self.processor.to_view(&mut tree, data)?;
        dispatcher.convert(&tree, fragment, model.schema(), context)
    }
}
