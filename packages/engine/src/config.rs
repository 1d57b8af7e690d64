use std::collections::BTreeMap;
use std::path::Path;

use folio_view::BlockFillerMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::EngineResult;

pub const DEFAULT_CONFIG_NAME: &str = "folio.config.json";

/// What upcasting does with view elements no converter claimed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownContentPolicy {
    /// Drop the element together with its content
    Drop,
    /// Convert the element's children in its place
    #[default]
    Unwrap,
    /// Keep block elements as generic `htmlElement` model elements
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingOption {
    /// Model element name, e.g. `heading1`
    pub model: String,
    /// View element name, e.g. `h2`
    pub view: String,
    pub title: String,
}

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Names of the editable roots
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,

    /// HTML loaded into roots when the editor starts
    #[serde(default)]
    pub initial_data: BTreeMap<String, String>,

    /// Maximum number of undo steps kept
    #[serde(default = "default_undo_steps")]
    pub undo_steps: usize,

    #[serde(default)]
    pub unknown_content: UnknownContentPolicy,

    /// Put a paragraph into roots left empty
    #[serde(default = "default_true")]
    pub auto_paragraph: bool,

    /// Filler rendered into empty blocks of the editing view
    #[serde(default)]
    pub block_filler: BlockFillerMode,

    #[serde(default = "default_headings")]
    pub headings: Vec<HeadingOption>,

    #[serde(default = "default_alignments")]
    pub alignments: Vec<String>,
}

fn default_roots() -> Vec<String> {
    vec!["main".to_string()]
}

fn default_undo_steps() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_headings() -> Vec<HeadingOption> {
    [("heading1", "h2", "Heading 1"), ("heading2", "h3", "Heading 2"), ("heading3", "h4", "Heading 3")]
        .into_iter()
        .map(|(model, view, title)| HeadingOption {
            model: model.to_string(),
            view: view.to_string(),
            title: title.to_string(),
        })
        .collect()
}

fn default_alignments() -> Vec<String> {
    ["left", "right", "center", "justify"].map(String::from).to_vec()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            initial_data: BTreeMap::new(),
            undo_steps: default_undo_steps(),
            unknown_content: UnknownContentPolicy::default(),
            auto_paragraph: true,
            block_filler: BlockFillerMode::default(),
            headings: default_headings(),
            alignments: default_alignments(),
        }
    }
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults when the
    /// directory has no config file
    pub fn load(dir: impl AsRef<Path>) -> EngineResult<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: EditorConfig = serde_json::from_str(&content)?;
            debug!(path = %config_path.display(), "editor config loaded");
            Ok(config)
        } else {
            Ok(EditorConfig::default())
        }
    }

    pub fn heading(&self, model: &str) -> Option<&HeadingOption> {
        self.headings.iter().find(|option| option.model == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "roots": ["title", "body"],
            "initialData": { "body": "<p>Hi</p>" },
            "undoSteps": 20,
            "unknownContent": "preserve",
            "blockFiller": "nbsp",
            "headings": [{ "model": "heading1", "view": "h1", "title": "Title" }]
        }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.roots, vec!["title", "body"]);
        assert_eq!(config.initial_data["body"], "<p>Hi</p>");
        assert_eq!(config.undo_steps, 20);
        assert_eq!(config.unknown_content, UnknownContentPolicy::Preserve);
        assert_eq!(config.block_filler, BlockFillerMode::Nbsp);
        assert!(config.auto_paragraph);
        assert_eq!(config.heading("heading1").unwrap().view, "h1");
        assert_eq!(config.alignments.len(), 4);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.roots, vec!["main"]);
        assert_eq!(config.undo_steps, 100);
        assert_eq!(config.unknown_content, UnknownContentPolicy::Unwrap);
        assert_eq!(config.heading("heading2").unwrap().view, "h3");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("folio-config-missing");
        let config = EditorConfig::load(&dir).unwrap();
        assert_eq!(config, EditorConfig::default());
    }
}
