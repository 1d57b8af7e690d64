pub mod convert;
pub mod replay;

pub use convert::{convert, ConvertArgs};
pub use replay::{replay, ReplayArgs};

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use folio_engine::model::dev_utils::get_data;
use folio_engine::{Editor, EditorConfig};
use std::fs;
use std::path::Path;
use tracing::info;

/// Editor configured from `config_dir`, with `input` loaded into `root`
/// (the first configured root when `None`). Returns the root used.
pub(crate) fn load_editor(config_dir: &str, input: &Path, root: Option<&str>) -> Result<(Editor, String)> {
    let config = EditorConfig::load(config_dir).with_context(|| format!("Cannot load config from {config_dir}"))?;
    let root = match root {
        Some(root) => root.to_string(),
        None => config
            .roots
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("The configuration has no roots"))?,
    };
    if !config.roots.contains(&root) {
        return Err(anyhow!("Root `{}` is not configured", root));
    }

    let html = fs::read_to_string(input).with_context(|| format!("Cannot read {}", input.display()))?;
    let mut editor = Editor::new(config)?;
    editor.set_data(&root, &html)?;
    info!(input = %input.display(), %root, "document loaded");
    Ok((editor, root))
}

/// Print what a root holds in the model, the editing DOM and the data
pub(crate) fn print_root(editor: &Editor, root: &str, show_editing: bool) -> Result<()> {
    println!("{} {}", "Model:".bright_blue().bold(), get_data(&editor.model, root, true)?);
    if show_editing {
        let dom = editor.dom_html(root).unwrap_or_default();
        println!("{} {}", "Editing:".bright_blue().bold(), dom);
    }
    println!("{} {}", "Data:".bright_blue().bold(), editor.get_data(root)?);
    Ok(())
}
