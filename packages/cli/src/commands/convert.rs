use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::{load_editor, print_root};

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// HTML file to load
    pub input: PathBuf,

    /// Root to load the file into (defaults to the first configured root)
    #[arg(short, long)]
    pub root: Option<String>,

    /// Also print the editing view DOM
    #[arg(short, long)]
    pub editing: bool,
}

pub fn convert(args: ConvertArgs, config_dir: &str) -> Result<()> {
    println!("{} {}", "🔄 Converting".green().bold(), args.input.display());

    let (editor, root) = load_editor(config_dir, &args.input, args.root.as_deref())?;
    print_root(&editor, &root, args.editing)?;
    Ok(())
}
