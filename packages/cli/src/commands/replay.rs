use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use folio_engine::model::{Position, Range, Value};
use folio_engine::Editor;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use super::{load_editor, print_root};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// HTML file to load
    pub input: PathBuf,

    /// JSON array of steps to run against the loaded document
    pub script: PathBuf,

    /// Root to load the file into (defaults to the first configured root)
    #[arg(short, long)]
    pub root: Option<String>,

    /// Also print the editing view DOM
    #[arg(short, long)]
    pub editing: bool,
}

/// One step of a replay script
///
/// ```json
/// [
///   { "select": { "start": [0, 1], "end": [0, 3] } },
///   { "command": "bold" },
///   { "command": "insertText", "args": { "text": "x" } }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Select {
        select: SelectStep,
    },
    Execute {
        command: String,
        #[serde(default = "empty_args")]
        args: Value,
    },
}

/// Model selection given as paths; `end` defaults to `start`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectStep {
    #[serde(default)]
    pub root: Option<String>,
    pub start: Vec<usize>,
    #[serde(default)]
    pub end: Option<Vec<usize>>,
    #[serde(default)]
    pub backward: bool,
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Selected,
    Executed(String),
    /// The command was disabled
    Skipped(String),
}

pub fn replay(args: ReplayArgs, config_dir: &str) -> Result<()> {
    println!("{} {}", "▶️  Replaying".green().bold(), args.script.display());

    let (mut editor, root) = load_editor(config_dir, &args.input, args.root.as_deref())?;
    let script = fs::read_to_string(&args.script).with_context(|| format!("Cannot read {}", args.script.display()))?;
    let steps = parse_script(&script)?;

    for (index, outcome) in run_steps(&mut editor, &root, &steps)?.into_iter().enumerate() {
        match outcome {
            StepOutcome::Selected => println!("   {} {:>3} select", "✓".green(), index + 1),
            StepOutcome::Executed(command) => println!("   {} {:>3} {}", "✓".green(), index + 1, command),
            StepOutcome::Skipped(command) => {
                println!("   {} {:>3} {} (disabled)", "⚠".yellow(), index + 1, command)
            }
        }
    }
    println!();
    print_root(&editor, &root, args.editing)?;
    Ok(())
}

pub fn parse_script(script: &str) -> Result<Vec<Step>> {
    serde_json::from_str(script).context("Invalid replay script")
}

/// Run steps in order. Stops at the first failing step.
pub fn run_steps(editor: &mut Editor, root: &str, steps: &[Step]) -> Result<Vec<StepOutcome>> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        debug!(step = index, ?step, "replay step");
        let outcome = match step {
            Step::Select { select } => {
                let root = select.root.as_deref().unwrap_or(root);
                let end_path = select.end.clone().unwrap_or_else(|| select.start.clone());
                if select.start.is_empty() || end_path.is_empty() {
                    bail!("Step {} has an empty path", index + 1);
                }
                let start = Position::new(root, select.start.clone());
                let end = Position::new(root, end_path);
                let backward = select.backward;
                editor
                    .change(|writer| {
                        writer.set_selection(vec![Range::new(start, end)], backward);
                        Ok(())
                    })
                    .with_context(|| format!("Step {} failed", index + 1))?;
                StepOutcome::Selected
            }
            Step::Execute { command, args } => {
                let ran = editor
                    .execute(command, args)
                    .with_context(|| format!("Step {} (`{}`) failed", index + 1, command))?;
                if ran {
                    StepOutcome::Executed(command.clone())
                } else {
                    StepOutcome::Skipped(command.clone())
                }
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_engine::EditorConfig;
    use serde_json::json;

    fn editor(data: &str) -> Editor {
        let mut editor = Editor::new(EditorConfig::default()).unwrap();
        editor.set_data("main", data).unwrap();
        editor
    }

    #[test]
    fn test_parse_script() {
        let steps = parse_script(
            r#"[
                { "select": { "start": [0, 1], "end": [0, 3] } },
                { "command": "bold" },
                { "command": "insertText", "args": { "text": "x" } }
            ]"#,
        )
        .unwrap();

        assert_eq!(steps.len(), 3);
        assert!(matches!(&steps[0], Step::Select { select } if select.end == Some(vec![0, 3])));
        assert_eq!(
            steps[1],
            Step::Execute {
                command: "bold".to_string(),
                args: json!({}),
            }
        );
        assert!(parse_script("{}").is_err());
    }

    #[test]
    fn test_run_steps() {
        let mut editor = editor("<p>foo</p>");
        let steps = parse_script(
            r#"[
                { "select": { "start": [0, 1], "end": [0, 3] } },
                { "command": "bold" },
                { "command": "undo" },
                { "command": "redo" },
                { "command": "redo" }
            ]"#,
        )
        .unwrap();

        let outcomes = run_steps(&mut editor, "main", &steps).unwrap();
        assert_eq!(outcomes[0], StepOutcome::Selected);
        assert_eq!(outcomes[1], StepOutcome::Executed("bold".to_string()));
        assert_eq!(outcomes[4], StepOutcome::Skipped("redo".to_string()));
        assert_eq!(editor.get_data("main").unwrap(), "<p>f<strong>oo</strong></p>");
    }

    #[test]
    fn test_empty_selection_path_fails_the_step() {
        let mut editor = editor("<p>foo</p>");
        for script in [r#"[{ "select": { "start": [] } }]"#, r#"[{ "select": { "start": [0, 1], "end": [] } }]"#] {
            let steps = parse_script(script).unwrap();
            let err = run_steps(&mut editor, "main", &steps).unwrap_err();
            assert!(err.to_string().contains("Step 1"), "{err}");
        }
        assert_eq!(editor.get_data("main").unwrap(), "<p>foo</p>");
    }

    #[test]
    fn test_unknown_command_fails_the_step() {
        let mut editor = editor("<p>foo</p>");
        let steps = parse_script(r#"[{ "command": "nope" }]"#).unwrap();
        let err = run_steps(&mut editor, "main", &steps).unwrap_err();
        assert!(err.to_string().contains("Step 1"));
    }
}
