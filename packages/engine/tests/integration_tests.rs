//! Integration tests for the engine crate

use anyhow::Result;
use folio_engine::model::dev_utils::get_data;
use folio_engine::model::{Attributes, Position, Range, SchemaItemDefinition};
use folio_engine::{Editor, EditorConfig, UnknownContentPolicy};
use serde_json::json;

fn editor_with(data: &str) -> Result<Editor> {
    let mut editor = Editor::new(EditorConfig::default())?;
    editor.set_data("main", data)?;
    Ok(editor)
}

fn select(editor: &mut Editor, start: Vec<usize>, end: Vec<usize>) -> Result<()> {
    editor.change(|writer| {
        writer.set_selection(
            vec![Range::new(Position::new("main", start), Position::new("main", end))],
            false,
        );
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_insert_paragraph_then_undo() -> Result<()> {
    let config = EditorConfig {
        auto_paragraph: false,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(config)?;
    assert_eq!(get_data(&editor.model, "main", false)?, "");

    editor.change(|writer| {
        writer.insert_element("paragraph", Attributes::new(), &Position::new("main", vec![0]))?;
        writer.insert_text("foo", Attributes::new(), &Position::new("main", vec![0, 0]))?;
        Ok(())
    })?;
    assert_eq!(get_data(&editor.model, "main", false)?, "<paragraph>foo</paragraph>");
    assert_eq!(editor.dom_html("main").unwrap(), "<p>foo</p>");

    assert!(editor.execute("undo", &json!({}))?);
    assert_eq!(get_data(&editor.model, "main", false)?, "");
    assert!(!editor.dom_html("main").unwrap().contains("<p>"));
    assert_eq!(editor.get_data("main")?, "");

    assert!(editor.execute("redo", &json!({}))?);
    assert_eq!(editor.get_data("main")?, "<p>foo</p>");
    Ok(())
}

#[test]
fn test_enter_splits_paragraph() -> Result<()> {
    let mut editor = editor_with("<p>foobar</p>")?;
    select(&mut editor, vec![0, 3], vec![0, 3])?;
    editor.execute("enter", &json!({}))?;
    assert_eq!(
        get_data(&editor.model, "main", true)?,
        "<paragraph>foo</paragraph><paragraph>[]bar</paragraph>"
    );
    assert_eq!(editor.dom_html("main").unwrap(), "<p>foo</p><p>bar</p>");

    select(&mut editor, vec![1, 3], vec![1, 3])?;
    editor.execute("enter", &json!({}))?;
    assert_eq!(editor.get_data("main")?, "<p>foo</p><p>bar</p><p>&nbsp;</p>");
    Ok(())
}

#[test]
fn test_bold_skips_disallowed_inline_element() -> Result<()> {
    let mut editor = editor_with("<p>foo</p>")?;
    editor
        .model
        .schema_mut()
        .register("softBreak", SchemaItemDefinition::default().allow_where("$text"));
    editor.change(|writer| {
        writer.insert_element("softBreak", Attributes::new(), &Position::new("main", vec![0, 2]))?;
        Ok(())
    })?;
    select(&mut editor, vec![0, 0], vec![0, 4])?;

    assert!(editor.execute("bold", &json!({}))?);
    assert_eq!(
        get_data(&editor.model, "main", false)?,
        "<paragraph><$text bold=\"true\">fo</$text><softBreak></softBreak><$text bold=\"true\">o</$text></paragraph>"
    );
    assert_eq!(editor.commands.get("bold").unwrap().value(), Some(&json!(true)));
    Ok(())
}

#[test]
fn test_delete_across_styled_runs_merges_text() -> Result<()> {
    let mut editor = editor_with("<p>foo<strong>bar</strong>baz</p>")?;
    select(&mut editor, vec![0, 2], vec![0, 7])?;
    editor.execute("delete", &json!({}))?;

    assert_eq!(get_data(&editor.model, "main", true)?, "<paragraph>fo[]az</paragraph>");
    assert_eq!(editor.dom_html("main").unwrap(), "<p>foaz</p>");
    assert_eq!(editor.get_data("main")?, "<p>foaz</p>");
    Ok(())
}

#[test]
fn test_typing_with_stored_bold() -> Result<()> {
    let mut editor = editor_with("<p>foo</p>")?;
    select(&mut editor, vec![0, 3], vec![0, 3])?;
    editor.execute("bold", &json!({}))?;
    editor.execute("insertText", &json!({ "text": "x" }))?;

    assert_eq!(
        get_data(&editor.model, "main", false)?,
        "<paragraph>foo<$text bold=\"true\">x</$text></paragraph>"
    );
    assert_eq!(editor.get_data("main")?, "<p>foo<strong>x</strong></p>");
    Ok(())
}

#[test]
fn test_block_commands_round_trip() -> Result<()> {
    let mut editor = editor_with("<p>abc</p><p>d</p>")?;
    select(&mut editor, vec![0, 1], vec![0, 1])?;
    editor.execute("heading", &json!({ "value": "heading1" }))?;
    select(&mut editor, vec![1, 0], vec![1, 0])?;
    editor.execute("alignment", &json!({ "value": "center" }))?;

    let data = editor.get_data("main")?;
    assert_eq!(data, "<h2>abc</h2><p style=\"text-align:center;\">d</p>");

    let reloaded = editor_with(&data)?;
    assert_eq!(
        get_data(&reloaded.model, "main", false)?,
        "<heading1>abc</heading1><paragraph alignment=\"center\">d</paragraph>"
    );
    Ok(())
}

#[test]
fn test_horizontal_line_widget() -> Result<()> {
    let mut editor = editor_with("<p>foo</p>")?;
    select(&mut editor, vec![0, 3], vec![0, 3])?;
    editor.execute("horizontalLine", &json!({}))?;

    assert_eq!(
        get_data(&editor.model, "main", true)?,
        "<paragraph>foo</paragraph><horizontalLine></horizontalLine><paragraph>[]</paragraph>"
    );
    assert_eq!(editor.get_data("main")?, "<p>foo</p><hr><p>&nbsp;</p>");
    assert!(editor
        .dom_html("main")
        .unwrap()
        .contains("<div class=\"ck-horizontal-line ck-widget\" contenteditable=\"false\"><hr></div>"));
    Ok(())
}

#[test]
fn test_highlight_marker_is_editing_only() -> Result<()> {
    let mut editor = editor_with("<p>foo</p>")?;
    editor.change(|writer| {
        let range = Range::new(Position::new("main", vec![0, 0]), Position::new("main", vec![0, 3]));
        writer.add_marker("highlight:1", range, false, false)
    })?;
    assert!(editor
        .dom_html("main")
        .unwrap()
        .contains("<span class=\"highlight\">foo</span>"));
    assert_eq!(editor.get_data("main")?, "<p>foo</p>");

    editor.change(|writer| writer.remove_marker("highlight:1"))?;
    let dom = editor.dom_html("main").unwrap();
    assert!(dom.contains("foo"));
    assert!(!dom.contains("highlight"));
    Ok(())
}

#[test]
fn test_unknown_content_policies() -> Result<()> {
    let html = "<section class=\"note\"><p>foo</p></section>";

    let unwrap = editor_with(html)?;
    assert_eq!(unwrap.get_data("main")?, "<p>foo</p>");

    let config = EditorConfig {
        unknown_content: UnknownContentPolicy::Preserve,
        ..EditorConfig::default()
    };
    let mut preserve = Editor::new(config)?;
    preserve.set_data("main", html)?;
    assert_eq!(preserve.get_data("main")?, html);
    Ok(())
}

#[test]
fn test_set_data_is_not_undoable() -> Result<()> {
    let mut editor = editor_with("<p>foo</p>")?;
    assert!(!editor.commands.get("undo").unwrap().is_enabled());
    assert!(!editor.execute("undo", &json!({}))?);
    assert_eq!(editor.get_data("main")?, "<p>foo</p>");
    Ok(())
}

fn model_data(editor: &Editor) -> Result<String> {
    Ok(get_data(&editor.model, "main", false)?)
}

fn undo_all(editor: &mut Editor) -> Result<usize> {
    let mut steps = 0;
    while editor.execute("undo", &json!({}))? {
        steps += 1;
        assert!(steps < 100, "undo never ran out of steps");
    }
    Ok(steps)
}

fn redo_all(editor: &mut Editor) -> Result<usize> {
    let mut steps = 0;
    while editor.execute("redo", &json!({}))? {
        steps += 1;
        assert!(steps < 100, "redo never ran out of steps");
    }
    Ok(steps)
}

#[test]
fn test_undo_and_redo_across_a_later_undone_step() -> Result<()> {
    let mut editor = editor_with("<p>foo</p><p>ghij</p>")?;
    select(&mut editor, vec![1, 0], vec![1, 4])?;
    editor.execute("delete", &json!({}))?;
    let after_delete = model_data(&editor)?;

    select(&mut editor, vec![0, 0], vec![0, 0])?;
    editor.execute("insertText", &json!({ "text": "XY" }))?;
    let after_typing = model_data(&editor)?;
    assert_eq!(after_typing, "<paragraph>XYfoo</paragraph><paragraph></paragraph>");

    assert_eq!(undo_all(&mut editor)?, 2);
    assert_eq!(model_data(&editor)?, "<paragraph>foo</paragraph><paragraph>ghij</paragraph>");

    assert!(editor.execute("redo", &json!({}))?);
    assert_eq!(model_data(&editor)?, after_delete);
    assert!(editor.execute("redo", &json!({}))?);
    assert_eq!(model_data(&editor)?, after_typing);
    Ok(())
}

/// Linear congruential generator, so failures replay from the seed
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) as usize) % bound
    }
}

/// Select a random range inside one block
fn select_randomly(editor: &mut Editor, rng: &mut Lcg) -> Result<()> {
    let document = editor.model.document();
    let root = document.get_root("main")?;
    let blocks = document.tree().children(root).to_vec();
    let block = rng.below(blocks.len());
    let max = document.tree().max_offset(blocks[block]);
    let (a, b) = (rng.below(max + 1), rng.below(max + 1));
    select(editor, vec![block, a.min(b)], vec![block, a.max(b)])
}

#[test]
fn test_random_edits_undo_and_redo_completely() -> Result<()> {
    const INITIAL: &str = "<p>foo bar</p><p>baz</p><p>qux</p>";

    for seed in 0..100 {
        let mut editor = editor_with(INITIAL)?;
        let initial = model_data(&editor)?;
        let mut rng = Lcg(seed);

        let mut log = Vec::new();
        for _ in 0..8 {
            select_randomly(&mut editor, &mut rng)?;
            let text = ["a", "xy", " "][rng.below(3)];
            let (command, args) = match rng.below(4) {
                0 => ("insertText", json!({ "text": text })),
                1 => ("delete", json!({})),
                2 => ("bold", json!({})),
                _ => ("enter", json!({})),
            };
            editor.execute(command, &args)?;
            log.push(command);
        }
        let edited = model_data(&editor)?;

        undo_all(&mut editor)?;
        assert_eq!(model_data(&editor)?, initial, "seed {seed}, commands {log:?}");
        redo_all(&mut editor)?;
        assert_eq!(model_data(&editor)?, edited, "seed {seed}, commands {log:?}");
    }
    Ok(())
}
