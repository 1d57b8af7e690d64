use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_engine::model::{Position, Range};
use folio_engine::{Editor, EditorConfig};
use serde_json::json;

fn document(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("<p>Paragraph {i} with <strong>bold</strong> and <i>italic</i> text</p>"))
        .collect()
}

fn load_document(c: &mut Criterion) {
    let data = document(200);
    c.bench_function("set_data_200_paragraphs", |b| {
        b.iter(|| {
            let mut editor = Editor::new(EditorConfig::default()).unwrap();
            editor.set_data("main", black_box(&data)).unwrap();
            editor
        })
    });
}

fn get_data(c: &mut Criterion) {
    let mut editor = Editor::new(EditorConfig::default()).unwrap();
    editor.set_data("main", &document(200)).unwrap();
    c.bench_function("get_data_200_paragraphs", |b| {
        b.iter(|| editor.get_data(black_box("main")).unwrap())
    });
}

fn typing(c: &mut Criterion) {
    let data = document(200);
    c.bench_function("type_100_characters", |b| {
        b.iter(|| {
            let mut editor = Editor::new(EditorConfig::default()).unwrap();
            editor.set_data("main", &data).unwrap();
            editor
                .change(|writer| {
                    writer.set_selection_at(Position::new("main", vec![100, 0]));
                    Ok(())
                })
                .unwrap();
            for _ in 0..100 {
                editor.execute("insertText", &json!({ "text": "a" })).unwrap();
            }
            editor
        })
    });
}

fn toggle_bold(c: &mut Criterion) {
    let mut editor = Editor::new(EditorConfig::default()).unwrap();
    editor.set_data("main", &document(200)).unwrap();
    editor
        .change(|writer| {
            let range = Range::new(Position::new("main", vec![0, 0]), Position::new("main", vec![199, 10]));
            writer.set_selection(vec![range], false);
            Ok(())
        })
        .unwrap();
    c.bench_function("toggle_bold_whole_document", |b| {
        b.iter(|| editor.execute(black_box("bold"), &json!({})).unwrap())
    });
}

criterion_group!(benches, load_document, get_data, typing, toggle_bold);
criterion_main!(benches);
