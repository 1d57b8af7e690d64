use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_view::{View, ViewNodeId, ViewPosition, ViewRange};

fn view_with_paragraphs(count: usize) -> (View, Vec<ViewNodeId>) {
    let mut view = View::default();
    let root = view.create_root("main", "div").unwrap();
    let texts = view.change(|writer| {
        let mut texts = Vec::with_capacity(count);
        for index in 0..count {
            let p = writer.create_container_element("p", []);
            let text = writer.create_text("lorem ipsum dolor sit amet");
            writer.insert(ViewPosition::new(p, 0), vec![text]).unwrap();
            writer.insert(ViewPosition::new(root, index), vec![p]).unwrap();
            texts.push(text);
        }
        texts
    });
    (view, texts)
}

fn render_initial(c: &mut Criterion) {
    c.bench_function("render_500_paragraphs", |b| {
        b.iter(|| black_box(view_with_paragraphs(500)))
    });
}

fn render_typing(c: &mut Criterion) {
    c.bench_function("render_typing_in_large_document", |b| {
        b.iter(|| {
            let (mut view, texts) = view_with_paragraphs(200);
            let target = texts[100];
            for offset in 0..50 {
                view.change(|writer| {
                    let text = writer.create_text("x");
                    writer.insert(ViewPosition::new(target, offset), vec![text]).unwrap();
                    writer.set_selection(vec![ViewRange::collapsed(ViewPosition::new(target, offset + 1))], false);
                });
            }
            black_box(view.dom_html("main"))
        })
    });
}

fn render_bold_runs(c: &mut Criterion) {
    c.bench_function("render_bold_every_other_word", |b| {
        b.iter(|| {
            let (mut view, texts) = view_with_paragraphs(20);
            for &text in &texts {
                view.change(|writer| {
                    let strong = writer.create_attribute_element("strong", []);
                    writer
                        .wrap(ViewRange::new(ViewPosition::new(text, 6), ViewPosition::new(text, 11)), strong)
                        .unwrap();
                });
            }
            black_box(view.render_count())
        })
    });
}

criterion_group!(benches, render_initial, render_typing, render_bold_runs);
criterion_main!(benches);
