use criterion::{black_box, criterion_group, criterion_main, Criterion};
use folio_model::dev_utils::set_data;
use folio_model::{Attributes, Model, Position, SchemaItemDefinition};

fn model_with(data: &str) -> Model {
    let mut model = Model::new();
    model
        .schema_mut()
        .register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
    model.document_mut().create_root("main", "$root").unwrap();
    set_data(&mut model, "main", data).unwrap();
    model.flush_changes();
    model
}

fn typing(c: &mut Criterion) {
    c.bench_function("type_200_characters", |b| {
        b.iter(|| {
            let mut model = model_with("<paragraph></paragraph>");
            for i in 0..200 {
                model
                    .change(|writer| {
                        writer.insert_text("a", Attributes::new(), &Position::new("main", vec![0, i]))?;
                        Ok(())
                    })
                    .unwrap();
            }
            black_box(model.flush_changes())
        })
    });
}

fn differ_large_paragraph(c: &mut Criterion) {
    let text = "lorem ipsum dolor sit amet ".repeat(200);
    let data = format!("<paragraph>{text}</paragraph>");

    c.bench_function("differ_large_paragraph", |b| {
        b.iter(|| {
            let mut model = model_with(&data);
            model
                .change(|writer| {
                    writer.insert_text("x", Attributes::new(), &Position::new("main", vec![0, 2500]))?;
                    Ok(())
                })
                .unwrap();
            black_box(model.document().changes())
        })
    });
}

criterion_group!(benches, typing, differ_large_paragraph);
criterion_main!(benches);
