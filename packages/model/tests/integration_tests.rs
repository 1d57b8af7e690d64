//! Integration tests for the model crate

use folio_model::dev_utils::{get_data, set_data};
use folio_model::{
    transform_sets, Attributes, DiffEntry, Model, Node, Operation, Position, Range, SchemaItemDefinition, Value,
    TEXT_NAME,
};

fn pos(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn model(data: &str) -> Model {
    let mut model = Model::new();
    let schema = model.schema_mut();
    schema.register("paragraph", SchemaItemDefinition::default().inherit_all_from("$block"));
    schema.register(
        "inlineWidget",
        SchemaItemDefinition::default().allow_where(TEXT_NAME).inline().object(),
    );
    schema.extend(TEXT_NAME, SchemaItemDefinition::default().allow_attributes(&["bold"]));
    model.document_mut().create_root("main", "$root").unwrap();
    set_data(&mut model, "main", data).unwrap();
    model.take_closed_batches();
    model.flush_changes();
    model
}

/// Apply a batch's operations reversed, last first
fn reverse_last_batch(model: &mut Model) {
    let batch = model.take_closed_batches().pop().expect("a closed batch");
    model
        .change(|writer| {
            for operation in batch.operations.iter().rev() {
                writer.apply_operation(operation.reversed())?;
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_insert_paragraph_then_reverse() {
    let mut model = model("<paragraph>foo</paragraph>");
    let version = model.document().version();

    model
        .change(|writer| {
            let paragraph = writer.insert_element("paragraph", Attributes::new(), &pos(&[1]))?;
            let start = writer.document().position_at(paragraph, 0)?;
            writer.insert_text("bar", Attributes::new(), &start)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        get_data(&model, "main", false).unwrap(),
        "<paragraph>foo</paragraph><paragraph>bar</paragraph>"
    );

    reverse_last_batch(&mut model);
    assert_eq!(get_data(&model, "main", false).unwrap(), "<paragraph>foo</paragraph>");
    assert_eq!(model.document().version(), version + 4);
}

#[test]
fn test_split_at_edges() {
    let mut model = model("<paragraph>foo</paragraph>");
    model.change(|writer| writer.split(&pos(&[0, 0]), None)).unwrap();
    assert_eq!(
        get_data(&model, "main", false).unwrap(),
        "<paragraph></paragraph><paragraph>foo</paragraph>"
    );

    let mut model = self::model("<paragraph>foo</paragraph>");
    model.change(|writer| writer.split(&pos(&[0, 3]), None)).unwrap();
    assert_eq!(
        get_data(&model, "main", false).unwrap(),
        "<paragraph>foo</paragraph><paragraph></paragraph>"
    );
}

#[test]
fn test_split_keeps_attributes() {
    let mut model = model("<paragraph alignment=\"center\">foobar</paragraph>");
    model.change(|writer| writer.split(&pos(&[0, 3]), None)).unwrap();
    assert_eq!(
        get_data(&model, "main", false).unwrap(),
        "<paragraph alignment=\"center\">foo</paragraph><paragraph alignment=\"center\">bar</paragraph>"
    );
}

#[test]
fn test_texts_merge_after_remove() {
    let mut model = model("<paragraph>a<$text bold=\"true\">b</$text>a</paragraph>");
    model
        .change(|writer| writer.remove(&Range::new(pos(&[0, 1]), pos(&[0, 2]))))
        .unwrap();

    let document = model.document();
    let paragraph = document.node_after(&pos(&[0])).unwrap();
    assert_eq!(document.tree().children(paragraph).len(), 1);
    assert_eq!(get_data(&model, "main", false).unwrap(), "<paragraph>aa</paragraph>");
}

#[test]
fn test_typing_produces_one_diff_entry() {
    let mut model = model("<paragraph></paragraph>");
    model
        .change(|writer| {
            for (i, ch) in "abc".chars().enumerate() {
                writer.insert_text(&ch.to_string(), Attributes::new(), &pos(&[0, i]))?;
            }
            Ok(())
        })
        .unwrap();

    let changes = model.flush_changes().changes;
    assert_eq!(changes.len(), 1);
    match &changes[0] {
        DiffEntry::Insert { position, length, name, .. } => {
            assert_eq!(position.path, vec![0, 0]);
            assert_eq!(*length, 3);
            assert_eq!(name, TEXT_NAME);
        }
        other => panic!("unexpected entry {other:?}"),
    }
}

#[test]
fn test_bold_skips_disallowed_inline_object() {
    let mut model = model("<paragraph>ab<inlineWidget></inlineWidget>cd</paragraph>");
    model
        .change(|writer| {
            let range = Range::new(pos(&[0, 1]), pos(&[0, 4]));
            let valid = writer.schema().get_valid_ranges(writer.document(), &[range], "bold")?;
            for range in valid {
                writer.set_attribute("bold", Value::Bool(true), &range)?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(
        get_data(&model, "main", false).unwrap(),
        "<paragraph>a<$text bold=\"true\">b</$text><inlineWidget></inlineWidget><$text bold=\"true\">c</$text>d</paragraph>"
    );
}

fn apply_all(model: &mut Model, operations: Vec<Operation>) {
    model
        .change(|writer| {
            for operation in operations {
                writer.apply_operation(operation)?;
            }
            Ok(())
        })
        .unwrap();
}

/// Data after `a` then `b'`, and after `b` then `a'`, with `a` the stronger
fn both_orders(data: &str, a: &Operation, b: &Operation) -> (String, String) {
    let (a_prime, b_prime) = transform_sets(vec![a.clone()], vec![b.clone()], true);

    let mut first = model(data);
    apply_all(&mut first, vec![a.clone()]);
    apply_all(&mut first, b_prime);

    let mut second = model(data);
    apply_all(&mut second, vec![b.clone()]);
    apply_all(&mut second, a_prime);

    (
        get_data(&first, "main", false).unwrap(),
        get_data(&second, "main", false).unwrap(),
    )
}

fn assert_converges(data: &str, a: Operation, b: Operation) -> String {
    let (first, second) = both_orders(data, &a, &b);
    assert_eq!(first, second, "a = {a:?}, b = {b:?}");
    first
}

#[test]
fn test_concurrent_inserts_converge() {
    assert_converges(
        "<paragraph>abcd</paragraph>",
        Operation::insert(pos(&[0, 1]), vec![Node::text("X")]),
        Operation::insert(pos(&[0, 1]), vec![Node::text("Y")]),
    );
}

#[test]
fn test_insert_into_removed_range_converges() {
    assert_converges(
        "<paragraph>abcd</paragraph>",
        Operation::insert(pos(&[0, 2]), vec![Node::text("X")]),
        Operation::remove(pos(&[0, 1]), 2),
    );
}

#[test]
fn test_attribute_and_remove_converge() {
    assert_converges(
        "<paragraph>abcd</paragraph>",
        Operation::attribute(Range::new(pos(&[0, 0]), pos(&[0, 3])), "bold", None, Some(Value::Bool(true))),
        Operation::remove(pos(&[0, 1]), 1),
    );
}

#[test]
fn test_overlapping_removes_converge() {
    assert_converges(
        "<paragraph>abcdef</paragraph>",
        Operation::remove(pos(&[0, 1]), 3),
        Operation::remove(pos(&[0, 2]), 3),
    );
}

const TWO_PARAGRAPHS: &str = "<paragraph>abcdef</paragraph><paragraph>ghij</paragraph>";

#[test]
fn test_move_inside_removed_range_converges() {
    let data = assert_converges(
        TWO_PARAGRAPHS,
        Operation::move_range(pos(&[1, 0]), 2, pos(&[1, 3])),
        Operation::remove(pos(&[1, 0]), 4),
    );
    assert_eq!(data, "<paragraph>abcdef</paragraph><paragraph></paragraph>");

    let data = assert_converges(
        TWO_PARAGRAPHS,
        Operation::remove(pos(&[1, 0]), 4),
        Operation::move_range(pos(&[1, 0]), 2, pos(&[1, 3])),
    );
    assert_eq!(data, "<paragraph>abcdef</paragraph><paragraph></paragraph>");
}

#[test]
fn test_remove_wins_over_overlapping_move() {
    for strong_remove in [true, false] {
        let remove = Operation::remove(pos(&[0, 1]), 3);
        let moved = Operation::move_range(pos(&[0, 2]), 3, pos(&[1, 0]));
        let (a, b) = if strong_remove { (remove, moved) } else { (moved, remove) };

        let data = assert_converges(TWO_PARAGRAPHS, a, b);
        assert_eq!(data, "<paragraph>af</paragraph><paragraph>eghij</paragraph>");
    }
}

#[test]
fn test_overlapping_moves_converge() {
    let data = assert_converges(
        TWO_PARAGRAPHS,
        Operation::move_range(pos(&[0, 0]), 4, pos(&[1, 0])),
        Operation::move_range(pos(&[0, 2]), 4, pos(&[1, 4])),
    );
    assert_eq!(data, "<paragraph></paragraph><paragraph>abcdghijef</paragraph>");
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

/// A move or remove on [`TWO_PARAGRAPHS`]
fn random_move(rng: &mut Lcg) -> Operation {
    const LENGTHS: [usize; 2] = [6, 4];

    let paragraph = rng.below(2);
    let offset = rng.below(LENGTHS[paragraph]);
    let how_many = 1 + rng.below(LENGTHS[paragraph] - offset);

    match rng.below(5) {
        0 | 1 => {
            let target_paragraph = rng.below(2);
            let mut target = rng.below(LENGTHS[target_paragraph] + 1);
            if target_paragraph == paragraph && target > offset && target < offset + how_many {
                target = offset + how_many;
            }
            Operation::move_range(pos(&[paragraph, offset]), how_many, pos(&[target_paragraph, target]))
        }
        2 => Operation::remove(pos(&[paragraph, offset]), how_many),
        3 => Operation::move_range(pos(&[paragraph]), 1, pos(&[rng.below(3)])),
        _ => Operation::remove(pos(&[paragraph]), 1),
    }
}

#[test]
fn test_random_moves_and_removes_converge() {
    for seed in 0..300 {
        let mut rng = Lcg(seed);
        let a = random_move(&mut rng);
        let b = random_move(&mut rng);

        let (first, second) = both_orders(TWO_PARAGRAPHS, &a, &b);
        assert_eq!(first, second, "seed {seed}: a = {a:?}, b = {b:?}");
    }
}
