use criterion::{Criterion, criterion_group, criterion_main};
use trellis_engine::commands::{Intent, chain, run_chain};
use trellis_engine::markup::{MarkdownOptions, from_markdown, to_markdown};
use trellis_engine::state::{EditorState, Selection};
use trellis_engine::transform::Mappable;
mod common;

/// Position of the start of the text in the middle list item.
fn middle_item_start(doc: &trellis_engine::Node) -> usize {
    let mut starts = Vec::new();
    doc.descendants(
        &mut |node: &trellis_engine::Node, pos: usize, _: Option<&trellis_engine::Node>, _: usize| {
            if node.is_textblock() && pos > 0 {
                starts.push(pos + 1);
            }
            true
        },
    );
    starts[starts.len() / 2]
}

fn bench_list_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_commands");
    group.sample_size(10);

    let doc = from_markdown(&common::generate_list_markdown(200, 3)).unwrap();
    let pos = middle_item_start(&doc);
    let state = EditorState::new(doc.clone(), Selection::cursor(&doc, pos).unwrap());

    for intent in [
        Intent::Enter,
        Intent::Backspace,
        Intent::Delete,
        Intent::Tab,
        Intent::ShiftTab,
    ] {
        group.bench_function(intent.name(), |b| {
            b.iter(|| {
                let result = run_chain(std::hint::black_box(&state), chain(intent));
                std::hint::black_box(result);
            });
        });
    }

    group.bench_function("apply_and_map", |b| {
        b.iter(|| {
            let (_, tr) = run_chain(&state, chain(Intent::Enter)).unwrap();
            let next = state.apply(&tr).unwrap();
            std::hint::black_box(tr.mapping().map(pos, trellis_engine::transform::Assoc::After));
            std::hint::black_box(next);
        });
    });

    group.finish();
}

fn bench_markup(c: &mut Criterion) {
    let mut group = c.benchmark_group("markup");
    group.sample_size(10);

    let content = common::generate_mixed_markdown(100);
    group.bench_function("from_markdown", |b| {
        b.iter(|| std::hint::black_box(from_markdown(std::hint::black_box(&content)).unwrap()));
    });

    let doc = from_markdown(&content).unwrap();
    group.bench_function("to_markdown", |b| {
        b.iter(|| std::hint::black_box(to_markdown(&doc, &MarkdownOptions::default())));
    });

    group.finish();
}

criterion_group!(benches, bench_list_commands, bench_markup);
criterion_main!(benches);
