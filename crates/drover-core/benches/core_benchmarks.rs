//! Micro-benchmarks for the hot core types.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use drover_core::{AgentKind, GateOutcome, ItemStatus, ModelCompletionRecord, WorkItem};

fn bench_pipeline_walk(c: &mut Criterion) {
    c.bench_function("agent_kind_pipeline_walk", |b| {
        b.iter(|| {
            let mut kind = Some(black_box(AgentKind::Work));
            let mut steps = 0u32;
            while let Some(k) = kind {
                steps += 1;
                kind = k.next();
            }
            black_box(steps)
        })
    });
}

fn bench_item_advance(c: &mut Criterion) {
    c.bench_function("work_item_advance", |b| {
        b.iter(|| {
            let mut item = WorkItem::new("W-1", "bench item");
            for kind in AgentKind::PIPELINE {
                item.advance(ItemStatus::Active(black_box(kind)));
            }
            item.advance(ItemStatus::Done);
            black_box(item)
        })
    });
}

fn bench_record_serialization(c: &mut Criterion) {
    let record =
        ModelCompletionRecord::new("W-1", "claude-sonnet-4-5", 42.5, GateOutcome::Passed)
            .with_retries(2);
    c.bench_function("completion_record_to_json", |b| {
        b.iter(|| {
            let json = serde_json::to_string(black_box(&record));
            black_box(json)
        })
    });
}

criterion_group!(
    benches,
    bench_pipeline_walk,
    bench_item_advance,
    bench_record_serialization
);
criterion_main!(benches);
