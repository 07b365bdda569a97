use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use tickrules::{Encode, RuleSet};

/// A rule set document with `n` rules, each watching the previous rule's output
/// and carrying a view, a filtered selector and nested effects.
fn build_document(n: usize) -> Value {
    let rules: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "name": format!("r{i}"),
                "priority": i % 7,
                "trigger": {"type": "OnChange", "watch": [format!("$.Stage[{i}].value")]},
                "selector": {"type": "Filter", "entity": "Units",
                             "where": {"hp": {">": 0}, "team": "red"}},
                "views": {
                    "near": {"source": "Units", "pipeline": [
                        {"type": "Distance", "origin": "$.Base.position", "unit": "km"},
                        {"type": "Filter", "where": {"distance": {"<": 5}}},
                        {"type": "Sort", "by": "distance"},
                        {"type": "Limit", "count": 3}
                    ]}
                },
                "effects": [
                    {"path": format!("$.Stage[{}].value", i + 1),
                     "value": {"type": "Add", "left": format!("$.Stage[{i}].value"), "right": 1}},
                    {"type": "If",
                     "condition": {"left": "$.World.alarm", "op": "==", "right": true},
                     "then": [{"type": "Emit", "event": "alarm", "payload": {"stage": i}}]}
                ]
            })
        })
        .collect();
    json!({"version": "1", "package": "bench", "rules": rules})
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &n in &[5, 50, 500] {
        let doc = build_document(n);
        group.bench_function(&format!("{n}_rules_document"), |b| {
            b.iter(|| RuleSet::from_document(black_box(&doc)).unwrap());
        });

        let text = serde_json::to_string(&doc).unwrap();
        group.bench_function(&format!("{n}_rules_json_str"), |b| {
            b.iter(|| RuleSet::from_json_str(black_box(&text)).unwrap());
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for &n in &[5, 50, 500] {
        let ruleset = RuleSet::from_document(&build_document(n)).unwrap();
        group.bench_function(&format!("{n}_rules"), |b| {
            b.iter(|| black_box(&ruleset).encode());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
