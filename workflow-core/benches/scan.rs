//! Benchmarks for scanning and invalidating wide, layered graphs.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;
use serde_json::json;

use workflow_core::graph::{Function, Param, TaskGraph};
use workflow_core::workflow::{find_first_invalid, MemoryStore, Store, ValidityTracker};

const WIDTH: usize = 16;
const DEPTH: usize = 8;

/// `WIDTH` independent chains of `DEPTH` nodes hanging off one root.
fn layered() -> (TaskGraph, MemoryStore) {
    let echo = Function::new("echo", [Param::required("x")], |args| Ok(args[0].clone()));
    let mut graph = TaskGraph::new();
    let store = MemoryStore::new();
    store.insert("root", json!(0));
    store.set_valid("root", true);

    for lane in 0..WIDTH {
        let mut source = "root".to_string();
        for depth in 0..DEPTH {
            let name = format!("n{lane}_{depth}");
            graph
                .set(name.as_str(), &echo, vec![json!(source)], IndexMap::new())
                .expect("bind");
            store.insert(name.as_str(), json!(0));
            store.set_valid(&name, true);
            source = name;
        }
    }
    (graph, store)
}

fn scan(c: &mut Criterion) {
    let (graph, store) = layered();
    let deepest = format!("n{}_{}", WIDTH - 1, DEPTH - 1);
    store.set_valid(&deepest, false);

    c.bench_function("find_first_invalid/deepest", |b| {
        b.iter(|| find_first_invalid(black_box(&graph), &store))
    });

    c.bench_function("invalidate/root", |b| {
        let tracker = ValidityTracker::new(&graph, &store);
        b.iter(|| tracker.invalidate(black_box(["root"])))
    });
}

criterion_group!(benches, scan);
criterion_main!(benches);
