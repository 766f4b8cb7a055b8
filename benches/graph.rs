use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use graphpack::{Object, Registry, RegistryBuilder, Serializer, Timestamp, Value};
use rand::prelude::*;
use std::sync::Arc;

/// A random graph of `nodes` objects, each pointing at a few earlier or later nodes, so the
/// result is full of shared references and cycles.
fn random_graph(rng: &mut StdRng, nodes: usize) -> Value {
    let objects: Vec<Object> = (0..nodes).map(|_| Object::generic("Node")).collect();
    for (i, obj) in objects.iter().enumerate() {
        obj.set("id", i);
        obj.set("weight", rng.gen_range(-1000..1000) as f64 / 8.0);
        obj.set("at", Timestamp::from_sec(rng.gen_range(0..2_000_000_000)));
        let links: Vec<Value> = (0..rng.gen_range(1..4))
            .map(|_| Value::Object(objects[rng.gen_range(0..nodes)].clone()))
            .collect();
        obj.set("links", Value::seq(links));
    }
    Value::seq(objects.into_iter().map(Value::Object).collect::<Vec<_>>())
}

// Node links are the only cycles; cutting them lets a decoded graph drop.
fn unlink(graph: &Value) {
    if let Some(nodes) = graph.as_seq() {
        for node in nodes.borrow().iter() {
            if let Some(obj) = node.as_object() {
                obj.set("links", Value::Null);
            }
        }
    }
}

fn serializer() -> Serializer {
    let registry: Registry = RegistryBuilder::with_builtins()
        .register_object("Node")
        .build();
    Serializer::new(Arc::new(registry))
}

fn encode_graph(c: &mut Criterion) {
    let s = serializer();
    let mut group = c.benchmark_group("encode");
    for nodes in [10usize, 100, 1000] {
        let mut rng = StdRng::seed_from_u64(0xDEAD_BEEF);
        let graph = random_graph(&mut rng, nodes);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &graph, |b, g| {
            b.iter(|| s.encode(black_box(g)).unwrap())
        });
    }
    group.finish();
}

fn decode_graph(c: &mut Criterion) {
    let s = serializer();
    let mut group = c.benchmark_group("decode");
    for nodes in [10usize, 100, 1000] {
        let mut rng = StdRng::seed_from_u64(0xDEAD_BEEF);
        let text = s.encode(&random_graph(&mut rng, nodes)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &text, |b, t| {
            b.iter(|| unlink(&s.decode(black_box(t)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, encode_graph, decode_graph);
criterion_main!(benches);
