//! Benchmarks for task graph operations
//!
//! Run with: cargo bench -p kiln-graph

#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kiln_graph::{Graph, descendants, find_cycle};
use std::hint::black_box;

/// A wide graph: `count` tasks all depending directly on a single root.
fn generate_wide_graph(count: usize) -> Graph<usize> {
    let mut graph = Graph::new();
    let root = graph.add_node(0);
    for i in 0..count {
        let n = graph.add_node(i + 1);
        graph.add_edge(n, root).unwrap();
    }
    graph
}

/// A deep graph: a linear dependency chain of the given depth.
fn generate_deep_graph(depth: usize) -> Graph<usize> {
    let mut graph = Graph::new();
    let mut prev = graph.add_node(0);
    for i in 1..depth {
        let n = graph.add_node(i);
        graph.add_edge(n, prev).unwrap();
        prev = n;
    }
    graph
}

/// A diamond graph: fan-out from a root, then fan-in to a final node.
fn generate_diamond_graph(width: usize, depth: usize) -> Graph<usize> {
    let mut graph = Graph::new();
    let root = graph.add_node(0);
    let mut prev_level = vec![root];

    for _ in 0..depth {
        let mut current_level = Vec::new();
        for _ in 0..width {
            let n = graph.add_node(current_level.len());
            for &p in &prev_level {
                graph.add_edge(n, p).unwrap();
            }
            current_level.push(n);
        }
        prev_level = current_level;
    }

    let final_node = graph.add_node(usize::MAX);
    for &p in &prev_level {
        graph.add_edge(final_node, p).unwrap();
    }
    graph
}

fn benchmark_descendants_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("descendants_wide");
    for count in [50, 100, 200, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let graph = generate_wide_graph(count);
            let root = graph.node_ids().next().unwrap();
            b.iter(|| black_box(descendants(&graph, root)));
        });
    }
    group.finish();
}

fn benchmark_descendants_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("descendants_deep_chain");
    for depth in [10, 20, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let graph = generate_deep_graph(depth);
            let tip = graph.node_ids().last().unwrap();
            b.iter(|| black_box(descendants(&graph, tip)));
        });
    }
    group.finish();
}

fn benchmark_diamond_descendants(c: &mut Criterion) {
    let mut group = c.benchmark_group("diamond_graph_descendants");
    for (width, depth) in [(5, 5), (10, 5), (5, 10), (10, 10)] {
        let label = format!("w{width}_d{depth}");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(width, depth),
            |b, &(width, depth)| {
                let graph = generate_diamond_graph(width, depth);
                let final_node = graph.node_ids().last().unwrap();
                b.iter(|| black_box(descendants(&graph, final_node)));
            },
        );
    }
    group.finish();
}

fn benchmark_cycle_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_detection");
    for count in [100, 500, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let graph = generate_wide_graph(count);
            b.iter(|| black_box(find_cycle(&graph)));
        });
    }
    group.finish();
}

fn benchmark_graph_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_construction");
    for count in [100, 500, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let graph = generate_wide_graph(count);
                black_box(graph)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_descendants_wide,
    benchmark_descendants_deep,
    benchmark_diamond_descendants,
    benchmark_cycle_detection,
    benchmark_graph_construction,
);

criterion_main!(benches);
