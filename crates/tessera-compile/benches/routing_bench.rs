//! Benchmarks for layout and routing.
//!
//! Run with: cargo bench -p tessera-compile

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use tessera_compile::passes::{InteractionLayout, SabreLayout, SabreRouting};
use tessera_compile::{BasisGates, CouplingMap, Layout, Pass, PropertySet, Target, TranspileConfig, transpile};
use tessera_ir::{Circuit, CircuitDag, QubitId};

fn random_circuit(num_qubits: u32, num_cx: usize, seed: u64) -> CircuitDag {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut circuit = Circuit::with_size("bench", num_qubits as usize, 0);
    for _ in 0..num_cx {
        let a = rng.gen_range(0..num_qubits);
        let mut b = rng.gen_range(0..num_qubits - 1);
        if b >= a {
            b += 1;
        }
        circuit.h(QubitId(a)).unwrap();
        circuit.cx(QubitId(a), QubitId(b)).unwrap();
    }
    circuit.into_dag()
}

fn grid_target(side: u32) -> Arc<Target> {
    Arc::new(Target::from_coupling(CouplingMap::grid(side, side), &BasisGates::ibm()))
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sabre_routing");
    for &side in &[3u32, 5, 7] {
        let n = side * side;
        let dag = random_circuit(n, 200, 1);
        let props = PropertySet::new()
            .with_target(grid_target(side))
            .with_layout(Layout::trivial(n));
        group.bench_with_input(BenchmarkId::new("grid", n), &dag, |b, dag| {
            b.iter_batched(
                || (dag.clone(), props.clone()),
                |(mut d, mut p)| SabreRouting::default().run(&mut d, &mut p).unwrap(),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let dag = random_circuit(16, 100, 2);
    let props = PropertySet::new().with_target(grid_target(5));
    c.bench_function("sabre_layout_16q", |b| {
        b.iter(|| SabreLayout::default().run(&mut dag.clone(), &mut props.clone()).unwrap());
    });
    c.bench_function("interaction_layout_16q", |b| {
        b.iter(|| InteractionLayout::default().run(&mut dag.clone(), &mut props.clone()).unwrap());
    });
}

fn bench_transpile(c: &mut Criterion) {
    let target = grid_target(4);
    let dag = Circuit::qft(8).unwrap().into_dag();
    let mut group = c.benchmark_group("transpile_qft8");
    for level in 0..=3u8 {
        let config = TranspileConfig::with_optimization_level(level);
        group.bench_with_input(BenchmarkId::from_parameter(level), &config, |b, config| {
            b.iter(|| black_box(transpile(dag.clone(), target.clone(), config).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_routing, bench_layout, bench_transpile);
criterion_main!(benches);
