//! Criterion benchmarks for the state machine runtime.
//!
//! Run with: cargo bench -p vizij-state-machine-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vizij_state_machine_core::{
    bake_state_machine, Config, ParameterBuffers, StateMachineAsset, StateMachineInstance,
};

const INSTANCE_COUNTS: &[usize] = &[1, 64, 1024];
const DT: f32 = 1.0 / 60.0;

fn locomotion() -> StateMachineAsset {
    vizij_test_fixtures::state_machines::load("locomotion").expect("load fixture")
}

fn bench_tick(c: &mut Criterion) {
    let cfg = Config::default();
    let blob = bake_state_machine(&locomotion(), &cfg).expect("bake");
    let mut group = c.benchmark_group("advance");

    for &count in INSTANCE_COUNTS {
        group.bench_with_input(BenchmarkId::new("steady_blend", count), &count, |b, &count| {
            let mut params = ParameterBuffers::from_layout(&blob.parameters);
            params.set_bool_by_name("Moving", true);
            params.set_float_by_name("Speed", 2.0);
            let mut instances: Vec<_> = (0..count).map(|_| StateMachineInstance::new(&blob, &cfg)).collect();
            b.iter(|| {
                for inst in instances.iter_mut() {
                    black_box(inst.advance(&blob, black_box(DT), &params).samples.len());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("toggling", count), &count, |b, &count| {
            let mut params = ParameterBuffers::from_layout(&blob.parameters);
            let mut instances: Vec<_> = (0..count).map(|_| StateMachineInstance::new(&blob, &cfg)).collect();
            let mut frame = 0u32;
            b.iter(|| {
                frame = frame.wrapping_add(1);
                params.set_bool_by_name("Moving", frame % 30 < 15);
                for inst in instances.iter_mut() {
                    black_box(inst.advance(&blob, DT, &params).phase);
                }
            });
        });
    }
    group.finish();
}

fn bench_bake(c: &mut Criterion) {
    let asset = locomotion();
    let cfg = Config::default();
    c.bench_function("bake_locomotion", |b| {
        b.iter(|| black_box(bake_state_machine(black_box(&asset), &cfg)))
    });
}

criterion_group!(benches, bench_tick, bench_bake);
criterion_main!(benches);
