use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use placer::*;

/// One top-level producer followed by a loop `i` whose inner loop `j` holds
/// `n` independent operations, then a top-level consumer. Leaving `j` from
/// its first operation walks the whole inner body.
fn generate_inner_loop(n: usize) -> String {
    let mut src = String::from("%base = load()\n%head = init(%base) in [i]\n");
    for k in 0..n {
        src.push_str(&format!("%v{} = work(%base) in [i, j] {{step = {}}}\n", k, k));
    }
    src.push_str("%tail = store(%base)\n");
    src
}

fn load(source: &str) -> ir::Program {
    resolve::load_program(source).expect("benchmark program must load")
}

// Locator: distance walked grows with the inner loop body.
fn bench_locate_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate/leave_inner_loop");

    for n in [10_usize, 100, 1_000, 10_000] {
        let program = load(&generate_inner_loop(n));
        let start = program.value("v0").expect("start value");
        let nest = program.loop_nest(start).expect("start nest").to_vec();
        group.bench_with_input(BenchmarkId::from_parameter(n), &program, |b, program| {
            b.iter(|| {
                let point = locate::find_insertion_point(
                    black_box(program),
                    start,
                    &nest,
                    1,
                    locate::Direction::After,
                );
                black_box(point)
            });
        });
    }
    group.finish();
}

// Locator: zero-distance placements should not depend on program length.
fn bench_locate_in_place(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate/in_place");

    for n in [10_usize, 10_000] {
        let program = load(&generate_inner_loop(n));
        let start = program.value("v0").expect("start value");
        let nest = program.loop_nest(start).expect("start nest").to_vec();
        let depth = nest.len();
        group.bench_with_input(BenchmarkId::from_parameter(n), &program, |b, program| {
            b.iter(|| {
                black_box(locate::find_insertion_point(
                    black_box(program),
                    start,
                    &nest,
                    depth,
                    locate::Direction::Before,
                ))
            });
        });
    }
    group.finish();
}

// Full rewrite: locate, create, forward, redirect, erase.
fn bench_replace(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite/replace_with");

    for n in [100_usize, 1_000] {
        let source = generate_inner_loop(n);
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter_batched(
                || load(&source),
                |mut program| {
                    let old = program.value("v0").expect("old value");
                    let nest = program.loop_nest(old).expect("old nest").to_vec();
                    let base = program.value("base").expect("base value");
                    let new = rewrite::replace_with(
                        &mut program,
                        old,
                        ir::OpSpec::new("work2").operand(base),
                        rewrite::Replacement {
                            target_nest: &nest,
                            depth: 1,
                            direction: locate::Direction::After,
                            ignore: &[],
                        },
                    );
                    black_box(new)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

// Loading: parse and build scale with program length.
fn bench_load_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("load/scaling");

    for n in [100_usize, 1_000, 10_000] {
        let source = generate_inner_loop(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &source, |b, source| {
            b.iter(|| black_box(resolve::load_program(black_box(source.as_str()))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_locate_scaling,
    bench_locate_in_place,
    bench_replace,
    bench_load_scaling,
);
criterion_main!(benches);
