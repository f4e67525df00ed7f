//! Benchmarks for SOMA-Physics
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3;

use soma_physics::{
    compute_hull, process_hull, Bodies, BodyActivity, BodyDescription, DeterministicRng,
    DistanceTypeProcessor, IslandSleeper, SequentialDispatcher, Solver, Vec3Wide,
};

/// Chain of sleep-ready bodies linked by distance constraints.
fn chain_world(count: usize) -> (Bodies, Solver) {
    let mut bodies = Bodies::new();
    let mut solver = Solver::new();
    for i in 0..count {
        bodies.add_body(&BodyDescription {
            activity: BodyActivity::candidate(),
            ..Default::default()
        });
        if i > 0 {
            solver.add_constraint(
                &mut bodies,
                DistanceTypeProcessor::TYPE_ID,
                &[i - 1, i],
                &[1.0, 0.0],
            );
        }
    }
    (bodies, solver)
}

fn random_cloud(count: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = DeterministicRng::new(seed);
    (0..count)
        .map(|_| rng.next_direction() * rng.next_f32_range(0.5, 2.0))
        .collect()
}

// ============================================================================
// Island sleeper benchmarks
// ============================================================================

fn bench_sleeper_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("sleeper_update");
    let dispatcher = SequentialDispatcher::new(1);

    for count in [256usize, 1024] {
        group.bench_function(format!("chain_{count}"), |b| {
            b.iter(|| {
                let (mut bodies, mut solver) = chain_world(count);
                let mut sleeper = IslandSleeper::new();
                sleeper.tested_fraction_per_frame = 1.0;
                sleeper.target_slept_fraction = 1.0;
                sleeper.target_traversed_fraction = 1.0;
                black_box(sleeper.update(&mut bodies, &mut solver, &dispatcher, false))
            });
        });
    }

    group.bench_function("chain_1024_incremental", |b| {
        b.iter(|| {
            let (mut bodies, mut solver) = chain_world(1024);
            let mut sleeper = IslandSleeper::new();
            black_box(sleeper.update(&mut bodies, &mut solver, &dispatcher, false))
        });
    });

    group.finish();
}

// ============================================================================
// Convex hull benchmarks
// ============================================================================

fn bench_hull_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("hull_build");

    let mut cube = Vec::new();
    for x in [-1.0f32, 1.0] {
        for y in [-1.0f32, 1.0] {
            for z in [-1.0f32, 1.0] {
                cube.push(Vec3::new(x, y, z));
            }
        }
    }
    group.bench_function("cube_8", |b| {
        b.iter(|| black_box(compute_hull(black_box(&cube))));
    });

    for count in [64usize, 256] {
        let cloud = random_cloud(count, 42);
        group.bench_function(format!("cloud_{count}"), |b| {
            b.iter(|| black_box(compute_hull(black_box(&cloud))));
        });
    }

    let cloud = random_cloud(128, 7);
    let hull_data = compute_hull(&cloud);
    group.bench_function("process_cloud_128", |b| {
        b.iter(|| black_box(process_hull(black_box(&cloud), black_box(&hull_data))));
    });

    group.finish();
}

// ============================================================================
// Wide math benchmarks
// ============================================================================

fn bench_wide_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_math");

    let a = Vec3Wide::splat(Vec3::new(3.0, 4.0, 5.0));
    let b = Vec3Wide::splat(Vec3::new(6.0, 7.0, 8.0));

    group.bench_function("wide_dot", |bench| {
        bench.iter(|| black_box(black_box(&a).dot(black_box(&b))));
    });

    group.bench_function("wide_distance_squared", |bench| {
        bench.iter(|| black_box(black_box(&a).distance_squared(black_box(&b))));
    });

    let points = random_cloud(256, 11);
    group.bench_function("pack_256", |bench| {
        bench.iter(|| black_box(Vec3Wide::pack(black_box(&points), Vec3::ZERO)));
    });

    group.finish();
}

criterion_group!(benches, bench_sleeper_update, bench_hull_build, bench_wide_math);
criterion_main!(benches);
