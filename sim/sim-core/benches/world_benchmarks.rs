//! Benchmarks for the broad phase and the full step pipeline.
//!
//! Run with: cargo bench -p sim-core

#![allow(missing_docs, clippy::unwrap_used, clippy::cast_precision_loss)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::SlotMap;

use sim_core::{Aabb, GjkEpa, NarrowPhase, Octree, Shape, World};
use sim_types::{OctreeConfig, Pose, ShapeId, SimulationConfig};

fn random_boxes(rng: &mut StdRng, count: usize, spread: f64) -> Vec<Aabb> {
    (0..count)
        .map(|_| {
            let center = Point3::new(
                rng.gen_range(-spread..spread),
                rng.gen_range(-spread..spread),
                rng.gen_range(-spread..spread),
            );
            Aabb::from_center(center, Vector3::repeat(rng.gen_range(0.2..1.5)))
        })
        .collect()
}

/// Pile of spheres and cubes above a static ground slab.
fn pile(count: usize, seed: u64) -> World {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = SimulationConfig::default()
        .with_octree(OctreeConfig::cube(128.0).min_node_size(2.0).max_shapes_per_node(8));
    let mut world = World::new(config).unwrap();

    let ground = world.create_rigid_body(true);
    world
        .add_shape(ground, Shape::cube(Vector3::new(40.0, 40.0, 0.5)))
        .unwrap();
    world
        .set_body_pose(ground, Pose::from_position(Point3::new(0.0, 0.0, -0.5)))
        .unwrap();

    for i in 0..count {
        let body = world.create_rigid_body(false);
        let shape = if i % 4 == 0 {
            Shape::cube(Vector3::repeat(rng.gen_range(0.3..0.6)))
        } else {
            Shape::sphere(rng.gen_range(0.3..0.6))
        };
        world.add_shape(body, shape).unwrap();
        let position = Point3::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(0.5..10.0),
        );
        world
            .set_body_pose(body, Pose::from_position(position))
            .unwrap();
    }
    world
}

fn bench_octree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_build");
    let mut rng = StdRng::seed_from_u64(1);

    for count in [100, 1_000, 5_000] {
        let boxes = random_boxes(&mut rng, count, 200.0);
        let mut keys: SlotMap<ShapeId, ()> = SlotMap::with_key();
        let ids: Vec<_> = (0..count).map(|_| keys.insert(())).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("insert", count), &count, |b, _| {
            b.iter(|| {
                let mut tree = Octree::new(OctreeConfig::cube(512.0).min_node_size(4.0));
                for (id, aabb) in ids.iter().zip(&boxes) {
                    tree.insert(*id, *aabb);
                }
                black_box(tree.stats())
            });
        });
    }

    group.finish();
}

fn bench_octree_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_churn");
    let mut rng = StdRng::seed_from_u64(2);
    let count = 2_000;

    let boxes = random_boxes(&mut rng, count, 200.0);
    let moved: Vec<_> = boxes
        .iter()
        .map(|b| {
            let shift = Vector3::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0), 0.0);
            Aabb::new(b.min + shift, b.max + shift)
        })
        .collect();
    let mut keys: SlotMap<ShapeId, ()> = SlotMap::with_key();
    let ids: Vec<_> = (0..count).map(|_| keys.insert(())).collect();

    let mut tree = Octree::new(OctreeConfig::cube(512.0).min_node_size(4.0));
    for (id, aabb) in ids.iter().zip(&boxes) {
        tree.insert(*id, *aabb);
    }

    group.throughput(Throughput::Elements(count as u64));
    group.bench_function("update_all", |b| {
        let mut flip = false;
        b.iter(|| {
            let targets = if flip { &boxes } else { &moved };
            for (id, aabb) in ids.iter().zip(targets) {
                tree.update(*id, *aabb);
            }
            flip = !flip;
        });
    });
    group.bench_function("candidate_pairs", |b| {
        b.iter(|| black_box(tree.candidate_pairs().len()));
    });

    group.finish();
}

fn bench_narrow_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrow_phase");
    let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();

    let mut place = |shape: Shape, x: f64| {
        let body = world.create_rigid_body(false);
        let id = world.add_shape(body, shape).unwrap();
        world
            .set_body_pose(body, Pose::from_position(Point3::new(x, 0.1, 0.05)))
            .unwrap();
        id
    };
    let sphere_a = place(Shape::sphere(0.5), 0.0);
    let sphere_b = place(Shape::sphere(0.5), 0.9);
    let cube_a = place(Shape::cube(Vector3::repeat(0.5)), 10.0);
    let cube_b = place(Shape::cube(Vector3::repeat(0.5)), 10.8);

    let pairs = [
        ("sphere_sphere", sphere_a, sphere_b),
        ("cube_sphere", cube_a, sphere_b),
        ("cube_cube", cube_a, cube_b),
    ];
    for (name, a, b) in pairs {
        let shape_a = world.shape(a).unwrap().clone();
        let shape_b = world.shape(b).unwrap().clone();
        group.bench_function(name, |bench| {
            let mut narrow = GjkEpa;
            bench.iter(|| black_box(narrow.test(&shape_a, &shape_b)));
        });
    }

    group.finish();
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    group.sample_size(30);

    for count in [50, 200, 800] {
        group.bench_with_input(BenchmarkId::new("pile", count), &count, |b, &count| {
            b.iter_batched(
                || pile(count, 42),
                |mut world| {
                    for _ in 0..10 {
                        black_box(world.update().unwrap());
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_octree_build,
    bench_octree_churn,
    bench_narrow_phase,
    bench_world_step
);
criterion_main!(benches);
