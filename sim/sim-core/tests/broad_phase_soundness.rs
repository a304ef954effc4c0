//! The narrow phase only ever sees pairs whose bounding boxes overlap.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::{Arc, Mutex};

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use sim_core::{ContactManifold, GjkEpa, NarrowPhase, Shape, World};
use sim_types::{OctreeConfig, Pose, SimulationConfig};

/// Forwards to the default narrow phase and records whether each call's
/// boxes overlapped.
#[derive(Debug, Clone, Default)]
struct Recording {
    calls: Arc<Mutex<Vec<bool>>>,
}

impl NarrowPhase for Recording {
    fn test(&mut self, a: &Shape, b: &Shape) -> Option<ContactManifold> {
        self.calls.lock().unwrap().push(a.aabb().overlaps(b.aabb()));
        GjkEpa.test(a, b)
    }
}

fn world(recorder: &Recording, octree: OctreeConfig) -> World {
    World::with_narrow_phase(
        SimulationConfig::default()
            .zero_gravity()
            .with_octree(octree),
        recorder.clone(),
    )
    .unwrap()
}

#[test]
fn separated_boxes_are_never_tested() {
    let recorder = Recording::default();
    let mut world = world(&recorder, OctreeConfig::default());

    for x in [-3.0, 0.0, 3.0] {
        let body = world.create_rigid_body(false);
        world
            .add_shape(body, Shape::cube(Vector3::repeat(1.0)))
            .unwrap();
        world
            .set_body_pose(body, Pose::from_position(Point3::new(x, 0.0, 0.0)))
            .unwrap();
    }

    for _ in 0..10 {
        let report = world.update().unwrap();
        // All three share the root leaf.
        assert_eq!(report.candidate_pairs, 3);
        assert_eq!(report.narrow_phase_tests, 0);
    }
    assert!(recorder.calls.lock().unwrap().is_empty());
}

#[test]
fn touching_boxes_are_tested_once_per_step() {
    let recorder = Recording::default();
    let mut world = world(&recorder, OctreeConfig::cube(16.0).min_node_size(0.5).max_shapes_per_node(1));

    // Straddles the split planes, so both shapes land in several leaves.
    for x in [-0.4, 0.4] {
        let body = world.create_rigid_body(false);
        world.add_shape(body, Shape::sphere(0.5)).unwrap();
        world
            .set_body_pose(body, Pose::from_position(Point3::new(x, 0.1, -0.1)))
            .unwrap();
    }

    let report = world.update().unwrap();
    assert!(world.octree().stats().leaves > 1);
    assert!(report.candidate_pairs > 1);
    assert_eq!(report.narrow_phase_tests, 1);
    assert_eq!(report.contacts.len(), 1);
}

fn layout() -> impl Strategy<Value = Vec<(Point3<f64>, f64)>> {
    prop::collection::vec(
        ((-20.0..20.0_f64, -20.0..20.0_f64, -20.0..20.0_f64), 0.2..3.0_f64)
            .prop_map(|((x, y, z), r)| (Point3::new(x, y, z), r)),
        2..40,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn narrow_phase_calls_match_overlapping_boxes(layout in layout(), max in 1usize..6) {
        let recorder = Recording::default();
        let mut world = world(&recorder, OctreeConfig::cube(64.0).min_node_size(1.0).max_shapes_per_node(max));

        let mut shapes = Vec::new();
        for (center, radius) in &layout {
            let body = world.create_rigid_body(false);
            let shape = world.add_shape(body, Shape::sphere(*radius)).unwrap();
            world.set_body_pose(body, Pose::from_position(*center)).unwrap();
            shapes.push(shape);
        }

        let boxes: Vec<_> = shapes.iter().map(|s| *world.shape(*s).unwrap().aabb()).collect();
        let mut expected = 0;
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].overlaps(&boxes[j]) {
                    expected += 1;
                }
            }
        }

        let report = world.update().unwrap();
        let calls = recorder.calls.lock().unwrap();
        prop_assert!(calls.iter().all(|overlapped| *overlapped));
        prop_assert_eq!(calls.len(), expected);
        prop_assert_eq!(report.narrow_phase_tests, expected);
    }
}
