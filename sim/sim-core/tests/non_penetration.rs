//! Overlapping spheres are pushed apart and never pulled together.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use nalgebra::Point3;
use sim_core::{Shape, ShapePair, World};
use sim_types::{Pose, SimulationConfig};

#[test]
fn overlapping_spheres_separate() {
    let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
    let radius = 1.0;

    let a = world.create_rigid_body(false);
    let sa = world.add_shape(a, Shape::sphere(radius)).unwrap();
    world
        .set_body_pose(a, Pose::from_position(Point3::new(-0.75, 0.0, 0.0)))
        .unwrap();

    let b = world.create_rigid_body(false);
    let sb = world.add_shape(b, Shape::sphere(radius)).unwrap();
    world
        .set_body_pose(b, Pose::from_position(Point3::new(0.75, 0.0, 0.0)))
        .unwrap();

    let pair = ShapePair::new(sa, sb);
    let separation = |world: &World| {
        let pa = world.body(a).unwrap().position();
        let pb = world.body(b).unwrap().position();
        (pb - pa).norm() - 2.0 * radius
    };

    let mut previous = separation(&world);
    assert!(previous < 0.0);

    let mut steps_in_contact = 0;
    for _ in 0..200 {
        let report = world.update().unwrap();
        if let Some(contact) = report.contact(pair) {
            steps_in_contact += 1;
            assert!(contact.normal_impulse >= 0.0);
            assert!(contact.separation < 0.0);
        }

        // Recovery only ever pushes apart.
        let current = separation(&world);
        assert!(current >= previous - 1e-12, "{current} < {previous}");
        previous = current;
    }

    assert!(steps_in_contact > 0);
    assert!(separation(&world) >= 0.0);
    assert_eq!(world.touching_pairs().count(), 0);

    // Still on the original axis.
    let pa = world.body(a).unwrap().position();
    assert!(pa.y.abs() < 1e-12 && pa.z.abs() < 1e-12);
}

#[test]
fn resting_sphere_stays_above_ground() {
    let mut world = World::new(SimulationConfig::default()).unwrap();

    let ground = world.create_rigid_body(true);
    world
        .add_shape(ground, Shape::cube(nalgebra::Vector3::new(10.0, 10.0, 0.5)))
        .unwrap();
    world
        .set_body_pose(ground, Pose::from_position(Point3::new(0.0, 0.0, -0.5)))
        .unwrap();

    let ball = world.create_rigid_body(false);
    world.add_shape(ball, Shape::sphere(0.5)).unwrap();
    world
        .set_body_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 1.5)))
        .unwrap();

    for _ in 0..400 {
        let report = world.update().unwrap();
        for contact in &report.contacts {
            assert!(contact.normal_impulse >= 0.0);
        }
    }

    let z = world.body(ball).unwrap().position().z;
    assert!(z > 0.45 && z < 0.51, "ball settled at {z}");
}
