//! Static bodies never collide with each other and never move.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use nalgebra::{Point3, Vector3};
use sim_core::{Shape, World, WorldEvent};
use sim_types::Pose;

fn static_cube(world: &mut World, x: f64) -> sim_core::BodyId {
    let body = world.create_rigid_body(true);
    world
        .add_shape(body, Shape::cube(Vector3::repeat(1.0)))
        .unwrap();
    world
        .set_body_pose(body, Pose::from_position(Point3::new(x, 0.0, 0.0)))
        .unwrap();
    body
}

#[test]
fn overlapping_static_bodies_produce_no_contact() {
    let mut world = World::default();
    let a = static_cube(&mut world, 0.0);
    let b = static_cube(&mut world, 0.5);
    world.drain_events();

    for _ in 0..50 {
        let report = world.update().unwrap();
        assert_eq!(report.candidate_pairs, 1);
        assert_eq!(report.narrow_phase_tests, 0);
        assert!(report.contacts.is_empty());
    }

    assert!(world
        .drain_events()
        .iter()
        .all(|e| !matches!(e, WorldEvent::CollisionEntered(_))));
    assert_eq!(world.body(a).unwrap().position(), Point3::origin());
    assert_eq!(world.body(b).unwrap().position(), Point3::new(0.5, 0.0, 0.0));
}

#[test]
fn static_body_is_immovable() {
    let mut world = World::default();
    let ground = static_cube(&mut world, 0.0);

    let body = world.body_mut(ground).unwrap();
    body.set_linear_velocity(Vector3::new(1.0, 0.0, 0.0));
    body.apply_force(Vector3::new(0.0, 0.0, 100.0));
    assert!(body.twist().is_zero());
    assert_eq!(body.inverse_mass(), 0.0);
    assert_eq!(*body.inverse_inertia_world(), nalgebra::Matrix3::zeros());

    // A dynamic sphere lands on it; the contact exists and the ground holds.
    let ball = world.create_rigid_body(false);
    world.add_shape(ball, Shape::sphere(0.5)).unwrap();
    world
        .set_body_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 1.45)))
        .unwrap();

    let report = world.update().unwrap();
    assert_eq!(report.contacts.len(), 1);
    assert!(report.contacts[0].normal_impulse > 0.0);
    assert_eq!(world.body(ground).unwrap().position(), Point3::origin());
}

#[test]
fn sleeping_pair_is_skipped() {
    let mut world = World::default();
    let a = world.create_rigid_body(false);
    world.add_shape(a, Shape::sphere(1.0)).unwrap();
    let b = world.create_rigid_body(false);
    world.add_shape(b, Shape::sphere(1.0)).unwrap();
    world.body_mut(a).unwrap().set_active(false);
    world.body_mut(b).unwrap().set_active(false);

    let report = world.update().unwrap();
    assert_eq!(report.narrow_phase_tests, 0);

    world.body_mut(b).unwrap().set_linear_velocity(Vector3::zeros());
    let report = world.update().unwrap();
    assert_eq!(report.narrow_phase_tests, 1);
    assert_eq!(report.contacts.len(), 1);
}
