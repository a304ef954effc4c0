//! Friction impulses reported by the world stay inside the friction box.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use sim_core::{ContactMaterial, Shape, World};
use sim_types::{Pose, SimulationConfig, Twist};

fn sliding_scene(friction: f64, linear: Vector3<f64>, angular: Vector3<f64>, cube: bool) -> World {
    let mut world = World::new(SimulationConfig::default()).unwrap();
    let material = ContactMaterial::new(friction, 0.2);

    let ground = world.create_rigid_body(true);
    world
        .add_shape(
            ground,
            Shape::cube(Vector3::new(50.0, 50.0, 0.5)).with_material(material),
        )
        .unwrap();
    world
        .set_body_pose(ground, Pose::from_position(Point3::new(0.0, 0.0, -0.5)))
        .unwrap();

    let body = world.create_rigid_body(false);
    let shape = if cube {
        Shape::cube(Vector3::repeat(0.4))
    } else {
        Shape::sphere(0.4)
    };
    world.add_shape(body, shape.with_material(material)).unwrap();
    world
        .set_body_pose(body, Pose::from_position(Point3::new(0.0, 0.0, 0.39)))
        .unwrap();
    world.body_mut(body).unwrap().set_twist(Twist::new(linear, angular));
    world
}

#[test]
fn sliding_sphere_slows_down() {
    let mut world = sliding_scene(0.6, Vector3::new(3.0, 0.0, 0.0), Vector3::zeros(), false);
    let body = world.bodies().find(|(_, b)| !b.is_static()).map(|(id, _)| id).unwrap();

    let mut saw_friction = false;
    for _ in 0..100 {
        let report = world.update().unwrap();
        for contact in &report.contacts {
            let limit = 0.6 * contact.normal_impulse + 1e-12;
            assert!(contact.tangent_impulse[0].abs() <= limit);
            assert!(contact.tangent_impulse[1].abs() <= limit);
            saw_friction |= contact.tangent_impulse[0].abs() > 0.0;
        }
    }
    assert!(saw_friction);

    // Friction turns sliding into rolling: linear speed drops, spin builds up.
    let b = world.body(body).unwrap();
    assert!(b.twist().linear.x < 3.0);
    assert!(b.twist().linear.x > 0.0);
    assert!(b.twist().angular.y > 0.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn world_contacts_respect_friction_box(
        friction in 0.0..1.5_f64,
        vx in -5.0..5.0_f64,
        vy in -5.0..5.0_f64,
        vz in -3.0..0.0_f64,
        wx in -5.0..5.0_f64,
        wy in -5.0..5.0_f64,
        wz in -5.0..5.0_f64,
        cube in any::<bool>(),
    ) {
        let mut world = sliding_scene(friction, Vector3::new(vx, vy, vz), Vector3::new(wx, wy, wz), cube);
        for _ in 0..30 {
            let report = world.update().unwrap();
            for contact in &report.contacts {
                prop_assert!(contact.normal_impulse >= 0.0);
                let limit = friction * contact.normal_impulse + 1e-9;
                prop_assert!(contact.tangent_impulse[0].abs() <= limit);
                prop_assert!(contact.tangent_impulse[1].abs() <= limit);
            }
        }
    }
}
