//! Composite mass over attached shapes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp, missing_docs)]

use approx::assert_relative_eq;
use nalgebra::{Matrix3, Point3, Vector3};
use sim_core::{Shape, World};
use sim_types::{Pose, SimulationConfig};

#[test]
fn two_unit_spheres_double_the_mass() {
    let mut world = World::new(SimulationConfig::default()).unwrap();
    let body = world.create_rigid_body(false);
    for x in [-2.0, 2.0] {
        world
            .add_shape(
                body,
                Shape::sphere(1.0).with_offset(Vector3::new(x, 0.0, 0.0)),
            )
            .unwrap();
    }
    world
        .set_body_pose(body, Pose::from_position(Point3::new(0.0, 0.0, 5.0)))
        .unwrap();

    let b = world.body(body).unwrap();
    assert_relative_eq!(b.inverse_mass(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(b.mass(), 2.0, epsilon = 1e-12);

    // 2 * (2/5) about x; parallel-axis adds 2 * 1 * 2² about y and z.
    let inertia = b.mass_properties().inertia;
    assert_relative_eq!(inertia[(0, 0)], 0.8, epsilon = 1e-12);
    assert_relative_eq!(inertia[(1, 1)], 8.8, epsilon = 1e-12);
    assert_relative_eq!(inertia[(2, 2)], 8.8, epsilon = 1e-12);
}

#[test]
fn symmetric_placement_has_no_net_torque() {
    let mut world = World::new(SimulationConfig::default()).unwrap();
    let body = world.create_rigid_body(false);
    let shapes: Vec<_> = [-1.5, 1.5]
        .into_iter()
        .map(|x| {
            world
                .add_shape(body, Shape::sphere(1.0).with_offset(Vector3::new(x, 0.0, 0.0)))
                .unwrap()
        })
        .collect();
    world
        .set_body_pose(body, Pose::from_position(Point3::new(0.0, 0.0, 5.0)))
        .unwrap();

    // Weight applied at each shape's center.
    let centers: Vec<_> = shapes
        .iter()
        .map(|s| world.shape(*s).unwrap().pose().position)
        .collect();
    let b = world.body_mut(body).unwrap();
    for center in centers {
        b.apply_force_at_point(Vector3::new(0.0, 0.0, -9.81), center);
    }
    assert_relative_eq!(b.torque(), Vector3::zeros(), epsilon = 1e-12);
    assert_relative_eq!(b.force(), Vector3::new(0.0, 0.0, -19.62), epsilon = 1e-12);

    for _ in 0..50 {
        world.update().unwrap();
    }
    assert_relative_eq!(
        world.body(body).unwrap().twist().angular,
        Vector3::zeros(),
        epsilon = 1e-12
    );
}

#[test]
fn shape_set_changes_refresh_mass() {
    let mut world = World::default();
    let body = world.create_rigid_body(false);

    // No shapes: unit point mass.
    let b = world.body(body).unwrap();
    assert_eq!(b.inverse_mass(), 1.0);
    assert_eq!(*b.inverse_inertia_local(), Matrix3::identity());

    let heavy = world
        .add_shape(body, Shape::sphere(1.0).with_mass(4.0))
        .unwrap();
    let light = world.add_shape(body, Shape::sphere(1.0)).unwrap();
    assert_relative_eq!(world.body(body).unwrap().inverse_mass(), 0.2, epsilon = 1e-12);

    world.remove_shape(heavy).unwrap();
    assert_relative_eq!(world.body(body).unwrap().inverse_mass(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(
        world.body(body).unwrap().inverse_inertia_local()[(0, 0)],
        2.5,
        epsilon = 1e-12
    );

    world.detach_shape(light).unwrap();
    assert_eq!(*world.body(body).unwrap().inverse_inertia_local(), Matrix3::identity());

    let fixed = world.create_rigid_body(true);
    world.attach_shape(fixed, light).unwrap();
    let f = world.body(fixed).unwrap();
    assert_eq!(f.inverse_mass(), 0.0);
    assert_eq!(*f.inverse_inertia_local(), Matrix3::zeros());
}
