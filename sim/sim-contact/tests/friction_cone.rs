//! Property tests for the contact constraint invariants.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use sim_contact::{ContactBody, ContactConstraint, ContactKey, ContactManifold, ContactMaterial, SolverBody};
use sim_types::{BodyId, MassProperties, ShapeId, ShapePair, SolverConfig, Twist};
use slotmap::SlotMap;

fn key() -> ContactKey {
    let mut shapes: SlotMap<ShapeId, ()> = SlotMap::with_key();
    let mut bodies: SlotMap<BodyId, ()> = SlotMap::with_key();
    ContactKey {
        pair: ShapePair::new(shapes.insert(()), shapes.insert(())),
        body_a: bodies.insert(()),
        body_b: bodies.insert(()),
    }
}

fn vector() -> impl Strategy<Value = Vector3<f64>> {
    (-10.0..10.0_f64, -10.0..10.0_f64, -10.0..10.0_f64).prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

proptest! {
    #[test]
    fn accumulated_impulses_stay_in_cone(
        normal in vector().prop_filter("non-zero", |v| v.norm() > 1e-3),
        offset_a in vector(),
        offset_b in vector(),
        linear_a in vector(),
        linear_b in vector(),
        angular_b in vector(),
        friction in 0.0..2.0_f64,
        restitution in 0.0..1.0_f64,
        depth in 0.0..0.5_f64,
        iterations in 1usize..6,
    ) {
        let normal = normal.normalize();
        let mut a = SolverBody::dynamic(Point3::origin(), &MassProperties::sphere(2.0, 0.5))
            .with_twist(Twist::linear(linear_a));
        let mut b = SolverBody::dynamic(Point3::new(3.0, 1.0, -2.0), &MassProperties::cuboid(1.0, Vector3::new(0.5, 1.0, 0.25)))
            .with_twist(Twist::new(linear_b, angular_b));

        let manifold = ContactManifold::new(
            a.position() + offset_a * 0.1,
            b.position() + offset_b * 0.1,
            normal,
            -depth,
        );
        let config = SolverConfig::default();
        let material = ContactMaterial::new(friction, restitution);
        let mut contact = ContactConstraint::new(key(), &manifold, material, &a, &b, &config);
        contact.prepare(&a, &b, &config, 0.01);

        for _ in 0..iterations {
            contact.iterate(&mut a, &mut b);
            prop_assert!(contact.normal_impulse() >= 0.0);
            let limit = friction * contact.normal_impulse();
            let [t1, t2] = contact.tangent_impulse();
            prop_assert!(t1.abs() <= limit + 1e-9);
            prop_assert!(t2.abs() <= limit + 1e-9);
        }
    }

    #[test]
    fn static_body_never_moves(
        linear_b in vector(),
        depth in 0.0..0.5_f64,
    ) {
        let mut ground = SolverBody::fixed(Point3::origin());
        let mut body = SolverBody::dynamic(Point3::new(0.0, 0.0, 1.0), &MassProperties::sphere(1.0, 1.0))
            .with_twist(Twist::linear(linear_b));
        let manifold = ContactManifold::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -depth),
            Vector3::z(),
            -depth,
        );
        let config = SolverConfig::default();
        let mut contact = ContactConstraint::new(key(), &manifold, ContactMaterial::default(), &ground, &body, &config);
        contact.prepare(&ground, &body, &config, 0.01);
        contact.iterate(&mut ground, &mut body);

        prop_assert_eq!(ground.twist, Twist::zero());
    }
}
