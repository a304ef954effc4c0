//! Real-time rigid-body physics kernel.
//!
//! This crate owns the simulation world: bodies, their collision shapes, an
//! adaptive octree broad-phase, the narrow-phase interface and the fixed-step
//! pipeline that drives the impulse contact solver from [`sim_contact`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Stepper                               │
//! │  Frame time → whole fixed steps, capped catch-up, alpha     │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  Owns: bodies, shapes, octree, events                       │
//! │  update(): detect → forces → solve → transforms → clear     │
//! └──────────┬──────────────────┬───────────────────┬──────────┘
//!            │                  │                   │
//!            ▼                  ▼                   ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │     Octree       │ │   NarrowPhase    │ │ ContactConstraint│
//! │  leaf pairs      │ │  analytic, GJK   │ │  (sim-contact)   │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sim_core::{ContactMaterial, Shape, World};
//! use sim_types::{Pose, SimulationConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut world = World::new(SimulationConfig::default()).unwrap();
//!
//! let ground = world.create_rigid_body(true);
//! world.add_shape(ground, Shape::cube(Vector3::new(20.0, 20.0, 0.5))).unwrap();
//! world.set_body_pose(ground, Pose::from_position(Point3::new(0.0, 0.0, -0.5))).unwrap();
//!
//! let ball = world.create_rigid_body(false);
//! let shape = Shape::sphere(0.25)
//!     .with_mass(2.0)
//!     .with_material(ContactMaterial::new(0.8, 0.1));
//! world.add_shape(ball, shape).unwrap();
//! world.set_body_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 3.0))).unwrap();
//!
//! sim_core::run_for(&mut world, 2.0).unwrap();
//!
//! let z = world.body(ball).unwrap().position().z;
//! assert!(z > 0.15 && z < 0.35);
//! ```
//!
//! # Conventions
//!
//! - Right-handed, Z-up. Default gravity is `(0, 0, -9.81)`.
//! - A contact normal points from the first shape of the canonical
//!   [`ShapePair`] toward the second; negative separation means overlap.
//! - Bodies start active. A body put to sleep with
//!   [`RigidBody::set_active`] wakes when placed, given a velocity or hit.

#![doc(html_root_url = "https://docs.rs/sim-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,
)]

mod body;
pub mod broad_phase;
mod events;
pub mod gjk_epa;
pub mod integrators;
pub mod narrow_phase;
mod raycast;
mod shape;
mod stepper;
mod world;

pub use body::{RigidBody, DEFAULT_DAMPING};
pub use broad_phase::{Aabb, Octree, OctreeEntry, OctreeStats};
pub use events::{ContactReport, StepReport, WorldEvent};
pub use narrow_phase::{GjkEpa, NarrowPhase};
pub use raycast::{ray_shape, RayHit};
pub use shape::{Shape, ShapeKind};
pub use stepper::{run_for, run_steps, Stepper};
pub use world::World;

pub use sim_contact::{ContactBody, ContactConstraint, ContactKey, ContactManifold, ContactMaterial};

// Re-export key types from sim-types for convenience
pub use sim_types::{
    BodyId, Gravity, MassProperties, OctreeConfig, Pose, ShapeId, ShapePair, SimError,
    SimulationConfig, SolverConfig, Twist,
};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_basic_simulation() {
        let mut world = World::new(SimulationConfig::default()).unwrap();
        let body = world.create_rigid_body(false);
        world.add_shape(body, Shape::sphere(0.5)).unwrap();
        world
            .set_body_pose(body, Pose::from_position(Point3::new(0.0, 0.0, 10.0)))
            .unwrap();

        run_for(&mut world, 0.5).expect("simulation should succeed");

        let body = world.body(body).expect("body should exist");
        assert!(body.position().z < 10.0);
    }

    #[test]
    fn test_momentum_conservation() {
        // Zero gravity, no damping: momentum survives a collision.
        let mut world = World::new(SimulationConfig::default().zero_gravity()).unwrap();
        for (x, vx) in [(-2.0, 1.0), (2.0, -1.0)] {
            let body = world.create_rigid_body(false);
            world.add_shape(body, Shape::sphere(0.5)).unwrap();
            world
                .set_body_pose(body, Pose::from_position(Point3::new(x, 0.0, 0.0)))
                .unwrap();
            let b = world.body_mut(body).unwrap();
            b.linear_damping = 1.0;
            b.angular_damping = 1.0;
            b.set_linear_velocity(Vector3::new(vx, 0.0, 0.0));
        }

        let initial = world.total_linear_momentum();
        let reports = run_steps(&mut world, 300).expect("simulation should succeed");
        assert!(reports.iter().any(|r| !r.contacts.is_empty()));

        let after = world.total_linear_momentum();
        assert_relative_eq!(initial, after, epsilon = 1e-9);
    }

    #[test]
    fn test_energy_trend() {
        // Undamped free fall: kinetic gain tracks potential loss to O(dt).
        let mut world = World::new(SimulationConfig::high_fidelity()).unwrap();
        let body = world.create_rigid_body(false);
        world.add_shape(body, Shape::sphere(0.5)).unwrap();
        world
            .set_body_pose(body, Pose::from_position(Point3::new(0.0, 0.0, 10.0)))
            .unwrap();
        world.body_mut(body).unwrap().linear_damping = 1.0;

        run_for(&mut world, 0.5).unwrap();

        let g = 9.81;
        let z = world.body(body).unwrap().position().z;
        let initial_total = g * 10.0;
        let final_total = g * z + world.total_kinetic_energy();
        let drift = (final_total - initial_total).abs() / initial_total;
        assert!(drift < 0.01, "energy drift too large: {}%", drift * 100.0);
    }

    #[test]
    fn test_static_ground_does_not_move() {
        let mut world = World::default();
        let ground = world.create_rigid_body(true);
        world
            .add_shape(ground, Shape::cube(Vector3::new(5.0, 5.0, 0.5)))
            .unwrap();
        world
            .set_body_pose(ground, Pose::from_position(Point3::new(0.0, 0.0, -0.5)))
            .unwrap();

        let ball = world.create_rigid_body(false);
        world.add_shape(ball, Shape::sphere(0.5)).unwrap();
        world
            .set_body_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 1.0)))
            .unwrap();

        run_for(&mut world, 1.0).unwrap();

        let ground = world.body(ground).unwrap();
        assert_relative_eq!(ground.position().z, -0.5, epsilon = 1e-12);
        assert!(ground.twist().is_zero());
    }
}
