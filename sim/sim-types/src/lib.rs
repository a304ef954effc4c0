//! Core types for the rigid-body simulation kernel.
//!
//! This crate provides the plain data shared by the contact solver and the
//! world pipeline:
//!
//! - [`BodyId`] / [`ShapeId`] - Slot-map handles issued by a world
//! - [`ShapePair`] - Canonical (smaller-id-first) shape pair key
//! - [`Pose`] / [`Twist`] - Rigid body position/orientation and velocity
//! - [`MassProperties`] - Mass and inertia with sphere/cuboid formulas
//! - [`SimulationConfig`] - Timestep, gravity, octree and solver settings
//! - [`SimError`] - Error type for every fallible operation
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They hold no world state and run no physics.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{MassProperties, SimulationConfig};
//!
//! let config = SimulationConfig::default().zero_gravity();
//! assert!(config.validate().is_ok());
//!
//! let two_spheres = MassProperties::sphere(1.0, 1.0) + MassProperties::sphere(1.0, 1.0);
//! assert_eq!(two_spheres.inverse_mass(), 0.5);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;

pub use body::{BodyId, MassProperties, Pose, ShapeId, ShapePair, Twist};
pub use config::{OctreeConfig, SimulationConfig, SolverConfig};
pub use dynamics::Gravity;
pub use error::SimError;

pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
