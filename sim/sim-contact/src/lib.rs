//! Impulse-based contact resolution for rigid bodies.
//!
//! This crate turns a narrow-phase [`ContactManifold`] into a
//! [`ContactConstraint`] and resolves it with sequential impulses:
//!
//! - **Accumulated clamping**: the normal impulse total never goes negative,
//!   so a contact can push bodies apart but never pull them together.
//! - **Box friction**: each tangent axis is clamped to
//!   `friction * accumulated normal impulse`.
//! - **Restitution bias**: contacts closing faster than a threshold get a
//!   bounce target of `-restitution * v_n`.
//! - **Penetration recovery**: optional velocity bias proportional to depth.
//!
//! # Contact Frame
//!
//! ```text
//!            n (A → B)
//!            ▲
//!            │   t1 = sliding direction (or any orthonormal fallback)
//!            │  ╱
//!            │ ╱
//!            ●──────▶ t2 = t1 × n
//!      contact point
//! ```
//!
//! # Example
//!
//! ```
//! use sim_contact::{ContactConstraint, ContactKey, ContactManifold, ContactMaterial, SolverBody};
//! use sim_types::{BodyId, MassProperties, ShapeId, ShapePair, SolverConfig, Twist};
//! use nalgebra::{Point3, Vector3};
//! use slotmap::SlotMap;
//!
//! let mut shapes: SlotMap<ShapeId, ()> = SlotMap::with_key();
//! let mut bodies: SlotMap<BodyId, ()> = SlotMap::with_key();
//! let key = ContactKey {
//!     pair: ShapePair::new(shapes.insert(()), shapes.insert(())),
//!     body_a: bodies.insert(()),
//!     body_b: bodies.insert(()),
//! };
//!
//! // A unit sphere falling onto a fixed body below it.
//! let mut ground = SolverBody::fixed(Point3::new(0.0, 0.0, -1.0));
//! let mut ball = SolverBody::dynamic(Point3::new(0.0, 0.0, 0.95), &MassProperties::sphere(1.0, 1.0))
//!     .with_twist(Twist::linear(Vector3::new(0.0, 0.0, -3.0)));
//!
//! let manifold = ContactManifold::new(
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(0.0, 0.0, -0.05),
//!     Vector3::z(),
//!     -0.05,
//! );
//!
//! let config = SolverConfig::default();
//! let mut contact = ContactConstraint::new(key, &manifold, ContactMaterial::default(), &ground, &ball, &config);
//! contact.prepare(&ground, &ball, &config, 0.01);
//! contact.iterate(&mut ground, &mut ball);
//!
//! assert!(contact.normal_impulse() > 0.0);
//! assert!(ball.twist.linear.z > 0.0); // bounced
//! ```

#![doc(html_root_url = "https://docs.rs/sim-contact/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::suboptimal_flops)]

mod body;
mod constraint;
mod friction;
mod manifold;
mod params;

pub use body::{ContactBody, SolverBody};
pub use constraint::{ContactConstraint, ContactKey};
pub use friction::{orthonormal_to, tangent_frame, FrictionBox, TANGENT_EPSILON_SQ};
pub use manifold::ContactManifold;
pub use params::ContactMaterial;

pub use sim_types::{BodyId, ShapePair, SolverConfig, Twist};
