//! Exact shape-pair tests behind a replaceable interface.
//!
//! The world hands every broad-phase candidate that survives its filters to a
//! [`NarrowPhase`]. Only manifolds with negative separation become contacts.

use std::fmt;

use nalgebra::{Point3, Vector3};
use sim_contact::ContactManifold;

use crate::gjk_epa::gjk_epa_contact;
use crate::shape::{Shape, ShapeKind};

/// Exact intersection test between two posed shapes.
///
/// Implementations return a manifold whose normal points from `a` toward `b`,
/// or `None` when the shapes are known not to overlap.
pub trait NarrowPhase: fmt::Debug {
    /// Test two shapes at their current world poses.
    fn test(&mut self, a: &Shape, b: &Shape) -> Option<ContactManifold>;
}

/// Default narrow phase.
///
/// Sphere-sphere and sphere-box pairs use closed-form tests that also report
/// positive separation. Every other pair goes through GJK+EPA.
#[derive(Debug, Clone, Copy, Default)]
pub struct GjkEpa;

impl NarrowPhase for GjkEpa {
    fn test(&mut self, a: &Shape, b: &Shape) -> Option<ContactManifold> {
        match (a.kind(), b.kind()) {
            (ShapeKind::Sphere { radius: ra }, ShapeKind::Sphere { radius: rb }) => Some(
                sphere_sphere(&a.pose().position, *ra, &b.pose().position, *rb),
            ),
            (ShapeKind::Cube { half_extents }, ShapeKind::Sphere { radius }) => {
                Some(box_sphere(a, half_extents, &b.pose().position, *radius))
            }
            (ShapeKind::Sphere { radius }, ShapeKind::Cube { half_extents }) => {
                Some(box_sphere(b, half_extents, &a.pose().position, *radius).flipped())
            }
            (ShapeKind::Cube { .. }, ShapeKind::Cube { .. }) => gjk_epa_contact(a, b),
        }
    }
}

/// Closed-form sphere-sphere manifold.
///
/// Coincident centers push along +Z.
#[must_use]
pub fn sphere_sphere(
    center_a: &Point3<f64>,
    radius_a: f64,
    center_b: &Point3<f64>,
    radius_b: f64,
) -> ContactManifold {
    let delta = center_b - center_a;
    let distance = delta.norm();
    let normal = delta.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z);
    ContactManifold::new(
        center_a + normal * radius_a,
        center_b - normal * radius_b,
        normal,
        distance - radius_a - radius_b,
    )
}

/// Closed-form box-sphere manifold, normal from the box toward the sphere.
fn box_sphere(
    cube: &Shape,
    half_extents: &Vector3<f64>,
    center: &Point3<f64>,
    radius: f64,
) -> ContactManifold {
    let pose = cube.pose();
    let local = pose.inverse_transform_point(center);
    let clamped = Point3::from(local.coords.zip_map(half_extents, |c, h| c.clamp(-h, h)));
    let outside = local - clamped;
    let distance = outside.norm();

    let (local_normal, surface, separation) = if distance > f64::EPSILON {
        (outside / distance, clamped, distance - radius)
    } else {
        // Center inside the box: leave through the nearest face.
        let gaps = half_extents - local.coords.abs();
        let axis = gaps.imin();
        let sign = if local[axis] < 0.0 { -1.0 } else { 1.0 };
        let mut normal = Vector3::zeros();
        normal[axis] = sign;
        let mut surface = local;
        surface[axis] = sign * half_extents[axis];
        (normal, surface, -(gaps[axis] + radius))
    };

    let normal = pose.transform_vector(&local_normal);
    ContactManifold::new(
        pose.transform_point(&surface),
        center - normal * radius,
        normal,
        separation,
    )
}
