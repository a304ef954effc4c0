//! Narrow-phase output consumed by the contact solver.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Single-point contact manifold between two shapes.
///
/// The normal points from shape A toward shape B. A negative `separation`
/// means the shapes overlap by `-separation`; zero or positive means they do
/// not touch and no contact is built.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactManifold {
    /// Deepest point of A inside B (world coordinates).
    pub point_a: Point3<f64>,
    /// Deepest point of B inside A (world coordinates).
    pub point_b: Point3<f64>,
    /// Unit contact normal, A toward B.
    pub normal: Vector3<f64>,
    /// Signed distance along the normal.
    pub separation: f64,
}

impl ContactManifold {
    /// Create a manifold.
    #[must_use]
    pub const fn new(
        point_a: Point3<f64>,
        point_b: Point3<f64>,
        normal: Vector3<f64>,
        separation: f64,
    ) -> Self {
        Self {
            point_a,
            point_b,
            normal,
            separation,
        }
    }

    /// Whether the shapes overlap.
    #[must_use]
    pub fn is_penetrating(&self) -> bool {
        self.separation < 0.0
    }

    /// Penetration depth, zero when separated.
    #[must_use]
    pub fn depth(&self) -> f64 {
        (-self.separation).max(0.0)
    }

    /// The same contact seen from B's side.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
            separation: self.separation,
        }
    }

    /// Midpoint between the witness points.
    #[must_use]
    pub fn midpoint(&self) -> Point3<f64> {
        nalgebra::center(&self.point_a, &self.point_b)
    }
}
