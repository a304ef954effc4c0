//! Box friction cone and the tangent frame it is expressed in.
//!
//! The Coulomb cone `|F_t| ≤ μ * F_n` is approximated by clamping each of the
//! two tangent axes independently:
//!
//! ```text
//! |λ_t1| ≤ μ * λ_n
//! |λ_t2| ≤ μ * λ_n
//! ```
//!
//! The box admits up to `√2 * μ * λ_n` along a diagonal, which is the usual
//! price of keeping every axis a scalar clamp.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Squared residual length below which the tangent falls back to an
/// arbitrary orthonormal direction.
pub const TANGENT_EPSILON_SQ: f64 = 1e-12;

/// Per-axis clamp of accumulated tangential impulse.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrictionBox {
    /// Coulomb friction coefficient.
    pub mu: f64,
}

impl FrictionBox {
    /// Create a friction box with the given coefficient.
    #[must_use]
    pub fn new(mu: f64) -> Self {
        Self { mu: mu.max(0.0) }
    }

    /// Largest tangential impulse per axis for the given normal impulse.
    #[must_use]
    pub fn limit(&self, normal_impulse: f64) -> f64 {
        self.mu * normal_impulse.max(0.0)
    }

    /// Add `delta` to an accumulated impulse and clamp the total.
    ///
    /// Returns the new total and the impulse actually applied.
    #[must_use]
    pub fn accumulate(&self, accumulated: f64, delta: f64, normal_impulse: f64) -> (f64, f64) {
        let max = self.limit(normal_impulse);
        let total = (accumulated + delta).clamp(-max, max);
        (total, total - accumulated)
    }

    /// Whether both tangent axes are within the box.
    #[must_use]
    pub fn contains(&self, tangent: [f64; 2], normal_impulse: f64) -> bool {
        let max = self.limit(normal_impulse) + 1e-12;
        tangent.iter().all(|t| t.abs() <= max)
    }
}

/// Unit vector orthogonal to `normal`.
///
/// Takes the dominant axis of the normal and rotates 90° in the plane that
/// contains it: `(y, -x, 0)` when x or y dominates z, otherwise `(0, z, -y)`.
#[must_use]
pub fn orthonormal_to(normal: &Vector3<f64>) -> Vector3<f64> {
    let candidate = if normal.x.abs() > normal.z.abs() || normal.y.abs() > normal.z.abs() {
        Vector3::new(normal.y, -normal.x, 0.0)
    } else {
        Vector3::new(0.0, normal.z, -normal.y)
    };
    candidate.try_normalize(0.0).unwrap_or_else(Vector3::x)
}

/// Tangent frame for a contact.
///
/// The first tangent follows the sliding direction (relative velocity minus
/// its normal component). With no measurable sliding, [`orthonormal_to`]
/// supplies it. The second tangent is `t1 × n`.
#[must_use]
pub fn tangent_frame(
    normal: &Vector3<f64>,
    relative_velocity: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let residual = relative_velocity - normal * normal.dot(relative_velocity);
    let t1 = if residual.norm_squared() > TANGENT_EPSILON_SQ {
        residual.normalize()
    } else {
        orthonormal_to(normal)
    };
    let t2 = t1.cross(normal);
    (t1, t2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accumulate_clamps_total() {
        let fb = FrictionBox::new(0.5);
        let (total, applied) = fb.accumulate(0.0, 3.0, 2.0);
        assert_eq!(total, 1.0);
        assert_eq!(applied, 1.0);

        let (total, applied) = fb.accumulate(total, -5.0, 2.0);
        assert_eq!(total, -1.0);
        assert_eq!(applied, -2.0);
    }

    #[test]
    fn test_zero_normal_means_no_friction() {
        let fb = FrictionBox::new(0.8);
        let (total, applied) = fb.accumulate(0.0, 10.0, 0.0);
        assert_eq!(total, 0.0);
        assert_eq!(applied, 0.0);
        assert!(fb.contains([0.0, 0.0], 0.0));
        assert!(!fb.contains([0.1, 0.0], 0.0));
    }

    #[test]
    fn test_orthonormal_to_axes() {
        for n in [
            Vector3::x(),
            Vector3::y(),
            Vector3::z(),
            -Vector3::z(),
            Vector3::new(1.0, 2.0, 3.0).normalize(),
        ] {
            let t = orthonormal_to(&n);
            assert_relative_eq!(t.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t.dot(&n), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tangent_frame_follows_sliding() {
        let n = Vector3::z();
        let (t1, t2) = tangent_frame(&n, &Vector3::new(3.0, 0.0, -1.0));
        assert_relative_eq!(t1.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t2.dot(&n), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t2.dot(&t1), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tangent_frame_without_sliding() {
        let n = Vector3::new(0.0, 0.0, 1.0);
        let (t1, t2) = tangent_frame(&n, &Vector3::new(0.0, 0.0, -2.0));
        assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
    }
}
