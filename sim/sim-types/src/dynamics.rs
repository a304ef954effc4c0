//! External influences applied to every dynamic body.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Uniform gravitational field.
///
/// # Example
///
/// ```
/// use sim_types::Gravity;
///
/// let g = Gravity::earth();
/// assert_eq!(g.force_on_mass(2.0).z, -19.62);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard Earth gravity (9.81 m/s² in -Z direction).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, 0.0, -9.81),
        }
    }

    /// Zero gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub fn custom(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Gravitational force on a body of the given mass.
    #[must_use]
    pub fn force_on_mass(&self, mass: f64) -> Vector3<f64> {
        self.acceleration * mass
    }

    /// Whether the field is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.acceleration == Vector3::zeros()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gravity() {
        let g = Gravity::earth();
        assert_relative_eq!(g.acceleration.z, -9.81, epsilon = 1e-12);
        assert!(!g.is_zero());
        assert!(Gravity::zero().is_zero());

        let f = Gravity::custom(Vector3::new(0.0, -0.981, 0.0)).force_on_mass(10.0);
        assert_relative_eq!(f.y, -9.81, epsilon = 1e-12);
    }
}
