//! Surface material coefficients.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Friction and restitution of a surface.
///
/// Each shape carries a material; a contact uses [`ContactMaterial::combine`]
/// of both sides.
///
/// # Example
///
/// ```
/// use sim_contact::ContactMaterial;
///
/// let ice = ContactMaterial::new(0.05, 0.1);
/// let rubber = ContactMaterial::rubber();
/// let pair = ContactMaterial::combine(&ice, &rubber);
/// assert!(pair.friction < rubber.friction);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactMaterial {
    /// Coulomb friction coefficient (dimensionless).
    ///
    /// Bounds each tangential impulse axis by `friction * normal impulse`.
    pub friction: f64,

    /// Coefficient of restitution in [0, 1].
    ///
    /// Only fast-closing contacts bounce; see the solver's restitution
    /// velocity threshold.
    pub restitution: f64,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.3,
        }
    }
}

impl ContactMaterial {
    /// Create a material, clamping coefficients into their valid ranges.
    #[must_use]
    pub fn new(friction: f64, restitution: f64) -> Self {
        Self {
            friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
        }
    }

    /// No friction, no bounce.
    #[must_use]
    pub fn frictionless() -> Self {
        Self {
            friction: 0.0,
            restitution: 0.0,
        }
    }

    /// High friction, moderate bounce.
    #[must_use]
    pub fn rubber() -> Self {
        Self {
            friction: 1.0,
            restitution: 0.8,
        }
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    /// Set the restitution coefficient.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Combine the materials of two touching surfaces (geometric means).
    #[must_use]
    pub fn combine(a: &Self, b: &Self) -> Self {
        Self {
            friction: (a.friction * b.friction).sqrt(),
            restitution: (a.restitution * b.restitution).sqrt(),
        }
    }

    /// Check that both coefficients are finite and in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.friction.is_finite()
            && self.friction >= 0.0
            && (0.0..=1.0).contains(&self.restitution)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_combine_geometric_mean() {
        let a = ContactMaterial::new(0.25, 1.0);
        let b = ContactMaterial::new(1.0, 0.25);
        let c = ContactMaterial::combine(&a, &b);
        assert_relative_eq!(c.friction, 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.restitution, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_with_frictionless() {
        let c = ContactMaterial::combine(&ContactMaterial::rubber(), &ContactMaterial::frictionless());
        assert_eq!(c.friction, 0.0);
        assert_eq!(c.restitution, 0.0);
    }

    #[test]
    fn test_new_clamps() {
        let m = ContactMaterial::new(-1.0, 2.0);
        assert_eq!(m.friction, 0.0);
        assert_eq!(m.restitution, 1.0);
        assert!(m.is_valid());
        assert!(!ContactMaterial {
            friction: f64::NAN,
            restitution: 0.0
        }
        .is_valid());
    }
}
