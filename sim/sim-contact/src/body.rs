//! The view of a rigid body that the contact solver reads and writes.

use nalgebra::{Matrix3, Point3, Vector3};
use sim_types::{MassProperties, Twist};

/// Kinematic and inertial state the contact solver needs from a body.
///
/// A static body reports zero inverse mass and a zero inverse inertia, which
/// makes every velocity change applied to it vanish.
pub trait ContactBody {
    /// Center of mass in world coordinates.
    fn position(&self) -> Point3<f64>;

    /// Current linear and angular velocity.
    fn twist(&self) -> Twist;

    /// Inverse mass (0 for static bodies).
    fn inverse_mass(&self) -> f64;

    /// Inverse inertia tensor in world axes (zero for static bodies).
    fn inverse_inertia_world(&self) -> Matrix3<f64>;

    /// Add velocity changes produced by an impulse.
    fn apply_velocity_change(&mut self, linear: &Vector3<f64>, angular: &Vector3<f64>);

    /// Velocity of the material point at `offset` from the center of mass.
    fn velocity_at(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.twist().velocity_at_point(offset)
    }
}

/// Standalone body state for driving constraints outside a world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Center of mass in world coordinates.
    pub position: Point3<f64>,
    /// Current velocity.
    pub twist: Twist,
    /// Inverse mass.
    pub inverse_mass: f64,
    /// Inverse inertia in world axes.
    pub inverse_inertia: Matrix3<f64>,
}

impl SolverBody {
    /// Movable body with the given mass properties (world-aligned).
    #[must_use]
    pub fn dynamic(position: Point3<f64>, mass: &MassProperties) -> Self {
        Self {
            position,
            twist: Twist::zero(),
            inverse_mass: mass.inverse_mass(),
            inverse_inertia: mass.inverse_inertia().unwrap_or_else(Matrix3::zeros),
        }
    }

    /// Immovable body.
    #[must_use]
    pub fn fixed(position: Point3<f64>) -> Self {
        Self {
            position,
            twist: Twist::zero(),
            inverse_mass: 0.0,
            inverse_inertia: Matrix3::zeros(),
        }
    }

    /// Set the initial velocity.
    #[must_use]
    pub fn with_twist(mut self, twist: Twist) -> Self {
        self.twist = twist;
        self
    }
}

impl ContactBody for SolverBody {
    fn position(&self) -> Point3<f64> {
        self.position
    }

    fn twist(&self) -> Twist {
        self.twist
    }

    fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    fn inverse_inertia_world(&self) -> Matrix3<f64> {
        self.inverse_inertia
    }

    fn apply_velocity_change(&mut self, linear: &Vector3<f64>, angular: &Vector3<f64>) {
        self.twist.linear += linear;
        self.twist.angular += angular;
    }
}
