//! Body and shape identity, rigid body kinematic state, and mass properties.
//!
//! Identifiers are slot-map keys: a world owns the arenas, and a stale handle
//! (one whose slot was freed and reused) never aliases a live object because
//! the slot version differs.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use slotmap::Key;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Handle to a rigid body owned by a world.
    pub struct BodyId;

    /// Handle to a collision shape owned by a world.
    pub struct ShapeId;
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({:?})", self.data())
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shape({:?})", self.data())
    }
}

/// Unordered pair of shapes, stored smaller-id-first.
///
/// Two pairs built from the same shapes compare equal regardless of argument
/// order, and the derived ordering gives a deterministic iteration order for
/// ordered maps keyed by pair.
///
/// # Example
///
/// ```
/// use sim_types::{ShapeId, ShapePair};
/// use slotmap::SlotMap;
///
/// let mut shapes: SlotMap<ShapeId, ()> = SlotMap::with_key();
/// let a = shapes.insert(());
/// let b = shapes.insert(());
///
/// assert_eq!(ShapePair::new(a, b), ShapePair::new(b, a));
/// assert_eq!(ShapePair::new(b, a).first(), a);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapePair {
    first: ShapeId,
    second: ShapeId,
}

impl ShapePair {
    /// Build the canonical pair for two shapes.
    #[must_use]
    pub fn new(a: ShapeId, b: ShapeId) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    /// The smaller shape id.
    #[must_use]
    pub const fn first(&self) -> ShapeId {
        self.first
    }

    /// The larger shape id.
    #[must_use]
    pub const fn second(&self) -> ShapeId {
        self.second
    }

    /// Whether `shape` is one of the two members.
    #[must_use]
    pub fn contains(&self, shape: ShapeId) -> bool {
        self.first == shape || self.second == shape
    }
}

impl std::fmt::Display for ShapePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose at a position with identity rotation.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to world coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Transform a vector from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * world
    }

    /// Rotation as a 3x3 matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Interpolate between two poses (SLERP for rotation).
    ///
    /// Used to present a state between two fixed steps.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            position: Point3::from(self.position.coords.lerp(&other.position.coords, t)),
            rotation: self.rotation.slerp(&other.rotation, t),
        }
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Twist with the given linear and angular velocity.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// At rest.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Pure translation.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Pure rotation.
    #[must_use]
    pub fn angular(omega: Vector3<f64>) -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: omega,
        }
    }

    /// Velocity of a point rigidly attached to the body.
    ///
    /// `offset` is the point relative to the center of mass, in world axes.
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Kinetic energy for a given mass and world-space inertia tensor.
    #[must_use]
    pub fn kinetic_energy(&self, mass: f64, inertia: &Matrix3<f64>) -> f64 {
        let linear_ke = 0.5 * mass * self.linear.norm_squared();
        let angular_ke = 0.5 * self.angular.dot(&(inertia * self.angular));
        linear_ke + angular_ke
    }

    /// True when both velocities are exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.linear == Vector3::zeros() && self.angular == Vector3::zeros()
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }
}

/// Mass and inertia about the body origin, in body coordinates.
///
/// The body origin doubles as its center of mass. Shapes mounted off-origin
/// contribute through [`MassProperties::shifted`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg.
    pub mass: f64,
    /// Inertia tensor (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::ops::Add for MassProperties {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            mass: self.mass + rhs.mass,
            inertia: self.inertia + rhs.inertia,
        }
    }
}

impl std::iter::Sum for MassProperties {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc + m)
    }
}

impl MassProperties {
    /// Mass properties with given values.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// No mass, no inertia. The identity for summation.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            inertia: Matrix3::zeros(),
        }
    }

    /// Uniform solid sphere: I = (2/5) * m * r² on each diagonal.
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(i, i, i)),
        }
    }

    /// Uniform solid box with the given half extents.
    ///
    /// With full dimensions (x, y, z):
    /// - Ixx = (1/12) * m * (y² + z²)
    /// - Iyy = (1/12) * m * (x² + z²)
    /// - Izz = (1/12) * m * (x² + y²)
    #[must_use]
    pub fn cuboid(mass: f64, half_extents: Vector3<f64>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        let ixx = mass * (y2 + z2) / 12.0;
        let iyy = mass * (x2 + z2) / 12.0;
        let izz = mass * (x2 + y2) / 12.0;

        Self {
            mass,
            inertia: Matrix3::from_diagonal(&Vector3::new(ixx, iyy, izz)),
        }
    }

    /// Move the reference point by `offset` (parallel-axis theorem).
    ///
    /// I' = I + m * (|d|² * E - d * dᵀ)
    #[must_use]
    pub fn shifted(&self, offset: &Vector3<f64>) -> Self {
        let d2 = offset.norm_squared();
        let shift = Matrix3::identity() * d2 - offset * offset.transpose();
        Self {
            mass: self.mass,
            inertia: self.inertia + shift * self.mass,
        }
    }

    /// Inverse mass, 0 for massless or infinite-mass properties.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass <= 0.0 || !self.mass.is_finite() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Inverse inertia tensor, `None` if singular.
    #[must_use]
    pub fn inverse_inertia(&self) -> Option<Matrix3<f64>> {
        self.inertia.try_inverse()
    }

    /// Validate that the mass properties are physically valid.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e < -1e-10) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive semi-definite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    #[test]
    fn test_shape_pair_canonical() {
        let mut arena: SlotMap<ShapeId, ()> = SlotMap::with_key();
        let a = arena.insert(());
        let b = arena.insert(());

        let ab = ShapePair::new(a, b);
        let ba = ShapePair::new(b, a);
        assert_eq!(ab, ba);
        assert_eq!(ab.first(), a);
        assert_eq!(ab.second(), b);
        assert!(ab.contains(a));
        assert!(ab.contains(b));
    }

    #[test]
    fn test_stale_id_not_equal() {
        let mut arena: SlotMap<BodyId, ()> = SlotMap::with_key();
        let first = arena.insert(());
        arena.remove(first);
        let reused = arena.insert(());

        assert_ne!(first, reused);
        assert!(!arena.contains_key(first));
    }

    #[test]
    fn test_pose_inverse_round_trip() {
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
        );
        let p = Point3::new(-0.5, 4.0, 2.0);
        let back = pose.inverse_transform_point(&pose.transform_point(&p));
        assert_relative_eq!(back.coords, p.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_twist_velocity_at_point() {
        let twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let v = twist.velocity_at_point(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_inertia() {
        let props = MassProperties::sphere(1.0, 1.0);
        assert_relative_eq!(props.inertia[(0, 0)], 0.4, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(2, 2)], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_cuboid_inertia() {
        let props = MassProperties::cuboid(12.0, Vector3::new(0.5, 1.0, 1.5));
        // Full dims 1, 2, 3
        assert_relative_eq!(props.inertia[(0, 0)], 4.0 + 9.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(1, 1)], 1.0 + 9.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(2, 2)], 1.0 + 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shifted_parallel_axis() {
        let props = MassProperties::sphere(2.0, 1.0).shifted(&Vector3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(props.inertia[(0, 0)], 0.8, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(1, 1)], 0.8 + 18.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(2, 2)], 0.8 + 18.0, epsilon = 1e-12);
        assert_relative_eq!(props.inertia[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sum_and_inverse() {
        let total: MassProperties = [MassProperties::sphere(1.0, 1.0); 2].into_iter().sum();
        assert_relative_eq!(total.inverse_mass(), 0.5, epsilon = 1e-12);
        let inv = total.inverse_inertia().unwrap();
        assert_relative_eq!(inv[(0, 0)], 1.25, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_rejects_non_positive_mass() {
        assert!(MassProperties::sphere(0.0, 1.0).validate().is_err());
        assert!(MassProperties::sphere(-1.0, 1.0).validate().is_err());
        assert!(MassProperties::sphere(f64::NAN, 1.0).validate().is_err());
        assert!(MassProperties::sphere(1.0, 1.0).validate().is_ok());
    }
}
