//! Rigid bodies and their composite mass.

use nalgebra::{Matrix3, Point3, Vector3};
use sim_contact::ContactBody;
use sim_types::{MassProperties, Pose, ShapeId, Twist};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default per-step damping multiplier for linear and angular velocity.
pub const DEFAULT_DAMPING: f64 = 0.995;

/// A rigid body in the simulation world.
///
/// Mass and inertia come from the attached shapes. A body without shapes
/// falls back to unit mass and identity inverse inertia, so it still moves
/// sensibly under forces. Static bodies have zero inverse mass and inertia.
///
/// Poses are changed through [`World::set_body_pose`](crate::World::set_body_pose)
/// so that attached shapes and the broad phase stay in sync.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBody {
    is_static: bool,
    is_active: bool,
    /// Whether world gravity accelerates this body.
    pub affected_by_gravity: bool,
    /// Multiplier applied to linear velocity once per step.
    pub linear_damping: f64,
    /// Multiplier applied to angular velocity once per step.
    pub angular_damping: f64,
    pose: Pose,
    twist: Twist,
    force: Vector3<f64>,
    torque: Vector3<f64>,
    mass_properties: MassProperties,
    inverse_mass: f64,
    inverse_inertia_local: Matrix3<f64>,
    inverse_inertia_world: Matrix3<f64>,
    shapes: Vec<ShapeId>,
}

impl RigidBody {
    /// New body at the origin, at rest and active.
    #[must_use]
    pub fn new(is_static: bool) -> Self {
        let mut body = Self {
            is_static,
            is_active: true,
            affected_by_gravity: true,
            linear_damping: DEFAULT_DAMPING,
            angular_damping: DEFAULT_DAMPING,
            pose: Pose::identity(),
            twist: Twist::zero(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            mass_properties: MassProperties::zero(),
            inverse_mass: 0.0,
            inverse_inertia_local: Matrix3::zeros(),
            inverse_inertia_world: Matrix3::zeros(),
            shapes: Vec::new(),
        };
        body.update_mass(std::iter::empty());
        body
    }

    /// Whether the body is immovable.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the body takes part in the step.
    ///
    /// Inactive bodies are not integrated, and two inactive bodies are never
    /// tested against each other. Bodies never deactivate on their own.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Put the body to sleep or wake it. Placing the body, setting its
    /// velocity or a contact impulse wakes it again.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Center of mass in world coordinates.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.pose.position
    }

    /// Current velocity.
    #[must_use]
    pub fn twist(&self) -> &Twist {
        &self.twist
    }

    /// Replace the velocity. Static bodies ignore this.
    pub fn set_twist(&mut self, twist: Twist) {
        if !self.is_static {
            self.twist = twist;
            self.is_active = true;
        }
    }

    /// Replace the linear velocity. Static bodies ignore this.
    pub fn set_linear_velocity(&mut self, velocity: Vector3<f64>) {
        self.set_twist(Twist::new(velocity, self.twist.angular));
    }

    /// Replace the angular velocity. Static bodies ignore this.
    pub fn set_angular_velocity(&mut self, omega: Vector3<f64>) {
        self.set_twist(Twist::new(self.twist.linear, omega));
    }

    /// Accumulated force for this step.
    #[must_use]
    pub fn force(&self) -> Vector3<f64> {
        self.force
    }

    /// Accumulated torque for this step.
    #[must_use]
    pub fn torque(&self) -> Vector3<f64> {
        self.torque
    }

    /// Composite mass properties about the body origin.
    #[must_use]
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass_properties
    }

    /// Total mass (0 for static bodies).
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass_properties.mass
    }

    /// Inverse mass (0 for static bodies).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    /// Inverse inertia in body axes.
    #[must_use]
    pub fn inverse_inertia_local(&self) -> &Matrix3<f64> {
        &self.inverse_inertia_local
    }

    /// Inverse inertia in world axes: `R · I⁻¹ · Rᵀ`.
    #[must_use]
    pub fn inverse_inertia_world(&self) -> &Matrix3<f64> {
        &self.inverse_inertia_world
    }

    /// Attached shapes, in attach order.
    #[must_use]
    pub fn shapes(&self) -> &[ShapeId] {
        &self.shapes
    }

    /// Apply a force at the center of mass.
    pub fn apply_force(&mut self, force: Vector3<f64>) {
        if !self.is_static {
            self.force += force;
        }
    }

    /// Apply a torque.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if !self.is_static {
            self.torque += torque;
        }
    }

    /// Apply a force at a world-space point.
    pub fn apply_force_at_point(&mut self, force: Vector3<f64>, point: Point3<f64>) {
        if !self.is_static {
            self.force += force;
            self.torque += (point - self.pose.position).cross(&force);
        }
    }

    /// Clear accumulated forces and torques.
    pub fn clear_forces(&mut self) {
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }

    /// Kinetic energy (0 for static bodies).
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.is_static {
            return 0.0;
        }
        let r = self.pose.rotation_matrix();
        let inertia_world = r * self.mass_properties.inertia * r.transpose();
        self.twist.kinetic_energy(self.mass_properties.mass, &inertia_world)
    }

    /// Linear momentum (0 for static bodies).
    #[must_use]
    pub fn linear_momentum(&self) -> Vector3<f64> {
        if self.is_static {
            Vector3::zeros()
        } else {
            self.twist.linear * self.mass_properties.mass
        }
    }

    pub(crate) fn twist_mut(&mut self) -> &mut Twist {
        &mut self.twist
    }

    /// Set the pose, refresh the world inertia and mark the body active.
    pub(crate) fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.update_world_inertia();
        self.is_active = true;
    }

    pub(crate) fn push_shape(&mut self, shape: ShapeId) {
        if !self.shapes.contains(&shape) {
            self.shapes.push(shape);
        }
    }

    pub(crate) fn remove_shape(&mut self, shape: ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| *s != shape);
        self.shapes.len() != before
    }

    /// Recompute composite mass from per-shape contributions.
    pub(crate) fn update_mass(&mut self, contributions: impl Iterator<Item = MassProperties>) {
        if self.is_static {
            self.mass_properties = MassProperties::zero();
            self.inverse_mass = 0.0;
            self.inverse_inertia_local = Matrix3::zeros();
        } else {
            let total: MassProperties = contributions.sum();
            if total.mass > 0.0 {
                self.mass_properties = total;
                self.inverse_mass = total.inverse_mass();
                self.inverse_inertia_local =
                    total.inverse_inertia().unwrap_or_else(Matrix3::zeros);
            } else {
                self.mass_properties = MassProperties::new(1.0, Matrix3::identity());
                self.inverse_mass = 1.0;
                self.inverse_inertia_local = Matrix3::identity();
            }
        }
        self.update_world_inertia();
    }

    fn update_world_inertia(&mut self) {
        self.inverse_inertia_world = if self.is_static {
            Matrix3::zeros()
        } else {
            let r = self.pose.rotation_matrix();
            r * self.inverse_inertia_local * r.transpose()
        };
    }
}

impl ContactBody for RigidBody {
    fn position(&self) -> Point3<f64> {
        self.pose.position
    }

    fn twist(&self) -> Twist {
        self.twist
    }

    fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    fn inverse_inertia_world(&self) -> Matrix3<f64> {
        self.inverse_inertia_world
    }

    fn apply_velocity_change(&mut self, linear: &Vector3<f64>, angular: &Vector3<f64>) {
        if !self.is_static {
            self.twist.linear += linear;
            self.twist.angular += angular;
            // A contact impulse wakes the body it hits.
            self.is_active = true;
        }
    }
}
