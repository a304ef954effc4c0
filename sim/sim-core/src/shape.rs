//! Collision shapes attached to rigid bodies.
//!
//! The shape set is closed: spheres and boxes ("cubes" with independent half
//! extents). Each kind provides a support mapping for the narrow phase, an
//! inertia formula and a world bounding box.

use nalgebra::{Point3, Vector3};
use sim_contact::ContactMaterial;
use sim_types::{BodyId, MassProperties, Pose, Result, SimError};

use crate::broad_phase::Aabb;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Geometry of a collision shape, in shape-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    /// Sphere centered at the shape origin.
    Sphere {
        /// Sphere radius in meters.
        radius: f64,
    },
    /// Box centered at the shape origin, aligned with the body axes.
    Cube {
        /// Half-extents of the box in each axis.
        half_extents: Vector3<f64>,
    },
}

impl ShapeKind {
    /// Sphere geometry.
    #[must_use]
    pub fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Box geometry.
    #[must_use]
    pub fn cube(half_extents: Vector3<f64>) -> Self {
        Self::Cube { half_extents }
    }

    /// Furthest local point in `direction`.
    ///
    /// A zero direction yields the center for spheres and the `+` corner
    /// for boxes, both valid points of the volume.
    #[must_use]
    pub fn support_local(&self, direction: &Vector3<f64>) -> Point3<f64> {
        match self {
            Self::Sphere { radius } => direction
                .try_normalize(f64::EPSILON)
                .map_or_else(Point3::origin, |d| Point3::from(d * *radius)),
            Self::Cube { half_extents } => Point3::new(
                half_extents.x.copysign(direction.x),
                half_extents.y.copysign(direction.y),
                half_extents.z.copysign(direction.z),
            ),
        }
    }

    /// Mass properties about the shape center for a given mass.
    #[must_use]
    pub fn mass_properties(&self, mass: f64) -> MassProperties {
        match self {
            Self::Sphere { radius } => MassProperties::sphere(mass, *radius),
            Self::Cube { half_extents } => MassProperties::cuboid(mass, *half_extents),
        }
    }

    /// Reject non-positive or non-finite dimensions.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Sphere { radius } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(SimError::invalid_shape(format!(
                        "sphere radius must be positive and finite, got {radius}"
                    )));
                }
            }
            Self::Cube { half_extents } => {
                if !half_extents.iter().all(|h| h.is_finite() && *h > 0.0) {
                    return Err(SimError::invalid_shape(format!(
                        "box half extents must be positive and finite, got {half_extents:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A collision shape: geometry plus mass, mounting offset and material.
///
/// The world pose and bounding box are maintained by the
/// [`World`](crate::World) whenever the owning body moves.
///
/// # Example
///
/// ```
/// use sim_core::Shape;
/// use sim_contact::ContactMaterial;
/// use nalgebra::Vector3;
///
/// let wheel = Shape::sphere(0.3)
///     .with_mass(2.0)
///     .with_offset(Vector3::new(1.0, 0.0, 0.0))
///     .with_material(ContactMaterial::rubber());
/// assert_eq!(wheel.mass(), 2.0);
/// assert!(wheel.body().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape {
    kind: ShapeKind,
    mass: f64,
    offset: Vector3<f64>,
    material: ContactMaterial,
    body: Option<BodyId>,
    pose: Pose,
    aabb: Aabb,
}

impl Shape {
    /// Shape of the given kind with unit mass, no offset and the default material.
    #[must_use]
    pub fn new(kind: ShapeKind) -> Self {
        let mut shape = Self {
            kind,
            mass: 1.0,
            offset: Vector3::zeros(),
            material: ContactMaterial::default(),
            body: None,
            pose: Pose::identity(),
            aabb: Aabb::default(),
        };
        shape.sync(&Pose::identity());
        shape
    }

    /// Sphere shape.
    #[must_use]
    pub fn sphere(radius: f64) -> Self {
        Self::new(ShapeKind::sphere(radius))
    }

    /// Box shape.
    #[must_use]
    pub fn cube(half_extents: Vector3<f64>) -> Self {
        Self::new(ShapeKind::cube(half_extents))
    }

    /// Set the mass.
    #[must_use]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Set the mounting offset from the body origin (body axes).
    #[must_use]
    pub fn with_offset(mut self, offset: Vector3<f64>) -> Self {
        self.offset = offset;
        self.sync(&Pose::identity());
        self
    }

    /// Set the contact material.
    #[must_use]
    pub fn with_material(mut self, material: ContactMaterial) -> Self {
        self.material = material;
        self
    }

    /// Geometry.
    #[must_use]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Mass in kg.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Offset from the body origin, in body axes.
    #[must_use]
    pub fn offset(&self) -> Vector3<f64> {
        self.offset
    }

    /// Friction and restitution.
    #[must_use]
    pub fn material(&self) -> ContactMaterial {
        self.material
    }

    /// Owning body, if attached.
    #[must_use]
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// World pose of the shape center.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// World bounding box.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Furthest world point in a world direction.
    #[must_use]
    pub fn support(&self, direction: &Vector3<f64>) -> Point3<f64> {
        let local = self.pose.inverse_transform_vector(direction);
        self.pose.transform_point(&self.kind.support_local(&local))
    }

    /// Mass properties about the body origin, in body axes.
    #[must_use]
    pub fn contribution(&self) -> MassProperties {
        self.kind.mass_properties(self.mass).shifted(&self.offset)
    }

    /// Check geometry, and mass when the shape will drive a dynamic body.
    pub fn validate(&self, dynamic: bool) -> Result<()> {
        self.kind.validate()?;
        if dynamic {
            self.kind.mass_properties(self.mass).validate()?;
        }
        Ok(())
    }

    /// Recompute the world pose and bounding box from the owning body's pose.
    pub(crate) fn sync(&mut self, body_pose: &Pose) {
        self.pose = Pose::from_position_rotation(
            body_pose.transform_point(&Point3::from(self.offset)),
            body_pose.rotation,
        );
        let half = match &self.kind {
            ShapeKind::Sphere { radius } => Vector3::repeat(*radius),
            ShapeKind::Cube { half_extents } => self.pose.rotation_matrix().abs() * half_extents,
        };
        self.aabb = Aabb::from_center(self.pose.position, half);
    }

    pub(crate) fn attach(&mut self, body: BodyId, body_pose: &Pose) {
        self.body = Some(body);
        self.sync(body_pose);
    }

    pub(crate) fn detach(&mut self) {
        self.body = None;
        self.sync(&Pose::identity());
    }

    pub(crate) fn set_kind(&mut self, kind: ShapeKind) {
        self.kind = kind;
    }

    pub(crate) fn set_material(&mut self, material: ContactMaterial) {
        self.material = material;
    }
}
