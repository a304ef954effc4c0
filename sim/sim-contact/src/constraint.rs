//! Sequential-impulse contact constraint.
//!
//! One [`ContactConstraint`] is built per penetrating shape pair per step and
//! thrown away at the end of that step. Its life inside a step:
//!
//! ```text
//!   new()      offsets, relative velocity, restitution bias, tangent frame
//!     │
//!   prepare()  effective masses on n, t1, t2 + penetration bias
//!     │
//!   iterate()  normal impulse (clamped ≥ 0), then friction bounded by the
//!              *current* accumulated normal impulse, applied to both bodies
//! ```
//!
//! Impulses are clamped on their running totals, so several `iterate` calls
//! on the same constraint never double count.

use nalgebra::{Matrix3, Vector3};
use sim_types::{BodyId, ShapePair, SolverConfig};

use crate::body::ContactBody;
use crate::friction::{tangent_frame, FrictionBox};
use crate::manifold::ContactManifold;
use crate::params::ContactMaterial;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Effective-mass denominators at or below this are treated as infinite mass.
const MIN_EFFECTIVE_DENOMINATOR: f64 = 1e-12;

/// Identity of a contact: the shape pair and the bodies owning each side.
///
/// `body_a` owns `pair.first()`, `body_b` owns `pair.second()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactKey {
    /// Canonical shape pair.
    pub pair: ShapePair,
    /// Body owning the first shape.
    pub body_a: BodyId,
    /// Body owning the second shape.
    pub body_b: BodyId,
}

/// Angular response of one body to a unit impulse along each contact axis.
///
/// Each entry is `I⁻¹ (r × axis)` in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct AngularResponse {
    normal: Vector3<f64>,
    tangent: [Vector3<f64>; 2],
}

impl AngularResponse {
    fn new(inv_inertia: &Matrix3<f64>, offset: &Vector3<f64>, axes: &[Vector3<f64>; 3]) -> Self {
        Self {
            normal: inv_inertia * offset.cross(&axes[0]),
            tangent: [
                inv_inertia * offset.cross(&axes[1]),
                inv_inertia * offset.cross(&axes[2]),
            ],
        }
    }

    fn combine(&self, normal: f64, tangent: [f64; 2]) -> Vector3<f64> {
        self.normal * normal + self.tangent[0] * tangent[0] + self.tangent[1] * tangent[1]
    }
}

/// Single-point contact between two bodies with accumulated impulses.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConstraint {
    key: ContactKey,
    normal: Vector3<f64>,
    tangents: [Vector3<f64>; 2],
    offset_a: Vector3<f64>,
    offset_b: Vector3<f64>,
    separation: f64,
    material: ContactMaterial,
    restitution_bias: f64,
    penetration_bias: f64,

    inverse_mass_a: f64,
    inverse_mass_b: f64,
    angular_a: AngularResponse,
    angular_b: AngularResponse,
    normal_mass: f64,
    tangent_mass: [f64; 2],

    normal_impulse: f64,
    tangent_impulse: [f64; 2],
}

impl ContactConstraint {
    /// Build the constraint from a penetrating manifold.
    ///
    /// Captures the contact offsets, the relative velocity at the contact, the
    /// restitution bias for fast-closing contacts and the tangent frame.
    #[must_use]
    pub fn new<A, B>(
        key: ContactKey,
        manifold: &ContactManifold,
        material: ContactMaterial,
        body_a: &A,
        body_b: &B,
        config: &SolverConfig,
    ) -> Self
    where
        A: ContactBody + ?Sized,
        B: ContactBody + ?Sized,
    {
        let normal = manifold.normal;
        let offset_a = manifold.point_a - body_a.position();
        let offset_b = manifold.point_b - body_b.position();

        let relative = body_b.velocity_at(&offset_b) - body_a.velocity_at(&offset_a);
        let normal_velocity = relative.dot(&normal);

        let mut restitution_bias = 0.0_f64;
        if normal_velocity < -config.restitution_velocity_threshold {
            restitution_bias = restitution_bias.max(-material.restitution * normal_velocity);
        }

        let (t1, t2) = tangent_frame(&normal, &relative);

        Self {
            key,
            normal,
            tangents: [t1, t2],
            offset_a,
            offset_b,
            separation: manifold.separation,
            material,
            restitution_bias,
            penetration_bias: 0.0,
            inverse_mass_a: 0.0,
            inverse_mass_b: 0.0,
            angular_a: AngularResponse::default(),
            angular_b: AngularResponse::default(),
            normal_mass: 0.0,
            tangent_mass: [0.0; 2],
            normal_impulse: 0.0,
            tangent_impulse: [0.0; 2],
        }
    }

    /// Compute effective masses from the bodies' current inertia and the
    /// penetration recovery bias for a step of length `dt`.
    ///
    /// Static bodies contribute nothing to any denominator.
    pub fn prepare<A, B>(&mut self, body_a: &A, body_b: &B, config: &SolverConfig, dt: f64)
    where
        A: ContactBody + ?Sized,
        B: ContactBody + ?Sized,
    {
        let axes = [self.normal, self.tangents[0], self.tangents[1]];

        self.inverse_mass_a = body_a.inverse_mass();
        self.inverse_mass_b = body_b.inverse_mass();
        self.angular_a = AngularResponse::new(&body_a.inverse_inertia_world(), &self.offset_a, &axes);
        self.angular_b = AngularResponse::new(&body_b.inverse_inertia_world(), &self.offset_b, &axes);

        let linear = self.inverse_mass_a + self.inverse_mass_b;
        let effective = |response_a: &Vector3<f64>, response_b: &Vector3<f64>, axis: &Vector3<f64>| {
            let angular = response_a.cross(&self.offset_a).dot(axis)
                + response_b.cross(&self.offset_b).dot(axis);
            let denominator = linear + angular;
            if denominator > MIN_EFFECTIVE_DENOMINATOR {
                1.0 / denominator
            } else {
                0.0
            }
        };

        self.normal_mass = effective(&self.angular_a.normal, &self.angular_b.normal, &axes[0]);
        self.tangent_mass = [
            effective(&self.angular_a.tangent[0], &self.angular_b.tangent[0], &axes[1]),
            effective(&self.angular_a.tangent[1], &self.angular_b.tangent[1], &axes[2]),
        ];

        self.penetration_bias = if dt > 0.0 {
            let depth = (-self.separation - config.penetration_slop).max(0.0);
            config.penetration_bias_factor / dt * depth
        } else {
            0.0
        };
    }

    /// Apply one round of normal and friction impulses.
    ///
    /// Returns the net impulse applied to body B this call (body A received
    /// its negation).
    pub fn iterate<A, B>(&mut self, body_a: &mut A, body_b: &mut B) -> Vector3<f64>
    where
        A: ContactBody + ?Sized,
        B: ContactBody + ?Sized,
    {
        let relative = body_b.velocity_at(&self.offset_b) - body_a.velocity_at(&self.offset_a);

        // Normal first; friction below is bounded by the updated total.
        let normal_velocity = relative.dot(&self.normal);
        let lambda = (self.target_velocity() - normal_velocity) * self.normal_mass;
        let previous = self.normal_impulse;
        self.normal_impulse = (previous + lambda).max(0.0);
        let normal_delta = self.normal_impulse - previous;

        let friction = FrictionBox::new(self.material.friction);
        let mut tangent_delta = [0.0; 2];
        for (axis, delta) in tangent_delta.iter_mut().enumerate() {
            let tangent_velocity = relative.dot(&self.tangents[axis]);
            let lambda = -tangent_velocity * self.tangent_mass[axis];
            let (total, applied) =
                friction.accumulate(self.tangent_impulse[axis], lambda, self.normal_impulse);
            self.tangent_impulse[axis] = total;
            *delta = applied;
        }

        let impulse = self.normal * normal_delta
            + self.tangents[0] * tangent_delta[0]
            + self.tangents[1] * tangent_delta[1];

        body_a.apply_velocity_change(
            &(-impulse * self.inverse_mass_a),
            &(-self.angular_a.combine(normal_delta, tangent_delta)),
        );
        body_b.apply_velocity_change(
            &(impulse * self.inverse_mass_b),
            &self.angular_b.combine(normal_delta, tangent_delta),
        );

        impulse
    }

    /// Separation velocity the normal impulse drives toward.
    #[must_use]
    pub fn target_velocity(&self) -> f64 {
        self.restitution_bias.max(self.penetration_bias)
    }

    /// Shapes and bodies involved.
    #[must_use]
    pub const fn key(&self) -> ContactKey {
        self.key
    }

    /// Unit normal from A toward B.
    #[must_use]
    pub const fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Orthonormal tangent directions spanning the contact plane.
    #[must_use]
    pub const fn tangents(&self) -> [Vector3<f64>; 2] {
        self.tangents
    }

    /// Contact point offsets from each body's center of mass.
    #[must_use]
    pub const fn offsets(&self) -> (Vector3<f64>, Vector3<f64>) {
        (self.offset_a, self.offset_b)
    }

    /// Signed separation reported by the narrow phase.
    #[must_use]
    pub const fn separation(&self) -> f64 {
        self.separation
    }

    /// Combined material of the two surfaces.
    #[must_use]
    pub const fn material(&self) -> ContactMaterial {
        self.material
    }

    /// Restitution bias captured at construction.
    #[must_use]
    pub const fn restitution_bias(&self) -> f64 {
        self.restitution_bias
    }

    /// Penetration recovery bias from the last `prepare`.
    #[must_use]
    pub const fn penetration_bias(&self) -> f64 {
        self.penetration_bias
    }

    /// Effective masses along (normal, tangent 1, tangent 2).
    #[must_use]
    pub const fn effective_masses(&self) -> [f64; 3] {
        [self.normal_mass, self.tangent_mass[0], self.tangent_mass[1]]
    }

    /// Accumulated normal impulse (never negative).
    #[must_use]
    pub const fn normal_impulse(&self) -> f64 {
        self.normal_impulse
    }

    /// Accumulated tangential impulses.
    #[must_use]
    pub const fn tangent_impulse(&self) -> [f64; 2] {
        self.tangent_impulse
    }

    /// Whether the accumulated friction lies inside the box cone.
    #[must_use]
    pub fn friction_within_cone(&self) -> bool {
        FrictionBox::new(self.material.friction).contains(self.tangent_impulse, self.normal_impulse)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::body::SolverBody;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::{MassProperties, ShapeId, Twist};
    use slotmap::SlotMap;

    fn key() -> ContactKey {
        let mut shapes: SlotMap<ShapeId, ()> = SlotMap::with_key();
        let mut bodies: SlotMap<BodyId, ()> = SlotMap::with_key();
        ContactKey {
            pair: ShapePair::new(shapes.insert(()), shapes.insert(())),
            body_a: bodies.insert(()),
            body_b: bodies.insert(()),
        }
    }

    fn unit_sphere(x: f64) -> SolverBody {
        SolverBody::dynamic(Point3::new(x, 0.0, 0.0), &MassProperties::sphere(1.0, 1.0))
    }

    /// Two unit spheres along X overlapping by `depth`.
    fn head_on(depth: f64) -> ContactManifold {
        let gap = 2.0 - depth;
        ContactManifold::new(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(gap - 1.0, 0.0, 0.0),
            Vector3::x(),
            -depth,
        )
    }

    #[test]
    fn test_restitution_bias_only_when_fast() {
        let config = SolverConfig::default();
        let material = ContactMaterial::new(0.5, 0.5);

        let a = unit_sphere(0.0).with_twist(Twist::new(Vector3::new(2.0, 0.0, 0.0), Vector3::zeros()));
        let b = unit_sphere(1.9);
        let c = ContactConstraint::new(key(), &head_on(0.1), material, &a, &b, &config);
        assert_relative_eq!(c.restitution_bias(), 1.0, epsilon = 1e-12);

        let slow = unit_sphere(0.0).with_twist(Twist::new(Vector3::new(0.5, 0.0, 0.0), Vector3::zeros()));
        let c = ContactConstraint::new(key(), &head_on(0.1), material, &slow, &b, &config);
        assert_eq!(c.restitution_bias(), 0.0);
    }

    #[test]
    fn test_effective_mass_sums_both_bodies() {
        let config = SolverConfig::default();
        let a = unit_sphere(0.0);
        let b = unit_sphere(1.9);
        let mut c = ContactConstraint::new(key(), &head_on(0.1), ContactMaterial::default(), &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);

        // Offsets are parallel to the normal, so only the linear terms count.
        assert_relative_eq!(c.effective_masses()[0], 0.5, epsilon = 1e-12);
        // Tangent axes pick up the angular term: 1 + 1 + 2 * (1 / 0.4).
        assert_relative_eq!(c.effective_masses()[1], 1.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_side_contributes_nothing() {
        let config = SolverConfig::default();
        let a = SolverBody::fixed(Point3::origin());
        let b = unit_sphere(1.9);
        let mut c = ContactConstraint::new(key(), &head_on(0.1), ContactMaterial::default(), &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);
        assert_relative_eq!(c.effective_masses()[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_head_on_impulse_stops_closing() {
        let config = SolverConfig::restitution_only();
        let mut a = unit_sphere(0.0).with_twist(Twist::new(Vector3::new(0.5, 0.0, 0.0), Vector3::zeros()));
        let mut b = unit_sphere(1.9);
        let mut c = ContactConstraint::new(key(), &head_on(0.1), ContactMaterial::frictionless(), &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);
        let impulse = c.iterate(&mut a, &mut b);

        assert_relative_eq!(impulse.x, 0.25, epsilon = 1e-12);
        assert_relative_eq!(a.twist.linear.x, 0.25, epsilon = 1e-12);
        assert_relative_eq!(b.twist.linear.x, 0.25, epsilon = 1e-12);
        assert_relative_eq!(c.normal_impulse(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_impulse_never_pulls() {
        let config = SolverConfig::restitution_only();
        // Already separating.
        let mut a = unit_sphere(0.0).with_twist(Twist::new(Vector3::new(-1.0, 0.0, 0.0), Vector3::zeros()));
        let mut b = unit_sphere(1.9);
        let mut c = ContactConstraint::new(key(), &head_on(0.1), ContactMaterial::default(), &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);
        let impulse = c.iterate(&mut a, &mut b);

        assert_eq!(c.normal_impulse(), 0.0);
        assert_eq!(impulse, Vector3::zeros());
        assert_eq!(a.twist.linear.x, -1.0);
    }

    #[test]
    fn test_penetration_bias_pushes_apart_from_rest() {
        let config = SolverConfig::default();
        let mut a = unit_sphere(0.0);
        let mut b = unit_sphere(1.5);
        let mut c = ContactConstraint::new(key(), &head_on(0.5), ContactMaterial::default(), &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);
        assert!(c.penetration_bias() > 0.0);

        c.iterate(&mut a, &mut b);
        assert!(a.twist.linear.x < 0.0);
        assert!(b.twist.linear.x > 0.0);
        assert_relative_eq!(a.twist.linear.x, -b.twist.linear.x, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_bounded_by_normal() {
        let config = SolverConfig::restitution_only();
        let material = ContactMaterial::new(0.2, 0.0);
        // B slides fast along Y while pressing into A.
        let mut a = SolverBody::fixed(Point3::origin());
        let mut b = unit_sphere(1.9)
            .with_twist(Twist::new(Vector3::new(-0.3, 10.0, 0.0), Vector3::zeros()));
        let mut c = ContactConstraint::new(key(), &head_on(0.1), material, &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);

        for _ in 0..4 {
            c.iterate(&mut a, &mut b);
            assert!(c.normal_impulse() >= 0.0);
            assert!(c.friction_within_cone());
            let limit = 0.2 * c.normal_impulse();
            assert!(c.tangent_impulse()[0].abs() <= limit + 1e-12);
            assert!(c.tangent_impulse()[1].abs() <= limit + 1e-12);
        }
        // Sliding slowed but not stopped by weak friction.
        assert!(b.twist.linear.y < 10.0);
        assert!(b.twist.linear.y > 0.0);
    }

    #[test]
    fn test_tangent_frame_is_orthonormal() {
        let config = SolverConfig::default();
        let a = unit_sphere(0.0);
        let b = unit_sphere(1.9);
        let c = ContactConstraint::new(key(), &head_on(0.1), ContactMaterial::default(), &a, &b, &config);
        let [t1, t2] = c.tangents();
        let n = c.normal();
        assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t2.dot(&n), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t1.dot(&t2), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_off_center_contact_spins_body() {
        let config = SolverConfig::restitution_only();
        let mut a = SolverBody::fixed(Point3::origin());
        let mut b = SolverBody::dynamic(Point3::new(0.5, 0.0, 1.0), &MassProperties::cuboid(1.0, Vector3::new(0.5, 0.5, 0.5)))
            .with_twist(Twist::new(Vector3::new(0.0, 0.0, -1.0), Vector3::zeros()));
        let manifold = ContactManifold::new(
            Point3::new(0.0, 0.0, 0.5),
            Point3::new(0.0, 0.0, 0.45),
            Vector3::z(),
            -0.05,
        );
        let mut c = ContactConstraint::new(key(), &manifold, ContactMaterial::frictionless(), &a, &b, &config);
        c.prepare(&a, &b, &config, 0.01);
        c.iterate(&mut a, &mut b);

        assert!(c.normal_impulse() > 0.0);
        // Spin follows r × n at the contact.
        let (_, r_b) = c.offsets();
        let torque_dir = r_b.cross(&Vector3::z());
        assert!(b.twist.angular.dot(&torque_dir) > 0.0);
        assert_eq!(a.twist, Twist::zero());
    }
}
