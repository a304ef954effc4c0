//! Semi-implicit Euler integration for rigid bodies.
//!
//! A step is split in two around the contact solve:
//!
//! ```text
//! v += (g + F/m) * dt        integrate_forces     (before the solve)
//! ω += I⁻¹ τ * dt
//! v *= linear_damping, ω *= angular_damping
//!
//! x += v * dt                integrate_pose       (after the solve)
//! q  = exp(ω dt) ∘ q
//! ```
//!
//! Positions use the post-solve velocity, which makes the scheme symplectic.
//!
//! # Example
//!
//! ```
//! use sim_core::integrators::integrate_pose;
//! use sim_types::{Pose, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let pose = Pose::from_position(Point3::new(0.0, 0.0, 10.0));
//! let twist = Twist::linear(Vector3::new(0.0, 0.0, -1.0));
//!
//! let next = integrate_pose(&pose, &twist, 0.5);
//! assert_eq!(next.position.z, 9.5);
//! ```

use nalgebra::{Unit, UnitQuaternion, Vector3};
use sim_types::{Gravity, Pose, Twist};

use crate::body::RigidBody;

/// Below this angular speed (rad/s) orientation is left unchanged.
pub const MIN_ANGULAR_SPEED: f64 = 1e-10;

/// Apply gravity, accumulated force/torque and damping to a body's velocity.
///
/// Static and inactive bodies are left untouched.
pub fn integrate_forces(body: &mut RigidBody, gravity: &Gravity, dt: f64) {
    if body.is_static() || !body.is_active() {
        return;
    }

    let inverse_mass = body.inverse_mass();
    let inverse_inertia = *body.inverse_inertia_world();
    let force = body.force();
    let torque = body.torque();
    let gravity_on = body.affected_by_gravity;
    let (linear_damping, angular_damping) = (body.linear_damping, body.angular_damping);

    let twist = body.twist_mut();
    if gravity_on {
        twist.linear += gravity.acceleration * dt;
    }
    twist.linear += force * (inverse_mass * dt);
    twist.angular += inverse_inertia * torque * dt;

    twist.linear *= linear_damping;
    twist.angular *= angular_damping;
}

/// Advance a pose by a world-frame twist over `dt`.
#[must_use]
pub fn integrate_pose(pose: &Pose, twist: &Twist, dt: f64) -> Pose {
    let mut rotation = pose.rotation;
    integrate_rotation(&mut rotation, &twist.angular, dt);
    Pose::from_position_rotation(pose.position + twist.linear * dt, rotation)
}

/// Rotate by a world-frame angular velocity over `dt`.
///
/// The increment is pre-multiplied because `omega` is expressed in world axes.
pub fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    let speed = omega.norm();
    if speed < MIN_ANGULAR_SPEED {
        return;
    }

    let axis = Unit::new_unchecked(omega / speed);
    let delta = UnitQuaternion::from_axis_angle(&axis, speed * dt);
    *rotation = delta * *rotation;
    rotation.renormalize();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_types::MassProperties;
    use std::f64::consts::FRAC_PI_2;

    fn active_body(mass: f64) -> RigidBody {
        let mut body = RigidBody::new(false);
        body.update_mass([MassProperties::sphere(mass, 1.0)].into_iter());
        body.linear_damping = 1.0;
        body.angular_damping = 1.0;
        body
    }

    #[test]
    fn test_gravity_scales_by_dt() {
        let mut body = active_body(2.0);
        integrate_forces(&mut body, &Gravity::earth(), 0.1);
        assert_relative_eq!(body.twist().linear.z, -0.981, epsilon = 1e-12);
    }

    #[test]
    fn test_force_uses_inverse_mass() {
        let mut body = active_body(2.0);
        body.apply_force(Vector3::new(4.0, 0.0, 0.0));
        integrate_forces(&mut body, &Gravity::zero(), 0.5);
        assert_relative_eq!(body.twist().linear.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_torque_uses_world_inverse_inertia() {
        let mut body = active_body(1.0);
        body.apply_torque(Vector3::new(0.0, 0.0, 0.4));
        integrate_forces(&mut body, &Gravity::zero(), 1.0);
        // I = 0.4, so ω = 1
        assert_relative_eq!(body.twist().angular.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_damping_multiplies() {
        let mut body = active_body(1.0);
        body.linear_damping = 0.5;
        body.set_linear_velocity(Vector3::new(2.0, 0.0, 0.0));
        integrate_forces(&mut body, &Gravity::zero(), 0.01);
        assert_relative_eq!(body.twist().linear.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inactive_and_static_skip() {
        let mut body = RigidBody::new(false);
        body.set_active(false);
        integrate_forces(&mut body, &Gravity::earth(), 0.1);
        assert!(body.twist().is_zero());

        let mut ground = RigidBody::new(true);
        integrate_forces(&mut ground, &Gravity::earth(), 0.1);
        assert!(ground.twist().is_zero());
    }

    #[test]
    fn test_gravity_opt_out() {
        let mut body = active_body(1.0);
        body.affected_by_gravity = false;
        integrate_forces(&mut body, &Gravity::earth(), 0.1);
        assert!(body.twist().is_zero());
    }

    #[test]
    fn test_pose_quarter_turn() {
        let pose = Pose::from_position(Point3::origin());
        let twist = Twist::angular(Vector3::new(0.0, 0.0, FRAC_PI_2));
        let next = integrate_pose(&pose, &twist, 1.0);
        let x = next.transform_vector(&Vector3::x());
        assert_relative_eq!(x, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_composes_in_world_frame() {
        // Start turned a quarter about z, then spin about world x.
        let start = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let mut q = start;
        integrate_rotation(&mut q, &Vector3::new(FRAC_PI_2, 0.0, 0.0), 1.0);
        // Body x pointed along world y; a world-x quarter turn sends it to world z.
        let x = q * Vector3::x();
        assert_relative_eq!(x, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_angular_velocity_guard() {
        let mut q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3);
        let before = q;
        integrate_rotation(&mut q, &Vector3::new(0.0, 1e-12, 0.0), 1.0);
        assert_eq!(q, before);
    }
}
